use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::Result;

const ROSTER_FILE_NAME: &str = "000 - etablissements.xlsx";
const EXCLUDED_DIRECTORIES: &[&str] = &["000 - note", "0001 - données macro"];
const YEARS: &[i32] = &[2021, 2020, 2019, 2018, 2017, 2016];
const RECOGNIZED_METRICS: &[&str] = &[
    "chiffre d'affaires",
    "valeur ajoutée",
    "marge brute",
    "ebitda",
    "ebit",
    "résultat net",
    "délai de paiement clients (jours)",
    "délai de paiement fournisseurs (jours)",
    "trésorerie",
    "dettes financières",
    "dette financière nette",
];
const INCOME_STATEMENT_SHEET: &str = "Compte de résultat";
const DEBT_COST_CELL: &str = "D63";

/// Run parameters. Every field falls back to its default when absent from the
/// JSON file, so a partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub roster_file_name: String,
    pub excluded_directories: Vec<String>,
    /// Leading characters of a directory name or persisted key holding the company ID.
    pub id_width: usize,
    /// Report columns, most recent first.
    pub years: Vec<i32>,
    /// Row labels kept by the extractor. An empty list keeps every labeled row.
    pub recognized_metrics: Vec<String>,
    pub income_statement_sheet: String,
    pub debt_cost_cell: String,
    pub header_rows: u32,
    pub label_column: u32,
    pub value_column: u32,
    pub include_siret: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roster_file_name: ROSTER_FILE_NAME.to_string(),
            excluded_directories: EXCLUDED_DIRECTORIES.iter().map(|d| d.to_string()).collect(),
            id_width: 3,
            years: YEARS.to_vec(),
            recognized_metrics: RECOGNIZED_METRICS.iter().map(|m| m.to_string()).collect(),
            income_statement_sheet: INCOME_STATEMENT_SHEET.to_string(),
            debt_cost_cell: DEBT_COST_CELL.to_string(),
            header_rows: 2,
            label_column: 0,
            value_column: 3,
            include_siret: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Parses an A1-style reference ("D63") into zero-based (row, column).
pub fn parse_cell_ref(cell: &str) -> Option<(u32, u32)> {
    let cell = cell.trim();
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a1_references() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("D63"), Some((62, 3)));
        assert_eq!(parse_cell_ref("aa10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("B0"), None);
        assert_eq!(parse_cell_ref("B-1"), None);
        assert_eq!(parse_cell_ref(&format!("{}1", "Z".repeat(20))), None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"years": [2020, 2019], "recognized_metrics": []}"#).unwrap();
        assert_eq!(config.years, vec![2020, 2019]);
        assert!(config.recognized_metrics.is_empty());
        assert_eq!(config.roster_file_name, ROSTER_FILE_NAME);
        assert_eq!(config.id_width, 3);
    }
}
