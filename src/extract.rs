use std::{collections::HashSet, path::Path};

use anyhow::Context;
use tracing::debug;

use crate::{
    company::CompanyId,
    config::{parse_cell_ref, Config},
    error::FinanceError,
    store::{normalize_metric, MetricStore},
    workbook::{cell_text, SheetSource, XlsxWorkbook},
    Result,
};

/// Metric under which the income-statement debt cost is recorded.
pub const DEBT_COST_METRIC: &str = "coût du capital";

/// Whether a raw cell carries a figure: blank, "n/c" and "n/a" do not.
pub fn is_reportable(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value.eq_ignore_ascii_case("n/c") || value.eq_ignore_ascii_case("n/a"))
}

/// Fiscal year encoded by the four characters preceding the extension, as in
/// `bilan 2020.xlsx`.
pub fn year_from_file_name<P: AsRef<Path>>(path: P) -> Option<i32> {
    let stem = path.as_ref().file_stem()?.to_str()?;
    let chars: Vec<char> = stem.chars().collect();
    if chars.len() < 4 {
        return None;
    }
    let digits: String = chars[chars.len() - 4..].iter().collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Pulls recognized metric rows and the debt-cost cell out of one company workbook.
#[derive(Debug, Clone)]
pub struct FinancialExtractor {
    recognized: HashSet<String>,
    income_statement_sheet: String,
    debt_cost_cell: (u32, u32),
    header_rows: u32,
    label_column: u32,
    value_column: u32,
}

impl FinancialExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let debt_cost_cell = parse_cell_ref(&config.debt_cost_cell)
            .with_context(|| format!("invalid debt cost cell {}", config.debt_cost_cell))?;
        Ok(Self {
            recognized: config
                .recognized_metrics
                .iter()
                .map(|m| normalize_metric(m))
                .collect(),
            income_statement_sheet: config.income_statement_sheet.clone(),
            debt_cost_cell,
            header_rows: config.header_rows,
            label_column: config.label_column,
            value_column: config.value_column,
        })
    }

    /// An empty allow-list accepts every non-blank label.
    pub fn accepts_label(&self, label: &str) -> bool {
        let label = normalize_metric(label);
        !label.is_empty() && (self.recognized.is_empty() || self.recognized.contains(&label))
    }

    /// Opens `path`, derives its year from the file name and extracts it.
    pub fn extract_file<P: AsRef<Path>>(
        &self,
        path: P,
        company: &CompanyId,
        store: &mut MetricStore,
    ) -> Result<usize> {
        let path = path.as_ref();
        let year = year_from_file_name(path)
            .ok_or_else(|| FinanceError::InvalidFileName(path.to_path_buf()))?;
        let mut workbook = XlsxWorkbook::open(path)?;
        self.extract(&mut workbook, year, company, store)
    }

    /// Returns the number of values newly written to `store`.
    pub fn extract<S: SheetSource>(
        &self,
        source: &mut S,
        year: i32,
        company: &CompanyId,
        store: &mut MetricStore,
    ) -> Result<usize> {
        let mut written = 0;

        if source.has_sheet(&self.income_statement_sheet) {
            let sheet = source.sheet(&self.income_statement_sheet)?;
            let (row, col) = self.debt_cost_cell;
            let debt_cost = cell_text(&sheet, row, col);
            if is_reportable(&debt_cost) && store.put(DEBT_COST_METRIC, company, year, debt_cost) {
                written += 1;
            }
        }

        let sheet = source.first_sheet()?;
        let Some((last_row, _)) = sheet.end() else {
            return Ok(written);
        };
        for row in self.header_rows..=last_row {
            let label = cell_text(&sheet, row, self.label_column);
            if !self.accepts_label(&label) {
                continue;
            }
            let value = cell_text(&sheet, row, self.value_column);
            if !is_reportable(&value) {
                debug!("{company} {year}: no value for {}", label.trim());
                continue;
            }
            if store.put(&label, company, year, value) {
                written += 1;
            }
        }
        Ok(written)
    }
}
