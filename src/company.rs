use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    path::Path,
};

use calamine::{Data, Range};
use tracing::{debug, info, warn};

use crate::{
    error::FinanceError,
    workbook::{cell_text, SheetSource, XlsxWorkbook},
    Result,
};

// Roster column offsets
const COL_ID: u32 = 0;
const COL_NAME: u32 = 1;
const COL_SIRET: u32 = 3;
const COL_EMPLOYEE_COUNT: u32 = 4;
const COL_NAF: u32 = 5;
const COL_ADDRESS: &[u32] = &[8, 10, 11, 12, 13];
const COL_STATUS: u32 = 23;
const COL_SHAREHOLDER_TYPE: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompanyId(String);

impl CompanyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A company of the roster. Equality and hashing only look at the ID.
#[derive(Debug, Clone)]
pub struct Company {
    pub id: CompanyId,
    pub siret: String,
    pub name: String,
    pub address: String,
    pub naf: String,
    pub shareholder_type: String,
    pub employee_count: String,
}

impl Company {
    /// Human-readable key used in the persisted store: `"<ID> - <Name>"`.
    pub fn key(&self) -> String {
        format!("{} - {}", self.id, self.name)
    }
}

impl PartialEq for Company {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Company {}

impl Hash for Company {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Default)]
pub struct CompanyRegistry {
    companies: HashMap<CompanyId, Company>,
}

impl CompanyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the roster workbook. A missing file is a [`FinanceError::MissingRoster`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FinanceError::MissingRoster(path.to_path_buf()).into());
        }
        let mut workbook = XlsxWorkbook::open(path)?;
        let registry = Self::from_source(&mut workbook)?;
        info!(
            "loaded {} companies from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_source<S: SheetSource>(source: &mut S) -> Result<Self> {
        let range = source.first_sheet()?;
        Ok(Self::from_range(&range))
    }

    /// Builds the registry from the first roster sheet. Row 1 is the header; rows
    /// with a non-empty status are excluded. A repeated ID replaces the earlier row.
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut registry = Self::new();
        let Some((last_row, _)) = range.end() else {
            return registry;
        };
        for row in 1..=last_row {
            if !cell_text(range, row, COL_STATUS).trim().is_empty() {
                debug!("roster row {} excluded by status", row + 1);
                continue;
            }
            let id = cell_text(range, row, COL_ID);
            if id.trim().is_empty() {
                continue;
            }
            let address = COL_ADDRESS
                .iter()
                .map(|&c| cell_text(range, row, c))
                .collect::<Vec<_>>()
                .join(" ");
            registry.insert(Company {
                id: CompanyId::new(id),
                name: cell_text(range, row, COL_NAME),
                siret: cell_text(range, row, COL_SIRET),
                employee_count: cell_text(range, row, COL_EMPLOYEE_COUNT),
                naf: cell_text(range, row, COL_NAF),
                address,
                shareholder_type: cell_text(range, row, COL_SHAREHOLDER_TYPE),
            });
        }
        registry
    }

    /// Inserts `company`, replacing (and reporting) any company with the same ID.
    pub fn insert(&mut self, company: Company) {
        if let Some(previous) = self.companies.insert(company.id.clone(), company) {
            warn!(
                "duplicate company ID {} in roster, keeping the last entry (replaced {})",
                previous.id, previous.name
            );
        }
    }

    pub fn get(&self, id: &CompanyId) -> Option<&Company> {
        self.companies.get(id)
    }

    pub fn get_str(&self, id: &str) -> Option<&Company> {
        self.companies.get(&CompanyId::new(id))
    }

    /// Resolves a persisted key: the text before the first `" - "`, or the whole
    /// key. A key without separator may also carry its ID as the leading
    /// `id_width` characters followed by a delimiter (`"001_Forges"`).
    pub fn resolve_key(&self, key: &str, id_width: usize) -> Result<&Company> {
        let key_trimmed = key.trim();
        let found = match key_trimmed.split_once(" - ") {
            Some((id, _)) => self.get_str(id),
            None => self
                .get_str(key_trimmed)
                .or_else(|| self.get_by_prefix(key_trimmed, id_width)),
        };
        found.ok_or_else(|| FinanceError::UnknownCompany(key.to_string()).into())
    }

    fn get_by_prefix(&self, key: &str, id_width: usize) -> Option<&Company> {
        let mut chars = key.chars();
        let id: String = chars.by_ref().take(id_width).collect();
        match chars.next() {
            Some(c) if !c.is_alphanumeric() => self.get_str(&id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::workbook::{range_from_rows, MemoryWorkbook};

    pub(crate) fn company(id: &str, name: &str, employees: &str) -> Company {
        Company {
            id: CompanyId::new(id),
            siret: format!("{id}00000000000"),
            name: name.to_string(),
            address: String::new(),
            naf: String::new(),
            shareholder_type: String::new(),
            employee_count: employees.to_string(),
        }
    }

    pub(crate) fn registry(companies: &[(&str, &str, &str)]) -> CompanyRegistry {
        let mut registry = CompanyRegistry::new();
        for (id, name, employees) in companies {
            registry.insert(company(id, name, employees));
        }
        registry
    }

    fn roster_row(id: &str, name: &str, employees: &str, status: &str) -> Vec<Data> {
        let mut row = vec![Data::Empty; 25];
        row[0] = Data::String(id.into());
        row[1] = Data::String(name.into());
        row[3] = Data::String("12345678900011".into());
        row[4] = Data::String(employees.into());
        row[5] = Data::String("2511Z".into());
        row[8] = Data::String("3".into());
        row[10] = Data::String("rue".into());
        row[11] = Data::String("des Forges".into());
        row[12] = Data::String("69000".into());
        row[13] = Data::String("Lyon".into());
        if !status.is_empty() {
            row[23] = Data::String(status.into());
        }
        row[24] = Data::String("familial".into());
        row
    }

    #[test]
    fn loads_roster_and_skips_excluded_rows() {
        let header = vec![Data::String("ID".into()); 25];
        let range = range_from_rows(vec![
            header,
            roster_row("001", "Forges", "10-19", ""),
            roster_row("002", "Fermée", "0", "cédée"),
            roster_row("003", "Usinage", "50-99", ""),
        ]);
        let registry = CompanyRegistry::from_range(&range);

        assert_eq!(registry.len(), 2);
        let forges = registry.get_str("001").unwrap();
        assert_eq!(forges.name, "Forges");
        assert_eq!(forges.employee_count, "10-19");
        assert_eq!(forges.address, "3 rue des Forges 69000 Lyon");
        assert_eq!(forges.naf, "2511Z");
        assert_eq!(forges.shareholder_type, "familial");
        assert!(registry.get_str("002").is_none());
    }

    #[test]
    fn duplicate_ids_keep_the_last_row() {
        let mut source = MemoryWorkbook::new().with_rows(
            "Feuil1",
            vec![
                vec![Data::String("ID".into())],
                roster_row("001", "Ancien nom", "10-19", ""),
                roster_row("001", "Nouveau nom", "20-49", ""),
            ],
        );
        let registry = CompanyRegistry::from_source(&mut source).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_str("001").unwrap().name, "Nouveau nom");
    }

    #[test]
    fn missing_roster_is_reported_as_such() {
        let err = CompanyRegistry::load("/nonexistent/000 - etablissements.xlsx").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FinanceError>(),
            Some(FinanceError::MissingRoster(_))
        ));
    }

    #[test]
    fn resolves_persisted_keys_by_leading_id() {
        let registry = registry(&[("001", "Forges", "10-19")]);
        assert_eq!(registry.resolve_key("001 - Forges", 3).unwrap().name, "Forges");
        assert_eq!(registry.resolve_key("001", 3).unwrap().name, "Forges");
        assert!(registry.resolve_key("002 - Autre", 3).is_err());
        assert_eq!(registry.resolve_key("001_Forges", 3).unwrap().name, "Forges");
    }

    #[test]
    fn resolves_keys_of_ids_wider_or_narrower_than_the_default() {
        let registry = registry(&[("000", "Note", ""), ("0001", "Macro", ""), ("1", "Forges", "")]);
        assert_eq!(registry.resolve_key("0001 - Macro", 3).unwrap().id.as_str(), "0001");
        assert_eq!(registry.resolve_key("0001", 3).unwrap().id.as_str(), "0001");
        assert_eq!(registry.resolve_key("000 - Note", 3).unwrap().id.as_str(), "000");
        assert_eq!(registry.resolve_key("1 - Forges", 3).unwrap().id.as_str(), "1");
        assert!(registry.resolve_key("00012", 3).is_err());
    }

    #[test]
    fn equality_is_by_id() {
        let a = company("001", "A", "1-9");
        let b = company("001", "B", "10-19");
        assert_eq!(a, b);
        assert_eq!(a.key(), "001 - A");
    }
}
