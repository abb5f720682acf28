//! Metric table: metric name → company → year → raw cell text.

use std::{collections::BTreeMap, path::Path};

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    company::{CompanyId, CompanyRegistry},
    Result,
};

pub type YearValues = BTreeMap<i32, String>;
pub type CompanyValues = BTreeMap<CompanyId, YearValues>;

/// Values are kept as read; they are only interpreted as numbers when a report
/// is emitted (see [`parse_or_zero`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricStore {
    // metric insertion order is kept for stable report ordering
    metrics: Vec<(String, CompanyValues)>,
}

/// Lowercased, trimmed form under which a metric is stored.
pub fn normalize_metric(name: &str) -> String {
    name.trim().replace('\u{2019}', "'").to_lowercase()
}

/// Numeric reading of a stored value. Empty or unparsable text reads as 0.0; a
/// missing figure and a zero figure are deliberately treated alike in reports.
pub fn parse_or_zero(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.)
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` unless the (metric, company, year) triple already holds one.
    /// Returns whether the value was stored.
    pub fn put(
        &mut self,
        metric: &str,
        company: &CompanyId,
        year: i32,
        value: impl Into<String>,
    ) -> bool {
        let metric = normalize_metric(metric);
        let index = match self.metrics.iter().position(|(m, _)| *m == metric) {
            Some(i) => i,
            None => {
                self.metrics.push((metric, CompanyValues::new()));
                self.metrics.len() - 1
            }
        };
        let years = self.metrics[index].1.entry(company.clone()).or_default();
        if years.contains_key(&year) {
            return false;
        }
        years.insert(year, value.into());
        true
    }

    pub fn companies(&self, metric: &str) -> Option<&CompanyValues> {
        let metric = normalize_metric(metric);
        self.metrics
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, c)| c)
    }

    pub fn get(&self, metric: &str, company: &CompanyId, year: i32) -> Option<&str> {
        self.companies(metric)?
            .get(company)?
            .get(&year)
            .map(String::as_str)
    }

    /// Numeric value of a triple, 0.0 when absent or unparsable.
    pub fn value(&self, metric: &str, company: &CompanyId, year: i32) -> f64 {
        self.get(metric, company, year)
            .map(parse_or_zero)
            .unwrap_or(0.)
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|(m, _)| m.as_str())
    }

    /// Metrics by descending number of companies with data; ties keep insertion order.
    pub fn ordered_by_population(&self) -> Vec<(&str, &CompanyValues)> {
        let mut metrics: Vec<(&str, &CompanyValues)> = self
            .metrics
            .iter()
            .map(|(m, c)| (m.as_str(), c))
            .collect();
        metrics.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        metrics
    }

    pub fn len(&self) -> usize {
        self.metrics
            .iter()
            .flat_map(|(_, c)| c.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON form with company keys rendered as `"<ID> - <Name>"` (bare ID for a
    /// company the registry does not know).
    pub fn to_json(&self, registry: &CompanyRegistry) -> Result<String> {
        let mut root = Map::new();
        for (metric, companies) in &self.metrics {
            let mut by_company = Map::new();
            for (id, years) in companies {
                let key = registry
                    .get(id)
                    .map(|c| c.key())
                    .unwrap_or_else(|| id.to_string());
                let by_year: Map<String, Value> = years
                    .iter()
                    .map(|(y, v)| (y.to_string(), Value::String(v.clone())))
                    .collect();
                by_company.insert(key, Value::Object(by_year));
            }
            root.insert(metric.clone(), Value::Object(by_company));
        }
        Ok(serde_json::to_string_pretty(&Value::Object(root))?)
    }

    /// Rebuilds a store from [`MetricStore::to_json`] output, re-linking every
    /// company key against `registry`. An unresolvable key fails the whole reload.
    pub fn from_json(text: &str, registry: &CompanyRegistry, id_width: usize) -> Result<Self> {
        let root: Map<String, Value> =
            serde_json::from_str(text).context("persisted store is not a JSON object")?;
        let mut store = Self::new();
        for (metric, companies) in root {
            let companies: BTreeMap<String, BTreeMap<i32, String>> =
                serde_json::from_value(companies)
                    .with_context(|| format!("malformed entry for metric {metric}"))?;
            for (key, years) in companies {
                let company = registry.resolve_key(&key, id_width)?;
                for (year, value) in years {
                    store.put(&metric, &company.id, year, value);
                }
            }
        }
        Ok(store)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, registry: &CompanyRegistry) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json(registry)?)
            .with_context(|| format!("failed to write store to {}", path.display()))?;
        info!("metric store saved to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(
        path: P,
        registry: &CompanyRegistry,
        id_width: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read store from {}", path.display()))?;
        let store = Self::from_json(&text, registry, id_width)
            .with_context(|| format!("failed to reload store from {}", path.display()))?;
        info!(
            "metric store reloaded from {} ({} values)",
            path.display(),
            store.len()
        );
        Ok(store)
    }
}

/// Flat dump of the store, one line per value.
pub fn write_detail_as_csv<P: AsRef<Path>>(
    store: &MetricStore,
    registry: &CompanyRegistry,
    file_path: P,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(&file_path)?;
    wtr.write_record(["Metric", "ID", "Name", "Year", "Value"])?;
    for (metric, companies) in &store.metrics {
        for (id, years) in companies {
            let name = registry.get(id).map(|c| c.name.as_str()).unwrap_or_default();
            for (year, value) in years {
                wtr.write_record([
                    metric.as_str(),
                    id.as_str(),
                    name,
                    year.to_string().as_str(),
                    value.as_str(),
                ])?;
            }
        }
    }
    wtr.flush()?;
    info!(
        "the metric detail was written as CSV to file {}",
        file_path.as_ref().to_string_lossy()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{company::tests::registry, error::FinanceError};

    fn id(s: &str) -> CompanyId {
        CompanyId::new(s)
    }

    #[test]
    fn first_write_wins() {
        let mut store = MetricStore::new();
        assert!(store.put("Marge brute", &id("001"), 2020, "A"));
        assert!(!store.put("Marge brute", &id("001"), 2020, "B"));
        assert_eq!(store.get("marge brute", &id("001"), 2020), Some("A"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn metric_names_are_case_insensitive() {
        let mut store = MetricStore::new();
        store.put("  Chiffre d’Affaires ", &id("001"), 2020, "10");
        store.put("CHIFFRE D'AFFAIRES", &id("001"), 2019, "9");
        assert_eq!(store.metric_names().collect::<Vec<_>>(), vec!["chiffre d'affaires"]);
        assert_eq!(store.value("Chiffre d'affaires", &id("001"), 2019), 9.);
    }

    #[test]
    fn values_parse_or_default_to_zero() {
        assert_eq!(parse_or_zero("1500000"), 1_500_000.);
        assert_eq!(parse_or_zero(" 1 500 000,50 "), 1_500_000.5);
        assert_eq!(parse_or_zero("-12.5"), -12.5);
        assert_eq!(parse_or_zero(""), 0.);
        assert_eq!(parse_or_zero("n/c"), 0.);

        let store = MetricStore::new();
        assert_eq!(store.value("ebit", &id("001"), 2020), 0.);
    }

    #[test]
    fn orders_metrics_by_population_then_insertion() {
        let mut store = MetricStore::new();
        store.put("ebit", &id("001"), 2020, "1");
        store.put("ebitda", &id("001"), 2020, "1");
        store.put("ebitda", &id("002"), 2020, "1");
        store.put("ebitda", &id("002"), 2019, "1");
        store.put("trésorerie", &id("003"), 2020, "1");
        let order: Vec<&str> = store
            .ordered_by_population()
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(order, vec!["ebitda", "ebit", "trésorerie"]);
    }

    #[test]
    fn json_round_trip_relinks_companies() {
        let registry = registry(&[("001", "Forges", "10-19"), ("002", "Usinage", "50-99")]);
        let mut store = MetricStore::new();
        store.put("résultat net", &id("002"), 2020, "-1200");
        store.put("chiffre d'affaires", &id("001"), 2021, "1000000");
        store.put("chiffre d'affaires", &id("001"), 2020, "900000");
        store.put("chiffre d'affaires", &id("002"), 2020, "");

        let json = store.to_json(&registry).unwrap();
        assert!(json.contains("\"001 - Forges\""));

        let reloaded = MetricStore::from_json(&json, &registry, 3).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn json_round_trip_keeps_ids_of_any_width() {
        let registry = registry(&[("000", "Note", ""), ("0001", "Macro", ""), ("1", "Forges", "")]);
        let mut store = MetricStore::new();
        store.put("ebit", &id("0001"), 2020, "42");
        store.put("ebit", &id("1"), 2020, "7");

        let json = store.to_json(&registry).unwrap();
        let reloaded = MetricStore::from_json(&json, &registry, 3).unwrap();

        assert_eq!(reloaded, store);
        assert_eq!(reloaded.get("ebit", &id("000"), 2020), None);
    }

    #[test]
    fn unknown_company_fails_reload() {
        let registry = registry(&[("001", "Forges", "10-19")]);
        let json = r#"{"ebit": {"001 - Forges": {"2020": "1"}, "009 - Inconnue": {"2020": "2"}}}"#;
        let err = MetricStore::from_json(json, &registry, 3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FinanceError>(),
            Some(FinanceError::UnknownCompany(key)) if key == "009 - Inconnue"
        ));
    }

    #[test]
    fn save_load_and_csv_detail() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&[("001", "Forges", "10-19")]);
        let mut store = MetricStore::new();
        store.put("ebit", &id("001"), 2020, "42");

        let path = dir.path().join("store.json");
        store.save(&path, &registry).unwrap();
        assert_eq!(MetricStore::load(&path, &registry, 3).unwrap(), store);

        let csv_path = dir.path().join("detail.csv");
        write_detail_as_csv(&store, &registry, &csv_path).unwrap();
        let csv = std::fs::read_to_string(csv_path).unwrap();
        assert_eq!(csv, "Metric,ID,Name,Year,Value\nebit,001,Forges,2020,42\n");
    }
}
