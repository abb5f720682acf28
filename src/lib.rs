//! Financial metrics aggregation and CVAE estimation over per-company workbooks.

use std::path::{Path, PathBuf};

use anyhow::Error;
use tracing::{info, warn};

pub mod company;
pub mod config;
pub mod cvae;
pub mod discover;
pub mod error;
pub mod extract;
pub mod report;
pub mod store;
pub mod workbook;
pub mod xlsx;

use company::CompanyRegistry;
use config::Config;
use discover::{discover_sources, FinanceSource};
use extract::{FinancialExtractor, DEBT_COST_METRIC};
use report::{ReportBuilder, Sheet};
use store::{write_detail_as_csv, MetricStore};
use workbook::{SheetSource, XlsxWorkbook};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub base_dir: PathBuf,
    /// Persisted metric store, reloaded when present unless `rebuild` is set.
    pub store_path: PathBuf,
    pub rebuild: bool,
    pub output: PathBuf,
    pub detail_csv: Option<PathBuf>,
    /// Existing workbook whose debt cost sheet replaces the extracted figures.
    pub capital_workbook: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub companies: usize,
    pub sources_read: usize,
    pub sources_skipped: usize,
    pub values: usize,
    pub sheets: usize,
    pub reloaded: bool,
}

/// Extracts every source in order. Unreadable or misnamed files are reported and
/// skipped; returns the number of files read and skipped.
pub fn extract_sources(
    sources: &[FinanceSource],
    extractor: &FinancialExtractor,
    store: &mut MetricStore,
) -> (usize, usize) {
    let (mut read, mut skipped) = (0, 0);
    for source in sources {
        match extractor.extract_file(&source.path, &source.company, store) {
            Ok(written) => {
                info!(
                    "{}: {} values from {}",
                    source.company,
                    written,
                    source.path.display()
                );
                read += 1;
            }
            Err(e) => {
                warn!("skipping {}: {e:#}", source.path.display());
                skipped += 1;
            }
        }
    }
    (read, skipped)
}

fn read_capital_sheet(path: &Path) -> Result<Sheet> {
    let mut workbook = XlsxWorkbook::open(path)?;
    let range = workbook.sheet(DEBT_COST_METRIC)?;
    Ok(Sheet::from_range(DEBT_COST_METRIC, &range))
}

pub fn run(config: &Config, options: &RunOptions) -> Result<RunSummary> {
    let registry = CompanyRegistry::load(options.base_dir.join(&config.roster_file_name))?;
    let mut summary = RunSummary {
        companies: registry.len(),
        ..RunSummary::default()
    };

    let store = if options.store_path.is_file() && !options.rebuild {
        summary.reloaded = true;
        MetricStore::load(&options.store_path, &registry, config.id_width)?
    } else {
        let extractor = FinancialExtractor::new(config)?;
        let sources = discover_sources(&options.base_dir, &registry, config)?;
        info!("{} workbooks to read", sources.len());
        let mut store = MetricStore::new();
        let (read, skipped) = extract_sources(&sources, &extractor, &mut store);
        summary.sources_read = read;
        summary.sources_skipped = skipped;
        store.save(&options.store_path, &registry)?;
        store
    };
    summary.values = store.len();

    let capital = options
        .capital_workbook
        .as_deref()
        .map(read_capital_sheet)
        .transpose()?;
    let report = ReportBuilder::new(&store, &registry, &config.years)
        .include_siret(config.include_siret)
        .build(capital.as_ref());
    summary.sheets = report.sheets.len();
    xlsx::save_report(&report, &options.output)?;

    if let Some(path) = &options.detail_csv {
        write_detail_as_csv(&store, &registry, path)?;
    }
    Ok(summary)
}
