//! Locates company workbooks under the base directory.
//!
//! Layout: `<base>/<ID> - <name>/<anything><year>.xlsx`, plus the roster file at
//! the base directory root.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::{
    company::{CompanyId, CompanyRegistry},
    config::Config,
    Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinanceSource {
    pub company: CompanyId,
    pub path: PathBuf,
}

/// Entries of `dir` in name order. An entry that cannot be read is reported and left out.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                None
            }
        })
        .collect();
    entries.sort();
    Ok(entries)
}

fn is_xlsx(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

/// Company workbooks in directory-name then file-name order.
pub fn discover_sources(
    base_dir: &Path,
    registry: &CompanyRegistry,
    config: &Config,
) -> Result<Vec<FinanceSource>> {
    let mut sources = Vec::new();
    for dir in sorted_entries(base_dir)? {
        if dir.is_file() {
            continue;
        }
        let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if config.excluded_directories.iter().any(|e| e == dir_name) {
            continue;
        }
        let id: String = dir_name.chars().take(config.id_width).collect();
        let Some(company) = registry.get_str(&id) else {
            debug!("directory {dir_name} does not match a roster company");
            continue;
        };

        let tables: Vec<PathBuf> = match sorted_entries(&dir) {
            Ok(entries) => entries.into_iter().filter(|p| is_xlsx(p)).collect(),
            Err(e) => {
                warn!("skipping company {} ({}): {e:#}", company.id, company.name);
                continue;
            }
        };
        if tables.is_empty() {
            warn!("no table found for company {} ({})", company.id, company.name);
            continue;
        }
        sources.extend(tables.into_iter().map(|path| FinanceSource {
            company: company.id.clone(),
            path,
        }));
    }
    Ok(sources)
}
