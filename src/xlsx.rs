use std::{collections::HashSet, path::Path};

use anyhow::Context;
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::{
    report::{Report, Sheet},
    Result,
};

const MAX_SHEET_NAME_LEN: usize = 31;

fn create_header_format() -> Format {
    Format::new().set_bold().set_border(FormatBorder::Thin)
}

fn create_number_format() -> Format {
    Format::new().set_num_format("#,##0.00")
}

/// A worksheet name accepted by Excel: forbidden characters replaced, at most 31
/// characters, no surrounding apostrophes, unique within `taken`.
pub fn sheet_name(name: &str, taken: &mut HashSet<String>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'');
    let base: String = if cleaned.is_empty() {
        "Feuille".to_string()
    } else {
        let truncated: String = cleaned.chars().take(MAX_SHEET_NAME_LEN).collect();
        truncated.trim_end().trim_end_matches('\'').to_string()
    };

    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME_LEN - suffix.chars().count();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    taken.insert(candidate.to_lowercase());
    candidate
}

fn write_sheet(ws: &mut Worksheet, sheet: &Sheet) -> std::result::Result<(), XlsxError> {
    let hdr = create_header_format();
    let num = create_number_format();

    for (col, title) in sheet.header().iter().enumerate() {
        ws.write_with_format(0, col as u16, title.as_str(), &hdr)?;
    }

    let first_value_col = 1 + sheet.info_headers.len();
    for (i, row) in sheet.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        ws.write(r, 0, row.company.as_str())?;
        for (j, info) in row.info.iter().enumerate() {
            ws.write(r, (1 + j) as u16, info.as_str())?;
        }
        for (j, value) in row.values.iter().enumerate() {
            if let Some(v) = value {
                ws.write_with_format(r, (first_value_col + j) as u16, *v, &num)?;
            }
        }
    }

    ws.set_freeze_panes(1, 1)?;
    ws.set_column_width(0, 8)?;
    for col in 1..first_value_col + sheet.years.len() {
        ws.set_column_width(col as u16, 14)?;
    }
    Ok(())
}

pub fn build_workbook(report: &Report) -> Result<Workbook> {
    let mut wb = Workbook::new();
    let mut taken = HashSet::new();
    for sheet in &report.sheets {
        let name = sheet_name(&sheet.name, &mut taken);
        let ws = wb.add_worksheet();
        ws.set_name(&name)
            .with_context(|| format!("invalid sheet name {name}"))?;
        write_sheet(ws, sheet).with_context(|| format!("failed to write sheet {name}"))?;
    }
    Ok(wb)
}

pub fn save_report<P: AsRef<Path>>(report: &Report, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wb = build_workbook(report)?;
    wb.save(path)
        .with_context(|| format!("failed to save report to {}", path.display()))?;
    info!("report written to {}", path.display());
    Ok(())
}
