//! Read access to spreadsheet cells.
//!
//! Components read sheets through [`SheetSource`], backed by calamine for files on
//! disk and by [`MemoryWorkbook`] for tests.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};

use crate::{error::FinanceError, Result};

pub trait SheetSource {
    fn sheet_names(&self) -> Vec<String>;

    fn sheet(&mut self, name: &str) -> Result<Range<Data>>;

    fn first_sheet(&mut self) -> Result<Range<Data>> {
        let name = self
            .sheet_names()
            .into_iter()
            .next()
            .ok_or_else(|| FinanceError::MissingSheet("<first>".to_string()))?;
        self.sheet(&name)
    }

    fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names().iter().any(|n| n == name)
    }
}

/// An xlsx file opened with calamine. The handle is released on drop.
pub struct XlsxWorkbook {
    inner: Xlsx<BufReader<File>>,
}

impl XlsxWorkbook {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("failed to open workbook {}", path.display()))?;
        Ok(Self { inner })
    }
}

impl SheetSource for XlsxWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    fn sheet(&mut self, name: &str) -> Result<Range<Data>> {
        if !self.has_sheet(name) {
            return Err(FinanceError::MissingSheet(name.to_string()).into());
        }
        self.inner
            .worksheet_range(name)
            .with_context(|| format!("failed to read sheet {name}"))
    }
}

/// Sheets held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, Range<Data>)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet built from rows of cells, anchored at A1.
    pub fn with_rows(mut self, name: &str, rows: Vec<Vec<Data>>) -> Self {
        self.sheets.push((name.to_string(), range_from_rows(rows)));
        self
    }
}

impl SheetSource for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(n, _)| n.clone()).collect()
    }

    fn sheet(&mut self, name: &str) -> Result<Range<Data>> {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r.clone())
            .ok_or_else(|| FinanceError::MissingSheet(name.to_string()).into())
    }
}

pub fn range_from_rows(rows: Vec<Vec<Data>>) -> Range<Data> {
    let height = rows.len() as u32;
    let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
    if height == 0 || width == 0 {
        return Range::empty();
    }
    let mut range = Range::new((0, 0), (height - 1, width - 1));
    for (r, row) in rows.into_iter().enumerate() {
        for (c, value) in row.into_iter().enumerate() {
            range.set_value((r as u32, c as u32), value);
        }
    }
    range
}

/// Text of the cell at absolute position (`row`, `col`), empty when out of range.
pub fn cell_text(range: &Range<Data>, row: u32, col: u32) -> String {
    match range.get_value((row, col)) {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) | Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => {
            s.clone()
        }
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::DateTime(d)) => d.as_f64().to_string(),
        Some(Data::Error(e)) => format!("{e:?}"),
    }
}

/// Numeric value of the cell, for sheets whose cells are written as numbers.
pub fn cell_f64(range: &Range<Data>, row: u32, col: u32) -> Option<f64> {
    match range.get_value((row, col))? {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
