//! Report sheets derived from a [`MetricStore`].
//!
//! Sheets are built in memory first so that derived sheets can read sheets that
//! were built before them, then handed to [`crate::xlsx`] for writing.

use calamine::{Data, Range};
use tracing::{info, warn};

use crate::{
    company::{CompanyId, CompanyRegistry},
    cvae::compute_tax,
    extract::DEBT_COST_METRIC,
    store::{parse_or_zero, MetricStore},
    workbook::{cell_f64, cell_text},
};

pub const REVENUE_METRIC: &str = "chiffre d'affaires";
pub const VALUE_ADDED_METRIC: &str = "valeur ajoutée";
pub const NET_INCOME_METRIC: &str = "résultat net";

pub const CVAE_SHEET: &str = "cvae";
pub const CVAE_RATIO_SHEET: &str = "ratio cvae résultat net";
pub const DEBT_COST_RATIO_SHEET: &str = "coût de la dette - résultat net";

const ID_HEADER: &str = "ID";
const EMPLOYEES_HEADER: &str = "Effectif";
const SIRET_HEADER: &str = "SIRET";

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub company: CompanyId,
    /// Text columns between the ID and the first year.
    pub info: Vec<String>,
    /// One entry per sheet year; `None` leaves the cell blank.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub info_headers: Vec<String>,
    pub years: Vec<i32>,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    fn new(name: &str, info_headers: Vec<String>, years: &[i32]) -> Self {
        Self {
            name: name.to_string(),
            info_headers,
            years: years.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn header(&self) -> Vec<String> {
        std::iter::once(ID_HEADER.to_string())
            .chain(self.info_headers.iter().cloned())
            .chain(self.years.iter().map(|y| y.to_string()))
            .collect()
    }

    pub fn row(&self, company: &CompanyId) -> Option<&SheetRow> {
        self.rows.iter().find(|r| &r.company == company)
    }

    pub fn value(&self, company: &CompanyId, year: i32) -> Option<f64> {
        let col = self.years.iter().position(|&y| y == year)?;
        self.row(company)?.values[col]
    }

    /// Reads back a sheet laid out as [`Sheet::header`] describes: the first
    /// column is the ID, header cells that are years mark value columns.
    pub fn from_range(name: &str, range: &Range<Data>) -> Self {
        let mut sheet = Sheet::new(name, Vec::new(), &[]);
        let (Some((top, left)), Some((bottom, right))) = (range.start(), range.end()) else {
            return sheet;
        };

        let mut info_cols = Vec::new();
        let mut year_cols = Vec::new();
        for col in left + 1..=right {
            let title = cell_text(range, top, col);
            match title.trim().parse::<i32>() {
                Ok(year) if (1900..=2100).contains(&year) => {
                    sheet.years.push(year);
                    year_cols.push(col);
                }
                _ => {
                    sheet.info_headers.push(title);
                    info_cols.push(col);
                }
            }
        }

        for row in top + 1..=bottom {
            let id = cell_text(range, row, left);
            if id.trim().is_empty() {
                continue;
            }
            sheet.rows.push(SheetRow {
                company: CompanyId::new(id),
                info: info_cols.iter().map(|&c| cell_text(range, row, c)).collect(),
                values: year_cols.iter().map(|&c| cell_f64(range, row, c)).collect(),
            });
        }
        sheet
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Report {
    pub sheets: Vec<Sheet>,
}

impl Report {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

pub struct ReportBuilder<'a> {
    store: &'a MetricStore,
    registry: &'a CompanyRegistry,
    years: &'a [i32],
    include_siret: bool,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(store: &'a MetricStore, registry: &'a CompanyRegistry, years: &'a [i32]) -> Self {
        Self {
            store,
            registry,
            years,
            include_siret: false,
        }
    }

    pub fn include_siret(mut self, include: bool) -> Self {
        self.include_siret = include;
        self
    }

    fn employee_count(&self, company: &CompanyId) -> String {
        self.registry
            .get(company)
            .map(|c| c.employee_count.clone())
            .unwrap_or_default()
    }

    /// Raw metric sheets, the CVAE sheets, then the debt cost ratio sheet. The
    /// debt cost figures come from `capital_sheet` when given, otherwise from the
    /// raw sheet built for the debt cost metric.
    pub fn build(&self, capital_sheet: Option<&Sheet>) -> Report {
        let mut report = Report {
            sheets: self.build_raw_sheets(),
        };
        let (tax, ratio) = self.build_tax_sheets();
        report.sheets.push(tax);
        report.sheets.push(ratio);

        let capital = capital_sheet.or_else(|| report.sheet(DEBT_COST_METRIC)).cloned();
        let sheet = match capital {
            Some(capital) => self.build_capital_cost_sheet(&capital),
            None => {
                warn!("no \"{DEBT_COST_METRIC}\" figures, {DEBT_COST_RATIO_SHEET} is empty");
                Sheet::new(
                    DEBT_COST_RATIO_SHEET,
                    vec![EMPLOYEES_HEADER.to_string()],
                    self.years,
                )
            }
        };
        report.sheets.push(sheet);
        info!("report built with {} sheets", report.sheets.len());
        report
    }

    /// One sheet per metric, most populated first, companies by ascending ID.
    /// Every year cell holds a number; absent or unparsable values read as 0.
    pub fn build_raw_sheets(&self) -> Vec<Sheet> {
        let mut info_headers = vec![EMPLOYEES_HEADER.to_string()];
        if self.include_siret {
            info_headers.push(SIRET_HEADER.to_string());
        }

        self.store
            .ordered_by_population()
            .into_iter()
            .map(|(metric, companies)| {
                let mut sheet = Sheet::new(metric, info_headers.clone(), self.years);
                for (id, by_year) in companies {
                    let mut info = vec![self.employee_count(id)];
                    if self.include_siret {
                        info.push(
                            self.registry
                                .get(id)
                                .map(|c| c.siret.clone())
                                .unwrap_or_default(),
                        );
                    }
                    let values = self
                        .years
                        .iter()
                        .map(|y| Some(by_year.get(y).map(|v| parse_or_zero(v)).unwrap_or(0.)))
                        .collect();
                    sheet.rows.push(SheetRow {
                        company: id.clone(),
                        info,
                        values,
                    });
                }
                sheet
            })
            .collect()
    }

    /// The CVAE sheet and the CVAE / net income ratio sheet, for every company
    /// with revenue figures. A zero revenue or value added yields no tax.
    pub fn build_tax_sheets(&self) -> (Sheet, Sheet) {
        let info_headers = vec![EMPLOYEES_HEADER.to_string()];
        let mut tax_sheet = Sheet::new(CVAE_SHEET, info_headers.clone(), self.years);
        let mut ratio_sheet = Sheet::new(CVAE_RATIO_SHEET, info_headers, self.years);

        let Some(companies) = self.store.companies(REVENUE_METRIC) else {
            warn!("no \"{REVENUE_METRIC}\" figures, CVAE sheets are empty");
            return (tax_sheet, ratio_sheet);
        };

        for id in companies.keys() {
            let mut taxes = Vec::with_capacity(self.years.len());
            let mut ratios = Vec::with_capacity(self.years.len());
            for &year in self.years {
                let ca = self.store.value(REVENUE_METRIC, id, year);
                let va = self.store.value(VALUE_ADDED_METRIC, id, year);
                let tax = if ca == 0. || va == 0. {
                    0.
                } else {
                    compute_tax(ca, va)
                };
                taxes.push(Some(tax));

                let net_income = self.store.value(NET_INCOME_METRIC, id, year);
                ratios.push((net_income != 0.).then(|| (tax / net_income).abs()));
            }

            let info = vec![self.employee_count(id)];
            if ratios.iter().any(Option::is_some) {
                ratio_sheet.rows.push(SheetRow {
                    company: id.clone(),
                    info: info.clone(),
                    values: ratios,
                });
            }
            tax_sheet.rows.push(SheetRow {
                company: id.clone(),
                info,
                values: taxes,
            });
        }
        (tax_sheet, ratio_sheet)
    }

    /// Debt cost / net income per company and year of `capital_sheet`, where both
    /// figures are non-zero.
    pub fn build_capital_cost_sheet(&self, capital_sheet: &Sheet) -> Sheet {
        let mut sheet = Sheet::new(
            DEBT_COST_RATIO_SHEET,
            vec![EMPLOYEES_HEADER.to_string()],
            &capital_sheet.years,
        );
        for row in &capital_sheet.rows {
            let values: Vec<Option<f64>> = capital_sheet
                .years
                .iter()
                .zip(&row.values)
                .map(|(&year, cost)| {
                    let cost = cost.unwrap_or(0.);
                    let net_income = self.store.value(NET_INCOME_METRIC, &row.company, year);
                    (cost != 0. && net_income != 0.).then(|| (cost / net_income).abs())
                })
                .collect();
            if values.iter().any(Option::is_some) {
                sheet.rows.push(SheetRow {
                    company: row.company.clone(),
                    info: vec![self.employee_count(&row.company)],
                    values,
                });
            }
        }
        sheet
    }
}
