//! Raw rows + mapping + reference maps -> insert-ready cutoff records.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::mapping::{CanonicalField, ColumnMapping};
use super::parse::RawCutoffRow;
use super::reference::ReferenceMaps;

const DEFAULT_CATEGORY: &str = "General";
const DEFAULT_QUOTA: &str = "All India";
const DEFAULT_DOMICILE: &str = "Home";
const DEFAULT_ROUND: u32 = 1;

/// Persisted shape of an imported cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCutoffRecord {
    pub college_id: Option<String>,
    pub branch_id: Option<String>,
    pub category: String,
    pub opening_rank: Option<u32>,
    pub closing_rank: Option<u32>,
    pub domicile: String,
    pub quota: String,
    pub round: u32,
    pub year: i32,
}

/// Non-blocking issues found while reconciling. Rows are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    UnmatchedCollege { row: usize, name: String },
    UnmatchedBranch { row: usize, name: String },
    DomicileDefaulted { row: usize },
}

impl ImportWarning {
    pub fn row(&self) -> usize {
        match self {
            ImportWarning::UnmatchedCollege { row, .. }
            | ImportWarning::UnmatchedBranch { row, .. }
            | ImportWarning::DomicileDefaulted { row } => *row,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        !matches!(self, ImportWarning::DomicileDefaulted { .. })
    }
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::UnmatchedCollege { row, name } => {
                write!(f, "row {row}: college '{name}' not found, college_id left empty")
            }
            ImportWarning::UnmatchedBranch { row, name } => {
                write!(f, "row {row}: branch '{name}' not found, branch_id left empty")
            }
            ImportWarning::DomicileDefaulted { row } => {
                write!(f, "row {row}: no domicile or quota signal, assumed '{DEFAULT_DOMICILE}'")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub records: Vec<NormalizedCutoffRecord>,
    pub warnings: Vec<ImportWarning>,
    /// False while reference tables were not yet loaded.
    pub is_final: bool,
}

impl Reconciliation {
    /// Distinct row numbers with an unresolved college or branch name.
    pub fn unmatched_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .warnings
            .iter()
            .filter(|w| w.is_unmatched())
            .map(ImportWarning::row)
            .collect();
        rows.dedup();
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub default_year: i32,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            default_year: chrono::Local::now().year(),
        }
    }
}

/// Rank in a cell. Digit grouping (`1,234`, `1,23,456`, `1 234`, `1_234`) is
/// accepted and a decimal fraction from spreadsheet exports is truncated.
/// Anything else (empty, `N/A`, `450abc`, zero, negative) is `None`.
pub fn parse_rank(raw: &str) -> Option<u32> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();
    let whole = match cleaned.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c.is_ascii_digit()) => whole,
        Some(_) => return None,
        None => cleaned.as_str(),
    };
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    whole.parse::<u32>().ok().filter(|rank| *rank > 0)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn cell<'r>(row: &'r RawCutoffRow, mapping: &ColumnMapping, field: CanonicalField) -> Option<&'r str> {
    non_empty(mapping.header_for(field).and_then(|header| row.get(header)))
}

fn quota_signals_home(row: &RawCutoffRow, mapping: &ColumnMapping) -> bool {
    cell(row, mapping, CanonicalField::Quota)
        .into_iter()
        .chain(non_empty(row.get_ignore_case("quota")))
        .any(|quota| quota.to_lowercase().contains("home"))
}

/// Reconcile rows against the reference maps. Fully blank rows are dropped;
/// unresolved names produce `None` ids plus a warning, never an error.
pub fn reconcile(
    rows: &[RawCutoffRow],
    mapping: &ColumnMapping,
    refs: &ReferenceMaps,
    options: ReconcileOptions,
) -> Reconciliation {
    let mut result = Reconciliation {
        is_final: true,
        ..Reconciliation::default()
    };

    for (index, row) in rows.iter().enumerate() {
        if row.is_blank() {
            continue;
        }
        let row_number = index + 1;

        let college_id = cell(row, mapping, CanonicalField::CollegeId).and_then(|name| {
            let id = refs.resolve_college(name);
            if id.is_none() {
                result.warnings.push(ImportWarning::UnmatchedCollege {
                    row: row_number,
                    name: name.to_string(),
                });
            }
            id.map(str::to_string)
        });

        let branch_id = cell(row, mapping, CanonicalField::BranchId).and_then(|name| {
            let id = refs.resolve_branch(name);
            if id.is_none() {
                result.warnings.push(ImportWarning::UnmatchedBranch {
                    row: row_number,
                    name: name.to_string(),
                });
            }
            id.map(str::to_string)
        });

        let domicile = match cell(row, mapping, CanonicalField::Domicile) {
            Some(domicile) => domicile.to_string(),
            None => {
                if !quota_signals_home(row, mapping) {
                    result.warnings.push(ImportWarning::DomicileDefaulted { row: row_number });
                }
                DEFAULT_DOMICILE.to_string()
            }
        };

        result.records.push(NormalizedCutoffRecord {
            college_id,
            branch_id,
            category: cell(row, mapping, CanonicalField::Category)
                .unwrap_or(DEFAULT_CATEGORY)
                .to_string(),
            opening_rank: cell(row, mapping, CanonicalField::OpeningRank).and_then(parse_rank),
            closing_rank: cell(row, mapping, CanonicalField::ClosingRank).and_then(parse_rank),
            domicile,
            quota: cell(row, mapping, CanonicalField::Quota)
                .unwrap_or(DEFAULT_QUOTA)
                .to_string(),
            round: cell(row, mapping, CanonicalField::Round)
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(DEFAULT_ROUND),
            year: cell(row, mapping, CanonicalField::Year)
                .and_then(|v| v.parse::<i32>().ok())
                .unwrap_or(options.default_year),
        });
    }

    result
}
