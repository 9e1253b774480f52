//! Canonical cutoff fields and the header -> field mapping.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    CollegeId,
    BranchId,
    Category,
    OpeningRank,
    ClosingRank,
    Domicile,
    Quota,
    Round,
    Year,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::CollegeId,
        CanonicalField::BranchId,
        CanonicalField::Category,
        CanonicalField::OpeningRank,
        CanonicalField::ClosingRank,
        CanonicalField::Domicile,
        CanonicalField::Quota,
        CanonicalField::Round,
        CanonicalField::Year,
    ];

    /// Column name in the persisted record.
    pub fn key(self) -> &'static str {
        match self {
            CanonicalField::CollegeId => "college_id",
            CanonicalField::BranchId => "branch_id",
            CanonicalField::Category => "category",
            CanonicalField::OpeningRank => "opening_rank",
            CanonicalField::ClosingRank => "closing_rank",
            CanonicalField::Domicile => "domicile",
            CanonicalField::Quota => "quota",
            CanonicalField::Round => "round",
            CanonicalField::Year => "year",
        }
    }

    /// Label shown to the operator, also what headers are matched against.
    pub fn label(self) -> &'static str {
        match self {
            CanonicalField::CollegeId => "College",
            CanonicalField::BranchId => "Branch",
            CanonicalField::Category => "Category",
            CanonicalField::OpeningRank => "Opening Rank",
            CanonicalField::ClosingRank => "Closing Rank",
            CanonicalField::Domicile => "Domicile",
            CanonicalField::Quota => "Quota",
            CanonicalField::Round => "Round",
            CanonicalField::Year => "Year",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CanonicalField {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_header(s);
        CanonicalField::ALL
            .into_iter()
            .find(|field| normalize_header(field.key()) == wanted || normalize_header(field.label()) == wanted)
            .ok_or_else(|| ImportError::UnknownField(s.to_string()))
    }
}

fn non_alpha() -> &'static Regex {
    static NON_ALPHA: OnceLock<Regex> = OnceLock::new();
    NON_ALPHA.get_or_init(|| Regex::new(r"[^a-z]").expect("valid regex"))
}

/// Lowercase and drop everything outside a-z.
pub fn normalize_header(raw: &str) -> String {
    non_alpha().replace_all(&raw.to_lowercase(), "").into_owned()
}

/// Which source header feeds each canonical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    fields: BTreeMap<CanonicalField, String>,
}

impl ColumnMapping {
    /// Best-effort guess. Per field, the first header whose normalized name
    /// equals the label or contains it (or is contained by it) wins; there is
    /// no ranking between candidates.
    pub fn guess(headers: &[String]) -> Self {
        let normalized: Vec<(String, &String)> = headers
            .iter()
            .map(|h| (normalize_header(h), h))
            .filter(|(n, _)| !n.is_empty())
            .collect();

        let mut fields = BTreeMap::new();
        for field in CanonicalField::ALL {
            let label = normalize_header(field.label());
            let found = normalized
                .iter()
                .find(|(n, _)| *n == label || n.contains(&label) || label.contains(n.as_str()));
            if let Some((_, header)) = found {
                fields.insert(field, (*header).clone());
            }
        }
        Self { fields }
    }

    /// Mapping for rows already shaped by the scrape endpoint.
    pub fn for_scraped() -> Self {
        let mut mapping = Self::default();
        for field in CanonicalField::ALL {
            let header = match field {
                CanonicalField::CollegeId => "college_name",
                CanonicalField::BranchId => "branch_name",
                other => other.key(),
            };
            mapping.set(field, header);
        }
        mapping
    }

    pub fn set(&mut self, field: CanonicalField, header: &str) {
        self.fields.insert(field, header.to_string());
    }

    pub fn clear(&mut self, field: CanonicalField) {
        self.fields.remove(&field);
    }

    pub fn header_for(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.fields.iter().map(|(field, header)| (*field, header.as_str()))
    }

    pub fn unmapped(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|field| !self.fields.contains_key(field))
            .collect()
    }
}

/// Parse a `field=Header` override as given on the command line.
pub fn parse_override(spec: &str) -> Result<(CanonicalField, String), ImportError> {
    let (field, header) = spec
        .split_once('=')
        .ok_or_else(|| ImportError::UnknownField(spec.to_string()))?;
    Ok((field.parse()?, header.trim().to_string()))
}
