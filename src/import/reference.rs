//! Name -> identifier lookups built from the reference tables.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::datastore::{select_typed, Datastore};
use crate::models::CollegeType;

pub const COLLEGES_TABLE: &str = "wbjee_colleges";
pub const BRANCHES_TABLE: &str = "wbjee_branches";

/// A row of a reference table. Ids may be stored as numbers or strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "type")]
    pub college_type: Option<CollegeType>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported id value: {other}"))),
    }
}

fn lookup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive, trimmed name lookups for colleges and branches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMaps {
    colleges: HashMap<String, String>,
    branches: HashMap<String, String>,
}

impl ReferenceMaps {
    /// Later entries with the same name replace earlier ones.
    pub fn from_entries(colleges: &[ReferenceEntry], branches: &[ReferenceEntry]) -> Self {
        let index = |entries: &[ReferenceEntry]| {
            entries
                .iter()
                .map(|e| (lookup_key(&e.name), e.id.clone()))
                .collect::<HashMap<_, _>>()
        };
        Self {
            colleges: index(colleges),
            branches: index(branches),
        }
    }

    pub fn resolve_college(&self, name: &str) -> Option<&str> {
        self.colleges.get(&lookup_key(name)).map(String::as_str)
    }

    pub fn resolve_branch(&self, name: &str) -> Option<&str> {
        self.branches.get(&lookup_key(name)).map(String::as_str)
    }

    pub fn college_count(&self) -> usize {
        self.colleges.len()
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }
}

/// Readiness of the reference maps. Reconciliation is only final once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReferenceState {
    #[default]
    Pending,
    Loaded(ReferenceMaps),
    Failed(String),
}

impl ReferenceState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ReferenceState::Loaded(_))
    }
}

/// Fetch both reference tables in full and index them.
pub async fn load_reference_maps<D: Datastore>(store: &D) -> ReferenceState {
    let colleges = select_typed::<ReferenceEntry, _>(store, COLLEGES_TABLE).await;
    let branches = select_typed::<ReferenceEntry, _>(store, BRANCHES_TABLE).await;

    match (colleges, branches) {
        (Ok(colleges), Ok(branches)) => {
            let maps = ReferenceMaps::from_entries(&colleges, &branches);
            info!(
                colleges = maps.college_count(),
                branches = maps.branch_count(),
                "reference tables loaded"
            );
            ReferenceState::Loaded(maps)
        }
        (Err(err), _) | (_, Err(err)) => {
            warn!(error = %err, "failed to load reference tables");
            ReferenceState::Failed(err.to_string())
        }
    }
}
