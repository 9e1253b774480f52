use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::normalize::{Quota, GENERAL};

/// Entrance exams the predictor knows how to turn into a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExamType {
    #[serde(rename = "jee-main")]
    #[default]
    JeeMain,
    #[serde(rename = "jee-advanced")]
    JeeAdvanced,
    #[serde(rename = "neet")]
    Neet,
    #[serde(rename = "wbjee")]
    Wbjee,
}

impl ExamType {
    /// Assumed number of candidates sitting the exam.
    pub fn candidate_pool(self) -> f64 {
        match self {
            ExamType::JeeMain => 1_200_000.0,
            ExamType::JeeAdvanced => 250_000.0,
            ExamType::Neet => 2_000_000.0,
            ExamType::Wbjee => 120_000.0,
        }
    }

    pub fn max_score(self) -> f64 {
        match self {
            ExamType::JeeMain => 300.0,
            ExamType::JeeAdvanced => 360.0,
            ExamType::Neet => 720.0,
            ExamType::Wbjee => 200.0,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ExamType::JeeMain => "jee-main",
            ExamType::JeeAdvanced => "jee-advanced",
            ExamType::Neet => "neet",
            ExamType::Wbjee => "wbjee",
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExamType::JeeMain => "JEE Main",
            ExamType::JeeAdvanced => "JEE Advanced",
            ExamType::Neet => "NEET",
            ExamType::Wbjee => "WBJEE",
        };
        f.write_str(label)
    }
}

impl FromStr for ExamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "jee-main" | "jeemain" | "jee" => Ok(ExamType::JeeMain),
            "jee-advanced" | "jeeadvanced" | "jee-adv" => Ok(ExamType::JeeAdvanced),
            "neet" => Ok(ExamType::Neet),
            "wbjee" => Ok(ExamType::Wbjee),
            other => Err(format!("unknown exam type: {other}")),
        }
    }
}

/// Ownership class of a college; shifts the admission probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollegeType {
    #[serde(alias = "government", alias = "GOVERNMENT")]
    Government,
    #[serde(alias = "private", alias = "PRIVATE")]
    Private,
    #[serde(alias = "deemed", alias = "DEEMED")]
    Deemed,
}

impl fmt::Display for CollegeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CollegeType::Government => "Government",
            CollegeType::Private => "Private",
            CollegeType::Deemed => "Deemed",
        };
        f.write_str(label)
    }
}

impl FromStr for CollegeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "government" | "govt" => Ok(CollegeType::Government),
            "private" => Ok(CollegeType::Private),
            "deemed" => Ok(CollegeType::Deemed),
            other => Err(format!("unknown college type: {other}")),
        }
    }
}

/// Category label -> quota label -> closing rank. Entries may be sparse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CutoffMatrix(BTreeMap<String, BTreeMap<String, u32>>);

impl CutoffMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: &str, quota: &str, rank: u32) {
        self.0
            .entry(category.to_string())
            .or_default()
            .insert(quota.to_string(), rank);
    }

    pub fn with(mut self, category: &str, quota: &str, rank: u32) -> Self {
        self.insert(category, quota, rank);
        self
    }

    /// Exact lookup. A stored zero counts as missing.
    pub fn get(&self, category: &str, quota: &str) -> Option<u32> {
        self.0
            .get(category)
            .and_then(|quotas| quotas.get(quota))
            .copied()
            .filter(|rank| *rank > 0)
    }

    /// Lookup through the fallback chain: (category, quota), then
    /// (General, quota), then (General, All India).
    pub fn resolve(&self, category: &str, quota: Quota) -> Option<u32> {
        self.get(category, quota.label())
            .or_else(|| self.get(GENERAL, quota.label()))
            .or_else(|| self.get(GENERAL, Quota::AllIndia.label()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityInfo {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

/// Campus facilities. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Facilities {
    pub hostel: Option<FacilityInfo>,
    pub library: Option<FacilityInfo>,
    pub laboratories: Option<FacilityInfo>,
    pub sports: Option<FacilityInfo>,
    pub wifi: Option<FacilityInfo>,
    pub cafeteria: Option<FacilityInfo>,
    pub medical: Option<FacilityInfo>,
    pub transport: Option<FacilityInfo>,
}

impl Facilities {
    /// Names of the facilities marked as available.
    pub fn available(&self) -> Vec<&'static str> {
        [
            ("hostel", self.hostel),
            ("library", self.library),
            ("laboratories", self.laboratories),
            ("sports", self.sports),
            ("wifi", self.wifi),
            ("cafeteria", self.cafeteria),
            ("medical", self.medical),
            ("transport", self.transport),
        ]
        .into_iter()
        .filter(|(_, info)| info.is_some_and(|i| i.available))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollegeRecord {
    pub id: String,
    pub name: String,
    pub location: String,
    pub category: String,
    #[serde(rename = "type")]
    pub college_type: CollegeType,
    pub cutoffs: CutoffMatrix,
    pub fees: String,
    pub rating: f32,
    pub seats: u32,
    pub placement_rate: f32,
    pub average_package: String,
    pub branches: Vec<String>,
    /// Per-branch overrides, consulted before the college-wide matrix.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_cutoffs: BTreeMap<String, CutoffMatrix>,
    #[serde(default)]
    pub facilities: Facilities,
}

impl CollegeRecord {
    /// Closing rank for a branch, or `None` when no entry in the fallback
    /// chain exists.
    pub fn cutoff_for(&self, branch: &str, category: &str, quota: Quota) -> Option<u32> {
        self.branch_cutoffs
            .get(branch)
            .and_then(|matrix| matrix.resolve(category, quota))
            .or_else(|| self.cutoffs.resolve(category, quota))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub exam: ExamType,
    pub score: Option<f64>,
    pub percentile: Option<f64>,
    pub category: String,
    pub home_state: String,
    pub gender: Option<String>,
}

impl PredictionInput {
    /// Build from raw form fields. Blank or non-numeric score/percentile
    /// fields become `None`.
    pub fn from_form(exam: ExamType, score: &str, percentile: &str, category: &str, home_state: &str) -> Self {
        Self {
            exam,
            score: parse_decimal(score),
            percentile: parse_decimal(percentile),
            category: category.to_string(),
            home_state: home_state.to_string(),
            gender: None,
        }
    }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Qualitative admission chance, derived only from the final probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chance {
    High,
    Moderate,
    Low,
}

impl Chance {
    pub fn from_probability(probability: u8) -> Self {
        if probability >= 70 {
            Chance::High
        } else if probability >= 40 {
            Chance::Moderate
        } else {
            Chance::Low
        }
    }
}

impl fmt::Display for Chance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Chance::High => "High",
            Chance::Moderate => "Moderate",
            Chance::Low => "Low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub college_id: String,
    pub college_name: String,
    pub branch: String,
    pub location: String,
    pub probability: u8,
    pub chance: Chance,
    pub user_rank: u64,
    pub cutoff_rank: u32,
    pub quota: Quota,
    pub fees: String,
    pub rating: f32,
    pub college_type: CollegeType,
    pub seats: u32,
    pub placement_rate: f32,
    pub average_package: String,
    pub rationale: String,
}

/// Predictions split into the three buckets shown to the candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionTiers {
    pub estimated_rank: u64,
    pub safe: Vec<PredictionResult>,
    pub moderate: Vec<PredictionResult>,
    pub ambitious: Vec<PredictionResult>,
}

impl PredictionTiers {
    pub fn is_empty(&self) -> bool {
        self.safe.is_empty() && self.moderate.is_empty() && self.ambitious.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictionResult> {
        self.safe
            .iter()
            .chain(self.moderate.iter())
            .chain(self.ambitious.iter())
    }
}
