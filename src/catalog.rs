//! College catalog: the built-in dataset, JSON loading, browsing filters, and
//! building predictor records from imported cutoff rows.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::import::reconcile::NormalizedCutoffRecord;
use crate::import::reference::ReferenceEntry;
use crate::models::{CollegeRecord, CollegeType, CutoffMatrix, Facilities, FacilityInfo};
use crate::normalize::{normalize_category, Quota};

const ALL_INDIA: &str = "All India";
const HOME_STATE: &str = "Home State";

#[allow(clippy::too_many_arguments)]
fn record(
    id: &str,
    name: &str,
    location: &str,
    college_type: CollegeType,
    cutoffs: CutoffMatrix,
    fees: &str,
    rating: f32,
    seats: u32,
    placement_rate: f32,
    average_package: &str,
    branches: &[&str],
) -> CollegeRecord {
    CollegeRecord {
        id: id.to_string(),
        name: name.to_string(),
        location: location.to_string(),
        category: "Engineering".to_string(),
        college_type,
        cutoffs,
        fees: fees.to_string(),
        rating,
        seats,
        placement_rate,
        average_package: average_package.to_string(),
        branches: branches.iter().map(|b| b.to_string()).collect(),
        branch_cutoffs: BTreeMap::new(),
        facilities: campus(),
    }
}

fn campus() -> Facilities {
    let yes = |rating: f32| Some(FacilityInfo { available: true, rating: Some(rating) });
    Facilities {
        hostel: yes(4.2),
        library: yes(4.5),
        laboratories: yes(4.4),
        sports: yes(4.0),
        wifi: yes(4.1),
        ..Facilities::default()
    }
}

/// Ten well-known institutes with sample closing ranks.
pub fn builtin_colleges() -> Vec<CollegeRecord> {
    use CollegeType::{Deemed, Government, Private};

    vec![
        record(
            "iit-bombay",
            "IIT Bombay",
            "Mumbai, Maharashtra",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 300)
                .with("General", HOME_STATE, 250)
                .with("OBC", ALL_INDIA, 800)
                .with("SC", ALL_INDIA, 1_500)
                .with("ST", ALL_INDIA, 2_500),
            "₹2.3 L/year",
            4.9,
            1_360,
            96.0,
            "₹23.5 LPA",
            &["Computer Science", "Electrical Engineering", "Mechanical Engineering"],
        ),
        record(
            "iit-delhi",
            "IIT Delhi",
            "New Delhi, Delhi",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 550)
                .with("General", HOME_STATE, 450)
                .with("OBC", ALL_INDIA, 1_100)
                .with("SC", ALL_INDIA, 2_000)
                .with("ST", ALL_INDIA, 3_000),
            "₹2.2 L/year",
            4.8,
            1_200,
            95.0,
            "₹21.9 LPA",
            &["Computer Science", "Electrical Engineering", "Chemical Engineering"],
        ),
        record(
            "iit-madras",
            "IIT Madras",
            "Chennai, Tamil Nadu",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 700)
                .with("General", HOME_STATE, 600)
                .with("OBC", ALL_INDIA, 1_400)
                .with("SC", ALL_INDIA, 2_600),
            "₹2.1 L/year",
            4.8,
            1_150,
            94.0,
            "₹21.5 LPA",
            &["Computer Science", "Aerospace Engineering", "Civil Engineering"],
        ),
        record(
            "iit-kanpur",
            "IIT Kanpur",
            "Kanpur, Uttar Pradesh",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 900)
                .with("General", HOME_STATE, 800)
                .with("OBC", ALL_INDIA, 1_800)
                .with("SC", ALL_INDIA, 3_200),
            "₹2.1 L/year",
            4.7,
            1_100,
            93.0,
            "₹20.2 LPA",
            &["Computer Science", "Electrical Engineering", "Mechanical Engineering"],
        ),
        record(
            "iit-kharagpur",
            "IIT Kharagpur",
            "Kharagpur, West Bengal",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 1_500)
                .with("General", HOME_STATE, 1_300)
                .with("OBC", ALL_INDIA, 3_000)
                .with("SC", ALL_INDIA, 5_000),
            "₹2.0 L/year",
            4.6,
            1_800,
            91.0,
            "₹18.4 LPA",
            &["Computer Science", "Mining Engineering", "Civil Engineering"],
        ),
        record(
            "iit-roorkee",
            "IIT Roorkee",
            "Roorkee, Uttarakhand",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 2_000)
                .with("General", HOME_STATE, 1_800)
                .with("OBC", ALL_INDIA, 4_000),
            "₹2.0 L/year",
            4.5,
            1_300,
            90.0,
            "₹17.1 LPA",
            &["Computer Science", "Electronics Engineering", "Civil Engineering"],
        ),
        record(
            "nit-trichy",
            "NIT Tiruchirappalli",
            "Tiruchirappalli, Tamil Nadu",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 5_000)
                .with("General", HOME_STATE, 8_000)
                .with("OBC", ALL_INDIA, 9_000)
                .with("SC", ALL_INDIA, 18_000),
            "₹1.5 L/year",
            4.4,
            1_000,
            88.0,
            "₹12.5 LPA",
            &["Computer Science", "Electronics Engineering", "Mechanical Engineering"],
        ),
        record(
            "nit-surathkal",
            "NIT Karnataka",
            "Surathkal, Karnataka",
            Government,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 7_000)
                .with("General", HOME_STATE, 10_000)
                .with("OBC", ALL_INDIA, 12_000),
            "₹1.5 L/year",
            4.3,
            950,
            86.0,
            "₹11.8 LPA",
            &["Computer Science", "Information Technology", "Electrical Engineering"],
        ),
        record(
            "bits-pilani",
            "BITS Pilani",
            "Pilani, Rajasthan",
            Deemed,
            CutoffMatrix::new().with("General", ALL_INDIA, 3_000),
            "₹5.0 L/year",
            4.6,
            900,
            92.0,
            "₹18.0 LPA",
            &["Computer Science", "Electronics Engineering", "Chemical Engineering"],
        ),
        record(
            "vit-vellore",
            "VIT Vellore",
            "Vellore, Tamil Nadu",
            Private,
            CutoffMatrix::new()
                .with("General", ALL_INDIA, 25_000)
                .with("OBC", ALL_INDIA, 32_000),
            "₹1.9 L/year",
            4.1,
            5_500,
            82.0,
            "₹8.2 LPA",
            &["Computer Science", "Information Technology", "Mechanical Engineering"],
        ),
    ]
}

/// Load colleges from a JSON array of college records.
pub fn load_colleges(path: &Path) -> Result<Vec<CollegeRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read colleges file: {}", path.display()))?;
    let colleges: Vec<CollegeRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid colleges JSON in {}", path.display()))?;
    Ok(colleges)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Keep the catalog order.
    #[default]
    Catalog,
    RatingDesc,
    Name,
}

/// Browsing filter over the catalog. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CollegeFilter {
    pub search: Option<String>,
    pub college_type: Option<CollegeType>,
    pub location: Option<String>,
    pub min_rating: Option<f32>,
    pub sort: SortOrder,
}

impl CollegeFilter {
    fn matches(&self, college: &CollegeRecord) -> bool {
        if let Some(search) = self.search.as_deref().map(str::to_lowercase) {
            let hit = college.name.to_lowercase().contains(&search)
                || college.location.to_lowercase().contains(&search)
                || college
                    .branches
                    .iter()
                    .any(|branch| branch.to_lowercase().contains(&search));
            if !hit {
                return false;
            }
        }
        if self.college_type.is_some_and(|t| t != college.college_type) {
            return false;
        }
        if let Some(location) = self.location.as_deref().map(str::to_lowercase) {
            if !college.location.to_lowercase().contains(&location) {
                return false;
            }
        }
        if self.min_rating.is_some_and(|min| college.rating < min) {
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, colleges: &'a [CollegeRecord]) -> Vec<&'a CollegeRecord> {
        let mut matched: Vec<&CollegeRecord> = colleges.iter().filter(|c| self.matches(c)).collect();
        match self.sort {
            SortOrder::Catalog => {}
            SortOrder::RatingDesc => matched.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
            SortOrder::Name => matched.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        matched
    }
}

/// Build predictor records from imported cutoff rows. Rows without a resolved
/// college, branch, or closing rank are skipped; the newest (year, round)
/// wins for each cell.
pub fn from_imported(
    colleges: &[ReferenceEntry],
    branches: &[ReferenceEntry],
    records: &[NormalizedCutoffRecord],
) -> Vec<CollegeRecord> {
    let branch_names: HashMap<&str, &str> = branches
        .iter()
        .map(|b| (b.id.as_str(), b.name.as_str()))
        .collect();

    // college id -> branch name -> (category, quota) -> (year, round, rank)
    let mut cells: HashMap<&str, BTreeMap<&str, BTreeMap<(&str, Quota), (i32, u32, u32)>>> = HashMap::new();

    for rec in records {
        let (Some(college_id), Some(branch_id), Some(closing)) =
            (rec.college_id.as_deref(), rec.branch_id.as_deref(), rec.closing_rank)
        else {
            continue;
        };
        let Some(&branch) = branch_names.get(branch_id) else {
            debug!(branch_id, "imported cutoff references unknown branch");
            continue;
        };

        let key = (normalize_category(&rec.category), Quota::from_domicile(&rec.domicile));
        let slot = cells
            .entry(college_id)
            .or_default()
            .entry(branch)
            .or_default()
            .entry(key)
            .or_insert((rec.year, rec.round, closing));
        if (rec.year, rec.round) > (slot.0, slot.1) {
            *slot = (rec.year, rec.round, closing);
        }
    }

    colleges
        .iter()
        .filter_map(|entry| {
            let by_branch = cells.remove(entry.id.as_str())?;
            let branch_cutoffs: BTreeMap<String, CutoffMatrix> = by_branch
                .into_iter()
                .map(|(branch, entries)| {
                    let mut matrix = CutoffMatrix::new();
                    for ((category, quota), (_, _, rank)) in entries {
                        matrix.insert(category, quota.label(), rank);
                    }
                    (branch.to_string(), matrix)
                })
                .collect();

            Some(CollegeRecord {
                id: entry.id.clone(),
                name: entry.name.clone(),
                location: entry.location.clone().unwrap_or_default(),
                category: "Engineering".to_string(),
                college_type: entry.college_type.unwrap_or(CollegeType::Government),
                cutoffs: CutoffMatrix::new(),
                fees: String::new(),
                rating: 0.0,
                seats: 0,
                placement_rate: 0.0,
                average_package: String::new(),
                branches: branch_cutoffs.keys().cloned().collect(),
                branch_cutoffs,
                facilities: Facilities::default(),
            })
        })
        .collect()
}
