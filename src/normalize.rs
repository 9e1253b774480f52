//! Vocabulary normalization between form inputs and stored cutoff tables.
//!
//! Input widgets use slugs like `obc-ncl` or `tamil-nadu`, cutoff tables use
//! labels like `OBC` and `Home State`. Everything here is a fixed lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const GENERAL: &str = "General";

/// Reservation category synonyms. Some categories are deliberately folded into
/// General for cutoff purposes.
const CATEGORY_SYNONYMS: &[(&str, &str)] = &[
    ("general", GENERAL),
    ("gen", GENERAL),
    ("open", GENERAL),
    ("ews", GENERAL),
    ("tuition-fee-waiver", GENERAL),
    ("tfw", GENERAL),
    ("obc", "OBC"),
    ("obc-ncl", "OBC"),
    ("obc-a", "OBC"),
    ("obc-b", "OBC"),
    ("sc", "SC"),
    ("st", "ST"),
];

/// Home state -> city substrings expected in a college's location.
const STATE_CITIES: &[(&str, &[&str])] = &[
    ("delhi", &["New Delhi"]),
    ("maharashtra", &["Mumbai", "Pune", "Nagpur"]),
    ("tamil-nadu", &["Chennai", "Tiruchirappalli", "Vellore", "Coimbatore"]),
    ("karnataka", &["Bangalore", "Bengaluru", "Surathkal", "Manipal"]),
    ("west-bengal", &["Kharagpur", "Kolkata", "Durgapur"]),
    ("uttar-pradesh", &["Kanpur", "Varanasi", "Prayagraj", "Allahabad"]),
    ("uttarakhand", &["Roorkee", "Dehradun"]),
    ("rajasthan", &["Pilani", "Jaipur", "Jodhpur"]),
    ("telangana", &["Hyderabad", "Warangal"]),
    ("assam", &["Guwahati", "Silchar"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quota {
    #[serde(rename = "All India")]
    AllIndia,
    #[serde(rename = "Home State")]
    HomeState,
}

impl Quota {
    pub fn label(self) -> &'static str {
        match self {
            Quota::AllIndia => "All India",
            Quota::HomeState => "Home State",
        }
    }

    /// Quota implied by a stored domicile value such as "Home" or "Other State".
    pub fn from_domicile(domicile: &str) -> Self {
        if domicile.to_lowercase().contains("home") {
            Quota::HomeState
        } else {
            Quota::AllIndia
        }
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn slug(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Map a free-form category onto the cutoff-table label. Unknown input is
/// treated as General.
pub fn normalize_category(raw: &str) -> &'static str {
    let key = slug(raw);
    CATEGORY_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, label)| *label)
        .unwrap_or(GENERAL)
}

/// City substrings for a home state, empty when the state is not in the table.
pub fn state_cities(home_state: &str) -> &'static [&'static str] {
    let key = slug(home_state);
    STATE_CITIES
        .iter()
        .find(|(state, _)| *state == key)
        .map(|(_, cities)| *cities)
        .unwrap_or(&[])
}

/// Home State when one of the state's cities appears in the college location,
/// otherwise All India. States missing from the table always get All India.
pub fn quota_for(home_state: &str, college_location: &str) -> Quota {
    let location = college_location.to_lowercase();
    let is_home = state_cities(home_state)
        .iter()
        .any(|city| location.contains(&city.to_lowercase()));
    if is_home {
        Quota::HomeState
    } else {
        Quota::AllIndia
    }
}
