use crate::models::{
    Chance, CollegeRecord, CollegeType, ExamType, PredictionInput, PredictionResult, PredictionTiers,
};
use crate::normalize::{normalize_category, quota_for, Quota};
use tracing::{debug, info};

/// The score curve is defined on a 300-point exam with this many candidates.
const REFERENCE_MAX_SCORE: f64 = 300.0;
const REFERENCE_POOL: f64 = 1_200_000.0;

/// (minimum score, rank multiplier against the gap to the max score).
const SCORE_CURVE: &[(f64, f64)] = &[
    (280.0, 10.0),
    (250.0, 50.0),
    (200.0, 200.0),
    (150.0, 500.0),
    (100.0, 1_500.0),
];
const SCORE_CURVE_FLOOR: f64 = 3_000.0;

/// (userRank / cutoffRank upper bound, base probability). First match wins.
const RATIO_TABLE: &[(f64, f64)] = &[
    (0.70, 95.0),
    (0.85, 85.0),
    (1.00, 70.0),
    (1.10, 50.0),
    (1.30, 30.0),
    (1.50, 15.0),
];
const RATIO_FLOOR: f64 = 5.0;

const GOVERNMENT_FACTOR: f64 = 0.9;
const PRIVATE_FACTOR: f64 = 1.1;
const HOME_STATE_FACTOR: f64 = 1.15;

const MIN_PROBABILITY: f64 = 5.0;
const MAX_PROBABILITY: f64 = 95.0;

const SAFE_LIMIT: usize = 10;
const MODERATE_LIMIT: usize = 10;
const AMBITIOUS_LIMIT: usize = 5;
const AMBITIOUS_MIN_PROBABILITY: u8 = 15;

/// Rank implied by a percentile. Percentiles above 100 count as 100.
pub fn rank_from_percentile(percentile: f64, exam: ExamType) -> u64 {
    let percentile = percentile.min(100.0);
    let rank = ((100.0 - percentile) * exam.candidate_pool() / 100.0).round();
    (rank as u64).max(1)
}

/// Rank implied by a raw score, using a piecewise-linear curve. Scores from
/// other exams are mapped onto the 300-point scale first and the resulting
/// rank is scaled to the exam's candidate pool.
pub fn rank_from_score(score: f64, exam: ExamType) -> u64 {
    let scaled = (score * REFERENCE_MAX_SCORE / exam.max_score()).min(REFERENCE_MAX_SCORE);
    let gap = REFERENCE_MAX_SCORE - scaled;
    let multiplier = SCORE_CURVE
        .iter()
        .find(|(threshold, _)| scaled >= *threshold)
        .map(|(_, multiplier)| *multiplier)
        .unwrap_or(SCORE_CURVE_FLOOR);
    let rank = (gap * multiplier * exam.candidate_pool() / REFERENCE_POOL).round();
    (rank as u64).max(1)
}

/// Estimated rank for the input. Percentile wins over score; zero means the
/// input cannot be predicted.
pub fn estimate_rank(input: &PredictionInput) -> u64 {
    match (input.percentile, input.score) {
        (Some(percentile), _) if percentile > 0.0 => rank_from_percentile(percentile, input.exam),
        (_, Some(score)) if score > 0.0 => rank_from_score(score, input.exam),
        _ => 0,
    }
}

/// Probability (5-95) of admission for a rank against a closing rank, or 0
/// when either rank is missing.
pub fn admission_probability(user_rank: u64, cutoff_rank: u64, college_type: CollegeType, quota: Quota) -> u8 {
    if user_rank == 0 || cutoff_rank == 0 {
        return 0;
    }

    let ratio = user_rank as f64 / cutoff_rank as f64;
    let mut probability = RATIO_TABLE
        .iter()
        .find(|(limit, _)| ratio <= *limit)
        .map(|(_, base)| *base)
        .unwrap_or(RATIO_FLOOR);

    match college_type {
        CollegeType::Government => probability *= GOVERNMENT_FACTOR,
        CollegeType::Private => probability *= PRIVATE_FACTOR,
        CollegeType::Deemed => {}
    }
    if quota == Quota::HomeState {
        probability *= HOME_STATE_FACTOR;
    }

    probability.clamp(MIN_PROBABILITY, MAX_PROBABILITY).round() as u8
}

fn rationale(user_rank: u64, cutoff_rank: u32, category: &str, quota: Quota) -> String {
    let ratio = user_rank as f64 / f64::from(cutoff_rank);
    let standing = if ratio <= 0.70 {
        "is well within"
    } else if ratio <= 1.00 {
        "is within"
    } else if ratio <= 1.30 {
        "is slightly above"
    } else {
        "is well above"
    };
    let mut text = format!(
        "Your estimated rank {user_rank} {standing} the {category} ({quota}) closing rank of {cutoff_rank}."
    );
    if ratio > 1.00 && ratio <= 1.30 {
        text.push_str(" Seats may open up in later counselling rounds.");
    }
    if quota == Quota::HomeState {
        text.push_str(" Home-state quota applies.");
    }
    text
}

pub struct AdmissionAnalyzer<'a> {
    pub colleges: &'a [CollegeRecord],
}

impl<'a> AdmissionAnalyzer<'a> {
    pub fn new(colleges: &'a [CollegeRecord]) -> Self {
        Self { colleges }
    }

    /// Every (college, branch) prediction above the probability floor, sorted by
    /// probability descending. Ties keep college/branch iteration order.
    pub fn predict_all(&self, input: &PredictionInput) -> Vec<PredictionResult> {
        let user_rank = estimate_rank(input);
        if user_rank == 0 {
            debug!("no score or percentile given, nothing to predict");
            return Vec::new();
        }

        let category = normalize_category(&input.category);
        let mut predictions = Vec::new();

        for college in self.colleges {
            let quota = quota_for(&input.home_state, &college.location);

            for branch in &college.branches {
                let Some(cutoff_rank) = college.cutoff_for(branch, category, quota) else {
                    debug!(college = %college.name, branch = %branch, "no cutoff data, skipping");
                    continue;
                };

                let probability =
                    admission_probability(user_rank, u64::from(cutoff_rank), college.college_type, quota);
                if f64::from(probability) <= MIN_PROBABILITY {
                    continue;
                }

                predictions.push(PredictionResult {
                    college_id: college.id.clone(),
                    college_name: college.name.clone(),
                    branch: branch.clone(),
                    location: college.location.clone(),
                    probability,
                    chance: Chance::from_probability(probability),
                    user_rank,
                    cutoff_rank,
                    quota,
                    fees: college.fees.clone(),
                    rating: college.rating,
                    college_type: college.college_type,
                    seats: college.seats,
                    placement_rate: college.placement_rate,
                    average_package: college.average_package.clone(),
                    rationale: rationale(user_rank, cutoff_rank, category, quota),
                });
            }
        }

        // sort_by is stable
        predictions.sort_by(|a, b| b.probability.cmp(&a.probability));
        predictions
    }

    /// Safe / Moderate / Ambitious buckets for the input.
    pub fn analyze(&self, input: &PredictionInput) -> PredictionTiers {
        let estimated_rank = estimate_rank(input);
        let predictions = self.predict_all(input);

        let tiers = PredictionTiers {
            estimated_rank,
            safe: predictions
                .iter()
                .filter(|p| p.chance == Chance::High)
                .take(SAFE_LIMIT)
                .cloned()
                .collect(),
            moderate: predictions
                .iter()
                .filter(|p| p.chance == Chance::Moderate)
                .take(MODERATE_LIMIT)
                .cloned()
                .collect(),
            ambitious: predictions
                .iter()
                .filter(|p| p.chance == Chance::Low && p.probability >= AMBITIOUS_MIN_PROBABILITY)
                .take(AMBITIOUS_LIMIT)
                .cloned()
                .collect(),
        };

        info!(
            exam = %input.exam,
            estimated_rank,
            candidates = predictions.len(),
            safe = tiers.safe.len(),
            moderate = tiers.moderate.len(),
            ambitious = tiers.ambitious.len(),
            "prediction complete"
        );
        tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CutoffMatrix;

    fn college(id: &str, location: &str, college_type: CollegeType, cutoffs: CutoffMatrix, branches: &[&str]) -> CollegeRecord {
        CollegeRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            location: location.to_string(),
            category: "Engineering".to_string(),
            college_type,
            cutoffs,
            fees: "₹1 L/year".to_string(),
            rating: 4.0,
            seats: 100,
            placement_rate: 80.0,
            average_package: "₹8 LPA".to_string(),
            branches: branches.iter().map(|b| b.to_string()).collect(),
            branch_cutoffs: Default::default(),
            facilities: Default::default(),
        }
    }

    fn input_with_rank_percentile(percentile: f64) -> PredictionInput {
        PredictionInput {
            exam: ExamType::JeeMain,
            percentile: Some(percentile),
            category: "general".to_string(),
            home_state: "goa".to_string(),
            ..PredictionInput::default()
        }
    }

    #[test]
    fn percentile_rank() {
        assert_eq!(rank_from_percentile(99.0, ExamType::JeeMain), 12_000);
        assert_eq!(rank_from_percentile(50.0, ExamType::JeeMain), 600_000);
        assert_eq!(rank_from_percentile(99.9, ExamType::JeeAdvanced), 250);
        // 100th percentile still yields a usable rank
        assert_eq!(rank_from_percentile(100.0, ExamType::JeeMain), 1);
    }

    #[test]
    fn score_curve_segments() {
        assert_eq!(rank_from_score(290.0, ExamType::JeeMain), 100);
        assert_eq!(rank_from_score(280.0, ExamType::JeeMain), 200);
        assert_eq!(rank_from_score(260.0, ExamType::JeeMain), 2_000);
        assert_eq!(rank_from_score(200.0, ExamType::JeeMain), 20_000);
        assert_eq!(rank_from_score(150.0, ExamType::JeeMain), 75_000);
        assert_eq!(rank_from_score(100.0, ExamType::JeeMain), 300_000);
        assert_eq!(rank_from_score(50.0, ExamType::JeeMain), 750_000);
        assert_eq!(rank_from_score(300.0, ExamType::JeeMain), 1);
    }

    #[test]
    fn score_is_scaled_for_other_exams() {
        // 690/720 NEET is 287.5 on the reference scale
        let neet = rank_from_score(690.0, ExamType::Neet);
        assert_eq!(neet, (12.5_f64 * 10.0 * 2_000_000.0 / 1_200_000.0).round() as u64);
    }

    #[test]
    fn percentile_takes_precedence_over_score() {
        let input = PredictionInput {
            percentile: Some(99.0),
            score: Some(100.0),
            ..PredictionInput::default()
        };
        assert_eq!(estimate_rank(&input), 12_000);

        let input = PredictionInput {
            percentile: Some(0.0),
            score: Some(200.0),
            ..PredictionInput::default()
        };
        assert_eq!(estimate_rank(&input), 20_000);
    }

    #[test]
    fn missing_inputs_give_zero_rank() {
        assert_eq!(estimate_rank(&PredictionInput::default()), 0);
        let input = PredictionInput {
            score: Some(-4.0),
            ..PredictionInput::default()
        };
        assert_eq!(estimate_rank(&input), 0);
    }

    #[test]
    fn probability_table() {
        let deemed = CollegeType::Deemed;
        let all_india = Quota::AllIndia;
        assert_eq!(admission_probability(70, 100, deemed, all_india), 95);
        assert_eq!(admission_probability(85, 100, deemed, all_india), 85);
        assert_eq!(admission_probability(100, 100, deemed, all_india), 70);
        assert_eq!(admission_probability(110, 100, deemed, all_india), 50);
        assert_eq!(admission_probability(130, 100, deemed, all_india), 30);
        assert_eq!(admission_probability(150, 100, deemed, all_india), 15);
        assert_eq!(admission_probability(151, 100, deemed, all_india), 5);
    }

    #[test]
    fn probability_adjustments() {
        // 70 * 0.9 = 63
        assert_eq!(admission_probability(100, 100, CollegeType::Government, Quota::AllIndia), 63);
        // 70 * 1.1 = 77
        assert_eq!(admission_probability(100, 100, CollegeType::Private, Quota::AllIndia), 77);
        // 70 * 0.9 * 1.15 = 72.45
        assert_eq!(admission_probability(100, 100, CollegeType::Government, Quota::HomeState), 72);
        // 95 * 1.1 clamps to 95
        assert_eq!(admission_probability(1, 100, CollegeType::Private, Quota::HomeState), 95);
        // 5 * 0.9 clamps to 5
        assert_eq!(admission_probability(1_000, 100, CollegeType::Government, Quota::AllIndia), 5);
    }

    #[test]
    fn zero_ranks_give_zero_probability() {
        assert_eq!(admission_probability(0, 100, CollegeType::Deemed, Quota::AllIndia), 0);
        assert_eq!(admission_probability(100, 0, CollegeType::Deemed, Quota::AllIndia), 0);
    }

    #[test]
    fn no_input_no_predictions() {
        let colleges = vec![college(
            "a",
            "Pune",
            CollegeType::Deemed,
            CutoffMatrix::new().with("General", "All India", 1000),
            &["CSE"],
        )];
        let tiers = AdmissionAnalyzer::new(&colleges).analyze(&PredictionInput::default());
        assert!(tiers.is_empty());
        assert_eq!(tiers.estimated_rank, 0);
    }

    #[test]
    fn colleges_without_cutoffs_are_skipped() {
        let colleges = vec![
            college("a", "Pune", CollegeType::Deemed, CutoffMatrix::new(), &["CSE"]),
            college(
                "b",
                "Pune",
                CollegeType::Deemed,
                CutoffMatrix::new().with("General", "All India", 200_000),
                &["CSE", "ME"],
            ),
        ];
        // rank 12,000
        let predictions = AdmissionAnalyzer::new(&colleges).predict_all(&input_with_rank_percentile(99.0));
        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(|p| p.college_id == "b"));
    }

    #[test]
    fn floor_probability_is_excluded() {
        let colleges = vec![college(
            "a",
            "Pune",
            CollegeType::Deemed,
            CutoffMatrix::new().with("General", "All India", 100),
            &["CSE"],
        )];
        let predictions = AdmissionAnalyzer::new(&colleges).predict_all(&input_with_rank_percentile(99.0));
        assert!(predictions.is_empty());
    }

    #[test]
    fn branch_cutoffs_override_college_cutoffs() {
        let mut record = college(
            "a",
            "Pune",
            CollegeType::Deemed,
            CutoffMatrix::new().with("General", "All India", 100_000),
            &["CSE", "ME"],
        );
        record
            .branch_cutoffs
            .insert("CSE".to_string(), CutoffMatrix::new().with("General", "All India", 12_500));
        let colleges = vec![record];

        let predictions = AdmissionAnalyzer::new(&colleges).predict_all(&input_with_rank_percentile(99.0));
        let cse = predictions.iter().find(|p| p.branch == "CSE").expect("cse prediction");
        let me = predictions.iter().find(|p| p.branch == "ME").expect("me prediction");
        assert_eq!(cse.cutoff_rank, 12_500);
        assert_eq!(me.cutoff_rank, 100_000);
        assert!(me.probability > cse.probability);
        assert_eq!(predictions[0].branch, "ME");
    }

    #[test]
    fn ties_keep_iteration_order() {
        let matrix = CutoffMatrix::new().with("General", "All India", 100_000);
        let colleges = vec![
            college("first", "Pune", CollegeType::Deemed, matrix.clone(), &["CSE", "ECE"]),
            college("second", "Pune", CollegeType::Deemed, matrix, &["CSE"]),
        ];
        let predictions = AdmissionAnalyzer::new(&colleges).predict_all(&input_with_rank_percentile(99.0));
        let order: Vec<(&str, &str)> = predictions
            .iter()
            .map(|p| (p.college_id.as_str(), p.branch.as_str()))
            .collect();
        assert_eq!(order, vec![("first", "CSE"), ("first", "ECE"), ("second", "CSE")]);
    }

    #[test]
    fn tier_caps_and_ambitious_floor() {
        let branches: Vec<String> = (0..12).map(|i| format!("B{i}")).collect();
        let branch_refs: Vec<&str> = branches.iter().map(String::as_str).collect();
        let colleges = vec![
            // ratio 0.12 -> 95
            college("safe", "Pune", CollegeType::Deemed, CutoffMatrix::new().with("General", "All India", 100_000), &branch_refs),
            // ratio 1.09 -> 50
            college("mid", "Pune", CollegeType::Deemed, CutoffMatrix::new().with("General", "All India", 11_000), &branch_refs),
            // ratio 1.2 -> 30
            college("stretch", "Pune", CollegeType::Deemed, CutoffMatrix::new().with("General", "All India", 10_000), &branch_refs),
        ];
        let tiers = AdmissionAnalyzer::new(&colleges).analyze(&input_with_rank_percentile(99.0));
        assert_eq!(tiers.safe.len(), 10);
        assert_eq!(tiers.moderate.len(), 10);
        assert_eq!(tiers.ambitious.len(), 5);
        assert!(tiers.ambitious.iter().all(|p| p.probability >= 15));
        assert!(tiers.safe.iter().all(|p| p.chance == Chance::High));
    }

    #[test]
    fn rationale_mentions_quota() {
        let text = rationale(400, 450, "General", Quota::HomeState);
        assert!(text.contains("is within"));
        assert!(text.contains("Home-state quota applies"));
        let text = rationale(500, 450, "OBC", Quota::AllIndia);
        assert!(text.contains("slightly above"));
        assert!(text.contains("later counselling rounds"));
    }
}
