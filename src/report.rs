use anyhow::{Context, Result};
use csv::Writer;
use std::fs;
use std::path::{Path, PathBuf};

use crate::import::reconcile::Reconciliation;
use crate::models::{CollegeRecord, PredictionInput, PredictionResult, PredictionTiers};

/// Write every tiered prediction to `predictions.csv` in the output directory.
pub fn write_predictions_csv(tiers: &PredictionTiers, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    let csv_path = output_dir.join("predictions.csv");
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record([
        "Tier",
        "College",
        "Branch",
        "Location",
        "Type",
        "Quota",
        "Probability",
        "Chance",
        "Estimated Rank",
        "Closing Rank",
        "Fees",
        "Rating",
        "Seats",
        "Placement Rate",
        "Average Package",
        "Rationale",
    ])?;

    let tiers_in_order: [(&str, &[PredictionResult]); 3] = [
        ("Safe", &tiers.safe),
        ("Moderate", &tiers.moderate),
        ("Ambitious", &tiers.ambitious),
    ];
    for (tier, results) in tiers_in_order {
        for result in results {
            writer.write_record([
                tier.to_string(),
                result.college_name.clone(),
                result.branch.clone(),
                result.location.clone(),
                result.college_type.to_string(),
                result.quota.label().to_string(),
                result.probability.to_string(),
                result.chance.to_string(),
                result.user_rank.to_string(),
                result.cutoff_rank.to_string(),
                result.fees.clone(),
                format!("{:.1}", result.rating),
                result.seats.to_string(),
                format!("{:.1}", result.placement_rate),
                result.average_package.clone(),
                result.rationale.clone(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(csv_path)
}

fn print_tier(title: &str, results: &[PredictionResult]) {
    println!("{} ({})", title, results.len());
    if results.is_empty() {
        println!("   (none)");
    }
    for result in results {
        println!(
            "   {:>3}%  {} - {} [{}, {}]",
            result.probability, result.college_name, result.branch, result.college_type, result.quota
        );
        println!("         {}", result.rationale);
    }
    println!();
}

pub fn print_prediction_summary(input: &PredictionInput, tiers: &PredictionTiers) {
    println!("\n📊 PREDICTIONS ({})", input.exam);
    println!("==========\n");

    if tiers.estimated_rank == 0 {
        println!("❌ Enter a score or a percentile to see predictions.");
        return;
    }
    println!("🎯 Estimated rank: {}\n", tiers.estimated_rank);

    if tiers.is_empty() {
        println!("No colleges match this rank with the available cutoff data.");
        return;
    }

    print_tier("✅ Safe", &tiers.safe);
    print_tier("🟡 Moderate", &tiers.moderate);
    print_tier("🚀 Ambitious", &tiers.ambitious);
}

pub fn print_reconciliation(result: &Reconciliation) {
    println!("\n📋 Import preview: {} records", result.records.len());
    if !result.is_final {
        println!("⏳ Reference tables not loaded yet, identifiers are provisional");
    }

    let unmatched = result.unmatched_rows();
    if unmatched.is_empty() {
        println!("   ✅ All college and branch names resolved");
    } else {
        println!(
            "   ⚠️  {} rows have unresolved names and will be inserted with empty ids",
            unmatched.len()
        );
    }
    for warning in &result.warnings {
        println!("   - {warning}");
    }
}

pub fn print_colleges(colleges: &[&CollegeRecord]) {
    println!("\n🏫 {} colleges", colleges.len());
    for college in colleges {
        println!(
            "   {} ({}) - {} | rating {:.1} | fees {} | {} seats",
            college.name, college.college_type, college.location, college.rating, college.fees, college.seats
        );
        if !college.branches.is_empty() {
            println!("      branches: {}", college.branches.join(", "));
        }
        let facilities = college.facilities.available();
        if !facilities.is_empty() {
            println!("      facilities: {}", facilities.join(", "));
        }
    }
}
