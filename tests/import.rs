use college_predictor::analyzer::AdmissionAnalyzer;
use college_predictor::catalog::from_imported;
use college_predictor::datastore::{select_typed, MemoryDatastore};
use college_predictor::error::ImportError;
use college_predictor::import::reference::{load_reference_maps, BRANCHES_TABLE, COLLEGES_TABLE};
use college_predictor::import::session::CUTOFFS_TABLE;
use college_predictor::import::{
    CanonicalField, ImportSession, ImportStage, ImportWarning, InputFormat, NormalizedCutoffRecord,
    ReconcileOptions, ReferenceEntry, ReferenceState,
};
use college_predictor::models::{ExamType, PredictionInput};
use college_predictor::normalize::Quota;
use serde_json::json;

const CUTOFF_CSV: &str = "\
College Name,Branch Name,Category,Opening Rank,Closing Rank,Quota,Round,Year
Jadavpur University,Computer Science,GEN,10,1200,Home State,1,2024
Jadavpur University,Computer Science,GEN,12,1500,Home State,2,2024
Jadavpur University,Computer Science,OBC-A,300,4200,Home State,1,2024
Nowhere Institute,Computer Science,GEN,1,900,Home State,1,2024
,,,,,,,
";

fn reference_store() -> MemoryDatastore {
    MemoryDatastore::new()
        .with_table(
            COLLEGES_TABLE,
            vec![json!({"id": 7, "name": "Jadavpur University", "location": "Kolkata, West Bengal", "type": "government"})],
        )
        .with_table(BRANCHES_TABLE, vec![json!({"id": "b-cse", "name": "computer science"})])
}

fn options() -> ReconcileOptions {
    ReconcileOptions { default_year: 2025 }
}

#[tokio::test]
async fn csv_import_feeds_the_predictor() {
    let store = reference_store();
    let references = load_reference_maps(&store).await;
    assert!(references.is_loaded());

    let mut session = ImportSession::with_options(references, options());
    let table = session.load_text(CUTOFF_CSV, InputFormat::Delimited).expect("parse csv");
    assert_eq!(table.headers.len(), 8);
    assert_eq!(session.mapping().header_for(CanonicalField::CollegeId), Some("College Name"));
    assert_eq!(session.mapping().header_for(CanonicalField::BranchId), Some("Branch Name"));
    assert_eq!(session.mapping().unmapped(), vec![CanonicalField::Domicile]);

    // domicile comes from the quota column
    session.set_mapping(CanonicalField::Domicile, "Quota").expect("map domicile");

    let preview = session.validate().expect("validate");
    assert!(preview.is_final);
    assert_eq!(preview.records.len(), 4);
    assert_eq!(
        preview.warnings,
        vec![ImportWarning::UnmatchedCollege {
            row: 4,
            name: "Nowhere Institute".to_string(),
        }]
    );
    assert_eq!(preview.records[0].college_id.as_deref(), Some("7"));
    assert_eq!(preview.records[0].branch_id.as_deref(), Some("b-cse"));
    assert_eq!(preview.records[3].college_id, None);

    let inserted = session.submit(&store).await.expect("submit");
    assert_eq!(inserted, 4);
    assert_eq!(session.stage(), ImportStage::Submitted);

    let stored: Vec<NormalizedCutoffRecord> = select_typed(&store, CUTOFFS_TABLE).await.expect("stored rows");
    assert_eq!(stored, preview.records);

    let colleges: Vec<ReferenceEntry> = select_typed(&store, COLLEGES_TABLE).await.expect("colleges");
    let branches: Vec<ReferenceEntry> = select_typed(&store, BRANCHES_TABLE).await.expect("branches");
    let catalog = from_imported(&colleges, &branches, &stored);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].branches, vec!["computer science"]);

    // WBJEE 99th percentile is rank 1,200; round 2 closed at 1,500
    let input = PredictionInput::from_form(ExamType::Wbjee, "", "99", "gen", "west-bengal");
    let predictions = AdmissionAnalyzer::new(&catalog).predict_all(&input);
    assert_eq!(predictions.len(), 1);
    let jadavpur = &predictions[0];
    assert_eq!(jadavpur.user_rank, 1_200);
    assert_eq!(jadavpur.cutoff_rank, 1_500);
    assert_eq!(jadavpur.quota, Quota::HomeState);
    assert_eq!(jadavpur.probability, 88);
}

#[tokio::test]
async fn pending_references_give_a_draft_and_block_submit() {
    let store = MemoryDatastore::new();
    let mut session = ImportSession::with_options(ReferenceState::Pending, options());
    session.load_text(CUTOFF_CSV, InputFormat::Delimited).expect("parse csv");

    let draft = session.validate().expect("draft");
    assert!(!draft.is_final);
    assert!(draft.records.iter().all(|r| r.college_id.is_none()));
    assert_eq!(session.stage(), ImportStage::Parsed);

    let err = session.submit(&store).await.expect_err("pending references");
    assert!(matches!(err, ImportError::ReferencesPending));
    assert!(store.rows(CUTOFFS_TABLE).is_empty());

    // once the tables arrive the same session can finish
    session.set_references(load_reference_maps(&reference_store()).await);
    assert_eq!(session.submit(&store).await.expect("submit"), 4);
}

#[tokio::test]
async fn unreachable_reference_tables_fail_the_import() {
    let store = MemoryDatastore::new().failing("connection refused");
    let references = load_reference_maps(&store).await;
    assert!(matches!(references, ReferenceState::Failed(_)));

    let mut session = ImportSession::with_options(references, options());
    session.load_text(CUTOFF_CSV, InputFormat::Delimited).expect("parse csv");
    assert!(matches!(session.validate(), Err(ImportError::ReferencesFailed(_))));
}

#[tokio::test]
async fn json_import_uses_guessed_headers() {
    let store = reference_store();
    let references = load_reference_maps(&store).await;
    let text = r#"[
        {"college": "Jadavpur University", "branch": "Computer Science", "closing_rank": "1,800", "domicile": "Other"}
    ]"#;

    let mut session = ImportSession::with_options(references, options());
    session.load_text(text, InputFormat::Json).expect("parse json");
    let result = session.validate().expect("validate");

    let record = &result.records[0];
    assert_eq!(record.closing_rank, Some(1_800));
    assert_eq!(record.category, "General");
    assert_eq!(record.quota, "All India");
    assert_eq!(record.domicile, "Other");
    assert_eq!(record.round, 1);
    assert_eq!(record.year, 2025);
    assert!(result.warnings.is_empty());

    // the grouped rank reaches the predictor intact
    let colleges: Vec<ReferenceEntry> = select_typed(&store, COLLEGES_TABLE).await.expect("colleges");
    let branches: Vec<ReferenceEntry> = select_typed(&store, BRANCHES_TABLE).await.expect("branches");
    let catalog = from_imported(&colleges, &branches, &result.records);
    let input = PredictionInput::from_form(ExamType::Wbjee, "", "99", "general", "delhi");
    let predictions = AdmissionAnalyzer::new(&catalog).predict_all(&input);
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].cutoff_rank, 1_800);
    assert_eq!(predictions[0].quota, Quota::AllIndia);
    assert!(predictions[0].probability >= 85);
}
