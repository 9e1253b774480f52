use serde_json::Value;
use tracing::{info, warn};

use super::mapping::{CanonicalField, ColumnMapping};
use super::parse::{parse_delimited, parse_json, InputFormat, ParsedTable};
use super::reconcile::{reconcile, Reconciliation, ReconcileOptions};
use super::reference::{ReferenceMaps, ReferenceState};
use crate::datastore::Datastore;
use crate::error::{DatastoreError, ImportError};
use crate::scraper::extract_html_table;

pub const CUTOFFS_TABLE: &str = "wbjee_cutoffs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Idle,
    Parsed,
    Mapped,
    Validated,
    Submitted,
}

/// One bulk cutoff import: parse, map, validate, submit.
#[derive(Debug, Clone)]
pub struct ImportSession {
    stage: ImportStage,
    table: Option<ParsedTable>,
    mapping: ColumnMapping,
    references: ReferenceState,
    options: ReconcileOptions,
}

impl ImportSession {
    pub fn new(references: ReferenceState) -> Self {
        Self::with_options(references, ReconcileOptions::default())
    }

    pub fn with_options(references: ReferenceState, options: ReconcileOptions) -> Self {
        Self {
            stage: ImportStage::Idle,
            table: None,
            mapping: ColumnMapping::default(),
            references,
            options,
        }
    }

    pub fn stage(&self) -> ImportStage {
        self.stage
    }

    pub fn table(&self) -> Option<&ParsedTable> {
        self.table.as_ref()
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn references(&self) -> &ReferenceState {
        &self.references
    }

    /// Replace the reference state, e.g. once the tables finish loading.
    pub fn set_references(&mut self, references: ReferenceState) {
        self.references = references;
    }

    /// Parse input text and seed the mapping with a guess.
    pub fn load_text(&mut self, text: &str, format: InputFormat) -> Result<&ParsedTable, ImportError> {
        let table = match format {
            InputFormat::Delimited => parse_delimited(text)?,
            InputFormat::Json => parse_json(text)?,
            InputFormat::Html => extract_html_table(text).map_err(|e| ImportError::Parse(e.to_string()))?,
        };
        self.load_table(table, None);
        self.table.as_ref().ok_or(ImportError::NothingParsed)
    }

    /// Use an already-shaped table. Without a mapping the headers are guessed.
    pub fn load_table(&mut self, table: ParsedTable, mapping: Option<ColumnMapping>) {
        info!(headers = table.headers.len(), rows = table.rows.len(), "import input parsed");
        match mapping {
            Some(mapping) => {
                self.mapping = mapping;
                self.stage = ImportStage::Mapped;
            }
            None => {
                self.mapping = ColumnMapping::guess(&table.headers);
                self.stage = ImportStage::Parsed;
            }
        }
        self.table = Some(table);
    }

    /// Point a field at a different source header.
    pub fn set_mapping(&mut self, field: CanonicalField, header: &str) -> Result<(), ImportError> {
        let table = self.table.as_ref().ok_or(ImportError::NothingParsed)?;
        if !table.has_header(header) {
            return Err(ImportError::UnknownHeader(header.to_string()));
        }
        self.mapping.set(field, header);
        self.stage = ImportStage::Mapped;
        Ok(())
    }

    pub fn clear_mapping(&mut self, field: CanonicalField) {
        self.mapping.clear(field);
    }

    /// Reconcile the parsed rows. While references are pending the result is
    /// a draft (`is_final == false`) computed against empty maps.
    pub fn validate(&mut self) -> Result<Reconciliation, ImportError> {
        let table = self.table.as_ref().ok_or(ImportError::NothingParsed)?;

        let pending = ReferenceMaps::default();
        let (refs, is_final) = match &self.references {
            ReferenceState::Loaded(maps) => (maps, true),
            ReferenceState::Pending => (&pending, false),
            ReferenceState::Failed(msg) => return Err(ImportError::ReferencesFailed(msg.clone())),
        };

        let mut result = reconcile(&table.rows, &self.mapping, refs, self.options);
        result.is_final = is_final;

        if is_final {
            self.stage = ImportStage::Validated;
        }
        for warning in &result.warnings {
            warn!(%warning, "import row needs attention");
        }
        Ok(result)
    }

    /// Insert the reconciled batch in one call and return the inserted count.
    pub async fn submit<D: Datastore>(&mut self, store: &D) -> Result<usize, ImportError> {
        match &self.references {
            ReferenceState::Loaded(_) => {}
            ReferenceState::Pending => return Err(ImportError::ReferencesPending),
            ReferenceState::Failed(msg) => return Err(ImportError::ReferencesFailed(msg.clone())),
        }

        let result = self.validate()?;
        if result.records.is_empty() {
            return Err(ImportError::EmptyBatch);
        }

        let rows: Vec<Value> = result
            .records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?;
        let inserted = store.insert_batch(CUTOFFS_TABLE, &rows).await?;
        if inserted == 0 {
            return Err(DatastoreError::Rejected("insert reported zero rows".to_string()).into());
        }

        info!(inserted, unmatched = result.unmatched_rows().len(), "cutoff batch imported");
        self.stage = ImportStage::Submitted;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryDatastore;
    use crate::import::reference::ReferenceEntry;

    const TEXT: &str = "Institute\tProgram\tCategory\tClosing Rank\tDomicile\nX University\tCSE\tGEN\t1500\tHome\n";

    fn loaded() -> ReferenceState {
        let entry = |id: &str, name: &str| ReferenceEntry {
            id: id.to_string(),
            name: name.to_string(),
            location: None,
            college_type: None,
        };
        ReferenceState::Loaded(ReferenceMaps::from_entries(
            &[entry("id-123", "x university")],
            &[entry("br-1", "cse")],
        ))
    }

    fn session(references: ReferenceState) -> ImportSession {
        ImportSession::with_options(references, ReconcileOptions { default_year: 2025 })
    }

    #[test]
    fn walks_through_stages() {
        let mut session = session(loaded());
        assert_eq!(session.stage(), ImportStage::Idle);

        session.load_text(TEXT, InputFormat::Delimited).expect("parse");
        assert_eq!(session.stage(), ImportStage::Parsed);
        assert_eq!(session.mapping().header_for(CanonicalField::CollegeId), None);

        session.set_mapping(CanonicalField::CollegeId, "Institute").expect("map college");
        session.set_mapping(CanonicalField::BranchId, "Program").expect("map branch");
        assert_eq!(session.stage(), ImportStage::Mapped);

        let result = session.validate().expect("validate");
        assert!(result.is_final);
        assert_eq!(session.stage(), ImportStage::Validated);
        assert_eq!(result.records[0].college_id.as_deref(), Some("id-123"));
        assert_eq!(result.records[0].branch_id.as_deref(), Some("br-1"));
    }

    #[test]
    fn mapping_to_missing_header_is_rejected() {
        let mut session = session(loaded());
        assert!(matches!(
            session.set_mapping(CanonicalField::CollegeId, "Institute"),
            Err(ImportError::NothingParsed)
        ));
        session.load_text(TEXT, InputFormat::Delimited).expect("parse");
        assert!(matches!(
            session.set_mapping(CanonicalField::CollegeId, "Name"),
            Err(ImportError::UnknownHeader(_))
        ));
    }

    #[test]
    fn pending_references_give_draft_results() {
        let mut session = session(ReferenceState::Pending);
        session.load_text(TEXT, InputFormat::Delimited).expect("parse");
        session.set_mapping(CanonicalField::CollegeId, "Institute").expect("map");

        let draft = session.validate().expect("validate");
        assert!(!draft.is_final);
        assert_eq!(draft.records[0].college_id, None);
        assert_eq!(session.stage(), ImportStage::Mapped);

        session.set_references(loaded());
        let result = session.validate().expect("validate");
        assert!(result.is_final);
        assert_eq!(result.records[0].college_id.as_deref(), Some("id-123"));
    }

    #[test]
    fn failed_references_block_validation() {
        let mut session = session(ReferenceState::Failed("timeout".to_string()));
        session.load_text(TEXT, InputFormat::Delimited).expect("parse");
        assert!(matches!(session.validate(), Err(ImportError::ReferencesFailed(_))));
    }

    #[tokio::test]
    async fn submits_batch_to_store() {
        let store = MemoryDatastore::new();
        let mut session = session(loaded());
        session.load_text(TEXT, InputFormat::Delimited).expect("parse");
        session.set_mapping(CanonicalField::CollegeId, "Institute").expect("map");

        let inserted = session.submit(&store).await.expect("submit");
        assert_eq!(inserted, 1);
        assert_eq!(session.stage(), ImportStage::Submitted);

        let rows = store.rows(CUTOFFS_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["college_id"], "id-123");
        assert_eq!(rows[0]["closing_rank"], 1500);
        assert_eq!(rows[0]["year"], 2025);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_insert() {
        let store = MemoryDatastore::new();
        let mut session = session(loaded());
        session.load_text("Institute,Closing Rank\n,\n", InputFormat::Delimited).expect("parse");
        assert!(matches!(session.submit(&store).await, Err(ImportError::EmptyBatch)));
        assert!(store.rows(CUTOFFS_TABLE).is_empty());
    }

    #[tokio::test]
    async fn pending_references_block_submit() {
        let store = MemoryDatastore::new();
        let mut session = session(ReferenceState::Pending);
        session.load_text(TEXT, InputFormat::Delimited).expect("parse");
        assert!(matches!(session.submit(&store).await, Err(ImportError::ReferencesPending)));
    }

    #[tokio::test]
    async fn store_failure_aborts_batch() {
        let store = MemoryDatastore::new().failing("permission denied for table wbjee_cutoffs");
        let mut session = session(loaded());
        session.load_text(TEXT, InputFormat::Delimited).expect("parse");
        let err = session.submit(&store).await.expect_err("should fail");
        assert!(matches!(err, ImportError::Datastore(_)));
        assert_ne!(session.stage(), ImportStage::Submitted);
    }
}
