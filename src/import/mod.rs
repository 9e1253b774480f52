//! Bulk import of historical exam cutoffs from free-form tabular input.
//!
//! Flow: parse text -> guess a column mapping -> let the operator adjust it ->
//! resolve college/branch names to ids -> insert the batch.

pub mod mapping;
pub mod parse;
pub mod reconcile;
pub mod reference;
pub mod session;

pub use mapping::{CanonicalField, ColumnMapping};
pub use parse::{InputFormat, ParsedTable, RawCutoffRow};
pub use reconcile::{ImportWarning, NormalizedCutoffRecord, Reconciliation, ReconcileOptions};
pub use reference::{ReferenceEntry, ReferenceMaps, ReferenceState};
pub use session::{ImportSession, ImportStage};
