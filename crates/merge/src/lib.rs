//! `sheetmerge-merge`: schema reconciliation and provenance-tagged merging.
//!
//! Pure engine crate: receives decoded tables, returns merged tables and
//! summaries. No file or logging dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod memory;
pub mod model;
pub mod provenance;
pub mod quality;
pub mod schema;
pub mod transform;

pub use config::{ExportConfig, MergeConfig, MergeMode};
pub use engine::MergeEngine;
pub use error::MergeError;
pub use export::{
    export_selection, validate_export, ExportArtifact, ExportSelection, ExportSummary,
    ExportSummaryBuilder, ExportValidation,
};
pub use model::{MergeRequest, MergeResult, MergeSummary, SourceRowCount};
pub use quality::{ColumnProfile, ColumnValidation, DataQualityValidator, QualityReport};
pub use schema::{reconcile, Reconciliation, SchemaDiff};
