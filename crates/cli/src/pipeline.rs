//! Pipeline registry.
//!
//! Each pipeline is a fixed capability the CLI can run against a
//! [`MergeSession`]. The registry is a closed enum: adding a pipeline means
//! adding a variant, not registering a service at runtime.

use serde::Serialize;

use sheetmerge_core::Table;
use sheetmerge_io::{CancellationToken, UploadedFile, XlsxTableWriter};
use sheetmerge_merge::transform::CleanStats;
use sheetmerge_merge::{
    ColumnValidation, ExportArtifact, ExportSummary, ExportValidation, MergeError, MergeMode,
    MergeSummary, QualityReport,
};

use crate::instrument::timed;
use crate::session::{IngestStats, MergeSession, ReadFailure, SessionError};

pub trait Capability {
    /// Stable machine name.
    fn identify(&self) -> &'static str;
    /// One-line description for listings.
    fn describe(&self) -> &'static str;
    fn execute(&self, session: &mut MergeSession, job: &Job) -> Result<JobReport, SessionError>;
}

/// What one run should do.
#[derive(Debug, Clone, Default)]
pub struct Job {
    pub files: Vec<UploadedFile>,
    pub mode: MergeMode,
    pub select: Vec<String>,
    pub require: Vec<String>,
    pub dedupe: bool,
    pub clean: bool,
    pub compact: bool,
    pub profile: bool,
    /// Encode the selection as xlsx.
    pub write_xlsx: bool,
    pub file_stem: Option<String>,
    /// Keep the selected table on the report for the caller to print.
    pub emit_table: bool,
    pub fail_on_read_error: bool,
    pub cancel: CancellationToken,
}

#[derive(Debug, Serialize)]
pub struct JobReport {
    pub pipeline: &'static str,
    #[serde(flatten)]
    pub merge: MergeSummary,
    pub ingest: IngestStats,
    pub failures: Vec<ReadFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleanStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compacted_bytes: Option<usize>,
    pub export: ExportSummary,
    pub export_validation: ExportValidation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<ColumnValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
    /// Path the artifact was written to, filled in by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip)]
    pub artifact: Option<ExportArtifact>,
    #[serde(skip)]
    pub table: Option<Table>,
}

// ============================================================================
// merge
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MergePipeline;

impl Capability for MergePipeline {
    fn identify(&self) -> &'static str {
        "merge"
    }

    fn describe(&self) -> &'static str {
        "Read files, reconcile their schemas and stack the rows with a source column"
    }

    fn execute(&self, session: &mut MergeSession, job: &Job) -> Result<JobReport, SessionError> {
        let ingest =
            timed("ingest", || Ok::<_, SessionError>(session.ingest(&job.files, &job.cancel)))?;
        if job.fail_on_read_error {
            session.ensure_all_read()?;
        }

        let merged = timed("merge", || session.merge(job.mode).map(|_| ()));
        if let Err(SessionError::Merge(MergeError::SchemaMismatch { .. })) = &merged {
            let shared = session.common_columns();
            tracing::info!(?shared, "columns spelled alike in every source");
        }
        merged?;

        let duplicates_removed = if job.dedupe {
            Some(timed("deduplicate", || session.deduplicate())?)
        } else {
            None
        };
        let cleaning = if job.clean {
            Some(timed("clean", || session.clean())?)
        } else {
            None
        };
        let compacted_bytes = if job.compact {
            Some(timed("compact", || session.compact())?)
        } else {
            None
        };

        timed("select", || session.select_columns(job.select.clone()))?;

        let required = if job.require.is_empty() {
            None
        } else {
            Some(session.require(&job.require)?)
        };
        let quality = if job.profile {
            Some(timed("profile", || session.quality())?)
        } else {
            None
        };

        let export = session.export_summary()?;
        let export_validation = session.validate_export()?;
        for warning in &export_validation.warnings {
            tracing::warn!("{warning}");
        }

        let artifact = if job.write_xlsx {
            Some(timed("export", || {
                session.export(&XlsxTableWriter::new(), job.file_stem.as_deref())
            })?)
        } else {
            None
        };
        let table = if job.emit_table {
            Some(session.selected_table()?)
        } else {
            None
        };

        Ok(JobReport {
            pipeline: self.identify(),
            merge: session.merged()?.summary(),
            ingest,
            failures: session.failures(),
            duplicates_removed,
            cleaning,
            compacted_bytes,
            export,
            export_validation,
            required,
            quality,
            output: None,
            artifact,
            table,
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub enum Pipeline {
    Merge(MergePipeline),
}

impl Pipeline {
    pub fn all() -> Vec<Pipeline> {
        vec![Pipeline::Merge(MergePipeline)]
    }

    pub fn find(name: &str) -> Option<Pipeline> {
        Self::all().into_iter().find(|p| p.identify() == name)
    }
}

impl Capability for Pipeline {
    fn identify(&self) -> &'static str {
        match self {
            Pipeline::Merge(p) => p.identify(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Pipeline::Merge(p) => p.describe(),
        }
    }

    fn execute(&self, session: &mut MergeSession, job: &Job) -> Result<JobReport, SessionError> {
        match self {
            Pipeline::Merge(p) => p.execute(session, job),
        }
    }
}
