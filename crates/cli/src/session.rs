//! Merge session: the state one `smerge` invocation works on.
//!
//! A session owns its collaborators (batch reader, engine, validator,
//! summary builder) and the data flowing between steps: ingested sources,
//! read failures, the merged result and the current column selection.

use serde::Serialize;
use thiserror::Error;

use sheetmerge_config::Settings;
use sheetmerge_core::{Table, TableWriter};
use sheetmerge_io::{BatchReader, CancellationToken, ReadError, TableReader, UploadedFile};
use sheetmerge_merge::export::{export_selection, validate_export, ExportSelection};
use sheetmerge_merge::provenance::source_label;
use sheetmerge_merge::transform::{self, CleanStats};
use sheetmerge_merge::{
    memory, ColumnValidation, DataQualityValidator, ExportArtifact, ExportConfig, ExportSummary,
    ExportSummaryBuilder, ExportValidation, MergeEngine, MergeError, MergeMode, MergeRequest,
    MergeResult, QualityReport,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("no table could be read ({failed} file(s) failed)")]
    NoSources { failed: usize },
    #[error("no merged table yet")]
    NotMerged,
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// One table taken into the session, with the label its rows will carry.
#[derive(Debug, Clone)]
pub struct Source {
    pub label: String,
    pub file_name: String,
    pub sheet_name: Option<String>,
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadFailure {
    pub file_name: String,
    pub error: String,
}

impl From<&ReadError> for ReadFailure {
    fn from(err: &ReadError) -> Self {
        Self { file_name: err.file_name().to_string(), error: err.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub files: usize,
    pub tables: usize,
    pub failed: usize,
}

pub struct MergeSession {
    batch: BatchReader,
    engine: MergeEngine,
    validator: DataQualityValidator,
    summaries: ExportSummaryBuilder,
    export_config: ExportConfig,
    sources: Vec<Source>,
    failures: Vec<ReadError>,
    merged: Option<MergeResult>,
    selected: Vec<String>,
}

impl MergeSession {
    pub fn new(
        batch: BatchReader,
        engine: MergeEngine,
        validator: DataQualityValidator,
        summaries: ExportSummaryBuilder,
        export_config: ExportConfig,
    ) -> Self {
        Self {
            batch,
            engine,
            validator,
            summaries,
            export_config,
            sources: Vec::new(),
            failures: Vec::new(),
            merged: None,
            selected: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            BatchReader::new(TableReader::new(settings.reader.clone()), settings.workers),
            MergeEngine::new(settings.merge.clone()),
            DataQualityValidator,
            ExportSummaryBuilder,
            settings.export.clone(),
        )
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn failures(&self) -> Vec<ReadFailure> {
        self.failures.iter().map(ReadFailure::from).collect()
    }

    pub fn merged(&self) -> Result<&MergeResult, SessionError> {
        self.merged.as_ref().ok_or(SessionError::NotMerged)
    }

    fn merged_mut(&mut self) -> Result<&mut MergeResult, SessionError> {
        self.merged.as_mut().ok_or(SessionError::NotMerged)
    }

    /// Read `files` into the session. Replaces any earlier ingestion, so a
    /// retried upload is never counted twice.
    pub fn ingest(&mut self, files: &[UploadedFile], cancel: &CancellationToken) -> IngestStats {
        self.sources.clear();
        self.failures.clear();
        self.merged = None;
        self.selected.clear();

        for outcome in self.batch.read_all(files, cancel) {
            match outcome.result {
                Ok(sheets) => {
                    let count = sheets.len();
                    for sheet in sheets {
                        self.sources.push(Source {
                            label: source_label(&outcome.file_name, sheet.ordinal, count),
                            file_name: outcome.file_name.clone(),
                            sheet_name: sheet.sheet_name,
                            table: sheet.table,
                        });
                    }
                }
                Err(e) => self.failures.push(e),
            }
        }

        IngestStats { files: files.len(), tables: self.sources.len(), failed: self.failures.len() }
    }

    /// Fail with the first read error, if any file failed.
    pub fn ensure_all_read(&self) -> Result<(), SessionError> {
        match self.failures.first() {
            Some(e) => Err(SessionError::Read(e.clone())),
            None => Ok(()),
        }
    }

    /// Column names every ingested table has, spelled exactly alike.
    pub fn common_columns(&self) -> Vec<String> {
        let tables: Vec<&Table> = self.sources.iter().map(|s| &s.table).collect();
        transform::common_columns(&tables)
    }

    pub fn merge(&mut self, mode: MergeMode) -> Result<&MergeResult, SessionError> {
        if self.sources.is_empty() {
            return Err(SessionError::NoSources { failed: self.failures.len() });
        }
        let request = MergeRequest::new(
            self.sources.iter().map(|s| s.table.clone()).collect(),
            self.sources.iter().map(|s| s.label.clone()).collect(),
            mode,
        );
        let result = self.engine.merge(&request)?;
        self.selected.clear();
        Ok(&*self.merged.insert(result))
    }

    /// Drop duplicate rows; returns how many were removed.
    pub fn deduplicate(&mut self) -> Result<usize, SessionError> {
        let merged = self.merged_mut()?;
        let before = merged.table.row_count();
        let deduplicated = transform::deduplicate(&merged.table);
        merged.replace_table(deduplicated);
        Ok(before - merged.table.row_count())
    }

    /// Drop rows with no data and trim text cells. The provenance column is
    /// not data, so it neither keeps a row alive nor gets trimmed.
    pub fn clean(&mut self) -> Result<CleanStats, SessionError> {
        let merged = self.merged_mut()?;
        let exclude = [merged.source_column.as_str()];
        let (cleaned, stats) =
            transform::clean(&merged.table, &exclude).map_err(MergeError::from)?;
        merged.replace_table(cleaned);
        Ok(stats)
    }

    /// Store low-cardinality text columns as categorical; returns bytes saved.
    pub fn compact(&mut self) -> Result<usize, SessionError> {
        let merged = self.merged_mut()?;
        let before = merged.table.estimated_size();
        merged.table = memory::compact(&merged.table).map_err(MergeError::from)?;
        let processing_bytes =
            memory::processing_estimate(&merged.table, memory::PROCESSING_FACTOR);
        tracing::debug!(processing_bytes, "compacted merged table");
        Ok(before.saturating_sub(merged.table.estimated_size()))
    }

    /// Choose the exported columns, in order. Empty means every column.
    pub fn select_columns(&mut self, columns: Vec<String>) -> Result<(), SessionError> {
        let missing = self.merged()?.table.missing_columns(&columns);
        if !missing.is_empty() {
            return Err(MergeError::UnknownColumn { columns: missing }.into());
        }
        self.selected = columns;
        Ok(())
    }

    pub fn selected_columns(&self) -> &[String] {
        &self.selected
    }

    /// The merged table restricted to the selection.
    pub fn selected_table(&self) -> Result<Table, SessionError> {
        let table = &self.merged()?.table;
        if self.selected.is_empty() {
            return Ok(table.clone());
        }
        Ok(table.select(&self.selected).map_err(MergeError::from)?)
    }

    pub fn require(&self, required: &[String]) -> Result<ColumnValidation, SessionError> {
        Ok(self.validator.validate(&self.merged()?.table, required))
    }

    pub fn quality(&self) -> Result<QualityReport, SessionError> {
        Ok(self.validator.summarize(&self.selected_table()?))
    }

    pub fn export_summary(&self) -> Result<ExportSummary, SessionError> {
        Ok(self.summaries.summarize(&self.merged()?.table, &self.selected)?)
    }

    pub fn validate_export(&self) -> Result<ExportValidation, SessionError> {
        Ok(validate_export(
            &self.merged()?.table,
            &self.selected,
            self.export_config.large_export_warning_bytes,
        ))
    }

    /// Encode the selection with `writer`. `file_stem` falls back to the
    /// configured default.
    pub fn export(
        &self,
        writer: &dyn TableWriter,
        file_stem: Option<&str>,
    ) -> Result<ExportArtifact, SessionError> {
        let stem = file_stem.unwrap_or(&self.export_config.default_file_stem);
        let selection = ExportSelection::new(self.selected.clone(), stem);
        Ok(export_selection(&self.merged()?.table, &selection, writer)?)
    }
}
