// sheetmerge CLI - merge CSV and Excel files into one provenance-tagged table

mod exit_codes;
mod instrument;
mod pipeline;
mod session;

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use sheetmerge_config::Settings;
use sheetmerge_io::{BatchReader, CancellationToken, FileFormat, TableReader, UploadedFile};
use sheetmerge_merge::MergeMode;

use exit_codes::{
    session_exit_code, ErrorOutput, EXIT_CONFIG, EXIT_READ, EXIT_REQUIRED_MISSING, EXIT_SUCCESS,
    EXIT_USAGE, EXIT_WRITE,
};
use pipeline::{Capability, Job, JobReport, Pipeline};
use session::{MergeSession, SessionError};

#[derive(Parser)]
#[command(name = "smerge")]
#[command(about = "Merge CSV and Excel files into one table, tagging every row with its source")]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/sheetmerge/settings.toml)
    #[arg(long, global = true, env = "SMERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge files into one table with a source column
    #[command(after_help = "\
Examples:
  smerge merge jan.csv feb.csv > all.csv
  smerge merge q1.xlsx q2.xlsx --mode intersection --output merged.xlsx
  smerge merge *.csv --select 'id,amount' --select source --json
  smerge merge a.csv b.csv --require id,email --dedupe --clean --profile --json")]
    Merge {
        /// Input files (.csv, .xlsx, .xls)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Schema reconciliation mode (default from settings: strict)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Name of the provenance column
        #[arg(long)]
        source_column: Option<String>,

        /// Columns to keep, in order. Repeatable, comma-separated
        #[arg(long)]
        select: Vec<String>,

        /// Columns that must exist in the merged table. Repeatable, comma-separated
        #[arg(long)]
        require: Vec<String>,

        /// Drop exact duplicate rows
        #[arg(long)]
        dedupe: bool,

        /// Drop all-null rows and trim whitespace in text cells
        #[arg(long)]
        clean: bool,

        /// Store repetitive text columns as categorical
        #[arg(long)]
        compact: bool,

        /// Include a per-column quality profile in the JSON report
        #[arg(long)]
        profile: bool,

        /// Write the result to a file (.xlsx or .csv) instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print at most N rows to stdout
        #[arg(long)]
        preview: Option<usize>,

        /// Abort when any file cannot be read (default: skip it with a warning)
        #[arg(long)]
        fail_on_read_error: bool,

        /// Print the JSON report to stdout instead of table rows
        #[arg(long)]
        json: bool,
    },

    /// Report what each file contains without merging
    #[command(after_help = "\
Examples:
  smerge inspect report.xlsx
  smerge inspect *.csv --json")]
    Inspect {
        /// Input files (.csv, .xlsx, .xls)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List available pipelines
    Pipelines {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Strict,
    Intersection,
}

impl From<ModeArg> for MergeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Strict => MergeMode::Strict,
            ModeArg::Intersection => MergeMode::Intersection,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = load_settings(cli.config.as_deref()).and_then(|settings| {
        instrument::init_logging(&settings.logging.level, cli.verbose);
        match cli.command {
            Commands::Merge {
                files,
                mode,
                source_column,
                select,
                require,
                dedupe,
                clean,
                compact,
                profile,
                output,
                preview,
                fail_on_read_error,
                json,
            } => cmd_merge(
                settings,
                MergeArgs {
                    files,
                    mode: mode.map(MergeMode::from),
                    source_column,
                    select,
                    require,
                    dedupe,
                    clean,
                    compact,
                    profile,
                    output,
                    preview,
                    fail_on_read_error,
                    json,
                },
            ),
            Commands::Inspect { files, json } => cmd_inspect(&settings, files, json),
            Commands::Pipelines { json } => cmd_pipelines(json),
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::new(EXIT_WRITE, msg)
    }

    /// Map a session error to its exit code, with a hint where one helps.
    pub fn session(err: SessionError) -> Self {
        use sheetmerge_merge::MergeError;

        let hint = match &err {
            SessionError::Merge(MergeError::SchemaMismatch { .. }) => {
                Some("use --mode intersection to keep only the shared columns".to_string())
            }
            SessionError::Merge(MergeError::ProvenanceColumnConflict { .. }) => {
                Some("pick another name with --source-column".to_string())
            }
            SessionError::Read(_) => {
                Some("drop --fail-on-read-error to skip unreadable files".to_string())
            }
            _ => None,
        };
        Self { code: session_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    Settings::load(path).map_err(|e| {
        CliError::new(EXIT_CONFIG, e.to_string())
            .with_hint(format!("default location: {}", Settings::config_path().display()))
    })
}

// ============================================================================
// Input helpers
// ============================================================================

fn load_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>, CliError> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .map_err(|e| CliError::args(format!("cannot read {}: {e}", path.display())))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(UploadedFile::new(name, bytes))
        })
        .collect()
}

fn parse_list_args(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn emit_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| {
            CliError::new(exit_codes::EXIT_ERROR, format!("JSON serialization error: {e}"))
        })?;
    println!("{json}");
    Ok(())
}

// ============================================================================
// merge
// ============================================================================

struct MergeArgs {
    files: Vec<PathBuf>,
    mode: Option<MergeMode>,
    source_column: Option<String>,
    select: Vec<String>,
    require: Vec<String>,
    dedupe: bool,
    clean: bool,
    compact: bool,
    profile: bool,
    output: Option<PathBuf>,
    preview: Option<usize>,
    fail_on_read_error: bool,
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    Xlsx,
    Csv,
}

fn output_kind(path: &Path) -> Result<OutputKind, CliError> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("xlsx") => Ok(OutputKind::Xlsx),
        Some("csv") => Ok(OutputKind::Csv),
        _ => Err(CliError::args(format!("unsupported output file: {}", path.display()))
            .with_hint("use a .xlsx or .csv extension")),
    }
}

fn cmd_merge(mut settings: Settings, args: MergeArgs) -> Result<(), CliError> {
    if let Some(name) = args.source_column {
        settings.merge.source_column = name;
        settings.merge.validate().map_err(|e| CliError::args(e.to_string()))?;
    }
    let output_kind = args.output.as_deref().map(output_kind).transpose()?;
    let select = parse_list_args(&args.select);
    let duplicate = select
        .iter()
        .enumerate()
        .find_map(|(i, name)| select[..i].contains(name).then_some(name));
    if let Some(dup) = duplicate {
        return Err(CliError::args(format!("duplicate column in --select: \"{dup}\"")));
    }

    let job = Job {
        files: load_files(&args.files)?,
        mode: args.mode.unwrap_or(settings.merge.mode),
        select,
        require: parse_list_args(&args.require),
        dedupe: args.dedupe,
        clean: args.clean,
        compact: args.compact,
        profile: args.profile,
        write_xlsx: output_kind == Some(OutputKind::Xlsx),
        file_stem: args
            .output
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned()),
        emit_table: output_kind == Some(OutputKind::Csv) || (args.output.is_none() && !args.json),
        fail_on_read_error: args.fail_on_read_error,
        cancel: CancellationToken::new(),
    };

    let mut session = MergeSession::from_settings(&settings);
    let mut report = Pipeline::find("merge")
        .ok_or_else(|| CliError::new(exit_codes::EXIT_ERROR, "merge pipeline is not registered"))?
        .execute(&mut session, &job)
        .map_err(|e| {
            if args.json {
                // Structured error replaces the plain-text one
                ErrorOutput::from_session_error(&e).print();
                return CliError::new(session_exit_code(&e), "");
            }
            CliError::session(e)
        })?;

    if let Some(path) = &args.output {
        write_output(path, &report)?;
        report.output = Some(path.display().to_string());
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        emit_json(&report)?;
    } else if args.output.is_none() {
        if let Some(table) = &report.table {
            let table = match args.preview {
                Some(n) => table.head(n),
                None => table.clone(),
            };
            let stdout = io::stdout();
            sheetmerge_io::csv::write_table(&table, stdout.lock())
                .map_err(|e| CliError::write(format!("cannot write to stdout: {e}")))?;
        }
    }

    print_merge_summary(&report);

    if let Some(required) = report.required.as_ref().filter(|r| !r.valid) {
        return Err(CliError::new(
            EXIT_REQUIRED_MISSING,
            format!("missing required column(s): {}", required.missing_columns.join(", ")),
        ));
    }
    Ok(())
}

fn write_output(path: &Path, report: &JobReport) -> Result<(), CliError> {
    let bytes = match (&report.artifact, &report.table) {
        (Some(artifact), _) => artifact.bytes.clone(),
        (None, Some(table)) => {
            let mut buf = Vec::new();
            sheetmerge_io::csv::write_table(table, &mut buf)
                .map_err(|e| CliError::write(format!("cannot encode csv: {e}")))?;
            buf
        }
        (None, None) => return Err(CliError::write("nothing to write")),
    };
    std::fs::write(path, bytes)
        .map_err(|e| CliError::write(format!("cannot write {}: {e}", path.display())))
}

/// Human summary on stderr so stdout stays machine-readable.
fn print_merge_summary(report: &JobReport) {
    let m = &report.merge;
    eprintln!(
        "{} merge: {} rows x {} columns from {} source(s)",
        m.mode,
        m.total_rows,
        m.total_columns,
        m.sources.len(),
    );
    for source in &m.sources {
        eprintln!("  {:<24} {} rows", source.label, source.rows);
    }
    for failure in &report.failures {
        eprintln!("  skipped {}: {}", failure.file_name, failure.error);
    }
    if let Some(n) = report.duplicates_removed {
        eprintln!("duplicates removed: {n}");
    }
    if let Some(stats) = &report.cleaning {
        eprintln!(
            "cleaned: {} empty rows removed, {} cells trimmed",
            stats.empty_rows_removed, stats.cells_trimmed
        );
    }
    eprintln!(
        "export: {} columns, ~{}",
        report.export.total_columns, report.export.estimated_size
    );
}

// ============================================================================
// inspect
// ============================================================================

#[derive(Debug, Serialize)]
struct FileSummary {
    file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_type: Option<FileFormat>,
    sheets_count: usize,
    total_rows: usize,
    total_columns: usize,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sheets: Vec<SheetSummary>,
}

#[derive(Debug, Serialize)]
struct SheetSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    ordinal: usize,
    rows: usize,
    columns: Vec<String>,
}

fn cmd_inspect(settings: &Settings, paths: Vec<PathBuf>, json: bool) -> Result<(), CliError> {
    let files = load_files(&paths)?;
    let batch = BatchReader::new(TableReader::new(settings.reader.clone()), settings.workers);
    let outcomes = instrument::timed("inspect", || {
        Ok::<_, CliError>(batch.read_all(&files, &CancellationToken::new()))
    })?;

    let summaries: Vec<FileSummary> = outcomes
        .into_iter()
        .map(|outcome| {
            let file_type = FileFormat::from_file_name(&outcome.file_name);
            match outcome.result {
                Ok(sheets) => FileSummary {
                    file_name: outcome.file_name,
                    file_type,
                    sheets_count: sheets.len(),
                    total_rows: sheets.iter().map(|s| s.table.row_count()).sum(),
                    total_columns: sheets.iter().map(|s| s.table.column_count()).sum(),
                    success: true,
                    error: None,
                    sheets: sheets
                        .into_iter()
                        .map(|s| SheetSummary {
                            columns: s.table.column_names().iter().map(|c| c.to_string()).collect(),
                            rows: s.table.row_count(),
                            ordinal: s.ordinal,
                            name: s.sheet_name,
                        })
                        .collect(),
                },
                Err(e) => FileSummary {
                    file_name: outcome.file_name,
                    file_type,
                    sheets_count: 0,
                    total_rows: 0,
                    total_columns: 0,
                    success: false,
                    error: Some(e.to_string()),
                    sheets: Vec::new(),
                },
            }
        })
        .collect();

    if json {
        emit_json(&summaries)?;
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for s in &summaries {
            let line = match &s.error {
                None => format!(
                    "{}: {} sheet(s), {} rows, {} columns",
                    s.file_name, s.sheets_count, s.total_rows, s.total_columns
                ),
                Some(e) => format!("{}: {}", s.file_name, e),
            };
            writeln!(out, "{line}").map_err(|e| CliError::write(e.to_string()))?;
        }
    }

    let failed = summaries.iter().filter(|s| !s.success).count();
    if failed > 0 {
        return Err(CliError::new(EXIT_READ, format!("{failed} file(s) could not be read")));
    }
    Ok(())
}

// ============================================================================
// pipelines
// ============================================================================

#[derive(Serialize)]
struct PipelineInfo {
    name: &'static str,
    description: &'static str,
}

fn cmd_pipelines(json: bool) -> Result<(), CliError> {
    let infos: Vec<PipelineInfo> = Pipeline::all()
        .iter()
        .map(|p| PipelineInfo { name: p.identify(), description: p.describe() })
        .collect();

    if json {
        return emit_json(&infos);
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for info in &infos {
        writeln!(out, "{:<12} {}", info.name, info.description)
            .map_err(|e| CliError::write(e.to_string()))?;
    }
    Ok(())
}
