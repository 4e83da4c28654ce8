// Integration tests for the smerge binary: stdout contracts and exit codes.
//
// Every run gets an empty settings file so a user's own settings.toml
// never leaks into the results.
//
// Run with: cargo test -p sheetmerge-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.toml"), "").unwrap();
        Self { dir }
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn smerge(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_smerge"))
            .current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .env_remove("SMERGE_CONFIG")
            .arg("--config")
            .arg(self.dir.path().join("settings.toml"))
            .args(args)
            .output()
            .expect("run smerge")
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed).unwrap_or_else(|e| {
        panic!("stdout must be one JSON value.\nParse error: {e}\nstdout:\n{trimmed}")
    })
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// smerge merge
// ===========================================================================

#[test]
fn merge_writes_csv_to_stdout() {
    let fx = Fixture::new();
    let a = fx.file("fileA.csv", "id,name\n1,a\n2,b\n3,c\n");
    let b = fx.file("fileB.csv", "id,name\n4,d\n5,e\n");

    let output = fx.smerge(&["merge", arg(&a), arg(&b)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "id,name,source");
    assert_eq!(lines[1], "1,a,fileA");
    assert_eq!(lines[5], "5,e,fileB");
    assert_eq!(lines.len(), 6);
    assert!(stderr(&output).contains("strict merge: 5 rows"));
}

#[test]
fn merge_preview_limits_rows() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id\n1\n2\n3\n");
    let output = fx.smerge(&["merge", arg(&a), "--preview", "2"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 3);
}

#[test]
fn merge_json_contract() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "ID,Name,Extra\n1,x,e\n");
    let b = fx.file("b.csv", "id,name\n2,y\n2,y\n");
    let bad = fx.file("notes.txt", "hello");

    let output = fx.smerge(&[
        "merge", arg(&a), arg(&b), arg(&bad),
        "--mode", "intersection",
        "--select", "name,source",
        "--dedupe", "--profile", "--json",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["pipeline"], "merge");
    assert_eq!(val["mode"], "intersection");
    assert_eq!(val["columns"], serde_json::json!(["id", "name"]));
    assert_eq!(val["total_rows"], 2);
    assert_eq!(val["duplicates_removed"], 1);
    assert_eq!(val["sources"][1]["label"], "b");
    assert_eq!(val["sources"][1]["rows"], 2);
    assert_eq!(val["failures"][0]["file_name"], "notes.txt");
    assert_eq!(val["export"]["selected_columns"], serde_json::json!(["name", "source"]));
    assert!(val["export"]["estimated_size"].as_str().unwrap().ends_with(" MB"));
    assert_eq!(val["quality"]["total_columns"], 2);
}

#[test]
fn merge_row_steps_keep_source_counts_consistent() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id,name\n1,x\n1,x\n,\n");
    let b = fx.file("b.csv", "id,name\n2,y\n");

    let output = fx.smerge(&["merge", arg(&a), arg(&b), "--dedupe", "--clean", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["duplicates_removed"], 1);
    assert_eq!(val["cleaning"]["empty_rows_removed"], 1);
    assert_eq!(val["total_rows"], 2);
    assert_eq!(val["sources"][0]["rows"], 1);
    assert_eq!(val["sources"][1]["rows"], 1);
}

#[test]
fn merge_schema_mismatch_exit_code() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "ID,Name\n1,x\n");
    let b = fx.file("b.csv", "id,name\n2,y\n");

    let output = fx.smerge(&["merge", arg(&a), arg(&b)]);
    assert_eq!(output.status.code(), Some(4));
    assert!(output.stdout.is_empty());
    let err = stderr(&output);
    assert!(err.contains("error: column names differ"), "stderr: {err}");
    assert!(err.contains("hint:  use --mode intersection"));
}

#[test]
fn merge_no_common_columns_exit_code() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "alpha\n1\n");
    let b = fx.file("b.csv", "beta\n2\n");
    let output = fx.smerge(&["merge", arg(&a), arg(&b), "--mode", "intersection"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn merge_unknown_column_json_error() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id\n1\n");
    let output = fx.smerge(&["merge", arg(&a), "--select", "amount", "--json"]);
    assert_eq!(output.status.code(), Some(6));
    assert!(output.stdout.is_empty());

    let last_line = stderr(&output).lines().last().unwrap().to_string();
    let err: serde_json::Value = serde_json::from_str(&last_line).unwrap();
    assert_eq!(err["error"], "unknown_column");
    assert_eq!(err["message"], "unknown column(s): amount");
    assert_eq!(err["exit_code"], 6);
}

#[test]
fn merge_required_columns_missing() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id\n1\n");
    let output = fx.smerge(&["merge", arg(&a), "--require", "id,email", "--json"]);
    assert_eq!(output.status.code(), Some(7));
    let val = assert_single_json(&output.stdout);
    assert_eq!(val["required"]["missing_columns"], serde_json::json!(["email"]));
    assert!(stderr(&output).contains("missing required column(s): email"));
}

#[test]
fn merge_fail_on_read_error() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id\n1\n");
    let bad = fx.file("broken.xlsx", "not a workbook");

    let output = fx.smerge(&["merge", arg(&a), arg(&bad)]);
    assert!(output.status.success());

    let output = fx.smerge(&["merge", arg(&a), arg(&bad), "--fail-on-read-error"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("broken.xlsx"));
}

#[test]
fn merge_missing_input_is_usage_error() {
    let fx = Fixture::new();
    let output = fx.smerge(&["merge", arg(&fx.path("absent.csv"))]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn merge_writes_xlsx_output() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id,amount\n1,2.5\n");
    let b = fx.file("b.csv", "id,amount\n2,3\n");
    let out = fx.path("combined.xlsx");

    let output = fx.smerge(&["merge", arg(&a), arg(&b), "--output", arg(&out), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["output"], arg(&out));
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..2], b"PK");

    // The written workbook reads back as one merged table
    let output = fx.smerge(&["inspect", arg(&out), "--json"]);
    let val = assert_single_json(&output.stdout);
    assert_eq!(val[0]["total_rows"], 2);
    assert_eq!(val[0]["sheets"][0]["columns"], serde_json::json!(["id", "amount", "source"]));
}

#[test]
fn merge_custom_source_column() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id\n1\n");
    let out = fx.path("out.csv");
    let output = fx.smerge(&["merge", arg(&a), "--source-column", "origin", "-o", arg(&out)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(output.stdout.is_empty());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "id,origin\n1,a\n");
}

#[test]
fn merge_source_column_conflict() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id,source\n1,crm\n");
    let output = fx.smerge(&["merge", arg(&a)]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("--source-column"));
}

#[test]
fn merge_settings_file_sets_defaults() {
    let fx = Fixture::new();
    fx.file("settings.toml", "[merge]\nmode = \"intersection\"\nsource_column = \"file\"\n");
    let a = fx.file("a.csv", "id,x\n1,2\n");
    let b = fx.file("b.csv", "id,y\n3,4\n");

    let output = fx.smerge(&["merge", arg(&a), arg(&b), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&output.stdout);
    assert_eq!(val["mode"], "intersection");
    assert_eq!(val["source_column"], "file");
}

#[test]
fn invalid_settings_exit_code() {
    let fx = Fixture::new();
    fx.file("settings.toml", "workers = 0\n");
    let a = fx.file("a.csv", "id\n1\n");
    let output = fx.smerge(&["merge", arg(&a)]);
    assert_eq!(output.status.code(), Some(9));
    assert!(stderr(&output).contains("settings.toml"));
}

// ===========================================================================
// smerge inspect
// ===========================================================================

#[test]
fn inspect_json_contract() {
    let fx = Fixture::new();
    let a = fx.file("a.csv", "id;name\n1;x\n2;y\n");
    let bad = fx.file("b.pdf", "%PDF");

    let output = fx.smerge(&["inspect", arg(&a), arg(&bad), "--json"]);
    assert_eq!(output.status.code(), Some(3));

    let val = assert_single_json(&output.stdout);
    let files = val.as_array().expect("array of file summaries");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["file_name"], "a.csv");
    assert_eq!(files[0]["file_type"], "csv");
    assert_eq!(files[0]["sheets_count"], 1);
    assert_eq!(files[0]["total_rows"], 2);
    assert_eq!(files[0]["total_columns"], 2);
    assert_eq!(files[0]["success"], true);
    assert_eq!(files[1]["success"], false);
    assert!(files[1]["error"].as_str().unwrap().contains("unsupported file format"));
}

// ===========================================================================
// smerge pipelines
// ===========================================================================

#[test]
fn pipelines_json_lists_merge() {
    let fx = Fixture::new();
    let output = fx.smerge(&["pipelines", "--json"]);
    assert!(output.status.success());
    let val = assert_single_json(&output.stdout);
    assert_eq!(val[0]["name"], "merge");
    assert!(val[0]["description"].as_str().is_some_and(|d| !d.is_empty()));
}
