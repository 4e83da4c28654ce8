// Concurrent ingestion of uploaded files

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::reader::{ReadError, SheetTable, TableReader};

/// An uploaded file: raw bytes plus the name it was uploaded under.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// Shared flag checked before each file is decoded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_name: String,
    pub result: Result<Vec<SheetTable>, ReadError>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Reads independent files on a bounded worker pool.
///
/// Outcomes come back in input order whatever order the workers finish in.
/// One file failing never affects the others.
pub struct BatchReader {
    reader: TableReader,
    pool: Option<ThreadPool>,
}

impl BatchReader {
    /// `workers = None` sizes the pool to the available cores.
    pub fn new(reader: TableReader, workers: Option<usize>) -> Self {
        Self { reader, pool: build_pool(workers) }
    }

    pub fn reader(&self) -> &TableReader {
        &self.reader
    }

    pub fn read_all(&self, files: &[UploadedFile], cancel: &CancellationToken) -> Vec<FileOutcome> {
        let read_one = |file: &UploadedFile| FileOutcome {
            file_name: file.name.clone(),
            result: if cancel.is_cancelled() {
                Err(ReadError::Cancelled { file_name: file.name.clone() })
            } else {
                self.reader.read(&file.bytes, &file.name)
            },
        };

        let outcomes: Vec<FileOutcome> = match &self.pool {
            Some(pool) => pool.install(|| files.par_iter().map(read_one).collect()),
            None => files.iter().map(read_one).collect(),
        };

        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                tracing::warn!(file = %outcome.file_name, error = %e, "file skipped");
            }
        }
        outcomes
    }
}

fn desired_threads(workers: Option<usize>) -> usize {
    workers.filter(|&n| n > 0).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

/// A crate-local pool; `None` means the caller reads sequentially.
fn build_pool(workers: Option<usize>) -> Option<ThreadPool> {
    let requested = desired_threads(workers).max(1);
    let try_build = |n| rayon::ThreadPoolBuilder::new().num_threads(n).build();

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(_) if requested > 1 => try_build(1).ok(),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<UploadedFile> {
        vec![
            UploadedFile::new("a.csv", b"id\n1\n2\n".to_vec()),
            UploadedFile::new("notes.txt", b"hello".to_vec()),
            UploadedFile::new("b.csv", b"id\n3\n".to_vec()),
            UploadedFile::new("empty.csv", Vec::new()),
        ]
    }

    #[test]
    fn outcomes_keep_input_order_and_isolate_failures() {
        let batch = BatchReader::new(TableReader::default(), Some(3));
        let outcomes = batch.read_all(&files(), &CancellationToken::new());

        let names: Vec<&str> = outcomes.iter().map(|o| o.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "notes.txt", "b.csv", "empty.csv"]);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1].result, Err(ReadError::UnsupportedFormat { .. })));
        assert_eq!(outcomes[2].result.as_ref().unwrap()[0].table.row_count(), 1);
        assert!(matches!(outcomes[3].result, Err(ReadError::Decode { .. })));
    }

    #[test]
    fn cancelled_batch_decodes_nothing() {
        let batch = BatchReader::new(TableReader::default(), Some(2));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = batch.read_all(&files(), &cancel);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.result, Err(ReadError::Cancelled { .. }))));
    }

    #[test]
    fn zero_workers_means_default_pool() {
        assert!(desired_threads(Some(0)) >= 1);
        assert_eq!(desired_threads(Some(5)), 5);
    }
}
