//! File-backed knowledge index with JSON-lines snapshot storage.
//!
//! Each line of the snapshot is one JSON-encoded [`KnowledgeRecord`],
//! weights included, so feedback survives restarts.
//!
//! Mutations are staged on a copy of the in-memory state, written to a
//! temporary file that is renamed over the snapshot, and only then made
//! live. A failed write leaves both the file and the index as they were.

use async_trait::async_trait;
use answerdesk_core::error::IndexError;
use answerdesk_core::knowledge::{
    ImportReport, KnowledgeIndex, KnowledgeRecord, MatchCandidate, WeightBounds,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::index::{InMemoryIndex, State};

/// A knowledge index persisted to a JSONL snapshot.
pub struct FileIndex {
    path: PathBuf,
    inner: InMemoryIndex,
    /// Serializes stage-write-install so the file always reflects the latest state.
    write_lock: Mutex<()>,
    writes: AtomicUsize,
}

impl FileIndex {
    /// Open the snapshot at `path`.
    ///
    /// A missing file starts an empty index (the file is created on first
    /// write). Lines that are not valid JSON records are skipped with a
    /// warning. Any other read failure is an error, so an unreadable
    /// snapshot is never overwritten.
    pub async fn open(path: impl Into<PathBuf>, bounds: WeightBounds) -> Result<Self, IndexError> {
        let path = path.into();
        let records = load_snapshot(&path).await?;
        debug!(path = %path.display(), count = records.len(), "Knowledge snapshot loaded");
        Ok(Self {
            inner: InMemoryIndex::from_records(records, bounds),
            path,
            write_lock: Mutex::new(()),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of snapshot writes since the index was opened.
    pub fn snapshot_writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Apply a mutation to a staged copy, persist it, then make it live.
    ///
    /// `apply` returns its output and whether anything changed; unchanged
    /// state is not written.
    async fn commit<T>(
        &self,
        apply: impl FnOnce(&mut State) -> Result<(T, bool), IndexError>,
    ) -> Result<T, IndexError> {
        let _guard = self.write_lock.lock().await;
        let mut staged = self.inner.stage().await;
        let (output, changed) = apply(&mut staged)?;
        if changed {
            self.write_snapshot(&staged.records()).await?;
            self.inner.install(staged).await;
        }
        Ok(output)
    }

    /// Write every record to a temporary file and rename it over the snapshot.
    async fn write_snapshot(&self, records: &[KnowledgeRecord]) -> Result<(), IndexError> {
        let mut content = Vec::new();
        for record in records {
            serde_json::to_writer(&mut content, record)
                .map_err(|e| IndexError::Storage(format!("Failed to serialize record: {e}")))?;
            content.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                IndexError::Storage(format!("Failed to create snapshot directory: {e}"))
            })?;
        }

        let tmp = temp_path(&self.path);
        if let Err(e) = write_file(&tmp, &content).await {
            error!(path = %tmp.display(), error = %e, "Snapshot write failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(IndexError::Storage(format!("Failed to write snapshot: {e}")));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            error!(path = %self.path.display(), error = %e, "Snapshot rename failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(IndexError::Storage(format!("Failed to replace snapshot: {e}")));
        }

        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(path = %self.path.display(), count = records.len(), "Knowledge snapshot written");
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> Result<Vec<KnowledgeRecord>, IndexError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(parse_snapshot(&bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()), // No snapshot yet
        Err(e) => Err(IndexError::Storage(format!(
            "Failed to read snapshot {}: {e}",
            path.display()
        ))),
    }
}

/// Decode one record per line. Bad lines, including invalid UTF-8, are skipped.
fn parse_snapshot(bytes: &[u8]) -> Vec<KnowledgeRecord> {
    bytes
        .split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.trim_ascii().is_empty())
        .filter_map(|(n, line)| match serde_json::from_slice::<KnowledgeRecord>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(line = n + 1, error = %e, "Skipping corrupted snapshot line");
                None
            }
        })
        .collect()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

#[async_trait]
impl KnowledgeIndex for FileIndex {
    fn name(&self) -> &str {
        "file"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<MatchCandidate>, IndexError> {
        self.inner.search(query, k).await
    }

    async fn upsert(&self, record: KnowledgeRecord, overwrite: bool) -> Result<(), IndexError> {
        let bounds = self.inner.bounds();
        self.commit(|state| Ok((state.upsert(record, overwrite, &bounds)?, true)))
            .await
    }

    async fn upsert_many(
        &self,
        records: Vec<KnowledgeRecord>,
        overwrite: bool,
    ) -> Result<ImportReport, IndexError> {
        let bounds = self.inner.bounds();
        self.commit(|state| {
            let report = state.upsert_many(records, overwrite, &bounds)?;
            let changed = report.inserted > 0;
            Ok((report, changed))
        })
        .await
    }

    async fn adjust_weight(&self, record_id: &str, delta: f32) -> Result<f32, IndexError> {
        let bounds = self.inner.bounds();
        self.commit(|state| Ok((state.adjust_weight(record_id, delta, &bounds)?, true)))
            .await
    }

    async fn get(&self, id: &str) -> Option<KnowledgeRecord> {
        self.inner.get(id).await
    }

    async fn find_by_answer(&self, answer_text: &str) -> Option<KnowledgeRecord> {
        self.inner.find_by_answer(answer_text).await
    }

    async fn list(&self, category: Option<&str>) -> Vec<KnowledgeRecord> {
        self.inner.list(category).await
    }

    async fn delete(&self, id: &str) -> Result<bool, IndexError> {
        self.commit(|state| {
            let deleted = state.delete(id);
            Ok((deleted, deleted))
        })
        .await
    }

    async fn count(&self) -> usize {
        self.inner.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(id: &str, question: &str, answer: &str) -> KnowledgeRecord {
        KnowledgeRecord::new(question, answer, "general").with_id(id)
    }

    #[tokio::test]
    async fn upsert_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("knowledge.jsonl");

        let index = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        index.upsert(record("r1", "library hours", "9 to 5"), false).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("library hours"));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn weights_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.jsonl");

        {
            let index = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
            index.upsert(record("r1", "library hours", "9 to 5"), false).await.unwrap();
            index.adjust_weight("r1", 0.5).await.unwrap();
        }

        let reopened = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        assert_eq!(reopened.count().await, 1);
        assert!((reopened.get("r1").await.unwrap().weight - 1.5).abs() < 1e-6);
        assert_eq!(reopened.search("library hours", 1).await.unwrap()[0].record_id, "r1");
    }

    #[tokio::test]
    async fn delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.jsonl");

        let index = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        index.upsert(record("r1", "a", "b"), false).await.unwrap();
        index.upsert(record("r2", "c", "d"), false).await.unwrap();
        assert!(index.delete("r1").await.unwrap());
        assert!(!index.delete("r1").await.unwrap());
        assert_eq!(index.snapshot_writes(), 3);

        let reopened = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        assert_eq!(reopened.count().await, 1);
        assert!(reopened.get("r1").await.is_none());
    }

    #[tokio::test]
    async fn batch_upsert_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.jsonl");
        let records: Vec<KnowledgeRecord> = (0..200)
            .map(|i| record(&format!("r{i}"), &format!("question {i}"), &format!("answer {i}")))
            .collect();

        let index = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        let report = crate::corpus::import(&index, records.clone(), false).await.unwrap();
        assert_eq!(report.inserted, 200);
        assert_eq!(index.snapshot_writes(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 200);

        // Re-importing the same corpus changes nothing and writes nothing.
        let report = crate::corpus::import(&index, records, false).await.unwrap();
        assert_eq!(report.duplicates, 200);
        assert_eq!(index.snapshot_writes(), 1);
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped() {
        let mut file = NamedTempFile::new().unwrap();
        let good = serde_json::to_string(&record("r1", "library hours", "9 to 5")).unwrap();
        writeln!(file, "{good}").unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        file.flush().unwrap();

        let index = FileIndex::open(file.path(), WeightBounds::default()).await.unwrap();
        assert_eq!(index.count().await, 1);
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_lose_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.jsonl");
        let mut bytes = serde_json::to_vec(&record("r1", "library hours", "9 to 5")).unwrap();
        bytes.push(b'\n');
        bytes.extend_from_slice(b"{\"id\": \"\xff\xfe\"}\n");
        std::fs::write(&path, &bytes).unwrap();

        let index = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        assert_eq!(index.count().await, 1);
        index.upsert(record("r2", "tuition fees", "100 USD"), false).await.unwrap();
        drop(index);

        let reopened = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        assert!(reopened.get("r1").await.is_some());
        assert!(reopened.get("r2").await.is_some());
    }

    #[tokio::test]
    async fn unreadable_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileIndex::open(dir.path(), WeightBounds::default()).await;
        assert!(matches!(result, Err(IndexError::Storage(_))));
    }

    #[tokio::test]
    async fn failed_write_leaves_index_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.jsonl");
        let index = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        index.upsert(record("r1", "library hours", "9 to 5"), false).await.unwrap();

        // A directory squatting on the temp file makes every write fail.
        std::fs::create_dir(temp_path(&path)).unwrap();

        let result = index.upsert(record("r2", "tuition fees", "100 USD"), false).await;
        assert!(matches!(result, Err(IndexError::Storage(_))));
        assert!(index.get("r2").await.is_none());
        assert!(index.search("tuition fees", 1).await.unwrap().is_empty());

        assert!(matches!(
            index.adjust_weight("r1", 0.5).await,
            Err(IndexError::Storage(_))
        ));
        assert_eq!(index.get("r1").await.unwrap().weight, 1.0);

        assert!(index.delete("r1").await.is_err());
        assert_eq!(index.count().await, 1);

        std::fs::remove_dir(temp_path(&path)).unwrap();
        index.upsert(record("r2", "tuition fees", "100 USD"), false).await.unwrap();
        let reopened = FileIndex::open(&path, WeightBounds::default()).await.unwrap();
        assert_eq!(reopened.count().await, 2);
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let index = FileIndex::open("/nonexistent/dir/knowledge.jsonl", WeightBounds::default())
            .await
            .unwrap();
        assert_eq!(index.count().await, 0);
        assert_eq!(index.name(), "file");
    }
}
