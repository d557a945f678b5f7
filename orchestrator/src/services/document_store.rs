//! File-backed document collection
//!
//! A collection lives in `<store path>/<collection>.json` as a JSON array of
//! customer documents. Every batch holds an exclusive lock on
//! `<collection>.json.lock` for its whole read-modify-write cycle, so
//! processes sharing the directory never lose each other's batches. The new
//! contents go through a uniquely named temporary file and a rename, so
//! readers see either the old or the new batch.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use shared::{process_debug, EntityRecord, ProcessId, StoreSettings};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::memory_store::{apply_to, insert_into, sort_recent_first};
use crate::traits::EntityStore;
use crate::types::EntityUpdate;

pub struct JsonDocumentStore {
    file: CollectionFile,
    /// Keeps this process's batches off the blocking pool while another one holds the file lock
    write_lock: Mutex<()>,
    process_id: ProcessId,
}

/// Paths of one collection, usable from blocking threads
#[derive(Debug, Clone)]
struct CollectionFile {
    collection: String,
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonDocumentStore {
    /// Open (creating the directory if needed) the collection named in `settings`
    pub async fn open(settings: &StoreSettings, process_id: ProcessId) -> OrchestratorResult<Self> {
        fs::create_dir_all(&settings.path)
            .await
            .map_err(|e| OrchestratorError::store("open", &settings.collection, e.to_string()))?;

        let path = settings.path.join(format!("{}.json", settings.collection));
        Ok(Self {
            file: CollectionFile {
                collection: settings.collection.clone(),
                lock_path: path.with_extension("json.lock"),
                path,
            },
            write_lock: Mutex::new(()),
            process_id,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file.path
    }

    async fn load(&self) -> OrchestratorResult<Vec<EntityRecord>> {
        let raw = match fs::read(&self.file.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.file.error("read", e)),
        };
        self.file.parse(&raw)
    }

    /// Apply `change` under the collection lock; the file is rewritten only when
    /// `change` reports a non-zero count.
    async fn modify<F>(&self, operation: &'static str, change: F) -> OrchestratorResult<usize>
    where
        F: FnOnce(&mut Vec<EntityRecord>) -> usize + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let file = self.file.clone();
        let (changed, total) = tokio::task::spawn_blocking(move || file.modify_locked(operation, change))
            .await
            .map_err(|e| self.file.error(operation, e))??;

        if changed > 0 {
            process_debug!(
                self.process_id,
                "💾 {}: {} documents changed, {} in {}",
                operation,
                changed,
                total,
                self.file.path.display()
            );
        }
        Ok(changed)
    }
}

impl CollectionFile {
    fn error(&self, operation: &str, e: impl ToString) -> OrchestratorError {
        OrchestratorError::store(operation, &self.collection, e.to_string())
    }

    fn parse(&self, raw: &[u8]) -> OrchestratorResult<Vec<EntityRecord>> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(raw).map_err(|e| self.error("read", e))
    }

    /// Blocking read-modify-write under an exclusive lock on the lock file.
    ///
    /// # Returns
    /// `(changed, documents after the change)`
    fn modify_locked<F>(&self, operation: &str, change: F) -> OrchestratorResult<(usize, usize)>
    where
        F: FnOnce(&mut Vec<EntityRecord>) -> usize,
    {
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| self.error("lock", e))?;
        let mut lock = FileLock::new(lock_file);
        let _held = lock.write().map_err(|e| self.error("lock", e))?;

        let mut records = match std::fs::read(&self.path) {
            Ok(raw) => self.parse(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(self.error("read", e)),
        };

        let changed = change(&mut records);
        if changed > 0 {
            self.replace(operation, &records)?;
        }
        Ok((changed, records.len()))
    }

    fn replace(&self, operation: &str, records: &[EntityRecord]) -> OrchestratorResult<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.error(operation, e))?;
        temp.write_all(&bytes).map_err(|e| self.error(operation, e))?;
        temp.as_file().sync_all().map_err(|e| self.error(operation, e))?;
        temp.persist(&self.path).map_err(|e| self.error(operation, e))?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for JsonDocumentStore {
    fn collection(&self) -> String {
        self.file.collection.clone()
    }

    async fn scan_recent_first(&self) -> OrchestratorResult<Vec<EntityRecord>> {
        let mut records = self.load().await?;
        sort_recent_first(&mut records);
        Ok(records)
    }

    async fn apply_updates(&self, updates: Vec<EntityUpdate>) -> OrchestratorResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        self.modify("update", move |records| apply_to(records, &updates)).await
    }

    async fn insert_many(&self, new_records: Vec<EntityRecord>) -> OrchestratorResult<usize> {
        if new_records.is_empty() {
            return Ok(0);
        }
        self.modify("insert", move |records| insert_into(records, new_records)).await
    }
}
