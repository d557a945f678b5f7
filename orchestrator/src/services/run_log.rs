//! Run artifact files
//!
//! Each persisted run becomes `<kind>_<YYYYmmddHHMMSS_mmm>.json` in the log
//! directory, holding one entry per request.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::RunLogSink;
use crate::types::RunLogEntry;

pub struct FileRunLogSink {
    dir: PathBuf,
}

impl FileRunLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Create the first free `<kind>_<stamp>[_N].json`, never reusing an existing name
    async fn create_unique(&self, kind: &str) -> std::io::Result<(PathBuf, fs::File)> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S_%3f").to_string();
        let mut suffix = 0;
        loop {
            let name = match suffix {
                0 => format!("{kind}_{stamp}.json"),
                n => format!("{kind}_{stamp}_{n}.json"),
            };
            let path = self.dir.join(name);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RunLogSink for FileRunLogSink {
    async fn persist(&self, kind: &str, entries: Vec<RunLogEntry>) -> OrchestratorResult<PathBuf> {
        let artifact_error = |path: &PathBuf, source| OrchestratorError::ArtifactError {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(|e| artifact_error(&self.dir, e))?;

        let bytes = serde_json::to_vec_pretty(&entries)?;
        let (path, mut file) = self
            .create_unique(kind)
            .await
            .map_err(|e| artifact_error(&self.dir, e))?;
        file.write_all(&bytes).await.map_err(|e| artifact_error(&path, e))?;
        file.flush().await.map_err(|e| artifact_error(&path, e))?;
        Ok(path)
    }
}
