//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── known_offers.txt      # Rewritten atomically (temp file + rename)
//! └── subscribers.txt       # Appended line by line
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::{StateStore, parse_id_lines, render_id_lines};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    known_file: String,
    subscribers_file: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory with default file names.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let defaults = StorageConfig::default();
        Self {
            root_dir: root_dir.into(),
            known_file: defaults.known_offers_file,
            subscribers_file: defaults.subscribers_file,
        }
    }

    /// Create a LocalStorage from the storage settings.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            root_dir: config.data_dir.clone(),
            known_file: config.known_offers_file.clone(),
            subscribers_file: config.subscribers_file.clone(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Store(e)),
        }
    }

    /// Append one line, starting a new line first if the file lacks a trailing newline.
    async fn append_line(&self, key: &str, line: &str) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let needs_newline = match self.read_bytes(key).await? {
            Some(bytes) => bytes.last().is_some_and(|b| *b != b'\n'),
            None => false,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        if needs_newline {
            file.write_all(b"\n").await?;
        }
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStorage {
    async fn load_known(&self) -> Result<BTreeSet<String>> {
        match self.read_bytes(&self.known_file).await? {
            Some(bytes) => Ok(parse_id_lines(&bytes)),
            None => {
                log::info!("No {} found, starting with an empty cache", self.known_file);
                Ok(BTreeSet::new())
            }
        }
    }

    async fn save_known(&self, known: &BTreeSet<String>) -> Result<()> {
        self.write_bytes(&self.known_file, render_id_lines(known).as_bytes())
            .await
    }

    async fn expire_known(&self, ttl: Duration, now: SystemTime) -> Result<bool> {
        let path = self.path(&self.known_file);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(AppError::Store(e)),
        };

        let modified = metadata.modified()?;
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= ttl {
            return Ok(false);
        }

        log::info!(
            "{} is {} day(s) old, clearing the offer cache",
            self.known_file,
            age.as_secs() / 86_400
        );
        tokio::fs::remove_file(&path).await?;
        Ok(true)
    }

    async fn load_subscribers(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .read_bytes(&self.subscribers_file)
            .await?
            .map(|bytes| parse_id_lines(&bytes))
            .unwrap_or_default())
    }

    async fn append_subscriber(&self, id: &str) -> Result<()> {
        self.append_line(&self.subscribers_file, id).await
    }
}
