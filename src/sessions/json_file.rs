//! JSON-file session store implementation.
//!
//! Persists the full session set as one versioned JSON document. Writes go
//! through a temp file in the same directory followed by an atomic rename,
//! so a crash mid-write never leaves a torn file behind.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::traits::{SessionStore, SleepSession};

/// Current on-disk schema version.
const STORE_VERSION: u32 = 1;

/// The on-disk JSON structure.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    sessions: HashMap<Uuid, SleepSession>,
}

impl Default for StoreFile {
    fn default() -> Self {
        StoreFile {
            version: STORE_VERSION,
            sessions: HashMap::new(),
        }
    }
}

/// A session store persisting to a single JSON file.
///
/// A missing file reads as empty (first launch). Corrupt JSON or an
/// unsupported schema version is a load error; the manager decides how to
/// degrade. The interior mutex serializes read-modify-write cycles so two
/// concurrent saves cannot interleave.
pub struct JsonFileSessionStore {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<StoreFile> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreFile::default());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read session file {}", self.path.display())
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(StoreFile::default());
        }

        let file: StoreFile = serde_json::from_str(&content).with_context(|| {
            format!("failed to parse session file {}", self.path.display())
        })?;
        anyhow::ensure!(
            file.version == STORE_VERSION,
            "unsupported session file version {} in {} (expected {STORE_VERSION})",
            file.version,
            self.path.display()
        );
        Ok(file)
    }

    fn write_file(&self, file: &StoreFile) -> Result<()> {
        let parent = self
            .path
            .parent()
            .with_context(|| format!("session file path {} has no parent", self.path.display()))?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let content = serde_json::to_string_pretty(file).context("failed to serialize sessions")?;

        // Temp file must live in the target directory for the rename to be atomic.
        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        temp.write_all(content.as_bytes())
            .context("failed to write temp session file")?;
        temp.as_file()
            .sync_all()
            .context("failed to sync temp session file")?;
        temp.persist(&self.path).with_context(|| {
            format!("failed to replace session file {}", self.path.display())
        })?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn load_all(&self) -> Result<Vec<SleepSession>> {
        let _guard = self.io_lock.lock();
        let file = self.read_file()?;
        Ok(file.sessions.into_values().collect())
    }

    async fn save(&self, session: &SleepSession) -> Result<()> {
        let _guard = self.io_lock.lock();
        let mut file = self.read_file()?;
        file.sessions.insert(session.id, session.clone());
        self.write_file(&file)
    }

    fn name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileSessionStore::new(tmp.path().join("sessions.json"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        let session = SleepSession::manual(at(0), at(3600));

        let store = JsonFileSessionStore::new(&path);
        store.save(&session).await.unwrap();

        // A fresh store instance sees the persisted record.
        let reopened = JsonFileSessionStore::new(&path);
        let all = reopened.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], session);
    }

    #[tokio::test]
    async fn save_upserts_by_id() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileSessionStore::new(tmp.path().join("sessions.json"));

        let mut session = SleepSession::started_at(at(0));
        store.save(&session).await.unwrap();
        session.end = Some(at(1800));
        store.save(&session).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].end, Some(at(1800)));
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("deeper").join("sessions.json");
        let store = JsonFileSessionStore::new(&path);

        store.save(&SleepSession::started_at(at(0))).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn empty_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        std::fs::write(&path, "").unwrap();

        let store = JsonFileSessionStore::new(&path);
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileSessionStore::new(&path);
        assert!(store.load_all().await.is_err());
    }

    #[tokio::test]
    async fn unsupported_version_is_a_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        std::fs::write(&path, r#"{"version": 99, "sessions": {}}"#).unwrap();

        let store = JsonFileSessionStore::new(&path);
        assert!(store.load_all().await.is_err());
    }
}
