//! Durable upload session state

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::plan::Fingerprint;
use super::types::StateError;
use crate::upload::{InitiateResponse, PartRecord};

/// Everything needed to resume an upload after a crash or restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub fingerprint: String,
    pub upload_id: String,
    pub storage_key: String,
    pub part_size: u64,
    /// part number -> etag; entries are never replaced or removed
    #[serde(default)]
    pub uploaded_parts: BTreeMap<u32, String>,
}

impl UploadSession {
    pub fn new(fingerprint: &Fingerprint, init: InitiateResponse) -> Self {
        Self {
            fingerprint: fingerprint.as_str().to_string(),
            upload_id: init.upload_id,
            storage_key: init.key,
            part_size: init.part_size,
            uploaded_parts: BTreeMap::new(),
        }
    }

    pub fn is_recorded(&self, part_number: u32) -> bool {
        self.uploaded_parts.contains_key(&part_number)
    }

    /// Record a part's etag. Returns false if the part was already recorded.
    pub fn record_part(&mut self, part_number: u32, etag: String) -> bool {
        if self.is_recorded(part_number) {
            return false;
        }
        self.uploaded_parts.insert(part_number, etag);
        true
    }

    /// Recorded parts in ascending part order
    pub fn part_records(&self) -> Vec<PartRecord> {
        self.uploaded_parts
            .iter()
            .map(|(&part_number, etag)| PartRecord {
                part_number,
                etag: etag.clone(),
            })
            .collect()
    }
}

/// Key-value store of sessions by fingerprint
#[async_trait]
pub trait UploadStateStore: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<UploadSession>, StateError>;

    async fn put(&self, session: &UploadSession) -> Result<(), StateError>;

    /// Remove a session; removing an absent session succeeds
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<(), StateError>;
}

/// Process-local state, lost on exit
#[derive(Default)]
pub struct MemoryStateStore {
    sessions: DashMap<String, UploadSession>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Current copy of a session, readable outside an async context
    pub fn session(&self, fingerprint: &Fingerprint) -> Option<UploadSession> {
        self.sessions
            .get(fingerprint.as_str())
            .map(|s| s.value().clone())
    }
}

#[async_trait]
impl UploadStateStore for MemoryStateStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<UploadSession>, StateError> {
        Ok(self
            .sessions
            .get(fingerprint.as_str())
            .map(|s| s.value().clone()))
    }

    async fn put(&self, session: &UploadSession) -> Result<(), StateError> {
        self.sessions
            .insert(session.fingerprint.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<(), StateError> {
        self.sessions.remove(fingerprint.as_str());
        Ok(())
    }
}

/// One JSON document per session in a directory.
///
/// File names are the SHA-256 of the fingerprint, so arbitrary file names
/// never reach the filesystem. Writes go through a temporary file and a
/// rename.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        let digest = Sha256::digest(fingerprint.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }
}

#[async_trait]
impl UploadStateStore for FileStateStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<UploadSession>, StateError> {
        let path = self.path_for(fingerprint.as_str());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<UploadSession>(&bytes) {
            Ok(session) if session.fingerprint == fingerprint.as_str() => Ok(Some(session)),
            Ok(_) => {
                warn!("Session file {:?} belongs to another fingerprint, ignoring", path);
                Ok(None)
            }
            Err(e) => {
                warn!("Unreadable session file {:?}, starting fresh: {}", path, e);
                Ok(None)
            }
        }
    }

    async fn put(&self, session: &UploadSession) -> Result<(), StateError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&session.fingerprint);
        let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4().simple()));

        let json = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(
            "Persisted session {} with {} parts",
            session.upload_id,
            session.uploaded_parts.len()
        );
        Ok(())
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<(), StateError> {
        match tokio::fs::remove_file(self.path_for(fingerprint.as_str())).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
