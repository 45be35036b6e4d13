use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::TransactionHistory;
use crate::domain::{Domain, DomainDetails, Step, UserDetails};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub user_details: UserDetails,
    pub domain_details: BTreeMap<Domain, DomainDetails>,
    pub transaction_history: BTreeMap<Domain, TransactionHistory>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepMarker {
    pub domain: Domain,
    pub step: Step,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub captured_at: DateTime<Utc>,
    pub last_step: Option<StepMarker>,
    #[serde(flatten)]
    pub context: ContextSnapshot,
    #[serde(default)]
    pub finished_domains: Vec<Domain>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("could not write snapshot `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("could not read snapshot `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot backend failure: {0}")]
    Backend(String),
}

/// Receives a snapshot after each completed step. Failures are logged by the caller, never escalated.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError>;
}

#[derive(Clone, Default)]
pub struct InMemorySnapshotSink {
    snapshots: Arc<Mutex<Vec<SessionSnapshot>>>,
}

impl InMemorySnapshotSink {
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        match self.snapshots.lock() {
            Ok(snapshots) => snapshots.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SnapshotSink for InMemorySnapshotSink {
    async fn persist(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        match self.snapshots.lock() {
            Ok(mut snapshots) => snapshots.push(snapshot.clone()),
            Err(poisoned) => poisoned.into_inner().push(snapshot.clone()),
        }
        Ok(())
    }
}

/// Writes `context_store_{domain}_{step}.json` per step plus `latest.json` into one directory.
#[derive(Clone, Debug)]
pub struct JsonFileSnapshotSink {
    directory: PathBuf,
}

impl JsonFileSnapshotSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn latest_path(&self) -> PathBuf {
        self.directory.join("latest.json")
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSnapshotSink {
    async fn persist(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| SnapshotError::Write { path: self.directory.clone(), source })?;

        let raw = serde_json::to_string_pretty(snapshot)?;
        if let Some(marker) = &snapshot.last_step {
            let path =
                self.directory.join(format!("context_store_{}_{}.json", marker.domain, marker.step));
            write_file(&path, &raw).await?;
        }
        write_file(&self.latest_path(), &raw).await
    }
}

async fn write_file(path: &Path, raw: &str) -> Result<(), SnapshotError> {
    tokio::fs::write(path, raw)
        .await
        .map_err(|source| SnapshotError::Write { path: path.to_path_buf(), source })
}

pub fn write_snapshot(path: &Path, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|source| SnapshotError::Write { path: parent.to_path_buf(), source })?;
    }
    let raw = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, raw).map_err(|source| SnapshotError::Write { path: path.to_path_buf(), source })
}

/// Reads a snapshot file; a missing file is not an error.
pub fn read_snapshot(path: &Path) -> Result<Option<SessionSnapshot>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|source| SnapshotError::Read { path: path.to_path_buf(), source })?;
    Ok(Some(serde_json::from_str(&raw)?))
}
