use async_trait::async_trait;
use homie_core::SessionSnapshot;
use thiserror::Error;

pub mod snapshot;

pub use snapshot::{SnapshotRecord, SqlSnapshotRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Stores one snapshot and returns its row id.
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<String, RepositoryError>;

    async fn latest_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionSnapshot>, RepositoryError>;

    /// Newest first.
    async fn list_for_session(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<SnapshotRecord>, RepositoryError>;
}
