use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use homie_core::{Domain, SessionSnapshot, SnapshotError, SnapshotSink, Step};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;
use uuid::Uuid;

use super::{RepositoryError, SnapshotRepository};
use crate::DbPool;

/// Index row for one stored snapshot, without the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub id: String,
    pub session_id: String,
    pub domain: Option<Domain>,
    pub step: Option<Step>,
    pub finished_domains: Vec<Domain>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SqlSnapshotRepository {
    pool: DbPool,
}

impl SqlSnapshotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for SqlSnapshotRepository {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<String, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(snapshot)
            .map_err(|error| RepositoryError::Decode(format!("snapshot payload: {error}")))?;
        let finished = serde_json::to_string(&snapshot.finished_domains)
            .map_err(|error| RepositoryError::Decode(format!("finished domains: {error}")))?;
        let marker = snapshot.last_step.as_ref();

        sqlx::query(
            r#"
            INSERT INTO session_snapshot (
                id, session_id, domain, step, finished_domains, payload_json, captured_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&snapshot.session_id)
        .bind(marker.map(|marker| marker.domain.as_str()))
        .bind(marker.map(|marker| marker.step.as_str()))
        .bind(finished)
        .bind(payload)
        .bind(snapshot.captured_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        debug!(
            event_name = "db.snapshot.saved",
            snapshot_id = %id,
            session_id = %snapshot.session_id,
            "session snapshot stored"
        );
        Ok(id)
    }

    async fn latest_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionSnapshot>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT payload_json
            FROM session_snapshot
            WHERE session_id = ?
            ORDER BY captured_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<SessionSnapshot, RepositoryError> {
            let payload: String = row.try_get("payload_json")?;
            serde_json::from_str(&payload)
                .map_err(|error| RepositoryError::Decode(format!("snapshot payload: {error}")))
        })
        .transpose()
    }

    async fn list_for_session(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<SnapshotRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, domain, step, finished_domains, captured_at
            FROM session_snapshot
            WHERE session_id = ?
            ORDER BY captured_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(snapshot_record_from_row).collect()
    }
}

#[async_trait]
impl SnapshotSink for SqlSnapshotRepository {
    async fn persist(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        self.save(snapshot)
            .await
            .map(|_| ())
            .map_err(|error| SnapshotError::Backend(error.to_string()))
    }
}

fn snapshot_record_from_row(row: &SqliteRow) -> Result<SnapshotRecord, RepositoryError> {
    let domain: Option<String> = row.try_get("domain")?;
    let step: Option<String> = row.try_get("step")?;
    let finished: String = row.try_get("finished_domains")?;
    let captured_at: String = row.try_get("captured_at")?;

    Ok(SnapshotRecord {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        domain: domain
            .map(|value| {
                value
                    .parse::<Domain>()
                    .map_err(|_| RepositoryError::Decode(format!("invalid domain: {value}")))
            })
            .transpose()?,
        step: step
            .map(|value| {
                value
                    .parse::<Step>()
                    .map_err(|_| RepositoryError::Decode(format!("invalid step: {value}")))
            })
            .transpose()?,
        finished_domains: serde_json::from_str(&finished)
            .map_err(|error| RepositoryError::Decode(format!("invalid finished_domains: {error}")))?,
        captured_at: parse_timestamp("captured_at", captured_at)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use homie_core::{
        Domain, ProtocolClient, RemoteCallError, Session, SessionSnapshot, SnapshotSink, Step,
        StepMarker, StepParams, TransactionContext,
    };
    use serde_json::{json, Value};

    use super::{SnapshotRepository, SqlSnapshotRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn snapshot(session_id: &str, step: Step, minutes: i64) -> SessionSnapshot {
        let mut context = TransactionContext::new();
        context.record_step(Domain::Connection, Step::Search, json!({"catalog": "c"})).expect("search");
        SessionSnapshot {
            session_id: session_id.to_string(),
            captured_at: Utc::now() + Duration::minutes(minutes),
            last_step: Some(StepMarker { domain: Domain::Connection, step }),
            context: context.snapshot(),
            finished_domains: vec![Domain::Connection],
        }
    }

    #[tokio::test]
    async fn latest_snapshot_round_trips_for_its_session() {
        let repo = SqlSnapshotRepository::new(setup_pool().await);
        let older = snapshot("session-a", Step::Search, 0);
        let newer = snapshot("session-a", Step::Select, 1);
        repo.save(&older).await.expect("save older");
        repo.save(&newer).await.expect("save newer");
        repo.save(&snapshot("session-b", Step::Init, 2)).await.expect("other session");

        let latest = repo.latest_for_session("session-a").await.expect("query").expect("present");
        assert_eq!(latest.session_id, "session-a");
        assert_eq!(latest.last_step, newer.last_step);
        assert_eq!(latest.context, newer.context);

        assert!(repo.latest_for_session("missing").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn list_returns_newest_first_with_markers() {
        let repo = SqlSnapshotRepository::new(setup_pool().await);
        repo.save(&snapshot("session-a", Step::Search, 0)).await.expect("save");
        repo.save(&snapshot("session-a", Step::Select, 1)).await.expect("save");

        let records = repo.list_for_session("session-a", 10).await.expect("list");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].step, Some(Step::Select));
        assert_eq!(records[0].domain, Some(Domain::Connection));
        assert_eq!(records[0].finished_domains, vec![Domain::Connection]);
        assert!(records[0].captured_at > records[1].captured_at);
    }

    struct SearchOnly;

    #[async_trait]
    impl ProtocolClient for SearchOnly {
        async fn search(&self) -> Result<Value, RemoteCallError> {
            Ok(json!({"responses": []}))
        }

        async fn select(&self, _: &str, _: &str) -> Result<Value, RemoteCallError> {
            Ok(Value::Null)
        }

        async fn init(&self, _: &str, _: &str) -> Result<Value, RemoteCallError> {
            Ok(Value::Null)
        }

        async fn confirm(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<Value, RemoteCallError> {
            Ok(Value::Null)
        }

        async fn status(&self, _: &str) -> Result<Value, RemoteCallError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn repository_works_as_a_session_snapshot_sink() {
        let repo = SqlSnapshotRepository::new(setup_pool().await);
        let sink: Arc<dyn SnapshotSink> = Arc::new(repo.clone());
        let mut session = Session::with_id("sql-session")
            .with_client(Domain::Connection, Arc::new(SearchOnly))
            .with_snapshot_sink(sink);

        session.run_step(Domain::Connection, Step::Search, StepParams::new()).await.expect("search");

        let stored = repo.latest_for_session("sql-session").await.expect("query").expect("stored");
        assert!(stored.context.transaction_history[&Domain::Connection].contains(Step::Search));
    }
}
