//! Caller-facing entry point: one session owns one context, its sequencer and
//! the cross-domain orchestrator, and runs steps against per-domain protocol
//! clients.
//!
//! A step mutates nothing until its remote call has returned successfully, so
//! dropping a `run_step` future mid-call leaves the session exactly as it was.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::context::{SessionSnapshot, SnapshotSink, StepMarker, TransactionContext};
use crate::domain::{Domain, DomainDetailsPatch, Step, StepParams, StepRequest, UserDetailsPatch};
use crate::errors::{ApplicationError, StepError};
use crate::orchestrator::{NextDomain, Orchestrator, StatusVocabulary};
use crate::protocol::{self, ProtocolClient};
use crate::sequencer::{StepApproval, StepSequencer, StepState};

/// Result of one successful step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepOutcome {
    pub domain: Domain,
    pub step: Step,
    pub state: StepState,
    pub replay: bool,
    pub domain_finished: bool,
    pub next_domain: NextDomain,
    pub response: Value,
    /// Set when the step succeeded but its snapshot could not be persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_error: Option<String>,
}

pub struct Session {
    id: String,
    context: TransactionContext,
    sequencer: StepSequencer,
    orchestrator: Orchestrator,
    last_step: Option<StepMarker>,
    clients: BTreeMap<Domain, Arc<dyn ProtocolClient>>,
    snapshot_sink: Option<Arc<dyn SnapshotSink>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    enforce_domain_order: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("sequencer", &self.sequencer)
            .field("orchestrator", &self.orchestrator)
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("enforce_domain_order", &self.enforce_domain_order)
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: TransactionContext::new(),
            sequencer: StepSequencer::new(),
            orchestrator: Orchestrator::new(),
            last_step: None,
            clients: BTreeMap::new(),
            snapshot_sink: None,
            audit_sink: None,
            enforce_domain_order: true,
        }
    }

    pub fn with_client(mut self, domain: Domain, client: Arc<dyn ProtocolClient>) -> Self {
        self.clients.insert(domain, client);
        self
    }

    pub fn with_snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = Some(sink);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn with_domain_order(mut self, enforce: bool) -> Self {
        self.enforce_domain_order = enforce;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: StatusVocabulary) -> Self {
        let finished = self.orchestrator.finished_domains();
        self.orchestrator = Orchestrator::with_vocabulary(vocabulary);
        self.orchestrator.restore(&finished);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn state(&self, domain: Domain) -> StepState {
        self.sequencer.state(domain)
    }

    pub fn next_domain(&self) -> NextDomain {
        self.orchestrator.next_domain()
    }

    pub fn update_user_details(&mut self, patch: UserDetailsPatch) {
        self.context.update_user_details(patch);
    }

    pub fn update_domain_details(&mut self, domain: Domain, patch: DomainDetailsPatch) {
        self.context.update_domain_details(domain, patch);
    }

    pub fn copy_user_details_into(&mut self, domain: Domain) {
        self.context.copy_user_details_into(domain);
    }

    /// Parses string names at the boundary, then runs the step.
    pub async fn run_named_step(
        &mut self,
        domain: &str,
        step: &str,
        params: StepParams,
    ) -> Result<StepOutcome, StepError> {
        let domain: Domain = domain.parse()?;
        let step: Step = step.parse()?;
        self.run_step(domain, step, params).await
    }

    pub async fn run_step(
        &mut self,
        domain: Domain,
        step: Step,
        params: StepParams,
    ) -> Result<StepOutcome, StepError> {
        let audit = AuditContext::new(Some(self.id.clone()), Uuid::new_v4().to_string(), "session");

        if self.enforce_domain_order {
            if let Err(error) = self.orchestrator.admit(domain, step) {
                self.emit(
                    AuditEvent::new(
                        &audit,
                        Some(domain),
                        "orchestrator.domain_rejected",
                        AuditCategory::Orchestration,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("step", step.as_str())
                    .with_metadata("admitted", self.orchestrator.next_domain().to_string()),
                );
                return Err(error);
            }
        }

        let params = params.merged_over(self.context.step_defaults(domain, step));
        let approval = self.approve(domain, step, &params, &audit)?;
        let request = StepRequest::from_params(step, &params)
            .map_err(|missing| StepError::MissingParameter { domain, step, missing })?;
        let client =
            Arc::clone(self.clients.get(&domain).ok_or(StepError::ClientNotConfigured(domain))?);

        let response = match protocol::dispatch(client.as_ref(), &request).await {
            Ok(response) => response,
            Err(source) => {
                warn!(
                    event_name = "session.step.remote_failed",
                    session_id = %self.id,
                    correlation_id = %audit.correlation_id,
                    domain = %domain,
                    step = %step,
                    error = %source,
                    "protocol call failed; session left unchanged"
                );
                self.emit(
                    AuditEvent::new(
                        &audit,
                        Some(domain),
                        "session.step_failed",
                        AuditCategory::Protocol,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("step", step.as_str())
                    .with_metadata("error", source.to_string()),
                );
                return Err(StepError::Remote { domain, step, source });
            }
        };

        self.context.commit_step(domain, step, &params, response.clone())?;
        self.sequencer.advance(&approval);
        self.last_step = Some(StepMarker { domain, step });

        let state = self.sequencer.state(domain);
        let domain_finished = if step == Step::Status {
            self.orchestrator.observe_status(domain, state, &response)
        } else {
            self.orchestrator.is_finished(domain)
        };

        info!(
            event_name = "session.step.completed",
            session_id = %self.id,
            correlation_id = %audit.correlation_id,
            domain = %domain,
            step = %step,
            state = ?state,
            replay = approval.replay,
            domain_finished,
            "protocol step completed"
        );
        self.emit(
            AuditEvent::new(
                &audit,
                Some(domain),
                "session.step_completed",
                AuditCategory::Protocol,
                AuditOutcome::Success,
            )
            .with_metadata("step", step.as_str())
            .with_metadata("state", format!("{state:?}")),
        );

        let snapshot_error = match self.persist_snapshot().await {
            Ok(()) => None,
            Err(error) => {
                warn!(
                    event_name = "session.snapshot.failed",
                    session_id = %self.id,
                    correlation_id = %audit.correlation_id,
                    error = %error,
                    "snapshot persistence failed; continuing"
                );
                Some(error.to_string())
            }
        };

        Ok(StepOutcome {
            domain,
            step,
            state,
            replay: approval.replay,
            domain_finished,
            next_domain: self.orchestrator.next_domain(),
            response,
            snapshot_error,
        })
    }

    fn approve(
        &self,
        domain: Domain,
        step: Step,
        params: &StepParams,
        audit: &AuditContext,
    ) -> Result<StepApproval, StepError> {
        match &self.audit_sink {
            Some(sink) => self.sequencer.validate_with_audit(
                &self.context,
                domain,
                step,
                params,
                sink.as_ref(),
                audit,
            ),
            None => self.sequencer.validate(&self.context, domain, step, params),
        }
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit_sink {
            sink.emit(event);
        }
    }

    async fn persist_snapshot(&self) -> Result<(), ApplicationError> {
        let Some(sink) = &self.snapshot_sink else {
            return Ok(());
        };
        sink.persist(&self.snapshot())
            .await
            .map_err(|error| ApplicationError::Snapshot(error.to_string()))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            captured_at: Utc::now(),
            last_step: self.last_step.clone(),
            context: self.context.snapshot(),
            finished_domains: self.orchestrator.finished_domains(),
        }
    }

    /// Replaces context, sequencer state and finished lanes with those captured in `snapshot`.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        let SessionSnapshot { session_id, last_step, context, finished_domains, .. } = snapshot;
        self.id = session_id;
        self.context = TransactionContext::from_snapshot(context);
        self.sequencer = StepSequencer::from_context(&self.context);
        self.orchestrator.restore(&finished_domains);
        self.last_step = last_step;
        info!(
            event_name = "session.restored",
            session_id = %self.id,
            next_domain = %self.orchestrator.next_domain(),
            "session restored from snapshot"
        );
    }

    pub fn reset(&mut self) {
        self.context.reset();
        self.sequencer.reset();
        self.orchestrator.reset();
        self.last_step = None;
        info!(event_name = "session.reset", session_id = %self.id, "session reset");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::Session;
    use crate::audit::InMemoryAuditSink;
    use crate::context::{InMemorySnapshotSink, SessionSnapshot, SnapshotError, SnapshotSink};
    use crate::domain::{params, Domain, Step, StepParams, UserDetailsPatch};
    use crate::errors::StepError;
    use crate::orchestrator::NextDomain;
    use crate::protocol::{ProtocolClient, RemoteCallError};
    use crate::sequencer::StepState;

    #[derive(Default)]
    struct StubClient {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        status_code: Option<&'static str>,
        fail: bool,
    }

    impl StubClient {
        fn finishing() -> Self {
            Self { status_code: Some("COMPLETED"), ..Self::default() }
        }

        fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }

        fn answer(&self, call: String, response: Value) -> Result<Value, RemoteCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(call.clone());
            }
            if self.fail {
                return Err(RemoteCallError::Transport {
                    action: call,
                    message: "connection refused".to_string(),
                });
            }
            Ok(response)
        }
    }

    #[async_trait]
    impl ProtocolClient for StubClient {
        async fn search(&self) -> Result<Value, RemoteCallError> {
            self.answer("search".to_string(), json!({"responses": [{"message": {"catalog": {}}}]}))
        }

        async fn select(&self, provider_id: &str, item_id: &str) -> Result<Value, RemoteCallError> {
            self.answer(format!("select:{provider_id}:{item_id}"), json!({"responses": []}))
        }

        async fn init(&self, provider_id: &str, item_id: &str) -> Result<Value, RemoteCallError> {
            self.answer(
                format!("init:{provider_id}:{item_id}"),
                json!({"responses": [{
                    "context": {"transaction_id": "txn_9"},
                    "message": {"order": {"fulfillments": [{"id": "ful_1"}]}}
                }]}),
            )
        }

        async fn confirm(
            &self,
            provider_id: &str,
            item_id: &str,
            fulfillment_id: &str,
            customer_name: &str,
            _customer_phone: &str,
            _customer_email: &str,
        ) -> Result<Value, RemoteCallError> {
            self.answer(
                format!("confirm:{provider_id}:{item_id}:{fulfillment_id}:{customer_name}"),
                json!({"responses": [{"message": {"order": {"id": "order_77"}}}]}),
            )
        }

        async fn status(&self, order_id: &str) -> Result<Value, RemoteCallError> {
            let code = self.status_code.unwrap_or("PENDING");
            self.answer(
                format!("status:{order_id}"),
                json!({"responses": [{"message": {"order": {
                    "fulfillments": [{"state": {"descriptor": {"code": code}}}]
                }}}]}),
            )
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl SnapshotSink for BrokenSink {
        async fn persist(&self, _snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
            Err(SnapshotError::Backend("disk full".to_string()))
        }
    }

    fn item() -> StepParams {
        StepParams::new().with(params::PROVIDER_ID, "prov_1").with(params::ITEM_ID, "item_1")
    }

    fn confirm_params() -> StepParams {
        item()
            .with(params::FULFILLMENT_ID, "ful_1")
            .with(params::CUSTOMER_NAME, "Lisa")
            .with(params::CUSTOMER_PHONE, "876756454")
            .with(params::CUSTOMER_EMAIL, "lisa@example.com")
    }

    fn session_with(domain: Domain, client: Arc<StubClient>) -> Session {
        Session::with_id("session-test").with_client(domain, client).with_domain_order(false)
    }

    #[tokio::test]
    async fn connection_scenario_end_to_end() {
        let client = Arc::new(StubClient::default());
        let mut session = session_with(Domain::Connection, client.clone());

        session.run_step(Domain::Connection, Step::Search, StepParams::new()).await.expect("search");
        assert!(session.context().get_step_result(Domain::Connection, Step::Search).is_some());

        let selected =
            session.run_step(Domain::Connection, Step::Select, item()).await.expect("select");
        assert_eq!(selected.state, StepState::Selected);

        let error = session
            .run_step(Domain::Connection, Step::Confirm, confirm_params())
            .await
            .expect_err("confirm before init");
        assert_eq!(
            error,
            StepError::OutOfSequence {
                domain: Domain::Connection,
                requested: Step::Confirm,
                missing: Step::Init,
            }
        );
        assert_eq!(client.calls(), 2);

        session.run_step(Domain::Connection, Step::Init, item()).await.expect("init");

        let error = session
            .run_step(
                Domain::Connection,
                Step::Status,
                StepParams::new().with(params::ORDER_ID, "txn_9"),
            )
            .await
            .expect_err("status before confirm");
        assert!(matches!(error, StepError::OutOfSequence { missing: Step::Confirm, .. }));
        assert_eq!(client.calls(), 3);

        session.run_step(Domain::Connection, Step::Confirm, confirm_params()).await.expect("confirm");

        for _ in 0..2 {
            let outcome = session
                .run_step(
                    Domain::Connection,
                    Step::Status,
                    StepParams::new().with(params::ORDER_ID, "txn_9"),
                )
                .await
                .expect("status is re-callable");
            assert_eq!(outcome.state, StepState::StatusChecked);
        }

        // search, select, init, confirm and two status polls
        assert_eq!(client.calls(), 6);
        assert_eq!(client.seen().last().map(String::as_str), Some("status:txn_9"));
    }

    #[tokio::test]
    async fn missing_parameters_never_reach_the_client() {
        let client = Arc::new(StubClient::default());
        let mut session = session_with(Domain::SolarRetail, client.clone());
        session.run_step(Domain::SolarRetail, Step::Search, StepParams::new()).await.expect("search");

        let error = session
            .run_step(
                Domain::SolarRetail,
                Step::Select,
                StepParams::new().with(params::PROVIDER_ID, "prov_1"),
            )
            .await
            .expect_err("item_id missing");

        assert_eq!(
            error,
            StepError::MissingParameter {
                domain: Domain::SolarRetail,
                step: Step::Select,
                missing: vec!["item_id".to_string()],
            }
        );
        assert_eq!(client.calls(), 1);
        assert_eq!(session.state(Domain::SolarRetail), StepState::Searched);
    }

    #[tokio::test]
    async fn identifiers_from_earlier_steps_fill_later_parameters() {
        let client = Arc::new(StubClient::default());
        let mut session = session_with(Domain::SolarService, client.clone());
        session.update_user_details(UserDetailsPatch {
            name: Some("Lisa".to_string()),
            phone: Some("876756454".to_string()),
            email: Some("lisa@example.com".to_string()),
            ..UserDetailsPatch::default()
        });
        session.copy_user_details_into(Domain::SolarService);

        session.run_step(Domain::SolarService, Step::Search, StepParams::new()).await.expect("search");
        session.run_step(Domain::SolarService, Step::Select, item()).await.expect("select");
        session.run_step(Domain::SolarService, Step::Init, StepParams::new()).await.expect("init");
        assert_eq!(session.context().get_order_identifier(Domain::SolarService), Some("txn_9"));

        session
            .run_step(Domain::SolarService, Step::Confirm, StepParams::new())
            .await
            .expect("confirm from stored details");
        session.run_step(Domain::SolarService, Step::Status, StepParams::new()).await.expect("status");

        assert_eq!(
            client.seen(),
            vec![
                "search".to_string(),
                "select:prov_1:item_1".to_string(),
                "init:prov_1:item_1".to_string(),
                "confirm:prov_1:item_1:ful_1:Lisa".to_string(),
                "status:order_77".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn reselecting_after_init_requires_a_fresh_init_before_confirm() {
        let client = Arc::new(StubClient::default());
        let mut session = session_with(Domain::Connection, client.clone());
        session.run_step(Domain::Connection, Step::Search, StepParams::new()).await.expect("search");
        session.run_step(Domain::Connection, Step::Select, item()).await.expect("select");
        session.run_step(Domain::Connection, Step::Init, StepParams::new()).await.expect("init");

        let reselected = session
            .run_step(
                Domain::Connection,
                Step::Select,
                StepParams::new().with(params::PROVIDER_ID, "prov_2").with(params::ITEM_ID, "item_2"),
            )
            .await
            .expect("replayed select");
        assert!(reselected.replay);
        assert_eq!(reselected.state, StepState::Initialized);

        let confirm = StepParams::new()
            .with(params::CUSTOMER_NAME, "Lisa")
            .with(params::CUSTOMER_PHONE, "876756454")
            .with(params::CUSTOMER_EMAIL, "lisa@example.com");
        let error = session
            .run_step(Domain::Connection, Step::Confirm, confirm.clone())
            .await
            .expect_err("fulfillment of the old selection is gone");
        assert_eq!(
            error,
            StepError::MissingParameter {
                domain: Domain::Connection,
                step: Step::Confirm,
                missing: vec!["fulfillment_id".to_string()],
            }
        );
        assert_eq!(client.calls(), 4);

        session.run_step(Domain::Connection, Step::Init, StepParams::new()).await.expect("init again");
        session.run_step(Domain::Connection, Step::Confirm, confirm).await.expect("confirm");

        assert_eq!(
            client.seen()[4..],
            ["init:prov_2:item_2".to_string(), "confirm:prov_2:item_2:ful_1:Lisa".to_string()]
        );
    }

    #[tokio::test]
    async fn remote_failure_leaves_session_unchanged() {
        let client = Arc::new(StubClient::failing());
        let mut session = session_with(Domain::Subsidy, client.clone());
        let before = session.context().clone();

        let error = session
            .run_step(Domain::Subsidy, Step::Search, StepParams::new())
            .await
            .expect_err("remote failure");

        assert!(matches!(error, StepError::Remote { domain: Domain::Subsidy, step: Step::Search, .. }));
        assert_eq!(session.context(), &before);
        assert_eq!(session.state(Domain::Subsidy), StepState::NotStarted);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn domain_without_client_is_reported() {
        let mut session = Session::with_id("s").with_domain_order(false);
        let error = session
            .run_step(Domain::Connection, Step::Search, StepParams::new())
            .await
            .expect_err("no client");
        assert_eq!(error, StepError::ClientNotConfigured(Domain::Connection));
    }

    #[tokio::test]
    async fn domains_run_in_order_and_finish_on_terminal_status() {
        let connection = Arc::new(StubClient::finishing());
        let retail = Arc::new(StubClient::default());
        let mut session = Session::with_id("ordered")
            .with_client(Domain::Connection, connection)
            .with_client(Domain::SolarRetail, retail.clone());

        let error = session
            .run_step(Domain::SolarRetail, Step::Search, StepParams::new())
            .await
            .expect_err("retail before connection");
        assert_eq!(
            error,
            StepError::OutOfOrderDomain {
                requested: Domain::SolarRetail,
                admitted: NextDomain::Domain(Domain::Connection),
            }
        );
        assert_eq!(retail.calls(), 0);

        session.run_step(Domain::Connection, Step::Search, StepParams::new()).await.expect("search");
        session.run_step(Domain::Connection, Step::Select, item()).await.expect("select");
        session.run_step(Domain::Connection, Step::Init, item()).await.expect("init");
        session.run_step(Domain::Connection, Step::Confirm, confirm_params()).await.expect("confirm");
        let outcome =
            session.run_step(Domain::Connection, Step::Status, StepParams::new()).await.expect("status");

        assert!(outcome.domain_finished);
        assert_eq!(outcome.next_domain, NextDomain::Domain(Domain::SolarRetail));
        session
            .run_step(Domain::Connection, Step::Status, StepParams::new())
            .await
            .expect("finished domain may re-poll status");
        session.run_step(Domain::SolarRetail, Step::Search, StepParams::new()).await.expect("retail");
    }

    #[tokio::test]
    async fn snapshots_follow_each_step_and_failures_are_not_fatal() {
        let sink = InMemorySnapshotSink::default();
        let client = Arc::new(StubClient::default());
        let mut session =
            session_with(Domain::Connection, client.clone()).with_snapshot_sink(Arc::new(sink.clone()));

        session.run_step(Domain::Connection, Step::Search, StepParams::new()).await.expect("search");
        let selected = session.run_step(Domain::Connection, Step::Select, item()).await.expect("select");
        assert_eq!(selected.snapshot_error, None);

        let snapshots = sink.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].last_step.as_ref().map(|marker| marker.step), Some(Step::Select));

        let mut broken = session_with(Domain::Connection, client).with_snapshot_sink(Arc::new(BrokenSink));
        let outcome = broken
            .run_step(Domain::Connection, Step::Search, StepParams::new())
            .await
            .expect("snapshot failure does not fail the step");
        assert_eq!(
            outcome.snapshot_error.as_deref(),
            Some("snapshot failure: snapshot backend failure: disk full")
        );
        assert_eq!(broken.state(Domain::Connection), StepState::Searched);
    }

    #[tokio::test]
    async fn restore_resumes_sequencer_and_lanes() {
        let client = Arc::new(StubClient::default());
        let mut session = session_with(Domain::Connection, client.clone());
        session.run_step(Domain::Connection, Step::Search, StepParams::new()).await.expect("search");
        session.run_step(Domain::Connection, Step::Select, item()).await.expect("select");
        let snapshot = session.snapshot();

        let mut resumed = session_with(Domain::Connection, client);
        resumed.restore(snapshot);

        assert_eq!(resumed.id(), "session-test");
        assert_eq!(resumed.state(Domain::Connection), StepState::Selected);
        resumed.run_step(Domain::Connection, Step::Init, StepParams::new()).await.expect("init");

        resumed.reset();
        assert_eq!(resumed.state(Domain::Connection), StepState::NotStarted);
        assert!(resumed.context().history(Domain::Connection).is_empty());
    }

    #[tokio::test]
    async fn named_steps_reject_unknown_names() {
        let mut session = Session::with_id("names").with_domain_order(false);
        let error = session
            .run_named_step("wind_farm", "search", StepParams::new())
            .await
            .expect_err("unknown domain");
        assert_eq!(error, StepError::UnknownDomain("wind_farm".to_string()));

        let error = session
            .run_named_step("connection", "cancel", StepParams::new())
            .await
            .expect_err("unknown step");
        assert_eq!(error, StepError::UnknownStep("cancel".to_string()));
    }

    #[tokio::test]
    async fn audit_sink_sees_rejections_and_completions() {
        let audit = InMemoryAuditSink::default();
        let client = Arc::new(StubClient::default());
        let mut session = Session::with_id("audited")
            .with_client(Domain::Connection, client)
            .with_audit_sink(Arc::new(audit.clone()));

        let _ = session.run_step(Domain::Subsidy, Step::Search, StepParams::new()).await;
        session.run_step(Domain::Connection, Step::Search, StepParams::new()).await.expect("search");

        let kinds: Vec<String> = audit.events().into_iter().map(|event| event.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                "orchestrator.domain_rejected".to_string(),
                "sequencer.step_approved".to_string(),
                "session.step_completed".to_string(),
            ]
        );
    }
}
