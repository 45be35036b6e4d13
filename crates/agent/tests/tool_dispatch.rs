use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use homie_agent::{AgentRuntime, ToolCall, ToolOutcome};
use homie_core::{Domain, ProtocolClient, RemoteCallError, Session, Step, StepState};
use serde_json::{json, Value};

#[derive(Default)]
struct CountingClient {
    calls: AtomicUsize,
}

impl CountingClient {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProtocolClient for CountingClient {
    async fn search(&self) -> Result<Value, RemoteCallError> {
        self.hit();
        Ok(json!({"message": {"catalog": {"providers": [{"id": "prov_1"}]}}}))
    }

    async fn select(&self, provider_id: &str, _: &str) -> Result<Value, RemoteCallError> {
        self.hit();
        Ok(json!({"message": {"order": {"provider": {"id": provider_id}}}}))
    }

    async fn init(&self, _: &str, _: &str) -> Result<Value, RemoteCallError> {
        self.hit();
        Ok(json!({
            "context": {"transaction_id": "txn_1"},
            "message": {"order": {"fulfillments": [{"id": "ful_1"}]}}
        }))
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
        self.hit();
        Ok(json!({"message": {"order": {"id": "order_1"}}}))
    }

    async fn status(&self, order_id: &str) -> Result<Value, RemoteCallError> {
        self.hit();
        Ok(json!({"message": {"order": {"id": order_id, "status": "ACTIVE"}}}))
    }
}

fn runtime(client: Arc<CountingClient>) -> AgentRuntime {
    let session = Session::with_id("agent-test").with_client(Domain::Connection, client);
    AgentRuntime::with_standard_tools(session)
}

fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall { name: name.to_string(), arguments }
}

fn rejection(outcome: &ToolOutcome) -> (&str, &str) {
    match outcome {
        ToolOutcome::Rejected { error_class, message, .. } => (error_class.as_str(), message.as_str()),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn full_connection_flow_through_tool_calls() {
    let client = Arc::new(CountingClient::default());
    let mut agent = runtime(client.clone());

    let profile = agent
        .dispatch(call(
            "update_user_details",
            json!({"name": "Lisa", "phone": "876756454", "email": "lisa@example.com"}),
        ))
        .await;
    assert!(profile.is_completed());
    assert!(agent.dispatch(call("copy_user_details", json!({"domain": "connection"}))).await.is_completed());

    for (name, arguments) in [
        ("connection_search", Value::Null),
        ("connection_select", json!({"provider_id": "prov_1", "item_id": "item_1"})),
        ("connection_init", json!({})),
        ("connection_confirm", json!({})),
        ("connection_status", json!({})),
    ] {
        let outcome = agent.dispatch(call(name, arguments)).await;
        assert!(outcome.is_completed(), "{name} should complete: {outcome:?}");
    }

    assert_eq!(client.calls(), 5);
    assert_eq!(agent.session().state(Domain::Connection), StepState::StatusChecked);
    assert!(agent.session().orchestrator().is_finished(Domain::Connection));
    assert_eq!(
        agent.session().context().get_order_identifier(Domain::Connection),
        Some("order_1")
    );
}

#[tokio::test]
async fn completed_outcome_carries_step_state_and_response() {
    let client = Arc::new(CountingClient::default());
    let mut agent = runtime(client);

    let outcome = agent.dispatch(call("connection_search", json!({}))).await;
    let ToolOutcome::Completed { tool, response } = outcome else {
        panic!("search should complete");
    };

    assert_eq!(tool, "connection_search");
    assert_eq!(response["state"], "Searched");
    assert_eq!(response["response"]["message"]["catalog"]["providers"][0]["id"], "prov_1");
}

#[tokio::test]
async fn missing_parameters_are_rejected_without_remote_calls() {
    let client = Arc::new(CountingClient::default());
    let mut agent = runtime(client.clone());

    agent.dispatch(call("connection_search", json!({}))).await;
    let outcome = agent.dispatch(call("connection_select", json!({"provider_id": "prov_1"}))).await;

    let (error_class, message) = rejection(&outcome);
    assert_eq!(error_class, "missing_parameter");
    assert!(message.contains("item_id"));
    assert_eq!(client.calls(), 1);
    assert!(!agent.session().context().history(Domain::Connection).contains(Step::Select));
}

#[tokio::test]
async fn out_of_sequence_and_out_of_order_calls_are_rejected() {
    let client = Arc::new(CountingClient::default());
    let mut agent = runtime(client.clone());

    let early = agent
        .dispatch(call("connection_select", json!({"provider_id": "p", "item_id": "i"})))
        .await;
    assert_eq!(rejection(&early).0, "out_of_sequence");

    let wrong_domain = agent.dispatch(call("subsidy_search", json!({}))).await;
    assert_eq!(rejection(&wrong_domain).0, "out_of_order_domain");
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn unknown_tools_and_bad_arguments_are_rejected() {
    let mut agent = runtime(Arc::new(CountingClient::default()));

    let unknown = agent.dispatch(call("connection_checkout", json!({}))).await;
    assert_eq!(rejection(&unknown).0, "unknown_tool");

    let nested = agent
        .dispatch(call("connection_search", json!({"filters": {"city": "SF"}})))
        .await;
    assert_eq!(rejection(&nested).0, "invalid_arguments");

    let bad_domain = agent.dispatch(call("copy_user_details", json!({"domain": "wind"}))).await;
    assert_eq!(rejection(&bad_domain).0, "unknown_domain");
}

#[tokio::test]
async fn rejections_carry_a_user_message_and_correlation_id() {
    let mut agent = runtime(Arc::new(CountingClient::default()));
    let early = agent.dispatch(call("connection_confirm", json!({}))).await;
    let ToolOutcome::Rejected { user_message, correlation_id, .. } = &early else {
        panic!("expected rejection, got {early:?}");
    };
    assert_eq!(user_message, "The request could not be processed. Check inputs and try again.");
    assert!(!correlation_id.is_empty());

    let unknown = agent.dispatch(call("connection_checkout", json!({}))).await;
    let serialized = serde_json::to_value(&unknown).expect("serialize outcome");
    assert_eq!(serialized["outcome"], "rejected");
    assert_eq!(serialized["user_message"], *user_message);
    assert_ne!(serialized["correlation_id"], json!(correlation_id));

    let mut unwired = AgentRuntime::with_standard_tools(Session::with_id("no-clients"));
    let outcome = unwired.dispatch(call("connection_search", json!({}))).await;
    let ToolOutcome::Rejected { error_class, user_message, .. } = &outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(error_class, "client_not_configured");
    assert_eq!(user_message, "An unexpected internal error occurred.");
}

#[tokio::test]
async fn raw_json_tool_calls_are_parsed() {
    let mut agent = runtime(Arc::new(CountingClient::default()));

    let outcome = agent
        .handle_tool_call_json(r#"{"name": "connection_search"}"#)
        .await
        .expect("well-formed call");
    assert!(outcome.is_completed());

    assert!(agent.handle_tool_call_json("connection_search").await.is_err());
}
