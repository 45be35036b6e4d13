pub mod config;
pub mod doctor;
pub mod migrate;
pub mod profile;
pub mod reset;
pub mod show;
pub mod step;

use homie_core::config::{AppConfig, LoadOptions};
use homie_core::context::snapshot::{read_snapshot, write_snapshot};
use homie_core::{ApplicationError, InterfaceError, Session};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            user_message: None,
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            user_message: None,
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Failure that also carries the caller-facing message and a fresh correlation id.
    pub fn application_failure(
        command: &str,
        error_class: &str,
        error: ApplicationError,
        exit_code: u8,
    ) -> Self {
        let message = error.to_string();
        let interface: InterfaceError = error.into_interface(Uuid::new_v4().to_string());
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message,
            user_message: Some(interface.user_message().to_string()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::application_failure(
            command,
            "config_validation",
            ApplicationError::Configuration(error.to_string()),
            2,
        )
    })
}

pub(crate) fn current_thread_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Session restored from the configured session file, without clients or sinks.
pub(crate) fn load_session(command: &str, config: &AppConfig) -> Result<Session, CommandResult> {
    let mut session = Session::new()
        .with_domain_order(config.session.enforce_domain_order)
        .with_vocabulary(config.session.vocabulary());

    let stored = read_snapshot(&config.session.session_file).map_err(|error| {
        CommandResult::failure(command, "session_store", format!("could not load session: {error}"), 4)
    })?;
    if let Some(snapshot) = stored {
        session.restore(snapshot);
    }
    Ok(session)
}

pub(crate) fn save_session(
    command: &str,
    config: &AppConfig,
    session: &Session,
) -> Result<(), CommandResult> {
    write_snapshot(&config.session.session_file, &session.snapshot()).map_err(|error| {
        CommandResult::failure(command, "session_store", format!("could not save session: {error}"), 4)
    })
}

/// JSON view of a session for command output.
pub(crate) fn session_view(session: &Session) -> Value {
    let snapshot = session.snapshot();
    let states: serde_json::Map<String, Value> = homie_core::Domain::ALL
        .iter()
        .map(|domain| {
            let state = serde_json::to_value(session.state(*domain)).unwrap_or(Value::Null);
            (domain.to_string(), state)
        })
        .collect();

    serde_json::json!({
        "session_id": session.id(),
        "next_domain": session.next_domain(),
        "states": states,
        "finished_domains": snapshot.finished_domains,
        "last_step": snapshot.last_step,
        "user_details": snapshot.context.user_details,
        "domain_details": snapshot.context.domain_details,
    })
}
