use anyhow::{Context, Result};
use homie_core::Session;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::tools::{ToolError, ToolRegistry};

/// A named tool invocation, e.g. `{"name": "connection_select", "arguments": {...}}`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolOutcome {
    Completed { tool: String, response: Value },
    Rejected {
        tool: String,
        error_class: String,
        message: String,
        user_message: String,
        correlation_id: String,
    },
}

impl ToolOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

pub struct AgentRuntime {
    session: Session,
    tools: ToolRegistry,
}

impl AgentRuntime {
    pub fn new(session: Session, tools: ToolRegistry) -> Self {
        Self { session, tools }
    }

    pub fn with_standard_tools(session: Session) -> Self {
        Self::new(session, ToolRegistry::standard())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs the named tool. Validation and remote failures come back as `Rejected`.
    pub async fn dispatch(&mut self, call: ToolCall) -> ToolOutcome {
        let ToolCall { name, arguments } = call;
        let result = match self.tools.get(&name) {
            Some(tool) => tool.execute(&mut self.session, arguments).await,
            None => Err(ToolError::UnknownTool(name.clone())),
        };

        match result {
            Ok(response) => {
                info!(
                    event_name = "agent.tool.completed",
                    session_id = %self.session.id(),
                    tool = %name,
                    "tool call completed"
                );
                ToolOutcome::Completed { tool: name, response }
            }
            Err(error) => {
                let correlation_id = Uuid::new_v4().to_string();
                let error_class = error.error_class().to_string();
                info!(
                    event_name = "agent.tool.rejected",
                    session_id = %self.session.id(),
                    correlation_id = %correlation_id,
                    tool = %name,
                    error_class = %error_class,
                    error = %error,
                    "tool call rejected"
                );
                let message = error.to_string();
                let interface = error.into_interface(correlation_id);
                ToolOutcome::Rejected {
                    tool: name,
                    error_class,
                    message,
                    user_message: interface.user_message().to_string(),
                    correlation_id: interface.correlation_id().to_string(),
                }
            }
        }
    }

    pub async fn handle_tool_call_json(&mut self, raw: &str) -> Result<ToolOutcome> {
        let call: ToolCall = serde_json::from_str(raw).context("tool call must be a JSON object")?;
        Ok(self.dispatch(call).await)
    }
}
