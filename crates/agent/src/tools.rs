use std::collections::HashMap;

use async_trait::async_trait;
use homie_core::{
    ApplicationError, Domain, InterfaceError, Session, Step, StepError, StepParams,
    UserDetailsPatch,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error("could not encode tool result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ToolError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Step(error) => error.error_class(),
            Self::Encode(_) => "encode",
        }
    }

    /// Caller-facing form of the error; step failures go through the application layer.
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Step(error) => ApplicationError::from(error).into_interface(correlation_id),
            Self::UnknownTool(_) | Self::InvalidArguments(_) => {
                InterfaceError::BadRequest { message: self.to_string(), correlation_id }
            }
            Self::Encode(_) => InterfaceError::Internal { message: self.to_string(), correlation_id },
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Argument keys the tool needs; stored context may supply some of them.
    fn required_params(&self) -> &'static [&'static str] {
        &[]
    }

    async fn execute(&self, session: &mut Session, arguments: Value) -> Result<Value, ToolError>;
}

/// Runs one protocol step for one domain. Named `<domain>_<step>`.
pub struct StepTool {
    name: String,
    domain: Domain,
    step: Step,
}

impl StepTool {
    pub fn new(domain: Domain, step: Step) -> Self {
        Self { name: format!("{domain}_{step}"), domain, step }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn step(&self) -> Step {
        self.step
    }
}

#[async_trait]
impl Tool for StepTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_params(&self) -> &'static [&'static str] {
        self.step.required_params()
    }

    async fn execute(&self, session: &mut Session, arguments: Value) -> Result<Value, ToolError> {
        let params = params_from_arguments(arguments)?;
        let outcome = session.run_step(self.domain, self.step, params).await?;
        Ok(serde_json::to_value(outcome)?)
    }
}

pub struct UpdateUserDetailsTool;

#[async_trait]
impl Tool for UpdateUserDetailsTool {
    fn name(&self) -> &str {
        "update_user_details"
    }

    async fn execute(&self, session: &mut Session, arguments: Value) -> Result<Value, ToolError> {
        let patch: UserDetailsPatch = serde_json::from_value(object_or_empty(arguments))
            .map_err(|error| ToolError::InvalidArguments(error.to_string()))?;
        session.update_user_details(patch);
        Ok(serde_json::to_value(session.context().user_details())?)
    }
}

pub struct CopyUserDetailsTool;

#[derive(Deserialize)]
struct CopyArguments {
    domain: String,
}

#[async_trait]
impl Tool for CopyUserDetailsTool {
    fn name(&self) -> &str {
        "copy_user_details"
    }

    fn required_params(&self) -> &'static [&'static str] {
        &["domain"]
    }

    async fn execute(&self, session: &mut Session, arguments: Value) -> Result<Value, ToolError> {
        let arguments: CopyArguments = serde_json::from_value(arguments)
            .map_err(|error| ToolError::InvalidArguments(error.to_string()))?;
        let domain: Domain = arguments.domain.parse()?;
        session.copy_user_details_into(domain);
        Ok(serde_json::to_value(session.context().domain_details(domain))?)
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Every `<domain>_<step>` tool plus the two user-details tools.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        for domain in Domain::ALL {
            for step in Step::ALL {
                registry.register(StepTool::new(domain, step));
            }
        }
        registry.register(UpdateUserDetailsTool);
        registry.register(CopyUserDetailsTool);
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn object_or_empty(arguments: Value) -> Value {
    match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

/// Flattens a JSON object of scalars into step parameters. `null` values are dropped.
pub fn params_from_arguments(arguments: Value) -> Result<StepParams, ToolError> {
    let Value::Object(map) = object_or_empty(arguments) else {
        return Err(ToolError::InvalidArguments("arguments must be a JSON object".to_string()));
    };

    let mut params = StepParams::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::String(text) => params.insert(key, text),
            Value::Number(number) => params.insert(key, number.to_string()),
            Value::Bool(flag) => params.insert(key, flag.to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(ToolError::InvalidArguments(format!(
                    "argument `{key}` must be a string, number or boolean"
                )));
            }
        }
    }
    Ok(params)
}
