use thiserror::Error;

use crate::domain::{Domain, Step};
use crate::orchestrator::NextDomain;
use crate::protocol::RemoteCallError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("{domain} {step} is missing required parameters: {missing:?}")]
    MissingParameter { domain: Domain, step: Step, missing: Vec<String> },
    #[error("{domain} {requested} requires `{missing}` to complete first")]
    OutOfSequence { domain: Domain, requested: Step, missing: Step },
    #[error("{requested} is not the admitted domain (currently admitted: {admitted})")]
    OutOfOrderDomain { requested: Domain, admitted: NextDomain },
    #[error("unknown domain `{0}`")]
    UnknownDomain(String),
    #[error("unknown step `{0}`")]
    UnknownStep(String),
    #[error("no protocol client configured for {0}")]
    ClientNotConfigured(Domain),
    #[error("{domain} {step} remote call failed: {source}")]
    Remote {
        domain: Domain,
        step: Step,
        #[source]
        source: RemoteCallError,
    },
}

impl StepError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::MissingParameter { .. } => "missing_parameter",
            Self::OutOfSequence { .. } => "out_of_sequence",
            Self::OutOfOrderDomain { .. } => "out_of_order_domain",
            Self::UnknownDomain(_) => "unknown_domain",
            Self::UnknownStep(_) => "unknown_step",
            Self::ClientNotConfigured(_) => "client_not_configured",
            Self::Remote { .. } => "remote_call",
        }
    }

    /// Validation failures that the caller can fix by re-prompting or reordering.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. } | Self::OutOfSequence { .. } | Self::OutOfOrderDomain { .. }
        )
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Step(#[from] StepError),
    #[error("snapshot failure: {0}")]
    Snapshot(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The network service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Step(error) if error.is_recoverable() => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Step(
                error @ (StepError::UnknownDomain(_) | StepError::UnknownStep(_)),
            ) => Self::BadRequest { message: error.to_string(), correlation_id },
            ApplicationError::Step(error @ StepError::Remote { .. }) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Snapshot(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Step(error) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
