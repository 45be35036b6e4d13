pub mod audit;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod orchestrator;
pub mod protocol;
pub mod sequencer;
pub mod session;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, LoadOptions, SnapshotBackend};
pub use context::{
    ContextSnapshot, InMemorySnapshotSink, JsonFileSnapshotSink, SessionSnapshot, SnapshotError,
    SnapshotSink, StepMarker, TransactionContext, TransactionHistory,
};
pub use domain::{
    Domain, DomainDetails, DomainDetailsPatch, Step, StepParams, StepRequest, UserDetails,
    UserDetailsPatch,
};
pub use errors::{ApplicationError, InterfaceError, StepError};
pub use orchestrator::{NextDomain, Orchestrator, StatusVocabulary};
pub use protocol::{ProtocolClient, RemoteCallError};
pub use sequencer::{StepApproval, StepSequencer, StepState};
pub use session::{Session, StepOutcome};
