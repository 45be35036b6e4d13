//! Tool-call layer over a [`homie_core::Session`].
//!
//! A caller (typically an LLM with function calling) names the step it wants
//! as `<domain>_<step>` and passes scalar arguments. The runtime looks the
//! tool up, turns the arguments into step parameters and runs the step.
//! Sequencing and domain admission stay in the core: a rejected call comes
//! back as [`ToolOutcome::Rejected`] with the error class, so the caller can
//! re-prompt for missing values or complete the earlier step first.

pub mod runtime;
pub mod tools;

pub use runtime::{AgentRuntime, ToolCall, ToolOutcome};
pub use tools::{Tool, ToolError, ToolRegistry};
