pub mod engine;
pub mod states;

pub use engine::StepSequencer;
pub use states::{StepApproval, StepState};
