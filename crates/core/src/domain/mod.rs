pub mod details;
pub mod step;
pub mod workflow;

pub use details::{DomainDetails, DomainDetailsPatch, UserDetails, UserDetailsPatch};
pub use step::{params, Step, StepParams, StepRequest};
pub use workflow::Domain;
