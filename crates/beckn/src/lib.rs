//! Beckn BAP client for the four workflow domains.
//!
//! Every action is a JSON POST to `{base_url}/{action}` carrying a `context`
//! block (network identity, location, fresh transaction and message ids) and
//! an action-specific `message`.

pub mod client;
pub mod payload;
pub mod profile;

pub use client::{clients_for, BapClient, BapSettings, BecknError};
pub use profile::DomainProfile;
