use homie_core::config::LoadOptions;

use crate::commands::{load_config, load_session, session_view, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("show", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let session = match load_session("show", &config) {
        Ok(session) => session,
        Err(failure) => return failure,
    };

    let message = format!("next admitted domain: {}", session.next_domain());
    CommandResult::success_with_data("show", message, Some(session_view(&session)))
}
