use std::fs;
use std::io::ErrorKind;

use homie_core::config::LoadOptions;

use crate::commands::{load_config, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("reset", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let path = &config.session.session_file;
    match fs::remove_file(path) {
        Ok(()) => CommandResult::success("reset", format!("removed session `{}`", path.display())),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            CommandResult::success("reset", "no stored session")
        }
        Err(error) => CommandResult::failure(
            "reset",
            "session_store",
            format!("could not remove `{}`: {error}", path.display()),
            4,
        ),
    }
}
