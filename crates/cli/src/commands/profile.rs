use clap::Args;
use homie_core::config::LoadOptions;
use homie_core::{Domain, UserDetailsPatch};

use crate::commands::{load_config, load_session, save_session, session_view, CommandResult};

#[derive(Clone, Debug, Default, Args)]
pub struct ProfileArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long, value_name = "DOMAIN", help = "Copy name, phone and email into this domain's customer fields")]
    pub copy_into: Option<String>,
}

pub fn run(options: &LoadOptions, args: ProfileArgs) -> CommandResult {
    let config = match load_config("profile", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let copy_into = match args.copy_into.as_deref().map(str::parse::<Domain>).transpose() {
        Ok(domain) => domain,
        Err(error) => return CommandResult::failure("profile", error.error_class(), error.to_string(), 5),
    };

    let mut session = match load_session("profile", &config) {
        Ok(session) => session,
        Err(failure) => return failure,
    };

    session.update_user_details(UserDetailsPatch {
        name: args.name,
        location: args.location,
        address: args.address,
        phone: args.phone,
        email: args.email,
    });
    if let Some(domain) = copy_into {
        session.copy_user_details_into(domain);
    }

    if let Err(failure) = save_session("profile", &config, &session) {
        return failure;
    }

    let message = match copy_into {
        Some(domain) => format!("user details updated and copied into {domain}"),
        None => "user details updated".to_string(),
    };
    CommandResult::success_with_data("profile", message, Some(session_view(&session)))
}
