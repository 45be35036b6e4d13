use homie_core::config::LoadOptions;
use homie_db::{connect_with_settings, migrations};

use crate::commands::{current_thread_runtime, load_config, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("migrate", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let url = config.session.database_url.clone();
    let result = runtime.block_on(async {
        let pool = connect_with_settings(&url, 1, config.protocol.timeout_secs)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 7u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 8u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", format!("applied pending migrations to `{url}`")),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
