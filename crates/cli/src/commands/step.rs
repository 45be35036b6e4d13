use std::sync::Arc;

use homie_beckn::{clients_for, BapSettings};
use homie_core::config::{AppConfig, LoadOptions};
use homie_core::{
    ApplicationError, JsonFileSnapshotSink, SnapshotBackend, SnapshotSink, StepError, StepParams,
};
use homie_db::{connect_with_settings, migrations, SqlSnapshotRepository};
use tracing::warn;

use crate::commands::{
    current_thread_runtime, load_config, load_session, save_session, CommandResult,
};

/// Parses a `--param key=value` argument.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

pub fn run(
    options: &LoadOptions,
    domain: &str,
    step: &str,
    params: Vec<(String, String)>,
) -> CommandResult {
    let config = match load_config("step", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let session = match load_session("step", &config) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let clients = match clients_for(BapSettings::from(&config.protocol)) {
        Ok(clients) => clients,
        Err(error) => return CommandResult::failure("step", "client_init", error.to_string(), 6),
    };
    let runtime = match current_thread_runtime("step") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let mut session = clients
        .into_iter()
        .fold(session, |session, (lane, client)| session.with_client(lane, client));
    if let Some(sink) = runtime.block_on(snapshot_sink(&config)) {
        session = session.with_snapshot_sink(sink);
    }

    let params: StepParams = params.into_iter().collect();
    let outcome = runtime.block_on(session.run_named_step(domain, step, params));

    match outcome {
        Ok(outcome) => {
            if let Err(failure) = save_session("step", &config, &session) {
                return failure;
            }
            let message = format!(
                "{} {} completed; next: {}",
                outcome.domain, outcome.step, outcome.next_domain
            );
            let data = serde_json::to_value(&outcome).ok();
            CommandResult::success_with_data("step", message, data)
        }
        Err(error) => {
            let exit_code = match error {
                StepError::Remote { .. } | StepError::ClientNotConfigured(_) => 6,
                _ => 5,
            };
            let error_class = error.error_class();
            CommandResult::application_failure(
                "step",
                error_class,
                ApplicationError::from(error),
                exit_code,
            )
        }
    }
}

/// Builds the configured history sink. A sqlite backend that cannot be opened
/// only disables history; the step itself still runs.
async fn snapshot_sink(config: &AppConfig) -> Option<Arc<dyn SnapshotSink>> {
    match config.session.snapshot_backend {
        SnapshotBackend::None => None,
        SnapshotBackend::Json => {
            let sink = JsonFileSnapshotSink::new(config.session.snapshot_dir.clone());
            Some(Arc::new(sink) as Arc<dyn SnapshotSink>)
        }
        SnapshotBackend::Sqlite => {
            let url = &config.session.database_url;
            let pool = match connect_with_settings(url, 1, config.protocol.timeout_secs).await {
                Ok(pool) => pool,
                Err(error) => {
                    warn!(
                        event_name = "cli.snapshot.unavailable",
                        database_url = %url,
                        error = %error,
                        "sqlite snapshot backend unavailable"
                    );
                    return None;
                }
            };
            if let Err(error) = migrations::run_pending(&pool).await {
                warn!(
                    event_name = "cli.snapshot.unavailable",
                    database_url = %url,
                    error = %error,
                    "sqlite snapshot migrations failed"
                );
                return None;
            }
            Some(Arc::new(SqlSnapshotRepository::new(pool)) as Arc<dyn SnapshotSink>)
        }
    }
}
