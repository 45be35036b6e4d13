use std::fs;

use homie_core::config::{AppConfig, LoadOptions};
use homie_core::context::snapshot::read_snapshot;
use homie_core::SnapshotBackend;
use homie_db::{connect_with_settings, migrations};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_session_file(&config));
            checks.push(check_snapshot_backend(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["session_file", "snapshot_backend"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_session_file(config: &AppConfig) -> DoctorCheck {
    let path = &config.session.session_file;
    match read_snapshot(path) {
        Ok(Some(snapshot)) => DoctorCheck {
            name: "session_file",
            status: CheckStatus::Pass,
            details: format!("session `{}` loaded from `{}`", snapshot.session_id, path.display()),
        },
        Ok(None) => DoctorCheck {
            name: "session_file",
            status: CheckStatus::Pass,
            details: format!("no session yet; `{}` will be created on first step", path.display()),
        },
        Err(error) => {
            DoctorCheck { name: "session_file", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_snapshot_backend(config: &AppConfig) -> DoctorCheck {
    match config.session.snapshot_backend {
        SnapshotBackend::None => DoctorCheck {
            name: "snapshot_backend",
            status: CheckStatus::Skipped,
            details: "snapshot history disabled".to_string(),
        },
        SnapshotBackend::Json => {
            let directory = &config.session.snapshot_dir;
            match fs::create_dir_all(directory) {
                Ok(()) => DoctorCheck {
                    name: "snapshot_backend",
                    status: CheckStatus::Pass,
                    details: format!("json snapshots go to `{}`", directory.display()),
                },
                Err(error) => DoctorCheck {
                    name: "snapshot_backend",
                    status: CheckStatus::Fail,
                    details: format!("cannot create `{}`: {error}", directory.display()),
                },
            }
        }
        SnapshotBackend::Sqlite => check_database(config),
    }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "snapshot_backend",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let url = &config.session.database_url;
    let result = runtime.block_on(async {
        let pool = connect_with_settings(url, 1, config.protocol.timeout_secs)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("failed to apply migrations: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "snapshot_backend",
            status: CheckStatus::Pass,
            details: format!("sqlite snapshots ready at `{url}`"),
        },
        Err(error) => {
            DoctorCheck { name: "snapshot_backend", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
