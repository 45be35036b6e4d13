pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use homie_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use homie_core::SnapshotBackend;

#[derive(Debug, Parser)]
#[command(
    name = "homie",
    about = "Homie transaction CLI",
    long_about = "Drive Beckn transactions for connection, solar retail, solar service and subsidy \
                  one step at a time, with the session kept in a local file between invocations.",
    after_help = "Examples:\n  homie profile --name Lisa --phone 876756454 --email lisa@example.com --copy-into connection\n  homie step connection search\n  homie step connection select --param provider_id=prov_1 --param item_id=item_1\n  homie show"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Config file path (defaults to homie.toml or config/homie.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Session file holding context between invocations")]
    session_file: Option<PathBuf>,
    #[arg(long, global = true, help = "Gateway base URL override")]
    base_url: Option<String>,
    #[arg(long, global = true, value_parser = parse_backend, help = "Snapshot backend: none|json|sqlite")]
    snapshot_backend: Option<SnapshotBackend>,
    #[arg(long, global = true, help = "Allow steps on any domain regardless of workflow order")]
    any_domain_order: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, session file and snapshot backend readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending snapshot database migrations")]
    Migrate,
    #[command(about = "Update stored user details, optionally copying them into a domain")]
    Profile(commands::profile::ProfileArgs),
    #[command(about = "Run one protocol step for one domain")]
    Step {
        #[arg(help = "connection | solar_retail | solar_service | subsidy")]
        domain: String,
        #[arg(help = "search | select | init | confirm | status")]
        step: String,
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = commands::step::parse_param)]
        params: Vec<(String, String)>,
    },
    #[command(about = "Show session state, stored details and the next admitted domain")]
    Show,
    #[command(about = "Clear the stored session")]
    Reset,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = load_options(&cli.global);

    if let Ok(config) = AppConfig::load(options.clone()) {
        if let Err(error) = init_logging(&config) {
            eprintln!("logging disabled: {error:#}");
        }
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Migrate => commands::migrate::run(&options),
        Command::Profile(args) => commands::profile::run(&options, args),
        Command::Step { domain, step, params } => {
            commands::step::run(&options, &domain, &step, params)
        }
        Command::Show => commands::show::run(&options),
        Command::Reset => commands::reset::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn load_options(global: &GlobalArgs) -> LoadOptions {
    LoadOptions {
        config_path: global.config.clone(),
        require_file: global.config.is_some(),
        overrides: ConfigOverrides {
            base_url: global.base_url.clone(),
            session_file: global.session_file.clone(),
            snapshot_backend: global.snapshot_backend,
            enforce_domain_order: global.any_domain_order.then_some(false),
            ..ConfigOverrides::default()
        },
    }
}

fn parse_backend(value: &str) -> Result<SnapshotBackend, String> {
    value.parse().map_err(|error: homie_core::ConfigError| error.to_string())
}

fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow::anyhow!(error))
}
