use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::{StatusVocabulary, DEFAULT_TERMINAL_STATUSES};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub protocol: ProtocolConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Network identity and gateway used for every Beckn request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub base_url: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub bpp_id: String,
    pub bpp_uri: String,
    pub country_code: String,
    pub city_code: String,
    pub version: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub session_file: PathBuf,
    pub snapshot_backend: SnapshotBackend,
    pub snapshot_dir: PathBuf,
    pub database_url: String,
    pub enforce_domain_order: bool,
    pub terminal_statuses: Vec<String>,
}

impl SessionConfig {
    pub fn vocabulary(&self) -> StatusVocabulary {
        StatusVocabulary::new(&self.terminal_statuses)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotBackend {
    None,
    Json,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub session_file: Option<PathBuf>,
    pub snapshot_backend: Option<SnapshotBackend>,
    pub database_url: Option<String>,
    pub enforce_domain_order: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig {
                base_url: "https://bap-ps-client-deg-team13.becknprotocol.io/".to_string(),
                bap_id: "bap-ps-network-deg-team13.becknprotocol.io".to_string(),
                bap_uri: "https://bap-ps-network-deg-team13.becknprotocol.io/".to_string(),
                bpp_id: "bpp-ps-network-deg-team13.becknprotocol.io".to_string(),
                bpp_uri: "https://bpp-ps-network-deg-team13.becknprotocol.io/".to_string(),
                country_code: "USA".to_string(),
                city_code: "NANP:628".to_string(),
                version: "1.1.0".to_string(),
                timeout_secs: 100,
            },
            session: SessionConfig {
                session_file: PathBuf::from(".homie/session.json"),
                snapshot_backend: SnapshotBackend::Json,
                snapshot_dir: PathBuf::from("context_store_history"),
                database_url: "sqlite://homie.db".to_string(),
                enforce_domain_order: true,
                terminal_statuses: DEFAULT_TERMINAL_STATUSES.map(str::to_string).to_vec(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for SnapshotBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported snapshot backend `{other}` (expected none|json|sqlite)"
            ))),
        }
    }
}

impl SnapshotBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("homie.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(protocol) = patch.protocol {
            let target = &mut self.protocol;
            for (slot, value) in [
                (&mut target.base_url, protocol.base_url),
                (&mut target.bap_id, protocol.bap_id),
                (&mut target.bap_uri, protocol.bap_uri),
                (&mut target.bpp_id, protocol.bpp_id),
                (&mut target.bpp_uri, protocol.bpp_uri),
                (&mut target.country_code, protocol.country_code),
                (&mut target.city_code, protocol.city_code),
                (&mut target.version, protocol.version),
            ] {
                if let Some(value) = value {
                    *slot = value;
                }
            }
            if let Some(timeout_secs) = protocol.timeout_secs {
                target.timeout_secs = timeout_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(session_file) = session.session_file {
                self.session.session_file = session_file;
            }
            if let Some(snapshot_backend) = session.snapshot_backend {
                self.session.snapshot_backend = snapshot_backend;
            }
            if let Some(snapshot_dir) = session.snapshot_dir {
                self.session.snapshot_dir = snapshot_dir;
            }
            if let Some(database_url) = session.database_url {
                self.session.database_url = database_url;
            }
            if let Some(enforce_domain_order) = session.enforce_domain_order {
                self.session.enforce_domain_order = enforce_domain_order;
            }
            if let Some(terminal_statuses) = session.terminal_statuses {
                self.session.terminal_statuses = terminal_statuses;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let protocol = &mut self.protocol;
        for (key, slot) in [
            ("HOMIE_PROTOCOL_BASE_URL", &mut protocol.base_url),
            ("HOMIE_PROTOCOL_BAP_ID", &mut protocol.bap_id),
            ("HOMIE_PROTOCOL_BAP_URI", &mut protocol.bap_uri),
            ("HOMIE_PROTOCOL_BPP_ID", &mut protocol.bpp_id),
            ("HOMIE_PROTOCOL_BPP_URI", &mut protocol.bpp_uri),
            ("HOMIE_PROTOCOL_COUNTRY_CODE", &mut protocol.country_code),
            ("HOMIE_PROTOCOL_CITY_CODE", &mut protocol.city_code),
            ("HOMIE_PROTOCOL_VERSION", &mut protocol.version),
        ] {
            if let Some(value) = read_env(key) {
                *slot = value;
            }
        }
        if let Some(value) = read_env("HOMIE_PROTOCOL_TIMEOUT_SECS") {
            self.protocol.timeout_secs = parse_u64("HOMIE_PROTOCOL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HOMIE_SESSION_FILE") {
            self.session.session_file = PathBuf::from(value);
        }
        if let Some(value) = read_env("HOMIE_SESSION_SNAPSHOT_BACKEND") {
            self.session.snapshot_backend = value.parse()?;
        }
        if let Some(value) = read_env("HOMIE_SESSION_SNAPSHOT_DIR") {
            self.session.snapshot_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("HOMIE_SESSION_DATABASE_URL") {
            self.session.database_url = value;
        }
        if let Some(value) = read_env("HOMIE_SESSION_ENFORCE_DOMAIN_ORDER") {
            self.session.enforce_domain_order =
                parse_bool("HOMIE_SESSION_ENFORCE_DOMAIN_ORDER", &value)?;
        }
        if let Some(value) = read_env("HOMIE_SESSION_TERMINAL_STATUSES") {
            self.session.terminal_statuses = value
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect();
        }

        let log_level = read_env("HOMIE_LOGGING_LEVEL").or_else(|| read_env("HOMIE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("HOMIE_LOGGING_FORMAT").or_else(|| read_env("HOMIE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.protocol.base_url = base_url;
        }
        if let Some(session_file) = overrides.session_file {
            self.session.session_file = session_file;
        }
        if let Some(snapshot_backend) = overrides.snapshot_backend {
            self.session.snapshot_backend = snapshot_backend;
        }
        if let Some(database_url) = overrides.database_url {
            self.session.database_url = database_url;
        }
        if let Some(enforce_domain_order) = overrides.enforce_domain_order {
            self.session.enforce_domain_order = enforce_domain_order;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_protocol(&self.protocol)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("homie.toml"), PathBuf::from("config/homie.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_protocol(protocol: &ProtocolConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("protocol.base_url", &protocol.base_url),
        ("protocol.bap_uri", &protocol.bap_uri),
        ("protocol.bpp_uri", &protocol.bpp_uri),
    ] {
        if !is_http_url(value.trim()) {
            return Err(ConfigError::Validation(format!(
                "{field} must start with http:// or https://"
            )));
        }
    }

    for (field, value) in [
        ("protocol.bap_id", &protocol.bap_id),
        ("protocol.bpp_id", &protocol.bpp_id),
        ("protocol.country_code", &protocol.country_code),
        ("protocol.city_code", &protocol.city_code),
        ("protocol.version", &protocol.version),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{field} must not be empty")));
        }
    }

    if protocol.timeout_secs == 0 || protocol.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "protocol.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.session_file.as_os_str().is_empty() {
        return Err(ConfigError::Validation("session.session_file must not be empty".to_string()));
    }

    if session.snapshot_backend == SnapshotBackend::Json
        && session.snapshot_dir.as_os_str().is_empty()
    {
        return Err(ConfigError::Validation(
            "session.snapshot_dir is required for the json snapshot backend".to_string(),
        ));
    }

    if session.snapshot_backend == SnapshotBackend::Sqlite {
        let url = session.database_url.trim();
        let sqlite_url =
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
        if !sqlite_url {
            return Err(ConfigError::Validation(
                "session.database_url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                    .to_string(),
            ));
        }
    }

    if session.terminal_statuses.iter().all(|code| code.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "session.terminal_statuses must name at least one status code".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    protocol: Option<ProtocolPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProtocolPatch {
    base_url: Option<String>,
    bap_id: Option<String>,
    bap_uri: Option<String>,
    bpp_id: Option<String>,
    bpp_uri: Option<String>,
    country_code: Option<String>,
    city_code: Option<String>,
    version: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    session_file: Option<PathBuf>,
    snapshot_backend: Option<SnapshotBackend>,
    snapshot_dir: Option<PathBuf>,
    database_url: Option<String>,
    enforce_domain_order: Option<bool>,
    terminal_statuses: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
