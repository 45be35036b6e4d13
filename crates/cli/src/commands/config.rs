use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use homie_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let protocol = &config.protocol;
    let session = &config.session;
    let terminal_statuses = session.terminal_statuses.join(",");
    let fields: [(&str, String, &[&str]); 17] = [
        ("protocol.base_url", protocol.base_url.clone(), &["HOMIE_PROTOCOL_BASE_URL"]),
        ("protocol.bap_id", protocol.bap_id.clone(), &["HOMIE_PROTOCOL_BAP_ID"]),
        ("protocol.bap_uri", protocol.bap_uri.clone(), &["HOMIE_PROTOCOL_BAP_URI"]),
        ("protocol.bpp_id", protocol.bpp_id.clone(), &["HOMIE_PROTOCOL_BPP_ID"]),
        ("protocol.bpp_uri", protocol.bpp_uri.clone(), &["HOMIE_PROTOCOL_BPP_URI"]),
        ("protocol.country_code", protocol.country_code.clone(), &["HOMIE_PROTOCOL_COUNTRY_CODE"]),
        ("protocol.city_code", protocol.city_code.clone(), &["HOMIE_PROTOCOL_CITY_CODE"]),
        ("protocol.version", protocol.version.clone(), &["HOMIE_PROTOCOL_VERSION"]),
        (
            "protocol.timeout_secs",
            protocol.timeout_secs.to_string(),
            &["HOMIE_PROTOCOL_TIMEOUT_SECS"],
        ),
        (
            "session.session_file",
            session.session_file.display().to_string(),
            &["HOMIE_SESSION_FILE"],
        ),
        (
            "session.snapshot_backend",
            session.snapshot_backend.as_str().to_string(),
            &["HOMIE_SESSION_SNAPSHOT_BACKEND"],
        ),
        (
            "session.snapshot_dir",
            session.snapshot_dir.display().to_string(),
            &["HOMIE_SESSION_SNAPSHOT_DIR"],
        ),
        ("session.database_url", session.database_url.clone(), &["HOMIE_SESSION_DATABASE_URL"]),
        (
            "session.enforce_domain_order",
            session.enforce_domain_order.to_string(),
            &["HOMIE_SESSION_ENFORCE_DOMAIN_ORDER"],
        ),
        ("session.terminal_statuses", terminal_statuses, &["HOMIE_SESSION_TERMINAL_STATUSES"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["HOMIE_LOGGING_LEVEL", "HOMIE_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["HOMIE_LOGGING_FORMAT", "HOMIE_LOG_FORMAT"],
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for (key_path, value, env_keys) in fields {
        lines.push(render_line(key_path, &value, source(key_path, env_keys)));
    }

    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    ["homie.toml", "config/homie.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
