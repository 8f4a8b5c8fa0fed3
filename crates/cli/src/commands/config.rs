use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use concierge_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let terminal_actions = config
        .agent
        .terminal_actions
        .iter()
        .map(|action| action.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let fields = vec![
        field("gateway.base_url", config.gateway.base_url.clone(), &["CONCIERGE_GATEWAY_BASE_URL"]),
        field("gateway.bap_id", config.gateway.bap_id.clone(), &["CONCIERGE_GATEWAY_BAP_ID"]),
        field("gateway.bap_uri", config.gateway.bap_uri.clone(), &["CONCIERGE_GATEWAY_BAP_URI"]),
        field("gateway.domain", config.gateway.domain.clone(), &["CONCIERGE_GATEWAY_DOMAIN"]),
        field("gateway.country", config.gateway.country.clone(), &["CONCIERGE_GATEWAY_COUNTRY"]),
        field("gateway.city", config.gateway.city.clone(), &["CONCIERGE_GATEWAY_CITY"]),
        field(
            "gateway.core_version",
            config.gateway.core_version.clone(),
            &["CONCIERGE_GATEWAY_CORE_VERSION"],
        ),
        field(
            "gateway.cancellation_reason_id",
            config.gateway.cancellation_reason_id.clone(),
            &["CONCIERGE_GATEWAY_CANCELLATION_REASON_ID"],
        ),
        field(
            "gateway.timeout_secs",
            config.gateway.timeout_secs.to_string(),
            &["CONCIERGE_GATEWAY_TIMEOUT_SECS"],
        ),
        field(
            "llm.provider",
            config.llm.provider.as_str().to_string(),
            &["CONCIERGE_LLM_PROVIDER"],
        ),
        field("llm.model", config.llm.model.clone(), &["CONCIERGE_LLM_MODEL"]),
        field("llm.base_url", config.llm.effective_base_url(), &["CONCIERGE_LLM_BASE_URL"]),
        field("llm.api_key", api_key, &["CONCIERGE_LLM_API_KEY"]),
        field(
            "llm.temperature",
            config.llm.temperature.to_string(),
            &["CONCIERGE_LLM_TEMPERATURE"],
        ),
        field(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["CONCIERGE_LLM_TIMEOUT_SECS"],
        ),
        field(
            "agent.max_turns",
            config.agent.max_turns.to_string(),
            &["CONCIERGE_AGENT_MAX_TURNS"],
        ),
        field("agent.terminal_actions", terminal_actions, &["CONCIERGE_AGENT_TERMINAL_ACTIONS"]),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["CONCIERGE_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["CONCIERGE_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["CONCIERGE_LOGGING_LEVEL", "CONCIERGE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["CONCIERGE_LOGGING_FORMAT", "CONCIERGE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }
    lines.push(render_line(
        "agent.system_prompt",
        &format!("<{} chars>", config.agent.system_prompt.chars().count()),
        field_source(
            "agent.system_prompt",
            &["CONCIERGE_AGENT_SYSTEM_PROMPT"],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

fn field(
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key, value, env_keys)
}

fn detect_config_path() -> Option<PathBuf> {
    ["concierge.toml", "config/concierge.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
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

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
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

/// Keeps a short provider prefix such as `sk-` visible and hides the rest.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) if prefix.len() <= 4 => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}
