use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use concierge_cli::commands::chat::{self, ChatArgs};
use concierge_cli::commands::{actions, config, doctor};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn actions_lists_every_protocol_action() {
    let definitions = parse_payload(&actions::run());
    let names: Vec<&str> = definitions
        .as_array()
        .map(|items| items.iter().filter_map(|item| item["name"].as_str()).collect())
        .unwrap_or_default();

    assert_eq!(
        names,
        vec!["search", "select", "init", "confirm", "status", "track", "cancel", "support"]
    );
    assert_eq!(definitions[1]["parameters"]["required"][2], "provider_id");
}

#[test]
fn config_reports_env_and_default_sources() {
    with_env(&[("CONCIERGE_LLM_MODEL", "mistral"), ("CONCIERGE_LOG_LEVEL", "debug")], || {
        let output = config::run();

        assert!(output.contains("- llm.model = mistral (source: env (CONCIERGE_LLM_MODEL))"));
        assert!(output.contains("- logging.level = debug (source: env (CONCIERGE_LOG_LEVEL))"));
        assert!(output.contains("- agent.max_turns = 25 (source: default)"));
        assert!(output.contains("- agent.terminal_actions = confirm (source: default)"));
    });
}

#[test]
fn config_redacts_api_key() {
    with_env(
        &[("CONCIERGE_LLM_PROVIDER", "openai"), ("CONCIERGE_LLM_API_KEY", "sk-live-secret")],
        || {
            let output = config::run();

            assert!(
                output.contains("- llm.api_key = sk-*** (source: env (CONCIERGE_LLM_API_KEY))")
            );
            assert!(!output.contains("secret"));
            assert!(output.contains("- llm.base_url = https://api.openai.com/v1"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("CONCIERGE_LLM_PROVIDER", "openai")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
        assert!(output.contains("llm.api_key"));
    });
}

#[test]
fn doctor_passes_with_default_configuration() {
    with_env(&[], || {
        let report = parse_payload(&doctor::run(true));

        assert_eq!(report["overall_status"], "pass");
        let checks = report["checks"].as_array().cloned().unwrap_or_default();
        let names: Vec<&str> = checks.iter().filter_map(|check| check["name"].as_str()).collect();
        assert_eq!(
            names,
            vec!["config_validation", "gateway_client", "oracle_client", "terminal_actions"]
        );
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_invalid() {
    with_env(&[("CONCIERGE_AGENT_MAX_TURNS", "0")], || {
        let report = parse_payload(&doctor::run(true));

        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][0]["status"], "fail");
        assert_eq!(report["checks"][1]["status"], "skipped");
        assert_eq!(report["checks"][3]["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_marks_each_check() {
    with_env(&[], || {
        let output = doctor::run(false);

        assert!(output.starts_with("doctor: all readiness checks passed"));
        assert!(output.contains("- [ok] oracle_client: ollama model `llama3.1`"));
    });
}

#[test]
fn chat_replays_script_and_absorbs_gateway_failure() {
    let dir = TempDir::new().expect("temp dir");
    let script = write_script(
        &dir,
        r#"[
            {"decision": "invoke", "action": "search",
             "arguments": {"item": "pizza", "delivery_location": "12.97,77.59"}},
            {"decision": "finish", "output": "The network is not answering right now."}
        ]"#,
    );

    with_env(&[("CONCIERGE_GATEWAY_BASE_URL", "http://127.0.0.1:9")], || {
        let result = chat::run(ChatArgs {
            input: "order a pizza".to_string(),
            script: Some(script.clone()),
            trace: true,
            ..ChatArgs::default()
        });
        assert_eq!(result.exit_code, 0, "expected successful chat run: {}", result.output);

        let lines: Vec<&str> = result.output.lines().collect();
        assert_eq!(lines.len(), 3);

        let first_turn = parse_payload(lines[0]);
        assert_eq!(first_turn["step"]["action"], "search");
        assert!(first_turn["transaction_id"].is_string());

        let payload = parse_payload(lines[2]);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "The network is not answering right now.");
    });
}

#[test]
fn chat_without_trace_prints_only_the_result() {
    let dir = TempDir::new().expect("temp dir");
    let script = write_script(&dir, r#"[{"decision": "finish", "output": "Hello!"}]"#);

    with_env(&[], || {
        let result = chat::run(ChatArgs {
            input: "hi".to_string(),
            script: Some(script.clone()),
            ..ChatArgs::default()
        });

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output.lines().count(), 1);
        assert_eq!(parse_payload(&result.output)["message"], "Hello!");
    });
}

#[test]
fn chat_reports_exhausted_script_as_oracle_unavailable() {
    let dir = TempDir::new().expect("temp dir");
    let script = write_script(&dir, "[]");

    with_env(&[], || {
        let result = chat::run(ChatArgs {
            input: "hi".to_string(),
            script: Some(script.clone()),
            ..ChatArgs::default()
        });

        assert_eq!(result.exit_code, 5);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "oracle_unavailable");
    });
}

#[test]
fn chat_reports_turn_limit() {
    let dir = TempDir::new().expect("temp dir");
    let script = write_script(
        &dir,
        r#"[
            {"decision": "invoke", "action": "search", "arguments": {}},
            {"decision": "invoke", "action": "search", "arguments": {}}
        ]"#,
    );

    with_env(&[("CONCIERGE_AGENT_MAX_TURNS", "1")], || {
        let result = chat::run(ChatArgs {
            input: "find something".to_string(),
            script: Some(script.clone()),
            ..ChatArgs::default()
        });

        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "turn_limit");
    });
}

#[test]
fn chat_rejects_malformed_script() {
    let dir = TempDir::new().expect("temp dir");
    let script = write_script(&dir, r#"{"decision": "finish"}"#);

    with_env(&[], || {
        let result = chat::run(ChatArgs {
            input: "hi".to_string(),
            script: Some(script.clone()),
            ..ChatArgs::default()
        });

        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "script");
    });
}

#[test]
fn chat_returns_config_failure_for_invalid_provider_setup() {
    with_env(&[("CONCIERGE_LLM_PROVIDER", "openai")], || {
        let result = chat::run(ChatArgs { input: "hi".to_string(), ..ChatArgs::default() });

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

fn write_script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("script.json");
    fs::write(&path, body).expect("script written");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "CONCIERGE_GATEWAY_BASE_URL",
        "CONCIERGE_GATEWAY_BAP_ID",
        "CONCIERGE_GATEWAY_BAP_URI",
        "CONCIERGE_GATEWAY_DOMAIN",
        "CONCIERGE_GATEWAY_COUNTRY",
        "CONCIERGE_GATEWAY_CITY",
        "CONCIERGE_GATEWAY_CORE_VERSION",
        "CONCIERGE_GATEWAY_CANCELLATION_REASON_ID",
        "CONCIERGE_GATEWAY_TIMEOUT_SECS",
        "CONCIERGE_LLM_PROVIDER",
        "CONCIERGE_LLM_API_KEY",
        "CONCIERGE_LLM_BASE_URL",
        "CONCIERGE_LLM_MODEL",
        "CONCIERGE_LLM_TEMPERATURE",
        "CONCIERGE_LLM_TIMEOUT_SECS",
        "CONCIERGE_AGENT_MAX_TURNS",
        "CONCIERGE_AGENT_TERMINAL_ACTIONS",
        "CONCIERGE_AGENT_SYSTEM_PROMPT",
        "CONCIERGE_SERVER_BIND_ADDRESS",
        "CONCIERGE_SERVER_PORT",
        "CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CONCIERGE_LOGGING_LEVEL",
        "CONCIERGE_LOGGING_FORMAT",
        "CONCIERGE_LOG_LEVEL",
        "CONCIERGE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
