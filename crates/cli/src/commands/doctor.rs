use concierge_agent::ChatCompletionsOracle;
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_gateway::HttpGateway;
use serde::Serialize;

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

const DEPENDENT_CHECKS: [&str; 3] = ["gateway_client", "oracle_client", "terminal_actions"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_gateway_client(&config));
            checks.push(check_oracle_client(&config));
            checks.push(check_terminal_actions(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_gateway_client(config: &AppConfig) -> DoctorCheck {
    match HttpGateway::from_config(&config.gateway) {
        Ok(gateway) => DoctorCheck {
            name: "gateway_client",
            status: CheckStatus::Pass,
            details: format!(
                "posting to `{}` as `{}` (timeout {}s)",
                gateway.base_url(),
                config.gateway.bap_id,
                config.gateway.timeout_secs
            ),
        },
        Err(error) => DoctorCheck {
            name: "gateway_client",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_oracle_client(config: &AppConfig) -> DoctorCheck {
    match ChatCompletionsOracle::from_config(&config.llm, &config.agent.system_prompt) {
        Ok(oracle) => DoctorCheck {
            name: "oracle_client",
            status: CheckStatus::Pass,
            details: format!(
                "{} model `{}` at `{}`",
                config.llm.provider.as_str(),
                oracle.model(),
                oracle.base_url()
            ),
        },
        Err(error) => DoctorCheck {
            name: "oracle_client",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_terminal_actions(config: &AppConfig) -> DoctorCheck {
    let names =
        config.agent.terminal_actions.iter().map(|action| action.as_str()).collect::<Vec<_>>();
    DoctorCheck {
        name: "terminal_actions",
        status: CheckStatus::Pass,
        details: format!(
            "runs end after [{}] or {} turns",
            names.join(", "),
            config.agent.max_turns
        ),
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
