use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use concierge_core::config::AppConfig;
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct HealthState {
    gateway_base_url: String,
    oracle_provider: &'static str,
    oracle_model: String,
    max_turns: usize,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            gateway_base_url: config.gateway.base_url.clone(),
            oracle_provider: config.llm.provider.as_str(),
            oracle_model: config.llm.model.clone(),
            max_turns: config.agent.max_turns,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub gateway: HealthCheck,
    pub oracle: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: format!("orchestration loop ready (max_turns={})", state.max_turns),
        },
        gateway: HealthCheck { status: "configured", detail: state.gateway_base_url.clone() },
        oracle: HealthCheck {
            status: "configured",
            detail: format!("{} ({})", state.oracle_provider, state.oracle_model),
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
