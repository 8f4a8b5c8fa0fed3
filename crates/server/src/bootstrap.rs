use std::sync::Arc;

use concierge_agent::{ActionCatalog, ChatCompletionsOracle, OrchestrationLoop};
use concierge_core::config::AppConfig;
use concierge_core::errors::{GatewayError, OracleError};
use concierge_gateway::HttpGateway;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<ActionCatalog>,
    pub orchestration: OrchestrationLoop,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("gateway client could not be built: {0}")]
    Gateway(#[source] GatewayError),
    #[error("decision oracle client could not be built: {0}")]
    Oracle(#[source] OracleError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let gateway = HttpGateway::from_config(&config.gateway).map_err(BootstrapError::Gateway)?;
    let catalog = Arc::new(ActionCatalog::from_config(Arc::new(gateway), &config.gateway));
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        base_url = %config.gateway.base_url,
        "protocol gateway configured"
    );

    let oracle = ChatCompletionsOracle::from_config(&config.llm, &config.agent.system_prompt)
        .map_err(BootstrapError::Oracle)?;
    info!(
        event_name = "system.bootstrap.oracle_ready",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        base_url = %oracle.base_url(),
        "decision oracle configured"
    );

    let orchestration =
        OrchestrationLoop::from_config(Arc::new(oracle), catalog.clone(), &config.agent);

    Ok(Application { config, catalog, orchestration })
}

#[cfg(test)]
mod tests {
    use concierge_core::config::{AppConfig, LlmProvider};

    use crate::bootstrap::bootstrap_with_config;

    #[test]
    fn bootstrap_builds_openai_oracle_with_public_endpoint() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::OpenAi;
        config.llm.api_key = Some("sk-test".to_string().into());
        config.llm.model = "gpt-4o-mini".to_string();

        let app = bootstrap_with_config(config).expect("openai configuration bootstraps");

        assert_eq!(app.catalog.definitions().len(), 8);
        assert_eq!(app.config.llm.effective_base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn bootstrap_wires_configured_turn_limit() {
        let mut config = AppConfig::default();
        config.gateway.base_url = "http://127.0.0.1:9".to_string();
        config.agent.max_turns = 7;

        let app = bootstrap_with_config(config).expect("default ollama configuration bootstraps");

        assert_eq!(app.orchestration.max_turns(), 7);
        assert_eq!(app.catalog.definitions().len(), 8);
        assert_eq!(app.config.gateway.base_url, "http://127.0.0.1:9");
    }
}
