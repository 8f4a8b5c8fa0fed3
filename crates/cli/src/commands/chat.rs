use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use concierge_agent::{
    ActionCatalog, ChatCompletionsOracle, DecisionOracle, OrchestrationLoop, ScriptedOracle,
};
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_core::conversation::ConversationState;
use concierge_core::errors::RunError;
use concierge_core::protocol::TransactionId;
use concierge_gateway::HttpGateway;
use uuid::Uuid;

use crate::commands::{init_logging, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct ChatArgs {
    pub input: String,
    pub history: Vec<String>,
    /// JSON file holding a list of decisions to replay instead of calling the model.
    pub script: Option<PathBuf>,
    pub transaction_id: Option<Uuid>,
    /// Print one JSON line per turn before the final result.
    pub trace: bool,
}

pub fn run(args: ChatArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_logging(&config);

    let oracle = match build_oracle(&config, args.script.as_ref()) {
        Ok(oracle) => oracle,
        Err((error_class, message)) => {
            return CommandResult::failure("chat", error_class, message, 4);
        }
    };
    let gateway = match HttpGateway::from_config(&config.gateway) {
        Ok(gateway) => gateway,
        Err(error) => {
            return CommandResult::failure("chat", "gateway_client", error.to_string(), 4);
        }
    };
    let catalog = Arc::new(ActionCatalog::from_config(Arc::new(gateway), &config.gateway));
    let orchestration = OrchestrationLoop::from_config(oracle, catalog, &config.agent);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let trace_turns = args.trace;
    let mut state = ConversationState::new(args.input, args.history);
    if let Some(transaction_id) = args.transaction_id {
        state = state.resume_transaction(TransactionId(transaction_id));
    }

    let result = runtime.block_on(async move {
        let mut updates = orchestration.stream_state(state);
        let mut trace = Vec::new();
        while let Some(update) = updates.recv().await {
            let update = update?;
            if trace_turns {
                trace.push(serde_json::to_string(&update).unwrap_or_default());
            }
            if let Some(output) = update.output {
                return Ok((trace, output));
            }
        }
        Err(RunError::Abandoned)
    });

    match result {
        Ok((trace, output)) => {
            let summary = CommandResult::success("chat", output);
            if trace.is_empty() {
                return summary;
            }
            let output = format!("{}\n{}", trace.join("\n"), summary.output);
            CommandResult { exit_code: 0, output }
        }
        Err(error) => {
            let (error_class, exit_code) = match error {
                RunError::OracleUnavailable(_) => ("oracle_unavailable", 5),
                RunError::TurnLimitExceeded { .. } => ("turn_limit", 6),
                RunError::Abandoned | RunError::Transition(_) => ("run", 7),
            };
            CommandResult::failure("chat", error_class, error.to_string(), exit_code)
        }
    }
}

fn build_oracle(
    config: &AppConfig,
    script: Option<&PathBuf>,
) -> Result<Arc<dyn DecisionOracle>, (&'static str, String)> {
    match script {
        Some(path) => {
            let display = path.display();
            let raw = fs::read_to_string(path)
                .map_err(|error| ("script", format!("cannot read `{display}`: {error}")))?;
            let oracle = ScriptedOracle::from_json(&raw)
                .map_err(|error| ("script", format!("invalid script `{display}`: {error}")))?;
            Ok(Arc::new(oracle))
        }
        None => {
            let oracle =
                ChatCompletionsOracle::from_config(&config.llm, &config.agent.system_prompt)
                    .map_err(|error| ("oracle_client", error.to_string()))?;
            Ok(Arc::new(oracle))
        }
    }
}
