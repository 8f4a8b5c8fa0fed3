use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::LlmConfig;
use concierge_core::conversation::ConversationState;
use concierge_core::errors::OracleError;
use concierge_core::protocol::ActionArguments;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::catalog::ActionDefinition;

const GREETING_REQUEST: &str = "Hello, I'd like to order something.";
const GREETING_REPLY: &str = "Hello! What would you like to order?";

/// What the oracle wants to happen next.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Finish {
        output: String,
    },
    Invoke {
        action: String,
        #[serde(default)]
        arguments: ActionArguments,
        /// Text the oracle produced alongside the tool call, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(
        &self,
        state: &ConversationState,
        actions: &[ActionDefinition],
    ) -> Result<Decision, OracleError>;
}

/// Oracle backed by an OpenAI-compatible `/chat/completions` endpoint (OpenAI or Ollama).
#[derive(Clone)]
pub struct ChatCompletionsOracle {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl ChatCompletionsOracle {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| OracleError::Unavailable(error.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            temperature: 0.0,
            system_prompt: concierge_core::config::DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig, system_prompt: &str) -> Result<Self, OracleError> {
        let mut oracle = Self::new(
            config.effective_base_url(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_temperature(config.temperature)
        .with_system_prompt(system_prompt);
        oracle.api_key = config.api_key.clone();
        Ok(oracle)
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(&self, state: &ConversationState, actions: &[ActionDefinition]) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": build_messages(&self.system_prompt, state),
            "tools": actions.iter().map(tool_spec).collect::<Vec<_>>(),
        })
    }
}

#[async_trait]
impl DecisionOracle for ChatCompletionsOracle {
    async fn decide(
        &self,
        state: &ConversationState,
        actions: &[ActionDefinition],
    ) -> Result<Decision, OracleError> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&self.request_body(state, actions));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| OracleError::Unavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Unavailable(format!("status {status}: {body}")));
        }

        let body: Value =
            response.json().await.map_err(|error| OracleError::NoDecision(error.to_string()))?;
        parse_decision(&body)
    }
}

fn tool_spec(definition: &ActionDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": definition.name,
            "description": definition.description,
            "parameters": definition.parameters,
        }
    })
}

/// System prompt, prior exchange, the canned greeting, the user input, then one tool call and
/// tool result per recorded step.
pub(crate) fn build_messages(system_prompt: &str, state: &ConversationState) -> Vec<Value> {
    let mut messages = vec![json!({ "role": "system", "content": system_prompt })];

    for (index, entry) in state.history().iter().enumerate() {
        let role = if index % 2 == 0 { "user" } else { "assistant" };
        messages.push(json!({ "role": role, "content": entry }));
    }

    messages.push(json!({ "role": "user", "content": GREETING_REQUEST }));
    messages.push(json!({ "role": "assistant", "content": GREETING_REPLY }));
    messages.push(json!({ "role": "user", "content": state.input }));

    for (index, step) in state.steps().iter().enumerate() {
        let call_id = format!("call_{index}");
        messages.push(json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": [{
                "id": call_id,
                "type": "function",
                "function": {
                    "name": step.action,
                    "arguments": Value::Object(step.arguments.clone()).to_string(),
                }
            }]
        }));
        messages.push(json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": step.observation.render(),
        }));
    }

    messages
}

pub(crate) fn parse_decision(body: &Value) -> Result<Decision, OracleError> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| OracleError::NoDecision("response carried no choices".to_string()))?;
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    let Some(call) = message.pointer("/tool_calls/0/function") else {
        return Ok(Decision::Finish { output: content.unwrap_or_default() });
    };

    let action = call
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| OracleError::NoDecision("tool call carried no name".to_string()))?
        .to_string();

    let arguments = match call.get("arguments") {
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(
                    event_name = "agent.oracle.malformed_arguments",
                    action = %action,
                    "tool call arguments were not a JSON object"
                );
                ActionArguments::new()
            }
        },
        Some(Value::Object(map)) => map.clone(),
        _ => ActionArguments::new(),
    };

    Ok(Decision::Invoke { action, arguments, message: content })
}
