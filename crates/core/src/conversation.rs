use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{ActionError, ActionErrorKind};
use crate::protocol::{ActionArguments, ProtocolAction, TransactionId, TransactionScope};

/// Result recorded against a dispatched action: the gateway payload or an error marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Observation {
    Success { payload: Value },
    Error { kind: ActionErrorKind, message: String },
}

impl Observation {
    pub fn success(payload: Value) -> Self {
        Self::Success { payload }
    }

    pub fn from_error(error: &ActionError) -> Self {
        Self::Error { kind: error.kind(), message: error.to_string() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ActionErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }

    /// Text handed back to the oracle; errors keep the gateway's `{"error": ...}` shape.
    pub fn render(&self) -> String {
        match self {
            Self::Success { payload } => payload.to_string(),
            Self::Error { kind, message } => json!({ "error": message, "kind": kind }).to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Canonical action name when it resolved, otherwise the name exactly as the oracle gave it.
    pub action: String,
    pub arguments: ActionArguments,
    pub observation: Observation,
    pub recorded_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(
        action: impl Into<String>,
        arguments: ActionArguments,
        observation: Observation,
    ) -> Self {
        Self { action: action.into(), arguments, observation, recorded_at: Utc::now() }
    }

    pub fn protocol_action(&self) -> Option<ProtocolAction> {
        self.action.parse().ok()
    }

    pub fn is_action(&self, action: ProtocolAction) -> bool {
        self.action == action.as_str()
    }
}

/// Mutable record carried across the turns of one orchestration run.
///
/// `history` and `steps` are append-only; recorded steps are never handed out mutably.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub input: String,
    history: Vec<String>,
    steps: Vec<StepRecord>,
    transaction: TransactionScope,
}

impl ConversationState {
    pub fn new(input: impl Into<String>, history: Vec<String>) -> Self {
        Self {
            input: input.into(),
            history,
            steps: Vec::new(),
            transaction: TransactionScope::default(),
        }
    }

    /// Continue an order the caller already started in an earlier conversation.
    pub fn resume_transaction(mut self, transaction_id: TransactionId) -> Self {
        self.transaction = TransactionScope::resume(transaction_id);
        self
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn push_history(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn last_step(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    pub fn record(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub fn transaction(&self) -> &TransactionScope {
        &self.transaction
    }

    pub fn transaction_mut(&mut self) -> &mut TransactionScope {
        &mut self.transaction
    }
}
