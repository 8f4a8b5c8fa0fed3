use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use concierge_core::conversation::ConversationState;
use concierge_core::errors::OracleError;

use crate::catalog::ActionDefinition;
use crate::llm::{Decision, DecisionOracle};

#[derive(Default)]
struct Script {
    pending: VecDeque<Result<Decision, OracleError>>,
    consulted_with: Vec<usize>,
}

/// Replays a fixed list of decisions, one per consultation.
///
/// Running out of script is reported as `OracleError::NoDecision`.
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedOracle {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self::from_results(decisions.into_iter().map(Ok))
    }

    pub fn from_results(results: impl IntoIterator<Item = Result<Decision, OracleError>>) -> Self {
        let oracle = Self::default();
        oracle.lock().pending.extend(results);
        oracle
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let decisions: Vec<Decision> = serde_json::from_str(raw)?;
        Ok(Self::new(decisions))
    }

    /// Number of recorded steps visible at each consultation so far.
    pub fn consultations(&self) -> Vec<usize> {
        self.lock().consulted_with.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(
        &self,
        state: &ConversationState,
        _actions: &[ActionDefinition],
    ) -> Result<Decision, OracleError> {
        let mut script = self.lock();
        script.consulted_with.push(state.steps().len());
        script
            .pending
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::NoDecision("script exhausted".to_string())))
    }
}
