use std::sync::Arc;

use concierge_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use concierge_core::config::AgentConfig;
use concierge_core::conversation::{ConversationState, StepRecord};
use concierge_core::errors::{ActionErrorKind, RunError};
use concierge_core::flows::{
    ConfirmTerminates, Continuation, ContinuationPredicate, LoopEvent, LoopState,
    OrchestrationFlow, TerminalActions,
};
use concierge_core::protocol::TransactionId;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::ActionCatalog;
use crate::llm::{Decision, DecisionOracle};

pub const DEFAULT_MAX_TURNS: usize = 25;

/// Snapshot emitted after every turn of a streamed run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnUpdate {
    pub turn: usize,
    pub phase: LoopState,
    pub step_count: usize,
    pub step: Option<StepRecord>,
    pub output: Option<String>,
    pub transaction_id: Option<TransactionId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub conversation_id: String,
    pub output: String,
    pub turns: usize,
    pub state: ConversationState,
}

/// Drives one conversation at a time: consult the oracle, dispatch, record, evaluate.
///
/// The loop owns no conversation state of its own, so a single instance can serve any number of
/// concurrent runs.
#[derive(Clone)]
pub struct OrchestrationLoop {
    oracle: Arc<dyn DecisionOracle>,
    catalog: Arc<ActionCatalog>,
    predicate: Arc<dyn ContinuationPredicate>,
    audit: Option<Arc<dyn AuditSink>>,
    flow: OrchestrationFlow,
    max_turns: usize,
}

impl OrchestrationLoop {
    pub fn new(oracle: Arc<dyn DecisionOracle>, catalog: Arc<ActionCatalog>) -> Self {
        Self {
            oracle,
            catalog,
            predicate: Arc::new(ConfirmTerminates),
            audit: None,
            flow: OrchestrationFlow,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn from_config(
        oracle: Arc<dyn DecisionOracle>,
        catalog: Arc<ActionCatalog>,
        config: &AgentConfig,
    ) -> Self {
        Self::new(oracle, catalog)
            .with_predicate(Arc::new(TerminalActions::new(config.terminal_actions.iter().copied())))
            .with_max_turns(config.max_turns)
    }

    pub fn with_predicate(mut self, predicate: Arc<dyn ContinuationPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub async fn run_conversation(
        &self,
        input: impl Into<String>,
        history: Vec<String>,
    ) -> Result<String, RunError> {
        self.run(ConversationState::new(input, history)).await.map(|outcome| outcome.output)
    }

    pub async fn run(&self, state: ConversationState) -> Result<RunOutcome, RunError> {
        self.drive(state, |_| true).await
    }

    pub fn stream(
        &self,
        input: impl Into<String>,
        history: Vec<String>,
    ) -> mpsc::UnboundedReceiver<Result<TurnUpdate, RunError>> {
        self.stream_state(ConversationState::new(input, history))
    }

    /// Runs on a spawned task. The receiver sees one update per turn and ends after the
    /// terminating update or the first error. Dropping it stops the run before the next
    /// oracle consultation.
    pub fn stream_state(
        &self,
        state: ConversationState,
    ) -> mpsc::UnboundedReceiver<Result<TurnUpdate, RunError>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let runner = self.clone();

        tokio::spawn(async move {
            let updates = sender.clone();
            let result = runner.drive(state, move |update| updates.send(Ok(update)).is_ok()).await;
            match result {
                Ok(_) | Err(RunError::Abandoned) => {}
                Err(error) => {
                    let _ = sender.send(Err(error));
                }
            }
        });

        receiver
    }

    async fn drive<F>(
        &self,
        mut state: ConversationState,
        mut on_turn: F,
    ) -> Result<RunOutcome, RunError>
    where
        F: FnMut(TurnUpdate) -> bool + Send,
    {
        let conversation_id = Uuid::new_v4().to_string();
        let mut current = self.flow.initial_state();
        let mut turns = 0;

        loop {
            if turns >= self.max_turns {
                warn!(
                    event_name = "agent.loop.turn_limit",
                    correlation_id = %conversation_id,
                    max_turns = self.max_turns,
                    step_count = state.steps().len(),
                    "conversation exceeded its turn limit"
                );
                return Err(RunError::TurnLimitExceeded { max_turns: self.max_turns });
            }
            turns += 1;

            let decision = match self.oracle.decide(&state, self.catalog.definitions()).await {
                Ok(decision) => decision,
                Err(error) => {
                    warn!(
                        event_name = "agent.loop.oracle_failed",
                        correlation_id = %conversation_id,
                        turn = turns,
                        error = %error,
                        "decision oracle produced no decision"
                    );
                    return Err(error.into());
                }
            };

            let (action, arguments, message) = match decision {
                Decision::Finish { output } => {
                    info!(
                        event_name = "agent.loop.decision",
                        correlation_id = %conversation_id,
                        turn = turns,
                        decision = "finish",
                        "oracle returned a final answer"
                    );
                    current =
                        self.advance(current, LoopEvent::FinalAnswer, &conversation_id, &state)?;
                    return Ok(self.finish(conversation_id, current, output, turns, state, on_turn));
                }
                Decision::Invoke { action, arguments, message } => (action, arguments, message),
            };

            info!(
                event_name = "agent.loop.decision",
                correlation_id = %conversation_id,
                turn = turns,
                decision = "invoke",
                action = %action,
                "oracle selected an action"
            );
            current = self.advance(current, LoopEvent::ActionSelected, &conversation_id, &state)?;

            let step = self.catalog.dispatch(&action, arguments, state.transaction_mut()).await;
            info!(
                event_name = "agent.loop.step_recorded",
                correlation_id = %conversation_id,
                transaction_id = ?state.transaction().current(),
                turn = turns,
                action = %step.action,
                is_error = step.observation.is_error(),
                step_count = state.steps().len() + 1,
                "step recorded"
            );
            self.audit_step(&conversation_id, &state, &step);
            state.record(step);
            current = self.advance(current, LoopEvent::StepRecorded, &conversation_id, &state)?;

            // A call rejected by validation never reached the gateway, so it cannot end the run.
            let rejected = state
                .last_step()
                .and_then(|step| step.observation.error_kind())
                .is_some_and(|kind| kind == ActionErrorKind::InvalidArguments);
            let continuation = if rejected {
                Continuation::Continue
            } else {
                self.predicate.evaluate(state.steps())
            };
            current = self.advance(current, continuation.event(), &conversation_id, &state)?;

            if current == LoopState::Terminated {
                let output = message.unwrap_or_default();
                return Ok(self.finish(conversation_id, current, output, turns, state, on_turn));
            }

            let update = TurnUpdate {
                turn: turns,
                phase: current,
                step_count: state.steps().len(),
                step: state.last_step().cloned(),
                output: None,
                transaction_id: state.transaction().current(),
            };
            if !on_turn(update) {
                info!(
                    event_name = "agent.loop.abandoned",
                    correlation_id = %conversation_id,
                    turn = turns,
                    "caller stopped consuming the conversation"
                );
                return Err(RunError::Abandoned);
            }
        }
    }

    fn finish<F>(
        &self,
        conversation_id: String,
        phase: LoopState,
        output: String,
        turns: usize,
        state: ConversationState,
        mut on_turn: F,
    ) -> RunOutcome
    where
        F: FnMut(TurnUpdate) -> bool,
    {
        info!(
            event_name = "agent.loop.terminated",
            correlation_id = %conversation_id,
            transaction_id = ?state.transaction().current(),
            turns,
            step_count = state.steps().len(),
            "conversation reached a terminal state"
        );

        let _ = on_turn(TurnUpdate {
            turn: turns,
            phase,
            step_count: state.steps().len(),
            step: state.last_step().cloned(),
            output: Some(output.clone()),
            transaction_id: state.transaction().current(),
        });

        RunOutcome { conversation_id, output, turns, state }
    }

    fn audit_step(&self, conversation_id: &str, state: &ConversationState, step: &StepRecord) {
        let Some(sink) = &self.audit else {
            return;
        };
        let context =
            AuditContext::new(conversation_id, state.transaction().current(), "orchestration-loop");
        let outcome =
            if step.observation.is_error() { AuditOutcome::Failed } else { AuditOutcome::Success };
        let mut event =
            AuditEvent::new(&context, "orchestration.step_recorded", AuditCategory::Action, outcome)
                .with_metadata("action", step.action.clone());
        if let Some(kind) = step.observation.error_kind() {
            event = event.with_metadata("error_kind", format!("{kind:?}"));
        }
        sink.emit(event);
    }

    fn advance(
        &self,
        current: LoopState,
        event: LoopEvent,
        conversation_id: &str,
        state: &ConversationState,
    ) -> Result<LoopState, RunError> {
        let outcome = match &self.audit {
            Some(sink) => {
                let audit = AuditContext::new(
                    conversation_id,
                    state.transaction().current(),
                    "orchestration-loop",
                );
                self.flow.apply_with_audit(current, event, sink.as_ref(), &audit)?
            }
            None => self.flow.apply(current, event)?,
        };
        Ok(outcome.to)
    }
}
