use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{Continuation, LoopEvent, LoopState, TransitionOutcome};

/// Transition table of the orchestration loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrchestrationFlow;

impl OrchestrationFlow {
    pub fn initial_state(&self) -> LoopState {
        LoopState::Deciding
    }

    pub fn apply(
        &self,
        current: LoopState,
        event: LoopEvent,
    ) -> Result<TransitionOutcome, LoopTransitionError> {
        transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: LoopState,
        event: LoopEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, LoopTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "orchestration.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "orchestration.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Continuation {
    pub fn event(&self) -> LoopEvent {
        match self {
            Self::Continue => LoopEvent::PredicateContinue,
            Self::End => LoopEvent::PredicateEnd,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LoopTransitionError {
    #[error("invalid orchestration transition from {state:?} using event {event:?}")]
    InvalidTransition { state: LoopState, event: LoopEvent },
}

fn transition(
    current: LoopState,
    event: LoopEvent,
) -> Result<TransitionOutcome, LoopTransitionError> {
    use LoopEvent::{ActionSelected, FinalAnswer, PredicateContinue, PredicateEnd, StepRecorded};
    use LoopState::{Continuing, Deciding, Invoking, Terminated};

    let to = match (current, event) {
        (Deciding, FinalAnswer) => Terminated,
        (Deciding, ActionSelected) => Invoking,
        (Invoking, StepRecorded) => Continuing,
        (Continuing, PredicateEnd) => Terminated,
        (Continuing, PredicateContinue) => Deciding,
        _ => return Err(LoopTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::flows::engine::{LoopTransitionError, OrchestrationFlow};
    use crate::flows::states::{Continuation, LoopEvent, LoopState};

    #[test]
    fn action_turn_cycles_back_to_deciding() {
        let flow = OrchestrationFlow;
        let mut state = flow.initial_state();
        assert_eq!(state, LoopState::Deciding);

        for (event, expected) in [
            (LoopEvent::ActionSelected, LoopState::Invoking),
            (LoopEvent::StepRecorded, LoopState::Continuing),
            (Continuation::Continue.event(), LoopState::Deciding),
        ] {
            state = flow.apply(state, event).expect("valid transition").to;
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn final_answer_terminates_directly() {
        let outcome = OrchestrationFlow
            .apply(LoopState::Deciding, LoopEvent::FinalAnswer)
            .expect("deciding -> terminated");
        assert_eq!(outcome.to, LoopState::Terminated);
    }

    #[test]
    fn predicate_end_terminates() {
        let outcome = OrchestrationFlow
            .apply(LoopState::Continuing, Continuation::End.event())
            .expect("continuing -> terminated");
        assert_eq!(outcome.to, LoopState::Terminated);
    }

    #[test]
    fn terminated_accepts_no_events() {
        for event in [
            LoopEvent::FinalAnswer,
            LoopEvent::ActionSelected,
            LoopEvent::StepRecorded,
            LoopEvent::PredicateEnd,
            LoopEvent::PredicateContinue,
        ] {
            let error = OrchestrationFlow
                .apply(LoopState::Terminated, event)
                .expect_err("terminated is final");
            assert_eq!(
                error,
                LoopTransitionError::InvalidTransition { state: LoopState::Terminated, event }
            );
        }
    }

    #[test]
    fn invoking_cannot_skip_recording() {
        assert!(OrchestrationFlow.apply(LoopState::Invoking, LoopEvent::PredicateEnd).is_err());
    }

    #[test]
    fn transitions_are_audited() {
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new("conv-9", None, "orchestration-loop");

        let _ = OrchestrationFlow
            .apply_with_audit(LoopState::Deciding, LoopEvent::ActionSelected, &sink, &audit)
            .expect("transition should succeed");
        let _ = OrchestrationFlow.apply_with_audit(
            LoopState::Terminated,
            LoopEvent::ActionSelected,
            &sink,
            &audit,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "orchestration.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("Invoking"));
        assert_eq!(events[1].event_type, "orchestration.transition_rejected");
        assert_eq!(events[1].correlation_id, "conv-9");
    }
}
