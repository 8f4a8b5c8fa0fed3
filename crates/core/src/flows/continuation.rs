use std::collections::BTreeSet;

use crate::conversation::StepRecord;
use crate::flows::states::Continuation;
use crate::protocol::ProtocolAction;

/// Decides, from the step log alone, whether a run has reached a terminal outcome.
pub trait ContinuationPredicate: Send + Sync {
    fn evaluate(&self, steps: &[StepRecord]) -> Continuation;
}

/// Ends the conversation iff the most recent step was `confirm`. Earlier steps are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfirmTerminates;

impl ContinuationPredicate for ConfirmTerminates {
    fn evaluate(&self, steps: &[StepRecord]) -> Continuation {
        match steps.last() {
            Some(step) if step.is_action(ProtocolAction::Confirm) => Continuation::End,
            _ => Continuation::Continue,
        }
    }
}

/// Ends the conversation when the most recent step is any of a configured set of actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalActions {
    actions: BTreeSet<ProtocolAction>,
}

impl TerminalActions {
    pub fn new(actions: impl IntoIterator<Item = ProtocolAction>) -> Self {
        Self { actions: actions.into_iter().collect() }
    }

    pub fn actions(&self) -> impl Iterator<Item = ProtocolAction> + '_ {
        self.actions.iter().copied()
    }
}

impl Default for TerminalActions {
    fn default() -> Self {
        Self::new([ProtocolAction::Confirm])
    }
}

impl ContinuationPredicate for TerminalActions {
    fn evaluate(&self, steps: &[StepRecord]) -> Continuation {
        let terminal = steps
            .last()
            .and_then(StepRecord::protocol_action)
            .is_some_and(|action| self.actions.contains(&action));
        if terminal {
            Continuation::End
        } else {
            Continuation::Continue
        }
    }
}
