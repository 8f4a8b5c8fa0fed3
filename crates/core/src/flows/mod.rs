pub mod continuation;
pub mod engine;
pub mod states;

pub use continuation::{ConfirmTerminates, ContinuationPredicate, TerminalActions};
pub use engine::{LoopTransitionError, OrchestrationFlow};
pub use states::{Continuation, LoopEvent, LoopState, TransitionOutcome};
