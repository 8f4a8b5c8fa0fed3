pub mod audit;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod flows;
pub mod protocol;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
pub use conversation::{ConversationState, Observation, StepRecord};
pub use errors::{
    ActionError, ActionErrorKind, GatewayError, InterfaceError, OracleError, RunError,
};
pub use flows::{
    ConfirmTerminates, Continuation, ContinuationPredicate, LoopEvent, LoopState,
    LoopTransitionError, OrchestrationFlow, TerminalActions, TransitionOutcome,
};
pub use protocol::{
    ActionArguments, ActionRequest, Counterparty, Envelope, Gateway, MessageId, NetworkIdentity,
    ProtocolAction, TransactionContext, TransactionId, TransactionScope,
};
