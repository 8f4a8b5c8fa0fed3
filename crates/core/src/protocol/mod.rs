pub mod action;
pub mod arguments;
pub mod context;
pub mod envelope;
pub mod gateway;

pub use action::ProtocolAction;
pub use arguments::{
    ActionArguments, ActionRequest, ConfirmArgs, Counterparty, DeliveryInfo, InitArgs,
    OrderRefArgs, SearchArgs, SelectArgs,
};
pub use context::{
    MessageId, NetworkIdentity, TransactionContext, TransactionId, TransactionScope,
};
pub use envelope::{Envelope, DEFAULT_CANCELLATION_REASON_ID};
pub use gateway::Gateway;
