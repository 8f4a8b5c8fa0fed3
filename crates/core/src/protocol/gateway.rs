use async_trait::async_trait;
use serde_json::Value;

use crate::errors::GatewayError;
use crate::protocol::Envelope;

/// The protocol gateway: delivers one envelope to the network and returns its reply verbatim.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn post(&self, envelope: &Envelope) -> Result<Value, GatewayError>;
}
