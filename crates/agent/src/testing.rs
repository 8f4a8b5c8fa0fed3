//! In-process fakes for exercising the loop without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use concierge_core::errors::GatewayError;
use concierge_core::protocol::{Envelope, Gateway};
use serde_json::{json, Value};

#[derive(Default)]
struct Recorded {
    envelopes: Vec<Envelope>,
    responses: VecDeque<Result<Value, GatewayError>>,
    fallback: Option<GatewayError>,
}

/// Gateway that keeps every envelope it is handed and answers from a script.
///
/// Scripted responses are consumed in order; once exhausted it acknowledges with
/// `{"message": {"ack": {"status": "ACK"}}}` unless built with [`RecordingGateway::failing`].
#[derive(Clone, Default)]
pub struct RecordingGateway {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingGateway {
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<Value, GatewayError>>,
    ) -> Self {
        let gateway = Self::default();
        gateway.lock().responses.extend(responses);
        gateway
    }

    pub fn failing(error: GatewayError) -> Self {
        let gateway = Self::default();
        gateway.lock().fallback = Some(error);
        gateway
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.lock().envelopes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn post(&self, envelope: &Envelope) -> Result<Value, GatewayError> {
        let mut recorded = self.lock();
        recorded.envelopes.push(envelope.clone());

        if let Some(response) = recorded.responses.pop_front() {
            return response;
        }
        match &recorded.fallback {
            Some(error) => Err(error.clone()),
            None => Ok(json!({
                "context": { "action": envelope.action().as_str() },
                "message": { "ack": { "status": "ACK" } }
            })),
        }
    }
}
