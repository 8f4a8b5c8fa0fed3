//! HTTP transport for protocol envelopes.
//!
//! `HttpGateway` POSTs each envelope to `{base_url}/{action}` and returns the counterparty's JSON
//! reply untouched. Base URL and timeout are fixed at construction.

use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::GatewayConfig;
use concierge_core::errors::GatewayError;
use concierge_core::protocol::{Envelope, Gateway};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, envelope: &Envelope) -> String {
        format!("{}/{}", self.base_url, envelope.action().endpoint())
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn post(&self, envelope: &Envelope) -> Result<Value, GatewayError> {
        let url = self.url_for(envelope);
        let context = &envelope.context;

        info!(
            event_name = "gateway.request.sent",
            action = %context.action,
            transaction_id = %context.transaction_id,
            message_id = %context.message_id,
            url = %url,
            "posting envelope to gateway"
        );

        let result = send(&self.client, &url, envelope).await;
        match &result {
            Ok(_) => info!(
                event_name = "gateway.response.received",
                action = %context.action,
                transaction_id = %context.transaction_id,
                message_id = %context.message_id,
                "gateway responded"
            ),
            Err(error) => warn!(
                event_name = "gateway.request.failed",
                action = %context.action,
                transaction_id = %context.transaction_id,
                message_id = %context.message_id,
                error = %error,
                "gateway call failed"
            ),
        }
        result
    }
}

async fn send(client: &Client, url: &str, envelope: &Envelope) -> Result<Value, GatewayError> {
    let response = client
        .post(url)
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json")
        .json(envelope)
        .send()
        .await
        .map_err(|error| GatewayError::Transport(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Status { status: status.as_u16(), body });
    }

    response.json::<Value>().await.map_err(|error| GatewayError::Decode(error.to_string()))
}
