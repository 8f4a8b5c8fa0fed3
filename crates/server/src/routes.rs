use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use concierge_agent::{ActionCatalog, OrchestrationLoop};
use concierge_core::conversation::{ConversationState, Observation};
use concierge_core::errors::{ActionErrorKind, InterfaceError};
use concierge_core::protocol::{ActionArguments, TransactionId, TransactionScope};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

pub const TRANSACTION_HEADER: &str = "x-transaction-id";

#[derive(Clone)]
pub struct AppState {
    orchestration: OrchestrationLoop,
    catalog: Arc<ActionCatalog>,
}

impl AppState {
    pub fn new(orchestration: OrchestrationLoop, catalog: Arc<ActionCatalog>) -> Self {
        Self { orchestration, catalog }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/{action}", post(invoke_action))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub chat_history: Vec<String>,
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    pub steps: usize,
}

/// Maps an `InterfaceError` onto its HTTP status and a `{error, detail, correlation_id}` body.
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.0.user_message(),
            "detail": self.0.to_string(),
            "correlation_id": self.0.correlation_id(),
        });
        (status, Json(body)).into_response()
    }
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let mut conversation = ConversationState::new(request.input, request.chat_history);
    if let Some(transaction_id) = request.transaction_id {
        conversation = conversation.resume_transaction(transaction_id);
    }

    match state.orchestration.run(conversation).await {
        Ok(outcome) => {
            info!(
                event_name = "server.chat.completed",
                correlation_id = %correlation_id,
                conversation_id = %outcome.conversation_id,
                turns = outcome.turns,
                "chat request completed"
            );
            Ok(Json(ChatResponse {
                response: outcome.output,
                transaction_id: outcome.state.transaction().current(),
                steps: outcome.state.steps().len(),
            }))
        }
        Err(error) => {
            warn!(
                event_name = "server.chat.failed",
                correlation_id = %correlation_id,
                error = %error,
                "chat request failed"
            );
            Err(ApiError(error.into_interface(correlation_id)))
        }
    }
}

async fn invoke_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let handler = state
        .catalog
        .resolve(&action)
        .map_err(|error| ApiError(error.into_interface(correlation_id.clone())))?;

    let Value::Object(mut arguments) = body else {
        return Err(ApiError(InterfaceError::BadRequest {
            message: "request body must be a JSON object".to_string(),
            correlation_id,
        }));
    };
    let mut scope = resume_scope(&mut arguments, &correlation_id)?;

    let observation = state
        .catalog
        .invoke(handler, &arguments, &mut scope)
        .await
        .map_err(|error| ApiError(error.into_interface(correlation_id.clone())))?;

    let transaction_id = scope.current().map(|id| id.to_string()).unwrap_or_default();
    match observation {
        Observation::Success { payload } => {
            info!(
                event_name = "server.action.completed",
                correlation_id = %correlation_id,
                action = %handler.action(),
                transaction_id = %transaction_id,
                "action forwarded to gateway"
            );
            Ok(([(TRANSACTION_HEADER, transaction_id)], Json(payload)).into_response())
        }
        Observation::Error { kind, message } => {
            warn!(
                event_name = "server.action.failed",
                correlation_id = %correlation_id,
                action = %handler.action(),
                error = %message,
                "gateway rejected action"
            );
            let error = match kind {
                ActionErrorKind::GatewayFailure => {
                    InterfaceError::BadGateway { message, correlation_id }
                }
                ActionErrorKind::InvalidArguments => {
                    InterfaceError::BadRequest { message, correlation_id }
                }
                ActionErrorKind::UnknownAction => {
                    InterfaceError::NotFound { message, correlation_id }
                }
            };
            Err(ApiError(error))
        }
    }
}

/// Pulls an optional `transaction_id` out of the body so post-order calls can continue an order.
fn resume_scope(
    arguments: &mut ActionArguments,
    correlation_id: &str,
) -> Result<TransactionScope, ApiError> {
    match arguments.remove("transaction_id") {
        None | Some(Value::Null) => Ok(TransactionScope::default()),
        Some(value) => serde_json::from_value::<TransactionId>(value)
            .map(TransactionScope::resume)
            .map_err(|error| {
                ApiError(InterfaceError::BadRequest {
                    message: format!("transaction_id must be a UUID: {error}"),
                    correlation_id: correlation_id.to_string(),
                })
            }),
    }
}
