use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use concierge_core::errors::GatewayError;
use concierge_core::protocol::{
    ActionArguments, ActionRequest, Envelope, Gateway, NetworkIdentity, ProtocolAction,
    TransactionContext, TransactionId, DEFAULT_CANCELLATION_REASON_ID,
};
use concierge_gateway::HttpGateway;
use serde_json::{json, Value};

type Received = Arc<Mutex<Vec<(String, Value)>>>;

async fn record(
    State(received): State<Received>,
    Path(action): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Ok(mut received) = received.lock() {
        received.push((action.clone(), body));
    }
    if action == "cancel" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "counterparty down"})));
    }
    (StatusCode::OK, Json(json!({"message": {"ack": {"status": "ACK"}}, "action": action})))
}

async fn spawn_stub() -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new().route("/{action}", post(record)).with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let address = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{address}"), received)
}

fn envelope(action: ProtocolAction, arguments: Value) -> Envelope {
    let arguments: ActionArguments = match arguments {
        Value::Object(map) => map,
        _ => ActionArguments::new(),
    };
    let request = ActionRequest::parse(action, &arguments).expect("valid arguments");
    let context = TransactionContext::new(
        &NetworkIdentity::default(),
        action,
        TransactionId::new(),
        request.counterparty(),
    )
    .expect("context builds");
    Envelope::new(context, &request, DEFAULT_CANCELLATION_REASON_ID)
}

#[tokio::test]
async fn posts_envelope_to_action_path_and_returns_reply() {
    let (base_url, received) = spawn_stub().await;
    let gateway = HttpGateway::new(base_url, Duration::from_secs(5)).expect("gateway builds");
    let envelope = envelope(
        ProtocolAction::Search,
        json!({"item": "pizza", "delivery_location": "12.9,77.5"}),
    );

    let reply = gateway.post(&envelope).await.expect("stub replies");

    assert_eq!(reply["action"], "search");
    assert_eq!(reply["message"]["ack"]["status"], "ACK");

    let received = received.lock().expect("received lock").clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "search");
    assert_eq!(received[0].1["context"]["action"], "search");
    assert_eq!(
        received[0].1["context"]["transaction_id"],
        json!(envelope.context.transaction_id.to_string())
    );
    assert_eq!(received[0].1["message"]["intent"]["item"]["descriptor"]["name"], "pizza");
}

#[tokio::test]
async fn non_success_status_surfaces_as_status_error() {
    let (base_url, _) = spawn_stub().await;
    let gateway = HttpGateway::new(base_url, Duration::from_secs(5)).expect("gateway builds");
    let envelope = envelope(
        ProtocolAction::Cancel,
        json!({"bpp_id": "bpp-1", "bpp_uri": "https://bpp.example", "order_id": "order-1"}),
    );

    let error = gateway.post(&envelope).await.expect_err("cancel is rejected by stub");

    match error {
        GatewayError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("counterparty down"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_gateway_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);

    let gateway = HttpGateway::new(format!("http://{address}"), Duration::from_secs(2))
        .expect("gateway builds");
    let envelope =
        envelope(ProtocolAction::Search, json!({"item": "tea", "delivery_location": "1,2"}));

    let error = gateway.post(&envelope).await.expect_err("nothing is listening");
    assert!(matches!(error, GatewayError::Transport(_)));
}
