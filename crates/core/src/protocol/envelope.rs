use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::protocol::{ActionRequest, InitArgs, ProtocolAction, TransactionContext};

/// Cancellation reason sent with every `cancel` unless configured otherwise.
pub const DEFAULT_CANCELLATION_REASON_ID: &str = "5";

/// The `{context, message}` body POSTed to the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub context: TransactionContext,
    pub message: Value,
}

impl Envelope {
    pub fn new(
        context: TransactionContext,
        request: &ActionRequest,
        cancellation_reason_id: &str,
    ) -> Self {
        Self { context, message: message_for(request, cancellation_reason_id) }
    }

    pub fn action(&self) -> ProtocolAction {
        self.context.action
    }
}

fn message_for(request: &ActionRequest, cancellation_reason_id: &str) -> Value {
    match request {
        ActionRequest::Search(args) => json!({
            "intent": {
                "item": { "descriptor": { "name": args.item } },
                "fulfillment": { "end": { "location": { "gps": args.delivery_location } } }
            }
        }),
        ActionRequest::Select(args) => json!({
            "order": {
                "provider": { "id": args.provider_id },
                "items": [{ "id": args.item_id }]
            }
        }),
        ActionRequest::Init(args) => json!({ "order": order_body(args) }),
        ActionRequest::Confirm(args) => {
            let mut order = order_body(&args.order);
            if let Value::Object(fields) = &mut order {
                fields.insert("payment".to_string(), args.payment_info.clone());
            }
            json!({ "order": order })
        }
        ActionRequest::Status(args) | ActionRequest::Track(args) => {
            json!({ "order_id": args.order_id })
        }
        ActionRequest::Cancel(args) => json!({
            "order_id": args.order_id,
            "cancellation_reason_id": cancellation_reason_id
        }),
        ActionRequest::Support(args) => json!({ "ref_id": args.order_id }),
    }
}

fn order_body(args: &InitArgs) -> Value {
    json!({
        "provider": { "id": args.provider_id },
        "items": [{ "id": args.item_id }],
        "billing": args.billing_info,
        "fulfillment": {
            "end": {
                "location": {
                    "gps": args.delivery_info.location,
                    "address": args.delivery_info.address
                },
                "contact": { "phone": args.delivery_info.phone }
            }
        }
    })
}
