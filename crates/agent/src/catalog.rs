use std::collections::BTreeMap;
use std::sync::Arc;

use concierge_core::config::GatewayConfig;
use concierge_core::conversation::{Observation, StepRecord};
use concierge_core::errors::ActionError;
use concierge_core::protocol::{
    ActionArguments, ActionRequest, Envelope, Gateway, NetworkIdentity, ProtocolAction,
    TransactionContext, TransactionScope, DEFAULT_CANCELLATION_REASON_ID,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Name, description and JSON-schema parameters of one action, as offered to the oracle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl ActionDefinition {
    /// Definitions for every protocol action, in catalog order.
    pub fn all() -> Vec<Self> {
        ProtocolAction::ALL.into_iter().map(Self::for_action).collect()
    }

    fn for_action(action: ProtocolAction) -> Self {
        let mut properties = Map::new();
        for field in action.required_fields() {
            properties.insert((*field).to_string(), field_schema(field));
        }

        Self {
            name: action.as_str(),
            description: action.description(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": action.required_fields(),
            }),
        }
    }
}

fn field_schema(field: &str) -> Value {
    match field {
        "delivery_info" => json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "GPS coordinates as \"lat,lng\"" },
                "address": { "type": "string" },
                "phone": { "type": "string" }
            },
            "required": ["location", "address", "phone"]
        }),
        "billing_info" | "payment_info" => json!({ "type": "object" }),
        "delivery_location" => {
            json!({ "type": "string", "description": "GPS coordinates as \"lat,lng\"" })
        }
        _ => json!({ "type": "string" }),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionHandler {
    action: ProtocolAction,
    definition: ActionDefinition,
}

impl ActionHandler {
    pub fn action(&self) -> ProtocolAction {
        self.action
    }

    pub fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

/// Lookup table from action name to handler, bound to one gateway and network identity.
#[derive(Clone)]
pub struct ActionCatalog {
    gateway: Arc<dyn Gateway>,
    identity: NetworkIdentity,
    cancellation_reason_id: String,
    handlers: BTreeMap<ProtocolAction, ActionHandler>,
    definitions: Vec<ActionDefinition>,
}

impl ActionCatalog {
    pub fn new(gateway: Arc<dyn Gateway>, identity: NetworkIdentity) -> Self {
        let handlers: BTreeMap<_, _> = ProtocolAction::ALL
            .into_iter()
            .map(|action| {
                (action, ActionHandler { action, definition: ActionDefinition::for_action(action) })
            })
            .collect();
        let definitions = handlers.values().map(|handler| handler.definition.clone()).collect();

        Self {
            gateway,
            identity,
            cancellation_reason_id: DEFAULT_CANCELLATION_REASON_ID.to_string(),
            handlers,
            definitions,
        }
    }

    pub fn from_config(gateway: Arc<dyn Gateway>, config: &GatewayConfig) -> Self {
        Self::new(gateway, config.identity())
            .with_cancellation_reason(config.cancellation_reason_id.clone())
    }

    pub fn with_cancellation_reason(mut self, reason_id: impl Into<String>) -> Self {
        self.cancellation_reason_id = reason_id.into();
        self
    }

    pub fn identity(&self) -> &NetworkIdentity {
        &self.identity
    }

    pub fn definitions(&self) -> &[ActionDefinition] {
        &self.definitions
    }

    pub fn resolve(&self, name: &str) -> Result<&ActionHandler, ActionError> {
        let action: ProtocolAction = name.parse()?;
        self.handlers
            .get(&action)
            .ok_or_else(|| ActionError::UnknownAction { name: name.to_string() })
    }

    /// Validates the arguments, binds the call to the scope's transaction and performs exactly
    /// one gateway call. Gateway failures come back as an error observation, not as `Err`.
    pub async fn invoke(
        &self,
        handler: &ActionHandler,
        arguments: &ActionArguments,
        scope: &mut TransactionScope,
    ) -> Result<Observation, ActionError> {
        let action = handler.action;
        let request = ActionRequest::parse(action, arguments)?;
        let transaction_id = scope.bind(action);
        let counterparty = request.counterparty();
        let context =
            TransactionContext::new(&self.identity, action, transaction_id, counterparty)?;
        let envelope = Envelope::new(context, &request, &self.cancellation_reason_id);

        debug!(
            event_name = "agent.catalog.invoke",
            action = %action,
            transaction_id = %transaction_id,
            message_id = %envelope.context.message_id,
            "dispatching action to gateway"
        );

        match self.gateway.post(&envelope).await {
            Ok(payload) => Ok(Observation::success(payload)),
            Err(error) => Ok(Observation::from_error(&ActionError::GatewayFailure {
                action,
                message: error.to_string(),
            })),
        }
    }

    /// Resolve and invoke in one go, folding every per-action failure into the step's observation.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: ActionArguments,
        scope: &mut TransactionScope,
    ) -> StepRecord {
        let handler = match self.resolve(name) {
            Ok(handler) => handler,
            Err(error) => return StepRecord::new(name, arguments, Observation::from_error(&error)),
        };

        let observation = match self.invoke(handler, &arguments, scope).await {
            Ok(observation) => observation,
            Err(error) => Observation::from_error(&error),
        };
        StepRecord::new(handler.action.as_str(), arguments, observation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use concierge_core::errors::{ActionError, ActionErrorKind, GatewayError};
    use concierge_core::protocol::{
        ActionArguments, NetworkIdentity, ProtocolAction, TransactionScope,
    };
    use serde_json::{json, Value};

    use super::ActionCatalog;
    use crate::testing::RecordingGateway;

    fn arguments(value: Value) -> ActionArguments {
        match value {
            Value::Object(map) => map,
            _ => ActionArguments::new(),
        }
    }

    fn recording_catalog() -> ActionCatalog {
        ActionCatalog::new(Arc::new(RecordingGateway::default()), NetworkIdentity::default())
    }

    fn counterparty() -> Value {
        json!({"bpp_id": "bpp-1", "bpp_uri": "https://bpp.example"})
    }

    #[test]
    fn resolve_returns_the_same_handler_every_time() {
        let catalog = recording_catalog();

        let first = catalog.resolve("search").expect("search is registered");
        let second = catalog.resolve("search").expect("search is registered");

        assert!(std::ptr::eq(first, second));
        assert_eq!(first.action(), ProtocolAction::Search);
        assert!(std::ptr::eq(first, catalog.resolve("Search").expect("case-insensitive")));
    }

    #[test]
    fn resolve_rejects_unregistered_names() {
        let catalog = recording_catalog();

        let error = catalog.resolve("Refund").expect_err("refund is not an action");
        assert_eq!(error, ActionError::UnknownAction { name: "Refund".to_string() });
    }

    #[test]
    fn definitions_cover_every_action_with_required_fields() {
        let catalog = recording_catalog();
        let definitions = catalog.definitions();

        assert_eq!(definitions.len(), 8);
        let select =
            definitions.iter().find(|definition| definition.name == "select").expect("select");
        assert_eq!(
            select.parameters["required"],
            json!(["bpp_id", "bpp_uri", "provider_id", "item_id"])
        );
        let init = definitions.iter().find(|definition| definition.name == "init").expect("init");
        assert_eq!(init.parameters["properties"]["delivery_info"]["type"], "object");
    }

    #[tokio::test]
    async fn select_with_missing_arguments_makes_no_gateway_call() {
        let gateway = Arc::new(RecordingGateway::default());
        let catalog = ActionCatalog::new(gateway.clone(), NetworkIdentity::default());
        let handler = catalog.resolve("select").expect("select is registered");
        let mut scope = TransactionScope::default();

        let error = catalog
            .invoke(handler, &arguments(counterparty()), &mut scope)
            .await
            .expect_err("provider_id and item_id are missing");

        match error {
            ActionError::InvalidArguments { action, reason } => {
                assert_eq!(action, ProtocolAction::Select);
                assert!(reason.contains("provider_id"));
                assert!(reason.contains("item_id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(gateway.envelopes().is_empty());
        assert_eq!(scope.current(), None);
    }

    #[tokio::test]
    async fn select_then_init_share_transaction_with_distinct_messages() {
        let gateway = Arc::new(RecordingGateway::default());
        let catalog = ActionCatalog::new(gateway.clone(), NetworkIdentity::default());
        let mut scope = TransactionScope::default();

        let mut select = arguments(counterparty());
        select.insert("provider_id".to_string(), json!("prov-1"));
        select.insert("item_id".to_string(), json!("item-1"));
        let mut init = select.clone();
        init.insert("billing_info".to_string(), json!({"name": "Asha"}));
        init.insert(
            "delivery_info".to_string(),
            json!({"location": "12.9,77.5", "address": "1 MG Road", "phone": "99999"}),
        );

        let first = catalog.dispatch("select", select, &mut scope).await;
        let second = catalog.dispatch("init", init, &mut scope).await;
        assert!(!first.observation.is_error());
        assert!(!second.observation.is_error());

        let envelopes = gateway.envelopes();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].context.transaction_id, envelopes[1].context.transaction_id);
        assert_ne!(envelopes[0].context.message_id, envelopes[1].context.message_id);
        assert_eq!(envelopes[1].context.bpp_id.as_deref(), Some("bpp-1"));
    }

    #[tokio::test]
    async fn gateway_failure_becomes_error_observation() {
        let gateway = Arc::new(RecordingGateway::failing(GatewayError::Transport(
            "connection refused".to_string(),
        )));
        let catalog = ActionCatalog::new(gateway.clone(), NetworkIdentity::default());
        let mut scope = TransactionScope::default();

        let step = catalog
            .dispatch(
                "search",
                arguments(json!({"item": "pizza", "delivery_location": "12.9,77.5"})),
                &mut scope,
            )
            .await;

        assert_eq!(step.action, "search");
        assert_eq!(step.observation.error_kind(), Some(ActionErrorKind::GatewayFailure));
        let rendered: Value = serde_json::from_str(&step.observation.render()).expect("json");
        assert!(rendered["error"]
            .as_str()
            .is_some_and(|message| message.contains("connection refused")));
        assert_eq!(gateway.envelopes().len(), 1);
    }

    #[tokio::test]
    async fn cancel_uses_configured_reason() {
        let gateway = Arc::new(RecordingGateway::default());
        let catalog = ActionCatalog::new(gateway.clone(), NetworkIdentity::default())
            .with_cancellation_reason("7");
        let mut scope = TransactionScope::default();

        let mut cancel = arguments(counterparty());
        cancel.insert("order_id".to_string(), json!("order-9"));
        let step = catalog.dispatch("cancel", cancel, &mut scope).await;

        assert!(!step.observation.is_error());
        assert_eq!(gateway.envelopes()[0].message["cancellation_reason_id"], "7");
    }

    #[tokio::test]
    async fn unknown_action_is_recorded_under_its_given_name() {
        let gateway = Arc::new(RecordingGateway::default());
        let catalog = ActionCatalog::new(gateway.clone(), NetworkIdentity::default());
        let mut scope = TransactionScope::default();

        let step = catalog.dispatch("Refund", ActionArguments::new(), &mut scope).await;

        assert_eq!(step.action, "Refund");
        assert_eq!(step.observation.error_kind(), Some(ActionErrorKind::UnknownAction));
        assert!(gateway.envelopes().is_empty());
    }
}
