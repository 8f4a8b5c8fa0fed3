use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ActionError;
use crate::protocol::ProtocolAction;

/// Raw arguments as selected by the oracle: parameter name to JSON value.
pub type ActionArguments = Map<String, Value>;

/// Provider-side endpoint chosen from a search result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub bpp_id: String,
    pub bpp_uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    /// GPS coordinate pair, `"lat,lng"`.
    pub location: String,
    pub address: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub item: String,
    pub delivery_location: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectArgs {
    pub counterparty: Counterparty,
    pub provider_id: String,
    pub item_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitArgs {
    pub counterparty: Counterparty,
    pub provider_id: String,
    pub item_id: String,
    pub billing_info: Value,
    pub delivery_info: DeliveryInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmArgs {
    pub order: InitArgs,
    pub payment_info: Value,
}

/// Arguments shared by the post-order actions (status, track, cancel, support).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefArgs {
    pub counterparty: Counterparty,
    pub order_id: String,
}

/// A validated invocation of one protocol action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    Search(SearchArgs),
    Select(SelectArgs),
    Init(InitArgs),
    Confirm(ConfirmArgs),
    Status(OrderRefArgs),
    Track(OrderRefArgs),
    Cancel(OrderRefArgs),
    Support(OrderRefArgs),
}

impl ActionRequest {
    /// Validates `arguments` against the schema of `action`, reporting every missing or
    /// malformed key.
    pub fn parse(action: ProtocolAction, arguments: &ActionArguments) -> Result<Self, ActionError> {
        let mut reader = FieldReader::new(arguments);

        let request = match action {
            ProtocolAction::Search => {
                let item = reader.text("item");
                let delivery_location = reader.text_with_alias("delivery_location", "location");
                Self::Search(SearchArgs { item, delivery_location })
            }
            ProtocolAction::Select => {
                let counterparty = reader.counterparty();
                let provider_id = reader.text("provider_id");
                let item_id = reader.text("item_id");
                Self::Select(SelectArgs { counterparty, provider_id, item_id })
            }
            ProtocolAction::Init => Self::Init(reader.init_args()),
            ProtocolAction::Confirm => {
                let order = reader.init_args();
                let payment_info = reader.object("payment_info");
                Self::Confirm(ConfirmArgs { order, payment_info })
            }
            ProtocolAction::Status => Self::Status(reader.order_ref()),
            ProtocolAction::Track => Self::Track(reader.order_ref()),
            ProtocolAction::Cancel => Self::Cancel(reader.order_ref()),
            ProtocolAction::Support => Self::Support(reader.order_ref()),
        };

        reader.finish(action)?;
        Ok(request)
    }

    pub fn action(&self) -> ProtocolAction {
        match self {
            Self::Search(_) => ProtocolAction::Search,
            Self::Select(_) => ProtocolAction::Select,
            Self::Init(_) => ProtocolAction::Init,
            Self::Confirm(_) => ProtocolAction::Confirm,
            Self::Status(_) => ProtocolAction::Status,
            Self::Track(_) => ProtocolAction::Track,
            Self::Cancel(_) => ProtocolAction::Cancel,
            Self::Support(_) => ProtocolAction::Support,
        }
    }

    pub fn counterparty(&self) -> Option<&Counterparty> {
        match self {
            Self::Search(_) => None,
            Self::Select(args) => Some(&args.counterparty),
            Self::Init(args) => Some(&args.counterparty),
            Self::Confirm(args) => Some(&args.order.counterparty),
            Self::Status(args) | Self::Track(args) | Self::Cancel(args) | Self::Support(args) => {
                Some(&args.counterparty)
            }
        }
    }
}

struct FieldReader<'a> {
    arguments: &'a ActionArguments,
    missing: Vec<String>,
    malformed: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(arguments: &'a ActionArguments) -> Self {
        Self { arguments, missing: Vec::new(), malformed: Vec::new() }
    }

    fn text(&mut self, key: &str) -> String {
        let arguments = self.arguments;
        self.text_value(key, arguments.get(key))
    }

    fn text_with_alias(&mut self, key: &str, alias: &str) -> String {
        let arguments = self.arguments;
        self.text_value(key, arguments.get(key).or_else(|| arguments.get(alias)))
    }

    fn text_value(&mut self, path: &str, value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => {
                self.missing.push(path.to_string());
                String::new()
            }
            Some(Value::String(text)) if text.trim().is_empty() => {
                self.missing.push(path.to_string());
                String::new()
            }
            Some(Value::String(text)) => text.trim().to_string(),
            Some(Value::Number(number)) => number.to_string(),
            Some(_) => {
                self.malformed.push(format!("`{path}` must be a string"));
                String::new()
            }
        }
    }

    fn object(&mut self, key: &str) -> Value {
        let arguments = self.arguments;
        match arguments.get(key) {
            None | Some(Value::Null) => {
                self.missing.push(key.to_string());
                Value::Null
            }
            Some(value @ Value::Object(_)) => value.clone(),
            // Oracles sometimes encode nested objects as JSON text.
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(value @ Value::Object(_)) => value,
                _ => {
                    self.malformed.push(format!("`{key}` must be an object"));
                    Value::Null
                }
            },
            Some(_) => {
                self.malformed.push(format!("`{key}` must be an object"));
                Value::Null
            }
        }
    }

    fn counterparty(&mut self) -> Counterparty {
        let bpp_id = self.text("bpp_id");
        let bpp_uri = self.text("bpp_uri");
        if !bpp_uri.is_empty()
            && !bpp_uri.starts_with("http://")
            && !bpp_uri.starts_with("https://")
        {
            self.malformed.push("`bpp_uri` must start with http:// or https://".to_string());
        }
        Counterparty { bpp_id, bpp_uri }
    }

    fn delivery_info(&mut self) -> DeliveryInfo {
        let object = self.object("delivery_info");
        let Value::Object(fields) = object else {
            return DeliveryInfo {
                location: String::new(),
                address: String::new(),
                phone: String::new(),
            };
        };

        DeliveryInfo {
            location: self.text_value("delivery_info.location", fields.get("location")),
            address: self.text_value("delivery_info.address", fields.get("address")),
            phone: self.text_value("delivery_info.phone", fields.get("phone")),
        }
    }

    fn init_args(&mut self) -> InitArgs {
        let counterparty = self.counterparty();
        let provider_id = self.text("provider_id");
        let item_id = self.text("item_id");
        let billing_info = self.object("billing_info");
        let delivery_info = self.delivery_info();
        InitArgs { counterparty, provider_id, item_id, billing_info, delivery_info }
    }

    fn order_ref(&mut self) -> OrderRefArgs {
        let counterparty = self.counterparty();
        let order_id = self.text("order_id");
        OrderRefArgs { counterparty, order_id }
    }

    fn finish(self, action: ProtocolAction) -> Result<(), ActionError> {
        if self.missing.is_empty() && self.malformed.is_empty() {
            return Ok(());
        }

        let mut problems = Vec::new();
        if !self.missing.is_empty() {
            let keys = self.missing.iter().map(|key| format!("`{key}`")).collect::<Vec<_>>();
            problems.push(format!("missing {}", keys.join(", ")));
        }
        problems.extend(self.malformed);
        Err(ActionError::invalid(action, problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{ActionArguments, ActionRequest};
    use crate::errors::ActionError;
    use crate::protocol::ProtocolAction;

    fn args(value: Value) -> ActionArguments {
        match value {
            Value::Object(map) => map,
            _ => ActionArguments::new(),
        }
    }

    #[test]
    fn select_without_provider_and_item_reports_both() {
        let error = ActionRequest::parse(
            ProtocolAction::Select,
            &args(json!({"bpp_id": "bpp-1", "bpp_uri": "https://bpp.example"})),
        )
        .expect_err("select needs provider and item");

        assert_eq!(
            error,
            ActionError::InvalidArguments {
                action: ProtocolAction::Select,
                reason: "missing `provider_id`, `item_id`".to_string(),
            }
        );
    }

    #[test]
    fn search_accepts_location_alias() {
        let request = ActionRequest::parse(
            ProtocolAction::Search,
            &args(json!({"item": "pizza", "location": "12.9715987,77.5945627"})),
        )
        .expect("search parses");

        let ActionRequest::Search(search) = request else {
            panic!("expected search request");
        };
        assert_eq!(search.item, "pizza");
        assert_eq!(search.delivery_location, "12.9715987,77.5945627");
    }

    #[test]
    fn init_reports_nested_delivery_fields() {
        let error = ActionRequest::parse(
            ProtocolAction::Init,
            &args(json!({
                "bpp_id": "bpp-1",
                "bpp_uri": "https://bpp.example",
                "provider_id": "prov-1",
                "item_id": "item-1",
                "billing_info": {"name": "Asha"},
                "delivery_info": {"location": "12.9,77.5", "address": "1 MG Road"}
            })),
        )
        .expect_err("phone is required");

        assert!(error.to_string().contains("`delivery_info.phone`"));
    }

    #[test]
    fn confirm_accepts_json_encoded_objects() {
        let request = ActionRequest::parse(
            ProtocolAction::Confirm,
            &args(json!({
                "bpp_id": "bpp-1",
                "bpp_uri": "https://bpp.example",
                "provider_id": "prov-1",
                "item_id": "item-1",
                "billing_info": "{\"name\": \"Asha\"}",
                "delivery_info": {
                    "location": "12.9,77.5",
                    "address": "1 MG Road",
                    "phone": "9999999999"
                },
                "payment_info": {"type": "ON-FULFILLMENT"}
            })),
        )
        .expect("confirm parses");

        assert_eq!(request.action(), ProtocolAction::Confirm);
        let ActionRequest::Confirm(confirm) = request else {
            panic!("expected confirm request");
        };
        assert_eq!(confirm.order.billing_info, json!({"name": "Asha"}));
        assert_eq!(confirm.order.delivery_info.phone, "9999999999");
    }

    #[test]
    fn counterparty_uri_must_be_http() {
        let error = ActionRequest::parse(
            ProtocolAction::Status,
            &args(json!({"bpp_id": "bpp-1", "bpp_uri": "bpp.example", "order_id": "o-1"})),
        )
        .expect_err("uri without scheme");

        assert!(error.to_string().contains("`bpp_uri` must start with http:// or https://"));
    }

    #[test]
    fn order_actions_expose_counterparty() {
        let request = ActionRequest::parse(
            ProtocolAction::Cancel,
            &args(json!({"bpp_id": "bpp-1", "bpp_uri": "https://bpp.example", "order_id": 42})),
        )
        .expect("cancel parses");

        let counterparty = request.counterparty().expect("cancel carries a counterparty");
        assert_eq!(counterparty.bpp_id, "bpp-1");
        let ActionRequest::Cancel(cancel) = request else {
            panic!("expected cancel request");
        };
        assert_eq!(cancel.order_id, "42");
    }
}
