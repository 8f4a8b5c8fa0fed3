use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ActionError;
use crate::protocol::{Counterparty, ProtocolAction};

/// Correlation key shared by every call that belongs to one logical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique per gateway call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The caller's own network identity plus the fixed domain and locale it transacts in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentity {
    pub domain: String,
    pub country: String,
    pub city: String,
    pub core_version: String,
    pub bap_id: String,
    pub bap_uri: String,
}

impl Default for NetworkIdentity {
    fn default() -> Self {
        Self {
            domain: "local-retail".to_string(),
            country: "IND".to_string(),
            city: "std:080".to_string(),
            core_version: "1.1.0".to_string(),
            bap_id: "sandbox-bap-network.becknprotocol.io".to_string(),
            bap_uri: "https://sandbox-bap-network.becknprotocol.io/".to_string(),
        }
    }
}

/// Protocol `context` block, built fresh for each gateway call and discarded afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionContext {
    pub domain: String,
    pub country: String,
    pub city: String,
    pub action: ProtocolAction,
    pub core_version: String,
    pub bap_id: String,
    pub bap_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpp_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpp_uri: Option<String>,
    pub transaction_id: TransactionId,
    pub message_id: MessageId,
    pub timestamp: String,
}

impl TransactionContext {
    pub fn new(
        identity: &NetworkIdentity,
        action: ProtocolAction,
        transaction_id: TransactionId,
        counterparty: Option<&Counterparty>,
    ) -> Result<Self, ActionError> {
        Self::at(identity, action, transaction_id, counterparty, Utc::now())
    }

    pub fn at(
        identity: &NetworkIdentity,
        action: ProtocolAction,
        transaction_id: TransactionId,
        counterparty: Option<&Counterparty>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ActionError> {
        let (bpp_id, bpp_uri) = match counterparty {
            Some(counterparty) if action.requires_counterparty() => {
                if counterparty.bpp_id.trim().is_empty() || counterparty.bpp_uri.trim().is_empty() {
                    return Err(ActionError::invalid(
                        action,
                        "counterparty identity (`bpp_id`, `bpp_uri`) must not be empty",
                    ));
                }
                (Some(counterparty.bpp_id.clone()), Some(counterparty.bpp_uri.clone()))
            }
            None if action.requires_counterparty() => {
                return Err(ActionError::invalid(
                    action,
                    "counterparty identity (`bpp_id`, `bpp_uri`) is required after search",
                ));
            }
            _ => (None, None),
        };

        Ok(Self {
            domain: identity.domain.clone(),
            country: identity.country.clone(),
            city: identity.city.clone(),
            action,
            core_version: identity.core_version.clone(),
            bap_id: identity.bap_id.clone(),
            bap_uri: identity.bap_uri.clone(),
            bpp_id,
            bpp_uri,
            transaction_id,
            message_id: MessageId::new(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

/// Tracks which transaction the next gateway call belongs to.
///
/// `search` opens a new transaction; every later action reuses the open one so the
/// counterparty can correlate select, init, confirm and the post-order calls into one order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionScope {
    current: Option<TransactionId>,
}

impl TransactionScope {
    pub fn resume(transaction_id: TransactionId) -> Self {
        Self { current: Some(transaction_id) }
    }

    pub fn current(&self) -> Option<TransactionId> {
        self.current
    }

    pub fn bind(&mut self, action: ProtocolAction) -> TransactionId {
        match (action, self.current) {
            (ProtocolAction::Search, _) | (_, None) => {
                let transaction_id = TransactionId::new();
                self.current = Some(transaction_id);
                transaction_id
            }
            (_, Some(transaction_id)) => transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{NetworkIdentity, TransactionContext, TransactionId, TransactionScope};
    use crate::errors::ActionError;
    use crate::protocol::{Counterparty, ProtocolAction};

    fn counterparty() -> Counterparty {
        Counterparty {
            bpp_id: "sandbox-bpp-network.becknprotocol.io".to_string(),
            bpp_uri: "https://sandbox-bpp-network.becknprotocol.io".to_string(),
        }
    }

    #[test]
    fn search_context_has_no_counterparty() {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).single().expect("timestamp");
        let context = TransactionContext::at(
            &NetworkIdentity::default(),
            ProtocolAction::Search,
            TransactionId::new(),
            None,
            timestamp,
        )
        .expect("search needs no counterparty");

        assert_eq!(context.bpp_id, None);
        assert_eq!(context.timestamp, "2026-03-01T10:30:00.000Z");

        let encoded = serde_json::to_value(&context).expect("context serializes");
        assert_eq!(encoded["action"], "search");
        assert_eq!(encoded["domain"], "local-retail");
        assert!(encoded.get("bpp_id").is_none());
    }

    #[test]
    fn non_search_context_requires_counterparty() {
        let error = TransactionContext::new(
            &NetworkIdentity::default(),
            ProtocolAction::Select,
            TransactionId::new(),
            None,
        )
        .expect_err("select requires bpp identity");

        assert!(matches!(
            error,
            ActionError::InvalidArguments { action: ProtocolAction::Select, .. }
        ));
    }

    #[test]
    fn contexts_share_transaction_but_not_message() {
        let identity = NetworkIdentity::default();
        let transaction_id = TransactionId::new();
        let first = TransactionContext::new(
            &identity,
            ProtocolAction::Select,
            transaction_id,
            Some(&counterparty()),
        )
        .expect("select context");
        let second = TransactionContext::new(
            &identity,
            ProtocolAction::Init,
            transaction_id,
            Some(&counterparty()),
        )
        .expect("init context");

        assert_eq!(first.transaction_id, second.transaction_id);
        assert_ne!(first.message_id, second.message_id);
        assert_eq!(second.bpp_id.as_deref(), Some("sandbox-bpp-network.becknprotocol.io"));
    }

    #[test]
    fn scope_keeps_transaction_until_next_search() {
        let mut scope = TransactionScope::default();
        let searched = scope.bind(ProtocolAction::Search);
        assert_eq!(scope.bind(ProtocolAction::Select), searched);
        assert_eq!(scope.bind(ProtocolAction::Confirm), searched);

        let searched_again = scope.bind(ProtocolAction::Search);
        assert_ne!(searched_again, searched);
        assert_eq!(scope.bind(ProtocolAction::Track), searched_again);
    }

    #[test]
    fn resumed_scope_reuses_caller_transaction() {
        let known = TransactionId::new();
        let mut scope = TransactionScope::resume(known);
        assert_eq!(scope.bind(ProtocolAction::Status), known);

        let mut fresh = TransactionScope::default();
        let opened = fresh.bind(ProtocolAction::Status);
        assert_eq!(fresh.current(), Some(opened));
    }
}
