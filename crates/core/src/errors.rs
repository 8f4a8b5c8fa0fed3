use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{flows::LoopTransitionError, protocol::ProtocolAction};

/// Stable tag carried by error observations so the oracle and any transport can tell
/// failures apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    UnknownAction,
    InvalidArguments,
    GatewayFailure,
}

/// Per-action failures. All of them are absorbed into the conversation as observations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown action `{name}`")]
    UnknownAction { name: String },
    #[error("invalid arguments for `{action}`: {reason}")]
    InvalidArguments { action: ProtocolAction, reason: String },
    #[error("gateway failure during `{action}`: {message}")]
    GatewayFailure { action: ProtocolAction, message: String },
}

impl ActionError {
    pub fn kind(&self) -> ActionErrorKind {
        match self {
            Self::UnknownAction { .. } => ActionErrorKind::UnknownAction,
            Self::InvalidArguments { .. } => ActionErrorKind::InvalidArguments,
            Self::GatewayFailure { .. } => ActionErrorKind::GatewayFailure,
        }
    }

    pub fn invalid(action: ProtocolAction, reason: impl Into<String>) -> Self {
        Self::InvalidArguments { action, reason: reason.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("counterparty returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode gateway response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle could not be reached: {0}")]
    Unavailable(String),
    #[error("oracle produced no decision: {0}")]
    NoDecision(String),
}

/// Failures that end an orchestration run.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("decision oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),
    #[error("conversation exceeded {max_turns} turns without reaching a terminal state")]
    TurnLimitExceeded { max_turns: usize },
    #[error("caller stopped consuming the conversation")]
    Abandoned,
    #[error(transparent)]
    Transition(#[from] LoopTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested action does not exist.",
            Self::BadGateway { .. } => "The commerce network did not accept the request.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::BadGateway { .. } => 502,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    fn with_correlation(mut self, correlation_id: String) -> Self {
        match &mut self {
            Self::BadRequest { correlation_id: id, .. }
            | Self::NotFound { correlation_id: id, .. }
            | Self::BadGateway { correlation_id: id, .. }
            | Self::ServiceUnavailable { correlation_id: id, .. }
            | Self::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        self
    }
}

impl RunError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::from(self).with_correlation(correlation_id.into())
    }
}

impl ActionError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::from(self).with_correlation(correlation_id.into())
    }
}

impl From<RunError> for InterfaceError {
    fn from(value: RunError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            RunError::OracleUnavailable(_) | RunError::Abandoned => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            RunError::TurnLimitExceeded { .. } | RunError::Transition(_) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

impl From<ActionError> for InterfaceError {
    fn from(value: ActionError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            ActionError::UnknownAction { .. } => Self::NotFound { message, correlation_id },
            ActionError::InvalidArguments { .. } => Self::BadRequest { message, correlation_id },
            ActionError::GatewayFailure { .. } => Self::BadGateway { message, correlation_id },
        }
    }
}
