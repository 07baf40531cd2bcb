//! Error vocabulary surfaced by the request pipeline.
//!
//! # Design
//! Errors are structured rather than pre-rendered strings: each variant
//! maps to an `ErrorKind`, and `Domain` errors carry the API's own
//! `errorCode`. The `Display` impls give the English text; other
//! languages go through `Locale::message`.
//!
//! Transport failures and 500s deliberately drop their detail from
//! `Display`. The raw text is kept on the value for logs only.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NETWORK_MESSAGE: &str = "Please check your internet connection.";
pub const SERVER_MESSAGE: &str = "Something went wrong. Please contact support.";

/// Coarse classification used for branching and localization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No response was received.
    Network,
    /// The API answered 500.
    Server,
    /// Any other non-2xx; the API explains what went wrong.
    Domain,
    /// A payload could not be encoded, or a successful body did not decode
    /// into the expected type.
    Codec,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{}", NETWORK_MESSAGE)]
    Network { detail: String },

    #[error("{}", SERVER_MESSAGE)]
    Server { detail: String },

    #[error("{}", domain_message(.status, .message))]
    Domain {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    #[error("could not process payload: {0}")]
    Codec(String),
}

fn domain_message(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(m) => m.clone(),
        None => format!("Request failed with status {status}."),
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Domain { .. } => ErrorKind::Domain,
            ApiError::Codec(_) => ErrorKind::Codec,
        }
    }

    /// The API's `errorCode`, when it sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Domain { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { .. } => Some(500),
            ApiError::Domain { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Diagnostic text that is never shown to end users.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Network { detail } | ApiError::Server { detail } => Some(detail),
            ApiError::Domain { message, .. } => message.as_deref(),
            ApiError::Codec(detail) => Some(detail),
        }
    }
}

/// Shape of the API's error payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl ErrorBody {
    /// Parse leniently: a body that is not the expected JSON yields an
    /// empty payload rather than a failure.
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}
