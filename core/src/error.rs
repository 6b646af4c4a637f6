//! Error types for the contract dispatcher.
//!
//! # Design
//! Every failure path gets its own variant so callers can tell a malformed
//! request (caught before any I/O) from a transport failure, a declared
//! business error, and contract drift on the server side. Declared error
//! statuses land in `Classified` with their decoded payload; statuses the
//! contract does not mention land in `UnclassifiedStatus` with the raw body.

use thiserror::Error;

use crate::schema::ValidationError;
use crate::transport::TransportError;

/// Errors returned by the registry and the dispatcher.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No descriptor is registered under this alias.
    #[error("unknown endpoint alias `{alias}`")]
    UnknownAlias { alias: String },

    /// A descriptor with this alias is already registered.
    #[error("endpoint alias `{alias}` is already registered")]
    DuplicateAlias { alias: String },

    /// A required parameter was not supplied.
    #[error("`{alias}`: missing required argument `{name}`")]
    MissingArgument { alias: String, name: String },

    /// The caller supplied an argument the descriptor does not declare.
    #[error("`{alias}`: unexpected argument `{name}`")]
    UnexpectedArgument { alias: String, name: String },

    /// A supplied argument failed its parameter schema.
    #[error("`{alias}`: invalid argument `{name}`: {source}")]
    InvalidArgument {
        alias: String,
        name: String,
        #[source]
        source: ValidationError,
    },

    /// The path template and the declared Path parameters disagree.
    #[error("`{alias}`: malformed path template `{template}`: {reason}")]
    MalformedTemplate {
        alias: String,
        template: String,
        reason: String,
    },

    /// The transport failed before producing a response.
    #[error("`{alias}`: transport failed: {source}")]
    Transport {
        alias: String,
        #[source]
        source: TransportError,
    },

    /// The server answered with data that does not match the declared schema.
    #[error("`{alias}`: response with status {status} violates the contract: {source}")]
    ResponseContractViolation {
        alias: String,
        status: u16,
        #[source]
        source: ValidationError,
    },

    /// The body was not JSON at all.
    #[error("`{alias}`: response with status {status} is not valid JSON: {message}")]
    MalformedBody {
        alias: String,
        status: u16,
        message: String,
    },

    /// A status declared in the descriptor's error cases.
    #[error("`{alias}`: {status} {description}")]
    Classified {
        alias: String,
        status: u16,
        description: String,
        payload: Option<serde_json::Value>,
    },

    /// A status matching neither the success path nor a declared error.
    #[error("`{alias}`: unclassified status {status}: {body}")]
    UnclassifiedStatus {
        alias: String,
        status: u16,
        body: String,
    },

    /// A validated value could not be deserialized into the requested type.
    #[error("`{alias}`: deserialization failed: {message}")]
    Deserialization { alias: String, message: String },

    /// The request payload could not be serialized to JSON.
    #[error("`{alias}`: serialization failed: {message}")]
    Serialization { alias: String, message: String },
}

impl ApiError {
    /// The HTTP status, for errors raised after a response arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ResponseContractViolation { status, .. }
            | ApiError::MalformedBody { status, .. }
            | ApiError::Classified { status, .. }
            | ApiError::UnclassifiedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, ApiError::Classified { .. })
    }

    /// True when the server and this client disagree about the contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ApiError::ResponseContractViolation { .. } | ApiError::MalformedBody { .. }
        )
    }

    /// True for errors caught before the transport was invoked.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ApiError::UnknownAlias { .. }
                | ApiError::MissingArgument { .. }
                | ApiError::UnexpectedArgument { .. }
                | ApiError::InvalidArgument { .. }
                | ApiError::MalformedTemplate { .. }
                | ApiError::Serialization { .. }
        )
    }
}

/// Errors raised while loading a [`crate::ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),

    #[error("base URL `{0}` must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("malformed default header `{0}`, expected `name:value`")]
    InvalidHeader(String),
}
