//! The I/O seam between the dispatcher and the network.
//!
//! # Design
//! The core never opens a connection. A [`Transport`] receives a fully
//! resolved [`HttpRequest`] and answers with an [`HttpResponse`] for any
//! status code, reserving `Err` for failures where no response exists
//! (refused connection, TLS, timeout). Retry policy, pooling and
//! authentication live behind this trait.
//!
//! Dropping the future returned by `send` is how a call gets cancelled.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse};

/// Executes resolved requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// A failure that produced no HTTP response.
#[derive(Debug)]
pub struct TransportError {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying client error, keeping it reachable through `source()`.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::with_source("connect to 127.0.0.1:1", io);
        assert_eq!(err.to_string(), "connect to 127.0.0.1:1");
        assert_eq!(err.source().unwrap().to_string(), "refused");
    }

    #[test]
    fn plain_error_has_no_source() {
        let err = TransportError::new("timed out");
        assert_eq!(err.message(), "timed out");
        assert!(err.source().is_none());
    }
}
