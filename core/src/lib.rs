//! Declarative API contract layer for the Butleren guild-bot service.
//!
//! # Overview
//! Every endpoint is described once as data: method, path template, typed
//! parameters, response schema and classified error cases. A [`Dispatcher`]
//! turns an alias plus named arguments into an [`HttpRequest`], hands it to a
//! caller-supplied [`Transport`], and checks the [`HttpResponse`] against the
//! same descriptor. No network code lives in this crate.
//!
//! # Design
//! - `Schema` values are immutable and shared by `Arc`, so a named schema
//!   backs every endpoint that uses it.
//! - The `Registry` is built once and read-only afterwards; dispatchers hold it
//!   behind an `Arc` and can run concurrent calls.
//! - Request building (`prepare`) and response checking (`interpret`) are
//!   plain functions, so the I/O boundary stays explicit and testable without
//!   a transport.
//! - `contract` holds the concrete Butleren endpoints; `types` holds the typed
//!   views returned by `Dispatcher::call_as`.

pub mod config;
pub mod contract;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod http;
pub mod registry;
pub mod schema;
pub mod transport;
pub mod types;

pub use config::ClientConfig;
pub use descriptor::{DescriptorBuilder, EndpointDescriptor, ErrorCase, Location, ParameterSpec};
pub use dispatcher::{Args, Dispatcher, PreparedCall};
pub use error::{ApiError, ConfigError};
pub use export::ContractDocument;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use registry::Registry;
pub use schema::{ObjectSchema, Schema, SchemaRef, ValidationError};
pub use transport::{Transport, TransportError};
