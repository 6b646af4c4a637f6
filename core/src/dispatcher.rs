//! Descriptor-driven request resolution and response classification.
//!
//! # Design
//! The dispatcher keeps the sans-IO split between building a
//! request and parsing a response, but drives both from an
//! [`EndpointDescriptor`] instead of one hand-written method per endpoint:
//!
//! - [`Dispatcher::prepare`] validates every argument against its parameter
//!   schema, substitutes the path, encodes the query and serializes the body.
//!   Nothing reaches the transport unless all of this succeeds.
//! - [`PreparedCall::interpret`] classifies the status (success, declared
//!   error, unclassified) and validates the body against the matching schema.
//! - [`Dispatcher::call`] glues the two around a [`Transport`].
//!
//! A call owns no state beyond its request/response pair. Dropping the
//! `call` future drops the transport future with it, and nothing is left
//! half-validated.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::descriptor::{encode_component, EndpointDescriptor, Location};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::registry::Registry;
use crate::schema::ValidationError;
use crate::transport::Transport;

/// Named argument values for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: BTreeMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds any serializable value, typically a request body DTO.
    pub fn with_json<T: Serialize>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        self.values.insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Args {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A resolved request together with the descriptor that will judge its response.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    descriptor: Arc<EndpointDescriptor>,
    request: HttpRequest,
}

impl PreparedCall {
    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Classifies and validates a response to this request.
    pub fn interpret(&self, response: HttpResponse) -> Result<Value, ApiError> {
        interpret(&self.descriptor, response)
    }
}

/// Issues calls for every descriptor in a registry.
#[derive(Debug)]
pub struct Dispatcher<T> {
    registry: Arc<Registry>,
    transport: T,
    config: ClientConfig,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(registry: Arc<Registry>, transport: T, config: ClientConfig) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolves the request for `alias` without performing any I/O.
    pub fn prepare(&self, alias: &str, args: &Args) -> Result<PreparedCall, ApiError> {
        let descriptor = Arc::clone(self.registry.lookup(alias)?);
        self.prepare_with(descriptor, args)
    }

    /// Resolves the request for a descriptor that need not be registered.
    pub fn prepare_with(
        &self,
        descriptor: Arc<EndpointDescriptor>,
        args: &Args,
    ) -> Result<PreparedCall, ApiError> {
        let alias = descriptor.alias();

        let mut path_values: HashMap<&str, String> = HashMap::new();
        let mut query = Vec::new();
        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        headers.extend(self.config.default_headers().iter().cloned());
        let mut body = None;

        for param in descriptor.parameters() {
            let Some(raw) = args.get(&param.name) else {
                if param.required {
                    return Err(ApiError::MissingArgument {
                        alias: alias.to_string(),
                        name: param.name.clone(),
                    });
                }
                continue;
            };

            let value = param
                .schema
                .validate(raw)
                .map_err(|source| ApiError::InvalidArgument {
                    alias: alias.to_string(),
                    name: param.name.clone(),
                    source,
                })?;

            match param.location {
                Location::Path => {
                    if let Some(text) = render_value(&value) {
                        path_values.insert(param.name.as_str(), text);
                    }
                }
                Location::Query => {
                    if let Some(text) = render_value(&value) {
                        query.push(format!(
                            "{}={}",
                            encode_component(&param.name),
                            encode_component(&text)
                        ));
                    }
                }
                Location::Header => {
                    if let Some(text) = render_value(&value) {
                        headers.push((param.name.clone(), text));
                    }
                }
                Location::Body => {
                    let json = serde_json::to_string(&value).map_err(|e| ApiError::Serialization {
                        alias: alias.to_string(),
                        message: e.to_string(),
                    })?;
                    body = Some(json);
                }
            }
        }

        if let Some(name) = args.names().find(|name| descriptor.parameter(name).is_none()) {
            return Err(ApiError::UnexpectedArgument {
                alias: alias.to_string(),
                name: name.to_string(),
            });
        }

        let path = descriptor
            .template()
            .render(|name| path_values.get(name).map(String::as_str))
            .map_err(|name| ApiError::MalformedTemplate {
                alias: alias.to_string(),
                template: descriptor.path().to_string(),
                reason: format!("placeholder `:{name}` was not resolved"),
            })?;

        let mut url = format!("{}{}", self.config.base_url(), path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        let request = HttpRequest {
            method: descriptor.method(),
            url,
            headers,
            body,
        };
        tracing::debug!(method = %request.method, url = %request.url, "resolved request");
        Ok(PreparedCall {
            descriptor,
            request,
        })
    }

    /// Resolves, sends and validates one call.
    pub async fn call(&self, alias: &str, args: Args) -> Result<Value, ApiError> {
        let descriptor = Arc::clone(self.registry.lookup(alias)?);
        self.call_with(descriptor, args).await
    }

    pub async fn call_with(
        &self,
        descriptor: Arc<EndpointDescriptor>,
        args: Args,
    ) -> Result<Value, ApiError> {
        let span = tracing::info_span!("dispatch", alias = descriptor.alias(), call_id = %Uuid::new_v4());
        async move {
            let PreparedCall {
                descriptor,
                request,
            } = self.prepare_with(descriptor, &args)?;
            let response = self
                .transport
                .send(request)
                .await
                .map_err(|source| ApiError::Transport {
                    alias: descriptor.alias().to_string(),
                    source,
                })?;
            interpret(&descriptor, response)
        }
        .instrument(span)
        .await
    }

    /// Like [`Dispatcher::call`], then deserializes the validated value into `R`.
    pub async fn call_as<R: DeserializeOwned>(&self, alias: &str, args: Args) -> Result<R, ApiError> {
        let value = self.call(alias, args).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Deserialization {
            alias: alias.to_string(),
            message: e.to_string(),
        })
    }
}

/// String form of a path, query or header value. `null` means absent.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode_body(alias: &str, response: &HttpResponse) -> Result<Value, ApiError> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| {
        tracing::warn!(status = response.status, error = %e, "response body is not JSON");
        ApiError::MalformedBody {
            alias: alias.to_string(),
            status: response.status,
            message: e.to_string(),
        }
    })
}

fn interpret(descriptor: &EndpointDescriptor, response: HttpResponse) -> Result<Value, ApiError> {
    let alias = descriptor.alias();
    let status = response.status;

    let contract_violation = |source: ValidationError| {
        tracing::warn!(status, error = %source, "response violates the contract");
        ApiError::ResponseContractViolation {
            alias: alias.to_string(),
            status,
            source,
        }
    };

    if descriptor.is_success(status) {
        let body = decode_body(alias, &response)?;
        return descriptor.response().validate(&body).map_err(contract_violation);
    }

    if let Some(case) = descriptor.error_case(status) {
        let body = decode_body(alias, &response)?;
        let payload = case.schema.validate(&body).map_err(contract_violation)?;
        tracing::debug!(status, description = %case.description, "classified error response");
        return Err(ApiError::Classified {
            alias: alias.to_string(),
            status,
            description: case.description.clone(),
            payload: (!payload.is_null()).then_some(payload),
        });
    }

    tracing::warn!(status, "status is neither success nor a declared error");
    Err(ApiError::UnclassifiedStatus {
        alias: alias.to_string(),
        status,
        body: response.body,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::http::HttpMethod;
    use crate::schema::{ObjectSchema, Schema};
    use crate::transport::TransportError;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new("no network in unit tests"))
        }
    }

    fn dispatcher(descriptors: Vec<EndpointDescriptor>) -> Dispatcher<Unreachable> {
        let mut registry = Registry::new();
        for d in descriptors {
            registry.register(d).unwrap();
        }
        Dispatcher::new(
            Arc::new(registry),
            Unreachable,
            ClientConfig::new("http://localhost:3000/"),
        )
    }

    fn logs() -> EndpointDescriptor {
        EndpointDescriptor::builder(HttpMethod::Get, "/api/logs", "getApilogs")
            .query_param("date", Schema::string())
            .optional()
            .query_param("service", Schema::string())
            .optional()
            .response(Schema::array(Schema::any()))
            .build()
            .unwrap()
    }

    fn toggle_command() -> EndpointDescriptor {
        EndpointDescriptor::builder(
            HttpMethod::Put,
            "/api/commands/:name/:guildId",
            "putApicommandsNameGuildId",
        )
        .body(ObjectSchema::passthrough().field("isEnabled", Schema::boolean()).build())
        .path_param("guildId", Schema::string())
        .path_param("name", Schema::string())
        .error(404, "Command not found", Schema::void())
        .build()
        .unwrap()
    }

    #[test]
    fn absent_optional_query_leaves_no_trace() {
        let d = dispatcher(vec![logs()]);
        let prepared = d.prepare("getApilogs", &Args::new()).unwrap();
        assert_eq!(prepared.request().url, "http://localhost:3000/api/logs");
        assert!(!prepared.request().url.contains("date"));
    }

    #[test]
    fn present_query_is_encoded_once() {
        let d = dispatcher(vec![logs()]);
        let args = Args::new().with("date", "2024-01-01 00:00+01:00");
        let prepared = d.prepare("getApilogs", &args).unwrap();
        let url = &prepared.request().url;
        assert_eq!(url, "http://localhost:3000/api/logs?date=2024-01-01%2000%3A00%2B01%3A00");
        assert_eq!(url.matches("date=").count(), 1);
    }

    #[test]
    fn query_pairs_follow_declaration_order() {
        let d = dispatcher(vec![logs()]);
        let args = Args::new().with("service", "twitch").with("date", "2024-01-01");
        let prepared = d.prepare("getApilogs", &args).unwrap();
        assert!(prepared.request().url.ends_with("?date=2024-01-01&service=twitch"));
    }

    #[test]
    fn path_and_body_are_resolved() {
        let d = dispatcher(vec![toggle_command()]);
        let args = Args::new()
            .with("guildId", "123")
            .with("name", "8ball")
            .with("body", json!({"isEnabled": false}));
        let prepared = d.prepare("putApicommandsNameGuildId", &args).unwrap();
        let request = prepared.request();
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, "http://localhost:3000/api/commands/8ball/123");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("accept"), Some("application/json"));
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"isEnabled": false}));
    }

    #[test]
    fn request_without_body_has_no_content_type() {
        let d = dispatcher(vec![logs()]);
        let prepared = d.prepare("getApilogs", &Args::new()).unwrap();
        assert!(prepared.request().body.is_none());
        assert!(prepared.request().header("content-type").is_none());
    }

    #[test]
    fn missing_required_argument() {
        let d = dispatcher(vec![toggle_command()]);
        let args = Args::new().with("guildId", "123").with("name", "8ball");
        let err = d.prepare("putApicommandsNameGuildId", &args).unwrap_err();
        assert!(matches!(err, ApiError::MissingArgument { name, .. } if name == "body"));
    }

    #[test]
    fn invalid_argument_carries_violations() {
        let d = dispatcher(vec![toggle_command()]);
        let args = Args::new()
            .with("guildId", "123")
            .with("name", "8ball")
            .with("body", json!({"isEnabled": "yes"}));
        match d.prepare("putApicommandsNameGuildId", &args).unwrap_err() {
            ApiError::InvalidArgument { name, source, .. } => {
                assert_eq!(name, "body");
                assert_eq!(source.violations()[0].path.to_string(), "isEnabled");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn undeclared_argument_is_rejected() {
        let d = dispatcher(vec![logs()]);
        let err = d
            .prepare("getApilogs", &Args::new().with("guild", "1"))
            .unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedArgument { name, .. } if name == "guild"));
    }

    #[test]
    fn numeric_path_argument_is_rendered_as_text() {
        let descriptor = EndpointDescriptor::builder(
            HttpMethod::Delete,
            "/api/kick/:guildId/channels/:broadcasterUserId",
            "deleteKick",
        )
        .path_param("guildId", Schema::string())
        .path_param("broadcasterUserId", Schema::integer())
        .build()
        .unwrap();
        let d = dispatcher(vec![descriptor]);
        let args = Args::new().with("guildId", "g 1").with("broadcasterUserId", 42);
        let prepared = d.prepare("deleteKick", &args).unwrap();
        assert_eq!(prepared.request().url, "http://localhost:3000/api/kick/g%201/channels/42");
    }

    #[test]
    fn header_parameters_and_default_headers_are_sent() {
        let descriptor = EndpointDescriptor::builder(HttpMethod::Get, "/api/users", "getApiusers")
            .header_param("x-request-source", Schema::enumeration(["dashboard", "bot"]))
            .build()
            .unwrap();
        let mut registry = Registry::new();
        registry.register(descriptor).unwrap();
        let d = Dispatcher::new(
            Arc::new(registry),
            Unreachable,
            ClientConfig::new("http://localhost").with_header("x-client", "tests"),
        );
        let prepared = d
            .prepare("getApiusers", &Args::new().with("x-request-source", "bot"))
            .unwrap();
        assert_eq!(prepared.request().header("x-client"), Some("tests"));
        assert_eq!(prepared.request().header("x-request-source"), Some("bot"));
    }

    #[test]
    fn unknown_alias_is_fatal() {
        let d = dispatcher(vec![]);
        let err = d.prepare("getApiusers", &Args::new()).unwrap_err();
        assert!(matches!(err, ApiError::UnknownAlias { .. }));
    }

    #[test]
    fn interpret_classifies_statuses() {
        let d = dispatcher(vec![toggle_command()]);
        let args = Args::new()
            .with("guildId", "123")
            .with("name", "8ball")
            .with("body", json!({"isEnabled": true}));
        let prepared = d.prepare("putApicommandsNameGuildId", &args).unwrap();

        assert_eq!(prepared.interpret(HttpResponse::new(204, "")).unwrap(), Value::Null);

        let err = prepared.interpret(HttpResponse::new(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::Classified { status: 404, payload: None, .. }));

        let err = prepared.interpret(HttpResponse::new(409, "conflict")).unwrap_err();
        assert!(matches!(err, ApiError::UnclassifiedStatus { status: 409, ref body, .. } if body == "conflict"));

        let err = prepared
            .interpret(HttpResponse::new(200, r#"{"unexpected":true}"#))
            .unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn non_json_success_body_is_malformed() {
        let d = dispatcher(vec![logs()]);
        let prepared = d.prepare("getApilogs", &Args::new()).unwrap();
        let err = prepared.interpret(HttpResponse::new(200, "<html>")).unwrap_err();
        assert!(matches!(err, ApiError::MalformedBody { status: 200, .. }));
    }

    /// Answers every request with a fixed response and keeps what it was sent.
    struct Recording {
        response: HttpResponse,
        sent: std::sync::Mutex<Vec<HttpRequest>>,
    }

    impl Recording {
        fn answering(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse::new(status, body),
                sent: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for Recording {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    fn recording_dispatcher(transport: Arc<Recording>) -> Dispatcher<Arc<Recording>> {
        let mut registry = Registry::new();
        registry.register(toggle_command()).unwrap();
        Dispatcher::new(Arc::new(registry), transport, ClientConfig::new("http://localhost"))
    }

    #[tokio::test]
    async fn rejected_arguments_never_reach_the_transport() {
        let transport = Recording::answering(204, "");
        let d = recording_dispatcher(Arc::clone(&transport));

        let err = d
            .call("putApicommandsNameGuildId", Args::new().with("guildId", "1"))
            .await
            .unwrap_err();
        assert!(err.is_request_error());
        assert_eq!(transport.sent(), 0);

        let args = Args::new()
            .with("guildId", "1")
            .with("name", "8ball")
            .with("body", json!({"isEnabled": true}));
        assert_eq!(d.call("putApicommandsNameGuildId", args).await.unwrap(), Value::Null);
        assert_eq!(transport.sent(), 1);
    }

    /// A value every schema in the contract accepts.
    fn sample(schema: &Schema) -> Value {
        use crate::schema::Presence;

        match schema {
            Schema::String(rules) if rules.format.is_some() => json!("2024-01-01T00:00:00Z"),
            Schema::String(_) => json!("sample"),
            Schema::Number(_) => json!(1),
            Schema::Boolean => json!(true),
            Schema::Literal { value } => value.clone(),
            Schema::Enum { values } => json!(values[0]),
            Schema::Array { .. } => json!([]),
            Schema::Object(object) => Value::Object(
                object
                    .fields
                    .iter()
                    .filter(|f| f.presence == Presence::Required)
                    .map(|f| (f.name.clone(), sample(&f.schema)))
                    .collect(),
            ),
            Schema::Union { branches } => sample(&branches[0]),
            Schema::Intersection { parts } => {
                let mut merged = serde_json::Map::new();
                for part in parts {
                    if let Value::Object(fields) = sample(part) {
                        merged.extend(fields);
                    }
                }
                Value::Object(merged)
            }
            Schema::Nullable { inner } => sample(inner),
            Schema::Void | Schema::Any => Value::Null,
        }
    }

    #[tokio::test]
    async fn every_contract_endpoint_checks_arguments_before_sending() {
        let transport = Recording::answering(204, "");
        let registry = Arc::new(crate::contract::registry().unwrap());
        let d = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&transport),
            ClientConfig::new("http://localhost"),
        );

        for descriptor in registry.all() {
            let alias = descriptor.alias();
            let full: Args = descriptor
                .parameters()
                .iter()
                .map(|p| (p.name.clone(), sample(&p.schema)))
                .collect();
            d.prepare(alias, &full)
                .unwrap_or_else(|e| panic!("{alias}: sample arguments rejected: {e}"));

            let required = descriptor
                .parameters()
                .iter()
                .filter(|p| p.required && matches!(p.location, Location::Path | Location::Body));
            for param in required {
                let without: Args = full
                    .names()
                    .filter(|name| *name != param.name)
                    .map(|name| (name.to_string(), full.get(name).cloned().unwrap_or(Value::Null)))
                    .collect();
                let err = d.call(alias, without).await.unwrap_err();
                assert!(
                    matches!(err, ApiError::MissingArgument { ref name, .. } if *name == param.name),
                    "{alias} without `{}`: {err:?}",
                    param.name
                );

                let wrong = if *param.schema == Schema::Boolean { json!("yes") } else { json!(true) };
                if param.schema.validate(&wrong).is_ok() {
                    continue;
                }
                let invalid = full.clone().with(param.name.clone(), wrong);
                let err = d.call(alias, invalid).await.unwrap_err();
                assert!(
                    matches!(err, ApiError::InvalidArgument { ref name, .. } if *name == param.name),
                    "{alias} with invalid `{}`: {err:?}",
                    param.name
                );
            }
        }
        assert_eq!(transport.sent(), 0);
    }

    #[tokio::test]
    async fn call_as_reports_shape_mismatch_as_deserialization() {
        let transport = Recording::answering(204, "");
        let d = recording_dispatcher(transport);
        let args = Args::new()
            .with("guildId", "1")
            .with("name", "8ball")
            .with("body", json!({"isEnabled": true}));
        let err = d
            .call_as::<Vec<String>>("putApicommandsNameGuildId", args)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization { .. }));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn contract_violations_are_logged_inside_the_dispatch_span() {
        let transport = Recording::answering(200, r#"{"isEnabled":true}"#);
        let d = recording_dispatcher(transport);
        let args = Args::new()
            .with("guildId", "1")
            .with("name", "8ball")
            .with("body", json!({"isEnabled": true}));
        let err = d.call("putApicommandsNameGuildId", args).await.unwrap_err();
        assert!(err.is_contract_violation());
        assert!(logs_contain("dispatch"));
        assert!(logs_contain("response violates the contract"));
    }

    #[tokio::test]
    async fn transport_error_is_propagated() {
        let d = dispatcher(vec![logs()]);
        let err = d.call("getApilogs", Args::new()).await.unwrap_err();
        match err {
            ApiError::Transport { source, .. } => assert_eq!(source.message(), "no network in unit tests"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
