//! Declarative contract export.
//!
//! A [`ContractDocument`] is the hand-off to documentation tooling: plain
//! serializable data, endpoints in registration order and error cases in
//! status order, so two exports of the same registry are byte-identical.

use std::sync::Arc;

use serde::Serialize;

use crate::descriptor::{EndpointDescriptor, ParameterSpec};
use crate::http::HttpMethod;
use crate::schema::SchemaRef;

#[derive(Debug, Clone, Serialize)]
pub struct ContractDocument {
    pub endpoints: Vec<EndpointDocument>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDocument {
    pub method: HttpMethod,
    pub path: String,
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    pub response: SchemaRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_status: Option<u16>,
    pub errors: Vec<ErrorDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDocument {
    pub status: u16,
    pub description: String,
    pub schema: SchemaRef,
}

impl ContractDocument {
    pub fn from_descriptors(descriptors: &[Arc<EndpointDescriptor>]) -> Self {
        let endpoints = descriptors
            .iter()
            .map(|d| EndpointDocument {
                method: d.method(),
                path: d.path().to_string(),
                alias: d.alias().to_string(),
                description: d.description().map(str::to_string),
                parameters: d.parameters().to_vec(),
                response: Arc::clone(d.response()),
                success_status: d.success_status(),
                errors: d
                    .errors()
                    .iter()
                    .map(|(status, case)| ErrorDocument {
                        status: *status,
                        description: case.description.clone(),
                        schema: Arc::clone(&case.schema),
                    })
                    .collect(),
            })
            .collect();
        Self { endpoints }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::descriptor::EndpointDescriptor;
    use crate::http::HttpMethod;
    use crate::registry::Registry;
    use crate::schema::{ObjectSchema, Schema};

    #[test]
    fn export_lists_locations_and_sorted_errors() {
        let mut registry = Registry::new();
        registry
            .register(
                EndpointDescriptor::builder(HttpMethod::Get, "/api/search/:service", "getApisearchService")
                    .path_param("service", Schema::enumeration(["youtube", "kick"]))
                    .query_param("query", Schema::string())
                    .response(Schema::array(
                        ObjectSchema::passthrough()
                            .named("SearchResult")
                            .field("id", Schema::string())
                            .build(),
                    ))
                    .error(500, "Internal server error", Schema::void())
                    .error(400, "Bad request", Schema::void())
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let doc = serde_json::to_value(registry.export()).unwrap();
        let endpoint = &doc["endpoints"][0];
        assert_eq!(endpoint["method"], "get");
        assert_eq!(endpoint["path"], "/api/search/:service");
        assert_eq!(endpoint["parameters"][0]["location"], "path");
        assert_eq!(endpoint["parameters"][1]["location"], "query");
        assert_eq!(endpoint["parameters"][1]["required"], true);
        assert_eq!(endpoint["response"]["items"]["name"], "SearchResult");
        assert_eq!(endpoint["errors"][0]["status"], 400);
        assert_eq!(endpoint["errors"][1]["status"], 500);
        assert_eq!(endpoint["errors"][1]["schema"], json!({"type": "void"}));
    }

    #[test]
    fn export_is_reproducible() {
        let registry = crate::contract::registry().unwrap();
        let first = registry.export().to_json_pretty().unwrap();
        let second = registry.export().to_json_pretty().unwrap();
        assert_eq!(first, second);
    }
}
