//! Endpoint descriptors: the static contract of one API operation.
//!
//! # Design
//! A descriptor is built once through [`DescriptorBuilder`] and is read-only
//! afterwards. `build()` parses the `:name` path template and checks it
//! against the declared Path parameters, so a template that can never be
//! fully substituted is rejected at registration time instead of on the
//! first call.

use std::collections::{BTreeMap, HashSet};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::schema::{Schema, SchemaRef};

/// Everything outside the RFC 3986 unreserved set is escaped.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Path,
    Query,
    Body,
    Header,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub location: Location,
    pub required: bool,
    pub schema: SchemaRef,
}

/// A declared non-success outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorCase {
    pub description: String,
    pub schema: SchemaRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSegment {
    Literal(String),
    Placeholder(String),
}

/// A path such as `/api/commands/:name/:guildId/restore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<TemplateSegment>,
}

impl PathTemplate {
    /// Splits on `/`; a segment that starts with `:` is a placeholder.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if !raw.starts_with('/') {
            return Err("template must start with `/`".to_string());
        }
        let mut segments = Vec::new();
        for part in raw[1..].split('/') {
            match part.strip_prefix(':') {
                Some(name) if is_identifier(name) => {
                    segments.push(TemplateSegment::Placeholder(name.to_string()))
                }
                Some(name) => return Err(format!("invalid placeholder name `{name}`")),
                None => segments.push(TemplateSegment::Literal(part.to_string())),
            }
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Placeholder(name) => Some(name.as_str()),
            TemplateSegment::Literal(_) => None,
        })
    }

    /// Substitutes placeholders left to right with percent-encoded values.
    ///
    /// `lookup` returns the raw string form of a path argument. A placeholder
    /// without a value yields the offending name as `Err`.
    pub fn render<'a, F>(&self, lookup: F) -> Result<String, String>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut path = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            path.push('/');
            match segment {
                TemplateSegment::Literal(text) => path.push_str(text),
                TemplateSegment::Placeholder(name) => {
                    let value = lookup(name.as_str()).ok_or_else(|| name.clone())?;
                    path.push_str(&encode_component(value));
                }
            }
        }
        Ok(path)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Immutable contract for one operation.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    method: HttpMethod,
    template: PathTemplate,
    alias: String,
    description: Option<String>,
    parameters: Vec<ParameterSpec>,
    response: SchemaRef,
    success_status: Option<u16>,
    errors: BTreeMap<u16, ErrorCase>,
}

impl EndpointDescriptor {
    pub fn builder(
        method: HttpMethod,
        path: impl Into<String>,
        alias: impl Into<String>,
    ) -> DescriptorBuilder {
        DescriptorBuilder {
            method,
            path: path.into(),
            alias: alias.into(),
            description: None,
            parameters: Vec::new(),
            response: Schema::void().shared(),
            success_status: None,
            errors: BTreeMap::new(),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        self.template.as_str()
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn body_parameter(&self) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.location == Location::Body)
    }

    pub fn response(&self) -> &SchemaRef {
        &self.response
    }

    pub fn success_status(&self) -> Option<u16> {
        self.success_status
    }

    /// Pinned status if one was declared, otherwise any 2xx.
    pub fn is_success(&self, status: u16) -> bool {
        match self.success_status {
            Some(expected) => status == expected,
            None => (200..300).contains(&status),
        }
    }

    /// Declared error cases, ordered by status.
    pub fn errors(&self) -> &BTreeMap<u16, ErrorCase> {
        &self.errors
    }

    pub fn error_case(&self, status: u16) -> Option<&ErrorCase> {
        self.errors.get(&status)
    }
}

/// Collects the pieces of an [`EndpointDescriptor`].
#[derive(Debug)]
pub struct DescriptorBuilder {
    method: HttpMethod,
    path: String,
    alias: String,
    description: Option<String>,
    parameters: Vec<ParameterSpec>,
    response: SchemaRef,
    success_status: Option<u16>,
    errors: BTreeMap<u16, ErrorCase>,
}

impl DescriptorBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn path_param(self, name: impl Into<String>, schema: impl Into<SchemaRef>) -> Self {
        self.param(name, Location::Path, schema)
    }

    pub fn query_param(self, name: impl Into<String>, schema: impl Into<SchemaRef>) -> Self {
        self.param(name, Location::Query, schema)
    }

    pub fn header_param(self, name: impl Into<String>, schema: impl Into<SchemaRef>) -> Self {
        self.param(name, Location::Header, schema)
    }

    /// The JSON request payload, always named `body`.
    pub fn body(self, schema: impl Into<SchemaRef>) -> Self {
        self.param("body", Location::Body, schema)
    }

    /// Marks the most recently added parameter as optional.
    pub fn optional(mut self) -> Self {
        if let Some(last) = self.parameters.last_mut() {
            last.required = false;
        }
        self
    }

    pub fn response(mut self, schema: impl Into<SchemaRef>) -> Self {
        self.response = schema.into();
        self
    }

    /// Pins the success path to a single status instead of any 2xx.
    pub fn success_status(mut self, status: u16) -> Self {
        self.success_status = Some(status);
        self
    }

    pub fn error(
        mut self,
        status: u16,
        description: impl Into<String>,
        schema: impl Into<SchemaRef>,
    ) -> Self {
        self.errors.insert(
            status,
            ErrorCase {
                description: description.into(),
                schema: schema.into(),
            },
        );
        self
    }

    fn param(mut self, name: impl Into<String>, location: Location, schema: impl Into<SchemaRef>) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            location,
            required: true,
            schema: schema.into(),
        });
        self
    }

    /// Checks the template against the Path parameters and freezes the descriptor.
    pub fn build(self) -> Result<EndpointDescriptor, ApiError> {
        let malformed = |reason: String| ApiError::MalformedTemplate {
            alias: self.alias.clone(),
            template: self.path.clone(),
            reason,
        };

        let template = PathTemplate::parse(&self.path).map_err(&malformed)?;

        let mut names = HashSet::new();
        for param in &self.parameters {
            if !names.insert(param.name.as_str()) {
                return Err(malformed(format!("parameter `{}` is declared twice", param.name)));
            }
        }

        let mut placeholders = HashSet::new();
        for name in template.placeholders() {
            if !placeholders.insert(name) {
                return Err(malformed(format!("placeholder `:{name}` appears twice")));
            }
            match self.parameters.iter().find(|p| p.name == name) {
                Some(p) if p.location == Location::Path => {}
                _ => return Err(malformed(format!("placeholder `:{name}` has no Path parameter"))),
            }
        }

        for param in self.parameters.iter().filter(|p| p.location == Location::Path) {
            if !placeholders.contains(param.name.as_str()) {
                return Err(malformed(format!(
                    "Path parameter `{}` has no placeholder",
                    param.name
                )));
            }
            if !param.required {
                return Err(malformed(format!("Path parameter `{}` cannot be optional", param.name)));
            }
        }

        let bodies = self
            .parameters
            .iter()
            .filter(|p| p.location == Location::Body)
            .count();
        if bodies > 1 {
            return Err(malformed(format!("{bodies} Body parameters declared, at most one allowed")));
        }

        Ok(EndpointDescriptor {
            method: self.method,
            template,
            alias: self.alias,
            description: self.description,
            parameters: self.parameters,
            response: self.response,
            success_status: self.success_status,
            errors: self.errors,
        })
    }
}
