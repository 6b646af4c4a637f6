//! Client configuration.
//!
//! `ClientConfig` holds the base URL every descriptor path is joined to and
//! the headers sent with every request. It can be built in code or read from
//! `CONTRACT_BASE_URL` / `CONTRACT_DEFAULT_HEADERS`.

use crate::error::ConfigError;

pub const BASE_URL_VAR: &str = "CONTRACT_BASE_URL";
pub const DEFAULT_HEADERS_VAR: &str = "CONTRACT_DEFAULT_HEADERS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// A trailing `/` on `base_url` is dropped.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Reads the base URL and optional `name:value;name:value` header list.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var(BASE_URL_VAR).map_err(|_| ConfigError::MissingVar(BASE_URL_VAR))?;
        let headers = std::env::var(DEFAULT_HEADERS_VAR).ok();
        Self::from_parts(&base_url, headers.as_deref())
    }

    fn from_parts(base_url: &str, headers: Option<&str>) -> Result<Self, ConfigError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }
        let mut config = Self::new(base_url);
        for pair in headers.unwrap_or("").split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidHeader(pair.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidHeader(pair.to_string()));
            }
            config = config.with_header(name, value.trim());
        }
        Ok(config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }
}
