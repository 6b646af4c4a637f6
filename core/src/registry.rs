//! Alias-keyed collection of endpoint descriptors.
//!
//! # Design
//! The registry is filled once at startup and then shared read-only (usually
//! behind an `Arc`), so concurrent dispatchers read it without locking.
//! Registration order is kept in a `Vec` because the contract export must be
//! reproducible; the `HashMap` is only an index into it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::EndpointDescriptor;
use crate::error::ApiError;
use crate::export::ContractDocument;

#[derive(Debug, Default)]
pub struct Registry {
    endpoints: Vec<Arc<EndpointDescriptor>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `descriptor`; an alias collision leaves the registry unchanged.
    pub fn register(&mut self, descriptor: EndpointDescriptor) -> Result<(), ApiError> {
        let alias = descriptor.alias().to_string();
        if self.index.contains_key(&alias) {
            return Err(ApiError::DuplicateAlias { alias });
        }
        tracing::debug!(
            alias = %alias,
            method = %descriptor.method(),
            path = descriptor.path(),
            "registered endpoint"
        );
        self.index.insert(alias, self.endpoints.len());
        self.endpoints.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn lookup(&self, alias: &str) -> Result<&Arc<EndpointDescriptor>, ApiError> {
        self.index
            .get(alias)
            .map(|&i| &self.endpoints[i])
            .ok_or_else(|| ApiError::UnknownAlias {
                alias: alias.to_string(),
            })
    }

    /// Every descriptor in registration order.
    pub fn all(&self) -> &[Arc<EndpointDescriptor>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Declarative description of every endpoint, for documentation tooling.
    pub fn export(&self) -> ContractDocument {
        ContractDocument::from_descriptors(self.all())
    }
}
