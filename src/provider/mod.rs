//! Bibliographic source providers

pub mod fixture;

pub use fixture::{load_registry, StaticProvider};

use crate::core::{Article, ArticleMetrics};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error types for provider calls
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("Provider '{provider}' does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("Unknown source '{0}'")]
    UnknownSource(String),

    #[error("Provider '{provider}' unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("Provider '{provider}' timed out after {millis} ms")]
    Timeout { provider: String, millis: u64 },

    #[error("Provider '{provider}' failed: {reason}")]
    Failed { provider: String, reason: String },
}

/// A keyword search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub limit: usize,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            min_year: None,
            max_year: None,
        }
    }

    pub fn with_years(mut self, min_year: Option<i32>, max_year: Option<i32>) -> Self {
        self.min_year = min_year;
        self.max_year = max_year;
        self
    }

    /// Whether a publication year lies within the requested bounds.
    /// Records without a year always pass.
    pub fn accepts_year(&self, year: Option<i32>) -> bool {
        match year {
            Some(year) => {
                self.min_year.is_none_or(|min| year >= min) && self.max_year.is_none_or(|max| year <= max)
            }
            None => true,
        }
    }
}

/// Result of provider-side query expansion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryExpansion {
    /// Expanded query text
    pub query: String,
    /// Entities recognized in the original query
    pub entities: Vec<String>,
}

/// Contract every bibliographic source fulfils. Operations a source cannot
/// serve keep the default body and report `Unsupported`.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Short name used in `sources` params and provenance (e.g. `pubmed`)
    fn name(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, ProviderError>;

    async fn expand_query(&self, _query: &str) -> Result<QueryExpansion, ProviderError> {
        Err(self.unsupported("expand_query"))
    }

    async fn fetch_details(&self, _pmids: &[String]) -> Result<Vec<Article>, ProviderError> {
        Err(self.unsupported("fetch_details"))
    }

    async fn find_related(&self, _pmid: &str, _limit: usize) -> Result<Vec<Article>, ProviderError> {
        Err(self.unsupported("find_related"))
    }

    async fn find_citing(&self, _pmid: &str, _limit: usize) -> Result<Vec<Article>, ProviderError> {
        Err(self.unsupported("find_citing"))
    }

    async fn get_references(&self, _pmid: &str, _limit: usize) -> Result<Vec<Article>, ProviderError> {
        Err(self.unsupported("get_references"))
    }

    /// Metrics keyed by PMID; PMIDs the source knows nothing about are absent
    async fn get_metrics(&self, _pmids: &[String]) -> Result<HashMap<String, ArticleMetrics>, ProviderError> {
        Err(self.unsupported("get_metrics"))
    }

    fn unsupported(&self, operation: &'static str) -> ProviderError {
        ProviderError::Unsupported {
            provider: self.name().to_string(),
            operation,
        }
    }
}

/// Named providers available to a run
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn SourceProvider>>,
    primary: Option<String>,
    metrics: Option<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .field("primary", &self.primary)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. The first one registered becomes the primary unless
    /// another is chosen with `with_primary`; a provider with the same name
    /// replaces the earlier one.
    pub fn register(mut self, provider: impl SourceProvider + 'static) -> Self {
        self.insert(Arc::new(provider));
        self
    }

    pub fn insert(&mut self, provider: Arc<dyn SourceProvider>) {
        let name = provider.name().to_string();
        if self.primary.is_none() {
            self.primary = Some(name.clone());
        }
        match self.providers.iter().position(|p| p.name() == name) {
            Some(i) => self.providers[i] = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn with_primary(mut self, name: &str) -> Self {
        self.primary = Some(name.to_string());
        self
    }

    /// Dedicated provider for the `metrics` action
    pub fn with_metrics(mut self, name: &str) -> Self {
        self.metrics = Some(name.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn primary(&self) -> Option<Arc<dyn SourceProvider>> {
        self.primary.as_deref().and_then(|name| self.get(name))
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Metrics provider, falling back to the primary
    pub fn metrics(&self) -> Option<Arc<dyn SourceProvider>> {
        self.metrics
            .as_deref()
            .and_then(|name| self.get(name))
            .or_else(|| self.primary())
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
