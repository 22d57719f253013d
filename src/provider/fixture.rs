//! Fixture-backed provider serving canned records

use crate::core::{Article, ArticleMetrics};
use crate::provider::{ProviderError, ProviderRegistry, QueryExpansion, SearchQuery, SourceProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Canned data for one provider, as stored in a fixture file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderFixture {
    pub name: String,

    /// Records served by `fetch_details` (search and graph results are
    /// added automatically)
    pub articles: Vec<Article>,

    /// Query text (case-insensitive) to results
    pub search: BTreeMap<String, Vec<Article>>,

    pub expansions: BTreeMap<String, ExpansionFixture>,

    /// PMID to related / citing / referenced records
    pub related: BTreeMap<String, Vec<Article>>,
    pub citing: BTreeMap<String, Vec<Article>>,
    pub references: BTreeMap<String, Vec<Article>>,

    /// PMID to metrics
    pub metrics: BTreeMap<String, ArticleMetrics>,

    pub delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub failing: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExpansionFixture {
    pub query: String,
    pub entities: Vec<String>,
}

/// A fixture file: several providers plus registry roles
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryFixture {
    pub providers: Vec<ProviderFixture>,
    pub primary: Option<String>,
    pub metrics: Option<String>,
}

/// Provider answering from in-memory fixtures.
///
/// Operations with no fixture data report `Unsupported`. A delay can be
/// injected per call, bounded by an optional timeout, and a shared switch
/// makes every call fail.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    fixture: Arc<ProviderFixture>,
    catalog: Arc<HashMap<String, Article>>,
    delay: Option<Duration>,
    timeout: Option<Duration>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl StaticProvider {
    pub fn new(name: &str) -> Self {
        Self::from_fixture(ProviderFixture {
            name: name.to_string(),
            ..ProviderFixture::default()
        })
    }

    pub fn from_fixture(fixture: ProviderFixture) -> Self {
        let delay = fixture.delay_ms.map(Duration::from_millis);
        let timeout = fixture.timeout_ms.map(Duration::from_millis);
        let failing = Arc::new(AtomicBool::new(fixture.failing));

        let mut provider = Self {
            fixture: Arc::new(fixture),
            catalog: Arc::new(HashMap::new()),
            delay,
            timeout,
            failing,
            calls: Arc::new(AtomicUsize::new(0)),
        };
        provider.rebuild_catalog();
        provider
    }

    fn edit(mut self, f: impl FnOnce(&mut ProviderFixture)) -> Self {
        f(Arc::make_mut(&mut self.fixture));
        self.rebuild_catalog();
        self
    }

    fn rebuild_catalog(&mut self) {
        let fixture = &self.fixture;
        let mut catalog = HashMap::new();
        let all = fixture
            .articles
            .iter()
            .chain(fixture.search.values().flatten())
            .chain(fixture.related.values().flatten())
            .chain(fixture.citing.values().flatten())
            .chain(fixture.references.values().flatten());
        for article in all {
            if let Some(pmid) = article.pmid_key() {
                catalog.entry(pmid).or_insert_with(|| article.clone());
            }
        }
        self.catalog = Arc::new(catalog);
    }

    pub fn with_article(self, article: Article) -> Self {
        self.edit(|f| f.articles.push(article))
    }

    pub fn with_search(self, query: &str, results: Vec<Article>) -> Self {
        self.edit(|f| {
            f.search.insert(query.trim().to_lowercase(), results);
        })
    }

    pub fn with_expansion(self, query: &str, expanded: &str, entities: &[&str]) -> Self {
        let expansion = ExpansionFixture {
            query: expanded.to_string(),
            entities: entities.iter().map(|e| e.to_string()).collect(),
        };
        self.edit(|f| {
            f.expansions.insert(query.trim().to_lowercase(), expansion);
        })
    }

    pub fn with_related(self, pmid: &str, results: Vec<Article>) -> Self {
        self.edit(|f| {
            f.related.insert(pmid.to_string(), results);
        })
    }

    pub fn with_citing(self, pmid: &str, results: Vec<Article>) -> Self {
        self.edit(|f| {
            f.citing.insert(pmid.to_string(), results);
        })
    }

    pub fn with_references(self, pmid: &str, results: Vec<Article>) -> Self {
        self.edit(|f| {
            f.references.insert(pmid.to_string(), results);
        })
    }

    pub fn with_metrics(self, pmid: &str, metrics: ArticleMetrics) -> Self {
        self.edit(|f| {
            f.metrics.insert(pmid.to_string(), metrics);
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Make every call fail (shared by clones)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    /// Number of calls received (shared by clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Count the call, then apply the failure switch and the injected delay
    async fn enter(&self, operation: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!("{} <- {}", self.fixture.name, operation);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable {
                provider: self.fixture.name.clone(),
                reason: "fixture switched to failing".to_string(),
            });
        }

        let Some(delay) = self.delay else {
            return Ok(());
        };
        match self.timeout {
            Some(limit) => timeout(limit, sleep(delay)).await.map_err(|_| ProviderError::Timeout {
                provider: self.fixture.name.clone(),
                millis: limit.as_millis() as u64,
            }),
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }

    fn graph(
        &self,
        map: &BTreeMap<String, Vec<Article>>,
        operation: &'static str,
        pmid: &str,
        limit: usize,
    ) -> Result<Vec<Article>, ProviderError> {
        if map.is_empty() {
            return Err(self.unsupported(operation));
        }
        Ok(map
            .get(pmid.trim())
            .map(|articles| articles.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.fixture.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>, ProviderError> {
        self.enter("search").await?;

        let key = query.text.trim().to_lowercase();
        let candidates: Vec<&Article> = match self.fixture.search.get(&key) {
            Some(results) => results.iter().collect(),
            None => self
                .fixture
                .articles
                .iter()
                .filter(|a| a.title.to_lowercase().contains(&key))
                .collect(),
        };

        Ok(candidates
            .into_iter()
            .filter(|a| query.accepts_year(a.year))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn expand_query(&self, query: &str) -> Result<QueryExpansion, ProviderError> {
        if self.fixture.expansions.is_empty() {
            return Err(self.unsupported("expand_query"));
        }
        self.enter("expand_query").await?;

        Ok(match self.fixture.expansions.get(&query.trim().to_lowercase()) {
            Some(expansion) => QueryExpansion {
                query: expansion.query.clone(),
                entities: expansion.entities.clone(),
            },
            None => QueryExpansion {
                query: query.to_string(),
                entities: Vec::new(),
            },
        })
    }

    async fn fetch_details(&self, pmids: &[String]) -> Result<Vec<Article>, ProviderError> {
        self.enter("fetch_details").await?;
        Ok(pmids
            .iter()
            .filter_map(|pmid| self.catalog.get(pmid.trim()).cloned())
            .collect())
    }

    async fn find_related(&self, pmid: &str, limit: usize) -> Result<Vec<Article>, ProviderError> {
        self.enter("find_related").await?;
        self.graph(&self.fixture.related, "find_related", pmid, limit)
    }

    async fn find_citing(&self, pmid: &str, limit: usize) -> Result<Vec<Article>, ProviderError> {
        self.enter("find_citing").await?;
        self.graph(&self.fixture.citing, "find_citing", pmid, limit)
    }

    async fn get_references(&self, pmid: &str, limit: usize) -> Result<Vec<Article>, ProviderError> {
        self.enter("get_references").await?;
        self.graph(&self.fixture.references, "get_references", pmid, limit)
    }

    async fn get_metrics(&self, pmids: &[String]) -> Result<HashMap<String, ArticleMetrics>, ProviderError> {
        if self.fixture.metrics.is_empty() {
            return Err(self.unsupported("get_metrics"));
        }
        self.enter("get_metrics").await?;
        Ok(pmids
            .iter()
            .filter_map(|pmid| {
                self.fixture
                    .metrics
                    .get(pmid.trim())
                    .map(|m| (pmid.clone(), m.clone()))
            })
            .collect())
    }
}

/// Load a registry from a JSON fixture file
pub fn load_registry(path: &Path) -> Result<ProviderRegistry> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture file: {}", path.display()))?;
    let fixture: RegistryFixture = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse fixture file: {}", path.display()))?;
    registry_from_fixture(fixture)
}

pub fn registry_from_fixture(fixture: RegistryFixture) -> Result<ProviderRegistry> {
    if fixture.providers.is_empty() {
        anyhow::bail!("Fixture defines no providers");
    }

    let mut registry = ProviderRegistry::new();
    for provider in fixture.providers {
        registry.insert(Arc::new(StaticProvider::from_fixture(provider)));
    }
    if let Some(primary) = &fixture.primary {
        if registry.get(primary).is_none() {
            anyhow::bail!("Primary provider '{}' is not defined in the fixture", primary);
        }
        registry = registry.with_primary(primary);
    }
    if let Some(metrics) = &fixture.metrics {
        registry = registry.with_metrics(metrics);
    }
    Ok(registry)
}
