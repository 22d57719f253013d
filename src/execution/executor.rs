//! Step executor - runs individual steps against the providers

use crate::{
    aggregation::{aggregate, RankingContext, RankingPolicy},
    core::{config::DEFAULT_LIMIT, Action, Article, Metadata, Params, PipelineStep, SourceHit, StepResult},
    provider::{ProviderError, ProviderRegistry, QueryExpansion, SearchQuery, SourceProvider},
};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Seeds taken from the input when a graph step names no `pmid`
const DEFAULT_MAX_SEEDS: usize = 3;

/// Why a step failed. Rendered into `StepResult::error`.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Missing required parameter '{0}'")]
    MissingParam(&'static str),

    #[error("No provider available for '{0}'")]
    NoProvider(&'static str),

    #[error("All sources failed: {0}")]
    AllSourcesFailed(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

type Handled = Result<(Vec<Article>, Metadata), StepError>;

/// Executes a single step
pub struct StepExecutor {
    providers: ProviderRegistry,
    merge_ranking: RankingPolicy,
}

impl StepExecutor {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self {
            providers,
            merge_ranking: RankingPolicy::Balanced,
        }
    }

    /// Policy for `merge` steps that do not name their own
    pub fn with_merge_ranking(mut self, policy: RankingPolicy) -> Self {
        self.merge_ranking = policy;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Execute a step on its resolved input. Failures are captured in the
    /// returned result, never propagated.
    pub async fn execute(&self, step: &PipelineStep, input: Vec<Article>, entities: &[String]) -> StepResult {
        info!("Executing step: {} ({})", step.id, step.action);

        let handled = match step.action {
            Action::Search => self.search(&step.params).await,
            Action::Expand => self.expand(&step.params).await,
            Action::Details => self.details(&step.params, &input).await,
            Action::Related | Action::Citing | Action::References => {
                self.graph(step.action, &step.params, &input).await
            }
            Action::Metrics => self.metrics(input).await,
            Action::Filter => Ok(filter(&step.params, input)),
            Action::Merge => Ok(self.merge(&step.id, &step.params, input, entities)),
        };

        match handled {
            Ok((articles, metadata)) => {
                debug!("Step {} produced {} articles", step.id, articles.len());
                StepResult::success(step.action, articles, metadata)
            }
            Err(e) => StepResult::failure(step.action, e.to_string()),
        }
    }

    fn primary(&self) -> Result<Arc<dyn SourceProvider>, StepError> {
        self.providers.primary().ok_or(StepError::NoProvider("primary"))
    }

    /// Source names from the `sources` param, defaulting to the primary
    fn sources(&self, params: &Params) -> Result<Vec<String>, StepError> {
        let mut sources = params.get_list("sources");
        if sources.is_empty() {
            let primary = self.providers.primary_name().ok_or(StepError::NoProvider("primary"))?;
            sources.push(primary.to_string());
        }
        let mut seen = HashSet::new();
        sources.retain(|name| seen.insert(name.clone()));
        Ok(sources)
    }

    fn search_query(params: &Params, text: &str) -> SearchQuery {
        let limit = params.get_u64("limit").unwrap_or(DEFAULT_LIMIT as u64) as usize;
        SearchQuery::new(text, limit).with_years(year(params, "min_year"), year(params, "max_year"))
    }

    /// One concurrent search per source. Fails only when every source fails.
    async fn search_sources(&self, sources: &[String], query: &SearchQuery) -> Result<(Vec<Article>, Map<String, Value>, Map<String, Value>), StepError> {
        let calls = sources.iter().map(|name| async move {
            match self.providers.get(name) {
                Some(provider) => {
                    debug!("Searching {} for '{}'", name, query.text);
                    provider.search(query).await
                }
                None => Err(ProviderError::UnknownSource(name.clone())),
            }
        });
        let outcomes = join_all(calls).await;

        let mut articles = Vec::new();
        let mut counts = Map::new();
        let mut errors = Map::new();

        for (name, outcome) in sources.iter().zip(outcomes) {
            match outcome {
                Ok(found) => {
                    counts.insert(name.clone(), json!(found.len()));
                    articles.extend(tag(found, name, Some(&query.text)));
                }
                Err(e) => {
                    warn!("Source {} failed: {}", name, e);
                    errors.insert(name.clone(), json!(e.to_string()));
                }
            }
        }

        if counts.is_empty() {
            let reasons: Vec<String> = errors
                .iter()
                .map(|(name, e)| format!("{}: {}", name, e.as_str().unwrap_or_default()))
                .collect();
            return Err(StepError::AllSourcesFailed(reasons.join("; ")));
        }

        Ok((articles, counts, errors))
    }

    async fn search(&self, params: &Params) -> Handled {
        let text = params.get_str("query").ok_or(StepError::MissingParam("query"))?;
        let sources = self.sources(params)?;
        let query = Self::search_query(params, &text);

        let (articles, counts, errors) = self.search_sources(&sources, &query).await?;

        let mut metadata = Metadata::new();
        metadata.insert("query".into(), json!(text));
        metadata.insert("source_counts".into(), Value::Object(counts));
        if !errors.is_empty() {
            metadata.insert("source_errors".into(), Value::Object(errors));
        }
        Ok((articles, metadata))
    }

    async fn expand(&self, params: &Params) -> Handled {
        let text = params.get_str("query").ok_or(StepError::MissingParam("query"))?;
        let sources = self.sources(params)?;

        let expansion = match self.primary()?.expand_query(&text).await {
            Ok(expansion) => expansion,
            Err(e @ ProviderError::Unsupported { .. }) => {
                warn!("{}; searching with the original query", e);
                QueryExpansion {
                    query: text.clone(),
                    entities: Vec::new(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        let query = Self::search_query(params, &expansion.query);
        let (articles, counts, errors) = self.search_sources(&sources, &query).await?;

        let mut metadata = Metadata::new();
        metadata.insert("original_query".into(), json!(text));
        metadata.insert("expanded_query".into(), json!(expansion.query));
        metadata.insert("entities".into(), json!(expansion.entities));
        metadata.insert("source_counts".into(), Value::Object(counts));
        if !errors.is_empty() {
            metadata.insert("source_errors".into(), Value::Object(errors));
        }
        Ok((articles, metadata))
    }

    async fn details(&self, params: &Params, input: &[Article]) -> Handled {
        let mut pmids = params.get_list("pmids");
        if pmids.is_empty() {
            pmids = input_pmids(input, usize::MAX);
        }
        if pmids.is_empty() {
            return Err(StepError::MissingParam("pmids"));
        }

        let provider = self.primary()?;
        let found = provider.fetch_details(&pmids).await?;

        let mut metadata = Metadata::new();
        metadata.insert("requested".into(), json!(pmids.len()));
        Ok((tag(found, provider.name(), None), metadata))
    }

    /// `related`, `citing` and `references`: one call per seed PMID
    async fn graph(&self, action: Action, params: &Params, input: &[Article]) -> Handled {
        let seeds = match params.get_str("pmid") {
            Some(pmid) => vec![pmid],
            None => {
                let max_seeds = params.get_u64("max_seeds").map(|n| n as usize).unwrap_or(DEFAULT_MAX_SEEDS);
                input_pmids(input, max_seeds)
            }
        };
        if seeds.is_empty() {
            return Err(StepError::MissingParam("pmid"));
        }

        let provider = self.primary()?;
        let limit = params.get_u64("limit").unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let calls = seeds.iter().map(|seed| {
            let provider = provider.clone();
            async move {
                match action {
                    Action::Related => provider.find_related(seed, limit).await,
                    Action::Citing => provider.find_citing(seed, limit).await,
                    _ => provider.get_references(seed, limit).await,
                }
            }
        });
        let outcomes = join_all(calls).await;

        let mut articles = Vec::new();
        let mut seed_errors = Map::new();
        let mut first_error = None;
        for (seed, outcome) in seeds.iter().zip(outcomes) {
            match outcome {
                Ok(found) => articles.extend(tag(found, provider.name(), None)),
                Err(e) => {
                    warn!("{} for seed {} failed: {}", action, seed, e);
                    seed_errors.insert(seed.clone(), json!(e.to_string()));
                    first_error.get_or_insert(e);
                }
            }
        }
        if seed_errors.len() == seeds.len() {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }

        let mut metadata = Metadata::new();
        metadata.insert("seeds".into(), json!(seeds));
        let mut counts = Map::new();
        counts.insert(provider.name().to_string(), json!(articles.len()));
        metadata.insert("source_counts".into(), Value::Object(counts));
        if !seed_errors.is_empty() {
            metadata.insert("seed_errors".into(), Value::Object(seed_errors));
        }
        Ok((articles, metadata))
    }

    async fn metrics(&self, mut input: Vec<Article>) -> Handled {
        let mut metadata = Metadata::new();
        let pmids = input_pmids(&input, usize::MAX);
        if pmids.is_empty() {
            metadata.insert("enriched".into(), json!(0));
            return Ok((input, metadata));
        }

        let provider = self.providers.metrics().ok_or(StepError::NoProvider("metrics"))?;
        let found = match provider.get_metrics(&pmids).await {
            Ok(found) => found,
            Err(e @ ProviderError::Unsupported { .. }) => {
                warn!("{}; passing records through unenriched", e);
                metadata.insert("enriched".into(), json!(0));
                metadata.insert("unsupported".into(), json!(e.to_string()));
                return Ok((input, metadata));
            }
            Err(e) => return Err(e.into()),
        };

        let mut enriched = 0;
        for article in input.iter_mut() {
            let Some(metrics) = article.pmid_key().and_then(|pmid| found.get(&pmid)) else {
                continue;
            };
            let current = article.metrics.get_or_insert_with(Default::default);
            current.citation_count = metrics.citation_count.or(current.citation_count);
            current.relative_citation_ratio = metrics.relative_citation_ratio.or(current.relative_citation_ratio);
            current.percentile = metrics.percentile.or(current.percentile);
            enriched += 1;
        }

        metadata.insert("enriched".into(), json!(enriched));
        Ok((input, metadata))
    }

    fn merge(&self, step_id: &str, params: &Params, input: Vec<Article>, entities: &[String]) -> (Vec<Article>, Metadata) {
        let policy = match params.get_str("ranking") {
            Some(name) => name.parse().unwrap_or_else(|e| {
                warn!("Step {}: {}, using {}", step_id, e, self.merge_ranking);
                self.merge_ranking
            }),
            None => self.merge_ranking,
        };

        let ctx = RankingContext::new(policy).with_entities(entities.to_vec());
        let output = aggregate([input], &ctx);

        let mut metadata = Metadata::new();
        metadata.insert("input_count".into(), json!(output.stats.input_count));
        metadata.insert("output_count".into(), json!(output.stats.output_count));
        metadata.insert("duplicates_removed".into(), json!(output.stats.duplicates_removed));
        metadata.insert("ranking".into(), json!(policy.as_str()));
        (output.articles, metadata)
    }
}

/// Keep input records matching every given criterion. Records with no
/// year pass year bounds; `min_citations` requires a known count.
pub fn filter(params: &Params, input: Vec<Article>) -> (Vec<Article>, Metadata) {
    let min_year = year(params, "min_year");
    let max_year = year(params, "max_year");
    let article_types = lowercase(params.get_list("article_types"));
    let exclude_types = lowercase(params.get_list("exclude_types"));
    let min_citations = params.get_i64("min_citations").filter(|n| *n > 0).map(|n| n as u64);
    let require_abstract = params.get_bool("require_abstract").unwrap_or(false);

    let has_type = |article: &Article, wanted: &[String]| {
        article.publication_types.iter().any(|t| {
            let t = t.to_lowercase();
            wanted.iter().any(|w| t.contains(w.as_str()))
        })
    };

    let input_count = input.len();
    let kept: Vec<Article> = input
        .into_iter()
        .filter(|a| match a.year {
            Some(y) => min_year.is_none_or(|min| y >= min) && max_year.is_none_or(|max| y <= max),
            None => true,
        })
        .filter(|a| article_types.is_empty() || has_type(a, &article_types))
        .filter(|a| exclude_types.is_empty() || !has_type(a, &exclude_types))
        .filter(|a| match min_citations {
            Some(min) => a
                .metrics
                .as_ref()
                .and_then(|m| m.citation_count)
                .is_some_and(|c| c >= min),
            None => true,
        })
        .filter(|a| !require_abstract || a.abstract_text.as_deref().is_some_and(|t| !t.trim().is_empty()))
        .collect();

    let mut metadata = Metadata::new();
    metadata.insert("input_count".into(), json!(input_count));
    metadata.insert("removed".into(), json!(input_count - kept.len()));
    metadata.insert("output_count".into(), json!(kept.len()));
    (kept, metadata)
}

fn year(params: &Params, key: &str) -> Option<i32> {
    params.get_i64(key).and_then(|y| i32::try_from(y).ok())
}

fn lowercase(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.to_lowercase()).collect()
}

/// Distinct PMIDs of the input, in order, at most `max`
fn input_pmids(input: &[Article], max: usize) -> Vec<String> {
    let mut pmids: Vec<String> = Vec::new();
    for pmid in input.iter().filter_map(Article::pmid_key) {
        if pmids.len() == max {
            break;
        }
        if !pmids.contains(&pmid) {
            pmids.push(pmid);
        }
    }
    pmids
}

/// Record provenance: position and result count within this call
fn tag(articles: Vec<Article>, source: &str, query: Option<&str>) -> Vec<Article> {
    let total = articles.len();
    articles
        .into_iter()
        .enumerate()
        .map(|(rank, article)| {
            let mut hit = SourceHit::new(source, rank, total);
            hit.query = query.map(str::to_string);
            article.add_source(hit)
        })
        .collect()
}
