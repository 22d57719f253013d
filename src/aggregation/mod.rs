//! Result aggregation: identifier dedup followed by ranking

pub mod dedup;
pub mod ranking;

pub use dedup::{deduplicate, merge_into, Deduplicated};
pub use ranking::{rank, RankingPolicy};

use crate::core::Article;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Counts reported by one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationStats {
    pub input_count: usize,
    pub output_count: usize,
    pub duplicates_removed: usize,
    pub dropped_without_id: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationOutput {
    pub articles: Vec<Article>,
    pub stats: AggregationStats,
}

/// Inputs to scoring besides the records themselves
#[derive(Debug, Clone, PartialEq)]
pub struct RankingContext {
    pub policy: RankingPolicy,
    pub current_year: i32,
    /// Entities recognized during query expansion
    pub entities: Vec<String>,
}

impl RankingContext {
    pub fn new(policy: RankingPolicy) -> Self {
        Self {
            policy,
            current_year: chrono::Utc::now().year(),
            entities: Vec::new(),
        }
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }
}

/// Deduplicate record sets in the order given, then score and sort
pub fn aggregate<I>(record_sets: I, ctx: &RankingContext) -> AggregationOutput
where
    I: IntoIterator<Item = Vec<Article>>,
{
    let deduplicated = deduplicate(record_sets);
    let mut articles = deduplicated.articles;
    rank(&mut articles, ctx);

    AggregationOutput {
        stats: AggregationStats {
            input_count: deduplicated.input_count,
            output_count: articles.len(),
            duplicates_removed: deduplicated.duplicates_removed,
            dropped_without_id: deduplicated.dropped_without_id,
        },
        articles,
    }
}
