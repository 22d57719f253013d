//! Six-signal scoring and stable ordering

use crate::aggregation::RankingContext;
use crate::core::Article;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::LazyLock;

/// Weighting policy for the final list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPolicy {
    #[default]
    Balanced,
    Impact,
    Recency,
    Quality,
}

impl RankingPolicy {
    pub const NAMES: [&'static str; 4] = ["balanced", "impact", "recency", "quality"];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingPolicy::Balanced => "balanced",
            RankingPolicy::Impact => "impact",
            RankingPolicy::Recency => "recency",
            RankingPolicy::Quality => "quality",
        }
    }

    /// Weights in signal order: relevance, quality, recency, impact,
    /// source trust, entity match. Each row sums to 1.
    pub fn weights(&self) -> [f64; 6] {
        match self {
            RankingPolicy::Balanced => [0.20, 0.16, 0.16, 0.16, 0.16, 0.16],
            RankingPolicy::Quality => [0.15, 0.45, 0.10, 0.10, 0.10, 0.10],
            RankingPolicy::Recency => [0.15, 0.10, 0.45, 0.10, 0.10, 0.10],
            RankingPolicy::Impact => [0.15, 0.10, 0.10, 0.45, 0.10, 0.10],
        }
    }
}

impl FromStr for RankingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "balanced" => Ok(RankingPolicy::Balanced),
            "impact" => Ok(RankingPolicy::Impact),
            "recency" => Ok(RankingPolicy::Recency),
            "quality" => Ok(RankingPolicy::Quality),
            other => Err(format!("unknown ranking policy '{}'", other)),
        }
    }
}

impl std::fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const NEUTRAL: f64 = 0.5;
const RECENCY_HORIZON_YEARS: f64 = 20.0;
const UNKNOWN_SOURCE_TRUST: f64 = 0.6;

const SOURCE_TRUST: [(&str, f64); 6] = [
    ("pubmed", 1.0),
    ("europe_pmc", 0.9),
    ("semantic_scholar", 0.8),
    ("openalex", 0.75),
    ("crossref", 0.7),
    ("core", 0.7),
];

/// Publication type tiers, checked in order; first match wins
static QUALITY_TIERS: LazyLock<Vec<(Regex, f64)>> = LazyLock::new(|| {
    [
        (r"meta[- ]?analys", 1.0),
        (r"systematic review", 0.95),
        (r"randomi[sz]ed controlled trial", 0.85),
        (r"clinical trial", 0.7),
        (r"cohort|observational|case[- ]control", 0.6),
        (r"review", 0.55),
        (r"case report", 0.3),
        (r"preprint", 0.25),
        (r"letter|editorial|comment", 0.2),
    ]
    .into_iter()
    .filter_map(|(pattern, score)| Regex::new(&format!("(?i){}", pattern)).ok().map(|re| (re, score)))
    .collect()
});

/// Best normalized position across the record's sources
pub fn relevance(article: &Article) -> f64 {
    article
        .sources
        .iter()
        .map(|hit| hit.relevance())
        .reduce(f64::max)
        .unwrap_or(NEUTRAL)
}

/// Evidence tier of the best publication type
pub fn quality(article: &Article) -> f64 {
    article
        .publication_types
        .iter()
        .filter_map(|kind| {
            QUALITY_TIERS
                .iter()
                .find(|(re, _)| re.is_match(kind))
                .map(|(_, score)| *score)
        })
        .reduce(f64::max)
        .unwrap_or(NEUTRAL)
}

pub fn recency(article: &Article, current_year: i32) -> f64 {
    match article.year {
        Some(year) => {
            let age = (current_year - year).max(0) as f64;
            (1.0 - age / RECENCY_HORIZON_YEARS).max(0.0)
        }
        None => NEUTRAL,
    }
}

/// RCR when known, else log-scaled citation count
pub fn impact(article: &Article) -> f64 {
    let Some(metrics) = &article.metrics else {
        return NEUTRAL;
    };
    if let Some(rcr) = metrics.relative_citation_ratio.filter(|r| *r >= 0.0) {
        return rcr / (rcr + 1.0);
    }
    match metrics.citation_count {
        Some(count) => ((1.0 + count as f64).ln() / 1001f64.ln()).min(1.0),
        None => NEUTRAL,
    }
}

pub fn source_trust(article: &Article) -> f64 {
    article
        .sources
        .iter()
        .map(|hit| {
            SOURCE_TRUST
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&hit.source))
                .map(|(_, trust)| *trust)
                .unwrap_or(UNKNOWN_SOURCE_TRUST)
        })
        .reduce(f64::max)
        .unwrap_or(UNKNOWN_SOURCE_TRUST)
}

/// Fraction of entities mentioned in the title, MeSH terms or keywords
pub fn entity_match(article: &Article, entities: &[String]) -> f64 {
    let entities: Vec<String> = entities
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if entities.is_empty() {
        return NEUTRAL;
    }

    let haystack = std::iter::once(&article.title)
        .chain(article.mesh_terms.iter())
        .chain(article.keywords.iter())
        .map(|text| text.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let matched = entities.iter().filter(|e| haystack.contains(e.as_str())).count();
    matched as f64 / entities.len() as f64
}

/// Weighted score in [0, 1]
pub fn score(article: &Article, ctx: &RankingContext) -> f64 {
    let signals = [
        relevance(article),
        quality(article),
        recency(article, ctx.current_year),
        impact(article),
        source_trust(article),
        entity_match(article, &ctx.entities),
    ];
    signals
        .iter()
        .zip(ctx.policy.weights())
        .map(|(signal, weight)| signal * weight)
        .sum()
}

/// Score every record and sort: score desc, year desc, then incoming order
pub fn rank(articles: &mut [Article], ctx: &RankingContext) {
    for article in articles.iter_mut() {
        article.ranking_score = Some(score(article, ctx));
    }

    // sort_by is stable, so equal keys keep first-produced order
    articles.sort_by(|a, b| {
        let by_score = b
            .ranking_score
            .unwrap_or(0.0)
            .total_cmp(&a.ranking_score.unwrap_or(0.0));
        match by_score {
            Ordering::Equal => b.year.cmp(&a.year),
            other => other,
        }
    });
}
