//! Bibliographic records

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static DOI_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:dx\.)?(?:doi\.org/)|^doi:\s*").expect("valid DOI prefix regex")
});

/// One provider's contribution to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHit {
    /// Provider name (e.g. `pubmed`)
    pub source: String,

    /// 0-based position in that provider's result list
    #[serde(default)]
    pub rank: usize,

    /// Number of results the provider returned for the call
    #[serde(default)]
    pub total: usize,

    /// Query text the provider answered, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl SourceHit {
    pub fn new(source: &str, rank: usize, total: usize) -> Self {
        Self {
            source: source.to_string(),
            rank,
            total,
            query: None,
        }
    }

    /// Position normalized to (0, 1], earlier is higher
    pub fn relevance(&self) -> f64 {
        if self.total == 0 {
            return 0.5;
        }
        let rank = self.rank.min(self.total - 1);
        1.0 - rank as f64 / self.total as f64
    }
}

/// Citation metrics attached by a `metrics` step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,

    /// Relative Citation Ratio (1.0 = field average)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_citation_ratio: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
}

/// A bibliographic article
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmc_id: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publication_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mesh_terms: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ArticleMetrics>,

    /// Assigned by the aggregator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking_score: Option<f64>,

    /// Provenance, one entry per contributing provider call
    #[serde(default)]
    pub sources: Vec<SourceHit>,
}

impl Article {
    pub fn with_pmid(pmid: &str, title: &str) -> Self {
        Self {
            pmid: Some(pmid.to_string()),
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn with_doi(doi: &str, title: &str) -> Self {
        Self {
            doi: Some(doi.to_string()),
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Normalized PMID (digits only)
    pub fn pmid_key(&self) -> Option<String> {
        self.pmid.as_deref().and_then(normalize_pmid)
    }

    /// Normalized DOI (lowercase, no resolver prefix)
    pub fn doi_key(&self) -> Option<String> {
        self.doi.as_deref().and_then(normalize_doi)
    }

    /// Normalized PMC identifier (`PMC` + digits)
    pub fn pmc_key(&self) -> Option<String> {
        self.pmc_id.as_deref().and_then(normalize_pmc)
    }

    /// Whether the record carries any identifier usable for dedup
    pub fn has_identifier(&self) -> bool {
        self.pmid_key().is_some() || self.doi_key().is_some() || self.pmc_key().is_some()
    }

    /// The most specific identifier, as a prefixed string (`pmid:`, `doi:`, `pmc:`)
    pub fn primary_identifier(&self) -> Option<String> {
        self.pmid_key()
            .map(|k| format!("pmid:{}", k))
            .or_else(|| self.doi_key().map(|k| format!("doi:{}", k)))
            .or_else(|| self.pmc_key().map(|k| format!("pmc:{}", k)))
    }

    /// Every identifier, prefixed
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(k) = self.pmid_key() {
            ids.push(format!("pmid:{}", k));
        }
        if let Some(k) = self.doi_key() {
            ids.push(format!("doi:{}", k));
        }
        if let Some(k) = self.pmc_key() {
            ids.push(format!("pmc:{}", k));
        }
        ids
    }

    /// Append a provenance entry
    pub fn add_source(mut self, hit: SourceHit) -> Self {
        self.sources.push(hit);
        self
    }
}

pub fn normalize_pmid(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("PMID:")
        .or_else(|| trimmed.strip_prefix("pmid:"))
        .unwrap_or(trimmed)
        .trim();
    (!trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())).then(|| trimmed.to_string())
}

pub fn normalize_doi(raw: &str) -> Option<String> {
    let stripped = DOI_PREFIX.replace(raw.trim(), "");
    let doi = stripped.trim().to_lowercase();
    (!doi.is_empty()).then_some(doi)
}

pub fn normalize_pmc(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    let digits = upper.strip_prefix("PMC").unwrap_or(&upper);
    (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then(|| format!("PMC{}", digits))
}
