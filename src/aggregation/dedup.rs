//! Identifier-based deduplication

use crate::core::Article;
use std::collections::HashMap;
use tracing::warn;

/// Result of deduplicating a stream of records
#[derive(Debug, Default)]
pub struct Deduplicated {
    /// Surviving records in first-produced order
    pub articles: Vec<Article>,
    pub input_count: usize,
    pub duplicates_removed: usize,
    /// Records dropped for carrying no usable identifier
    pub dropped_without_id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyKind {
    Pmid,
    Doi,
    Pmc,
}

/// Index of identifiers to entry slots. Slots absorbed by a later bridge
/// merge are left as `None`.
#[derive(Default)]
struct Index {
    slots: Vec<Option<Article>>,
    keys: HashMap<(KeyKind, String), usize>,
}

impl Index {
    fn keys_of(article: &Article) -> Vec<(KeyKind, String)> {
        let mut keys = Vec::with_capacity(3);
        if let Some(k) = article.pmid_key() {
            keys.push((KeyKind::Pmid, k));
        }
        if let Some(k) = article.doi_key() {
            keys.push((KeyKind::Doi, k));
        }
        if let Some(k) = article.pmc_key() {
            keys.push((KeyKind::Pmc, k));
        }
        keys
    }

    fn register(&mut self, slot: usize) {
        if let Some(article) = &self.slots[slot] {
            for key in Self::keys_of(article) {
                self.keys.insert(key, slot);
            }
        }
    }

    /// Insert a record; returns how many existing entries it was merged into
    fn insert(&mut self, article: Article) -> usize {
        let keys = Self::keys_of(&article);
        let mut matched: Vec<usize> = keys
            .iter()
            .filter_map(|key| self.keys.get(key).copied())
            .collect();
        matched.sort_unstable();
        matched.dedup();

        let Some((&target, bridged)) = matched.split_first() else {
            self.slots.push(Some(article));
            self.register(self.slots.len() - 1);
            return 0;
        };

        // A record can bridge entries that were distinct so far; fold them
        // into the earliest one.
        for &other in bridged {
            if let Some(absorbed) = self.slots[other].take() {
                for key in Self::keys_of(&absorbed) {
                    self.keys.insert(key, target);
                }
                if let Some(existing) = self.slots[target].as_mut() {
                    merge_into(existing, absorbed);
                }
            }
        }
        if let Some(existing) = self.slots[target].as_mut() {
            merge_into(existing, article);
        }
        for key in keys {
            self.keys.insert(key, target);
        }
        self.register(target);

        matched.len()
    }
}

/// Deduplicate record sets in order. Two records are the same article when
/// they share a PMID, a normalized DOI or a PMC id.
pub fn deduplicate<I>(record_sets: I) -> Deduplicated
where
    I: IntoIterator<Item = Vec<Article>>,
{
    let mut index = Index::default();
    let mut result = Deduplicated::default();

    for article in record_sets.into_iter().flatten() {
        result.input_count += 1;

        if !article.has_identifier() {
            warn!("Dropping record without identifier: '{}'", article.title);
            result.dropped_without_id += 1;
            continue;
        }

        index.insert(article);
    }

    result.articles = index.slots.into_iter().flatten().collect();
    result.duplicates_removed = result.input_count - result.dropped_without_id - result.articles.len();
    result
}

/// Merge `other` into `existing`: identifiers unioned, provenance
/// concatenated, empty fields filled (first-seen non-empty value wins).
pub fn merge_into(existing: &mut Article, other: Article) {
    fill_text(&mut existing.pmid, other.pmid);
    fill_text(&mut existing.doi, other.doi);
    fill_text(&mut existing.pmc_id, other.pmc_id);
    fill_text(&mut existing.journal, other.journal);
    fill(&mut existing.year, other.year);

    if existing.title.trim().is_empty() {
        existing.title = other.title;
    }

    match (&existing.abstract_text, other.abstract_text) {
        (None, Some(text)) => existing.abstract_text = Some(text),
        (Some(current), Some(text)) if current.trim().len() < text.trim().len() => {
            existing.abstract_text = Some(text)
        }
        _ => {}
    }

    if existing.authors.is_empty() {
        existing.authors = other.authors;
    }
    union(&mut existing.publication_types, other.publication_types);
    union(&mut existing.mesh_terms, other.mesh_terms);
    union(&mut existing.keywords, other.keywords);

    match (&mut existing.metrics, other.metrics) {
        (None, Some(metrics)) => existing.metrics = Some(metrics),
        (Some(current), Some(metrics)) => {
            fill(&mut current.citation_count, metrics.citation_count);
            fill(&mut current.relative_citation_ratio, metrics.relative_citation_ratio);
            fill(&mut current.percentile, metrics.percentile);
        }
        _ => {}
    }

    existing.sources.extend(other.sources);
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Like `fill`, but a blank string counts as missing
fn fill_text(slot: &mut Option<String>, value: Option<String>) {
    let blank = slot.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank && value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        *slot = value;
    }
}

fn union(target: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        if !target.iter().any(|t| t.eq_ignore_ascii_case(&value)) {
            target.push(value);
        }
    }
}
