//! Two-stage name resolution: alias table, then closest string match

/// Minimum similarity for a fuzzy match, shared by every field the
/// validator corrects
pub const SIMILARITY_CUTOFF: f64 = 0.6;

/// How a name was resolved against a known vocabulary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// Already a known name
    Exact(&'a str),
    /// Known after case/separator normalization or through the alias table
    Aliased(&'a str),
    /// Closest known name above the cutoff
    FuzzyMatched { value: &'a str, score: f64 },
    Unresolved,
}

/// Lowercase, trim, and unify `-`/space separators to `_`
pub fn normalize_name(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Resolve `value` against `known`, trying the alias table before fuzzy
/// matching
pub fn resolve<'a>(value: &str, known: &[&'a str], aliases: &[(&str, &'a str)]) -> Resolution<'a> {
    if let Some(exact) = known.iter().copied().find(|k| *k == value) {
        return Resolution::Exact(exact);
    }

    let normalized = normalize_name(value);
    if let Some(found) = known.iter().copied().find(|k| *k == normalized) {
        return Resolution::Aliased(found);
    }
    if let Some((_, target)) = aliases.iter().find(|(alias, _)| *alias == normalized) {
        return Resolution::Aliased(*target);
    }

    match closest_match(&normalized, known.iter().copied()) {
        Some((value, score)) => Resolution::FuzzyMatched { value, score },
        None => Resolution::Unresolved,
    }
}

/// Best candidate with similarity at or above the cutoff. Ties keep the
/// earliest candidate.
pub fn closest_match<'a, I>(value: &str, candidates: I) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in candidates {
        let score = similarity(value, candidate);
        if score < SIMILARITY_CUTOFF {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Normalized edit similarity in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
