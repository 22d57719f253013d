//! Built-in pipeline templates.
//!
//! A template config names one of these and supplies `template_params`; the
//! steps are generated here just before execution.

use crate::core::config::StepConfig;
use crate::core::pipeline::PipelineBuildError;
use crate::core::step::Params;

/// Template names accepted verbatim by the validator
pub const TEMPLATE_NAMES: [&str; 4] = ["pico", "comprehensive", "exploration", "gene_drug"];

/// Common misspellings and synonyms, resolved before fuzzy matching
pub const TEMPLATE_ALIASES: &[(&str, &str)] = &[
    ("pico_search", "pico"),
    ("clinical", "pico"),
    ("clinical_question", "pico"),
    ("full", "comprehensive"),
    ("systematic", "comprehensive"),
    ("systematic_review", "comprehensive"),
    ("thorough", "comprehensive"),
    ("explore", "exploration"),
    ("citation_network", "exploration"),
    ("snowball", "exploration"),
    ("gene", "gene_drug"),
    ("drug", "gene_drug"),
    ("pharmacogenomics", "gene_drug"),
];

/// Expand a template into a concrete step list
pub fn expand(template: &str, params: &Params) -> Result<Vec<StepConfig>, PipelineBuildError> {
    match template {
        "pico" => pico(params),
        "comprehensive" => comprehensive(params),
        "exploration" => exploration(params),
        "gene_drug" => gene_drug(params),
        other => Err(PipelineBuildError::UnknownTemplate(other.to_string())),
    }
}

fn required(template: &str, params: &Params, key: &str) -> Result<String, PipelineBuildError> {
    params
        .get_str(key)
        .ok_or_else(|| PipelineBuildError::MissingTemplateParam {
            template: template.to_string(),
            param: key.to_string(),
        })
}

fn search(id: &str, query: &str, limit: i64) -> StepConfig {
    StepConfig::new(id, "search").with_params(Params::new().with("query", query).with("limit", limit))
}

fn year_filter(params: &Params, input: &str) -> Option<StepConfig> {
    let min_year = params.get_i64("min_year");
    let max_year = params.get_i64("max_year");
    if min_year.is_none() && max_year.is_none() {
        return None;
    }

    let mut filter_params = Params::new();
    if let Some(year) = min_year {
        filter_params.insert("min_year", year);
    }
    if let Some(year) = max_year {
        filter_params.insert("max_year", year);
    }
    Some(StepConfig::new("filtered", "filter").with_params(filter_params).with_inputs(&[input]))
}

/// Append an optional year filter and a metrics step after `last`
fn finish(mut steps: Vec<StepConfig>, params: &Params, last: &str) -> Vec<StepConfig> {
    let last = match year_filter(params, last) {
        Some(filter) => {
            steps.push(filter);
            "filtered"
        }
        None => last,
    };
    steps.push(StepConfig::new("enriched", "metrics").with_inputs(&[last]));
    steps
}

fn pico(params: &Params) -> Result<Vec<StepConfig>, PipelineBuildError> {
    let population = required("pico", params, "population")?;
    let intervention = required("pico", params, "intervention")?;
    let limit = params.get_i64("limit").unwrap_or(30);

    let mut core_query = format!("({}) AND ({})", population, intervention);
    if let Some(comparison) = params.get_str("comparison") {
        core_query = format!("{} AND ({})", core_query, comparison);
    }

    let mut steps = vec![search("pico_core", &core_query, limit)];
    let mut merged = vec!["pico_core"];

    if let Some(outcome) = params.get_str("outcome") {
        steps.push(search(
            "pico_outcome",
            &format!("({}) AND ({})", intervention, outcome),
            limit,
        ));
        merged.push("pico_outcome");
    }

    steps.push(
        StepConfig::new("pico_expanded", "expand").with_params(
            Params::new()
                .with("query", format!("{} {}", population, intervention))
                .with("limit", limit),
        ),
    );
    merged.push("pico_expanded");

    steps.push(StepConfig::new("merged", "merge").with_inputs(&merged));
    Ok(finish(steps, params, "merged"))
}

fn comprehensive(params: &Params) -> Result<Vec<StepConfig>, PipelineBuildError> {
    let query = required("comprehensive", params, "query")?;
    let limit = params.get_i64("limit").unwrap_or(50);
    let sources = params.get_list("sources");
    let sources = if sources.is_empty() {
        "pubmed,europe_pmc,openalex".to_string()
    } else {
        sources.join(",")
    };

    let steps = vec![
        StepConfig::new("primary", "search").with_params(
            Params::new()
                .with("query", query.as_str())
                .with("limit", limit)
                .with("sources", sources),
        ),
        StepConfig::new("expanded", "expand")
            .with_params(Params::new().with("query", query.as_str()).with("limit", limit)),
        StepConfig::new("merged", "merge").with_inputs(&["primary", "expanded"]),
    ];
    Ok(finish(steps, params, "merged"))
}

fn exploration(params: &Params) -> Result<Vec<StepConfig>, PipelineBuildError> {
    let pmid = required("exploration", params, "pmid")?;
    let limit = params.get_i64("limit").unwrap_or(20);
    let seeded = |id: &str, action: &str| {
        StepConfig::new(id, action)
            .with_params(Params::new().with("pmid", pmid.as_str()).with("limit", limit))
    };

    let steps = vec![
        StepConfig::new("seed", "details").with_params(Params::new().with("pmids", pmid.as_str())),
        seeded("related", "related"),
        seeded("citing", "citing"),
        seeded("references", "references"),
        StepConfig::new("merged", "merge").with_inputs(&["seed", "related", "citing", "references"]),
    ];
    Ok(finish(steps, params, "merged"))
}

fn gene_drug(params: &Params) -> Result<Vec<StepConfig>, PipelineBuildError> {
    let gene = required("gene_drug", params, "gene")?;
    let drug = required("gene_drug", params, "drug")?;
    let limit = params.get_i64("limit").unwrap_or(30);

    let steps = vec![
        search("combined", &format!("({}) AND ({})", gene, drug), limit),
        search("gene", &format!("{} pharmacogenomics", gene), limit),
        StepConfig::new("drug", "expand")
            .with_params(Params::new().with("query", drug.as_str()).with("limit", limit)),
        StepConfig::new("merged", "merge").with_inputs(&["combined", "gene", "drug"]),
    ];
    Ok(finish(steps, params, "merged"))
}
