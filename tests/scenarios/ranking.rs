use crate::helpers::*;
use litpipe::core::{ArticleMetrics, ExecutionStatus};
use litpipe::execution::ExecutionOptions;
use litpipe::provider::StaticProvider;
use litpipe::RankingPolicy;

fn typed(pmid: &str, title: &str, kind: &str) -> litpipe::Article {
    let mut a = article(pmid, title, 2021);
    a.publication_types = vec![kind.to_string()];
    a
}

#[tokio::test]
async fn test_quality_policy_prefers_stronger_evidence() {
    let provider = StaticProvider::new("pubmed").with_search(
        "sepsis",
        vec![
            typed("10", "Letter on sepsis fluids", "Letter"),
            typed("11", "Sepsis fluids: a meta-analysis", "Meta-Analysis"),
        ],
    );
    let yaml = r#"
name: quality
steps:
  - id: s
    action: search
    params: {query: sepsis}
output:
  ranking: evidence
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_eq!(result.validation.fix_for("output.ranking").unwrap().corrected, "quality");
    assert_eq!(result.final_pmids(), vec!["11", "10"]);
}

#[tokio::test]
async fn test_expanded_entities_boost_matching_records() {
    let provider = StaticProvider::new("pubmed")
        .with_expansion("propofol", "propofol OR diprivan", &["propofol", "diprivan"])
        .with_search(
            "propofol or diprivan",
            vec![
                article("20", "Anaesthesia outcomes in day surgery", 2021),
                article("21", "Propofol versus diprivan dosing", 2021),
            ],
        );
    let yaml = r#"
name: entities
steps:
  - id: x
    action: expand
    params: {query: propofol}
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_status(&result, ExecutionStatus::Completed);
    let metadata = &result.run.step("x").unwrap().metadata;
    assert_eq!(metadata["expanded_query"], "propofol OR diprivan");
    assert_eq!(result.final_pmids(), vec!["21", "20"]);
}

#[tokio::test]
async fn test_expand_without_provider_support_uses_original_query() {
    let provider = StaticProvider::new("pubmed")
        .with_search("propofol", vec![article("1", "Propofol sedation", 2020)]);
    let yaml = r#"
name: fallback
steps:
  - id: x
    action: expand
    params: {query: propofol}
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_step_ok(&result, "x", 1);
    let metadata = &result.run.step("x").unwrap().metadata;
    assert_eq!(metadata["expanded_query"], "propofol");
}

#[tokio::test]
async fn test_impact_ranking_uses_enriched_metrics() {
    let provider = StaticProvider::new("pubmed")
        .with_search(
            "asthma",
            vec![article("30", "Asthma cohort", 2021), article("31", "Asthma landmark trial", 2021)],
        )
        .with_metrics(
            "30",
            ArticleMetrics {
                citation_count: Some(2),
                ..ArticleMetrics::default()
            },
        )
        .with_metrics(
            "31",
            ArticleMetrics {
                citation_count: Some(900),
                relative_citation_ratio: Some(12.0),
                percentile: Some(99.0),
            },
        );
    let yaml = r#"
name: impact
steps:
  - id: s
    action: search
    params: {query: asthma}
  - id: m
    action: metrics
    inputs: [s]
output:
  ranking: impact
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_step_ok(&result, "m", 2);
    assert_eq!(result.run.step("m").unwrap().metadata["enriched"], 2);
    assert_eq!(result.final_pmids(), vec!["31", "30"]);
    assert_eq!(
        result.run.articles[0].metrics.as_ref().and_then(|m| m.citation_count),
        Some(900)
    );
}

#[tokio::test]
async fn test_merge_step_uses_run_default_ranking() {
    let provider = StaticProvider::new("pubmed").with_search("x", vec![article("1", "X", 2020)]);
    let yaml = r#"
name: merge ranking
steps:
  - id: s
    action: search
    params: {query: x}
  - id: m
    action: merge
    inputs: [s]
  - id: m2
    action: merge
    inputs: [m]
    params: {ranking: quality}
"#;
    let options = ExecutionOptions {
        merge_ranking: RankingPolicy::Recency,
        ..ExecutionOptions::default()
    };

    let result = run_yaml_with_options(yaml, pubmed(provider), options).await;

    assert_eq!(result.run.step("m").unwrap().metadata["ranking"], "recency");
    assert_eq!(result.run.step("m2").unwrap().metadata["ranking"], "quality");
}
