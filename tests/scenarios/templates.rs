use crate::helpers::*;
use litpipe::core::{ArticleMetrics, ExecutionStatus};
use litpipe::execution::{ExecutionEngine, ExecutionError};
use litpipe::provider::StaticProvider;

fn cited(count: u64) -> ArticleMetrics {
    ArticleMetrics {
        citation_count: Some(count),
        ..ArticleMetrics::default()
    }
}

#[tokio::test]
async fn test_comprehensive_template_from_alias() {
    let provider = StaticProvider::new("pubmed")
        .with_search(
            "propofol",
            vec![article("1", "Propofol sedation", 2020), article("2", "Propofol infusion", 2015)],
        )
        .with_metrics("1", cited(40));
    let yaml = r#"
name: comprehensive run
template: systematic
template_params:
  query: propofol
  min_year: 2018
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_eq!(result.validation.fix_for("template").unwrap().corrected, "comprehensive");
    assert_status(&result, ExecutionStatus::Completed);
    assert_eq!(
        result.execution_order(),
        vec!["primary", "expanded", "merged", "filtered", "enriched"]
    );

    // Only pubmed is registered; the other default sources are reported, not fatal
    let primary = &result.run.step("primary").unwrap().metadata;
    assert!(primary["source_errors"].get("openalex").is_some());
    assert_step_ok(&result, "primary", 2);

    assert_step_ok(&result, "merged", 2);
    assert_step_ok(&result, "filtered", 1);
    assert_step_ok(&result, "enriched", 1);
    assert_eq!(result.final_pmids(), vec!["1"]);
    assert_eq!(result.run.articles[0].metrics.as_ref().unwrap().citation_count, Some(40));
}

#[tokio::test]
async fn test_exploration_template_walks_the_citation_graph() {
    let provider = StaticProvider::new("pubmed")
        .with_article(article("100", "Seed paper", 2015))
        .with_related("100", vec![article("101", "Related one", 2016), article("102", "Related two", 2017)])
        .with_citing("100", vec![article("103", "Citing one", 2020), article("101", "Related one", 2016)])
        .with_references("100", vec![article("104", "Older work", 2010)])
        .with_metrics("101", cited(12));
    let yaml = r#"
name: explore
template: explore
template_params:
  pmid: "100"
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "seed", 1);
    assert_step_ok(&result, "related", 2);
    assert_step_ok(&result, "citing", 2);
    assert_step_ok(&result, "references", 1);
    assert_step_ok(&result, "merged", 5);
    assert_eq!(result.run.step("merged").unwrap().metadata["duplicates_removed"], 1);

    let mut pmids = result.final_pmids();
    pmids.sort();
    assert_eq!(pmids, vec!["100", "101", "102", "103", "104"]);
}

#[tokio::test]
async fn test_template_without_required_param_cannot_start() {
    let (_, config) = validated("name: t\ntemplate: exploration\n");

    let err = ExecutionEngine::new(pubmed(StaticProvider::new("pubmed")))
        .execute_config(&config)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Build(_)));
    assert!(err.to_string().contains("pmid"));
}

#[tokio::test]
async fn test_graph_step_without_provider_support_fails() {
    let provider = StaticProvider::new("pubmed")
        .with_search("seed", vec![article("1", "Seed", 2020)]);
    let yaml = r#"
name: graph
steps:
  - id: s
    action: search
    params: {query: seed}
  - id: r
    action: related
    inputs: [s]
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_step_failed(&result, "r", "does not support find_related");
    assert_status(&result, ExecutionStatus::Completed);
    // The failed sink contributes nothing
    assert!(result.run.articles.is_empty());
}

#[tokio::test]
async fn test_template_runs_against_provider_without_metrics() {
    let provider = StaticProvider::new("pubmed").with_search(
        "propofol",
        vec![article("1", "Propofol sedation", 2020), article("2", "Propofol infusion", 2019)],
    );
    let yaml = r#"
name: no metrics
template: comprehensive
template_params:
  query: propofol
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "enriched", 2);
    assert_eq!(result.run.step("enriched").unwrap().metadata["enriched"], 0);
    let mut pmids = result.final_pmids();
    pmids.sort();
    assert_eq!(pmids, vec!["1", "2"]);
    assert!(result.run.articles.iter().all(|a| a.metrics.is_none()));
}
