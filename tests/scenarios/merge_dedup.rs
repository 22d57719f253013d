use crate::helpers::*;
use litpipe::core::{Article, ExecutionStatus};
use litpipe::provider::{ProviderRegistry, StaticProvider};

fn registry() -> ProviderRegistry {
    let mut shared = article("1", "Dexmedetomidine and delirium", 2022);
    shared.doi = Some("10.1000/DEX.1".to_string());

    let mut europe_copy = doi_article("https://doi.org/10.1000/dex.1", "Dexmedetomidine and delirium", 2022);
    europe_copy.abstract_text = Some("Longer abstract from Europe PMC.".to_string());
    europe_copy.mesh_terms = vec!["Delirium".to_string()];

    let pubmed = StaticProvider::new("pubmed").with_search(
        "delirium",
        vec![shared, article("2", "Haloperidol for delirium", 2018)],
    );
    let europe_pmc = StaticProvider::new("europe_pmc").with_search(
        "delirium",
        vec![
            europe_copy,
            article("3", "Melatonin and delirium", 2020),
            Article {
                title: "Conference abstract without identifiers".to_string(),
                ..Article::default()
            },
        ],
    );

    ProviderRegistry::new().register(pubmed).register(europe_pmc)
}

#[tokio::test]
async fn test_merge_collapses_records_across_sources() {
    let yaml = r#"
name: dedup
steps:
  - id: pm
    action: search
    params: {query: delirium}
  - id: epmc
    action: search
    params: {query: delirium, sources: europe_pmc}
  - id: merged
    action: merge
    inputs: [pm, epmc]
"#;

    let result = run_yaml(yaml, registry()).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "pm", 2);
    assert_step_ok(&result, "epmc", 3);
    assert_step_ok(&result, "merged", 3);

    let metadata = &result.run.step("merged").unwrap().metadata;
    assert_eq!(metadata["input_count"], 5);
    assert_eq!(metadata["duplicates_removed"], 1);
    assert_eq!(metadata["ranking"], "balanced");

    let merged = result
        .run
        .articles
        .iter()
        .find(|a| a.pmid.as_deref() == Some("1"))
        .expect("merged record keeps its PMID");
    assert_eq!(merged.abstract_text.as_deref(), Some("Longer abstract from Europe PMC."));
    assert_eq!(merged.mesh_terms, vec!["Delirium"]);

    let sources: Vec<&str> = merged.sources.iter().map(|s| s.source.as_str()).collect();
    assert!(sources.contains(&"pubmed"));
    assert!(sources.contains(&"europe_pmc"));
}

#[tokio::test]
async fn test_unconsumed_steps_are_aggregated_at_the_end() {
    let yaml = r#"
name: sinks
steps:
  - id: pm
    action: search
    params: {query: delirium}
  - id: epmc
    action: search
    params: {query: delirium, sources: europe_pmc}
"#;

    let result = run_yaml(yaml, registry()).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_eq!(result.run.aggregation.input_count, 5);
    assert_eq!(result.run.aggregation.duplicates_removed, 1);
    assert_eq!(result.run.aggregation.dropped_without_id, 1);
    assert_eq!(result.run.aggregation.output_count, 3);

    let mut pmids = result.final_pmids();
    pmids.sort();
    assert_eq!(pmids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_multi_source_search_step_merges_by_identifier() {
    let yaml = r#"
name: multi
steps:
  - id: both
    action: search
    params:
      query: delirium
      sources: pubmed, europe_pmc
"#;

    let result = run_yaml(yaml, registry()).await;

    assert_step_ok(&result, "both", 5);
    assert_eq!(result.run.articles.len(), 3);
    assert!(result.run.articles.iter().all(|a| a.ranking_score.is_some()));
}

#[tokio::test]
async fn test_doi_only_records_merge_regardless_of_case() {
    let provider = StaticProvider::new("pubmed")
        .with_search("lower", vec![doi_article("10.1/x", "Shared title", 2021)])
        .with_search("upper", vec![doi_article("10.1/X", "Shared title", 2021)]);
    let yaml = r#"
name: doi only
steps:
  - id: a
    action: search
    params: {query: lower}
  - id: b
    action: search
    params: {query: upper}
  - id: merged
    action: merge
    inputs: [a, b]
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "a", 1);
    assert_step_ok(&result, "b", 1);
    assert_step_ok(&result, "merged", 1);
    assert_eq!(result.run.step("merged").unwrap().metadata["duplicates_removed"], 1);
    assert_eq!(result.run.articles.len(), 1);
    assert_eq!(result.run.articles[0].sources.len(), 2);
}
