use crate::helpers::*;
use litpipe::core::ExecutionStatus;
use litpipe::provider::StaticProvider;

fn many(count: usize) -> StaticProvider {
    let articles = (1..=count)
        .map(|i| article(&i.to_string(), &format!("Trial {}", i), 2020))
        .collect();
    StaticProvider::new("pubmed").with_search("trials", articles)
}

#[tokio::test]
async fn test_final_list_is_truncated_to_limit() {
    let yaml = r#"
name: limited
steps:
  - id: s
    action: search
    params: {query: trials, limit: 50}
output:
  limit: 5
"#;

    let result = run_yaml(yaml, pubmed(many(12))).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "s", 12);
    assert_eq!(result.run.articles.len(), 5);
    assert_eq!(result.run.aggregation.input_count, 12);
    assert_eq!(result.run.aggregation.output_count, 5);
    // Provider order decides when every other signal ties
    assert_eq!(result.final_pmids(), vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_default_limit_applies_to_steps_and_output() {
    let yaml = r#"
name: defaults
steps:
  - id: s
    action: search
    params: {query: trials}
"#;

    let result = run_yaml(yaml, pubmed(many(30))).await;

    assert_step_ok(&result, "s", 20);
    assert_eq!(result.run.articles.len(), 20);
}

#[tokio::test]
async fn test_fractional_limit_is_coerced() {
    let yaml = r#"
name: fractional
steps:
  - id: s
    action: search
    params: {query: trials}
output:
  limit: 3.7
"#;

    let result = run_yaml(yaml, pubmed(many(10))).await;

    assert_eq!(result.validation.fix_for("output.limit").unwrap().corrected, "3");
    assert_eq!(result.run.articles.len(), 3);
}

#[tokio::test]
async fn test_filter_step_narrows_by_year_and_type() {
    let mut review = article("40", "Trial review", 2012);
    review.publication_types = vec!["Review".to_string()];
    let mut recent_trial = article("41", "Trial of something", 2022);
    recent_trial.publication_types = vec!["Randomized Controlled Trial".to_string()];
    let mut undated = article("42", "Trial with unknown year", 2000);
    undated.year = None;

    let provider =
        StaticProvider::new("pubmed").with_search("trials", vec![review, recent_trial, undated]);
    let yaml = r#"
name: filtered
steps:
  - id: s
    action: search
    params: {query: trials}
  - id: f
    action: filter
    inputs: [s]
    params:
      min_year: 2015
      exclude_types: [review]
"#;

    let result = run_yaml(yaml, pubmed(provider)).await;

    assert_step_ok(&result, "f", 2);
    let metadata = &result.run.step("f").unwrap().metadata;
    assert_eq!(metadata["removed"], 1);

    let mut pmids = result.final_pmids();
    pmids.sort();
    assert_eq!(pmids, vec!["41", "42"]);
}
