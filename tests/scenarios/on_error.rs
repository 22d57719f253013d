use crate::helpers::*;
use litpipe::core::ExecutionStatus;
use litpipe::execution::ExecutionEvent;
use litpipe::provider::{ProviderRegistry, StaticProvider};

fn provider() -> StaticProvider {
    StaticProvider::new("pubmed").with_search(
        "propofol",
        vec![article("1", "Propofol sedation", 2020), article("2", "Propofol infusion", 2015)],
    )
}

#[tokio::test]
async fn test_skip_continues_with_empty_output() {
    let yaml = r#"
name: skip
steps:
  - id: a
    action: search
    params: {query: propofol}
  - id: b
    action: search
  - id: m
    action: merge
    inputs: [a, b]
"#;

    let result = run_yaml(yaml, pubmed(provider())).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "a", 2);
    assert_step_failed(&result, "b", "Missing required parameter 'query'");
    assert_step_ok(&result, "m", 2);
    assert_eq!(result.run.failed_steps(), vec!["b"]);
}

#[tokio::test]
async fn test_abort_keeps_last_successful_output() {
    let yaml = r#"
name: abort
steps:
  - id: a
    action: search
    params: {query: propofol}
  - id: recent
    action: filter
    inputs: [a]
    params: {min_year: 2018}
  - id: broken
    action: search
    on_error: abort
  - id: m
    action: merge
    inputs: [a]
"#;

    let result = run_yaml(yaml, pubmed(provider())).await;

    assert_status(&result, ExecutionStatus::Aborted);
    assert_step_ok(&result, "recent", 1);
    assert_step_failed(&result, "broken", "query");
    assert_step_absent(&result, "m");
    assert_eq!(result.final_pmids(), vec!["1"]);

    assert!(result.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::PipelineAborted { step_id, .. } if step_id == "broken"
    )));
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::PipelineCompleted {
            status: ExecutionStatus::Aborted,
            ..
        })
    ));
}

#[tokio::test]
async fn test_abort_on_first_step_yields_empty_list() {
    let yaml = r#"
name: abort early
steps:
  - id: a
    action: search
    on_error: abort
  - id: b
    action: search
    params: {query: propofol}
"#;

    let result = run_yaml(yaml, pubmed(provider())).await;

    assert_status(&result, ExecutionStatus::Aborted);
    assert!(result.run.articles.is_empty());
    assert_step_absent(&result, "b");
}

#[tokio::test]
async fn test_every_step_failing_is_failed_status() {
    let yaml = r#"
name: down
steps:
  - id: a
    action: search
    params: {query: propofol}
"#;

    let result = run_yaml(yaml, pubmed(provider().failing())).await;

    assert_status(&result, ExecutionStatus::Failed);
    assert_step_failed(&result, "a", "All sources failed");
    assert_step_failed(&result, "a", "unavailable");
    assert!(result.run.articles.is_empty());
}

#[tokio::test]
async fn test_partial_source_failure_is_recorded() {
    let europe_pmc = StaticProvider::new("europe_pmc").failing();
    let providers = ProviderRegistry::new().register(provider()).register(europe_pmc);

    let yaml = r#"
name: partial
steps:
  - id: a
    action: search
    params:
      query: propofol
      sources: [pubmed, europe_pmc, nowhere]
"#;

    let result = run_yaml(yaml, providers).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "a", 2);

    let metadata = &result.run.step("a").unwrap().metadata;
    assert_eq!(metadata["source_counts"]["pubmed"], 2);
    let errors = metadata["source_errors"].as_object().unwrap();
    assert!(errors.contains_key("europe_pmc"));
    assert!(errors["nowhere"].as_str().unwrap().contains("Unknown source"));
}

#[tokio::test]
async fn test_provider_recovers_between_runs() {
    let pubmed_provider = provider().failing();
    let handle = pubmed_provider.clone();
    let yaml = r#"
name: flaky
steps:
  - id: a
    action: search
    params: {query: propofol}
"#;

    let first = run_yaml(yaml, pubmed(pubmed_provider.clone())).await;
    assert_status(&first, ExecutionStatus::Failed);

    handle.set_failing(false);
    let second = run_yaml(yaml, pubmed(pubmed_provider)).await;
    assert_status(&second, ExecutionStatus::Completed);
    assert_eq!(handle.call_count(), 2);
}
