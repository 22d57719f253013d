use crate::helpers::*;
use litpipe::core::ExecutionStatus;
use litpipe::execution::{ExecutionOptions, DEADLINE_EXCEEDED};
use litpipe::provider::StaticProvider;
use std::time::Duration;

const YAML: &str = r#"
name: slow
steps:
  - id: a
    action: search
    params: {query: propofol}
  - id: b
    action: search
    params: {query: propofol}
"#;

fn slow(delay: Duration) -> StaticProvider {
    StaticProvider::new("pubmed")
        .with_search("propofol", vec![article("1", "Propofol sedation", 2020)])
        .with_delay(delay)
}

#[tokio::test]
async fn test_step_running_past_deadline_is_cut_short() {
    let options = ExecutionOptions::default().with_timeout(Duration::from_millis(50));

    let result = run_yaml_with_options(YAML, pubmed(slow(Duration::from_secs(5))), options).await;

    assert_status(&result, ExecutionStatus::Failed);
    assert_step_failed(&result, "a", DEADLINE_EXCEEDED);
    assert_step_failed(&result, "b", DEADLINE_EXCEEDED);
    assert!(result.duration_ms < 5000, "{}", result.summary());
}

#[tokio::test]
async fn test_generous_deadline_does_not_interfere() {
    let options = ExecutionOptions::default().with_timeout(Duration::from_secs(30));

    let result = run_yaml_with_options(YAML, pubmed(slow(Duration::from_millis(10))), options).await;

    assert_status(&result, ExecutionStatus::Completed);
    assert_step_ok(&result, "a", 1);
    assert_step_ok(&result, "b", 1);
}

#[tokio::test]
async fn test_provider_timeout_is_a_step_failure() {
    let provider = slow(Duration::from_secs(5)).with_timeout(Duration::from_millis(20));

    let result = run_yaml(YAML, pubmed(provider)).await;

    assert_status(&result, ExecutionStatus::Failed);
    assert_step_failed(&result, "a", "timed out after 20 ms");
}
