use crate::helpers::*;
use litpipe::core::ExecutionStatus;
use litpipe::provider::StaticProvider;
use litpipe::validation::{config_hash, parse_document, validate_and_fix, Severity};

fn provider() -> StaticProvider {
    StaticProvider::new("pubmed")
        .with_search(
            "propofol",
            vec![article("1", "Propofol sedation", 2020), article("2", "Propofol infusion", 2019)],
        )
        .with_search("ketamine", vec![article("3", "Ketamine analgesia", 2021)])
}

#[tokio::test]
async fn test_messy_document_is_repaired_and_runs() {
    let yaml = r#"
name: repaired
steps:
  - id: s1
    action: lookup
    params:
      query: propofol
  - action: serch
    params:
      query: ketamine
  - id: merged
    action: combine
    inputs: [s1, step_2, zzz]
    on_error: ABORT
output:
  ranking: newest
  limit: 0
"#;

    let result = run_yaml(yaml, pubmed(provider())).await;

    let fixes = &result.validation;
    assert_eq!(fixes.fix_for("steps[0].action").unwrap().corrected, "search");
    assert_eq!(fixes.fix_for("steps[1].id").unwrap().corrected, "step_2");
    assert_eq!(fixes.fix_for("steps[1].action").unwrap().corrected, "search");
    assert_eq!(fixes.fix_for("steps[2].action").unwrap().corrected, "merge");
    assert_eq!(fixes.fix_for("steps[2].inputs[2]").unwrap().corrected, "");
    assert_eq!(fixes.fix_for("steps[2].on_error").unwrap().corrected, "abort");
    assert_eq!(fixes.fix_for("output.ranking").unwrap().corrected, "recency");
    assert_eq!(fixes.fix_for("output.limit").unwrap().severity, Severity::Info);

    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.execution_order(), vec!["s1", "step_2", "merged"]);
    assert_step_ok(&result, "merged", 3);
    assert_eq!(result.run.articles.len(), 3);
}

#[test]
fn test_unknown_action_is_rejected() {
    let result = parse_document(
        r#"
name: broken
steps:
  - id: s1
    action: teleport
"#,
    );

    assert!(!result.valid);
    assert!(result.config.is_none());
    assert!(result.errors[0].contains("teleport"));
}

#[test]
fn test_non_mapping_document_is_rejected() {
    let result = parse_document("- just\n- a\n- list\n");
    assert!(!result.valid);
    assert!(result.errors[0].starts_with("document"));
}

#[tokio::test]
async fn test_json_document_with_single_step_mapping() {
    let json = r#"{"name": "json", "steps": {"id": "only", "action": "search", "params": {"query": "ketamine"}}}"#;

    let result = run_yaml(json, pubmed(provider())).await;

    assert!(result.validation.fix_for("steps").is_some());
    assert_status(&result, ExecutionStatus::Completed);
    assert_eq!(result.final_pmids(), vec!["3"]);
}

#[test]
fn test_corrected_config_is_stable() {
    let (first, config) = validated(
        r#"
name: ""
steps:
  - action: find
    params: {query: propofol}
  - id: m
    action: dedup
    inputs: step_1
output:
  format: JSON
"#,
    );
    assert!(!first.fixes.is_empty());

    let second = validate_and_fix(&config);
    assert!(second.fixes.is_empty(), "second pass fixed: {:?}", second.fixes);
    assert_eq!(second.config.as_ref(), Some(&config));
    assert_eq!(config_hash(&config), config_hash(second.config.as_ref().unwrap()));
    assert_eq!(config.output.format, "json");
}
