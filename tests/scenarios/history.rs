use crate::helpers::*;
use litpipe::core::ExecutionStatus;
use litpipe::persistence::{record_run, InMemoryRunStore, RunStore};
use litpipe::provider::StaticProvider;
use litpipe::validation::config_hash;

const YAML: &str = r#"
name: weekly delirium
steps:
  - id: s
    action: search
    params: {query: delirium}
"#;

#[tokio::test]
async fn test_repeated_runs_report_new_records() {
    let store = InMemoryRunStore::new();
    let (_, config) = validated(YAML);
    let hash = config_hash(&config);

    let week_one = StaticProvider::new("pubmed").with_search(
        "delirium",
        vec![article("1", "Delirium A", 2020), article("2", "Delirium B", 2021)],
    );
    let first = run_yaml(YAML, pubmed(week_one)).await;
    let first_record = record_run(&store, &first.run, &hash).await.unwrap();
    assert_eq!(first_record.new_identifiers.len(), 2);
    assert_eq!(first_record.status, ExecutionStatus::Completed);

    let week_two = StaticProvider::new("pubmed").with_search(
        "delirium",
        vec![
            article("3", "Delirium C", 2024),
            article("1", "Delirium A", 2020),
            article("2", "Delirium B", 2021),
        ],
    );
    let second = run_yaml(YAML, pubmed(week_two)).await;
    let second_record = record_run(&store, &second.run, &hash).await.unwrap();

    assert_eq!(second_record.article_count, 3);
    assert_eq!(second_record.new_identifiers, vec!["pmid:3"]);
    assert_eq!(second_record.config_hash, first_record.config_hash);

    let runs = store.list_runs("weekly delirium").await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, second.run.run_id);
}
