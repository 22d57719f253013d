mod deadline;
mod history;
mod merge_dedup;
mod on_error;
mod output_limit;
mod ranking;
mod templates;
mod validator_repairs;
