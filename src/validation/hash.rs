//! Content hash of a config, for cheap change detection

use crate::core::PipelineConfig;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Short, deterministic hash over the parts of a config that change what
/// runs: steps' id/action/params/inputs plus template and its params.
/// Name, on_error and output policy do not contribute.
pub fn config_hash(config: &PipelineConfig) -> String {
    let steps: Vec<serde_json::Value> = config
        .steps
        .iter()
        .map(|step| {
            json!({
                "id": step.id,
                "action": step.action,
                "params": step.params,
                "inputs": step.inputs,
            })
        })
        .collect();

    // serde_json maps are sorted by key, so this text is canonical
    let canonical = json!({
        "steps": steps,
        "template": config.template,
        "template_params": config.template_params,
    })
    .to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
