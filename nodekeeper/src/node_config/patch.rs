//! Logging and metrics patches applied to the node's `config.json`.

use serde_json::{Value, json};

use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::runtime::options::NodekeeperOptions;

const FILE_SCRIBE: &str = "FileSK";

/// Path inside the container the node writes its own log file to.
pub fn node_log_path(options: &NodekeeperOptions) -> String {
    format!(
        "{}/log/cardano-{}-{}.log",
        options.cardano.base_container,
        options.node.server_name,
        options.node.node_type()
    )
}

/// Apply every patch to `config`. Applying twice changes nothing.
pub fn patch_node_config(config: &mut Value, options: &NodekeeperOptions) -> NodekeeperResult<()> {
    let object = config.as_object_mut().ok_or_else(|| {
        NodekeeperError::Config("node config.json is not a JSON object".into())
    })?;
    let log_path = node_log_path(options);

    let default_scribes = scribe_entries(object.get("defaultScribes"));
    let has_file_default = default_scribes
        .iter()
        .any(|entry| entry.as_array().is_some_and(|parts| parts.iter().any(|p| p == FILE_SCRIBE)));
    if !has_file_default {
        let mut patched: Vec<Value> = default_scribes.into_iter().take(1).collect();
        patched.push(json!([FILE_SCRIBE, log_path]));
        object.insert("defaultScribes".into(), Value::Array(patched));
    }

    let setup_scribes = scribe_entries(object.get("setupScribes"));
    let has_file_setup = setup_scribes
        .iter()
        .any(|entry| entry.to_string().contains(FILE_SCRIBE));
    if !has_file_setup {
        let mut patched: Vec<Value> = setup_scribes.into_iter().take(1).collect();
        patched.push(json!({
            "scFormat": "ScText",
            "scKind": FILE_SCRIBE,
            "scName": log_path,
            "scRotation": null,
        }));
        object.insert("setupScribes".into(), Value::Array(patched));
    }

    let prometheus = &options.cardano.prometheus;
    object.insert(
        "hasPrometheus".into(),
        json!([prometheus.address, prometheus.port]),
    );

    Ok(())
}

fn scribe_entries(value: Option<&Value>) -> Vec<Value> {
    value
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
