//! Node configuration directory: presence checks and first-time setup.
//!
//! `cardano-node` reads its configuration, genesis files and topology from
//! `<base_local>/config`, bind-mounted into the container. [`init`]
//! downloads the published mainnet files and patches the node's logging
//! and Prometheus settings; [`check_config_files`] guards `start`.

mod patch;

use std::path::Path;

use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::runtime::constants::cardano;
use crate::runtime::options::NodekeeperOptions;

pub use patch::{node_log_path, patch_node_config};

/// Fail unless the config directory and every node config file exist.
pub fn check_config_files(options: &NodekeeperOptions) -> NodekeeperResult<()> {
    let config_dir = options.cardano.config_dir();
    if !config_dir.is_dir() {
        return Err(NodekeeperError::Config(format!(
            "cardano configuration directory does not exist: {} (run `nodekeeper init`)",
            config_dir.display()
        )));
    }

    for (_, local) in cardano::CONFIG_FILES {
        let path = config_dir.join(local);
        if !path.is_file() {
            return Err(NodekeeperError::Config(format!(
                "file {} not found in config dir",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Create the node directories, fetch missing config files and patch `config.json`.
pub async fn init(options: &NodekeeperOptions) -> NodekeeperResult<()> {
    let config_dir = options.cardano.config_dir();
    create_dir(&config_dir)?;
    create_dir(&options.cardano.rt_view_dir())?;

    let base_url = options
        .cardano
        .latest_config
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            NodekeeperError::Config("cardano latest config URL not specified".into())
        })?;

    let client = reqwest::Client::new();
    for (remote, local) in cardano::CONFIG_FILES {
        let path = config_dir.join(local);
        if path.exists() {
            tracing::info!(path = %path.display(), "Found config file");
            continue;
        }
        download(&client, &config_url(base_url, remote), &path).await?;
    }

    update_node_config(&config_dir.join(cardano::NODE_CONFIG_FILE), options)
}

fn create_dir(path: &Path) -> NodekeeperResult<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        NodekeeperError::Config(format!("creating dir {}: {}", path.display(), e))
    })
}

/// `latest_config` is a prefix, so it normally ends with `/`.
fn config_url(base: &str, file: &str) -> String {
    format!("{}{}", base, file)
}

async fn download(client: &reqwest::Client, url: &str, path: &Path) -> NodekeeperResult<()> {
    tracing::info!(url, path = %path.display(), "Downloading config file");

    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    // Interrupted downloads must not leave a partial file behind
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        NodekeeperError::Config(format!("creating temp file in {}: {}", dir.display(), e))
    })?;
    std::io::Write::write_all(&mut tmp, &body)
        .map_err(|e| NodekeeperError::Config(format!("writing {}: {}", path.display(), e)))?;
    tmp.persist(path)
        .map_err(|e| NodekeeperError::Config(format!("writing {}: {}", path.display(), e)))?;

    Ok(())
}

/// Patch `config.json` in place. A missing file is left alone.
pub fn update_node_config(path: &Path, options: &NodekeeperOptions) -> NodekeeperResult<()> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Node config file missing, skipping patch");
        return Ok(());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        NodekeeperError::Config(format!("could not read {}: {}", path.display(), e))
    })?;
    let mut config: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        NodekeeperError::Config(format!("invalid JSON in {}: {}", path.display(), e))
    })?;

    patch_node_config(&mut config, options)?;

    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|e| NodekeeperError::Internal(format!("serializing node config: {}", e)))?;
    std::fs::write(path, rendered).map_err(|e| {
        NodekeeperError::Config(format!("writing to file {}: {}", path.display(), e))
    })?;

    tracing::info!(path = %path.display(), log_path = %node_log_path(options), "Node config updated");
    Ok(())
}
