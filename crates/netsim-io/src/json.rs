//! Single-document JSON format: the whole network definition, or a result.

use anyhow::{Context, Result};
use netsim_core::{EvaluationResult, Network};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn to_json_string(network: &Network) -> Result<String> {
    serde_json::to_string_pretty(network).context("serializing network")
}

/// Parse a network document. The model is rebuilt through the builder, so a
/// document with dangling references is rejected as a whole.
pub fn from_json_str(text: &str) -> Result<Network> {
    serde_json::from_str(text).context("parsing network document")
}

pub fn export_json(network: &Network, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, to_json_string(network)?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "exported network");
    Ok(())
}

pub fn import_json(path: &Path) -> Result<Network> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let network = from_json_str(&text).with_context(|| format!("loading {}", path.display()))?;
    info!(
        path = %path.display(),
        buses = network.nodes().len(),
        components = network.components().len(),
        "imported network"
    );
    Ok(network)
}

/// Write the stored result of `network` as one JSON document.
pub fn export_result_json(network: &Network, path: &Path) -> Result<()> {
    let result: &EvaluationResult = network.result()?;
    let text = serde_json::to_string_pretty(result).context("serializing result")?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
