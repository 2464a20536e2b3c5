//! User defaults, read from `~/.netsim/config.toml`.
//!
//! ```toml
//! [power_flow]
//! method = "ac"
//! tolerance = 1e-8
//! max_iterations = 50
//!
//! [optimization]
//! lp_solver = "clarabel"
//! ```
//!
//! Missing sections and keys fall back to the library defaults. Command-line
//! flags override whatever is configured here.

use anyhow::{anyhow, bail, Context, Result};
use netsim_algo::{OptimizationOptions, PowerFlowOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetsimConfig {
    #[serde(default)]
    pub power_flow: PowerFlowOptions,
    #[serde(default)]
    pub optimization: OptimizationOptions,
}

/// Get the netsim home directory (defaults to ~/.netsim)
pub fn netsim_home() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| anyhow!("Cannot determine home directory"))
        .map(|h| h.join(".netsim"))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(netsim_home()?.join("config.toml"))
}

/// Load `explicit` when given (it must exist), else the default file when
/// present, else built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<NetsimConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file '{}' does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Ok(path) if path.exists() => path,
            _ => return Ok(NetsimConfig::default()),
        },
    };
    let contents =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config = parse_config(&contents).with_context(|| format!("parsing {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<NetsimConfig> {
    Ok(toml::from_str(contents)?)
}
