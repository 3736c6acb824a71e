//! Configuration file loading.
//!
//! YAML or JSON, chosen by extension. Every field is optional:
//!
//! ```yaml
//! dim: 128
//! policy:
//!   accept_threshold: 0.7
//!   version: v1
//!   rationale: uncalibrated
//! on_duplicate: reject      # or: replace
//! unique_profile_fields: true
//! store: /var/lib/facegate/faces.jsonl
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use facegate_facematch::RegistryConfig;
use serde::Deserialize;

pub const DEFAULT_STORE_FILE: &str = "facegate.jsonl";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub registry: RegistryConfig,

    /// Path of the JSON-lines store file.
    #[serde(default)]
    pub store: Option<PathBuf>,
}

impl Config {
    /// Store path: the override if given, else the configured one, else
    /// [`DEFAULT_STORE_FILE`] in the working directory.
    pub fn store_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.store.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
    }
}

/// Loads a config file, or returns defaults when `path` is `None`.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let data = std::fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let cfg: Config = match ext {
        "yaml" | "yml" => serde_yaml::from_slice(&data)
            .with_context(|| format!("parsing {}", path.display()))?,
        "json" => serde_json::from_slice(&data)
            .with_context(|| format!("parsing {}", path.display()))?,
        _ => bail!(
            "unsupported config extension {:?} (want .yaml, .yml or .json)",
            ext
        ),
    };
    Ok(cfg)
}
