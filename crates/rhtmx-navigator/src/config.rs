// File: src/config.rs
// Purpose: Navigator settings, read from the [navigator] table of rhtmx.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Client runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// Prefix prepended to stylesheet chunk names
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,

    /// Id of the element opening the server-rendered head block
    #[serde(default = "default_head_start_marker")]
    pub head_start_marker: String,

    /// Id of the element closing the server-rendered head block
    #[serde(default = "default_head_end_marker")]
    pub head_end_marker: String,

    /// Redirects followed in a row before rendering an error page
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Link attribute that keeps the scroll position on navigation
    #[serde(default = "default_noscroll_attribute")]
    pub noscroll_attribute: String,

    /// Overrides the base path embedded by the server
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_asset_prefix() -> String {
    "client/".to_string()
}

fn default_head_start_marker() -> String {
    "sapper-head-start".to_string()
}

fn default_head_end_marker() -> String {
    "sapper-head-end".to_string()
}

fn default_max_redirects() -> usize {
    5
}

fn default_noscroll_attribute() -> String {
    "sapper-noscroll".to_string()
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            asset_prefix: default_asset_prefix(),
            head_start_marker: default_head_start_marker(),
            head_end_marker: default_head_end_marker(),
            max_redirects: default_max_redirects(),
            noscroll_attribute: default_noscroll_attribute(),
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    navigator: Option<NavigatorConfig>,
}

impl NavigatorConfig {
    /// Reads the `[navigator]` table of a TOML document; defaults when absent
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).context("Failed to parse navigator configuration")?;
        Ok(file.navigator.unwrap_or_default())
    }

    /// Loads configuration from a file, falling back to defaults when it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
    }
}
