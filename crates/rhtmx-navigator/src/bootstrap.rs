// File: src/bootstrap.rs
// Purpose: Data the server embeds in the initial page for the client runtime

use crate::error::PageError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Server-embedded bootstrap payload, consumed once at start-up
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialData {
    #[serde(default)]
    pub session: JsonValue,

    /// Mount point of the application, e.g. `/app`; empty for the root
    #[serde(default)]
    pub base_url: String,

    /// Preload results computed on the server: index 0 is the root layout,
    /// `i + 1` the i-th route depth
    #[serde(default)]
    pub preloaded: Vec<Option<JsonValue>>,

    #[serde(default)]
    pub store: Option<JsonValue>,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub error: Option<PageError>,
}

fn default_status() -> u16 {
    200
}

impl Default for InitialData {
    fn default() -> Self {
        Self {
            session: JsonValue::Null,
            base_url: String::new(),
            preloaded: Vec::new(),
            store: None,
            status: default_status(),
            error: None,
        }
    }
}

impl InitialData {
    /// Parses the JSON the server serialized into the page
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded bootstrap data")
    }

    /// Server preload result for a slot, `None` when absent or null
    pub fn preloaded_at(&self, index: usize) -> Option<&JsonValue> {
        self.preloaded
            .get(index)
            .and_then(Option::as_ref)
            .filter(|value| !value.is_null())
    }
}
