// File: src/host.rs
// Purpose: Contracts for the browser-side collaborators the navigator drives

use crate::props::{Props, ScrollPosition};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// State stored with every history entry the navigator writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    pub id: u64,
}

/// Session history and location
pub trait History: Send + Sync {
    /// Current document location
    fn location(&self) -> Url;

    fn push_state(&self, state: HistoryState, href: &str);

    fn replace_state(&self, state: HistoryState, href: &str);

    /// Full page load, leaving the client-side runtime
    fn assign(&self, href: &str);
}

/// Document access needed for stylesheets, focus and deep links
#[async_trait]
pub trait Document: Send + Sync {
    /// Whether a `<link rel="stylesheet">` with this href is present
    fn has_stylesheet(&self, href: &str) -> bool;

    /// Appends a stylesheet link and resolves once it has loaded
    async fn load_stylesheet(&self, href: &str) -> Result<()>;

    /// Removes the two marker elements and everything between them.
    /// Returns false when either marker is missing.
    fn remove_between(&self, start_id: &str, end_id: &str) -> bool;

    fn blur_active_element(&self);

    /// Viewport-relative top offset of the element with this id
    fn element_top(&self, id: &str) -> Option<f64>;
}

pub trait Viewport: Send + Sync {
    fn scroll_position(&self) -> ScrollPosition;

    fn scroll_to(&self, position: ScrollPosition);
}

/// Request issued by a preload function through its context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<JsonValue> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Network access handed to preload functions
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// A mounted root component
pub trait MountedRoot: Send {
    /// Applies props in one update. The root layout level is only part of
    /// the props given at mount.
    fn set(&mut self, props: Props);
}

/// Instantiates the root component against the mount target
pub trait Renderer: Send + Sync {
    fn mount(&self, props: Props, hydrate: bool) -> Result<Box<dyn MountedRoot>>;
}

/// Bundle of host collaborators
#[derive(Clone)]
pub struct Host {
    pub history: Arc<dyn History>,
    pub document: Arc<dyn Document>,
    pub viewport: Arc<dyn Viewport>,
    pub fetcher: Arc<dyn Fetcher>,
    pub renderer: Arc<dyn Renderer>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
