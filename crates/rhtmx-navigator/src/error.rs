// File: src/error.rs
// Purpose: Navigation errors and the error value rendered by error pages

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias for navigator operations
pub type Result<T> = std::result::Result<T, NavigationError>;

/// Errors raised while resolving or committing a navigation
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Two preload functions asked for different redirects in one pass
    #[error("Conflicting redirects: {existing_status} {existing_location} vs {status} {location}")]
    ConflictingRedirects {
        existing_status: u16,
        existing_location: String,
        status: u16,
        location: String,
    },

    #[error("Unknown component index: {0}")]
    UnknownComponent(usize),

    #[error("Failed to load component {index}")]
    ComponentLoad {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load stylesheet {href}")]
    Stylesheet {
        href: String,
        #[source]
        source: anyhow::Error,
    },

    /// Redirect chain exceeded the configured limit
    #[error("Too many redirects (limit {limit}), last location: {location}")]
    TooManyRedirects { limit: usize, location: String },

    #[error("Invalid URL {href}: {source}")]
    InvalidUrl {
        href: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Render failed: {0}")]
    Render(#[source] anyhow::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Error value handed to error pages through the props tree
///
/// Preload functions report errors either as plain messages or as full
/// errors; both end up here so the renderer only deals with one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub message: String,
}

impl PageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&str> for PageError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for PageError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for PageError {
    fn from(err: anyhow::Error) -> Self {
        // Alternate formatting keeps the whole cause chain
        Self::new(format!("{:#}", err))
    }
}

impl From<&NavigationError> for PageError {
    fn from(err: &NavigationError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<NavigationError> for PageError {
    fn from(err: NavigationError) -> Self {
        Self::from(&err)
    }
}
