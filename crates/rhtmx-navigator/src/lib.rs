//! # RHTMX Navigator - Client-side navigation and hydration
//!
//! This crate takes over a server-rendered RHTMX page and drives subsequent
//! navigations without full page loads.
//!
//! ## Features
//!
//! - **Route Matching**: First-match regex routes with per-depth components
//! - **Branch Reuse**: Unchanged path segments keep their resolved data
//! - **Concurrent Preloading**: Every route depth preloads at the same time
//! - **Stale Result Protection**: Only the latest navigation may render
//! - **Scroll Restoration**: Positions remembered per history entry
//!
//! ## Example
//!
//! ```rust,ignore
//! use rhtmx_navigator::{GotoOptions, InitialData, Navigator, NavigatorConfig};
//! use std::sync::Arc;
//!
//! async fn boot(manifest: rhtmx_navigator::Manifest, host: rhtmx_navigator::Host, data: &str) -> anyhow::Result<()> {
//!     let config = NavigatorConfig::load("rhtmx.toml")?;
//!     let navigator = Arc::new(Navigator::new(config, manifest, host, InitialData::from_json(data)?));
//!
//!     navigator.watch_session();
//!     navigator.start().await?;
//!     navigator.goto("/blog/hello-world", GotoOptions::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod loader;
pub mod manifest;
pub mod matcher;
pub mod navigator;
pub mod preload;
pub mod props;
pub mod query;
pub mod render;
pub mod session;

pub use bootstrap::InitialData;
pub use config::NavigatorConfig;
pub use context::PreloadContext;
pub use error::{NavigationError, PageError, Result};
pub use host::{
    Document, FetchRequest, FetchResponse, Fetcher, History, HistoryState, Host, MountedRoot,
    Renderer, Viewport,
};
pub use loader::ComponentLoader;
pub use manifest::{preload_fn, ComponentDescriptor, CssChunks, Manifest, Module, Part, RouteDef, RouteMatch};
pub use matcher::{select_route, select_target, Target, Unroutable};
pub use navigator::{
    ClickAction, GotoOptions, LinkClick, LinkNavigation, MouseButton, NavigationOutcome, Navigator,
    PendingResolution,
};
pub use preload::{AmbientState, HydratedTarget, Preloader};
pub use props::{Branch, BranchEntry, ComponentRef, Level, Page, Params, Props, Redirect, ScrollPosition};
pub use query::{extract_query, Query, QueryValue};
pub use render::RenderCommitter;
pub use session::SessionStore;
