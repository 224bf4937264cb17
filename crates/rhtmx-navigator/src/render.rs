// File: src/render.rs
// Purpose: Apply a resolved navigation to the mounted root component

use crate::config::NavigatorConfig;
use crate::error::{NavigationError, Result};
use crate::host::{Document, MountedRoot, Renderer};
use crate::preload::Preloader;
use crate::props::{Level, Page, Props};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the mounted root and the page/preloading observers
pub struct RenderCommitter {
    renderer: Arc<dyn Renderer>,
    document: Arc<dyn Document>,
    head_start_marker: String,
    head_end_marker: String,
    root: Mutex<Option<Box<dyn MountedRoot>>>,
    page: watch::Sender<Page>,
    preloading: watch::Sender<bool>,
}

impl RenderCommitter {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        document: Arc<dyn Document>,
        config: &NavigatorConfig,
    ) -> Self {
        Self {
            renderer,
            document,
            head_start_marker: config.head_start_marker.clone(),
            head_end_marker: config.head_end_marker.clone(),
            root: Mutex::new(None),
            page: watch::channel(Page::default()).0,
            preloading: watch::channel(false).0,
        }
    }

    fn root(&self) -> MutexGuard<'_, Option<Box<dyn MountedRoot>>> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_mounted(&self) -> bool {
        self.root().is_some()
    }

    pub fn set_preloading(&self, preloading: bool) {
        self.preloading.send_replace(preloading);
    }

    pub fn page(&self) -> watch::Receiver<Page> {
        self.page.subscribe()
    }

    pub fn preloading(&self) -> watch::Receiver<bool> {
        self.preloading.subscribe()
    }

    /// Publishes `page` and hands `props` to the root
    ///
    /// The first commit waits for the root layout preload, clears the
    /// server-rendered head block and mounts with hydration. Later commits
    /// update the mounted root in place.
    pub async fn commit(&self, page: Page, mut props: Props, preloader: &Preloader) -> Result<()> {
        self.page.send_replace(page);
        self.preloading.send_replace(false);

        if let Some(root) = self.root().as_mut() {
            debug!(status = props.status, "Updating mounted root");
            root.set(props);
            return Ok(());
        }

        let root_props = match preloader.root_props().await {
            Ok(root_props) => root_props,
            Err(err) => {
                warn!(error = %err, "Root layout preload failed");
                props.status = 500;
                props.error = Some(err);
                serde_json::Value::Null
            }
        };
        props.levels.insert(
            0,
            Level {
                component: None,
                props: root_props,
            },
        );

        let mut root = self.root();
        if let Some(root) = root.as_mut() {
            root.set(props);
            return Ok(());
        }

        if !self
            .document
            .remove_between(&self.head_start_marker, &self.head_end_marker)
        {
            debug!("No server-rendered head block to remove");
        }

        let mounted = self
            .renderer
            .mount(props, true)
            .map_err(NavigationError::Render)?;
        *root = Some(mounted);
        info!("Root component mounted");
        Ok(())
    }
}

impl std::fmt::Debug for RenderCommitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCommitter")
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}
