// File: src/loader.rs
// Purpose: Materialize components from their descriptors, injecting stylesheets once

use crate::error::{NavigationError, Result};
use crate::host::Document;
use crate::manifest::{ComponentDescriptor, Manifest, Module};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, trace};

type Slots<K, V> = RwLock<HashMap<K, Arc<OnceCell<V>>>>;

/// Loads components and keeps them for the life of the loader
///
/// Concurrent loads of one component, or of one stylesheet href, share a
/// single in-flight load. A failed load leaves its slot empty for a retry.
/// A stylesheet link the server already rendered counts as loaded.
pub struct ComponentLoader {
    manifest: Arc<Manifest>,
    document: Arc<dyn Document>,
    asset_prefix: String,
    modules: Slots<usize, Module>,
    linked: Slots<String, ()>,
}

impl ComponentLoader {
    pub fn new(
        manifest: Arc<Manifest>,
        document: Arc<dyn Document>,
        asset_prefix: impl Into<String>,
    ) -> Self {
        Self {
            manifest,
            document,
            asset_prefix: asset_prefix.into(),
            modules: RwLock::new(HashMap::new()),
            linked: RwLock::new(HashMap::new()),
        }
    }

    /// Loads the component at `index` of the manifest, cached after the first success
    pub async fn load(&self, index: usize) -> Result<Module> {
        let descriptor = self
            .manifest
            .components
            .get(index)
            .ok_or(NavigationError::UnknownComponent(index))?;

        let slot = slot(&self.modules, index).await;
        if let Some(module) = slot.get() {
            trace!(index, "Component served from cache");
            return Ok(module.clone());
        }

        let module = slot
            .get_or_try_init(|| async {
                let module = self.load_descriptor(index, descriptor).await?;
                debug!(index, component = module.component.name(), "Component loaded");
                Ok::<_, NavigationError>(module)
            })
            .await?;

        Ok(module.clone())
    }

    /// Loads code and stylesheets concurrently; any failure fails the load
    pub async fn load_descriptor(
        &self,
        index: usize,
        descriptor: &ComponentDescriptor,
    ) -> Result<Module> {
        let code = async {
            (descriptor.js)()
                .await
                .map_err(|source| NavigationError::ComponentLoad { index, source })
        };
        let styles = try_join_all(descriptor.css.iter().map(|chunk| self.load_css(chunk)));

        let (module, _) = futures::try_join!(code, styles)?;
        Ok(module)
    }

    async fn load_css(&self, chunk: &str) -> Result<()> {
        let href = format!("{}{}", self.asset_prefix, chunk);

        if self.document.has_stylesheet(&href) {
            return Ok(());
        }

        slot(&self.linked, href.clone())
            .await
            .get_or_try_init(|| async {
                debug!(href = %href, "Injecting stylesheet");
                self.document
                    .load_stylesheet(&href)
                    .await
                    .map_err(|source| NavigationError::Stylesheet {
                        href: href.clone(),
                        source,
                    })
            })
            .await?;

        Ok(())
    }

    /// Whether the component at `index` is already cached
    pub async fn is_loaded(&self, index: usize) -> bool {
        self.modules
            .read()
            .await
            .get(&index)
            .is_some_and(|slot| slot.initialized())
    }
}

async fn slot<K: Eq + Hash, V>(slots: &Slots<K, V>, key: K) -> Arc<OnceCell<V>> {
    if let Some(slot) = slots.read().await.get(&key) {
        return Arc::clone(slot);
    }
    Arc::clone(slots.write().await.entry(key).or_default())
}

impl std::fmt::Debug for ComponentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentLoader")
            .field("asset_prefix", &self.asset_prefix)
            .finish_non_exhaustive()
    }
}
