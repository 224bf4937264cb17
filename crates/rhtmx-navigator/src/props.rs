// File: src/props.rs
// Purpose: Page descriptor, props tree and branch types shared across navigation

use crate::error::PageError;
use crate::query::Query;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Route parameters extracted from a path match
pub type Params = HashMap<String, String>;

/// Resolved branch: one entry per route depth, `None` where nothing renders
pub type Branch = Vec<Option<Arc<BranchEntry>>>;

/// Handle to a component constructor produced by the bundler
///
/// The navigator never looks inside; it only moves the handle from the loader
/// to the renderer. Equality is identity of the underlying constructor.
#[derive(Clone)]
pub struct ComponentRef {
    name: Arc<str>,
    constructor: Arc<dyn Any + Send + Sync>,
}

impl ComponentRef {
    pub fn new<T>(name: impl Into<Arc<str>>, constructor: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(constructor),
        }
    }

    /// Component identified only by name
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, ())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.constructor.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.constructor, &other.constructor)
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.name).finish()
    }
}

/// What a page is: path, decoded query and route params
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub path: String,
    pub query: Query,
    pub params: Params,
}

/// Scroll offset of the viewport
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

impl ScrollPosition {
    pub const ORIGIN: ScrollPosition = ScrollPosition { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Client-side redirect requested by a preload function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub status_code: u16,
    pub location: String,
}

/// One rendered level of the props tree
#[derive(Debug, Clone, Default)]
pub struct Level {
    /// `None` for the root layout, which the renderer owns
    pub component: Option<ComponentRef>,
    pub props: JsonValue,
}

/// Resolved route segment kept between navigations for reuse
#[derive(Debug)]
pub struct BranchEntry {
    pub component: ComponentRef,
    pub props: JsonValue,
    /// Literal path text at this depth, the reuse key
    pub segment: Option<String>,
}

impl BranchEntry {
    pub fn level(&self) -> Level {
        Level {
            component: Some(self.component.clone()),
            props: self.props.clone(),
        }
    }
}

/// Everything the root component receives
#[derive(Debug, Clone)]
pub struct Props {
    pub error: Option<PageError>,
    pub status: u16,
    pub session: JsonValue,
    /// Path pieces, index-aligned to route depth
    pub segments: Vec<String>,
    /// `level{N}` entries; 0 is the root layout, rendering depths count from 1
    pub levels: BTreeMap<usize, Level>,
}

impl Default for Props {
    fn default() -> Self {
        Self {
            error: None,
            status: 200,
            session: JsonValue::Null,
            segments: Vec::new(),
            levels: BTreeMap::new(),
        }
    }
}

impl Props {
    pub fn level(&self, n: usize) -> Option<&Level> {
        self.levels.get(&n)
    }
}
