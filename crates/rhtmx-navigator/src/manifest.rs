// File: src/manifest.rs
// Purpose: Compiled route table, component descriptors and preload function types

use crate::context::PreloadContext;
use crate::props::{ComponentRef, Page, Params};
use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Preload step attached to a component: `(context, page, session) -> data`
pub type PreloadFn = Arc<
    dyn Fn(PreloadContext, Page, JsonValue) -> BoxFuture<'static, anyhow::Result<JsonValue>>
        + Send
        + Sync,
>;

/// Extracts route params from a pattern match
pub type ParamsFn = Arc<dyn Fn(&RouteMatch) -> Params + Send + Sync>;

/// Async code loader produced by the bundler
pub type ModuleLoader = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Module>> + Send + Sync>;

/// Wraps an async closure as a [`PreloadFn`]
///
/// # Examples
///
/// ```
/// use rhtmx_navigator::manifest::preload_fn;
/// use serde_json::json;
///
/// let preload = preload_fn(|_ctx, page, _session| async move {
///     Ok::<_, anyhow::Error>(json!({ "id": page.params.get("id") }))
/// });
/// ```
pub fn preload_fn<F, Fut>(f: F) -> PreloadFn
where
    F: Fn(PreloadContext, Page, JsonValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<JsonValue>> + Send + 'static,
{
    Arc::new(move |ctx: PreloadContext, page: Page, session: JsonValue| {
        f(ctx, page, session).boxed()
    })
}

/// What a component's code chunk exports
#[derive(Clone)]
pub struct Module {
    pub component: ComponentRef,
    pub preload: Option<PreloadFn>,
}

impl Module {
    pub fn new(component: ComponentRef) -> Self {
        Self {
            component,
            preload: None,
        }
    }

    pub fn with_preload(mut self, preload: PreloadFn) -> Self {
        self.preload = Some(preload);
        self
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("component", &self.component)
            .field("has_preload", &self.preload.is_some())
            .finish()
    }
}

/// Stylesheet chunks as emitted by the build: older manifests carry a single
/// string, current ones a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CssChunks {
    Single(String),
    List(Vec<String>),
}

impl CssChunks {
    pub fn into_list(self) -> Vec<String> {
        match self {
            CssChunks::Single(chunk) if chunk.is_empty() => Vec::new(),
            CssChunks::Single(chunk) => vec![chunk],
            CssChunks::List(chunks) => chunks,
        }
    }
}

impl From<&str> for CssChunks {
    fn from(chunk: &str) -> Self {
        CssChunks::Single(chunk.to_string())
    }
}

impl From<String> for CssChunks {
    fn from(chunk: String) -> Self {
        CssChunks::Single(chunk)
    }
}

impl From<Vec<String>> for CssChunks {
    fn from(chunks: Vec<String>) -> Self {
        CssChunks::List(chunks)
    }
}

impl From<Vec<&str>> for CssChunks {
    fn from(chunks: Vec<&str>) -> Self {
        CssChunks::List(chunks.into_iter().map(String::from).collect())
    }
}

/// Loadable component: code plus the stylesheets it needs
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub js: ModuleLoader,
    /// Always a list; single-chunk manifests are normalized on construction
    pub css: Vec<String>,
}

impl ComponentDescriptor {
    pub fn new<F, Fut>(js: F, css: impl Into<CssChunks>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Module>> + Send + 'static,
    {
        Self {
            js: Arc::new(move || js().boxed()),
            css: css.into().into_list(),
        }
    }

    /// Descriptor for a module that is already in memory
    pub fn ready(module: Module) -> Self {
        Self::new(
            move || {
                let module = module.clone();
                async move { Ok::<_, anyhow::Error>(module) }
            },
            Vec::<String>::new(),
        )
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("css", &self.css)
            .finish_non_exhaustive()
    }
}

/// Capture groups of a successful pattern match, index 0 is the whole match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    captures: Vec<Option<String>>,
}

impl RouteMatch {
    pub fn new(captures: Vec<Option<String>>) -> Self {
        Self { captures }
    }

    fn from_captures(captures: regex::Captures<'_>) -> Self {
        Self {
            captures: captures
                .iter()
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.captures.get(index).and_then(|group| group.as_deref())
    }

    /// Capture group percent-decoded, empty when absent
    pub fn decoded(&self, index: usize) -> String {
        let raw = self.get(index).unwrap_or("");
        urlencoding::decode(raw)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw.to_string())
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// One route depth: which component renders and how its params are read
#[derive(Clone)]
pub struct Part {
    /// Index into [`Manifest::components`]
    pub component: usize,
    pub params: Option<ParamsFn>,
}

impl Part {
    pub fn new(component: usize) -> Self {
        Self {
            component,
            params: None,
        }
    }

    pub fn with_params<F>(mut self, params: F) -> Self
    where
        F: Fn(&RouteMatch) -> Params + Send + Sync + 'static,
    {
        self.params = Some(Arc::new(params));
        self
    }

    pub fn extract_params(&self, route_match: &RouteMatch) -> Params {
        self.params
            .as_ref()
            .map(|params| params(route_match))
            .unwrap_or_default()
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("component", &self.component)
            .field("has_params", &self.params.is_some())
            .finish()
    }
}

/// Compiled route definition
#[derive(Debug, Clone)]
pub struct RouteDef {
    pub pattern: Regex,
    /// One entry per path depth; `None` where no component renders
    pub parts: Vec<Option<Part>>,
}

impl RouteDef {
    pub fn new(pattern: &str, parts: Vec<Option<Part>>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            parts,
        })
    }

    pub fn exec(&self, path: &str) -> Option<RouteMatch> {
        self.pattern.captures(path).map(RouteMatch::from_captures)
    }

    /// Params of the whole match, read by the leaf part
    pub fn leaf_params(&self, route_match: &RouteMatch) -> Params {
        self.parts
            .last()
            .and_then(Option::as_ref)
            .map(|part| part.extract_params(route_match))
            .unwrap_or_default()
    }
}

/// Everything the route compiler and bundler hand to the client runtime
#[derive(Clone)]
pub struct Manifest {
    pub routes: Vec<Arc<RouteDef>>,
    /// Server-only paths that must never be handled client-side
    pub ignore: Vec<Regex>,
    pub components: Vec<ComponentDescriptor>,
    /// Preload of the root layout (`level0`)
    pub root_preload: Option<PreloadFn>,
    pub error_component: ComponentRef,
}

impl Manifest {
    pub fn new(error_component: ComponentRef) -> Self {
        Self {
            routes: Vec::new(),
            ignore: Vec::new(),
            components: Vec::new(),
            root_preload: None,
            error_component,
        }
    }

    pub fn with_route(mut self, route: RouteDef) -> Self {
        self.routes.push(Arc::new(route));
        self
    }

    pub fn with_ignore(mut self, pattern: Regex) -> Self {
        self.ignore.push(pattern);
        self
    }

    pub fn with_component(mut self, component: ComponentDescriptor) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_root_preload(mut self, preload: PreloadFn) -> Self {
        self.root_preload = Some(preload);
        self
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|pattern| pattern.is_match(path))
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("routes", &self.routes.len())
            .field("ignore", &self.ignore.len())
            .field("components", &self.components.len())
            .field("has_root_preload", &self.root_preload.is_some())
            .finish()
    }
}
