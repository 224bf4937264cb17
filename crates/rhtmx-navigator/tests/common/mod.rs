// Shared fake host and blog fixture for navigator integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use rhtmx_navigator::{
    preload_fn, ComponentDescriptor, ComponentRef, Document, FetchRequest, FetchResponse, Fetcher,
    History, HistoryState, Host, InitialData, Manifest, Module, MountedRoot, Navigator,
    NavigatorConfig, Params, Part, Props, Renderer, RouteDef, ScrollPosition, Viewport,
};
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

pub const ORIGIN: &str = "https://blog.example";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

// ============================================================================
// Call log
// ============================================================================

/// Records preload and component-load calls in order
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ============================================================================
// Fake host
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOp {
    Push,
    Replace,
}

pub struct FakeHistory {
    location: Mutex<Url>,
    pub entries: Mutex<Vec<(HistoryOp, HistoryState, String)>>,
    pub assigned: Mutex<Vec<String>>,
}

impl FakeHistory {
    pub fn new(location: Url) -> Self {
        Self {
            location: Mutex::new(location),
            entries: Mutex::new(Vec::new()),
            assigned: Mutex::new(Vec::new()),
        }
    }

    /// Moves the location without recording an entry, as back/forward does
    pub fn set_location(&self, path: &str) {
        *self.location.lock().unwrap() = url(path);
    }

    pub fn last_entry(&self) -> Option<(HistoryOp, HistoryState, String)> {
        self.entries.lock().unwrap().last().cloned()
    }

    fn record(&self, op: HistoryOp, state: HistoryState, href: &str) {
        let next = self.location.lock().unwrap().join(href).unwrap();
        *self.location.lock().unwrap() = next.clone();
        self.entries
            .lock()
            .unwrap()
            .push((op, state, next.to_string()));
    }
}

impl History for FakeHistory {
    fn location(&self) -> Url {
        self.location.lock().unwrap().clone()
    }

    fn push_state(&self, state: HistoryState, href: &str) {
        self.record(HistoryOp::Push, state, href);
    }

    fn replace_state(&self, state: HistoryState, href: &str) {
        self.record(HistoryOp::Replace, state, href);
    }

    fn assign(&self, href: &str) {
        self.assigned.lock().unwrap().push(href.to_string());
    }
}

#[derive(Default)]
pub struct FakeDocument {
    pub elements: Mutex<HashMap<String, f64>>,
    pub stylesheets: Mutex<Vec<String>>,
    pub head_removed: Mutex<usize>,
    pub blurred: Mutex<usize>,
}

#[async_trait]
impl Document for FakeDocument {
    fn has_stylesheet(&self, href: &str) -> bool {
        self.stylesheets.lock().unwrap().iter().any(|s| s == href)
    }

    async fn load_stylesheet(&self, href: &str) -> anyhow::Result<()> {
        self.stylesheets.lock().unwrap().push(href.to_string());
        Ok(())
    }

    fn remove_between(&self, start_id: &str, end_id: &str) -> bool {
        assert_eq!((start_id, end_id), ("sapper-head-start", "sapper-head-end"));
        *self.head_removed.lock().unwrap() += 1;
        true
    }

    fn blur_active_element(&self) {
        *self.blurred.lock().unwrap() += 1;
    }

    fn element_top(&self, id: &str) -> Option<f64> {
        self.elements.lock().unwrap().get(id).copied()
    }
}

#[derive(Default)]
pub struct FakeViewport {
    position: Mutex<ScrollPosition>,
    pub scrolls: Mutex<Vec<ScrollPosition>>,
}

impl FakeViewport {
    /// Simulates the user scrolling
    pub fn user_scroll(&self, y: f64) {
        *self.position.lock().unwrap() = ScrollPosition::new(0.0, y);
    }
}

impl Viewport for FakeViewport {
    fn scroll_position(&self) -> ScrollPosition {
        *self.position.lock().unwrap()
    }

    fn scroll_to(&self, position: ScrollPosition) {
        *self.position.lock().unwrap() = position;
        self.scrolls.lock().unwrap().push(position);
    }
}

pub struct FakeFetcher;

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: FetchRequest) -> anyhow::Result<FetchResponse> {
        let body = match request.url.as_str() {
            "/api/posts/42" => r#"{"title":"Answer"}"#,
            other => anyhow::bail!("no fixture for {}", other),
        };
        Ok(FetchResponse {
            status: 200,
            headers: HashMap::new(),
            body: body.to_string(),
        })
    }
}

/// Every props value the root received: `(props, mounted)`
#[derive(Clone, Default)]
pub struct RenderLog(Arc<Mutex<Vec<(Props, bool)>>>);

impl RenderLog {
    pub fn mounts(&self) -> usize {
        self.0.lock().unwrap().iter().filter(|(_, mount)| *mount).count()
    }

    pub fn renders(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Props {
        self.0.lock().unwrap().last().map(|(props, _)| props.clone()).unwrap()
    }

    pub fn all(&self) -> Vec<Props> {
        self.0.lock().unwrap().iter().map(|(props, _)| props.clone()).collect()
    }
}

struct RecordingRoot(RenderLog);

impl MountedRoot for RecordingRoot {
    fn set(&mut self, props: Props) {
        (self.0).0.lock().unwrap().push((props, false));
    }
}

#[derive(Default)]
pub struct FakeRenderer {
    pub log: RenderLog,
}

impl Renderer for FakeRenderer {
    fn mount(&self, props: Props, hydrate: bool) -> anyhow::Result<Box<dyn MountedRoot>> {
        assert!(hydrate);
        self.log.0.lock().unwrap().push((props, true));
        Ok(Box::new(RecordingRoot(self.log.clone())))
    }
}

/// Name of the component rendered at `level`
pub fn component_at(props: &Props, level: usize) -> Option<String> {
    props
        .level(level)
        .and_then(|level| level.component.as_ref())
        .map(|component| component.name().to_string())
}

// ============================================================================
// Blog fixture
// ============================================================================

fn component(name: &'static str, calls: &Calls, module: Module) -> ComponentDescriptor {
    let calls = calls.clone();
    ComponentDescriptor::new(
        move || {
            calls.record(format!("load:{}", name));
            let module = module.clone();
            async move { Ok::<_, anyhow::Error>(module) }
        },
        vec![format!("{}.css", name.to_lowercase())],
    )
}

fn id_param(index: usize) -> Part {
    Part::new(index).with_params(|m| Params::from([("id".to_string(), m.decoded(1))]))
}

/// Route table of a small blog
///
/// | path            | parts                     |
/// |-----------------|---------------------------|
/// | `/`             | Index                     |
/// | `/about`        | About                     |
/// | `/login`        | Login                     |
/// | `/private`      | Private (redirects)       |
/// | `/loop`         | Loop (redirects to self)  |
/// | `/conflict`     | Conflict (two redirects)  |
/// | `/slow`         | Slow (waits for the gate) |
/// | `/blog/:id`     | BlogLayout, Post          |
/// | `/posts/:id`    | -, Post                   |
pub fn blog_manifest(calls: &Calls, gate: Arc<Notify>) -> Manifest {
    let blog_calls = calls.clone();
    let blog = Module::new(ComponentRef::named("BlogLayout")).with_preload(preload_fn(
        move |_ctx, _page, session: JsonValue| {
            blog_calls.record("blog");
            async move { Ok::<_, anyhow::Error>(json!({ "user": session["user"].clone() })) }
        },
    ));

    let post_calls = calls.clone();
    let post = Module::new(ComponentRef::named("Post")).with_preload(preload_fn(
        move |ctx, page, _session| {
            let id = page.params.get("id").cloned().unwrap_or_default();
            post_calls.record(format!("post:{}", id));
            async move {
                if id == "missing" {
                    ctx.error(404, "Post not found");
                    return Ok::<_, anyhow::Error>(json!({}));
                }
                if id == "broken" {
                    anyhow::bail!("database unavailable");
                }
                let title = match ctx.fetch(FetchRequest::get(format!("/api/posts/{}", id))).await {
                    Ok(response) => response.json()?["title"].clone(),
                    Err(_) => JsonValue::Null,
                };
                Ok::<_, anyhow::Error>(json!({ "id": id, "title": title }))
            }
        },
    ));

    let private = Module::new(ComponentRef::named("Private")).with_preload(preload_fn(
        |ctx, _page, _session| async move {
            ctx.redirect(302, "/login")?;
            Ok::<_, anyhow::Error>(json!({}))
        },
    ));

    let looping = Module::new(ComponentRef::named("Loop")).with_preload(preload_fn(
        |ctx, _page, _session| async move {
            ctx.redirect(302, "/loop")?;
            Ok::<_, anyhow::Error>(json!({}))
        },
    ));

    let conflict = Module::new(ComponentRef::named("Conflict")).with_preload(preload_fn(
        |ctx, _page, _session| async move {
            ctx.redirect(302, "/a")?;
            ctx.redirect(302, "/b")?;
            Ok::<_, anyhow::Error>(json!({}))
        },
    ));

    let slow = Module::new(ComponentRef::named("Slow")).with_preload(preload_fn(
        move |_ctx, _page, _session| {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok::<_, anyhow::Error>(json!({ "slow": true }))
            }
        },
    ));

    Manifest::new(ComponentRef::named("Error"))
        .with_ignore(Regex::new(r"^/api(?:/|$)").unwrap())
        .with_root_preload(preload_fn(|_ctx, _page, _session| async {
            Ok::<_, anyhow::Error>(json!({ "nav": ["home", "blog"] }))
        }))
        .with_component(component("Index", calls, Module::new(ComponentRef::named("Index"))))
        .with_component(component("About", calls, Module::new(ComponentRef::named("About"))))
        .with_component(component("Login", calls, Module::new(ComponentRef::named("Login"))))
        .with_component(component("Private", calls, private))
        .with_component(component("Loop", calls, looping))
        .with_component(component("Conflict", calls, conflict))
        .with_component(component("Slow", calls, slow))
        .with_component(component("BlogLayout", calls, blog))
        .with_component(component("Post", calls, post))
        .with_route(RouteDef::new(r"^/$", vec![Some(Part::new(0))]).unwrap())
        .with_route(RouteDef::new(r"^/about/?$", vec![Some(Part::new(1))]).unwrap())
        .with_route(RouteDef::new(r"^/login/?$", vec![Some(Part::new(2))]).unwrap())
        .with_route(RouteDef::new(r"^/private/?$", vec![Some(Part::new(3))]).unwrap())
        .with_route(RouteDef::new(r"^/loop/?$", vec![Some(Part::new(4))]).unwrap())
        .with_route(RouteDef::new(r"^/conflict/?$", vec![Some(Part::new(5))]).unwrap())
        .with_route(RouteDef::new(r"^/slow/?$", vec![Some(Part::new(6))]).unwrap())
        .with_route(
            RouteDef::new(r"^/blog/([^/]+?)/?$", vec![Some(Part::new(7)), Some(id_param(8))])
                .unwrap(),
        )
        .with_route(RouteDef::new(r"^/posts/([^/]+?)/?$", vec![None, Some(id_param(8))]).unwrap())
}

pub struct TestApp {
    pub navigator: Arc<Navigator>,
    pub history: Arc<FakeHistory>,
    pub document: Arc<FakeDocument>,
    pub viewport: Arc<FakeViewport>,
    pub renders: RenderLog,
    pub calls: Calls,
    pub gate: Arc<Notify>,
}

impl TestApp {
    pub fn new(path: &str) -> Self {
        Self::with(path, InitialData::default(), NavigatorConfig::default())
    }

    pub fn with(path: &str, initial: InitialData, config: NavigatorConfig) -> Self {
        let history = Arc::new(FakeHistory::new(url(path)));
        let document = Arc::new(FakeDocument::default());
        let viewport = Arc::new(FakeViewport::default());
        let renderer = Arc::new(FakeRenderer::default());
        let renders = renderer.log.clone();
        let calls = Calls::default();
        let gate = Arc::new(Notify::new());

        let host = Host {
            history: history.clone(),
            document: document.clone(),
            viewport: viewport.clone(),
            fetcher: Arc::new(FakeFetcher),
            renderer,
        };

        let manifest = blog_manifest(&calls, gate.clone());
        let navigator = Arc::new(Navigator::new(config, manifest, host, initial));

        Self {
            navigator,
            history,
            document,
            viewport,
            renders,
            calls,
            gate,
        }
    }

    /// Started app showing `path`
    pub async fn started(path: &str) -> Self {
        let app = Self::new(path);
        app.navigator.start().await.unwrap();
        app
    }

    pub fn page_path(&self) -> String {
        self.navigator.page().borrow().path.clone()
    }
}

/// Installs a test log subscriber once per binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
