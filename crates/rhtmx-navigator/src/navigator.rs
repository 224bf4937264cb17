// File: src/navigator.rs
// Purpose: Navigation controller: ids, scroll history, staleness checks and entry points

use crate::bootstrap::InitialData;
use crate::config::NavigatorConfig;
use crate::error::{NavigationError, PageError, Result};
use crate::host::{Host, HistoryState};
use crate::loader::ComponentLoader;
use crate::manifest::Manifest;
use crate::matcher::{select_target, Target, Unroutable};
use crate::preload::{AmbientState, HydratedTarget, Preloader};
use crate::props::{Branch, Level, Page, Params, Props, Redirect, ScrollPosition};
use crate::query::extract_query;
use crate::render::RenderCommitter;
use crate::session::SessionStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::{Origin, Url};

/// Resolution started ahead of time, adoptable by a later navigation
pub type PendingResolution = Shared<BoxFuture<'static, HydratedTarget>>;

/// How a navigation ended
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    /// The page for this history id is on screen
    Rendered { id: u64 },
    /// A preload asked for a redirect, which was followed
    Redirected { location: String },
    /// A newer navigation started while this one was resolving
    Superseded,
    /// Handed to the browser as a full page load
    External { href: String },
    /// Only the fragment changed; a new history id was recorded
    HashChanged { id: u64 },
    /// The URL is not a client route; nothing happened
    NotRoutable(Unroutable),
    /// Session changed before the first render
    Skipped,
}

/// Options for [`Navigator::goto`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GotoOptions {
    pub replace_state: bool,
    pub noscroll: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
    Other,
}

/// A click on an anchor, as reported by the host
#[derive(Debug, Clone, Default)]
pub struct LinkClick {
    pub button: MouseButton,
    pub meta_key: bool,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub default_prevented: bool,
    /// `None` when the click did not land inside an anchor
    pub href: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl LinkClick {
    pub fn primary(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Navigation requested by a link
#[derive(Debug, Clone)]
pub struct LinkNavigation {
    pub target: Target,
    pub noscroll: bool,
    /// Fragment without the leading `#`
    pub hash: Option<String>,
}

/// What the host should do with a click
#[derive(Debug, Clone)]
pub enum ClickAction {
    /// Leave the event to the browser
    Ignore,
    /// Cancel the event and do nothing else
    PreventDefault,
    /// Cancel the event and navigate client-side
    Navigate(LinkNavigation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryUpdate {
    Keep,
    Push,
    Replace,
}

struct Prefetching {
    href: String,
    pending: PendingResolution,
}

enum Resolution {
    Prefetched(PendingResolution),
    Fresh(AmbientState),
}

struct NavigationState {
    /// A client-side render has completed
    ready: bool,
    session_dirty: bool,
    /// Highest history id handed out
    uid: u64,
    /// History id of the current entry
    cid: u64,
    /// Live generation; a resolution may only commit while it still holds it
    token: u64,
    current_branch: Branch,
    scroll_history: HashMap<u64, ScrollPosition>,
    prefetching: Option<Prefetching>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            ready: false,
            session_dirty: false,
            uid: 1,
            cid: 1,
            token: 0,
            current_branch: Vec::new(),
            scroll_history: HashMap::new(),
            prefetching: None,
        }
    }
}

/// Client-side router driving resolution and rendering
///
/// All entry points take `&self`; state lives behind one async mutex that is
/// released while preloads run.
pub struct Navigator {
    config: NavigatorConfig,
    manifest: Arc<Manifest>,
    host: Host,
    initial: Arc<InitialData>,
    origin: Origin,
    base_url: String,
    preloader: Arc<Preloader>,
    committer: RenderCommitter,
    session: SessionStore,
    state: Mutex<NavigationState>,
}

impl Navigator {
    pub fn new(
        config: NavigatorConfig,
        manifest: Manifest,
        host: Host,
        initial: InitialData,
    ) -> Self {
        let manifest = Arc::new(manifest);
        let initial = Arc::new(initial);
        let location = host.history.location();
        let loader = Arc::new(ComponentLoader::new(
            Arc::clone(&manifest),
            Arc::clone(&host.document),
            config.asset_prefix.clone(),
        ));
        let preloader = Arc::new(Preloader::new(
            Arc::clone(&manifest),
            loader,
            Arc::clone(&host.fetcher),
            Arc::clone(&initial),
            location.as_str(),
        ));
        let committer = RenderCommitter::new(
            Arc::clone(&host.renderer),
            Arc::clone(&host.document),
            &config,
        );
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| initial.base_url.clone());
        let origin = location.origin();
        let session = SessionStore::new(initial.session.clone());

        Self {
            config,
            manifest,
            host,
            initial,
            origin,
            base_url,
            preloader,
            committer,
            session,
            state: Mutex::new(NavigationState::default()),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Observer of the page currently on screen
    pub fn page(&self) -> watch::Receiver<Page> {
        self.committer.page()
    }

    /// Observer of whether a navigation is resolving over a mounted root
    pub fn preloading(&self) -> watch::Receiver<bool> {
        self.committer.preloading()
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Resolves a URL against the route table of this application
    pub fn select(&self, url: &Url) -> std::result::Result<Target, Unroutable> {
        select_target(url, &self.origin, &self.base_url, &self.manifest)
    }

    fn ambient(&self, state: &NavigationState) -> AmbientState {
        AmbientState {
            previous_branch: state.current_branch.clone(),
            session_dirty: state.session_dirty,
            hydrated: state.ready,
            session: self.session.get(),
        }
    }

    /// Takes over the server-rendered page
    ///
    /// Records the initial history id, then either renders the error page the
    /// server reported or hydrates the current location without scrolling.
    pub async fn start(&self) -> Result<NavigationOutcome> {
        let location = self.host.history.location();
        let uid = self.state.lock().await.uid;
        self.host
            .history
            .replace_state(HistoryState { id: uid }, location.as_str());

        if self.initial.error.is_some() {
            return self.handle_error().await;
        }

        match self.select(&location) {
            Ok(target) => {
                let hash = location.fragment().map(String::from);
                self.navigate(target, Some(uid), true, hash, HistoryUpdate::Keep, 0)
                    .await
            }
            Err(reason) => {
                debug!(href = %location, %reason, "Initial page is not a client route");
                Ok(NavigationOutcome::NotRoutable(reason))
            }
        }
    }

    /// Renders the error page described by the bootstrap data
    pub async fn handle_error(&self) -> Result<NavigationOutcome> {
        let location = self.host.history.location();
        let error = self
            .initial
            .error
            .clone()
            .unwrap_or_else(|| PageError::new("Internal Error"));
        let props = self.error_props(self.initial.status, error);
        let page = Page {
            path: location.path().to_string(),
            query: extract_query(location.query().unwrap_or("")),
            params: Params::new(),
        };

        warn!(status = self.initial.status, "Rendering server-reported error");
        self.render(Vec::new(), props, page).await?;
        let id = self.state.lock().await.cid;
        Ok(NavigationOutcome::Rendered { id })
    }

    fn error_props(&self, status: u16, error: PageError) -> Props {
        let mut levels = std::collections::BTreeMap::new();
        levels.insert(
            1,
            Level {
                component: Some(self.manifest.error_component.clone()),
                props: json!({ "status": status, "error": error }),
            },
        );

        Props {
            error: Some(error),
            status,
            session: self.session.get(),
            segments: Vec::new(),
            levels,
        }
    }

    /// Navigates to `href`, resolved against the current location
    ///
    /// URLs that are not client routes leave the application through a full
    /// page load.
    pub async fn goto(&self, href: &str, options: GotoOptions) -> Result<NavigationOutcome> {
        self.goto_with_depth(href, options, 0).await
    }

    fn goto_with_depth<'a>(
        &'a self,
        href: &'a str,
        options: GotoOptions,
        redirects: usize,
    ) -> BoxFuture<'a, Result<NavigationOutcome>> {
        async move {
            let url = self
                .host
                .history
                .location()
                .join(href)
                .map_err(|source| NavigationError::InvalidUrl {
                    href: href.to_string(),
                    source,
                })?;

            match self.select(&url) {
                Ok(target) => {
                    let update = if options.replace_state {
                        HistoryUpdate::Replace
                    } else {
                        HistoryUpdate::Push
                    };
                    let hash = url.fragment().map(String::from);
                    self.navigate(target, None, options.noscroll, hash, update, redirects)
                        .await
                }
                Err(reason) => {
                    debug!(href = %url, %reason, "Leaving client-side routing");
                    self.host.history.assign(url.as_str());
                    Ok(NavigationOutcome::External {
                        href: url.to_string(),
                    })
                }
            }
        }
        .boxed()
    }

    /// Back/forward navigation; `None` state means only the fragment changed
    pub async fn handle_popstate(&self, state: Option<HistoryState>) -> Result<NavigationOutcome> {
        let position = self.host.viewport.scroll_position();
        let location = self.host.history.location();

        let id = {
            let mut nav = self.state.lock().await;
            let cid = nav.cid;
            nav.scroll_history.insert(cid, position);

            let Some(state) = state else {
                nav.uid += 1;
                nav.cid = nav.uid;
                let id = nav.cid;
                drop(nav);
                self.host
                    .history
                    .replace_state(HistoryState { id }, location.as_str());
                return Ok(NavigationOutcome::HashChanged { id });
            };
            state.id
        };

        match self.select(&location) {
            Ok(target) => {
                self.navigate(target, Some(id), false, None, HistoryUpdate::Keep, 0)
                    .await
            }
            Err(_) => {
                self.host.history.assign(location.as_str());
                Ok(NavigationOutcome::External {
                    href: location.to_string(),
                })
            }
        }
    }

    /// Decides how a click should be handled, without side effects
    pub fn classify_click(&self, click: &LinkClick) -> ClickAction {
        if click.button != MouseButton::Primary
            || click.meta_key
            || click.ctrl_key
            || click.shift_key
            || click.default_prevented
        {
            return ClickAction::Ignore;
        }

        let Some(href) = click.href.as_deref().filter(|href| !href.is_empty()) else {
            return ClickAction::Ignore;
        };

        let location = self.host.history.location();
        let Ok(url) = location.join(href) else {
            return ClickAction::Ignore;
        };

        if url == location {
            // Re-clicking the current page must not reload it
            return if location.fragment().is_none() {
                ClickAction::PreventDefault
            } else {
                ClickAction::Ignore
            };
        }

        if click.has_attribute("download") || click.attribute("rel") == Some("external") {
            return ClickAction::Ignore;
        }

        if click.attribute("target").is_some_and(|target| !target.is_empty()) {
            return ClickAction::Ignore;
        }

        if url.path() == location.path() && url.query() == location.query() {
            return ClickAction::Ignore;
        }

        match self.select(&url) {
            Ok(target) => ClickAction::Navigate(LinkNavigation {
                target,
                noscroll: click.has_attribute(&self.config.noscroll_attribute),
                hash: url.fragment().map(String::from),
            }),
            Err(_) => ClickAction::Ignore,
        }
    }

    /// Classifies a click and performs the navigation it calls for
    ///
    /// Returns `None` when nothing was navigated.
    pub async fn handle_click(&self, click: &LinkClick) -> Result<Option<NavigationOutcome>> {
        match self.classify_click(click) {
            ClickAction::Navigate(link) => self.follow_link(link).await.map(Some),
            ClickAction::Ignore | ClickAction::PreventDefault => Ok(None),
        }
    }

    /// Navigates for a classified click, pushing a history entry
    pub async fn follow_link(&self, link: LinkNavigation) -> Result<NavigationOutcome> {
        self.navigate(
            link.target,
            None,
            link.noscroll,
            link.hash,
            HistoryUpdate::Push,
            0,
        )
        .await
    }

    /// Starts resolving `href` now; a navigation to the same href adopts it
    ///
    /// Only the latest prefetch is remembered.
    pub async fn prefetch(&self, href: &str) -> Option<PendingResolution> {
        let url = self.host.history.location().join(href).ok()?;
        let target = self.select(&url).ok()?;

        let mut state = self.state.lock().await;
        if let Some(prefetching) = &state.prefetching {
            if prefetching.href == target.href {
                return Some(prefetching.pending.clone());
            }
        }

        debug!(href = %target.href, "Prefetching");
        let ambient = self.ambient(&state);
        let session = ambient.session.clone();
        let preloader = Arc::clone(&self.preloader);
        let href = target.href.clone();

        let handle = tokio::spawn(async move { preloader.hydrate_target(&target, &ambient).await });
        let pending = async move {
            handle.await.unwrap_or_else(|join_error| {
                HydratedTarget::failed(
                    PageError::from(NavigationError::Task(join_error.to_string())),
                    session,
                )
            })
        }
        .boxed()
        .shared();

        state.prefetching = Some(Prefetching {
            href,
            pending: pending.clone(),
        });
        Some(pending)
    }

    /// Loads the components of every route, or of those matching `paths`
    pub async fn prefetch_routes(&self, paths: Option<&[String]>) -> Result<()> {
        self.preloader.prefetch_routes(paths).await
    }

    /// Re-navigates whenever the session changes, until the navigator is dropped
    pub fn watch_session(self: &Arc<Self>) -> JoinHandle<()> {
        let navigator: Weak<Self> = Arc::downgrade(self);
        let mut receiver = self.session.subscribe();

        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let Some(navigator) = navigator.upgrade() else {
                    break;
                };
                if let Err(err) = navigator.handle_session_change().await {
                    warn!(error = %err, "Session change navigation failed");
                }
            }
        })
    }

    /// Re-resolves the current location after a session change
    ///
    /// Every depth is loaded afresh; nothing from the previous branch is reused.
    pub async fn handle_session_change(&self) -> Result<NavigationOutcome> {
        {
            let mut state = self.state.lock().await;
            if !state.ready {
                return Ok(NavigationOutcome::Skipped);
            }
            state.session_dirty = true;
        }

        let location = self.host.history.location();
        let target = match self.select(&location) {
            Ok(target) => target,
            Err(reason) => return Ok(NavigationOutcome::NotRoutable(reason)),
        };

        let (token, ambient) = {
            let mut state = self.state.lock().await;
            state.token += 1;
            (state.token, self.ambient(&state))
        };

        info!(href = %target.href, "Session changed, refreshing page");
        let hydrated = self.preloader.hydrate_target(&target, &ambient).await;

        let (id, live) = {
            let state = self.state.lock().await;
            (state.cid, state.token)
        };
        if live != token {
            debug!(href = %target.href, "Session refresh superseded");
            return Ok(NavigationOutcome::Superseded);
        }

        match hydrated.redirect {
            Some(redirect) => self.follow_redirect(redirect, 0).await,
            None => {
                self.render(hydrated.branch, hydrated.props, target.page)
                    .await?;
                Ok(NavigationOutcome::Rendered { id })
            }
        }
    }

    async fn navigate(
        &self,
        target: Target,
        id: Option<u64>,
        noscroll: bool,
        hash: Option<String>,
        history: HistoryUpdate,
        redirects: usize,
    ) -> Result<NavigationOutcome> {
        let viewport = &self.host.viewport;

        let (id, token, resolution) = {
            let mut state = self.state.lock().await;

            let id = match id {
                Some(id) => id,
                None => {
                    let current = viewport.scroll_position();
                    let outgoing = state.cid;
                    state.scroll_history.insert(outgoing, current);
                    state.uid += 1;
                    let id = state.uid;
                    let seed = if noscroll { current } else { ScrollPosition::ORIGIN };
                    state.scroll_history.insert(id, seed);
                    id
                }
            };
            state.cid = id;

            match history {
                HistoryUpdate::Push => self
                    .host
                    .history
                    .push_state(HistoryState { id }, &target.href),
                HistoryUpdate::Replace => self
                    .host
                    .history
                    .replace_state(HistoryState { id }, &target.href),
                HistoryUpdate::Keep => {}
            }

            if self.committer.is_mounted() {
                self.committer.set_preloading(true);
            }

            let resolution = match state.prefetching.take() {
                Some(prefetching) if prefetching.href == target.href => {
                    debug!(href = %target.href, "Adopting prefetched resolution");
                    Resolution::Prefetched(prefetching.pending)
                }
                _ => Resolution::Fresh(self.ambient(&state)),
            };

            state.token += 1;
            (id, state.token, resolution)
        };

        info!(id, href = %target.href, "Navigating");

        let hydrated = match resolution {
            Resolution::Prefetched(pending) => pending.await,
            Resolution::Fresh(ambient) => self.preloader.hydrate_target(&target, &ambient).await,
        };

        if self.state.lock().await.token != token {
            debug!(id, href = %target.href, "Navigation superseded");
            return Ok(NavigationOutcome::Superseded);
        }

        let redirected = hydrated.redirect.is_some();
        let outcome = match hydrated.redirect {
            Some(redirect) => self.follow_redirect(redirect, redirects).await?,
            None => {
                self.render(hydrated.branch, hydrated.props, target.page)
                    .await?;
                NavigationOutcome::Rendered { id }
            }
        };

        self.host.document.blur_active_element();

        if !noscroll {
            let mut state = self.state.lock().await;
            let mut scroll = state.scroll_history.get(&id).copied();

            if let Some(top) = hash
                .as_deref()
                .filter(|hash| !hash.is_empty())
                .and_then(|hash| self.host.document.element_top(hash))
            {
                scroll = Some(ScrollPosition::new(0.0, top + viewport.scroll_position().y));
            }

            if let Some(scroll) = scroll {
                let cid = state.cid;
                state.scroll_history.insert(cid, scroll);
                drop(state);
                viewport.scroll_to(if redirected {
                    ScrollPosition::ORIGIN
                } else {
                    scroll
                });
            }
        }

        Ok(outcome)
    }

    async fn follow_redirect(
        &self,
        redirect: Redirect,
        redirects: usize,
    ) -> Result<NavigationOutcome> {
        if redirects >= self.config.max_redirects {
            let err = NavigationError::TooManyRedirects {
                limit: self.config.max_redirects,
                location: redirect.location,
            };
            warn!(error = %err, "Abandoning redirect chain");

            let page = self.page().borrow().clone();
            self.render(Vec::new(), self.error_props(500, PageError::from(err)), page)
                .await?;
            let id = self.state.lock().await.cid;
            return Ok(NavigationOutcome::Rendered { id });
        }

        info!(
            status = redirect.status_code,
            location = %redirect.location,
            "Following redirect"
        );
        self.goto_with_depth(
            &redirect.location,
            GotoOptions {
                replace_state: true,
                noscroll: false,
            },
            redirects + 1,
        )
        .await?;

        Ok(NavigationOutcome::Redirected {
            location: redirect.location,
        })
    }

    async fn render(&self, branch: Branch, props: Props, page: Page) -> Result<()> {
        self.committer.commit(page, props, &self.preloader).await?;

        let mut state = self.state.lock().await;
        state.current_branch = branch;
        state.ready = true;
        state.session_dirty = false;
        Ok(())
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("base_url", &self.base_url)
            .field("manifest", &self.manifest)
            .field("committer", &self.committer)
            .finish_non_exhaustive()
    }
}
