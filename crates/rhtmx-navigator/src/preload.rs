// File: src/preload.rs
// Purpose: Resolve a target's branch: reuse, component loading and preload orchestration

use crate::bootstrap::InitialData;
use crate::context::PreloadContext;
use crate::error::{NavigationError, PageError};
use crate::host::Fetcher;
use crate::loader::ComponentLoader;
use crate::manifest::{Manifest, Part};
use crate::matcher::Target;
use crate::props::{Branch, BranchEntry, Page, Params, Props, Redirect};
use futures::future::{self, try_join_all, BoxFuture, FutureExt, Shared};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Eagerly started root layout preload, awaited by the first mount
pub type RootPreload = Shared<BoxFuture<'static, Result<JsonValue, PageError>>>;

/// Navigator state a resolution reads but never writes
#[derive(Debug, Clone, Default)]
pub struct AmbientState {
    /// Branch currently on screen
    pub previous_branch: Branch,
    /// Session changed since the last render; disables reuse
    pub session_dirty: bool,
    /// A client-side render has happened; server preload data is spent
    pub hydrated: bool,
    pub session: JsonValue,
}

/// Outcome of resolving a target
#[derive(Debug, Clone)]
pub struct HydratedTarget {
    pub redirect: Option<Redirect>,
    pub props: Props,
    pub branch: Branch,
}

impl HydratedTarget {
    /// A resolution that never produced a branch
    pub fn failed(error: PageError, session: JsonValue) -> Self {
        Self {
            redirect: None,
            props: Props {
                error: Some(error),
                status: 500,
                session,
                ..Props::default()
            },
            branch: Vec::new(),
        }
    }
}

/// What to do at one route depth
enum Step {
    Skip,
    Reuse {
        level: usize,
        entry: Arc<BranchEntry>,
    },
    Load {
        level: usize,
        depth: usize,
        part: Part,
        segment: Option<String>,
    },
}

type Resolved = Option<(usize, Arc<BranchEntry>)>;

/// Walks a route's parts and produces the props tree and branch for it
pub struct Preloader {
    manifest: Arc<Manifest>,
    loader: Arc<ComponentLoader>,
    fetcher: Arc<dyn Fetcher>,
    initial: Arc<InitialData>,
    /// Location the server rendered, without its fragment
    initial_href: String,
    root_preloaded: Mutex<Option<RootPreload>>,
}

impl Preloader {
    pub fn new(
        manifest: Arc<Manifest>,
        loader: Arc<ComponentLoader>,
        fetcher: Arc<dyn Fetcher>,
        initial: Arc<InitialData>,
        initial_href: &str,
    ) -> Self {
        Self {
            manifest,
            loader,
            fetcher,
            initial,
            initial_href: without_fragment(initial_href).to_string(),
            root_preloaded: Mutex::new(None),
        }
    }

    pub fn loader(&self) -> &Arc<ComponentLoader> {
        &self.loader
    }

    /// Resolves every depth of `target` concurrently
    ///
    /// Depths whose literal segment matches the previous branch are reused
    /// untouched unless the session is dirty. Any failure empties the branch
    /// and turns the result into a 500 error page; a redirect empties the
    /// branch and is left for the caller to follow.
    pub async fn hydrate_target(&self, target: &Target, ambient: &AmbientState) -> HydratedTarget {
        let page = &target.page;
        let path_segments: Vec<&str> = page.path.split('/').filter(|s| !s.is_empty()).collect();
        let ctx = PreloadContext::new(Arc::clone(&self.fetcher));

        self.start_root_preload(&ctx, page, &ambient.session);

        let mut props = Props {
            session: ambient.session.clone(),
            ..Props::default()
        };
        if let Some(first) = path_segments.first() {
            props.segments.push(first.to_string());
        }

        let mut level = 1;
        let mut steps = Vec::with_capacity(target.route.parts.len());

        for (depth, part) in target.route.parts.iter().enumerate() {
            if let Some(next) = path_segments.get(depth + 1) {
                props.segments.push(next.to_string());
            }

            let Some(part) = part else {
                steps.push(Step::Skip);
                continue;
            };

            let current_level = level;
            level += 1;

            let segment = path_segments.get(depth).map(|s| s.to_string());
            let reusable = ambient
                .previous_branch
                .get(depth)
                .and_then(Option::as_ref)
                .filter(|previous| !ambient.session_dirty && previous.segment == segment);

            steps.push(match reusable {
                Some(entry) => Step::Reuse {
                    level: current_level,
                    entry: Arc::clone(entry),
                },
                None => Step::Load {
                    level: current_level,
                    depth,
                    part: part.clone(),
                    segment,
                },
            });
        }

        let resolved = try_join_all(
            steps
                .into_iter()
                .map(|step| self.resolve_step(step, &ctx, target, ambient)),
        )
        .await;

        if let Some((status, error)) = ctx.reported_error() {
            props.status = status;
            props.error = Some(error);
        }

        let (mut redirect, mut branch) = (ctx.pending_redirect(), Vec::new());

        match resolved {
            Ok(entries) => {
                for (level, entry) in entries.iter().flatten() {
                    props.levels.insert(*level, entry.level());
                }
                branch = entries
                    .into_iter()
                    .map(|resolved| resolved.map(|(_, entry)| entry))
                    .collect();
            }
            Err(err) => {
                warn!(href = %target.href, error = %format!("{:#}", err), "Branch resolution failed");
                props.error = Some(PageError::from(err));
                props.status = 500;
                redirect = None;
            }
        }

        if let Some(redirect) = &redirect {
            debug!(href = %target.href, location = %redirect.location, "Resolution ended in redirect");
            branch = Vec::new();
        }

        HydratedTarget {
            redirect,
            props,
            branch,
        }
    }

    async fn resolve_step(
        &self,
        step: Step,
        ctx: &PreloadContext,
        target: &Target,
        ambient: &AmbientState,
    ) -> anyhow::Result<Resolved> {
        let (level, depth, part, segment) = match step {
            Step::Skip => return Ok(None),
            Step::Reuse { level, entry } => return Ok(Some((level, entry))),
            Step::Load {
                level,
                depth,
                part,
                segment,
            } => (level, depth, part, segment),
        };

        let module = self.loader.load(part.component).await?;

        let server_data = if self.is_server_rendered(target, ambient) {
            self.initial.preloaded_at(depth + 1).cloned()
        } else {
            None
        };

        let props = match (server_data, &module.preload) {
            (Some(data), _) => data,
            (None, Some(preload)) => {
                let page = Page {
                    path: target.page.path.clone(),
                    query: target.page.query.clone(),
                    params: part.extract_params(&target.route_match),
                };
                preload(ctx.clone(), page, ambient.session.clone()).await?
            }
            (None, None) => json!({}),
        };

        Ok(Some((
            level,
            Arc::new(BranchEntry {
                component: module.component,
                props,
                segment,
            }),
        )))
    }

    /// Server preload data belongs to the page the server rendered, until the
    /// first client-side render
    fn is_server_rendered(&self, target: &Target, ambient: &AmbientState) -> bool {
        !ambient.hydrated && without_fragment(&target.href) == self.initial_href
    }

    /// Starts the root layout preload once per preloader
    fn start_root_preload(&self, ctx: &PreloadContext, page: &Page, session: &JsonValue) {
        let mut slot = self
            .root_preloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if slot.is_some() {
            return;
        }

        let pending: BoxFuture<'static, Result<JsonValue, PageError>> =
            match (self.initial.preloaded_at(0), &self.manifest.root_preload) {
                (Some(data), _) => future::ready(Ok::<_, PageError>(data.clone())).boxed(),
                (None, Some(preload)) => {
                    let page = Page {
                        path: page.path.clone(),
                        query: page.query.clone(),
                        params: Params::new(),
                    };
                    let handle = tokio::spawn(preload(ctx.clone(), page, session.clone()));
                    async move {
                        match handle.await {
                            Ok(result) => result.map_err(PageError::from),
                            Err(join_error) => Err(PageError::from(NavigationError::Task(
                                join_error.to_string(),
                            ))),
                        }
                    }
                    .boxed()
                }
                (None, None) => future::ready(Ok::<_, PageError>(json!({}))).boxed(),
            };

        *slot = Some(pending.shared());
    }

    /// Root layout props, once its preload settles
    ///
    /// Before any resolution has started this is the server's value, or null.
    pub async fn root_props(&self) -> Result<JsonValue, PageError> {
        let pending = self
            .root_preloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match pending {
            Some(pending) => pending.await,
            None => Ok(self
                .initial
                .preloaded_at(0)
                .cloned()
                .unwrap_or(JsonValue::Null)),
        }
    }

    /// Loads the components of every route, or of the routes matching `paths`
    ///
    /// Routes are handled one after another; the parts of a route load together.
    pub async fn prefetch_routes(&self, paths: Option<&[String]>) -> crate::error::Result<()> {
        let routes = self.manifest.routes.iter().filter(|route| match paths {
            Some(paths) => paths.iter().any(|path| route.pattern.is_match(path)),
            None => true,
        });

        for route in routes {
            try_join_all(
                route
                    .parts
                    .iter()
                    .flatten()
                    .map(|part| self.loader.load(part.component)),
            )
            .await?;
        }

        Ok(())
    }
}

fn without_fragment(href: &str) -> &str {
    href.split_once('#').map_or(href, |(base, _)| base)
}

impl std::fmt::Debug for Preloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preloader")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}
