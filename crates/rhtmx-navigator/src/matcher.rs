// File: src/matcher.rs
// Purpose: Resolve a URL to a route target

use crate::manifest::{Manifest, RouteDef, RouteMatch};
use crate::props::{Page, Params};
use crate::query::extract_query;
use std::sync::Arc;
use thiserror::Error;
use url::{Origin, Url};

/// A URL resolved against the route table
#[derive(Debug, Clone)]
pub struct Target {
    pub href: String,
    pub route: Arc<RouteDef>,
    pub route_match: RouteMatch,
    pub page: Page,
}

/// Why a URL is not handled client-side
///
/// Every variant means the same thing to callers (let the browser have it);
/// they are kept apart for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unroutable {
    #[error("URL belongs to another origin")]
    ForeignOrigin,
    #[error("URL is outside the application base path")]
    OutsideBase,
    #[error("path matches an ignored server route")]
    Ignored,
    #[error("no route matches the path")]
    NoMatch,
}

/// First route matching `path`, in registration order
///
/// Params come from the last part of the route: the leaf owns extraction for
/// the whole match.
pub fn select_route(path: &str, manifest: &Manifest) -> Option<(Arc<RouteDef>, RouteMatch, Params)> {
    manifest.routes.iter().find_map(|route| {
        route.exec(path).map(|route_match| {
            let params = route.leaf_params(&route_match);
            (Arc::clone(route), route_match, params)
        })
    })
}

/// Resolves a URL to a [`Target`]
///
/// Origin, base path and the ignore list are checked before any route is
/// tried.
pub fn select_target(
    url: &Url,
    origin: &Origin,
    base_url: &str,
    manifest: &Manifest,
) -> Result<Target, Unroutable> {
    if url.origin() != *origin {
        return Err(Unroutable::ForeignOrigin);
    }

    let path = url
        .path()
        .strip_prefix(base_url)
        .ok_or(Unroutable::OutsideBase)?;

    if manifest.is_ignored(path) {
        return Err(Unroutable::Ignored);
    }

    let query = extract_query(url.query().unwrap_or(""));

    let (route, route_match, params) = select_route(path, manifest).ok_or(Unroutable::NoMatch)?;

    Ok(Target {
        href: url.as_str().to_string(),
        route,
        route_match,
        page: Page {
            path: path.to_string(),
            query,
            params,
        },
    })
}
