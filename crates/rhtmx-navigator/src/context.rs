// File: src/context.rs
// Purpose: Capabilities handed to every preload function of one resolution

use crate::error::{NavigationError, PageError, Result};
use crate::host::{FetchRequest, FetchResponse, Fetcher};
use crate::props::Redirect;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct Outcome {
    redirect: Option<Redirect>,
    error: Option<(u16, PageError)>,
}

/// Shared handle passed to the preload functions of a single navigation
///
/// Clones refer to the same pending redirect and error, so every depth of a
/// branch records into one place. Nothing here touches navigator state.
#[derive(Clone)]
pub struct PreloadContext {
    fetcher: Arc<dyn Fetcher>,
    outcome: Arc<Mutex<Outcome>>,
}

impl PreloadContext {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            outcome: Arc::new(Mutex::new(Outcome::default())),
        }
    }

    fn outcome(&self) -> MutexGuard<'_, Outcome> {
        // A panicking preload cannot leave the record half-written
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a network request through the host fetcher
    pub async fn fetch(&self, request: FetchRequest) -> anyhow::Result<FetchResponse> {
        self.fetcher.fetch(request).await
    }

    /// Requests a client-side redirect once preloading finishes
    ///
    /// Repeating the same redirect is fine; asking for a different one in
    /// the same navigation is an error.
    pub fn redirect(&self, status_code: u16, location: impl Into<String>) -> Result<()> {
        let location = location.into();
        let mut outcome = self.outcome();

        if let Some(existing) = &outcome.redirect {
            if existing.status_code != status_code || existing.location != location {
                return Err(NavigationError::ConflictingRedirects {
                    existing_status: existing.status_code,
                    existing_location: existing.location.clone(),
                    status: status_code,
                    location,
                });
            }
        }

        debug!(status_code, location = %location, "Preload requested redirect");
        outcome.redirect = Some(Redirect {
            status_code,
            location,
        });
        Ok(())
    }

    /// Records an error to render instead of the page, without aborting
    pub fn error(&self, status: u16, error: impl Into<PageError>) {
        let error = error.into();
        debug!(status, error = %error, "Preload reported error");
        self.outcome().error = Some((status, error));
    }

    pub fn pending_redirect(&self) -> Option<Redirect> {
        self.outcome().redirect.clone()
    }

    pub fn reported_error(&self) -> Option<(u16, PageError)> {
        self.outcome().error.clone()
    }
}

impl std::fmt::Debug for PreloadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = self.outcome();
        f.debug_struct("PreloadContext")
            .field("redirect", &outcome.redirect)
            .field("error", &outcome.error)
            .finish()
    }
}
