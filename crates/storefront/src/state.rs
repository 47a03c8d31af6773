//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::MarketplaceConfig;
use crate::db::Repository;
use crate::services::jobs::JobQueue;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the repository, the job queue and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: MarketplaceConfig,
    repo: Arc<dyn Repository>,
    jobs: JobQueue,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The receiving half of `jobs` must be handed to
    /// [`run_worker`](crate::services::jobs::run_worker) by the caller.
    #[must_use]
    pub fn new(config: MarketplaceConfig, repo: Arc<dyn Repository>, jobs: JobQueue) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, repo, jobs }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MarketplaceConfig {
        &self.inner.config
    }

    /// The repository as a trait object, for constructing services.
    #[must_use]
    pub fn repo(&self) -> &dyn Repository {
        self.inner.repo.as_ref()
    }

    #[must_use]
    pub fn jobs(&self) -> &JobQueue {
        &self.inner.jobs
    }
}
