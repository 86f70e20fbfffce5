//! HTTP API server: breed analysis over a shared, read-only feature cache.

pub mod routes;

use crate::advice::AdviceGenerator;
use crate::cache::{FeatureCache, FeatureCacheStore};
use crate::config::Config;
use crate::extractor::FeatureExtractor;
use crate::metrics::MetricsCollector;
use std::sync::{Arc, RwLock};

/// Shared application state for the HTTP server.
///
/// The reference set is an immutable snapshot. Requests clone the `Arc` and
/// keep matching against it even if a reload swaps in a newer one.
pub struct AppState {
    cache: RwLock<Arc<FeatureCache>>,
    pub store: FeatureCacheStore,
    pub config: Config,
    pub extractor: Arc<dyn FeatureExtractor + Send + Sync>,
    pub advice: Arc<dyn AdviceGenerator>,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(
        config: Config,
        cache: FeatureCache,
        extractor: Arc<dyn FeatureExtractor + Send + Sync>,
        advice: Arc<dyn AdviceGenerator>,
    ) -> Self {
        let store = FeatureCacheStore::new(&config.cache_path, config.feature_dimension)
            .with_progress_interval(config.progress_interval);
        Self {
            cache: RwLock::new(Arc::new(cache)),
            store,
            config,
            extractor,
            advice,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }

    /// The current reference snapshot.
    pub fn snapshot(&self) -> Arc<FeatureCache> {
        match self.cache.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the reference snapshot in one step.
    pub fn swap(&self, cache: FeatureCache) {
        let next = Arc::new(cache);
        match self.cache.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Start the HTTP server on `addr`.
pub async fn start(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
