//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::drain::DrainSettings;
use crate::gateway::{ElasticsearchGateway, SearchGateway};
use crate::search::SearchService;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Search service over the configured engine.
    search: SearchService,
}

impl AppState {
    /// Create new application state from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let gateway = ElasticsearchGateway::new(&config.gateway_settings())
            .context("failed to build search engine client")?;
        info!(url = %config.es_url, "search engine client ready");

        Ok(Self::from_gateway(Arc::new(gateway), config.drain_settings()))
    }

    /// Create state around an already-built gateway.
    pub fn from_gateway(gateway: Arc<dyn SearchGateway>, drain: DrainSettings) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                search: SearchService::new(gateway, drain),
            }),
        }
    }

    /// Get the search service.
    pub fn search(&self) -> &SearchService {
        &self.inner.search
    }
}
