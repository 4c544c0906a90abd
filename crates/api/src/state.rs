//! Application state shared across handlers.

use std::sync::Arc;

use crate::analytics::Analytics;
use crate::config::AnalyticsConfig;
use crate::db::RecordSource;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and owns the record source
/// every pipeline reads from.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AnalyticsConfig,
    source: Arc<dyn RecordSource>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Analytics configuration
    /// * `source` - Record source backing every pipeline
    #[must_use]
    pub fn new(config: AnalyticsConfig, source: Arc<dyn RecordSource>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, source }),
        }
    }

    /// Get a reference to the analytics configuration.
    #[must_use]
    pub fn config(&self) -> &AnalyticsConfig {
        &self.inner.config
    }

    /// Get a reference to the record source.
    #[must_use]
    pub fn source(&self) -> &dyn RecordSource {
        self.inner.source.as_ref()
    }

    /// Analytics over the record source under the configured coercion policy.
    #[must_use]
    pub fn analytics(&self) -> Analytics<'_> {
        Analytics::new(self.source(), self.inner.config.coercion_policy)
    }
}
