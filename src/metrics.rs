//! Prometheus metrics.
//!
//! Counters are recorded with the `metrics` macros at the call sites; this
//! module installs the exporter and renders the text exposition for
//! `GET /metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Requests answered, labelled by `path` (`vector`, `lexical`, `rejected`, `failed`).
pub const REQUESTS_TOTAL: &str = "glossary_search_requests_total";
/// Content filter rejections, labelled by `reason`.
pub const REJECTIONS_TOTAL: &str = "glossary_search_rejections_total";
/// Lexical fallbacks after a semantic-path failure, labelled by `cause`.
pub const DEGRADED_TOTAL: &str = "glossary_search_degraded_total";

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Handle to the installed exporter.
#[derive(Clone, Default)]
pub struct MetricsService {
    handle: Option<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global Prometheus recorder.
    ///
    /// Only one recorder can be installed per process.
    pub fn install(config: &MetricsConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| Error::Config(format!("failed to install metrics recorder: {}", e)))?;
        describe();
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wrap an existing handle, e.g. from a recorder that was not installed globally.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    /// Text exposition, or `None` when metrics are disabled.
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe() {
    metrics::describe_counter!(REQUESTS_TOTAL, "Glossary search requests by answering path");
    metrics::describe_counter!(REJECTIONS_TOTAL, "Queries rejected by the content filter");
    metrics::describe_counter!(
        DEGRADED_TOTAL,
        "Semantic searches answered by the lexical fallback"
    );
}
