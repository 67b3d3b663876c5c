#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Telemetry primitives shared across the Mirra workspace.
//!
//! This crate centralises logging, metrics, and request tracing helpers so
//! the sync engine and HTTP surface share one observability story.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing_subscriber::{EnvFilter, fmt};

/// Default logging target when `RUST_LOG` is not provided.
const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for example,
/// because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    BUILD_SHA
        .set(config.build_sha.to_string())
        .ok()
        .or(Some(()));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));

    let install = |format: LogFormat| {
        let builder = fmt::fmt()
            .with_env_filter(env_filter.clone())
            .with_target(false)
            .with_thread_ids(false);

        match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        }
    };

    install(config.format).map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(())
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Default filter directive applied when `RUST_LOG` is unset.
    pub level: &'a str,
    /// Output format for the installed subscriber.
    pub format: LogFormat,
    /// Build identifier stamped into the startup log line.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Machine-readable JSON lines.
    Json,
    /// Human-oriented multi-line output.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse a format name from configuration, falling back to the inferred
    /// default for unknown values.
    #[must_use]
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            Some("json") => Self::Json,
            Some("pretty") => Self::Pretty,
            _ => Self::infer(),
        }
    }
}

/// Access the build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Factory for the `x-request-id` generator layer.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that propagates an incoming `x-request-id` header.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Prometheus-backed metrics registry shared across the service.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    watch_events_total: IntCounterVec,
    link_operations_total: IntCounterVec,
    sync_runs_total: IntCounter,
    backlinks_total: IntCounter,
    deletions_total: IntCounter,
    dedup_cache_size: IntGauge,
    watched_roots: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Current number of entries in the dedup cache.
    pub dedup_cache_size: i64,
    /// Number of directory roots under active watch.
    pub watched_roots: i64,
    /// Full reconciliation passes completed since startup.
    pub sync_runs_total: u64,
    /// Sidecar backlinks created since startup.
    pub backlinks_total: u64,
    /// Deletions propagated since startup.
    pub deletions_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )?;
        let watch_events_total = IntCounterVec::new(
            Opts::new(
                "watch_events_total",
                "Filesystem notifications received by kind",
            ),
            &["kind"],
        )?;
        let link_operations_total = IntCounterVec::new(
            Opts::new(
                "link_operations_total",
                "Title folder link operations by outcome",
            ),
            &["outcome"],
        )?;
        let sync_runs_total = IntCounter::with_opts(Opts::new(
            "sync_runs_total",
            "Full reconciliation passes completed",
        ))?;
        let backlinks_total = IntCounter::with_opts(Opts::new(
            "backlinks_total",
            "Sidecar files linked back into staging",
        ))?;
        let deletions_total = IntCounter::with_opts(Opts::new(
            "deletions_total",
            "Deletions propagated to the library tree",
        ))?;
        let dedup_cache_size = IntGauge::with_opts(Opts::new(
            "dedup_cache_size",
            "Entries currently held in the dedup cache",
        ))?;
        let watched_roots = IntGauge::with_opts(Opts::new(
            "watched_roots",
            "Directory roots under active watch",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(events_emitted_total.clone()))?;
        registry.register(Box::new(watch_events_total.clone()))?;
        registry.register(Box::new(link_operations_total.clone()))?;
        registry.register(Box::new(sync_runs_total.clone()))?;
        registry.register(Box::new(backlinks_total.clone()))?;
        registry.register(Box::new(deletions_total.clone()))?;
        registry.register(Box::new(dedup_cache_size.clone()))?;
        registry.register(Box::new(watched_roots.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                watch_events_total,
                link_operations_total,
                sync_runs_total,
                backlinks_total,
                deletions_total,
                dedup_cache_size,
                watched_roots,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Increment the watch notification counter for the given kind.
    pub fn inc_watch_event(&self, kind: &str) {
        self.inner
            .watch_events_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Increment the link operation counter for the given outcome.
    pub fn inc_link_operation(&self, outcome: &str) {
        self.inner
            .link_operations_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the full reconciliation counter.
    pub fn inc_sync_run(&self) {
        self.inner.sync_runs_total.inc();
    }

    /// Increment the sidecar backlink counter.
    pub fn inc_backlink(&self) {
        self.inner.backlinks_total.inc();
    }

    /// Add a batch of propagated deletions to the counter.
    pub fn add_deletions(&self, count: u64) {
        self.inner.deletions_total.inc_by(count);
    }

    /// Set the dedup cache size gauge.
    pub fn set_dedup_cache_size(&self, size: i64) {
        self.inner.dedup_cache_size.set(size);
    }

    /// Set the watched roots gauge.
    pub fn set_watched_roots(&self, count: i64) {
        self.inner.watched_roots.set(count);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dedup_cache_size: self.inner.dedup_cache_size.get(),
            watched_roots: self.inner.watched_roots.get(),
            sync_runs_total: self.inner.sync_runs_total.get(),
            backlinks_total: self.inner.backlinks_total.get(),
            deletions_total: self.inner.deletions_total.get(),
        }
    }
}

/// Convert a count into the signed representation gauges expect.
#[must_use]
pub fn gauge_value(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_render_includes_collectors() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/sync", 202);
        metrics.inc_link_operation("linked");
        metrics.inc_sync_run();
        metrics.set_dedup_cache_size(3);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("link_operations_total"));
        assert!(rendered.contains("dedup_cache_size 3"));
        Ok(())
    }

    #[test]
    fn snapshot_reflects_counters() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_sync_run();
        metrics.inc_backlink();
        metrics.inc_backlink();
        metrics.set_watched_roots(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sync_runs_total, 1);
        assert_eq!(snapshot.backlinks_total, 2);
        assert_eq!(snapshot.watched_roots, 2);
        Ok(())
    }

    #[test]
    fn log_format_parses_known_values() {
        assert!(matches!(
            LogFormat::from_config(Some("json")),
            LogFormat::Json
        ));
        assert!(matches!(
            LogFormat::from_config(Some("pretty")),
            LogFormat::Pretty
        ));
    }

    #[test]
    fn gauge_value_saturates() {
        assert_eq!(gauge_value(5), 5);
        assert_eq!(gauge_value(usize::MAX), i64::MAX);
    }
}
