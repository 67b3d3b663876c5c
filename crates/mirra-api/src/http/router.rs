use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::response::Response;
use axum::routing::get;
use mirra_config::SyncSettings;
use mirra_sync::SyncEngine;
use mirra_telemetry::{build_sha, propagate_request_id_layer, set_request_id_layer};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, field, info, info_span};

use super::handlers;
use super::state::ApiState;

/// Axum server exposing the sync trigger, health, metrics, and service
/// discovery routes.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Assembles the router around a running engine and its settings.
    #[must_use]
    pub fn new(engine: SyncEngine, settings: SyncSettings) -> Self {
        let state = Arc::new(ApiState::new(engine, settings));
        let trace = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<Body>| {
                let route = request.extensions().get::<MatchedPath>().map_or_else(
                    || request.uri().path().to_owned(),
                    |path| path.as_str().to_owned(),
                );
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("unknown")
                    .to_owned();
                info_span!(
                    "http_request",
                    method = %request.method(),
                    route = %route,
                    request_id = %request_id,
                    build_sha = build_sha(),
                    status_code = field::Empty,
                    latency_ms = field::Empty,
                )
            })
            .on_response(|response: &Response, latency: Duration, span: &Span| {
                span.record("status_code", response.status().as_u16());
                span.record(
                    "latency_ms",
                    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                );
            });
        let router = Router::new()
            .route("/sync", get(handlers::trigger_sync))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .route("/v1/services", get(handlers::services))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(propagate_request_id_layer())
                    .layer(set_request_id_layer())
                    .layer(trace),
            );
        Self { router }
    }

    /// Binds the listener and serves until the task is cancelled.
    ///
    /// # Errors
    /// Returns an error when the address cannot be bound or the
    /// accept loop fails.
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "http listener bound");
        axum::serve(listener, self.router).await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}
