// Handler signatures stay async for axum routing even when the body
// never awaits.
#![allow(clippy::unused_async)]

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::Response;
use serde::Serialize;

use super::errors::ApiError;
use super::state::ApiState;

const SYNC_JOB_ID: &str = "mirra-full-sync";
const SYNC_COMMAND: &str = "/av_sync";

#[derive(Debug, Serialize)]
pub(crate) struct SyncResponse {
    status: &'static str,
}

/// Schedules a full reconciliation pass on the blocking pool.
///
/// Returns `202` either way; the body says whether a new run started or
/// an earlier one is still in flight.
pub(crate) async fn trigger_sync(
    State(state): State<Arc<ApiState>>,
) -> (StatusCode, Json<SyncResponse>) {
    let status = if state.engine.spawn_sync() {
        "scheduled"
    } else {
        "already_running"
    };
    state
        .telemetry()
        .inc_http_request("/sync", StatusCode::ACCEPTED.as_u16());
    (StatusCode::ACCEPTED, Json(SyncResponse { status }))
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    degraded: Vec<String>,
    enabled: bool,
    watch_mode: String,
    mappings: usize,
    dedup_cache_size: i64,
    watched_roots: i64,
    sync_runs_total: u64,
    backlinks_total: u64,
    deletions_total: u64,
    build: &'static str,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let snapshot = state.telemetry().snapshot();
    let degraded = state.engine.degraded();
    state
        .telemetry()
        .inc_http_request("/health", StatusCode::OK.as_u16());
    Json(HealthResponse {
        status: if degraded.is_empty() {
            "ok"
        } else {
            "degraded"
        },
        degraded,
        enabled: state.settings.enabled,
        watch_mode: state.settings.watch_mode.to_string(),
        mappings: state.settings.mapping_pairs().len(),
        dedup_cache_size: snapshot.dedup_cache_size,
        watched_roots: snapshot.watched_roots,
        sync_runs_total: snapshot.sync_runs_total,
        backlinks_total: snapshot.backlinks_total,
        deletions_total: snapshot.deletions_total,
        build: mirra_telemetry::build_sha(),
    })
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let body = state
        .telemetry()
        .render()
        .map_err(|error| ApiError::internal(error.to_string()))?;
    state
        .telemetry()
        .inc_http_request("/metrics", StatusCode::OK.as_u16());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(body.into())
        .map_err(|error| ApiError::internal(error.to_string()))
}

#[derive(Debug, Serialize)]
pub(crate) struct ServiceJob {
    id: &'static str,
    name: &'static str,
    cron: String,
    endpoint: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ServiceCommand {
    command: &'static str,
    action: &'static str,
    description: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ServicesResponse {
    jobs: Vec<ServiceJob>,
    commands: Vec<ServiceCommand>,
}

/// Advertises the scheduled job and the chat command bound to it.
///
/// The cron job is only published while syncing is enabled and a
/// schedule is configured; the command binding is always present.
pub(crate) async fn services(State(state): State<Arc<ApiState>>) -> Json<ServicesResponse> {
    let jobs = if state.settings.enabled {
        state
            .settings
            .schedule
            .iter()
            .map(|cron| ServiceJob {
                id: SYNC_JOB_ID,
                name: "Full library sync",
                cron: cron.clone(),
                endpoint: "/sync",
            })
            .collect()
    } else {
        Vec::new()
    };
    state
        .telemetry()
        .inc_http_request("/v1/services", StatusCode::OK.as_u16());
    Json(ServicesResponse {
        jobs,
        commands: vec![ServiceCommand {
            command: SYNC_COMMAND,
            action: "sync",
            description: "Trigger a full library sync",
        }],
    })
}
