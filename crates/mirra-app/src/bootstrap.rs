use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use mirra_api::ApiServer;
use mirra_config::SyncSettings;
use mirra_events::EventBus;
use mirra_sync::{EVENT_CHANNEL_CAPACITY, EventRouter, SyncEngine, WatchSupervisor};
use mirra_telemetry::{LogFormat, LoggingConfig, Metrics, gauge_value};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the Mirra application.
pub(crate) struct BootstrapDependencies {
    settings: SyncSettings,
    events: EventBus,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let settings = mirra_config::load_from_env()
            .map_err(|err| AppError::config("settings.load", err))?;
        settings
            .validate()
            .map_err(|err| AppError::config("settings.validate", err))?;

        let events = EventBus::new();
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            settings,
            events,
            telemetry,
        })
    }
}

/// Entry point for the Mirra application boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or application startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(dependencies)).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        settings,
        events,
        telemetry,
    } = dependencies;

    let defaults = LoggingConfig::default();
    let logging = LoggingConfig {
        level: settings.log_level.as_deref().unwrap_or(defaults.level),
        format: LogFormat::from_config(settings.log_format.as_deref()),
        build_sha: defaults.build_sha,
    };
    mirra_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!("Mirra application bootstrap starting");

    let addr = listen_addr(&settings)?;
    let engine = SyncEngine::new(&settings, events.clone(), telemetry.clone());

    let (fs_sender, fs_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let router_task = {
        let router = EventRouter::new(engine.clone());
        tokio::spawn(async move { router.run(fs_receiver).await })
    };

    let mut supervisor = if settings.enabled {
        let roots = engine.mapping_table().watch_roots();
        let supervisor = WatchSupervisor::start(
            &roots,
            settings.watch_mode,
            Duration::from_secs(settings.poll_interval_secs),
            &fs_sender,
        );
        telemetry.set_watched_roots(gauge_value(supervisor.active_roots()));
        info!(roots = supervisor.active_roots(), "filesystem watchers attached");
        let degraded = engine.degraded();
        if !degraded.is_empty() {
            let _ = events.publish(mirra_events::Event::HealthChanged { degraded });
        }
        Some(supervisor)
    } else {
        info!("synchronization disabled; watchers not started");
        None
    };

    let notify_task = settings
        .notify
        .then(|| spawn_notification_task(events.clone()));

    startup_reconciliation(&settings, &engine);

    info!(addr = %addr, "Launching API listener");
    let serve_result = ApiServer::new(engine, settings).serve(addr).await;

    if let Some(supervisor) = supervisor.as_mut() {
        supervisor.stop_all();
    }
    shutdown_task(router_task, "event router").await;
    if let Some(task) = notify_task {
        shutdown_task(task, "notification listener").await;
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

/// One-shot reconciliation on boot. `run_once` is honored even when
/// `enabled` is false and no watchers are attached.
fn startup_reconciliation(settings: &SyncSettings, engine: &SyncEngine) {
    if settings.run_once && !engine.spawn_sync() {
        warn!("startup reconciliation skipped; a run is already in flight");
    }
}

fn listen_addr(settings: &SyncSettings) -> AppResult<SocketAddr> {
    let ip = settings
        .bind_addr
        .parse::<IpAddr>()
        .map_err(|_| AppError::InvalidConfig {
            field: "bind_addr",
            reason: "unparseable",
            value: Some(settings.bind_addr.clone()),
        })?;
    if settings.http_port == 0 {
        return Err(AppError::InvalidConfig {
            field: "http_port",
            reason: "zero",
            value: Some(settings.http_port.to_string()),
        });
    }
    Ok(SocketAddr::new(ip, settings.http_port))
}

/// Mirrors every bus event into the log stream for operators following along.
fn spawn_notification_task(events: EventBus) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = events.subscribe(None);
        while let Some(envelope) = stream.next().await {
            info!(
                event = envelope.event.kind(),
                event_id = envelope.id,
                timestamp = %envelope.timestamp,
                "sync notification"
            );
        }
    })
}

async fn shutdown_task(task: tokio::task::JoinHandle<()>, name: &str) {
    if !task.is_finished() {
        task.abort();
    }
    if let Err(err) = task.await {
        if !err.is_cancelled() {
            warn!(task = name, error = %err, "background task join failed");
        }
    }
}
