use mirra_config::SyncSettings;
use mirra_sync::SyncEngine;
use mirra_telemetry::Metrics;

/// Shared request state handed to every handler.
pub(crate) struct ApiState {
    pub(crate) engine: SyncEngine,
    pub(crate) settings: SyncSettings,
}

impl ApiState {
    pub(crate) const fn new(engine: SyncEngine, settings: SyncSettings) -> Self {
        Self { engine, settings }
    }

    pub(crate) fn telemetry(&self) -> &Metrics {
        self.engine.metrics()
    }
}
