//! Routing of raw filesystem events to the engine's handlers.

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::SyncEngine;
use crate::mapping::RootRole;
use crate::watch::{FsEvent, FsEventKind};

/// Capacity of the channel between the watchers and the router.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Classifies incoming filesystem events by their watched root and hands
/// them to the matching engine handler.
pub struct EventRouter {
    engine: SyncEngine,
}

impl EventRouter {
    /// Build a router over the given engine.
    #[must_use]
    pub const fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    /// Consume events until the channel closes.
    pub async fn run(self, mut receiver: mpsc::Receiver<FsEvent>) {
        while let Some(event) = receiver.recv().await {
            self.dispatch(&event);
        }
        debug!("event channel closed, router stopping");
    }

    /// Route one event.
    ///
    /// Deletions under a staging root are propagated regardless of the
    /// directory flag (the path is gone, the flag is unreliable). All
    /// other directory events are discarded; only file-level events drive
    /// folder evaluation. Events under an unmapped root are dropped.
    pub fn dispatch(&self, event: &FsEvent) {
        self.engine.metrics().inc_watch_event(event.kind.as_str());

        let Some(role) = self.engine.role_of(&event.watched_root) else {
            return;
        };

        match (event.kind, role) {
            (FsEventKind::Removed, RootRole::Source { destination }) => {
                self.engine.handle_delete(&event.path, &destination);
            }
            (FsEventKind::Removed, RootRole::Destination { .. }) => {}
            _ if event.is_directory => {}
            (_, RootRole::Source { destination }) => {
                let _ = self.engine.handle_source_file(&event.path, &destination);
            }
            (_, RootRole::Destination { source }) => {
                self.engine.handle_dest_file(&event.path, &source);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirra_events::EventBus;
    use mirra_telemetry::Metrics;
    use mirra_test_support::{ready_title_folder, scratch_dir, settings_for};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn router_for(temp: &TempDir) -> (EventRouter, PathBuf, PathBuf) {
        let staging = temp.path().join("staging");
        let library = temp.path().join("library");
        fs::create_dir_all(&staging).expect("staging");
        let settings = settings_for(&staging, &library);
        let engine = SyncEngine::new(
            &settings,
            EventBus::with_capacity(32),
            Metrics::new().expect("metrics"),
        );
        (EventRouter::new(engine), staging, library)
    }

    fn file_event(kind: FsEventKind, path: &Path, root: &Path) -> FsEvent {
        FsEvent {
            kind,
            path: path.to_path_buf(),
            is_directory: false,
            watched_root: root.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn source_file_events_trigger_linking() {
        let temp = scratch_dir();
        let (router, staging, library) = router_for(&temp);
        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");

        router.dispatch(&file_event(
            FsEventKind::Created,
            &folder.join("video.strm"),
            &staging,
        ));
        assert!(library.join("A").join("ABC-123").join("video.strm").exists());
    }

    #[tokio::test]
    async fn directory_events_are_discarded() {
        let temp = scratch_dir();
        let (router, staging, library) = router_for(&temp);
        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");

        router.dispatch(&FsEvent {
            kind: FsEventKind::Created,
            path: folder.clone(),
            is_directory: true,
            watched_root: staging,
        });
        assert!(!library.join("A").join("ABC-123").exists());
    }

    #[tokio::test]
    async fn removal_events_propagate_deletes() {
        let temp = scratch_dir();
        let (router, staging, library) = router_for(&temp);
        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");
        router.dispatch(&file_event(
            FsEventKind::Created,
            &folder.join("video.strm"),
            &staging,
        ));
        assert!(library.join("A").join("ABC-123").exists());

        router.dispatch(&file_event(FsEventKind::Removed, &folder, &staging));
        assert!(!library.join("A").join("ABC-123").exists());
    }

    #[tokio::test]
    async fn unmapped_roots_are_ignored() {
        let temp = scratch_dir();
        let (router, staging, library) = router_for(&temp);
        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");

        router.dispatch(&file_event(
            FsEventKind::Created,
            &folder.join("video.strm"),
            &temp.path().join("elsewhere"),
        ));
        assert!(!library.join("A").join("ABC-123").exists());
    }

    #[tokio::test]
    async fn router_drains_the_channel() {
        let temp = scratch_dir();
        let (router, staging, library) = router_for(&temp);
        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");

        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        sender
            .send(file_event(
                FsEventKind::Created,
                &folder.join("video.strm"),
                &staging,
            ))
            .await
            .expect("send");
        drop(sender);

        router.run(receiver).await;
        assert!(library.join("A").join("ABC-123").join("video.strm").exists());
    }
}
