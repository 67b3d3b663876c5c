//! Filesystem watchers for the configured roots.
//!
//! Each watched root gets its own `notify` watcher, selected between the
//! OS-native backend and a polling backend by configuration. Raw
//! notifications are translated into [`FsEvent`]s and bridged into a
//! bounded tokio channel consumed by the event router.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mirra_config::WatchMode;
use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config, Event as NotifyEvent, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode,
    Watcher as _,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// A path appeared (including the new side of a rename).
    Created,
    /// A path's content or attributes changed.
    Modified,
    /// A path disappeared (including the old side of a rename).
    Removed,
}

impl FsEventKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// A single translated filesystem notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// What happened.
    pub kind: FsEventKind,
    /// Affected path.
    pub path: PathBuf,
    /// Whether the path is currently a directory. Always `false` for
    /// removals, where the path no longer exists.
    pub is_directory: bool,
    /// The configured root this notification was observed under.
    pub watched_root: PathBuf,
}

/// Translate a raw notification into zero or more [`FsEvent`]s.
///
/// Renames map onto the creation and removal paths: the old name behaves
/// like a deletion, the new name like a creation.
fn translate(root: &Path, event: &NotifyEvent) -> Vec<FsEvent> {
    let tagged: Vec<(FsEventKind, &PathBuf)> = match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|path| (FsEventKind::Created, path))
            .collect(),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|path| (FsEventKind::Removed, path))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|path| (FsEventKind::Created, path))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut tagged = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                tagged.push((FsEventKind::Removed, from));
            }
            if let Some(to) = event.paths.get(1) {
                tagged.push((FsEventKind::Created, to));
            }
            tagged
        }
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|path| (FsEventKind::Modified, path))
            .collect(),
        _ => Vec::new(),
    };

    tagged
        .into_iter()
        .map(|(kind, path)| FsEvent {
            kind,
            is_directory: kind != FsEventKind::Removed && path.is_dir(),
            path: path.clone(),
            watched_root: root.to_path_buf(),
        })
        .collect()
}

enum WatcherBackend {
    Native(RecommendedWatcher),
    Polling(PollWatcher),
}

impl WatcherBackend {
    fn unwatch(&mut self, root: &Path) -> notify::Result<()> {
        match self {
            Self::Native(watcher) => watcher.unwatch(root),
            Self::Polling(watcher) => watcher.unwatch(root),
        }
    }
}

struct RootWatch {
    root: PathBuf,
    backend: WatcherBackend,
}

/// Owns one watcher per configured root.
///
/// The supervisor must be kept alive: dropping it deregisters every
/// OS-level watch and stops event delivery.
pub struct WatchSupervisor {
    watches: Vec<RootWatch>,
}

impl WatchSupervisor {
    /// Attach a watcher to every existing root in `roots`.
    ///
    /// Missing roots and attach failures are logged and skipped; the
    /// supervisor carries on with the remaining roots.
    #[must_use]
    pub fn start(
        roots: &[PathBuf],
        mode: WatchMode,
        poll_interval: Duration,
        sender: &mpsc::Sender<FsEvent>,
    ) -> Self {
        let mut watches = Vec::new();
        for root in roots {
            if !root.is_dir() {
                warn!(path = %root.display(), "watch root missing, skipping");
                continue;
            }
            match attach(root, mode, poll_interval, sender.clone()) {
                Ok(backend) => {
                    info!(path = %root.display(), mode = %mode, "watching root");
                    watches.push(RootWatch {
                        root: root.clone(),
                        backend,
                    });
                }
                Err(err) => {
                    warn!(path = %root.display(), error = %err, "failed to attach watcher");
                }
            }
        }
        Self { watches }
    }

    /// Number of roots under active watch.
    #[must_use]
    pub fn active_roots(&self) -> usize {
        self.watches.len()
    }

    /// Detach every watcher, tolerating individual failures.
    pub fn stop_all(&mut self) {
        for watch in &mut self.watches {
            if let Err(err) = watch.backend.unwatch(&watch.root) {
                warn!(path = %watch.root.display(), error = %err, "failed to detach watcher");
            }
        }
        self.watches.clear();
    }
}

fn attach(
    root: &Path,
    mode: WatchMode,
    poll_interval: Duration,
    sender: mpsc::Sender<FsEvent>,
) -> SyncResult<WatcherBackend> {
    let watched_root = root.to_path_buf();
    let handler = move |result: notify::Result<NotifyEvent>| match result {
        Ok(event) => {
            for translated in translate(&watched_root, &event) {
                // Sent from the notify thread; backpressure blocks that
                // thread, never the async runtime.
                if sender.blocking_send(translated).is_err() {
                    return;
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "filesystem watcher error");
        }
    };

    let mut backend = match mode {
        WatchMode::Native => WatcherBackend::Native(
            RecommendedWatcher::new(handler, Config::default())
                .map_err(|err| SyncError::watch("create_watcher", root, err))?,
        ),
        WatchMode::Polling => WatcherBackend::Polling(
            PollWatcher::new(handler, Config::default().with_poll_interval(poll_interval))
                .map_err(|err| SyncError::watch("create_watcher", root, err))?,
        ),
    };

    let watch_result = match &mut backend {
        WatcherBackend::Native(watcher) => watcher.watch(root, RecursiveMode::Recursive),
        WatcherBackend::Polling(watcher) => watcher.watch(root, RecursiveMode::Recursive),
    };
    watch_result.map_err(|err| SyncError::watch("attach", root, err))?;

    Ok(backend)
}
