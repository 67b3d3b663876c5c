//! The synchronization engine.
//!
//! All mutating operations (readiness evaluation, linking, backlinking,
//! deletion propagation, cache updates) run inside one critical section:
//! the mutex around the dedup cache doubles as the filesystem mutation
//! lock, so at most one mutation sequence is in flight at any time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use mirra_config::SyncSettings;
use mirra_events::{Event, EventBus};
use mirra_telemetry::{Metrics, gauge_value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backlink;
use crate::cache::DedupCache;
use crate::deletion;
use crate::mapping::{MappingTable, RootRole};
use crate::materialize;
use crate::readiness;

/// Shared synchronization engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    table: RwLock<MappingTable>,
    state: Mutex<DedupCache>,
    events: EventBus,
    metrics: Metrics,
    sync_running: AtomicBool,
}

impl SyncEngine {
    /// Build an engine from settings, starting with an empty dedup cache.
    #[must_use]
    pub fn new(settings: &SyncSettings, events: EventBus, metrics: Metrics) -> Self {
        let table = MappingTable::configure(settings.mapping_pairs());
        Self {
            inner: Arc::new(EngineInner {
                table: RwLock::new(table),
                state: Mutex::new(DedupCache::new()),
                events,
                metrics,
                sync_running: AtomicBool::new(false),
            }),
        }
    }

    /// Rebuild the mapping table wholesale from fresh settings and drop
    /// every dedup entry, so the next events re-evaluate from scratch.
    pub fn configure(&self, settings: &SyncSettings) {
        let table = MappingTable::configure(settings.mapping_pairs());
        let pairs = table.pairs().len();
        {
            let mut slot = self
                .inner
                .table
                .write()
                .expect("mapping table lock poisoned");
            *slot = table;
        }
        {
            let mut cache = self.lock_state();
            cache.clear();
            self.inner.metrics.set_dedup_cache_size(0);
        }
        self.emit(Event::SettingsChanged {
            description: format!("mapping table rebuilt with {pairs} pair(s)"),
        });
    }

    /// Snapshot of the configured mapping table.
    #[must_use]
    pub fn mapping_table(&self) -> MappingTable {
        self.inner
            .table
            .read()
            .expect("mapping table lock poisoned")
            .clone()
    }

    /// Classify a watched root against the current mapping table.
    #[must_use]
    pub fn role_of(&self, root: &Path) -> Option<RootRole> {
        self.inner
            .table
            .read()
            .expect("mapping table lock poisoned")
            .role_of(root)
    }

    /// Names of configured roots that are currently missing.
    #[must_use]
    pub fn degraded(&self) -> Vec<String> {
        self.inner
            .table
            .read()
            .expect("mapping table lock poisoned")
            .degraded()
    }

    /// The shared metrics registry.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// The shared event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    fn emit(&self, event: Event) {
        self.inner.metrics.inc_event(event.kind());
        let _ = self.inner.events.publish(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, DedupCache> {
        self.inner.state.lock().expect("engine state mutex poisoned")
    }

    /// Evaluate the title folder containing `path` and mirror it into the
    /// library tree when ready. Returns `true` when the folder was newly
    /// recorded as mirrored.
    #[must_use]
    pub fn handle_source_file(&self, path: &Path, destination_root: &Path) -> bool {
        if readiness::is_ignored_path(path) {
            return false;
        }
        let Some(folder) = path.parent().map(Path::to_path_buf) else {
            return false;
        };

        let mut cache = self.lock_state();
        if cache.contains(&folder) {
            return false;
        }
        if !folder.is_dir() {
            return false;
        }

        let result = readiness::evaluate(&folder);
        if !result.ready {
            return false;
        }

        let Some(name) = folder.file_name() else {
            return false;
        };
        let title = name.to_string_lossy().into_owned();
        let destination = destination_root.join(&result.class_key).join(name);
        let report = materialize::mirror_folder(&folder, &destination);

        if report.success() {
            let outcome = if report.linked > 0 { "linked" } else { "already" };
            self.inner.metrics.inc_link_operation(outcome);
            let newly = cache.insert(&folder);
            self.inner
                .metrics
                .set_dedup_cache_size(gauge_value(cache.len()));
            drop(cache);
            if report.linked > 0 {
                self.emit(Event::FolderLinked {
                    title,
                    class_key: result.class_key,
                    destination: destination.display().to_string(),
                });
            }
            newly
        } else {
            self.inner.metrics.inc_link_operation("failed");
            drop(cache);
            self.emit(Event::LinkFailed {
                title,
                message: format!("{} file(s) could not be hardlinked", report.failed),
            });
            false
        }
    }

    /// Propagate a library-side sidecar file back into the staging tree.
    pub fn handle_dest_file(&self, path: &Path, source_root: &Path) {
        if !backlink::is_sidecar(path) {
            return;
        }
        let guard = self.lock_state();
        let created = backlink::propagate_sidecar(path, source_root);
        drop(guard);
        if let Some(created) = created {
            self.inner.metrics.inc_backlink();
            self.emit(Event::BacklinkCreated {
                title: created
                    .parent()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                file: created
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
        }
    }

    /// Propagate a staging-side deletion across the library buckets.
    pub fn handle_delete(&self, path: &Path, destination_root: &Path) {
        let Some(name) = path.file_name() else {
            return;
        };
        let mut cache = self.lock_state();
        let evicted = cache.remove(path);
        if evicted {
            self.inner
                .metrics
                .set_dedup_cache_size(gauge_value(cache.len()));
        }
        let removed = deletion::propagate_delete(name, destination_root);
        drop(cache);

        if removed > 0 {
            self.inner.metrics.add_deletions(removed);
        }
        if removed > 0 || evicted {
            self.emit(Event::DeletionPropagated {
                name: name.to_string_lossy().into_owned(),
                removed,
            });
        }
    }

    /// Run a full reconciliation pass now, blocking the caller.
    ///
    /// Returns `false` without doing anything if a pass is already in
    /// flight.
    #[must_use]
    pub fn sync_all(&self) -> bool {
        if self
            .inner
            .sync_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("full sync already in flight, ignoring trigger");
            return false;
        }
        self.run_sync_pass();
        self.inner.sync_running.store(false, Ordering::Release);
        true
    }

    /// Schedule a full reconciliation pass on a blocking worker without
    /// waiting for it. Returns `false` if a pass is already in flight.
    #[must_use]
    pub fn spawn_sync(&self) -> bool {
        if self
            .inner
            .sync_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("full sync already in flight, ignoring trigger");
            return false;
        }
        let engine = self.clone();
        tokio::task::spawn_blocking(move || {
            engine.run_sync_pass();
            engine.inner.sync_running.store(false, Ordering::Release);
        });
        true
    }

    fn run_sync_pass(&self) {
        let run_id = Uuid::new_v4();
        info!(%run_id, "full sync started");
        self.emit(Event::SyncStarted { run_id });

        {
            let mut cache = self.lock_state();
            cache.clear();
            self.inner.metrics.set_dedup_cache_size(0);
        }

        let pairs = self.mapping_table().pairs().to_vec();
        let mut examined = 0u64;
        let mut linked = 0u64;
        for pair in &pairs {
            if !pair.source.is_dir() {
                debug!(path = %pair.source.display(), "staging root missing, skipping");
                continue;
            }
            for collection in sorted_subdirectories(&pair.source) {
                for title in sorted_subdirectories(&collection) {
                    examined += 1;
                    if let Some(pointer) = first_pointer_file(&title)
                        && self.handle_source_file(&pointer, &pair.destination)
                    {
                        linked += 1;
                    }
                }
            }
        }

        self.inner.metrics.inc_sync_run();
        info!(%run_id, examined, linked, "full sync completed");
        self.emit(Event::SyncCompleted {
            run_id,
            folders_examined: examined,
            folders_linked: linked,
        });
    }
}

fn sorted_subdirectories(path: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
                .map(|entry| entry.path())
                .collect()
        })
        .unwrap_or_default();
    dirs.sort_unstable();
    dirs
}

fn first_pointer_file(folder: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.to_lowercase()
                        .ends_with(readiness::POINTER_EXTENSION)
                })
        })
        .collect();
    files.sort_unstable();
    files.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirra_test_support::{ready_title_folder, scratch_dir, settings_for};
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{Duration, timeout};

    fn engine_for(temp: &TempDir) -> (SyncEngine, PathBuf, PathBuf) {
        let staging = temp.path().join("staging");
        let library = temp.path().join("library");
        fs::create_dir_all(&staging).expect("staging");
        let settings = settings_for(&staging, &library);
        let engine = SyncEngine::new(
            &settings,
            EventBus::with_capacity(64),
            Metrics::new().expect("metrics"),
        );
        (engine, staging, library)
    }

    async fn collect_events(stream: &mut mirra_events::EventStream, count: usize) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..count {
            match timeout(Duration::from_secs(2), stream.next()).await {
                Ok(Some(envelope)) => events.push(envelope.event),
                _ => break,
            }
        }
        events
    }

    #[tokio::test]
    async fn full_sync_mirrors_ready_folders() {
        let temp = scratch_dir();
        let (engine, staging, library) = engine_for(&temp);
        let mut stream = engine.events().subscribe(None);

        ready_title_folder(&staging.join("ActorX"), "ABC-123");
        // Incomplete folder: no metadata file.
        let partial = staging.join("ActorX").join("DEF-456");
        fs::create_dir_all(&partial).expect("partial");
        fs::write(partial.join("video.strm"), b"x").expect("strm");

        assert!(engine.sync_all());

        let mirrored = library.join("A").join("ABC-123");
        for name in [
            "video.strm",
            "video.nfo",
            "poster.jpg",
            "fanart.jpg",
            "thumb.jpg",
        ] {
            assert!(mirrored.join(name).exists(), "missing {name}");
        }
        assert!(!library.join("D").join("DEF-456").exists());

        let events = collect_events(&mut stream, 8).await;
        assert!(matches!(events.first(), Some(Event::SyncStarted { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::FolderLinked { title, class_key, .. }
                if title == "ABC-123" && class_key == "A")));
        assert!(events.iter().any(|event| matches!(
            event,
            Event::SyncCompleted {
                folders_examined: 2,
                folders_linked: 1,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn repeated_source_events_hit_the_cache() {
        let temp = scratch_dir();
        let (engine, staging, library) = engine_for(&temp);

        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");
        let pointer = folder.join("video.strm");

        assert!(engine.handle_source_file(&pointer, &library));
        assert!(!engine.handle_source_file(&pointer, &library));
    }

    #[tokio::test]
    async fn deletion_clears_cache_and_library_buckets() {
        let temp = scratch_dir();
        let (engine, staging, library) = engine_for(&temp);
        let mut stream = engine.events().subscribe(None);

        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");
        assert!(engine.handle_source_file(&folder.join("video.strm"), &library));
        // A stale copy in another bucket is swept up too.
        fs::create_dir_all(library.join("F").join("ABC-123")).expect("stale");

        engine.handle_delete(&folder, &library);
        assert!(!library.join("A").join("ABC-123").exists());
        assert!(!library.join("F").join("ABC-123").exists());

        let events = collect_events(&mut stream, 4).await;
        assert!(events.iter().any(|event| matches!(
            event,
            Event::DeletionPropagated { name, removed: 2 } if name == "ABC-123"
        )));

        // The cache entry is gone, so the folder can be relinked.
        assert!(engine.handle_source_file(&folder.join("video.strm"), &library));
    }

    #[tokio::test]
    async fn sidecar_events_only_propagate_json() {
        let temp = scratch_dir();
        let (engine, staging, library) = engine_for(&temp);

        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");
        assert!(engine.handle_source_file(&folder.join("video.strm"), &library));

        let mirrored = library.join("A").join("ABC-123");
        fs::write(mirrored.join("meta.json"), b"{}").expect("sidecar");
        fs::write(mirrored.join("notes.txt"), b"x").expect("other");

        engine.handle_dest_file(&mirrored.join("notes.txt"), &staging);
        assert!(!folder.join("notes.txt").exists());

        engine.handle_dest_file(&mirrored.join("meta.json"), &staging);
        assert!(folder.join("meta.json").exists());
    }

    #[tokio::test]
    async fn reconfigure_clears_the_cache_and_swaps_mappings() {
        let temp = scratch_dir();
        let (engine, staging, library) = engine_for(&temp);
        let mut stream = engine.events().subscribe(None);

        let folder = ready_title_folder(&staging.join("ActorX"), "ABC-123");
        assert!(engine.handle_source_file(&folder.join("video.strm"), &library));

        let other_library = temp.path().join("library2");
        let settings = settings_for(&staging, &other_library);
        engine.configure(&settings);
        assert!(other_library.is_dir());
        assert_eq!(
            engine.role_of(&staging),
            Some(RootRole::Source {
                destination: other_library.clone()
            })
        );

        let events = collect_events(&mut stream, 4).await;
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::SettingsChanged { .. })));

        // The cache was dropped, so the folder links again into the new root.
        assert!(engine.handle_source_file(&folder.join("video.strm"), &other_library));
        assert!(other_library.join("A").join("ABC-123").join("video.strm").exists());
    }

    #[tokio::test]
    async fn sequential_full_syncs_both_run() {
        let temp = scratch_dir();
        let (engine, staging, _library) = engine_for(&temp);
        ready_title_folder(&staging.join("ActorX"), "ABC-123");

        assert!(engine.sync_all());
        assert!(engine.sync_all());
        assert_eq!(engine.metrics().snapshot().sync_runs_total, 2);
    }
}
