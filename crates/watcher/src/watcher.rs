use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use notevault_config::WatcherConfig;

use crate::event::{FileChangeEvent, classify};
use crate::layout::VaultLayout;
use crate::write_tracker::WriteTracker;

const BROADCAST_CAP: usize = 256;

/// Callback invoked synchronously for every flushed document event, before
/// the event is broadcast.
pub type DocumentChangedFn = Arc<dyn Fn(&FileChangeEvent) + Send + Sync>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize filesystem watcher")]
    Init(#[from] notify::Error),

    #[error("failed to watch documents directory {}", .path.display())]
    WatchDocuments {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to create documents directory {}", .path.display())]
    CreateDocumentsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watcher is already running")]
    AlreadyRunning,
}

/// Watches a vault for external edits and publishes debounced change events.
///
/// Raw notifications funnel into a single background task that owns the
/// pending set and the debounce deadline; consumers only ever see the
/// coalesced [`FileChangeEvent`]s on the broadcast channels.
pub struct VaultWatcher {
    layout: Arc<VaultLayout>,
    config: WatcherConfig,
    write_tracker: Arc<WriteTracker>,
    document_tx: broadcast::Sender<FileChangeEvent>,
    index_tx: broadcast::Sender<FileChangeEvent>,
    on_document_changed: Arc<Mutex<Option<DocumentChangedFn>>>,
    running: Option<RunningWatcher>,
}

struct RunningWatcher {
    // Held so the native watches stay registered; dropped on stop.
    _watcher: RecommendedWatcher,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl VaultWatcher {
    pub fn new(layout: Arc<VaultLayout>, config: &WatcherConfig) -> Self {
        let (document_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (index_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            layout,
            config: config.clone(),
            write_tracker: Arc::new(WriteTracker::new(config.self_write_window())),
            document_tx,
            index_tx,
            on_document_changed: Arc::new(Mutex::new(None)),
            running: None,
        }
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Shared handle onto the self-write records, for wiring into the
    /// application's save path.
    pub fn write_tracker(&self) -> Arc<WriteTracker> {
        Arc::clone(&self.write_tracker)
    }

    /// Record that the application itself is about to write `path`, so the
    /// resulting notification is filtered out instead of echoed back.
    pub fn mark_write(&self, path: impl AsRef<Path>) {
        self.write_tracker.mark_write(path);
    }

    /// Install the synchronous document callback. May be called at any time;
    /// takes effect at the next flush.
    pub fn on_document_changed(&self, callback: DocumentChangedFn) {
        *lock_callback(&self.on_document_changed) = Some(callback);
    }

    pub fn subscribe_document_changes(&self) -> broadcast::Receiver<FileChangeEvent> {
        self.document_tx.subscribe()
    }

    pub fn subscribe_index_changes(&self) -> broadcast::Receiver<FileChangeEvent> {
        self.index_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start watching. Must be called from within a tokio runtime.
    ///
    /// The documents directory is created if missing and watched
    /// non-recursively; failure there is fatal. The vault root (for the
    /// index file) is also watched non-recursively, but a failure only
    /// degrades coverage and is logged.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.running.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        let documents_dir = self.layout.documents_dir();
        std::fs::create_dir_all(&documents_dir).map_err(|source| {
            WatchError::CreateDocumentsDir {
                path: documents_dir.clone(),
                source,
            }
        })?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<notify::Event, notify::Error>| {
                // Receiver gone means we are shutting down; nothing to do.
                let _ = raw_tx.send(result);
            },
            Config::default(),
        )?;

        watcher
            .watch(&documents_dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::WatchDocuments {
                path: documents_dir.clone(),
                source,
            })?;

        let root = self.layout.root().to_path_buf();
        if let Err(err) = watcher.watch(&root, RecursiveMode::NonRecursive) {
            warn!(
                path = %root.display(),
                ?err,
                "cannot watch vault root; index file changes will go unnoticed"
            );
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let event_loop = EventLoop {
            layout: Arc::clone(&self.layout),
            write_tracker: Arc::clone(&self.write_tracker),
            debounce: self.config.debounce(),
            document_tx: self.document_tx.clone(),
            index_tx: self.index_tx.clone(),
            on_document_changed: Arc::clone(&self.on_document_changed),
        };
        let handle = tokio::spawn(event_loop.run(raw_rx, shutdown_rx));

        info!(
            documents = %documents_dir.display(),
            root = %root.display(),
            debounce_ms = self.config.debounce_ms,
            "vault watcher started"
        );
        self.running = Some(RunningWatcher {
            _watcher: watcher,
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Stop watching. Pending events that have not reached their debounce
    /// deadline are discarded, not flushed.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown_tx.send(true);
        if let Err(err) = running.handle.await {
            warn!(?err, "watcher event loop ended abnormally");
        }
        // RunningWatcher drops here, releasing the native watches.
        info!("vault watcher stopped");
    }
}

// ── Event loop ───────────────────────────────────────────────────────────────

struct EventLoop {
    layout: Arc<VaultLayout>,
    write_tracker: Arc<WriteTracker>,
    debounce: Duration,
    document_tx: broadcast::Sender<FileChangeEvent>,
    index_tx: broadcast::Sender<FileChangeEvent>,
    on_document_changed: Arc<Mutex<Option<DocumentChangedFn>>>,
}

impl EventLoop {
    async fn run(
        self,
        mut raw_rx: mpsc::UnboundedReceiver<Result<notify::Event, notify::Error>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut pending = PendingEvents::default();
        // Always a valid deadline; the guard below keeps the timer branch
        // disabled while nothing is pending.
        let mut flush_at = Instant::now();

        loop {
            tokio::select! {
                raw = raw_rx.recv() => match raw {
                    Some(Ok(event)) => {
                        if self.ingest(&mut pending, event) {
                            flush_at = Instant::now() + self.debounce;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(?err, "filesystem notification error");
                    }
                    None => break,
                },
                () = sleep_until(flush_at), if !pending.is_empty() => {
                    self.flush(&mut pending);
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Fold one raw notification into the pending set. Returns whether
    /// anything was stored, i.e. whether the debounce deadline should reset.
    fn ingest(&self, pending: &mut PendingEvents, event: notify::Event) -> bool {
        let Some(kind) = classify(&event.kind) else {
            return false;
        };

        let mut stored = false;
        for path in &event.paths {
            if !self.layout.is_managed(path) && !self.layout.is_index(path) {
                continue;
            }
            if self.write_tracker.is_recent_write(path) {
                debug!(path = %path.display(), "suppressing self-write notification");
                continue;
            }
            pending.store(FileChangeEvent::for_path(&self.layout, kind, path));
            stored = true;
        }
        stored
    }

    fn flush(&self, pending: &mut PendingEvents) {
        let events = pending.drain();
        debug!(count = events.len(), "flushing debounced change events");

        let callback = lock_callback(&self.on_document_changed).clone();
        for event in events {
            if event.is_index {
                // No subscribers is fine; events are droppable.
                let _ = self.index_tx.send(event);
            } else {
                if let Some(callback) = &callback {
                    callback(&event);
                }
                let _ = self.document_tx.send(event);
            }
        }
    }
}

fn lock_callback(
    slot: &Mutex<Option<DocumentChangedFn>>,
) -> std::sync::MutexGuard<'_, Option<DocumentChangedFn>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-path latest-event buffer: a newer event for a path replaces the
/// older one wholesale.
#[derive(Default)]
struct PendingEvents {
    by_path: HashMap<PathBuf, FileChangeEvent>,
}

impl PendingEvents {
    fn store(&mut self, event: FileChangeEvent) {
        self.by_path.insert(event.path.clone(), event);
    }

    fn drain(&mut self) -> Vec<FileChangeEvent> {
        self.by_path.drain().map(|(_, event)| event).collect()
    }

    fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.by_path.len()
    }

    #[cfg(test)]
    fn get(&self, path: &Path) -> Option<&FileChangeEvent> {
        self.by_path.get(path)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
