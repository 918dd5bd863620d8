use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Remembers which paths the application itself wrote recently, so the
/// watcher can tell its own saves apart from external edits.
///
/// Records expire lazily: [`WriteTracker::is_recent_write`] discards a
/// record older than the ignore window and answers false.  Records still
/// inside the window are kept rather than consumed — one logical save fans
/// out into several raw notifications (create, data write, close), and
/// every one of them must still match the record.
#[derive(Debug)]
pub struct WriteTracker {
    window: Duration,
    writes: Mutex<HashMap<PathBuf, Instant>>,
}

impl WriteTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            writes: Mutex::new(HashMap::new()),
        }
    }

    /// Record that the application is writing `path` right now.
    /// Overwrites any earlier record for the same path.
    pub fn mark_write(&self, path: impl AsRef<Path>) {
        self.writes()
            .insert(path.as_ref().to_path_buf(), Instant::now());
    }

    /// Whether `path` was written by the application within the ignore
    /// window.  An expired record is removed on the way out.
    pub fn is_recent_write(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut writes = self.writes();
        match writes.get(path) {
            Some(written_at) if written_at.elapsed() <= self.window => true,
            Some(_) => {
                writes.remove(path);
                false
            }
            None => false,
        }
    }

    fn writes(&self) -> MutexGuard<'_, HashMap<PathBuf, Instant>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
