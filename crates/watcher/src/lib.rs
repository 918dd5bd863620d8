//! Vault change watching: raw filesystem notifications in, debounced
//! per-document change events out, with the application's own saves
//! filtered away.

pub mod event;
pub mod layout;
pub mod watcher;
pub mod write_tracker;

pub use event::{
    ChangeKind, DOCUMENT_CHANGED_CHANNEL, FileChangeEvent, INDEX_CHANGED_CHANNEL, classify,
};
pub use layout::VaultLayout;
pub use watcher::{DocumentChangedFn, VaultWatcher, WatchError};
pub use write_tracker::WriteTracker;
