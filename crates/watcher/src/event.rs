use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::ModifyKind;
use serde::{Deserialize, Serialize};

use crate::layout::VaultLayout;

/// Channel name under which the application layer forwards index changes.
pub const INDEX_CHANGED_CHANNEL: &str = "file:index-changed";

/// Channel name under which the application layer forwards document changes.
pub const DOCUMENT_CHANGED_CHANNEL: &str = "file:document-changed";

/// What happened to a file, reduced to the four cases consumers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
}

/// One coalesced change notification for a single path.
///
/// This struct is the exact payload forwarded to the UI layer, hence the
/// camelCase wire names:
/// `{"type": "write", "path": "...", "isIndex": false, "docId": "doc123"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub is_index: bool,
    /// Base name without extension; empty for the index file.
    pub doc_id: String,
}

impl FileChangeEvent {
    /// Build the event for `path`, deriving `is_index` and `doc_id` from
    /// the layout's naming rules.
    pub fn for_path(layout: &VaultLayout, kind: ChangeKind, path: &Path) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
            is_index: layout.is_index(path),
            doc_id: layout.doc_id(path),
        }
    }
}

/// Reduce a raw notification kind to a [`ChangeKind`], with precedence
/// create > write > remove > rename.
///
/// | Raw kind                            | Classified |
/// |-------------------------------------|------------|
/// | `Create(_)`                         | create     |
/// | `Modify(Data / Metadata / Any / …)` | write      |
/// | `Remove(_)`                         | remove     |
/// | `Modify(Name(_))`                   | rename     |
/// | `Access(_)`, `Any`, `Other`         | ignored    |
///
/// `Create` outranks the write-flavored kinds, so a brand-new file is
/// reported as a creation even on platforms that flag the first data write
/// together with it.  `Access` kinds (open/close bookkeeping) carry no
/// content change and are dropped here rather than misclassified.
///
/// Metadata-only updates (`touch`, `chmod`) land in the write bucket too:
/// the raw kinds do not say whether content changed, so a bare `touch`
/// surfaces as a write and re-embeds an unchanged document.  Narrowing to
/// `Data(_)` would instead drop real saves on backends that report content
/// writes as `Metadata` or `Any`.
pub fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(_) => Some(ChangeKind::Write),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
