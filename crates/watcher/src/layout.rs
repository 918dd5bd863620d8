use std::path::{Path, PathBuf};

/// Naming rules for a vault: where documents live, which files count as
/// managed documents, and which file is the reserved search index.
///
/// Constructed once at startup and passed by reference wherever path
/// decisions are made, so tests can build isolated layouts freely.
#[derive(Debug, Clone)]
pub struct VaultLayout {
    root: PathBuf,
    documents_dir_name: String,
    managed_extension: String,
    index_file_name: String,
}

impl VaultLayout {
    /// Default naming: documents under `<root>/documents`, managed
    /// extension `json`, index file `index.json` at the vault root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_naming(root, "documents", "json", "index.json")
    }

    pub fn with_naming(
        root: impl Into<PathBuf>,
        documents_dir_name: impl Into<String>,
        managed_extension: impl Into<String>,
        index_file_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            documents_dir_name: documents_dir_name.into(),
            managed_extension: managed_extension.into(),
            index_file_name: index_file_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(&self.documents_dir_name)
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(&self.index_file_name)
    }

    /// Whether this path carries the managed document extension.
    pub fn is_managed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.managed_extension)
    }

    /// Whether this path's base name is the reserved index file name.
    pub fn is_index(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name == self.index_file_name)
    }

    /// Document id for a path: the base name without its extension.
    /// Empty for the index file.
    pub fn doc_id(&self, path: &Path) -> String {
        if self.is_index(path) {
            return String::new();
        }
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
