use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parsed frontmatter: property name -> scalar or array value.
pub type Metadata = serde_json::Map<String, Value>;

/// A document as the host's storage tree reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentFile {
    /// Vault-relative path, e.g. "Notes/meeting-notes.md". Unique per document.
    pub path: String,
    pub last_modified: DateTime<Utc>,
}

impl DocumentFile {
    pub fn new(path: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            last_modified,
        }
    }

    pub fn basename(&self) -> &str {
        basename(&self.path)
    }

    pub fn extension(&self) -> &str {
        extension(&self.path)
    }
}

/// File name without directory and without extension.
///
/// `basename("Notes/meeting-notes.md")` → `"meeting-notes"`
pub fn basename(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// Extension without the dot, or "" when there is none.
pub fn extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(dot) => &name[dot + 1..],
    }
}

/// Parent folder path ("" for the vault root).
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// True for extensions the engine tracks: `md`, and `mdx` when enabled.
pub fn is_document_extension(ext: &str, mdx_enabled: bool) -> bool {
    ext.eq_ignore_ascii_case("md") || (mdx_enabled && ext.eq_ignore_ascii_case("mdx"))
}

/// `name` as a document path. Dots inside a title are not an extension, so
/// `.md` is appended unless `name` already ends in a tracked one.
///
/// `document_path("v1.2 notes", false)` → `"v1.2 notes.md"`
pub fn document_path(name: &str, mdx_enabled: bool) -> String {
    if is_document_extension(extension(name), mdx_enabled) {
        name.to_string()
    } else {
        format!("{}.md", name)
    }
}

/// The host's document tree.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Every document currently in the tree.
    fn files(&self) -> Vec<DocumentFile>;

    fn file(&self, path: &str) -> Option<DocumentFile>;

    /// Raw document content.
    async fn read(&self, path: &str) -> anyhow::Result<String>;

    /// Create a new document; fails if the path is taken.
    async fn create(&self, path: &str, content: &str) -> anyhow::Result<DocumentFile>;
}

/// The host's own metadata index, maintained for natively indexed types only.
pub trait MetadataIndex: Send + Sync {
    /// Frontmatter of a natively indexed document, `None` when it has none.
    fn frontmatter(&self, path: &str) -> Option<Metadata>;

    /// Link targets referenced somewhere in the vault that do not exist yet.
    fn unresolved_links(&self) -> Vec<String>;
}
