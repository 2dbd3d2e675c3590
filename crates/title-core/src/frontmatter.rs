use crate::error::FrontmatterError;
use crate::vault::{extension, DocumentFile, Metadata, MetadataIndex, Vault};
use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

// Header block: starts at offset 0 with a line that is exactly "---" and ends
// at the next line that is exactly "---".
static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\r?\n(.*?\r?\n)?---(?:\r?\n|\z)").unwrap()
});

/// Extract and parse the leading frontmatter block of a document.
///
/// Returns `Ok(None)` when the document has no block, or the block is empty.
/// `path` is only used for error context.
pub fn parse_frontmatter(path: &str, content: &str) -> Result<Option<Metadata>, FrontmatterError> {
    let Some(block) = extract_block(content) else {
        return Ok(None);
    };
    if block.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_yaml::from_str(block).map_err(|source| FrontmatterError::Parse {
        path: path.to_string(),
        source,
    })?;

    match value {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        _ => Err(FrontmatterError::NotMapping {
            path: path.to_string(),
        }),
    }
}

/// The raw text between the opening and closing `---` lines, if any.
pub fn extract_block(content: &str) -> Option<&str> {
    let caps = FRONTMATTER_RE.captures(content)?;
    Some(caps.get(1).map_or("", |m| m.as_str()))
}

/// How metadata for a document type is obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    /// The host indexes this type itself (`.md`).
    Native,
    /// Supported, but frontmatter must be read and parsed here (`.mdx`).
    Parsed,
    /// Not a document type this engine resolves.
    Unsupported,
}

/// Result of the synchronous metadata path.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncMetadata {
    /// Authoritative answer; `None` means the document has no frontmatter.
    Known(Option<Metadata>),
    /// The host cannot answer synchronously; use the async path.
    RequiresAsync,
}

/// Reads a document's frontmatter, either from the host index or by parsing
/// the raw content.
pub struct FrontmatterAccessor {
    vault: Arc<dyn Vault>,
    index: Arc<dyn MetadataIndex>,
    mdx_enabled: AtomicBool,
}

impl FrontmatterAccessor {
    pub fn new(vault: Arc<dyn Vault>, index: Arc<dyn MetadataIndex>, mdx_enabled: bool) -> Self {
        Self {
            vault,
            index,
            mdx_enabled: AtomicBool::new(mdx_enabled),
        }
    }

    pub fn set_mdx_enabled(&self, enabled: bool) {
        self.mdx_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn mdx_enabled(&self) -> bool {
        self.mdx_enabled.load(Ordering::Relaxed)
    }

    pub fn vault(&self) -> &Arc<dyn Vault> {
        &self.vault
    }

    pub fn index(&self) -> &Arc<dyn MetadataIndex> {
        &self.index
    }

    pub fn kind(&self, path: &str) -> DocumentKind {
        let ext = extension(path);
        if ext.eq_ignore_ascii_case("md") {
            DocumentKind::Native
        } else if ext.eq_ignore_ascii_case("mdx") && self.mdx_enabled() {
            DocumentKind::Parsed
        } else {
            DocumentKind::Unsupported
        }
    }

    pub fn get_sync(&self, file: &DocumentFile) -> SyncMetadata {
        match self.kind(&file.path) {
            DocumentKind::Native => SyncMetadata::Known(self.index.frontmatter(&file.path)),
            DocumentKind::Parsed => SyncMetadata::RequiresAsync,
            DocumentKind::Unsupported => SyncMetadata::Known(None),
        }
    }

    /// Frontmatter for any supported type. Failures are logged and yield `None`.
    pub async fn get(&self, path: &str) -> Option<Metadata> {
        match self.kind(path) {
            DocumentKind::Native => self.index.frontmatter(path),
            DocumentKind::Unsupported => None,
            DocumentKind::Parsed => match self.read_and_parse(path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("Ignoring frontmatter: {}", e);
                    None
                }
            },
        }
    }

    /// The async path without error swallowing.
    pub async fn read_and_parse(&self, path: &str) -> Result<Option<Metadata>, FrontmatterError> {
        let content = self
            .vault
            .read(path)
            .await
            .map_err(|source| FrontmatterError::Read {
                path: path.to_string(),
                source,
            })?;
        parse_frontmatter(path, &content)
    }
}
