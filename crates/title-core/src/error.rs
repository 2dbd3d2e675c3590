use thiserror::Error;

/// Failures while reading or parsing a document's frontmatter.
///
/// These never reach callers of the accessor or caches: they are logged and
/// the document is treated as having no frontmatter.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("malformed frontmatter in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("frontmatter in {path} is not a key-value mapping")]
    NotMapping { path: String },
}

/// Why a surface could not be patched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The host does not expose the hook this surface needs (version skew).
    #[error("host hook `{0}` is not available")]
    HookMissing(&'static str),
    /// The host surface exists but has not finished initializing.
    #[error("host surface `{0}` is not ready")]
    NotReady(&'static str),
}
