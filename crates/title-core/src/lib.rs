pub mod display_cache;
pub mod error;
pub mod frontmatter;
pub mod frontmatter_cache;
pub mod link_text;
pub mod matcher;
pub mod patch;
pub mod resolver;
pub mod search;
pub mod settings;
pub mod vault;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
