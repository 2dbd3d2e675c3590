//! In-memory host doubles for tests in this crate and in dependent crates
//! (enable the `testing` feature).

use crate::frontmatter::parse_frontmatter;
use crate::vault::{extension, DocumentFile, Metadata, MetadataIndex, Vault};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Entry {
    content: String,
    modified: DateTime<Utc>,
}

/// A vault backed by a map. Reads snapshot the content when they start and
/// can be delayed per path to stage out-of-order completions.
pub struct MemoryVault {
    files: DashMap<String, Entry>,
    clock: AtomicI64,
    read_delays: Mutex<HashMap<String, VecDeque<Duration>>>,
    reads: DashMap<String, usize>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            clock: AtomicI64::new(0),
            read_delays: Mutex::new(HashMap::new()),
            reads: DashMap::new(),
        }
    }

    fn tick(&self) -> DateTime<Utc> {
        let secs = self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Create or overwrite a document, bumping its modification time.
    pub fn insert(&self, path: &str, content: &str) -> DocumentFile {
        let modified = self.tick();
        self.files.insert(
            path.to_string(),
            Entry {
                content: content.to_string(),
                modified,
            },
        );
        DocumentFile::new(path, modified)
    }

    pub fn remove(&self, path: &str) {
        self.files.remove(path);
    }

    pub fn rename(&self, old_path: &str, new_path: &str) -> Option<DocumentFile> {
        let (_, entry) = self.files.remove(old_path)?;
        let file = DocumentFile::new(new_path, entry.modified);
        self.files.insert(new_path.to_string(), entry);
        Some(file)
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files.get(path).map(|e| e.content.clone())
    }

    /// Delay the next read of `path` by `delay`. Queued delays apply in order.
    pub fn push_read_delay(&self, path: &str, delay: Duration) {
        let mut delays = self.read_delays.lock().unwrap();
        delays.entry(path.to_string()).or_default().push_back(delay);
    }

    pub fn read_count(&self, path: &str) -> usize {
        self.reads.get(path).map(|c| *c).unwrap_or(0)
    }
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vault for MemoryVault {
    fn files(&self) -> Vec<DocumentFile> {
        let mut files: Vec<DocumentFile> = self
            .files
            .iter()
            .map(|e| DocumentFile::new(e.key().clone(), e.value().modified))
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    fn file(&self, path: &str) -> Option<DocumentFile> {
        self.files
            .get(path)
            .map(|e| DocumentFile::new(path, e.modified))
    }

    async fn read(&self, path: &str) -> anyhow::Result<String> {
        *self.reads.entry(path.to_string()).or_insert(0) += 1;
        let content = self
            .content(path)
            .ok_or_else(|| anyhow::anyhow!("No such file: {}", path))?;
        let delay = {
            let mut delays = self.read_delays.lock().unwrap();
            delays.get_mut(path).and_then(|q| q.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(content)
    }

    async fn create(&self, path: &str, content: &str) -> anyhow::Result<DocumentFile> {
        if self.files.contains_key(path) {
            anyhow::bail!("File already exists: {}", path);
        }
        Ok(self.insert(path, content))
    }
}

/// Host metadata index over a [`MemoryVault`]; indexes `.md` files only.
pub struct MemoryIndex {
    vault: Arc<MemoryVault>,
    unresolved: Mutex<Vec<String>>,
    ready: AtomicBool,
}

impl MemoryIndex {
    pub fn new(vault: Arc<MemoryVault>) -> Self {
        Self {
            vault,
            unresolved: Mutex::new(Vec::new()),
            ready: AtomicBool::new(true),
        }
    }

    /// While not ready the index reports no frontmatter, like a host that
    /// is still indexing at startup.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_unresolved(&self, links: &[&str]) {
        *self.unresolved.lock().unwrap() = links.iter().map(|s| s.to_string()).collect();
    }
}

impl MetadataIndex for MemoryIndex {
    fn frontmatter(&self, path: &str) -> Option<Metadata> {
        if !self.ready.load(Ordering::SeqCst) || !extension(path).eq_ignore_ascii_case("md") {
            return None;
        }
        let content = self.vault.content(path)?;
        parse_frontmatter(path, &content).ok().flatten()
    }

    fn unresolved_links(&self) -> Vec<String> {
        self.unresolved.lock().unwrap().clone()
    }
}
