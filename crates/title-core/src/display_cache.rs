use crate::frontmatter::SyncMetadata;
use crate::frontmatter_cache::{FrontmatterCache, Lookup};
use crate::resolver::{resolve, DisplayRecord};
use crate::vault::DocumentFile;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Path-keyed index of every known document's display record.
///
/// All surfaces and the search adapter read from here. Reads never wait.
/// Writes (`rebuild`, `update`, `rename`, `invalidate`) queue on a FIFO
/// writer lock, so a rebuild is never interleaved with a single-document
/// update and updates for the same path apply in the order they were issued.
pub struct FileDisplayCache {
    records: DashMap<String, DisplayRecord>,
    writer: Mutex<()>,
    metadata: Arc<FrontmatterCache>,
    property_key: RwLock<String>,
}

impl FileDisplayCache {
    pub fn new(metadata: Arc<FrontmatterCache>, property_key: &str) -> Self {
        Self {
            records: DashMap::new(),
            writer: Mutex::new(()),
            metadata,
            property_key: RwLock::new(property_key.to_string()),
        }
    }

    pub fn property_key(&self) -> String {
        self.property_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Takes effect on the next resolution; callers rebuild afterwards.
    pub fn set_property_key(&self, key: &str) {
        *self.property_key.write().unwrap_or_else(|e| e.into_inner()) = key.to_string();
    }

    pub fn metadata(&self) -> &Arc<FrontmatterCache> {
        &self.metadata
    }

    /// Resolve every document and replace the whole index with the result.
    pub async fn rebuild(&self, files: Vec<DocumentFile>) {
        let _writer = self.writer.lock().await;
        let resolved = join_all(files.iter().map(|f| self.resolve_file(f))).await;
        let fresh: HashMap<String, DisplayRecord> = resolved
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();

        for (path, record) in &fresh {
            self.records.insert(path.clone(), record.clone());
        }
        self.records.retain(|path, _| fresh.contains_key(path));

        tracing::info!("Display cache rebuilt: {} documents", fresh.len());
    }

    /// Re-resolve one document after its content or metadata changed.
    /// A path that no longer exists is dropped.
    pub async fn update(&self, file: Option<DocumentFile>, path: &str) {
        // Issued now, so any read already in flight for this path is superseded.
        self.metadata.invalidate(path);
        let _writer = self.writer.lock().await;
        match file {
            Some(file) => {
                let record = self.resolve_file(&file).await;
                tracing::debug!("Display cache updated: {} -> {:?}", path, record.display_name);
                self.records.insert(path.to_string(), record);
            }
            None => {
                self.records.remove(path);
            }
        }
    }

    /// Move an entry: the old path disappears, the new one is resolved.
    pub async fn rename(&self, old_path: &str, file: DocumentFile) {
        self.metadata.forget(old_path);
        self.metadata.invalidate(&file.path);
        let _writer = self.writer.lock().await;
        self.records.remove(old_path);
        let record = self.resolve_file(&file).await;
        self.records.insert(file.path.clone(), record);
    }

    /// Remove one entry (document deleted).
    pub async fn invalidate(&self, path: &str) {
        self.metadata.forget(path);
        let _writer = self.writer.lock().await;
        self.records.remove(path);
    }

    pub fn get(&self, path: &str) -> Option<DisplayRecord> {
        self.records.get(path).map(|r| r.clone())
    }

    /// Snapshot of every record, in no particular order.
    pub fn all(&self) -> Vec<DisplayRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best answer available right now without waiting, for callers that
    /// cannot await. Falls back to the basename while a parse is pending.
    pub fn resolve_sync(&self, file: &DocumentFile) -> DisplayRecord {
        if let Some(record) = self.get(&file.path) {
            return record;
        }
        let key = self.property_key();
        let metadata = match self.metadata.accessor().get_sync(file) {
            SyncMetadata::Known(metadata) => metadata.map(Arc::new),
            SyncMetadata::RequiresAsync => match self.metadata.get_sync(&file.path) {
                Lookup::Hit(metadata) | Lookup::Pending(metadata) => metadata,
                Lookup::Miss => None,
            },
        };
        resolve(file, metadata.as_deref(), &key)
    }

    async fn resolve_file(&self, file: &DocumentFile) -> DisplayRecord {
        let key = self.property_key();
        let metadata = match self.metadata.accessor().get_sync(file) {
            SyncMetadata::Known(metadata) => metadata.map(Arc::new),
            SyncMetadata::RequiresAsync => self.metadata.get(&file.path).await,
        };
        resolve(file, metadata.as_deref(), &key)
    }
}
