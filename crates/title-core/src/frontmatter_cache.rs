use crate::frontmatter::FrontmatterAccessor;
use crate::vault::Metadata;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

type CachedMetadata = Option<Arc<Metadata>>;
type ReadFuture = Shared<BoxFuture<'static, CachedMetadata>>;

/// Result of a non-blocking cache lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    /// A read completed. `None` means the document is confirmed to have no frontmatter.
    Hit(CachedMetadata),
    /// Never looked up. A background read has been started.
    Miss,
    /// A read is in flight. Carries the previously known value, if any.
    Pending(CachedMetadata),
}

enum Slot {
    Pending {
        generation: u64,
        read: ReadFuture,
        stale: CachedMetadata,
    },
    Ready(CachedMetadata),
    /// Invalidated; the old value is kept until a refresh lands.
    Stale(CachedMetadata),
}

/// Memoizes the async frontmatter path per document.
///
/// At most one read per path is in flight; concurrent callers await the same
/// read. A read only commits if no newer read for the same path was issued
/// after it started, so results land in request order, not completion order.
pub struct FrontmatterCache {
    accessor: Arc<FrontmatterAccessor>,
    slots: Arc<DashMap<String, Slot>>,
    next_generation: Arc<AtomicU64>,
    resolved_tx: broadcast::Sender<String>,
}

impl FrontmatterCache {
    pub fn new(accessor: Arc<FrontmatterAccessor>) -> Self {
        let (resolved_tx, _) = broadcast::channel(256);
        Self {
            accessor,
            slots: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
            resolved_tx,
        }
    }

    pub fn accessor(&self) -> &Arc<FrontmatterAccessor> {
        &self.accessor
    }

    /// Paths whose background read committed, for surfaces that need to re-render.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.resolved_tx.subscribe()
    }

    pub async fn get(&self, path: &str) -> CachedMetadata {
        let read = match self.slots.entry(path.to_string()) {
            Entry::Occupied(mut e) => match e.get() {
                Slot::Ready(value) => return value.clone(),
                Slot::Pending { read, .. } => read.clone(),
                Slot::Stale(value) => {
                    let stale = value.clone();
                    let (generation, read) = self.start_read(path);
                    e.insert(Slot::Pending {
                        generation,
                        read: read.clone(),
                        stale,
                    });
                    read
                }
            },
            Entry::Vacant(e) => {
                let (generation, read) = self.start_read(path);
                e.insert(Slot::Pending {
                    generation,
                    read: read.clone(),
                    stale: None,
                });
                read
            }
        };
        read.await
    }

    /// Never blocks. Misses and stale entries start a background read.
    pub fn get_sync(&self, path: &str) -> Lookup {
        let (lookup, read) = match self.slots.entry(path.to_string()) {
            Entry::Occupied(mut e) => match e.get() {
                Slot::Ready(value) => return Lookup::Hit(value.clone()),
                Slot::Pending { stale, .. } => return Lookup::Pending(stale.clone()),
                Slot::Stale(value) => {
                    let stale = value.clone();
                    let (generation, read) = self.start_read(path);
                    e.insert(Slot::Pending {
                        generation,
                        read: read.clone(),
                        stale: stale.clone(),
                    });
                    (Lookup::Pending(stale), read)
                }
            },
            Entry::Vacant(e) => {
                let (generation, read) = self.start_read(path);
                e.insert(Slot::Pending {
                    generation,
                    read: read.clone(),
                    stale: None,
                });
                (Lookup::Miss, read)
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(read);
            }
            // The next `get` for this path polls the pending read instead.
            Err(_) => tracing::debug!("No runtime for background read of {}", path),
        }
        lookup
    }

    /// Mark an entry stale. Any read in flight for it will not commit.
    pub fn invalidate(&self, path: &str) {
        if let Some(mut slot) = self.slots.get_mut(path) {
            let stale = match &*slot {
                Slot::Ready(value) | Slot::Stale(value) => value.clone(),
                Slot::Pending { stale, .. } => stale.clone(),
            };
            *slot = Slot::Stale(stale);
        }
    }

    /// Drop an entry entirely (document deleted or renamed away).
    pub fn forget(&self, path: &str) {
        self.slots.remove(path);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    fn start_read(&self, path: &str) -> (u64, ReadFuture) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let accessor = Arc::clone(&self.accessor);
        let slots = Arc::clone(&self.slots);
        let resolved_tx = self.resolved_tx.clone();
        let path = path.to_string();

        let read = async move {
            let value = accessor.get(&path).await.map(Arc::new);
            let committed = match slots.get_mut(&path) {
                Some(mut slot) => match &*slot {
                    Slot::Pending { generation: g, .. } if *g == generation => {
                        *slot = Slot::Ready(value.clone());
                        true
                    }
                    _ => false,
                },
                None => false,
            };
            if committed {
                // No receivers is fine.
                let _ = resolved_tx.send(path);
            } else {
                tracing::debug!("Discarding superseded frontmatter read for {}", path);
            }
            value
        };
        (generation, read.boxed().shared())
    }
}
