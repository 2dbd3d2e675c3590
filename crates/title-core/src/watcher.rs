use dashmap::DashMap;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

/// Quiet period before a batch of structural changes is delivered.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Something in the host UI was added, removed, or re-rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuralChange {
    /// Host view type the change happened in, e.g. `"file-explorer"`.
    pub view: String,
    /// Kind of element affected, e.g. `"tab-header"`.
    pub element: String,
}

impl StructuralChange {
    pub fn new(view: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            element: element.into(),
        }
    }
}

pub type SubscriptionId = u64;
pub type ChangePredicate = Box<dyn Fn(&StructuralChange) -> bool + Send + Sync>;
pub type ChangeCallback =
    Arc<dyn Fn(Vec<StructuralChange>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct Batch {
    changes: Vec<StructuralChange>,
    last_change: Option<Instant>,
    scheduled: bool,
}

struct Subscription {
    predicate: ChangePredicate,
    callback: ChangeCallback,
    active: AtomicBool,
    batch: Mutex<Batch>,
}

impl Subscription {
    fn is_ready(&self, debounce: Duration) -> bool {
        let batch = self.batch.lock().unwrap_or_else(|e| e.into_inner());
        batch
            .last_change
            .map_or(true, |t| t.elapsed() >= debounce)
    }

    fn take(&self) -> Vec<StructuralChange> {
        let mut batch = self.batch.lock().unwrap_or_else(|e| e.into_inner());
        batch.scheduled = false;
        batch.last_change = None;
        std::mem::take(&mut batch.changes)
    }
}

/// Coalesces bursts of host UI changes into one callback per subscriber.
///
/// Each change resets the subscriber's quiet timer; the callback runs once no
/// matching change has arrived for the debounce window.
pub struct StructureWatcher {
    subscriptions: DashMap<SubscriptionId, Arc<Subscription>>,
    next_id: AtomicU64,
    debounce: Duration,
}

impl Default for StructureWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl StructureWatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            debounce,
        }
    }

    pub fn subscribe(&self, predicate: ChangePredicate, callback: ChangeCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.insert(
            id,
            Arc::new(Subscription {
                predicate,
                callback,
                active: AtomicBool::new(true),
                batch: Mutex::new(Batch::default()),
            }),
        );
        id
    }

    /// A batch already waiting for its quiet period is dropped.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some((_, sub)) = self.subscriptions.remove(&id) {
            sub.active.store(false, Ordering::SeqCst);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn notify(&self, change: StructuralChange) {
        let matching: Vec<Arc<Subscription>> = self
            .subscriptions
            .iter()
            .filter(|entry| (entry.value().predicate)(&change))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for sub in matching {
            let first = {
                let mut batch = sub.batch.lock().unwrap_or_else(|e| e.into_inner());
                batch.changes.push(change.clone());
                batch.last_change = Some(Instant::now());
                !std::mem::replace(&mut batch.scheduled, true)
            };
            if first {
                self.schedule(sub);
            }
        }
    }

    fn schedule(&self, sub: Arc<Subscription>) {
        let debounce = self.debounce;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    loop {
                        tokio::time::sleep(debounce).await;
                        if sub.is_ready(debounce) {
                            break;
                        }
                    }
                    let changes = sub.take();
                    if sub.active.load(Ordering::SeqCst) && !changes.is_empty() {
                        (sub.callback)(changes).await;
                    }
                });
            }
            Err(_) => {
                tracing::warn!("Structural change arrived outside a runtime, dropping");
                sub.take();
            }
        }
    }
}

/// Fixed-interval polling with a cap on attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 10,
        }
    }
}

/// Run `check` until it returns true or attempts run out. The first check
/// happens immediately.
pub async fn poll_until<F, Fut>(policy: RetryPolicy, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        if check().await {
            return true;
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    false
}
