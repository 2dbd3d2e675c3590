use super::{hook_patch, SurfaceCore, SurfaceState, Synchronizer, TaskSlot};
use crate::engine::SyncContext;
use crate::host::{GraphView, HostEvent, NameFn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use title_core::error::SurfaceError;
use title_core::patch::Slot;
use title_core::settings::Surface;
use title_core::watcher::{poll_until, RetryPolicy};
use tokio::sync::broadcast::error::RecvError;

/// Node captions of the graph view.
///
/// The graph loads lazily, so enabling before it has nodes schedules a
/// bounded retry instead of failing.
pub struct GraphSync {
    ctx: Arc<SyncContext>,
    host: Option<Arc<dyn GraphView>>,
    core: SurfaceCore,
    /// Set by `enable`, cleared by `disable`. A pending retry only
    /// activates while this holds.
    wanted: AtomicBool,
    retrying: AtomicBool,
    retry: TaskSlot,
    listener: TaskSlot,
    retry_policy: RetryPolicy,
    this: Weak<Self>,
}

impl GraphSync {
    pub fn new(ctx: &Arc<SyncContext>, host: Option<Arc<dyn GraphView>>) -> Arc<Self> {
        Self::with_retry(ctx, host, RetryPolicy::default())
    }

    pub fn with_retry(
        ctx: &Arc<SyncContext>,
        host: Option<Arc<dyn GraphView>>,
        retry_policy: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            ctx: Arc::clone(ctx),
            host,
            core: SurfaceCore::new(Surface::Graph),
            wanted: AtomicBool::new(false),
            retrying: AtomicBool::new(false),
            retry: TaskSlot::default(),
            listener: TaskSlot::default(),
            retry_policy,
            this: this.clone(),
        })
    }

    fn retry_when_loaded(&self, host: &Arc<dyn GraphView>) {
        if self.retrying.swap(true, Ordering::SeqCst) {
            return;
        }
        let host = Arc::clone(host);
        let this = self.this.clone();
        let policy = self.retry_policy;
        let spawned = self.retry.spawn(async move {
            let loaded = poll_until(policy, || {
                let ready = host.node_count() > 0;
                async move { ready }
            })
            .await;

            let Some(sync) = this.upgrade() else { return };
            sync.retrying.store(false, Ordering::SeqCst);
            if !loaded {
                tracing::debug!("Graph view never loaded, node labels left native");
                return;
            }
            if sync.wanted.load(Ordering::SeqCst) {
                sync.enable();
            }
        });
        if !spawned {
            self.retrying.store(false, Ordering::SeqCst);
        }
    }

    /// Redraw as background frontmatter reads land.
    fn listen(&self, host: &Arc<dyn GraphView>) {
        let mut resolved = self.ctx.display.metadata().subscribe();
        let host = Arc::clone(host);
        self.listener.spawn(async move {
            loop {
                match resolved.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => host.redraw(),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

impl Synchronizer for GraphSync {
    fn surface(&self) -> Surface {
        Surface::Graph
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        let Some(host) = self.core.require(&self.host, "graph view") else {
            return;
        };
        self.wanted.store(true, Ordering::SeqCst);
        if host.node_count() == 0 {
            self.core.report(&SurfaceError::NotReady("graph view"));
            self.retry_when_loaded(host);
            return;
        }

        let slot = host.node_label();
        let ctx = Arc::clone(&self.ctx);
        let native = slot.get();
        let caption: NameFn = Arc::new(move |path: &str| {
            ctx.custom_display(path).unwrap_or_else(|| native(path))
        });
        if self.core.activate(|patches| {
            patches.apply(hook_patch(&slot, caption));
            Ok(())
        }) {
            self.listen(host);
            host.redraw();
        }
    }

    fn disable(&self) {
        self.wanted.store(false, Ordering::SeqCst);
        self.retry.abort();
        self.retrying.store(false, Ordering::SeqCst);
        self.listener.abort();
        if self.core.deactivate(&self.ctx.watcher) {
            if let Some(host) = &self.host {
                host.redraw();
            }
        }
    }

    fn refresh(&self) {
        let Some(host) = &self.host else { return };
        self.core.render(|| host.redraw());
    }

    fn handle(&self, event: &HostEvent) {
        match event {
            HostEvent::MetadataChanged(_)
            | HostEvent::Modified(_)
            | HostEvent::Created(_)
            | HostEvent::Deleted(_)
            | HostEvent::Renamed { .. } => self.refresh(),
            _ => {}
        }
    }
}
