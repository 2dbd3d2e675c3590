use super::{hook_patch, SurfaceCore, SurfaceState, Synchronizer};
use crate::engine::SyncContext;
use crate::host::{BookmarkDialog, HostEvent, NameFn};
use std::sync::Arc;
use title_core::patch::Slot;
use title_core::settings::Surface;

/// Pre-fills the bookmark dialog with the document title.
pub struct BookmarksSync {
    ctx: Arc<SyncContext>,
    host: Option<Arc<dyn BookmarkDialog>>,
    core: SurfaceCore,
}

impl BookmarksSync {
    pub fn new(ctx: &Arc<SyncContext>, host: Option<Arc<dyn BookmarkDialog>>) -> Arc<Self> {
        Arc::new(Self {
            ctx: Arc::clone(ctx),
            host,
            core: SurfaceCore::new(Surface::Bookmarks),
        })
    }
}

impl Synchronizer for BookmarksSync {
    fn surface(&self) -> Surface {
        Surface::Bookmarks
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        let Some(host) = self.core.require(&self.host, "bookmark dialog") else {
            return;
        };
        let slot = host.default_title();
        let native = slot.get();
        let ctx = Arc::clone(&self.ctx);
        let title: NameFn = Arc::new(move |path: &str| {
            ctx.custom_display(path).unwrap_or_else(|| native(path))
        });
        self.core.activate(|patches| {
            patches.apply(hook_patch(&slot, title));
            Ok(())
        });
    }

    fn disable(&self) {
        self.core.deactivate(&self.ctx.watcher);
    }

    fn refresh(&self) {}

    fn handle(&self, _event: &HostEvent) {}
}
