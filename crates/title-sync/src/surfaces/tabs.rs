use super::{SurfaceCore, SurfaceState, Synchronizer};
use crate::engine::SyncContext;
use crate::host::TabStrip;
use std::sync::{Arc, Weak};
use title_core::settings::Surface;
use title_core::watcher::StructuralChange;

/// Tab header captions.
pub struct TabsSync {
    ctx: Arc<SyncContext>,
    host: Option<Arc<dyn TabStrip>>,
    core: SurfaceCore,
    this: Weak<Self>,
}

impl TabsSync {
    pub fn new(ctx: &Arc<SyncContext>, host: Option<Arc<dyn TabStrip>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            ctx: Arc::clone(ctx),
            host,
            core: SurfaceCore::new(Surface::Tabs),
            this: this.clone(),
        })
    }
}

impl Synchronizer for TabsSync {
    fn surface(&self) -> Surface {
        Surface::Tabs
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        if self.core.require(&self.host, "tab strip").is_none() {
            return;
        }
        if self.core.activate(|_| Ok(())) {
            // New tabs and re-rendered headers replace our text.
            self.core.watch(
                &self.ctx.watcher,
                self.this.clone(),
                Box::new(|c: &StructuralChange| c.element == "tab-header"),
            );
            self.refresh();
        }
    }

    fn disable(&self) {
        self.core.deactivate(&self.ctx.watcher);
    }

    fn refresh(&self) {
        let Some(host) = &self.host else { return };
        self.core.render(|| {
            self.core
                .render_labels(host.headers(), |path| self.ctx.custom_display(path));
        });
    }
}
