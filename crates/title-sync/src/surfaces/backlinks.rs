use super::{SurfaceCore, SurfaceState, Synchronizer};
use crate::engine::SyncContext;
use crate::host::BacklinkPane;
use std::sync::{Arc, Weak};
use title_core::settings::Surface;
use title_core::watcher::StructuralChange;

/// Headings of linking documents in the backlinks pane.
pub struct BacklinksSync {
    ctx: Arc<SyncContext>,
    host: Option<Arc<dyn BacklinkPane>>,
    core: SurfaceCore,
    this: Weak<Self>,
}

impl BacklinksSync {
    pub fn new(ctx: &Arc<SyncContext>, host: Option<Arc<dyn BacklinkPane>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            ctx: Arc::clone(ctx),
            host,
            core: SurfaceCore::new(Surface::Backlinks),
            this: this.clone(),
        })
    }
}

impl Synchronizer for BacklinksSync {
    fn surface(&self) -> Surface {
        Surface::Backlinks
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        if self.core.require(&self.host, "backlink pane").is_none() {
            return;
        }
        if self.core.activate(|_| Ok(())) {
            self.core.watch(
                &self.ctx.watcher,
                self.this.clone(),
                Box::new(|c: &StructuralChange| c.view == "backlink"),
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
                .render_labels(host.entries(), |path| self.ctx.custom_display(path));
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::fake::{engine_with, FakeHost};
    use crate::host::HostEvent;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use title_core::settings::Surface;
    use title_core::testing::MemoryVault;
    use title_core::watcher::StructuralChange;

    fn vault() -> Arc<MemoryVault> {
        let vault = Arc::new(MemoryVault::new());
        vault.insert("src.md", "---\ntitle: Source Note\n---\nSee [[target]]");
        vault.insert("target.md", "body");
        vault
    }

    #[tokio::test]
    async fn linking_document_shows_title() {
        let host = FakeHost::new();
        host.show_backlink(1, "src.md", "src");
        let engine = engine_with(&host, vault(), json!({})).await;
        engine.start().await;

        assert_eq!(host.backlink_text(1), "Source Note");
        engine.disable(Surface::Backlinks);
        assert_eq!(host.backlink_text(1), "src");
    }

    #[tokio::test(start_paused = true)]
    async fn pane_rerender_is_repatched() {
        let host = FakeHost::new();
        let engine = engine_with(&host, vault(), json!({})).await;
        engine.start().await;

        // The pane lazily renders its entries after the file opens.
        for id in 1..=3 {
            host.show_backlink(id, "src.md", "src");
            engine
                .handle_event(HostEvent::Structure(StructuralChange::new("backlink", "entry")))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        for id in 1..=3 {
            assert_eq!(host.backlink_text(id), "Source Note");
        }
    }
}
