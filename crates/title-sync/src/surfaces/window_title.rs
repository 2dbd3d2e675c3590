use super::{SurfaceCore, SurfaceState, Synchronizer};
use crate::engine::SyncContext;
use crate::host::WindowFrame;
use std::sync::Arc;
use title_core::settings::Surface;
use title_core::vault;

/// The OS window title, which the host builds from the active file name.
pub struct WindowTitleSync {
    ctx: Arc<SyncContext>,
    host: Option<Arc<dyn WindowFrame>>,
    core: SurfaceCore,
}

impl WindowTitleSync {
    pub fn new(ctx: &Arc<SyncContext>, host: Option<Arc<dyn WindowFrame>>) -> Arc<Self> {
        Arc::new(Self {
            ctx: Arc::clone(ctx),
            host,
            core: SurfaceCore::new(Surface::WindowTitle),
        })
    }
}

/// Replace the first occurrence of `basename` in the host's title.
fn retitle(native: &str, basename: &str, display: &str) -> Option<String> {
    if basename.is_empty() || !native.contains(basename) {
        return None;
    }
    Some(native.replacen(basename, display, 1))
}

impl Synchronizer for WindowTitleSync {
    fn surface(&self) -> Surface {
        Surface::WindowTitle
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        if self.core.require(&self.host, "window frame").is_none() {
            return;
        }
        if self.core.activate(|_| Ok(())) {
            self.refresh();
        }
    }

    fn disable(&self) {
        self.core.deactivate(&self.ctx.watcher);
    }

    fn refresh(&self) {
        let Some(host) = &self.host else { return };
        self.core.render(|| {
            let title = host.title();
            let desired = host.active_document().and_then(|path| {
                let display = self.ctx.custom_display(&path)?;
                let native = self.core.labels().native_text(&title);
                retitle(&native, vault::basename(&path), &display)
            });
            self.core.sync_labels([(title, desired)]);
        });
    }
}
