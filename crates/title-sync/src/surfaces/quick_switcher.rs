use super::{hook_patch, SurfaceCore, SurfaceState, Synchronizer};
use crate::engine::SyncContext;
use crate::host::{ChooseFn, HostEvent, QuickSwitcher, SuggestFn};
use std::sync::{Arc, Weak};
use title_core::search::{Candidate, SearchHit, SearchOptions};
use title_core::settings::Surface;
use title_core::vault;

/// Path for a document created from the switcher: markdown unless the
/// typed name already ends in a supported document extension.
pub fn new_document_path(name: &str, mdx_enabled: bool) -> String {
    vault::document_path(name.trim().trim_start_matches('/'), mdx_enabled)
}

/// The quick switcher: title search, open on choose, create when asked.
pub struct QuickSwitcherSync {
    ctx: Arc<SyncContext>,
    host: Option<Arc<dyn QuickSwitcher>>,
    core: SurfaceCore,
}

impl QuickSwitcherSync {
    pub fn new(ctx: &Arc<SyncContext>, host: Option<Arc<dyn QuickSwitcher>>) -> Arc<Self> {
        Arc::new(Self {
            ctx: Arc::clone(ctx),
            host,
            core: SurfaceCore::new(Surface::QuickSwitcher),
        })
    }

    fn search_fn(&self) -> SuggestFn {
        let ctx = Arc::clone(&self.ctx);
        Arc::new(move |query: &str| {
            ctx.search(query, &SearchOptions::quick_switch(&ctx.settings.get()))
        })
    }

    fn choose_fn(&self, host: &Arc<dyn QuickSwitcher>) -> ChooseFn {
        let ctx = Arc::clone(&self.ctx);
        let host = Arc::downgrade(host);
        Arc::new(move |hit: &SearchHit| match &hit.candidate {
            Candidate::File(record) => open(&ctx, &host, &record.path),
            Candidate::Unresolved(name) | Candidate::Create(name) => {
                let path = new_document_path(name, ctx.settings.get().mdx_support);
                create_and_open(&ctx, &host, path);
            }
        })
    }
}

fn open(ctx: &SyncContext, host: &Weak<dyn QuickSwitcher>, path: &str) {
    let Some(host) = host.upgrade() else { return };
    if let Err(e) = host.open(path) {
        ctx.notify(&format!("Could not open {}: {:#}", path, e));
    }
}

fn create_and_open(ctx: &Arc<SyncContext>, host: &Weak<dyn QuickSwitcher>, path: String) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        ctx.notify(&format!("Could not create {}: no runtime", path));
        return;
    };
    let ctx = Arc::clone(ctx);
    let host = host.clone();
    runtime.spawn(async move {
        match ctx.vault.create(&path, "").await {
            Ok(file) => {
                tracing::info!("Created {} from quick switcher", file.path);
                open(&ctx, &host, &file.path);
            }
            Err(e) => ctx.notify(&format!("Could not create {}: {:#}", path, e)),
        }
    });
}

impl Synchronizer for QuickSwitcherSync {
    fn surface(&self) -> Surface {
        Surface::QuickSwitcher
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        let Some(host) = self.core.require(&self.host, "quick switcher") else {
            return;
        };
        let suggestions = host.suggestions();
        let choose = host.choose();
        let search = self.search_fn();
        let chosen = self.choose_fn(host);
        self.core.activate(|patches| {
            patches.apply(hook_patch(&suggestions, search));
            patches.apply(hook_patch(&choose, chosen));
            Ok(())
        });
    }

    fn disable(&self) {
        self.core.deactivate(&self.ctx.watcher);
    }

    fn refresh(&self) {}

    fn handle(&self, _event: &HostEvent) {}
}
