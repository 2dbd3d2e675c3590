use super::{SurfaceCore, SurfaceState, Synchronizer};
use crate::engine::SyncContext;
use crate::host::FileTree;
use std::sync::{Arc, Weak};
use title_core::settings::Surface;
use title_core::vault;
use title_core::watcher::StructuralChange;

const FOLDER_TOKEN: &str = "{{folder}}";

/// Path of the folder note for `folder`, or `None` when folder notes are off.
///
/// `folder_note_path("Projects/Alpha", "{{folder}}", false)` → `"Projects/Alpha/Alpha.md"`
pub fn folder_note_path(folder: &str, pattern: &str, mdx_enabled: bool) -> Option<String> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return None;
    }
    let folder_name = folder.rsplit('/').next().unwrap_or(folder);
    let file = vault::document_path(&pattern.replace(FOLDER_TOKEN, folder_name), mdx_enabled);
    Some(if folder.is_empty() {
        file
    } else {
        format!("{}/{}", folder, file)
    })
}

/// File tree rows, plus folder rows when folder notes are configured.
pub struct ExplorerSync {
    ctx: Arc<SyncContext>,
    host: Option<Arc<dyn FileTree>>,
    core: SurfaceCore,
    this: Weak<Self>,
}

impl ExplorerSync {
    pub fn new(ctx: &Arc<SyncContext>, host: Option<Arc<dyn FileTree>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            ctx: Arc::clone(ctx),
            host,
            core: SurfaceCore::new(Surface::Explorer),
            this: this.clone(),
        })
    }

    fn folder_title(&self, folder: &str, pattern: &str, mdx_enabled: bool) -> Option<String> {
        let note = folder_note_path(folder, pattern, mdx_enabled)?;
        self.ctx.custom_display(&note)
    }
}

impl Synchronizer for ExplorerSync {
    fn surface(&self) -> Surface {
        Surface::Explorer
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        if self.core.require(&self.host, "file tree").is_none() {
            return;
        }
        if self.core.activate(|_| Ok(())) {
            // Virtualized rows are recycled while scrolling.
            self.core.watch(
                &self.ctx.watcher,
                self.this.clone(),
                Box::new(|c: &StructuralChange| c.view == "file-explorer"),
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
            let settings = self.ctx.settings.get();
            let pattern = &settings.folder_note_filename;
            let files = host.items().into_iter().map(|label| {
                let title = label.document().and_then(|path| self.ctx.custom_display(&path));
                (label, title)
            });
            let folders = host.folders().into_iter().map(|label| {
                let title = label
                    .document()
                    .and_then(|folder| self.folder_title(&folder, pattern, settings.mdx_support));
                (label, title)
            });
            self.core.sync_labels(files.chain(folders));
        });
    }
}
