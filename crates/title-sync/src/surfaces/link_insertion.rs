use super::{hook_patch, SurfaceCore, SurfaceState, Synchronizer};
use crate::engine::SyncContext;
use crate::host::{ChooseFn, Cursor, Editor, HostEvent, LinkSuggest, NameFn, SuggestFn};
use anyhow::{anyhow, Context};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use title_core::link_text::{find_link_trigger, format_wikilink};
use title_core::patch::Slot;
use title_core::search::{Candidate, SearchHit, SearchOptions};
use title_core::settings::Surface;

/// The `[[` autocomplete: searches by title and inserts `[[target|Title]]`.
///
/// The host creates its suggester lazily, so the source can be bound (or
/// rebound) after the surface was enabled.
pub struct LinkInsertionSync {
    ctx: Arc<SyncContext>,
    source: RwLock<Option<Arc<dyn LinkSuggest>>>,
    core: SurfaceCore,
    wanted: AtomicBool,
}

impl LinkInsertionSync {
    pub fn new(ctx: &Arc<SyncContext>, source: Option<Arc<dyn LinkSuggest>>) -> Arc<Self> {
        Arc::new(Self {
            ctx: Arc::clone(ctx),
            source: RwLock::new(source),
            core: SurfaceCore::new(Surface::LinkInsertion),
            wanted: AtomicBool::new(false),
        })
    }

    /// Move our patches to `source`. The previous source gets its own
    /// behavior back.
    pub fn set_source(&self, source: Arc<dyn LinkSuggest>) {
        self.core.deactivate(&self.ctx.watcher);
        *self.source.write().unwrap_or_else(|e| e.into_inner()) = Some(source);
        if self.wanted.load(Ordering::SeqCst) {
            self.install();
        }
    }

    fn current_source(&self) -> Option<Arc<dyn LinkSuggest>> {
        self.source
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn install(&self) {
        let source = self.current_source();
        let Some(source) = self.core.require(&source, "link suggester") else {
            return;
        };

        let suggestions = source.suggestions();
        let select = source.select();
        let link_text = source.link_text();
        let search = self.search_fn();
        let choose = self.choose_fn(source, select.get());
        let text = self.link_text_fn(link_text.get());

        self.core.activate(|patches| {
            patches.apply(hook_patch(&suggestions, search));
            patches.apply(hook_patch(&select, choose));
            patches.apply(hook_patch(&link_text, text));
            Ok(())
        });
    }

    fn search_fn(&self) -> SuggestFn {
        let ctx = Arc::clone(&self.ctx);
        Arc::new(move |query: &str| {
            ctx.search(query, &SearchOptions::link_suggest(&ctx.settings.get()))
        })
    }

    fn choose_fn(&self, source: &Arc<dyn LinkSuggest>, native: ChooseFn) -> ChooseFn {
        let ctx = Arc::clone(&self.ctx);
        let source = Arc::downgrade(source);
        Arc::new(move |hit: &SearchHit| {
            let Some(editor) = source.upgrade().and_then(|s| s.active_editor()) else {
                native(hit);
                return;
            };
            if let Err(e) = insert_link(editor.as_ref(), hit) {
                ctx.notify(&format!("Could not insert link: {:#}", e));
            }
        })
    }

    fn link_text_fn(&self, native: NameFn) -> NameFn {
        let ctx = Arc::clone(&self.ctx);
        Arc::new(move |path: &str| match ctx.display_record(path) {
            Some(record) if record.is_custom_display => format_wikilink(path, Some(&record)),
            _ => native(path),
        })
    }
}

/// The wikilink written for a chosen suggestion.
pub fn link_for(candidate: &Candidate) -> String {
    match candidate {
        Candidate::File(record) => format_wikilink(&record.path, Some(record)),
        Candidate::Unresolved(name) | Candidate::Create(name) => format!("[[{}]]", name),
    }
}

/// Replace the `[[query` being typed (and any auto-closed `]]`) with the
/// link for `hit`, leaving the cursor after it.
pub fn insert_link(editor: &dyn Editor, hit: &SearchHit) -> anyhow::Result<()> {
    let cursor = editor.cursor();
    let line = editor
        .line(cursor.line)
        .ok_or_else(|| anyhow!("Line {} is out of range", cursor.line))?;
    let trigger = find_link_trigger(&line, cursor.ch)
        .ok_or_else(|| anyhow!("No link is being typed at the cursor"))?;

    let link = link_for(&hit.candidate);
    editor
        .replace_range(cursor.line, trigger.start, trigger.end, &link)
        .context("Failed to replace link text")?;
    editor.set_cursor(Cursor {
        line: cursor.line,
        ch: trigger.start + link.len(),
    })?;
    Ok(())
}

impl Synchronizer for LinkInsertionSync {
    fn surface(&self) -> Surface {
        Surface::LinkInsertion
    }

    fn state(&self) -> SurfaceState {
        self.core.state()
    }

    fn enable(&self) {
        self.wanted.store(true, Ordering::SeqCst);
        self.install();
    }

    fn disable(&self) {
        self.wanted.store(false, Ordering::SeqCst);
        self.core.deactivate(&self.ctx.watcher);
    }

    /// Patched behavior reads the display cache on every call.
    fn refresh(&self) {}

    fn handle(&self, _event: &HostEvent) {}
}
