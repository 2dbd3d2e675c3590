//! Narrow capability traits over the host application's UI.
//!
//! Each surface depends on exactly one of these. A hook the host does not
//! provide is `None` in [`HostHooks`] and the matching surface stays inert.

use std::sync::Arc;
use title_core::patch::{HookSlot, Slot};
use title_core::search::SearchHit;
use title_core::watcher::StructuralChange;

/// A piece of rendered text in the host UI tied to one document or folder.
pub trait Label: Send + Sync {
    /// Stable for the lifetime of the host element, reused when the host
    /// recycles the element for another document.
    fn id(&self) -> u64;
    /// Path of the document (or folder) the element currently shows.
    fn document(&self) -> Option<String>;
    fn text(&self) -> String;
    fn set_text(&self, text: &str);
}

/// Adapts a [`Label`] to the generic patch machinery.
pub struct LabelSlot(pub Arc<dyn Label>);

impl Slot<String> for LabelSlot {
    fn name(&self) -> &str {
        "label"
    }

    fn get(&self) -> String {
        self.0.text()
    }

    fn set(&self, value: String) {
        self.0.set_text(&value);
    }
}

/// Host renderer mapping a document path to the text shown for it.
pub type NameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
/// Host suggestion provider: query in, ranked rows out.
pub type SuggestFn = Arc<dyn Fn(&str) -> Vec<SearchHit> + Send + Sync>;
/// Host handler for a chosen suggestion row.
pub type ChooseFn = Arc<dyn Fn(&SearchHit) + Send + Sync>;

pub trait TabStrip: Send + Sync {
    fn headers(&self) -> Vec<Arc<dyn Label>>;
}

pub trait FileTree: Send + Sync {
    /// Document rows currently rendered.
    fn items(&self) -> Vec<Arc<dyn Label>>;
    /// Folder rows currently rendered; `document()` is the folder path.
    fn folders(&self) -> Vec<Arc<dyn Label>>;
}

pub trait GraphView: Send + Sync {
    /// Callback the graph renderer uses for node captions.
    fn node_label(&self) -> Arc<HookSlot<NameFn>>;
    /// Zero while the graph has not loaded.
    fn node_count(&self) -> usize;
    fn redraw(&self);
}

pub trait BacklinkPane: Send + Sync {
    /// Linked-document headings currently rendered.
    fn entries(&self) -> Vec<Arc<dyn Label>>;
}

pub trait WindowFrame: Send + Sync {
    /// The OS window title.
    fn title(&self) -> Arc<dyn Label>;
    fn active_document(&self) -> Option<String>;
}

/// The host's `[[` link autocomplete.
pub trait LinkSuggest: Send + Sync {
    fn suggestions(&self) -> Arc<HookSlot<SuggestFn>>;
    fn select(&self) -> Arc<HookSlot<ChooseFn>>;
    /// Link text generator, also used for drag-and-drop.
    fn link_text(&self) -> Arc<HookSlot<NameFn>>;
    fn active_editor(&self) -> Option<Arc<dyn Editor>>;
}

pub trait QuickSwitcher: Send + Sync {
    fn suggestions(&self) -> Arc<HookSlot<SuggestFn>>;
    fn choose(&self) -> Arc<HookSlot<ChooseFn>>;
    fn open(&self, path: &str) -> anyhow::Result<()>;
}

pub trait BookmarkDialog: Send + Sync {
    /// Pre-filled title of the bookmark-creation dialog.
    fn default_title(&self) -> Arc<HookSlot<NameFn>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub line: usize,
    /// Byte offset within the line.
    pub ch: usize,
}

pub trait Editor: Send + Sync {
    fn cursor(&self) -> Cursor;
    fn line(&self, line: usize) -> Option<String>;
    fn replace_range(&self, line: usize, start: usize, end: usize, text: &str) -> anyhow::Result<()>;
    fn set_cursor(&self, cursor: Cursor) -> anyhow::Result<()>;
}

/// Visible, dismissible notices. Only failures of user-requested actions go here.
pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

#[derive(Clone, Default)]
pub struct HostHooks {
    pub tabs: Option<Arc<dyn TabStrip>>,
    pub explorer: Option<Arc<dyn FileTree>>,
    pub graph: Option<Arc<dyn GraphView>>,
    pub backlinks: Option<Arc<dyn BacklinkPane>>,
    pub window: Option<Arc<dyn WindowFrame>>,
    pub link_suggest: Option<Arc<dyn LinkSuggest>>,
    pub quick_switcher: Option<Arc<dyn QuickSwitcher>>,
    pub bookmarks: Option<Arc<dyn BookmarkDialog>>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// Host lifecycle and storage events, delivered in host order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    LayoutReady,
    LayoutChanged,
    ActiveDocumentChanged(Option<String>),
    FileOpened(String),
    /// The host's metadata index finished (re)indexing a document.
    MetadataChanged(String),
    /// The host's metadata index finished its initial pass over the vault.
    MetadataResolved,
    Modified(String),
    Created(String),
    Deleted(String),
    Renamed { old_path: String, new_path: String },
    /// A render-tree mutation reported by the host.
    Structure(StructuralChange),
}
