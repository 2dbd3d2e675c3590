//! In-memory host used by the surface and engine tests.

use crate::config::tests::MemoryStore;
use crate::engine::{HostServices, TitleSync};
use crate::host::{
    BacklinkPane, BookmarkDialog, ChooseFn, Cursor, Editor, FileTree, GraphView, HostHooks, Label,
    LinkSuggest, NameFn, Notifier, QuickSwitcher, SuggestFn, TabStrip, WindowFrame,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use title_core::link_text::link_target;
use title_core::patch::{HookSlot, Slot};
use title_core::search::SearchHit;
use title_core::testing::{MemoryIndex, MemoryVault};
use title_core::vault;

// === Labels ===

pub struct FakeLabel {
    id: u64,
    document: Mutex<Option<String>>,
    text: Mutex<String>,
    writes: AtomicUsize,
}

impl FakeLabel {
    pub fn new(id: u64, document: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            document: Mutex::new(Some(document.to_string())),
            text: Mutex::new(text.to_string()),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    /// Writes made through [`Label::set_text`].
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The host reuses this element for another document.
    pub fn recycle(&self, document: &str, text: &str) {
        *self.document.lock().unwrap() = Some(document.to_string());
        *self.text.lock().unwrap() = text.to_string();
    }
}

impl Label for FakeLabel {
    fn id(&self) -> u64 {
        self.id
    }

    fn document(&self) -> Option<String> {
        self.document.lock().unwrap().clone()
    }

    fn text(&self) -> String {
        FakeLabel::text(self)
    }

    fn set_text(&self, text: &str) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.text.lock().unwrap() = text.to_string();
    }
}

#[derive(Default)]
pub struct LabelSet(Mutex<Vec<Arc<FakeLabel>>>);

impl LabelSet {
    fn push(&self, label: Arc<FakeLabel>) {
        let mut labels = self.0.lock().unwrap();
        labels.retain(|l| l.id != label.id);
        labels.push(label);
    }

    fn find(&self, id: u64) -> Option<Arc<FakeLabel>> {
        self.0.lock().unwrap().iter().find(|l| l.id == id).cloned()
    }

    fn rendered(&self) -> Vec<Arc<dyn Label>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.clone() as Arc<dyn Label>)
            .collect()
    }

    fn texts(&self) -> Vec<(u64, String)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|l| (l.id, l.text()))
            .collect()
    }
}

// === Surfaces ===

#[derive(Default)]
pub struct FakeTabs {
    headers: LabelSet,
}

impl FakeTabs {
    pub fn label(&self, id: u64) -> Arc<FakeLabel> {
        self.headers.find(id).expect("no such tab")
    }
}

impl TabStrip for FakeTabs {
    fn headers(&self) -> Vec<Arc<dyn Label>> {
        self.headers.rendered()
    }
}

#[derive(Default)]
pub struct FakeTree {
    items: LabelSet,
    folders: LabelSet,
}

impl FakeTree {
    pub fn label(&self, id: u64) -> Arc<FakeLabel> {
        self.items
            .find(id)
            .or_else(|| self.folders.find(id))
            .expect("no such row")
    }
}

impl FileTree for FakeTree {
    fn items(&self) -> Vec<Arc<dyn Label>> {
        self.items.rendered()
    }

    fn folders(&self) -> Vec<Arc<dyn Label>> {
        self.folders.rendered()
    }
}

pub struct FakeGraph {
    caption: Arc<HookSlot<NameFn>>,
    nodes: AtomicUsize,
    pub redraws: AtomicUsize,
}

impl FakeGraph {
    fn new() -> Self {
        let native: NameFn = Arc::new(|path: &str| vault::basename(path).to_string());
        Self {
            caption: HookSlot::new("graph.node_label", native),
            nodes: AtomicUsize::new(1),
            redraws: AtomicUsize::new(0),
        }
    }

    /// What the renderer would draw under the node for `path`.
    pub fn caption(&self, path: &str) -> String {
        (self.caption.get())(path)
    }

    pub fn set_nodes(&self, count: usize) {
        self.nodes.store(count, Ordering::SeqCst);
    }
}

impl GraphView for FakeGraph {
    fn node_label(&self) -> Arc<HookSlot<NameFn>> {
        Arc::clone(&self.caption)
    }

    fn node_count(&self) -> usize {
        self.nodes.load(Ordering::SeqCst)
    }

    fn redraw(&self) {
        self.redraws.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeBacklinks {
    entries: LabelSet,
}

impl BacklinkPane for FakeBacklinks {
    fn entries(&self) -> Vec<Arc<dyn Label>> {
        self.entries.rendered()
    }
}

pub struct FakeWindow {
    title: Arc<FakeLabel>,
    active: Mutex<Option<String>>,
}

impl FakeWindow {
    fn new() -> Self {
        Self {
            title: FakeLabel::new(0, "", ""),
            active: Mutex::new(None),
        }
    }

    /// The host switches documents and writes its own window title.
    pub fn set_active(&self, path: Option<&str>, title: &str) {
        *self.active.lock().unwrap() = path.map(str::to_string);
        self.title.recycle(path.unwrap_or_default(), title);
    }
}

impl WindowFrame for FakeWindow {
    fn title(&self) -> Arc<dyn Label> {
        self.title.clone()
    }

    fn active_document(&self) -> Option<String> {
        self.active.lock().unwrap().clone()
    }
}

pub struct FakeEditor {
    line: Mutex<String>,
    cursor: Mutex<Cursor>,
}

impl FakeEditor {
    pub fn new(line: &str, ch: usize) -> Self {
        Self {
            line: Mutex::new(line.to_string()),
            cursor: Mutex::new(Cursor { line: 0, ch }),
        }
    }

    pub fn text(&self) -> String {
        self.line.lock().unwrap().clone()
    }
}

impl Editor for FakeEditor {
    fn cursor(&self) -> Cursor {
        *self.cursor.lock().unwrap()
    }

    fn line(&self, line: usize) -> Option<String> {
        (line == 0).then(|| self.text())
    }

    fn replace_range(&self, line: usize, start: usize, end: usize, text: &str) -> anyhow::Result<()> {
        let mut current = self.line.lock().unwrap();
        if line != 0 || start > end || current.get(start..end).is_none() {
            anyhow::bail!("range {}..{} out of bounds", start, end);
        }
        current.replace_range(start..end, text);
        Ok(())
    }

    fn set_cursor(&self, cursor: Cursor) -> anyhow::Result<()> {
        *self.cursor.lock().unwrap() = cursor;
        Ok(())
    }
}

pub struct FakeLinkSuggest {
    suggestions: Arc<HookSlot<SuggestFn>>,
    select: Arc<HookSlot<ChooseFn>>,
    link_text: Arc<HookSlot<NameFn>>,
    editor: Mutex<Option<Arc<FakeEditor>>>,
}

impl FakeLinkSuggest {
    pub fn new() -> Arc<Self> {
        let suggest: SuggestFn = Arc::new(|_: &str| Vec::new());
        let select: ChooseFn = Arc::new(|_: &SearchHit| {});
        let link_text: NameFn = Arc::new(|path: &str| format!("[[{}]]", link_target(path)));
        Arc::new(Self {
            suggestions: HookSlot::new("suggest.get_suggestions", suggest),
            select: HookSlot::new("suggest.select_suggestion", select),
            link_text: HookSlot::new("suggest.link_text", link_text),
            editor: Mutex::new(None),
        })
    }

    pub fn suggest(&self, query: &str) -> Vec<SearchHit> {
        (self.suggestions.get())(query)
    }

    pub fn pick(&self, hit: &SearchHit) {
        (self.select.get())(hit)
    }

    pub fn render_link(&self, path: &str) -> String {
        (self.link_text.get())(path)
    }

    pub fn open_editor(&self, line: &str, ch: usize) {
        *self.editor.lock().unwrap() = Some(Arc::new(FakeEditor::new(line, ch)));
    }

    pub fn editor_text(&self) -> Option<String> {
        self.editor.lock().unwrap().as_ref().map(|e| e.text())
    }
}

impl LinkSuggest for FakeLinkSuggest {
    fn suggestions(&self) -> Arc<HookSlot<SuggestFn>> {
        Arc::clone(&self.suggestions)
    }

    fn select(&self) -> Arc<HookSlot<ChooseFn>> {
        Arc::clone(&self.select)
    }

    fn link_text(&self) -> Arc<HookSlot<NameFn>> {
        Arc::clone(&self.link_text)
    }

    fn active_editor(&self) -> Option<Arc<dyn Editor>> {
        self.editor
            .lock()
            .unwrap()
            .clone()
            .map(|e| e as Arc<dyn Editor>)
    }
}

pub struct FakeSwitcher {
    suggestions: Arc<HookSlot<SuggestFn>>,
    choose: Arc<HookSlot<ChooseFn>>,
    opened: Mutex<Vec<String>>,
}

impl FakeSwitcher {
    fn new() -> Self {
        let suggest: SuggestFn = Arc::new(|_: &str| Vec::new());
        let choose: ChooseFn = Arc::new(|_: &SearchHit| {});
        Self {
            suggestions: HookSlot::new("switcher.get_suggestions", suggest),
            choose: HookSlot::new("switcher.on_choose", choose),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn suggest(&self, query: &str) -> Vec<SearchHit> {
        (self.suggestions.get())(query)
    }

    pub fn pick(&self, hit: &SearchHit) {
        (self.choose.get())(hit)
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl QuickSwitcher for FakeSwitcher {
    fn suggestions(&self) -> Arc<HookSlot<SuggestFn>> {
        Arc::clone(&self.suggestions)
    }

    fn choose(&self) -> Arc<HookSlot<ChooseFn>> {
        Arc::clone(&self.choose)
    }

    fn open(&self, path: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

pub struct FakeBookmarks {
    default_title: Arc<HookSlot<NameFn>>,
}

impl FakeBookmarks {
    fn new() -> Self {
        let native: NameFn = Arc::new(|path: &str| vault::basename(path).to_string());
        Self {
            default_title: HookSlot::new("bookmarks.default_title", native),
        }
    }

    /// Text the dialog would pre-fill for `path`.
    pub fn prefill(&self, path: &str) -> String {
        (self.default_title.get())(path)
    }
}

impl BookmarkDialog for FakeBookmarks {
    fn default_title(&self) -> Arc<HookSlot<NameFn>> {
        Arc::clone(&self.default_title)
    }
}

#[derive(Default)]
pub struct FakeNotifier(Mutex<Vec<String>>);

impl Notifier for FakeNotifier {
    fn notice(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

// === Host ===

/// Everything observable about the host, for before/after comparisons.
#[derive(Debug, PartialEq)]
pub struct Snapshot {
    labels: Vec<Vec<(u64, String)>>,
    window: String,
    hooks: Vec<usize>,
}

fn identity<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

pub struct FakeHost {
    pub tabs: Arc<FakeTabs>,
    pub explorer: Arc<FakeTree>,
    pub graph: Arc<FakeGraph>,
    pub backlinks: Arc<FakeBacklinks>,
    pub window: Arc<FakeWindow>,
    pub link_suggest: Arc<FakeLinkSuggest>,
    pub switcher: Arc<FakeSwitcher>,
    pub bookmarks: Arc<FakeBookmarks>,
    pub notifier: Arc<FakeNotifier>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            tabs: Arc::default(),
            explorer: Arc::default(),
            graph: Arc::new(FakeGraph::new()),
            backlinks: Arc::default(),
            window: Arc::new(FakeWindow::new()),
            link_suggest: FakeLinkSuggest::new(),
            switcher: Arc::new(FakeSwitcher::new()),
            bookmarks: Arc::new(FakeBookmarks::new()),
            notifier: Arc::default(),
        }
    }

    pub fn hooks(&self) -> HostHooks {
        HostHooks {
            tabs: Some(self.tabs.clone()),
            explorer: Some(self.explorer.clone()),
            graph: Some(self.graph.clone()),
            backlinks: Some(self.backlinks.clone()),
            window: Some(self.window.clone()),
            link_suggest: Some(self.link_suggest.clone()),
            quick_switcher: Some(self.switcher.clone()),
            bookmarks: Some(self.bookmarks.clone()),
            notifier: Some(self.notifier.clone()),
        }
    }

    pub fn open_tab(&self, id: u64, path: &str, text: &str) {
        self.tabs.headers.push(FakeLabel::new(id, path, text));
    }

    pub fn show_file(&self, id: u64, path: &str, text: &str) {
        self.explorer.items.push(FakeLabel::new(id, path, text));
    }

    pub fn show_folder(&self, id: u64, folder: &str, text: &str) {
        self.explorer.folders.push(FakeLabel::new(id, folder, text));
    }

    pub fn show_backlink(&self, id: u64, path: &str, text: &str) {
        self.backlinks.entries.push(FakeLabel::new(id, path, text));
    }

    pub fn tab_text(&self, id: u64) -> String {
        self.tabs.label(id).text()
    }

    pub fn file_text(&self, id: u64) -> String {
        self.explorer.label(id).text()
    }

    pub fn folder_text(&self, id: u64) -> String {
        self.explorer.label(id).text()
    }

    pub fn backlink_text(&self, id: u64) -> String {
        self.backlinks.entries.find(id).expect("no such entry").text()
    }

    pub fn window_text(&self) -> String {
        self.window.title.text()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notifier.0.lock().unwrap().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            labels: vec![
                self.tabs.headers.texts(),
                self.explorer.items.texts(),
                self.explorer.folders.texts(),
                self.backlinks.entries.texts(),
            ],
            window: self.window_text(),
            hooks: vec![
                identity(&self.graph.caption.get()),
                identity(&self.link_suggest.suggestions.get()),
                identity(&self.link_suggest.select.get()),
                identity(&self.link_suggest.link_text.get()),
                identity(&self.switcher.suggestions.get()),
                identity(&self.switcher.choose.get()),
                identity(&self.bookmarks.default_title.get()),
            ],
        }
    }
}

// === Engine ===

pub async fn engine_with(host: &FakeHost, vault: Arc<MemoryVault>, settings: Value) -> Arc<TitleSync> {
    engine_with_hooks(host.hooks(), vault, settings).await
}

pub async fn engine_with_hooks(
    hooks: HostHooks,
    vault: Arc<MemoryVault>,
    settings: Value,
) -> Arc<TitleSync> {
    let index = Arc::new(MemoryIndex::new(Arc::clone(&vault)));
    engine_with_index(hooks, vault, index, settings).await
}

pub async fn engine_with_index(
    hooks: HostHooks,
    vault: Arc<MemoryVault>,
    index: Arc<MemoryIndex>,
    settings: Value,
) -> Arc<TitleSync> {
    let services = HostServices::new(vault, index, MemoryStore::with(settings)).with_hooks(hooks);
    TitleSync::new(services).await
}
