use crate::config::{SettingsManager, SettingsStore};
use crate::host::{HostEvent, HostHooks, LinkSuggest, Notifier};
use crate::surfaces::backlinks::BacklinksSync;
use crate::surfaces::bookmarks::BookmarksSync;
use crate::surfaces::explorer::ExplorerSync;
use crate::surfaces::graph::GraphSync;
use crate::surfaces::link_insertion::LinkInsertionSync;
use crate::surfaces::quick_switcher::QuickSwitcherSync;
use crate::surfaces::tabs::TabsSync;
use crate::surfaces::window_title::WindowTitleSync;
use crate::surfaces::Synchronizer;
use std::sync::Arc;
use title_core::display_cache::FileDisplayCache;
use title_core::frontmatter::{DocumentKind, FrontmatterAccessor};
use title_core::frontmatter_cache::FrontmatterCache;
use title_core::matcher::{DefaultMatcherFactory, MatcherFactory};
use title_core::resolver::DisplayRecord;
use title_core::search::{SearchAdapter, SearchHit, SearchOptions};
use title_core::settings::{Settings, SettingsChange, Surface};
use title_core::vault::{self, DocumentFile, MetadataIndex, Vault};
use title_core::watcher::StructureWatcher;

/// Everything a synchronizer may read. Built once per [`TitleSync`].
pub struct SyncContext {
    pub vault: Arc<dyn Vault>,
    pub index: Arc<dyn MetadataIndex>,
    pub display: Arc<FileDisplayCache>,
    pub settings: SettingsManager,
    pub search: SearchAdapter,
    pub watcher: Arc<StructureWatcher>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl SyncContext {
    /// Cached record, or a non-blocking resolution for documents the cache
    /// has not seen yet.
    pub fn display_record(&self, path: &str) -> Option<DisplayRecord> {
        self.display
            .get(path)
            .or_else(|| self.vault.file(path).map(|f| self.display.resolve_sync(&f)))
    }

    pub fn display_name(&self, path: &str) -> String {
        self.display_record(path)
            .map(|r| r.display_name)
            .unwrap_or_else(|| vault::basename(path).to_string())
    }

    /// The display name only when it comes from frontmatter.
    pub fn custom_display(&self, path: &str) -> Option<String> {
        self.display_record(path)
            .filter(|r| r.is_custom_display)
            .map(|r| r.display_name)
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let unresolved = if options.show_existing_only {
            Vec::new()
        } else {
            self.index.unresolved_links()
        };
        self.search
            .search(query, &self.display.all(), &unresolved, options)
    }

    /// Report a failed user action.
    pub fn notify(&self, message: &str) {
        tracing::error!("{}", message);
        if let Some(notifier) = &self.notifier {
            notifier.notice(message);
        }
    }
}

/// Collaborators the host provides.
pub struct HostServices {
    pub vault: Arc<dyn Vault>,
    pub index: Arc<dyn MetadataIndex>,
    pub store: Arc<dyn SettingsStore>,
    pub matcher: Arc<dyn MatcherFactory>,
    pub hooks: HostHooks,
}

impl HostServices {
    pub fn new(
        vault: Arc<dyn Vault>,
        index: Arc<dyn MetadataIndex>,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            vault,
            index,
            store,
            matcher: Arc::new(DefaultMatcherFactory),
            hooks: HostHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: HostHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn MatcherFactory>) -> Self {
        self.matcher = matcher;
        self
    }
}

/// The engine context: owns the caches, the settings and every synchronizer.
pub struct TitleSync {
    ctx: Arc<SyncContext>,
    accessor: Arc<FrontmatterAccessor>,
    surfaces: Vec<Arc<dyn Synchronizer>>,
    link_insertion: Arc<LinkInsertionSync>,
}

impl TitleSync {
    /// Load settings and wire the components. Nothing is patched until
    /// [`TitleSync::start`].
    pub async fn new(services: HostServices) -> Arc<Self> {
        let settings = SettingsManager::load(services.store).await;
        let current = settings.get();

        let accessor = Arc::new(FrontmatterAccessor::new(
            Arc::clone(&services.vault),
            Arc::clone(&services.index),
            current.mdx_support,
        ));
        let metadata = Arc::new(FrontmatterCache::new(Arc::clone(&accessor)));
        let display = Arc::new(FileDisplayCache::new(metadata, &current.property_key));

        let hooks = services.hooks;
        let ctx = Arc::new(SyncContext {
            vault: services.vault,
            index: services.index,
            display,
            settings,
            search: SearchAdapter::new(services.matcher),
            watcher: Arc::new(StructureWatcher::default()),
            notifier: hooks.notifier.clone(),
        });

        let link_insertion = LinkInsertionSync::new(&ctx, hooks.link_suggest.clone());
        let surfaces: Vec<Arc<dyn Synchronizer>> = vec![
            TabsSync::new(&ctx, hooks.tabs.clone()),
            ExplorerSync::new(&ctx, hooks.explorer.clone()),
            GraphSync::new(&ctx, hooks.graph.clone()),
            BacklinksSync::new(&ctx, hooks.backlinks.clone()),
            WindowTitleSync::new(&ctx, hooks.window.clone()),
            link_insertion.clone(),
            QuickSwitcherSync::new(&ctx, hooks.quick_switcher.clone()),
            BookmarksSync::new(&ctx, hooks.bookmarks.clone()),
        ];

        Arc::new(Self {
            ctx,
            accessor,
            surfaces,
            link_insertion,
        })
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    pub fn settings(&self) -> Settings {
        self.ctx.settings.get()
    }

    /// Build the display cache, then enable every surface whose flag is on.
    pub async fn start(&self) {
        self.build_file_cache().await;
        let settings = self.settings();
        for sync in &self.surfaces {
            if settings.surfaces.get(sync.surface()) {
                sync.enable();
            }
        }
        tracing::info!("Title sync started");
    }

    /// Restore every surface to native host behavior.
    pub fn shutdown(&self) {
        for sync in self.surfaces.iter().rev() {
            sync.disable();
        }
        tracing::info!("Title sync stopped");
    }

    // === Outward API ===

    pub fn resolve_display_name(&self, path: &str) -> String {
        self.ctx.display_name(path)
    }

    /// Re-resolve one document and re-render active surfaces.
    pub async fn invalidate(&self, path: &str) {
        self.update_file_cache(path).await;
        self.refresh_all();
    }

    /// Drop all cached metadata, re-resolve everything, re-render.
    pub async fn rebuild_all(&self) {
        self.ctx.display.metadata().clear();
        self.build_file_cache().await;
        self.refresh_all();
    }

    /// Bind the host's link autocomplete once it exists.
    pub fn set_suggest_source(&self, source: Arc<dyn LinkSuggest>) {
        self.link_insertion.set_source(source);
    }

    pub async fn update_file_cache(&self, path: &str) {
        let file = self.ctx.vault.file(path).filter(|f| self.is_tracked(f));
        self.ctx.display.update(file, path).await;
    }

    pub async fn build_file_cache(&self) {
        let files: Vec<DocumentFile> = self
            .ctx
            .vault
            .files()
            .into_iter()
            .filter(|f| self.is_tracked(f))
            .collect();
        self.ctx.display.rebuild(files).await;
    }

    pub fn surface(&self, surface: Surface) -> Option<&Arc<dyn Synchronizer>> {
        self.surfaces.iter().find(|s| s.surface() == surface)
    }

    pub fn enable(&self, surface: Surface) {
        if let Some(sync) = self.surface(surface) {
            sync.enable();
        }
    }

    pub fn disable(&self, surface: Surface) {
        if let Some(sync) = self.surface(surface) {
            sync.disable();
        }
    }

    pub fn refresh(&self, surface: Surface) {
        if let Some(sync) = self.surface(surface) {
            sync.refresh();
        }
    }

    /// Link autocomplete results for `query`.
    pub fn suggest_links(&self, query: &str) -> Vec<SearchHit> {
        self.ctx
            .search(query, &SearchOptions::link_suggest(&self.settings()))
    }

    /// Quick switcher results for `query`.
    pub fn quick_switch(&self, query: &str) -> Vec<SearchHit> {
        self.ctx
            .search(query, &SearchOptions::quick_switch(&self.settings()))
    }

    // === Events ===

    /// Apply cache maintenance for `event`, then let surfaces react.
    pub async fn handle_event(&self, event: HostEvent) {
        match &event {
            HostEvent::Structure(change) => {
                self.ctx.watcher.notify(change.clone());
                return;
            }
            HostEvent::MetadataResolved => {
                tracing::info!("Host metadata resolved, rebuilding display names");
                self.rebuild_all().await;
                return;
            }
            HostEvent::Modified(path)
            | HostEvent::Created(path)
            | HostEvent::MetadataChanged(path) => {
                self.update_file_cache(path).await;
            }
            HostEvent::Deleted(path) => {
                self.ctx.display.invalidate(path).await;
            }
            HostEvent::Renamed { old_path, new_path } => {
                match self.ctx.vault.file(new_path).filter(|f| self.is_tracked(f)) {
                    Some(file) => self.ctx.display.rename(old_path, file).await,
                    None => {
                        self.ctx.display.invalidate(old_path).await;
                        self.ctx.display.update(None, new_path).await;
                    }
                }
            }
            HostEvent::LayoutReady
            | HostEvent::LayoutChanged
            | HostEvent::ActiveDocumentChanged(_)
            | HostEvent::FileOpened(_) => {}
        }

        for sync in &self.surfaces {
            sync.handle(&event);
        }
    }

    // === Settings ===

    /// Mutate, persist, and propagate only what changed.
    pub async fn update_settings<F>(&self, mutate: F) -> anyhow::Result<SettingsChange>
    where
        F: FnOnce(&mut Settings),
    {
        let change = self.ctx.settings.update(mutate).await?;
        self.apply_change(&change).await;
        Ok(change)
    }

    async fn apply_change(&self, change: &SettingsChange) {
        let settings = self.settings();

        if change.requires_rebuild() {
            self.accessor.set_mdx_enabled(settings.mdx_support);
            self.ctx.display.set_property_key(&settings.property_key);
            self.rebuild_all().await;
        } else if change.folder_note {
            self.refresh(Surface::Explorer);
        }

        for (surface, enabled) in &change.surfaces {
            if *enabled {
                self.enable(*surface);
            } else {
                self.disable(*surface);
            }
        }
    }

    fn refresh_all(&self) {
        for sync in &self.surfaces {
            sync.refresh();
        }
    }

    fn is_tracked(&self, file: &DocumentFile) -> bool {
        self.accessor.kind(&file.path) != DocumentKind::Unsupported
    }
}
