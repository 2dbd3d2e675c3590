//! One synchronizer per host surface, all driven by [`SurfaceCore`].

pub mod backlinks;
pub mod bookmarks;
pub mod explorer;
pub mod graph;
pub mod link_insertion;
pub mod quick_switcher;
pub mod tabs;
pub mod window_title;

use crate::host::{HostEvent, Label, LabelSlot};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use title_core::error::SurfaceError;
use title_core::patch::{HookSlot, Patch, PatchRegistry, Slot};
use title_core::settings::Surface;
use title_core::watcher::{
    ChangeCallback, ChangePredicate, StructuralChange, StructureWatcher, SubscriptionId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    /// No patches applied; the host behaves natively.
    Disabled,
    Patching,
    Active,
    Restoring,
}

/// Entry points called by the engine. None of them fail: errors are logged
/// at this boundary and never reach the host's event dispatch.
pub trait Synchronizer: Send + Sync {
    fn surface(&self) -> Surface;
    fn state(&self) -> SurfaceState;
    /// Idempotent.
    fn enable(&self);
    /// Idempotent. Restores exactly what `enable` replaced.
    fn disable(&self);
    /// Re-render from the display cache. No-op unless active.
    fn refresh(&self);

    fn handle(&self, event: &HostEvent) {
        match event {
            HostEvent::Structure(_) => {}
            _ => self.refresh(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Shared state machine and patch bookkeeping for one synchronizer.
pub struct SurfaceCore {
    surface: Surface,
    state: Mutex<SurfaceState>,
    patches: Mutex<PatchRegistry>,
    labels: Mutex<LabelPatches>,
    subscription: Mutex<Option<SubscriptionId>>,
    rendering: AtomicBool,
    dirty: AtomicBool,
    hook_reported: AtomicBool,
}

impl SurfaceCore {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            state: Mutex::new(SurfaceState::Disabled),
            patches: Mutex::new(PatchRegistry::new()),
            labels: Mutex::new(LabelPatches::default()),
            subscription: Mutex::new(None),
            rendering: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            hook_reported: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SurfaceState {
        *lock(&self.state)
    }

    pub fn is_active(&self) -> bool {
        self.state() == SurfaceState::Active
    }

    /// The hook, or `None` after logging (once) that the host lacks it.
    pub fn require<'a, T: ?Sized>(
        &self,
        hook: &'a Option<Arc<T>>,
        name: &'static str,
    ) -> Option<&'a Arc<T>> {
        if hook.is_none() {
            self.report(&SurfaceError::HookMissing(name));
        }
        hook.as_ref()
    }

    pub fn report(&self, err: &SurfaceError) {
        match err {
            SurfaceError::HookMissing(_) => {
                if !self.hook_reported.swap(true, Ordering::SeqCst) {
                    tracing::warn!("Surface {} disabled: {}", self.surface, err);
                }
            }
            SurfaceError::NotReady(_) => tracing::debug!("Surface {}: {}", self.surface, err),
        }
    }

    /// Disabled → Patching → Active. `install` applies the surface's patches;
    /// if it fails, whatever it applied is reverted and the surface stays
    /// disabled. Returns whether this call activated the surface.
    pub fn activate<F>(&self, install: F) -> bool
    where
        F: FnOnce(&mut PatchRegistry) -> Result<(), SurfaceError>,
    {
        {
            let mut state = lock(&self.state);
            if *state != SurfaceState::Disabled {
                return false;
            }
            *state = SurfaceState::Patching;
        }

        let result = {
            let mut patches = lock(&self.patches);
            let result = install(&mut patches);
            if result.is_err() {
                patches.revert_all();
            }
            result
        };

        let mut state = lock(&self.state);
        match result {
            Ok(()) => {
                *state = SurfaceState::Active;
                tracing::info!("Surface {} enabled", self.surface);
                true
            }
            Err(e) => {
                *state = SurfaceState::Disabled;
                drop(state);
                self.report(&e);
                false
            }
        }
    }

    /// Active → Restoring → Disabled. Returns whether this call deactivated.
    pub fn deactivate(&self, watcher: &StructureWatcher) -> bool {
        {
            let mut state = lock(&self.state);
            if *state != SurfaceState::Active {
                return false;
            }
            *state = SurfaceState::Restoring;
        }

        if let Some(id) = lock(&self.subscription).take() {
            watcher.unsubscribe(id);
        }
        lock(&self.labels).revert_all();
        lock(&self.patches).revert_all();

        *lock(&self.state) = SurfaceState::Disabled;
        tracing::info!("Surface {} disabled", self.surface);
        true
    }

    /// Re-render on structural changes matching `predicate`, coalesced by
    /// the watcher's debounce.
    pub fn watch<S: Synchronizer + 'static>(
        &self,
        watcher: &StructureWatcher,
        this: Weak<S>,
        predicate: ChangePredicate,
    ) {
        let callback: ChangeCallback = Arc::new(move |_changes: Vec<StructuralChange>| {
            if let Some(sync) = this.upgrade() {
                sync.refresh();
            }
            async {}.boxed()
        });
        let id = watcher.subscribe(predicate, callback);
        if let Some(old) = lock(&self.subscription).replace(id) {
            watcher.unsubscribe(old);
        }
    }

    /// Run `pass` while active. A call arriving during a pass (re-entrant or
    /// concurrent) does not interleave with it; the running pass repeats
    /// once more instead.
    pub fn render<F: FnMut()>(&self, mut pass: F) {
        self.dirty.store(true, Ordering::SeqCst);
        loop {
            if self.rendering.swap(true, Ordering::SeqCst) {
                return;
            }
            while self.dirty.swap(false, Ordering::SeqCst) {
                if self.is_active() {
                    pass();
                }
            }
            self.rendering.store(false, Ordering::SeqCst);
            if !self.dirty.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    pub fn labels(&self) -> MutexGuard<'_, LabelPatches> {
        lock(&self.labels)
    }

    /// Show `desired(document)` on each label, or the host's own text where
    /// it returns `None`.
    pub fn render_labels<F>(&self, labels: Vec<Arc<dyn Label>>, desired: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.sync_labels(labels.into_iter().map(|label| {
            let text = label.document().and_then(|doc| desired(&doc));
            (label, text)
        }));
    }

    /// Apply one full render of label texts. Bookkeeping for labels not in
    /// `entries` (no longer rendered by the host) is dropped.
    pub fn sync_labels<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (Arc<dyn Label>, Option<String>)>,
    {
        let mut patches = self.labels();
        let mut live = HashSet::new();
        for (label, text) in entries {
            live.insert(label.id());
            patches.sync(&label, text.as_deref());
        }
        patches.retain(&live);
    }
}

/// Text overrides on host labels, keyed by element id.
///
/// A label whose text no longer equals our replacement has been rewritten by
/// the host (re-render or recycling); its current text becomes the new
/// original and the stale one is never written back.
#[derive(Default)]
pub struct LabelPatches {
    patches: HashMap<u64, Patch<String>>,
}

impl LabelPatches {
    pub fn sync(&mut self, label: &Arc<dyn Label>, desired: Option<&str>) {
        let id = label.id();
        let Some(patch) = self.patches.get_mut(&id) else {
            if let Some(text) = desired.filter(|text| label.text() != *text) {
                let mut patch = Patch::new(Arc::new(LabelSlot(Arc::clone(label))), text.to_string());
                patch.apply();
                self.patches.insert(id, patch);
            }
            return;
        };

        match desired {
            Some(text) => {
                if host_rewrote(patch) {
                    patch.recapture(text.to_string());
                } else if patch.replacement() != text {
                    patch.set_replacement(text.to_string());
                }
            }
            None => {
                let rewrote = host_rewrote(patch);
                if let Some(mut patch) = self.patches.remove(&id) {
                    if !rewrote {
                        patch.revert();
                    }
                }
            }
        }
    }

    /// The text the host itself would show on `label`.
    pub fn native_text(&self, label: &Arc<dyn Label>) -> String {
        match self.patches.get(&label.id()) {
            Some(patch) if !host_rewrote(patch) => patch.original().cloned().unwrap_or_default(),
            _ => label.text(),
        }
    }

    pub fn retain(&mut self, live: &HashSet<u64>) {
        self.patches.retain(|id, _| live.contains(id));
    }

    pub fn revert_all(&mut self) {
        for (_, mut patch) in self.patches.drain() {
            if !host_rewrote(&patch) {
                patch.revert();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// A patch over one of the host's behavior slots.
pub fn hook_patch<T>(slot: &Arc<HookSlot<T>>, replacement: T) -> Patch<T>
where
    T: Clone + Send + Sync + 'static,
{
    Patch::new(Arc::clone(slot) as Arc<dyn Slot<T>>, replacement)
}

fn host_rewrote(patch: &Patch<String>) -> bool {
    patch.target().get() != *patch.replacement()
}

/// A spawned task tied to an active surface.
#[derive(Default)]
pub struct TaskSlot(Mutex<Option<tokio::task::JoinHandle<()>>>);

impl TaskSlot {
    /// Start `task`, aborting the previous one. False when there is no runtime.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                if let Some(old) = lock(&self.0).replace(handle.spawn(task)) {
                    old.abort();
                }
                true
            }
            Err(_) => {
                tracing::debug!("No runtime, background task not started");
                false
            }
        }
    }

    pub fn abort(&self) {
        if let Some(task) = lock(&self.0).take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeLabel;
    use std::sync::atomic::AtomicUsize;

    fn as_label(label: &Arc<FakeLabel>) -> Arc<dyn Label> {
        label.clone()
    }

    // === LabelPatches tests ===

    #[test]
    fn sync_then_revert_restores_host_text() {
        let label = FakeLabel::new(1, "a.md", "a");
        let mut patches = LabelPatches::default();

        patches.sync(&as_label(&label), Some("Alpha"));
        assert_eq!(label.text(), "Alpha");
        assert_eq!(patches.native_text(&as_label(&label)), "a");

        patches.revert_all();
        assert_eq!(label.text(), "a");
        assert!(patches.is_empty());
    }

    #[test]
    fn unchanged_text_is_not_patched() {
        let label = FakeLabel::new(1, "a.md", "Alpha");
        let mut patches = LabelPatches::default();
        patches.sync(&as_label(&label), Some("Alpha"));
        assert!(patches.is_empty());
        assert_eq!(label.writes(), 0);
    }

    #[test]
    fn recycled_label_adopts_new_host_text() {
        let label = FakeLabel::new(1, "a.md", "a");
        let mut patches = LabelPatches::default();
        patches.sync(&as_label(&label), Some("Alpha"));

        label.recycle("b.md", "b");
        patches.sync(&as_label(&label), Some("Beta"));
        assert_eq!(label.text(), "Beta");

        patches.revert_all();
        assert_eq!(label.text(), "b");
    }

    #[test]
    fn dropping_override_keeps_host_rewrite() {
        let label = FakeLabel::new(1, "a.md", "a");
        let mut patches = LabelPatches::default();
        patches.sync(&as_label(&label), Some("Alpha"));

        label.recycle("c.md", "c");
        patches.sync(&as_label(&label), None);
        assert_eq!(label.text(), "c");
        assert!(patches.is_empty());
    }

    #[test]
    fn retain_forgets_vanished_labels() {
        let a = FakeLabel::new(1, "a.md", "a");
        let b = FakeLabel::new(2, "b.md", "b");
        let mut patches = LabelPatches::default();
        patches.sync(&as_label(&a), Some("A"));
        patches.sync(&as_label(&b), Some("B"));

        patches.retain(&HashSet::from([2]));
        assert_eq!(patches.len(), 1);
    }

    // === SurfaceCore tests ===

    #[test]
    fn activate_is_idempotent() {
        let core = SurfaceCore::new(Surface::Tabs);
        let calls = AtomicUsize::new(0);
        assert!(core.activate(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        assert!(!core.activate(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(core.state(), SurfaceState::Active);
    }

    #[test]
    fn failed_install_reverts_partial_patches() {
        let slot = HookSlot::new("text", "host".to_string());
        let core = SurfaceCore::new(Surface::Graph);

        let activated = core.activate(|patches| {
            patches.apply(hook_patch(&slot, "ours".to_string()));
            Err(SurfaceError::NotReady("graph"))
        });

        assert!(!activated);
        assert_eq!(slot.get(), "host");
        assert_eq!(core.state(), SurfaceState::Disabled);
    }

    #[test]
    fn deactivate_only_from_active() {
        let core = SurfaceCore::new(Surface::Tabs);
        let watcher = StructureWatcher::default();
        assert!(!core.deactivate(&watcher));
        core.activate(|_| Ok(()));
        assert!(core.deactivate(&watcher));
        assert!(!core.deactivate(&watcher));
    }

    #[test]
    fn render_skipped_while_disabled() {
        let core = SurfaceCore::new(Surface::Tabs);
        let mut passes = 0;
        core.render(|| passes += 1);
        assert_eq!(passes, 0);
    }

    #[test]
    fn reentrant_render_reruns_instead_of_nesting() {
        let core = Arc::new(SurfaceCore::new(Surface::Tabs));
        core.activate(|_| Ok(()));

        let depth = AtomicUsize::new(0);
        let max_depth = AtomicUsize::new(0);
        let passes = AtomicUsize::new(0);
        let inner = Arc::clone(&core);
        core.render(|| {
            let d = depth.fetch_add(1, Ordering::SeqCst) + 1;
            max_depth.fetch_max(d, Ordering::SeqCst);
            if passes.fetch_add(1, Ordering::SeqCst) == 0 {
                // The host fires an event from inside our mutation.
                inner.render(|| panic!("nested pass must not run"));
            }
            depth.fetch_sub(1, Ordering::SeqCst);
        });

        assert_eq!(passes.load(Ordering::SeqCst), 2);
        assert_eq!(max_depth.load(Ordering::SeqCst), 1);
    }
}
