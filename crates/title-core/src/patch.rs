use std::sync::{Arc, RwLock};

/// A replaceable value owned by the host: a behavior slot or a piece of
/// rendered text.
pub trait Slot<T>: Send + Sync {
    fn name(&self) -> &str;
    fn get(&self) -> T;
    fn set(&self, value: T);
}

/// A host behavior (method) that can be swapped out and put back.
pub struct HookSlot<T> {
    name: String,
    current: RwLock<T>,
}

impl<T: Clone + Send + Sync> HookSlot<T> {
    pub fn new(name: impl Into<String>, initial: T) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            current: RwLock::new(initial),
        })
    }
}

impl<T: Clone + Send + Sync> Slot<T> for HookSlot<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self) -> T {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set(&self, value: T) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

/// A reversible override of one [`Slot`].
///
/// `apply` remembers exactly what it replaced and `revert` puts that value
/// back, so after a revert the host observes its own original again.
pub struct Patch<T> {
    target: Arc<dyn Slot<T>>,
    replacement: T,
    original: Option<T>,
}

impl<T: Clone + Send + Sync> Patch<T> {
    pub fn new(target: Arc<dyn Slot<T>>, replacement: T) -> Self {
        Self {
            target,
            replacement,
            original: None,
        }
    }

    /// Idempotent.
    pub fn apply(&mut self) {
        if self.original.is_some() {
            return;
        }
        self.original = Some(self.target.get());
        self.target.set(self.replacement.clone());
        tracing::debug!("Patched {}", self.target.name());
    }

    pub fn revert(&mut self) {
        if let Some(original) = self.original.take() {
            self.target.set(original);
            tracing::debug!("Restored {}", self.target.name());
        }
    }

    pub fn is_applied(&self) -> bool {
        self.original.is_some()
    }

    pub fn original(&self) -> Option<&T> {
        self.original.as_ref()
    }

    pub fn target(&self) -> &Arc<dyn Slot<T>> {
        &self.target
    }

    /// Change the replacement, writing it through if applied.
    pub fn set_replacement(&mut self, value: T) {
        self.replacement = value;
        if self.is_applied() {
            self.target.set(self.replacement.clone());
        }
    }

    pub fn replacement(&self) -> &T {
        &self.replacement
    }

    /// Adopt the target's current value as the original, then write
    /// `replacement`. Used when the host rewrote the target after the patch
    /// was applied (a recycled element).
    pub fn recapture(&mut self, replacement: T) {
        self.replacement = replacement;
        if self.is_applied() {
            self.original = Some(self.target.get());
            self.target.set(self.replacement.clone());
        }
    }
}

/// Type-erased handle used by [`PatchRegistry`].
pub trait Revert: Send {
    fn revert(&mut self);
    fn is_applied(&self) -> bool;
}

impl<T: Clone + Send + Sync> Revert for Patch<T> {
    fn revert(&mut self) {
        Patch::revert(self)
    }

    fn is_applied(&self) -> bool {
        Patch::is_applied(self)
    }
}

/// Patches applied by one owner, reverted together in reverse order.
#[derive(Default)]
pub struct PatchRegistry {
    patches: Vec<Box<dyn Revert>>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply<T: Clone + Send + Sync + 'static>(&mut self, mut patch: Patch<T>) {
        patch.apply();
        self.patches.push(Box::new(patch));
    }

    pub fn revert_all(&mut self) {
        while let Some(mut patch) = self.patches.pop() {
            patch.revert();
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Render = Arc<dyn Fn(&str) -> String + Send + Sync>;

    fn render_slot() -> (Arc<HookSlot<Render>>, Render) {
        let original: Render = Arc::new(|path: &str| path.to_string());
        (HookSlot::new("render", Arc::clone(&original)), original)
    }

    #[test]
    fn apply_then_revert_restores_identical_original() {
        let (slot, original) = render_slot();
        let replacement: Render = Arc::new(|_: &str| "Title".to_string());
        let mut patch = Patch::new(slot.clone() as Arc<dyn Slot<Render>>, replacement);

        patch.apply();
        assert_eq!((slot.get())("a.md"), "Title");
        assert!(Arc::ptr_eq(patch.original().unwrap(), &original));

        patch.revert();
        assert!(Arc::ptr_eq(&slot.get(), &original));
        assert!(!patch.is_applied());
    }

    #[test]
    fn double_apply_keeps_first_original() {
        let (slot, original) = render_slot();
        let mut patch = Patch::new(
            slot.clone() as Arc<dyn Slot<Render>>,
            Arc::new(|_: &str| "X".to_string()) as Render,
        );
        patch.apply();
        patch.apply();
        patch.revert();
        assert!(Arc::ptr_eq(&slot.get(), &original));
    }

    #[test]
    fn revert_without_apply_is_noop() {
        let slot = HookSlot::new("text", "host".to_string());
        let mut patch = Patch::new(slot.clone() as Arc<dyn Slot<String>>, "ours".to_string());
        patch.revert();
        assert_eq!(slot.get(), "host");
    }

    #[test]
    fn set_replacement_writes_through() {
        let slot = HookSlot::new("text", "file".to_string());
        let mut patch = Patch::new(slot.clone() as Arc<dyn Slot<String>>, "Old".to_string());
        patch.apply();
        patch.set_replacement("New".to_string());
        assert_eq!(slot.get(), "New");
        patch.revert();
        assert_eq!(slot.get(), "file");
    }

    #[test]
    fn recapture_adopts_host_rewrite() {
        let slot = HookSlot::new("text", "a".to_string());
        let mut patch = Patch::new(slot.clone() as Arc<dyn Slot<String>>, "Alpha".to_string());
        patch.apply();

        // Host recycled the element for another document.
        slot.set("b".to_string());
        patch.recapture("Beta".to_string());
        assert_eq!(slot.get(), "Beta");

        patch.revert();
        assert_eq!(slot.get(), "b");
    }

    #[test]
    fn registry_reverts_in_reverse_order() {
        let slot = HookSlot::new("text", "host".to_string());
        let mut registry = PatchRegistry::new();
        registry.apply(Patch::new(slot.clone() as Arc<dyn Slot<String>>, "first".to_string()));
        registry.apply(Patch::new(slot.clone() as Arc<dyn Slot<String>>, "second".to_string()));
        assert_eq!(slot.get(), "second");
        assert_eq!(registry.len(), 2);

        registry.revert_all();
        assert_eq!(slot.get(), "host");
        assert!(registry.is_empty());
    }
}
