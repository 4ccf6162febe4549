//! In-memory host format maps.
//!
//! Behaves like a real host where it matters to the engine: every write
//! notifies subscribers synchronously, batches coalesce notifications into
//! one call when the outermost batch ends, and writes can be made to fail.
//! Used by the integration tests and by embedders without an editor.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{
    ChangeHandler, ClassificationFormatMap, ClassificationType, ClassificationTypeRegistry,
    EditorFormatMap, HostError, HostSurface, SubscriptionId,
};
use crate::properties::TextProperties;

/// Subscriber list plus batch bookkeeping shared by both maps.
#[derive(Default)]
struct Notifier {
    handlers: RefCell<Vec<(SubscriptionId, ChangeHandler)>>,
    next_id: Cell<u64>,
    batch_depth: Cell<usize>,
    pending: RefCell<Option<Vec<String>>>,
}

impl Notifier {
    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.borrow_mut().retain(|(existing, _)| *existing != id);
    }

    fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    fn begin(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    fn end(&self) {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if depth == 0 {
            let pending = self.pending.borrow_mut().take();
            if let Some(keys) = pending {
                self.fire(&keys);
            }
        }
    }

    fn changed(&self, keys: &[String]) {
        if self.batch_depth.get() > 0 {
            let mut pending = self.pending.borrow_mut();
            let pending = pending.get_or_insert_with(Vec::new);
            for key in keys {
                if !pending.contains(key) {
                    pending.push(key.clone());
                }
            }
            return;
        }
        self.fire(keys);
    }

    fn fire(&self, keys: &[String]) {
        // Handlers may subscribe or unsubscribe while running.
        let handlers: Vec<ChangeHandler> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(keys);
        }
    }
}

/// Shared failure injection and write counting.
#[derive(Default)]
struct WriteLog {
    writes: Cell<usize>,
    failures: Cell<usize>,
}

impl WriteLog {
    fn attempt(&self, key: &str) -> Result<(), HostError> {
        let failures = self.failures.get();
        if failures > 0 {
            self.failures.set(failures - 1);
            return Err(HostError::ConcurrentModification {
                key: key.to_string(),
            });
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// In-memory [`EditorFormatMap`].
#[derive(Default)]
pub struct MemoryEditorFormatMap {
    items: RefCell<BTreeMap<String, TextProperties>>,
    notifier: Notifier,
    log: WriteLog,
}

impl MemoryEditorFormatMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an item without notifying.
    pub fn with_item(self, key: &str, properties: TextProperties) -> Self {
        self.items.borrow_mut().insert(key.to_string(), properties);
        self
    }

    /// Number of successful `set_properties` calls so far.
    pub fn write_count(&self) -> usize {
        self.log.writes.get()
    }

    /// Makes the next `n` writes fail with [`HostError::ConcurrentModification`].
    pub fn fail_next_writes(&self, n: usize) {
        self.log.failures.set(n);
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    /// Fires a change notification without writing, as a host does when it
    /// touches a key on its own.
    pub fn notify(&self, keys: &[String]) {
        self.notifier.changed(keys);
    }
}

impl EditorFormatMap for MemoryEditorFormatMap {
    fn properties(&self, key: &str) -> TextProperties {
        self.items.borrow().get(key).cloned().unwrap_or_default()
    }

    fn set_properties(&self, key: &str, properties: TextProperties) -> Result<(), HostError> {
        self.log.attempt(key)?;
        self.items.borrow_mut().insert(key.to_string(), properties);
        self.notifier.changed(&[key.to_string()]);
        Ok(())
    }

    fn begin_batch_update(&self) {
        self.notifier.begin();
    }

    fn end_batch_update(&self) {
        self.notifier.end();
    }

    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
        self.notifier.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }
}

/// In-memory [`ClassificationFormatMap`].
#[derive(Default)]
pub struct MemoryClassificationFormatMap {
    items: RefCell<BTreeMap<ClassificationType, TextProperties>>,
    defaults: RefCell<TextProperties>,
    priority: RefCell<Vec<ClassificationType>>,
    notifier: Notifier,
    log: WriteLog,
}

impl MemoryClassificationFormatMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an item without notifying.
    pub fn with_item(self, ty: &str, properties: TextProperties) -> Self {
        self.items
            .borrow_mut()
            .insert(ClassificationType::new(ty), properties);
        self
    }

    /// Replaces the default text properties and notifies with an empty key list.
    pub fn set_default_text_properties(&self, properties: TextProperties) {
        *self.defaults.borrow_mut() = properties;
        self.notifier.changed(&[]);
    }

    /// Replaces the priority order without notifying.
    pub fn set_priority_order(&self, order: Vec<ClassificationType>) {
        *self.priority.borrow_mut() = order;
    }

    /// Number of successful `set_text_properties` calls so far.
    pub fn write_count(&self) -> usize {
        self.log.writes.get()
    }

    /// Makes the next `n` writes fail with [`HostError::ConcurrentModification`].
    pub fn fail_next_writes(&self, n: usize) {
        self.log.failures.set(n);
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    fn position(&self, ty: &ClassificationType) -> Result<usize, HostError> {
        self.priority
            .borrow()
            .iter()
            .position(|t| t == ty)
            .ok_or_else(|| HostError::UnknownKey {
                key: ty.name().to_string(),
            })
    }
}

impl ClassificationFormatMap for MemoryClassificationFormatMap {
    fn text_properties(&self, ty: &ClassificationType) -> TextProperties {
        self.items.borrow().get(ty).cloned().unwrap_or_default()
    }

    fn set_text_properties(
        &self,
        ty: &ClassificationType,
        properties: TextProperties,
    ) -> Result<(), HostError> {
        self.log.attempt(ty.name())?;
        self.items.borrow_mut().insert(ty.clone(), properties);
        self.notifier.changed(&[ty.name().to_string()]);
        Ok(())
    }

    fn default_text_properties(&self) -> TextProperties {
        self.defaults.borrow().clone()
    }

    fn priority_order(&self) -> Vec<ClassificationType> {
        self.priority.borrow().clone()
    }

    fn insert_priority(
        &self,
        ty: &ClassificationType,
        below: Option<&ClassificationType>,
    ) -> Result<(), HostError> {
        self.priority.borrow_mut().retain(|t| t != ty);
        let index = match below {
            Some(below) => self.position(below)? + 1,
            None => 0,
        };
        self.priority.borrow_mut().insert(index, ty.clone());
        self.notifier.changed(&[ty.name().to_string()]);
        Ok(())
    }

    fn swap_priorities(
        &self,
        a: &ClassificationType,
        b: &ClassificationType,
    ) -> Result<(), HostError> {
        let first = self.position(a)?;
        let second = self.position(b)?;
        self.priority.borrow_mut().swap(first, second);
        self.notifier
            .changed(&[a.name().to_string(), b.name().to_string()]);
        Ok(())
    }

    fn begin_batch_update(&self) {
        self.notifier.begin();
    }

    fn end_batch_update(&self) {
        self.notifier.end();
    }

    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
        self.notifier.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }
}

/// In-memory [`ClassificationTypeRegistry`].
#[derive(Default)]
pub struct MemoryTypeRegistry {
    types: RefCell<BTreeMap<String, Vec<ClassificationType>>>,
}

impl MemoryTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(self, name: &str) -> Self {
        self.define(name);
        self
    }

    pub fn define(&self, name: &str) -> ClassificationType {
        self.types
            .borrow_mut()
            .entry(name.to_string())
            .or_default();
        ClassificationType::new(name)
    }

    /// Base types `name` was created with.
    pub fn bases_of(&self, name: &str) -> Option<Vec<ClassificationType>> {
        self.types.borrow().get(name).cloned()
    }
}

impl ClassificationTypeRegistry for MemoryTypeRegistry {
    fn classification_type(&self, name: &str) -> Option<ClassificationType> {
        self.types
            .borrow()
            .contains_key(name)
            .then(|| ClassificationType::new(name))
    }

    fn create_classification_type(
        &self,
        name: &str,
        bases: &[ClassificationType],
    ) -> Result<ClassificationType, HostError> {
        let mut types = self.types.borrow_mut();
        if let Some(missing) = bases.iter().find(|b| !types.contains_key(b.name())) {
            return Err(HostError::UnknownKey {
                key: missing.name().to_string(),
            });
        }
        types
            .entry(name.to_string())
            .or_insert_with(|| bases.to_vec());
        Ok(ClassificationType::new(name))
    }
}

/// A complete in-memory host: both format maps and the type registry.
///
/// # Example
///
/// ```rust
/// use stylesync::host::memory::MemoryHost;
/// use stylesync::host::EditorFormatMap;
/// use stylesync::TextProperties;
///
/// let host = MemoryHost::new().with_category("keyword", TextProperties::new().with_bold(false));
/// let surface = host.surface();
/// assert_eq!(surface.editor_map.properties("keyword").bold, Some(false));
/// ```
#[derive(Clone, Default)]
pub struct MemoryHost {
    pub editor: Rc<MemoryEditorFormatMap>,
    pub classification: Rc<MemoryClassificationFormatMap>,
    pub types: Rc<MemoryTypeRegistry>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a classification type on top of the priority order and seeds
    /// both maps with `properties`.
    pub fn with_category(self, name: &str, properties: TextProperties) -> Self {
        let ty = self.types.define(name);
        self.classification.priority.borrow_mut().push(ty.clone());
        self.classification
            .items
            .borrow_mut()
            .insert(ty, properties.clone());
        self.editor
            .items
            .borrow_mut()
            .insert(name.to_string(), properties);
        self
    }

    /// Seeds the view background without notifying.
    pub fn with_view_background(self, properties: TextProperties) -> Self {
        self.editor
            .items
            .borrow_mut()
            .insert(super::VIEW_BACKGROUND_KEY.to_string(), properties);
        self
    }

    /// Seeds the default text properties without notifying.
    pub fn with_defaults(self, properties: TextProperties) -> Self {
        *self.classification.defaults.borrow_mut() = properties;
        self
    }

    pub fn surface(&self) -> HostSurface {
        HostSurface::new(
            self.editor.clone(),
            self.classification.clone(),
            self.types.clone(),
        )
    }

    pub fn priority_names(&self) -> Vec<String> {
        self.classification
            .priority_order()
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }
}
