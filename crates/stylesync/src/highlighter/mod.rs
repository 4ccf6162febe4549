//! The per-surface synchronization coordinator.
//!
//! A [`Highlighter`] owns the [`ChangeTrace`]s for one rendering category
//! and keeps both host format maps in line with the shared [`StyleSet`].
//!
//! # Reentrancy
//!
//! Every write to a host map re-enters the highlighter through its change
//! handlers. All work runs inside [`Highlighter::run_operation`], which
//! pushes onto a [`ReentrancyFence`]. Handlers entered while the fence is
//! locked only record [`PendingEvents`]; the outermost operation flushes
//! them once, in a fixed order:
//!
//! ```text
//! background -> default text -> editor format -> classification format -> apply -> refresh
//! ```
//!
//! The engine's own editor writes echo back as one deferred apply, which
//! finds nothing left to write and stops the cascade.
//!
//! # Failures
//!
//! Host write errors are logged and the affected key keeps its previous
//! trace. Nothing propagates to the caller.

mod events;
mod fence;
mod handlers;

pub use events::{EngineEvent, EventHub, EventListener, ListenerId};
pub use fence::{FenceGuard, FenceState, PendingEvents, ReentrancyFence};

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::host::{
    ChangeHandler, ClassificationType, HostError, HostSurface, SubscriptionId, VIEW_BACKGROUND_KEY,
};
use crate::properties::TextProperties;
use crate::resolve::{is_sentinel, DependencyResolver, Placement, ResolveError};
use crate::store::EngineShared;
use crate::style::{Rgba, StyleRecord, StyleSet};
use crate::trace::{ChangeContext, ChangeTrace, FormatChanges};

/// Last observed host state, used to tell real external changes from echoes.
#[derive(Debug, Clone, Default, PartialEq)]
struct Baseline {
    view_background: Option<Rgba>,
    defaults: ChangeContext,
}

type TraceMap = RefCell<BTreeMap<String, ChangeTrace>>;

/// Applies styles to one surface's format maps and reacts to their changes.
///
/// Created by [`EngineContext::highlight`](crate::EngineContext::highlight).
pub struct Highlighter {
    category: String,
    surface: HostSurface,
    shared: Rc<EngineShared>,
    fence: ReentrancyFence,
    flushing: Cell<bool>,
    editor_traces: TraceMap,
    classification_traces: TraceMap,
    baseline: RefCell<Baseline>,
    pending_keys: RefCell<BTreeSet<String>>,
    pending_types: RefCell<BTreeSet<String>>,
    subscriptions: Cell<Option<(SubscriptionId, SubscriptionId)>>,
    unresolved: RefCell<Vec<ResolveError>>,
}

impl Highlighter {
    /// Builds a highlighter, exports missing categories and subscribes to
    /// the surface. Styles are not applied yet.
    pub(crate) fn new(category: &str, surface: HostSurface, shared: Rc<EngineShared>) -> Rc<Self> {
        let highlighter = Rc::new(Self {
            category: category.to_string(),
            surface,
            shared,
            fence: ReentrancyFence::new(),
            flushing: Cell::new(false),
            editor_traces: RefCell::default(),
            classification_traces: RefCell::default(),
            baseline: RefCell::default(),
            pending_keys: RefCell::default(),
            pending_types: RefCell::default(),
            subscriptions: Cell::new(None),
            unresolved: RefCell::default(),
        });
        highlighter.observe_baseline();
        highlighter.export_categories();
        highlighter.attach();
        tracing::debug!(category = %highlighter.category, "highlighter created");
        highlighter
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn surface(&self) -> &HostSurface {
        &self.surface
    }

    /// Runs `body` as a named operation.
    ///
    /// Pending events are flushed after the outermost operation returns.
    pub fn run_operation<R>(&self, name: &'static str, body: impl FnOnce() -> R) -> R {
        let result = {
            let _guard = self.fence.enter(name);
            tracing::trace!(
                category = %self.category,
                operation = name,
                depth = self.fence.depth(),
                "operation started"
            );
            body()
        };
        if !self.fence.is_locked() && !self.flushing.get() {
            self.flush();
        }
        result
    }

    /// Reconciles every formattable category with its style in the editor
    /// format map, in priority order, inside one batch.
    ///
    /// While another operation runs, the apply is deferred and an empty set
    /// is returned.
    pub fn apply(&self) -> FormatChanges {
        if self.fence.is_locked() {
            self.fence.defer(PendingEvents::APPLY);
            tracing::trace!(category = %self.category, "apply deferred");
            return FormatChanges::empty();
        }
        self.run_operation("apply", || self.apply_styles())
    }

    /// Re-writes every formattable category in the classification format
    /// map and re-enforces declared priority constraints.
    ///
    /// Deferred while another operation runs.
    pub fn refresh(&self) -> FormatChanges {
        if self.fence.is_locked() {
            self.fence.defer(PendingEvents::REFRESH);
            tracing::trace!(category = %self.category, "refresh deferred");
            return FormatChanges::empty();
        }
        self.run_operation("refresh", || self.refresh_classifications())
    }

    /// Re-applies a single category and its inheriting categories.
    pub fn apply_key(&self, key: &str) -> FormatChanges {
        self.run_operation("apply_key", || {
            let changed = self.rehighlight(vec![key.to_string()]);
            self.fence.defer(PendingEvents::REFRESH);
            changed
        })
    }

    /// Restores every overridden dimension in both maps and clears all traces.
    pub fn reset(&self) -> FormatChanges {
        self.run_operation("reset", || {
            let mut restored = FormatChanges::empty();

            let editor = &self.surface.editor_map;
            let keys: Vec<String> = self.editor_traces.borrow().keys().cloned().collect();
            editor.begin_batch_update();
            for key in &keys {
                restored |= self.revert(
                    &self.editor_traces,
                    key,
                    || editor.properties(key),
                    |props| editor.set_properties(key, props),
                );
            }
            editor.end_batch_update();

            restored |= self.reset_classifications(None);
            // Echoes of the reverts must not re-apply the styles.
            self.fence.cancel(PendingEvents::APPLY | PendingEvents::REFRESH);
            tracing::debug!(category = %self.category, restored = ?restored, "reset highlighter");
            restored
        })
    }

    /// Restores and clears the traces of one key.
    pub fn reset_key(&self, key: &str) -> FormatChanges {
        self.run_operation("reset_key", || {
            let editor = &self.surface.editor_map;
            editor.begin_batch_update();
            let mut restored = self.revert(
                &self.editor_traces,
                key,
                || editor.properties(key),
                |props| editor.set_properties(key, props),
            );
            editor.end_batch_update();
            restored |= self.reset_classifications(Some(key));
            self.fence.cancel(PendingEvents::APPLY | PendingEvents::REFRESH);
            restored
        })
    }

    /// Unsubscribes from both host maps. Called when the surface closes.
    pub fn detach(&self) {
        if let Some((editor_id, classification_id)) = self.subscriptions.take() {
            self.surface.editor_map.unsubscribe(editor_id);
            self.surface.classification_map.unsubscribe(classification_id);
            tracing::debug!(category = %self.category, "highlighter detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        let subscriptions = self.subscriptions.get();
        subscriptions.is_some()
    }

    /// Formattable categories in priority order, lowest first.
    ///
    /// A category is formattable when it has a style or a trace and the host
    /// knows its classification type. Styled categories the priority order
    /// does not list follow in name order.
    pub fn categories(&self) -> Vec<String> {
        let styles = self.shared.styles();
        let mut names: BTreeSet<String> = styles.names().map(str::to_string).collect();
        names.extend(self.editor_traces.borrow().keys().cloned());
        names.extend(self.classification_traces.borrow().keys().cloned());

        let mut ordered = Vec::with_capacity(names.len());
        for ty in self.surface.classification_map.priority_order() {
            if names.remove(ty.name()) {
                ordered.push(ty.name().to_string());
            }
        }
        ordered.extend(names);
        ordered.retain(|name| self.resolves(name));
        ordered
    }

    /// Editor format map trace for `key`.
    pub fn trace(&self, key: &str) -> Option<ChangeTrace> {
        self.editor_traces.borrow().get(key).cloned()
    }

    /// Classification format map trace for `key`.
    pub fn classification_trace(&self, key: &str) -> Option<ChangeTrace> {
        self.classification_traces.borrow().get(key).cloned()
    }

    /// Categories the resolver could not place when this highlighter was created.
    pub fn unresolved(&self) -> Vec<ResolveError> {
        self.unresolved.borrow().clone()
    }

    /// Last observed view background.
    pub fn view_background(&self) -> Option<Rgba> {
        self.baseline.borrow().view_background
    }

    /// Last observed host defaults.
    pub fn defaults(&self) -> ChangeContext {
        self.baseline.borrow().defaults.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.fence.is_locked()
    }

    pub fn fence_state(&self) -> FenceState {
        self.fence.state()
    }

    pub fn active_operations(&self) -> Vec<&'static str> {
        self.fence.active_operations()
    }

    fn attach(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let editor: ChangeHandler = Rc::new(move |keys: &[String]| {
            if let Some(highlighter) = weak.upgrade() {
                highlighter.on_editor_format_changed(keys);
            }
        });
        let weak = Rc::downgrade(self);
        let classification: ChangeHandler = Rc::new(move |types: &[String]| {
            if let Some(highlighter) = weak.upgrade() {
                highlighter.on_classification_format_changed(types);
            }
        });

        let editor_id = self.surface.editor_map.subscribe(editor);
        let classification_id = self.surface.classification_map.subscribe(classification);
        self.subscriptions.set(Some((editor_id, classification_id)));
    }

    fn observe_baseline(&self) {
        let view_background = self
            .surface
            .editor_map
            .properties(VIEW_BACKGROUND_KEY)
            .background
            .map(|brush| brush.color());
        let defaults =
            ChangeContext::from_defaults(&self.surface.classification_map.default_text_properties());
        *self.baseline.borrow_mut() = Baseline {
            view_background,
            defaults,
        };
    }

    /// Registers declared categories the host does not know yet.
    fn export_categories(&self) {
        let types = &self.surface.types;
        let map = &self.surface.classification_map;

        let missing: Vec<_> = self
            .shared
            .table
            .entries()
            .iter()
            .filter(|entry| types.classification_type(&entry.name).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }

        let known: Vec<String> = map
            .priority_order()
            .iter()
            .map(|ty| ty.name().to_string())
            .collect();
        let result = DependencyResolver::new(known).register(&missing);

        let mut exported = result.exported.clone();
        exported.sort_by_key(|entry| entry.position);
        for entry in &exported {
            let bases: Vec<ClassificationType> = entry
                .bases
                .iter()
                .filter_map(|base| types.classification_type(base))
                .collect();
            let ty = match types.create_classification_type(&entry.name, &bases) {
                Ok(ty) => ty,
                Err(err) => {
                    tracing::warn!(category = %entry.name, error = %err, "failed to create classification type");
                    continue;
                }
            };
            let below = result.placed_above(&entry.name).map(ClassificationType::new);
            if let Err(err) = map.insert_priority(&ty, below.as_ref()) {
                tracing::warn!(category = %entry.name, error = %err, "failed to insert classification priority");
            }
        }

        for err in &result.unresolved {
            tracing::warn!(
                category = err.category(),
                error = %err,
                "category keeps the host default priority"
            );
        }
        tracing::debug!(
            category = %self.category,
            exported = exported.len(),
            unresolved = result.unresolved.len(),
            passes = result.passes,
            "exported categories"
        );
        *self.unresolved.borrow_mut() = result.unresolved;
    }

    fn flush(&self) {
        self.flushing.set(true);
        let max_rounds = self.shared.config.borrow().max_flush_rounds.max(1);
        let mut rounds = 0;
        loop {
            let pending = self.fence.take_pending();
            if pending.is_empty() {
                break;
            }
            if rounds == max_rounds {
                tracing::warn!(
                    category = %self.category,
                    pending = ?pending,
                    rounds,
                    "dropping pending events after reaching the flush round limit"
                );
                break;
            }
            rounds += 1;
            self.fire(pending);
        }
        self.flushing.set(false);
    }

    fn fire(&self, mut pending: PendingEvents) {
        let events = &self.shared.events;

        // A view background write seen under the fence is only a pending key.
        let background_write = pending.contains(PendingEvents::EDITOR_FORMAT)
            && self.pending_keys.borrow().contains(VIEW_BACKGROUND_KEY);
        if background_write {
            self.run_operation("view_background_changed", || self.sync_view_background());
            pending |= self.fence.take_pending();
        }

        if pending.contains(PendingEvents::BACKGROUND) {
            let background = self.baseline.borrow().view_background;
            if let Some(color) = background {
                events.emit(&EngineEvent::BackgroundChanged(color));
            }
        }
        if pending.contains(PendingEvents::DEFAULT_TEXT) {
            let defaults = self.surface.classification_map.default_text_properties();
            events.emit(&EngineEvent::DefaultTextPropertiesChanged(defaults));
        }
        if pending.contains(PendingEvents::EDITOR_FORMAT) {
            let keys: Vec<String> = std::mem::take(&mut *self.pending_keys.borrow_mut())
                .into_iter()
                .collect();
            if !keys.is_empty() {
                events.emit(&EngineEvent::FormatItemsChanged(keys));
            }
        }
        if pending.contains(PendingEvents::CLASSIFICATION_FORMAT) {
            let types: Vec<String> = std::mem::take(&mut *self.pending_types.borrow_mut())
                .into_iter()
                .collect();
            if !types.is_empty() {
                events.emit(&EngineEvent::ClassificationFormatChanged(types));
            }
        }
        if pending.contains(PendingEvents::APPLY) {
            self.apply();
        }
        if pending.contains(PendingEvents::REFRESH) {
            self.refresh();
        }
    }

    fn apply_styles(&self) -> FormatChanges {
        let cx = self.sync_defaults();
        let styles = self.shared.styles();
        let editor = &self.surface.editor_map;

        let mut changed = FormatChanges::empty();
        editor.begin_batch_update();
        for key in self.categories() {
            changed |= self.change_key(&key, self.style_for(&styles, &key), &cx);
        }
        editor.end_batch_update();

        tracing::debug!(category = %self.category, changed = ?changed, "applied styles");
        changed
    }

    fn refresh_classifications(&self) -> FormatChanges {
        let map = &self.surface.classification_map;
        let cx = self.baseline.borrow().defaults.clone();
        let styles = self.shared.styles();

        let mut changed = FormatChanges::empty();
        map.begin_batch_update();
        self.enforce_priority_order();
        for name in self.categories() {
            let Some(ty) = self.surface.types.classification_type(&name) else {
                continue;
            };
            changed |= self.reconcile(
                &self.classification_traces,
                &name,
                self.style_for(&styles, &name),
                &cx,
                || map.text_properties(&ty),
                |props| map.set_text_properties(&ty, props),
            );
        }
        map.end_batch_update();

        tracing::debug!(category = %self.category, changed = ?changed, "refreshed classifications");
        changed
    }

    /// Swaps priorities back where the host disturbed a declared constraint.
    fn enforce_priority_order(&self) {
        let map = &self.surface.classification_map;
        for entry in self.shared.table.entries() {
            for constraint in &entry.order {
                if is_sentinel(&constraint.target) {
                    continue;
                }
                let order = map.priority_order();
                let position = |name: &str| order.iter().position(|ty| ty.name() == name);
                let (Some(own), Some(target)) =
                    (position(&entry.name), position(&constraint.target))
                else {
                    continue;
                };
                let violated = match constraint.placement {
                    Placement::After => own < target,
                    Placement::Before => own > target,
                };
                if !violated {
                    continue;
                }
                match map.swap_priorities(&order[own], &order[target]) {
                    Ok(()) => tracing::debug!(
                        category = %entry.name,
                        target = %constraint.target,
                        "restored priority constraint"
                    ),
                    Err(err) => tracing::warn!(
                        category = %entry.name,
                        error = %err,
                        "failed to restore priority constraint"
                    ),
                }
            }
        }
    }

    fn reset_classifications(&self, only: Option<&str>) -> FormatChanges {
        let map = &self.surface.classification_map;
        let keys: Vec<String> = match only {
            Some(key) => vec![key.to_string()],
            None => self.classification_traces.borrow().keys().cloned().collect(),
        };

        let mut restored = FormatChanges::empty();
        map.begin_batch_update();
        for key in &keys {
            let Some(ty) = self.surface.types.classification_type(key) else {
                continue;
            };
            restored |= self.revert(
                &self.classification_traces,
                key,
                || map.text_properties(&ty),
                |props| map.set_text_properties(&ty, props),
            );
        }
        map.end_batch_update();
        restored
    }

    /// Re-highlights `keys`, following inheriting categories when a
    /// cascading dimension changed. Writes happen inside one batch.
    fn rehighlight(&self, keys: Vec<String>) -> FormatChanges {
        let styles = self.shared.styles();
        let cx = self.baseline.borrow().defaults.clone();
        let editor = &self.surface.editor_map;

        let mut queue: VecDeque<String> = keys.into();
        let mut seen = BTreeSet::new();
        let mut changed = FormatChanges::empty();

        editor.begin_batch_update();
        while let Some(key) = queue.pop_front() {
            if !seen.insert(key.clone()) || !self.resolves(&key) {
                continue;
            }
            let delta = self.change_key(&key, self.style_for(&styles, &key), &cx);
            if delta.intersects(FormatChanges::CASCADING) {
                queue.extend(self.shared.table.dependents_of(&key));
            }
            changed |= delta;
        }
        editor.end_batch_update();
        changed
    }

    /// Reads the host defaults, deferring a notification if they moved.
    fn sync_defaults(&self) -> ChangeContext {
        let cx =
            ChangeContext::from_defaults(&self.surface.classification_map.default_text_properties());
        let mut baseline = self.baseline.borrow_mut();
        if baseline.defaults != cx {
            tracing::debug!(
                category = %self.category,
                font_size = cx.default_font_size,
                family = %cx.default_typeface.family,
                "default text properties changed"
            );
            baseline.defaults = cx.clone();
            self.fence.defer(PendingEvents::DEFAULT_TEXT);
        }
        cx
    }

    fn change_key(&self, key: &str, style: Option<&StyleRecord>, cx: &ChangeContext) -> FormatChanges {
        let editor = &self.surface.editor_map;
        self.reconcile(
            &self.editor_traces,
            key,
            style,
            cx,
            || editor.properties(key),
            |props| editor.set_properties(key, props),
        )
    }

    /// Runs [`ChangeTrace::change`] for one key and writes the result back.
    ///
    /// The trace is only committed when the write succeeds. Traces are
    /// created the first time they take ownership of a dimension.
    fn reconcile(
        &self,
        traces: &TraceMap,
        key: &str,
        style: Option<&StyleRecord>,
        cx: &ChangeContext,
        read: impl FnOnce() -> TextProperties,
        write: impl FnOnce(TextProperties) -> Result<(), HostError>,
    ) -> FormatChanges {
        let existing = traces.borrow().get(key).cloned();
        let tracked = existing.is_some();
        let mut trace = existing.unwrap_or_default();

        let before = read();
        let mut live = before.clone();
        let changed = trace.change(&mut live, style, cx);

        if live != before {
            if let Err(err) = write(live) {
                tracing::warn!(
                    category = %self.category,
                    key,
                    error = %err,
                    "format map write failed, keeping previous trace"
                );
                return FormatChanges::empty();
            }
        }
        if tracked || !trace.is_clear() {
            traces.borrow_mut().insert(key.to_string(), trace);
        }
        changed
    }

    /// Restores one key from its trace and clears the trace.
    fn revert(
        &self,
        traces: &TraceMap,
        key: &str,
        read: impl FnOnce() -> TextProperties,
        write: impl FnOnce(TextProperties) -> Result<(), HostError>,
    ) -> FormatChanges {
        let Some(mut trace) = traces.borrow().get(key).cloned() else {
            return FormatChanges::empty();
        };

        let before = read();
        let mut live = before.clone();
        let restored = trace.reset(&mut live);

        if live != before {
            if let Err(err) = write(live) {
                tracing::warn!(
                    category = %self.category,
                    key,
                    error = %err,
                    "format map write failed during reset, keeping previous trace"
                );
                return FormatChanges::empty();
            }
        }
        traces.borrow_mut().insert(key.to_string(), trace);
        restored
    }

    fn style_for<'a>(&self, styles: &'a StyleSet, key: &str) -> Option<&'a StyleRecord> {
        if self.shared.enabled.get() {
            styles.get(key)
        } else {
            None
        }
    }

    /// Returns `true` if `name` maps to a live classification type.
    fn resolves(&self, name: &str) -> bool {
        name != VIEW_BACKGROUND_KEY && self.surface.types.classification_type(name).is_some()
    }
}

impl Drop for Highlighter {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Highlighter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Highlighter")
            .field("category", &self.category)
            .field("fence", &self.fence.state())
            .field("editor_traces", &self.editor_traces.borrow().len())
            .field("classification_traces", &self.classification_traces.borrow().len())
            .field("attached", &self.is_attached())
            .finish()
    }
}
