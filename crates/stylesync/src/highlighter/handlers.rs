//! Host change notifications.
//!
//! Each handler either records intent (fence locked, so the change is an
//! echo of the engine's own write or arrived mid-operation) or runs as its
//! own operation and reacts to real drift.

use super::{Highlighter, PendingEvents};
use crate::host::VIEW_BACKGROUND_KEY;

impl Highlighter {
    /// Editor format map keys changed.
    pub fn on_editor_format_changed(&self, keys: &[String]) {
        if self.fence.is_locked() {
            self.pending_keys.borrow_mut().extend(keys.iter().cloned());
            self.fence
                .defer(PendingEvents::EDITOR_FORMAT | PendingEvents::APPLY);
            tracing::trace!(
                category = %self.category,
                keys = keys.len(),
                "deferred editor format change"
            );
            return;
        }

        self.run_operation("editor_format_changed", || {
            self.pending_keys.borrow_mut().extend(keys.iter().cloned());
            self.fence.defer(PendingEvents::EDITOR_FORMAT);

            let mut items = Vec::with_capacity(keys.len());
            for key in keys {
                if key == VIEW_BACKGROUND_KEY {
                    self.sync_view_background();
                } else {
                    items.push(key.clone());
                }
            }
            if !items.is_empty() {
                let changed = self.rehighlight(items);
                tracing::debug!(category = %self.category, changed = ?changed, "external editor format change");
            }
        });
    }

    /// Classification types changed. An empty list means the default text
    /// properties changed.
    pub fn on_classification_format_changed(&self, types: &[String]) {
        if types.is_empty() {
            self.on_default_typeface_changed();
            return;
        }

        if self.fence.is_locked() {
            self.pending_types.borrow_mut().extend(types.iter().cloned());
            self.fence.defer(PendingEvents::CLASSIFICATION_FORMAT);
            tracing::trace!(
                category = %self.category,
                types = types.len(),
                "deferred classification format change"
            );
            return;
        }

        self.run_operation("classification_format_changed", || {
            self.pending_types.borrow_mut().extend(types.iter().cloned());
            self.fence.defer(PendingEvents::CLASSIFICATION_FORMAT);
            self.sync_defaults();
            if types.iter().any(|ty| self.resolves(ty)) {
                self.fence.defer(PendingEvents::REFRESH);
            }
        });
    }

    /// The host's default typeface or font size may have changed.
    pub fn on_default_typeface_changed(&self) {
        if self.fence.is_locked() {
            self.fence
                .defer(PendingEvents::APPLY | PendingEvents::REFRESH);
            tracing::trace!(category = %self.category, "deferred default typeface change");
            return;
        }

        self.run_operation("default_typeface_changed", || {
            let previous = self.baseline.borrow().defaults.clone();
            let current = self.sync_defaults();
            if current == previous {
                return;
            }

            let styles = self.shared.styles();
            let dependent: Vec<String> = styles
                .iter()
                .filter(|(_, style)| style.depends_on_default_font())
                .map(|(name, _)| name.to_string())
                .collect();
            self.rehighlight(dependent);
            self.fence.defer(PendingEvents::REFRESH);
        });
    }

    /// Picks up a new view background and re-highlights categories with
    /// explicit colors.
    pub(super) fn sync_view_background(&self) {
        let current = self
            .surface
            .editor_map
            .properties(VIEW_BACKGROUND_KEY)
            .background
            .map(|brush| brush.color());
        {
            let mut baseline = self.baseline.borrow_mut();
            if baseline.view_background == current {
                return;
            }
            baseline.view_background = current;
        }

        tracing::debug!(category = %self.category, background = ?current, "view background changed");
        if current.is_some() {
            self.fence.defer(PendingEvents::BACKGROUND);
        }

        let styles = self.shared.styles();
        let explicit: Vec<String> = styles
            .iter()
            .filter(|(_, style)| style.has_colors())
            .map(|(name, _)| name.to_string())
            .collect();
        self.rehighlight(explicit);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::host::memory::MemoryHost;
    use crate::host::{ClassificationFormatMap, EditorFormatMap, VIEW_BACKGROUND_KEY};
    use crate::properties::{TextProperties, Typeface};
    use crate::style::{Brush, Rgba, StyleRecord, StyleSet};
    use crate::{DependencyEntry, DependencyTable, EngineConfig, EngineContext, EngineEvent};

    fn context(styles: StyleSet) -> EngineContext {
        let config = EngineConfig {
            auto_invert_colors: false,
            ..EngineConfig::default()
        };
        let context = EngineContext::new(config, DependencyTable::new());
        context.load_styles(styles);
        context
    }

    fn record_events(context: &EngineContext) -> Rc<RefCell<Vec<EngineEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        context.subscribe(Rc::new(move |event: &EngineEvent| {
            sink.borrow_mut().push(event.clone());
        }));
        events
    }

    #[test]
    fn test_external_overwrite_of_owned_dimension_is_reasserted() {
        let host = MemoryHost::new().with_category("keyword", TextProperties::new().with_bold(false));
        let context = context(StyleSet::new().add("keyword", StyleRecord::new().bold(true)));
        let _highlighter = context.highlight("text", &host.surface());

        host.editor
            .set_properties("keyword", TextProperties::new().with_bold(false))
            .unwrap();

        assert_eq!(host.editor.properties("keyword").bold, Some(true));
    }

    #[test]
    fn test_external_drift_of_unowned_dimension_is_kept() {
        let host = MemoryHost::new().with_category("keyword", TextProperties::new().with_bold(false));
        let context = context(StyleSet::new().add("keyword", StyleRecord::new().bold(true)));
        let highlighter = context.highlight("text", &host.surface());

        let writes = host.editor.write_count();
        host.editor
            .set_properties(
                "keyword",
                TextProperties::new()
                    .with_bold(true)
                    .with_italic(true),
            )
            .unwrap();

        assert_eq!(host.editor.write_count(), writes + 1);
        let trace = highlighter.trace("keyword").unwrap();
        assert_eq!(trace.origin().italic, Some(true));
        assert_eq!(host.editor.properties("keyword").italic, Some(true));
    }

    #[test]
    fn test_view_background_change_emits_one_event() {
        let host = MemoryHost::new()
            .with_category("keyword", TextProperties::new())
            .with_view_background(TextProperties::new().with_background(Rgba::WHITE));
        let context = context(StyleSet::new().add("keyword", StyleRecord::new().bold(true)));
        let highlighter = context.highlight("text", &host.surface());
        let events = record_events(&context);

        let dark = Rgba::rgb(0x1E, 0x1E, 0x1E);
        host.editor
            .set_properties(
                VIEW_BACKGROUND_KEY,
                TextProperties::new().with_background(Brush::Solid(dark)),
            )
            .unwrap();

        assert_eq!(highlighter.view_background(), Some(dark));
        let backgrounds: Vec<_> = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, EngineEvent::BackgroundChanged(_)))
            .cloned()
            .collect();
        assert_eq!(backgrounds, vec![EngineEvent::BackgroundChanged(dark)]);
    }

    #[test]
    fn test_view_background_written_inside_an_operation_is_picked_up() {
        let host = MemoryHost::new()
            .with_category("keyword", TextProperties::new())
            .with_view_background(TextProperties::new().with_background(Rgba::WHITE));
        let explicit = Rgba::rgb(0x20, 0x40, 0x60);
        let context = context(StyleSet::new().add("keyword", StyleRecord::new().background(explicit)));
        let highlighter = context.highlight("text", &host.surface());
        let events = record_events(&context);

        highlighter.run_operation("outer", || {
            host.editor
                .set_properties(
                    VIEW_BACKGROUND_KEY,
                    TextProperties::new().with_background(Rgba::BLACK),
                )
                .unwrap();
            host.editor
                .set_properties("keyword", TextProperties::new().with_background(Rgba::BLACK))
                .unwrap();
        });

        assert_eq!(highlighter.view_background(), Some(Rgba::BLACK));
        let backgrounds: Vec<_> = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, EngineEvent::BackgroundChanged(_)))
            .cloned()
            .collect();
        assert_eq!(backgrounds, vec![EngineEvent::BackgroundChanged(Rgba::BLACK)]);
        assert_eq!(
            host.editor.properties("keyword").background,
            Some(Brush::Solid(explicit))
        );
    }

    #[test]
    fn test_default_font_size_change_reapplies_deltas() {
        let host = MemoryHost::new()
            .with_category("comment", TextProperties::new())
            .with_defaults(TextProperties::new().with_font_size(10.0));
        let context = context(
            StyleSet::new().add("comment", StyleRecord::new().font_size_delta(-1.0)),
        );
        let _highlighter = context.highlight("text", &host.surface());
        assert_eq!(host.editor.properties("comment").font_size, Some(9.0));
        let events = record_events(&context);

        host.classification
            .set_default_text_properties(TextProperties::new().with_font_size(14.0));

        assert_eq!(host.editor.properties("comment").font_size, Some(13.0));
        assert_eq!(
            host.classification
                .text_properties(&"comment".into())
                .font_size,
            Some(13.0)
        );
        let defaults_events = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, EngineEvent::DefaultTextPropertiesChanged(_)))
            .count();
        assert_eq!(defaults_events, 1);
    }

    #[test]
    fn test_default_typeface_change_follows_stretch_only_styles() {
        let host = MemoryHost::new()
            .with_category("type", TextProperties::new())
            .with_defaults(TextProperties::new().with_typeface(Typeface::new("Consolas")));
        let context = context(StyleSet::new().add("type", StyleRecord::new().stretch(3)));
        let _highlighter = context.highlight("text", &host.surface());

        host.classification.set_default_text_properties(
            TextProperties::new().with_typeface(Typeface::new("Cascadia Mono")),
        );

        assert_eq!(
            host.editor.properties("type").typeface,
            Some(Typeface::new("Cascadia Mono").with_stretch(3))
        );
    }

    #[test]
    fn test_background_change_cascades_to_inheriting_categories() {
        let table = DependencyTable::new()
            .add(DependencyEntry::new("identifier"))
            .add(DependencyEntry::new("parameter").inherits("identifier"));
        let host = MemoryHost::new()
            .with_category("identifier", TextProperties::new())
            .with_category("parameter", TextProperties::new());
        let context = EngineContext::new(EngineConfig::default(), table);
        context.load_styles(
            StyleSet::new().add("parameter", StyleRecord::new().background(Rgba::rgb(0, 0, 80))),
        );
        let highlighter = context.highlight("text", &host.surface());

        // The host repaints both in one batch; only the parameter is engine-owned.
        host.editor.begin_batch_update();
        host.editor
            .set_properties("identifier", TextProperties::new().with_background(Rgba::WHITE))
            .unwrap();
        host.editor
            .set_properties("parameter", TextProperties::new().with_background(Rgba::WHITE))
            .unwrap();
        host.editor.end_batch_update();

        assert_eq!(
            host.editor.properties("parameter").background,
            Some(Brush::Solid(Rgba::rgb(0, 0, 80)))
        );
        // Owned dimensions keep the pre-engine baseline.
        assert_eq!(highlighter.trace("parameter").unwrap().origin().background, None);
        assert!(highlighter.trace("identifier").is_none());
    }

    #[test]
    fn test_locked_handlers_only_record_intent() {
        let host = MemoryHost::new().with_category("keyword", TextProperties::new());
        let context = context(StyleSet::new().add("keyword", StyleRecord::new().bold(true)));
        let highlighter = context.highlight("text", &host.surface());
        let events = record_events(&context);

        highlighter.run_operation("test", || {
            highlighter.on_editor_format_changed(&["keyword".to_string()]);
            highlighter.on_editor_format_changed(&["keyword".to_string()]);
            assert!(highlighter.is_locked());
            assert_eq!(highlighter.active_operations(), vec!["test"]);
            assert!(events.borrow().is_empty());
        });

        assert_eq!(
            *events.borrow(),
            vec![EngineEvent::FormatItemsChanged(vec!["keyword".to_string()])]
        );
    }
}
