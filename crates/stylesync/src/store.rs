//! The engine context: shared style cache plus the set of live highlighters.
//!
//! One [`EngineContext`] is created per editor session and passed to
//! whoever needs it. It owns:
//!
//! - the style cache, swapped wholesale on reload
//! - the declared [`DependencyTable`]
//! - one [`Highlighter`] per rendering category, deduplicated by name and
//!   by underlying format maps
//! - the outbound [`EngineEvent`] hub
//!
//! Highlighters hold a reference to the same shared slot, so a reload never
//! needs to re-subscribe anything.
//!
//! # Example
//!
//! ```rust
//! use stylesync::host::memory::MemoryHost;
//! use stylesync::host::EditorFormatMap;
//! use stylesync::{DependencyTable, EngineConfig, EngineContext, StyleRecord, StyleSet, TextProperties};
//!
//! let host = MemoryHost::new().with_category("keyword", TextProperties::new().with_bold(false));
//! let context = EngineContext::new(EngineConfig::default(), DependencyTable::new());
//! context.load_styles(StyleSet::new().add("keyword", StyleRecord::new().bold(true)));
//!
//! context.highlight("text", &host.surface());
//! assert_eq!(host.editor.properties("keyword").bold, Some(true));
//!
//! context.reset();
//! assert_eq!(host.editor.properties("keyword").bold, Some(false));
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::highlighter::{EngineEvent, EventHub, EventListener, Highlighter, ListenerId};
use crate::host::HostSurface;
use crate::resolve::DependencyTable;
use crate::style::{Rgba, StyleRecord, StyleSet};
use crate::theme::{self, ColorMode};

/// State every highlighter of a context reads.
pub(crate) struct EngineShared {
    pub(crate) styles: RefCell<Rc<StyleSet>>,
    pub(crate) table: DependencyTable,
    pub(crate) events: EventHub,
    pub(crate) enabled: Cell<bool>,
    pub(crate) config: RefCell<EngineConfig>,
}

impl EngineShared {
    /// Current style cache. Callers hold a snapshot; a reload swaps the slot.
    pub(crate) fn styles(&self) -> Rc<StyleSet> {
        Rc::clone(&self.styles.borrow())
    }

    fn replace_styles(&self, mut styles: StyleSet) {
        for entry in self.table.entries() {
            if let Some(default) = &entry.default_style {
                styles.insert_default(&entry.name, default);
            }
        }
        *self.styles.borrow_mut() = Rc::new(styles);
    }
}

struct Registration {
    aliases: Vec<String>,
    highlighter: Rc<Highlighter>,
}

struct ContextInner {
    shared: Rc<EngineShared>,
    registrations: RefCell<Vec<Registration>>,
}

/// Owns the style cache and the highlighters of one editor session.
///
/// Cloning is cheap and yields a handle to the same context.
#[derive(Clone)]
pub struct EngineContext {
    inner: Rc<ContextInner>,
}

impl EngineContext {
    /// Creates a context with an empty style cache (plus the table's default
    /// styles).
    pub fn new(config: EngineConfig, table: DependencyTable) -> Self {
        let shared = Rc::new(EngineShared {
            styles: RefCell::new(Rc::new(StyleSet::new())),
            table,
            events: EventHub::new(),
            enabled: Cell::new(config.enabled),
            config: RefCell::new(config),
        });
        shared.replace_styles(StyleSet::new());

        let inner = Rc::new(ContextInner {
            shared,
            registrations: RefCell::new(Vec::new()),
        });

        let weak = Rc::downgrade(&inner);
        inner
            .shared
            .events
            .subscribe(Rc::new(move |event: &EngineEvent| {
                let EngineEvent::BackgroundChanged(background) = event else {
                    return;
                };
                if let Some(inner) = weak.upgrade() {
                    let context = EngineContext { inner };
                    if context.config().auto_invert_colors {
                        context.detect_theme_color_compatibility_with_background(*background);
                    }
                }
            }));

        Self { inner }
    }

    fn shared(&self) -> &Rc<EngineShared> {
        &self.inner.shared
    }

    /// Returns the highlighter for `category`, creating it on first use.
    ///
    /// A surface backed by the same format maps as an existing highlighter
    /// reuses it under the new name. A new highlighter exports missing
    /// declared categories, subscribes to the surface and applies the
    /// current styles to both maps.
    pub fn highlight(&self, category: &str, surface: &HostSurface) -> Rc<Highlighter> {
        if let Some(existing) = self.highlighter(category) {
            return existing;
        }

        {
            let mut registrations = self.inner.registrations.borrow_mut();
            if let Some(registration) = registrations
                .iter_mut()
                .find(|r| r.highlighter.surface().shares_maps_with(surface))
            {
                tracing::debug!(
                    category,
                    shared_with = %registration.highlighter.category(),
                    "reusing highlighter for identical format maps"
                );
                registration.aliases.push(category.to_string());
                return Rc::clone(&registration.highlighter);
            }
        }

        let highlighter = Highlighter::new(category, surface.clone(), Rc::clone(self.shared()));
        self.inner.registrations.borrow_mut().push(Registration {
            aliases: vec![category.to_string()],
            highlighter: Rc::clone(&highlighter),
        });

        if self.config().auto_invert_colors {
            if let Some(background) = highlighter.view_background() {
                self.detect_theme_color_compatibility_with_background(background);
            }
        }
        highlighter.apply();
        highlighter.refresh();
        highlighter
    }

    /// The highlighter registered under `category`, if any.
    pub fn highlighter(&self, category: &str) -> Option<Rc<Highlighter>> {
        self.inner
            .registrations
            .borrow()
            .iter()
            .find(|r| r.aliases.iter().any(|alias| alias == category))
            .map(|r| Rc::clone(&r.highlighter))
    }

    /// Every live highlighter, in creation order.
    pub fn highlighters(&self) -> Vec<Rc<Highlighter>> {
        self.inner
            .registrations
            .borrow()
            .iter()
            .map(|r| Rc::clone(&r.highlighter))
            .collect()
    }

    /// Every registered category name, aliases included.
    pub fn categories(&self) -> Vec<String> {
        self.inner
            .registrations
            .borrow()
            .iter()
            .flat_map(|r| r.aliases.iter().cloned())
            .collect()
    }

    /// Drops `category`. The highlighter detaches once its last alias is gone.
    ///
    /// Returns `false` if the category was not registered.
    pub fn close(&self, category: &str) -> bool {
        let removed = {
            let mut registrations = self.inner.registrations.borrow_mut();
            let Some(index) = registrations
                .iter()
                .position(|r| r.aliases.iter().any(|alias| alias == category))
            else {
                return false;
            };
            registrations[index].aliases.retain(|alias| alias != category);
            if registrations[index].aliases.is_empty() {
                Some(registrations.remove(index))
            } else {
                None
            }
        };

        if let Some(registration) = removed {
            registration.highlighter.detach();
            tracing::debug!(category, "closed highlighter");
        }
        true
    }

    /// Reverts every override in every highlighter.
    pub fn reset(&self) {
        for highlighter in self.highlighters() {
            highlighter.reset();
        }
    }

    /// Reverts the overrides of one rendering category.
    pub fn reset_category(&self, category: &str) -> bool {
        match self.highlighter(category) {
            Some(highlighter) => {
                highlighter.reset();
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared().enabled.get()
    }

    /// Disabling reverts everything; enabling re-applies the cache.
    pub fn set_enabled(&self, enabled: bool) {
        if self.is_enabled() == enabled {
            return;
        }
        self.shared().enabled.set(enabled);
        self.shared().config.borrow_mut().enabled = enabled;
        tracing::debug!(enabled, "engine toggled");

        for highlighter in self.highlighters() {
            if enabled {
                highlighter.apply();
                highlighter.refresh();
            } else {
                highlighter.reset();
            }
        }
    }

    /// Replaces the style cache and re-applies it to every highlighter.
    pub fn load_styles(&self, styles: StyleSet) {
        self.reset_style_cache(styles);
    }

    /// Swaps in a rebuilt cache. Existing highlighters keep their
    /// subscriptions and pick up the new styles on re-apply.
    pub fn reset_style_cache(&self, styles: StyleSet) {
        self.shared().replace_styles(styles);
        tracing::debug!(styles = self.styles().len(), "style cache replaced");
        self.on_config_changed(None);
    }

    /// Replaces a single record and re-applies that category.
    pub fn update_style(&self, category: &str, record: StyleRecord) {
        let mut styles = (*self.styles()).clone();
        styles.insert(category, record);
        *self.shared().styles.borrow_mut() = Rc::new(styles);
        self.on_config_changed(Some(category));
    }

    /// Reacts to a configuration change: one category, or everything when `None`.
    pub fn on_config_changed(&self, category: Option<&str>) {
        for highlighter in self.highlighters() {
            match category {
                Some(key) => {
                    highlighter.apply_key(key);
                }
                None => {
                    highlighter.apply();
                    highlighter.refresh();
                }
            }
        }
    }

    /// Inverts every stored color when the cache looks authored for the
    /// opposite background polarity.
    ///
    /// Returns `true` if colors were inverted and re-applied.
    pub fn detect_theme_color_compatibility_with_background(&self, background: Rgba) -> bool {
        let threshold = self.config().invert_threshold;
        let styles = self.styles();
        let tally = theme::assess(&styles, ColorMode::of(background));
        tracing::debug!(
            background = %background,
            compatible = tally.compatible,
            incompatible = tally.incompatible,
            threshold,
            "checked theme compatibility"
        );
        if !tally.should_invert(threshold) {
            return false;
        }

        let mut inverted = (*styles).clone();
        inverted.invert_brightness();
        *self.shared().styles.borrow_mut() = Rc::new(inverted);
        tracing::info!(
            background = %background,
            score = tally.score(),
            "inverted style colors to match the background"
        );

        for highlighter in self.highlighters() {
            highlighter.apply();
            highlighter.refresh();
        }
        true
    }

    /// Runs the compatibility check against the first observed view
    /// background, or the OS color mode when no surface reported one.
    pub fn check_theme_compatibility(&self) -> bool {
        let observed = self
            .highlighters()
            .iter()
            .find_map(|highlighter| highlighter.view_background());
        let background = observed.unwrap_or_else(|| match theme::detect_color_mode() {
            ColorMode::Dark => Rgba::BLACK,
            ColorMode::Light => Rgba::WHITE,
        });
        self.detect_theme_color_compatibility_with_background(background)
    }

    pub fn subscribe(&self, listener: EventListener) -> ListenerId {
        self.shared().events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.shared().events.unsubscribe(id);
    }

    /// Snapshot of the current style cache.
    pub fn styles(&self) -> Rc<StyleSet> {
        self.shared().styles()
    }

    pub fn table(&self) -> &DependencyTable {
        &self.shared().table
    }

    pub fn config(&self) -> EngineConfig {
        self.shared().config.borrow().clone()
    }

    /// Replaces the configuration, toggling the engine if `enabled` changed.
    pub fn set_config(&self, config: EngineConfig) {
        let enabled = config.enabled;
        *self.shared().config.borrow_mut() = config;
        self.set_enabled(enabled);
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("categories", &self.categories())
            .field("styles", &self.styles().len())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::host::{
        ClassificationFormatMap, ClassificationType, EditorFormatMap, VIEW_BACKGROUND_KEY,
    };
    use crate::properties::TextProperties;
    use crate::resolve::DependencyEntry;
    use crate::style::Brush;
    use serial_test::serial;

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            auto_invert_colors: false,
            ..EngineConfig::default()
        }
    }

    fn keyword_host() -> MemoryHost {
        MemoryHost::new().with_category(
            "keyword",
            TextProperties::new()
                .with_bold(false)
                .with_foreground(Rgba::BLACK),
        )
    }

    fn keyword_styles() -> StyleSet {
        StyleSet::new().add(
            "keyword",
            StyleRecord::new()
                .bold(true)
                .foreground(Rgba::rgb(255, 0, 0)),
        )
    }

    #[test]
    fn test_highlight_applies_to_both_maps() {
        let host = keyword_host();
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(keyword_styles());
        context.highlight("text", &host.surface());

        let expected = TextProperties::new()
            .with_bold(true)
            .with_foreground(Rgba::rgb(255, 0, 0));
        assert_eq!(host.editor.properties("keyword"), expected);
        assert_eq!(
            host.classification.text_properties(&"keyword".into()),
            expected
        );
    }

    #[test]
    fn test_highlight_reuses_by_name_and_by_maps() {
        let host = keyword_host();
        let context = EngineContext::new(quiet_config(), DependencyTable::new());

        let first = context.highlight("text", &host.surface());
        let again = context.highlight("text", &host.surface());
        let alias = context.highlight("projection", &host.surface());
        let other = context.highlight("output", &keyword_host().surface());

        assert!(Rc::ptr_eq(&first, &again));
        assert!(Rc::ptr_eq(&first, &alias));
        assert!(!Rc::ptr_eq(&first, &other));
        assert_eq!(context.highlighters().len(), 2);
        assert_eq!(context.categories(), vec!["text", "projection", "output"]);
    }

    #[test]
    fn test_close_detaches_after_last_alias() {
        let host = keyword_host();
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.highlight("text", &host.surface());
        context.highlight("projection", &host.surface());
        assert_eq!(host.editor.subscriber_count(), 1);

        assert!(context.close("text"));
        assert_eq!(host.editor.subscriber_count(), 1);
        assert!(context.close("projection"));
        assert_eq!(host.editor.subscriber_count(), 0);
        assert_eq!(host.classification.subscriber_count(), 0);
        assert!(!context.close("projection"));
    }

    #[test]
    fn test_reset_restores_origin() {
        let host = keyword_host();
        let original = host.editor.properties("keyword");
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(keyword_styles());
        let highlighter = context.highlight("text", &host.surface());

        context.reset();
        assert_eq!(host.editor.properties("keyword"), original);
        assert_eq!(
            host.classification.text_properties(&"keyword".into()),
            original
        );
        assert!(highlighter.trace("keyword").unwrap().is_clear());
    }

    #[test]
    fn test_reset_category_only_touches_that_highlighter() {
        let a = keyword_host();
        let b = keyword_host();
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(keyword_styles());
        context.highlight("text", &a.surface());
        context.highlight("output", &b.surface());

        assert!(context.reset_category("output"));
        assert_eq!(a.editor.properties("keyword").bold, Some(true));
        assert_eq!(b.editor.properties("keyword").bold, Some(false));
        assert!(!context.reset_category("missing"));
    }

    #[test]
    fn test_disable_and_enable() {
        let host = keyword_host();
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(keyword_styles());
        context.highlight("text", &host.surface());

        context.set_enabled(false);
        assert_eq!(host.editor.properties("keyword").bold, Some(false));
        assert!(!context.config().enabled);

        context.set_enabled(true);
        assert_eq!(host.editor.properties("keyword").bold, Some(true));
    }

    #[test]
    fn test_reload_swaps_cache_without_resubscribing() {
        let host = keyword_host();
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(keyword_styles());
        let highlighter = context.highlight("text", &host.surface());

        context.reset_style_cache(StyleSet::new().add("keyword", StyleRecord::new().italic(true)));

        let live = host.editor.properties("keyword");
        assert_eq!(live.bold, Some(false));
        assert_eq!(live.foreground, Some(Brush::Solid(Rgba::BLACK)));
        assert_eq!(live.italic, Some(true));
        assert!(highlighter.is_attached());
        assert_eq!(host.editor.subscriber_count(), 1);
    }

    #[test]
    fn test_update_style_reapplies_one_category() {
        let host = keyword_host().with_category("string", TextProperties::new());
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(keyword_styles());
        context.highlight("text", &host.surface());

        context.update_style("string", StyleRecord::new().italic(true));
        assert_eq!(host.editor.properties("string").italic, Some(true));
        assert_eq!(
            host.classification.text_properties(&"string".into()).italic,
            Some(true)
        );
        assert!(context.styles().has("string"));
    }

    #[test]
    fn test_table_defaults_fill_the_cache() {
        let table = DependencyTable::new().add(
            DependencyEntry::new("keyword").default_style(StyleRecord::new().italic(true)),
        );
        let context = EngineContext::new(quiet_config(), table);
        assert_eq!(context.styles().get("keyword").unwrap().italic, Some(true));

        context.load_styles(StyleSet::new().add("keyword", StyleRecord::new().bold(true)));
        let keyword = context.styles().get("keyword").cloned().unwrap();
        assert_eq!(keyword.bold, Some(true));
        assert_eq!(keyword.italic, None);
    }

    #[test]
    fn test_missing_categories_are_exported_once() {
        let table = DependencyTable::new()
            .add(DependencyEntry::new("doc tag").inherits("comment").after("comment"))
            .add(DependencyEntry::new("orphan").after("nowhere"));
        let host = MemoryHost::new()
            .with_category("comment", TextProperties::new())
            .with_category("keyword", TextProperties::new());
        let context = EngineContext::new(quiet_config(), table);
        let highlighter = context.highlight("text", &host.surface());

        assert_eq!(host.priority_names(), vec!["comment", "doc tag", "keyword"]);
        assert_eq!(
            host.types.bases_of("doc tag"),
            Some(vec![ClassificationType::new("comment")])
        );
        assert_eq!(highlighter.unresolved().len(), 1);
        assert_eq!(highlighter.unresolved()[0].category(), "orphan");
    }

    #[test]
    fn test_refresh_restores_disturbed_priority() {
        let table = DependencyTable::new()
            .add(DependencyEntry::new("doc tag").after("comment"));
        let host = MemoryHost::new()
            .with_category("doc tag", TextProperties::new())
            .with_category("comment", TextProperties::new());
        let context = EngineContext::new(quiet_config(), table);
        let highlighter = context.highlight("text", &host.surface());

        assert_eq!(host.priority_names(), vec!["comment", "doc tag"]);

        host.classification
            .set_priority_order(vec!["doc tag".into(), "comment".into()]);
        highlighter.refresh();
        assert_eq!(host.priority_names(), vec!["comment", "doc tag"]);
    }

    #[test]
    fn test_inversion_on_incompatible_background() {
        let styles = (0..5).fold(StyleSet::new(), |set, i| {
            set.add(
                &format!("s{i}"),
                StyleRecord::new().foreground(Rgba::rgb(0x10, 0x10, 0x40)),
            )
        });
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(styles);

        assert!(!context.detect_theme_color_compatibility_with_background(Rgba::WHITE));
        assert!(context.detect_theme_color_compatibility_with_background(Rgba::BLACK));
        let inverted = context.styles().get("s0").unwrap().foreground_color.unwrap();
        assert!(!inverted.is_dark());
        // Already compatible now.
        assert!(!context.detect_theme_color_compatibility_with_background(Rgba::BLACK));
    }

    #[test]
    fn test_auto_invert_follows_background_events() {
        let host = MemoryHost::new()
            .with_view_background(TextProperties::new().with_background(Rgba::WHITE))
            .with_category("s0", TextProperties::new())
            .with_category("s1", TextProperties::new())
            .with_category("s2", TextProperties::new())
            .with_category("s3", TextProperties::new());
        let styles = ["s0", "s1", "s2", "s3"].iter().fold(StyleSet::new(), |set, name| {
            set.add(name, StyleRecord::new().foreground(Rgba::rgb(0x10, 0x10, 0x40)))
        });
        let context = EngineContext::new(EngineConfig::default(), DependencyTable::new());
        context.load_styles(styles);
        context.highlight("text", &host.surface());
        assert!(host.editor.properties("s0").foreground.unwrap().color().is_dark());

        host.editor
            .set_properties(
                VIEW_BACKGROUND_KEY,
                TextProperties::new().with_background(Rgba::BLACK),
            )
            .unwrap();

        assert!(!host.editor.properties("s0").foreground.unwrap().color().is_dark());
    }

    #[test]
    #[serial]
    fn test_check_falls_back_to_detector() {
        theme::set_theme_detector(|| ColorMode::Dark);
        let styles = (0..4).fold(StyleSet::new(), |set, i| {
            set.add(&format!("s{i}"), StyleRecord::new().foreground(Rgba::BLACK))
        });
        let context = EngineContext::new(quiet_config(), DependencyTable::new());
        context.load_styles(styles);

        assert!(context.check_theme_compatibility());
        theme::reset_theme_detector();
    }
}
