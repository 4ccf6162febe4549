//! Ownership tracking for the properties the engine overrides.
//!
//! A [`ChangeTrace`] sits between one live format-map entry and the
//! [`StyleRecord`] applied to it. For each of the nine property dimensions it
//! remembers the externally owned value (`origin`) and the value the engine
//! wrote (`changes`), and a [`FormatChanges`] mask of the dimensions the engine
//! currently owns.
//!
//! # Invariant
//!
//! After every [`ChangeTrace::change`] call, for every dimension `D`:
//!
//! ```text
//! live[D] == changes[D]   if D is in the mask
//! live[D] == origin[D]    otherwise
//! ```
//!
//! Dimensions never influence each other, and releasing a dimension restores
//! the origin value exactly.

use bitflags::bitflags;

use crate::properties::{DecorationLocation, TextDecoration, TextProperties, Typeface};
use crate::style::{opacity_alpha, Brush, StyleRecord};

/// Font size used when the host does not report a default.
pub const FALLBACK_FONT_SIZE: f64 = 10.0;
/// Font family used when the host does not report a default typeface.
pub const FALLBACK_FONT_FAMILY: &str = "Consolas";

bitflags! {
    /// A set of property dimensions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormatChanges: u16 {
        const BOLD = 1 << 0;
        const ITALIC = 1 << 1;
        const FOREGROUND = 1 << 2;
        const BACKGROUND = 1 << 3;
        const FOREGROUND_OPACITY = 1 << 4;
        const BACKGROUND_OPACITY = 1 << 5;
        const FONT_SIZE = 1 << 6;
        const TYPEFACE = 1 << 7;
        const DECORATIONS = 1 << 8;
        /// Dimensions whose changes propagate to inheriting categories.
        const CASCADING = Self::BACKGROUND.bits() | Self::FONT_SIZE.bits();
    }
}

/// Host defaults a style is resolved against.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeContext {
    pub default_font_size: f64,
    pub default_typeface: Typeface,
}

impl Default for ChangeContext {
    fn default() -> Self {
        Self {
            default_font_size: FALLBACK_FONT_SIZE,
            default_typeface: Typeface::new(FALLBACK_FONT_FAMILY),
        }
    }
}

impl ChangeContext {
    /// Builds a context from the host's default text properties.
    pub fn from_defaults(defaults: &TextProperties) -> Self {
        let fallback = Self::default();
        Self {
            default_font_size: defaults.font_size.unwrap_or(fallback.default_font_size),
            default_typeface: defaults
                .typeface
                .clone()
                .unwrap_or(fallback.default_typeface),
        }
    }
}

/// Origin/changes bookkeeping for one live category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTrace {
    origin: TextProperties,
    changes: TextProperties,
    mask: FormatChanges,
}

impl ChangeTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values as they were before the engine touched them.
    pub fn origin(&self) -> &TextProperties {
        &self.origin
    }

    /// Values the engine wrote. Only dimensions in [`mask`](Self::mask) are meaningful.
    pub fn changes(&self) -> &TextProperties {
        &self.changes
    }

    /// Dimensions the engine currently owns.
    pub fn mask(&self) -> FormatChanges {
        self.mask
    }

    /// Returns `true` when the engine owns no dimension.
    pub fn is_clear(&self) -> bool {
        self.mask.is_empty()
    }

    /// Reconciles `live` with `style`, one dimension at a time.
    ///
    /// For each dimension:
    ///
    /// 1. `style` specifies it: write the resolved value into `live` and
    ///    `changes` if it differs from the live value, and take ownership.
    /// 2. The engine owns it but `style` no longer specifies it: restore
    ///    `live` from `origin` and release it.
    /// 3. Otherwise, if `live` drifted away from `origin`, record the new
    ///    external value as the origin without touching `live`.
    ///
    /// Returns the dimensions that changed in this call. An unset or absent
    /// style only releases and tracks.
    pub fn change(
        &mut self,
        live: &mut TextProperties,
        style: Option<&StyleRecord>,
        cx: &ChangeContext,
    ) -> FormatChanges {
        let style = style.filter(|s| s.is_set());
        let desired = match style {
            Some(style) => self.resolve(style, live, cx),
            None => TextProperties::default(),
        };

        let mask = &mut self.mask;
        let origin = &mut self.origin;
        let changes = &mut self.changes;
        let mut changed = FormatChanges::empty();

        changed |= track(
            FormatChanges::BOLD,
            desired.bold,
            &mut live.bold,
            &mut origin.bold,
            &mut changes.bold,
            mask,
        );
        changed |= track(
            FormatChanges::ITALIC,
            desired.italic,
            &mut live.italic,
            &mut origin.italic,
            &mut changes.italic,
            mask,
        );
        changed |= track(
            FormatChanges::FOREGROUND,
            desired.foreground,
            &mut live.foreground,
            &mut origin.foreground,
            &mut changes.foreground,
            mask,
        );
        changed |= track(
            FormatChanges::BACKGROUND,
            desired.background,
            &mut live.background,
            &mut origin.background,
            &mut changes.background,
            mask,
        );
        changed |= track(
            FormatChanges::FOREGROUND_OPACITY,
            desired.foreground_opacity,
            &mut live.foreground_opacity,
            &mut origin.foreground_opacity,
            &mut changes.foreground_opacity,
            mask,
        );
        changed |= track(
            FormatChanges::BACKGROUND_OPACITY,
            desired.background_opacity,
            &mut live.background_opacity,
            &mut origin.background_opacity,
            &mut changes.background_opacity,
            mask,
        );
        changed |= track(
            FormatChanges::FONT_SIZE,
            desired.font_size,
            &mut live.font_size,
            &mut origin.font_size,
            &mut changes.font_size,
            mask,
        );
        changed |= track(
            FormatChanges::TYPEFACE,
            desired.typeface,
            &mut live.typeface,
            &mut origin.typeface,
            &mut changes.typeface,
            mask,
        );
        changed |= track(
            FormatChanges::DECORATIONS,
            desired.decorations,
            &mut live.decorations,
            &mut origin.decorations,
            &mut changes.decorations,
            mask,
        );

        changed
    }

    /// Restores every owned dimension of `live` from the origin and clears the trace.
    ///
    /// Returns the dimensions that were restored.
    pub fn reset(&mut self, live: &mut TextProperties) -> FormatChanges {
        let owned = self.mask;
        self.change(live, None, &ChangeContext::default());
        *self = Self::default();
        owned
    }

    /// Resolves the values `style` asks for. Dimensions it leaves alone stay `None`.
    fn resolve(
        &self,
        style: &StyleRecord,
        live: &TextProperties,
        cx: &ChangeContext,
    ) -> TextProperties {
        let opacity = |byte: u8| opacity_alpha(byte).map(|alpha| alpha as f64 / 255.0);

        let font_size =
            (style.font_size_delta != 0.0).then(|| cx.default_font_size + style.font_size_delta);

        let typeface = (style.font_family.is_some() || style.stretch.is_some()).then(|| Typeface {
            family: style
                .font_family
                .clone()
                .unwrap_or_else(|| cx.default_typeface.family.clone()),
            stretch: style.stretch.or(cx.default_typeface.stretch),
        });

        // Decorations are edited on top of the externally owned list.
        let external = if self.mask.contains(FormatChanges::DECORATIONS) {
            &self.origin.decorations
        } else {
            &live.decorations
        };

        TextProperties {
            bold: style.bold,
            italic: style.italic,
            foreground: style.foreground_color.map(Brush::Solid),
            background: style
                .background_color
                .map(|c| style.background_effect.brush(c)),
            foreground_opacity: opacity(style.foreground_opacity),
            background_opacity: opacity(style.background_opacity),
            font_size,
            typeface,
            decorations: decorations(style, external.as_deref()),
        }
    }
}

fn decorations(
    style: &StyleRecord,
    external: Option<&[TextDecoration]>,
) -> Option<Vec<TextDecoration>> {
    if !style.has_line_flags() {
        return None;
    }

    let pen = style.line_decoration.as_ref().map(|line| line.pen());
    let mut result: Vec<TextDecoration> = external.map(<[_]>::to_vec).unwrap_or_default();
    let flags = [
        (style.underline, DecorationLocation::Underline),
        (style.strikethrough, DecorationLocation::Strikethrough),
        (style.overline, DecorationLocation::OverLine),
    ];
    for (flag, location) in flags {
        let Some(on) = flag else { continue };
        result.retain(|d| d.location != location);
        if on {
            result.push(TextDecoration {
                location,
                pen: pen.clone(),
            });
        }
    }
    Some(result)
}

/// Applies the three-way rule to a single dimension.
fn track<T: Clone + PartialEq>(
    flag: FormatChanges,
    desired: Option<T>,
    live: &mut Option<T>,
    origin: &mut Option<T>,
    changes: &mut Option<T>,
    mask: &mut FormatChanges,
) -> FormatChanges {
    let owned = mask.contains(flag);
    match desired {
        Some(value) => {
            if !owned {
                // Baseline before the engine takes over.
                *origin = live.clone();
            }
            if live.as_ref() == Some(&value) {
                return FormatChanges::empty();
            }
            *live = Some(value.clone());
            *changes = Some(value);
            mask.insert(flag);
            flag
        }
        None if owned => {
            mask.remove(flag);
            *live = origin.clone();
            *changes = None;
            flag
        }
        None => {
            if live != origin {
                *origin = live.clone();
                flag
            } else {
                FormatChanges::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{BackgroundEffect, GradientDirection, LineDecoration, LineStyle, Rgba};

    fn keyword_live() -> TextProperties {
        TextProperties::new()
            .with_bold(false)
            .with_foreground(Rgba::BLACK)
    }

    #[test]
    fn test_keyword_scenario_apply_then_clear() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = keyword_live();
        let original = live.clone();

        let style = StyleRecord::new().bold(true).foreground(Rgba::rgb(255, 0, 0));
        let changed = trace.change(&mut live, Some(&style), &cx);

        assert_eq!(live.bold, Some(true));
        assert_eq!(live.foreground, Some(Brush::Solid(Rgba::rgb(255, 0, 0))));
        assert_eq!(changed, FormatChanges::BOLD | FormatChanges::FOREGROUND);
        assert_eq!(trace.mask(), FormatChanges::BOLD | FormatChanges::FOREGROUND);

        let cleared = StyleRecord::new();
        let changed = trace.change(&mut live, Some(&cleared), &cx);
        assert_eq!(live, original);
        assert_eq!(changed, FormatChanges::BOLD | FormatChanges::FOREGROUND);
        assert!(trace.mask().is_empty());
    }

    #[test]
    fn test_second_change_is_idempotent() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = keyword_live();
        let style = StyleRecord::new().italic(true).font_size_delta(2.0);

        assert!(!trace.change(&mut live, Some(&style), &cx).is_empty());
        let snapshot = live.clone();
        assert!(trace.change(&mut live, Some(&style), &cx).is_empty());
        assert_eq!(live, snapshot);
    }

    #[test]
    fn test_external_drift_updates_origin_only() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = keyword_live();
        trace.change(&mut live, Some(&StyleRecord::new().bold(true)), &cx);

        // Host changes the foreground, which the engine never owned.
        live.foreground = Some(Brush::Solid(Rgba::rgb(0, 0, 128)));
        let changed = trace.change(&mut live, Some(&StyleRecord::new().bold(true)), &cx);

        assert_eq!(changed, FormatChanges::FOREGROUND);
        assert_eq!(trace.origin().foreground, Some(Brush::Solid(Rgba::rgb(0, 0, 128))));
        assert_eq!(live.foreground, Some(Brush::Solid(Rgba::rgb(0, 0, 128))));
        assert_eq!(trace.mask(), FormatChanges::BOLD);
    }

    #[test]
    fn test_owned_dimension_is_reasserted_after_external_overwrite() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = keyword_live();
        let style = StyleRecord::new().bold(true);
        trace.change(&mut live, Some(&style), &cx);

        live.bold = Some(false);
        let changed = trace.change(&mut live, Some(&style), &cx);
        assert_eq!(changed, FormatChanges::BOLD);
        assert_eq!(live.bold, Some(true));
        // The pre-engine baseline survives.
        assert_eq!(trace.origin().bold, Some(false));
    }

    #[test]
    fn test_matching_host_value_is_not_taken_over() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = keyword_live();
        let changed = trace.change(&mut live, Some(&StyleRecord::new().bold(false)), &cx);

        assert!(changed.is_empty());
        assert!(trace.is_clear());
    }

    #[test]
    fn test_opacity_bytes() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = TextProperties::new();

        trace.change(&mut live, Some(&StyleRecord::new().foreground_opacity(255)), &cx);
        assert_eq!(live.foreground_opacity, None);

        trace.change(&mut live, Some(&StyleRecord::new().foreground_opacity(51)), &cx);
        assert_eq!(live.foreground_opacity, Some(0.2));
    }

    #[test]
    fn test_font_size_follows_default() {
        let mut trace = ChangeTrace::new();
        let mut live = TextProperties::new();
        let style = StyleRecord::new().font_size_delta(-2.0);

        let cx = ChangeContext {
            default_font_size: 12.0,
            ..ChangeContext::default()
        };
        trace.change(&mut live, Some(&style), &cx);
        assert_eq!(live.font_size, Some(10.0));

        let bigger = ChangeContext {
            default_font_size: 16.0,
            ..ChangeContext::default()
        };
        let changed = trace.change(&mut live, Some(&style), &bigger);
        assert_eq!(changed, FormatChanges::FONT_SIZE);
        assert_eq!(live.font_size, Some(14.0));
        assert_eq!(trace.origin().font_size, None);
    }

    #[test]
    fn test_typeface_uses_default_family_for_stretch_only() {
        let cx = ChangeContext::from_defaults(
            &TextProperties::new().with_typeface(Typeface::new("Cascadia Mono")),
        );
        let mut trace = ChangeTrace::new();
        let mut live = TextProperties::new();
        trace.change(&mut live, Some(&StyleRecord::new().stretch(3)), &cx);

        assert_eq!(
            live.typeface,
            Some(Typeface::new("Cascadia Mono").with_stretch(3))
        );
    }

    #[test]
    fn test_gradient_background() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = TextProperties::new();
        let style = StyleRecord::new()
            .background(Rgba::rgb(0, 128, 0))
            .background_effect(BackgroundEffect::GradientToBottom);
        trace.change(&mut live, Some(&style), &cx);

        assert_eq!(
            live.background,
            Some(Brush::LinearGradient {
                from: Rgba::rgb(0, 128, 0),
                to: Rgba::rgba(0, 128, 0, 0),
                direction: GradientDirection::ToBottom,
            })
        );
    }

    #[test]
    fn test_decorations_edit_external_list_and_revert() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let host = vec![TextDecoration::new(DecorationLocation::Underline)];
        let mut live = TextProperties::new().with_decorations(host.clone());

        let style = StyleRecord::new()
            .underline(false)
            .strikethrough(true)
            .line_decoration(LineDecoration {
                style: LineStyle::Squiggle,
                ..LineDecoration::default()
            });
        trace.change(&mut live, Some(&style), &cx);

        let applied = live.decorations.clone().unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].location, DecorationLocation::Strikethrough);
        assert_eq!(applied[0].pen.as_ref().unwrap().style, LineStyle::Squiggle);

        // Re-applying does not stack decorations.
        assert!(trace.change(&mut live, Some(&style), &cx).is_empty());

        trace.change(&mut live, None, &cx);
        assert_eq!(live.decorations, Some(host));
    }

    #[test]
    fn test_reset_restores_and_clears() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = keyword_live();
        let original = live.clone();
        trace.change(
            &mut live,
            Some(&StyleRecord::new().bold(true).background(Rgba::WHITE)),
            &cx,
        );

        let restored = trace.reset(&mut live);
        assert_eq!(restored, FormatChanges::BOLD | FormatChanges::BACKGROUND);
        assert_eq!(live, original);
        assert_eq!(trace, ChangeTrace::new());
    }

    #[test]
    fn test_unset_style_behaves_like_absent_style() {
        let cx = ChangeContext::default();
        let mut trace = ChangeTrace::new();
        let mut live = keyword_live();
        let changed = trace.change(&mut live, Some(&StyleRecord::new()), &cx);

        assert!(changed.is_empty());
        assert_eq!(live, keyword_live());
    }
}
