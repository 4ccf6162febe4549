//! The style database: category name to [`StyleRecord`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::color::Rgba;
use super::record::StyleRecord;

/// A registry of style records keyed by category name.
///
/// Besides the records, a set can carry named color groups owned by other
/// settings (marker palettes and the like). They are not applied to format
/// maps but follow theme inversion together with the records.
///
/// # Example
///
/// ```rust
/// use stylesync::{Rgba, StyleRecord, StyleSet};
///
/// let styles = StyleSet::new()
///     .add("keyword", StyleRecord::new().bold(true))
///     .add("string", StyleRecord::new().foreground(Rgba::rgb(0xCE, 0x91, 0x78)))
///     .add_color("markers", "todo", Rgba::rgb(0xFF, 0xD7, 0x00));
///
/// assert!(styles.has("keyword"));
/// assert_eq!(styles.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSet {
    records: BTreeMap<String, StyleRecord>,
    color_groups: BTreeMap<String, BTreeMap<String, Rgba>>,
}

impl StyleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, returning the updated set for chaining.
    pub fn add(mut self, name: &str, record: StyleRecord) -> Self {
        self.insert(name, record);
        self
    }

    /// Adds a color to a named color group, returning the updated set.
    pub fn add_color(mut self, group: &str, name: &str, color: Rgba) -> Self {
        self.color_groups
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string(), color);
        self
    }

    /// Inserts or replaces a record, returning the previous one.
    pub fn insert(&mut self, name: &str, record: StyleRecord) -> Option<StyleRecord> {
        self.records.insert(name.to_string(), record)
    }

    pub fn remove(&mut self, name: &str) -> Option<StyleRecord> {
        self.records.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&StyleRecord> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut StyleRecord> {
        self.records.get_mut(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Number of records (color groups are not counted).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn color_group(&self, group: &str) -> Option<&BTreeMap<String, Rgba>> {
        self.color_groups.get(group)
    }

    /// Fills in `default` for `name` unless a record already exists.
    pub fn insert_default(&mut self, name: &str, default: &StyleRecord) {
        self.records
            .entry(name.to_string())
            .or_insert_with(|| default.clone());
    }

    /// Inverts the brightness of every stored color: records and color groups.
    pub fn invert_brightness(&mut self) {
        for record in self.records.values_mut() {
            record.invert_brightness();
        }
        for color in self.color_groups.values_mut().flat_map(|g| g.values_mut()) {
            *color = color.inverted_brightness();
        }
    }
}
