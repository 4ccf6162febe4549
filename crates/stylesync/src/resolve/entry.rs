//! Declared categories and their relationships.

use std::collections::{BTreeSet, VecDeque};

use crate::style::StyleRecord;

/// Sentinel marking the top of the priority range.
pub const HIGH_PRIORITY: &str = "High";
/// Sentinel marking the bottom of the priority range.
pub const LOW_PRIORITY: &str = "Low";

/// Returns `true` for the `High`/`Low` sentinels.
pub fn is_sentinel(name: &str) -> bool {
    name == HIGH_PRIORITY || name == LOW_PRIORITY
}

/// Which side of the target a category must land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Before,
    After,
}

/// "Place this category before/after `target`" in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderConstraint {
    pub target: String,
    pub placement: Placement,
}

/// A category the product declares, with its inheritance and ordering.
///
/// # Example
///
/// ```rust
/// use stylesync::{DependencyEntry, StyleRecord};
///
/// let entry = DependencyEntry::new("Rust Lifetime")
///     .inherits("identifier")
///     .after("keyword")
///     .before("High")
///     .default_style(StyleRecord::new().italic(true));
///
/// assert_eq!(entry.dependencies().count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEntry {
    pub name: String,
    pub bases: Vec<String>,
    pub order: Vec<OrderConstraint>,
    pub default_style: Option<StyleRecord>,
}

impl DependencyEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            order: Vec::new(),
            default_style: None,
        }
    }

    /// Declares a base category this one inherits from.
    pub fn inherits(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Requires a higher priority than `target`.
    pub fn after(mut self, target: impl Into<String>) -> Self {
        self.order.push(OrderConstraint {
            target: target.into(),
            placement: Placement::After,
        });
        self
    }

    /// Requires a lower priority than `target`.
    pub fn before(mut self, target: impl Into<String>) -> Self {
        self.order.push(OrderConstraint {
            target: target.into(),
            placement: Placement::Before,
        });
        self
    }

    pub fn default_style(mut self, style: StyleRecord) -> Self {
        self.default_style = Some(style);
        self
    }

    /// Every category name this entry depends on: bases first, then order targets.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.bases
            .iter()
            .map(String::as_str)
            .chain(self.order.iter().map(|c| c.target.as_str()))
    }

    /// Names that must sit below this entry: bases and `After` targets.
    pub(crate) fn below(&self) -> impl Iterator<Item = &str> {
        self.bases.iter().map(String::as_str).chain(
            self.order
                .iter()
                .filter(|c| c.placement == Placement::After)
                .map(|c| c.target.as_str()),
        )
    }

    /// Names that must sit above this entry: `Before` targets.
    pub(crate) fn above(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|c| c.placement == Placement::Before)
            .map(|c| c.target.as_str())
    }
}

/// The product's declared categories, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyTable {
    entries: Vec<DependencyEntry>,
}

impl DependencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, returning the updated table. A later entry with the
    /// same name replaces the earlier one.
    pub fn add(mut self, entry: DependencyEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn insert(&mut self, entry: DependencyEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DependencyEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[DependencyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every category that inherits from `name`, directly or transitively.
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            for entry in &self.entries {
                if entry.bases.iter().any(|b| *b == current) && found.insert(entry.name.clone()) {
                    queue.push_back(entry.name.clone());
                }
            }
        }
        found.remove(name);
        found
    }
}

impl FromIterator<DependencyEntry> for DependencyTable {
    fn from_iter<I: IntoIterator<Item = DependencyEntry>>(iter: I) -> Self {
        let mut table = Self::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}
