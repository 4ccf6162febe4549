//! Fixed-point priority resolution.
//!
//! Categories are placed into the host's priority order one pass at a time.
//! An entry is exported in a pass when every category it depends on already
//! has a slot: a host-known type, a sentinel, or an entry exported earlier
//! (in this pass or a previous one). Resolution stops once a pass makes no
//! progress, so it terminates in at most N passes for N entries, cycles
//! included.
//!
//! # Slot rules
//!
//! ```text
//! Low < ... host order ... < High
//!
//! lo = 1 + highest slot among bases and `after` targets
//! hi = lowest slot among `before` targets
//! ```
//!
//! An entry with `before` targets is inserted at `hi`, pushing the target
//! up. Otherwise it is inserted at `lo`, directly above its highest
//! dependency. `hi < lo` is a [`ResolveError::ConflictingOrder`].

use std::collections::{BTreeMap, BTreeSet};

use super::entry::{is_sentinel, DependencyEntry, HIGH_PRIORITY, LOW_PRIORITY};
use super::error::ResolveError;

/// A category that received a concrete slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedEntry {
    pub name: String,
    /// Index into [`ExportedOrder::order`].
    pub position: usize,
    pub bases: Vec<String>,
}

/// Result of [`DependencyResolver::register`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedOrder {
    /// Full priority order, lowest first, without the sentinels.
    pub order: Vec<String>,
    /// Newly exported entries, in the order they were exported.
    pub exported: Vec<ExportedEntry>,
    /// Entries that could not be placed. Each entry appears at most once.
    pub unresolved: Vec<ResolveError>,
    /// Number of passes the fixed-point loop ran.
    pub passes: usize,
}

impl ExportedOrder {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// The category directly below `name`, `None` when `name` is lowest.
    pub fn placed_above(&self, name: &str) -> Option<&str> {
        let position = self.position(name)?;
        position
            .checked_sub(1)
            .and_then(|below| self.order.get(below))
            .map(String::as_str)
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.exported.iter().any(|e| e.name == name)
    }
}

/// Places declared categories into an existing priority order.
///
/// # Example
///
/// ```rust
/// use stylesync::{DependencyEntry, DependencyResolver};
///
/// let resolver = DependencyResolver::new(["text", "keyword"]);
/// let result = resolver.register(&[
///     DependencyEntry::new("control keyword").inherits("keyword"),
///     DependencyEntry::new("doc comment").before("keyword"),
/// ]);
///
/// assert_eq!(
///     result.order,
///     vec!["text", "doc comment", "keyword", "control keyword"]
/// );
/// assert!(result.unresolved.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    known: Vec<String>,
}

impl DependencyResolver {
    /// Seeds the resolver with the host's current priority order, lowest first.
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: known
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !is_sentinel(name))
                .collect(),
        }
    }

    pub fn register(&self, entries: &[DependencyEntry]) -> ExportedOrder {
        let mut slots: Vec<String> = Vec::with_capacity(self.known.len() + entries.len() + 2);
        slots.push(LOW_PRIORITY.to_string());
        slots.extend(self.known.iter().cloned());
        slots.push(HIGH_PRIORITY.to_string());

        let declared: BTreeSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        let mut unresolved = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut pending: Vec<&DependencyEntry> = Vec::new();

        for entry in entries {
            // Host-known names and repeated declarations keep their first slot.
            if slots.contains(&entry.name) || !seen.insert(entry.name.as_str()) {
                continue;
            }
            let missing = entry
                .dependencies()
                .find(|dep| !declared.contains(dep) && !slots.iter().any(|s| s == dep));
            match missing {
                Some(dep) => {
                    unresolved.push(ResolveError::UnresolvedDependency {
                        from: entry.name.clone(),
                        to: dep.to_string(),
                    });
                }
                None => pending.push(entry),
            }
        }

        let mut exported_names: Vec<&DependencyEntry> = Vec::new();
        let mut passes = 0;
        while !pending.is_empty() {
            passes += 1;
            let before = pending.len();
            let mut still_pending = Vec::with_capacity(before);

            for entry in pending {
                let ready = entry
                    .dependencies()
                    .all(|dep| slots.iter().any(|s| s == dep));
                if !ready {
                    still_pending.push(entry);
                    continue;
                }
                match place(&mut slots, entry) {
                    Ok(slot) => {
                        tracing::trace!(category = %entry.name, slot, pass = passes, "exported category");
                        exported_names.push(entry);
                    }
                    Err(err) => unresolved.push(err),
                }
            }

            pending = still_pending;
            if pending.len() == before {
                break;
            }
        }

        let waiting: BTreeMap<&str, &DependencyEntry> =
            pending.iter().map(|e| (e.name.as_str(), *e)).collect();
        for entry in &pending {
            unresolved.push(classify(entry, &waiting, &slots));
        }

        let order: Vec<String> = slots.into_iter().filter(|s| !is_sentinel(s)).collect();
        let exported = exported_names
            .into_iter()
            .filter_map(|entry| {
                let position = order.iter().position(|n| *n == entry.name)?;
                Some(ExportedEntry {
                    name: entry.name.clone(),
                    position,
                    bases: entry.bases.clone(),
                })
            })
            .collect();

        ExportedOrder {
            order,
            exported,
            unresolved,
            passes,
        }
    }
}

/// Inserts `entry` into `slots`, returning the slot it landed in.
fn place(slots: &mut Vec<String>, entry: &DependencyEntry) -> Result<usize, ResolveError> {
    let slot_of = |name: &str| slots.iter().position(|s| s == name);
    let floor = slot_of(LOW_PRIORITY).unwrap_or(0) + 1;
    let ceiling = slot_of(HIGH_PRIORITY).unwrap_or(slots.len());

    let highest_below = entry
        .below()
        .filter_map(|dep| slot_of(dep).map(|slot| (slot, dep)))
        .max_by_key(|(slot, _)| *slot);
    let lowest_above = entry
        .above()
        .filter_map(|dep| slot_of(dep).map(|slot| (slot, dep)))
        .min_by_key(|(slot, _)| *slot);

    let lo = highest_below.map_or(floor, |(slot, _)| slot + 1);
    let hi = lowest_above.map_or(ceiling, |(slot, _)| slot);

    if hi < lo || hi < floor || lo > ceiling {
        return Err(ResolveError::ConflictingOrder {
            name: entry.name.clone(),
            after: highest_below.map_or(LOW_PRIORITY, |(_, dep)| dep).to_string(),
            before: lowest_above.map_or(HIGH_PRIORITY, |(_, dep)| dep).to_string(),
        });
    }

    let slot = if lowest_above.is_some() { hi } else { lo };
    slots.insert(slot, entry.name.clone());
    Ok(slot)
}

/// Explains why a pending entry never became ready.
fn classify(
    entry: &DependencyEntry,
    waiting: &BTreeMap<&str, &DependencyEntry>,
    slots: &[String],
) -> ResolveError {
    let mut path: Vec<&str> = vec![entry.name.as_str()];
    let mut current = entry;

    loop {
        let blocker = current
            .dependencies()
            .find(|dep| !slots.iter().any(|s| s == dep));
        let Some(dep) = blocker else { break };

        if let Some(start) = path.iter().position(|p| *p == dep) {
            if start == 0 {
                let mut cycle: Vec<String> = path.iter().map(|p| p.to_string()).collect();
                cycle.push(dep.to_string());
                return ResolveError::CycleDetected { path: cycle };
            }
            break;
        }
        match waiting.get(dep) {
            Some(next) => {
                path.push(dep);
                current = next;
            }
            None => {
                return ResolveError::UnresolvedDependency {
                    from: entry.name.clone(),
                    to: dep.to_string(),
                }
            }
        }
    }

    // Blocked behind another entry's cycle.
    ResolveError::UnresolvedDependency {
        from: entry.name.clone(),
        to: path.get(1).copied().unwrap_or(entry.name.as_str()).to_string(),
    }
}
