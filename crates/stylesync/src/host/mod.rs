//! The host editor's format maps, as the engine sees them.
//!
//! The engine never owns rendering state. It reads and writes two host
//! stores through these traits:
//!
//! - [`EditorFormatMap`]: coarse properties keyed by category name, plus
//!   the view background under [`VIEW_BACKGROUND_KEY`]
//! - [`ClassificationFormatMap`]: merged properties keyed by
//!   [`ClassificationType`], plus the priority order and the default text
//!   properties
//!
//! Both maps notify subscribers synchronously on every write, including the
//! engine's own. Writes inside a `begin_batch_update`/`end_batch_update`
//! pair notify once, when the outermost batch ends.
//!
//! All methods take `&self`: a notification handler runs while the writer's
//! call is still on the stack and must be able to read the map again.
//! Implementations keep their state behind interior mutability.
//!
//! [`memory`] provides a complete in-memory host.

pub mod memory;

use std::fmt;
use std::rc::Rc;

use crate::properties::TextProperties;

/// Editor format map key holding the view background.
pub const VIEW_BACKGROUND_KEY: &str = "TextView Background";

/// Errors a host map may raise on a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The map was mutated by someone else while the write was in progress.
    #[error("format map '{key}' was modified concurrently")]
    ConcurrentModification { key: String },

    #[error("unknown format map key '{key}'")]
    UnknownKey { key: String },

    #[error("host rejected the write to '{key}': {reason}")]
    Rejected { key: String, reason: String },
}

/// A host-defined classification type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassificationType(String);

impl ClassificationType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassificationType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Change notification callback. Receives the keys (or type names) that changed.
///
/// An empty slice on a classification map means its default text
/// properties changed.
pub type ChangeHandler = Rc<dyn Fn(&[String])>;

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Host store of coarse properties keyed by category name.
pub trait EditorFormatMap {
    /// Current properties for `key`. Unknown keys read as empty.
    fn properties(&self, key: &str) -> TextProperties;

    fn set_properties(&self, key: &str, properties: TextProperties) -> Result<(), HostError>;

    fn begin_batch_update(&self);

    fn end_batch_update(&self);

    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Host store of merged properties keyed by classification type.
pub trait ClassificationFormatMap {
    fn text_properties(&self, ty: &ClassificationType) -> TextProperties;

    fn set_text_properties(
        &self,
        ty: &ClassificationType,
        properties: TextProperties,
    ) -> Result<(), HostError>;

    /// Properties every classification falls back to.
    fn default_text_properties(&self) -> TextProperties;

    /// Current priority order, lowest first.
    fn priority_order(&self) -> Vec<ClassificationType>;

    /// Inserts `ty` directly above `below`, or lowest when `below` is `None`.
    fn insert_priority(
        &self,
        ty: &ClassificationType,
        below: Option<&ClassificationType>,
    ) -> Result<(), HostError>;

    /// Exchanges the priorities of two types.
    fn swap_priorities(
        &self,
        a: &ClassificationType,
        b: &ClassificationType,
    ) -> Result<(), HostError>;

    fn begin_batch_update(&self);

    fn end_batch_update(&self);

    fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Host registry of classification types.
pub trait ClassificationTypeRegistry {
    /// Looks up a type. `None` means the host never defined it.
    fn classification_type(&self, name: &str) -> Option<ClassificationType>;

    fn create_classification_type(
        &self,
        name: &str,
        bases: &[ClassificationType],
    ) -> Result<ClassificationType, HostError>;
}

/// The host maps backing one rendering surface.
#[derive(Clone)]
pub struct HostSurface {
    pub editor_map: Rc<dyn EditorFormatMap>,
    pub classification_map: Rc<dyn ClassificationFormatMap>,
    pub types: Rc<dyn ClassificationTypeRegistry>,
}

impl HostSurface {
    pub fn new(
        editor_map: Rc<dyn EditorFormatMap>,
        classification_map: Rc<dyn ClassificationFormatMap>,
        types: Rc<dyn ClassificationTypeRegistry>,
    ) -> Self {
        Self {
            editor_map,
            classification_map,
            types,
        }
    }

    /// Returns `true` if both surfaces are backed by the same format maps.
    pub fn shares_maps_with(&self, other: &HostSurface) -> bool {
        same_object(&self.editor_map, &other.editor_map)
            && same_object(&self.classification_map, &other.classification_map)
    }
}

/// Compares data pointers only; vtable pointers of the same object may differ.
fn same_object<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

impl fmt::Debug for HostSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostSurface")
            .field("editor_map", &Rc::as_ptr(&self.editor_map))
            .field("classification_map", &Rc::as_ptr(&self.classification_map))
            .finish_non_exhaustive()
    }
}
