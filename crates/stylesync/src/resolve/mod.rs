//! Category declarations and priority-order resolution.
//!
//! Products declare their classification categories as a
//! [`DependencyTable`] of [`DependencyEntry`] values: what each category
//! inherits from and where it must sit relative to others. The
//! [`DependencyResolver`] turns that table into concrete slots in the
//! host's priority order. Entries that can never be placed are reported as
//! [`ResolveError`]s and keep the host's default rendering.

mod entry;
mod error;
mod resolver;

pub use entry::{
    is_sentinel, DependencyEntry, DependencyTable, OrderConstraint, Placement, HIGH_PRIORITY,
    LOW_PRIORITY,
};
pub use error::ResolveError;
pub use resolver::{DependencyResolver, ExportedEntry, ExportedOrder};
