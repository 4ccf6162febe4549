//! Style-override synchronization for classified editor text.
//!
//! `stylesync` customizes how a host editor renders classified spans
//! (keywords, comments, identifiers, ...) without ever taking ownership of
//! properties it did not set. It reconciles three inputs that trigger each
//! other:
//!
//! - a user-editable [`StyleSet`] of [`StyleRecord`]s
//! - the host's editor format map, keyed by category name
//! - the host's classification format map, keyed by classification type,
//!   which also carries the priority order
//!
//! # Core Concepts
//!
//! - [`ChangeTrace`]: per-key record of the external `origin`, the engine's
//!   `changes` and the mask of owned dimensions. Reverting restores the
//!   origin exactly.
//! - [`Highlighter`]: the coordinator for one surface. It applies styles,
//!   reacts to host notifications and absorbs the echoes of its own writes
//!   through a [`ReentrancyFence`].
//! - [`DependencyResolver`]: places categories declared in a
//!   [`DependencyTable`] into the host's priority order.
//! - [`EngineContext`]: the entry point. It owns the style cache, one
//!   highlighter per surface and the outbound [`EngineEvent`]s.
//!
//! # Quick Start
//!
//! ```rust
//! use stylesync::host::memory::MemoryHost;
//! use stylesync::host::EditorFormatMap;
//! use stylesync::{
//!     DependencyEntry, DependencyTable, EngineConfig, EngineContext, Rgba, StyleRecord, StyleSet,
//!     TextProperties,
//! };
//!
//! let host = MemoryHost::new()
//!     .with_category("comment", TextProperties::new())
//!     .with_category("keyword", TextProperties::new().with_bold(false));
//!
//! let table = DependencyTable::new().add(
//!     DependencyEntry::new("doc comment")
//!         .inherits("comment")
//!         .after("comment"),
//! );
//! let context = EngineContext::new(EngineConfig::default(), table);
//! context.load_styles(
//!     StyleSet::new()
//!         .add("keyword", StyleRecord::new().bold(true))
//!         .add("doc comment", StyleRecord::new().foreground(Rgba::rgb(0x60, 0x80, 0x60))),
//! );
//!
//! let highlighter = context.highlight("text", &host.surface());
//! assert_eq!(host.editor.properties("keyword").bold, Some(true));
//! assert_eq!(host.priority_names(), vec!["comment", "doc comment", "keyword"]);
//!
//! // Only the dimension the engine set is tracked.
//! let trace = highlighter.trace("keyword").unwrap();
//! assert_eq!(trace.origin().bold, Some(false));
//! ```
//!
//! # Threading
//!
//! The engine runs on the host's UI thread. Everything is `Rc`/`RefCell`
//! based and `!Send`; host maps notify synchronously and the fence is the
//! only synchronization primitive.
//!
//! # Logging
//!
//! Diagnostics go through [`tracing`]. The library never installs a
//! subscriber.

pub mod config;
pub mod highlighter;
pub mod host;
pub mod properties;
pub mod resolve;
pub mod store;
pub mod style;
pub mod theme;
pub mod trace;

pub use config::{ConfigError, EngineConfig};
pub use highlighter::{
    EngineEvent, EventListener, FenceState, Highlighter, ListenerId, PendingEvents,
    ReentrancyFence,
};
pub use host::{HostError, HostSurface};
pub use properties::{DecorationLocation, TextDecoration, TextProperties, Typeface};
pub use resolve::{
    DependencyEntry, DependencyResolver, DependencyTable, ExportedOrder, Placement, ResolveError,
};
pub use store::EngineContext;
pub use style::{
    rgb_to_ansi256, BackgroundEffect, Brush, LineDecoration, LineStyle, Rgba, StyleFilter,
    StyleRecord, StyleSet,
};
pub use theme::ColorMode;
pub use trace::{ChangeContext, ChangeTrace, FormatChanges};
