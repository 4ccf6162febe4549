//! Reentrancy fence for the highlighter.
//!
//! Writing to a host format map synchronously re-enters the highlighter's
//! change handlers. The fence tracks the stack of running operations; while
//! it is non-empty, handlers record what they would have done as
//! [`PendingEvents`] and return. The owner flushes the pending set once the
//! outermost operation finishes.

use std::cell::{Cell, RefCell};

use bitflags::bitflags;

bitflags! {
    /// Work requested while the fence was locked.
    ///
    /// Flushed in declaration order: notifications first, then apply, then refresh.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PendingEvents: u8 {
        const BACKGROUND = 1 << 0;
        const DEFAULT_TEXT = 1 << 1;
        const EDITOR_FORMAT = 1 << 2;
        const CLASSIFICATION_FORMAT = 1 << 3;
        const APPLY = 1 << 4;
        const REFRESH = 1 << 5;
    }
}

/// Observable state of a [`ReentrancyFence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Idle,
    InOperation { depth: usize, pending: PendingEvents },
}

#[derive(Debug, Default)]
pub struct ReentrancyFence {
    operations: RefCell<Vec<&'static str>>,
    pending: Cell<PendingEvents>,
}

impl ReentrancyFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `operation`; the returned guard pops it when dropped.
    pub fn enter(&self, operation: &'static str) -> FenceGuard<'_> {
        self.operations.borrow_mut().push(operation);
        FenceGuard { fence: self }
    }

    pub fn depth(&self) -> usize {
        self.operations.borrow().len()
    }

    pub fn is_locked(&self) -> bool {
        self.depth() > 0
    }

    pub fn state(&self) -> FenceState {
        match self.depth() {
            0 => FenceState::Idle,
            depth => FenceState::InOperation {
                depth,
                pending: self.pending.get(),
            },
        }
    }

    /// Operation names, outermost first.
    pub fn active_operations(&self) -> Vec<&'static str> {
        self.operations.borrow().clone()
    }

    pub fn defer(&self, events: PendingEvents) {
        self.pending.set(self.pending.get() | events);
    }

    /// Drops `events` from the pending set.
    pub fn cancel(&self, events: PendingEvents) {
        self.pending.set(self.pending.get() - events);
    }

    pub fn pending(&self) -> PendingEvents {
        self.pending.get()
    }

    /// Returns the pending set and clears it.
    pub fn take_pending(&self) -> PendingEvents {
        self.pending.replace(PendingEvents::empty())
    }
}

/// Pops one operation off the fence on drop.
#[must_use]
pub struct FenceGuard<'a> {
    fence: &'a ReentrancyFence,
}

impl Drop for FenceGuard<'_> {
    fn drop(&mut self) {
        self.fence.operations.borrow_mut().pop();
    }
}
