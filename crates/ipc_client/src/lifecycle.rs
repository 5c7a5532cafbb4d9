//! Activation scopes that gate late settlements after a consumer goes away.

use std::{cell::Cell, rc::Rc};

/// Shared alive-flag for one consumer lifetime.
///
/// In-flight host calls are never cancelled; once the scope is deactivated their results are
/// simply not written back.
#[derive(Debug, Clone)]
pub struct ActivationScope {
    alive: Rc<Cell<bool>>,
}

impl Default for ActivationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationScope {
    /// Creates an active scope.
    pub fn new() -> Self {
        Self {
            alive: Rc::new(Cell::new(true)),
        }
    }

    /// Returns whether results should still be delivered.
    pub fn is_active(&self) -> bool {
        self.alive.get()
    }

    /// Ends the scope; every clone observes the change.
    pub fn deactivate(&self) {
        self.alive.set(false);
    }
}
