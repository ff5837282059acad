//! Per-call state threaded through the save/load orchestrators and every
//! chunk handler.

use std::cell::Cell;

use log::debug;

/// Context shared by one save or load call.
///
/// `clock` is the host tick count the call runs at; clock-relative fields are
/// stored as deltas against it. The strict depth switches chunk handlers from
/// repairing anomalies to rejecting them.
#[derive(Debug)]
pub struct SaveContext {
    clock: u32,
    strict_depth: Cell<u32>,
}

impl SaveContext {
    pub fn new(clock: u32) -> Self {
        SaveContext {
            clock,
            strict_depth: Cell::new(0),
        }
    }

    pub fn clock(&self) -> u32 {
        self.clock
    }

    /// True while at least one strict scope is open.
    pub fn is_strict(&self) -> bool {
        self.strict_depth.get() > 0
    }

    pub fn strict_depth(&self) -> u32 {
        self.strict_depth.get()
    }

    /// Enter strict validation until the returned guard is dropped.
    pub fn strict_scope(&self) -> StrictScope<'_> {
        let depth = self.strict_depth.get() + 1;
        self.strict_depth.set(depth);
        debug!("Strict validation depth {}", depth);
        StrictScope { ctx: self }
    }
}

/// Leaves strict validation on drop, whichever way the scope exits.
#[must_use = "strict validation ends as soon as the scope is dropped"]
pub struct StrictScope<'a> {
    ctx: &'a SaveContext,
}

impl Drop for StrictScope<'_> {
    fn drop(&mut self) {
        let depth = self.ctx.strict_depth.get().saturating_sub(1);
        self.ctx.strict_depth.set(depth);
    }
}
