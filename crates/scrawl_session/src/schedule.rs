//! Self-throttled render scheduling
//!
//! One render pass may run at a time, and consecutive passes are spaced in
//! proportion to how long the previous pass took, so a slow device degrades
//! to a lower frame rate instead of a growing render queue. Requests that
//! arrive while a pass runs (or inside the throttle window) coalesce into a
//! single pending flag.

/// Floor between passes, milliseconds
pub const MIN_RENDER_DELAY_MS: u64 = 5;

/// The next pass waits at least this multiple of the last pass's cost
pub const THROTTLE_FACTOR: u64 = 2;

/// Re-entrancy guard plus cost-proportional throttle
#[derive(Debug, Default)]
pub struct RenderLoop {
    in_render: bool,
    pending: bool,
    next_allowed: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_rendering(&self) -> bool {
        self.in_render
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Ask to start a render pass at `now` (milliseconds)
    ///
    /// Returns true when the pass may run; otherwise the request is recorded
    /// and the caller should retry after [`Self::finish`] or once the
    /// throttle window elapses.
    pub fn request(&mut self, now: u64) -> bool {
        if self.in_render || now < self.next_allowed {
            self.pending = true;
            return false;
        }
        self.in_render = true;
        self.pending = false;
        true
    }

    /// Record a finished pass; returns whether a coalesced request is waiting
    pub fn finish(&mut self, now: u64, cost_ms: u64) -> bool {
        debug_assert!(self.in_render, "finish without a running pass");
        self.in_render = false;
        self.next_allowed = now + (cost_ms * THROTTLE_FACTOR).max(MIN_RENDER_DELAY_MS);
        std::mem::take(&mut self.pending)
    }

    /// Earliest time the next pass may start
    pub fn next_allowed(&self) -> u64 {
        self.next_allowed
    }
}
