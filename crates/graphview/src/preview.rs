//! Debouncing of preview captures.
//!
//! Capturing a preview renders the whole graph, so bursts of requests
//! (one per moved node during a layout, say) are coalesced: a capture is due
//! once no request arrived for the debounce window. Time is supplied by the
//! caller as a monotonic offset, which keeps the scheduler deterministic.

use std::time::Duration;

use log::trace;

/// Trailing-edge debouncer for preview captures.
#[derive(Debug, Clone)]
pub struct PreviewScheduler {
    window: Duration,
    deadline: Option<Duration>,
}

impl PreviewScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Requests a capture at time `now`, pushing any pending one back.
    pub fn request(&mut self, now: Duration) {
        let deadline = now + self.window;
        trace!(deadline:? = deadline; "Preview requested");
        self.deadline = Some(deadline);
    }

    /// Whether a capture is due at `now`. A due capture is consumed.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drops a pending capture.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
