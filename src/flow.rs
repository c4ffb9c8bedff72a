//! Clear-to-send flow control.
//!
//! The modem flags in every inbound report whether it can take another
//! packet. The reader publishes that hint here; the writer consumes it once
//! per packet.
//!
//! ```text
//! Reader ── set() / clear() ──► ClearToSend ◄── acquire() ── Writer
//! ```
//!
//! The flag is a hint, not a lease: a stale value only costs an extra wait
//! of at most one poll interval. Waiters are woken through a
//! `tokio::sync::Notify` and re-check the flag on the poll interval as a
//! fallback, since the modem can go quiet without ever reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Default fallback re-check interval for [`ClearToSend::acquire`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared clear-to-send flag.
#[derive(Debug)]
pub struct ClearToSend {
    clear: AtomicBool,
    notify: Notify,
}

impl ClearToSend {
    /// Create a flag that starts out clear to send.
    pub fn new() -> Self {
        Self {
            clear: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// Mark the modem ready and wake a waiting writer.
    pub fn set(&self) {
        if !self.clear.swap(true, Ordering::AcqRel) {
            tracing::trace!("CTS set");
        }
        self.notify.notify_one();
    }

    /// Mark the modem busy.
    pub fn clear(&self) {
        if self.clear.swap(false, Ordering::AcqRel) {
            tracing::trace!("CTS cleared");
        }
    }

    /// Check the current hint without consuming it.
    #[inline]
    pub fn is_clear(&self) -> bool {
        self.clear.load(Ordering::Acquire)
    }

    /// Consume the flag if it is set.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.clear
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Wait until clear to send, then consume the flag.
    pub async fn acquire(&self, poll_interval: Duration) {
        loop {
            if self.try_acquire() {
                return;
            }
            // A notify_one() with no waiter leaves a permit, so a set() landing
            // between the check above and this await is not lost.
            let _ = tokio::time::timeout(poll_interval, self.notify.notified()).await;
        }
    }
}

impl Default for ClearToSend {
    fn default() -> Self {
        Self::new()
    }
}
