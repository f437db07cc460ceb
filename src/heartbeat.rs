//! Update-tick heartbeat
//!
//! The only work done on every application update: count the tick, and every `interval` ticks
//! log one line and emit `ExportEvent::Heartbeat`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use spout_sender_core::host::{HostEvent, UpdateListener};
use spout_sender_core::{Diagnostics, ExportEvent};

use crate::logi;

/// Counts update ticks and logs a heartbeat every `interval` of them.
///
/// Runs on the host's update thread: no locks, no GPU work.
pub struct Heartbeat {
    ticks: AtomicU64,
    interval: u64,
    diagnostics: Diagnostics,
}

impl Heartbeat {
    pub fn new(interval: u64, diagnostics: Diagnostics) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            interval: interval.max(1),
            diagnostics,
        }
    }

    /// Count one tick. Returns true when this tick emitted a heartbeat.
    pub fn tick(&self) -> bool {
        let n = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.interval != 0 {
            return false;
        }
        logi!("HEARTBEAT", "spout sender alive, {n} updates counted");
        self.diagnostics.emit(ExportEvent::Heartbeat { ticks: n });
        true
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl UpdateListener for Heartbeat {
    fn on_update(&self, _event: &HostEvent) {
        // The tick is counted before anything that can panic (stderr writes panic when stderr
        // is gone), and logging again here would only panic again.
        let _ = catch_unwind(AssertUnwindSafe(|| self.tick()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_multiples_of_interval() {
        let hb = Heartbeat::new(1000, Diagnostics::disabled());
        let fired: Vec<u64> = (1..=3500u64).filter(|_| hb.tick()).collect();
        assert_eq!(fired, vec![1000, 2000, 3000]);
        assert_eq!(hb.ticks(), 3500);
    }

    #[test]
    fn first_tick_does_not_fire() {
        let hb = Heartbeat::new(1000, Diagnostics::disabled());
        assert!(!hb.tick());
    }

    #[test]
    fn heartbeat_reaches_diagnostics() {
        let (diag, rx) = Diagnostics::channel(8);
        let hb = Heartbeat::new(2, diag);
        for _ in 0..4 {
            hb.on_update(&HostEvent::post_update());
        }
        let beats: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            beats,
            vec![
                ExportEvent::Heartbeat { ticks: 2 },
                ExportEvent::Heartbeat { ticks: 4 }
            ]
        );
    }
}
