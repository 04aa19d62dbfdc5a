//! Pump statistics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Counters updated by the worker thread and read from any thread.
#[derive(Debug)]
pub struct PumpStats {
    started_at: Instant,
    acquired: AtomicU64,
    forwarded: AtomicU64,
    skipped: AtomicU64,
    pending_polls: AtomicU64,
    wait_timeouts: AtomicU64,
    bytes_forwarded: AtomicU64,
    encoder_available: AtomicBool,
}

impl PumpStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            acquired: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            pending_polls: AtomicU64::new(0),
            wait_timeouts: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            encoder_available: AtomicBool::new(false),
        }
    }

    pub fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame handed to the sink.
    pub fn record_forwarded(&self, bytes: usize) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a frame the sink declined.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acquire that reported no buffer yet.
    pub fn record_pending(&self) {
        self.pending_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait_timeout(&self) {
        self.wait_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_encoder_available(&self, available: bool) {
        self.encoder_available.store(available, Ordering::Relaxed);
    }

    /// Get current statistics snapshot.
    pub fn snapshot(&self) -> PumpStatsSnapshot {
        PumpStatsSnapshot {
            frames_acquired: self.acquired.load(Ordering::Relaxed),
            frames_forwarded: self.forwarded.load(Ordering::Relaxed),
            frames_skipped: self.skipped.load(Ordering::Relaxed),
            pending_polls: self.pending_polls.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            encoder_available: self.encoder_available.load(Ordering::Relaxed),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for PumpStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`PumpStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpStatsSnapshot {
    pub frames_acquired: u64,
    pub frames_forwarded: u64,
    pub frames_skipped: u64,
    pub pending_polls: u64,
    pub wait_timeouts: u64,
    pub bytes_forwarded: u64,
    pub encoder_available: bool,
    pub uptime_ms: u64,
}

impl PumpStatsSnapshot {
    /// Share of acquired frames that were forwarded, in percent.
    pub fn forward_ratio(&self) -> f32 {
        if self.frames_acquired == 0 {
            0.0
        } else {
            self.frames_forwarded as f32 / self.frames_acquired as f32 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = PumpStats::new();
        for _ in 0..4 {
            stats.record_acquired();
        }
        stats.record_forwarded(100);
        stats.record_skipped();
        stats.record_skipped();
        stats.record_skipped();
        stats.record_pending();
        stats.record_wait_timeout();
        stats.set_encoder_available(true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_acquired, 4);
        assert_eq!(snapshot.frames_forwarded, 1);
        assert_eq!(snapshot.frames_skipped, 3);
        assert_eq!(snapshot.bytes_forwarded, 100);
        assert_eq!(snapshot.pending_polls, 1);
        assert_eq!(snapshot.wait_timeouts, 1);
        assert!(snapshot.encoder_available);
        assert_eq!(snapshot.forward_ratio(), 25.0);
    }

    #[test]
    fn test_empty_ratio() {
        assert_eq!(PumpStatsSnapshot::default().forward_ratio(), 0.0);
    }
}
