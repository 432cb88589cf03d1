//! Traffic statistics for the bridge
//!
//! Thread-safe counters updated by the dispatcher and read from anywhere.
//! Uses lock-free atomics for all operations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Datagram counters (fully lock-free)
#[derive(Default)]
pub struct Stats {
    /// Datagrams delivered to `on_receive`
    rx_frames: AtomicU64,
    /// Payload bytes delivered to `on_receive`
    rx_bytes: AtomicU64,
    /// Receives rejected by the transport
    rx_rejected: AtomicU64,
    /// Acknowledged sends
    tx_frames: AtomicU64,
    /// Payload bytes of acknowledged sends
    tx_bytes: AtomicU64,
    /// Sends that were not acknowledged or were cancelled
    tx_failed: AtomicU64,
    /// Stale datagrams discarded on start
    drained: AtomicU64,
}

/// Point-in-time copy of `Stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub rx_frames: u64,
    pub rx_bytes: u64,
    pub rx_rejected: u64,
    pub tx_frames: u64,
    pub tx_bytes: u64,
    pub tx_failed: u64,
    pub drained: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_rx(&self, bytes: usize) {
        self.rx_frames.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_rx_rejected(&self) {
        self.rx_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_tx(&self, bytes: usize) {
        self.tx_frames.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_tx_failed(&self) {
        self.tx_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_drained(&self, frames: usize) {
        self.drained.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_rejected: self.rx_rejected.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_failed: self.tx_failed.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx {} ({} B, {} rejected) | tx {} ({} B, {} failed) | drained {}",
            self.rx_frames,
            self.rx_bytes,
            self.rx_rejected,
            self.tx_frames,
            self.tx_bytes,
            self.tx_failed,
            self.drained
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = Stats::new();
        stats.add_rx(5);
        stats.add_rx(7);
        stats.add_rx_rejected();
        stats.add_tx(3);
        stats.add_tx_failed();
        stats.add_drained(4);

        let snap = stats.snapshot();
        assert_eq!(snap.rx_frames, 2);
        assert_eq!(snap.rx_bytes, 12);
        assert_eq!(snap.rx_rejected, 1);
        assert_eq!(snap.tx_frames, 1);
        assert_eq!(snap.tx_bytes, 3);
        assert_eq!(snap.tx_failed, 1);
        assert_eq!(snap.drained, 4);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = std::sync::Arc::new(Stats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.add_tx(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().tx_frames, 4000);
    }
}
