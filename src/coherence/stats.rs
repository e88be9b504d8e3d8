use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide coherence counters. Monotonic; reset only by creating a new node.
#[derive(Debug, Default)]
pub struct DsmStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    invalidations_sent: AtomicU64,
    invalidations_received: AtomicU64,
}

impl DsmStats {
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation_sent(&self) {
        self.invalidations_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation_received(&self) {
        self.invalidations_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn invalidations_sent(&self) -> u64 {
        self.invalidations_sent.load(Ordering::Relaxed)
    }

    pub fn invalidations_received(&self) -> u64 {
        self.invalidations_received.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            invalidations_sent: self.invalidations_sent(),
            invalidations_received: self.invalidations_received(),
        }
    }
}

/// Point-in-time copy of `DsmStats`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub invalidations_sent: u64,
    pub invalidations_received: u64,
}

impl StatsSnapshot {
    /// Percentage of remote reads served from cache; 0 before the first remote read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 * 100.0 / total as f64
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache hits: {}", self.cache_hits)?;
        writeln!(f, "Cache misses: {}", self.cache_misses)?;
        writeln!(f, "Invalidations sent: {}", self.invalidations_sent)?;
        writeln!(f, "Invalidations received: {}", self.invalidations_received)?;
        write!(f, "Cache hit rate: {:.2}%", self.hit_rate())
    }
}

/// Outcome of the invalidation broadcast that follows a local write.
///
/// `skipped` peers were unreachable; the write is committed regardless.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvalidationReport {
    pub attempted: usize,
    pub notified: usize,
    pub skipped: usize,
}
