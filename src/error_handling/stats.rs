//! Service statistics tracking.
//!
//! Thread-safe counters for queries, reloads and pipeline outcomes, shared
//! between the lookup owner, the per-query tasks and both updaters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;

/// Events counted by [`ServiceStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum EventKind {
    // Lookup service
    QueryAnswered,
    QuerySkipped,
    QueryLookupFailed,
    QueueFull,
    ReloadSucceeded,
    ReloadFailed,
    StoreReleased,
    // Geo pipeline
    GeoInstalled,
    GeoUpToDate,
    GeoFetchFailed,
    GeoCredentialRejected,
    GeoArchiveFailed,
    GeoInstallFailed,
    ReloadDropped,
    // Tor pipeline
    TorIndexPublished,
    TorFetchFailed,
    TorParseFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::QueryAnswered => "query answered",
            EventKind::QuerySkipped => "stale query skipped",
            EventKind::QueryLookupFailed => "query lookup failed",
            EventKind::QueueFull => "query queue full",
            EventKind::ReloadSucceeded => "reload succeeded",
            EventKind::ReloadFailed => "reload failed",
            EventKind::StoreReleased => "store generation released",
            EventKind::GeoInstalled => "geo database installed",
            EventKind::GeoUpToDate => "geo database up to date",
            EventKind::GeoFetchFailed => "geo fetch failed",
            EventKind::GeoCredentialRejected => "geo license key rejected",
            EventKind::GeoArchiveFailed => "geo archive invalid",
            EventKind::GeoInstallFailed => "geo install failed",
            EventKind::ReloadDropped => "reload trigger dropped",
            EventKind::TorIndexPublished => "tor index published",
            EventKind::TorFetchFailed => "tor fetch failed",
            EventKind::TorParseFailed => "tor parse failed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe service statistics.
///
/// Every [`EventKind`] is initialized to zero on creation, so increments never
/// allocate and can run from any task through a shared `Arc`.
pub struct ServiceStats {
    counters: HashMap<EventKind, AtomicUsize>,
}

impl ServiceStats {
    pub fn new() -> Self {
        let counters = EventKind::iter()
            .map(|kind| (kind, AtomicUsize::new(0)))
            .collect();
        ServiceStats { counters }
    }

    pub fn increment(&self, kind: EventKind) {
        if let Some(counter) = self.counters.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment counter for {:?} which is not in the map",
                kind
            );
        }
    }

    pub fn get(&self, kind: EventKind) -> usize {
        self.counters
            .get(&kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counts: EventKind::iter().map(|k| (k, self.get(k))).collect(),
        }
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of [`ServiceStats`] returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    counts: Vec<(EventKind, usize)>,
}

impl StatsSnapshot {
    pub fn get(&self, kind: EventKind) -> usize {
        self.counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    /// Iterates over non-zero counters.
    pub fn non_zero(&self) -> impl Iterator<Item = (EventKind, usize)> + '_ {
        self.counts.iter().copied().filter(|(_, v)| *v > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_stats_initialized_to_zero() {
        let stats = ServiceStats::new();
        for kind in EventKind::iter() {
            assert_eq!(stats.get(kind), 0, "{} should start at zero", kind);
        }
    }

    #[test]
    fn test_stats_increment_and_snapshot() {
        let stats = ServiceStats::new();
        stats.increment(EventKind::QueryAnswered);
        stats.increment(EventKind::QueryAnswered);
        stats.increment(EventKind::TorParseFailed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.get(EventKind::QueryAnswered), 2);
        assert_eq!(snapshot.get(EventKind::TorParseFailed), 1);
        assert_eq!(snapshot.get(EventKind::ReloadFailed), 0);
        assert_eq!(snapshot.non_zero().count(), 2);
    }

    #[test]
    fn test_stats_concurrent_increments() {
        let stats = Arc::new(ServiceStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.increment(EventKind::GeoUpToDate);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(stats.get(EventKind::GeoUpToDate), 800);
    }
}
