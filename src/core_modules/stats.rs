// THEORY:
// `SortStats` is the running tally of a sort run: how many parts went where, how
// many could not be placed, and how fast parts are arriving. The throughput figure
// is the mean gap between consecutive routed parts, ignoring gaps long enough to
// mean the machine was idle (a jam, a refill, a lunch break) rather than slow.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Gaps longer than this are treated as idle time, not throughput.
pub const MAX_GAP_BETWEEN_ITEMS: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default, Serialize)]
pub struct SortStats {
    pub routed: u64,
    pub unmatched: u64,
    /// Routed items the actuation layer refused (e.g. a bin past the fixture).
    pub rejected: u64,
    pub bins_allocated: u64,
    pub per_category: BTreeMap<String, u64>,
    #[serde(skip)]
    last_routed_at: Option<Instant>,
    #[serde(skip)]
    gap_total: Duration,
    #[serde(skip)]
    gap_count: u32,
}

impl SortStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_routed(&mut self, category: &str, fresh_bin: bool, at: Instant) {
        self.routed += 1;
        if fresh_bin {
            self.bins_allocated += 1;
        }
        *self.per_category.entry(category.to_string()).or_default() += 1;

        if let Some(previous) = self.last_routed_at {
            let gap = at.saturating_duration_since(previous);
            if gap <= MAX_GAP_BETWEEN_ITEMS {
                self.gap_total += gap;
                self.gap_count += 1;
            }
        }
        self.last_routed_at = Some(at);
    }

    pub fn record_unmatched(&mut self) {
        self.unmatched += 1;
    }

    /// A routed item the actuation layer refused. Its bin is still spent.
    pub fn record_rejected(&mut self, fresh_bin: bool) {
        self.rejected += 1;
        if fresh_bin {
            self.bins_allocated += 1;
        }
    }

    /// Mean seconds between routed items, or `None` without a qualifying gap.
    pub fn average_seconds_between_items(&self) -> Option<f64> {
        (self.gap_count > 0).then(|| (self.gap_total / self.gap_count).as_secs_f64())
    }
}
