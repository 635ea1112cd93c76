// THEORY:
// The `sort_loop` is the machine's main loop, minus the hardware. Parts arrive from
// identification as a stream of `ItemDescriptor`s; each one is routed and the
// decision is handed to an `Actuator`, which turns bin coordinates into belt and
// gate motion somewhere outside this crate.
//
// Key architectural principles:
// 1.  **One Part at a Time**: A part is routed and delivered before the next one is
//     pulled from the stream. Nothing about a part is ever half done.
// 2.  **Stop Between Parts**: A `StopHandle` ends the run, but the loop only looks at
//     it between parts, so a stop never lands between classify and allocate.
// 3.  **Failure Policy at the Edge**: The router reports unmatched parts; the loop's
//     `UnmatchedPolicy` decides whether that is a skip or a halt. A bin the fixture
//     cannot reach (`GridExhausted`) is fatal for that part only.

use crate::config::{SorterConfig, UnmatchedPolicy};
use crate::core_modules::bin_grid::FixtureBounds;
use crate::core_modules::classifier::MatchPolicy;
use crate::core_modules::item::ItemDescriptor;
use crate::core_modules::stats::SortStats;
use crate::error::{SortError, SortResult};
use crate::router::{RoutingDecision, SortRouter};
use futures::{Stream, StreamExt};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};

/// The motion-control side of the machine.
pub trait Actuator {
    /// Moves the part described by `decision` into its bin.
    fn deliver(&mut self, decision: &RoutingDecision) -> SortResult<()>;
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    fn deliver(&mut self, decision: &RoutingDecision) -> SortResult<()> {
        (**self).deliver(decision)
    }
}

/// Refuses bins outside the physical fixture before they reach the real actuator.
pub struct BoundedActuator<A> {
    inner: A,
    bounds: FixtureBounds,
}

impl<A: Actuator> BoundedActuator<A> {
    pub fn new(inner: A, bounds: FixtureBounds) -> Self {
        Self { inner, bounds }
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: Actuator> Actuator for BoundedActuator<A> {
    fn deliver(&mut self, decision: &RoutingDecision) -> SortResult<()> {
        self.bounds.check(decision.location)?;
        self.inner.deliver(decision)
    }
}

/// Ends a running `SortLoop` after the part in hand.
#[derive(Clone)]
pub struct StopHandle {
    stop_tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

pub struct SortLoop {
    unmatched: UnmatchedPolicy,
    stop_rx: watch::Receiver<bool>,
}

impl SortLoop {
    pub fn new(config: &SorterConfig) -> (Self, StopHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let sort_loop = Self {
            unmatched: config.unmatched,
            stop_rx,
        };
        (sort_loop, StopHandle { stop_tx })
    }

    /// Routes parts until the stream ends, a stop is requested, or a fatal error.
    pub async fn run<P, S, A>(
        &mut self,
        router: &mut SortRouter<P>,
        items: S,
        mut actuator: A,
    ) -> SortResult<SortStats>
    where
        P: MatchPolicy,
        S: Stream<Item = ItemDescriptor>,
        A: Actuator,
    {
        let mut items = std::pin::pin!(items);
        let mut stats = SortStats::new();
        let mut stop_live = true;
        info!(profile = %router.profile().name, "sort run started");

        loop {
            if *self.stop_rx.borrow() {
                info!("stop requested, ending sort run");
                break;
            }

            let item = tokio::select! {
                biased;
                changed = self.stop_rx.changed(), if stop_live => {
                    // Every StopHandle is gone; only the stream can end the run now.
                    stop_live = changed.is_ok();
                    continue;
                }
                next = items.next() => match next {
                    Some(item) => item,
                    None => break,
                },
            };

            match router.route(&item) {
                Ok(decision) => match actuator.deliver(&decision) {
                    Ok(()) => {
                        stats.record_routed(&decision.category, decision.fresh_bin, Instant::now())
                    }
                    Err(err @ SortError::GridExhausted { .. }) => {
                        warn!(item = %item.label(), error = %err, "actuation refused bin");
                        stats.record_rejected(decision.fresh_bin);
                    }
                    Err(err) => return Err(err),
                },
                Err(err @ SortError::NoMatchingCategory { .. }) => match self.unmatched {
                    UnmatchedPolicy::Skip => stats.record_unmatched(),
                    UnmatchedPolicy::Halt => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }

        info!(
            routed = stats.routed,
            unmatched = stats.unmatched,
            rejected = stats.rejected,
            bins = stats.bins_allocated,
            "sort run finished"
        );
        Ok(stats)
    }
}
