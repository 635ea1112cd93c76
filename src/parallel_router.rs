// THEORY:
// The `parallel_router` lets several identification lanes (one per camera or per
// conveyor belt) route parts at the same time against one profile and one bin grid.
//
// The only shared, mutable state is the cursor and the category bindings, and both
// live inside one `SortRouter` behind one mutex. A whole classify-then-allocate step
// runs inside the lock, including the fast path where the category is already bound.
// The first lane to route a category binds its bin; every other lane, then or later,
// reads the same bin. A lane that panics poisons the lock and every later route
// reports `StatePoisoned` instead of trusting half-updated state.
//
// `LanePool` is the task-level shape of this: a dispatcher hands incoming parts to
// a fixed set of worker tasks round-robin, each part carrying a oneshot reply.

use crate::core_modules::classifier::{MatchPolicy, MostSpecific};
use crate::core_modules::item::ItemDescriptor;
use crate::core_modules::snapshot::RunSnapshot;
use crate::error::{SortError, SortResult};
use crate::router::{RoutingDecision, SortRouter};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// A `SortRouter` shared between lanes.
pub struct SharedRouter<P: MatchPolicy = MostSpecific> {
    inner: Arc<Mutex<SortRouter<P>>>,
}

impl<P: MatchPolicy> Clone for SharedRouter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: MatchPolicy> SharedRouter<P> {
    pub fn new(router: SortRouter<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(router)),
        }
    }

    pub fn route(&self, item: &ItemDescriptor) -> SortResult<RoutingDecision> {
        let mut router = self.inner.lock().map_err(|_| SortError::StatePoisoned)?;
        router.route(item)
    }

    pub fn snapshot(&self) -> SortResult<RunSnapshot> {
        self.read(|router| router.snapshot())
    }

    /// Runs `f` against a consistent view of the router.
    pub fn read<R>(&self, f: impl FnOnce(&SortRouter<P>) -> R) -> SortResult<R> {
        let router = self.inner.lock().map_err(|_| SortError::StatePoisoned)?;
        Ok(f(&router))
    }
}

/// One part waiting for a lane.
pub struct RouteTask {
    pub item: ItemDescriptor,
    pub reply: oneshot::Sender<SortResult<RoutingDecision>>,
}

/// A fixed set of routing lanes sharing one router.
pub struct LanePool {
    task_sender: mpsc::UnboundedSender<RouteTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl LanePool {
    /// Spawns `lanes` workers (at least one). Must be called inside a tokio runtime.
    pub fn new<P: MatchPolicy + 'static>(router: SharedRouter<P>, lanes: usize) -> Self {
        let lanes = lanes.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<RouteTask>();

        let (lane_senders, lane_receivers): (Vec<_>, Vec<_>) =
            (0..lanes).map(|_| mpsc::unbounded_channel::<RouteTask>()).unzip();

        let dispatcher = tokio::spawn(async move {
            let mut lane_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                // A closed lane drops the task, and with it the reply sender.
                let _ = lane_senders[lane_idx].send(task);
                lane_idx = (lane_idx + 1) % lanes;
            }
        });

        let workers = lane_receivers
            .into_iter()
            .enumerate()
            .map(|(lane, mut lane_receiver)| {
                let router = router.clone();
                tokio::spawn(async move {
                    while let Some(task) = lane_receiver.recv().await {
                        let result = router.route(&task.item);
                        let _ = task.reply.send(result);
                    }
                    debug!(lane, "routing lane stopped");
                })
            })
            .collect();

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    pub fn lanes(&self) -> usize {
        self.workers.len()
    }

    pub async fn route(&self, item: ItemDescriptor) -> SortResult<RoutingDecision> {
        let (reply, response) = oneshot::channel();
        self.task_sender
            .send(RouteTask { item, reply })
            .map_err(|_| SortError::WorkerUnavailable)?;
        response.await.map_err(|_| SortError::WorkerUnavailable)?
    }

    /// Stops accepting parts and waits for in-flight ones to finish.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
