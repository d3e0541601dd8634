// tasks.rs — Runs network-bound units of work off the UI context.
//
// Each unit is spawned as its own tokio task and reports back exactly once
// through the runner's channel; the UI context receives those messages in
// its own event loop and never blocks on a worker.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ai::AiError;

/// Identifier of one spawned unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// Handle returned by [`TaskRunner::run`]; lets the caller abort the unit.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    cancel: CancellationToken,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Request cancellation. The unit still delivers one outcome
    /// (`AiError::Cancelled`).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Spawns units of work and funnels their outcomes, wrapped as `M`, into a
/// single channel owned by the UI context.
pub struct TaskRunner<M> {
    tx: mpsc::UnboundedSender<M>,
    root: CancellationToken,
    next_id: AtomicU64,
    in_flight: Arc<AtomicUsize>,
}

impl<M: Send + 'static> TaskRunner<M> {
    /// Create a runner plus the receiver the UI context should poll.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = Self {
            tx,
            root: CancellationToken::new(),
            next_id: AtomicU64::new(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
        };
        (runner, rx)
    }

    /// Spawn one unit of work.
    ///
    /// `work` receives a cancellation token scoped to this unit and builds
    /// the future to run. `deliver` wraps the single outcome into a UI
    /// message. Exactly one message is sent per call, whether the work
    /// succeeds, fails, panics or is cancelled.
    pub fn run<T, W, Fut, D>(&self, label: &'static str, work: W, deliver: D) -> TaskHandle
    where
        T: Send + 'static,
        W: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, AiError>> + Send + 'static,
        D: FnOnce(TaskId, Result<T, AiError>) -> M + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let cancel = self.root.child_token();
        let fut = work(cancel.clone());
        let tx = self.tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);
        log::debug!("TaskRunner: spawning {} #{}", label, id.0);

        let watch = cancel.clone();
        tokio::spawn(async move {
            let mut inner = tokio::spawn(fut);
            let outcome = tokio::select! {
                joined = &mut inner => match joined {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(AiError::Worker(format!("{label} panicked"))),
                    Err(e) => Err(AiError::Worker(e.to_string())),
                },
                _ = watch.cancelled() => {
                    inner.abort();
                    Err(AiError::Cancelled)
                }
            };

            if let Err(e) = &outcome {
                log::warn!("TaskRunner: {} #{} failed: {}", label, id.0, e);
            } else {
                log::debug!("TaskRunner: {} #{} finished", label, id.0);
            }

            in_flight.fetch_sub(1, Ordering::SeqCst);
            if tx.send(deliver(id, outcome)).is_err() {
                log::debug!("TaskRunner: receiver dropped, outcome of #{} discarded", id.0);
            }
        });

        TaskHandle { id, cancel }
    }

    /// Number of units spawned but not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cancel every outstanding unit. Units spawned afterwards start out
    /// cancelled.
    pub fn shutdown(&self) {
        log::info!("TaskRunner: cancelling {} unit(s)", self.in_flight());
        self.root.cancel();
    }

    /// Cancel outstanding units but keep accepting new ones.
    pub fn cancel_all(&mut self) {
        self.root.cancel();
        self.root = CancellationToken::new();
    }
}
