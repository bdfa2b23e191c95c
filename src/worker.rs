use crate::progress::ProgressReporter;
use crate::retry::RetryController;
use crate::session::SessionResource;
use crate::{Domain, Metrics, Outcome};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Idle,
    Acquiring,
    Executing,
    Succeeded,
    Retrying,
    Reporting,
    Drained,
}

/// Cooperative stop signal. Workers finish their current domain, then drain.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pre-filled queue of domains shared by all workers of a run.
///
/// Every domain is handed out at most once. The sender is dropped on
/// construction, so an empty queue means the run's input is exhausted.
pub struct TaskQueue {
    receiver: Mutex<mpsc::UnboundedReceiver<Domain>>,
    stop: StopHandle,
}

impl TaskQueue {
    pub fn new(domains: Vec<Domain>, stop: StopHandle) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        for domain in domains {
            // The receiver is alive, so this cannot fail.
            let _ = tx.send(domain);
        }
        Arc::new(Self {
            receiver: Mutex::new(rx),
            stop,
        })
    }

    /// Next domain, or `None` once the queue is empty or the run was stopped.
    pub async fn next(&self) -> Option<Domain> {
        if self.stop.is_stopped() {
            return None;
        }
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerStats {
    pub id: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub sessions_launched: usize,
}

#[derive(Debug)]
pub struct WorkerReport {
    pub stats: WorkerStats,
    pub outcomes: Vec<Outcome>,
}

pub struct Worker {
    id: usize,
    session: SessionResource,
    controller: Arc<RetryController>,
    state: WorkerState,
    stats: WorkerStats,
    metrics: Metrics,
}

impl Worker {
    pub fn new(
        id: usize,
        session: SessionResource,
        controller: Arc<RetryController>,
        metrics: Metrics,
    ) -> Self {
        Self {
            id,
            session,
            controller,
            state: WorkerState::Idle,
            stats: WorkerStats {
                id,
                ..Default::default()
            },
            metrics,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Pulls domains until the queue is exhausted, reporting one outcome per
    /// domain, then releases the session.
    pub async fn run(mut self, queue: Arc<TaskQueue>, reporter: ProgressReporter) -> WorkerReport {
        info!("Starting screenshot worker {}", self.id);
        self.metrics.worker_started();
        let mut outcomes = Vec::new();

        while let Some(domain) = queue.next().await {
            debug!("Worker {} processing {}", self.id, domain);

            let id = self.id;
            let mut phase = WorkerState::Idle;
            let outcome = self
                .controller
                .run(&mut self.session, domain, |state| {
                    debug!("Worker {} -> {:?}", id, state);
                    phase = state;
                })
                .await;
            self.state = phase;

            self.transition(WorkerState::Reporting);
            self.stats.processed += 1;
            if outcome.is_success() {
                self.stats.succeeded += 1;
            } else {
                self.stats.failed += 1;
            }
            self.metrics.record_outcome(&outcome);
            reporter.report(&outcome);
            outcomes.push(outcome);

            self.transition(WorkerState::Idle);
        }

        self.session.release().await;
        self.stats.sessions_launched = self.session.launches();
        self.transition(WorkerState::Drained);
        self.metrics.worker_stopped();

        info!(
            "Screenshot worker {} drained: {} processed, {} succeeded, {} failed",
            self.id, self.stats.processed, self.stats.succeeded, self.stats.failed
        );

        WorkerReport {
            stats: self.stats.clone(),
            outcomes,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!("Worker {} -> {:?}", self.id, next);
        self.state = next;
    }
}
