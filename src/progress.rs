//! Run-wide progress accounting
//!
//! Workers never share counters. They send [`ProgressEvent`]s to a single
//! aggregator task, which owns the totals, logs progress and publishes snapshots
//! on a watch channel.

use crate::{Domain, Outcome};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Total(usize),
    Success(Domain),
    Failure(Domain),
}

/// Snapshot of a run's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub total: Option<usize>,
    pub succeeded: usize,
    pub failed: usize,
}

impl ProgressState {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn percentage(&self) -> f64 {
        match self.total {
            Some(0) => 100.0,
            Some(total) => self.processed() as f64 / total as f64 * 100.0,
            None => 0.0,
        }
    }

    /// True once every announced domain has an outcome. Never true before the
    /// total is known.
    pub fn is_drained(&self) -> bool {
        matches!(self.total, Some(total) if self.processed() == total)
    }

    /// Folds `event` into the state. Returns false if the event was ignored.
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        match event {
            ProgressEvent::Total(total) => {
                if self.total.is_some() {
                    return false;
                }
                self.total = Some(*total);
                true
            }
            ProgressEvent::Success(_) | ProgressEvent::Failure(_) => {
                if let Some(total) = self.total {
                    if self.processed() >= total {
                        return false;
                    }
                }
                if matches!(event, ProgressEvent::Success(_)) {
                    self.succeeded += 1;
                } else {
                    self.failed += 1;
                }
                true
            }
        }
    }
}

/// Sending half handed to the orchestrator and every worker.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn total(&self, total: usize) {
        self.send(ProgressEvent::Total(total));
    }

    pub fn report(&self, outcome: &Outcome) {
        let event = if outcome.is_success() {
            ProgressEvent::Success(outcome.domain.clone())
        } else {
            ProgressEvent::Failure(outcome.domain.clone())
        };
        self.send(event);
    }

    fn send(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            warn!("Progress aggregator is gone, event dropped");
        }
    }
}

pub struct ProgressAggregator {
    handle: JoinHandle<ProgressState>,
    updates: watch::Receiver<ProgressState>,
}

impl ProgressAggregator {
    /// Starts the aggregator task, publishing every accepted event to `updates`.
    /// The published state is reset first.
    pub fn spawn(updates: Arc<watch::Sender<ProgressState>>) -> (ProgressReporter, Self) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        updates.send_replace(ProgressState::default());
        let receiver = updates.subscribe();

        let handle = tokio::spawn(async move {
            let mut state = ProgressState::default();
            while let Some(event) = rx.recv().await {
                if !state.apply(&event) {
                    warn!("Ignoring progress event {:?} in state {:?}", event, state);
                    continue;
                }
                if !matches!(event, ProgressEvent::Total(_)) {
                    info!(
                        "Progress: {}/{} ({:.1}%) - Success: {}, Errors: {}",
                        state.processed(),
                        state.total.unwrap_or_default(),
                        state.percentage(),
                        state.succeeded,
                        state.failed
                    );
                }
                updates.send_replace(state);
            }
            state
        });

        (
            ProgressReporter { tx },
            Self {
                handle,
                updates: receiver,
            },
        )
    }

    /// Resolves once the published state is drained, or `None` if every
    /// publisher is gone first.
    pub async fn wait_drained(&mut self) -> Option<ProgressState> {
        self.updates
            .wait_for(ProgressState::is_drained)
            .await
            .ok()
            .map(|state| *state)
    }

    /// Waits for every reporter to drop and returns the final state.
    pub async fn finish(self) -> ProgressState {
        match self.handle.await {
            Ok(state) => state,
            Err(e) => {
                warn!("Progress aggregator task failed: {}", e);
                *self.updates.borrow()
            }
        }
    }
}
