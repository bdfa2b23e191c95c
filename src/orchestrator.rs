//! Run orchestration
//!
//! Reads the domain list, fans it out to a bounded set of workers over a shared
//! pull queue and waits until every domain has a terminal outcome.

use crate::executor::TaskExecutor;
use crate::progress::{ProgressAggregator, ProgressState};
use crate::resize::ImageResizer;
use crate::retry::RetryController;
use crate::session::{RenderBackend, SessionResource};
use crate::worker::{StopHandle, TaskQueue, Worker, WorkerReport, WorkerStats};
use crate::{read_domain_list, Config, Domain, Metrics, Outcome, ScreenshotError};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub progress: ProgressState,
    /// False when the run was stopped before every domain had an outcome.
    pub drained: bool,
    pub outcomes: Vec<Outcome>,
    pub workers: Vec<WorkerStats>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.progress.succeeded
    }

    pub fn failed(&self) -> usize {
        self.progress.failed
    }
}

pub struct Orchestrator {
    config: Config,
    backend: Arc<dyn RenderBackend>,
    resizer: Arc<dyn ImageResizer>,
    metrics: Metrics,
    stop: StopHandle,
    progress: Arc<watch::Sender<ProgressState>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        backend: Arc<dyn RenderBackend>,
        resizer: Arc<dyn ImageResizer>,
        metrics: Metrics,
    ) -> Self {
        let (progress, _) = watch::channel(ProgressState::default());
        Self {
            config,
            backend,
            resizer,
            metrics,
            stop: StopHandle::default(),
            progress: Arc::new(progress),
        }
    }

    /// Handle that asks the run to stop pulling new domains.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Live progress of the current or most recent run.
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressState> {
        self.progress.subscribe()
    }

    /// Reads the configured target list and captures every domain in it.
    pub async fn run(&self) -> Result<RunReport, ScreenshotError> {
        let domains = read_domain_list(&self.config.target_file).await?;
        info!(
            "Loaded {} domains from {}",
            domains.len(),
            self.config.target_file.display()
        );
        self.run_domains(domains).await
    }

    /// Captures `domains`. Duplicates are processed independently and write the
    /// same artifact path.
    pub async fn run_domains(&self, domains: Vec<Domain>) -> Result<RunReport, ScreenshotError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.execute(run_id, domains).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, domains: Vec<Domain>) -> Result<RunReport, ScreenshotError> {
        let started_at = Utc::now();
        let started = Instant::now();
        let output_dir = self.config.image_dir.clone();

        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            ScreenshotError::Output(format!(
                "cannot create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        let total = domains.len();
        let (reporter, mut aggregator) = ProgressAggregator::spawn(self.progress.clone());
        reporter.total(total);

        let worker_count = self.config.max_workers.min(total);
        info!(
            "Starting run of {} domains with {} workers",
            total, worker_count
        );

        let controller = Arc::new(RetryController::new(
            self.config.retry.clone(),
            TaskExecutor::new(&self.config, self.resizer.clone()),
            output_dir,
            self.metrics.clone(),
        ));
        let queue = TaskQueue::new(domains, self.stop.clone());

        let handles: Vec<_> = (0..worker_count)
            .map(|id| {
                let session = SessionResource::new(id, self.backend.clone(), self.metrics.clone());
                let worker = Worker::new(id, session, controller.clone(), self.metrics.clone());
                tokio::spawn(
                    worker
                        .run(queue.clone(), reporter.clone())
                        .in_current_span(),
                )
            })
            .collect();
        drop(reporter);

        let joined = join_all(handles);
        tokio::pin!(joined);
        let results = tokio::select! {
            results = &mut joined => results,
            Some(_) = aggregator.wait_drained() => joined.await,
        };

        let mut outcomes = Vec::with_capacity(total);
        let mut workers = Vec::with_capacity(worker_count);
        for result in results {
            match result {
                Ok(WorkerReport { stats, outcomes: worker_outcomes }) => {
                    workers.push(stats);
                    outcomes.extend(worker_outcomes);
                }
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        let progress = aggregator.finish().await;
        let drained = progress.is_drained();
        if !drained {
            warn!(
                "Run stopped with {}/{} domains processed",
                progress.processed(),
                total
            );
        }

        let elapsed = started.elapsed();
        info!(
            "Run completed in {}. Success: {}, Errors: {}",
            crate::format_duration(elapsed),
            progress.succeeded,
            progress.failed
        );

        Ok(RunReport {
            run_id,
            started_at,
            elapsed,
            progress,
            drained,
            outcomes,
            workers,
        })
    }
}
