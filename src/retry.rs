//! Bounded retry around single capture attempts
//!
//! Every failed attempt discards the worker's session, so the next attempt always
//! starts from a fresh browser. Transient failures never escape this module: a
//! domain ends as exactly one [`Outcome`].

use crate::executor::TaskExecutor;
use crate::session::SessionResource;
use crate::worker::WorkerState;
use crate::{Domain, Metrics, Outcome, RetryConfig, Task};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

impl RetryConfig {
    /// Delay before `attempt` (1-based). Zero for the first attempt.
    ///
    /// ```rust
    /// use domain_screenshot::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let retry = RetryConfig::default();
    /// assert_eq!(retry.delay_before(1), Duration::ZERO);
    /// assert_eq!(retry.delay_before(3), Duration::from_secs(2));
    /// ```
    pub fn delay_before(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(i32::MAX as usize) as i32;
        let scaled = self.delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay.max(self.delay);
        }
        Duration::from_secs_f64(scaled)
    }
}

pub struct RetryController {
    retry: RetryConfig,
    executor: TaskExecutor,
    output_dir: PathBuf,
    metrics: Metrics,
}

impl RetryController {
    pub fn new(
        retry: RetryConfig,
        executor: TaskExecutor,
        output_dir: PathBuf,
        metrics: Metrics,
    ) -> Self {
        Self {
            retry,
            executor,
            output_dir,
            metrics,
        }
    }

    /// Drives `domain` to a terminal outcome using `session`.
    ///
    /// `on_state` observes the worker-visible phases of the loop.
    pub async fn run<F>(&self, session: &mut SessionResource, domain: Domain, mut on_state: F) -> Outcome
    where
        F: FnMut(WorkerState) + Send,
    {
        let started = Instant::now();
        let max_attempts = self.retry.max_retries.max(1);
        let mut task = Task::new(domain);

        loop {
            if task.attempt > 1 {
                on_state(WorkerState::Retrying);
                self.metrics.record_retry();
                let delay = self.retry.delay_before(task.attempt);
                debug!(
                    "Retrying {} after {:?} (attempt {}/{})",
                    task.domain, delay, task.attempt, max_attempts
                );
                sleep(delay).await;
            }

            self.metrics.record_attempt();
            on_state(WorkerState::Acquiring);
            let result = match session.acquire().await {
                Ok(handle) => {
                    on_state(WorkerState::Executing);
                    self.executor
                        .execute(handle, &task.domain, &self.output_dir)
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(artifact) => {
                    on_state(WorkerState::Succeeded);
                    info!("Screenshot saved: {}", artifact.path.display());
                    return Outcome::success(task.domain, task.attempt, started.elapsed());
                }
                Err(e) => {
                    warn!(
                        "Error processing {} (attempt {}/{}): {}",
                        task.domain, task.attempt, max_attempts, e
                    );
                    self.metrics.record_attempt_failure(&e);
                    session.release().await;
                    if task.attempt >= max_attempts {
                        let last_error = Some(e.to_string());
                        return Outcome::failure(task.domain, task.attempt, last_error, started.elapsed());
                    }
                }
            }

            task.next_attempt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resize::LanczosResizer;
    use crate::testing::{Behaviour, FakeBackend};
    use crate::{Config, ScreenshotError};
    use std::sync::Arc;

    fn controller(dir: &std::path::Path, delay: Duration) -> RetryController {
        let config = Config {
            settle_delay: Duration::ZERO,
            attempt_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let retry = RetryConfig {
            delay,
            ..config.retry.clone()
        };
        RetryController::new(
            retry,
            TaskExecutor::new(&config, Arc::new(LanczosResizer)),
            dir.to_path_buf(),
            Metrics::default(),
        )
    }

    #[test]
    fn test_delay_before_growth_and_cap() {
        let retry = RetryConfig {
            max_retries: 6,
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        };
        assert_eq!(retry.delay_before(1), Duration::ZERO);
        assert_eq!(retry.delay_before(2), Duration::from_secs(1));
        assert_eq!(retry.delay_before(3), Duration::from_secs(2));
        assert_eq!(retry.delay_before(4), Duration::from_secs(4));
        assert_eq!(retry.delay_before(5), Duration::from_secs(5));
        assert_eq!(retry.delay_before(60), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_permanent_failure_uses_all_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new().with_behaviour("down.com", Behaviour::FailNavigation);
        let mut session = SessionResource::new(0, backend.as_backend(), Metrics::default());
        let controller = controller(dir.path(), Duration::from_millis(5));

        let outcome = controller
            .run(&mut session, Domain::parse("down.com").unwrap(), |_| {})
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.last_error.unwrap().contains("down.com"));
        assert_eq!(backend.navigations("down.com"), 3);
        assert_eq!(backend.launches(), 3);
        assert_eq!(backend.closes(), 3);
        assert!(!session.is_live());
    }

    #[tokio::test]
    async fn test_success_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new();
        let mut session = SessionResource::new(0, backend.as_backend(), Metrics::default());
        let controller = controller(dir.path(), Duration::from_millis(5));

        let mut states = Vec::new();
        let outcome = controller
            .run(&mut session, Domain::parse("a.com").unwrap(), |s| states.push(s))
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            states,
            vec![
                WorkerState::Acquiring,
                WorkerState::Executing,
                WorkerState::Succeeded
            ]
        );
        assert!(session.is_live());
        session.release().await;
    }

    #[tokio::test]
    async fn test_transient_failure_gets_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new().with_behaviour("flaky.com", Behaviour::FailTimes(1));
        let mut session = SessionResource::new(0, backend.as_backend(), Metrics::default());
        let controller = controller(dir.path(), Duration::from_millis(5));

        let outcome = controller
            .run(&mut session, Domain::parse("flaky.com").unwrap(), |_| {})
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(session.launches(), 2);
        assert_eq!(session.releases(), 1);
        assert!(dir.path().join("flaky_com.png").exists());
        session.release().await;
    }

    #[tokio::test]
    async fn test_launch_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new();
        backend.fail_next_launches(2);
        let mut session = SessionResource::new(0, backend.as_backend(), Metrics::default());
        let controller = controller(dir.path(), Duration::from_millis(5));

        let outcome = controller
            .run(&mut session, Domain::parse("a.com").unwrap(), |_| {})
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(backend.launches(), 1);
        session.release().await;
    }

    #[tokio::test]
    async fn test_retry_waits_between_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new().with_behaviour("down.com", Behaviour::FailNavigation);
        let mut session = SessionResource::new(0, backend.as_backend(), Metrics::default());
        let controller = controller(dir.path(), Duration::from_millis(40));

        let started = Instant::now();
        let outcome = controller
            .run(&mut session, Domain::parse("down.com").unwrap(), |_| {})
            .await;

        assert_eq!(outcome.attempts, 3);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_capture_failure_records_last_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new().with_behaviour("blank.com", Behaviour::FailCapture);
        let mut session = SessionResource::new(0, backend.as_backend(), Metrics::default());
        let controller = controller(dir.path(), Duration::from_millis(1));

        let outcome = controller
            .run(&mut session, Domain::parse("blank.com").unwrap(), |_| {})
            .await;

        assert!(!outcome.is_success());
        let expected = ScreenshotError::capture("blank.com", "").to_string();
        assert!(outcome.last_error.unwrap().starts_with(&expected));
    }
}
