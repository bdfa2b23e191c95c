use crate::{Outcome, ScreenshotError};
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Counter, Gauge,
    Histogram,
};
use std::net::SocketAddr;
use tracing::info;

/// Handles for the run's counters.
///
/// Handles are resolved against whatever recorder is installed when [`Metrics::new`]
/// runs; without one they are no-ops, which is what tests get.
#[derive(Clone)]
pub struct Metrics {
    pub attempts: Counter,
    pub retries: Counter,
    pub session_launches: Counter,
    pub session_releases: Counter,
    pub domains_succeeded: Counter,
    pub domains_failed: Counter,
    pub domain_duration: Histogram,
    pub active_workers: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            attempts: counter!("screenshot_attempts_total"),
            retries: counter!("screenshot_retries_total"),
            session_launches: counter!("screenshot_session_launches_total"),
            session_releases: counter!("screenshot_session_releases_total"),
            domains_succeeded: counter!("screenshot_domains_total", "status" => "success"),
            domains_failed: counter!("screenshot_domains_total", "status" => "failure"),
            domain_duration: histogram!("screenshot_domain_duration_seconds"),
            active_workers: gauge!("screenshot_active_workers"),
        }
    }

    pub fn record_attempt(&self) {
        self.attempts.increment(1);
    }

    pub fn record_retry(&self) {
        self.retries.increment(1);
    }

    pub fn record_attempt_failure(&self, error: &ScreenshotError) {
        counter!("screenshot_attempt_failures_total", "kind" => error.kind()).increment(1);
    }

    pub fn record_session_launch(&self) {
        self.session_launches.increment(1);
    }

    pub fn record_session_release(&self) {
        self.session_releases.increment(1);
    }

    pub fn record_outcome(&self, outcome: &Outcome) {
        if outcome.is_success() {
            self.domains_succeeded.increment(1);
        } else {
            self.domains_failed.increment(1);
        }
        self.domain_duration.record(outcome.duration.as_secs_f64());
    }

    pub fn worker_started(&self) {
        self.active_workers.increment(1.0);
    }

    pub fn worker_stopped(&self) {
        self.active_workers.decrement(1.0);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global Prometheus recorder and serves `/metrics` on `port`.
///
/// Must run inside the tokio runtime and before any [`Metrics`] is created.
pub fn install_prometheus_exporter(port: u16) -> Result<(), ScreenshotError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ScreenshotError::Configuration(format!("metrics exporter: {e}")))?;

    describe_counter!("screenshot_attempts_total", "Capture attempts started");
    describe_counter!("screenshot_retries_total", "Attempts scheduled after a failure");
    describe_counter!("screenshot_attempt_failures_total", "Failed attempts by error kind");
    describe_counter!("screenshot_session_launches_total", "Browser sessions launched");
    describe_counter!("screenshot_session_releases_total", "Browser sessions released");
    describe_counter!("screenshot_domains_total", "Terminal outcomes by status");
    describe_histogram!(
        "screenshot_domain_duration_seconds",
        "Wall time per domain, retries included"
    );
    describe_gauge!("screenshot_active_workers", "Workers currently pulling domains");

    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}
