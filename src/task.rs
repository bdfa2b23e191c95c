use crate::Domain;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// One attempt at capturing a domain. `attempt` starts at 1.
#[derive(Debug, Clone)]
pub struct Task {
    pub domain: Domain,
    pub attempt: usize,
}

impl Task {
    pub fn new(domain: Domain) -> Self {
        Self { domain, attempt: 1 }
    }

    pub fn next_attempt(&mut self) {
        self.attempt += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Terminal result for one domain, emitted exactly once per domain per run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub domain: Domain,
    pub status: OutcomeStatus,
    pub attempts: usize,
    /// Message of the last attempt failure, kept for diagnostics only.
    pub last_error: Option<String>,
    pub duration: Duration,
}

impl Outcome {
    pub fn success(domain: Domain, attempts: usize, duration: Duration) -> Self {
        Self {
            domain,
            status: OutcomeStatus::Success,
            attempts,
            last_error: None,
            duration,
        }
    }

    pub fn failure(
        domain: Domain,
        attempts: usize,
        last_error: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            domain,
            status: OutcomeStatus::Failure,
            attempts,
            last_error,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// The persisted image for a domain.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub domain: Domain,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}
