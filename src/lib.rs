//! # Domain Screenshot
//!
//! Bulk website screenshot capture. A line-delimited list of domains is fanned
//! out to a fixed number of workers; each worker drives its own headless Chrome
//! session, saves one PNG per domain and downsizes it to a thumbnail width.
//!
//! ## Pipeline
//!
//! - **Orchestrator**: reads the domain list, starts `min(max_workers, domains)`
//!   workers and waits until every domain has a terminal outcome
//! - **Workers**: pull from a shared queue, so each domain is processed exactly once
//! - **Sessions**: one browser per worker, launched lazily and discarded after
//!   any failed attempt
//! - **Retry**: a bounded number of attempts per domain with a delay in between
//! - **Progress**: a single aggregator owns the counters and logs progress
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_screenshot::{ChromeBackend, Config, LanczosResizer, Metrics, Orchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let orchestrator = Orchestrator::new(
//!         config.clone(),
//!         Arc::new(ChromeBackend::new(config)),
//!         Arc::new(LanczosResizer),
//!         Metrics::new(),
//!     );
//!
//!     let report = orchestrator.run().await?;
//!     println!("{} captured, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! domain-screenshot generate --names source.txt --extensions extensions.txt --output target.txt
//! domain-screenshot run --input target.txt --output img --workers 4
//! ```

/// Configuration and settings for capture runs
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Domain tokens, artifact naming and list generation
pub mod domain;

/// Tasks, outcomes and artifacts
pub mod task;

/// Rendering session abstraction and per-worker session ownership
pub mod session;

/// Chrome backend built on chromiumoxide
pub mod chrome;

/// Image downscaling
pub mod resize;

/// Single capture attempt
pub mod executor;

/// Bounded retry with session discard
pub mod retry;

/// Worker loop and the shared domain queue
pub mod worker;

/// Progress aggregation
pub mod progress;

/// Run orchestration
pub mod orchestrator;

/// Command-line interface implementation
pub mod cli;

/// Prometheus metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod testing;


pub use chrome::*;
pub use cli::*;
pub use config::*;
pub use domain::*;
pub use error::*;
pub use executor::*;
pub use self::metrics::*;
pub use orchestrator::*;
pub use progress::*;
pub use resize::*;
pub use retry::*;
pub use session::*;
pub use task::*;
pub use utils::*;
pub use worker::*;
