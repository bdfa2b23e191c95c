use crate::{
    format_duration, format_progress, generate_domain_file, ChromeBackend, Config, LanczosResizer,
    Metrics, Orchestrator, RunReport, StopHandle,
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "domain-screenshot")]
#[command(about = "Bulk website screenshot capture")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Serve Prometheus metrics on this port")]
    pub metrics_port: Option<u16>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture every domain in a target list
    Run {
        #[arg(short, long, help = "Domain list, one per line (default: TARGET_FILE or target.txt)")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Output directory for screenshots")]
        output: Option<PathBuf>,

        #[arg(short, long, help = "Number of concurrent workers")]
        workers: Option<usize>,

        #[arg(long, help = "Attempts per domain")]
        retries: Option<usize>,

        #[arg(long, help = "Delay between attempts in seconds")]
        retry_delay: Option<u64>,

        #[arg(long, help = "Wait after navigation in seconds")]
        settle: Option<u64>,

        #[arg(long, help = "Show the browser window")]
        headed: bool,

        #[arg(long, help = "Chrome executable path")]
        chrome_path: Option<String>,

        #[arg(long, help = "Progress reporting interval in seconds")]
        progress_interval: Option<u64>,

        #[arg(long, help = "Write a JSON run report to this path")]
        report: Option<PathBuf>,
    },

    /// Build a target list from names and extensions
    Generate {
        #[arg(short, long, default_value = "source.txt", help = "Base names, one per line")]
        names: PathBuf,

        #[arg(short, long, default_value = "extensions.txt", help = "Extensions such as .com, one per line")]
        extensions: PathBuf,

        #[arg(short, long, default_value = "target.txt", help = "Output list")]
        output: PathBuf,
    },

    /// Validate configuration
    Validate {
        #[arg(help = "Configuration file to validate")]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub workers: Option<usize>,
    pub retries: Option<usize>,
    pub retry_delay: Option<u64>,
    pub settle: Option<u64>,
    pub headed: bool,
    pub chrome_path: Option<String>,
    pub progress_interval: Option<u64>,
    pub report: Option<PathBuf>,
}

impl RunOptions {
    /// Applies command-line overrides, the last configuration layer.
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.target_file = input.clone();
        }
        if let Some(output) = &self.output {
            config.image_dir = output.clone();
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(retries) = self.retries {
            config.retry.max_retries = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry.delay = Duration::from_secs(delay);
        }
        if let Some(settle) = self.settle {
            config.settle_delay = Duration::from_secs(settle);
        }
        if self.headed {
            config.headless = false;
        }
        if let Some(chrome_path) = &self.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
    }
}

pub struct CliRunner {
    pub config: Config,
    pub metrics: Metrics,
}

impl CliRunner {
    pub fn new(config: Config, metrics: Metrics) -> Self {
        Self { config, metrics }
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Run {
                input,
                output,
                workers,
                retries,
                retry_delay,
                settle,
                headed,
                chrome_path,
                progress_interval,
                report,
            } => {
                self.run_capture(RunOptions {
                    input,
                    output,
                    workers,
                    retries,
                    retry_delay,
                    settle,
                    headed,
                    chrome_path,
                    progress_interval,
                    report,
                })
                .await
            }
            Commands::Generate {
                names,
                extensions,
                output,
            } => self.run_generate(&names, &extensions, &output).await,
            Commands::Validate { file } => self.validate_config(file).await,
        }
    }

    pub async fn run_capture(&self, options: RunOptions) -> anyhow::Result<()> {
        let mut config = self.config.clone();
        options.apply(&mut config);
        config.validate()?;

        info!(
            "Capturing {} into {} with {} workers",
            config.target_file.display(),
            config.image_dir.display(),
            config.max_workers
        );

        let orchestrator = Orchestrator::new(
            config.clone(),
            Arc::new(ChromeBackend::new(config)),
            Arc::new(LanczosResizer),
            self.metrics.clone(),
        );

        let signals = tokio::spawn(stop_on_signal(orchestrator.stop_handle()));

        let printer = options.progress_interval.map(|secs| {
            let mut updates = orchestrator.subscribe_progress();
            let started = Instant::now();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
                loop {
                    interval.tick().await;
                    let state = *updates.borrow_and_update();
                    println!("{}", format_progress(&state, started.elapsed()));
                }
            })
        });

        let result = orchestrator.run().await;

        signals.abort();
        if let Some(printer) = printer {
            printer.abort();
        }

        let report = result?;
        self.print_summary(&report);

        if let Some(path) = &options.report {
            write_report(&report, path).await?;
            info!("Run report written to {}", path.display());
        }

        if !report.drained {
            bail!(
                "run {} stopped early: {}/{} domains processed",
                report.run_id,
                report.progress.processed(),
                report.progress.total.unwrap_or_default()
            );
        }
        Ok(())
    }

    pub async fn run_generate(
        &self,
        names: &Path,
        extensions: &Path,
        output: &Path,
    ) -> anyhow::Result<()> {
        let written = generate_domain_file(names, extensions, output).await?;
        info!("Generated {} domains into {}", written, output.display());
        println!("Generated {} domains into {}", written, output.display());
        Ok(())
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> anyhow::Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config = Config::from_file(&config_path).await?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Workers: {}", config.max_workers);
        println!(
            "  Retries: {} (delay {:?}, multiplier {})",
            config.retry.max_retries, config.retry.delay, config.retry.multiplier
        );
        println!("  Settle delay: {:?}", config.settle_delay);
        println!("  Attempt timeout: {:?}", config.attempt_timeout);
        println!(
            "  Viewport: {}x{} (resized to width {})",
            config.viewport.width, config.viewport.height, config.resize_width
        );
        println!("  Headless: {}", config.headless);

        Ok(())
    }

    fn print_summary(&self, report: &RunReport) {
        println!("Run {} finished in {}", report.run_id, format_duration(report.elapsed));
        println!("  Success: {}", report.succeeded());
        println!("  Errors: {}", report.failed());
        for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
            println!(
                "  Failed: {} after {} attempts ({})",
                outcome.domain,
                outcome.attempts,
                outcome.last_error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

async fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)
        .await
        .with_context(|| format!("cannot write run report {}", path.display()))
}

/// Stops the run on SIGINT or SIGTERM. Workers finish their current domain.
async fn stop_on_signal(stop: StopHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Cannot install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received SIGINT");
    }

    warn!("Stopping: in-flight domains will finish, queued domains are skipped");
    stop.stop();
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install logger: {e}"))
}

/// Builds the effective configuration: defaults, then the optional JSON file,
/// then the environment (a `.env` file is honoured).
pub async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }
    config.apply_env()?;

    Ok(config)
}
