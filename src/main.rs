use clap::Parser;
use domain_screenshot::{install_prometheus_exporter, load_config, setup_logging, Cli, CliRunner, Metrics};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting domain-screenshot v{}", env!("CARGO_PKG_VERSION"));

    if let Some(port) = args.metrics_port {
        install_prometheus_exporter(port)?;
    }

    let config = match load_config(args.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let runner = CliRunner::new(config, Metrics::new());

    if let Err(e) = runner.run(args.command).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    info!("domain-screenshot stopped");
    Ok(())
}
