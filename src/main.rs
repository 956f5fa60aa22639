use anyhow::{Context, Result};
use clap::Parser;
use malslice::config::AgentConfig;
use malslice::logging::{init_tracing, init_tracing_json};
use malslice::oracle::{AmsiScanner, CommandDetector};
use malslice::task::{Orchestrator, TaskClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "malslice",
    about = "Locates the byte regions of a file that trigger an antivirus detection",
    version
)]
struct Cli {
    /// Base URL of the tasking server
    server_url: String,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Prefix step of the chunked scan
    #[arg(long)]
    default_step: Option<usize>,

    /// Prefix step of the thorough scan
    #[arg(long)]
    thorough_step: Option<usize>,

    /// Stop thorough scanning after this many regions
    #[arg(long)]
    max_regions: Option<usize>,

    /// Path to the scanner executable
    #[arg(long, value_name = "PATH")]
    detector: Option<PathBuf>,

    /// Hard timeout for a single scanner run, in seconds
    #[arg(long, value_name = "SECS")]
    detector_timeout: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AgentConfig::default(),
        };

        config.server_url = self.server_url;
        if let Some(step) = self.default_step {
            config.scan.default_step = step;
        }
        if let Some(step) = self.thorough_step {
            config.scan.thorough_step = step;
        }
        if let Some(max) = self.max_regions {
            config.scan.max_regions = max;
        }
        if let Some(program) = self.detector {
            config.detector.program = program;
        }
        if let Some(secs) = self.detector_timeout {
            config.detector.timeout_secs = secs;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        init_tracing_json();
    } else {
        init_tracing();
    }

    let config = cli.into_config()?;
    info!(
        server = %config.server_url,
        default_step = config.scan.default_step,
        thorough_step = config.scan.thorough_step,
        detector = %config.detector.program.display(),
        "Starting agent"
    );

    let client = TaskClient::new(config.server_url.clone(), &config.poll)
        .context("Failed to build HTTP client")?;
    let detector = Arc::new(CommandDetector::new(config.detector.clone()));
    let buffer_scanner = Arc::new(AmsiScanner::default());

    Orchestrator::new(client, detector, buffer_scanner, config)
        .run()
        .await;
    Ok(())
}
