use crate::Config;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "url-prober")]
#[command(about = "Probe URLs concurrently for size and response time")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, help = "File with URLs to process, one per line")]
    pub file: PathBuf,

    #[arg(short, long, help = "Maximum number of concurrent workers")]
    pub max_workers: Option<usize>,

    #[arg(long, help = "User-Agent header sent with every request")]
    pub user_agent: Option<String>,

    #[arg(long, help = "Per-request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Seconds an idle worker waits before retiring")]
    pub idle_timeout: Option<u64>,

    #[arg(long, help = "Largest body accepted on the streamed GET path, in bytes")]
    pub max_size: Option<u64>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Write per-URL diagnostics to this file instead of stdout")]
    pub diagnostics: Option<PathBuf>,

    #[arg(long, help = "Print the final tally as JSON")]
    pub json: bool,

    #[arg(long, help = "Serve Prometheus metrics on this address")]
    pub metrics_addr: Option<SocketAddr>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

impl Cli {
    /// Command-line values win over whatever the config file set.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(max_workers) = self.max_workers {
            config.max_workers = max_workers;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(idle_timeout) = self.idle_timeout {
            config.worker_idle_timeout = Duration::from_secs(idle_timeout);
        }
        if let Some(max_size) = self.max_size {
            config.max_object_size = max_size;
        }
    }
}

pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
