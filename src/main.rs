use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info};
use url_prober::{
    format_bytes, format_duration, setup_logging, Cli, Config, DiagnosticSink, ProbeEngine,
    PrometheusExporter, StopHandle, WriterSink,
};

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    setup_logging(args.verbose);

    if let Err(e) = run(args).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    info!("Starting url-prober v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;

    if let Some(addr) = args.metrics_addr {
        PrometheusExporter::new(addr)
            .install()
            .context("Failed to start metrics exporter")?;
    }

    let input = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("Failed to open URL file {}", args.file.display()))?;

    let sink = open_sink(&args)?;
    let engine = ProbeEngine::new(config)
        .context("Failed to create probe engine")?
        .with_sink(sink);

    let shutdown_handler = setup_shutdown_handler(engine.stop_handle());

    let started = Instant::now();
    let tally = engine.start(BufReader::new(input)).await;
    shutdown_handler.abort();

    info!("Time to take: {}", format_duration(started.elapsed()));
    if args.json {
        println!("{}", tally.to_json()?);
    } else {
        println!("\nResults of URL processing:");
        print!("{tally}");
    }

    info!("url-prober stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Config::from_json(&config_content).context("Invalid configuration file")?
    } else {
        Config::default()
    };

    args.apply_overrides(&mut config);
    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Max workers: {}", config.max_workers);
    info!("Request timeout: {:?}", config.request_timeout);
    info!("Max object size: {}", format_bytes(config.max_object_size));

    Ok(config)
}

fn open_sink(args: &Cli) -> Result<Arc<dyn DiagnosticSink>> {
    match &args.diagnostics {
        Some(path) => {
            let file = File::create(path).with_context(|| {
                format!("Failed to create diagnostics file {}", path.display())
            })?;
            Ok(Arc::new(WriterSink::new(BufWriter::new(file))))
        }
        None => Ok(Arc::new(WriterSink::new(io::stdout()))),
    }
}

fn setup_shutdown_handler(stop: StopHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
            Ok(signal) => signal,
            Err(e) => {
                error!("Failed to create SIGINT handler: {}", e);
                return;
            }
        };
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                error!("Failed to create SIGTERM handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        stop.stop();
    })
}
