//! weather_pi - Weather HAT telemetry streamer binary
//!
//! Reads the Weather HAT sensors and host metrics and streams batched records
//! to an ingestion sink until interrupted.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use weather_pi::sensor::iio::DEFAULT_IIO_DEVICE;
use weather_pi::{
    CaptureWindow, HostIdentity, IioSource, JsonLinesSink, Orchestrator, RecordBuilder, Sampler,
    SensorCache, ShutdownSignal, SimulatedSource, StreamConfig, SysinfoProbe, SystemMetricsCache,
};

#[derive(Parser)]
#[command(name = "weather_pi")]
#[command(about = "🌦  weather_pi - Weather HAT telemetry streamer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(
    long_about = "Samples Raspberry Pi Weather HAT sensors and host metrics and streams batched telemetry records"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of readings per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Seconds between batches
    #[arg(short, long)]
    interval: Option<f64>,

    /// Collect readings back to back for maximum throughput
    #[arg(long)]
    fast: bool,

    /// Use simulated sensors instead of the Weather HAT
    #[arg(long)]
    simulate: bool,

    /// IIO sysfs directory of the BME280
    #[arg(long, default_value = DEFAULT_IIO_DEVICE)]
    iio_device: PathBuf,

    /// IIO sysfs directory of the LTR-559 light sensor
    #[arg(long)]
    light_device: Option<PathBuf>,

    /// Append records to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream batches until interrupted (default)
    Run,

    /// Print a single record as JSON and exit
    Sample,

    /// Show host identity and metrics
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    let outcome = match &cli.command {
        Some(Commands::Sample) => sample_command(&cli).await,
        Some(Commands::Info) => info_command().await,
        Some(Commands::Run) | None => run_command(&cli).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // RUST_LOG wins over the flags when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    // Records may go to stdout, so logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    eprintln!("🌦  weather_pi - Weather HAT telemetry streamer");
    eprintln!("   Version: {}", env!("CARGO_PKG_VERSION"));
    eprintln!();
}

fn build_config(cli: &Cli) -> anyhow::Result<StreamConfig> {
    let mut config = match &cli.config {
        Some(path) => StreamConfig::load(path)?,
        None => StreamConfig::default(),
    };

    if let Some(batch_size) = cli.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(interval) = cli.interval {
        if !interval.is_finite() || interval <= 0.0 {
            bail!("--interval must be a positive number of seconds, got {}", interval);
        }
        config = config.with_interval(Duration::from_secs_f64(interval));
    }
    if cli.fast {
        config = config.with_fast_mode(true);
    }
    if cli.output.is_some() {
        config = config.with_output(cli.output.clone());
    }

    config.validate()?;
    Ok(config)
}

fn build_sensor_cache(cli: &Cli, config: &StreamConfig) -> anyhow::Result<SensorCache> {
    if cli.simulate {
        warn!("Simulation mode: sensor readings are synthetic");
        return Ok(SensorCache::new(SimulatedSource::new(), config.sensor.clone()));
    }

    let mut source = IioSource::new(&cli.iio_device);
    if let Some(light_device) = &cli.light_device {
        source = source.with_light_device(light_device);
    }
    source
        .verify()
        .context("Weather HAT sensors unavailable (use --simulate on development machines)")?;
    info!(device = %cli.iio_device.display(), "Weather HAT sensors verified");

    Ok(SensorCache::new(source, config.sensor.clone()))
}

async fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = build_config(cli)?;

    let sensor = Arc::new(build_sensor_cache(cli, &config)?);
    sensor.start()?;

    let identity = HostIdentity::resolve();
    info!(
        hostname = %identity.hostname,
        ip = %identity.ip_address,
        mac = %identity.mac_address,
        "Host identity resolved"
    );

    let sampler = Sampler::new(
        sensor,
        SystemMetricsCache::new(SysinfoProbe::new(), config.metrics_ttl()),
        RecordBuilder::new(identity),
    );

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_os_signals();

    info!("Configuration:");
    info!("  - Batch size: {} readings", config.batch_size);
    info!("  - Batch interval: {:.1}s", config.interval().as_secs_f64());
    info!("  - Fast mode: {}", config.fast_mode);
    info!("  - Sensor refresh: {}ms", config.sensor.refresh_interval_ms);

    let sink = JsonLinesSink::new(config.sink.output.clone());
    let mut app = Orchestrator::new(sink, sampler, &config, shutdown);
    let summary = app.run().await.context("Streaming could not start")?;

    info!(
        "Streamed {} rows in {} batches ({} failed)",
        summary.rows_accepted, summary.cycles, summary.failed_batches
    );
    Ok(())
}

async fn sample_command(cli: &Cli) -> anyhow::Result<()> {
    let config = build_config(cli)?;
    let sensor = build_sensor_cache(cli, &config)?;
    sensor.start()?;

    // Wait for the first poll to land.
    let deadline = tokio::time::Instant::now() + config.sensor.stale_after();
    while sensor.snapshot().sequence == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let snapshot = sensor.snapshot();
    if snapshot.sequence == 0 {
        warn!("No sensor reading arrived in time; printing defaults");
    }

    let mut metrics = SystemMetricsCache::new(SysinfoProbe::new(), config.metrics_ttl());
    let builder = RecordBuilder::new(HostIdentity::resolve());
    let record = builder.build(
        &snapshot,
        &metrics.snapshot(),
        CaptureWindow::instant(chrono::Utc::now()),
    );
    println!("{}", serde_json::to_string_pretty(&record)?);

    sensor.stop(config.sensor.stop_timeout()).await?;
    Ok(())
}

async fn info_command() -> anyhow::Result<()> {
    println!("🌦  weather_pi Host Information");
    println!("==============================");
    println!();

    let identity = HostIdentity::resolve();
    println!("Identity:");
    println!("  Hostname: {}", identity.hostname);
    println!("  IP address: {}", identity.ip_address);
    println!("  MAC address: {}", identity.mac_address);
    println!();

    let mut metrics = SystemMetricsCache::with_defaults();
    // CPU usage is measured between two refreshes.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let snapshot = metrics.snapshot();

    println!("Host metrics:");
    println!("  CPU temperature: {:.1}°C", snapshot.cpu_temperature);
    println!("  CPU usage: {:.1}%", snapshot.cpu_usage);
    println!("  Memory usage: {:.1}%", snapshot.memory_usage);
    println!("  Free disk: {:.1} MB", snapshot.free_disk_mb);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["weather_pi", "--batch-size", "5", "--fast"]).unwrap();
        assert_eq!(cli.batch_size, Some(5));
        assert!(cli.fast);
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["weather_pi"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.simulate);
        assert_eq!(cli.iio_device, PathBuf::from(DEFAULT_IIO_DEVICE));

        let config = build_config(&cli).unwrap();
        assert_eq!(config, StreamConfig::default());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "weather_pi",
            "--interval",
            "6",
            "--batch-size",
            "3",
            "--output",
            "/tmp/weather.jsonl",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.interval_ms, 6_000);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.sink.output, Some(PathBuf::from("/tmp/weather.jsonl")));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rejects_oversized_batch() {
        let cli = Cli::try_parse_from(["weather_pi", "--batch-size", "4294967296"]).unwrap();
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_rejects_bad_interval() {
        let cli = Cli::try_parse_from(["weather_pi", "--interval", "-1"]).unwrap();
        assert!(build_config(&cli).is_err());
    }
}
