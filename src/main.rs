//! PulseWatch - Edge Telemetry Anomaly Monitor
//!
//! Samples host, network, radio and physical sensor readings on a fixed
//! cadence, flags anomalous samples with a pre-trained classifier and labels
//! them with a probable root cause.

use anyhow::Result;
use clap::Parser;
use pulsewatch::{app::AppBuilder, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            error!("Failed to load configuration: {}", err);
            std::process::exit(1);
        }
    };

    // Initialize logging. Records own stdout, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.core.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("PulseWatch starting up...");
    log_config(&config);

    if cli.check_artifact {
        return match AppBuilder::load_classifier(&config) {
            Ok(_) => {
                info!("Classifier artifact is valid.");
                Ok(())
            }
            Err(e) => {
                error!("{:#}", e);
                std::process::exit(1);
            }
        };
    }

    if cli.once {
        return match AppBuilder::new(config).run_once().await {
            Ok(record) => {
                info!(is_anomaly = record.is_anomaly, category = %record.category, "Single sample complete");
                Ok(())
            }
            Err(e) => {
                error!("Startup failed: {:#}", e);
                std::process::exit(1);
            }
        };
    }

    // =========================================================================
    // Create Shutdown Channel
    // =========================================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = match AppBuilder::new(config).build(shutdown_rx).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Interrupt received. Finishing the current iteration...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("PulseWatch stopped.");
    Ok(())
}

fn log_config(config: &Config) {
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.core.log_level);
    info!("Sampling Interval: {}s", config.sampling.interval_seconds);
    info!("Publish Queue Capacity: {}", config.sampling.queue_capacity);
    match &config.classifier.artifact_path {
        Some(path) => info!("Classifier Artifact: {}", path.display()),
        None => info!("Classifier Artifact: Not configured"),
    }
    info!(
        "Ping Target: {} ({} requests, {}ms deadline)",
        config.network.target_host, config.network.ping_count, config.network.timeout_ms
    );
    info!(
        "Wireless Table: {} (interface: {})",
        config.signal.wireless_path.display(),
        config.signal.interface.as_deref().unwrap_or("first listed")
    );
    info!(
        "Sensor Link: {} at {} baud ({})",
        config.sensor_link.device_path.display(),
        config.sensor_link.baud_rate,
        if config.sensor_link.required { "required" } else { "optional" }
    );
    info!("Thermal Label: {}", config.system.thermal_label);
    info!(
        "Stdout Output: {}",
        if config.output.stdout {
            config.output.format.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    match &config.output.http {
        Some(http) => info!("HTTP Output: {}", http.url),
        None => info!("HTTP Output: Disabled"),
    }
    match &config.output.file {
        Some(file) => info!("File Output: {}", file.path.display()),
        None => info!("File Output: Disabled"),
    }
    if config.metrics.enabled {
        info!("Metrics: {}", config.metrics.listen_address);
    } else {
        info!("Metrics: Disabled");
    }
    info!("-------------------------------------------------------");
}
