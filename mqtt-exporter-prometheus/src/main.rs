//! Prometheus exporter for MQTT device telemetry.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mqtt_exporter_common::{ConnectionState, init_tracing};
use tokio::sync::watch;
use tracing::{error, info};

use mqtt_exporter_prometheus::{
    Dispatcher, ExporterConfig, HttpServer, MetricRegistry, TelemetrySubscriber,
};

/// Prometheus exporter for MQTT device telemetry.
#[derive(Parser, Debug)]
#[command(name = "mqtt-exporter-prometheus")]
#[command(about = "Export MQTT device telemetry as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// MQTT broker URL (overrides config).
    #[arg(long)]
    broker: Option<String>,

    /// Space separated list of topics to subscribe to (overrides config).
    #[arg(long)]
    topic: Option<String>,

    /// MQTT username (overrides config).
    #[arg(long)]
    username: Option<String>,

    /// MQTT password (overrides config).
    #[arg(long)]
    password: Option<String>,

    /// MQTT client id (overrides config).
    #[arg(long)]
    client_id: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration.
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(listen) = self.listen {
            config.prometheus.listen = listen;
        }
        if let Some(broker) = self.broker {
            config.mqtt.broker = broker;
        }
        if let Some(topic) = self.topic {
            config.mqtt.set_topics_from_str(&topic);
        }
        if let Some(username) = self.username {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = self.password {
            config.mqtt.password = Some(password);
        }
        if let Some(client_id) = self.client_id {
            config.mqtt.client_id = Some(client_id);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting MQTT Prometheus Exporter"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create the registry and the components feeding it
    let connection = ConnectionState::new();
    let registry = Arc::new(MetricRegistry::new(
        env!("CARGO_PKG_VERSION"),
        Arc::new(connection.clone()),
        config.limits.max_series,
    ));
    let dispatcher = Arc::new(Dispatcher::from_config(registry.clone(), &config));

    // Parse listen address
    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let subscriber = TelemetrySubscriber::new(dispatcher, config.mqtt.clone(), connection);
    let http_server = HttpServer::new(
        registry.clone(),
        listen_addr,
        config.prometheus.path.clone(),
        config.prometheus.prefix.clone(),
    );

    // Start subscriber
    let mut subscriber_task = tokio::spawn(subscriber.run(shutdown_rx.clone()));

    // Start HTTP server
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx.clone()));

    // Wait for a shutdown signal or a fatal task failure
    let mut exit_error = None;
    tokio::select! {
        result = wait_for_signal() => {
            result?;
        }
        result = &mut subscriber_task => {
            exit_error = Some(match result {
                Ok(Ok(())) => anyhow::anyhow!("Subscriber exited unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::anyhow!("Subscriber task failed: {}", e),
            });
        }
        result = &mut http_task => {
            exit_error = Some(match result {
                Ok(Ok(())) => anyhow::anyhow!("HTTP server exited unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::anyhow!("HTTP server task failed: {}", e),
            });
        }
    }

    if let Some(e) = &exit_error {
        error!(error = %e, "Fatal error, shutting down");
    }

    // Signal shutdown
    let _ = shutdown_tx.send(true);

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if !subscriber_task.is_finished() {
            let _ = subscriber_task.await;
        }
        if !http_task.is_finished() {
            let _ = http_task.await;
        }
    })
    .await;

    info!(series_count = registry.series_count(), "Final statistics");

    match exit_error {
        Some(e) => Err(e),
        None => {
            info!("Exporter stopped");
            Ok(())
        }
    }
}
