//! Disco Light server.
//!
//! Serves the light API over the embedded HTTP server and logs every colour
//! change. Stops on Ctrl+C (or SIGTERM) after draining open connections.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use disco_light::config::{load_config, validate_config, ConfigError, ServerConfig};
use disco_light::http::Server;
use disco_light::light::{LightApi, LightState};
use disco_light::lifecycle::wait_for_stop_signal;
use disco_light::observability::{logging, metrics};
use disco_light::routing::Router;

/// How long in-flight connections get after the listener closes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "disco-light")]
#[command(about = "Embedded HTTP server driving a colour light", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to bind, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level or filter directives, overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Host name put in the usage hint; wildcard binds advertise loopback.
fn advertised_host(bind_address: &str) -> String {
    match bind_address.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => "localhost".to_string(),
        Ok(IpAddr::V6(ip)) => format!("[{}]", ip),
        _ => bind_address.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init_logging(&config.observability)?;
    tracing::info!("disco-light v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        max_connections = config.listener.max_connections,
        write_gate = ?config.connection.write_gate,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let light = LightState::new();
    let mut changes = light.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let color = *changes.borrow_and_update();
            tracing::info!(color = %color, "Light changed");
        }
    });

    let api = LightApi::new(
        light,
        &advertised_host(&config.listener.bind_address),
        config.listener.port,
    );
    let router = Router::new(api.routes()?);

    let mut server = Server::new(config, router).start();
    match server.local_addr().await {
        Some(addr) => tracing::info!("Server listening to: http://{}/", addr),
        None => {
            let error = server.next_error().await;
            tracing::error!(error = ?error, "Server failed to start");
            return Err(match error {
                Some(e) => Box::new(e) as Box<dyn std::error::Error>,
                None => "server failed to start".into(),
            });
        }
    }

    loop {
        tokio::select! {
            signal = wait_for_stop_signal() => {
                let signal = signal?;
                tracing::info!(signal = ?signal, "Shutdown signal received");
                break;
            }
            Some(error) = server.next_error() => {
                // Already logged by the server; fatal ones end the process.
                if error.is_fatal() {
                    return Err(Box::new(error));
                }
            }
        }
    }

    server.stop().await;
    if !server.drain(DRAIN_TIMEOUT).await {
        tracing::warn!("Exiting with connections still open");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
