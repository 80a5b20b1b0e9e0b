//! metricslab HTTP server
//!
//! Starts an Axum web server exposing `/hello`, `/metrics`,
//! `/metrics/snapshot` and `/health`.

use clap::Parser;
use metricslab::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    telemetry,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => write_template(output.as_deref()),
        Some(Command::Serve) | None => serve(&cli.config).await,
    }
}

fn write_template(output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            std::fs::write(path, generate_config_template())?;
            eprintln!("Wrote configuration template to {}", path);
        }
        None => print!("{}", generate_config_template()),
    }
    Ok(())
}

async fn serve(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config_exists = Path::new(config_path).exists();
    let config = if config_exists {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    telemetry::init(&config.observability.log_level);

    if !config_exists {
        tracing::warn!(
            path = config_path,
            "Config file not found, starting with defaults"
        );
    }

    let addr = config.socket_addr()?;
    let state = AppState::new(Arc::new(config))?;
    let app = handlers::router(state);

    tracing::info!("Starting metricslab server on {}", addr);
    tracing::info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Signal received, starting graceful shutdown");
}
