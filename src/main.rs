mod api;
mod config;
mod error;
mod object_store;
mod product;
mod product_store;

use anyhow::{bail, Context, Result};
use api::AppState;
use aws_config::BehaviorVersion;
use config::{Config, DatabaseConfig};
use object_store::ObjectStore;
use product_store::ProductStore;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting catalog service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Resolve the database URL, possibly via Secrets Manager
    let database_url = resolve_database_url(&config.database)
        .await
        .context("Failed to resolve database URL")?;

    // Initialize components
    let product_store = Arc::new(
        ProductStore::new(&config.database, &database_url)
            .await
            .context("Failed to initialize product store")?,
    );

    // Run migrations if enabled
    if config.database.run_migrations {
        product_store
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    let object_store = Arc::new(
        ObjectStore::new(&config.s3)
            .await
            .context("Failed to initialize object store")?,
    );

    // Create API state
    let api_state = AppState {
        object_store,
        product_store,
    };

    // Spawn API server task
    let http_config = config.http.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::start_api_server(api_state, &http_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("Catalog service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down catalog service");

    api_handle.abort();

    info!("Catalog service stopped");

    Ok(())
}

/// Resolve the database connection URL, reading it from Secrets Manager
/// when the configuration names a secret instead of a literal URL
async fn resolve_database_url(config: &DatabaseConfig) -> Result<String> {
    if let Some(ref secret_id) = config.secret_id {
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let client = aws_sdk_secretsmanager::Client::new(&aws_config);

        let secret = client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .context("Failed to fetch database secret")?;

        let url = secret
            .secret_string()
            .context("Database secret has no string value")?;

        info!(secret_id = %secret_id, "Resolved database URL from Secrets Manager");
        return Ok(url.to_string());
    }

    if config.url.is_empty() {
        bail!("either database.url or database.secret_id must be configured");
    }

    Ok(config.url.clone())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
