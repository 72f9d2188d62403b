//! podguard-operator - pod admission policy and CronTab controller.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Creates the Kubernetes client
//! - Starts the controller, health server, and optionally webhook server

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use podguard_operator::health::{HealthState, run_health_server};
use podguard_operator::{OperatorConfig, run_controller, run_webhook_server};

/// Grace period for an in-flight CronJob create to finish during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("podguard_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting podguard-operator");

    // kube and axum-server pull in different rustls backends; pick one
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    let config = OperatorConfig::from_env()?;
    info!(
        watch_namespace = %config.controller.watch_namespace,
        exempt_namespace = %config.policy.exempt_namespace,
        allowed_registries = config.policy.allowed_registries.len(),
        blocked_tags = config.policy.blocked_tags.len(),
        "Loaded configuration"
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Create shared health state
    let health_state = Arc::new(HealthState::new());
    let shutdown = CancellationToken::new();

    // Start health server immediately so probes work during startup
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let controller_handle = {
        let health_state = health_state.clone();
        let controller_config = config.controller.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            run_controller(client, controller_config, Some(health_state), shutdown).await;
        })
    };

    // Optionally start webhook server if certificates are available
    let webhook_handle = if config.webhook.cert_path.exists() && config.webhook.key_path.exists()
    {
        info!("TLS certificates found, starting webhook server");
        let policy = Arc::new(config.policy.clone());
        let webhook_config = config.webhook.clone();
        let health_state = health_state.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = run_webhook_server(policy, &webhook_config, Some(health_state)).await {
                error!("Webhook server error: {}", e);
            }
        }))
    } else {
        info!(
            cert_path = %config.webhook.cert_path.display(),
            "Webhook certificates not found, webhook server disabled"
        );
        None
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = controller_handle => {
            if let Err(e) = result {
                error!("Controller task panicked: {}", e);
            } else {
                error!("Controller stopped unexpectedly");
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = async {
            match webhook_handle {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new work
            health_state.set_ready(false).await;
            info!("Marked operator as not ready");

            shutdown.cancel();

            info!(
                "Waiting {}s for in-flight work to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal: the operator cannot shut down
/// gracefully without them.
#[allow(clippy::expect_used)]
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
