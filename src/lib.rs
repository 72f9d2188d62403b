//! podguard-operator library crate
//!
//! Two independent components share this crate:
//! - a pod validating admission webhook (`webhooks`) that enforces image and
//!   container hardening policy
//! - a CronTab controller (`controller`) that creates one CronJob per new
//!   CronTab custom resource

pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod resources;
pub mod webhooks;

pub use config::{ControllerConfig, OperatorConfig, PolicyConfig, WebhookConfig};
pub use health::HealthState;
pub use webhooks::{WebhookError, run_webhook_server};

use std::sync::Arc;

use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use controller::{KubeClusterApi, WatchLoop};

/// Run the CronTab controller until `shutdown` is cancelled.
///
/// Watches CronTabs in `config.watch_namespace` only. It can be called from
/// main.rs or spawned as a background task during integration tests.
///
/// If health_state is provided, the operator is marked ready once the loop
/// starts and metrics are recorded for watch events and creates.
pub async fn run_controller(
    client: Client,
    config: ControllerConfig,
    health_state: Option<Arc<HealthState>>,
    shutdown: CancellationToken,
) {
    info!(
        namespace = %config.watch_namespace,
        "Starting controller for CronTab resources"
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let api = KubeClusterApi::new(client, &config.watch_namespace);
    let mut watch_loop = WatchLoop::new(api, config, shutdown).with_health_state(health_state);
    watch_loop.run().await;
}
