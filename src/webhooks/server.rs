//! Admission webhook server.
//!
//! Provides HTTPS endpoints for the pod validating admission webhook:
//! - `POST /validate` - AdmissionReview in, AdmissionReview out
//! - `GET /` and `GET /health` - static liveness payloads
//!
//! To enable the webhook:
//! 1. Issue a serving certificate for the webhook Service (e.g. cert-manager)
//! 2. Mount it into the pod at `/certs/tls.crt` and `/certs/tls.key`
//! 3. Create a ValidatingWebhookConfiguration pointing at `/validate`
//!
//! The server starts automatically when the certificate files are present.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post},
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::{PolicyConfig, WebhookConfig};
use crate::health::HealthState;
use crate::webhooks::policies::evaluate;
use crate::webhooks::review::{AdmissionDecision, AdmissionReviewResponse, decode_review};

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Policy applied to every review
    pub policy: Arc<PolicyConfig>,
    /// Optional health state for metrics
    pub health_state: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(policy: Arc<PolicyConfig>, health_state: Option<Arc<HealthState>>) -> Self {
        Self {
            policy,
            health_state,
        }
    }

    fn record(&self, outcome: &str) {
        if let Some(ref state) = self.health_state {
            state.metrics.record_admission(outcome);
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/validate", post(validate_pod))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "message": "Image Validator Webhook is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

/// Pod admission handler.
///
/// Always answers 200 with a review; decode failures become a deny.
async fn validate_pod(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> Json<AdmissionReviewResponse> {
    let request = match decode_review(&body) {
        Ok(request) => request,
        Err(malformed) => {
            error!(uid = %malformed.uid, message = %malformed.message, "Malformed admission request");
            state.record("malformed");
            return Json(AdmissionDecision::malformed(malformed).into_review());
        }
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = %request.namespace,
        name = %request.name,
        containers = request.containers.len(),
        "Processing admission request"
    );

    let decision = evaluate(&state.policy, &request);

    if decision.allowed {
        if state.policy.is_exempt(&request.namespace) {
            info!(uid = %decision.uid, namespace = %request.namespace, "Skipping validation for exempt namespace");
            state.record("exempt");
        } else {
            info!(uid = %decision.uid, name = %request.name, "Admission request allowed");
            state.record("allowed");
        }
    } else {
        warn!(
            uid = %decision.uid,
            name = %request.name,
            namespace = %request.namespace,
            violations = decision.reasons.len(),
            message = %decision.message,
            "Admission request denied"
        );
        state.record("denied");
    }

    Json(decision.into_review())
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on the configured port and serves the admission routes.
/// The certificate and key are PEM files read once at startup.
pub async fn run_webhook_server(
    policy: Arc<PolicyConfig>,
    config: &WebhookConfig,
    health_state: Option<Arc<HealthState>>,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let state = Arc::new(WebhookState::new(policy, health_state));
    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
