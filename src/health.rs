//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the watch loop is running)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Port the health server binds to
pub const HEALTH_PORT: u16 = 8080;

/// Labels for outcome-based metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct OutcomeLabels {
    pub outcome: String,
}

impl EncodeLabelSet for OutcomeLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("outcome", self.outcome.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for watch event metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct EventLabels {
    pub event: String,
}

impl EncodeLabelSet for EventLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("event", self.event.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the operator
pub struct Metrics {
    /// Admission reviews by outcome (allowed, denied, exempt, malformed)
    pub admission_reviews_total: Family<OutcomeLabels, Counter>,
    /// CronTab watch events by type
    pub crontab_events_total: Family<EventLabels, Counter>,
    /// CronJob create calls by outcome
    pub cronjob_creates_total: Family<OutcomeLabels, Counter>,
    /// Time spent creating a CronJob, retries included
    pub cronjob_create_duration_seconds: Family<OutcomeLabels, Histogram>,
    /// Watch restarts after a stream ended or failed
    pub watch_restarts_total: Counter,
    /// Unix time of the last handled watch event
    pub last_event_timestamp_seconds: Gauge,
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_reviews_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "podguard_admission_reviews",
            "Total number of admission reviews by outcome",
            admission_reviews_total.clone(),
        );

        let crontab_events_total = Family::<EventLabels, Counter>::default();
        registry.register(
            "podguard_crontab_events",
            "Total number of CronTab watch events by type",
            crontab_events_total.clone(),
        );

        let cronjob_creates_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "podguard_cronjob_creates",
            "Total number of CronJob create calls by outcome",
            cronjob_creates_total.clone(),
        );

        let cronjob_create_duration_seconds =
            Family::<OutcomeLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "podguard_cronjob_create_duration_seconds",
            "Duration of CronJob creation in seconds",
            cronjob_create_duration_seconds.clone(),
        );

        let watch_restarts_total = Counter::default();
        registry.register(
            "podguard_watch_restarts",
            "Total number of CronTab watch restarts",
            watch_restarts_total.clone(),
        );

        let last_event_timestamp_seconds = Gauge::default();
        registry.register(
            "podguard_last_event_timestamp_seconds",
            "Unix time of the last handled CronTab watch event",
            last_event_timestamp_seconds.clone(),
        );

        Self {
            admission_reviews_total,
            crontab_events_total,
            cronjob_creates_total,
            cronjob_create_duration_seconds,
            watch_restarts_total,
            last_event_timestamp_seconds,
            registry,
        }
    }

    /// Record one admission review
    pub fn record_admission(&self, outcome: &str) {
        let labels = OutcomeLabels {
            outcome: outcome.to_string(),
        };
        self.admission_reviews_total.get_or_create(&labels).inc();
    }

    /// Record one CronTab watch event
    pub fn record_crontab_event(&self, event: &str) {
        let labels = EventLabels {
            event: event.to_string(),
        };
        self.crontab_events_total.get_or_create(&labels).inc();
    }

    /// Record the final outcome of a CronJob create
    pub fn record_create(&self, outcome: &str, duration_secs: f64) {
        let labels = OutcomeLabels {
            outcome: outcome.to_string(),
        };
        self.cronjob_creates_total.get_or_create(&labels).inc();
        self.cronjob_create_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    pub fn record_watch_restart(&self) {
        self.watch_restarts_total.inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the operator is ready (watch loop started)
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the operator as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the operator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }

    pub fn touch_last_event(&self, unix_secs: u64) {
        let secs = i64::try_from(unix_secs).unwrap_or(i64::MAX);
        self.metrics.last_event_timestamp_seconds.set(secs);
    }

    /// Unix time of the last handled watch event, 0 if none yet
    pub fn last_event(&self) -> u64 {
        u64::try_from(self.metrics.last_event_timestamp_seconds.get()).unwrap_or_default()
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until the watch loop has started
/// and again once shutdown begins.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on 0.0.0.0:8080
pub async fn run_health_server(state: Arc<HealthState>) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], HEALTH_PORT));
    info!(port = HEALTH_PORT, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
