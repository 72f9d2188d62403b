//! CronTab watch loop.
//!
//! Consumes a single CronTab watch stream and creates one CronJob per newly
//! observed CronTab. Events are handled strictly in order: the next event is
//! not read until the create call for the current one (including retries) has
//! returned, so a slow API server stalls the whole loop.
//!
//! ```text
//!   Subscribing ──watch opened──▶ Streaming
//!        ▲                            │
//!        └──── closed / error ────────┘   (after backoff)
//!
//!   any state ──token cancelled──▶ Terminated
//! ```
//!
//! Only `ADDED` events act. `MODIFIED` and `DELETED` are observed and dropped,
//! so edits to a CronTab never reach its CronJob. There is no check for an
//! existing CronJob beyond the create call itself; a replayed `ADDED` (for
//! example after a relist) surfaces as `AlreadyExists`.
//!
//! A CronTab that fails to decode is skipped without ending the stream. A
//! watch that closes cleanly after [`MIN_WATCH_LIFETIME`] is the server's
//! regular timeout and is reopened straight away; everything else waits out
//! the backoff first.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use k8s_openapi::api::batch::v1::CronJob;
use kube::ResourceExt;
use kube::api::WatchEvent;
use kube::runtime::events::EventType;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::controller::backoff::Backoff;
use crate::controller::cluster_api::{ClusterApi, CronTabEventStream};
use crate::controller::error::CreateOutcome;
use crate::crd::CronTab;
use crate::health::HealthState;
use crate::resources::cronjob::generate_cronjob;

/// Resource version that starts a watch from the current state
pub const INITIAL_RESOURCE_VERSION: &str = "0";

/// HTTP status the API server uses when a resource version is too old
const GONE: u16 = 410;

/// A clean close after at least this long is a routine watch timeout
pub const MIN_WATCH_LIFETIME: Duration = Duration::from_secs(1);

/// How a watch stream finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// The server closed the stream
    Closed,
    /// The transport failed or the server sent an error event
    Failed,
    Cancelled,
}

/// States of the watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Opening a watch
    Subscribing,
    /// Reading events from an open watch
    Streaming,
    /// Stopped by cancellation
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Subscribing => write!(f, "Subscribing"),
            LoopState::Streaming => write!(f, "Streaming"),
            LoopState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// What handling a single watch event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// An `ADDED` event led to a create call with this outcome
    Create(CreateOutcome),
    /// `MODIFIED` or `DELETED`: deliberately not acted upon
    Ignored,
    /// A bookmark advanced the resource version
    Bookmark,
    /// The server reported an error; the current watch is finished
    StreamError,
}

/// Event-driven CronTab → CronJob loop.
pub struct WatchLoop<A: ClusterApi> {
    api: A,
    config: ControllerConfig,
    shutdown: CancellationToken,
    health_state: Option<Arc<HealthState>>,
    state: LoopState,
    resource_version: String,
    backoff: Backoff,
}

impl<A: ClusterApi> WatchLoop<A> {
    pub fn new(api: A, config: ControllerConfig, shutdown: CancellationToken) -> Self {
        let backoff = Backoff::new(config.backoff_initial, config.backoff_max);
        Self {
            api,
            config,
            shutdown,
            health_state: None,
            state: LoopState::Subscribing,
            resource_version: INITIAL_RESOURCE_VERSION.to_string(),
            backoff,
        }
    }

    /// Record metrics into `health_state`
    pub fn with_health_state(mut self, health_state: Option<Arc<HealthState>>) -> Self {
        self.health_state = health_state;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Last resource version seen on the stream
    pub fn resource_version(&self) -> &str {
        &self.resource_version
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run until the cancellation token fires.
    pub async fn run(&mut self) {
        info!(
            namespace = %self.config.watch_namespace,
            "Watching CronTab custom resources"
        );

        while self.state != LoopState::Terminated {
            let Some(stream) = self.subscribe().await else {
                continue;
            };
            let opened = tokio::time::Instant::now();
            let end = self.consume(stream).await;
            if end == StreamEnd::Cancelled {
                break;
            }

            self.record_restart();
            if end == StreamEnd::Closed && opened.elapsed() >= MIN_WATCH_LIFETIME {
                debug!(resource_version = %self.resource_version, "Watch expired, reopening");
                self.backoff.reset();
            } else {
                self.pause().await;
            }
        }

        info!("CronTab watch loop terminated");
    }

    /// Open a watch, or back off and return `None`
    async fn subscribe(&mut self) -> Option<CronTabEventStream> {
        self.state = LoopState::Subscribing;
        debug!(resource_version = %self.resource_version, "Opening CronTab watch");

        let result = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                self.state = LoopState::Terminated;
                return None;
            }
            result = self.api.watch_crontabs(&self.resource_version) => result,
        };

        match result {
            Ok(stream) => {
                self.state = LoopState::Streaming;
                Some(stream)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    resource_version = %self.resource_version,
                    "Failed to open CronTab watch"
                );
                self.record_restart();
                self.pause().await;
                None
            }
        }
    }

    /// Read events until the stream ends, errors, or the loop is cancelled
    async fn consume(&mut self, mut stream: CronTabEventStream) -> StreamEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.state = LoopState::Terminated;
                    return StreamEnd::Cancelled;
                }
                next = stream.next() => next,
            };

            match next {
                None => {
                    info!(resource_version = %self.resource_version, "CronTab watch closed");
                    self.state = LoopState::Subscribing;
                    return StreamEnd::Closed;
                }
                Some(Err(e)) if e.is_decode() => {
                    // Per-item failure, the stream itself is still usable
                    warn!(error = %e, "Skipping CronTab that failed to decode");
                    self.record_event("decode_error");
                }
                Some(Err(e)) => {
                    warn!(error = %e, "CronTab watch failed");
                    self.state = LoopState::Subscribing;
                    return StreamEnd::Failed;
                }
                Some(Ok(event)) => {
                    self.backoff.reset();
                    if self.handle_event(event).await == EventOutcome::StreamError {
                        self.state = LoopState::Subscribing;
                        return StreamEnd::Failed;
                    }
                }
            }
        }
    }

    /// Sleep for the next backoff delay unless cancelled first
    async fn pause(&mut self) {
        let delay = self.backoff.next_delay();
        debug!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.backoff.attempts(),
            "Backing off before resubscribing"
        );
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => self.state = LoopState::Terminated,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    /// Handle one watch event.
    pub async fn handle_event(&mut self, event: WatchEvent<CronTab>) -> EventOutcome {
        let outcome = match event {
            WatchEvent::Added(crontab) => {
                self.track(&crontab);
                self.record_event("added");
                EventOutcome::Create(self.reconcile_added(&crontab).await)
            }
            WatchEvent::Modified(crontab) => {
                self.track(&crontab);
                self.record_event("modified");
                debug!(name = %crontab.name_any(), "Ignoring CronTab modification");
                EventOutcome::Ignored
            }
            WatchEvent::Deleted(crontab) => {
                self.track(&crontab);
                self.record_event("deleted");
                debug!(name = %crontab.name_any(), "Ignoring CronTab deletion");
                EventOutcome::Ignored
            }
            WatchEvent::Bookmark(bookmark) => {
                self.resource_version = bookmark.metadata.resource_version;
                EventOutcome::Bookmark
            }
            WatchEvent::Error(e) => {
                self.record_event("error");
                if e.code == GONE {
                    info!(
                        resource_version = %self.resource_version,
                        "Resource version expired, restarting watch from current state"
                    );
                    self.resource_version = INITIAL_RESOURCE_VERSION.to_string();
                } else {
                    warn!(code = e.code, message = %e.message, "CronTab watch returned an error");
                }
                EventOutcome::StreamError
            }
        };

        if let Some(ref state) = self.health_state {
            state.touch_last_event(unix_now());
        }
        outcome
    }

    fn track(&mut self, crontab: &CronTab) {
        if let Some(version) = crontab.resource_version() {
            self.resource_version = version;
        }
    }

    fn record_restart(&self) {
        if let Some(ref state) = self.health_state {
            state.metrics.record_watch_restart();
        }
    }

    fn record_event(&self, event: &str) {
        if let Some(ref state) = self.health_state {
            state.metrics.record_crontab_event(event);
        }
    }

    /// Derive and create the CronJob for a new CronTab
    async fn reconcile_added(&self, crontab: &CronTab) -> CreateOutcome {
        let name = crontab.name_any();
        let namespace = crontab
            .namespace()
            .unwrap_or_else(|| self.config.watch_namespace.clone());
        info!(name = %name, namespace = %namespace, "Detected new CronTab");

        let job = generate_cronjob(crontab, &self.config.job_image);
        let job_name = job.metadata.name.clone().unwrap_or_default();

        let start = Instant::now();
        let outcome = self.create_with_retry(&namespace, &job).await;
        if let Some(ref state) = self.health_state {
            state
                .metrics
                .record_create(outcome.label(), start.elapsed().as_secs_f64());
        }

        match &outcome {
            CreateOutcome::Created => {
                info!(name = %name, job = %job_name, "Created CronJob");
                self.api
                    .publish_event(
                        crontab,
                        EventType::Normal,
                        "CronJobCreated",
                        format!("Created CronJob {}", job_name),
                    )
                    .await;
            }
            CreateOutcome::AlreadyExists => {
                info!(name = %name, job = %job_name, "CronJob already exists, skipping");
            }
            CreateOutcome::Transient(msg) | CreateOutcome::Fatal(msg) => {
                error!(name = %name, job = %job_name, error = %msg, "Failed to create CronJob");
                self.api
                    .publish_event(
                        crontab,
                        EventType::Warning,
                        "CronJobCreateFailed",
                        format!("Failed to create CronJob {}: {}", job_name, msg),
                    )
                    .await;
            }
        }

        outcome
    }

    /// Create, retrying transient failures up to the configured attempt cap
    async fn create_with_retry(
        &self,
        namespace: &str,
        job: &CronJob,
    ) -> CreateOutcome {
        let max_attempts = self.config.create_max_attempts.max(1);
        let mut backoff = Backoff::new(self.config.backoff_initial, self.config.backoff_max);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = self.api.create_cronjob(namespace, job).await;
            if !outcome.is_transient() || attempt >= max_attempts {
                return outcome;
            }

            let delay = backoff.next_delay();
            warn!(
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                outcome = %outcome,
                "CronJob create failed transiently, retrying"
            );
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return outcome,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
