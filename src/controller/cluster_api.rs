//! Cluster API seam used by the CronTab watch loop.
//!
//! The loop only needs three primitives: open a CronTab watch from a resource
//! version, create a CronJob, and record a Kubernetes Event. [`ClusterApi`]
//! captures exactly those so the loop can be driven by a scripted fake in
//! tests; [`KubeClusterApi`] is the kube-rs implementation.

use std::future::Future;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::batch::v1::CronJob;
use kube::api::{PostParams, WatchEvent, WatchParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Api, Client, Resource};

use crate::controller::error::{CreateOutcome, Error, Result};
use crate::crd::CronTab;

/// Field manager name for created objects
pub const FIELD_MANAGER: &str = "podguard-operator";

/// Server-side watch timeout; the API server caps this below 300s
const WATCH_TIMEOUT_SECS: u32 = 290;

/// Stream of CronTab watch events
pub type CronTabEventStream = BoxStream<'static, Result<WatchEvent<CronTab>>>;

/// Primitives the watch loop needs from the cluster.
pub trait ClusterApi: Send + Sync {
    /// Open a CronTab watch starting after `resource_version`.
    ///
    /// `"0"` starts from the current state, replaying every existing CronTab
    /// as an `ADDED` event.
    fn watch_crontabs(
        &self,
        resource_version: &str,
    ) -> impl Future<Output = Result<CronTabEventStream>> + Send;

    /// Create a CronJob in `namespace`.
    fn create_cronjob(
        &self,
        namespace: &str,
        job: &CronJob,
    ) -> impl Future<Output = CreateOutcome> + Send;

    /// Record a Kubernetes Event against a CronTab. Failures are logged only.
    fn publish_event(
        &self,
        crontab: &CronTab,
        type_: EventType,
        reason: &str,
        note: String,
    ) -> impl Future<Output = ()> + Send;
}

/// kube-rs backed [`ClusterApi`], scoped to one namespace.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    crontabs: Api<CronTab>,
    reporter: Reporter,
}

impl KubeClusterApi {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            crontabs: Api::namespaced(client.clone(), namespace),
            client,
            reporter: Reporter {
                controller: FIELD_MANAGER.into(),
                instance: std::env::var("POD_NAME").ok(),
            },
        }
    }
}

impl ClusterApi for KubeClusterApi {
    async fn watch_crontabs(&self, resource_version: &str) -> Result<CronTabEventStream> {
        let mut params = WatchParams::default().timeout(WATCH_TIMEOUT_SECS);
        params.bookmarks = true;
        let stream = self.crontabs.watch(&params, resource_version).await?;
        Ok(stream.map_err(Error::from).boxed())
    }

    async fn create_cronjob(&self, namespace: &str, job: &CronJob) -> CreateOutcome {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        CreateOutcome::from_result(api.create(&params, job).await.map_err(Error::from))
    }

    async fn publish_event(&self, crontab: &CronTab, type_: EventType, reason: &str, note: String) {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone());
        let object_ref = crontab.object_ref(&());
        if let Err(e) = recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note: Some(note),
                    action: "CreateCronJob".into(),
                    secondary: None,
                },
                &object_ref,
            )
            .await
        {
            tracing::warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }
}
