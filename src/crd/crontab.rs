//! CronTab Custom Resource Definition.
//!
//! A CronTab names a schedule and a message. The controller turns each new
//! CronTab into a CronJob that echoes the message on that schedule. CronTabs
//! are written by cluster users and only ever read by the operator, so the
//! kind has no status subresource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the CronTab kind
pub const CRONTAB_GROUP: &str = "stable.deepak.com";
/// API version of the CronTab kind
pub const CRONTAB_VERSION: &str = "v1";
/// Plural resource name of the CronTab kind
pub const CRONTAB_PLURAL: &str = "crontabs";

/// CronTab is a custom resource describing a recurring echo job.
///
/// Example:
/// ```yaml
/// apiVersion: stable.deepak.com/v1
/// kind: CronTab
/// metadata:
///   name: demo
/// spec:
///   cronSpec: "*/1 * * * *"
///   message: hi
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "stable.deepak.com",
    version = "v1",
    kind = "CronTab",
    plural = "crontabs",
    shortname = "ct",
    namespaced,
    printcolumn = r#"{"name":"Schedule", "type":"string", "jsonPath":".spec.cronSpec"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".spec.message"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CronTabSpec {
    /// Cron expression for the derived CronJob, e.g. `*/1 * * * *`.
    pub cron_spec: String,

    /// Text echoed by every run.
    pub message: String,

    /// Container image for the derived job. Defaults to the operator's
    /// configured job image (`busybox`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
