//! Common resource generation utilities.
//!
//! Provides labels and owner references shared by every object the operator
//! derives from a CronTab.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::crd::{CRONTAB_GROUP, CRONTAB_VERSION, CronTab};

/// Value of the `app.kubernetes.io/managed-by` label
pub const MANAGED_BY: &str = "podguard-operator";

/// Standard labels applied to all derived resources
pub fn standard_labels(crontab: &CronTab) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), crontab.name_any());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "crontab".to_string(),
    );
    labels
}

/// Create an owner reference pointing at a CronTab.
///
/// Returns `None` when the CronTab has no uid yet (it was never persisted),
/// since the API server rejects owner references without one.
pub fn owner_reference(crontab: &CronTab) -> Option<OwnerReference> {
    let uid = crontab.uid()?;
    Some(OwnerReference {
        api_version: format!("{}/{}", CRONTAB_GROUP, CRONTAB_VERSION),
        kind: "CronTab".to_string(),
        name: crontab.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
