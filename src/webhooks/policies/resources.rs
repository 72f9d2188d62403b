//! Resource requirements policy.
//!
//! Both `cpu` and `memory` must be set in limits and in requests. Every
//! missing entry is reported, not only the first.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::{ValidationContext, ValidationResult};

/// Validate resource limits and requests
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let resources = ctx.container.resources.as_ref();
    let limits = resources.and_then(|r| r.limits.as_ref());
    let requests = resources.and_then(|r| r.requests.as_ref());

    let checks = [
        (limits, "cpu", "CPU limits"),
        (limits, "memory", "memory limits"),
        (requests, "cpu", "CPU requests"),
        (requests, "memory", "memory requests"),
    ];

    let missing: Vec<&str> = checks
        .iter()
        .filter(|(map, key, _)| !has_quantity(*map, key))
        .map(|(_, _, label)| *label)
        .collect();

    if missing.is_empty() {
        ValidationResult::allowed()
    } else {
        ValidationResult::denied(
            "MissingResources",
            &format!("Missing {}", missing.join(", ")),
        )
    }
}

/// A quantity counts as set only when present and non-blank
fn has_quantity(map: Option<&BTreeMap<String, Quantity>>, key: &str) -> bool {
    map.and_then(|m| m.get(key))
        .is_some_and(|q| !q.0.trim().is_empty())
}
