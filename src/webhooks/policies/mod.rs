//! Pod admission policies.
//!
//! Every rule is a pure function of one container and the shared
//! [`PolicyConfig`]. [`evaluate`] runs all rules against all containers and
//! keeps every failure, so a denied pod reports everything wrong with it in a
//! single round trip.
//!
//! Rules:
//! - `registry`: named registries must be approved
//! - `tags`: the resolved tag must not be blocked
//! - `resources`: cpu/memory limits and requests must be set
//! - `security_context`: non-root, no privilege escalation, read-only root fs

pub mod registry;
pub mod resources;
pub mod security_context;
pub mod tags;

use k8s_openapi::api::core::v1::Container;
use kube::core::admission::Operation;

use crate::config::PolicyConfig;
use crate::webhooks::image::{ImageParseError, ImageReference};
use crate::webhooks::review::{AdmissionDecision, AdmissionRequest};

/// Message for a request in which no rule failed
pub const ALL_PASSED_MESSAGE: &str = "All validations passed";

/// Result of a validation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Context for validating a single container
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    /// The container being validated
    pub container: &'a Container,
    /// Admission policy in force
    pub policy: &'a PolicyConfig,
}

impl<'a> ValidationContext<'a> {
    pub fn new(container: &'a Container, policy: &'a PolicyConfig) -> Self {
        Self { container, policy }
    }

    /// Parse the container image, or the denial both image rules report
    fn image(&self) -> Result<ImageReference, ValidationResult> {
        let raw = self.container.image.as_deref().unwrap_or_default();
        ImageReference::parse(raw).map_err(|e| match e {
            ImageParseError::Empty => ValidationResult::denied("ImageRequired", "Image is required"),
            other => ValidationResult::denied(
                "InvalidImage",
                &format!("Invalid image reference '{}': {}", raw, other),
            ),
        })
    }
}

/// A single container rule
pub type Rule = fn(&ValidationContext<'_>) -> ValidationResult;

/// All rules, in the order their failures are reported
pub const RULES: &[Rule] = &[
    registry::validate,
    tags::validate,
    resources::validate,
    security_context::validate,
];

/// Run every rule against one container and return the failures.
pub fn validate_container(policy: &PolicyConfig, container: &Container) -> Vec<ValidationResult> {
    let ctx = ValidationContext::new(container, policy);
    RULES
        .iter()
        .map(|rule| rule(&ctx))
        .filter(|result| !result.allowed)
        .collect()
}

/// Evaluate an admission request into a decision.
///
/// The exempt namespace short-circuits before any rule runs. That bypass is
/// unconditional: anything able to create pods in that namespace is admitted
/// without checks, and the decision differs from a normal allow only in its
/// message.
pub fn evaluate(policy: &PolicyConfig, request: &AdmissionRequest) -> AdmissionDecision {
    if policy.is_exempt(&request.namespace) {
        return AdmissionDecision::allow(
            request.uid.as_str(),
            format!("Skipped validation in {} namespace", request.namespace),
        );
    }

    if request.operation == Operation::Delete {
        return AdmissionDecision::allow(request.uid.as_str(), "DELETE operations are not validated");
    }

    let failures: Vec<String> = request
        .containers
        .iter()
        .flat_map(|container| {
            validate_container(policy, container)
                .into_iter()
                .map(move |result| {
                    format!(
                        "Container '{}': {}",
                        container.name,
                        result.message.unwrap_or_default()
                    )
                })
        })
        .collect();

    if failures.is_empty() {
        AdmissionDecision::allow(request.uid.as_str(), ALL_PASSED_MESSAGE)
    } else {
        AdmissionDecision::deny(request.uid.as_str(), failures)
    }
}
