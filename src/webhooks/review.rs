//! AdmissionReview envelope decoding and encoding.
//!
//! The API server always expects a review response, so decoding never fails
//! outward: a body that cannot be understood becomes a `MalformedRequest`
//! carrying whatever `uid` could be recovered, and the caller turns that into
//! a hard deny.

use k8s_openapi::api::core::v1::{Container, Pod};
use kube::core::admission::Operation;
use serde::{Deserialize, Serialize};

/// API version of the review envelope
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of the review envelope
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Message for a body without a `request` section
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request";

/// Reported name for a container that arrives without one
pub const UNKNOWN_CONTAINER_NAME: &str = "unknown";

/// A pod admission request reduced to what the policies look at.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRequest {
    /// Correlation token echoed back in the response
    pub uid: String,
    pub namespace: String,
    /// Pod name (or `generateName` prefix when the name is not yet assigned)
    pub name: String,
    pub operation: Operation,
    /// Init containers first, then regular containers
    pub containers: Vec<Container>,
}

impl AdmissionRequest {
    /// Build a request from a pod object.
    pub fn from_pod(uid: impl Into<String>, operation: Operation, pod: &Pod) -> Self {
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let name = pod
            .metadata
            .name
            .clone()
            .or_else(|| pod.metadata.generate_name.clone())
            .unwrap_or_default();
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| {
                spec.init_containers
                    .iter()
                    .flatten()
                    .chain(spec.containers.iter())
                    .cloned()
                    .map(|mut container| {
                        if container.name.is_empty() {
                            container.name = UNKNOWN_CONTAINER_NAME.to_string();
                        }
                        container
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            uid: uid.into(),
            namespace,
            name,
            operation,
            containers,
        }
    }
}

/// A review body that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRequest {
    /// `request.uid` if it could be read, otherwise empty
    pub uid: String,
    pub message: String,
}

impl MalformedRequest {
    fn new(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            message: message.into(),
        }
    }

    fn validation_error(uid: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::new(uid, format!("Validation error: {}", detail))
    }
}

/// The outcome of evaluating one admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub uid: String,
    pub allowed: bool,
    /// One entry per violated rule per container, in evaluation order
    pub reasons: Vec<String>,
    /// Human-readable summary returned as `status.message`
    pub message: String,
}

impl AdmissionDecision {
    /// An allow decision with a fixed message
    pub fn allow(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            reasons: Vec::new(),
            message: message.into(),
        }
    }

    /// A deny decision listing every failure
    pub fn deny(uid: impl Into<String>, reasons: Vec<String>) -> Self {
        let message = reasons.join(" | ");
        Self {
            uid: uid.into(),
            allowed: false,
            reasons,
            message,
        }
    }

    /// Hard deny for a body that could not be decoded
    pub fn malformed(request: MalformedRequest) -> Self {
        Self {
            uid: request.uid,
            allowed: false,
            reasons: vec![request.message.clone()],
            message: request.message,
        }
    }

    /// Wrap the decision in a response envelope
    pub fn into_review(self) -> AdmissionReviewResponse {
        AdmissionReviewResponse {
            api_version: ADMISSION_API_VERSION.to_string(),
            kind: ADMISSION_REVIEW_KIND.to_string(),
            response: ReviewVerdict {
                uid: self.uid,
                allowed: self.allowed,
                status: ReviewStatus {
                    message: self.message,
                },
            },
        }
    }
}

/// Response envelope sent back to the API server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: ReviewVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub uid: String,
    pub allowed: bool,
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStatus {
    pub message: String,
}

/// The `request` section of an inbound review.
///
/// Only `uid` is mandatory at this level; the pod object is checked
/// separately so that a missing object still yields a readable uid.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    uid: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    operation: Option<Operation>,
    #[serde(default)]
    object: Option<Pod>,
}

/// Decode a raw review body.
pub fn decode_review(body: &[u8]) -> Result<AdmissionRequest, MalformedRequest> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| MalformedRequest::validation_error("", e))?;

    let request = match value.get("request") {
        Some(request) if !request.is_null() => request,
        _ => return Err(MalformedRequest::new("", INVALID_REQUEST_MESSAGE)),
    };

    let uid = request
        .get("uid")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    let request: ReviewRequest = serde_json::from_value(request.clone())
        .map_err(|e| MalformedRequest::validation_error(uid.as_str(), e))?;

    let operation = request.operation.unwrap_or(Operation::Create);

    // DELETE carries the old pod only; there is nothing new to validate.
    if operation == Operation::Delete {
        return Ok(AdmissionRequest {
            uid: request.uid,
            namespace: request.namespace.unwrap_or_default(),
            name: request.name.unwrap_or_default(),
            operation,
            containers: Vec::new(),
        });
    }

    let pod = request
        .object
        .ok_or_else(|| MalformedRequest::validation_error(uid.as_str(), "request.object is missing"))?;
    if pod.spec.is_none() {
        return Err(MalformedRequest::validation_error(
            uid.as_str(),
            "request.object.spec is missing",
        ));
    }

    let mut admission = AdmissionRequest::from_pod(request.uid, operation, &pod);
    // Pods created through a controller often omit metadata.namespace
    if admission.namespace.is_empty() {
        admission.namespace = request.namespace.unwrap_or_default();
    }
    if admission.name.is_empty() {
        admission.name = request.name.unwrap_or_default();
    }
    Ok(admission)
}
