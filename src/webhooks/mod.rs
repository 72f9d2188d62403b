//! Pod validating admission webhook.
//!
//! - `image`: container image reference parsing
//! - `policies`: per-container rules and the decision aggregator
//! - `review`: AdmissionReview envelope codec
//! - `server`: HTTPS transport

pub mod image;
pub mod policies;
pub mod review;
mod server;

pub use image::{DEFAULT_TAG, ImageParseError, ImageReference};
pub use policies::{ValidationContext, ValidationResult, evaluate, validate_container};
pub use review::{
    AdmissionDecision, AdmissionRequest, AdmissionReviewResponse, MalformedRequest, decode_review,
};
pub use server::{WebhookError, WebhookState, create_webhook_router, run_webhook_server};

// Re-export the kube-rs operation type for callers building requests
pub use kube::core::admission::Operation;
