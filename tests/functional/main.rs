// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the CronTab watch loop and the admission endpoint.
//!
//! These tests drive the real watch loop and webhook router WITHOUT requiring
//! a live Kubernetes cluster. The cluster side is a scripted `MockClusterApi`
//! that replays watch streams and create outcomes and records every call.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_added_creates_one_cronjob
//! ```
//!
//! ## Test Categories
//!
//! - **Watch loop tests**: event handling, retries, resubscription, cancellation
//! - **Admission tests**: full HTTP round trips through the webhook router

#[path = "../common/mod.rs"]
mod common;


pub use mock_api::*;
