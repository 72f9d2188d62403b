//! Controller module for podguard-operator.
//!
//! Watches CronTab custom resources and creates one CronJob per new CronTab.
//! The watch loop talks to the cluster only through [`cluster_api::ClusterApi`].

pub mod backoff;
pub mod cluster_api;
pub mod error;
pub mod watch_loop;

pub use backoff::Backoff;
pub use cluster_api::{ClusterApi, CronTabEventStream, FIELD_MANAGER, KubeClusterApi};
pub use error::{CreateOutcome, Error, Result};
pub use watch_loop::{EventOutcome, INITIAL_RESOURCE_VERSION, LoopState, MIN_WATCH_LIFETIME, WatchLoop};
