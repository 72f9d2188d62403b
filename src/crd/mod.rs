//! Custom Resource Definitions (CRDs) for podguard-operator.
//!
//! - `CronTab`: a schedule plus message, materialized as a CronJob

mod crontab;

pub use crontab::*;
