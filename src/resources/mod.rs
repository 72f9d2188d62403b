//! Resource generation module.
//!
//! Contains utilities for generating Kubernetes resources derived from CronTab.
//!
//! ## Resources Generated
//!
//! | Resource | Purpose |
//! |----------|---------|
//! | CronJob | Runs `echo <message>` on the CronTab's schedule |

pub mod common;
pub mod cronjob;

// Re-export commonly used items
pub use common::{owner_reference, standard_labels};
pub use cronjob::{generate_cronjob, job_name};
