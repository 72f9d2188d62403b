//! CronJob generation for CronTab resources.
//!
//! Each CronTab maps to exactly one CronJob named `<crontab>-job`. The name
//! depends only on the CronTab name, so repeated derivations for the same
//! CronTab always target the same object.

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::crd::CronTab;
use crate::resources::common::{owner_reference, standard_labels};

/// Name of the single container in every derived job
pub const JOB_CONTAINER_NAME: &str = "echo";
/// Restart policy of derived job pods
pub const JOB_RESTART_POLICY: &str = "OnFailure";

/// Name of the CronJob derived from a CronTab
pub fn job_name(crontab_name: &str) -> String {
    format!("{}-job", crontab_name)
}

/// Shell command that prints `message`.
///
/// Plain words are embedded as-is; anything with shell metacharacters is
/// single-quoted so the message cannot inject commands.
pub fn echo_command(message: &str) -> String {
    format!("echo {}", shell_quote(message))
}

fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || " _-.,:/=+@%".contains(c));
    if is_plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Generate the CronJob for a CronTab.
///
/// `default_image` is used when the CronTab does not name an image.
pub fn generate_cronjob(crontab: &CronTab, default_image: &str) -> CronJob {
    let name = job_name(&crontab.name_any());
    let labels = standard_labels(crontab);
    let image = crontab
        .spec
        .image
        .as_deref()
        .filter(|i| !i.trim().is_empty())
        .unwrap_or(default_image);

    CronJob {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: crontab.namespace(),
            labels: Some(labels.clone()),
            owner_references: owner_reference(crontab).map(|owner| vec![owner]),
            ..Default::default()
        },
        spec: Some(CronJobSpec {
            schedule: crontab.spec.cron_spec.clone(),
            job_template: JobTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..Default::default()
                }),
                spec: Some(JobSpec {
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(labels),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            restart_policy: Some(JOB_RESTART_POLICY.to_string()),
                            containers: vec![Container {
                                name: JOB_CONTAINER_NAME.to_string(),
                                image: Some(image.to_string()),
                                args: Some(vec![
                                    "/bin/sh".to_string(),
                                    "-c".to_string(),
                                    echo_command(&crontab.spec.message),
                                ]),
                                ..Default::default()
                            }],
                            ..Default::default()
                        }),
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
