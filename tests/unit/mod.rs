// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for podguard-operator.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation through the public API.

#[path = "../common/mod.rs"]
mod common;

mod image_tests {
    use podguard_operator::webhooks::{ImageParseError, ImageReference};

    #[test]
    fn test_registry_port_is_not_a_tag() {
        let image = ImageReference::parse("registry.internal:5000/team/app").unwrap();
        assert_eq!(image.registry.as_deref(), Some("registry.internal:5000"));
        assert_eq!(image.repository, "team/app");
        assert_eq!(image.tag, "latest");
        assert!(!image.tag_explicit);
    }

    #[test]
    fn test_registry_port_with_tag() {
        let image = ImageReference::parse("localhost:5000/app:v2").unwrap();
        assert_eq!(image.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(image.repository, "app");
        assert_eq!(image.tag, "v2");
        assert!(image.tag_explicit);
    }

    #[test]
    fn test_single_label_host_is_a_repository() {
        let image = ImageReference::parse("localhost/app:1.0").unwrap();
        assert_eq!(image.registry, None);
        assert_eq!(image.repository, "localhost/app");
    }

    #[test]
    fn test_digest_is_split_off() {
        let image = ImageReference::parse("gcr.io/distroless/static:nonroot@sha256:abc").unwrap();
        assert_eq!(image.registry.as_deref(), Some("gcr.io"));
        assert_eq!(image.repository, "distroless/static");
        assert_eq!(image.tag, "nonroot");
        assert_eq!(image.digest.as_deref(), Some("sha256:abc"));
    }

    #[test]
    fn test_display_is_canonical() {
        let image = ImageReference::parse("quay.io/org/tool").unwrap();
        assert_eq!(image.to_string(), "quay.io/org/tool:latest");
    }

    #[test]
    fn test_malformed_references() {
        assert_eq!(ImageReference::parse("   "), Err(ImageParseError::Empty));
        assert_eq!(ImageReference::parse("nginx:"), Err(ImageParseError::EmptyTag));
        assert_eq!(ImageReference::parse("nginx@"), Err(ImageParseError::EmptyDigest));
        assert_eq!(
            ImageReference::parse("gcr.io/"),
            Err(ImageParseError::EmptyRepository)
        );
    }
}

mod policy_tests {
    use super::common::fixtures::{bare_container, compliant_container, container_with_image};
    use podguard_operator::config::PolicyConfig;
    use podguard_operator::webhooks::{AdmissionRequest, Operation, evaluate, validate_container};

    fn request(namespace: &str, containers: Vec<k8s_openapi::api::core::v1::Container>) -> AdmissionRequest {
        AdmissionRequest {
            uid: "uid-1".to_string(),
            namespace: namespace.to_string(),
            name: "pod".to_string(),
            operation: Operation::Create,
            containers,
        }
    }

    #[test]
    fn test_compliant_container_has_no_failures() {
        let policy = PolicyConfig::default();
        assert!(validate_container(&policy, &compliant_container("app")).is_empty());
    }

    #[test]
    fn test_unapproved_registry_message() {
        let policy = PolicyConfig::default();
        let failures =
            validate_container(&policy, &container_with_image("app", "evil.example.com/app:1.0"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason.as_deref(), Some("RegistryNotAllowed"));
        assert_eq!(
            failures[0].message.as_deref(),
            Some(
                "Registry 'evil.example.com' not in approved list: \
                 [docker.io, gcr.io, k8s.gcr.io, quay.io, registry.k8s.io, ghcr.io]"
            )
        );
    }

    #[test]
    fn test_untagged_image_is_judged_as_latest() {
        let policy = PolicyConfig::default();
        let failures = validate_container(&policy, &container_with_image("app", "nginx"));
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].message.as_deref(),
            Some("Tag 'latest' is blocked. Use specific version tags.")
        );
    }

    #[test]
    fn test_myapp_is_denied_by_tag_rule() {
        let policy = PolicyConfig::default();
        let failures = validate_container(&policy, &container_with_image("app", "myapp"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason.as_deref(), Some("TagBlocked"));
    }

    #[test]
    fn test_registry_rule_names_the_registry() {
        let policy = PolicyConfig::default();
        assert!(
            validate_container(&policy, &container_with_image("a", "docker.io/library/nginx:1.21"))
                .is_empty()
        );
        let failures = validate_container(&policy, &container_with_image("a", "evil.io/malware:1.0"));
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.as_deref().unwrap().contains("'evil.io'"));
    }

    #[test]
    fn test_only_cpu_limit_lists_three_missing() {
        use k8s_openapi::api::core::v1::ResourceRequirements;
        use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
        use std::collections::BTreeMap;

        let policy = PolicyConfig::default();
        let container = k8s_openapi::api::core::v1::Container {
            resources: Some(ResourceRequirements {
                limits: Some(BTreeMap::from([(
                    "cpu".to_string(),
                    Quantity("500m".to_string()),
                )])),
                ..Default::default()
            }),
            ..compliant_container("app")
        };
        let failures = validate_container(&policy, &container);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].message.as_deref(),
            Some("Missing memory limits, CPU requests, memory requests")
        );
    }

    #[test]
    fn test_bare_container_reports_every_rule() {
        let policy = PolicyConfig::default();
        let failures = validate_container(&policy, &bare_container("app", "nginx:latest"));
        let reasons: Vec<&str> = failures.iter().filter_map(|f| f.reason.as_deref()).collect();
        assert_eq!(
            reasons,
            vec!["TagBlocked", "MissingResources", "InsecureSecurityContext"]
        );
        assert_eq!(
            failures[1].message.as_deref(),
            Some("Missing CPU limits, memory limits, CPU requests, memory requests")
        );
        assert_eq!(
            failures[2].message.as_deref(),
            Some(
                "Required runAsNonRoot=true, allowPrivilegeEscalation=false, \
                 readOnlyRootFilesystem=true"
            )
        );
    }

    #[test]
    fn test_deny_aggregates_across_containers() {
        let policy = PolicyConfig::default();
        let decision = evaluate(
            &policy,
            &request(
                "prod",
                vec![
                    container_with_image("web", "nginx:latest"),
                    compliant_container("sidecar"),
                    container_with_image("db", "evil.example.com/pg:16"),
                ],
            ),
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reasons.len(), 2);
        assert!(decision.reasons[0].starts_with("Container 'web': Tag 'latest'"));
        assert!(decision.reasons[1].starts_with("Container 'db': Registry 'evil.example.com'"));
        assert_eq!(decision.message, decision.reasons.join(" | "));
    }

    #[test]
    fn test_exempt_namespace_skips_rules() {
        let policy = PolicyConfig::default();
        let decision = evaluate(
            &policy,
            &request("image-validator-demo", vec![bare_container("x", "nginx")]),
        );
        assert!(decision.allowed);
        assert_eq!(
            decision.message,
            "Skipped validation in image-validator-demo namespace"
        );
    }

    #[test]
    fn test_pod_without_containers_is_allowed() {
        let policy = PolicyConfig::default();
        let decision = evaluate(&policy, &request("prod", Vec::new()));
        assert!(decision.allowed);
        assert_eq!(decision.message, "All validations passed");
    }

    #[test]
    fn test_custom_policy_changes_outcome() {
        let mut policy = PolicyConfig::default();
        policy.blocked_tags.insert("dev".to_string());
        policy.allowed_registries.push("registry.internal:5000".to_string());

        let failures =
            validate_container(&policy, &container_with_image("a", "registry.internal:5000/a:dev"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason.as_deref(), Some("TagBlocked"));
    }
}

mod review_tests {
    use super::common::fixtures::{compliant_container, pod_review};
    use podguard_operator::webhooks::{AdmissionDecision, Operation, decode_review};
    use serde_json::json;

    #[test]
    fn test_decode_pod_review() {
        let body = pod_review("abc", "prod", &[compliant_container("app")]);
        let request = decode_review(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(request.uid, "abc");
        assert_eq!(request.namespace, "prod");
        assert_eq!(request.name, "test-pod");
        assert_eq!(request.operation, Operation::Create);
        assert_eq!(request.containers.len(), 1);
    }

    #[test]
    fn test_missing_request_is_invalid() {
        let err = decode_review(br#"{"kind":"AdmissionReview"}"#).unwrap_err();
        assert_eq!(err.uid, "");
        assert_eq!(err.message, "Invalid request");
    }

    #[test]
    fn test_non_json_body() {
        let err = decode_review(b"not json").unwrap_err();
        assert!(err.message.starts_with("Validation error: "));
    }

    #[test]
    fn test_uid_survives_bad_object() {
        let body = json!({"request": {"uid": "keep-me", "object": {"spec": "oops"}}});
        let err = decode_review(&serde_json::to_vec(&body).unwrap()).unwrap_err();
        assert_eq!(err.uid, "keep-me");
        assert!(err.message.starts_with("Validation error: "));
    }

    #[test]
    fn test_response_envelope_shape() {
        let review = AdmissionDecision::deny("u-1", vec!["a".into(), "b".into()]).into_review();
        let value = serde_json::to_value(&review).unwrap();
        assert_eq!(
            value,
            json!({
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "response": {
                    "uid": "u-1",
                    "allowed": false,
                    "status": {"message": "a | b"}
                }
            })
        );
    }
}

mod config_tests {
    use podguard_operator::config::{OperatorConfig, PolicyFile};

    #[test]
    fn test_env_lists_override_defaults() {
        let config = OperatorConfig::from_lookup(|key| match key {
            "PODGUARD_ALLOWED_REGISTRIES" => Some(" ghcr.io , ,quay.io".to_string()),
            "PODGUARD_BLOCKED_TAGS" => Some("latest,dev".to_string()),
            "WATCH_NAMESPACE" => Some("jobs".to_string()),
            _ => None,
        })
        .unwrap();

        assert!(config.policy.is_registry_allowed("ghcr.io"));
        assert!(config.policy.is_registry_allowed("quay.io"));
        assert!(!config.policy.is_registry_allowed("docker.io"));
        assert!(config.policy.is_tag_blocked("dev"));
        assert_eq!(config.controller.watch_namespace, "jobs");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = OperatorConfig::from_lookup(|key| {
            (key == "WEBHOOK_PORT").then(|| "https".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("WEBHOOK_PORT"));
    }

    #[test]
    fn test_policy_file_rejects_unknown_keys() {
        assert!(PolicyFile::parse("policy.json", r#"{"allowedRegistry": []}"#).is_err());
        let file = PolicyFile::parse("policy.json", r#"{"exemptNamespace": "sandbox"}"#).unwrap();
        assert_eq!(file.exempt_namespace.as_deref(), Some("sandbox"));
    }
}

mod cronjob_tests {
    use super::common::fixtures::CronTabBuilder;
    use podguard_operator::resources::cronjob::{
        JOB_CONTAINER_NAME, JOB_RESTART_POLICY, echo_command,
    };
    use podguard_operator::resources::{generate_cronjob, job_name};

    #[test]
    fn test_job_name() {
        assert_eq!(job_name("demo"), "demo-job");
    }

    #[test]
    fn test_generated_cronjob_shape() {
        let crontab = CronTabBuilder::new("demo")
            .namespace("jobs")
            .schedule("*/1 * * * *")
            .message("hi")
            .uid("uid-demo")
            .build();
        let job = generate_cronjob(&crontab, "busybox");

        assert_eq!(job.metadata.name.as_deref(), Some("demo-job"));
        assert_eq!(job.metadata.namespace.as_deref(), Some("jobs"));
        assert_eq!(job.metadata.owner_references.as_ref().map(Vec::len), Some(1));

        let spec = job.spec.unwrap();
        assert_eq!(spec.schedule, "*/1 * * * *");
        let pod = spec.job_template.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some(JOB_RESTART_POLICY));
        assert_eq!(pod.containers.len(), 1);
        let container = &pod.containers[0];
        assert_eq!(container.name, JOB_CONTAINER_NAME);
        assert_eq!(container.image.as_deref(), Some("busybox"));
        assert_eq!(
            container.args.clone().unwrap(),
            vec!["/bin/sh", "-c", "echo hi"]
        );
    }

    #[test]
    fn test_crontab_image_overrides_default() {
        let crontab = CronTabBuilder::new("demo").image("alpine:3.20").build();
        let job = generate_cronjob(&crontab, "busybox");
        let pod = job.spec.unwrap().job_template.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.containers[0].image.as_deref(), Some("alpine:3.20"));
    }

    #[test]
    fn test_message_is_quoted_for_the_shell() {
        assert_eq!(echo_command("hello world"), "echo hello world");
        assert_eq!(echo_command("a; rm -rf /"), "echo 'a; rm -rf /'");
        assert_eq!(echo_command("it's"), r"echo 'it'\''s'");
        assert_eq!(echo_command(""), "echo ''");
    }
}

mod crd_tests {
    use podguard_operator::crd::{CRONTAB_GROUP, CronTab};
    use serde_json::json;

    #[test]
    fn test_crontab_deserializes_from_api_shape() {
        let crontab: CronTab = serde_json::from_value(json!({
            "apiVersion": "stable.deepak.com/v1",
            "kind": "CronTab",
            "metadata": {"name": "demo", "namespace": "default"},
            "spec": {"cronSpec": "*/1 * * * *", "message": "hi"}
        }))
        .unwrap();
        assert_eq!(crontab.spec.cron_spec, "*/1 * * * *");
        assert_eq!(crontab.spec.message, "hi");
        assert_eq!(crontab.spec.image, None);
        assert_eq!(CRONTAB_GROUP, "stable.deepak.com");
    }
}
