//! Operator configuration.
//!
//! Configuration is assembled once at process start and then shared read-only:
//! the admission path receives an `Arc<PolicyConfig>`, the watch loop a
//! `ControllerConfig` by value. Nothing here is ever mutated after load.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. A JSON policy file named by `PODGUARD_POLICY_FILE`
//! 3. Individual environment variables

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an optional JSON policy file
pub const POLICY_FILE_ENV: &str = "PODGUARD_POLICY_FILE";
/// Comma-separated list of approved registries
pub const ALLOWED_REGISTRIES_ENV: &str = "PODGUARD_ALLOWED_REGISTRIES";
/// Comma-separated list of blocked tags
pub const BLOCKED_TAGS_ENV: &str = "PODGUARD_BLOCKED_TAGS";
/// Namespace whose pods bypass validation
pub const EXEMPT_NAMESPACE_ENV: &str = "PODGUARD_EXEMPT_NAMESPACE";
/// Namespace watched for CronTab resources
pub const WATCH_NAMESPACE_ENV: &str = "WATCH_NAMESPACE";
/// Image used by derived CronJobs when the CronTab does not name one
pub const JOB_IMAGE_ENV: &str = "PODGUARD_JOB_IMAGE";
/// Maximum attempts for a transiently failing CronJob create
pub const CREATE_MAX_ATTEMPTS_ENV: &str = "PODGUARD_CREATE_MAX_ATTEMPTS";
pub const WEBHOOK_CERT_PATH_ENV: &str = "WEBHOOK_CERT_PATH";
pub const WEBHOOK_KEY_PATH_ENV: &str = "WEBHOOK_KEY_PATH";
pub const WEBHOOK_PORT_ENV: &str = "WEBHOOK_PORT";

/// Registries trusted when no configuration overrides them
pub const DEFAULT_ALLOWED_REGISTRIES: &[&str] = &[
    "docker.io",
    "gcr.io",
    "k8s.gcr.io",
    "quay.io",
    "registry.k8s.io",
    "ghcr.io",
];
/// Tags rejected when no configuration overrides them
pub const DEFAULT_BLOCKED_TAGS: &[&str] = &["latest"];
/// The webhook's own namespace, exempt from validation by default
pub const DEFAULT_EXEMPT_NAMESPACE: &str = "image-validator-demo";

/// Default path to webhook TLS certificate
pub const DEFAULT_WEBHOOK_CERT_PATH: &str = "/certs/tls.crt";
/// Default path to webhook TLS private key
pub const DEFAULT_WEBHOOK_KEY_PATH: &str = "/certs/tls.key";
/// Default webhook server port
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

/// Errors raised while assembling configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The policy file could not be read
    #[error("failed to read policy file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The policy file is not valid JSON for the expected shape
    #[error("failed to parse policy file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An environment variable held a value of the wrong shape
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Admission policy shared by every validation rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Registries an image may be pulled from when a registry is named.
    ///
    /// Kept in configured order, which is the order deny messages list them in.
    pub allowed_registries: Vec<String>,
    /// Tags that may not be deployed (including the implied `latest`)
    pub blocked_tags: BTreeSet<String>,
    /// Pods in this namespace are admitted without evaluation.
    ///
    /// The bypass is total: no rule runs and the decision carries only a
    /// distinguishing message, nothing that an auditor could key on.
    pub exempt_namespace: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_registries: DEFAULT_ALLOWED_REGISTRIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blocked_tags: DEFAULT_BLOCKED_TAGS.iter().map(|s| s.to_string()).collect(),
            exempt_namespace: DEFAULT_EXEMPT_NAMESPACE.to_string(),
        }
    }
}

impl PolicyConfig {
    /// Whether `registry` is on the allow-list
    pub fn is_registry_allowed(&self, registry: &str) -> bool {
        self.allowed_registries.iter().any(|allowed| allowed == registry)
    }

    /// Whether `tag` is on the block-list
    pub fn is_tag_blocked(&self, tag: &str) -> bool {
        self.blocked_tags.contains(tag)
    }

    /// Whether pods in `namespace` skip validation entirely
    pub fn is_exempt(&self, namespace: &str) -> bool {
        namespace == self.exempt_namespace
    }
}

/// Settings for the CronTab watch loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace the CronTab watch is scoped to
    pub watch_namespace: String,
    /// Image for the derived job container when the CronTab names none
    pub job_image: String,
    /// Attempts per create call when the API server reports a transient error
    pub create_max_attempts: u32,
    /// First delay before resubscribing or retrying
    pub backoff_initial: Duration,
    /// Upper bound on any single backoff delay
    pub backoff_max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: "default".to_string(),
            job_image: "busybox".to_string(),
            create_max_attempts: 3,
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// Webhook TLS listener settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from(DEFAULT_WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(DEFAULT_WEBHOOK_KEY_PATH),
            port: DEFAULT_WEBHOOK_PORT,
        }
    }
}

/// Complete operator configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperatorConfig {
    pub policy: PolicyConfig,
    pub controller: ControllerConfig,
    pub webhook: WebhookConfig,
}

/// Policy overrides read from the JSON policy file.
///
/// Example:
/// ```json
/// {
///   "allowedRegistries": ["ghcr.io", "registry.internal.example.com:5000"],
///   "blockedTags": ["latest", "dev"],
///   "exemptNamespace": "kube-system"
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyFile {
    pub allowed_registries: Option<Vec<String>>,
    pub blocked_tags: Option<Vec<String>>,
    pub exempt_namespace: Option<String>,
}

impl PolicyFile {
    /// Parse a policy file body
    pub fn parse(path: impl Into<PathBuf>, body: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(body).map_err(|source| ConfigError::ParseFile {
            path: path.into(),
            source,
        })
    }

    fn apply(self, policy: &mut PolicyConfig) {
        if let Some(registries) = self.allowed_registries {
            policy.allowed_registries = ordered_unique(registries);
        }
        if let Some(tags) = self.blocked_tags {
            policy.blocked_tags = tags.into_iter().collect();
        }
        if let Some(namespace) = self.exempt_namespace {
            policy.exempt_namespace = namespace;
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` to resolve variable names.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = OperatorConfig::default();

        if let Some(path) = get(POLICY_FILE_ENV) {
            let path = PathBuf::from(path);
            let body = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
                path: path.clone(),
                source,
            })?;
            PolicyFile::parse(path, &body)?.apply(&mut config.policy);
        }

        if let Some(value) = get(ALLOWED_REGISTRIES_ENV) {
            config.policy.allowed_registries = ordered_unique(split_list::<Vec<String>>(&value));
        }
        if let Some(value) = get(BLOCKED_TAGS_ENV) {
            config.policy.blocked_tags = split_list(&value);
        }
        if let Some(value) = get(EXEMPT_NAMESPACE_ENV) {
            config.policy.exempt_namespace = value.trim().to_string();
        }

        if let Some(value) = get(WATCH_NAMESPACE_ENV) {
            config.controller.watch_namespace = value.trim().to_string();
        }
        if let Some(value) = get(JOB_IMAGE_ENV) {
            config.controller.job_image = value.trim().to_string();
        }
        if let Some(value) = get(CREATE_MAX_ATTEMPTS_ENV) {
            let attempts = parse_number::<u32>(CREATE_MAX_ATTEMPTS_ENV, &value)?;
            if attempts == 0 {
                return Err(ConfigError::InvalidValue {
                    key: CREATE_MAX_ATTEMPTS_ENV.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            config.controller.create_max_attempts = attempts;
        }

        if let Some(value) = get(WEBHOOK_CERT_PATH_ENV) {
            config.webhook.cert_path = PathBuf::from(value);
        }
        if let Some(value) = get(WEBHOOK_KEY_PATH_ENV) {
            config.webhook.key_path = PathBuf::from(value);
        }
        if let Some(value) = get(WEBHOOK_PORT_ENV) {
            config.webhook.port = parse_number::<u16>(WEBHOOK_PORT_ENV, &value)?;
        }

        Ok(config)
    }
}

/// Split a comma-separated list, dropping blanks
fn split_list<C: FromIterator<String>>(value: &str) -> C {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop repeats, keeping the first occurrence
fn ordered_unique(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}
