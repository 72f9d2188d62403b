//! Container security context policy.
//!
//! Requires `runAsNonRoot=true`, `allowPrivilegeEscalation=false` and
//! `readOnlyRootFilesystem=true` on the container itself.
//!
//! Unset fields take the unsafe value: `runAsNonRoot` and
//! `readOnlyRootFilesystem` default to false, `allowPrivilegeEscalation`
//! defaults to true. Pod-level settings are not consulted.

use super::{ValidationContext, ValidationResult};

/// Validate the container security context
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let sc = ctx.container.security_context.as_ref();

    let run_as_non_root = sc.and_then(|s| s.run_as_non_root).unwrap_or(false);
    let allow_privilege_escalation = sc
        .and_then(|s| s.allow_privilege_escalation)
        .unwrap_or(true);
    let read_only_root_filesystem = sc
        .and_then(|s| s.read_only_root_filesystem)
        .unwrap_or(false);

    let mut required = Vec::new();
    if !run_as_non_root {
        required.push("runAsNonRoot=true");
    }
    if allow_privilege_escalation {
        required.push("allowPrivilegeEscalation=false");
    }
    if !read_only_root_filesystem {
        required.push("readOnlyRootFilesystem=true");
    }

    if required.is_empty() {
        ValidationResult::allowed()
    } else {
        ValidationResult::denied(
            "InsecureSecurityContext",
            &format!("Required {}", required.join(", ")),
        )
    }
}
