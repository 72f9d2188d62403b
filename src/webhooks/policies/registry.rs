//! Registry allow-list policy.
//!
//! Images that name a registry must come from an approved one. Images without
//! a detectable registry segment resolve to the runtime's default registry and
//! are trusted.

use super::{ValidationContext, ValidationResult};

/// Validate the image registry
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let image = match ctx.image() {
        Ok(image) => image,
        Err(denied) => return denied,
    };

    match image.registry.as_deref() {
        Some(registry) if !ctx.policy.is_registry_allowed(registry) => {
            let approved: Vec<&str> = ctx
                .policy
                .allowed_registries
                .iter()
                .map(String::as_str)
                .collect();
            ValidationResult::denied(
                "RegistryNotAllowed",
                &format!(
                    "Registry '{}' not in approved list: [{}]",
                    registry,
                    approved.join(", ")
                ),
            )
        }
        _ => ValidationResult::allowed(),
    }
}
