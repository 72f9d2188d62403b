//! Tag block-list policy.
//!
//! The resolved tag is checked, so an untagged image is judged as `latest`.
//! With the default block-list every untagged image is rejected; that is the
//! intended way of forcing pinned versions.

use super::{ValidationContext, ValidationResult};

/// Validate the image tag
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let image = match ctx.image() {
        Ok(image) => image,
        Err(denied) => return denied,
    };

    if ctx.policy.is_tag_blocked(&image.tag) {
        return ValidationResult::denied(
            "TagBlocked",
            &format!(
                "Tag '{}' is blocked. Use specific version tags.",
                image.tag
            ),
        );
    }

    ValidationResult::allowed()
}
