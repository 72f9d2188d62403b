//! Container image reference parsing.
//!
//! Splits an image string such as `registry.example.com:5000/team/app:1.2@sha256:...`
//! into its registry, repository, tag and digest parts.
//!
//! Registry detection keeps the long-standing heuristic: the first path
//! segment is a registry only when the name has more than one segment and that
//! segment contains a `.` or a `:`. Single-label hosts such as `localhost/app`
//! or `registry/app` are therefore treated as repository paths on the default
//! registry.
//!
//! A `:` is only a tag separator when it appears in the last path segment, so
//! a registry port is never mistaken for a tag.

use std::fmt;

use thiserror::Error;

/// Tag implied when an image names none
pub const DEFAULT_TAG: &str = "latest";

/// Reasons an image string cannot be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageParseError {
    #[error("image reference is empty")]
    Empty,

    #[error("image reference has no repository")]
    EmptyRepository,

    #[error("image reference has an empty tag")]
    EmptyTag,

    #[error("image reference has an empty digest")]
    EmptyDigest,
}

/// A parsed container image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host (with optional port), if one was named
    pub registry: Option<String>,
    /// Repository path, without registry or tag
    pub repository: String,
    /// Resolved tag; `latest` when none was written
    pub tag: String,
    /// Whether `tag` was written in the image string
    pub tag_explicit: bool,
    /// Content digest following `@`, if present
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image string.
    pub fn parse(image: &str) -> Result<Self, ImageParseError> {
        let image = image.trim();
        if image.is_empty() {
            return Err(ImageParseError::Empty);
        }

        let (name, digest) = match image.split_once('@') {
            Some((_, "")) => return Err(ImageParseError::EmptyDigest),
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (image, None),
        };

        let (registry, remainder) = match name.split_once('/') {
            Some((first, rest)) if is_registry_segment(first) => (Some(first.to_string()), rest),
            _ => (None, name),
        };

        let (path, last) = match remainder.rsplit_once('/') {
            Some((path, last)) => (Some(path), last),
            None => (None, remainder),
        };

        let (last_name, tag) = match last.split_once(':') {
            Some((_, "")) => return Err(ImageParseError::EmptyTag),
            Some((last_name, tag)) => (last_name, Some(tag)),
            None => (last, None),
        };

        if last_name.is_empty() || path.is_some_and(str::is_empty) {
            return Err(ImageParseError::EmptyRepository);
        }

        let repository = match path {
            Some(path) => format!("{}/{}", path, last_name),
            None => last_name.to_string(),
        };

        Ok(Self {
            registry,
            repository,
            tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
            tag_explicit: tag.is_some(),
            digest,
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}:{}", self.repository, self.tag)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

fn is_registry_segment(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':')
}
