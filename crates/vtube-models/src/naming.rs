//! Artifact filenames for one upload.
//!
//! Every generated name starts with the upload token followed by `_`, so
//! concurrent uploads never collide and orphaned files can be traced back
//! to the upload that produced them.

use crate::encoding::{THUMBNAIL_EXTENSION, VARIANT_EXTENSION};
use crate::upload::{sanitize_filename, truncate_name, MAX_BASE_LEN};
use crate::video::VideoId;

const MAX_EXTENSION_LEN: usize = 16;

/// Filenames derived from an upload token and the sanitized source stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    token: VideoId,
    base: String,
}

impl ArtifactNames {
    pub fn new(token: VideoId, base: impl Into<String>) -> Self {
        Self {
            token,
            base: base.into(),
        }
    }

    pub fn token(&self) -> &VideoId {
        &self.token
    }

    /// `{token}_{base}`
    pub fn stem(&self) -> String {
        format!("{}_{}", self.token, self.base)
    }

    /// Staged copy of the raw upload.
    pub fn source(&self, extension: &str) -> String {
        format!("{}.{}", self.stem(), extension)
    }

    pub fn variant(&self, quality: &str) -> String {
        format!("{}_{}.{}", self.stem(), quality, VARIANT_EXTENSION)
    }

    pub fn thumbnail(&self) -> String {
        format!("{}.{}", self.stem(), THUMBNAIL_EXTENSION)
    }

    /// Name for a caller-supplied thumbnail, keeping its sanitized filename.
    /// Stem and extension are each bounded in length.
    pub fn caller_thumbnail(&self, original: &str) -> String {
        let name = sanitize_filename(original);
        let name = match name.rsplit_once('.') {
            Some((stem, ext)) => format!(
                "{}.{}",
                truncate_name(stem, MAX_BASE_LEN),
                truncate_name(ext, MAX_EXTENSION_LEN)
            ),
            None => truncate_name(&name, MAX_BASE_LEN).to_string(),
        };
        if name.is_empty() {
            self.thumbnail()
        } else {
            format!("{}_{}", self.token, name)
        }
    }
}

/// Extract the upload token prefix from a generated filename.
pub fn token_of(filename: &str) -> Option<&str> {
    let (token, rest) = filename.split_once('_')?;
    if token.len() == 32 && token.chars().all(|c| c.is_ascii_hexdigit()) && !rest.is_empty() {
        Some(token)
    } else {
        None
    }
}
