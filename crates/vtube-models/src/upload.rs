//! Upload requests and intake validation.

use thiserror::Error;

use crate::video::UserId;

/// Source container extensions accepted at intake.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

/// Maximum title length, in characters.
pub const MAX_TITLE_LEN: usize = 100;

/// Maximum bytes of a sanitized name embedded in generated filenames.
/// Keeps `{token}_{base}_{quality}.mp4` well under `NAME_MAX`.
pub const MAX_BASE_LEN: usize = 64;

/// Reasons an upload is refused before any processing starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("title is required")]
    MissingTitle,

    #[error("title exceeds {MAX_TITLE_LEN} characters")]
    TitleTooLong,

    #[error("source filename is required")]
    MissingFilename,

    #[error("file type not allowed: {0}")]
    DisallowedExtension(String),

    #[error("caller thumbnail is empty")]
    EmptyThumbnail,
}

/// Thumbnail supplied by the uploader instead of an extracted frame.
#[derive(Debug, Clone)]
pub struct CallerThumbnail {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Metadata accompanying an upload byte stream.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub title: String,
    pub description: String,
    /// Client-side filename; only its extension and stem are used
    pub source_filename: String,
    pub uploader_id: UserId,
    pub thumbnail: Option<CallerThumbnail>,
}

impl UploadRequest {
    pub fn new(
        title: impl Into<String>,
        source_filename: impl Into<String>,
        uploader_id: UserId,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            source_filename: source_filename.into(),
            uploader_id,
            thumbnail: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_thumbnail(mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.thumbnail = Some(CallerThumbnail {
            filename: filename.into(),
            bytes,
        });
        self
    }

    /// Validate against an extension allow-list. Returns the lowercased extension.
    pub fn validate(&self, allowed: &[String]) -> Result<String, UploadRejection> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(UploadRejection::MissingTitle);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(UploadRejection::TitleTooLong);
        }
        if self.source_filename.trim().is_empty() {
            return Err(UploadRejection::MissingFilename);
        }

        let extension = allowed_extension(&self.source_filename, allowed).ok_or_else(|| {
            UploadRejection::DisallowedExtension(self.source_filename.clone())
        })?;

        if let Some(thumb) = &self.thumbnail {
            if thumb.bytes.is_empty() {
                return Err(UploadRejection::EmptyThumbnail);
            }
        }

        Ok(extension)
    }

    /// Sanitized source stem used in generated filenames.
    pub fn base_name(&self) -> String {
        let stem = match self.source_filename.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => self.source_filename.as_str(),
        };
        let base = sanitize_filename(stem);
        let base = truncate_name(&base, MAX_BASE_LEN).trim_end_matches(['.', '_']);
        if base.is_empty() {
            "video".to_string()
        } else {
            base.to_string()
        }
    }
}

/// Lowercased extension of `filename` if it is on the allow-list.
pub fn allowed_extension(filename: &str, allowed: &[String]) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)).then_some(ext)
}

/// Default allow-list as owned strings.
pub fn default_allowed_extensions() -> Vec<String> {
    ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Reduce a client filename to a safe single path component.
///
/// Path separators and whitespace runs become `_`, anything outside
/// `[A-Za-z0-9._-]` is dropped and leading/trailing `.`/`_` are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Longest prefix of `name` within `max` bytes, cut on a char boundary.
pub fn truncate_name(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
