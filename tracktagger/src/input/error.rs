//! Error types for input resolution.

use std::io;

use thiserror::Error;

/// Result type for input resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while locating an `INPUT` or `COVER`.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A path segment does not exist in the current directory or archive.
    #[error("'{segment}' not found in {context}")]
    InputPathNotFound { context: String, segment: String },

    /// A recognised archive could not be opened.
    #[error("failed to open archive {location}: {reason}")]
    ArchiveOpenFailed { location: String, reason: String },

    /// An `INPUT` resolved to a plain file.
    #[error("{location} is not a directory or archive")]
    InputNotADirectory { location: String },

    /// A `COVER` resolved to a directory.
    #[error("cover {location} is not a file")]
    CoverNotAFile { location: String },

    /// Reading a file or archive entry failed.
    #[error("failed to read {location}: {source}")]
    ReadFailed { location: String, source: io::Error },
}

impl ResolveError {
    pub(crate) fn read(location: impl Into<String>, source: io::Error) -> Self {
        Self::ReadFailed {
            location: location.into(),
            source,
        }
    }

    pub(crate) fn open_failed(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::ArchiveOpenFailed {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ResolveError::InputPathNotFound {
            context: "Album.zip!/Album Name/".to_string(),
            segment: "Disc 3".to_string(),
        };
        assert_eq!(err.to_string(), "'Disc 3' not found in Album.zip!/Album Name/");
    }

    #[test]
    fn test_open_failed_display() {
        let err = ResolveError::open_failed("/music/a.rar", "unrar not found");
        assert!(err.to_string().contains("/music/a.rar"));
        assert!(err.to_string().contains("unrar not found"));
    }
}
