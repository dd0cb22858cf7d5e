//! Error types for TRACKINFO parsing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for TRACKINFO operations.
pub type TrackInfoResult<T> = Result<T, TrackInfoError>;

/// Errors found while reading a TRACKINFO file.
///
/// Every syntax error carries the 1-based line number of the offending
/// directive.
#[derive(Debug, Error)]
pub enum TrackInfoError {
    /// The TRACKINFO file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// A line is neither blank, a comment, nor a `FIELD[n]=value` directive.
    #[error("line {line}: '{text}' is not a valid trackinfo line")]
    MalformedDirective { line: usize, text: String },

    /// Something other than `INPUT` opens the file.
    #[error("line {line}: {field} appears before the first INPUT")]
    MissingInitialInput { line: usize, field: String },

    /// `DISCNUMBER` appears before any `INPUT`.
    #[error("line {line}: DISCNUMBER appears before any INPUT")]
    DiscNumberBeforeInput { line: usize },

    /// `DISCNUMBER` is not a positive integer.
    #[error("line {line}: DISCNUMBER ('{value}') must be a positive integer")]
    InvalidDiscNumber { line: usize, value: String },

    /// `INPUT` has an empty value.
    #[error("line {line}: INPUT must name a location")]
    EmptyInput { line: usize },

    /// A structural field was given a track index.
    #[error("line {line}: {field} cannot be set for a single track")]
    IndexedStructuralField { line: usize, field: String },

    /// Several disc blocks exist but one of them has no `DISCNUMBER`.
    #[error("line {line}: INPUT has no DISCNUMBER but the file declares {blocks} inputs")]
    MissingDiscNumber { line: usize, blocks: usize },

    /// Two disc blocks claim the same disc number.
    #[error("line {line}: disc {disc} is already declared by the INPUT on line {first_line}")]
    DuplicateDiscNumber {
        line: usize,
        disc: u32,
        first_line: usize,
    },

    /// The file contains no directives at all.
    #[error("trackinfo contains no directives")]
    Empty,
}

impl TrackInfoError {
    /// Line number of the offending directive, if the error has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MalformedDirective { line, .. }
            | Self::MissingInitialInput { line, .. }
            | Self::DiscNumberBeforeInput { line }
            | Self::InvalidDiscNumber { line, .. }
            | Self::EmptyInput { line }
            | Self::IndexedStructuralField { line, .. }
            | Self::MissingDiscNumber { line, .. }
            | Self::DuplicateDiscNumber { line, .. } => Some(*line),
            Self::ReadFailed { .. } | Self::Empty => None,
        }
    }
}
