//! Assigning source files to track numbers.
//!
//! Each `.flac` entry of a resolved input is numbered by
//! [`leading_track_number`]. The numbers are then checked against the
//! tracks a disc block expects:
//!
//! - two entries with the same number are rejected, no guessing
//! - an expected track without an entry is an error
//! - entries for unexpected numbers are ignored with a warning

mod filename;

pub use filename::{is_flac_name, leading_track_number, FLAC_EXTENSION};

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::input::PhysicalEntry;

/// Result type for track matching.
pub type MatchResult<T> = Result<T, MatchError>;

/// Errors that can occur while matching files to tracks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    /// Two source files carry the same track number.
    #[error("disc {disc}: track {track} matches both '{first}' and '{second}'")]
    DuplicateTrackNumber {
        disc: u32,
        track: u32,
        first: String,
        second: String,
    },

    /// No source file carries an expected track number.
    #[error("disc {disc}: no file for track {track} in {location}")]
    TrackFileNotFound {
        disc: u32,
        track: u32,
        location: String,
    },
}

/// Match `entries` of disc `disc` to the `expected` track numbers.
///
/// `location` names the input in error messages. The returned map holds
/// exactly the expected tracks.
pub fn match_tracks(
    disc: u32,
    entries: Vec<PhysicalEntry>,
    expected: &BTreeSet<u32>,
    location: &str,
) -> MatchResult<BTreeMap<u32, PhysicalEntry>> {
    let mut numbered: BTreeMap<u32, PhysicalEntry> = BTreeMap::new();

    for entry in entries {
        if !is_flac_name(entry.name()) {
            debug!(disc, file = %entry.name(), "Skipping non-FLAC file");
            continue;
        }
        let Some(track) = leading_track_number(entry.name()) else {
            warn!(disc, file = %entry.name(), "No track number in file name, skipping");
            continue;
        };
        if let Some(first) = numbered.get(&track) {
            return Err(MatchError::DuplicateTrackNumber {
                disc,
                track,
                first: first.name().to_string(),
                second: entry.name().to_string(),
            });
        }
        numbered.insert(track, entry);
    }

    if let Some(&track) = expected.iter().find(|t| !numbered.contains_key(*t)) {
        return Err(MatchError::TrackFileNotFound {
            disc,
            track,
            location: location.to_string(),
        });
    }

    numbered.retain(|track, entry| {
        let keep = expected.contains(track);
        if !keep {
            warn!(disc, track, file = %entry.name(), "File has no track entry, ignoring");
        }
        keep
    });

    debug!(disc, tracks = numbered.len(), "Tracks matched");
    Ok(numbered)
}
