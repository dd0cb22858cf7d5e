//! Assembly of per-track plans.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::naming::{album_directory, output_filename};
use crate::input::{PhysicalEntry, ResolvedInput};
use crate::matcher::FLAC_EXTENSION;
use crate::trackinfo::{DiscBlock, DISCNUMBER, TRACKNUMBER};

/// Result type for plan building.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors that can occur while assembling plans.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// An expected track has no matched source file.
    #[error("disc {disc}: track {track} has no source file")]
    UnmatchedTrack { disc: u32, track: u32 },

    /// Two plans share a disc and track number.
    #[error("disc {disc}, track {track} is planned twice")]
    DuplicateTrack { disc: u32, track: u32 },
}

/// Where a track's cover art comes from.
#[derive(Debug, Clone)]
pub struct CoverSource {
    /// The resolved `COVER` file.
    pub entry: PhysicalEntry,
    /// True if `entry` is a FLAC file whose embedded picture is the cover.
    pub embedded: bool,
}

impl CoverSource {
    pub fn new(entry: PhysicalEntry) -> Self {
        let embedded = entry.has_extension(FLAC_EXTENSION);
        Self { entry, embedded }
    }
}

/// Everything needed to write one output file.
#[derive(Debug, Clone)]
pub struct TrackPlan {
    pub disc_number: u32,
    pub track_number: u32,
    /// Tags to write, upper-case names.
    pub fields: BTreeMap<String, String>,
    pub source: PhysicalEntry,
    pub cover: Option<CoverSource>,
    /// Album directory name, relative to the output directory.
    pub album_dir: String,
    pub output_filename: String,
}

impl TrackPlan {
    /// Value of a tag.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Full output path under `output_dir`.
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.album_dir).join(&self.output_filename)
    }

    /// Short identifier such as `"Discovery":#03` or `#2.07`.
    pub fn label(&self, multi_disc: bool) -> String {
        let album = self
            .field("ALBUM")
            .map(|a| format!("\"{}\":", a))
            .unwrap_or_default();
        if multi_disc {
            format!("{}#{}.{:02}", album, self.disc_number, self.track_number)
        } else {
            format!("{}#{:02}", album, self.track_number)
        }
    }
}

/// Plans for one disc block, tracks ascending.
///
/// Keeps the resolved input alive, and with it any opened archives, until
/// the plans are written.
#[derive(Debug, Clone)]
pub struct DiscPlan {
    pub disc_number: u32,
    pub input: ResolvedInput,
    pub tracks: Vec<TrackPlan>,
}

/// Builds [`TrackPlan`]s from a block, its matched files and its cover.
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder {
    multi_disc: bool,
}

impl PlanBuilder {
    /// `multi_disc` selects the `{disc}.{track}` naming and tags the disc number.
    pub fn new(multi_disc: bool) -> Self {
        Self { multi_disc }
    }

    pub fn is_multi_disc(&self) -> bool {
        self.multi_disc
    }

    /// Build the plan for one disc block.
    ///
    /// `matched` must contain every track of [`DiscBlock::track_numbers`].
    pub fn build_disc(
        &self,
        block: &DiscBlock,
        input: ResolvedInput,
        mut matched: BTreeMap<u32, PhysicalEntry>,
        cover: Option<PhysicalEntry>,
    ) -> PlanResult<DiscPlan> {
        let disc = block.disc_number;
        let cover = cover.map(CoverSource::new);
        let mut tracks = Vec::new();

        for track in block.track_numbers() {
            let source = matched
                .remove(&track)
                .ok_or(PlanError::UnmatchedTrack { disc, track })?;
            tracks.push(self.build_track(block, track, source, cover.clone()));
        }

        debug!(disc, tracks = tracks.len(), "Disc planned");
        Ok(DiscPlan {
            disc_number: disc,
            input,
            tracks,
        })
    }

    fn build_track(
        &self,
        block: &DiscBlock,
        track: u32,
        source: PhysicalEntry,
        cover: Option<CoverSource>,
    ) -> TrackPlan {
        let disc = block.disc_number;
        let mut fields = block.effective_fields(track);
        fields.insert(TRACKNUMBER.to_string(), track.to_string());
        if self.multi_disc {
            fields.insert(DISCNUMBER.to_string(), disc.to_string());
        }

        let output_filename = output_filename(
            self.multi_disc.then_some(disc),
            track,
            fields.get("ARTIST").map(String::as_str),
            fields.get("TITLE").map(String::as_str),
        );
        let album_dir = album_directory(fields.get("ALBUM").map(String::as_str));

        TrackPlan {
            disc_number: disc,
            track_number: track,
            fields,
            source,
            cover,
            album_dir,
            output_filename,
        }
    }
}

/// Check that no `(disc, track)` pair is planned twice across a run.
pub fn check_unique(discs: &[DiscPlan]) -> PlanResult<()> {
    let mut seen = HashSet::new();
    for plan in discs.iter().flat_map(|d| d.tracks.iter()) {
        if !seen.insert((plan.disc_number, plan.track_number)) {
            return Err(PlanError::DuplicateTrack {
                disc: plan.disc_number,
                track: plan.track_number,
            });
        }
    }
    Ok(())
}
