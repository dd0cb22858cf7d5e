//! The end-to-end run: TRACKINFO → plans → tagged files.
//!
//! ```text
//! TrackInfo ──► Pipeline::plan ──► RunPlan ──► Executor::execute ──► ExecutionReport
//!               (per disc block,               (bounded pool,
//!                in parallel)                   per-track results)
//! ```
//!
//! Planning is all-or-nothing: the first fatal error from any block aborts
//! the run and nothing is written. Writing is per track: a failed track is
//! reported and the others continue.

mod executor;

pub use executor::{ExecutionReport, Executor, TrackOutcome};

use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::input::{InputResolver, ResolveError};
use crate::matcher::{match_tracks, MatchError};
use crate::plan::{check_unique, DiscPlan, PlanBuilder, PlanError, TrackPlan};
use crate::trackinfo::{DiscBlock, TrackInfo, TrackInfoError};

/// Result type for a run.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal errors of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The TRACKINFO file could not be read or parsed.
    #[error(transparent)]
    TrackInfo(#[from] TrackInfoError),

    /// An `INPUT` or `COVER` could not be resolved.
    #[error("disc {disc} (line {line}): {source}")]
    Resolve {
        disc: u32,
        line: usize,
        source: ResolveError,
    },

    /// Source files could not be matched to tracks.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// Plans could not be assembled.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The writer thread pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// All disc plans of one run, in TRACKINFO order.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub multi_disc: bool,
    pub discs: Vec<DiscPlan>,
}

impl RunPlan {
    /// All track plans, discs in file order and tracks ascending.
    pub fn tracks(&self) -> impl Iterator<Item = &TrackPlan> {
        self.discs.iter().flat_map(|d| d.tracks.iter())
    }

    pub fn track_count(&self) -> usize {
        self.discs.iter().map(|d| d.tracks.len()).sum()
    }

    /// Track plans grouped by album directory.
    pub fn albums(&self) -> BTreeMap<&str, Vec<&TrackPlan>> {
        let mut albums: BTreeMap<&str, Vec<&TrackPlan>> = BTreeMap::new();
        for track in self.tracks() {
            albums.entry(track.album_dir.as_str()).or_default().push(track);
        }
        albums
    }
}

/// Turns a parsed TRACKINFO into a [`RunPlan`].
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    resolver: InputResolver,
}

impl Pipeline {
    pub fn new(resolver: InputResolver) -> Self {
        Self { resolver }
    }

    /// Resolve, match and plan every disc block.
    ///
    /// Blocks are processed in parallel; the result keeps file order.
    pub fn plan(&self, info: &TrackInfo) -> PipelineResult<RunPlan> {
        let builder = PlanBuilder::new(info.is_multi_disc());
        info!(
            trackinfo = %info.path.display(),
            discs = info.blocks.len(),
            multi_disc = builder.is_multi_disc(),
            "Planning"
        );

        let discs = info
            .blocks
            .par_iter()
            .map(|block| self.plan_disc(block, &info.base_dir, builder))
            .collect::<PipelineResult<Vec<_>>>()?;
        check_unique(&discs)?;

        Ok(RunPlan {
            multi_disc: builder.is_multi_disc(),
            discs,
        })
    }

    fn plan_disc(&self, block: &DiscBlock, base_dir: &Path, builder: PlanBuilder) -> PipelineResult<DiscPlan> {
        let disc = block.disc_number;
        let input_error = |source| PipelineError::Resolve {
            disc,
            line: block.input_line,
            source,
        };

        let input = self
            .resolver
            .resolve_input(&block.input_spec, base_dir)
            .map_err(input_error)?;
        info!(
            disc,
            input = %input.location(),
            archives = input.archive_chain().len(),
            "Input resolved"
        );

        let cover = match block.cover_spec.as_deref() {
            Some(spec) => {
                let cover = self
                    .resolver
                    .resolve_cover(spec, &input)
                    .map_err(|source| PipelineError::Resolve {
                        disc,
                        line: block.cover_line.unwrap_or(block.input_line),
                        source,
                    })?;
                debug!(disc, cover = %cover.location(), "Cover resolved");
                Some(cover)
            }
            None => None,
        };

        let entries = input.entries().map_err(input_error)?;
        let matched = match_tracks(disc, entries, &block.track_numbers(), &input.location())?;
        Ok(builder.build_disc(block, input, matched, cover)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::zip_bytes;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn trackinfo(dir: &Path, text: &str) -> TrackInfo {
        TrackInfo::parse(text, dir.join("TRACKINFO"), dir.to_path_buf()).unwrap()
    }

    #[test]
    fn test_plan_two_discs_in_order() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("Box.zip"),
            zip_bytes(&[
                ("Box/CD1/01 a.flac", b"1"),
                ("Box/CD1/02 b.flac", b"2"),
                ("Box/CD2/01 c.flac", b"3"),
            ]),
        )
        .unwrap();
        let info = trackinfo(
            temp.path(),
            "INPUT=Box.zip/CD1\nDISCNUMBER=1\nALBUM=Box\nTITLE[1]=a\nTITLE[2]=b\n\
             INPUT=Box.zip/CD2\nDISCNUMBER=2\nALBUM=Box\nTITLE[1]=c\n",
        );

        let run = Pipeline::default().plan(&info).unwrap();
        assert!(run.multi_disc);
        assert_eq!(run.track_count(), 3);
        let names: Vec<&str> = run.tracks().map(|t| t.output_filename.as_str()).collect();
        assert_eq!(names, vec!["1.01. a.flac", "1.02. b.flac", "2.01. c.flac"]);
        assert_eq!(run.albums()["Box"].len(), 3);
    }

    #[test]
    fn test_resolve_error_names_disc_and_line() {
        let temp = TempDir::new().unwrap();
        let info = trackinfo(temp.path(), "# rip\nINPUT=missing\nTITLE[1]=a\n");

        let err = Pipeline::default().plan(&info).unwrap_err();
        match err {
            PipelineError::Resolve { disc, line, .. } => {
                assert_eq!(disc, 1);
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_cover_is_fatal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("01.flac"), b"1").unwrap();
        let info = trackinfo(temp.path(), "INPUT=.\nTITLE[1]=a\nCOVER=front.jpg\n");

        let err = Pipeline::default().plan(&info).unwrap_err();
        assert!(matches!(err, PipelineError::Resolve { line: 3, .. }));
    }

    #[test]
    fn test_last_cover_applies_to_every_track() {
        let temp = TempDir::new().unwrap();
        for name in ["01 a.flac", "02 b.flac", "a.png", "b.png"] {
            fs::write(temp.path().join(name), b"1").unwrap();
        }
        let info = trackinfo(
            temp.path(),
            "INPUT=.\nCOVER=a.png\nTITLE[1]=a\nCOVER=b.png\nTITLE[2]=b\n",
        );

        let run = Pipeline::default().plan(&info).unwrap();
        assert_eq!(run.track_count(), 2);
        for track in run.tracks() {
            let cover = track.cover.as_ref().unwrap();
            assert_eq!(cover.entry.name(), "b.png");
        }
    }

    #[test]
    fn test_match_error_aborts_run() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("cd")).unwrap();
        fs::write(temp.path().join("cd/01.flac"), b"1").unwrap();
        let info = trackinfo(temp.path(), "INPUT=cd\nTITLE[1]=a\nTITLE[2]=b\n");

        let err = Pipeline::default().plan(&info).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Match(MatchError::TrackFileNotFound { track: 2, .. })
        ));
    }

    #[test]
    fn test_output_paths_under_album_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("04 w.flac"), b"1").unwrap();
        let info = trackinfo(
            temp.path(),
            "INPUT=.\nALBUM=Random Access Memories\nARTIST=Daft Punk\nTITLE[4]=Within\n",
        );

        let run = Pipeline::default().plan(&info).unwrap();
        let track = run.tracks().next().unwrap();
        assert_eq!(
            track.output_path(Path::new("/out")),
            PathBuf::from("/out/Random Access Memories/04. Daft Punk - Within.flac")
        );
    }
}
