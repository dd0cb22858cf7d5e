//! Writing a [`RunPlan`] to disk on a bounded worker pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use super::{PipelineError, PipelineResult, RunPlan};
use crate::plan::TrackPlan;
use crate::writer::{load_cover, CoverImage, FlacTagWriter, ReplayGain, TagWriter, WriteError};

/// Result of writing one track.
#[derive(Debug)]
pub struct TrackOutcome {
    pub disc_number: u32,
    pub track_number: u32,
    /// Display label, e.g. `"Discovery":#03`.
    pub label: String,
    pub output: PathBuf,
    pub result: Result<(), WriteError>,
}

impl TrackOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of an execution.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// One outcome per planned track, in plan order.
    pub tracks: Vec<TrackOutcome>,
    /// Albums whose ReplayGain pass failed.
    pub replaygain_errors: Vec<WriteError>,
}

impl ExecutionReport {
    pub fn written(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.tracks.len() - self.written()
    }

    /// True when every track was written and every ReplayGain pass succeeded.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.replaygain_errors.is_empty()
    }
}

/// Writes planned tracks with a [`TagWriter`].
#[derive(Debug, Clone)]
pub struct Executor {
    writer: Arc<dyn TagWriter>,
    replaygain: Option<Arc<dyn ReplayGain>>,
    jobs: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(Arc::new(FlacTagWriter::new()))
    }
}

impl Executor {
    /// Create an executor; the pool size defaults to available parallelism.
    pub fn new(writer: Arc<dyn TagWriter>) -> Self {
        Self {
            writer,
            replaygain: None,
            jobs: 0,
        }
    }

    /// Worker count; 0 means available parallelism.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Run ReplayGain over each album after writing.
    pub fn with_replaygain(mut self, replaygain: Arc<dyn ReplayGain>) -> Self {
        self.replaygain = Some(replaygain);
        self
    }

    /// Write every track of `run` under `output_dir`.
    ///
    /// `on_track` is called from worker threads as each track finishes.
    pub fn execute<F>(&self, run: &RunPlan, output_dir: &Path, on_track: F) -> PipelineResult<ExecutionReport>
    where
        F: Fn(&TrackOutcome) + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("tracktagger-writer-{}", i))
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

        let covers = load_covers(run);
        let tracks: Vec<&TrackPlan> = run.tracks().collect();
        info!(tracks = tracks.len(), workers = pool.current_num_threads(), "Writing tracks");

        let outcomes: Vec<TrackOutcome> = pool.install(|| {
            tracks
                .par_iter()
                .map(|plan| {
                    let outcome = self.write_track(plan, run.multi_disc, output_dir, &covers);
                    if let Err(e) = &outcome.result {
                        warn!(track = %outcome.label, error = %e, "Track failed");
                    }
                    on_track(&outcome);
                    outcome
                })
                .collect()
        });

        let replaygain_errors = match &self.replaygain {
            Some(replaygain) => pool.install(|| apply_replaygain(replaygain.as_ref(), run, &outcomes)),
            None => Vec::new(),
        };

        Ok(ExecutionReport {
            tracks: outcomes,
            replaygain_errors,
        })
    }

    fn write_track(
        &self,
        plan: &TrackPlan,
        multi_disc: bool,
        output_dir: &Path,
        covers: &HashMap<String, Result<CoverImage, String>>,
    ) -> TrackOutcome {
        let output = plan.output_path(output_dir);
        let cover = match &plan.cover {
            Some(source) => {
                let location = source.entry.location();
                match covers.get(&location) {
                    Some(Ok(image)) => Ok(Some(image)),
                    Some(Err(reason)) => Err(WriteError::CoverUnavailable {
                        location,
                        reason: reason.clone(),
                    }),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        };
        let result = cover.and_then(|cover| {
            self.writer
                .write_tags(&plan.source, &plan.fields, cover, &output)
        });

        TrackOutcome {
            disc_number: plan.disc_number,
            track_number: plan.track_number,
            label: plan.label(multi_disc),
            output,
            result,
        }
    }
}

/// Load each distinct cover once.
fn load_covers(run: &RunPlan) -> HashMap<String, Result<CoverImage, String>> {
    let mut covers = HashMap::new();
    for plan in run.tracks() {
        let Some(source) = &plan.cover else {
            continue;
        };
        covers.entry(source.entry.location()).or_insert_with(|| {
            load_cover(source).map_err(|e| {
                warn!(error = %e, "Cover could not be loaded");
                match e {
                    WriteError::CoverUnavailable { reason, .. } => reason,
                    other => other.to_string(),
                }
            })
        });
    }
    covers
}

/// Run ReplayGain over the written files of each album, albums in parallel.
fn apply_replaygain(replaygain: &dyn ReplayGain, run: &RunPlan, outcomes: &[TrackOutcome]) -> Vec<WriteError> {
    let written: HashMap<(u32, u32), &Path> = outcomes
        .iter()
        .filter(|o| o.is_ok())
        .map(|o| ((o.disc_number, o.track_number), o.output.as_path()))
        .collect();

    let albums: Vec<(&str, Vec<PathBuf>)> = run
        .albums()
        .into_iter()
        .map(|(album, plans)| {
            let files = plans
                .iter()
                .filter_map(|p| written.get(&(p.disc_number, p.track_number)))
                .map(|path| path.to_path_buf())
                .collect();
            (album, files)
        })
        .collect();

    albums
        .par_iter()
        .filter_map(|(album, files)| {
            if files.is_empty() {
                warn!(album = %album, "No files to add ReplayGain tags to");
                return None;
            }
            info!(album = %album, files = files.len(), "Adding ReplayGain tags");
            replaygain.apply(album, files).err()
        })
        .collect()
}
