//! Console output: track map, progress and summary.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use tracktagger::pipeline::{ExecutionReport, RunPlan, TrackOutcome};

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Print which source file feeds each track.
pub fn print_track_map(run: &RunPlan) {
    for track in run.tracks() {
        println!("{} ← {}", track.label(run.multi_disc), track.source.name());
    }
}

/// Print where each track would be written.
pub fn print_dry_run(run: &RunPlan, output_dir: &Path) {
    println!();
    println!("Dry run, nothing written:");
    for track in run.tracks() {
        println!(
            "  {} → {}",
            track.label(run.multi_disc),
            track.output_path(output_dir).display()
        );
    }
}

/// Progress display for the writing phase.
pub struct WriteProgress {
    bar: ProgressBar,
}

impl WriteProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message("writing");
        Self { bar }
    }

    /// Report one finished track. Safe to call from worker threads.
    pub fn track_done(&self, outcome: &TrackOutcome) {
        let name = outcome
            .output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match &outcome.result {
            Ok(()) => self.bar.println(format!("{} → {}", outcome.label, name)),
            Err(e) => self.bar.println(format!(
                "{} {} → {}: {}",
                style("FAILED").red().bold(),
                outcome.label,
                name,
                e
            )),
        }
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Print the end-of-run summary.
pub fn print_summary(report: &ExecutionReport, output_dir: &Path) {
    println!();
    println!(
        "{} {} of {} tracks to {}",
        style("Wrote").green().bold(),
        report.written(),
        report.tracks.len(),
        output_dir.display()
    );
    for error in &report.replaygain_errors {
        println!("{} {}", style("ReplayGain:").yellow().bold(), error);
    }
}
