//! tracktagger CLI
//!
//! Applies a TRACKINFO file: resolves every `INPUT`, matches the FLAC files
//! found there to tracks, and writes tagged copies into per-album folders.

mod error;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::style;
use tracing::debug;

use tracktagger::config::ConfigFile;
use tracktagger::input::InputResolver;
use tracktagger::logging;
use tracktagger::pipeline::{Executor, Pipeline};
use tracktagger::trackinfo::TrackInfo;
use tracktagger::writer::FlacTagWriter;

use crate::error::CliError;
use crate::output::{print_dry_run, print_summary, print_track_map, WriteProgress};

#[derive(Debug, Parser)]
#[command(name = "tracktagger")]
#[command(version = tracktagger::VERSION)]
#[command(about = "Apply tags from a TRACKINFO file to FLAC files", long_about = None)]
struct Cli {
    /// TRACKINFO file containing the new tags
    #[arg(value_name = "TRACKINFO")]
    trackinfo: PathBuf,

    /// Directory to place the album folders in [default: config, then current directory]
    #[arg(short = 'o', long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Add ReplayGain tags to each album after writing
    #[arg(short = 'g', long)]
    add_replaygain: bool,

    /// Number of parallel writers (0 = one per CPU)
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Resolve and match everything, print the plan, write nothing
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing output files
    #[arg(short = 'f', long)]
    force: bool,

    /// Use this configuration file instead of the default one
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            e.exit_code()
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    let output_dir = resolve_output_dir(cli.output_dir.as_deref(), &config)?;
    debug!(output_dir = %output_dir.display(), "Output directory");

    println!("Reading trackinfo file: '{}' ...", cli.trackinfo.display());
    let info = TrackInfo::load(&cli.trackinfo)?;

    println!("Resolving inputs and mapping tracks ...");
    let pipeline = Pipeline::new(InputResolver::new(Arc::new(config.extractor())));
    let run = pipeline.plan(&info)?;
    print_track_map(&run);

    if cli.dry_run {
        print_dry_run(&run, &output_dir);
        return Ok(());
    }

    let mut executor = Executor::new(Arc::new(FlacTagWriter::new().with_overwrite(cli.force)))
        .with_jobs(cli.jobs.unwrap_or(config.processing.jobs));
    if cli.add_replaygain {
        executor = executor.with_replaygain(Arc::new(config.replaygain()));
    }

    println!("Writing {} tracks ...", run.track_count());
    let progress = WriteProgress::new(run.track_count());
    let report = executor.execute(&run, &output_dir, |outcome| progress.track_done(outcome))?;
    progress.finish();
    print_summary(&report, &output_dir);

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::TracksFailed {
            failed: report.failed(),
            total: report.tracks.len(),
            replaygain: report.replaygain_errors.len(),
        })
    }
}

/// CLI flag, then config file, then the working directory; made absolute.
fn resolve_output_dir(cli: Option<&Path>, config: &ConfigFile) -> Result<PathBuf, CliError> {
    let cwd = std::env::current_dir()
        .map_err(|e| CliError::Io(format!("Cannot determine working directory: {}", e)))?;
    let dir = cli
        .map(Path::to_path_buf)
        .or_else(|| config.output.directory.clone())
        .unwrap_or_else(|| cwd.clone());
    Ok(if dir.is_absolute() { dir } else { cwd.join(dir) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from(["tracktagger", "TRACKINFO", "-o", "/out", "-g", "-j", "3"]).unwrap();
        assert_eq!(cli.trackinfo, PathBuf::from("TRACKINFO"));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/out")));
        assert!(cli.add_replaygain);
        assert_eq!(cli.jobs, Some(3));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_trackinfo_is_required() {
        assert!(Cli::try_parse_from(["tracktagger"]).is_err());
    }

    #[test]
    fn test_output_dir_precedence() {
        let mut config = ConfigFile::default();
        config.output.directory = Some(PathBuf::from("/from/config"));

        assert_eq!(
            resolve_output_dir(Some(Path::new("/from/cli")), &config).unwrap(),
            PathBuf::from("/from/cli")
        );
        assert_eq!(
            resolve_output_dir(None, &config).unwrap(),
            PathBuf::from("/from/config")
        );

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            resolve_output_dir(Some(Path::new("rel")), &ConfigFile::default()).unwrap(),
            cwd.join("rel")
        );
    }
}
