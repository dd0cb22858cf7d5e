//! CLI error type and exit codes.

use std::fmt;
use std::process::ExitCode;

use tracktagger::config::ConfigError;
use tracktagger::pipeline::PipelineError;
use tracktagger::trackinfo::TrackInfoError;

/// Errors reported by the `tracktagger` binary.
#[derive(Debug)]
pub enum CliError {
    /// The configuration file is unusable.
    Config(ConfigError),

    /// The TRACKINFO file could not be read or parsed.
    TrackInfo(TrackInfoError),

    /// Planning failed; nothing was written.
    Pipeline(PipelineError),

    /// Filesystem problem outside the pipeline.
    Io(String),

    /// Some outputs were not produced.
    TracksFailed {
        failed: usize,
        total: usize,
        replaygain: usize,
    },
}

impl CliError {
    /// Process exit code: 1 for fatal errors, 3 for partial failures.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::TracksFailed { .. } => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::TrackInfo(e @ TrackInfoError::ReadFailed { .. }) => write!(f, "{}", e),
            CliError::TrackInfo(e) => write!(f, "Invalid TRACKINFO: {}", e),
            CliError::Pipeline(e) => write!(f, "{}", e),
            CliError::Io(msg) => write!(f, "{}", msg),
            CliError::TracksFailed {
                failed,
                total,
                replaygain,
            } => {
                write!(f, "{} of {} tracks failed", failed, total)?;
                if *replaygain > 0 {
                    write!(f, ", ReplayGain failed for {} album(s)", replaygain)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<TrackInfoError> for CliError {
    fn from(e: TrackInfoError) -> Self {
        CliError::TrackInfo(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::TrackInfo(e) => CliError::TrackInfo(e),
            other => CliError::Pipeline(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_failed_display() {
        let err = CliError::TracksFailed {
            failed: 2,
            total: 13,
            replaygain: 0,
        };
        assert_eq!(err.to_string(), "2 of 13 tracks failed");

        let err = CliError::TracksFailed {
            failed: 0,
            total: 13,
            replaygain: 1,
        };
        assert_eq!(
            err.to_string(),
            "0 of 13 tracks failed, ReplayGain failed for 1 album(s)"
        );
    }

    #[test]
    fn test_exit_codes() {
        let partial = CliError::TracksFailed {
            failed: 1,
            total: 2,
            replaygain: 0,
        };
        assert_eq!(partial.exit_code(), ExitCode::from(3));
        assert_eq!(CliError::Io("x".into()).exit_code(), ExitCode::FAILURE);
    }

    #[test]
    fn test_trackinfo_error_display() {
        let err = CliError::from(TrackInfoError::EmptyInput { line: 4 });
        assert_eq!(
            err.to_string(),
            "Invalid TRACKINFO: line 4: INPUT must name a location"
        );
    }
}
