//! ReplayGain tagging of finished albums.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use super::{WriteError, WriteResult};

/// Default ReplayGain tool.
pub const DEFAULT_METAFLAC: &str = "metaflac";

/// Capability to add album and track gain tags to a set of files.
pub trait ReplayGain: Send + Sync + fmt::Debug {
    /// Tag `files`, which form one album.
    fn apply(&self, album: &str, files: &[PathBuf]) -> WriteResult<()>;
}

/// Runs `metaflac --add-replay-gain` over one album's files.
#[derive(Debug, Clone)]
pub struct ShellReplayGain {
    program: String,
}

impl Default for ShellReplayGain {
    fn default() -> Self {
        Self::new(DEFAULT_METAFLAC)
    }
}

impl ShellReplayGain {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ReplayGain for ShellReplayGain {
    fn apply(&self, album: &str, files: &[PathBuf]) -> WriteResult<()> {
        if files.is_empty() {
            return Ok(());
        }
        debug!(album, files = files.len(), program = %self.program, "Adding ReplayGain tags");

        let failed = |reason: String| WriteError::ReplayGainFailed {
            album: album.to_string(),
            reason,
        };
        let output = Command::new(&self.program)
            .arg("--add-replay-gain")
            .args(files)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => failed(format!("{} was not found", self.program)),
                _ => failed(format!("failed to run {}: {}", self.program, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} failed ({}): {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_album_is_a_no_op() {
        let gain = ShellReplayGain::new("tracktagger-no-such-metaflac");
        assert!(gain.apply("Discovery", &[]).is_ok());
    }

    #[test]
    fn test_missing_program() {
        let gain = ShellReplayGain::new("tracktagger-no-such-metaflac");
        let err = gain
            .apply("Discovery", &[PathBuf::from("/tmp/01.flac")])
            .unwrap_err();
        assert!(matches!(err, WriteError::ReplayGainFailed { .. }));
        assert!(err.to_string().contains("tracktagger-no-such-metaflac"));
    }

    #[test]
    fn test_default_program() {
        assert_eq!(ShellReplayGain::default().program(), DEFAULT_METAFLAC);
    }
}
