//! Delegated archive extraction.
//!
//! Formats without a native reader are unpacked by external tools:
//! - rar: `unrar x -idq <archive> <dest>/`
//! - 7z: `7za x -y -o<dest> <archive>`
//!
//! The tool names are configurable through `[tools]` in config.ini.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use super::archive::ArchiveFormat;
use super::error::{ResolveError, ResolveResult};

/// Default rar extraction tool.
pub const DEFAULT_UNRAR: &str = "unrar";

/// Default 7z extraction tool.
pub const DEFAULT_SEVENZIP: &str = "7za";

/// Capability to unpack a whole archive into a directory.
pub trait ArchiveExtractor: Send + Sync + fmt::Debug {
    /// Extract `archive` into `dest_dir`, which already exists.
    fn extract(&self, format: ArchiveFormat, archive: &Path, dest_dir: &Path) -> ResolveResult<()>;
}

/// Extractor that shells out to `unrar` and `7za`.
#[derive(Debug, Clone)]
pub struct ShellExtractor {
    unrar: String,
    sevenzip: String,
}

impl Default for ShellExtractor {
    fn default() -> Self {
        Self {
            unrar: DEFAULT_UNRAR.to_string(),
            sevenzip: DEFAULT_SEVENZIP.to_string(),
        }
    }
}

impl ShellExtractor {
    /// Create an extractor using the default tool names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rar tool.
    pub fn with_unrar(mut self, program: impl Into<String>) -> Self {
        self.unrar = program.into();
        self
    }

    /// Set the 7z tool.
    pub fn with_sevenzip(mut self, program: impl Into<String>) -> Self {
        self.sevenzip = program.into();
        self
    }

    /// Program used for `format`; `None` for natively read formats.
    pub fn program(&self, format: ArchiveFormat) -> Option<&str> {
        match format {
            ArchiveFormat::Zip => None,
            ArchiveFormat::Rar => Some(&self.unrar),
            ArchiveFormat::SevenZip => Some(&self.sevenzip),
        }
    }

    fn command(&self, format: ArchiveFormat, archive: &Path, dest_dir: &Path) -> Option<Command> {
        let program = self.program(format)?;
        let mut command = Command::new(program);
        match format {
            ArchiveFormat::Zip => return None,
            ArchiveFormat::Rar => {
                // unrar treats the destination as a directory only with a trailing separator
                let mut dest: OsString = dest_dir.as_os_str().to_owned();
                dest.push(std::path::MAIN_SEPARATOR_STR);
                command.arg("x").arg("-idq").arg(archive).arg(dest);
            }
            ArchiveFormat::SevenZip => {
                let mut out: OsString = OsString::from("-o");
                out.push(dest_dir.as_os_str());
                command.arg("x").arg("-y").arg(out).arg(archive);
            }
        }
        command.stdin(Stdio::null()).stdout(Stdio::null());
        Some(command)
    }
}

impl ArchiveExtractor for ShellExtractor {
    fn extract(&self, format: ArchiveFormat, archive: &Path, dest_dir: &Path) -> ResolveResult<()> {
        let location = archive.display().to_string();
        let Some(mut command) = self.command(format, archive, dest_dir) else {
            return Err(ResolveError::open_failed(
                location,
                format!("{} archives are read natively", format),
            ));
        };
        let program = self.program(format).unwrap_or_default().to_string();

        debug!(archive = %location, program = %program, "Running external extractor");
        let output = command.output().map_err(|e| {
            let reason = if e.kind() == io::ErrorKind::NotFound {
                format!(
                    "{} is required for {} archives but was not found",
                    program, format
                )
            } else {
                format!("failed to run {}: {}", program, e)
            };
            ResolveError::open_failed(&location, reason)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::open_failed(
                location,
                format!("{} failed ({}): {}", program, output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}
