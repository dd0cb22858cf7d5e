//! Writing tagged output files.
//!
//! [`FlacTagWriter`] copies a source FLAC stream into a staging file next
//! to its output path, drops the existing Vorbis comments and pictures,
//! writes the planned fields and the cover with `metaflac`, and only then
//! moves the staging file into place. Audio frames are copied untouched.

mod cover;
mod replaygain;

pub use cover::{load_cover, read_embedded_picture, CoverImage};
pub use replaygain::{ReplayGain, ShellReplayGain, DEFAULT_METAFLAC};

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use metaflac::block::{BlockType, PictureType};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::input::{PhysicalEntry, ResolveError};

/// Result type for output writing.
pub type WriteResult<T> = Result<T, WriteError>;

/// Errors that can occur while writing one output file.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The output file exists and overwriting is off.
    #[error("{path} already exists")]
    OutputExists { path: PathBuf },

    /// Creating the output file or its directory failed.
    #[error("failed to create {path}: {source}")]
    CreateFailed { path: PathBuf, source: io::Error },

    /// Copying the source stream failed.
    #[error("failed to copy {from} to {path}: {source}")]
    CopyFailed {
        from: String,
        path: PathBuf,
        source: io::Error,
    },

    /// The source could not be opened.
    #[error(transparent)]
    Source(#[from] ResolveError),

    /// The copied stream is not valid FLAC.
    #[error("{from} is not a valid FLAC file: {reason}")]
    InvalidFlac { from: String, reason: String },

    /// Saving the new metadata failed.
    #[error("failed to write tags to {path}: {reason}")]
    TagWriteFailed { path: PathBuf, reason: String },

    /// The cover could not be loaded.
    #[error("cover {location} unavailable: {reason}")]
    CoverUnavailable { location: String, reason: String },

    /// The ReplayGain tool failed for an album.
    #[error("ReplayGain failed for album {album}: {reason}")]
    ReplayGainFailed { album: String, reason: String },
}

/// Capability to produce one tagged output file.
pub trait TagWriter: Send + Sync + fmt::Debug {
    /// Write `source` to `output` carrying exactly `fields` and `cover`.
    fn write_tags(
        &self,
        source: &PhysicalEntry,
        fields: &BTreeMap<String, String>,
        cover: Option<&CoverImage>,
        output: &Path,
    ) -> WriteResult<()>;
}

/// Tag writer for FLAC files.
#[derive(Debug, Clone, Default)]
pub struct FlacTagWriter {
    overwrite: bool,
}

impl FlacTagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace existing output files instead of failing.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Create a staging file next to `output` holding a copy of `source`.
    fn stage(&self, source: &PhysicalEntry, output: &Path) -> WriteResult<NamedTempFile> {
        let dir = output
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let staged = tempfile::Builder::new()
            .prefix(".tracktagger-")
            .suffix(".flac.part")
            .tempfile_in(dir)
            .map_err(|e| WriteError::CreateFailed {
                path: output.to_path_buf(),
                source: e,
            })?;

        let copy_failed = |e| WriteError::CopyFailed {
            from: source.location(),
            path: output.to_path_buf(),
            source: e,
        };
        let mut reader = source.open()?;
        let mut writer = BufWriter::new(staged.as_file());
        io::copy(&mut reader, &mut writer).map_err(copy_failed)?;
        writer.flush().map_err(copy_failed)?;
        drop(writer);
        Ok(staged)
    }

    /// Move a finished staging file to `output`.
    fn commit(&self, staged: NamedTempFile, output: &Path) -> WriteResult<()> {
        let persisted = if self.overwrite {
            staged.persist(output)
        } else {
            staged.persist_noclobber(output)
        };
        persisted.map(|_| ()).map_err(|e| match e.error.kind() {
            io::ErrorKind::AlreadyExists => WriteError::OutputExists {
                path: output.to_path_buf(),
            },
            _ => WriteError::CreateFailed {
                path: output.to_path_buf(),
                source: e.error,
            },
        })
    }

    fn retag(
        &self,
        source: &PhysicalEntry,
        fields: &BTreeMap<String, String>,
        cover: Option<&CoverImage>,
        output: &Path,
    ) -> WriteResult<()> {
        let mut tag = metaflac::Tag::read_from_path(output).map_err(|e| WriteError::InvalidFlac {
            from: source.location(),
            reason: e.to_string(),
        })?;

        tag.remove_blocks(BlockType::VorbisComment);
        tag.remove_blocks(BlockType::Picture);
        for (field, value) in fields {
            tag.set_vorbis(field.clone(), vec![value.clone()]);
        }
        if let Some(cover) = cover {
            tag.add_picture(cover.mime_type.clone(), PictureType::CoverFront, cover.data.clone());
        }

        tag.write_to_path(output)
            .map_err(|e| WriteError::TagWriteFailed {
                path: output.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl TagWriter for FlacTagWriter {
    fn write_tags(
        &self,
        source: &PhysicalEntry,
        fields: &BTreeMap<String, String>,
        cover: Option<&CoverImage>,
        output: &Path,
    ) -> WriteResult<()> {
        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir).map_err(|e| WriteError::CreateFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        if !self.overwrite && output.exists() {
            return Err(WriteError::OutputExists {
                path: output.to_path_buf(),
            });
        }

        // An existing file at `output` (possibly the source itself) is only
        // replaced once the new file is complete.
        let staged = self.stage(source, output)?;
        self.retag(source, fields, cover, staged.path())?;
        self.commit(staged, output)?;

        debug!(path = %output.display(), fields = fields.len(), "Output written");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Smallest PNG header `infer` recognises.
    pub(crate) const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, b'I', b'H', b'D', b'R',
    ];

    /// A FLAC stream holding only a STREAMINFO block.
    pub(crate) fn minimal_flac() -> Vec<u8> {
        let mut bytes = b"fLaC".to_vec();
        // last-metadata-block flag, type 0 (STREAMINFO), length 34
        bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        // 44.1 kHz, 2 channels, 16 bits, unknown sample count
        let packed: u64 = (44_100u64 << 44) | (1 << 41) | (15 << 36);
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0; 16]);
        bytes
    }

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn source_with_tags(dir: &Path) -> PhysicalEntry {
        let path = dir.join("01 source.flac");
        fs::write(&path, minimal_flac()).unwrap();
        let mut tag = metaflac::Tag::read_from_path(&path).unwrap();
        tag.set_vorbis("TITLE", vec!["Old Title"]);
        tag.set_vorbis("RIPPER", vec!["someone"]);
        tag.add_picture("image/png", PictureType::CoverFront, PNG_BYTES.to_vec());
        tag.write_to_path(&path).unwrap();
        PhysicalEntry::file(path)
    }

    #[test]
    fn test_write_replaces_tags() {
        let temp = TempDir::new().unwrap();
        let source = source_with_tags(temp.path());
        let output = temp.path().join("out/Discovery/01. Daft Punk - One More Time.flac");

        FlacTagWriter::new()
            .write_tags(
                &source,
                &fields(&[("TITLE", "One More Time"), ("ARTIST", "Daft Punk"), ("TRACKNUMBER", "1")]),
                None,
                &output,
            )
            .unwrap();

        let tag = metaflac::Tag::read_from_path(&output).unwrap();
        let title: Vec<&str> = tag.get_vorbis("TITLE").unwrap().collect();
        assert_eq!(title, vec!["One More Time"]);
        assert!(tag.get_vorbis("RIPPER").is_none());
        assert_eq!(tag.pictures().count(), 0);
    }

    #[test]
    fn test_write_embeds_cover() {
        let temp = TempDir::new().unwrap();
        let source = source_with_tags(temp.path());
        let output = temp.path().join("01.flac.out");
        let cover = CoverImage {
            mime_type: "image/jpeg".to_string(),
            data: b"jpeg bytes".to_vec(),
        };

        FlacTagWriter::new()
            .write_tags(&source, &fields(&[("TITLE", "x")]), Some(&cover), &output)
            .unwrap();

        let tag = metaflac::Tag::read_from_path(&output).unwrap();
        let pictures: Vec<_> = tag.pictures().collect();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].picture_type, PictureType::CoverFront);
        assert_eq!(pictures[0].data, b"jpeg bytes");
    }

    #[test]
    fn test_existing_output_kept_unless_overwrite() {
        let temp = TempDir::new().unwrap();
        let source = source_with_tags(temp.path());
        let output = temp.path().join("taken.flac");
        fs::write(&output, b"keep me").unwrap();

        let err = FlacTagWriter::new()
            .write_tags(&source, &fields(&[]), None, &output)
            .unwrap_err();
        assert!(matches!(err, WriteError::OutputExists { .. }));
        assert_eq!(fs::read(&output).unwrap(), b"keep me");

        FlacTagWriter::new()
            .with_overwrite(true)
            .write_tags(&source, &fields(&[("TITLE", "new")]), None, &output)
            .unwrap();
        assert!(metaflac::Tag::read_from_path(&output).is_ok());
    }

    #[test]
    fn test_overwrite_onto_source_retags_in_place() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("01. Someone - Intro.flac");
        fs::write(&path, minimal_flac()).unwrap();
        let source = PhysicalEntry::file(path.clone());

        FlacTagWriter::new()
            .with_overwrite(true)
            .write_tags(&source, &fields(&[("TITLE", "Intro")]), None, &path)
            .unwrap();

        let tag = metaflac::Tag::read_from_path(&path).unwrap();
        let title: Vec<&str> = tag.get_vorbis("TITLE").unwrap().collect();
        assert_eq!(title, vec!["Intro"]);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_overwrite_keeps_existing_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("01 broken.flac");
        fs::write(&path, b"not flac at all").unwrap();
        let output = temp.path().join("taken.flac");
        fs::write(&output, b"keep me").unwrap();

        let err = FlacTagWriter::new()
            .with_overwrite(true)
            .write_tags(&PhysicalEntry::file(path), &fields(&[]), None, &output)
            .unwrap_err();
        assert!(matches!(err, WriteError::InvalidFlac { .. }));
        assert_eq!(fs::read(&output).unwrap(), b"keep me");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_invalid_source_leaves_no_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("01 broken.flac");
        fs::write(&path, b"not flac at all").unwrap();
        let output = temp.path().join("out.flac");

        let err = FlacTagWriter::new()
            .write_tags(&PhysicalEntry::file(path), &fields(&[]), None, &output)
            .unwrap_err();
        assert!(matches!(err, WriteError::InvalidFlac { .. }));
        assert!(!output.exists());
    }
}
