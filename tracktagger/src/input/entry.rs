//! Physical source entries.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::archive::ArchiveReader;
use super::error::{ResolveError, ResolveResult};

/// Where an entry's bytes live.
#[derive(Debug, Clone)]
pub enum EntrySource {
    /// A regular file.
    File(PathBuf),
    /// A file inside an opened archive; keeps the archive open.
    Archive {
        reader: Arc<dyn ArchiveReader>,
        name: String,
    },
}

/// A named file that can be opened as a byte stream, wherever it lives.
#[derive(Debug, Clone)]
pub struct PhysicalEntry {
    name: String,
    source: EntrySource,
}

impl PhysicalEntry {
    /// Entry backed by a file on disk.
    pub fn file(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            source: EntrySource::File(path),
        }
    }

    /// Entry at `name` (full path inside the archive) in `reader`.
    pub fn archived(reader: Arc<dyn ArchiveReader>, name: impl Into<String>) -> Self {
        let name = name.into();
        let file_name = name.rsplit('/').next().unwrap_or(&name).to_string();
        Self {
            name: file_name,
            source: EntrySource::Archive { reader, name },
        }
    }

    /// File name, without any directory part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the bytes live.
    pub fn source(&self) -> &EntrySource {
        &self.source
    }

    /// Filesystem path, for entries that are plain files.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            EntrySource::File(path) => Some(path),
            EntrySource::Archive { .. } => None,
        }
    }

    /// True if the name ends in `.ext` (case-insensitive).
    pub fn has_extension(&self, ext: &str) -> bool {
        self.name
            .rsplit_once('.')
            .is_some_and(|(_, e)| e.eq_ignore_ascii_case(ext))
    }

    /// Display form of the full location.
    pub fn location(&self) -> String {
        match &self.source {
            EntrySource::File(path) => path.display().to_string(),
            EntrySource::Archive { reader, name } => reader.entry_location(name),
        }
    }

    /// Open the entry as a byte stream, decompressing as needed.
    pub fn open(&self) -> ResolveResult<Box<dyn Read + Send>> {
        match &self.source {
            EntrySource::File(path) => {
                let file = File::open(path).map_err(|e| ResolveError::read(self.location(), e))?;
                Ok(Box::new(BufReader::new(file)))
            }
            EntrySource::Archive { reader, name } => reader.open_entry(name),
        }
    }

    /// Read the whole entry into memory.
    pub fn read_all(&self) -> ResolveResult<Vec<u8>> {
        match &self.source {
            EntrySource::File(path) => {
                std::fs::read(path).map_err(|e| ResolveError::read(self.location(), e))
            }
            EntrySource::Archive { reader, name } => reader.read_entry(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::archive::tests::zip_bytes;
    use crate::input::archive::{ArchiveInput, ZipReader};
    use tempfile::TempDir;

    #[test]
    fn test_file_entry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("03 Digital Love.FLAC");
        std::fs::write(&path, b"flac").unwrap();

        let entry = PhysicalEntry::file(path.clone());
        assert_eq!(entry.name(), "03 Digital Love.FLAC");
        assert!(entry.has_extension("flac"));
        assert_eq!(entry.path(), Some(path.as_path()));
        assert_eq!(entry.read_all().unwrap(), b"flac");

        let mut text = String::new();
        entry.open().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "flac");
    }

    #[test]
    fn test_archived_entry() {
        let reader: Arc<dyn ArchiveReader> = Arc::new(
            ZipReader::open(ArchiveInput::Bytes {
                location: "rip.zip".to_string(),
                bytes: zip_bytes(&[("CD1/01.flac", b"one")]),
            })
            .unwrap(),
        );
        let entry = PhysicalEntry::archived(reader, "CD1/01.flac");
        assert_eq!(entry.name(), "01.flac");
        assert_eq!(entry.location(), "rip.zip!/CD1/01.flac");
        assert_eq!(entry.path(), None);
        assert_eq!(entry.read_all().unwrap(), b"one");
    }

    #[test]
    fn test_missing_file_read_error() {
        let entry = PhysicalEntry::file(PathBuf::from("/nonexistent/01.flac"));
        assert!(matches!(entry.open(), Err(ResolveError::ReadFailed { .. })));
    }
}
