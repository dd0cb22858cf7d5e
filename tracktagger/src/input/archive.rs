//! Archive formats and the capability interface used to read them.
//!
//! Every supported format family implements [`ArchiveReader`]:
//!
//! | Format  | Reader            | Backend                          |
//! |---------|-------------------|----------------------------------|
//! | zip     | [`ZipReader`]     | `zip` crate, file or in-memory   |
//! | rar, 7z | [`ExtractedReader`] | external tool, unpacked to a temp dir |
//!
//! [`open_archive`] picks the reader for a detected [`ArchiveFormat`].
//! Entry names are normalised to `/`-separated relative paths without a
//! trailing slash.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use tracing::debug;

use super::error::{ResolveError, ResolveResult};
use super::extractor::ArchiveExtractor;

/// Folder created by macOS archivers next to the real content.
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// Number of leading bytes read for signature detection.
pub(crate) const SIGNATURE_LEN: usize = 16;

/// Upper bound on buffer space reserved from an entry's declared size.
const MAX_PREALLOC: usize = 64 << 20;

/// Archive formats recognised while walking an input path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Read natively.
    Zip,
    /// Delegated to `unrar`.
    Rar,
    /// Delegated to `7za`.
    SevenZip,
}

impl ArchiveFormat {
    /// Detect a format from a file name's extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            "7z" => Some(Self::SevenZip),
            _ => None,
        }
    }

    /// Detect a format from the leading bytes of a file.
    pub fn from_signature(head: &[u8]) -> Option<Self> {
        if infer::archive::is_zip(head) {
            Some(Self::Zip)
        } else if infer::archive::is_rar(head) {
            Some(Self::Rar)
        } else if infer::archive::is_7z(head) {
            Some(Self::SevenZip)
        } else {
            None
        }
    }

    /// Detect the format of a file on disk, by extension then by signature.
    ///
    /// Signatures are only consulted when `sniff` is set.
    pub fn detect_file(path: &Path, sniff: bool) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        if let Some(format) = Self::from_name(&name) {
            return Some(format);
        }
        if !sniff {
            return None;
        }
        let mut head = Vec::with_capacity(SIGNATURE_LEN);
        File::open(path)
            .and_then(|f| f.take(SIGNATURE_LEN as u64).read_to_end(&mut head))
            .ok()?;
        Self::from_signature(&head)
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::SevenZip => "7z",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One entry of an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalised path inside the archive.
    pub name: String,
    /// True for explicit directory entries.
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Immediate children of a directory inside an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    pub dirs: BTreeSet<String>,
    pub files: BTreeSet<String>,
}

impl Children {
    /// The single folder name, if this level holds exactly one folder and no files.
    pub fn sole_dir(&self) -> Option<&str> {
        if self.files.is_empty() && self.dirs.len() == 1 {
            self.dirs.iter().next().map(String::as_str)
        } else {
            None
        }
    }
}

/// Compute the immediate children of `prefix` (`""` or `"a/b/"`).
///
/// Directories implied by deeper file names count as children even
/// without an explicit directory entry.
pub fn children(entries: &[ArchiveEntry], prefix: &str) -> Children {
    let mut out = Children::default();
    for entry in entries {
        let Some(rest) = entry.name.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            Some((head, _)) => {
                out.dirs.insert(head.to_string());
            }
            None if entry.is_dir => {
                out.dirs.insert(rest.to_string());
            }
            None => {
                out.files.insert(rest.to_string());
            }
        }
    }
    out
}

/// Normalise a raw entry name; `None` for names that should be hidden.
pub(crate) fn normalize_entry_name(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    match parts.first() {
        None => None,
        Some(&MACOS_METADATA_DIR) => None,
        Some(_) => Some(parts.join("/")),
    }
}

/// Read access to the entries of one opened archive.
///
/// Implementations are shared between the resolver, the matcher and the
/// tag writers, so they must be usable from several threads at once.
pub trait ArchiveReader: Send + Sync + fmt::Debug {
    /// Format of the underlying archive.
    fn format(&self) -> ArchiveFormat;

    /// Human-readable location, e.g. `/music/rip.zip` or `/music/rip.zip!/inner.zip`.
    fn location(&self) -> &str;

    /// All entries, in archive order.
    fn list_entries(&self) -> &[ArchiveEntry];

    /// Read a file entry completely.
    fn read_entry(&self, name: &str) -> ResolveResult<Vec<u8>>;

    /// Open a file entry as a byte stream.
    fn open_entry(&self, name: &str) -> ResolveResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.read_entry(name)?)))
    }

    /// Immediate children of a directory prefix.
    fn children(&self, prefix: &str) -> Children {
        children(self.list_entries(), prefix)
    }

    /// Display form of an entry's location.
    fn entry_location(&self, name: &str) -> String {
        format!("{}!/{}", self.location(), name)
    }
}

/// Where an archive's bytes come from.
#[derive(Debug)]
pub enum ArchiveInput {
    /// An archive file on disk.
    Path(PathBuf),
    /// An archive nested in another archive, already read into memory.
    Bytes { location: String, bytes: Vec<u8> },
}

impl ArchiveInput {
    /// Display form of the archive location.
    pub fn location(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { location, .. } => location.clone(),
        }
    }
}

/// Open an archive with the reader for `format`.
pub fn open_archive(
    input: ArchiveInput,
    format: ArchiveFormat,
    extractor: &dyn ArchiveExtractor,
) -> ResolveResult<Arc<dyn ArchiveReader>> {
    debug!(location = %input.location(), %format, "Opening archive");
    match format {
        ArchiveFormat::Zip => Ok(Arc::new(ZipReader::open(input)?)),
        ArchiveFormat::Rar | ArchiveFormat::SevenZip => Ok(Arc::new(ExtractedReader::extract(
            input, format, extractor,
        )?)),
    }
}

/// Seekable byte source behind a [`ZipReader`].
enum ZipBacking {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl Read for ZipBacking {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.read(buf),
            Self::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for ZipBacking {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(f) => f.seek(pos),
            Self::Memory(c) => c.seek(pos),
        }
    }
}

/// Native zip reader.
pub struct ZipReader {
    location: String,
    archive: Mutex<zip::ZipArchive<ZipBacking>>,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ZipReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipReader")
            .field("location", &self.location)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ZipReader {
    /// Open a zip archive and read its central directory.
    pub fn open(input: ArchiveInput) -> ResolveResult<Self> {
        let location = input.location();
        let backing = match input {
            ArchiveInput::Path(path) => {
                let file = File::open(&path).map_err(|e| ResolveError::open_failed(&location, e))?;
                ZipBacking::File(BufReader::new(file))
            }
            ArchiveInput::Bytes { bytes, .. } => ZipBacking::Memory(Cursor::new(bytes)),
        };
        let mut archive =
            zip::ZipArchive::new(backing).map_err(|e| ResolveError::open_failed(&location, e))?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut index = HashMap::new();
        for i in 0..archive.len() {
            let (raw, is_dir) = {
                let file = archive
                    .by_index_raw(i)
                    .map_err(|e| ResolveError::open_failed(&location, e))?;
                (file.name().to_string(), file.is_dir())
            };
            let Some(name) = normalize_entry_name(&raw) else {
                continue;
            };
            if is_dir {
                entries.push(ArchiveEntry::dir(name));
            } else {
                index.insert(name.clone(), i);
                entries.push(ArchiveEntry::file(name));
            }
        }

        debug!(location = %location, entries = entries.len(), "Zip archive opened");
        Ok(Self {
            location,
            archive: Mutex::new(archive),
            entries,
            index,
        })
    }
}

impl ArchiveReader for ZipReader {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn list_entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn read_entry(&self, name: &str) -> ResolveResult<Vec<u8>> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| ResolveError::InputPathNotFound {
                context: self.location.clone(),
                segment: name.to_string(),
            })?;

        let mut archive = self.archive.lock();
        let mut file = archive
            .by_index(i)
            .map_err(|e| ResolveError::read(self.entry_location(name), io::Error::other(e)))?;
        let capacity = usize::try_from(file.size()).unwrap_or(usize::MAX).min(MAX_PREALLOC);
        let mut buf = Vec::with_capacity(capacity);
        file.read_to_end(&mut buf)
            .map_err(|e| ResolveError::read(self.entry_location(name), e))?;
        Ok(buf)
    }
}

/// Reader for formats unpacked by an external tool.
///
/// The archive is extracted once into a temporary directory which lives
/// as long as the reader.
#[derive(Debug)]
pub struct ExtractedReader {
    format: ArchiveFormat,
    location: String,
    dir: TempDir,
    entries: Vec<ArchiveEntry>,
}

impl ExtractedReader {
    /// Extract `input` with `extractor` and index the result.
    pub fn extract(
        input: ArchiveInput,
        format: ArchiveFormat,
        extractor: &dyn ArchiveExtractor,
    ) -> ResolveResult<Self> {
        let location = input.location();
        let dir = tempfile::Builder::new()
            .prefix("tracktagger-")
            .tempdir()
            .map_err(|e| ResolveError::open_failed(&location, e))?;

        match input {
            ArchiveInput::Path(path) => extractor.extract(format, &path, dir.path())?,
            ArchiveInput::Bytes { bytes, .. } => {
                // External tools need a real file to work on.
                let mut staged = tempfile::Builder::new()
                    .prefix("tracktagger-")
                    .suffix(&format!(".{}", format.extension()))
                    .tempfile()
                    .map_err(|e| ResolveError::open_failed(&location, e))?;
                staged
                    .write_all(&bytes)
                    .and_then(|_| staged.flush())
                    .map_err(|e| ResolveError::open_failed(&location, e))?;
                extractor.extract(format, staged.path(), dir.path())?;
            }
        }

        let mut entries = Vec::new();
        list_extracted(dir.path(), dir.path(), &mut entries)
            .map_err(|e| ResolveError::open_failed(&location, e))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(location = %location, entries = entries.len(), "Archive extracted");
        Ok(Self {
            format,
            location,
            dir,
            entries,
        })
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        name.split('/')
            .fold(self.dir.path().to_path_buf(), |path, part| path.join(part))
    }
}

/// Recursively list extracted files relative to `root`.
fn list_extracted(root: &Path, dir: &Path, entries: &mut Vec<ArchiveEntry>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path
            .strip_prefix(root)
            .ok()
            .and_then(|rel| normalize_entry_name(&rel.to_string_lossy()))
        else {
            continue;
        };
        if path.is_dir() {
            entries.push(ArchiveEntry::dir(name));
            list_extracted(root, &path, entries)?;
        } else if path.is_file() {
            entries.push(ArchiveEntry::file(name));
        }
    }
    Ok(())
}

impl ArchiveReader for ExtractedReader {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn list_entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn read_entry(&self, name: &str) -> ResolveResult<Vec<u8>> {
        fs::read(self.entry_path(name)).map_err(|e| ResolveError::read(self.entry_location(name), e))
    }

    fn open_entry(&self, name: &str) -> ResolveResult<Box<dyn Read + Send>> {
        let file = File::open(self.entry_path(name))
            .map_err(|e| ResolveError::read(self.entry_location(name), e))?;
        Ok(Box::new(BufReader::new(file)))
    }
}
