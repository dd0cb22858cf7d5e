//! Segment-by-segment resolution of `INPUT` and `COVER` paths.
//!
//! A path is walked one segment at a time from its base. Each segment is
//! looked up in the current context, which is either a filesystem directory
//! or a folder inside an opened archive. A segment naming an archive file
//! opens it and continues inside; this nests to any depth.
//!
//! Right after an archive is opened, single top-level folders are
//! unwrapped: while a level holds exactly one folder and no files, the
//! resolver descends into it. A segment not found at the deepest unwrapped
//! level is retried at each shallower one, so spelling out the container
//! folder still works.
//!
//! `..` drops the last folder; at an archive's root it leaves the archive.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::archive::{open_archive, ArchiveFormat, ArchiveInput, ArchiveReader, SIGNATURE_LEN};
use super::entry::PhysicalEntry;
use super::error::{ResolveError, ResolveResult};
use super::extractor::{ArchiveExtractor, ShellExtractor};

/// One archive on the way from the base path to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayer {
    /// Display location, e.g. `/music/rip.zip!/Discs/cd1.zip`.
    pub location: String,
    /// Format used to open it.
    pub format: ArchiveFormat,
}

/// Current position inside an opened archive.
#[derive(Debug, Clone)]
struct ArchiveFrame {
    layer: ArchiveLayer,
    reader: Arc<dyn ArchiveReader>,
    /// Name of the archive in the enclosing context.
    entry: String,
    /// Folder prefixes reached by unwrapping on open, shallowest first.
    root_levels: Vec<String>,
    /// Prefixes searched for the next segment, shallowest first.
    levels: Vec<String>,
}

impl ArchiveFrame {
    fn prefix(&self) -> &str {
        self.levels.last().map(String::as_str).unwrap_or("")
    }

    fn location(&self) -> String {
        self.reader.entry_location(self.prefix())
    }

    fn is_at_root(&self) -> bool {
        self.levels == self.root_levels
    }

    fn lookup(&self, segment: &str) -> Option<(String, Found)> {
        self.levels.iter().rev().find_map(|level| {
            let children = self.reader.children(level);
            if children.dirs.contains(segment) {
                Some((level.clone(), Found::Dir))
            } else if children.files.contains(segment) {
                Some((level.clone(), Found::File))
            } else {
                None
            }
        })
    }

    fn descend(&mut self, prefix: String) {
        self.levels = vec![prefix];
    }

    fn ascend(&mut self) {
        let parent = self
            .prefix()
            .trim_end_matches('/')
            .rsplit_once('/')
            .map(|(parent, _)| format!("{}/", parent))
            .unwrap_or_default();
        if self.root_levels.contains(&parent) {
            self.levels = self.root_levels.clone();
        } else {
            self.levels = vec![parent];
        }
    }
}

#[derive(Debug, Clone)]
enum Frame {
    Dir(PathBuf),
    Archive(ArchiveFrame),
}

#[derive(Debug, Clone, Copy)]
enum Found {
    Dir,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Input,
    Cover,
}

enum Walked {
    Location(Vec<Frame>),
    File(PhysicalEntry),
}

/// A resolved `INPUT`: a directory on disk or a folder inside a chain of
/// archives.
///
/// Holds the opened archives; they are released when this is dropped.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    spec: String,
    // First frame is always a directory.
    frames: Vec<Frame>,
}

impl ResolvedInput {
    /// Filesystem path where the walk ended or left the filesystem.
    pub fn base_path(&self) -> PathBuf {
        let dir = match self.frames.first() {
            Some(Frame::Dir(dir)) => dir.clone(),
            _ => PathBuf::new(),
        };
        match self.frames.get(1) {
            Some(Frame::Archive(frame)) => dir.join(&frame.entry),
            _ => dir,
        }
    }

    /// Archives opened on the way, outermost first.
    pub fn archive_chain(&self) -> Vec<&ArchiveLayer> {
        self.frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Archive(frame) => Some(&frame.layer),
                Frame::Dir(_) => None,
            })
            .collect()
    }

    /// Folder inside the innermost archive, without trailing slash.
    pub fn inner_path(&self) -> &str {
        match self.frames.last() {
            Some(Frame::Archive(frame)) => frame.prefix().trim_end_matches('/'),
            _ => "",
        }
    }

    /// True if the input lives inside at least one archive.
    pub fn is_archive_backed(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Archive(_)))
    }

    /// Display form of the resolved location.
    pub fn location(&self) -> String {
        match self.frames.last() {
            Some(Frame::Archive(frame)) => frame.location(),
            Some(Frame::Dir(dir)) => dir.display().to_string(),
            None => self.spec.clone(),
        }
    }

    /// Files directly inside the input, sorted by name.
    pub fn entries(&self) -> ResolveResult<Vec<PhysicalEntry>> {
        match self.frames.last() {
            Some(Frame::Archive(frame)) => {
                let prefix = frame.prefix();
                Ok(frame
                    .reader
                    .children(prefix)
                    .files
                    .into_iter()
                    .map(|name| PhysicalEntry::archived(frame.reader.clone(), format!("{}{}", prefix, name)))
                    .collect())
            }
            Some(Frame::Dir(dir)) => {
                let listing = std::fs::read_dir(dir).map_err(|e| ResolveError::read(self.location(), e))?;
                let mut paths = Vec::new();
                for entry in listing {
                    let path = entry.map_err(|e| ResolveError::read(self.location(), e))?.path();
                    if path.is_file() {
                        paths.push(path);
                    }
                }
                paths.sort();
                Ok(paths.into_iter().map(PhysicalEntry::file).collect())
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Resolves `INPUT` and `COVER` values to directories, archives and files.
#[derive(Debug, Clone)]
pub struct InputResolver {
    extractor: Arc<dyn ArchiveExtractor>,
}

impl Default for InputResolver {
    fn default() -> Self {
        Self::new(Arc::new(ShellExtractor::default()))
    }
}

impl InputResolver {
    /// Create a resolver that delegates non-native archives to `extractor`.
    pub fn new(extractor: Arc<dyn ArchiveExtractor>) -> Self {
        Self { extractor }
    }

    /// Resolve an `INPUT` value. Relative values start at `base_dir`.
    pub fn resolve_input(&self, spec: &str, base_dir: &Path) -> ResolveResult<ResolvedInput> {
        let (root, segments) = split_spec(spec);
        let start = root.unwrap_or_else(|| base_dir.to_path_buf());
        debug!(input = %spec, base = %start.display(), "Resolving input");

        match self.walk(vec![Frame::Dir(start)], &segments, Target::Input)? {
            Walked::Location(frames) => Ok(ResolvedInput {
                spec: spec.to_string(),
                frames,
            }),
            Walked::File(entry) => Err(ResolveError::InputNotADirectory {
                location: entry.location(),
            }),
        }
    }

    /// Resolve a `COVER` value. Relative values start at the resolved
    /// input, inside its archives if it has any.
    pub fn resolve_cover(&self, spec: &str, input: &ResolvedInput) -> ResolveResult<PhysicalEntry> {
        let (root, segments) = split_spec(spec);
        let frames = match root {
            Some(root) => vec![Frame::Dir(root)],
            None => input.frames.clone(),
        };
        debug!(cover = %spec, input = %input.location(), "Resolving cover");

        match self.walk(frames, &segments, Target::Cover)? {
            Walked::File(entry) => Ok(entry),
            Walked::Location(frames) => Err(ResolveError::CoverNotAFile {
                location: ResolvedInput {
                    spec: spec.to_string(),
                    frames,
                }
                .location(),
            }),
        }
    }

    fn walk(&self, mut frames: Vec<Frame>, segments: &[String], target: Target) -> ResolveResult<Walked> {
        for (i, segment) in segments.iter().enumerate() {
            if segment == ".." {
                step_up(&mut frames);
                continue;
            }
            let last = i + 1 == segments.len();
            let next_segment = || segments.get(i + 1).cloned().unwrap_or_default();

            let opened = match frames.last_mut() {
                Some(Frame::Dir(dir)) => {
                    let path = dir.join(segment);
                    if path.is_dir() {
                        *dir = path;
                        continue;
                    }
                    if !path.is_file() {
                        return Err(ResolveError::InputPathNotFound {
                            context: dir.display().to_string(),
                            segment: segment.clone(),
                        });
                    }
                    if last && target == Target::Cover {
                        return Ok(Walked::File(PhysicalEntry::file(path)));
                    }
                    match ArchiveFormat::detect_file(&path, true) {
                        Some(format) => self.open(ArchiveInput::Path(path), format, segment)?,
                        None if last => {
                            return Err(ResolveError::InputNotADirectory {
                                location: path.display().to_string(),
                            })
                        }
                        None => {
                            return Err(ResolveError::InputPathNotFound {
                                context: path.display().to_string(),
                                segment: next_segment(),
                            })
                        }
                    }
                }
                Some(Frame::Archive(frame)) => {
                    let Some((level, found)) = frame.lookup(segment) else {
                        return Err(ResolveError::InputPathNotFound {
                            context: frame.location(),
                            segment: segment.clone(),
                        });
                    };
                    let name = format!("{}{}", level, segment);
                    if let Found::Dir = found {
                        frame.descend(format!("{}/", name));
                        continue;
                    }
                    if last && target == Target::Cover {
                        return Ok(Walked::File(PhysicalEntry::archived(frame.reader.clone(), name)));
                    }

                    let location = frame.reader.entry_location(&name);
                    let format = match ArchiveFormat::from_name(segment) {
                        Some(format) => Some(format),
                        None => sniff_entry(frame.reader.as_ref(), &name)?,
                    };
                    match format {
                        Some(format) => {
                            let bytes = frame.reader.read_entry(&name)?;
                            self.open(ArchiveInput::Bytes { location, bytes }, format, segment)?
                        }
                        None if last => return Err(ResolveError::InputNotADirectory { location }),
                        None => {
                            return Err(ResolveError::InputPathNotFound {
                                context: location,
                                segment: next_segment(),
                            })
                        }
                    }
                }
                None => {
                    return Err(ResolveError::InputPathNotFound {
                        context: String::new(),
                        segment: segment.clone(),
                    })
                }
            };
            frames.push(Frame::Archive(opened));
        }

        Ok(Walked::Location(frames))
    }

    fn open(&self, input: ArchiveInput, format: ArchiveFormat, entry: &str) -> ResolveResult<ArchiveFrame> {
        let reader = open_archive(input, format, self.extractor.as_ref())?;
        let root_levels = unwrap_containers(reader.as_ref());
        Ok(ArchiveFrame {
            layer: ArchiveLayer {
                location: reader.location().to_string(),
                format,
            },
            reader,
            entry: entry.to_string(),
            levels: root_levels.clone(),
            root_levels,
        })
    }
}

/// Follow single-folder levels down from an archive's root.
fn unwrap_containers(reader: &dyn ArchiveReader) -> Vec<String> {
    let mut levels = vec![String::new()];
    loop {
        let prefix = levels.last().map(String::as_str).unwrap_or("");
        let Some(dir) = reader.children(prefix).sole_dir().map(str::to_string) else {
            break;
        };
        debug!(archive = %reader.location(), folder = %dir, "Unwrapping container folder");
        let next = format!("{}{}/", prefix, dir);
        levels.push(next);
    }
    levels
}

fn step_up(frames: &mut Vec<Frame>) {
    let leave = match frames.last_mut() {
        Some(Frame::Archive(frame)) if frame.is_at_root() => true,
        Some(Frame::Archive(frame)) => {
            frame.ascend();
            false
        }
        Some(Frame::Dir(dir)) => {
            dir.pop();
            false
        }
        None => false,
    };
    if leave {
        frames.pop();
    }
}

fn sniff_entry(reader: &dyn ArchiveReader, name: &str) -> ResolveResult<Option<ArchiveFormat>> {
    let mut head = Vec::with_capacity(SIGNATURE_LEN);
    reader
        .open_entry(name)?
        .take(SIGNATURE_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| ResolveError::read(reader.entry_location(name), e))?;
    Ok(ArchiveFormat::from_signature(&head))
}

/// Split a path value into an optional filesystem root and its segments.
fn split_spec(spec: &str) -> (Option<PathBuf>, Vec<String>) {
    let mut root: Option<PathBuf> = None;
    let mut segments = Vec::new();
    for component in Path::new(spec).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                root.get_or_insert_with(PathBuf::new).push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => segments.push("..".to_string()),
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
        }
    }
    (root, segments)
}
