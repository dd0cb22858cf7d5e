//! Input location resolution.
//!
//! An `INPUT` value names a directory of tracks, possibly inside one or
//! more archives:
//!
//! ```text
//! INPUT=Rips/Album.zip/Disc 1
//!       ^^^^ filesystem
//!            ^^^^^^^^^ archive, opened natively
//!                      ^^^^^^ folder inside it (after unwrapping "Album Name/")
//! ```
//!
//! [`InputResolver`] walks such a path and produces a [`ResolvedInput`],
//! whose [`entries`](ResolvedInput::entries) are the [`PhysicalEntry`]
//! values handed to the track matcher. `COVER` values are resolved the same
//! way, relative to the input.
//!
//! Zip archives are read in-process. Rar and 7z archives are unpacked by an
//! [`ArchiveExtractor`], by default [`ShellExtractor`].

mod archive;
mod entry;
mod error;
mod extractor;
mod resolver;

pub use archive::{
    children, open_archive, ArchiveEntry, ArchiveFormat, ArchiveInput, ArchiveReader, Children,
    ExtractedReader, ZipReader,
};
pub use entry::{EntrySource, PhysicalEntry};
pub use error::{ResolveError, ResolveResult};
pub use extractor::{ArchiveExtractor, ShellExtractor, DEFAULT_SEVENZIP, DEFAULT_UNRAR};
pub use resolver::{ArchiveLayer, InputResolver, ResolvedInput};

#[cfg(test)]
pub(crate) use archive::tests::zip_bytes;
