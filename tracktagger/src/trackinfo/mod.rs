//! TRACKINFO directive files.
//!
//! A TRACKINFO file is a plain-text list of `FIELD=value` and
//! `FIELD[n]=value` lines. Unindexed lines apply to every track of the
//! current disc block, indexed lines to track `n` only:
//!
//! ```text
//! INPUT=Rip.zip/CD1
//! ALBUM=Discovery
//! ARTIST=Daft Punk
//! DISCNUMBER=1
//! TITLE[1]=One More Time
//! TITLE[2]=Aerodynamic
//! ```
//!
//! Parsing happens in two steps: [`parse_directives`] is purely syntactic,
//! [`resolve_blocks`] folds the directives into [`DiscBlock`]s.

mod blocks;
mod error;
mod parser;

use std::fs;
use std::path::{Path, PathBuf};

pub use blocks::{resolve_blocks, DiscBlock};
pub use error::{TrackInfoError, TrackInfoResult};
pub use parser::{parse_directives, parse_line, Directive};

/// Opens a new disc block; names the block's source location.
pub const INPUT: &str = "INPUT";

/// Cover art location for the current block.
pub const COVER: &str = "COVER";

/// Disc number of the current block.
pub const DISCNUMBER: &str = "DISCNUMBER";

/// Track number tag, added to every plan.
pub const TRACKNUMBER: &str = "TRACKNUMBER";

/// Fields understood by the tag writer.
///
/// Other names are passed through with a warning.
pub const STANDARD_FIELDS: &[&str] = &[
    "INPUT",
    "TITLE",
    "ARTIST",
    "LYRICIST",
    "COMPOSER",
    "ARRANGER",
    "ALBUM",
    "DISCNUMBER",
    "GENRE",
    "DATE",
    "LABEL",
    "COMMENT",
    "COVER",
];

/// Fields that steer resolution rather than end up as tags.
pub const STRUCTURAL_FIELDS: &[&str] = &[INPUT, COVER, DISCNUMBER];

/// Returns true if `field` (upper-case) is one of [`STANDARD_FIELDS`].
pub fn is_standard_field(field: &str) -> bool {
    STANDARD_FIELDS.contains(&field)
}

/// A loaded TRACKINFO file.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    /// Location of the TRACKINFO file.
    pub path: PathBuf,

    /// Directory relative `INPUT` values are resolved against.
    pub base_dir: PathBuf,

    /// Disc blocks in file order.
    pub blocks: Vec<DiscBlock>,
}

impl TrackInfo {
    /// Read and parse the TRACKINFO file at `path`.
    pub fn load(path: &Path) -> TrackInfoResult<Self> {
        let path = fs::canonicalize(path).map_err(|e| TrackInfoError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = fs::read_to_string(&path).map_err(|e| TrackInfoError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        Self::parse(&text, path, base_dir)
    }

    /// Parse TRACKINFO text that notionally lives at `path`.
    pub fn parse(text: &str, path: PathBuf, base_dir: PathBuf) -> TrackInfoResult<Self> {
        let directives = parse_directives(text)?;
        let blocks = resolve_blocks(&directives)?;
        Ok(Self {
            path,
            base_dir,
            blocks,
        })
    }

    /// True when more than one distinct disc number appears in the file.
    pub fn is_multi_disc(&self) -> bool {
        let mut discs: Vec<u32> = self.blocks.iter().map(|b| b.disc_number).collect();
        discs.sort_unstable();
        discs.dedup();
        discs.len() > 1
    }

    /// Total number of tracks across all blocks.
    pub fn track_count(&self) -> usize {
        self.blocks.iter().map(|b| b.track_numbers().len()).sum()
    }
}
