//! tracktagger - Apply TRACKINFO directive files to FLAC rips
//!
//! This library turns a declarative TRACKINFO file into an ordered plan of
//! per-track metadata and located source files, then hands each plan to a
//! tag writer.
//!
//! The pipeline runs in stages:
//!
//! 1. [`trackinfo`] parses directive lines and folds them into disc blocks
//! 2. [`input`] resolves each block's `INPUT` (and `COVER`) through the
//!    filesystem and any archives along the way
//! 3. [`matcher`] assigns the files found there to track numbers
//! 4. [`plan`] merges fields, sources and covers into [`plan::TrackPlan`]s
//! 5. [`writer`] emits one tagged FLAC file per plan
//!
//! [`pipeline::Pipeline`] drives all of them.

pub mod config;
pub mod input;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod plan;
pub mod trackinfo;
pub mod writer;

/// Version of the tracktagger library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
