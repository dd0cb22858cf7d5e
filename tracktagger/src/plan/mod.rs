//! Per-track plans: tags, source file, cover and output name.
//!
//! A [`DiscPlan`] is produced for each disc block once its input has been
//! resolved and its tracks matched. Each [`TrackPlan`] carries everything
//! the tag writer needs; nothing is written here.

mod builder;
mod naming;

pub use builder::{check_unique, CoverSource, DiscPlan, PlanBuilder, PlanError, PlanResult, TrackPlan};
pub use naming::{
    album_directory, output_filename, parse_output_filename, sanitize_component, truncate_filename,
    MAX_FILENAME_BYTES, OUTPUT_EXTENSION, UNKNOWN_ALBUM_DIR,
};
