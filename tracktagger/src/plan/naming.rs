//! Output file and directory names.
//!
//! Names follow `[{disc}.]{track:02}[. {ARTIST} - {TITLE}].flac`:
//!
//! - `04. Daft Punk - Within.flac`
//! - `2.07. Yo-Yo Ma - Prélude.flac`
//! - `05. Interlude.flac` (no artist)
//! - `12.flac` (neither)
//!
//! The disc prefix is only used when the run spans several discs.
//!
//! Name policy: `/ \ : * ? " < > |` and control characters become `_`,
//! trailing dots and spaces are trimmed, and names are cut to
//! [`MAX_FILENAME_BYTES`] on a character boundary, keeping the extension.

use regex::Regex;
use std::sync::OnceLock;

use tracing::warn;

/// Longest file name most filesystems accept, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Extension of every output file, with the dot.
pub const OUTPUT_EXTENSION: &str = ".flac";

/// Directory for tracks without an `ALBUM`.
pub const UNKNOWN_ALBUM_DIR: &str = "UnknownAlbum";

const REPLACEMENT: char = '_';

fn is_illegal(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Replace characters that are illegal in file names and trim trailing
/// dots and spaces.
pub fn sanitize_component(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if is_illegal(c) { REPLACEMENT } else { c })
        .collect();
    replaced.trim_end_matches(['.', ' ']).to_string()
}

/// Cut `stem` so that `stem + extension` fits in `max_bytes`.
pub fn truncate_filename(stem: &str, extension: &str, max_bytes: usize) -> String {
    let budget = max_bytes.saturating_sub(extension.len());
    if stem.len() <= budget {
        return format!("{}{}", stem, extension);
    }
    let mut end = budget;
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = format!("{}{}", stem[..end].trim_end_matches(['.', ' ']), extension);
    warn!(original = %stem, truncated = %truncated, "File name truncated");
    truncated
}

/// Output file name for one track.
///
/// `disc` is `Some` only in multi-disc runs.
pub fn output_filename(disc: Option<u32>, track: u32, artist: Option<&str>, title: Option<&str>) -> String {
    let mut stem = match disc {
        Some(disc) => format!("{}.{:02}", disc, track),
        None => format!("{:02}", track),
    };
    match (artist, title) {
        (Some(artist), Some(title)) => {
            stem.push_str(&format!(". {} - {}", artist, title));
        }
        (None, Some(name)) | (Some(name), None) => {
            stem.push_str(&format!(". {}", name));
        }
        (None, None) => {}
    }
    truncate_filename(&sanitize_component(&stem), OUTPUT_EXTENSION, MAX_FILENAME_BYTES)
}

/// Directory name for an album, [`UNKNOWN_ALBUM_DIR`] when unset or blank.
pub fn album_directory(album: Option<&str>) -> String {
    let name = album.map(sanitize_component).unwrap_or_default();
    if name.trim().is_empty() {
        UNKNOWN_ALBUM_DIR.to_string()
    } else {
        name
    }
}

/// Pattern for output file names.
///
/// - Group 1: disc number (multi-disc runs only)
/// - Group 2: track number
fn output_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:([0-9]+)\.)?([0-9]+)(?:\. .*)?\.flac$").unwrap())
}

/// Recover `(disc, track)` from a name produced by [`output_filename`].
pub fn parse_output_filename(name: &str) -> Option<(Option<u32>, u32)> {
    let caps = output_pattern().captures(name)?;
    let disc = match caps.get(1) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    let track = caps.get(2)?.as_str().parse().ok()?;
    Some((disc, track))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_disc_name() {
        assert_eq!(
            output_filename(None, 4, Some("Daft Punk"), Some("Within")),
            "04. Daft Punk - Within.flac"
        );
    }

    #[test]
    fn test_multi_disc_name() {
        assert_eq!(
            output_filename(Some(2), 7, Some("Yo-Yo Ma"), Some("Prélude")),
            "2.07. Yo-Yo Ma - Prélude.flac"
        );
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(output_filename(None, 5, None, Some("Interlude")), "05. Interlude.flac");
        assert_eq!(output_filename(None, 5, Some("Ensemble"), None), "05. Ensemble.flac");
        assert_eq!(output_filename(Some(1), 12, None, None), "1.12.flac");
        assert_eq!(output_filename(None, 123, None, None), "123.flac");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_component("AC/DC: Live?"), "AC_DC_ Live_");
        assert_eq!(sanitize_component("tab\there"), "tab_here");
        assert_eq!(sanitize_component("Trailing... "), "Trailing");
        assert_eq!(
            output_filename(None, 1, Some("A/B"), Some("What?")),
            "01. A_B - What_.flac"
        );
    }

    #[test]
    fn test_truncate_keeps_extension_and_char_boundary() {
        let title = "é".repeat(200);
        let name = output_filename(None, 1, Some("Artist"), Some(&title));
        assert!(name.len() <= MAX_FILENAME_BYTES);
        assert!(name.ends_with(".flac"));
        assert!(name.starts_with("01. Artist - é"));

        assert_eq!(truncate_filename("abcdef", ".flac", 8), "abc.flac");
        assert_eq!(truncate_filename("ab cd", ".flac", 8), "ab.flac");
    }

    #[test]
    fn test_album_directory() {
        assert_eq!(album_directory(Some("Discovery")), "Discovery");
        assert_eq!(album_directory(Some("Live/Dead")), "Live_Dead");
        assert_eq!(album_directory(Some("...")), UNKNOWN_ALBUM_DIR);
        assert_eq!(album_directory(None), UNKNOWN_ALBUM_DIR);
    }

    #[test]
    fn test_parse_output_filename() {
        assert_eq!(parse_output_filename("04. Daft Punk - Within.flac"), Some((None, 4)));
        assert_eq!(parse_output_filename("2.07. Yo-Yo Ma - Prélude.flac"), Some((Some(2), 7)));
        assert_eq!(parse_output_filename("04. 1999.flac"), Some((None, 4)));
        assert_eq!(parse_output_filename("1.12.flac"), Some((Some(1), 12)));
        assert_eq!(parse_output_filename("cover.jpg"), None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_name_round_trip(
                disc in proptest::option::of(1u32..100),
                track in 0u32..1000,
                artist in proptest::option::of("[^\\x00-\\x1f]{1,40}"),
                title in proptest::option::of("[^\\x00-\\x1f]{1,80}")
            ) {
                let name = output_filename(disc, track, artist.as_deref(), title.as_deref());
                prop_assert!(name.len() <= MAX_FILENAME_BYTES);
                prop_assert!(!name.contains('/'));
                prop_assert_eq!(parse_output_filename(&name), Some((disc, track)));
            }
        }
    }
}
