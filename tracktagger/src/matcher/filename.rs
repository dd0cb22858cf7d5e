//! Track number inference from source file names.
//!
//! The first maximal run of ASCII digits in a name is its track number:
//!
//! - `01 - Intro.flac` → 1
//! - `Track12.flac` → 12
//! - `CD2-07 Prélude.flac` → 2 (the first run wins; use per-disc folders)
//! - `cover.jpg` → none

use regex::Regex;
use std::sync::OnceLock;

/// Extension of the audio files considered for matching.
pub const FLAC_EXTENSION: &str = "flac";

fn digits_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+").unwrap())
}

/// Leading track number of `name`, if it has one that fits in a `u32`.
pub fn leading_track_number(name: &str) -> Option<u32> {
    digits_pattern()
        .find(name)
        .and_then(|m| m.as_str().parse().ok())
}

/// True if `name` has a `.flac` extension, in any case.
pub fn is_flac_name(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(FLAC_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_track_number() {
        assert_eq!(leading_track_number("01 - Intro.flac"), Some(1));
        assert_eq!(leading_track_number("Track12.flac"), Some(12));
        assert_eq!(leading_track_number("CD2-07 Prélude.flac"), Some(2));
        assert_eq!(leading_track_number("007.flac"), Some(7));
        assert_eq!(leading_track_number("cover.jpg"), None);
        assert_eq!(leading_track_number("Intro.flac"), None);
    }

    #[test]
    fn test_overflowing_digits_have_no_number() {
        assert_eq!(leading_track_number("99999999999 noise.flac"), None);
    }

    #[test]
    fn test_is_flac_name() {
        assert!(is_flac_name("01.flac"));
        assert!(is_flac_name("01 Intro.FLAC"));
        assert!(!is_flac_name("01.flac.txt"));
        assert!(!is_flac_name("folder.jpg"));
        assert!(!is_flac_name(".flac"));
        assert!(!is_flac_name("flac"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_number_after_non_digit_prefix(
                prefix in "[A-Za-z _-]{0,12}",
                track in 0u32..100_000,
                suffix in "[A-Za-z _.-]{0,20}"
            ) {
                let name = format!("{}{:02}{}", prefix, track, suffix);
                prop_assert_eq!(leading_track_number(&name), Some(track));
            }

            #[test]
            fn test_names_without_digits(name in "[^0-9]{0,40}") {
                prop_assert_eq!(leading_track_number(&name), None);
            }
        }
    }
}
