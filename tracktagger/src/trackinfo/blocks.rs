//! Field propagation: folding directives into disc blocks.
//!
//! Every `INPUT` directive starts a new [`DiscBlock`]. Within a block,
//! unindexed directives set block-wide defaults (last write wins) and
//! indexed directives override a single track. A track's effective value
//! for a field is its override if present, otherwise the block default.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use super::error::{TrackInfoError, TrackInfoResult};
use super::parser::Directive;
use super::{is_standard_field, COVER, DISCNUMBER, INPUT, STRUCTURAL_FIELDS};

/// The directives belonging to one `INPUT` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscBlock {
    /// Raw `INPUT` value.
    pub input_spec: String,

    /// Line of the `INPUT` directive.
    pub input_line: usize,

    /// Disc number; 1 when a single block never sets it.
    pub disc_number: u32,

    /// Raw `COVER` value, if any.
    pub cover_spec: Option<String>,

    /// Line of the `COVER` directive that set `cover_spec`.
    pub cover_line: Option<usize>,

    /// Block-wide field values (last write wins).
    pub global_fields: BTreeMap<String, String>,

    /// Per-track overrides keyed by `(field, track)`.
    pub per_track_fields: BTreeMap<(String, u32), String>,

    /// Fields explicitly emptied for a single track with `FIELD[n]=`.
    pub cleared_fields: BTreeSet<(String, u32)>,
}

impl DiscBlock {
    /// Track numbers this block expects, ascending.
    ///
    /// Any indexed directive makes its index an expected track.
    pub fn track_numbers(&self) -> BTreeSet<u32> {
        self.per_track_fields
            .keys()
            .chain(self.cleared_fields.iter())
            .map(|(_, track)| *track)
            .collect()
    }

    /// Effective fields for `track`, structural fields excluded.
    pub fn effective_fields(&self, track: u32) -> BTreeMap<String, String> {
        let mut fields: BTreeMap<String, String> = self
            .global_fields
            .iter()
            .filter(|(field, _)| field.as_str() != INPUT && field.as_str() != COVER)
            .filter(|(field, _)| !self.cleared_fields.contains(&(field.to_string(), track)))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        for ((field, n), value) in &self.per_track_fields {
            if *n == track {
                fields.insert(field.clone(), value.clone());
            }
        }
        fields
    }

    /// Effective value of a single field for `track`.
    pub fn field(&self, field: &str, track: u32) -> Option<&str> {
        if let Some(value) = self.per_track_fields.get(&(field.to_string(), track)) {
            return Some(value);
        }
        if self.cleared_fields.contains(&(field.to_string(), track)) {
            return None;
        }
        self.global_fields.get(field).map(String::as_str)
    }
}

/// Block under construction.
///
/// Each block owns its accumulator; nothing carries over between blocks.
#[derive(Debug)]
struct BlockAccumulator {
    input_spec: String,
    input_line: usize,
    disc_number: Option<u32>,
    cover_spec: Option<String>,
    cover_line: Option<usize>,
    global_fields: BTreeMap<String, String>,
    per_track_fields: BTreeMap<(String, u32), String>,
    cleared_fields: BTreeSet<(String, u32)>,
}

impl BlockAccumulator {
    fn open(input: &Directive) -> TrackInfoResult<Self> {
        if input.value.is_empty() {
            return Err(TrackInfoError::EmptyInput { line: input.line });
        }
        Ok(Self {
            input_spec: input.value.clone(),
            input_line: input.line,
            disc_number: None,
            cover_spec: None,
            cover_line: None,
            global_fields: BTreeMap::new(),
            per_track_fields: BTreeMap::new(),
            cleared_fields: BTreeSet::new(),
        })
    }

    fn apply(&mut self, directive: &Directive) -> TrackInfoResult<()> {
        if let Some(track) = directive.index {
            return self.apply_track(directive, track);
        }

        let field = directive.field.as_str();
        if directive.value.is_empty() {
            self.global_fields.remove(field);
            match field {
                COVER => {
                    self.cover_spec = None;
                    self.cover_line = None;
                }
                DISCNUMBER => self.disc_number = None,
                _ => {}
            }
            return Ok(());
        }

        let value = match field {
            DISCNUMBER => {
                let disc = parse_disc_number(directive)?;
                self.disc_number = Some(disc);
                disc.to_string()
            }
            COVER => {
                self.cover_spec = Some(directive.value.clone());
                self.cover_line = Some(directive.line);
                directive.value.clone()
            }
            _ => directive.value.clone(),
        };
        self.global_fields.insert(directive.field.clone(), value);
        Ok(())
    }

    fn apply_track(&mut self, directive: &Directive, track: u32) -> TrackInfoResult<()> {
        if STRUCTURAL_FIELDS.contains(&directive.field.as_str()) {
            return Err(TrackInfoError::IndexedStructuralField {
                line: directive.line,
                field: directive.field.clone(),
            });
        }
        let key = (directive.field.clone(), track);
        if directive.value.is_empty() {
            self.per_track_fields.remove(&key);
            self.cleared_fields.insert(key);
        } else {
            self.cleared_fields.remove(&key);
            self.per_track_fields.insert(key, directive.value.clone());
        }
        Ok(())
    }

    fn finish(self, disc_number: u32) -> DiscBlock {
        DiscBlock {
            input_spec: self.input_spec,
            input_line: self.input_line,
            disc_number,
            cover_spec: self.cover_spec,
            cover_line: self.cover_line,
            global_fields: self.global_fields,
            per_track_fields: self.per_track_fields,
            cleared_fields: self.cleared_fields,
        }
    }
}

fn parse_disc_number(directive: &Directive) -> TrackInfoResult<u32> {
    let invalid = || TrackInfoError::InvalidDiscNumber {
        line: directive.line,
        value: directive.value.clone(),
    };
    if !directive.value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match directive.value.parse::<u32>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(n) => Ok(n),
    }
}

/// Fold a directive sequence into disc blocks.
///
/// # Errors
///
/// - [`TrackInfoError::DiscNumberBeforeInput`] if `DISCNUMBER` precedes every `INPUT`
/// - [`TrackInfoError::MissingInitialInput`] if anything else precedes it
/// - [`TrackInfoError::MissingDiscNumber`] if several blocks exist and one lacks a disc number
/// - [`TrackInfoError::DuplicateDiscNumber`] if two blocks share a disc number
pub fn resolve_blocks(directives: &[Directive]) -> TrackInfoResult<Vec<DiscBlock>> {
    let first = directives.first().ok_or(TrackInfoError::Empty)?;
    if !first.is(INPUT) {
        if let Some(disc) = directives
            .iter()
            .take_while(|d| !d.is(INPUT))
            .find(|d| d.is(DISCNUMBER))
        {
            return Err(TrackInfoError::DiscNumberBeforeInput { line: disc.line });
        }
        return Err(TrackInfoError::MissingInitialInput {
            line: first.line,
            field: first.field.clone(),
        });
    }

    let mut finished: Vec<BlockAccumulator> = Vec::new();
    let mut current = open_block(first)?;

    for directive in &directives[1..] {
        if !is_standard_field(&directive.field) {
            warn!(
                line = directive.line,
                field = %directive.field,
                "Non-standard field passed through"
            );
        }

        if directive.is(INPUT) {
            finished.push(std::mem::replace(&mut current, open_block(directive)?));
        } else {
            current.apply(directive)?;
        }
    }
    finished.push(current);

    assign_disc_numbers(finished)
}

fn open_block(input: &Directive) -> TrackInfoResult<BlockAccumulator> {
    if input.index.is_some() {
        return Err(TrackInfoError::IndexedStructuralField {
            line: input.line,
            field: input.field.clone(),
        });
    }
    BlockAccumulator::open(input)
}

fn assign_disc_numbers(blocks: Vec<BlockAccumulator>) -> TrackInfoResult<Vec<DiscBlock>> {
    let count = blocks.len();
    let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
    let mut out = Vec::with_capacity(count);

    for block in blocks {
        let disc = match block.disc_number {
            Some(disc) => disc,
            None if count == 1 => 1,
            None => {
                return Err(TrackInfoError::MissingDiscNumber {
                    line: block.input_line,
                    blocks: count,
                })
            }
        };
        if let Some(first_line) = seen.insert(disc, block.input_line) {
            return Err(TrackInfoError::DuplicateDiscNumber {
                line: block.input_line,
                disc,
                first_line,
            });
        }
        out.push(block.finish(disc));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trackinfo::parse_directives;

    fn blocks(text: &str) -> TrackInfoResult<Vec<DiscBlock>> {
        resolve_blocks(&parse_directives(text)?)
    }

    #[test]
    fn test_single_block_defaults_to_disc_one() {
        let b = blocks("INPUT=rip\nTITLE[1]=A\nTITLE[2]=B\n").unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].disc_number, 1);
        assert_eq!(b[0].input_spec, "rip");
        assert_eq!(b[0].track_numbers().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_global_then_override() {
        let b = blocks("INPUT=rip\nGENRE=House\nTITLE[1]=A\nTITLE[2]=B\nGENRE[2]=Disco\n")
            .unwrap();
        assert_eq!(b[0].field("GENRE", 1), Some("House"));
        assert_eq!(b[0].field("GENRE", 2), Some("Disco"));
    }

    #[test]
    fn test_last_global_write_wins_for_all_tracks() {
        let b = blocks("INPUT=rip\nGENRE=A\nTITLE[1]=x\nGENRE=B\nTITLE[2]=y\n").unwrap();
        assert_eq!(b[0].field("GENRE", 1), Some("B"));
        assert_eq!(b[0].field("GENRE", 2), Some("B"));
    }

    #[test]
    fn test_effective_fields_exclude_structural() {
        let b = blocks("INPUT=rip\nCOVER=front.jpg\nARTIST=X\nTITLE[1]=A\n").unwrap();
        let fields = b[0].effective_fields(1);
        assert_eq!(fields.get("ARTIST").map(String::as_str), Some("X"));
        assert_eq!(fields.get("TITLE").map(String::as_str), Some("A"));
        assert!(!fields.contains_key("INPUT"));
        assert!(!fields.contains_key("COVER"));
        assert_eq!(b[0].cover_spec.as_deref(), Some("front.jpg"));
        assert_eq!(b[0].cover_line, Some(2));
    }

    #[test]
    fn test_empty_value_clears_global() {
        let b = blocks("INPUT=rip\nCOMMENT=x\nCOMMENT=\nTITLE[1]=A\n").unwrap();
        assert_eq!(b[0].field("COMMENT", 1), None);
    }

    #[test]
    fn test_empty_indexed_value_clears_for_one_track() {
        let b = blocks("INPUT=rip\nARTIST=X\nTITLE[1]=A\nTITLE[2]=B\nARTIST[2]=\n").unwrap();
        assert_eq!(b[0].field("ARTIST", 1), Some("X"));
        assert_eq!(b[0].field("ARTIST", 2), None);
        assert!(!b[0].effective_fields(2).contains_key("ARTIST"));
    }

    #[test]
    fn test_cleared_only_track_is_expected() {
        let b = blocks("INPUT=rip\nTITLE[1]=A\nCOMMENT[3]=\n").unwrap();
        assert_eq!(b[0].track_numbers().into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_blocks_do_not_share_fields() {
        let b = blocks(
            "INPUT=cd1\nDISCNUMBER=1\nGENRE=A\nTITLE[1]=x\nINPUT=cd2\nDISCNUMBER=2\nTITLE[1]=y\n",
        )
        .unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].field("GENRE", 1), Some("A"));
        assert_eq!(b[1].field("GENRE", 1), None);
        assert_eq!(b[1].disc_number, 2);
        assert_eq!(b[1].input_line, 5);
    }

    #[test]
    fn test_discnumber_is_a_field() {
        let b = blocks("INPUT=rip\nDISCNUMBER=03\nTITLE[1]=x\n").unwrap();
        assert_eq!(b[0].disc_number, 3);
        assert_eq!(b[0].field("DISCNUMBER", 1), Some("3"));
    }

    #[test]
    fn test_missing_initial_input() {
        let err = blocks("ALBUM=x\nINPUT=rip\n").unwrap_err();
        assert!(matches!(
            err,
            TrackInfoError::MissingInitialInput { line: 1, ref field } if field == "ALBUM"
        ));
    }

    #[test]
    fn test_discnumber_before_input() {
        let err = blocks("ALBUM=x\nDISCNUMBER=1\nINPUT=rip\n").unwrap_err();
        assert!(matches!(err, TrackInfoError::DiscNumberBeforeInput { line: 2 }));
    }

    #[test]
    fn test_invalid_disc_number() {
        for bad in ["one", "-1", "0", "1.5", "+2"] {
            let err = blocks(&format!("INPUT=rip\nDISCNUMBER={bad}\n")).unwrap_err();
            assert!(matches!(err, TrackInfoError::InvalidDiscNumber { line: 2, .. }));
        }
    }

    #[test]
    fn test_missing_disc_number_with_multiple_blocks() {
        let err = blocks("INPUT=a\nDISCNUMBER=1\nINPUT=b\nTITLE[1]=x\n").unwrap_err();
        assert!(matches!(
            err,
            TrackInfoError::MissingDiscNumber { line: 3, blocks: 2 }
        ));
    }

    #[test]
    fn test_duplicate_disc_number() {
        let err = blocks("INPUT=a\nDISCNUMBER=1\nINPUT=b\nDISCNUMBER=1\n").unwrap_err();
        assert!(matches!(
            err,
            TrackInfoError::DuplicateDiscNumber {
                line: 3,
                disc: 1,
                first_line: 1
            }
        ));
    }

    #[test]
    fn test_indexed_structural_fields_rejected() {
        for text in ["INPUT=a\nINPUT[2]=b\n", "INPUT=a\nCOVER[1]=c.jpg\n", "INPUT=a\nDISCNUMBER[1]=2\n"] {
            let err = blocks(text).unwrap_err();
            assert!(matches!(err, TrackInfoError::IndexedStructuralField { line: 2, .. }));
        }
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = blocks("INPUT=\n").unwrap_err();
        assert!(matches!(err, TrackInfoError::EmptyInput { line: 1 }));
    }

    #[test]
    fn test_no_directives() {
        assert!(matches!(blocks("\n# only a comment\n"), Err(TrackInfoError::Empty)));
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let b = blocks("INPUT=rip\nMOOD=calm\nTITLE[1]=A\n").unwrap();
        assert_eq!(b[0].field("MOOD", 1), Some("calm"));
    }

    #[test]
    fn test_last_cover_wins() {
        let b = blocks("INPUT=x\nCOVER=a.jpg\nTITLE[1]=A\nCOVER=b.jpg\nTITLE[2]=B\n").unwrap();
        assert_eq!(b[0].cover_spec.as_deref(), Some("b.jpg"));
        assert_eq!(b[0].cover_line, Some(4));
    }

    #[test]
    fn test_empty_cover_clears_earlier_cover() {
        let b = blocks("INPUT=x\nCOVER=a.jpg\nCOVER=\nTITLE[1]=A\n").unwrap();
        assert_eq!(b[0].cover_spec, None);
        assert_eq!(b[0].cover_line, None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn field_name() -> impl Strategy<Value = String> {
            "[A-Z]{1,8}".prop_filter("structural field", |f| {
                !STRUCTURAL_FIELDS.contains(&f.as_str()) && f != "TITLE"
            })
        }

        proptest! {
            #[test]
            fn test_override_applies_to_one_track_only(
                field in field_name(),
                earlier in "[a-z]{1,10}",
                global in "[a-z]{1,10}",
                overriding in "[a-z]{1,10}",
                tracks in proptest::collection::btree_set(1u32..50, 1..10),
                pick in any::<prop::sample::Index>()
            ) {
                let tracks: Vec<u32> = tracks.into_iter().collect();
                let target = tracks[pick.index(tracks.len())];

                let mut text = format!("INPUT=x\n{}={}\n", field, earlier);
                for track in &tracks {
                    text.push_str(&format!("TITLE[{}]=t{}\n", track, track));
                }
                text.push_str(&format!("{}[{}]={}\n", field, target, overriding));
                text.push_str(&format!("{}={}\n", field, global));

                let b = blocks(&text).unwrap();
                for track in &tracks {
                    let expected = if *track == target { &overriding } else { &global };
                    prop_assert_eq!(b[0].field(&field, *track), Some(expected.as_str()));
                }
            }
        }
    }
}
