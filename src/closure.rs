use alloc::collections::BTreeSet;

use crate::buffer::Buffer;
use crate::common::Feature;
use crate::error::ShapeError;
use crate::face::Font;
use crate::ot::TableIndex;
use crate::plan::ShapePlan;
use crate::unicode::{decompose, CharExt};

// A lookup can only feed lookups applied after it in the same pass, but
// `closure_lookup` implementations are free to be sloppier than that.
// Iterating to a fixpoint covers both.
const MAX_ROUNDS: usize = 32;

/// Computes every glyph that shaping `input` with `features` could produce.
///
/// Starts from the glyphs of the characters, their canonical
/// decompositions and mirrored forms, then closes the set over the GSUB
/// lookups the plan would apply. Used by subsetters; the result is a
/// superset of what any single shaping call emits.
pub fn glyphs_closure(font: &Font, input: &str, features: &[Feature]) -> Result<BTreeSet<u32>, ShapeError> {
    let mut buffer = Buffer::new();
    buffer.push_str(input);
    buffer.guess_segment_properties();

    let plan = ShapePlan::new(font, &buffer.segment_properties(), features)?;

    let mut glyphs = BTreeSet::new();
    for c in input.chars() {
        add_char(font, c, &mut glyphs);
    }

    let lookups = plan.ot_map.lookups(TableIndex::GSUB);
    for round in 0..MAX_ROUNDS {
        let before = glyphs.len();
        for lookup in lookups {
            font.layout.closure_lookup(lookup.index, &mut glyphs);
        }

        if glyphs.len() == before {
            log::debug!("glyph closure settled after {} rounds", round + 1);
            break;
        }
    }

    Ok(glyphs)
}

fn add_char(font: &Font, c: char, glyphs: &mut BTreeSet<u32>) {
    if let Some(glyph) = font.glyph(c) {
        glyphs.insert(glyph);
    }

    if let Some(m) = c.mirrored() {
        if let Some(glyph) = font.glyph(m) {
            glyphs.insert(glyph);
        }
    }

    if let Some((a, b)) = decompose(c) {
        add_char(font, a, glyphs);
        if let Some(b) = b {
            add_char(font, b, glyphs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{FontBackend, GlyphExtents};
    use crate::ot::{LookupEngine, LookupMap};
    use crate::Tag;
    use alloc::vec::Vec;

    struct Backend;

    impl FontBackend for Backend {
        fn units_per_em(&self) -> i32 {
            1000
        }

        fn glyph(&self, c: char, _: Option<char>) -> Option<u32> {
            match c {
                'a' => Some(1),
                'e' => Some(2),
                '\u{0301}' => Some(3),
                _ => None,
            }
        }

        fn glyph_extents(&self, _: u32) -> Option<GlyphExtents> {
            None
        }

        fn glyph_h_advance(&self, _: u32) -> i32 {
            500
        }
    }

    // Lookup 0 maps 1 -> 10, lookup 1 maps 10 -> 11.
    struct Chain;

    impl LookupEngine for Chain {
        fn has_table(&self, table: TableIndex) -> bool {
            table == TableIndex::GSUB
        }

        fn select_script(&self, _: TableIndex, _: &[Tag]) -> Option<(Tag, bool)> {
            Some((Tag::from_bytes(b"DFLT"), false))
        }

        fn select_language(&self, _: TableIndex, _: Tag, _: &[Tag]) -> Option<Tag> {
            None
        }

        fn required_feature(&self, _: TableIndex, _: Tag, _: Option<Tag>) -> Option<(Tag, Vec<u16>)> {
            None
        }

        fn lookups_for_feature(&self, table: TableIndex, _: Tag, _: Option<Tag>, feature: Tag) -> Option<Vec<u16>> {
            match (table, &feature.to_bytes()) {
                (TableIndex::GSUB, b"liga") => Some(alloc::vec![1]),
                (TableIndex::GSUB, b"ccmp") => Some(alloc::vec![0]),
                _ => None,
            }
        }

        fn lookup_would_substitute(&self, _: u16, _: &[u32], _: bool) -> bool {
            false
        }

        fn apply_lookups(&self, _: TableIndex, _: &mut Buffer, _: &[LookupMap]) {}

        fn closure_lookup(&self, index: u16, glyphs: &mut BTreeSet<u32>) {
            let (from, to) = if index == 0 { (1, 10) } else { (10, 11) };
            if glyphs.contains(&from) {
                glyphs.insert(to);
            }
        }
    }

    #[test]
    fn follows_lookup_chains() {
        let font = Font::new(&Backend, &Chain);
        let glyphs = glyphs_closure(&font, "a", &[]).unwrap();
        assert_eq!(glyphs.into_iter().collect::<Vec<_>>(), [1, 10, 11]);
    }

    #[test]
    fn includes_decompositions() {
        let font = Font::new(&Backend, &Chain);
        let glyphs = glyphs_closure(&font, "\u{00E9}", &[]).unwrap();
        assert!(glyphs.contains(&2));
        assert!(glyphs.contains(&3));
    }

    #[test]
    fn disabled_features_are_not_followed() {
        let font = Font::new(&Backend, &Chain);
        let features = ["-liga".parse::<Feature>().unwrap()];
        let glyphs = glyphs_closure(&font, "a", &features).unwrap();
        assert_eq!(glyphs.into_iter().collect::<Vec<_>>(), [1, 10]);
    }
}
