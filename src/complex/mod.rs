//! Script-specific shaping.
//!
//! Each script family provides a [`ComplexShaper`]. The plan picks one through
//! [`ShaperKind::categorize`] and keeps a `&'static` reference to it.

use alloc::boxed::Box;
use core::any::Any;

use crate::buffer::Buffer;
use crate::common::{script, Direction, Language, Script, Tag};
use crate::face::Font;
use crate::ot::normalize::{NormalizationMode, NormalizeContext};
use crate::ot::{feature, MapBuilder, TableIndex};
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode;

mod arabic;
mod arabic_fallback;
mod arabic_table;
mod hangul;
mod hebrew;
mod indic;
mod indic_table;
mod khmer;
mod machine;
mod myanmar;
mod syllabic;
mod thai;

#[inline]
pub(crate) const fn rb_flag(x: u32) -> u32 {
    1 << x
}

#[inline]
pub(crate) fn rb_flag_unsafe(x: u32) -> u32 {
    if x < 32 {
        1 << x
    } else {
        0
    }
}

#[inline]
pub(crate) fn rb_flag_range(x: u32, y: u32) -> u32 {
    (x < y) as u32 + rb_flag(y + 1) - rb_flag(x)
}

/// When marks get their advances zeroed, relative to GPOS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ZeroWidthMarks {
    /// Non-spacing marks by general category, before GPOS.
    ByUnicodeEarly,
    /// Non-spacing marks by general category, after GPOS.
    ByUnicodeLate,
    /// GDEF marks, before GPOS.
    ByGdefEarly,
    /// GDEF marks, after GPOS.
    ByGdefLate,
}

/// The hooks a script family can override.
pub(crate) trait ComplexShaper: Sync {
    /// Called during `ShapePlan` construction, before the generic features.
    fn collect_features(&self, _planner: &mut ShapePlanner) {}

    /// Called after the generic features were added.
    fn override_features(&self, _planner: &mut ShapePlanner) {}

    /// Per-plan data, created once the map is compiled.
    fn create_data(&self, _plan: &ShapePlan, _font: &Font) -> Option<Box<dyn Any + Send + Sync>> {
        None
    }

    /// Called with the whole buffer before normalization.
    fn preprocess_text(&self, _plan: &ShapePlan, _font: &Font, _buffer: &mut Buffer) {}

    /// Called with the whole buffer after positioning.
    fn postprocess_glyphs(&self, _plan: &ShapePlan, _font: &Font, _buffer: &mut Buffer) {}

    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::Auto
    }

    /// One level of canonical decomposition.
    fn decompose(&self, _ctx: &NormalizeContext, ab: char) -> Option<(char, Option<char>)> {
        unicode::decompose(ab)
    }

    /// Canonical composition of a starter and a mark.
    fn compose(&self, _ctx: &NormalizeContext, a: char, b: char) -> Option<char> {
        unicode::compose(a, b)
    }

    /// Called with the whole buffer after normalization, while glyph ids
    /// still hold characters.
    fn setup_masks(&self, _plan: &ShapePlan, _font: &Font, _buffer: &mut Buffer) {}

    /// If set, GPOS is only applied when the font selects this script tag.
    fn gpos_tag(&self) -> Option<Tag> {
        None
    }

    /// Reorders a run of marks sharing one combining class.
    fn reorder_marks(&self, _plan: &ShapePlan, _buffer: &mut Buffer, _start: usize, _end: usize) {}

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        Some(ZeroWidthMarks::ByGdefLate)
    }

    /// Whether marks are positioned from glyph extents when GPOS is missing.
    fn fallback_position(&self) -> bool {
        true
    }
}

/// The shaper for scripts without special needs.
pub(crate) struct DefaultShaper;

impl ComplexShaper for DefaultShaper {}

/// The shaper for runs where the font knows nothing about the script and
/// the script's own rules would only do harm.
pub(crate) struct DumberShaper;

impl ComplexShaper for DumberShaper {
    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::Auto
    }

    // Fonts that ship no lookups for the script rarely have a usable GDEF.
    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        Some(ZeroWidthMarks::ByUnicodeLate)
    }

    fn fallback_position(&self) -> bool {
        false
    }
}

static DEFAULT_SHAPER: DefaultShaper = DefaultShaper;
static DUMBER_SHAPER: DumberShaper = DumberShaper;

/// The script families with their own shaper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaperKind {
    /// Generic shaping.
    Default,
    /// Generic shaping without fallback positioning.
    Dumber,
    /// Arabic, Syriac and other joining scripts.
    Arabic,
    /// Hangul syllable composition.
    Hangul,
    /// Hebrew presentation forms.
    Hebrew,
    /// Brahmic scripts of India and Sri Lanka.
    Indic,
    /// Khmer.
    Khmer,
    /// Scripts that only reorder pre-base forms (Javanese, Cham, ...).
    SouthEastAsian,
    /// Myanmar.
    Myanmar,
    /// Myanmar text in the Zawgyi encoding.
    MyanmarZawgyi,
    /// Thai and Lao.
    Thai,
}

impl ShaperKind {
    /// Picks a shaper for the script, given what the font offers for it.
    pub(crate) fn categorize(
        script: Script,
        direction: Direction,
        language: Option<&Language>,
        map: &MapBuilder,
    ) -> ShaperKind {
        if language.is_some_and(Language::is_zawgyi) {
            return ShaperKind::MyanmarZawgyi;
        }

        let gsub_script = map.chosen_script(TableIndex::GSUB);
        let is_dflt_or_latn = gsub_script == Some(Tag::from_bytes(b"DFLT"))
            || gsub_script == Some(Tag::from_bytes(b"latn"));

        match script {
            script::ARABIC | script::SYRIAC | script::MONGOLIAN | script::NKO | script::MANDAIC => {
                // Without GSUB for the script the fallback shaper can still
                // synthesize Arabic presentation forms.
                let gsub_dflt = gsub_script == Some(Tag::from_bytes(b"DFLT"));
                if direction.is_horizontal() && (!gsub_dflt || script == script::ARABIC) {
                    ShaperKind::Arabic
                } else {
                    ShaperKind::Default
                }
            }

            script::THAI | script::LAO => ShaperKind::Thai,

            script::HANGUL => ShaperKind::Hangul,

            script::HEBREW => ShaperKind::Hebrew,

            script::BENGALI
            | script::DEVANAGARI
            | script::GUJARATI
            | script::GURMUKHI
            | script::KANNADA
            | script::MALAYALAM
            | script::ORIYA
            | script::TAMIL
            | script::TELUGU
            | script::SINHALA => {
                // A font that only has `DFLT` or `latn` lookups was not made
                // with the Indic model in mind; reordering would break it.
                if is_dflt_or_latn {
                    ShaperKind::Default
                } else {
                    ShaperKind::Indic
                }
            }

            script::KHMER => ShaperKind::Khmer,

            script::MYANMAR => {
                // Only `mym2` fonts follow the Myanmar model; the old `mymr`
                // tag is shaped generically.
                if is_dflt_or_latn || gsub_script == Some(Tag::from_bytes(b"mymr")) {
                    ShaperKind::Default
                } else {
                    ShaperKind::Myanmar
                }
            }

            script::BALINESE
            | script::BATAK
            | script::BUGINESE
            | script::CHAM
            | script::JAVANESE
            | script::SUNDANESE
            | script::TAI_THAM
            | script::TAI_VIET
            | script::NEW_TAI_LUE => {
                if map.has_gsub_feature(feature::PRE_BASE_FORMS) {
                    ShaperKind::SouthEastAsian
                } else {
                    ShaperKind::Dumber
                }
            }

            _ => ShaperKind::Default,
        }
    }

    /// The shaper implementing this family.
    pub(crate) fn shaper(self) -> &'static dyn ComplexShaper {
        match self {
            ShaperKind::Default => &DEFAULT_SHAPER,
            ShaperKind::Dumber => &DUMBER_SHAPER,
            ShaperKind::Arabic => &arabic::ARABIC_SHAPER,
            ShaperKind::Hangul => &hangul::HANGUL_SHAPER,
            ShaperKind::Hebrew => &hebrew::HEBREW_SHAPER,
            ShaperKind::Indic => &indic::INDIC_SHAPER,
            ShaperKind::Khmer => &khmer::KHMER_SHAPER,
            ShaperKind::SouthEastAsian => &khmer::SEA_SHAPER,
            ShaperKind::Myanmar => &myanmar::MYANMAR_SHAPER,
            ShaperKind::MyanmarZawgyi => &myanmar::MYANMAR_ZAWGYI_SHAPER,
            ShaperKind::Thai => &thai::THAI_SHAPER,
        }
    }
}

/// Probes whether the lookups of one feature would substitute a glyph
/// sequence. Built once per plan for features with their own stage.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WouldSubstituteFeature {
    tag: Tag,
    zero_context: bool,
}

impl WouldSubstituteFeature {
    pub(crate) fn new(tag: Tag, zero_context: bool) -> Self {
        WouldSubstituteFeature { tag, zero_context }
    }

    pub(crate) fn would_substitute(&self, plan: &ShapePlan, font: &Font, glyphs: &[u32]) -> bool {
        plan.ot_map
            .feature_stage_lookups(TableIndex::GSUB, self.tag)
            .iter()
            .any(|lookup| font.layout.lookup_would_substitute(lookup.index, glyphs, self.zero_context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::NoLayout;

    fn kind_for(script: Script, direction: Direction, language: Option<&Language>) -> ShaperKind {
        let map = MapBuilder::new(&NoLayout, Some(script), language);
        ShaperKind::categorize(script, direction, language, &map)
    }

    #[test]
    fn flag_range_covers_both_ends() {
        assert_eq!(rb_flag_range(2, 4), 0b11100);
        assert_eq!(rb_flag_unsafe(40), 0);
    }

    #[test]
    fn fonts_without_layout() {
        let ltr = Direction::LeftToRight;
        assert_eq!(kind_for(script::ARABIC, Direction::RightToLeft, None), ShaperKind::Arabic);
        assert_eq!(kind_for(script::HANGUL, ltr, None), ShaperKind::Hangul);
        assert_eq!(kind_for(script::THAI, ltr, None), ShaperKind::Thai);
        assert_eq!(kind_for(script::KHMER, ltr, None), ShaperKind::Khmer);
        assert_eq!(kind_for(script::JAVANESE, ltr, None), ShaperKind::Dumber);
        assert_eq!(kind_for(script::LATIN, ltr, None), ShaperKind::Default);
    }

    #[test]
    fn zawgyi_wins_over_script() {
        let zawgyi: Language = "zawgyi".parse().unwrap();
        assert_eq!(
            kind_for(script::MYANMAR, Direction::LeftToRight, Some(&zawgyi)),
            ShaperKind::MyanmarZawgyi
        );
    }
}
