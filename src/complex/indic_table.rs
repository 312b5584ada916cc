//! Character categories for the syllabic shapers.
//!
//! The nine major Indic blocks share one layout (ISCII order), so a
//! character's category follows from its offset within the block, with a
//! few per-script exceptions. Matra positions depend on the side the matra
//! is drawn on and on the script.

use crate::buffer::GlyphInfo;
use crate::common::script;
use crate::common::Script;

pub(crate) type Category = u8;
pub(crate) type Position = u8;

/// Syllabic categories, shared by the Indic, Khmer and Myanmar grammars.
#[allow(dead_code)]
pub(crate) mod category {
    use super::Category;

    pub const X: Category = 0;
    pub const C: Category = 1;
    pub const V: Category = 2;
    pub const N: Category = 3;
    pub const H: Category = 4;
    pub const ZWNJ: Category = 5;
    pub const ZWJ: Category = 6;
    pub const M: Category = 7;
    pub const SM: Category = 8;
    pub const A: Category = 9;
    pub const VD: Category = A;
    pub const PLACEHOLDER: Category = 10;
    pub const DOTTEDCIRCLE: Category = 11;
    /// Register shifter.
    pub const RS: Category = 12;
    /// Post-base matra that may follow a syllable modifier.
    pub const MPST: Category = 13;
    pub const REPHA: Category = 14;
    pub const RA: Category = 15;
    /// Consonant medial.
    pub const CM: Category = 16;
    pub const SYMBOL: Category = 17;
    /// Consonant with stacker.
    pub const CS: Category = 18;

    pub const V_ABV: Category = 20;
    pub const V_BLW: Category = 21;
    pub const V_PRE: Category = 22;
    pub const V_PST: Category = 23;

    // Khmer.
    pub const COENG: Category = H;
    pub const ROBATIC: Category = 25;
    pub const X_GROUP: Category = 26;
    pub const Y_GROUP: Category = 27;

    // Myanmar.
    pub const IV: Category = V;
    pub const DB: Category = N;
    pub const GB: Category = PLACEHOLDER;
    pub const P: Category = 31;
    /// Asat.
    pub const AS: Category = 32;
    /// Medial Ha.
    pub const MH: Category = 35;
    /// Medial Ra.
    pub const MR: Category = 36;
    /// Medial Wa, Shan Medial Wa.
    pub const MW: Category = 37;
    /// Medial Ya, Mon Na, Mon Ma.
    pub const MY: Category = 38;
    /// Pwo and other tones.
    pub const PT: Category = 39;
    /// Variation selectors.
    pub const VS: Category = 40;
    /// Mon La.
    pub const ML: Category = 41;
}

/// Visual positions, in the order glyphs end up within a syllable.
#[allow(dead_code)]
pub(crate) mod position {
    use super::Position;

    pub const START: Position = 0;
    pub const RA_TO_BECOME_REPH: Position = 1;
    pub const PRE_M: Position = 2;
    pub const PRE_C: Position = 3;
    pub const BASE_C: Position = 4;
    pub const AFTER_MAIN: Position = 5;
    pub const ABOVE_C: Position = 6;
    pub const BEFORE_SUB: Position = 7;
    pub const BELOW_C: Position = 8;
    pub const AFTER_SUB: Position = 9;
    pub const BEFORE_POST: Position = 10;
    pub const POST_C: Position = 11;
    pub const AFTER_POST: Position = 12;
    pub const SMVD: Position = 13;
    pub const END: Position = 14;
}

use category as cat;
use position as pos;

pub(crate) const fn category_flag(c: Category) -> u32 {
    crate::complex::rb_flag(c as u32)
}

// Vowels and placeholders are treated like consonants: they cannot occur in
// a consonant syllable, and this lets vowel syllables share its logic.
pub(crate) const CONSONANT_FLAGS: u32 = category_flag(cat::C)
    | category_flag(cat::CS)
    | category_flag(cat::RA)
    | category_flag(cat::CM)
    | category_flag(cat::V)
    | category_flag(cat::PLACEHOLDER)
    | category_flag(cat::DOTTEDCIRCLE);

pub(crate) const JOINER_FLAGS: u32 = category_flag(cat::ZWJ) | category_flag(cat::ZWNJ);

/// Category tests on glyphs that went through a syllabic shaper.
pub(crate) trait SyllabicInfo {
    fn is_consonant(&self) -> bool;
    fn is_halant(&self) -> bool;
    fn is_syllabic_joiner(&self) -> bool;
}

impl SyllabicInfo for GlyphInfo {
    #[inline]
    fn is_consonant(&self) -> bool {
        self.is_one_of(CONSONANT_FLAGS)
    }

    #[inline]
    fn is_halant(&self) -> bool {
        self.is_one_of(category_flag(cat::H))
    }

    #[inline]
    fn is_syllabic_joiner(&self) -> bool {
        self.is_one_of(JOINER_FLAGS)
    }
}

/// The side a dependent vowel sign is drawn on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MatraSide {
    Left,
    Right,
    Top,
    Bottom,
}

// Sides of the matras U+xx3E..=U+xx4C, one string per block, Devanagari
// first. `-` marks code points that are not matras.
const MATRA_SIDES: [&[u8; 15]; 9] = [
    b"RLRBBBBTTTTRRRR",
    b"RLRBBBB--LL--RR",
    b"RLRBB----TT--TT",
    b"RLRBBBBT-TTR-RR",
    b"RTRBBBB--LL--RR",
    b"RTRRR---LLL-RRR",
    b"TTTRRRR-TTT-TTT",
    b"RTTRRRR-TTT-TTT",
    b"RRRRRBB-LLL-RRR",
];

const BLOCK_SCRIPTS: [Script; 9] = [
    script::DEVANAGARI,
    script::BENGALI,
    script::GURMUKHI,
    script::GUJARATI,
    script::ORIYA,
    script::TAMIL,
    script::TELUGU,
    script::KANNADA,
    script::MALAYALAM,
];

fn side_from_byte(b: u8) -> Option<MatraSide> {
    match b {
        b'L' => Some(MatraSide::Left),
        b'R' => Some(MatraSide::Right),
        b'T' => Some(MatraSide::Top),
        b'B' => Some(MatraSide::Bottom),
        _ => None,
    }
}

/// Category and side of a character in one of the ISCII-ordered blocks.
fn block_category(block: usize, u: u32) -> (Category, Option<MatraSide>) {
    use MatraSide::*;

    let offset = u & 0x7F;
    let script = BLOCK_SCRIPTS[block];

    // Per-script exceptions first.
    match u {
        0x0980 => return (cat::PLACEHOLDER, None),
        0x09F0 | 0x09F1 => return (cat::RA, None),
        0x0A51 => return (cat::A, None),
        0x0A70 | 0x0A71 => return (cat::SM, None),
        0x0A72 | 0x0A73 => return (cat::PLACEHOLDER, None),
        0x0A75 => return (cat::CM, None),
        0x0C00 | 0x0C04 => return (cat::SM, None),
        0x0C55 | 0x0C56 | 0x0CD5 | 0x0CD6 => return (cat::MPST, Some(Right)),
        0x0CF1 | 0x0CF2 => return (cat::CS, None),
        0x0D3B | 0x0D3C => return (cat::H, None),
        0x0D4E => return (cat::REPHA, None),
        0x0D54..=0x0D56 | 0x0D7A..=0x0D7F => return (cat::C, None),
        _ => {}
    }

    match offset {
        0x00..=0x03 => (cat::SM, None),
        0x04..=0x14 => (cat::V, None),
        0x30 => (cat::RA, None),
        0x15..=0x39 => (cat::C, None),
        0x3A if script == script::DEVANAGARI => (cat::M, Some(Top)),
        0x3B if script == script::DEVANAGARI => (cat::M, Some(Right)),
        0x3C => (cat::N, None),
        0x3D => (cat::SYMBOL, None),
        0x3E..=0x4C => match side_from_byte(MATRA_SIDES[block][(offset - 0x3E) as usize]) {
            Some(side) => (cat::M, Some(side)),
            None => (cat::X, None),
        },
        0x4D => (cat::H, None),
        0x4E if script == script::DEVANAGARI => (cat::M, Some(Left)),
        0x4F if script == script::DEVANAGARI => (cat::M, Some(Right)),
        0x51..=0x54 if script == script::DEVANAGARI => (cat::A, None),
        0x55..=0x57 => match u {
            0x0955 | 0x0B56 => (cat::M, Some(Top)),
            0x0956 | 0x0957 => (cat::M, Some(Bottom)),
            0x09D7 | 0x0B57 | 0x0BD7 | 0x0D57 => (cat::M, Some(Right)),
            _ => (cat::X, None),
        },
        0x58..=0x5F => (cat::C, None),
        0x60 | 0x61 => (cat::V, None),
        0x62 | 0x63 => (cat::M, Some(Bottom)),
        0x66..=0x6F => (cat::PLACEHOLDER, None),
        _ => (cat::X, None),
    }
}

fn sinhala_category(u: u32) -> (Category, Option<MatraSide>) {
    use MatraSide::*;

    match u {
        0x0D81..=0x0D83 => (cat::SM, None),
        0x0D85..=0x0D96 => (cat::V, None),
        0x0DBB => (cat::RA, None),
        0x0D9A..=0x0DC6 => (cat::C, None),
        0x0DCA => (cat::H, None),
        0x0DCF..=0x0DD1 | 0x0DD8 | 0x0DDF | 0x0DF2 | 0x0DF3 => (cat::M, Some(Right)),
        0x0DD2 | 0x0DD3 => (cat::M, Some(Top)),
        0x0DD4 | 0x0DD6 => (cat::M, Some(Bottom)),
        0x0DD9..=0x0DDE => (cat::M, Some(Left)),
        0x0DE6..=0x0DEF => (cat::PLACEHOLDER, None),
        _ => (cat::X, None),
    }
}

fn matra_position(u: u32, script: Script, side: MatraSide) -> Position {
    match side {
        MatraSide::Left => pos::PRE_M,
        MatraSide::Right => match script {
            script::DEVANAGARI | script::SINHALA => pos::AFTER_SUB,
            script::TELUGU if u <= 0x0C42 => pos::BEFORE_SUB,
            script::TELUGU => pos::AFTER_SUB,
            script::KANNADA if u < 0x0CC3 || u > 0x0CD6 => pos::BEFORE_SUB,
            script::KANNADA => pos::AFTER_SUB,
            _ => pos::AFTER_POST,
        },
        MatraSide::Top => match script {
            script::GURMUKHI => pos::AFTER_POST,
            script::ORIYA => pos::AFTER_MAIN,
            script::TELUGU | script::KANNADA => pos::BEFORE_SUB,
            _ => pos::AFTER_SUB,
        },
        MatraSide::Bottom => match script {
            script::GURMUKHI | script::GUJARATI | script::TAMIL | script::MALAYALAM => pos::AFTER_POST,
            script::TELUGU | script::KANNADA => pos::BEFORE_SUB,
            _ => pos::AFTER_SUB,
        },
    }
}

/// Returns the syllabic category and initial position of a character.
pub(crate) fn indic_properties(u: u32) -> (Category, Position) {
    let (category, side, script) = match u {
        0x00A0 | 0x2010..=0x2014 => (cat::PLACEHOLDER, None, None),
        0x200C => (cat::ZWNJ, None, None),
        0x200D => (cat::ZWJ, None, None),
        0x25CC => (cat::DOTTEDCIRCLE, None, None),
        0x1CD0..=0x1CF9 | 0xA8E0..=0xA8F1 => (cat::A, None, None),
        0xA8F2..=0xA8F7 => (cat::SYMBOL, None, None),
        0x0900..=0x0D7F => {
            let block = ((u - 0x0900) >> 7) as usize;
            let (category, side) = block_category(block, u);
            (category, side, Some(BLOCK_SCRIPTS[block]))
        }
        0x0D80..=0x0DFF => {
            let (category, side) = sinhala_category(u);
            (category, side, Some(script::SINHALA))
        }
        _ => (cat::X, None, None),
    };

    let position = if category_flag(category) & CONSONANT_FLAGS != 0 {
        pos::BASE_C
    } else if let (Some(side), Some(script)) = (side, script) {
        matra_position(u, script, side)
    } else if matches!(category, cat::SM | cat::A | cat::SYMBOL) {
        pos::SMVD
    } else {
        pos::END
    };

    (category, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devanagari() {
        assert_eq!(indic_properties(0x0915), (cat::C, pos::BASE_C));
        assert_eq!(indic_properties(0x0930), (cat::RA, pos::BASE_C));
        assert_eq!(indic_properties(0x093F), (cat::M, pos::PRE_M));
        assert_eq!(indic_properties(0x0940), (cat::M, pos::AFTER_SUB));
        assert_eq!(indic_properties(0x094D), (cat::H, pos::END));
        assert_eq!(indic_properties(0x0902), (cat::SM, pos::SMVD));
        assert_eq!(indic_properties(0x0905), (cat::V, pos::BASE_C));
        assert_eq!(indic_properties(0x093C), (cat::N, pos::END));
    }

    #[test]
    fn script_dependent_matra_positions() {
        // Bengali I is on the left, AU length mark on the right.
        assert_eq!(indic_properties(0x09BF).1, pos::PRE_M);
        assert_eq!(indic_properties(0x09D7).1, pos::AFTER_POST);
        // Telugu and Kannada below-base vowels.
        assert_eq!(indic_properties(0x0C41).1, pos::BEFORE_SUB);
        assert_eq!(indic_properties(0x0C43).1, pos::AFTER_SUB);
        assert_eq!(indic_properties(0x0CC1).1, pos::BEFORE_SUB);
        assert_eq!(indic_properties(0x0CC3).1, pos::AFTER_SUB);
        // Oriya above-base.
        assert_eq!(indic_properties(0x0B3F).1, pos::AFTER_MAIN);
    }

    #[test]
    fn exceptions() {
        assert_eq!(indic_properties(0x0D4E).0, cat::REPHA);
        assert_eq!(indic_properties(0x0CF1).0, cat::CS);
        assert_eq!(indic_properties(0x09F0).0, cat::RA);
        assert_eq!(indic_properties(0x0DBB).0, cat::RA);
        assert_eq!(indic_properties(0x0DD9), (cat::M, pos::PRE_M));
        assert_eq!(indic_properties(0x25CC), (cat::DOTTEDCIRCLE, pos::BASE_C));
        assert_eq!(indic_properties(0x0041), (cat::X, pos::END));
    }
}
