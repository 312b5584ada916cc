use smallvec::SmallVec;
pub use unicode_properties::GeneralCategory;
use unicode_properties::UnicodeGeneralCategory;

use crate::common::{Script, Tag};

pub(crate) const DOTTED_CIRCLE: u32 = 0x25CC;
pub(crate) const ZWNJ: u32 = 0x200C;
pub(crate) const ZWJ: u32 = 0x200D;
pub(crate) const CGJ: u32 = 0x034F;

// Default_Ignorable codepoints:
//
// While U+115F, U+1160, U+3164 and U+FFA0 are Default_Ignorable, they are not
// hidden: fonts draw them as regular spacing glyphs. U+1BCA0..1BCA3 are left
// alone as well.
//
// 00AD          # Cf       SOFT HYPHEN
// 034F          # Mn       COMBINING GRAPHEME JOINER
// 061C          # Cf       ARABIC LETTER MARK
// 17B4..17B5    # Mn   [2] KHMER VOWEL INHERENT AQ..KHMER VOWEL INHERENT AA
// 180B..180D    # Mn   [3] MONGOLIAN FREE VARIATION SELECTOR ONE..THREE
// 180E          # Cf       MONGOLIAN VOWEL SEPARATOR
// 180F          # Mn       MONGOLIAN FREE VARIATION SELECTOR FOUR
// 200B..200F    # Cf   [5] ZERO WIDTH SPACE..RIGHT-TO-LEFT MARK
// 202A..202E    # Cf   [5] LEFT-TO-RIGHT EMBEDDING..RIGHT-TO-LEFT OVERRIDE
// 2060..206F    # Cf  [16] WORD JOINER..NOMINAL DIGIT SHAPES
// FE00..FE0F    # Mn  [16] VARIATION SELECTOR-1..VARIATION SELECTOR-16
// FEFF          # Cf       ZERO WIDTH NO-BREAK SPACE
// FFF0..FFF8    # Cn   [9] <reserved-FFF0>..<reserved-FFF8>
// 1D173..1D17A  # Cf   [8] MUSICAL SYMBOL BEGIN BEAM..MUSICAL SYMBOL END PHRASE
// E0000..E0FFF  # tags and variation selectors 17..256
pub(crate) fn is_default_ignorable(ch: u32) -> bool {
    let plane = ch >> 16;
    if plane == 0 {
        let page = ch >> 8;
        match page {
            0x00 => ch == 0x00AD,
            0x03 => ch == 0x034F,
            0x06 => ch == 0x061C,
            0x17 => (0x17B4..=0x17B5).contains(&ch),
            0x18 => (0x180B..=0x180F).contains(&ch),
            0x20 => {
                (0x200B..=0x200F).contains(&ch)
                    || (0x202A..=0x202E).contains(&ch)
                    || (0x2060..=0x206F).contains(&ch)
            }
            0xFE => (0xFE00..=0xFE0F).contains(&ch) || ch == 0xFEFF,
            0xFF => (0xFFF0..=0xFFF8).contains(&ch),
            _ => false,
        }
    } else {
        match plane {
            0x01 => (0x1D173..=0x1D17A).contains(&ch),
            0x0E => (0xE0000..=0xE0FFF).contains(&ch),
            _ => false,
        }
    }
}

/// Space characters whose width can be synthesized from the space glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Space {
    Space,
    Em,
    Em2,
    Em3,
    Em4,
    Em5,
    Em6,
    Em16,
    FourEm18,
    Figure,
    Punctuation,
    Narrow,
}

impl Space {
    /// The divisor applied to the em size, if this space is a fraction of an em.
    pub fn em_divisor(self) -> Option<i32> {
        match self {
            Space::Em => Some(1),
            Space::Em2 => Some(2),
            Space::Em3 => Some(3),
            Space::Em4 => Some(4),
            Space::Em5 => Some(5),
            Space::Em6 => Some(6),
            Space::Em16 => Some(16),
            _ => None,
        }
    }
}

// Hebrew
//
// The "fixed-position" classes 10-26 are permuted into the order described
// in the SBL Hebrew manual:
//
// https://www.sbl-site.org/Fonts/SBLHebrewUserManual1.5x.pdf
#[allow(dead_code)]
pub(crate) mod modified_combining_class {
    pub const CCC10: u8 = 22; // sheva
    pub const CCC11: u8 = 15; // hataf segol
    pub const CCC12: u8 = 16; // hataf patah
    pub const CCC13: u8 = 17; // hataf qamats
    pub const CCC14: u8 = 23; // hiriq
    pub const CCC15: u8 = 18; // tsere
    pub const CCC16: u8 = 19; // segol
    pub const CCC17: u8 = 20; // patah
    pub const CCC18: u8 = 21; // qamats & qamats qatan
    pub const CCC19: u8 = 14; // holam & holam haser for vav
    pub const CCC20: u8 = 24; // qubuts
    pub const CCC21: u8 = 12; // dagesh
    pub const CCC22: u8 = 25; // meteg
    pub const CCC23: u8 = 13; // rafe
    pub const CCC24: u8 = 10; // shin dot
    pub const CCC25: u8 = 11; // sin dot
    pub const CCC26: u8 = 26; // point varika

    // Arabic
    //
    // Shadda (ccc=33) moves before the other marks.
    pub const CCC27: u8 = 28; // fathatan
    pub const CCC28: u8 = 29; // dammatan
    pub const CCC29: u8 = 30; // kasratan
    pub const CCC30: u8 = 31; // fatha
    pub const CCC31: u8 = 32; // damma
    pub const CCC32: u8 = 33; // kasra
    pub const CCC33: u8 = 27; // shadda
    pub const CCC34: u8 = 34; // sukun
    pub const CCC35: u8 = 35; // superscript alef

    // Syriac
    pub const CCC36: u8 = 36; // superscript alaph

    // Telugu
    //
    // The length marks are the only matras in the main Indic blocks with a
    // non-zero class, which would reorder them against the virama.
    pub const CCC84: u8 = 0; // length mark
    pub const CCC91: u8 = 0; // ai length mark

    // Thai
    //
    // U+0E38 and U+0E39 (ccc=103) go before U+0E3A (ccc=9).
    pub const CCC103: u8 = 3; // sara u / sara uu
    pub const CCC107: u8 = 107; // mai *

    // Lao
    pub const CCC118: u8 = 118; // sign u / sign uu
    pub const CCC122: u8 = 122; // mai *

    // Tibetan
    //
    // With multiple vowel signs, u comes first (but after achung).
    pub const CCC129: u8 = 129; // sign aa
    pub const CCC130: u8 = 132; // sign i
    pub const CCC132: u8 = 131; // sign u
}

pub(crate) trait GeneralCategoryExt {
    fn is_mark(&self) -> bool;
    fn is_letter(&self) -> bool;
}

impl GeneralCategoryExt for GeneralCategory {
    #[inline]
    fn is_mark(&self) -> bool {
        matches!(
            *self,
            GeneralCategory::SpacingMark | GeneralCategory::EnclosingMark | GeneralCategory::NonspacingMark
        )
    }

    #[inline]
    fn is_letter(&self) -> bool {
        matches!(
            *self,
            GeneralCategory::LowercaseLetter
                | GeneralCategory::ModifierLetter
                | GeneralCategory::OtherLetter
                | GeneralCategory::TitlecaseLetter
                | GeneralCategory::UppercaseLetter
        )
    }
}

pub(crate) trait CharExt {
    fn general_category(self) -> GeneralCategory;
    fn combining_class(self) -> u8;
    fn modified_combining_class(self) -> u8;
    fn mirrored(self) -> Option<char>;
    fn script(self) -> Script;
    fn space_fallback(self) -> Option<Space>;
    fn is_emoji_extended_pictographic(self) -> bool;
    fn is_variation_selector(self) -> bool;
    fn vertical(self) -> Option<char>;
}

impl CharExt for char {
    #[inline]
    fn general_category(self) -> GeneralCategory {
        UnicodeGeneralCategory::general_category(self)
    }

    #[inline]
    fn combining_class(self) -> u8 {
        unicode_ccc::get_canonical_combining_class(self) as u8
    }

    fn modified_combining_class(self) -> u8 {
        use modified_combining_class as mcc;

        match self {
            // SAKOT goes after any tone marks.
            '\u{1A60}' => return 254,
            // PADMA goes after any vowel marks.
            '\u{0FC6}' => return 254,
            // TSA -PHRU goes before U+0F74.
            '\u{0F39}' => return 127,
            _ => {}
        }

        match self.combining_class() {
            10 => mcc::CCC10,
            11 => mcc::CCC11,
            12 => mcc::CCC12,
            13 => mcc::CCC13,
            14 => mcc::CCC14,
            15 => mcc::CCC15,
            16 => mcc::CCC16,
            17 => mcc::CCC17,
            18 => mcc::CCC18,
            19 => mcc::CCC19,
            20 => mcc::CCC20,
            21 => mcc::CCC21,
            22 => mcc::CCC22,
            23 => mcc::CCC23,
            24 => mcc::CCC24,
            25 => mcc::CCC25,
            26 => mcc::CCC26,
            27 => mcc::CCC27,
            28 => mcc::CCC28,
            29 => mcc::CCC29,
            30 => mcc::CCC30,
            31 => mcc::CCC31,
            32 => mcc::CCC32,
            33 => mcc::CCC33,
            34 => mcc::CCC34,
            35 => mcc::CCC35,
            36 => mcc::CCC36,
            84 => mcc::CCC84,
            91 => mcc::CCC91,
            103 => mcc::CCC103,
            107 => mcc::CCC107,
            118 => mcc::CCC118,
            122 => mcc::CCC122,
            129 => mcc::CCC129,
            130 => mcc::CCC130,
            132 => mcc::CCC132,
            ccc => ccc,
        }
    }

    #[inline]
    fn mirrored(self) -> Option<char> {
        unicode_bidi_mirroring::get_mirrored(self)
    }

    fn script(self) -> Script {
        let name = unicode_script::UnicodeScript::script(&self).short_name();
        let b = name.as_bytes();
        if b.len() != 4 {
            return crate::script::UNKNOWN;
        }

        Script::from_iso15924_tag(Tag::from_bytes(&[b[0], b[1], b[2], b[3]])).unwrap_or(crate::script::UNKNOWN)
    }

    fn space_fallback(self) -> Option<Space> {
        // All GC=Zs chars that can use a fallback.
        match self {
            '\u{0020}' => Some(Space::Space),       // SPACE
            '\u{00A0}' => Some(Space::Space),       // NO-BREAK SPACE
            '\u{2000}' => Some(Space::Em2),         // EN QUAD
            '\u{2001}' => Some(Space::Em),          // EM QUAD
            '\u{2002}' => Some(Space::Em2),         // EN SPACE
            '\u{2003}' => Some(Space::Em),          // EM SPACE
            '\u{2004}' => Some(Space::Em3),         // THREE-PER-EM SPACE
            '\u{2005}' => Some(Space::Em4),         // FOUR-PER-EM SPACE
            '\u{2006}' => Some(Space::Em6),         // SIX-PER-EM SPACE
            '\u{2007}' => Some(Space::Figure),      // FIGURE SPACE
            '\u{2008}' => Some(Space::Punctuation), // PUNCTUATION SPACE
            '\u{2009}' => Some(Space::Em5),         // THIN SPACE
            '\u{200A}' => Some(Space::Em16),        // HAIR SPACE
            '\u{202F}' => Some(Space::Narrow),      // NARROW NO-BREAK SPACE
            '\u{205F}' => Some(Space::FourEm18),    // MEDIUM MATHEMATICAL SPACE
            '\u{3000}' => Some(Space::Em),          // IDEOGRAPHIC SPACE
            _ => None,                              // OGHAM SPACE MARK
        }
    }

    fn is_emoji_extended_pictographic(self) -> bool {
        // A coarse approximation covering the emoji blocks, used only to keep
        // ZWJ sequences together in one cluster.
        matches!(self as u32,
            0x00A9 | 0x00AE | 0x203C | 0x2049 | 0x2122 | 0x2139 |
            0x2194..=0x2199 | 0x21A9..=0x21AA | 0x231A..=0x231B |
            0x2328 | 0x23CF | 0x23E9..=0x23F3 | 0x23F8..=0x23FA |
            0x24C2 | 0x25AA..=0x25AB | 0x25B6 | 0x25C0 | 0x25FB..=0x25FE |
            0x2600..=0x27BF | 0x2934..=0x2935 | 0x2B05..=0x2B07 |
            0x2B1B..=0x2B1C | 0x2B50 | 0x2B55 | 0x3030 | 0x303D |
            0x3297 | 0x3299 | 0x1F000..=0x1FAFF | 0x1FC00..=0x1FFFD
        )
    }

    #[inline]
    fn is_variation_selector(self) -> bool {
        matches!(self as u32, 0x180B..=0x180D | 0x180F | 0xFE00..=0xFE0F | 0xE0100..=0xE01EF)
    }

    fn vertical(self) -> Option<char> {
        let u = self as u32;
        let v = match u >> 8 {
            0x20 => match u {
                0x2013 => 0xFE32, // EN DASH
                0x2014 => 0xFE31, // EM DASH
                0x2025 => 0xFE30, // TWO DOT LEADER
                0x2026 => 0xFE19, // HORIZONTAL ELLIPSIS
                _ => return None,
            },
            0x30 => match u {
                0x3001 => 0xFE11, // IDEOGRAPHIC COMMA
                0x3002 => 0xFE12, // IDEOGRAPHIC FULL STOP
                0x3008 => 0xFE3F, // LEFT ANGLE BRACKET
                0x3009 => 0xFE40, // RIGHT ANGLE BRACKET
                0x300A => 0xFE3D, // LEFT DOUBLE ANGLE BRACKET
                0x300B => 0xFE3E, // RIGHT DOUBLE ANGLE BRACKET
                0x300C => 0xFE41, // LEFT CORNER BRACKET
                0x300D => 0xFE42, // RIGHT CORNER BRACKET
                0x300E => 0xFE43, // LEFT WHITE CORNER BRACKET
                0x300F => 0xFE44, // RIGHT WHITE CORNER BRACKET
                0x3010 => 0xFE3B, // LEFT BLACK LENTICULAR BRACKET
                0x3011 => 0xFE3C, // RIGHT BLACK LENTICULAR BRACKET
                0x3014 => 0xFE39, // LEFT TORTOISE SHELL BRACKET
                0x3015 => 0xFE3A, // RIGHT TORTOISE SHELL BRACKET
                0x3016 => 0xFE17, // LEFT WHITE LENTICULAR BRACKET
                0x3017 => 0xFE18, // RIGHT WHITE LENTICULAR BRACKET
                _ => return None,
            },
            0xFE => match u {
                0xFE4F => 0xFE34, // WAVY LOW LINE
                _ => return None,
            },
            0xFF => match u {
                0xFF01 => 0xFE15, // FULLWIDTH EXCLAMATION MARK
                0xFF08 => 0xFE35, // FULLWIDTH LEFT PARENTHESIS
                0xFF09 => 0xFE36, // FULLWIDTH RIGHT PARENTHESIS
                0xFF0C => 0xFE10, // FULLWIDTH COMMA
                0xFF1A => 0xFE13, // FULLWIDTH COLON
                0xFF1B => 0xFE14, // FULLWIDTH SEMICOLON
                0xFF1F => 0xFE16, // FULLWIDTH QUESTION MARK
                0xFF3B => 0xFE47, // FULLWIDTH LEFT SQUARE BRACKET
                0xFF3D => 0xFE48, // FULLWIDTH RIGHT SQUARE BRACKET
                0xFF3F => 0xFE33, // FULLWIDTH LOW LINE
                0xFF5B => 0xFE37, // FULLWIDTH LEFT CURLY BRACKET
                0xFF5D => 0xFE38, // FULLWIDTH RIGHT CURLY BRACKET
                _ => return None,
            },
            _ => return None,
        };

        char::from_u32(v)
    }
}

/// Canonically composes a pair of characters.
pub(crate) fn compose(a: char, b: char) -> Option<char> {
    unicode_normalization::char::compose(a, b)
}

/// Canonically decomposes a character by one level.
///
/// Returns `(a, None)` for singleton decompositions.
pub(crate) fn decompose(ab: char) -> Option<(char, Option<char>)> {
    let mut full: SmallVec<[char; 4]> = SmallVec::new();
    unicode_normalization::char::decompose_canonical(ab, |c| full.push(c));

    match full.as_slice() {
        [] => None,
        [a] if *a == ab => None,
        [a] => Some((*a, None)),
        [prefix @ .., last] => {
            let mut a = prefix[0];
            for &c in &prefix[1..] {
                a = compose(a, c)?;
            }

            let b = *last;
            match compose(a, b) {
                Some(c) if c == ab => Some((a, Some(b))),
                // A singleton pointing at a composable pair, like U+212B ANGSTROM SIGN.
                Some(c) => Some((c, None)),
                // Composition exclusions, like U+0958 DEVANAGARI LETTER QA.
                None => Some((a, Some(b))),
            }
        }
    }
}

/// Fully decomposes a character using compatibility mappings.
///
/// Returns an empty list if the compatibility and canonical decompositions
/// agree, since the canonical path already covers those.
pub(crate) fn decompose_compatibility(u: char) -> SmallVec<[char; 8]> {
    let mut compat: SmallVec<[char; 8]> = SmallVec::new();
    unicode_normalization::char::decompose_compatible(u, |c| compat.push(c));

    let mut canon: SmallVec<[char; 8]> = SmallVec::new();
    unicode_normalization::char::decompose_canonical(u, |c| canon.push(c));

    if compat == canon {
        compat.clear();
    }

    compat
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_level_decomposition() {
        // s with dot below and dot above
        assert_eq!(decompose('\u{1E69}'), Some(('\u{1E63}', Some('\u{0307}'))));
        assert_eq!(decompose('\u{00E9}'), Some(('e', Some('\u{0301}'))));
        assert_eq!(decompose('\u{212B}'), Some(('\u{00C5}', None)));
        assert_eq!(decompose('\u{0958}'), Some(('\u{0915}', Some('\u{093C}'))));
        assert_eq!(decompose('a'), None);
    }

    #[test]
    fn hangul_decomposes_algorithmically() {
        // GAG = GA + KIYEOK
        assert_eq!(decompose('\u{AC01}'), Some(('\u{AC00}', Some('\u{11A8}'))));
        assert_eq!(decompose('\u{AC00}'), Some(('\u{1100}', Some('\u{1161}'))));
    }

    #[test]
    fn compatibility_only_when_different() {
        assert_eq!(decompose_compatibility('\u{FB01}').as_slice(), &['f', 'i']);
        assert!(decompose_compatibility('\u{00E9}').is_empty());
    }

    #[test]
    fn modified_classes() {
        assert_eq!('\u{05B0}'.modified_combining_class(), modified_combining_class::CCC10);
        assert_eq!('\u{0651}'.modified_combining_class(), 27);
        assert_eq!('\u{0E38}'.modified_combining_class(), 3);
        assert_eq!('\u{0301}'.modified_combining_class(), 230);
        assert_eq!('a'.modified_combining_class(), 0);
    }

    #[test]
    fn default_ignorables() {
        assert!(is_default_ignorable(0x200D));
        assert!(is_default_ignorable(0xFE0F));
        assert!(!is_default_ignorable(0x3164));
        assert!(!is_default_ignorable(0x0041));
    }

    #[test]
    fn script_lookup() {
        assert_eq!('क'.script(), crate::script::DEVANAGARI);
        assert_eq!('a'.script(), crate::script::LATIN);
        assert_eq!(' '.script(), crate::script::COMMON);
    }
}
