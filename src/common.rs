use alloc::string::String;
use alloc::vec::Vec;
use core::ops::{Bound, RangeBounds};

use smallvec::SmallVec;

pub use ttf_parser::Tag;

use crate::error::ShapeError;

pub(crate) trait TagExt {
    fn default_script() -> Self;
    fn default_language() -> Self;
    fn to_lowercase(&self) -> Self;
    fn to_uppercase(&self) -> Self;
}

impl TagExt for Tag {
    #[inline]
    fn default_script() -> Self {
        Tag::from_bytes(b"DFLT")
    }

    #[inline]
    fn default_language() -> Self {
        Tag::from_bytes(b"dflt")
    }

    fn to_lowercase(&self) -> Self {
        let b = self.to_bytes();
        Tag::from_bytes(&[
            b[0].to_ascii_lowercase(),
            b[1].to_ascii_lowercase(),
            b[2].to_ascii_lowercase(),
            b[3].to_ascii_lowercase(),
        ])
    }

    fn to_uppercase(&self) -> Self {
        let b = self.to_bytes();
        Tag::from_bytes(&[
            b[0].to_ascii_uppercase(),
            b[1].to_ascii_uppercase(),
            b[2].to_ascii_uppercase(),
            b[3].to_ascii_uppercase(),
        ])
    }
}

/// Defines the direction in which text is to be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Initial, unset direction.
    #[default]
    Invalid,
    /// Text is set horizontally from left to right.
    LeftToRight,
    /// Text is set horizontally from right to left.
    RightToLeft,
    /// Text is set vertically from top to bottom.
    TopToBottom,
    /// Text is set vertically from bottom to top.
    BottomToTop,
}

impl Direction {
    #[inline]
    pub(crate) fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }

    #[inline]
    pub(crate) fn is_vertical(self) -> bool {
        matches!(self, Direction::TopToBottom | Direction::BottomToTop)
    }

    #[inline]
    pub(crate) fn is_forward(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::TopToBottom)
    }

    #[inline]
    pub(crate) fn is_backward(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::BottomToTop)
    }

    #[inline]
    pub(crate) fn reverse(self) -> Self {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
            Direction::TopToBottom => Direction::BottomToTop,
            Direction::BottomToTop => Direction::TopToBottom,
            Direction::Invalid => Direction::Invalid,
        }
    }

    /// Returns the natural horizontal direction of a script.
    pub fn from_script(script: Script) -> Option<Self> {
        // https://docs.google.com/spreadsheets/d/1Y90M0Ie3MUJ6UVCRDOypOtijlMDLNNyyLk36T6iMu0o

        match script {
            script::ARABIC |
            script::HEBREW |
            script::SYRIAC |
            script::THAANA |
            script::CYPRIOT |
            script::KHAROSHTHI |
            script::PHOENICIAN |
            script::NKO |
            script::LYDIAN |
            script::AVESTAN |
            script::IMPERIAL_ARAMAIC |
            script::INSCRIPTIONAL_PAHLAVI |
            script::INSCRIPTIONAL_PARTHIAN |
            script::OLD_SOUTH_ARABIAN |
            script::OLD_TURKIC |
            script::SAMARITAN |
            script::MANDAIC |
            script::MEROITIC_CURSIVE |
            script::MEROITIC_HIEROGLYPHS |
            script::MANICHAEAN |
            script::MENDE_KIKAKUI |
            script::NABATAEAN |
            script::OLD_NORTH_ARABIAN |
            script::PALMYRENE |
            script::PSALTER_PAHLAVI |
            script::HATRAN |
            script::ADLAM |
            script::HANIFI_ROHINGYA |
            script::OLD_SOGDIAN |
            script::SOGDIAN |
            script::ELYMAIC => Some(Direction::RightToLeft),

            // https://github.com/harfbuzz/harfbuzz/issues/1000
            script::OLD_HUNGARIAN |
            script::OLD_ITALIC |
            script::RUNIC => None,

            _ => Some(Direction::LeftToRight),
        }
    }
}

impl core::str::FromStr for Direction {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("invalid direction");
        }

        // Only the first letter matters, so "ltr" and "left-to-right" are the same.
        match s.as_bytes()[0].to_ascii_lowercase() {
            b'l' => Ok(Direction::LeftToRight),
            b'r' => Ok(Direction::RightToLeft),
            b't' => Ok(Direction::TopToBottom),
            b'b' => Ok(Direction::BottomToTop),
            _ => Err("invalid direction"),
        }
    }
}

/// A BCP 47 language tag, stored lowercased.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Language(String);

impl Language {
    /// Returns the language as a string.
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the primary subtag, e.g. `sr` for `sr-Latn-RS`.
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or("")
    }

    /// Returns the OpenType language system tags to try, best first.
    ///
    /// An explicit `-x-hbot` style private tag wins. Unknown languages fall
    /// back to their primary subtag, uppercased and padded.
    pub(crate) fn ot_tags(&self) -> SmallVec<[Tag; 2]> {
        let mut tags = SmallVec::new();

        if let Some(private) = self.0.split("-x-hbot").nth(1) {
            let raw = private.trim_start_matches('-').as_bytes();
            if !raw.is_empty() {
                let mut bytes = [b' '; 4];
                let n = raw.len().min(4);
                bytes[..n].copy_from_slice(&raw[..n]);
                tags.push(Tag::from_bytes(&bytes).to_uppercase());
                return tags;
            }
        }

        let primary = self.primary();
        match LANGUAGE_TAGS.binary_search_by(|(lang, _)| lang.cmp(&primary)) {
            Ok(idx) => tags.extend(LANGUAGE_TAGS[idx].1.iter().map(|t| Tag::from_bytes(t))),
            Err(_) => {
                let raw = primary.as_bytes();
                if (2..=3).contains(&raw.len()) {
                    let mut bytes = [b' '; 4];
                    bytes[..raw.len()].copy_from_slice(raw);
                    tags.push(Tag::from_bytes(&bytes).to_uppercase());
                }
            }
        }

        tags
    }

    /// Whether the language selects Zawgyi-encoded Myanmar text.
    pub(crate) fn is_zawgyi(&self) -> bool {
        self.0 == "my-zawgyi" || self.0.ends_with("-x-zawgyi") || self.primary() == "qaag"
    }
}

// BCP 47 primary subtag to OpenType language system tags, sorted by subtag.
// Only languages whose tag is not the uppercased subtag are listed.
const LANGUAGE_TAGS: &[(&str, &[&[u8; 4]])] = &[
    ("af", &[b"AFK "]),
    ("am", &[b"AMH "]),
    ("ar", &[b"ARA "]),
    ("as", &[b"ASM "]),
    ("be", &[b"BEL "]),
    ("bg", &[b"BGR "]),
    ("bn", &[b"BEN "]),
    ("bo", &[b"TIB "]),
    ("ca", &[b"CAT "]),
    ("cs", &[b"CSY "]),
    ("cy", &[b"WEL "]),
    ("da", &[b"DAN "]),
    ("de", &[b"DEU "]),
    ("dv", &[b"DIV ", b"DHV "]),
    ("el", &[b"ELL "]),
    ("en", &[b"ENG "]),
    ("es", &[b"ESP "]),
    ("et", &[b"ETI "]),
    ("fa", &[b"FAR "]),
    ("fi", &[b"FIN "]),
    ("fr", &[b"FRA "]),
    ("ga", &[b"IRI "]),
    ("gu", &[b"GUJ "]),
    ("he", &[b"IWR "]),
    ("hi", &[b"HIN "]),
    ("hr", &[b"HRV "]),
    ("hu", &[b"HUN "]),
    ("hy", &[b"HYE0", b"HYE "]),
    ("id", &[b"IND "]),
    ("is", &[b"ISL "]),
    ("it", &[b"ITA "]),
    ("ja", &[b"JAN "]),
    ("jv", &[b"JAV "]),
    ("ka", &[b"KAT "]),
    ("kk", &[b"KAZ "]),
    ("km", &[b"KHM "]),
    ("kn", &[b"KAN "]),
    ("ko", &[b"KOR "]),
    ("ku", &[b"KUR "]),
    ("lo", &[b"LAO "]),
    ("lt", &[b"LTH "]),
    ("lv", &[b"LVI "]),
    ("mk", &[b"MKD "]),
    ("ml", &[b"MAL ", b"MLR "]),
    ("mn", &[b"MNG "]),
    ("mr", &[b"MAR "]),
    ("ms", &[b"MLY "]),
    ("my", &[b"BRM "]),
    ("ne", &[b"NEP "]),
    ("nl", &[b"NLD "]),
    ("no", &[b"NOR "]),
    ("or", &[b"ORI "]),
    ("pa", &[b"PAN "]),
    ("pl", &[b"PLK "]),
    ("ps", &[b"PAS "]),
    ("pt", &[b"PTG "]),
    ("ro", &[b"ROM "]),
    ("ru", &[b"RUS "]),
    ("sa", &[b"SAN "]),
    ("sd", &[b"SND "]),
    ("si", &[b"SNH "]),
    ("sk", &[b"SKY "]),
    ("sl", &[b"SLV "]),
    ("sq", &[b"SQI "]),
    ("sr", &[b"SRB "]),
    ("sv", &[b"SVE "]),
    ("sw", &[b"SWK "]),
    ("syr", &[b"SYR "]),
    ("ta", &[b"TAM "]),
    ("te", &[b"TEL "]),
    ("th", &[b"THA "]),
    ("tr", &[b"TRK "]),
    ("uk", &[b"UKR "]),
    ("ur", &[b"URD "]),
    ("vi", &[b"VIT "]),
    ("yi", &[b"JII "]),
    ("zh", &[b"ZHS ", b"ZHT ", b"ZHH "]),
];

impl core::str::FromStr for Language {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err("invalid language");
        }

        Ok(Language(s.to_ascii_lowercase().replace('_', "-")))
    }
}

impl core::fmt::Display for Language {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// Any tag is a valid script, unknown ones simply get the default shaper.
/// A text script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Script(pub(crate) Tag);

impl Script {
    #[inline]
    pub(crate) const fn from_bytes(bytes: &[u8; 4]) -> Self {
        Script(Tag::from_bytes(bytes))
    }

    /// Converts an ISO 15924 script tag to a corresponding `Script`.
    pub fn from_iso15924_tag(tag: Tag) -> Option<Script> {
        if tag.0 == 0 {
            return None;
        }

        // Be lenient, adjust case (one capital letter followed by three small letters).
        let tag = Tag((tag.as_u32() & 0xDFDFDFDF) | 0x00202020);

        match &tag.to_bytes() {
            b"Qaai" => return Some(script::INHERITED),
            b"Qaac" => return Some(script::COPTIC),

            b"Cyrs" => return Some(script::CYRILLIC),
            b"Latf" | b"Latg" => return Some(script::LATIN),
            b"Syre" | b"Syrj" | b"Syrn" => return Some(script::SYRIAC),

            _ => {}
        }

        if tag.as_u32() & 0xE0E0E0E0 == 0x40606060 {
            Some(Script(tag))
        } else {
            Some(script::UNKNOWN)
        }
    }

    /// Returns script's tag.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.0
    }

    /// Returns the OpenType script tags to try for this script, best first.
    ///
    /// Indic scripts yield the version 3 and version 2 tags before the
    /// original one, so that fonts built for the newer specification win.
    pub(crate) fn ot_tags(self) -> SmallVec<[Tag; 3]> {
        let mut tags = SmallVec::new();

        if let Some(new_tag) = self.new_indic_tag() {
            let b = new_tag.to_bytes();
            tags.push(Tag::from_bytes(&[b[0], b[1], b[2], b'3']));
            tags.push(new_tag);
        }

        match self {
            script::MYANMAR => tags.push(Tag::from_bytes(b"mym2")),
            script::COMMON | script::INHERITED | script::UNKNOWN => return tags,
            _ => {}
        }

        tags.push(self.old_tag());
        tags
    }

    fn old_tag(self) -> Tag {
        match self {
            script::HIRAGANA => Tag::from_bytes(b"kana"),
            script::LAO => Tag::from_bytes(b"lao "),
            script::YI => Tag::from_bytes(b"yi  "),
            script::NKO => Tag::from_bytes(b"nko "),
            script::VAI => Tag::from_bytes(b"vai "),
            _ => self.0.to_lowercase(),
        }
    }

    fn new_indic_tag(self) -> Option<Tag> {
        let tag = match self {
            script::BENGALI => b"bng2",
            script::DEVANAGARI => b"dev2",
            script::GUJARATI => b"gjr2",
            script::GURMUKHI => b"gur2",
            script::KANNADA => b"knd2",
            script::MALAYALAM => b"mlm2",
            script::ORIYA => b"ory2",
            script::TAMIL => b"tml2",
            script::TELUGU => b"tel2",
            _ => return None,
        };

        Some(Tag::from_bytes(tag))
    }
}

impl core::str::FromStr for Script {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.as_bytes();
        if b.is_empty() || b.len() > 4 {
            return Err("invalid script");
        }

        let mut bytes = [b' '; 4];
        bytes[..b.len()].copy_from_slice(b);
        Script::from_iso15924_tag(Tag::from_bytes(&bytes)).ok_or("invalid script")
    }
}

/// Predefined scripts.
pub mod script {
    #![allow(missing_docs)]

    use crate::Script;

    pub const COMMON: Script = Script::from_bytes(b"Zyyy");
    pub const INHERITED: Script = Script::from_bytes(b"Zinh");
    pub const UNKNOWN: Script = Script::from_bytes(b"Zzzz");

    pub const ADLAM: Script = Script::from_bytes(b"Adlm");
    pub const ARABIC: Script = Script::from_bytes(b"Arab");
    pub const ARMENIAN: Script = Script::from_bytes(b"Armn");
    pub const AVESTAN: Script = Script::from_bytes(b"Avst");
    pub const BALINESE: Script = Script::from_bytes(b"Bali");
    pub const BATAK: Script = Script::from_bytes(b"Batk");
    pub const BENGALI: Script = Script::from_bytes(b"Beng");
    pub const BOPOMOFO: Script = Script::from_bytes(b"Bopo");
    pub const BUGINESE: Script = Script::from_bytes(b"Bugi");
    pub const CHAM: Script = Script::from_bytes(b"Cham");
    pub const COPTIC: Script = Script::from_bytes(b"Copt");
    pub const CYPRIOT: Script = Script::from_bytes(b"Cprt");
    pub const CYRILLIC: Script = Script::from_bytes(b"Cyrl");
    pub const DEVANAGARI: Script = Script::from_bytes(b"Deva");
    pub const ELYMAIC: Script = Script::from_bytes(b"Elym");
    pub const GEORGIAN: Script = Script::from_bytes(b"Geor");
    pub const GREEK: Script = Script::from_bytes(b"Grek");
    pub const GUJARATI: Script = Script::from_bytes(b"Gujr");
    pub const GURMUKHI: Script = Script::from_bytes(b"Guru");
    pub const HAN: Script = Script::from_bytes(b"Hani");
    pub const HANGUL: Script = Script::from_bytes(b"Hang");
    pub const HANIFI_ROHINGYA: Script = Script::from_bytes(b"Rohg");
    pub const HATRAN: Script = Script::from_bytes(b"Hatr");
    pub const HEBREW: Script = Script::from_bytes(b"Hebr");
    pub const HIRAGANA: Script = Script::from_bytes(b"Hira");
    pub const IMPERIAL_ARAMAIC: Script = Script::from_bytes(b"Armi");
    pub const INSCRIPTIONAL_PAHLAVI: Script = Script::from_bytes(b"Phli");
    pub const INSCRIPTIONAL_PARTHIAN: Script = Script::from_bytes(b"Prti");
    pub const JAVANESE: Script = Script::from_bytes(b"Java");
    pub const KANNADA: Script = Script::from_bytes(b"Knda");
    pub const KATAKANA: Script = Script::from_bytes(b"Kana");
    pub const KHAROSHTHI: Script = Script::from_bytes(b"Khar");
    pub const KHMER: Script = Script::from_bytes(b"Khmr");
    pub const LAO: Script = Script::from_bytes(b"Laoo");
    pub const LATIN: Script = Script::from_bytes(b"Latn");
    pub const LYDIAN: Script = Script::from_bytes(b"Lydi");
    pub const MALAYALAM: Script = Script::from_bytes(b"Mlym");
    pub const MANDAIC: Script = Script::from_bytes(b"Mand");
    pub const MANICHAEAN: Script = Script::from_bytes(b"Mani");
    pub const MENDE_KIKAKUI: Script = Script::from_bytes(b"Mend");
    pub const MEROITIC_CURSIVE: Script = Script::from_bytes(b"Merc");
    pub const MEROITIC_HIEROGLYPHS: Script = Script::from_bytes(b"Mero");
    pub const MONGOLIAN: Script = Script::from_bytes(b"Mong");
    pub const MYANMAR: Script = Script::from_bytes(b"Mymr");
    pub const NABATAEAN: Script = Script::from_bytes(b"Nbat");
    pub const NEW_TAI_LUE: Script = Script::from_bytes(b"Talu");
    pub const NKO: Script = Script::from_bytes(b"Nkoo");
    pub const OLD_HUNGARIAN: Script = Script::from_bytes(b"Hung");
    pub const OLD_ITALIC: Script = Script::from_bytes(b"Ital");
    pub const OLD_NORTH_ARABIAN: Script = Script::from_bytes(b"Narb");
    pub const OLD_SOGDIAN: Script = Script::from_bytes(b"Sogo");
    pub const OLD_SOUTH_ARABIAN: Script = Script::from_bytes(b"Sarb");
    pub const OLD_TURKIC: Script = Script::from_bytes(b"Orkh");
    pub const ORIYA: Script = Script::from_bytes(b"Orya");
    pub const PALMYRENE: Script = Script::from_bytes(b"Palm");
    pub const PHAGS_PA: Script = Script::from_bytes(b"Phag");
    pub const PHOENICIAN: Script = Script::from_bytes(b"Phnx");
    pub const PSALTER_PAHLAVI: Script = Script::from_bytes(b"Phlp");
    pub const RUNIC: Script = Script::from_bytes(b"Runr");
    pub const SAMARITAN: Script = Script::from_bytes(b"Samr");
    pub const SINHALA: Script = Script::from_bytes(b"Sinh");
    pub const SOGDIAN: Script = Script::from_bytes(b"Sogd");
    pub const SUNDANESE: Script = Script::from_bytes(b"Sund");
    pub const SYRIAC: Script = Script::from_bytes(b"Syrc");
    pub const TAI_THAM: Script = Script::from_bytes(b"Lana");
    pub const TAI_VIET: Script = Script::from_bytes(b"Tavt");
    pub const TAMIL: Script = Script::from_bytes(b"Taml");
    pub const TELUGU: Script = Script::from_bytes(b"Telu");
    pub const THAANA: Script = Script::from_bytes(b"Thaa");
    pub const THAI: Script = Script::from_bytes(b"Thai");
    pub const TIBETAN: Script = Script::from_bytes(b"Tibt");
    pub const VAI: Script = Script::from_bytes(b"Vaii");
    pub const YI: Script = Script::from_bytes(b"Yiii");
}

/// Properties shared by every character of a shaped run.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SegmentProperties {
    /// Run direction.
    pub direction: Direction,
    /// Run script.
    pub script: Option<Script>,
    /// Run language.
    pub language: Option<Language>,
}

impl Default for SegmentProperties {
    fn default() -> Self {
        SegmentProperties {
            direction: Direction::Invalid,
            script: None,
            language: None,
        }
    }
}

/// A feature tag with an accompanying range and value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Feature {
    /// The tag of the feature.
    pub tag: Tag,
    /// The value of the feature. 0 disables it, 1 enables it, higher values
    /// select an alternate.
    pub value: u32,
    /// The cluster to start applying this feature setting (inclusive).
    pub start: u32,
    /// The cluster to end applying this feature setting (exclusive).
    pub end: u32,
}

impl Feature {
    /// Create a new `Feature` struct.
    pub fn new(tag: Tag, value: u32, range: impl RangeBounds<usize>) -> Feature {
        let max = u32::MAX as usize;
        let start = match range.start_bound() {
            Bound::Included(&included) => included.min(max) as u32,
            Bound::Excluded(&excluded) => excluded.min(max - 1) as u32 + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&included) => included.min(max - 1) as u32 + 1,
            Bound::Excluded(&excluded) => excluded.min(max) as u32,
            Bound::Unbounded => u32::MAX,
        };

        Feature { tag, value, start, end }
    }

    /// Parses a comma-separated feature list, like `"kern,-liga,smcp[3:5]"`.
    ///
    /// Empty items are skipped.
    pub fn parse_list(list: &str) -> Result<Vec<Feature>, ShapeError> {
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| item.parse().map_err(|_| ShapeError::InvalidFeature(item.into())))
            .collect()
    }

    #[inline]
    pub(crate) fn is_global(&self) -> bool {
        self.start == 0 && self.end == u32::MAX
    }
}

impl core::str::FromStr for Feature {
    type Err = &'static str;

    /// Parses a `Feature` form a string.
    ///
    /// Possible values:
    ///
    /// - `kern` -> kern .. 1
    /// - `+kern` -> kern .. 1
    /// - `-kern` -> kern .. 0
    /// - `kern=0` -> kern .. 0
    /// - `kern=1` -> kern .. 1
    /// - `aalt=2` -> altr .. 2
    /// - `kern[]` -> kern .. 1
    /// - `kern[:]` -> kern .. 1
    /// - `kern[5:]` -> kern 5.. 1
    /// - `kern[:5]` -> kern ..=5 1
    /// - `kern[3:5]` -> kern 3..=5 1
    /// - `kern[3]` -> kern 3..=4 1
    /// - `aalt[3:5]=2` -> kern 3..=5 1
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut p = FeatureParser::new(s);

        let mut value = 1;
        match p.peek() {
            Some(b'-') => {
                value = 0;
                p.bump();
            }
            Some(b'+') => p.bump(),
            _ => {}
        }

        let tag = p.tag()?;

        let mut start = 0;
        let mut end = u32::MAX;
        if p.eat(b'[') {
            if let Some(n) = p.number() {
                start = n;
                end = n.saturating_add(1);
            }

            if p.eat(b':') || p.eat(b';') {
                end = p.number().map(|n| n.saturating_add(1)).unwrap_or(u32::MAX);
            }

            if !p.eat(b']') {
                return Err("invalid feature range");
            }
        }

        if p.eat(b'=') {
            value = match p.number() {
                Some(n) => n,
                None if p.eat_keyword("on") => 1,
                None if p.eat_keyword("off") => 0,
                None => return Err("invalid feature value"),
            };
        }

        if !p.at_end() {
            return Err("invalid feature");
        }

        Ok(Feature { tag, value, start, end })
    }
}

struct FeatureParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FeatureParser<'a> {
    fn new(s: &'a str) -> Self {
        FeatureParser { bytes: s.trim().as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        let kw = kw.as_bytes();
        if self.bytes[self.pos..].starts_with(kw) {
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    fn tag(&mut self) -> Result<Tag, &'static str> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                self.bump();
                Some(q)
            }
            _ => None,
        };

        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || (quote.is_some() && c == b' ') {
                self.bump();
            } else {
                break;
            }
        }

        let raw = &self.bytes[start..self.pos];
        if let Some(q) = quote {
            if !self.eat(q) || raw.len() != 4 {
                return Err("invalid feature tag");
            }
        }

        if raw.is_empty() || raw.len() > 4 {
            return Err("invalid feature tag");
        }

        let mut bytes = [b' '; 4];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Tag::from_bytes(&bytes))
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }

        core::str::from_utf8(&self.bytes[start..self.pos]).ok()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn parse_feature_forms() {
        let kern = Tag::from_bytes(b"kern");

        assert_eq!(Feature::from_str("kern").unwrap(), Feature::new(kern, 1, ..));
        assert_eq!(Feature::from_str("-kern").unwrap(), Feature::new(kern, 0, ..));
        assert_eq!(Feature::from_str("kern=0").unwrap(), Feature::new(kern, 0, ..));
        assert_eq!(Feature::from_str("kern[3:5]").unwrap(), Feature::new(kern, 1, 3..=5));
        assert_eq!(Feature::from_str("kern[3]").unwrap(), Feature::new(kern, 1, 3..=3));
        assert_eq!(Feature::from_str("kern[5:]").unwrap(), Feature::new(kern, 1, 5..));
        assert_eq!(Feature::from_str("kern[:5]").unwrap(), Feature::new(kern, 1, ..=5));
        assert_eq!(
            Feature::from_str("aalt[3:5]=2").unwrap(),
            Feature::new(Tag::from_bytes(b"aalt"), 2, 3..=5)
        );
        assert_eq!(Feature::from_str("'liga'=off").unwrap(), Feature::new(Tag::from_bytes(b"liga"), 0, ..));
        assert_eq!(Feature::from_str("ss1").unwrap().tag, Tag::from_bytes(b"ss1 "));
    }

    #[test]
    fn reject_malformed_features() {
        assert!(Feature::from_str("").is_err());
        assert!(Feature::from_str("kern[3").is_err());
        assert!(Feature::from_str("toolong").is_err());
        assert!(Feature::from_str("kern=x").is_err());
    }

    #[test]
    fn parse_feature_lists() {
        let list = Feature::parse_list("kern, -liga,,smcp[2]").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1], Feature::new(Tag::from_bytes(b"liga"), 0, ..));

        assert!(matches!(
            Feature::parse_list("kern,[1]"),
            Err(ShapeError::InvalidFeature(item)) if item == "[1]"
        ));
    }

    #[test]
    fn direction_from_str_uses_first_letter() {
        assert_eq!(Direction::from_str("rtl"), Ok(Direction::RightToLeft));
        assert_eq!(Direction::from_str("TTB"), Ok(Direction::TopToBottom));
        assert!(Direction::from_str("x").is_err());
    }

    #[test]
    fn indic_scripts_prefer_new_tags() {
        let tags = script::DEVANAGARI.ot_tags();
        assert_eq!(
            tags.as_slice(),
            &[Tag::from_bytes(b"dev3"), Tag::from_bytes(b"dev2"), Tag::from_bytes(b"deva")]
        );
        assert_eq!(script::LAO.ot_tags().as_slice(), &[Tag::from_bytes(b"lao ")]);
    }

    #[test]
    fn language_maps_to_ot_tags() {
        let tags = |s: &str| Language::from_str(s).unwrap().ot_tags();
        assert_eq!(tags("hi").as_slice(), &[Tag::from_bytes(b"HIN ")]);
        assert_eq!(tags("sr-Latn-RS").as_slice(), &[Tag::from_bytes(b"SRB ")]);
        assert_eq!(tags("xyz").as_slice(), &[Tag::from_bytes(b"XYZ ")]);
        assert_eq!(tags("en-x-hbotabcd").as_slice(), &[Tag::from_bytes(b"ABCD")]);
        assert!(Language::from_str("qaag").unwrap().is_zawgyi());
    }

    #[test]
    fn language_table_is_sorted() {
        assert!(LANGUAGE_TAGS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn script_from_str_is_lenient() {
        assert_eq!(Script::from_str("arab"), Ok(script::ARABIC));
        assert_eq!(Script::from_str("Latf"), Ok(script::LATIN));
    }
}
