use ttf_parser::opentype_layout::LayoutTable;
use ttf_parser::{GlyphId, PlatformId};

use crate::common::Direction;
use crate::error::ShapeError;
use crate::ot::LookupEngine;

// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap#windows-platform-platform-id--3
const WINDOWS_SYMBOL_ENCODING: u16 = 0;
const WINDOWS_UNICODE_BMP_ENCODING: u16 = 1;
const WINDOWS_UNICODE_FULL_ENCODING: u16 = 10;

// https://docs.microsoft.com/en-us/typography/opentype/spec/name#platform-specific-encoding-and-language-ids-unicode-platform-platform-id--0
const UNICODE_1_0_ENCODING: u16 = 0;
const UNICODE_1_1_ENCODING: u16 = 1;
const UNICODE_ISO_ENCODING: u16 = 2;
const UNICODE_2_0_BMP_ENCODING: u16 = 3;
const UNICODE_2_0_FULL_ENCODING: u16 = 4;
const UNICODE_FULL_ENCODING: u16 = 6;

/// Glyph ink box in font units, y axis pointing up.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GlyphExtents {
    /// Left side of glyph from origin.
    pub x_bearing: i32,
    /// Top side of glyph from origin.
    pub y_bearing: i32,
    /// Distance from left to right side.
    pub width: i32,
    /// Distance from top to bottom side, negative for the usual case.
    pub height: i32,
}

/// Glyph repertoire and metrics of a font.
///
/// All distances are in font units.
pub trait FontBackend {
    /// Font design units per em.
    fn units_per_em(&self) -> i32;

    /// Maps a character, optionally under a variation selector, to a glyph.
    fn glyph(&self, c: char, variation_selector: Option<char>) -> Option<u32>;

    /// Checks that the font maps `c` to a glyph.
    fn has_glyph(&self, c: char) -> bool {
        self.glyph(c, None).is_some()
    }

    /// Returns glyph extents, or `None` when the glyph has no outline data.
    fn glyph_extents(&self, glyph: u32) -> Option<GlyphExtents>;

    /// Horizontal advance.
    fn glyph_h_advance(&self, glyph: u32) -> i32;

    /// Vertical advance. Negative, since the y axis points up.
    fn glyph_v_advance(&self, _glyph: u32) -> i32 {
        -self.units_per_em()
    }

    /// Vertical origin of the glyph relative to its horizontal origin.
    fn glyph_v_origin(&self, glyph: u32) -> (i32, i32) {
        (self.glyph_h_advance(glyph) / 2, self.units_per_em())
    }

    /// Whether [`glyph_kerning`](Self::glyph_kerning) can return anything.
    fn has_kerning(&self) -> bool {
        false
    }

    /// Pair kerning adjustment applied to the first glyph of the pair.
    fn glyph_kerning(&self, _left: u32, _right: u32, _direction: Direction) -> (i32, i32) {
        (0, 0)
    }
}

/// The collaborators a shaping run works against.
#[derive(Clone, Copy)]
pub struct Font<'a> {
    pub(crate) backend: &'a dyn FontBackend,
    pub(crate) layout: &'a dyn LookupEngine,
}

impl<'a> Font<'a> {
    /// Pairs a font backend with a lookup engine.
    pub fn new(backend: &'a dyn FontBackend, layout: &'a dyn LookupEngine) -> Self {
        Font { backend, layout }
    }

    /// Uses a parsed [`Face`] as both the backend and the lookup engine.
    pub fn from_face(face: &'a Face<'a>) -> Self {
        Font {
            backend: face,
            layout: face,
        }
    }

    #[inline]
    pub(crate) fn has_glyph(&self, c: char) -> bool {
        self.backend.has_glyph(c)
    }

    #[inline]
    pub(crate) fn glyph(&self, c: char) -> Option<u32> {
        self.backend.glyph(c, None)
    }

    #[inline]
    pub(crate) fn variation_glyph(&self, c: char, vs: char) -> Option<u32> {
        self.backend.glyph(c, Some(vs))
    }

    #[inline]
    pub(crate) fn has_glyph_u32(&self, u: u32) -> bool {
        char::from_u32(u).is_some_and(|c| self.has_glyph(c))
    }
}

/// A font face backed by `ttf-parser`.
///
/// Implements [`FontBackend`] with `cmap`, `hmtx`/`vmtx`, `glyf` and `kern`
/// data and [`LookupEngine`] with the basic GSUB/GPOS interpreter.
#[derive(Clone)]
pub struct Face<'a> {
    pub(crate) ttfp_face: ttf_parser::Face<'a>,
    pub(crate) units_per_em: u16,
    preferred_cmap_encoding_subtable: Option<u16>,
    pub(crate) gsub: Option<LayoutTable<'a>>,
    pub(crate) gpos: Option<LayoutTable<'a>>,
}

impl<'a> core::ops::Deref for Face<'a> {
    type Target = ttf_parser::Face<'a>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.ttfp_face
    }
}

impl<'a> core::ops::DerefMut for Face<'a> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ttfp_face
    }
}

impl<'a> Face<'a> {
    /// Parses a face from font data.
    ///
    /// Data will be referenced, not owned.
    pub fn from_slice(data: &'a [u8], face_index: u32) -> Result<Self, ShapeError> {
        let face = ttf_parser::Face::parse(data, face_index)?;
        Ok(Self::from_face(face))
    }

    /// Wraps an already parsed [`ttf_parser::Face`].
    pub fn from_face(face: ttf_parser::Face<'a>) -> Self {
        Face {
            units_per_em: face.units_per_em(),
            preferred_cmap_encoding_subtable: find_best_cmap_subtable(&face),
            gsub: face.tables().gsub,
            gpos: face.tables().gpos,
            ttfp_face: face,
        }
    }

    fn nominal_glyph(&self, mut c: u32) -> Option<GlyphId> {
        let subtable_idx = self.preferred_cmap_encoding_subtable?;
        let subtable = self.tables().cmap?.subtables.get(subtable_idx)?;

        if subtable.platform_id == PlatformId::Macintosh && c > 0x7F {
            c = unicode_to_macroman(c);
        }

        if let Some(gid) = subtable.glyph_index(c) {
            return Some(gid);
        }

        // Symbol fonts duplicate U+F000..F0FF at U+0000..00FF.
        if subtable.platform_id == PlatformId::Windows
            && subtable.encoding_id == WINDOWS_SYMBOL_ENCODING
            && c <= 0x00FF
        {
            return self.nominal_glyph(0xF000 + c);
        }

        None
    }

    fn glyph_advance(&self, glyph: GlyphId, is_vertical: bool) -> u32 {
        let face = &self.ttfp_face;
        if is_vertical {
            match face.tables().vmtx {
                Some(_) => u32::from(face.glyph_ver_advance(glyph).unwrap_or(0)),
                None => (i32::from(face.ascender()) - i32::from(face.descender())).unsigned_abs(),
            }
        } else if face.tables().hmtx.is_some() {
            u32::from(face.glyph_hor_advance(glyph).unwrap_or(0))
        } else {
            u32::from(face.units_per_em())
        }
    }
}

impl FontBackend for Face<'_> {
    fn units_per_em(&self) -> i32 {
        i32::from(self.units_per_em)
    }

    fn glyph(&self, c: char, variation_selector: Option<char>) -> Option<u32> {
        let gid = match variation_selector {
            Some(vs) => self.ttfp_face.glyph_variation_index(c, vs)?,
            None => self.nominal_glyph(c as u32)?,
        };

        Some(u32::from(gid.0))
    }

    fn glyph_extents(&self, glyph: u32) -> Option<GlyphExtents> {
        let glyph = GlyphId(u16::try_from(glyph).ok()?);
        match self.ttfp_face.glyph_bounding_box(glyph) {
            Some(bbox) => Some(GlyphExtents {
                x_bearing: i32::from(bbox.x_min),
                y_bearing: i32::from(bbox.y_max),
                width: i32::from(bbox.width()),
                height: i32::from(bbox.y_min) - i32::from(bbox.y_max),
            }),
            // An empty `glyf` entry, like a space.
            None if self.ttfp_face.tables().glyf.is_some() => Some(GlyphExtents::default()),
            None => None,
        }
    }

    fn glyph_h_advance(&self, glyph: u32) -> i32 {
        match u16::try_from(glyph) {
            Ok(g) => self.glyph_advance(GlyphId(g), false) as i32,
            Err(_) => 0,
        }
    }

    fn glyph_v_advance(&self, glyph: u32) -> i32 {
        match u16::try_from(glyph) {
            Ok(g) => -(self.glyph_advance(GlyphId(g), true) as i32),
            Err(_) => 0,
        }
    }

    fn glyph_v_origin(&self, glyph: u32) -> (i32, i32) {
        let x = self.glyph_h_advance(glyph) / 2;
        let Ok(gid) = u16::try_from(glyph).map(GlyphId) else {
            return (x, i32::from(self.ttfp_face.ascender()));
        };

        if let Some(y) = self.ttfp_face.glyph_y_origin(gid) {
            return (x, i32::from(y));
        }

        let y = match self.glyph_extents(glyph) {
            Some(extents) if self.ttfp_face.tables().vmtx.is_some() => {
                let tsb = i32::from(self.ttfp_face.glyph_ver_side_bearing(gid).unwrap_or(0));
                extents.y_bearing + tsb
            }
            Some(extents) => {
                let advance = i32::from(self.ttfp_face.ascender()) - i32::from(self.ttfp_face.descender());
                let diff = advance + extents.height;
                extents.y_bearing + (diff >> 1)
            }
            None => i32::from(self.ttfp_face.ascender()),
        };

        (x, y)
    }

    fn has_kerning(&self) -> bool {
        self.ttfp_face.tables().kern.is_some_and(|kern| {
            kern.subtables
                .into_iter()
                .any(|s| !s.variable && !s.has_state_machine && !s.has_cross_stream)
        })
    }

    fn glyph_kerning(&self, left: u32, right: u32, direction: Direction) -> (i32, i32) {
        let (Ok(left), Ok(right)) = (u16::try_from(left), u16::try_from(right)) else {
            return (0, 0);
        };

        let Some(kern) = self.ttfp_face.tables().kern else {
            return (0, 0);
        };

        let horizontal = direction.is_horizontal();
        let mut value = 0;
        for subtable in kern.subtables {
            if subtable.variable || subtable.has_state_machine || subtable.horizontal != horizontal {
                continue;
            }

            if subtable.has_cross_stream {
                continue;
            }

            if let Some(v) = subtable.glyphs_kerning(GlyphId(left), GlyphId(right)) {
                value += i32::from(v);
            }
        }

        if horizontal {
            (value, 0)
        } else {
            (0, value)
        }
    }
}

fn find_best_cmap_subtable(face: &ttf_parser::Face) -> Option<u16> {
    // Prefer a symbol subtable when present.
    find_cmap_subtable(face, PlatformId::Windows, WINDOWS_SYMBOL_ENCODING)
        // 32-bit subtables.
        .or_else(|| find_cmap_subtable(face, PlatformId::Windows, WINDOWS_UNICODE_FULL_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_FULL_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_2_0_FULL_ENCODING))
        // 16-bit subtables.
        .or_else(|| find_cmap_subtable(face, PlatformId::Windows, WINDOWS_UNICODE_BMP_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_2_0_BMP_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_ISO_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_1_1_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_1_0_ENCODING))
        // MacRoman.
        .or_else(|| find_cmap_subtable(face, PlatformId::Macintosh, 0))
}

fn find_cmap_subtable(face: &ttf_parser::Face, platform_id: PlatformId, encoding_id: u16) -> Option<u16> {
    face.tables()
        .cmap?
        .subtables
        .into_iter()
        .position(|s| s.platform_id == platform_id && s.encoding_id == encoding_id)
        .map(|i| i as u16)
}

#[rustfmt::skip]
static UNICODE_TO_MACROMAN: &[u16] = &[
    0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1,
    0x00E0, 0x00E2, 0x00E4, 0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8,
    0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF, 0x00F1, 0x00F3,
    0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC,
    0x2020, 0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF,
    0x00AE, 0x00A9, 0x2122, 0x00B4, 0x00A8, 0x2260, 0x00C6, 0x00D8,
    0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202, 0x2211,
    0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8,
    0x00BF, 0x00A1, 0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB,
    0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3, 0x00D5, 0x0152, 0x0153,
    0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA,
    0x00FF, 0x0178, 0x2044, 0x20AC, 0x2039, 0x203A, 0xFB01, 0xFB02,
    0x2021, 0x00B7, 0x201A, 0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1,
    0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC, 0x00D3, 0x00D4,
    0xF8FF, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC,
    0x00AF, 0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
];

fn unicode_to_macroman(c: u32) -> u32 {
    let Ok(u) = u16::try_from(c) else {
        return 0;
    };

    match UNICODE_TO_MACROMAN.iter().position(|m| *m == u) {
        Some(index) => (0x80 + index) as u32,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macroman_maps_high_half() {
        assert_eq!(unicode_to_macroman(0x00C4), 0x80);
        assert_eq!(unicode_to_macroman(0x02C7), 0xFF);
        assert_eq!(unicode_to_macroman(0x4E00), 0);
    }

    struct Minimal;

    impl FontBackend for Minimal {
        fn units_per_em(&self) -> i32 {
            2048
        }

        fn glyph(&self, _: char, _: Option<char>) -> Option<u32> {
            None
        }

        fn glyph_extents(&self, _: u32) -> Option<GlyphExtents> {
            None
        }

        fn glyph_h_advance(&self, glyph: u32) -> i32 {
            glyph as i32 * 100
        }
    }

    #[test]
    fn default_vertical_metrics() {
        assert_eq!(Minimal.glyph_v_advance(3), -2048);
        assert_eq!(Minimal.glyph_v_origin(3), (150, 2048));
        assert_eq!(Minimal.glyph_kerning(1, 2, Direction::LeftToRight), (0, 0));
    }

    #[test]
    fn garbage_data_is_a_parse_error() {
        let err = Face::from_slice(&[0, 1, 2, 3], 0).err();
        assert!(matches!(err, Some(ShapeError::FontParse(_))));
    }
}
