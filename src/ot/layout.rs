//! The lookup engine contract.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use crate::buffer::{Buffer, GlyphInfo, GlyphPropsFlags};
use crate::common::Tag;
use crate::Mask;

pub(crate) mod lookup_flags {
    pub const RIGHT_TO_LEFT: u16 = 0x0001;
    pub const IGNORE_BASE_GLYPHS: u16 = 0x0002;
    pub const IGNORE_LIGATURES: u16 = 0x0004;
    pub const IGNORE_MARKS: u16 = 0x0008;
    pub const IGNORE_FLAGS: u16 = 0x000E;
    pub const USE_MARK_FILTERING_SET: u16 = 0x0010;
    pub const MARK_ATTACHMENT_TYPE_MASK: u16 = 0xFF00;
}

/// GSUB or GPOS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableIndex {
    /// Glyph substitution.
    GSUB = 0,
    /// Glyph positioning.
    GPOS = 1,
}

impl TableIndex {
    /// Both tables, in application order.
    pub fn iter() -> impl Iterator<Item = TableIndex> {
        [Self::GSUB, Self::GPOS].into_iter()
    }
}

impl<T> Index<TableIndex> for [T] {
    type Output = T;

    fn index(&self, table_index: TableIndex) -> &Self::Output {
        &self[table_index as usize]
    }
}

impl<T> IndexMut<TableIndex> for [T] {
    fn index_mut(&mut self, table_index: TableIndex) -> &mut Self::Output {
        &mut self[table_index as usize]
    }
}

/// GDEF glyph class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlyphClass {
    /// Single character, spacing glyph.
    Base,
    /// Multiple character, spacing glyph.
    Ligature,
    /// Non-spacing combining glyph.
    Mark,
    /// Part of single character, spacing glyph.
    Component,
}

/// A lookup scheduled by a compiled map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupMap {
    /// Lookup index in its table.
    pub index: u16,
    /// Glyphs whose mask does not intersect this are left alone.
    pub mask: Mask,
    /// Skip ZWNJ while matching context.
    pub auto_zwnj: bool,
    /// Skip ZWJ while matching input.
    pub auto_zwj: bool,
    /// Pick a random alternate.
    pub random: bool,
    /// Matches must not cross syllable boundaries.
    pub per_syllable: bool,
}

/// The collaborator that resolves features to lookups and applies them.
///
/// Scripts, languages and features are addressed by tag; indices stay
/// private to the implementation.
pub trait LookupEngine {
    /// Whether the font carries the table at all.
    fn has_table(&self, table: TableIndex) -> bool;

    /// Picks the first of `script_tags` present in `table`.
    ///
    /// Falls back to `DFLT`, `dflt` and `latn`. The flag is `true` when the
    /// chosen tag was one of the requested ones.
    fn select_script(&self, table: TableIndex, script_tags: &[Tag]) -> Option<(Tag, bool)>;

    /// Picks the first of `language_tags` present under `script`.
    ///
    /// `None` selects the default language system.
    fn select_language(&self, table: TableIndex, script: Tag, language_tags: &[Tag]) -> Option<Tag>;

    /// The required feature of a language system, with its lookups.
    fn required_feature(
        &self,
        table: TableIndex,
        script: Tag,
        language: Option<Tag>,
    ) -> Option<(Tag, Vec<u16>)>;

    /// Lookups implementing `feature` in a language system.
    ///
    /// `None` means the feature is absent, unlike an empty list.
    fn lookups_for_feature(
        &self,
        table: TableIndex,
        script: Tag,
        language: Option<Tag>,
        feature: Tag,
    ) -> Option<Vec<u16>>;

    /// Lookups of the first `feature` record anywhere in the feature list.
    fn lookups_for_feature_anywhere(&self, _table: TableIndex, _feature: Tag) -> Option<Vec<u16>> {
        None
    }

    /// Whether a GSUB lookup would substitute `glyphs` starting at its
    /// first glyph. Has no side effects.
    fn lookup_would_substitute(&self, lookup_index: u16, glyphs: &[u32], zero_context: bool) -> bool;

    /// Applies `lookups` in order to the buffer.
    ///
    /// Implementations must honour each lookup's mask and the skip rules
    /// of the lookup flags.
    fn apply_lookups(&self, table: TableIndex, buffer: &mut Buffer, lookups: &[LookupMap]);

    /// GDEF class of a glyph.
    fn glyph_class(&self, _glyph: u32) -> Option<GlyphClass> {
        None
    }

    /// GDEF mark attachment class of a glyph.
    fn mark_attachment_class(&self, _glyph: u32) -> u8 {
        0
    }

    /// Whether GDEF assigns glyph classes.
    fn has_glyph_classes(&self) -> bool {
        false
    }

    /// Whether `glyph` belongs to GDEF mark glyph set `set_index`.
    fn is_mark_glyph(&self, _glyph: u32, _set_index: u16) -> bool {
        false
    }

    /// Adds every glyph the GSUB lookup can produce from `glyphs`.
    fn closure_lookup(&self, _lookup_index: u16, _glyphs: &mut BTreeSet<u32>) {}
}

/// A lookup engine for fonts without layout tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLayout;

impl LookupEngine for NoLayout {
    fn has_table(&self, _: TableIndex) -> bool {
        false
    }

    fn select_script(&self, _: TableIndex, _: &[Tag]) -> Option<(Tag, bool)> {
        None
    }

    fn select_language(&self, _: TableIndex, _: Tag, _: &[Tag]) -> Option<Tag> {
        None
    }

    fn required_feature(&self, _: TableIndex, _: Tag, _: Option<Tag>) -> Option<(Tag, Vec<u16>)> {
        None
    }

    fn lookups_for_feature(&self, _: TableIndex, _: Tag, _: Option<Tag>, _: Tag) -> Option<Vec<u16>> {
        None
    }

    fn lookup_would_substitute(&self, _: u16, _: &[u32], _: bool) -> bool {
        false
    }

    fn apply_lookups(&self, _: TableIndex, _: &mut Buffer, _: &[LookupMap]) {}
}

/// Glyph properties from GDEF, as stored in `GlyphInfo::glyph_props`.
pub(crate) fn glyph_props(engine: &dyn LookupEngine, glyph: u32) -> u16 {
    match engine.glyph_class(glyph) {
        Some(GlyphClass::Base) => GlyphPropsFlags::BASE_GLYPH.bits(),
        Some(GlyphClass::Ligature) => GlyphPropsFlags::LIGATURE.bits(),
        Some(GlyphClass::Mark) => {
            let class = u16::from(engine.mark_attachment_class(glyph));
            (class << 8) | GlyphPropsFlags::MARK.bits()
        }
        _ => 0,
    }
}

/// Loads GDEF properties for every glyph and resets ligature state.
pub(crate) fn set_glyph_props(engine: &dyn LookupEngine, buffer: &mut Buffer) {
    for info in buffer.info_slice_mut() {
        info.glyph_props = glyph_props(engine, info.glyph_id);
        info.lig_props = 0;
    }
}

/// Whether a glyph takes part in matching under `match_props`.
///
/// The low 16 bits of `match_props` are the lookup flags, the high 16 bits
/// the mark filtering set.
pub(crate) fn check_glyph_property(engine: &dyn LookupEngine, info: &GlyphInfo, match_props: u32) -> bool {
    let glyph_props = info.glyph_props;
    let lookup_flags = match_props as u16;

    // Class ignored by the lookup.
    if glyph_props & lookup_flags & lookup_flags::IGNORE_FLAGS != 0 {
        return false;
    }

    if glyph_props & GlyphPropsFlags::MARK.bits() != 0 {
        if lookup_flags & lookup_flags::USE_MARK_FILTERING_SET != 0 {
            return engine.is_mark_glyph(info.glyph_id, (match_props >> 16) as u16);
        }

        // Ignore marks of attachment type different from the requested one.
        if lookup_flags & lookup_flags::MARK_ATTACHMENT_TYPE_MASK != 0 {
            return (lookup_flags & lookup_flags::MARK_ATTACHMENT_TYPE_MASK)
                == (glyph_props & lookup_flags::MARK_ATTACHMENT_TYPE_MASK);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MarksOnly;

    impl LookupEngine for MarksOnly {
        fn has_table(&self, _: TableIndex) -> bool {
            true
        }

        fn select_script(&self, _: TableIndex, _: &[Tag]) -> Option<(Tag, bool)> {
            None
        }

        fn select_language(&self, _: TableIndex, _: Tag, _: &[Tag]) -> Option<Tag> {
            None
        }

        fn required_feature(&self, _: TableIndex, _: Tag, _: Option<Tag>) -> Option<(Tag, Vec<u16>)> {
            None
        }

        fn lookups_for_feature(&self, _: TableIndex, _: Tag, _: Option<Tag>, _: Tag) -> Option<Vec<u16>> {
            None
        }

        fn lookup_would_substitute(&self, _: u16, _: &[u32], _: bool) -> bool {
            false
        }

        fn apply_lookups(&self, _: TableIndex, _: &mut Buffer, _: &[LookupMap]) {}

        fn glyph_class(&self, glyph: u32) -> Option<GlyphClass> {
            Some(if glyph >= 100 { GlyphClass::Mark } else { GlyphClass::Base })
        }

        fn mark_attachment_class(&self, glyph: u32) -> u8 {
            if glyph >= 200 {
                2
            } else {
                1
            }
        }
    }

    fn info_for(engine: &dyn LookupEngine, glyph: u32) -> GlyphInfo {
        GlyphInfo {
            glyph_id: glyph,
            glyph_props: glyph_props(engine, glyph),
            ..GlyphInfo::default()
        }
    }

    #[test]
    fn ignore_marks_skips_marks_only() {
        let props = u32::from(lookup_flags::IGNORE_MARKS);
        assert!(check_glyph_property(&MarksOnly, &info_for(&MarksOnly, 5), props));
        assert!(!check_glyph_property(&MarksOnly, &info_for(&MarksOnly, 150), props));
    }

    #[test]
    fn mark_attachment_type_filters() {
        let props = 0x0200;
        assert!(!check_glyph_property(&MarksOnly, &info_for(&MarksOnly, 150), props));
        assert!(check_glyph_property(&MarksOnly, &info_for(&MarksOnly, 250), props));
    }
}
