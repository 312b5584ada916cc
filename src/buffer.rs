use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use bitflags::bitflags;

use crate::common::{Direction, Language, Script, SegmentProperties};
use crate::unicode::{self, CharExt, GeneralCategory, GeneralCategoryExt, Space};
use crate::Mask;

const CONTEXT_LENGTH: usize = 5;

pub(crate) mod glyph_flag {
    /// Breaking the text before this glyph requires reshaping.
    pub const UNSAFE_TO_BREAK: u32 = 0x0000_0001;
    /// Concatenating text around this glyph requires reshaping.
    pub const UNSAFE_TO_CONCAT: u32 = 0x0000_0002;
    pub const DEFINED: u32 = 0x0000_0003;
}

/// Limits that keep shaping bounded on adversarial input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferLimits {
    /// The output may grow to at most `len * max_len_factor` glyphs.
    pub max_len_factor: usize,
    /// Lower bound for the output length limit.
    pub max_len_min: usize,
    /// At most `len * max_ops_factor` buffer operations are performed.
    pub max_ops_factor: i32,
    /// Lower bound for the operation budget.
    pub max_ops_min: i32,
}

impl Default for BufferLimits {
    fn default() -> Self {
        BufferLimits {
            max_len_factor: 64,
            max_len_min: 16384,
            max_ops_factor: 1024,
            max_ops_min: 16384,
        }
    }
}

/// Holds the positions of the glyph in both horizontal and vertical directions.
///
/// All positions are relative to the current point.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GlyphPosition {
    /// How much the line advances after drawing this glyph when setting text in
    /// horizontal direction.
    pub x_advance: i32,
    /// How much the line advances after drawing this glyph when setting text in
    /// vertical direction.
    pub y_advance: i32,
    /// How much the glyph moves on the X-axis before drawing it, this should not
    /// affect how much the line advances.
    pub x_offset: i32,
    /// How much the glyph moves on the Y-axis before drawing it, this should not
    /// affect how much the line advances.
    pub y_offset: i32,
}

bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
    pub(crate) struct UnicodeFlags: u8 {
        const IGNORABLE     = 1 << 0;
        const HIDDEN        = 1 << 1;
        const CONTINUATION  = 1 << 2;
        const ZWNJ          = 1 << 3;
        const ZWJ           = 1 << 4;
    }
}

/// Unicode properties computed once per character before substitution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct UnicodeProps {
    pub general_category: GeneralCategory,
    pub combining_class: u8,
    pub flags: UnicodeFlags,
    /// Set when the normalizer mapped a missing space to the space glyph.
    pub space: Option<Space>,
}

impl Default for UnicodeProps {
    fn default() -> Self {
        UnicodeProps {
            general_category: GeneralCategory::Unassigned,
            combining_class: 0,
            flags: UnicodeFlags::empty(),
            space: None,
        }
    }
}

bitflags! {
    /// Glyph properties, from GDEF or synthesized from Unicode.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
    pub(crate) struct GlyphPropsFlags: u16 {
        // The following three match LookupFlags::Ignore* numbers.
        const BASE_GLYPH    = 0x02;
        const LIGATURE      = 0x04;
        const MARK          = 0x08;
        const CLASS_MASK    = Self::BASE_GLYPH.bits() | Self::LIGATURE.bits() | Self::MARK.bits();

        // The following are used internally; not derived from GDEF.
        const SUBSTITUTED   = 0x10;
        const LIGATED       = 0x20;
        const MULTIPLIED    = 0x40;

        const PRESERVE      = Self::SUBSTITUTED.bits() | Self::LIGATED.bits() | Self::MULTIPLIED.bits();
    }
}

/// Per-glyph state owned by the complex shaper of the current plan.
///
/// Only the shaper that wrote a variant reads it back; everything else sees
/// `None` semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum ShaperVar {
    #[default]
    None,
    /// Index into the Arabic feature list, set by the joining automaton.
    Arabic(u8),
    /// Which jamo feature a decomposed Hangul glyph receives.
    Jamo(u8),
    /// Syllabic category and visual position (Indic, Khmer, Myanmar).
    Syllabic { category: u8, position: u8 },
}

/// A glyph info.
#[derive(Clone, Copy, Default, Debug)]
pub struct GlyphInfo {
    /// A Unicode codepoint before glyph mapping, a glyph index after it.
    pub glyph_id: u32,
    pub(crate) mask: Mask,
    /// An index to the start of the grapheme cluster in the original string.
    pub cluster: u32,
    pub(crate) unicode: UnicodeProps,
    /// Glyph id resolved during normalization, copied into `glyph_id` later.
    pub(crate) glyph_index: u32,
    pub(crate) glyph_props: u16,
    pub(crate) lig_props: u8,
    pub(crate) syllable: u8,
    pub(crate) shaper: ShaperVar,
}

const IS_LIG_BASE: u8 = 0x10;

impl GlyphInfo {
    /// Indicates that if input text is broken at the beginning of the cluster
    /// this glyph is part of, then both sides need to be re-shaped, as the
    /// result might be different.
    pub fn unsafe_to_break(&self) -> bool {
        self.mask & glyph_flag::UNSAFE_TO_BREAK != 0
    }

    #[inline]
    pub(crate) fn as_char(&self) -> char {
        char::from_u32(self.glyph_id).unwrap_or('\u{FFFD}')
    }

    /// Feature mask of the glyph.
    #[inline]
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Replaces the glyph id and records that a lookup substituted it.
    ///
    /// Intended for [`LookupEngine`](crate::ot::LookupEngine) implementations.
    pub fn substitute(&mut self, glyph_id: u32) {
        self.glyph_id = glyph_id;
        self.glyph_props |= GlyphPropsFlags::SUBSTITUTED.bits();
    }

    pub(crate) fn init_unicode_props(&mut self, scratch: &mut BufferScratchFlags) {
        let u = self.as_char();
        let gc = u.general_category();
        let mut props = UnicodeProps {
            general_category: gc,
            combining_class: 0,
            flags: UnicodeFlags::empty(),
            space: None,
        };

        if u as u32 >= 0x80 {
            *scratch |= BufferScratchFlags::HAS_NON_ASCII;

            if unicode::is_default_ignorable(u as u32) {
                *scratch |= BufferScratchFlags::HAS_DEFAULT_IGNORABLES;
                props.flags |= UnicodeFlags::IGNORABLE;

                match u as u32 {
                    unicode::ZWNJ => props.flags |= UnicodeFlags::ZWNJ,
                    unicode::ZWJ => props.flags |= UnicodeFlags::ZWJ,
                    // Mongolian free variation selectors are hidden like default
                    // ignorables, but take part in shaping.
                    0x180B..=0x180D | 0x180F => props.flags |= UnicodeFlags::HIDDEN,
                    // Same for tag characters.
                    0xE0020..=0xE007F => props.flags |= UnicodeFlags::HIDDEN,
                    // Combining grapheme joiner must not be skipped during GSUB.
                    unicode::CGJ => {
                        *scratch |= BufferScratchFlags::HAS_CGJ;
                        props.flags |= UnicodeFlags::HIDDEN;
                    }
                    _ => {}
                }
            }

            if gc.is_mark() {
                props.flags |= UnicodeFlags::CONTINUATION;
                props.combining_class = u.modified_combining_class();
            }
        }

        self.unicode = props;
    }

    #[inline]
    pub(crate) fn general_category(&self) -> GeneralCategory {
        self.unicode.general_category
    }

    #[inline]
    pub(crate) fn set_general_category(&mut self, gc: GeneralCategory) {
        // Clears the combining class as well, like a fresh property lookup would.
        self.unicode.general_category = gc;
        if !gc.is_mark() {
            self.unicode.combining_class = 0;
        }
    }

    #[inline]
    pub(crate) fn modified_combining_class(&self) -> u8 {
        if self.is_unicode_mark() {
            self.unicode.combining_class
        } else {
            0
        }
    }

    #[inline]
    pub(crate) fn set_modified_combining_class(&mut self, mcc: u8) {
        if self.is_unicode_mark() {
            self.unicode.combining_class = mcc;
        }
    }

    #[inline]
    pub(crate) fn is_unicode_mark(&self) -> bool {
        self.general_category().is_mark()
    }

    #[inline]
    pub(crate) fn is_default_ignorable(&self) -> bool {
        self.unicode.flags.contains(UnicodeFlags::IGNORABLE) && !self.is_ligated()
    }

    #[inline]
    pub(crate) fn is_hidden(&self) -> bool {
        self.unicode.flags.contains(UnicodeFlags::HIDDEN)
    }

    #[inline]
    pub(crate) fn unhide(&mut self) {
        self.unicode.flags.remove(UnicodeFlags::HIDDEN);
    }

    #[inline]
    pub(crate) fn is_continuation(&self) -> bool {
        self.unicode.flags.contains(UnicodeFlags::CONTINUATION)
    }

    #[inline]
    pub(crate) fn set_continuation(&mut self) {
        self.unicode.flags |= UnicodeFlags::CONTINUATION;
    }

    #[inline]
    pub(crate) fn reset_continuation(&mut self) {
        self.unicode.flags.remove(UnicodeFlags::CONTINUATION);
    }

    #[inline]
    pub(crate) fn is_zwnj(&self) -> bool {
        self.unicode.flags.contains(UnicodeFlags::ZWNJ)
    }

    #[inline]
    pub(crate) fn is_zwj(&self) -> bool {
        self.unicode.flags.contains(UnicodeFlags::ZWJ)
    }

    #[inline]
    pub(crate) fn space_fallback(&self) -> Option<Space> {
        if self.general_category() == GeneralCategory::SpaceSeparator {
            self.as_char().space_fallback()
        } else {
            None
        }
    }

    /// The space this glyph stands in for, if it was synthesized.
    #[inline]
    pub(crate) fn fallback_space(&self) -> Option<Space> {
        self.unicode.space
    }

    #[inline]
    pub(crate) fn set_fallback_space(&mut self, space: Space) {
        self.unicode.space = Some(space);
    }

    #[inline]
    pub(crate) fn glyph_props(&self) -> GlyphPropsFlags {
        GlyphPropsFlags::from_bits_truncate(self.glyph_props)
    }

    #[inline]
    pub(crate) fn set_glyph_props(&mut self, props: GlyphPropsFlags) {
        self.glyph_props = props.bits();
    }

    #[inline]
    pub(crate) fn is_base_glyph(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::BASE_GLYPH)
    }

    #[inline]
    pub(crate) fn is_ligature(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::LIGATURE)
    }

    #[inline]
    pub(crate) fn is_mark(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::MARK)
    }

    #[inline]
    pub(crate) fn is_substituted(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::SUBSTITUTED)
    }

    #[inline]
    pub(crate) fn is_ligated(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::LIGATED)
    }

    #[inline]
    pub(crate) fn is_multiplied(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::MULTIPLIED)
    }

    #[inline]
    pub(crate) fn clear_ligated_and_multiplied(&mut self) {
        let props = self.glyph_props() - (GlyphPropsFlags::LIGATED | GlyphPropsFlags::MULTIPLIED);
        self.set_glyph_props(props);
    }

    // Ligature properties: the upper three bits are the ligature id, bit 4
    // marks the ligature glyph itself, the low nibble is either the number of
    // components (for the ligature) or the component index (for marks).
    #[inline]
    pub(crate) fn set_lig_props_for_ligature(&mut self, lig_id: u8, lig_num_comps: u8) {
        self.lig_props = (lig_id << 5) | IS_LIG_BASE | (lig_num_comps & 0x0F);
    }

    #[inline]
    pub(crate) fn set_lig_props_for_mark(&mut self, lig_id: u8, lig_comp: u8) {
        self.lig_props = (lig_id << 5) | (lig_comp & 0x0F);
    }

    #[inline]
    pub(crate) fn set_lig_props_for_component(&mut self, comp: u8) {
        self.set_lig_props_for_mark(0, comp);
    }

    #[inline]
    pub(crate) fn lig_id(&self) -> u8 {
        self.lig_props >> 5
    }

    #[inline]
    pub(crate) fn is_ligated_internal(&self) -> bool {
        self.lig_props & IS_LIG_BASE != 0
    }

    #[inline]
    pub(crate) fn lig_comp(&self) -> u8 {
        if self.is_ligated_internal() {
            0
        } else {
            self.lig_props & 0x0F
        }
    }

    #[inline]
    pub(crate) fn lig_num_comps(&self) -> u8 {
        if self.is_ligature() && self.is_ligated_internal() {
            self.lig_props & 0x0F
        } else {
            1
        }
    }

    #[inline]
    pub(crate) fn syllable(&self) -> u8 {
        self.syllable
    }

    #[inline]
    pub(crate) fn set_syllable(&mut self, syllable: u8) {
        self.syllable = syllable;
    }

    #[inline]
    pub(crate) fn syllabic_category(&self) -> u8 {
        match self.shaper {
            ShaperVar::Syllabic { category, .. } => category,
            _ => 0,
        }
    }

    #[inline]
    pub(crate) fn set_syllabic_category(&mut self, c: u8) {
        match &mut self.shaper {
            ShaperVar::Syllabic { category, .. } => *category = c,
            var => *var = ShaperVar::Syllabic { category: c, position: 0 },
        }
    }

    #[inline]
    pub(crate) fn syllabic_position(&self) -> u8 {
        match self.shaper {
            ShaperVar::Syllabic { position, .. } => position,
            _ => 0,
        }
    }

    #[inline]
    pub(crate) fn set_syllabic_position(&mut self, p: u8) {
        match &mut self.shaper {
            ShaperVar::Syllabic { position, .. } => *position = p,
            var => *var = ShaperVar::Syllabic { category: 0, position: p },
        }
    }

    #[inline]
    pub(crate) fn is_one_of(&self, flags: u32) -> bool {
        // If it ligated, all bets are off.
        if self.is_ligated() {
            return false;
        }

        crate::complex::rb_flag_unsafe(u32::from(self.syllabic_category())) & flags != 0
    }

    #[inline]
    pub(crate) fn arabic_action(&self) -> Option<u8> {
        match self.shaper {
            ShaperVar::Arabic(action) => Some(action),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn set_arabic_action(&mut self, action: u8) {
        self.shaper = ShaperVar::Arabic(action);
    }

    #[inline]
    pub(crate) fn jamo(&self) -> u8 {
        match self.shaper {
            ShaperVar::Jamo(feature) => feature,
            _ => 0,
        }
    }

    #[inline]
    pub(crate) fn set_jamo(&mut self, feature: u8) {
        self.shaper = ShaperVar::Jamo(feature);
    }
}

bitflags! {
    /// Flags for buffers.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        /// Indicates that special handling of the beginning of text paragraph can be applied to this buffer. Should usually be set, unless you are passing to the buffer only part of the text without the full context.
        const BEGINNING_OF_TEXT             = 1 << 1;
        /// Indicates that special handling of the end of text paragraph can be applied to this buffer, similar to [`BufferFlags::BEGINNING_OF_TEXT`].
        const END_OF_TEXT                   = 1 << 2;
        /// Indicates that characters with `Default_Ignorable` Unicode property should use the corresponding glyph from the font, instead of hiding them (done by replacing them with the space glyph and zeroing the advance width.) This flag takes precedence over [`BufferFlags::REMOVE_DEFAULT_IGNORABLES`].
        const PRESERVE_DEFAULT_IGNORABLES   = 1 << 3;
        /// Indicates that characters with `Default_Ignorable` Unicode property should be removed from glyph string instead of hiding them (done by replacing them with the space glyph and zeroing the advance width.) [`BufferFlags::PRESERVE_DEFAULT_IGNORABLES`] takes precedence over this flag.
        const REMOVE_DEFAULT_IGNORABLES     = 1 << 4;
        /// Indicates that a dotted circle should not be inserted in the rendering of incorrect character sequences (such as `<0905 093E>`).
        const DO_NOT_INSERT_DOTTED_CIRCLE   = 1 << 5;
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct BufferScratchFlags: u32 {
        const HAS_NON_ASCII             = 0x0000_0001;
        const HAS_DEFAULT_IGNORABLES    = 0x0000_0002;
        const HAS_SPACE_FALLBACK        = 0x0000_0004;
        const HAS_UNSAFE_TO_BREAK       = 0x0000_0008;
        const HAS_CGJ                   = 0x0000_0010;
        const HAS_BROKEN_SYLLABLE       = 0x0000_0020;
    }
}

/// Cluster level.
///
/// Controls how glyph clusters are merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferClusterLevel {
    /// Return cluster values grouped by graphemes into monotone order.
    #[default]
    MonotoneGraphemes,
    /// Return cluster values grouped into monotone order.
    MonotoneCharacters,
    /// Don't group cluster values.
    Characters,
}

/// The glyph buffer that every shaping stage reads and mutates.
///
/// Multi-pass components build their result into a separate output sequence
/// (`clear_output` / `next_glyph` / `output_glyph` / ...) and commit it with
/// `swap_buffers`, so the input is never spliced while it is being iterated.
#[derive(Clone, Debug)]
pub struct Buffer {
    // Information about how the text in the buffer should be treated.
    pub(crate) flags: BufferFlags,
    pub(crate) cluster_level: BufferClusterLevel,
    pub(crate) invisible: Option<u32>,
    pub(crate) not_found: u32,
    pub(crate) limits: BufferLimits,

    // Buffer contents.
    pub(crate) direction: Direction,
    pub(crate) script: Option<Script>,
    pub(crate) language: Option<Language>,

    pub(crate) scratch_flags: BufferScratchFlags,
    pub(crate) max_len: usize,
    pub(crate) max_ops: i32,

    /// Whether we have an output buffer going on.
    pub(crate) have_output: bool,
    pub(crate) have_positions: bool,
    pub(crate) successful: bool,

    pub(crate) idx: usize,
    pub(crate) len: usize,

    pub(crate) info: Vec<GlyphInfo>,
    pub(crate) out_info: Vec<GlyphInfo>,
    pub(crate) pos: Vec<GlyphPosition>,

    pub(crate) serial: u8,

    // Text before / after the main buffer contents.
    // Position 0 is used for text before, and 1 for text after.
    pub(crate) context: [[char; CONTEXT_LENGTH]; 2],
    pub(crate) context_len: [usize; 2],
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Buffer {
            flags: BufferFlags::empty(),
            cluster_level: BufferClusterLevel::default(),
            invisible: None,
            not_found: 0,
            limits: BufferLimits::default(),
            direction: Direction::Invalid,
            script: None,
            language: None,
            scratch_flags: BufferScratchFlags::empty(),
            max_len: usize::MAX,
            max_ops: i32::MAX,
            have_output: false,
            have_positions: false,
            successful: true,
            idx: 0,
            len: 0,
            info: Vec::new(),
            out_info: Vec::new(),
            pos: Vec::new(),
            serial: 0,
            context: [['\0'; CONTEXT_LENGTH]; 2],
            context_len: [0, 0],
        }
    }

    /// Returns the number of glyphs (or characters, before shaping).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks that the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `false` once the buffer entered its terminal error state.
    #[inline]
    pub fn successful(&self) -> bool {
        self.successful
    }

    /// Glyph infos, valid after shaping.
    #[inline]
    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        &self.info[..self.len]
    }

    /// Glyph positions, valid after shaping.
    #[inline]
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        if self.have_positions {
            &self.pos[..self.len]
        } else {
            &[]
        }
    }

    /// Mutable glyph infos, for lookup engines working in place.
    pub fn glyph_infos_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.info[..self.len]
    }

    /// Mutable glyph positions, for lookup engines working in place.
    pub fn glyph_positions_mut(&mut self) -> &mut [GlyphPosition] {
        let len = self.pos.len().min(self.len);
        &mut self.pos[..len]
    }

    /// Appends a character with the given cluster value.
    pub fn add(&mut self, codepoint: char, cluster: u32) {
        self.info.push(GlyphInfo {
            glyph_id: codepoint as u32,
            cluster,
            ..GlyphInfo::default()
        });
        self.len += 1;
    }

    /// Appends a string, using byte offsets as cluster values.
    pub fn push_str(&mut self, text: &str) {
        self.info.reserve(text.len());
        for (i, c) in text.char_indices() {
            self.add(c, i as u32);
        }
    }

    /// Sets the text that precedes the buffer contents.
    pub fn set_pre_context(&mut self, text: &str) {
        self.context_len[0] = 0;
        for c in text.chars().rev().take(CONTEXT_LENGTH) {
            self.context[0][self.context_len[0]] = c;
            self.context_len[0] += 1;
        }
    }

    /// Sets the text that follows the buffer contents.
    pub fn set_post_context(&mut self, text: &str) {
        self.context_len[1] = 0;
        for c in text.chars().take(CONTEXT_LENGTH) {
            self.context[1][self.context_len[1]] = c;
            self.context_len[1] += 1;
        }
    }

    #[inline]
    pub(crate) fn context(&self, side: usize) -> &[char] {
        &self.context[side][..self.context_len[side]]
    }

    /// Sets the run direction.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Returns the run direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Sets the run script.
    pub fn set_script(&mut self, script: Script) {
        self.script = Some(script);
    }

    /// Returns the run script.
    pub fn script(&self) -> Option<Script> {
        self.script
    }

    /// Sets the run language.
    pub fn set_language(&mut self, language: Language) {
        self.language = Some(language);
    }

    /// Returns the run language.
    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// Sets buffer flags.
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.flags = flags;
    }

    /// Returns buffer flags.
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Sets the cluster level.
    pub fn set_cluster_level(&mut self, level: BufferClusterLevel) {
        self.cluster_level = level;
    }

    /// Returns the cluster level.
    pub fn cluster_level(&self) -> BufferClusterLevel {
        self.cluster_level
    }

    /// Sets the glyph that replaces hidden default ignorables.
    pub fn set_invisible_glyph(&mut self, glyph: u32) {
        self.invisible = Some(glyph);
    }

    /// Sets the glyph used for characters the font does not map.
    pub fn set_not_found_glyph(&mut self, glyph: u32) {
        self.not_found = glyph;
    }

    /// Overrides the output length and operation limits.
    pub fn set_limits(&mut self, limits: BufferLimits) {
        self.limits = limits;
    }

    /// Returns the segment properties of the buffer.
    pub fn segment_properties(&self) -> SegmentProperties {
        SegmentProperties {
            direction: self.direction,
            script: self.script,
            language: self.language.clone(),
        }
    }

    /// Fills unset segment properties from the buffer contents.
    pub fn guess_segment_properties(&mut self) {
        if self.script.is_none() {
            for info in &self.info[..self.len] {
                match info.as_char().script() {
                    crate::script::COMMON | crate::script::INHERITED | crate::script::UNKNOWN => {}
                    s => {
                        self.script = Some(s);
                        break;
                    }
                }
            }
        }

        if self.direction == Direction::Invalid {
            if let Some(script) = self.script {
                self.direction = Direction::from_script(script).unwrap_or_default();
            }

            if self.direction == Direction::Invalid {
                self.direction = Direction::LeftToRight;
            }
        }
    }

    /// Resets the buffer to an empty state, keeping settings and allocations.
    pub fn clear(&mut self) {
        self.direction = Direction::Invalid;
        self.script = None;
        self.language = None;
        self.scratch_flags = BufferScratchFlags::empty();
        self.successful = true;
        self.have_output = false;
        self.have_positions = false;
        self.idx = 0;
        self.len = 0;
        self.info.clear();
        self.out_info.clear();
        self.pos.clear();
        self.serial = 0;
        self.context_len = [0, 0];
    }

    pub(crate) fn enter(&mut self) {
        self.serial = 0;
        self.scratch_flags = BufferScratchFlags::empty();
        self.successful = true;

        let limits = self.limits;
        self.max_len = self
            .len
            .checked_mul(limits.max_len_factor)
            .map_or(usize::MAX, |n| n.max(limits.max_len_min));

        self.max_ops = i32::try_from(self.len)
            .ok()
            .and_then(|len| len.checked_mul(limits.max_ops_factor))
            .map_or(i32::MAX, |n| n.max(limits.max_ops_min));
    }

    #[inline]
    pub(crate) fn next_serial(&mut self) -> u8 {
        self.serial = self.serial.wrapping_add(1);
        if self.serial == 0 {
            self.serial += 1;
        }
        self.serial
    }

    /// Returns a non-zero ligature id that fits in three bits.
    pub(crate) fn allocate_lig_id(&mut self) -> u8 {
        let mut lig_id = self.next_serial() & 0x07;
        if lig_id == 0 {
            lig_id = self.next_serial() & 0x07;
        }
        lig_id
    }

    /// Consumes `n` operations from the budget.
    ///
    /// Running out puts the buffer in its error state. Returns `false` once
    /// the buffer has failed.
    #[inline]
    pub(crate) fn spend_ops(&mut self, n: usize) -> bool {
        self.max_ops = self.max_ops.saturating_sub(n.min(i32::MAX as usize) as i32);
        if self.max_ops <= 0 && self.successful {
            log::warn!("shaping operation budget exhausted");
            self.successful = false;
        }

        self.successful
    }

    /// Whether the operation budget ran out during the last shaping call.
    pub(crate) fn ops_exhausted(&self) -> bool {
        self.max_ops <= 0
    }

    #[inline]
    pub(crate) fn cur(&self, i: usize) -> &GlyphInfo {
        &self.info[self.idx + i]
    }

    #[inline]
    pub(crate) fn cur_mut(&mut self, i: usize) -> &mut GlyphInfo {
        let idx = self.idx + i;
        &mut self.info[idx]
    }

    #[inline]
    pub(crate) fn prev(&self) -> &GlyphInfo {
        let out_len = self.out_info.len();
        &self.out_info[out_len.saturating_sub(1)]
    }

    #[inline]
    pub(crate) fn prev_mut(&mut self) -> &mut GlyphInfo {
        let out_len = self.out_info.len();
        &mut self.out_info[out_len.saturating_sub(1)]
    }

    #[inline]
    pub(crate) fn out_len(&self) -> usize {
        if self.have_output {
            self.out_info.len()
        } else {
            self.idx
        }
    }

    #[inline]
    pub(crate) fn out_info(&self) -> &[GlyphInfo] {
        &self.out_info
    }

    #[inline]
    pub(crate) fn out_info_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.out_info
    }

    #[inline]
    pub(crate) fn info_slice(&self) -> &[GlyphInfo] {
        &self.info[..self.len]
    }

    #[inline]
    pub(crate) fn info_slice_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.info[..self.len]
    }

    fn push_out(&mut self, info: GlyphInfo) -> bool {
        if !self.successful {
            return false;
        }

        if self.out_info.len() >= self.max_len {
            log::warn!("buffer output exceeds {} glyphs, giving up", self.max_len);
            self.successful = false;
            return false;
        }

        self.out_info.push(info);
        true
    }

    pub(crate) fn clear_output(&mut self) {
        self.have_output = true;
        self.have_positions = false;
        self.idx = 0;
        self.out_info.clear();
    }

    pub(crate) fn clear_positions(&mut self) {
        self.have_output = false;
        self.have_positions = true;
        self.out_info.clear();
        self.pos.clear();
        self.pos.resize(self.len, GlyphPosition::default());
    }

    /// Commits the output sequence as the new input.
    ///
    /// On a failed buffer the output is dropped and the input kept as is.
    pub(crate) fn swap_buffers(&mut self) {
        debug_assert!(self.have_output);

        if self.successful && self.idx < self.len {
            let rest = self.len - self.idx;
            if self.out_info.len() + rest > self.max_len {
                log::warn!("buffer output exceeds {} glyphs, giving up", self.max_len);
                self.successful = false;
            } else {
                self.out_info.extend_from_slice(&self.info[self.idx..self.len]);
            }
        }

        if self.successful {
            core::mem::swap(&mut self.info, &mut self.out_info);
            self.len = self.info.len();
        }

        self.have_output = false;
        self.out_info.clear();
        self.idx = 0;
    }

    #[inline]
    pub(crate) fn sync(&mut self) {
        self.swap_buffers();
    }

    /// Copies the current glyph to the output and advances.
    pub(crate) fn next_glyph(&mut self) {
        if self.have_output {
            let info = self.info[self.idx];
            if !self.push_out(info) {
                // Keep advancing so loops terminate; the output is discarded.
                self.idx += 1;
                return;
            }
        }

        self.idx += 1;
    }

    pub(crate) fn next_glyphs(&mut self, n: usize) {
        for _ in 0..n {
            if self.idx >= self.len {
                break;
            }
            self.next_glyph();
        }
    }

    /// Advances without copying the current glyph, removing it.
    #[inline]
    pub(crate) fn skip_glyph(&mut self) {
        self.idx += 1;
    }

    /// Outputs a copy of the current glyph with a new id, without advancing.
    pub(crate) fn output_glyph(&mut self, glyph_id: u32) {
        let mut info = if self.idx < self.len {
            self.info[self.idx]
        } else if let Some(last) = self.out_info.last() {
            *last
        } else {
            GlyphInfo::default()
        };
        info.glyph_id = glyph_id;
        self.push_out(info);
    }

    pub(crate) fn output_info(&mut self, info: GlyphInfo) {
        self.push_out(info);
    }

    /// Replaces the current glyph id and advances.
    pub(crate) fn replace_glyph(&mut self, glyph_id: u32) {
        if self.have_output {
            let mut info = self.info[self.idx];
            info.glyph_id = glyph_id;
            self.push_out(info);
        } else {
            self.info[self.idx].glyph_id = glyph_id;
        }

        self.idx += 1;
    }

    /// Replaces `num_in` glyphs at the cursor with `glyphs`.
    ///
    /// All produced glyphs carry the first consumed record's cluster after
    /// the consumed range is merged.
    pub(crate) fn replace_glyphs(&mut self, num_in: usize, glyphs: &[u32]) {
        debug_assert!(self.have_output);
        let num_in = num_in.min(self.len - self.idx);
        self.merge_clusters(self.idx, self.idx + num_in);

        let orig = if num_in > 0 {
            self.info[self.idx]
        } else if let Some(last) = self.out_info.last() {
            *last
        } else {
            GlyphInfo::default()
        };

        for &glyph_id in glyphs {
            let mut info = orig;
            info.glyph_id = glyph_id;
            if !self.push_out(info) {
                break;
            }
        }

        self.idx += num_in;
    }

    pub(crate) fn set_cluster(info: &mut GlyphInfo, cluster: u32, mask: Mask) {
        if info.cluster != cluster {
            info.mask = (info.mask & !glyph_flag::DEFINED) | (mask & glyph_flag::DEFINED);
        }

        info.cluster = cluster;
    }

    /// Makes all glyphs in `start..end` share the smallest cluster value.
    pub(crate) fn merge_clusters(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }

        self.merge_clusters_impl(start, end);
    }

    fn merge_clusters_impl(&mut self, mut start: usize, mut end: usize) {
        if self.cluster_level == BufferClusterLevel::Characters {
            self.unsafe_to_break(start, end);
            return;
        }

        self.spend_ops(end - start);

        let mut cluster = self.info[start].cluster;
        for info in &self.info[start + 1..end] {
            cluster = cluster.min(info.cluster);
        }

        // Extend end
        if cluster != self.info[end - 1].cluster {
            while end < self.len && self.info[end - 1].cluster == self.info[end].cluster {
                end += 1;
            }
        }

        // Extend start
        if cluster != self.info[start].cluster {
            while self.idx < start && self.info[start - 1].cluster == self.info[start].cluster {
                start -= 1;
            }
        }

        // If we hit the start of buffer, continue in out-buffer.
        if self.have_output && self.idx == start && self.info[start].cluster != cluster {
            let start_cluster = self.info[start].cluster;
            for info in self.out_info.iter_mut().rev() {
                if info.cluster != start_cluster {
                    break;
                }
                Self::set_cluster(info, cluster, 0);
            }
        }

        for info in &mut self.info[start..end] {
            Self::set_cluster(info, cluster, 0);
        }
    }

    /// Same as `merge_clusters`, but over the output sequence.
    pub(crate) fn merge_out_clusters(&mut self, mut start: usize, mut end: usize) {
        if self.cluster_level == BufferClusterLevel::Characters {
            return;
        }

        if end - start < 2 {
            return;
        }

        self.spend_ops(end - start);

        let mut cluster = self.out_info[start].cluster;
        for info in &self.out_info[start + 1..end] {
            cluster = cluster.min(info.cluster);
        }

        // Extend start
        while start != 0 && self.out_info[start - 1].cluster == self.out_info[start].cluster {
            start -= 1;
        }

        // Extend end
        let out_len = self.out_info.len();
        while end < out_len && self.out_info[end - 1].cluster == self.out_info[end].cluster {
            end += 1;
        }

        // If we hit the end of out-buffer, continue in buffer.
        if end == out_len {
            let end_cluster = self.out_info[end - 1].cluster;
            let mut i = self.idx;
            while i < self.len && self.info[i].cluster == end_cluster {
                Self::set_cluster(&mut self.info[i], cluster, 0);
                i += 1;
            }
        }

        for info in &mut self.out_info[start..end] {
            Self::set_cluster(info, cluster, 0);
        }
    }

    pub(crate) fn unsafe_to_break(&mut self, start: usize, end: usize) {
        let end = end.min(self.len);
        if end <= start || end - start < 2 {
            return;
        }

        let cluster = self.info[start..end]
            .iter()
            .map(|info| info.cluster)
            .min()
            .unwrap_or(0);

        let mut unsafe_to_break = false;
        for info in &mut self.info[start..end] {
            if info.cluster != cluster {
                unsafe_to_break = true;
                info.mask |= glyph_flag::UNSAFE_TO_BREAK;
            }
        }

        if unsafe_to_break {
            self.scratch_flags |= BufferScratchFlags::HAS_UNSAFE_TO_BREAK;
        }
    }

    pub(crate) fn unsafe_to_break_from_outbuffer(&mut self, start: usize, end: usize) {
        if !self.have_output {
            self.unsafe_to_break(start, end);
            return;
        }

        let end = end.min(self.len);
        let out_len = self.out_info.len();
        debug_assert!(start <= out_len);
        debug_assert!(self.idx <= end);

        let mut cluster = u32::MAX;
        for info in &self.out_info[start..] {
            cluster = cluster.min(info.cluster);
        }
        for info in &self.info[self.idx..end] {
            cluster = cluster.min(info.cluster);
        }

        let mut unsafe_to_break = false;
        for info in self.out_info[start..].iter_mut().chain(self.info[self.idx..end].iter_mut()) {
            if info.cluster != cluster {
                unsafe_to_break = true;
                info.mask |= glyph_flag::UNSAFE_TO_BREAK;
            }
        }

        if unsafe_to_break {
            self.scratch_flags |= BufferScratchFlags::HAS_UNSAFE_TO_BREAK;
        }
    }

    /// Stable insertion sort of `start..end`, merging the clusters of every
    /// moved glyph with the glyphs it jumps over.
    pub(crate) fn sort(&mut self, start: usize, end: usize, cmp: impl Fn(&GlyphInfo, &GlyphInfo) -> bool) {
        debug_assert!(!self.have_positions);

        for i in start + 1..end {
            let mut j = i;
            while j > start && cmp(&self.info[j - 1], &self.info[i]) {
                j -= 1;
            }

            if i == j {
                continue;
            }

            // Move item i to occupy place for item j, shift what's in between.
            self.merge_clusters(j, i + 1);
            self.spend_ops(i - j);
            self.info[j..=i].rotate_right(1);
        }
    }

    /// Moves the glyph at `from` to `to` (`to < from`) within the input.
    pub(crate) fn move_glyph_back(&mut self, from: usize, to: usize) {
        debug_assert!(to <= from);
        self.spend_ops(from - to);
        self.info[to..=from].rotate_right(1);
    }

    /// Moves the glyph at `from` to `to` (`from < to`) within the input.
    pub(crate) fn move_glyph_forward(&mut self, from: usize, to: usize) {
        debug_assert!(from <= to);
        self.spend_ops(to - from);
        self.info[from..=to].rotate_left(1);
    }

    pub(crate) fn reverse_range(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }

        self.info[start..end].reverse();
        if self.have_positions {
            self.pos[start..end].reverse();
        }
    }

    pub(crate) fn reverse(&mut self) {
        if self.is_empty() {
            return;
        }

        self.reverse_range(0, self.len);
    }

    /// Returns the end of the syllable starting at `start`.
    pub(crate) fn next_syllable(&self, mut start: usize) -> usize {
        if start >= self.len {
            return start;
        }

        let syllable = self.info[start].syllable();
        start += 1;
        while start < self.len && syllable == self.info[start].syllable() {
            start += 1;
        }

        start
    }

    /// Returns the end of the cluster starting at `start`.
    pub(crate) fn next_cluster(&self, mut start: usize) -> usize {
        if start >= self.len {
            return start;
        }

        let cluster = self.info[start].cluster;
        start += 1;
        while start < self.len && cluster == self.info[start].cluster {
            start += 1;
        }

        start
    }

    /// Returns the end of the group starting at `start`: the run of glyphs
    /// for which `group(prev, next)` holds.
    pub(crate) fn group_end(&self, mut start: usize, group: impl Fn(&GlyphInfo, &GlyphInfo) -> bool) -> usize {
        start += 1;

        while start < self.len && group(&self.info[start - 1], &self.info[start]) {
            start += 1;
        }

        start
    }

    /// Removes every glyph matching `filter`, merging its cluster into a
    /// neighbour so cluster values stay monotone.
    pub(crate) fn delete_glyphs_inplace(&mut self, filter: impl Fn(&GlyphInfo) -> bool) {
        let mut j = 0;
        for i in 0..self.len {
            if filter(&self.info[i]) {
                // Merge clusters. Same logic as deleting a glyph in a multiple
                // substitution that produced zero glyphs.
                let cluster = self.info[i].cluster;
                if i + 1 < self.len && cluster == self.info[i + 1].cluster {
                    // Cluster survives; do nothing.
                    continue;
                }

                if j != 0 {
                    // Merge cluster backward.
                    if cluster < self.info[j - 1].cluster {
                        let mask = self.info[i].mask;
                        let old_cluster = self.info[j - 1].cluster;
                        let mut k = j;
                        while k > 0 && self.info[k - 1].cluster == old_cluster {
                            Self::set_cluster(&mut self.info[k - 1], cluster, mask);
                            k -= 1;
                        }
                    }
                    continue;
                }

                if i + 1 < self.len {
                    // Merge cluster forward.
                    let mask = self.info[i].mask;
                    self.merge_clusters(i, i + 2);
                    Self::set_cluster(&mut self.info[i + 1], cluster, mask);
                }

                continue;
            }

            if j != i {
                self.info[j] = self.info[i];
                if self.have_positions {
                    self.pos[j] = self.pos[i];
                }
            }

            j += 1;
        }

        self.len = j;
        self.info.truncate(j);
        if self.have_positions {
            self.pos.truncate(j);
        }
    }

    /// Sets every glyph's mask.
    pub(crate) fn reset_masks(&mut self, mask: Mask) {
        for info in &mut self.info[..self.len] {
            info.mask = mask;
        }
    }

    pub(crate) fn set_masks(&mut self, mut value: Mask, mask: Mask, cluster_start: u32, cluster_end: u32) {
        if mask == 0 {
            return;
        }

        let not_mask = !mask;
        value &= mask;

        if cluster_start == 0 && cluster_end == u32::MAX {
            for info in &mut self.info[..self.len] {
                info.mask = (info.mask & not_mask) | value;
            }

            return;
        }

        for info in &mut self.info[..self.len] {
            if cluster_start <= info.cluster && info.cluster < cluster_end {
                info.mask = (info.mask & not_mask) | value;
            }
        }
    }

    /// Serializes glyph ids, clusters and positions in the familiar
    /// `gid=cluster@x_offset,y_offset+x_advance` notation.
    pub fn serialize(&self, flags: SerializeFlags) -> String {
        let mut s = String::new();
        let infos = self.glyph_infos();
        let positions = self.glyph_positions();

        let mut x = 0;
        let mut y = 0;
        for (i, info) in infos.iter().enumerate() {
            if i > 0 {
                s.push('|');
            }

            let _ = write!(s, "{}", info.glyph_id);

            if !flags.contains(SerializeFlags::NO_CLUSTERS) {
                let _ = write!(s, "={}", info.cluster);
            }

            if let (false, Some(pos)) = (flags.contains(SerializeFlags::NO_POSITIONS), positions.get(i)) {
                if x + pos.x_offset != 0 || y + pos.y_offset != 0 {
                    let _ = write!(s, "@{},{}", x + pos.x_offset, y + pos.y_offset);
                }

                if flags.contains(SerializeFlags::NO_ADVANCES) {
                    x += pos.x_advance;
                    y += pos.y_advance;
                } else {
                    let _ = write!(s, "+{}", pos.x_advance);
                    if pos.y_advance != 0 {
                        let _ = write!(s, ",{}", pos.y_advance);
                    }
                }
            }

            if flags.contains(SerializeFlags::GLYPH_FLAGS) && info.mask & glyph_flag::DEFINED != 0 {
                let _ = write!(s, "#{:X}", info.mask & glyph_flag::DEFINED);
            }
        }

        s
    }
}

bitflags! {
    /// Flags used for serialization with [`Buffer::serialize`].
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SerializeFlags: u8 {
        /// Do not serialize glyph cluster.
        const NO_CLUSTERS       = 0b0000_0001;
        /// Do not serialize glyph position information.
        const NO_POSITIONS      = 0b0000_0010;
        /// Serialize glyph flags.
        const GLYPH_FLAGS       = 0b0000_0100;
        /// Do not serialize glyph advances, glyph offsets will reflect absolute
        /// glyph positions.
        const NO_ADVANCES       = 0b0000_1000;
    }
}

/// A buffer that contains an input string ready for shaping.
#[derive(Clone, Debug, Default)]
pub struct UnicodeBuffer(pub(crate) Buffer);

impl UnicodeBuffer {
    /// Create a new `UnicodeBuffer`.
    #[inline]
    pub fn new() -> UnicodeBuffer {
        UnicodeBuffer(Buffer::new())
    }

    /// Returns the length of the data of the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pushes a string to a buffer.
    #[inline]
    pub fn push_str(&mut self, str: &str) {
        self.0.push_str(str);
    }

    /// Appends a character to a buffer with the given cluster value.
    #[inline]
    pub fn add(&mut self, codepoint: char, cluster: u32) {
        self.0.add(codepoint, cluster);
    }

    /// Sets the text that precedes the buffer contents.
    #[inline]
    pub fn set_pre_context(&mut self, str: &str) {
        self.0.set_pre_context(str);
    }

    /// Sets the text that follows the buffer contents.
    #[inline]
    pub fn set_post_context(&mut self, str: &str) {
        self.0.set_post_context(str);
    }

    /// Set the text direction of the `Buffer`'s contents.
    #[inline]
    pub fn set_direction(&mut self, direction: Direction) {
        self.0.direction = direction;
    }

    /// Returns the `Buffer`'s text direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.0.direction
    }

    /// Set the script from an ISO15924 tag.
    #[inline]
    pub fn set_script(&mut self, script: Script) {
        self.0.script = Some(script);
    }

    /// Get the ISO15924 script tag.
    pub fn script(&self) -> Option<Script> {
        self.0.script
    }

    /// Set the buffer language.
    #[inline]
    pub fn set_language(&mut self, lang: Language) {
        self.0.language = Some(lang);
    }

    /// Get the buffer language.
    #[inline]
    pub fn language(&self) -> Option<Language> {
        self.0.language.clone()
    }

    /// Guess the segment properties (direction, language, script) for the
    /// current buffer.
    #[inline]
    pub fn guess_segment_properties(&mut self) {
        self.0.guess_segment_properties();
    }

    /// Set the flags for this buffer.
    #[inline]
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.0.flags = flags;
    }

    /// Get the flags for this buffer.
    #[inline]
    pub fn flags(&self) -> BufferFlags {
        self.0.flags
    }

    /// Set the cluster level of the buffer.
    #[inline]
    pub fn set_cluster_level(&mut self, cluster_level: BufferClusterLevel) {
        self.0.cluster_level = cluster_level;
    }

    /// Retrieve the cluster level of the buffer.
    #[inline]
    pub fn cluster_level(&self) -> BufferClusterLevel {
        self.0.cluster_level
    }

    /// Sets the output and operation limits used while shaping.
    #[inline]
    pub fn set_limits(&mut self, limits: BufferLimits) {
        self.0.set_limits(limits);
    }

    /// Clear the contents of the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// A buffer that contains the results of the shaping process.
#[derive(Clone, Debug)]
pub struct GlyphBuffer(pub(crate) Buffer);

impl GlyphBuffer {
    /// Returns the length of the data of the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the glyph infos.
    #[inline]
    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        self.0.glyph_infos()
    }

    /// Get the glyph positions.
    #[inline]
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        self.0.glyph_positions()
    }

    /// Clears the content of the glyph buffer and returns an empty
    /// `UnicodeBuffer` reusing the existing allocation.
    #[inline]
    pub fn clear(mut self) -> UnicodeBuffer {
        self.0.clear();
        UnicodeBuffer(self.0)
    }

    /// Converts the glyph buffer content into a string.
    pub fn serialize(&self, flags: SerializeFlags) -> String {
        self.0.serialize(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with_clusters(clusters: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        for (i, &cluster) in clusters.iter().enumerate() {
            buffer.add(char::from_u32(0x61 + i as u32).unwrap(), cluster);
        }
        buffer.enter();
        buffer
    }

    fn clusters(buffer: &Buffer) -> Vec<u32> {
        buffer.glyph_infos().iter().map(|info| info.cluster).collect()
    }

    #[test]
    fn merge_clusters_uses_minimum() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2, 3]);
        buffer.merge_clusters(1, 3);
        assert_eq!(clusters(&buffer), [0, 1, 1, 3]);
    }

    #[test]
    fn merge_clusters_extends_to_neighbours() {
        let mut buffer = buffer_with_clusters(&[0, 2, 2, 3, 3]);
        buffer.merge_clusters(2, 4);
        assert_eq!(clusters(&buffer), [0, 2, 2, 2, 2]);
    }

    #[test]
    fn merge_clusters_is_noop_at_character_level() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.cluster_level = BufferClusterLevel::Characters;
        buffer.merge_clusters(0, 3);
        assert_eq!(clusters(&buffer), [0, 1, 2]);
        assert!(buffer.info[1].unsafe_to_break());
    }

    #[test]
    fn replace_glyphs_keeps_first_cluster() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.clear_output();
        buffer.next_glyph();
        buffer.replace_glyphs(2, &[0x78, 0x79, 0x7A]);
        buffer.swap_buffers();

        let ids: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.glyph_id).collect();
        assert_eq!(ids, [0x61, 0x78, 0x79, 0x7A]);
        assert_eq!(clusters(&buffer), [0, 1, 1, 1]);
    }

    #[test]
    fn overflow_keeps_committed_glyphs() {
        let mut buffer = buffer_with_clusters(&[0, 1]);
        buffer.max_len = 3;
        buffer.clear_output();
        buffer.replace_glyphs(1, &[1, 2, 3, 4, 5]);
        buffer.swap_buffers();

        assert!(!buffer.successful());
        // The input survives untouched.
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.glyph_infos()[0].glyph_id, 0x61);
    }

    #[test]
    fn sort_is_stable_and_merges() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2, 3]);
        let keys = [2u32, 1, 1, 0];
        for (info, &key) in buffer.info.iter_mut().zip(keys.iter()) {
            info.glyph_props = key as u16;
        }

        buffer.sort(0, 4, |a, b| a.glyph_props > b.glyph_props);

        let ids: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.glyph_id).collect();
        assert_eq!(ids, [0x64, 0x62, 0x63, 0x61]);
        assert_eq!(clusters(&buffer), [0, 0, 0, 0]);
    }

    #[test]
    fn delete_merges_cluster_backward() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.delete_glyphs_inplace(|info| info.glyph_id == 0x62);
        assert_eq!(clusters(&buffer), [0, 2]);

        let mut buffer = buffer_with_clusters(&[0, 1, 2]);
        buffer.delete_glyphs_inplace(|info| info.glyph_id == 0x61);
        assert_eq!(clusters(&buffer), [0, 2]);
    }

    #[test]
    fn next_syllable_groups_by_serial() {
        let mut buffer = buffer_with_clusters(&[0, 1, 2, 3]);
        let syllables = [0x11, 0x11, 0x21, 0x31];
        for (info, &s) in buffer.info.iter_mut().zip(syllables.iter()) {
            info.set_syllable(s);
        }

        assert_eq!(buffer.next_syllable(0), 2);
        assert_eq!(buffer.next_syllable(2), 3);
        assert_eq!(buffer.next_syllable(3), 4);
    }

    #[test]
    fn serialize_text_format() {
        let mut buffer = buffer_with_clusters(&[0, 1]);
        buffer.clear_positions();
        buffer.pos[0].x_advance = 500;
        buffer.pos[1].x_advance = 300;
        buffer.pos[1].y_offset = -20;
        assert_eq!(buffer.serialize(SerializeFlags::empty()), "97=0+500|98=1@0,-20+300");
    }
}
