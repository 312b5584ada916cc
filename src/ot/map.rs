//! Compiles feature requests into per-stage lookup lists.

use alloc::vec::Vec;
use core::ops::Range;

use super::layout::{LookupEngine, LookupMap, TableIndex};
use crate::buffer::{glyph_flag, Buffer};
use crate::common::{Language, Script, Tag};
use crate::face::Font;
use crate::plan::ShapePlan;
use crate::Mask;

/// Bits a single feature may occupy in the mask.
pub(crate) const MAX_BITS: u32 = 8;
/// The largest feature value that fits in [`MAX_BITS`].
pub(crate) const MAX_VALUE: u32 = (1 << MAX_BITS) - 1;

bitflags::bitflags! {
    /// How a requested feature is allocated and applied.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
    pub struct FeatureFlags: u32 {
        /// Feature applies to all characters; results in no mask allocated for it.
        const GLOBAL = 0x01;
        /// Has fallback implementation, so include mask bit even if feature not found.
        const HAS_FALLBACK = 0x02;
        /// Don't skip over ZWNJ when matching **context**.
        const MANUAL_ZWNJ = 0x04;
        /// Don't skip over ZWJ when matching **input**.
        const MANUAL_ZWJ = 0x08;
        const MANUAL_JOINERS = Self::MANUAL_ZWNJ.bits() | Self::MANUAL_ZWJ.bits();
        const GLOBAL_MANUAL_JOINERS = Self::GLOBAL.bits() | Self::MANUAL_JOINERS.bits();
        const GLOBAL_HAS_FALLBACK = Self::GLOBAL.bits() | Self::HAS_FALLBACK.bits();
        /// If feature not found in LangSys, look for it in global feature list and pick one.
        const GLOBAL_SEARCH = 0x10;
        /// Randomly select a glyph from an alternate set.
        const RANDOM = 0x20;
        /// Do not match across syllable boundaries.
        const PER_SYLLABLE = 0x40;
    }
}

/// A callback run between two stages.
pub(crate) type PauseFn = fn(&ShapePlan, &Font, &mut Buffer);

#[derive(Clone, Copy, Debug)]
struct MapFeature {
    tag: Tag,
    shift: u32,
    mask: Mask,
    // Mask for value=1, for quick access.
    mask1: Mask,
    needs_fallback: bool,
    found: [bool; 2],
    stage: [usize; 2],
}

/// A stage boundary in a compiled lookup list.
#[derive(Clone, Copy)]
pub(crate) struct StageMap {
    /// Cumulative lookup count up to the end of this stage.
    pub last_lookup: usize,
    pub pause: Option<PauseFn>,
}

impl core::fmt::Debug for StageMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StageMap")
            .field("last_lookup", &self.last_lookup)
            .field("pause", &self.pause.is_some())
            .finish()
    }
}

/// A compiled feature map.
///
/// Immutable after [`MapBuilder::compile`].
#[derive(Debug)]
pub struct Map {
    chosen_script: [Option<Tag>; 2],
    found_script: [bool; 2],
    global_mask: Mask,
    features: Vec<MapFeature>,
    lookups: [Vec<LookupMap>; 2],
    stages: [Vec<StageMap>; 2],
}

impl Map {
    /// The mask every glyph starts with.
    #[inline]
    pub fn global_mask(&self) -> Mask {
        self.global_mask
    }

    fn feature(&self, tag: Tag) -> Option<&MapFeature> {
        self.features
            .binary_search_by_key(&tag, |f| f.tag)
            .ok()
            .map(|idx| &self.features[idx])
    }

    /// Returns the mask and shift of a feature, or zeros if it was dropped.
    pub fn get_mask(&self, tag: Tag) -> (Mask, u32) {
        self.feature(tag).map_or((0, 0), |f| (f.mask, f.shift))
    }

    /// Returns the mask selecting value 1 of a feature.
    pub fn get_1_mask(&self, tag: Tag) -> Mask {
        self.feature(tag).map_or(0, |f| f.mask1)
    }

    /// Whether a feature got a mask but no lookups, so fallback code should
    /// implement it.
    pub fn needs_fallback(&self, tag: Tag) -> bool {
        self.feature(tag).is_some_and(|f| f.needs_fallback)
    }

    /// Whether the font implements `tag` in the given table.
    pub fn has_feature(&self, table: TableIndex, tag: Tag) -> bool {
        self.feature(tag).is_some_and(|f| f.found[table as usize])
    }

    /// The script tag picked in a table.
    #[inline]
    pub fn chosen_script(&self, table: TableIndex) -> Option<Tag> {
        self.chosen_script[table as usize]
    }

    /// Whether the chosen script was one of the requested ones.
    #[inline]
    pub fn found_script(&self, table: TableIndex) -> bool {
        self.found_script[table as usize]
    }

    /// All lookups of a table, in application order.
    #[inline]
    pub fn lookups(&self, table: TableIndex) -> &[LookupMap] {
        &self.lookups[table as usize]
    }

    #[inline]
    pub(crate) fn stages(&self, table: TableIndex) -> &[StageMap] {
        &self.stages[table as usize]
    }

    /// Lookups of the stage a feature was requested in.
    ///
    /// Shapers that give a feature its own stage use this to probe it.
    pub(crate) fn feature_stage_lookups(&self, table: TableIndex, tag: Tag) -> &[LookupMap] {
        let Some(stage) = self.feature(tag).map(|f| f.stage[table as usize]) else {
            return &[];
        };

        let stages = self.stages(table);
        let Some(end) = stages.get(stage).map(|s| s.last_lookup) else {
            return &[];
        };

        let start = match stage {
            0 => 0,
            _ => stages[stage - 1].last_lookup,
        };

        &self.lookups(table)[start..end]
    }

    /// Lookup ranges of each stage, paired with the pause following it.
    pub(crate) fn stage_ranges(
        &self,
        table: TableIndex,
    ) -> impl Iterator<Item = (Range<usize>, Option<PauseFn>)> + '_ {
        let mut start = 0;
        self.stages(table).iter().map(move |stage| {
            let range = start..stage.last_lookup;
            start = stage.last_lookup;
            (range, stage.pause)
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct FeatureInfo {
    tag: Tag,
    // Sort key: registration order is kept for equal tags.
    seq: usize,
    max_value: u32,
    flags: FeatureFlags,
    // For non-global features, what should the unset glyphs take.
    default_value: u32,
    // GSUB/GPOS
    stage: [usize; 2],
}

#[derive(Clone, Copy)]
struct StageInfo {
    index: usize,
    pause: Option<PauseFn>,
}

/// Collects feature requests and pauses, then compiles them into a [`Map`].
pub struct MapBuilder<'a> {
    engine: &'a dyn LookupEngine,
    chosen_script: [Option<Tag>; 2],
    found_script: [bool; 2],
    language: [Option<Tag>; 2],
    current_stage: [usize; 2],
    feature_infos: Vec<FeatureInfo>,
    stages: [Vec<StageInfo>; 2],
}

impl<'a> MapBuilder<'a> {
    /// Selects script and language systems of both tables.
    pub fn new(engine: &'a dyn LookupEngine, script: Option<Script>, language: Option<&Language>) -> Self {
        // Fetch script/language for GSUB/GPOS. We need these later to skip
        // features not available in either table and not waste precious bits.
        let script_tags = script.map(Script::ot_tags).unwrap_or_default();
        let language_tags = language.map(Language::ot_tags).unwrap_or_default();

        let mut chosen_script = [None; 2];
        let mut found_script = [false; 2];
        let mut chosen_language = [None; 2];

        for table in TableIndex::iter() {
            let t = table as usize;
            if let Some((tag, found)) = engine.select_script(table, &script_tags) {
                chosen_script[t] = Some(tag);
                found_script[t] = found;
                chosen_language[t] = engine.select_language(table, tag, &language_tags);
            }
        }

        MapBuilder {
            engine,
            chosen_script,
            found_script,
            language: chosen_language,
            current_stage: [0; 2],
            feature_infos: Vec::new(),
            stages: [Vec::new(), Vec::new()],
        }
    }

    #[inline]
    pub fn chosen_script(&self, table: TableIndex) -> Option<Tag> {
        self.chosen_script[table as usize]
    }

    /// Requests a feature for the current stage.
    pub fn add_feature(&mut self, tag: Tag, flags: FeatureFlags, value: u32) {
        if tag.0 == 0 {
            return;
        }

        let seq = self.feature_infos.len();
        self.feature_infos.push(FeatureInfo {
            tag,
            seq,
            max_value: value,
            flags,
            default_value: if flags.contains(FeatureFlags::GLOBAL) { value } else { 0 },
            stage: self.current_stage,
        });
    }

    /// Requests a feature applied to every glyph.
    #[inline]
    pub fn enable_feature(&mut self, tag: Tag, flags: FeatureFlags, value: u32) {
        self.add_feature(tag, flags | FeatureFlags::GLOBAL, value);
    }

    /// Turns a feature off everywhere.
    #[inline]
    pub fn disable_feature(&mut self, tag: Tag) {
        self.add_feature(tag, FeatureFlags::GLOBAL, 0);
    }

    fn add_pause(&mut self, table: TableIndex, pause: Option<PauseFn>) {
        let t = table as usize;
        self.stages[t].push(StageInfo {
            index: self.current_stage[t],
            pause,
        });
        self.current_stage[t] += 1;
    }

    /// Ends the current GSUB stage.
    #[inline]
    pub(crate) fn add_gsub_pause(&mut self, pause: Option<PauseFn>) {
        self.add_pause(TableIndex::GSUB, pause);
    }

    /// Ends the current GPOS stage.
    #[inline]
    pub(crate) fn add_gpos_pause(&mut self, pause: Option<PauseFn>) {
        self.add_pause(TableIndex::GPOS, pause);
    }

    /// Whether the font would substitute `glyphs` with the lookups of `tag`.
    pub(crate) fn would_substitute(&self, tag: Tag, glyphs: &[u32], zero_context: bool) -> bool {
        let Some(script) = self.chosen_script(TableIndex::GSUB) else {
            return false;
        };

        let language = self.language[TableIndex::GSUB as usize];
        self.engine
            .lookups_for_feature(TableIndex::GSUB, script, language, tag)
            .is_some_and(|lookups| {
                lookups
                    .iter()
                    .any(|&idx| self.engine.lookup_would_substitute(idx, glyphs, zero_context))
            })
    }

    /// Whether the selected GSUB language system carries `tag` at all.
    pub(crate) fn has_gsub_feature(&self, tag: Tag) -> bool {
        let Some(script) = self.chosen_script(TableIndex::GSUB) else {
            return false;
        };

        let language = self.language[TableIndex::GSUB as usize];
        self.engine
            .lookups_for_feature(TableIndex::GSUB, script, language, tag)
            .is_some()
    }

    fn sort_and_merge(&mut self) {
        self.feature_infos.sort_by_key(|info| (info.tag, info.seq));

        let mut merged: Vec<FeatureInfo> = Vec::with_capacity(self.feature_infos.len());
        for info in self.feature_infos.drain(..) {
            let Some(last) = merged.last_mut().filter(|last| last.tag == info.tag) else {
                merged.push(info);
                continue;
            };

            if info.flags.contains(FeatureFlags::GLOBAL) {
                last.flags |= FeatureFlags::GLOBAL;
                last.max_value = info.max_value;
                last.default_value = info.default_value;
            } else {
                last.flags.remove(FeatureFlags::GLOBAL);
                last.max_value = last.max_value.max(info.max_value);
                // Inherit default_value from the earlier registration.
            }

            last.flags |= info.flags & FeatureFlags::HAS_FALLBACK;
            last.stage[0] = last.stage[0].min(info.stage[0]);
            last.stage[1] = last.stage[1].min(info.stage[1]);
        }

        self.feature_infos = merged;
    }

    fn feature_lookups(&self, table: TableIndex, info: &FeatureInfo) -> Option<Vec<u16>> {
        let script = self.chosen_script(table)?;
        let language = self.language[table as usize];
        self.engine.lookups_for_feature(table, script, language, info.tag)
    }

    /// Allocates mask bits and collects lookups.
    pub fn compile(mut self) -> Map {
        let global_bit_shift = glyph_flag::DEFINED.count_ones();
        let global_bit_mask: Mask = 1 << global_bit_shift;

        let mut map = Map {
            chosen_script: self.chosen_script,
            found_script: self.found_script,
            global_mask: global_bit_mask,
            features: Vec::new(),
            lookups: [Vec::new(), Vec::new()],
            stages: [Vec::new(), Vec::new()],
        };

        let mut required = [None, None];
        for table in TableIndex::iter() {
            if let Some(script) = self.chosen_script(table) {
                required[table as usize] =
                    self.engine.required_feature(table, script, self.language[table as usize]);
            }
        }

        // We default to applying the required feature in stage 0. If its tag
        // is known to the shaper, it goes in the stage for that tag.
        let mut required_stage = [0usize; 2];

        self.sort_and_merge();

        struct Pending {
            mask: Mask,
            stage: [usize; 2],
            auto_zwnj: bool,
            auto_zwj: bool,
            random: bool,
            per_syllable: bool,
            lookups: [Vec<u16>; 2],
        }
        let mut pending: Vec<Pending> = Vec::new();

        // Allocate bits now.
        let mut next_bit = global_bit_shift + 1;

        for info in &self.feature_infos {
            let uses_global_bit = info.flags.contains(FeatureFlags::GLOBAL) && info.max_value == 1;
            let bits_needed = if uses_global_bit {
                0
            } else {
                (32 - info.max_value.leading_zeros()).min(MAX_BITS)
            };

            if info.max_value == 0 {
                continue;
            }

            if next_bit + bits_needed > Mask::BITS {
                log::debug!("dropping feature {} for lack of mask bits", info.tag);
                continue;
            }

            for table in TableIndex::iter() {
                if let Some((tag, _)) = &required[table as usize] {
                    if *tag == info.tag {
                        required_stage[table as usize] = info.stage[table as usize];
                    }
                }
            }

            let mut found = [false; 2];
            let mut lookups = [Vec::new(), Vec::new()];
            for table in TableIndex::iter() {
                if let Some(list) = self.feature_lookups(table, info) {
                    found[table as usize] = true;
                    lookups[table as usize] = list;
                }
            }

            if found == [false; 2] && info.flags.contains(FeatureFlags::GLOBAL_SEARCH) {
                for table in TableIndex::iter() {
                    if let Some(list) = self.engine.lookups_for_feature_anywhere(table, info.tag) {
                        found[table as usize] = true;
                        lookups[table as usize] = list;
                        break;
                    }
                }
            }

            let any_found = found.contains(&true);
            if !any_found && !info.flags.contains(FeatureFlags::HAS_FALLBACK) {
                continue;
            }

            let (shift, mask) = if uses_global_bit {
                (global_bit_shift, global_bit_mask)
            } else {
                let shift = next_bit;
                let mask = ((1u64 << (next_bit + bits_needed)) - (1u64 << next_bit)) as Mask;
                next_bit += bits_needed;
                map.global_mask |= (info.default_value << shift) & mask;
                (shift, mask)
            };

            map.features.push(MapFeature {
                tag: info.tag,
                shift,
                mask,
                mask1: (1 << shift) & mask,
                needs_fallback: !any_found,
                found,
                stage: info.stage,
            });

            pending.push(Pending {
                mask,
                stage: info.stage,
                auto_zwnj: !info.flags.contains(FeatureFlags::MANUAL_ZWNJ),
                auto_zwj: !info.flags.contains(FeatureFlags::MANUAL_ZWJ),
                random: info.flags.contains(FeatureFlags::RANDOM),
                per_syllable: info.flags.contains(FeatureFlags::PER_SYLLABLE),
                lookups,
            });
        }

        self.add_gsub_pause(None);
        self.add_gpos_pause(None);

        for table in TableIndex::iter() {
            let t = table as usize;
            let out = &mut map.lookups[t];
            let mut stage_index = 0;
            let mut last_num_lookups = 0;

            for stage in 0..self.current_stage[t] {
                if let Some((_, indices)) = &required[t] {
                    if required_stage[t] == stage {
                        out.extend(indices.iter().map(|&index| LookupMap {
                            index,
                            mask: global_bit_mask,
                            auto_zwnj: true,
                            auto_zwj: true,
                            random: false,
                            per_syllable: false,
                        }));
                    }
                }

                for feature in pending.iter().filter(|f| f.stage[t] == stage) {
                    out.extend(feature.lookups[t].iter().map(|&index| LookupMap {
                        index,
                        mask: feature.mask,
                        auto_zwnj: feature.auto_zwnj,
                        auto_zwj: feature.auto_zwj,
                        random: feature.random,
                        per_syllable: feature.per_syllable,
                    }));
                }

                // Sort lookups and merge duplicates.
                if last_num_lookups < out.len() {
                    out[last_num_lookups..].sort_by_key(|l| l.index);

                    let mut j = last_num_lookups;
                    for i in last_num_lookups + 1..out.len() {
                        if out[i].index != out[j].index {
                            j += 1;
                            out[j] = out[i];
                        } else {
                            out[j].mask |= out[i].mask;
                            out[j].auto_zwnj &= out[i].auto_zwnj;
                            out[j].auto_zwj &= out[i].auto_zwj;
                        }
                    }
                    out.truncate(j + 1);
                }

                last_num_lookups = out.len();

                if let Some(info) = self.stages[t].get(stage_index).filter(|s| s.index == stage) {
                    map.stages[t].push(StageMap {
                        last_lookup: last_num_lookups,
                        pause: info.pause,
                    });
                    stage_index += 1;
                }
            }
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TagExt;
    use alloc::vec;

    // Every feature maps to a single lookup numbered after its first byte.
    struct OneLookupPerFeature;

    impl LookupEngine for OneLookupPerFeature {
        fn has_table(&self, _: TableIndex) -> bool {
            true
        }

        fn select_script(&self, _: TableIndex, _: &[Tag]) -> Option<(Tag, bool)> {
            Some((Tag::default_script(), false))
        }

        fn select_language(&self, _: TableIndex, _: Tag, _: &[Tag]) -> Option<Tag> {
            None
        }

        fn required_feature(&self, _: TableIndex, _: Tag, _: Option<Tag>) -> Option<(Tag, Vec<u16>)> {
            None
        }

        fn lookups_for_feature(&self, table: TableIndex, _: Tag, _: Option<Tag>, feature: Tag) -> Option<Vec<u16>> {
            match (table, &feature.to_bytes()) {
                (TableIndex::GSUB, b"liga") | (TableIndex::GSUB, b"clig") => Some(vec![7]),
                (TableIndex::GSUB, b"smcp") => Some(vec![3]),
                (TableIndex::GPOS, b"kern") => Some(vec![1]),
                _ => None,
            }
        }

        fn lookup_would_substitute(&self, _: u16, _: &[u32], _: bool) -> bool {
            false
        }

        fn apply_lookups(&self, _: TableIndex, _: &mut Buffer, _: &[LookupMap]) {}
    }

    fn tag(s: &[u8; 4]) -> Tag {
        Tag::from_bytes(s)
    }

    #[test]
    fn global_single_value_uses_global_bit() {
        let mut builder = MapBuilder::new(&OneLookupPerFeature, None, None);
        builder.enable_feature(tag(b"liga"), FeatureFlags::empty(), 1);
        let map = builder.compile();

        assert_eq!(map.get_1_mask(tag(b"liga")), 1 << 2);
        assert_eq!(map.global_mask(), 1 << 2);
    }

    #[test]
    fn missing_feature_without_fallback_is_dropped() {
        let mut builder = MapBuilder::new(&OneLookupPerFeature, None, None);
        builder.add_feature(tag(b"xxxx"), FeatureFlags::empty(), 1);
        builder.add_feature(tag(b"yyyy"), FeatureFlags::HAS_FALLBACK, 1);
        let map = builder.compile();

        assert_eq!(map.get_1_mask(tag(b"xxxx")), 0);
        assert_ne!(map.get_1_mask(tag(b"yyyy")), 0);
        assert!(map.needs_fallback(tag(b"yyyy")));
    }

    #[test]
    fn multi_value_feature_gets_a_bit_range() {
        let mut builder = MapBuilder::new(&OneLookupPerFeature, None, None);
        builder.add_feature(tag(b"smcp"), FeatureFlags::empty(), 3);
        let map = builder.compile();

        let (mask, shift) = map.get_mask(tag(b"smcp"));
        assert_eq!(shift, 3);
        assert_eq!(mask, 0b11 << 3);
    }

    #[test]
    fn duplicate_lookups_merge_masks() {
        let mut builder = MapBuilder::new(&OneLookupPerFeature, None, None);
        builder.add_feature(tag(b"liga"), FeatureFlags::empty(), 1);
        builder.add_feature(tag(b"clig"), FeatureFlags::MANUAL_ZWJ, 1);
        let map = builder.compile();

        let lookups = map.lookups(TableIndex::GSUB);
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].index, 7);
        assert_eq!(lookups[0].mask, map.get_1_mask(tag(b"liga")) | map.get_1_mask(tag(b"clig")));
        assert!(!lookups[0].auto_zwj);
    }

    #[test]
    fn pauses_split_stages() {
        fn noop(_: &ShapePlan, _: &Font, _: &mut Buffer) {}

        let mut builder = MapBuilder::new(&OneLookupPerFeature, None, None);
        builder.enable_feature(tag(b"smcp"), FeatureFlags::empty(), 1);
        builder.add_gsub_pause(Some(noop));
        builder.enable_feature(tag(b"liga"), FeatureFlags::empty(), 1);
        let map = builder.compile();

        let ranges: Vec<_> = map
            .stage_ranges(TableIndex::GSUB)
            .map(|(range, pause)| (range, pause.is_some()))
            .collect();
        assert_eq!(ranges, vec![(0..1, true), (1..2, false)]);
    }

    #[test]
    fn features_beyond_mask_width_are_dropped() {
        let mut builder = MapBuilder::new(&OneLookupPerFeature, None, None);
        for i in 0..40u8 {
            builder.add_feature(Tag::from_bytes(&[b'a', b'a' + i / 26, b'a' + i % 26, b' ']), FeatureFlags::HAS_FALLBACK, 1);
        }
        let map = builder.compile();

        // Bits 0..=2 are reserved, leaving 29 single-bit features.
        let allocated = (0..40u8)
            .filter(|&i| map.get_1_mask(Tag::from_bytes(&[b'a', b'a' + i / 26, b'a' + i % 26, b' '])) != 0)
            .count();
        assert_eq!(allocated, 29);
    }
}
