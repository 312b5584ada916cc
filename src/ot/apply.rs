//! A basic GSUB/GPOS interpreter over `ttf-parser` tables.
//!
//! Covers single, multiple, alternate and ligature substitution and single
//! and pair adjustment. Contextual, chained and reverse lookups as well as
//! attachment positioning are left to a complete engine plugged in through
//! [`LookupEngine`].

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use smallvec::SmallVec;
use ttf_parser::gpos::{PairAdjustment, PositioningSubtable, SingleAdjustment, ValueRecord};
use ttf_parser::gsub::{Ligature, SingleSubstitution, SubstitutionSubtable};
use ttf_parser::opentype_layout::{LanguageSystem, LayoutTable, Lookup};
use ttf_parser::GlyphId;

use super::layout::{self, GlyphClass, LookupEngine, LookupMap, TableIndex};
use super::MAX_VALUE;
use crate::buffer::{Buffer, GlyphInfo, GlyphPropsFlags};
use crate::common::{Tag, TagExt};
use crate::face::Face;
use crate::unicode::GeneralCategory;
use crate::Mask;

const MAX_CONTEXT_LENGTH: usize = 64;

impl<'a> Face<'a> {
    fn layout_table(&self, table: TableIndex) -> Option<&LayoutTable<'a>> {
        match table {
            TableIndex::GSUB => self.gsub.as_ref(),
            TableIndex::GPOS => self.gpos.as_ref(),
        }
    }

    fn language_system(&self, table: TableIndex, script: Tag, language: Option<Tag>) -> Option<LanguageSystem<'a>> {
        let script = self.layout_table(table)?.scripts.find(script)?;
        match language {
            Some(tag) => script.languages.find(tag),
            None => script.default_language,
        }
    }

    fn feature_lookup_indices(&self, table: TableIndex, feature_index: u16) -> Option<Vec<u16>> {
        let table = self.layout_table(table)?;
        let feature = table.features.get(feature_index)?;
        let count = table.lookups.len();
        Some(feature.lookup_indices.into_iter().filter(|&i| i < count).collect())
    }

    fn gsub_lookup(&self, index: u16) -> Option<Lookup<'a>> {
        self.gsub.as_ref()?.lookups.get(index)
    }
}

impl LookupEngine for Face<'_> {
    fn has_table(&self, table: TableIndex) -> bool {
        self.layout_table(table).is_some()
    }

    fn select_script(&self, table: TableIndex, script_tags: &[Tag]) -> Option<(Tag, bool)> {
        let table = self.layout_table(table)?;

        if let Some(&tag) = script_tags.iter().find(|&&tag| table.scripts.index(tag).is_some()) {
            return Some((tag, true));
        }

        // 'dflt' is a common typo for 'DFLT'. Some old fonts put their
        // features under 'latn' even for other scripts.
        [Tag::default_script(), Tag::default_language(), Tag::from_bytes(b"latn")]
            .into_iter()
            .find(|&tag| table.scripts.index(tag).is_some())
            .map(|tag| (tag, false))
    }

    fn select_language(&self, table: TableIndex, script: Tag, language_tags: &[Tag]) -> Option<Tag> {
        let script = self.layout_table(table)?.scripts.find(script)?;

        language_tags
            .iter()
            .copied()
            .chain(core::iter::once(Tag::default_language()))
            .find(|&tag| script.languages.index(tag).is_some())
    }

    fn required_feature(&self, table: TableIndex, script: Tag, language: Option<Tag>) -> Option<(Tag, Vec<u16>)> {
        let sys = self.language_system(table, script, language)?;
        let index = sys.required_feature?;
        let tag = self.layout_table(table)?.features.get(index)?.tag;
        Some((tag, self.feature_lookup_indices(table, index)?))
    }

    fn lookups_for_feature(
        &self,
        table: TableIndex,
        script: Tag,
        language: Option<Tag>,
        feature: Tag,
    ) -> Option<Vec<u16>> {
        let sys = self.language_system(table, script, language)?;
        let features = &self.layout_table(table)?.features;
        let index = sys
            .feature_indices
            .into_iter()
            .find(|&idx| features.get(idx).map(|f| f.tag) == Some(feature))?;
        self.feature_lookup_indices(table, index)
    }

    fn lookups_for_feature_anywhere(&self, table: TableIndex, feature: Tag) -> Option<Vec<u16>> {
        let features = &self.layout_table(table)?.features;
        let index = (0..features.len()).find(|&idx| features.get(idx).map(|f| f.tag) == Some(feature))?;
        self.feature_lookup_indices(table, index)
    }

    fn lookup_would_substitute(&self, lookup_index: u16, glyphs: &[u32], _zero_context: bool) -> bool {
        let Some(lookup) = self.gsub_lookup(lookup_index) else {
            return false;
        };

        let glyphs: SmallVec<[GlyphId; 4]> = glyphs.iter().map(|&g| GlyphId(g as u16)).collect();
        if glyphs.is_empty() {
            return false;
        }

        lookup
            .subtables
            .into_iter::<SubstitutionSubtable>()
            .any(|subtable| would_substitute(&subtable, &glyphs))
    }

    fn apply_lookups(&self, table: TableIndex, buffer: &mut Buffer, lookups: &[LookupMap]) {
        let Some(layout_table) = self.layout_table(table) else {
            return;
        };

        let mut ctx = ApplyContext::new(table, self, buffer);
        for lookup_map in lookups {
            let Some(lookup) = layout_table.lookups.get(lookup_map.index) else {
                continue;
            };

            ctx.lookup_mask = lookup_map.mask;
            ctx.auto_zwnj = lookup_map.auto_zwnj;
            ctx.auto_zwj = lookup_map.auto_zwj;
            ctx.random = lookup_map.random;
            ctx.per_syllable = lookup_map.per_syllable;
            ctx.apply_string(lookup);

            if !ctx.buffer.successful || ctx.buffer.max_ops <= 0 {
                break;
            }
        }
    }

    fn glyph_class(&self, glyph: u32) -> Option<GlyphClass> {
        let gdef = self.tables().gdef?;
        match gdef.glyph_class(GlyphId(u16::try_from(glyph).ok()?))? {
            ttf_parser::gdef::GlyphClass::Base => Some(GlyphClass::Base),
            ttf_parser::gdef::GlyphClass::Ligature => Some(GlyphClass::Ligature),
            ttf_parser::gdef::GlyphClass::Mark => Some(GlyphClass::Mark),
            ttf_parser::gdef::GlyphClass::Component => Some(GlyphClass::Component),
        }
    }

    fn mark_attachment_class(&self, glyph: u32) -> u8 {
        match (self.tables().gdef, u16::try_from(glyph)) {
            (Some(gdef), Ok(g)) => gdef.glyph_mark_attachment_class(GlyphId(g)) as u8,
            _ => 0,
        }
    }

    fn has_glyph_classes(&self) -> bool {
        self.tables().gdef.is_some_and(|gdef| gdef.has_glyph_classes())
    }

    fn is_mark_glyph(&self, glyph: u32, set_index: u16) -> bool {
        match (self.tables().gdef, u16::try_from(glyph)) {
            (Some(gdef), Ok(g)) => gdef.is_mark_glyph(GlyphId(g), Some(set_index)),
            _ => false,
        }
    }

    fn closure_lookup(&self, lookup_index: u16, glyphs: &mut BTreeSet<u32>) {
        let Some(lookup) = self.gsub_lookup(lookup_index) else {
            return;
        };

        let snapshot: Vec<u32> = glyphs.iter().copied().collect();
        for subtable in lookup.subtables.into_iter::<SubstitutionSubtable>() {
            for &g in &snapshot {
                let Ok(glyph) = u16::try_from(g).map(GlyphId) else {
                    continue;
                };

                closure_subtable(&subtable, glyph, &snapshot, glyphs);
            }
        }
    }
}

fn would_substitute(subtable: &SubstitutionSubtable, glyphs: &[GlyphId]) -> bool {
    let first = glyphs[0];
    match subtable {
        SubstitutionSubtable::Single(t) => glyphs.len() == 1 && t.coverage().get(first).is_some(),
        SubstitutionSubtable::Multiple(t) => glyphs.len() == 1 && t.coverage.get(first).is_some(),
        SubstitutionSubtable::Alternate(t) => glyphs.len() == 1 && t.coverage.get(first).is_some(),
        SubstitutionSubtable::Ligature(t) => t
            .coverage
            .get(first)
            .and_then(|idx| t.ligature_sets.get(idx))
            .is_some_and(|set| set.into_iter().any(|lig| ligature_matches(&lig, glyphs))),
        _ => false,
    }
}

fn ligature_matches(lig: &Ligature, glyphs: &[GlyphId]) -> bool {
    glyphs.len() == usize::from(lig.components.len()) + 1
        && lig.components.into_iter().zip(&glyphs[1..]).all(|(c, &g)| c == g)
}

fn closure_subtable(subtable: &SubstitutionSubtable, glyph: GlyphId, snapshot: &[u32], out: &mut BTreeSet<u32>) {
    match subtable {
        SubstitutionSubtable::Single(t) => {
            if let Some(g) = single_substitute(t, glyph) {
                out.insert(u32::from(g.0));
            }
        }
        SubstitutionSubtable::Multiple(t) => {
            if let Some(seq) = t.coverage.get(glyph).and_then(|idx| t.sequences.get(idx)) {
                out.extend(seq.substitutes.into_iter().map(|g| u32::from(g.0)));
            }
        }
        SubstitutionSubtable::Alternate(t) => {
            if let Some(set) = t.coverage.get(glyph).and_then(|idx| t.alternate_sets.get(idx)) {
                out.extend(set.alternates.into_iter().map(|g| u32::from(g.0)));
            }
        }
        SubstitutionSubtable::Ligature(t) => {
            if let Some(set) = t.coverage.get(glyph).and_then(|idx| t.ligature_sets.get(idx)) {
                for lig in set {
                    if lig.components.into_iter().all(|c| snapshot.contains(&u32::from(c.0))) {
                        out.insert(u32::from(lig.glyph.0));
                    }
                }
            }
        }
        _ => {}
    }
}

fn single_substitute(t: &SingleSubstitution, glyph: GlyphId) -> Option<GlyphId> {
    match *t {
        SingleSubstitution::Format1 { coverage, delta } => {
            coverage.get(glyph)?;
            // The result is limited to 16 bits.
            Some(GlyphId((i32::from(glyph.0) + i32::from(delta)) as u16))
        }
        SingleSubstitution::Format2 { coverage, substitutes } => substitutes.get(coverage.get(glyph)?),
    }
}

struct ApplyContext<'a, 'b> {
    table_index: TableIndex,
    face: &'a Face<'b>,
    buffer: &'a mut Buffer,
    lookup_mask: Mask,
    lookup_props: u32,
    auto_zwnj: bool,
    auto_zwj: bool,
    random: bool,
    per_syllable: bool,
    random_state: u32,
}

impl<'a, 'b> ApplyContext<'a, 'b> {
    fn new(table_index: TableIndex, face: &'a Face<'b>, buffer: &'a mut Buffer) -> Self {
        ApplyContext {
            table_index,
            face,
            buffer,
            lookup_mask: 1,
            lookup_props: 0,
            auto_zwnj: true,
            auto_zwj: true,
            random: false,
            per_syllable: false,
            random_state: 1,
        }
    }

    fn random_number(&mut self) -> u32 {
        // minstd_rand
        self.random_state = self.random_state.wrapping_mul(48271) % 2147483647;
        self.random_state
    }

    fn check_glyph_property(&self, info: &GlyphInfo, match_props: u32) -> bool {
        layout::check_glyph_property(self.face, info, match_props)
    }

    fn apply_string(&mut self, lookup: Lookup) {
        if self.buffer.is_empty() || self.lookup_mask == 0 {
            return;
        }

        self.lookup_props = u32::from(lookup.flags.0);
        if let Some(set) = lookup.mark_filtering_set {
            self.lookup_props |= u32::from(set) << 16;
        }

        match self.table_index {
            TableIndex::GSUB => {
                let subtables: SmallVec<[SubstitutionSubtable; 4]> =
                    lookup.subtables.into_iter::<SubstitutionSubtable>().collect();

                self.buffer.clear_output();
                self.buffer.idx = 0;
                while self.buffer.idx < self.buffer.len && self.buffer.successful {
                    if !self.buffer.spend_ops(1) {
                        break;
                    }

                    let cur = *self.buffer.cur(0);
                    let applied = cur.mask & self.lookup_mask != 0
                        && self.check_glyph_property(&cur, self.lookup_props)
                        && subtables.iter().any(|subtable| self.apply_subst(subtable).is_some());

                    if !applied {
                        self.buffer.next_glyph();
                    }
                }
                self.buffer.swap_buffers();
            }
            TableIndex::GPOS => {
                let subtables: SmallVec<[PositioningSubtable; 4]> =
                    lookup.subtables.into_iter::<PositioningSubtable>().collect();

                self.buffer.idx = 0;
                while self.buffer.idx < self.buffer.len {
                    if !self.buffer.spend_ops(1) {
                        break;
                    }

                    let cur = *self.buffer.cur(0);
                    let applied = cur.mask & self.lookup_mask != 0
                        && self.check_glyph_property(&cur, self.lookup_props)
                        && subtables.iter().any(|subtable| self.apply_pos(subtable).is_some());

                    if !applied {
                        self.buffer.idx += 1;
                    }
                }
                self.buffer.idx = 0;
            }
        }
    }

    fn set_glyph_class(&mut self, glyph: u32, class_guess: GlyphPropsFlags, ligature: bool, component: bool) {
        let has_glyph_classes = self.face.has_glyph_classes();
        let new_props = layout::glyph_props(self.face, glyph);

        let cur = self.buffer.cur_mut(0);
        let mut props = cur.glyph_props() | GlyphPropsFlags::SUBSTITUTED;

        if ligature {
            // Only the last of ligation and multiplication is remembered.
            props |= GlyphPropsFlags::LIGATED;
            props.remove(GlyphPropsFlags::MULTIPLIED);
        }

        if component {
            props |= GlyphPropsFlags::MULTIPLIED;
        }

        if has_glyph_classes {
            props &= GlyphPropsFlags::PRESERVE;
            cur.glyph_props = props.bits() | new_props;
        } else if !class_guess.is_empty() {
            props &= GlyphPropsFlags::PRESERVE;
            cur.set_glyph_props(props | class_guess);
        } else {
            cur.set_glyph_props(props);
        }
    }

    fn replace_glyph(&mut self, glyph: GlyphId) {
        let glyph = u32::from(glyph.0);
        self.set_glyph_class(glyph, GlyphPropsFlags::empty(), false, false);
        self.buffer.replace_glyph(glyph);
    }

    fn apply_subst(&mut self, subtable: &SubstitutionSubtable) -> Option<()> {
        let glyph = GlyphId(self.buffer.cur(0).glyph_id as u16);
        match subtable {
            SubstitutionSubtable::Single(t) => {
                let subst = single_substitute(t, glyph)?;
                self.replace_glyph(subst);
            }
            SubstitutionSubtable::Multiple(t) => {
                let seq = t.sequences.get(t.coverage.get(glyph)?)?;
                match seq.substitutes.len() {
                    // Disallowed, but Uniscribe deletes the glyph.
                    0 => {
                        let num_in = 1;
                        self.buffer.replace_glyphs(num_in, &[]);
                    }
                    1 => self.replace_glyph(seq.substitutes.get(0)?),
                    _ => {
                        let class = if self.buffer.cur(0).is_ligature() {
                            GlyphPropsFlags::BASE_GLYPH
                        } else {
                            GlyphPropsFlags::empty()
                        };
                        let lig_id = self.buffer.cur(0).lig_id();

                        for (i, subst) in seq.substitutes.into_iter().enumerate() {
                            // Keep attachment to a ligature undisturbed.
                            if lig_id == 0 {
                                self.buffer.cur_mut(0).set_lig_props_for_component(i as u8);
                            }

                            let g = u32::from(subst.0);
                            self.set_glyph_class(g, class, false, true);
                            self.buffer.output_glyph(g);
                        }

                        self.buffer.skip_glyph();
                    }
                }
            }
            SubstitutionSubtable::Alternate(t) => {
                let set = t.alternate_sets.get(t.coverage.get(glyph)?)?;
                let len = set.alternates.len();
                if len == 0 {
                    return None;
                }

                let glyph_mask = self.buffer.cur(0).mask;
                let shift = self.lookup_mask.trailing_zeros();
                let mut alt_index = (self.lookup_mask & glyph_mask) >> shift;

                if alt_index == MAX_VALUE && self.random {
                    let len_all = self.buffer.len;
                    self.buffer.unsafe_to_break(0, len_all);
                    alt_index = self.random_number() % u32::from(len) + 1;
                }

                let idx = u16::try_from(alt_index).ok()?.checked_sub(1)?;
                self.replace_glyph(set.alternates.get(idx)?);
            }
            SubstitutionSubtable::Ligature(t) => {
                let set = t.ligature_sets.get(t.coverage.get(glyph)?)?;
                for lig in set {
                    if self.apply_ligature(&lig).is_some() {
                        return Some(());
                    }
                }

                return None;
            }
            _ => return None,
        }

        Some(())
    }

    fn apply_ligature(&mut self, lig: &Ligature) -> Option<()> {
        if lig.components.is_empty() {
            self.replace_glyph(lig.glyph);
            return Some(());
        }

        let count = usize::from(lig.components.len()) + 1;
        if count > MAX_CONTEXT_LENGTH {
            return None;
        }

        let mut positions: SmallVec<[usize; 8]> = SmallVec::new();
        positions.push(self.buffer.idx);
        let mut total_component_count = self.buffer.cur(0).lig_num_comps();

        let mut iter = SkippyIter::new(self, self.buffer.idx, false);
        for component in lig.components {
            let wanted = u32::from(component.0);
            if !iter.next(self, |info| info.glyph_id == wanted) {
                let end = (iter.idx + 1).min(self.buffer.len);
                let start = self.buffer.idx;
                self.buffer.unsafe_to_break(start, end);
                return None;
            }

            positions.push(iter.idx);
            total_component_count += self.buffer.info[iter.idx].lig_num_comps();
        }

        let match_end = iter.idx + 1;
        self.ligate(&positions, match_end, total_component_count, u32::from(lig.glyph.0));
        Some(())
    }

    fn ligate(&mut self, positions: &[usize], match_end: usize, total_component_count: u8, lig_glyph: u32) {
        // A base that ligates with marks stays a base, so following marks can
        // still attach to it. A ligature of marks only keeps its old ligature
        // id, so it can attach to a base ligature in GPOS.
        let start = self.buffer.idx;
        self.buffer.merge_clusters(start, match_end);

        let mut is_base_ligature = self.buffer.info[positions[0]].is_base_glyph();
        let mut is_mark_ligature = self.buffer.info[positions[0]].is_mark();
        for &pos in &positions[1..] {
            if !self.buffer.info[pos].is_mark() {
                is_base_ligature = false;
                is_mark_ligature = false;
            }
        }

        let is_ligature = !is_base_ligature && !is_mark_ligature;
        let class = if is_ligature {
            GlyphPropsFlags::LIGATURE
        } else {
            GlyphPropsFlags::empty()
        };
        let lig_id = if is_ligature { self.buffer.allocate_lig_id() } else { 0 };

        let first = self.buffer.cur_mut(0);
        let mut last_lig_id = first.lig_id();
        let mut last_num_comps = first.lig_num_comps();
        let mut comps_so_far = last_num_comps;

        if is_ligature {
            first.set_lig_props_for_ligature(lig_id, total_component_count);
            if first.general_category() == GeneralCategory::NonspacingMark {
                first.set_general_category(GeneralCategory::OtherLetter);
            }
        }

        self.set_glyph_class(lig_glyph, class, true, false);
        self.buffer.replace_glyph(lig_glyph);

        for &pos in &positions[1..] {
            while self.buffer.idx < pos && self.buffer.successful {
                if is_ligature {
                    let cur = self.buffer.cur_mut(0);
                    let mut this_comp = cur.lig_comp();
                    if this_comp == 0 {
                        this_comp = last_num_comps;
                    }
                    let new_lig_comp = comps_so_far - last_num_comps + this_comp.min(last_num_comps);
                    cur.set_lig_props_for_mark(lig_id, new_lig_comp);
                }
                self.buffer.next_glyph();
            }

            let cur = self.buffer.cur(0);
            last_lig_id = cur.lig_id();
            last_num_comps = cur.lig_num_comps();
            comps_so_far += last_num_comps;

            // Skip the component itself.
            self.buffer.skip_glyph();
        }

        if !is_mark_ligature && last_lig_id != 0 {
            // Re-adjust components of any marks following.
            for i in self.buffer.idx..self.buffer.len {
                let info = &mut self.buffer.info[i];
                if info.lig_id() != last_lig_id {
                    break;
                }

                let this_comp = info.lig_comp();
                if this_comp == 0 {
                    break;
                }

                let new_lig_comp = comps_so_far - last_num_comps + this_comp.min(last_num_comps);
                info.set_lig_props_for_mark(lig_id, new_lig_comp);
            }
        }
    }

    fn apply_pos(&mut self, subtable: &PositioningSubtable) -> Option<()> {
        let glyph = GlyphId(self.buffer.cur(0).glyph_id as u16);
        match subtable {
            PositioningSubtable::Single(t) => {
                let record = match t {
                    SingleAdjustment::Format1 { coverage, value } => {
                        coverage.get(glyph)?;
                        *value
                    }
                    SingleAdjustment::Format2 { coverage, values } => values.get(coverage.get(glyph)?)?,
                };

                let idx = self.buffer.idx;
                self.apply_value(&record, idx);
                self.buffer.idx += 1;
                Some(())
            }
            PositioningSubtable::Pair(t) => self.apply_pair(t, glyph),
            _ => None,
        }
    }

    fn apply_pair(&mut self, t: &PairAdjustment, first: GlyphId) -> Option<()> {
        let first_index = t.coverage().get(first)?;

        let mut iter = SkippyIter::new(self, self.buffer.idx, false);
        if !iter.next(self, |_| true) {
            return None;
        }

        let second_idx = iter.idx;
        let second = GlyphId(self.buffer.info[second_idx].glyph_id as u16);

        let records = match t {
            PairAdjustment::Format1 { sets, .. } => sets.get(first_index)?.get(second)?,
            PairAdjustment::Format2 { classes, matrix, .. } => {
                matrix.get((classes.0.get(first), classes.1.get(second)))?
            }
        };

        let idx = self.buffer.idx;
        let worked1 = self.apply_value(&records.0, idx);
        let worked2 = self.apply_value(&records.1, second_idx);
        if worked1 || worked2 {
            self.buffer.unsafe_to_break(idx, second_idx + 1);
        }

        self.buffer.idx = second_idx;
        if !is_empty_record(&records.1) {
            self.buffer.idx += 1;
        }

        Some(())
    }

    fn apply_value(&mut self, record: &ValueRecord, idx: usize) -> bool {
        let horizontal = self.buffer.direction.is_horizontal();
        let Some(pos) = self.buffer.pos.get_mut(idx) else {
            return false;
        };

        let mut worked = false;
        if record.x_placement != 0 {
            pos.x_offset += i32::from(record.x_placement);
            worked = true;
        }

        if record.y_placement != 0 {
            pos.y_offset += i32::from(record.y_placement);
            worked = true;
        }

        if record.x_advance != 0 && horizontal {
            pos.x_advance += i32::from(record.x_advance);
            worked = true;
        }

        if record.y_advance != 0 && !horizontal {
            // y_advance grows downward, font space grows upward.
            pos.y_advance -= i32::from(record.y_advance);
            worked = true;
        }

        worked
    }
}

fn is_empty_record(record: &ValueRecord) -> bool {
    record.x_placement == 0
        && record.y_placement == 0
        && record.x_advance == 0
        && record.y_advance == 0
        && record.x_placement_device.is_none()
        && record.y_placement_device.is_none()
        && record.x_advance_device.is_none()
        && record.y_advance_device.is_none()
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum MaySkip {
    No,
    Yes,
    Maybe,
}

/// Walks forward from a glyph, skipping what the lookup flags ignore.
struct SkippyIter {
    lookup_props: u32,
    ignore_zwnj: bool,
    ignore_zwj: bool,
    ignore_hidden: bool,
    mask: Mask,
    syllable: u8,
    idx: usize,
}

impl SkippyIter {
    fn new(ctx: &ApplyContext, start: usize, context_match: bool) -> Self {
        let is_gpos = ctx.table_index == TableIndex::GPOS;
        SkippyIter {
            lookup_props: ctx.lookup_props,
            // GPOS ignores ZWNJ, GSUB only while matching context if asked to.
            ignore_zwnj: is_gpos || (context_match && ctx.auto_zwnj),
            ignore_zwj: context_match || ctx.auto_zwj,
            // Hidden glyphs like CGJ only vanish for GPOS.
            ignore_hidden: is_gpos,
            mask: if context_match { u32::MAX } else { ctx.lookup_mask },
            syllable: if ctx.buffer.idx == start && ctx.per_syllable {
                ctx.buffer.cur(0).syllable()
            } else {
                0
            },
            idx: start,
        }
    }

    fn next(&mut self, ctx: &ApplyContext, matches: impl Fn(&GlyphInfo) -> bool) -> bool {
        while self.idx + 1 < ctx.buffer.len {
            self.idx += 1;
            let info = &ctx.buffer.info[self.idx];

            let skip = self.may_skip(ctx, info);
            if skip == MaySkip::Yes {
                continue;
            }

            let may_match = info.mask & self.mask != 0 && (self.syllable == 0 || self.syllable == info.syllable());
            if may_match && matches(info) {
                return true;
            }

            if skip == MaySkip::No {
                return false;
            }
        }

        false
    }

    fn may_skip(&self, ctx: &ApplyContext, info: &GlyphInfo) -> MaySkip {
        if !ctx.check_glyph_property(info, self.lookup_props) {
            return MaySkip::Yes;
        }

        if info.is_default_ignorable()
            && (self.ignore_zwnj || !info.is_zwnj())
            && (self.ignore_zwj || !info.is_zwj())
            && (self.ignore_hidden || !info.is_hidden())
        {
            return MaySkip::Maybe;
        }

        MaySkip::No
    }
}
