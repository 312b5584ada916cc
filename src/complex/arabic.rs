use alloc::boxed::Box;
use core::any::Any;

use super::arabic_fallback::FallbackPlan;
use super::arabic_table::{joining_class, JoiningClass};
use super::{ComplexShaper, ZeroWidthMarks};
use crate::buffer::Buffer;
use crate::common::{script, Tag};
use crate::face::Font;
use crate::ot::{feature, FeatureFlags};
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::modified_combining_class as mcc;
use crate::Mask;

pub(crate) static ARABIC_SHAPER: ArabicShaper = ArabicShaper;

pub(crate) struct ArabicShaper;

/// Positional features, in the order the joining actions index them.
pub(crate) const ARABIC_FEATURES: [Tag; 7] = [
    feature::ISOLATED_FORMS,
    feature::TERMINAL_FORMS_1,
    feature::TERMINAL_FORMS_2,
    feature::TERMINAL_FORMS_3,
    feature::MEDIAL_FORMS,
    feature::MEDIAL_FORMS_2,
    feature::INITIAL_FORMS,
];

fn feature_is_syriac(tag: Tag) -> bool {
    matches!(tag.to_bytes()[3], b'2' | b'3')
}

/// Joining actions: indices into `ARABIC_FEATURES`, or `NONE`.
pub(crate) mod action {
    pub const ISOL: u8 = 0;
    pub const FINA: u8 = 1;
    pub const FIN2: u8 = 2;
    pub const FIN3: u8 = 3;
    pub const MEDI: u8 = 4;
    pub const MED2: u8 = 5;
    pub const INIT: u8 = 6;
    pub const NONE: u8 = 7;
}

use action::*;

#[derive(Clone, Copy)]
struct Transition {
    prev_action: u8,
    curr_action: u8,
    next_state: u8,
}

const fn t(prev_action: u8, curr_action: u8, next_state: u8) -> Transition {
    Transition {
        prev_action,
        curr_action,
        next_state,
    }
}

// Columns follow `JoiningClass` up to `DalathRish`; transparent characters
// never reach the table.
#[rustfmt::skip]
const STATE_TABLE: [[Transition; 6]; 7] = [
    //   NonJoining          Left                Right               Dual                Alaph               DalathRish

    // State 0: previous was U, not willing to join.
    [t(NONE, NONE, 0), t(NONE, ISOL, 2), t(NONE, ISOL, 1), t(NONE, ISOL, 2), t(NONE, ISOL, 1), t(NONE, ISOL, 6)],
    // State 1: previous was R or ISOL/ALAPH, not willing to join.
    [t(NONE, NONE, 0), t(NONE, ISOL, 2), t(NONE, ISOL, 1), t(NONE, ISOL, 2), t(NONE, FIN2, 5), t(NONE, ISOL, 6)],
    // State 2: previous was D/L in ISOL form, willing to join.
    [t(NONE, NONE, 0), t(NONE, ISOL, 2), t(INIT, FINA, 1), t(INIT, FINA, 3), t(INIT, FINA, 4), t(INIT, FINA, 6)],
    // State 3: previous was D in FINA form, willing to join.
    [t(NONE, NONE, 0), t(NONE, ISOL, 2), t(MEDI, FINA, 1), t(MEDI, FINA, 3), t(MEDI, FINA, 4), t(MEDI, FINA, 6)],
    // State 4: previous was FINA ALAPH, not willing to join.
    [t(NONE, NONE, 0), t(NONE, ISOL, 2), t(MED2, ISOL, 1), t(MED2, ISOL, 2), t(MED2, FIN2, 5), t(MED2, ISOL, 6)],
    // State 5: previous was FIN2/FIN3 ALAPH, not willing to join.
    [t(NONE, NONE, 0), t(NONE, ISOL, 2), t(ISOL, ISOL, 1), t(ISOL, ISOL, 2), t(ISOL, FIN2, 5), t(ISOL, ISOL, 6)],
    // State 6: previous was DALATH/RISH, not willing to join.
    [t(NONE, NONE, 0), t(NONE, ISOL, 2), t(NONE, ISOL, 1), t(NONE, ISOL, 2), t(NONE, FIN3, 5), t(NONE, ISOL, 6)],
];

fn transition(state: u8, class: JoiningClass) -> Transition {
    STATE_TABLE[usize::from(state)][class as usize]
}

pub(crate) struct ArabicPlan {
    mask_array: [Mask; ARABIC_FEATURES.len() + 1],
    pub(crate) fallback: Option<FallbackPlan>,
}

impl ComplexShaper for ArabicShaper {
    fn collect_features(&self, planner: &mut ShapePlanner) {
        let is_arabic = planner.script == Some(script::ARABIC);
        let map = &mut planner.ot_map;

        // Positional features are applied one at a time, so that a glyph
        // changed by one of them is still matched by the next as itself.
        map.enable_feature(feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::MANUAL_ZWJ, 1);
        map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::MANUAL_ZWJ, 1);
        map.add_gsub_pause(None);

        for tag in ARABIC_FEATURES {
            let has_fallback = is_arabic && !feature_is_syriac(tag);
            let flags = if has_fallback {
                FeatureFlags::HAS_FALLBACK
            } else {
                FeatureFlags::empty()
            };
            map.add_feature(tag, flags.union(FeatureFlags::MANUAL_ZWJ), 1);
            map.add_gsub_pause(None);
        }

        map.enable_feature(
            feature::REQUIRED_LIGATURES,
            FeatureFlags::MANUAL_ZWJ.union(FeatureFlags::HAS_FALLBACK),
            1,
        );

        if is_arabic {
            map.add_gsub_pause(Some(super::arabic_fallback::fallback_shape));
        }

        // 'calt' and 'rclt' see the final joining forms.
        map.enable_feature(feature::CONTEXTUAL_ALTERNATES, FeatureFlags::MANUAL_ZWJ, 1);
        map.add_gsub_pause(None);
        map.enable_feature(feature::REQUIRED_CONTEXTUAL_ALTERNATES, FeatureFlags::MANUAL_ZWJ, 1);

        map.enable_feature(feature::STANDARD_LIGATURES, FeatureFlags::MANUAL_ZWJ, 1);
        map.enable_feature(feature::CONTEXTUAL_LIGATURES, FeatureFlags::MANUAL_ZWJ, 1);
        map.enable_feature(feature::MARK_POSITIONING_VIA_SUBSTITUTION, FeatureFlags::empty(), 1);
    }

    fn create_data(&self, plan: &ShapePlan, font: &Font) -> Option<Box<dyn Any + Send + Sync>> {
        let mut mask_array = [0; ARABIC_FEATURES.len() + 1];
        let mut do_fallback = plan.script == Some(script::ARABIC);
        for (mask, tag) in mask_array.iter_mut().zip(ARABIC_FEATURES) {
            *mask = plan.ot_map.get_1_mask(tag);
            do_fallback &= feature_is_syriac(tag) || plan.ot_map.needs_fallback(tag);
        }

        let fallback = if do_fallback {
            log::debug!("no Arabic GSUB, synthesizing presentation forms");
            FallbackPlan::new(plan, font)
        } else {
            None
        };

        Some(Box::new(ArabicPlan { mask_array, fallback }))
    }

    fn setup_masks(&self, plan: &ShapePlan, _: &Font, buffer: &mut Buffer) {
        let Some(arabic_plan) = plan.data::<ArabicPlan>() else {
            return;
        };

        arabic_joining(buffer);

        if plan.script == Some(script::MONGOLIAN) {
            mongolian_variation_selectors(buffer);
        }

        for info in buffer.info_slice_mut() {
            let action = info.arabic_action().unwrap_or(NONE);
            info.mask |= arabic_plan.mask_array[usize::from(action)];
        }
    }

    fn reorder_marks(&self, _: &ShapePlan, buffer: &mut Buffer, start: usize, end: usize) {
        reorder_marks(buffer, start, end);
    }

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        Some(ZeroWidthMarks::ByGdefLate)
    }

    fn fallback_position(&self) -> bool {
        true
    }
}

/// Runs the joining automaton over the buffer, the pre-context and the
/// post-context, and stores the chosen action in every glyph.
fn arabic_joining(buffer: &mut Buffer) {
    let mut prev: Option<usize> = None;
    let mut state = 0;

    // The pre-context is stored nearest character first.
    for &c in buffer.context(0) {
        let class = joining_class(c);
        if class == JoiningClass::Transparent {
            continue;
        }

        state = transition(state, class).next_state;
        break;
    }

    for i in 0..buffer.len {
        let class = char::from_u32(buffer.info[i].glyph_id).map_or(JoiningClass::NonJoining, joining_class);
        if class == JoiningClass::Transparent {
            buffer.info[i].set_arabic_action(NONE);
            continue;
        }

        let entry = transition(state, class);
        if let Some(prev) = prev {
            if entry.prev_action != NONE {
                buffer.info[prev].set_arabic_action(entry.prev_action);
                buffer.unsafe_to_break(prev, i + 1);
            }
        }

        buffer.info[i].set_arabic_action(entry.curr_action);

        prev = Some(i);
        state = entry.next_state;
    }

    for &c in buffer.context(1) {
        let class = joining_class(c);
        if class == JoiningClass::Transparent {
            continue;
        }

        let entry = transition(state, class);
        if let Some(prev) = prev {
            if entry.prev_action != NONE {
                buffer.info[prev].set_arabic_action(entry.prev_action);
            }
        }

        break;
    }
}

/// Free variation selectors take the form of the character they follow.
fn mongolian_variation_selectors(buffer: &mut Buffer) {
    for i in 1..buffer.len {
        if matches!(buffer.info[i].glyph_id, 0x180B..=0x180D | 0x180F) {
            let action = buffer.info[i - 1].arabic_action().unwrap_or(NONE);
            buffer.info[i].set_arabic_action(action);
        }
    }
}

const MODIFIER_COMBINING_MARKS: &[u32] = &[
    0x0654, // ARABIC HAMZA ABOVE
    0x0655, // ARABIC HAMZA BELOW
    0x0658, // ARABIC MARK NOON GHUNNA
    0x06DC, // ARABIC SMALL HIGH SEEN
    0x06E3, // ARABIC SMALL LOW SEEN
    0x06E7, // ARABIC SMALL HIGH YEH
    0x06E8, // ARABIC SMALL HIGH NOON
    0x08CA, // ARABIC SMALL HIGH FARSI YEH
    0x08CB, // ARABIC SMALL HIGH YEH BARREE WITH TWO DOTS BELOW
    0x08CD, // ARABIC SMALL HIGH ZAH
    0x08CE, // ARABIC LARGE ROUND DOT ABOVE
    0x08CF, // ARABIC LARGE ROUND DOT BELOW
    0x08D3, // ARABIC SMALL LOW WAW
    0x08F3, // ARABIC SMALL HIGH WAW
];

/// Moves modifier combining marks (hamza and small letters) in front of
/// the other marks of their class, per the Arabic Mark Transient
/// Reordering Algorithm.
fn reorder_marks(buffer: &mut Buffer, mut start: usize, end: usize) {
    let mut i = start;
    for cc in [220u8, 230] {
        while i < end && buffer.info[i].modified_combining_class() < cc {
            i += 1;
        }

        if i == end {
            break;
        }

        if buffer.info[i].modified_combining_class() > cc {
            continue;
        }

        let mut j = i;
        while j < end
            && buffer.info[j].modified_combining_class() == cc
            && MODIFIER_COMBINING_MARKS.contains(&buffer.info[j].glyph_id)
        {
            j += 1;
        }

        if i == j {
            continue;
        }

        buffer.merge_clusters(start, j);
        buffer.info[start..j].rotate_right(j - i);

        // Renumber so the run stays sorted for the normalizer; these classes
        // fold back to below and above in fallback positioning.
        let new_start = start + j - i;
        let new_cc = if cc == 220 { mcc::CCC22 } else { mcc::CCC26 };
        while start < new_start {
            buffer.info[start].set_modified_combining_class(new_cc);
            start += 1;
        }

        i = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GlyphInfo;
    use crate::unicode::GeneralCategory;
    use alloc::vec::Vec;

    fn actions(text: &str) -> Vec<u8> {
        let mut buffer = Buffer::new();
        buffer.push_str(text);
        arabic_joining(&mut buffer);
        buffer.info[..buffer.len]
            .iter()
            .map(|info| info.arabic_action().unwrap_or(NONE))
            .collect()
    }

    #[test]
    fn two_dual_joining_letters() {
        // BEH BEH
        assert_eq!(actions("\u{0628}\u{0628}"), [INIT, FINA]);
    }

    #[test]
    fn three_dual_joining_letters() {
        assert_eq!(actions("\u{0628}\u{0628}\u{0628}"), [INIT, MEDI, FINA]);
    }

    #[test]
    fn right_joining_breaks_the_chain() {
        // BEH ALEF BEH
        assert_eq!(actions("\u{0628}\u{0627}\u{0628}"), [INIT, FINA, ISOL]);
    }

    #[test]
    fn marks_are_transparent() {
        // BEH FATHA BEH
        assert_eq!(actions("\u{0628}\u{064E}\u{0628}"), [INIT, NONE, FINA]);
    }

    #[test]
    fn zwj_causes_joining() {
        assert_eq!(actions("\u{0628}\u{200D}"), [INIT, FINA]);
    }

    #[test]
    fn context_joins() {
        let mut buffer = Buffer::new();
        buffer.push_str("\u{0628}");
        buffer.set_pre_context("\u{0628}");
        buffer.set_post_context("\u{0628}");
        arabic_joining(&mut buffer);
        assert_eq!(buffer.info[0].arabic_action(), Some(MEDI));
    }

    #[test]
    fn syriac_alaph_after_dalath() {
        // DALATH ALAPH
        assert_eq!(actions("\u{0715}\u{0710}"), [ISOL, FIN3]);
    }

    #[test]
    fn hamza_moves_to_the_front_of_the_run() {
        let mut buffer = Buffer::new();
        for (i, (u, cc)) in [(0x064E, 30), (0x0655, 220)].into_iter().enumerate() {
            let mut info = GlyphInfo {
                glyph_id: u,
                cluster: i as u32,
                ..GlyphInfo::default()
            };
            info.set_general_category(GeneralCategory::NonspacingMark);
            info.set_modified_combining_class(cc);
            buffer.info.push(info);
        }
        buffer.len = 2;

        reorder_marks(&mut buffer, 0, 2);
        assert_eq!(buffer.info[0].glyph_id, 0x0655);
        assert_eq!(buffer.info[0].modified_combining_class(), mcc::CCC22);
        assert_eq!(buffer.info[1].glyph_id, 0x064E);
        assert_eq!(buffer.info[0].cluster, buffer.info[1].cluster);
    }
}
