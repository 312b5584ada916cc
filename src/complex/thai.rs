use super::{ComplexShaper, ZeroWidthMarks};
use crate::buffer::{Buffer, BufferClusterLevel};
use crate::common::script;
use crate::face::Font;
use crate::ot::TableIndex;
use crate::plan::ShapePlan;
use crate::unicode::GeneralCategory;

pub(crate) static THAI_SHAPER: ThaiShaper = ThaiShaper;

pub(crate) struct ThaiShaper;

impl ComplexShaper for ThaiShaper {
    fn preprocess_text(&self, plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
        decompose_sara_am(buffer);

        // Fonts with Thai GSUB do their own mark placement.
        if plan.script == Some(script::THAI) && !plan.ot_map.found_script(TableIndex::GSUB) {
            log::debug!("no Thai GSUB, shifting marks through PUA glyphs");
            pua_shape(font, buffer);
        }
    }

    // Thai fonts often lack GDEF; the PUA forms are drawn over the
    // preceding consonant once their advance is gone.
    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        Some(ZeroWidthMarks::ByUnicodeEarly)
    }

    fn fallback_position(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ConsonantType {
    Normal,
    Ascender,
    Removable,
    Descender,
    NotConsonant,
}

fn consonant_type(u: u32) -> ConsonantType {
    match u {
        0x0E1B | 0x0E1D | 0x0E1F => ConsonantType::Ascender,
        0x0E0D | 0x0E10 => ConsonantType::Removable,
        0x0E0E | 0x0E0F => ConsonantType::Descender,
        0x0E01..=0x0E2E => ConsonantType::Normal,
        _ => ConsonantType::NotConsonant,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum MarkType {
    Above = 0,
    Below = 1,
    Tone = 2,
}

fn mark_type(u: u32) -> Option<MarkType> {
    match u {
        0x0E31 | 0x0E34..=0x0E37 | 0x0E47 | 0x0E4D..=0x0E4E => Some(MarkType::Above),
        0x0E38..=0x0E3A => Some(MarkType::Below),
        0x0E48..=0x0E4C => Some(MarkType::Tone),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Action {
    Nop,
    /// Shift down.
    Sd,
    /// Shift left.
    Sl,
    /// Shift down-left.
    Sdl,
    /// Remove descender.
    Rd,
}

#[rustfmt::skip]
const SD_MAPPINGS: &[(u16, u16)] = &[
    (0x0E48, 0xF70A), (0x0E49, 0xF70B), (0x0E4A, 0xF70C), (0x0E4B, 0xF70D),
    (0x0E4C, 0xF70E), (0x0E38, 0xF718), (0x0E39, 0xF719), (0x0E3A, 0xF71A),
];

#[rustfmt::skip]
const SDL_MAPPINGS: &[(u16, u16)] = &[
    (0x0E48, 0xF705), (0x0E49, 0xF706), (0x0E4A, 0xF707), (0x0E4B, 0xF708),
    (0x0E4C, 0xF709),
];

#[rustfmt::skip]
const SL_MAPPINGS: &[(u16, u16)] = &[
    (0x0E48, 0xF713), (0x0E49, 0xF714), (0x0E4A, 0xF715), (0x0E4B, 0xF716),
    (0x0E4C, 0xF717), (0x0E31, 0xF710), (0x0E34, 0xF701), (0x0E35, 0xF702),
    (0x0E36, 0xF703), (0x0E37, 0xF704), (0x0E47, 0xF712), (0x0E4D, 0xF711),
];

const RD_MAPPINGS: &[(u16, u16)] = &[(0x0E0D, 0xF70F), (0x0E10, 0xF700)];

/// The legacy Windows PUA form of `u` under `action`, if the font has it.
fn pua_form(font: &Font, u: u32, action: Action) -> u32 {
    let mappings = match action {
        Action::Nop => return u,
        Action::Sd => SD_MAPPINGS,
        Action::Sl => SL_MAPPINGS,
        Action::Sdl => SDL_MAPPINGS,
        Action::Rd => RD_MAPPINGS,
    };

    mappings
        .iter()
        .find(|&&(from, _)| u32::from(from) == u)
        .map(|&(_, to)| u32::from(to))
        .filter(|&to| font.has_glyph_u32(to))
        .unwrap_or(u)
}

#[derive(Clone, Copy)]
struct Edge<S> {
    action: Action,
    next: S,
}

const fn e<S>(action: Action, next: S) -> Edge<S> {
    Edge { action, next }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum AboveState {
    /// Base with no ascender.
    T0,
    /// Ascender base.
    T1,
    /// Ascender base with one above mark.
    T2,
    /// Nothing left to shift.
    T3,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum BelowState {
    /// Base with no descender.
    B0,
    /// Base with a removable descender.
    B1,
    /// Base with a strict descender.
    B2,
}

use Action::{Nop, Rd, Sd, Sdl, Sl};
use AboveState::{T0, T1, T2, T3};
use BelowState::{B0, B1, B2};

// Columns: above, below, tone.
#[rustfmt::skip]
const ABOVE_STATE_MACHINE: [[Edge<AboveState>; 3]; 4] = [
    /* T0 */ [e(Nop, T3), e(Nop, T0), e(Sd, T3)],
    /* T1 */ [e(Sl, T2), e(Nop, T1), e(Sdl, T2)],
    /* T2 */ [e(Nop, T3), e(Nop, T2), e(Sl, T3)],
    /* T3 */ [e(Nop, T3), e(Nop, T3), e(Nop, T3)],
];

#[rustfmt::skip]
const BELOW_STATE_MACHINE: [[Edge<BelowState>; 3]; 3] = [
    /* B0 */ [e(Nop, B0), e(Nop, B2), e(Nop, B0)],
    /* B1 */ [e(Nop, B1), e(Rd, B2), e(Nop, B1)],
    /* B2 */ [e(Nop, B2), e(Sd, B2), e(Nop, B2)],
];

fn start_states(ct: ConsonantType) -> (AboveState, BelowState) {
    match ct {
        ConsonantType::Normal => (T0, B0),
        ConsonantType::Ascender => (T1, B0),
        ConsonantType::Removable => (T0, B1),
        ConsonantType::Descender => (T0, B2),
        ConsonantType::NotConsonant => (T3, B2),
    }
}

/// Moves marks out of the way of ascenders and descenders using the
/// presentation glyphs older Thai fonts keep in the Private Use Area.
fn pua_shape(font: &Font, buffer: &mut Buffer) {
    let (mut above_state, mut below_state) = start_states(ConsonantType::NotConsonant);
    let mut base = 0;

    for i in 0..buffer.len {
        let u = buffer.info[i].glyph_id;
        let Some(mt) = mark_type(u) else {
            (above_state, below_state) = start_states(consonant_type(u));
            base = i;
            continue;
        };

        let above_edge = ABOVE_STATE_MACHINE[above_state as usize][mt as usize];
        let below_edge = BELOW_STATE_MACHINE[below_state as usize][mt as usize];
        above_state = above_edge.next;
        below_state = below_edge.next;

        // At least one of the actions is a no-op.
        let action = if above_edge.action != Nop {
            above_edge.action
        } else {
            below_edge.action
        };

        buffer.unsafe_to_break(base, i);
        if action == Rd {
            buffer.info[base].glyph_id = pua_form(font, buffer.info[base].glyph_id, action);
        } else {
            buffer.info[i].glyph_id = pua_form(font, u, action);
        }
    }
}

// Thai and Lao share the layout, 0x80 apart.
fn is_sara_am(u: u32) -> bool {
    (u & !0x0080) == 0x0E33
}

fn nikhahit_from_sara_am(u: u32) -> u32 {
    u - 0x0E33 + 0x0E4D
}

fn sara_aa_from_sara_am(u: u32) -> u32 {
    u - 1
}

fn is_above_base_mark(u: u32) -> bool {
    matches!(u & !0x0080, 0x0E34..=0x0E37 | 0x0E47..=0x0E4E | 0x0E31 | 0x0E3B)
}

/// Splits SARA AM into NIKHAHIT and SARA AA, moving the NIKHAHIT before
/// the above-base marks it follows.
fn decompose_sara_am(buffer: &mut Buffer) {
    buffer.clear_output();

    while buffer.idx < buffer.len && buffer.successful {
        let u = buffer.cur(0).glyph_id;
        if !is_sara_am(u) {
            buffer.next_glyph();
            continue;
        }

        buffer.output_glyph(nikhahit_from_sara_am(u));
        if buffer.out_len() > 0 {
            buffer.prev_mut().set_continuation();
        }
        buffer.replace_glyph(sara_aa_from_sara_am(u));

        let end = buffer.out_len();
        if end < 2 {
            continue;
        }

        // Zeroed like any other combining mark.
        buffer.out_info_mut()[end - 2].set_general_category(GeneralCategory::NonspacingMark);

        let mut start = end - 2;
        while start > 0 && is_above_base_mark(buffer.out_info()[start - 1].glyph_id) {
            start -= 1;
        }

        if start + 2 < end {
            buffer.merge_out_clusters(start, end);
            buffer.out_info_mut()[start..end - 1].rotate_right(1);
        } else if start > 0 && buffer.cluster_level == BufferClusterLevel::MonotoneGraphemes {
            // NIKHAHIT is combining; it belongs to the previous cluster.
            buffer.merge_out_clusters(start - 1, end);
        }
    }

    buffer.sync();
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn chars(buffer: &Buffer) -> Vec<u32> {
        buffer.glyph_infos().iter().map(|info| info.glyph_id).collect()
    }

    #[test]
    fn sara_am_splits() {
        let mut buffer = Buffer::new();
        // KO KAI, SARA AM
        buffer.push_str("\u{0E01}\u{0E33}");
        decompose_sara_am(&mut buffer);
        assert_eq!(chars(&buffer), [0x0E01, 0x0E4D, 0x0E32]);
        assert!(buffer.info[1].is_unicode_mark());
    }

    #[test]
    fn nikhahit_moves_before_tone_mark() {
        let mut buffer = Buffer::new();
        // KO KAI, MAI EK, SARA AM
        buffer.push_str("\u{0E01}\u{0E48}\u{0E33}");
        decompose_sara_am(&mut buffer);
        assert_eq!(chars(&buffer), [0x0E01, 0x0E4D, 0x0E48, 0x0E32]);
        assert_eq!(buffer.info[1].cluster, buffer.info[3].cluster);
    }

    #[test]
    fn lao_sara_am_splits() {
        let mut buffer = Buffer::new();
        buffer.push_str("\u{0E81}\u{0EB3}");
        decompose_sara_am(&mut buffer);
        assert_eq!(chars(&buffer), [0x0E81, 0x0ECD, 0x0EB2]);
    }

    #[test]
    fn character_classes() {
        assert_eq!(consonant_type(0x0E1B), ConsonantType::Ascender);
        assert_eq!(consonant_type(0x0E10), ConsonantType::Removable);
        assert_eq!(consonant_type(0x0E01), ConsonantType::Normal);
        assert_eq!(mark_type(0x0E49), Some(MarkType::Tone));
        assert_eq!(mark_type(0x0E38), Some(MarkType::Below));
        assert_eq!(mark_type(0x0E01), None);
    }

    #[test]
    fn ascender_shifts_tone_left() {
        let (above, _) = start_states(ConsonantType::Ascender);
        let edge = ABOVE_STATE_MACHINE[above as usize][MarkType::Tone as usize];
        assert_eq!(edge.action, Sdl);
    }
}
