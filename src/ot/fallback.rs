//! Heuristic positioning for fonts without GPOS.

use crate::buffer::{Buffer, GlyphPosition};
use crate::common::Direction;
use crate::face::{Font, GlyphExtents};
use crate::plan::ShapePlan;
use crate::unicode::{modified_combining_class as mcc, GeneralCategory, Space};

// Canonical combining classes the positioner distinguishes.
mod class {
    pub const ATTACHED_BELOW_LEFT: u8 = 200;
    pub const ATTACHED_BELOW: u8 = 202;
    pub const ATTACHED_ABOVE: u8 = 214;
    pub const ATTACHED_ABOVE_RIGHT: u8 = 216;
    pub const BELOW_LEFT: u8 = 218;
    pub const BELOW: u8 = 220;
    pub const BELOW_RIGHT: u8 = 222;
    pub const ABOVE_LEFT: u8 = 228;
    pub const ABOVE: u8 = 230;
    pub const ABOVE_RIGHT: u8 = 232;
    pub const DOUBLE_BELOW: u8 = 233;
    pub const DOUBLE_ABOVE: u8 = 234;
}

fn recategorize_combining_class(u: u32, mut cc: u8) -> u8 {
    if cc >= 200 {
        return cc;
    }

    // Thai and Lao need some per-character work.
    if u & !0xFF == 0x0E00 {
        if cc == 0 {
            match u {
                0x0E31 | 0x0E34..=0x0E37 | 0x0E47 | 0x0E4C..=0x0E4E => cc = class::ABOVE_RIGHT,
                0x0EB1 | 0x0EB4..=0x0EB7 | 0x0EBB | 0x0ECC | 0x0ECD => cc = class::ABOVE,
                0x0EBC => cc = class::BELOW,
                _ => {}
            }
        } else if u == 0x0E3A {
            // Thai virama is below-right.
            cc = class::BELOW_RIGHT;
        }
    }

    match cc {
        // Hebrew
        mcc::CCC10 | mcc::CCC11 | mcc::CCC12 | mcc::CCC13 | mcc::CCC14 | mcc::CCC15 | mcc::CCC16
        | mcc::CCC17 | mcc::CCC18 | mcc::CCC20 | mcc::CCC22 => class::BELOW,
        mcc::CCC23 => class::ATTACHED_ABOVE,
        mcc::CCC24 => class::ABOVE_RIGHT,
        mcc::CCC25 | mcc::CCC19 => class::ABOVE_LEFT,
        mcc::CCC26 => class::ABOVE,
        mcc::CCC21 => cc,

        // Arabic and Syriac
        mcc::CCC27 | mcc::CCC28 | mcc::CCC30 | mcc::CCC31 | mcc::CCC33 | mcc::CCC34 | mcc::CCC35
        | mcc::CCC36 => class::ABOVE,
        mcc::CCC29 | mcc::CCC32 => class::BELOW,

        // Thai
        mcc::CCC103 => class::BELOW_RIGHT,
        mcc::CCC107 => class::ABOVE_RIGHT,

        // Lao
        mcc::CCC118 => class::BELOW,
        mcc::CCC122 => class::ABOVE,

        // Tibetan
        mcc::CCC129 => class::BELOW,
        mcc::CCC130 => class::ABOVE,
        mcc::CCC132 => class::BELOW,

        _ => cc,
    }
}

/// Maps script-specific combining classes onto the positional ones.
///
/// Runs before glyph mapping, while records still hold codepoints.
pub(crate) fn recategorize_marks(_: &ShapePlan, _: &Font, buffer: &mut Buffer) {
    for info in buffer.info_slice_mut() {
        if info.general_category() == GeneralCategory::NonspacingMark {
            let cc = recategorize_combining_class(info.glyph_id, info.modified_combining_class());
            info.set_modified_combining_class(cc);
        }
    }
}

fn zero_mark_advances(buffer: &mut Buffer, start: usize, end: usize, adjust_offsets: bool) {
    for (info, pos) in buffer.info[start..end].iter().zip(&mut buffer.pos[start..end]) {
        if info.general_category() == GeneralCategory::NonspacingMark {
            if adjust_offsets {
                pos.x_offset -= pos.x_advance;
                pos.y_offset -= pos.y_advance;
            }
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}

fn position_mark(
    font: &Font,
    direction: Direction,
    glyph: u32,
    pos: &mut GlyphPosition,
    base_extents: &mut GlyphExtents,
    cc: u8,
) {
    let Some(mark_extents) = font.backend.glyph_extents(glyph) else {
        return;
    };

    let y_gap = font.backend.units_per_em() / 16;
    pos.x_offset = 0;
    pos.y_offset = 0;

    // LEFT and RIGHT marks are not positioned.

    match cc {
        class::DOUBLE_BELOW | class::DOUBLE_ABOVE if direction.is_horizontal() => {
            let edge = if direction.is_forward() { base_extents.width } else { 0 };
            pos.x_offset += base_extents.x_bearing + edge - mark_extents.width / 2 - mark_extents.x_bearing;
        }
        class::ATTACHED_BELOW_LEFT | class::BELOW_LEFT | class::ABOVE_LEFT => {
            // Left align.
            pos.x_offset += base_extents.x_bearing - mark_extents.x_bearing;
        }
        class::ATTACHED_ABOVE_RIGHT | class::BELOW_RIGHT | class::ABOVE_RIGHT => {
            // Right align.
            pos.x_offset +=
                base_extents.x_bearing + base_extents.width - mark_extents.width - mark_extents.x_bearing;
        }
        _ => {
            // Center align.
            pos.x_offset +=
                base_extents.x_bearing + (base_extents.width - mark_extents.width) / 2 - mark_extents.x_bearing;
        }
    }

    let is_attached = matches!(
        cc,
        class::ATTACHED_BELOW_LEFT | class::ATTACHED_BELOW | class::ATTACHED_ABOVE | class::ATTACHED_ABOVE_RIGHT
    );

    match cc {
        class::DOUBLE_BELOW
        | class::BELOW_LEFT
        | class::BELOW
        | class::BELOW_RIGHT
        | class::ATTACHED_BELOW_LEFT
        | class::ATTACHED_BELOW => {
            if !is_attached {
                base_extents.height -= y_gap;
            }

            pos.y_offset = base_extents.y_bearing + base_extents.height - mark_extents.y_bearing;

            // Never shift up "below" marks.
            if (y_gap > 0) == (pos.y_offset > 0) {
                base_extents.height -= pos.y_offset;
                pos.y_offset = 0;
            }

            base_extents.height += mark_extents.height;
        }
        class::DOUBLE_ABOVE
        | class::ABOVE_LEFT
        | class::ABOVE
        | class::ABOVE_RIGHT
        | class::ATTACHED_ABOVE
        | class::ATTACHED_ABOVE_RIGHT => {
            if !is_attached {
                base_extents.y_bearing += y_gap;
                base_extents.height -= y_gap;
            }

            pos.y_offset = base_extents.y_bearing - (mark_extents.y_bearing + mark_extents.height);

            // Don't shift down "above" marks too much.
            if (y_gap > 0) != (pos.y_offset > 0) {
                let correction = -pos.y_offset / 2;
                base_extents.y_bearing += correction;
                base_extents.height -= correction;
                pos.y_offset += correction;
            }

            base_extents.y_bearing -= mark_extents.height;
            base_extents.height += mark_extents.height;
        }
        _ => {}
    }
}

fn position_around_base(
    plan: &ShapePlan,
    font: &Font,
    buffer: &mut Buffer,
    base: usize,
    end: usize,
    adjust_offsets: bool,
) {
    buffer.unsafe_to_break(base, end);

    let base_info = buffer.info[base];
    let base_pos = buffer.pos[base];

    let Some(mut base_extents) = font.backend.glyph_extents(base_info.glyph_id) else {
        zero_mark_advances(buffer, base + 1, end, adjust_offsets);
        return;
    };

    base_extents.y_bearing += base_pos.y_offset;
    base_extents.x_bearing = 0;
    // The advance works better than the ink box, also for zero-ink bases.
    base_extents.width = font.backend.glyph_h_advance(base_info.glyph_id);

    let lig_id = base_info.lig_id();
    let num_lig_components = i32::from(base_info.lig_num_comps());

    let direction = buffer.direction;
    let mut x_offset = 0;
    let mut y_offset = 0;
    if direction.is_forward() {
        x_offset -= base_pos.x_advance;
        y_offset -= base_pos.y_advance;
    }

    let horizontal_dir = if plan.direction.is_horizontal() {
        plan.direction
    } else {
        plan.script
            .and_then(Direction::from_script)
            .unwrap_or(Direction::LeftToRight)
    };

    let mut last_lig_component: i32 = -1;
    let mut last_combining_class: u8 = 255;
    let mut component_extents = base_extents;
    let mut cluster_extents = base_extents;

    for (info, pos) in buffer.info[base + 1..end].iter().zip(&mut buffer.pos[base + 1..end]) {
        let cc = info.modified_combining_class();
        if cc == 0 {
            if direction.is_forward() {
                x_offset -= pos.x_advance;
                y_offset -= pos.y_advance;
            } else {
                x_offset += pos.x_advance;
                y_offset += pos.y_advance;
            }
            continue;
        }

        if num_lig_components > 1 {
            let mut this_lig_component = i32::from(info.lig_comp()) - 1;

            // Attach to the last component unless the mark says otherwise.
            if lig_id == 0 || lig_id != info.lig_id() || this_lig_component >= num_lig_components {
                this_lig_component = num_lig_components - 1;
            }

            if last_lig_component != this_lig_component {
                last_lig_component = this_lig_component;
                last_combining_class = 255;
                component_extents = base_extents;

                let index = if horizontal_dir == Direction::LeftToRight {
                    this_lig_component
                } else {
                    num_lig_components - 1 - this_lig_component
                };
                component_extents.x_bearing += index * component_extents.width / num_lig_components;
                component_extents.width /= num_lig_components;
            }
        }

        if last_combining_class != cc {
            last_combining_class = cc;
            cluster_extents = component_extents;
        }

        position_mark(font, direction, info.glyph_id, pos, &mut cluster_extents, cc);

        pos.x_advance = 0;
        pos.y_advance = 0;
        pos.x_offset += x_offset;
        pos.y_offset += y_offset;
    }
}

fn position_cluster(plan: &ShapePlan, font: &Font, buffer: &mut Buffer, start: usize, end: usize, adjust_offsets: bool) {
    if end - start < 2 {
        return;
    }

    let mut i = start;
    while i < end {
        if !buffer.info[i].is_unicode_mark() {
            let mut j = i + 1;
            while j < end && buffer.info[j].is_unicode_mark() {
                j += 1;
            }

            position_around_base(plan, font, buffer, i, j, adjust_offsets);
            i = j - 1;
        }
        i += 1;
    }
}

/// Stacks marks around their base using glyph extents.
pub(crate) fn position_marks(plan: &ShapePlan, font: &Font, buffer: &mut Buffer, adjust_offsets: bool) {
    let mut start = 0;
    let len = buffer.len;
    for i in 1..len {
        if !buffer.info[i].is_unicode_mark() {
            position_cluster(plan, font, buffer, start, i, adjust_offsets);
            start = i;
        }
    }

    position_cluster(plan, font, buffer, start, len, adjust_offsets);
}

fn advance_of(font: &Font, glyph: u32, horizontal: bool) -> i32 {
    if horizontal {
        font.backend.glyph_h_advance(glyph)
    } else {
        font.backend.glyph_v_advance(glyph)
    }
}

fn set_length(pos: &mut GlyphPosition, horizontal: bool, length: i32) {
    if horizontal {
        pos.x_advance = length;
    } else {
        pos.y_advance = -length;
    }
}

/// Gives spaces that were mapped to the plain space glyph their proper width.
pub(crate) fn adjust_spaces(_: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    let horizontal = buffer.direction.is_horizontal();
    let upem = font.backend.units_per_em();
    let len = buffer.len;

    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        if info.is_ligated() {
            continue;
        }

        let Some(space) = info.fallback_space() else {
            continue;
        };

        if let Some(divisor) = space.em_divisor() {
            set_length(pos, horizontal, (upem + divisor / 2) / divisor);
            continue;
        }

        match space {
            Space::FourEm18 => set_length(pos, horizontal, (i64::from(upem) * 4 / 18) as i32),
            Space::Figure => {
                if let Some(glyph) = ('0'..='9').find_map(|c| font.glyph(c)) {
                    let advance = advance_of(font, glyph, horizontal);
                    if horizontal {
                        pos.x_advance = advance;
                    } else {
                        pos.y_advance = advance;
                    }
                }
            }
            Space::Punctuation => {
                if let Some(glyph) = font.glyph('.').or_else(|| font.glyph(',')) {
                    let advance = advance_of(font, glyph, horizontal);
                    if horizontal {
                        pos.x_advance = advance;
                    } else {
                        pos.y_advance = advance;
                    }
                }
            }
            Space::Narrow => {
                // Half of the regular space.
                if horizontal {
                    pos.x_advance /= 2;
                } else {
                    pos.y_advance /= 2;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hebrew_classes_become_positional() {
        assert_eq!(recategorize_combining_class(0x05B0, mcc::CCC10), class::BELOW);
        assert_eq!(recategorize_combining_class(0x05C1, mcc::CCC24), class::ABOVE_RIGHT);
        assert_eq!(recategorize_combining_class(0x05BC, mcc::CCC21), mcc::CCC21);
    }

    #[test]
    fn thai_marks_without_class_are_placed() {
        assert_eq!(recategorize_combining_class(0x0E31, 0), class::ABOVE_RIGHT);
        assert_eq!(recategorize_combining_class(0x0EBC, 0), class::BELOW);
        assert_eq!(recategorize_combining_class(0x0E3A, 9), class::BELOW_RIGHT);
    }

    #[test]
    fn positional_classes_are_kept() {
        assert_eq!(recategorize_combining_class(0x0301, class::ABOVE), class::ABOVE);
        assert_eq!(recategorize_combining_class(0x0327, 202), 202);
    }
}
