//! Pair kerning through the font backend, for fonts without GPOS `kern`.

use crate::buffer::Buffer;
use crate::face::Font;
use crate::plan::ShapePlan;

use super::layout::{check_glyph_property, lookup_flags};

fn next_non_mark(font: &Font, buffer: &Buffer, start: usize) -> Option<usize> {
    let props = u32::from(lookup_flags::IGNORE_MARKS);
    (start + 1..buffer.len).find(|&j| {
        let info = &buffer.info[j];
        !info.is_default_ignorable() && check_glyph_property(font.layout, info, props)
    })
}

/// Applies backend kerning to glyph pairs carrying the `kern` mask.
///
/// Marks in between are skipped. The adjustment is split across the pair
/// so that the visual gap lands between the glyphs.
pub(crate) fn kern(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    let kern_mask = plan.kern_mask;
    let direction = buffer.direction;
    let horizontal = direction.is_horizontal();

    let mut i = 0;
    while i < buffer.len {
        if buffer.info[i].mask & kern_mask == 0 {
            i += 1;
            continue;
        }

        let Some(j) = next_non_mark(font, buffer, i) else {
            break;
        };

        if buffer.info[j].mask & kern_mask == 0 {
            i = j;
            continue;
        }

        let (x, y) = font
            .backend
            .glyph_kerning(buffer.info[i].glyph_id, buffer.info[j].glyph_id, direction);
        let kern = if horizontal { x } else { y };

        if kern != 0 {
            let kern1 = kern >> 1;
            let kern2 = kern - kern1;
            let pos = &mut buffer.pos;
            if horizontal {
                pos[i].x_advance += kern1;
                pos[j].x_advance += kern2;
                pos[j].x_offset += kern2;
            } else {
                pos[i].y_advance += kern1;
                pos[j].y_advance += kern2;
                pos[j].y_offset += kern2;
            }

            buffer.unsafe_to_break(i, j + 1);
        }

        i = j;
    }
}
