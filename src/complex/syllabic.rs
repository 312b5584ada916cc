use super::machine::Machine;
use crate::buffer::{Buffer, BufferFlags, BufferScratchFlags, GlyphInfo, GlyphPropsFlags};
use crate::face::Font;
use crate::ot::glyph_props;
use crate::plan::ShapePlan;
use crate::unicode::DOTTED_CIRCLE;

/// Splits the buffer into syllables, keeps each of them in one piece for
/// line breaking and notes whether any syllable is broken.
pub(crate) fn setup_syllables(machine: &Machine, buffer: &mut Buffer, broken_syllable_type: u8) {
    machine.find_syllables(buffer, GlyphInfo::syllabic_category);

    let mut start = 0;
    let mut end = buffer.next_syllable(0);
    while start < buffer.len {
        if buffer.info[start].syllable() & 0x0F == broken_syllable_type {
            buffer.scratch_flags |= BufferScratchFlags::HAS_BROKEN_SYLLABLE;
        }

        buffer.unsafe_to_break(start, end);
        start = end;
        end = buffer.next_syllable(start);
    }
}

/// Forgets the syllables once the per-syllable features have run.
pub(crate) fn clear_syllables(_: &ShapePlan, _: &Font, buffer: &mut Buffer) {
    for info in buffer.info_slice_mut() {
        info.set_syllable(0);
    }
}

/// Inserts a dotted circle at the start of every broken syllable, after any
/// repha, so that orphaned marks have something to sit on.
///
/// Runs after glyph mapping. Does nothing when the font has no glyph for
/// U+25CC or the buffer forbids the insertion.
pub(crate) fn insert_dotted_circles(
    font: &Font,
    buffer: &mut Buffer,
    broken_syllable_type: u8,
    dottedcircle_category: u8,
    repha_category: Option<u8>,
    dottedcircle_position: Option<u8>,
) {
    if buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE) {
        return;
    }

    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_BROKEN_SYLLABLE) {
        return;
    }

    let Some(glyph) = char::from_u32(DOTTED_CIRCLE).and_then(|c| font.glyph(c)) else {
        return;
    };

    let mut dottedcircle = GlyphInfo {
        glyph_id: DOTTED_CIRCLE,
        ..GlyphInfo::default()
    };
    let mut scratch = buffer.scratch_flags;
    dottedcircle.init_unicode_props(&mut scratch);
    dottedcircle.set_syllabic_category(dottedcircle_category);
    if let Some(position) = dottedcircle_position {
        dottedcircle.set_syllabic_position(position);
    }
    dottedcircle.glyph_id = glyph;
    dottedcircle.glyph_index = glyph;
    dottedcircle.glyph_props = match glyph_props(font.layout, glyph) {
        0 => GlyphPropsFlags::BASE_GLYPH.bits(),
        props => props,
    };

    buffer.clear_output();

    buffer.idx = 0;
    let mut last_syllable = 0;
    while buffer.idx < buffer.len && buffer.successful {
        let syllable = buffer.cur(0).syllable();
        if last_syllable != syllable && (syllable & 0x0F) == broken_syllable_type {
            last_syllable = syllable;

            let mut info = dottedcircle;
            info.cluster = buffer.cur(0).cluster;
            info.mask = buffer.cur(0).mask;
            info.set_syllable(syllable);

            if let Some(repha) = repha_category {
                while buffer.idx < buffer.len
                    && last_syllable == buffer.cur(0).syllable()
                    && buffer.cur(0).syllabic_category() == repha
                {
                    buffer.next_glyph();
                }
            }

            buffer.output_info(info);
        } else {
            buffer.next_glyph();
        }
    }

    buffer.sync();
}
