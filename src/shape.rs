use crate::buffer::{
    glyph_flag, Buffer, BufferClusterLevel, BufferFlags, BufferScratchFlags, GlyphBuffer, GlyphInfo, GlyphPosition,
    GlyphPropsFlags, UnicodeBuffer,
};
use crate::common::{Direction, Feature};
use crate::complex::ZeroWidthMarks;
use crate::error::ShapeError;
use crate::face::Font;
use crate::ot::{self, fallback, kern, normalize, TableIndex};
use crate::plan::ShapePlan;
use crate::unicode::{CharExt, GeneralCategory, DOTTED_CIRCLE};

/// Shapes the buffer in place with a compiled plan.
///
/// The buffer must hold the characters of a single run; its direction and
/// script are taken from the plan. `user_features` are the features the plan
/// was compiled with; the ones limited to a cluster range get their masks
/// here.
///
/// Returns `false` when the buffer hit its output or operation limits. The
/// buffer then holds whatever glyphs were committed before that.
pub fn shape(plan: &ShapePlan, font: &Font, buffer: &mut Buffer, user_features: &[Feature]) -> bool {
    buffer.direction = plan.direction;
    buffer.script = plan.script;
    if buffer.language.is_none() {
        buffer.language.clone_from(&plan.language);
    }

    buffer.enter();

    if !buffer.is_empty() {
        let target_direction = buffer.direction;
        shape_internal(&mut ShapeContext {
            plan,
            font,
            buffer,
            user_features,
            target_direction,
        });
    }

    if !buffer.successful {
        log::warn!("shaping stopped early, {} glyphs committed", buffer.len);
    }

    buffer.successful
}

/// Shapes a Unicode buffer with a freshly compiled plan.
///
/// Unset segment properties are guessed from the text. Unlike [`shape`],
/// running out of limits is an error here; use the low-level function to
/// get at the partial output.
pub fn shape_buffer(font: &Font, features: &[Feature], buffer: UnicodeBuffer) -> Result<GlyphBuffer, ShapeError> {
    let mut buffer = buffer.0;
    buffer.guess_segment_properties();

    let plan = ShapePlan::new(font, &buffer.segment_properties(), features)?;
    let len = buffer.len;
    if !shape(&plan, font, &mut buffer, features) {
        if buffer.ops_exhausted() {
            return Err(ShapeError::OperationBudgetExhausted);
        }

        return Err(ShapeError::BufferOverflow {
            len,
            max_len: buffer.max_len,
        });
    }

    Ok(GlyphBuffer(buffer))
}

struct ShapeContext<'a> {
    plan: &'a ShapePlan,
    font: &'a Font<'a>,
    buffer: &'a mut Buffer,
    user_features: &'a [Feature],
    // Transient stuff
    target_direction: Direction,
}

// Pull it all together!
fn shape_internal(ctx: &mut ShapeContext) {
    ctx.buffer.clear_output();

    initialize_masks(ctx);
    set_unicode_props(ctx.buffer);
    insert_dotted_circle(ctx.buffer, ctx.font);
    if !ctx.buffer.successful {
        return;
    }

    form_clusters(ctx.buffer);
    if !ctx.buffer.successful {
        return;
    }

    ensure_native_direction(ctx.buffer);

    ctx.plan.shaper.preprocess_text(ctx.plan, ctx.font, ctx.buffer);
    if !ctx.buffer.successful {
        return;
    }

    substitute_pre(ctx);
    if !ctx.buffer.successful {
        return;
    }

    position(ctx);
    if !ctx.buffer.successful {
        return;
    }

    substitute_post(ctx);

    propagate_flags(ctx.buffer);

    ctx.buffer.direction = ctx.target_direction;
}

fn substitute_pre(ctx: &mut ShapeContext) {
    substitute_default(ctx);
    if ctx.buffer.successful {
        substitute_complex(ctx);
    }
}

fn substitute_post(ctx: &mut ShapeContext) {
    hide_default_ignorables(ctx.buffer, ctx.font);
    ctx.plan.shaper.postprocess_glyphs(ctx.plan, ctx.font, ctx.buffer);
}

fn substitute_default(ctx: &mut ShapeContext) {
    rotate_chars(ctx);

    normalize::normalize(ctx.plan, ctx.font, ctx.buffer);
    if !ctx.buffer.successful {
        return;
    }

    setup_masks(ctx);

    // Needs the final characters but must precede glyph mapping.
    if ctx.plan.fallback_mark_positioning {
        fallback::recategorize_marks(ctx.plan, ctx.font, ctx.buffer);
    }

    map_glyphs_fast(ctx.buffer);
}

fn substitute_complex(ctx: &mut ShapeContext) {
    ot::set_glyph_props(ctx.font.layout, ctx.buffer);

    if ctx.plan.fallback_glyph_classes {
        synthesize_glyph_classes(ctx.buffer);
    }

    apply_layout_table(ctx.plan, ctx.font, ctx.buffer, TableIndex::GSUB);
}

/// Applies a table's lookups stage by stage, running the pause that
/// follows each stage.
fn apply_layout_table(plan: &ShapePlan, font: &Font, buffer: &mut Buffer, table: TableIndex) {
    let lookups = plan.ot_map.lookups(table);
    for (stage, (range, pause)) in plan.ot_map.stage_ranges(table).enumerate() {
        if !range.is_empty() {
            font.layout.apply_lookups(table, buffer, &lookups[range]);
        }

        if let Some(pause) = pause {
            log::trace!("{:?} pause after stage {}", table, stage);
            pause(plan, font, buffer);
        }

        if !buffer.successful {
            return;
        }
    }
}

fn position(ctx: &mut ShapeContext) {
    ctx.buffer.clear_positions();

    position_default(ctx);

    position_complex(ctx);

    if ctx.buffer.direction.is_backward() {
        ctx.buffer.reverse();
    }
}

fn position_default(ctx: &mut ShapeContext) {
    let len = ctx.buffer.len;
    let backend = ctx.font.backend;

    if ctx.buffer.direction.is_horizontal() {
        for (info, pos) in ctx.buffer.info[..len].iter().zip(&mut ctx.buffer.pos[..len]) {
            pos.x_advance = backend.glyph_h_advance(info.glyph_id);
        }
    } else {
        for (info, pos) in ctx.buffer.info[..len].iter().zip(&mut ctx.buffer.pos[..len]) {
            pos.y_advance = backend.glyph_v_advance(info.glyph_id);
            let (x, y) = backend.glyph_v_origin(info.glyph_id);
            pos.x_offset -= x;
            pos.y_offset -= y;
        }
    }

    if ctx.buffer.scratch_flags.contains(BufferScratchFlags::HAS_SPACE_FALLBACK) {
        fallback::adjust_spaces(ctx.plan, ctx.font, ctx.buffer);
    }
}

fn position_complex(ctx: &mut ShapeContext) {
    // Without GPOS a zeroed mark in a forward run keeps its ink over the
    // preceding glyph by moving its offset back. Backward runs get the same
    // result from the final reversal. Fallback positioning overrides both.
    let adjust_offsets_when_zeroing =
        ctx.plan.adjust_mark_positioning_when_zeroing && ctx.buffer.direction.is_forward();

    let zero_width_marks = if ctx.plan.zero_marks {
        ctx.plan.shaper.zero_width_marks()
    } else {
        None
    };

    match zero_width_marks {
        Some(ZeroWidthMarks::ByUnicodeEarly) => zero_mark_widths_by_unicode(ctx.buffer, adjust_offsets_when_zeroing),
        Some(ZeroWidthMarks::ByGdefEarly) => zero_mark_widths_by_gdef(ctx.buffer, adjust_offsets_when_zeroing),
        _ => {}
    }

    position_by_plan(ctx.plan, ctx.font, ctx.buffer);

    match zero_width_marks {
        Some(ZeroWidthMarks::ByUnicodeLate) => zero_mark_widths_by_unicode(ctx.buffer, adjust_offsets_when_zeroing),
        Some(ZeroWidthMarks::ByGdefLate) => zero_mark_widths_by_gdef(ctx.buffer, adjust_offsets_when_zeroing),
        _ => {}
    }

    zero_width_default_ignorables(ctx.buffer);

    if ctx.plan.fallback_mark_positioning {
        fallback::position_marks(ctx.plan, ctx.font, ctx.buffer, adjust_offsets_when_zeroing);
    }
}

fn position_by_plan(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    if plan.apply_gpos {
        let horizontal = buffer.direction.is_horizontal();

        // GPOS works against the horizontal origin.
        if !horizontal {
            shift_to_v_origin(font, buffer, 1);
        }

        apply_layout_table(plan, font, buffer, TableIndex::GPOS);

        if !horizontal {
            shift_to_v_origin(font, buffer, -1);
        }
    } else if plan.apply_kern {
        kern::kern(plan, font, buffer);
    }
}

fn shift_to_v_origin(font: &Font, buffer: &mut Buffer, sign: i32) {
    let len = buffer.len;
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        let (x, y) = font.backend.glyph_v_origin(info.glyph_id);
        pos.x_offset += sign * x;
        pos.y_offset += sign * y;
    }
}

fn initialize_masks(ctx: &mut ShapeContext) {
    let global_mask = ctx.plan.ot_map.global_mask();
    ctx.buffer.reset_masks(global_mask);
}

fn setup_masks(ctx: &mut ShapeContext) {
    setup_masks_fraction(ctx);

    ctx.plan.shaper.setup_masks(ctx.plan, ctx.font, ctx.buffer);

    for feature in ctx.user_features {
        if !feature.is_global() {
            let (mask, shift) = ctx.plan.ot_map.get_mask(feature.tag);
            ctx.buffer.set_masks(feature.value << shift, mask, feature.start, feature.end);
        }
    }
}

fn setup_masks_fraction(ctx: &mut ShapeContext) {
    let buffer = &mut ctx.buffer;
    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_NON_ASCII) || !ctx.plan.has_frac {
        return;
    }

    let (pre_mask, post_mask) = if buffer.direction.is_forward() {
        (ctx.plan.numr_mask | ctx.plan.frac_mask, ctx.plan.frac_mask | ctx.plan.dnom_mask)
    } else {
        (ctx.plan.frac_mask | ctx.plan.dnom_mask, ctx.plan.numr_mask | ctx.plan.frac_mask)
    };

    let len = buffer.len;
    let mut i = 0;
    while i < len {
        // FRACTION SLASH
        if buffer.info[i].glyph_id != 0x2044 {
            i += 1;
            continue;
        }

        let mut start = i;
        while start > 0 && buffer.info[start - 1].general_category() == GeneralCategory::DecimalNumber {
            start -= 1;
        }

        let mut end = i + 1;
        while end < len && buffer.info[end].general_category() == GeneralCategory::DecimalNumber {
            end += 1;
        }

        buffer.unsafe_to_break(start, end);

        for info in &mut buffer.info[start..i] {
            info.mask |= pre_mask;
        }

        buffer.info[i].mask |= ctx.plan.frac_mask;

        for info in &mut buffer.info[i + 1..end] {
            info.mask |= post_mask;
        }

        i = end;
    }
}

fn set_unicode_props(buffer: &mut Buffer) {
    // Just enough of UAX #29 to keep graphemes together when the run gets
    // reversed: marks, emoji modifiers, ZWJ and the pictograph after it,
    // and tag characters continue the preceding character.
    let len = buffer.len;
    let mut scratch = buffer.scratch_flags;

    let mut i = 0;
    while i < len {
        let info = &mut buffer.info[i];
        info.init_unicode_props(&mut scratch);

        if info.general_category() == GeneralCategory::ModifierSymbol && matches!(info.glyph_id, 0x1F3FB..=0x1F3FF) {
            info.set_continuation();
        } else if info.is_zwj() {
            info.set_continuation();
            if let Some(next) = buffer.info[..len].get_mut(i + 1) {
                if next.as_char().is_emoji_extended_pictographic() {
                    next.init_unicode_props(&mut scratch);
                    next.set_continuation();
                    i += 1;
                }
            }
        } else if matches!(info.glyph_id, 0xE0020..=0xE007F) {
            // Emoji sub-region flags.
            info.set_continuation();
        }

        i += 1;
    }

    buffer.scratch_flags = scratch;
}

fn insert_dotted_circle(buffer: &mut Buffer, font: &Font) {
    if buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
        || !buffer.flags.contains(BufferFlags::BEGINNING_OF_TEXT)
        || buffer.context_len[0] != 0
        || !buffer.info[0].is_unicode_mark()
        || !font.has_glyph_u32(DOTTED_CIRCLE)
    {
        return;
    }

    let mut info = GlyphInfo {
        glyph_id: DOTTED_CIRCLE,
        mask: buffer.info[0].mask,
        cluster: buffer.info[0].cluster,
        ..GlyphInfo::default()
    };

    let mut scratch = buffer.scratch_flags;
    info.init_unicode_props(&mut scratch);
    buffer.scratch_flags = scratch;

    buffer.clear_output();
    buffer.output_info(info);
    while buffer.idx < buffer.len && buffer.successful {
        buffer.next_glyph();
    }

    buffer.swap_buffers();
}

fn is_grapheme_continuation(_: &GlyphInfo, next: &GlyphInfo) -> bool {
    next.is_continuation()
}

fn form_clusters(buffer: &mut Buffer) {
    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_NON_ASCII) {
        return;
    }

    let mut start = 0;
    while start < buffer.len {
        let end = buffer.group_end(start, is_grapheme_continuation);
        if buffer.cluster_level == BufferClusterLevel::MonotoneGraphemes {
            buffer.merge_clusters(start, end);
        } else {
            buffer.unsafe_to_break(start, end);
        }
        start = end;
    }
}

fn ensure_native_direction(buffer: &mut Buffer) {
    let dir = buffer.direction;
    let hor = buffer.script.and_then(Direction::from_script).unwrap_or_default();

    if !((dir.is_horizontal() && dir != hor && hor != Direction::Invalid)
        || (dir.is_vertical() && dir != Direction::TopToBottom))
    {
        return;
    }

    // Graphemes keep their logical order inside the reversed run.
    let mut start = 0;
    while start < buffer.len {
        let end = buffer.group_end(start, is_grapheme_continuation);
        if buffer.cluster_level == BufferClusterLevel::MonotoneCharacters {
            buffer.merge_clusters(start, end);
        }
        buffer.reverse_range(start, end);
        start = end;
    }

    buffer.reverse();
    buffer.direction = buffer.direction.reverse();
}

fn rotate_chars(ctx: &mut ShapeContext) {
    let len = ctx.buffer.len;

    if ctx.target_direction.is_backward() {
        let rtlm_mask = ctx.plan.rtlm_mask;

        for info in &mut ctx.buffer.info[..len] {
            match info.as_char().mirrored() {
                Some(c) if ctx.font.has_glyph(c) => info.glyph_id = c as u32,
                _ => info.mask |= rtlm_mask,
            }
        }
    }

    if ctx.target_direction.is_vertical() && !ctx.plan.has_vert {
        for info in &mut ctx.buffer.info[..len] {
            if let Some(c) = info.as_char().vertical() {
                if ctx.font.has_glyph(c) {
                    info.glyph_id = c as u32;
                }
            }
        }
    }
}

fn map_glyphs_fast(buffer: &mut Buffer) {
    // The normalizer set up `glyph_index`, we just copy it.
    for info in buffer.info_slice_mut() {
        info.glyph_id = info.glyph_index;
    }
}

fn synthesize_glyph_classes(buffer: &mut Buffer) {
    for info in buffer.info_slice_mut() {
        // Default-ignorables stay bases even when they are Mn, so that
        // IgnoreMarks lookups still see variation selectors and CGJ.
        let class = if info.general_category() != GeneralCategory::NonspacingMark || info.is_default_ignorable() {
            GlyphPropsFlags::BASE_GLYPH
        } else {
            GlyphPropsFlags::MARK
        };

        info.glyph_props = class.bits();
    }
}

fn zero_width_default_ignorables(buffer: &mut Buffer) {
    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_DEFAULT_IGNORABLES)
        || buffer.flags.contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES)
        || buffer.flags.contains(BufferFlags::REMOVE_DEFAULT_IGNORABLES)
    {
        return;
    }

    let len = buffer.len;
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        if info.is_default_ignorable() {
            *pos = Default::default();
        }
    }
}

fn zero_mark_width(pos: &mut GlyphPosition, adjust_offsets: bool) {
    if adjust_offsets {
        pos.x_offset -= pos.x_advance;
        pos.y_offset -= pos.y_advance;
    }

    pos.x_advance = 0;
    pos.y_advance = 0;
}

fn zero_mark_widths_by_unicode(buffer: &mut Buffer, adjust_offsets: bool) {
    let len = buffer.len;
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        if info.general_category() == GeneralCategory::NonspacingMark {
            zero_mark_width(pos, adjust_offsets);
        }
    }
}

fn zero_mark_widths_by_gdef(buffer: &mut Buffer, adjust_offsets: bool) {
    let len = buffer.len;
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        if info.is_mark() {
            zero_mark_width(pos, adjust_offsets);
        }
    }
}

fn hide_default_ignorables(buffer: &mut Buffer, font: &Font) {
    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_DEFAULT_IGNORABLES)
        || buffer.flags.contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES)
    {
        return;
    }

    if !buffer.flags.contains(BufferFlags::REMOVE_DEFAULT_IGNORABLES) {
        if let Some(invisible) = buffer.invisible.or_else(|| font.glyph(' ')) {
            for info in buffer.info_slice_mut() {
                if info.is_default_ignorable() {
                    info.glyph_id = invisible;
                }
            }
            return;
        }
    }

    buffer.delete_glyphs_inplace(GlyphInfo::is_default_ignorable);
}

fn propagate_flags(buffer: &mut Buffer) {
    // Every glyph of a cluster reports the union of the cluster's flags.
    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_UNSAFE_TO_BREAK) {
        return;
    }

    let mut start = 0;
    while start < buffer.len {
        let end = buffer.next_cluster(start);
        let flags = buffer.info[start..end]
            .iter()
            .fold(0, |acc, info| acc | (info.mask & glyph_flag::DEFINED));

        if flags != 0 {
            for info in &mut buffer.info[start..end] {
                info.mask |= flags;
            }
        }

        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_of(text: &str) -> Buffer {
        let mut buffer = Buffer::new();
        buffer.push_str(text);
        let mut scratch = buffer.scratch_flags;
        for info in buffer.info_slice_mut() {
            info.init_unicode_props(&mut scratch);
        }
        buffer.scratch_flags = scratch;
        buffer
    }

    #[test]
    fn marks_join_the_previous_cluster() {
        let mut buffer = buffer_of("a\u{0301}b");
        set_unicode_props(&mut buffer);
        form_clusters(&mut buffer);

        let clusters: alloc::vec::Vec<u32> = buffer.info_slice().iter().map(|i| i.cluster).collect();
        assert_eq!(clusters, [0, 0, 3]);
    }

    #[test]
    fn reversing_keeps_graphemes_in_order() {
        let mut buffer = buffer_of("a\u{0301}b");
        buffer.direction = Direction::RightToLeft;
        buffer.script = Some(crate::script::LATIN);
        set_unicode_props(&mut buffer);
        ensure_native_direction(&mut buffer);

        let chars: alloc::vec::Vec<u32> = buffer.info_slice().iter().map(|i| i.glyph_id).collect();
        assert_eq!(chars, ['b' as u32, 'a' as u32, 0x0301]);
        assert_eq!(buffer.direction, Direction::LeftToRight);
    }

    #[test]
    fn unsafe_to_break_spreads_over_the_cluster() {
        let mut buffer = buffer_of("ab");
        buffer.info[0].cluster = 5;
        buffer.info[1].cluster = 5;
        buffer.info[1].mask |= glyph_flag::UNSAFE_TO_BREAK;
        buffer.scratch_flags |= BufferScratchFlags::HAS_UNSAFE_TO_BREAK;
        propagate_flags(&mut buffer);

        assert!(buffer.info[0].unsafe_to_break());
    }

    #[test]
    fn synthesized_classes_keep_ignorables_as_bases() {
        let mut buffer = buffer_of("a\u{0301}\u{034F}");
        synthesize_glyph_classes(&mut buffer);

        assert!(buffer.info[0].is_base_glyph());
        assert!(buffer.info[1].is_mark());
        assert!(buffer.info[2].is_base_glyph());
    }
}
