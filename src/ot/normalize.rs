//! Font-aware Unicode normalization.
//!
//! Each grapheme is decomposed through a chain of one-level canonical
//! decompositions, marks are put in canonical order and the result is
//! recomposed where the shaper wants it. Unlike plain NFC/NFD, a step is only
//! taken when the font supports the resulting characters, so the output is
//! whatever renders best with this particular font.
//!
//! Shapers customize the process through [`ComplexShaper::decompose`] and
//! [`ComplexShaper::compose`], e.g. to stop two matras from recomposing.
//!
//! [`ComplexShaper::decompose`]: crate::complex::ComplexShaper::decompose
//! [`ComplexShaper::compose`]: crate::complex::ComplexShaper::compose

use crate::buffer::{Buffer, BufferScratchFlags, GlyphInfo};
use crate::face::Font;
use crate::plan::ShapePlan;
use crate::unicode::{self, CharExt};

/// Runs of combining marks longer than this are left unsorted.
pub(crate) const MAX_COMBINING_MARKS: usize = 10;

/// How a shaper wants its text normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NormalizationMode {
    None,
    Decomposed,
    /// Never composes base-to-base.
    ComposedDiacritics,
    /// Always fully decomposes and then recomposes back.
    ComposedDiacriticsNoShortCircuit,
    Auto,
}

/// What shaper hooks see while normalizing.
pub(crate) struct NormalizeContext<'a> {
    pub plan: &'a ShapePlan,
    pub font: &'a Font<'a>,
}

impl NormalizeContext<'_> {
    fn decompose(&self, ab: char) -> Option<(char, Option<char>)> {
        self.plan.shaper.decompose(self, ab)
    }

    fn compose(&self, a: char, b: char) -> Option<char> {
        self.plan.shaper.compose(self, a, b)
    }
}

fn output_char(buffer: &mut Buffer, unichar: char, glyph: u32) {
    // The glyph goes on the input record, `output_glyph` copies it over.
    buffer.cur_mut(0).glyph_index = glyph;
    buffer.output_glyph(unichar as u32);
    if buffer.out_info.is_empty() {
        return;
    }

    let mut flags = buffer.scratch_flags;
    buffer.prev_mut().init_unicode_props(&mut flags);
    buffer.scratch_flags = flags;
}

fn next_char(buffer: &mut Buffer, glyph: u32) {
    buffer.cur_mut(0).glyph_index = glyph;
    buffer.next_glyph();
}

fn set_glyph(info: &mut GlyphInfo, font: &Font) {
    if let Some(glyph) = font.glyph(info.as_char()) {
        info.glyph_index = glyph;
    }
}

/// Returns the number of characters output, zero if `ab` did not decompose.
fn decompose(ctx: &NormalizeContext, buffer: &mut Buffer, shortest: bool, ab: char, depth: usize) -> usize {
    // Canonical decompositions are at most a few levels deep.
    if depth > 8 {
        return 0;
    }

    let Some((a, b)) = ctx.decompose(ab) else {
        return 0;
    };

    let a_glyph = ctx.font.glyph(a);
    let b_glyph = match b {
        Some(b) => match ctx.font.glyph(b) {
            Some(glyph) => Some((b, glyph)),
            None => return 0,
        },
        None => None,
    };

    if !shortest || a_glyph.is_none() {
        let ret = decompose(ctx, buffer, shortest, a, depth + 1);
        if ret != 0 {
            if let Some((b, b_glyph)) = b_glyph {
                output_char(buffer, b, b_glyph);
                return ret + 1;
            }
            return ret;
        }
    }

    if let Some(a_glyph) = a_glyph {
        output_char(buffer, a, a_glyph);
        if let Some((b, b_glyph)) = b_glyph {
            output_char(buffer, b, b_glyph);
            return 2;
        }
        return 1;
    }

    0
}

fn decompose_compatibility(ctx: &NormalizeContext, buffer: &mut Buffer, u: char) -> bool {
    let chars = unicode::decompose_compatibility(u);
    if chars.is_empty() {
        return false;
    }

    let mut glyphs = smallvec::SmallVec::<[u32; 8]>::new();
    for &c in &chars {
        match ctx.font.glyph(c) {
            Some(glyph) => glyphs.push(glyph),
            None => return false,
        }
    }

    for (&c, &glyph) in chars.iter().zip(&glyphs) {
        output_char(buffer, c, glyph);
    }

    true
}

fn decompose_current_character(ctx: &NormalizeContext, buffer: &mut Buffer, shortest: bool) {
    let u = buffer.cur(0).as_char();
    let glyph = ctx.font.glyph(u);

    if !shortest || glyph.is_none() {
        if decompose(ctx, buffer, shortest, u, 0) > 0 {
            buffer.skip_glyph();
            return;
        }
    }

    if let Some(glyph) = glyph {
        next_char(buffer, glyph);
        return;
    }

    if decompose_compatibility(ctx, buffer, u) {
        buffer.skip_glyph();
        return;
    }

    if let Some(space) = buffer.cur(0).space_fallback() {
        if let Some(space_glyph) = ctx.font.glyph(' ').or(buffer.invisible) {
            buffer.cur_mut(0).set_fallback_space(space);
            next_char(buffer, space_glyph);
            buffer.scratch_flags |= BufferScratchFlags::HAS_SPACE_FALLBACK;
            return;
        }
    }

    // U+2011 is the only no-break version of another character that is not
    // a space. The spaces are handled above.
    if u == '\u{2011}' {
        if let Some(other) = ctx.font.glyph('\u{2010}') {
            next_char(buffer, other);
            return;
        }
    }

    // Leave the character unmapped.
    let not_found = buffer.not_found;
    next_char(buffer, not_found);
}

fn handle_variation_selector_cluster(ctx: &NormalizeContext, buffer: &mut Buffer, end: usize) {
    // If there is a variation selector we give up on normalizing the cluster.
    while buffer.idx + 1 < end && buffer.successful {
        if buffer.cur(1).as_char().is_variation_selector() {
            let base = buffer.cur(0).as_char();
            let selector = buffer.cur(1).as_char();
            if let Some(glyph) = ctx.font.variation_glyph(base, selector) {
                buffer.cur_mut(0).glyph_index = glyph;
                let unicode = buffer.cur(0).glyph_id;
                buffer.replace_glyphs(2, &[unicode]);
                // `replace_glyphs` copies the input record, glyph index included.
            } else {
                // Pass both on separately and let GSUB do its magic.
                set_glyph(buffer.cur_mut(0), ctx.font);
                buffer.next_glyph();

                set_glyph(buffer.cur_mut(0), ctx.font);
                buffer.next_glyph();
            }

            // Skip any further variation selectors.
            while buffer.idx < end && buffer.cur(0).as_char().is_variation_selector() {
                set_glyph(buffer.cur_mut(0), ctx.font);
                buffer.next_glyph();
            }
        } else {
            set_glyph(buffer.cur_mut(0), ctx.font);
            buffer.next_glyph();
        }
    }

    if buffer.idx < end {
        set_glyph(buffer.cur_mut(0), ctx.font);
        buffer.next_glyph();
    }
}

fn decompose_multi_char_cluster(ctx: &NormalizeContext, buffer: &mut Buffer, end: usize, short_circuit: bool) {
    if buffer.info[buffer.idx..end].iter().any(|info| info.as_char().is_variation_selector()) {
        handle_variation_selector_cluster(ctx, buffer, end);
        return;
    }

    while buffer.idx < end && buffer.successful {
        decompose_current_character(ctx, buffer, short_circuit);
    }
}

fn compare_combining_class(a: &GlyphInfo, b: &GlyphInfo) -> bool {
    a.modified_combining_class() > b.modified_combining_class()
}

/// Normalizes the buffer against the font's repertoire.
///
/// Sets `glyph_index` on every record; the caller copies it into
/// `glyph_id` once the shaper had its say.
pub(crate) fn normalize(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    if buffer.is_empty() {
        return;
    }

    let mode = match plan.shaper.normalization_preference() {
        NormalizationMode::Auto => NormalizationMode::ComposedDiacritics,
        mode => mode,
    };

    let ctx = NormalizeContext { plan, font };

    let always_short_circuit = mode == NormalizationMode::None;
    let might_short_circuit = always_short_circuit
        || (mode != NormalizationMode::Decomposed && mode != NormalizationMode::ComposedDiacriticsNoShortCircuit);

    // Three rounds: decompose, reorder, recompose (if desired).
    let all_simple = decompose_round(&ctx, buffer, might_short_circuit, always_short_circuit);
    if !buffer.successful {
        return;
    }

    if !all_simple {
        reorder_round(plan, buffer);
    }

    if buffer.scratch_flags.contains(BufferScratchFlags::HAS_CGJ) {
        unhide_unneeded_cgj(buffer);
    }

    if !all_simple
        && matches!(
            mode,
            NormalizationMode::ComposedDiacritics | NormalizationMode::ComposedDiacriticsNoShortCircuit
        )
    {
        recompose_round(&ctx, buffer);
    }
}

fn decompose_round(ctx: &NormalizeContext, buffer: &mut Buffer, might_short_circuit: bool, always_short_circuit: bool) -> bool {
    let mut all_simple = true;

    buffer.clear_output();
    let count = buffer.len;
    buffer.idx = 0;
    loop {
        let mut end = buffer.idx + 1;
        while end < count && !buffer.info[end].is_unicode_mark() {
            end += 1;
        }

        if end < count {
            // Leave one base for the marks to cluster with.
            end -= 1;
        }

        // From idx to end are simple clusters.
        if might_short_circuit {
            let len = end - buffer.idx;
            let mut done = 0;
            while done < len {
                let cur = buffer.cur_mut(done);
                match ctx.font.glyph(cur.as_char()) {
                    Some(glyph) => cur.glyph_index = glyph,
                    None => break,
                }
                done += 1;
            }
            buffer.next_glyphs(done);
        }

        while buffer.idx < end && buffer.successful {
            decompose_current_character(ctx, buffer, might_short_circuit);
        }

        if buffer.idx >= count || !buffer.successful {
            break;
        }

        all_simple = false;

        // Find all the marks now.
        end = buffer.idx + 1;
        while end < count && buffer.info[end].is_unicode_mark() {
            end += 1;
        }

        // idx to end is one non-simple cluster.
        decompose_multi_char_cluster(ctx, buffer, end, always_short_circuit);

        if buffer.idx >= count || !buffer.successful {
            break;
        }
    }

    buffer.sync();
    all_simple
}

fn reorder_round(plan: &ShapePlan, buffer: &mut Buffer) {
    let count = buffer.len;
    let mut i = 0;
    while i < count {
        if buffer.info[i].modified_combining_class() == 0 {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < count && buffer.info[end].modified_combining_class() != 0 {
            end += 1;
        }

        // The sort is quadratic, so only short runs get it.
        if end - i <= MAX_COMBINING_MARKS {
            buffer.sort(i, end, compare_combining_class);
            plan.shaper.reorder_marks(plan, buffer, i, end);
        } else {
            log::warn!("leaving a run of {} combining marks unsorted", end - i);
        }

        i = end + 1;
    }
}

// A CGJ that did not block any reordering can be skipped by lookups.
fn unhide_unneeded_cgj(buffer: &mut Buffer) {
    for i in 1..buffer.len.saturating_sub(1) {
        if buffer.info[i].glyph_id == unicode::CGJ {
            let last = buffer.info[i - 1].modified_combining_class();
            let next = buffer.info[i + 1].modified_combining_class();
            if next == 0 || last <= next {
                buffer.info[i].unhide();
            }
        }
    }
}

fn recompose_round(ctx: &NormalizeContext, buffer: &mut Buffer) {
    // We don't try to combine ccc=0 chars with their previous starter.
    let count = buffer.len;
    let mut starter = 0;
    buffer.clear_output();
    buffer.next_glyph();
    while buffer.idx < count && buffer.successful {
        // Composing a non-mark with its preceding starter is skipped. This
        // is also what Hangul fonts want, they do not mix precomposed
        // syllables and jamo.
        let cur = *buffer.cur(0);
        let out_len = buffer.out_info.len();
        if cur.is_unicode_mark()
            && out_len > 0
            // Anything between the starter and this char must have a lower class.
            && (starter == out_len - 1 || buffer.prev().modified_combining_class() < cur.modified_combining_class())
        {
            let a = buffer.out_info[starter].as_char();
            if let Some((composed, glyph)) = ctx
                .compose(a, cur.as_char())
                .and_then(|c| ctx.font.glyph(c).map(|g| (c, g)))
            {
                // Copy to the output, then merge and drop the second part.
                buffer.next_glyph();
                if !buffer.successful {
                    return;
                }

                let out_len = buffer.out_info.len();
                buffer.merge_out_clusters(starter, out_len);
                buffer.out_info.pop();

                // Modify the starter and carry on.
                let mut flags = buffer.scratch_flags;
                let info = &mut buffer.out_info[starter];
                info.glyph_id = composed as u32;
                info.glyph_index = glyph;
                info.init_unicode_props(&mut flags);
                buffer.scratch_flags = flags;
                continue;
            }
        }

        // Blocked, or doesn't compose.
        buffer.next_glyph();

        if buffer.out_info.last().is_some_and(|info| info.modified_combining_class() == 0) {
            starter = buffer.out_info.len() - 1;
        }
    }

    buffer.sync();
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::vec::Vec;

    use super::*;
    use crate::common::{script, Direction, SegmentProperties};
    use crate::face::{FontBackend, GlyphExtents};
    use crate::ot::NoLayout;

    struct Backend;

    impl FontBackend for Backend {
        fn units_per_em(&self) -> i32 {
            1000
        }

        fn glyph(&self, c: char, _: Option<char>) -> Option<u32> {
            match c {
                'a' => Some(1),
                'e' => Some(2),
                '\u{00E9}' => Some(3),
                '\u{0301}' => Some(4),
                '\u{0323}' => Some(5),
                _ => None,
            }
        }

        fn glyph_extents(&self, _: u32) -> Option<GlyphExtents> {
            None
        }

        fn glyph_h_advance(&self, _: u32) -> i32 {
            500
        }
    }

    // One cluster per grapheme, as `form_clusters` leaves them.
    fn buffer_of(graphemes: &[&str]) -> Buffer {
        let mut buffer = Buffer::new();
        let mut cluster = 0;
        for grapheme in graphemes {
            for c in grapheme.chars() {
                buffer.add(c, cluster);
            }
            cluster += grapheme.len() as u32;
        }

        let mut scratch = buffer.scratch_flags;
        for info in buffer.info_slice_mut() {
            info.init_unicode_props(&mut scratch);
        }
        buffer.scratch_flags = scratch;
        buffer
    }

    fn run(buffer: &mut Buffer) -> String {
        let font = Font::new(&Backend, &NoLayout);
        let props = SegmentProperties {
            direction: Direction::LeftToRight,
            script: Some(script::LATIN),
            language: None,
        };
        let plan = ShapePlan::new(&font, &props, &[]).unwrap();

        normalize(&plan, &font, buffer);
        assert!(buffer.successful);
        format!("{:?}", buffer.info_slice())
    }

    fn chars(buffer: &Buffer) -> Vec<u32> {
        buffer.info_slice().iter().map(|i| i.glyph_id).collect()
    }

    #[test]
    fn reorders_and_recomposes() {
        let mut buffer = buffer_of(&["e\u{0301}\u{0323}", "a\u{0323}\u{0301}"]);
        run(&mut buffer);

        assert_eq!(chars(&buffer), [0xE9, 0x0323, 0x61, 0x0323, 0x0301]);
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let mut buffer = buffer_of(&["e\u{0301}\u{0323}", "a\u{0323}\u{0301}", "\u{00E9}"]);
        let once = run(&mut buffer);
        let twice = run(&mut buffer);

        assert_eq!(once, twice);
    }

    #[test]
    fn long_mark_runs_are_left_unsorted() {
        let mut marks = String::from("a");
        for _ in 0..MAX_COMBINING_MARKS {
            marks.push_str("\u{0301}\u{0323}");
        }

        let mut buffer = buffer_of(&[&marks]);
        run(&mut buffer);

        let out = chars(&buffer);
        assert_eq!(out[1], 0x0301);
        assert_eq!(out.len(), 1 + 2 * MAX_COMBINING_MARKS);
    }
}
