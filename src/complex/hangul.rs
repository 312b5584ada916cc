use alloc::boxed::Box;
use core::any::Any;

use super::{ComplexShaper, ZeroWidthMarks};
use crate::buffer::{Buffer, BufferClusterLevel, BufferFlags};
use crate::face::Font;
use crate::ot::feature;
use crate::ot::normalize::NormalizationMode;
use crate::ot::FeatureFlags;
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::DOTTED_CIRCLE;
use crate::Mask;

pub(crate) static HANGUL_SHAPER: HangulShaper = HangulShaper;

pub(crate) struct HangulShaper;

const LJMO: u8 = 1;
const VJMO: u8 = 2;
const TJMO: u8 = 3;

const JAMO_FEATURES: [(u8, crate::common::Tag); 3] = [
    (LJMO, feature::HANGUL_LEADING_JAMO),
    (VJMO, feature::HANGUL_VOWEL_JAMO),
    (TJMO, feature::HANGUL_TRAILING_JAMO),
];

struct HangulPlan {
    mask_array: [Mask; 4],
}

impl ComplexShaper for HangulShaper {
    fn collect_features(&self, planner: &mut ShapePlanner) {
        for (_, tag) in JAMO_FEATURES {
            planner.ot_map.add_feature(tag, FeatureFlags::empty(), 1);
        }
    }

    fn override_features(&self, planner: &mut ShapePlanner) {
        // Fonts that put their jamo lookups in 'calt' would apply them to
        // every syllable.
        planner.ot_map.disable_feature(feature::CONTEXTUAL_ALTERNATES);
    }

    fn create_data(&self, plan: &ShapePlan, _: &Font) -> Option<Box<dyn Any + Send + Sync>> {
        let mut mask_array = [0; 4];
        for (jamo, tag) in JAMO_FEATURES {
            mask_array[usize::from(jamo)] = plan.ot_map.get_1_mask(tag);
        }

        Some(Box::new(HangulPlan { mask_array }))
    }

    fn preprocess_text(&self, _: &ShapePlan, font: &Font, buffer: &mut Buffer) {
        compose_syllables(font, buffer);
    }

    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::None
    }

    fn setup_masks(&self, plan: &ShapePlan, _: &Font, buffer: &mut Buffer) {
        let Some(hangul_plan) = plan.data::<HangulPlan>() else {
            return;
        };

        for info in buffer.info_slice_mut() {
            info.mask |= hangul_plan.mask_array[usize::from(info.jamo())];
        }
    }

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        None
    }

    fn fallback_position(&self) -> bool {
        false
    }
}

const L_BASE: u32 = 0x1100;
const V_BASE: u32 = 0x1161;
const T_BASE: u32 = 0x11A7;
const L_COUNT: u32 = 19;
const V_COUNT: u32 = 21;
const T_COUNT: u32 = 28;
const N_COUNT: u32 = V_COUNT * T_COUNT;
const S_COUNT: u32 = L_COUNT * N_COUNT;
const S_BASE: u32 = 0xAC00;

fn is_combining_l(u: u32) -> bool {
    (L_BASE..L_BASE + L_COUNT).contains(&u)
}

fn is_combining_v(u: u32) -> bool {
    (V_BASE..V_BASE + V_COUNT).contains(&u)
}

fn is_combining_t(u: u32) -> bool {
    (T_BASE + 1..T_BASE + T_COUNT).contains(&u)
}

fn is_combined_s(u: u32) -> bool {
    (S_BASE..S_BASE + S_COUNT).contains(&u)
}

fn is_l(u: u32) -> bool {
    matches!(u, 0x1100..=0x115F | 0xA960..=0xA97C)
}

fn is_v(u: u32) -> bool {
    matches!(u, 0x1160..=0x11A7 | 0xD7B0..=0xD7C6)
}

fn is_t(u: u32) -> bool {
    matches!(u, 0x11A8..=0x11FF | 0xD7CB..=0xD7FB)
}

fn is_tone_mark(u: u32) -> bool {
    matches!(u, 0x302E..=0x302F)
}

fn is_zero_width_char(font: &Font, u: u32) -> bool {
    char::from_u32(u)
        .and_then(|c| font.glyph(c))
        .is_some_and(|glyph| font.backend.glyph_h_advance(glyph) == 0)
}

/// Composes every syllable the font has a precomposed glyph for, and fully
/// decomposes the others into jamo tagged for `ljmo`/`vjmo`/`tjmo`.
///
/// A tone mark following a syllable is moved in front of it, unless its
/// glyph has no advance and is meant to overstrike.
fn compose_syllables(font: &Font, buffer: &mut Buffer) {
    buffer.clear_output();

    // Extent of the last syllable in the output; valid while start < end.
    let mut start = 0;
    let mut end = 0;

    while buffer.idx < buffer.len && buffer.successful {
        let u = buffer.cur(0).glyph_id;

        if is_tone_mark(u) {
            if start < end && end == buffer.out_len() {
                buffer.unsafe_to_break_from_outbuffer(start, buffer.idx);
                buffer.next_glyph();
                if !is_zero_width_char(font, u) {
                    buffer.merge_out_clusters(start, end + 1);
                    buffer.out_info_mut()[start..=end].rotate_right(1);
                }
            } else if !buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
                && font.has_glyph_u32(DOTTED_CIRCLE)
            {
                let chars = if is_zero_width_char(font, u) {
                    [DOTTED_CIRCLE, u]
                } else {
                    [u, DOTTED_CIRCLE]
                };
                buffer.replace_glyphs(1, &chars);
            } else {
                buffer.next_glyph();
            }

            start = buffer.out_len();
            end = start;
            continue;
        }

        // A potential syllable start; only used once end moves past it.
        start = buffer.out_len();

        if is_l(u) && buffer.idx + 1 < buffer.len {
            let l = u;
            let v = buffer.cur(1).glyph_id;
            if is_v(v) {
                let t = if buffer.idx + 2 < buffer.len && is_t(buffer.cur(2).glyph_id) {
                    buffer.cur(2).glyph_id
                } else {
                    0
                };

                let len = if t != 0 { 3 } else { 2 };
                buffer.unsafe_to_break(buffer.idx, buffer.idx + len);

                if is_combining_l(l) && is_combining_v(v) && (t == 0 || is_combining_t(t)) {
                    let t_index = if t != 0 { t - T_BASE } else { 0 };
                    let s = S_BASE + (l - L_BASE) * N_COUNT + (v - V_BASE) * T_COUNT + t_index;
                    if font.has_glyph_u32(s) {
                        buffer.replace_glyphs(len, &[s]);
                        end = start + 1;
                        continue;
                    }
                }

                // Old Hangul, or the font lacks the precomposed glyph.
                buffer.cur_mut(0).set_jamo(LJMO);
                buffer.next_glyph();
                buffer.cur_mut(0).set_jamo(VJMO);
                buffer.next_glyph();
                if t != 0 {
                    buffer.cur_mut(0).set_jamo(TJMO);
                    buffer.next_glyph();
                }

                end = start + len;
                if buffer.cluster_level == BufferClusterLevel::MonotoneGraphemes {
                    buffer.merge_out_clusters(start, end);
                }

                continue;
            }
        } else if is_combined_s(u) {
            let s = u;
            let has_glyph = font.has_glyph_u32(s);

            let l_index = (s - S_BASE) / N_COUNT;
            let n_index = (s - S_BASE) % N_COUNT;
            let v_index = n_index / T_COUNT;
            let t_index = n_index % T_COUNT;

            let next = (buffer.idx + 1 < buffer.len).then(|| buffer.cur(1).glyph_id);

            if t_index == 0 {
                if let Some(t) = next.filter(|&t| is_combining_t(t)) {
                    // <LV,T>
                    let new_s = s + t - T_BASE;
                    if font.has_glyph_u32(new_s) {
                        buffer.replace_glyphs(2, &[new_s]);
                        end = start + 1;
                        continue;
                    }

                    buffer.unsafe_to_break(buffer.idx, buffer.idx + 2);
                }
            }

            let followed_by_t = t_index == 0 && next.is_some_and(is_t);
            if !has_glyph || followed_by_t {
                let decomposed = [L_BASE + l_index, V_BASE + v_index, T_BASE + t_index];
                let s_len = if t_index != 0 { 3 } else { 2 };
                if decomposed[..s_len].iter().all(|&u| font.has_glyph_u32(u)) {
                    buffer.replace_glyphs(1, &decomposed[..s_len]);

                    let mut syllable_len = s_len;
                    // A non-combining T that forced the split joins the syllable.
                    if has_glyph && t_index == 0 {
                        buffer.next_glyph();
                        syllable_len += 1;
                    }

                    end = start + syllable_len;

                    let out = buffer.out_info_mut();
                    out[start].set_jamo(LJMO);
                    out[start + 1].set_jamo(VJMO);
                    if start + 2 < end {
                        out[start + 2].set_jamo(TJMO);
                    }

                    if buffer.cluster_level == BufferClusterLevel::MonotoneGraphemes {
                        buffer.merge_out_clusters(start, end);
                    }

                    continue;
                }
            }

            if has_glyph {
                end = start + 1;
                buffer.next_glyph();
                continue;
            }
        }

        // Not a syllable: end <= start keeps tone marks from reordering.
        buffer.next_glyph();
    }

    buffer.sync();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jamo_ranges() {
        assert!(is_combining_l(0x1100));
        assert!(!is_combining_l(0x1113));
        assert!(is_combining_v(0x1175));
        assert!(!is_combining_t(T_BASE));
        assert!(is_combining_t(0x11C2));
        assert!(is_combined_s(0xD7A3));
        assert!(!is_combined_s(0xD7A4));
        assert!(is_l(0xA960) && is_v(0xD7B0) && is_t(0xD7CB));
    }

    #[test]
    fn syllable_arithmetic() {
        // U+D55C HANGUL SYLLABLE HAN = HIEUH + A + NIEUN
        let s = 0xD55C - S_BASE;
        assert_eq!(L_BASE + s / N_COUNT, 0x1112);
        assert_eq!(V_BASE + (s % N_COUNT) / T_COUNT, 0x1161);
        assert_eq!(T_BASE + s % T_COUNT, 0x11AB);
    }
}
