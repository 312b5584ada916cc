//! Presentation-form shaping for fonts that carry the Arabic forms in
//! `cmap` but have no GSUB for the script.

use alloc::vec::Vec;

use super::arabic::{action, ArabicPlan, ARABIC_FEATURES};
use super::arabic_table::{LAM_ALEF_LIGATURES, SHADDA_LIGATURES, SHAPING_TABLE};
use crate::buffer::{Buffer, GlyphPropsFlags};
use crate::face::Font;
use crate::ot::feature;
use crate::plan::ShapePlan;
use crate::Mask;

/// Column of each form in the shaping table, with the joining action that
/// selects it.
const FORMS: [(usize, u8); 4] = [
    (0, action::ISOL),
    (1, action::FINA),
    (2, action::INIT),
    (3, action::MEDI),
];

/// A single substitution synthesized from `cmap`, sorted by input glyph.
#[derive(Debug)]
struct SingleLookup {
    mask: Mask,
    glyphs: Vec<(u32, u32)>,
}

impl SingleLookup {
    fn apply(&self, buffer: &mut Buffer) {
        for info in buffer.info_slice_mut() {
            if info.mask & self.mask == 0 {
                continue;
            }

            if let Ok(i) = self.glyphs.binary_search_by_key(&info.glyph_id, |&(from, _)| from) {
                info.substitute(self.glyphs[i].1);
            }
        }
    }
}

/// Pairwise ligatures: a first glyph followed by one of its seconds.
#[derive(Debug)]
struct LigatureLookup {
    mask: Mask,
    ignore_marks: bool,
    ligatures: Vec<(u32, Vec<(u32, u32)>)>,
}

impl LigatureLookup {
    fn new(font: &Font, mask: Mask, ignore_marks: bool, table: &[(u16, &[(u16, u16)])]) -> Self {
        let glyph = |u: u16| char::from_u32(u32::from(u)).and_then(|c| font.glyph(c));

        let mut ligatures = Vec::new();
        for &(first, seconds) in table {
            let Some(first) = glyph(first) else {
                continue;
            };

            let mut pairs: Vec<(u32, u32)> = seconds
                .iter()
                .filter_map(|&(second, lig)| Some((glyph(second)?, glyph(lig)?)))
                .collect();

            if !pairs.is_empty() {
                pairs.sort_unstable();
                ligatures.push((first, pairs));
            }
        }

        ligatures.sort_unstable_by_key(|(first, _)| *first);

        LigatureLookup {
            mask,
            ignore_marks,
            ligatures,
        }
    }

    fn is_empty(&self) -> bool {
        self.ligatures.is_empty()
    }

    fn seconds(&self, first: u32) -> Option<&[(u32, u32)]> {
        let i = self.ligatures.binary_search_by_key(&first, |(g, _)| *g).ok()?;
        Some(&self.ligatures[i].1)
    }

    fn apply(&self, buffer: &mut Buffer) {
        buffer.clear_output();
        buffer.idx = 0;

        while buffer.idx < buffer.len && buffer.successful {
            let i = buffer.idx;
            let cur = buffer.info[i];

            let seconds = if cur.mask & self.mask != 0 {
                self.seconds(cur.glyph_id)
            } else {
                None
            };

            let Some(seconds) = seconds else {
                buffer.next_glyph();
                continue;
            };

            let mut j = i + 1;
            while self.ignore_marks && j < buffer.len && buffer.info[j].is_mark() {
                j += 1;
            }

            let lig = if j < buffer.len {
                seconds
                    .binary_search_by_key(&buffer.info[j].glyph_id, |&(second, _)| second)
                    .ok()
                    .map(|k| seconds[k].1)
            } else {
                None
            };

            let Some(lig) = lig else {
                buffer.next_glyph();
                continue;
            };

            buffer.merge_clusters(i, j + 1);
            let props = buffer.info[i].glyph_props() | GlyphPropsFlags::LIGATED;
            buffer.info[i].set_glyph_props(props);
            buffer.replace_glyph(lig);
            // Skipped marks stay after the ligature.
            buffer.next_glyphs(j - i - 1);
            buffer.skip_glyph();
        }

        buffer.sync();
    }
}

/// Lookups synthesized once per plan.
#[derive(Debug)]
pub(crate) struct FallbackPlan {
    singles: Vec<SingleLookup>,
    ligatures: Vec<LigatureLookup>,
}

impl FallbackPlan {
    pub(crate) fn new(plan: &ShapePlan, font: &Font) -> Option<Self> {
        let mut singles = Vec::new();
        for (column, action) in FORMS {
            let mask = plan.ot_map.get_1_mask(ARABIC_FEATURES[usize::from(action)]);
            if mask == 0 {
                continue;
            }

            let mut glyphs: Vec<(u32, u32)> = SHAPING_TABLE
                .iter()
                .filter(|(_, forms)| forms[column] != 0)
                .filter_map(|&(u, forms)| {
                    let from = font.glyph(char::from_u32(u32::from(u))?)?;
                    let to = font.glyph(char::from_u32(u32::from(forms[column]))?)?;
                    (from != to).then_some((from, to))
                })
                .collect();

            if glyphs.is_empty() {
                continue;
            }

            glyphs.sort_unstable();
            glyphs.dedup_by_key(|(from, _)| *from);
            singles.push(SingleLookup { mask, glyphs });
        }

        let rlig_mask = plan.ot_map.get_1_mask(feature::REQUIRED_LIGATURES);
        let mut ligatures = Vec::new();
        if rlig_mask != 0 {
            ligatures.push(LigatureLookup::new(font, rlig_mask, true, LAM_ALEF_LIGATURES));
            ligatures.push(LigatureLookup::new(font, rlig_mask, false, SHADDA_LIGATURES));
            ligatures.retain(|lookup| !lookup.is_empty());
        }

        if singles.is_empty() && ligatures.is_empty() {
            log::debug!("font has no Arabic presentation forms either");
            return None;
        }

        Some(FallbackPlan { singles, ligatures })
    }

    fn apply(&self, buffer: &mut Buffer) {
        for lookup in &self.singles {
            lookup.apply(buffer);
        }

        for lookup in &self.ligatures {
            lookup.apply(buffer);
        }
    }
}

/// The pause after `rlig`: substitutes presentation forms where GSUB had
/// nothing to offer.
pub(crate) fn fallback_shape(plan: &ShapePlan, _: &Font, buffer: &mut Buffer) {
    let Some(fallback) = plan.data::<ArabicPlan>().and_then(|data| data.fallback.as_ref()) else {
        return;
    };

    fallback.apply(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lam_alef_lookup() -> LigatureLookup {
        LigatureLookup {
            mask: 1,
            ignore_marks: true,
            ligatures: alloc::vec![(10, alloc::vec![(20, 30)])],
        }
    }

    fn buffer_of(glyphs: &[(u32, bool)]) -> Buffer {
        let mut buffer = Buffer::new();
        for (i, &(glyph, is_mark)) in glyphs.iter().enumerate() {
            buffer.add('a', i as u32);
            let info = &mut buffer.info[i];
            info.glyph_id = glyph;
            info.mask = 1;
            if is_mark {
                info.set_glyph_props(GlyphPropsFlags::MARK);
            }
        }
        buffer
    }

    #[test]
    fn ligature_skips_marks() {
        let mut buffer = buffer_of(&[(10, false), (5, true), (20, false), (7, false)]);
        lam_alef_lookup().apply(&mut buffer);

        let glyphs: Vec<u32> = buffer.glyph_infos().iter().map(|i| i.glyph_id).collect();
        assert_eq!(glyphs, [30, 5, 7]);
        assert!(buffer.info[0].is_ligated());
        assert!(!buffer.info[2].is_ligated());
        assert_eq!(buffer.info[0].cluster, 0);
        assert_eq!(buffer.info[1].cluster, 0);
        assert_eq!(buffer.info[2].cluster, 3);
    }

    #[test]
    fn ligature_respects_mask() {
        let mut buffer = buffer_of(&[(10, false), (20, false)]);
        buffer.info[0].mask = 0;
        lam_alef_lookup().apply(&mut buffer);
        assert_eq!(buffer.len, 2);
    }

    #[test]
    fn single_substitution_respects_mask() {
        let lookup = SingleLookup {
            mask: 2,
            glyphs: alloc::vec![(10, 11)],
        };
        let mut buffer = buffer_of(&[(10, false), (10, false)]);
        buffer.info[1].mask = 2;
        lookup.apply(&mut buffer);
        assert_eq!(buffer.info[0].glyph_id, 10);
        assert_eq!(buffer.info[1].glyph_id, 11);
    }
}
