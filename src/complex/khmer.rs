use alloc::boxed::Box;
use core::any::Any;

use super::indic_table::{category as cat, position as pos, Category};
use super::machine::{one, CategorySet, Grammar, Machine, Rule};
use super::syllabic::{insert_dotted_circles, setup_syllables as segment};
use super::{ComplexShaper, ZeroWidthMarks};
use crate::buffer::Buffer;
use crate::common::Tag;
use crate::face::Font;
use crate::ot::normalize::{NormalizationMode, NormalizeContext};
use crate::ot::{feature, FeatureFlags};
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::{self, CharExt, GeneralCategory, GeneralCategoryExt};
use crate::Mask;

pub(crate) static KHMER_SHAPER: KhmerShaper = KhmerShaper;
pub(crate) static SEA_SHAPER: SeaShaper = SeaShaper;

pub(crate) struct KhmerShaper;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SyllableType {
    Consonant = 0,
    Broken,
    NonKhmer,
}

mod grammar {
    use super::{cat, one, CategorySet, Grammar, Rule, SyllableType};
    use crate::complex::machine::Pattern::{self, *};

    const C: CategorySet = one(cat::C) | one(cat::RA) | one(cat::V);
    const JOINER: CategorySet = one(cat::ZWJ) | one(cat::ZWNJ);

    const CN: Pattern = Seq(&[
        Any(C),
        Opt(&Seq(&[Opt(&Any(JOINER)), Any(one(cat::ROBATIC))])),
    ]);
    const XGROUP: Pattern = Star(&Seq(&[Star(&Any(JOINER)), Any(one(cat::X_GROUP))]));
    const YGROUP: Pattern = Star(&Any(one(cat::Y_GROUP)));
    const MATRA_GROUP: Pattern = Seq(&[
        Opt(&Any(one(cat::V_PRE))),
        XGROUP,
        Opt(&Any(one(cat::V_BLW))),
        XGROUP,
        Opt(&Seq(&[Opt(&Any(JOINER)), Any(one(cat::V_ABV))])),
        XGROUP,
        Opt(&Any(one(cat::V_PST))),
    ]);
    const SYLLABLE_TAIL: Pattern = Seq(&[
        XGROUP,
        MATRA_GROUP,
        XGROUP,
        Opt(&Seq(&[Any(one(cat::COENG)), Any(C)])),
        YGROUP,
    ]);
    const BROKEN_CLUSTER: Pattern = Seq(&[
        Star(&Seq(&[Any(one(cat::COENG)), CN])),
        Alt(&[Any(one(cat::COENG)), SYLLABLE_TAIL]),
    ]);

    pub(super) const KHMER: Grammar = Grammar {
        rules: &[
            Rule {
                pattern: Seq(&[
                    Alt(&[CN, Any(one(cat::PLACEHOLDER)), Any(one(cat::DOTTEDCIRCLE))]),
                    BROKEN_CLUSTER,
                ]),
                kind: SyllableType::Consonant as u8,
            },
            Rule {
                pattern: BROKEN_CLUSTER,
                kind: SyllableType::Broken as u8,
            },
        ],
        fallback: SyllableType::NonKhmer as u8,
    };
}

const KHMER_FEATURES: [(Tag, FeatureFlags); 9] = [
    // Basic features, applied together after reordering.
    (feature::PRE_BASE_FORMS, FeatureFlags::MANUAL_JOINERS.union(FeatureFlags::PER_SYLLABLE)),
    (feature::BELOW_BASE_FORMS, FeatureFlags::MANUAL_JOINERS.union(FeatureFlags::PER_SYLLABLE)),
    (feature::ABOVE_BASE_FORMS, FeatureFlags::MANUAL_JOINERS.union(FeatureFlags::PER_SYLLABLE)),
    (feature::POST_BASE_FORMS, FeatureFlags::MANUAL_JOINERS.union(FeatureFlags::PER_SYLLABLE)),
    (feature::CONJUNCT_FORM_AFTER_RO, FeatureFlags::MANUAL_JOINERS.union(FeatureFlags::PER_SYLLABLE)),
    // Other features, applied all at once.
    (feature::PRE_BASE_SUBSTITUTIONS, FeatureFlags::GLOBAL_MANUAL_JOINERS),
    (feature::ABOVE_BASE_SUBSTITUTIONS, FeatureFlags::GLOBAL_MANUAL_JOINERS),
    (feature::BELOW_BASE_SUBSTITUTIONS, FeatureFlags::GLOBAL_MANUAL_JOINERS),
    (feature::POST_BASE_SUBSTITUTIONS, FeatureFlags::GLOBAL_MANUAL_JOINERS),
];

// Indices into `KHMER_FEATURES`.
mod khmer_feature {
    pub const PREF: usize = 0;
    pub const BLWF: usize = 1;
    pub const ABVF: usize = 2;
    pub const PSTF: usize = 3;
    pub const CFAR: usize = 4;
}

fn khmer_category(u: u32) -> Category {
    match u {
        0x179A => cat::RA,
        0x1780..=0x17A2 => cat::C,
        0x17A3..=0x17B3 => cat::V,
        0x17B6 | 0x17BE..=0x17C0 | 0x17C4 | 0x17C5 => cat::V_PST,
        0x17B7..=0x17BA => cat::V_ABV,
        0x17BB..=0x17BD => cat::V_BLW,
        0x17C1..=0x17C3 => cat::V_PRE,
        0x17C9 | 0x17CA | 0x17CC => cat::ROBATIC,
        0x17C6 | 0x17CB | 0x17CD..=0x17D1 => cat::X_GROUP,
        0x17C7 | 0x17C8 | 0x17D3 | 0x17DD => cat::Y_GROUP,
        0x17D2 => cat::COENG,
        0x17E0..=0x17E9 | 0x00A0 => cat::PLACEHOLDER,
        0x25CC => cat::DOTTEDCIRCLE,
        0x200C => cat::ZWNJ,
        0x200D => cat::ZWJ,
        _ => cat::X,
    }
}

fn feature_masks<const N: usize>(plan: &ShapePlan, features: &[(Tag, FeatureFlags); N]) -> [Mask; N] {
    let mut mask_array = [0; N];
    for (mask, &(tag, flags)) in mask_array.iter_mut().zip(features) {
        *mask = if flags.contains(FeatureFlags::GLOBAL) {
            0
        } else {
            plan.ot_map.get_1_mask(tag)
        };
    }

    mask_array
}

struct KhmerPlan {
    machine: Machine,
    mask_array: [Mask; KHMER_FEATURES.len()],
}

impl ComplexShaper for KhmerShaper {
    fn collect_features(&self, planner: &mut ShapePlanner) {
        let map = &mut planner.ot_map;

        map.add_gsub_pause(Some(setup_syllables));
        map.add_gsub_pause(Some(reorder));

        // The basic features are applied in one stage, without pauses
        // between them.
        map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::PER_SYLLABLE, 1);
        map.enable_feature(feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::PER_SYLLABLE, 1);

        for &(tag, flags) in &KHMER_FEATURES {
            map.add_feature(tag, flags, 1);
        }
    }

    fn override_features(&self, planner: &mut ShapePlanner) {
        // 'clig' forms ligatures required for correctness in Khmer.
        planner
            .ot_map
            .enable_feature(feature::CONTEXTUAL_LIGATURES, FeatureFlags::empty(), 1);
        planner.ot_map.disable_feature(feature::STANDARD_LIGATURES);
    }

    fn create_data(&self, plan: &ShapePlan, _: &Font) -> Option<Box<dyn Any + Send + Sync>> {
        Some(Box::new(KhmerPlan {
            machine: Machine::new(&grammar::KHMER),
            mask_array: feature_masks(plan, &KHMER_FEATURES),
        }))
    }

    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::ComposedDiacriticsNoShortCircuit
    }

    fn decompose(&self, _: &NormalizeContext, ab: char) -> Option<(char, Option<char>)> {
        // Split matras without a Unicode decomposition.
        match ab {
            '\u{17BE}' | '\u{17BF}' | '\u{17C0}' | '\u{17C4}' | '\u{17C5}' => Some(('\u{17C1}', Some(ab))),
            _ => unicode::decompose(ab),
        }
    }

    fn compose(&self, _: &NormalizeContext, a: char, b: char) -> Option<char> {
        // Avoid recomposing split matras.
        if a.general_category().is_mark() {
            return None;
        }

        unicode::compose(a, b)
    }

    fn setup_masks(&self, _: &ShapePlan, _: &Font, buffer: &mut Buffer) {
        for info in buffer.info_slice_mut() {
            info.set_syllabic_category(khmer_category(info.glyph_id));
        }
    }

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        None
    }

    fn fallback_position(&self) -> bool {
        false
    }
}

fn setup_syllables(plan: &ShapePlan, _: &Font, buffer: &mut Buffer) {
    if let Some(khmer_plan) = plan.data::<KhmerPlan>() {
        segment(&khmer_plan.machine, buffer, SyllableType::Broken as u8);
    }
}

fn reorder(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    let Some(khmer_plan) = plan.data::<KhmerPlan>() else {
        return;
    };

    insert_dotted_circles(
        font,
        buffer,
        SyllableType::Broken as u8,
        cat::DOTTEDCIRCLE,
        Some(cat::REPHA),
        None,
    );

    let mut start = 0;
    let mut end = buffer.next_syllable(0);
    while start < buffer.len {
        match buffer.info[start].syllable() & 0x0F {
            0 | 1 => reorder_consonant_syllable(khmer_plan, start, end, buffer),
            _ => {}
        }

        start = end;
        end = buffer.next_syllable(start);
    }
}

fn reorder_consonant_syllable(plan: &KhmerPlan, start: usize, end: usize, buffer: &mut Buffer) {
    // Everything after the base gets the post-base masks.
    let mask = plan.mask_array[khmer_feature::BLWF]
        | plan.mask_array[khmer_feature::ABVF]
        | plan.mask_array[khmer_feature::PSTF];
    for info in &mut buffer.info[start + 1..end] {
        info.mask |= mask;
    }

    let mut num_coengs = 0;
    for i in start + 1..end {
        // A Coeng,Ro pair (at most the second subscript) moves before the
        // base and takes 'pref'.
        if buffer.info[i].syllabic_category() == cat::COENG && num_coengs <= 2 && i + 1 < end {
            num_coengs += 1;

            if buffer.info[i + 1].syllabic_category() == cat::RA {
                buffer.info[i].mask |= plan.mask_array[khmer_feature::PREF];
                buffer.info[i + 1].mask |= plan.mask_array[khmer_feature::PREF];

                buffer.merge_clusters(start, i + 2);
                buffer.info[start..i + 2].rotate_right(2);

                // Whatever follows gets 'cfar', so fonts can tell
                // Ko,Coeng,Ro,Coeng,Ka from Ko,Coeng,Ka,Coeng,Ro.
                let cfar = plan.mask_array[khmer_feature::CFAR];
                if cfar != 0 {
                    for info in &mut buffer.info[i + 2..end] {
                        info.mask |= cfar;
                    }
                }

                num_coengs = 2;
            }
        } else if buffer.info[i].syllabic_category() == cat::V_PRE {
            // Left matra piece goes to the start.
            buffer.merge_clusters(start, i + 1);
            buffer.move_glyph_back(i, start);
        }
    }
}

/// Shaper for South-East Asian scripts whose fonts only expect pre-base
/// glyphs to be moved in front of the base: Javanese, Balinese, Cham and
/// similar.
pub(crate) struct SeaShaper;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SeaSyllableType {
    Consonant = 0,
    Broken,
    NonSea,
}

/// Pre-base medial Ra.
const SEA_MR: Category = cat::MR;

mod sea_grammar {
    use super::{cat, one, CategorySet, Grammar, Rule, SeaSyllableType, SEA_MR};
    use crate::complex::machine::Pattern::{self, *};

    const C: CategorySet = one(cat::C) | one(cat::RA) | one(cat::GB) | one(cat::DOTTEDCIRCLE);
    const MEDIAL: CategorySet = one(cat::CM) | one(SEA_MR);
    const MODIFIER: CategorySet = one(cat::SM) | one(cat::A);

    const TAIL: Pattern = Seq(&[
        Opt(&Any(one(cat::N))),
        Star(&Seq(&[Any(one(cat::H)), Any(C), Opt(&Any(one(cat::N)))])),
        Star(&Any(MEDIAL)),
        Star(&Any(one(cat::V_PRE))),
        Star(&Any(one(cat::V_ABV))),
        Star(&Any(one(cat::V_BLW))),
        Star(&Any(one(cat::V_PST))),
        Star(&Any(MODIFIER)),
    ]);

    pub(super) const SEA: Grammar = Grammar {
        rules: &[
            Rule {
                pattern: Seq(&[Any(C | one(cat::V)), TAIL]),
                kind: SeaSyllableType::Consonant as u8,
            },
            Rule {
                pattern: Seq(&[
                    Alt(&[
                        Any(one(cat::N)),
                        Any(one(cat::H)),
                        Any(MEDIAL),
                        Any(one(cat::V_PRE)),
                        Any(one(cat::V_ABV)),
                        Any(one(cat::V_BLW)),
                        Any(one(cat::V_PST)),
                    ]),
                    TAIL,
                ]),
                kind: SeaSyllableType::Broken as u8,
            },
        ],
        fallback: SeaSyllableType::NonSea as u8,
    };
}

const SEA_BASIC_FEATURES: &[Tag] = &[
    feature::PRE_BASE_FORMS,
    feature::ABOVE_BASE_FORMS,
    feature::BELOW_BASE_FORMS,
    feature::POST_BASE_FORMS,
];

const SEA_OTHER_FEATURES: &[Tag] = &[
    feature::PRE_BASE_SUBSTITUTIONS,
    feature::ABOVE_BASE_SUBSTITUTIONS,
    feature::BELOW_BASE_SUBSTITUTIONS,
    feature::POST_BASE_SUBSTITUTIONS,
];

fn sea_category(u: u32) -> (Category, u8) {
    let category = match u {
        0x1B44 | 0x1BAA | 0x1BAB | 0xA9C0 | 0x1A60 | 0x1BF2 | 0x1BF3 => cat::H,
        0x1B3E | 0x1B3F | 0x1BA6 | 0xA9BA | 0xA9BB | 0x1A6E..=0x1A72 | 0x1A19 => cat::V_PRE,
        0xAA34 | 0x1A55 => SEA_MR,
        0x25CC => cat::DOTTEDCIRCLE,
        0x200C => cat::ZWNJ,
        0x200D => cat::ZWJ,
        0x00A0 => cat::GB,
        _ => match char::from_u32(u) {
            Some(c) => match c.general_category() {
                GeneralCategory::OtherLetter => cat::C,
                GeneralCategory::DecimalNumber => cat::GB,
                GeneralCategory::NonspacingMark if c.combining_class() == 220 => cat::V_BLW,
                GeneralCategory::NonspacingMark => cat::V_ABV,
                GeneralCategory::SpacingMark => cat::V_PST,
                _ => cat::X,
            },
            None => cat::X,
        },
    };

    let position = match category {
        cat::V_PRE => pos::PRE_M,
        SEA_MR => pos::PRE_C,
        cat::C | cat::GB | cat::DOTTEDCIRCLE => pos::BASE_C,
        _ => pos::END,
    };

    (category, position)
}

struct SeaPlan {
    machine: Machine,
}

impl ComplexShaper for SeaShaper {
    fn collect_features(&self, planner: &mut ShapePlanner) {
        let map = &mut planner.ot_map;

        map.add_gsub_pause(Some(sea_setup_syllables));
        map.add_gsub_pause(Some(sea_initial_reordering));

        for &tag in SEA_BASIC_FEATURES {
            map.add_feature(tag, FeatureFlags::MANUAL_JOINERS.union(FeatureFlags::PER_SYLLABLE), 1);
            map.add_gsub_pause(None);
        }

        map.add_gsub_pause(Some(sea_final_reordering));

        for &tag in SEA_OTHER_FEATURES {
            map.add_feature(tag, FeatureFlags::GLOBAL_MANUAL_JOINERS, 1);
        }
    }

    fn create_data(&self, _: &ShapePlan, _: &Font) -> Option<Box<dyn Any + Send + Sync>> {
        Some(Box::new(SeaPlan {
            machine: Machine::new(&sea_grammar::SEA),
        }))
    }

    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::ComposedDiacriticsNoShortCircuit
    }

    fn setup_masks(&self, _: &ShapePlan, _: &Font, buffer: &mut Buffer) {
        for info in buffer.info_slice_mut() {
            let (category, position) = sea_category(info.glyph_id);
            info.set_syllabic_category(category);
            info.set_syllabic_position(position);
        }
    }

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        Some(ZeroWidthMarks::ByGdefLate)
    }

    fn fallback_position(&self) -> bool {
        false
    }
}

fn sea_setup_syllables(plan: &ShapePlan, _: &Font, buffer: &mut Buffer) {
    if let Some(sea_plan) = plan.data::<SeaPlan>() {
        segment(&sea_plan.machine, buffer, SeaSyllableType::Broken as u8);
    }
}

fn sea_initial_reordering(_: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    insert_dotted_circles(
        font,
        buffer,
        SeaSyllableType::Broken as u8,
        cat::DOTTEDCIRCLE,
        None,
        Some(pos::BASE_C),
    );

    let mut start = 0;
    let mut end = buffer.next_syllable(0);
    while start < buffer.len {
        if buffer.info[start].syllable() & 0x0F != SeaSyllableType::NonSea as u8 {
            sea_reorder_syllable(start, end, buffer);
        }

        start = end;
        end = buffer.next_syllable(start);
    }
}

/// Moves pre-base matras and medials in front of the base, keeping the
/// relative order of everything else.
fn sea_reorder_syllable(start: usize, end: usize, buffer: &mut Buffer) {
    let moves = buffer.info[start..end]
        .iter()
        .enumerate()
        .any(|(i, info)| i > 0 && matches!(info.syllabic_position(), pos::PRE_M | pos::PRE_C));
    if !moves {
        return;
    }

    // Pre-base glyphs before the first base already sit right.
    let Some(base) = buffer.info[start..end]
        .iter()
        .position(|info| info.syllabic_position() == pos::BASE_C)
        .map(|i| start + i)
    else {
        return;
    };

    for info in &mut buffer.info[base + 1..end] {
        if !matches!(info.syllabic_position(), pos::PRE_M | pos::PRE_C) {
            info.set_syllabic_position(pos::END);
        }
    }

    for info in &mut buffer.info[start..=base] {
        if info.syllabic_position() != pos::BASE_C && !matches!(info.syllabic_position(), pos::PRE_M | pos::PRE_C) {
            info.set_syllabic_position(pos::START);
        }
    }

    buffer.sort(start, end, |a, b| a.syllabic_position() > b.syllabic_position());
}

fn sea_final_reordering(_: &ShapePlan, _: &Font, buffer: &mut Buffer) {
    // Positions were only needed for the initial reordering.
    for info in buffer.info_slice_mut() {
        info.set_syllabic_position(pos::END);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn syllable(grammar: &Grammar, categories: &[Category]) -> (usize, u8) {
        Machine::new(grammar).match_syllable(categories.iter().copied())
    }

    fn khmer(text: &[u32]) -> Vec<Category> {
        text.iter().map(|&u| khmer_category(u)).collect()
    }

    #[test]
    fn khmer_categories() {
        assert_eq!(khmer_category(0x1780), cat::C);
        assert_eq!(khmer_category(0x179A), cat::RA);
        assert_eq!(khmer_category(0x17C1), cat::V_PRE);
        assert_eq!(khmer_category(0x17D2), cat::COENG);
        assert_eq!(khmer_category(0x17CC), cat::ROBATIC);
        assert_eq!(khmer_category(0x0041), cat::X);
    }

    #[test]
    fn coeng_ro_stays_in_syllable() {
        // KA, COENG, RO, SIGN E
        let text = khmer(&[0x1780, 0x17D2, 0x179A, 0x17C1]);
        assert_eq!(syllable(&grammar::KHMER, &text), (4, SyllableType::Consonant as u8));
    }

    #[test]
    fn khmer_lone_sign_is_broken() {
        let text = khmer(&[0x17C1, 0x1780]);
        assert_eq!(syllable(&grammar::KHMER, &text), (1, SyllableType::Broken as u8));
    }

    #[test]
    fn feature_table_order() {
        assert_eq!(KHMER_FEATURES[khmer_feature::PREF].0, feature::PRE_BASE_FORMS);
        assert_eq!(KHMER_FEATURES[khmer_feature::CFAR].0, feature::CONJUNCT_FORM_AFTER_RO);
    }

    #[test]
    fn sea_categories() {
        // JAVANESE LETTER KA, PANGKON, VOWEL SIGN TALING
        assert_eq!(sea_category(0xA98F).0, cat::C);
        assert_eq!(sea_category(0xA9C0).0, cat::H);
        assert_eq!(sea_category(0xA9BA), (cat::V_PRE, pos::PRE_M));
        // CHAM CONSONANT SIGN RA
        assert_eq!(sea_category(0xAA34), (SEA_MR, pos::PRE_C));
    }

    #[test]
    fn sea_syllable_with_prebase_vowel() {
        let text: Vec<Category> = [0xA98F, 0xA9BA].iter().map(|&u| sea_category(u).0).collect();
        assert_eq!(syllable(&sea_grammar::SEA, &text), (2, SeaSyllableType::Consonant as u8));
    }
}
