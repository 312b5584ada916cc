use alloc::boxed::Box;
use core::any::Any;

use super::indic_table::{category as cat, position as pos, Category, SyllabicInfo};
use super::machine::{one, CategorySet, Grammar, Machine, Rule};
use super::syllabic::{clear_syllables, insert_dotted_circles, setup_syllables as segment};
use super::{ComplexShaper, ZeroWidthMarks};
use crate::buffer::Buffer;
use crate::common::Tag;
use crate::face::Font;
use crate::ot::normalize::NormalizationMode;
use crate::ot::{feature, FeatureFlags};
use crate::plan::{ShapePlan, ShapePlanner};

pub(crate) static MYANMAR_SHAPER: MyanmarShaper = MyanmarShaper;
pub(crate) static MYANMAR_ZAWGYI_SHAPER: ZawgyiShaper = ZawgyiShaper;

pub(crate) struct MyanmarShaper;

/// Zawgyi is a font encoding that reuses Myanmar codepoints for glyph
/// shapes. All automatic processing would only corrupt it.
pub(crate) struct ZawgyiShaper;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SyllableType {
    Consonant = 0,
    Punctuation,
    Broken,
    NonMyanmar,
}

mod grammar {
    use super::{cat, one, CategorySet, Grammar, Rule, SyllableType};
    use crate::complex::machine::Pattern::{self, *};

    const J: CategorySet = one(cat::ZWJ) | one(cat::ZWNJ);
    const C: CategorySet = one(cat::C) | one(cat::RA);
    const K: Pattern = Seq(&[Any(one(cat::RA)), Any(one(cat::AS)), Any(one(cat::H))]);

    const AS: Pattern = Opt(&Any(one(cat::AS)));
    const DB_AS: Pattern = Opt(&Seq(&[Any(one(cat::DB)), AS]));

    const MEDIAL_GROUP: Pattern = Seq(&[
        Opt(&Any(one(cat::MY))),
        AS,
        Opt(&Any(one(cat::MR))),
        Opt(&Seq(&[
            Alt(&[
                Seq(&[Any(one(cat::MW)), Opt(&Any(one(cat::MH))), Opt(&Any(one(cat::ML)))]),
                Seq(&[Any(one(cat::MH)), Opt(&Any(one(cat::ML)))]),
                Any(one(cat::ML)),
            ]),
            AS,
        ])),
    ]);
    const MAIN_VOWEL_GROUP: Pattern = Seq(&[
        Star(&Seq(&[Any(one(cat::V_PRE)), Opt(&Any(one(cat::VS)))])),
        Star(&Any(one(cat::V_ABV))),
        Star(&Any(one(cat::V_BLW))),
        Star(&Any(one(cat::A))),
        DB_AS,
    ]);
    const POST_VOWEL_GROUP: Pattern = Seq(&[
        Any(one(cat::V_PST)),
        Opt(&Any(one(cat::MH))),
        Opt(&Any(one(cat::ML))),
        Star(&Any(one(cat::AS))),
        Star(&Any(one(cat::V_ABV))),
        Star(&Any(one(cat::A))),
        DB_AS,
    ]);
    const PWO_TONE_GROUP: Pattern = Seq(&[
        Any(one(cat::PT)),
        Star(&Any(one(cat::A))),
        Opt(&Any(one(cat::DB))),
        AS,
    ]);
    const COMPLEX_SYLLABLE_TAIL: Pattern = Seq(&[
        Star(&Any(one(cat::AS))),
        MEDIAL_GROUP,
        MAIN_VOWEL_GROUP,
        Star(&POST_VOWEL_GROUP),
        Star(&PWO_TONE_GROUP),
        Star(&Any(one(cat::V))),
        Opt(&Any(J)),
    ]);
    const SYLLABLE_TAIL: Pattern = Seq(&[
        Star(&Seq(&[
            Any(one(cat::H)),
            Any(C | one(cat::IV)),
            Opt(&Any(one(cat::VS))),
        ])),
        Alt(&[Any(one(cat::H)), COMPLEX_SYLLABLE_TAIL]),
    ]);

    const BASE: CategorySet = C | one(cat::IV) | one(cat::GB) | one(cat::DOTTEDCIRCLE);

    pub(super) const MYANMAR: Grammar = Grammar {
        rules: &[
            Rule {
                pattern: Seq(&[
                    Opt(&Alt(&[K, Any(one(cat::CS))])),
                    Any(BASE),
                    Opt(&Any(one(cat::VS))),
                    SYLLABLE_TAIL,
                ]),
                kind: SyllableType::Consonant as u8,
            },
            Rule {
                pattern: Any(J),
                kind: SyllableType::NonMyanmar as u8,
            },
            Rule {
                pattern: Seq(&[Any(one(cat::P)), Opt(&Any(one(cat::SM)))]),
                kind: SyllableType::Punctuation as u8,
            },
            Rule {
                pattern: Seq(&[Opt(&K), Opt(&Any(one(cat::VS))), SYLLABLE_TAIL]),
                kind: SyllableType::Broken as u8,
            },
        ],
        fallback: SyllableType::NonMyanmar as u8,
    };
}

const MYANMAR_BASIC_FEATURES: &[Tag] = &[
    feature::REPH_FORMS,
    feature::PRE_BASE_FORMS,
    feature::BELOW_BASE_FORMS,
    feature::POST_BASE_FORMS,
];

const MYANMAR_OTHER_FEATURES: &[Tag] = &[
    feature::PRE_BASE_SUBSTITUTIONS,
    feature::ABOVE_BASE_SUBSTITUTIONS,
    feature::BELOW_BASE_SUBSTITUTIONS,
    feature::POST_BASE_SUBSTITUTIONS,
];

fn myanmar_category(u: u32) -> Category {
    match u {
        0x101B => cat::RA,
        0x1000..=0x1020 | 0x103F => cat::C,
        0x1021..=0x102A => cat::IV,
        0x102B | 0x102C => cat::V_PST,
        0x102D | 0x102E | 0x1032..=0x1035 => cat::V_ABV,
        0x102F | 0x1030 => cat::V_BLW,
        0x1031 => cat::V_PRE,
        0x1036 => cat::A,
        0x1037 => cat::DB,
        0x1038 => cat::SM,
        0x1039 => cat::H,
        0x103A => cat::AS,
        0x103B => cat::MY,
        0x103C => cat::MR,
        0x103D => cat::MW,
        0x103E => cat::MH,
        0x1040..=0x1049 => cat::GB,
        0x104A..=0x104F => cat::P,
        0x1050 | 0x1051 => cat::C,
        0x1052..=0x1055 => cat::IV,
        0x1056 | 0x1057 => cat::V_PST,
        0x1058 | 0x1059 => cat::V_BLW,
        0x105A..=0x105D => cat::C,
        0x105E..=0x1060 => cat::ML,
        0x1061 => cat::C,
        0x1062 => cat::V_PST,
        0x1063 | 0x1064 => cat::PT,
        0x1065 | 0x1066 => cat::C,
        0x1067 | 0x1068 => cat::V_PST,
        0x1069..=0x106D => cat::PT,
        0x106E..=0x1070 => cat::C,
        0x1071..=0x1074 => cat::V_ABV,
        0x1075..=0x1081 => cat::C,
        0x1082 => cat::MW,
        0x1083 => cat::V_PST,
        0x1084 => cat::V_PRE,
        0x1085 | 0x1086 => cat::V_ABV,
        0x1087..=0x108D => cat::PT,
        0x108E => cat::C,
        0x108F => cat::PT,
        0x1090..=0x1099 => cat::GB,
        0x109A..=0x109C => cat::PT,
        0x109D => cat::V_ABV,
        0xAA60..=0xAA7F | 0xA9E0..=0xA9FF => cat::C,
        0xFE00..=0xFE0F => cat::VS,
        0x200C => cat::ZWNJ,
        0x200D => cat::ZWJ,
        0x25CC => cat::DOTTEDCIRCLE,
        0x00A0 => cat::GB,
        _ => cat::X,
    }
}

struct MyanmarPlan {
    machine: Machine,
}

impl ComplexShaper for MyanmarShaper {
    fn collect_features(&self, planner: &mut ShapePlanner) {
        let map = &mut planner.ot_map;

        // Do this before any lookups have been applied.
        map.add_gsub_pause(Some(setup_syllables));

        map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::PER_SYLLABLE, 1);
        map.enable_feature(feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::PER_SYLLABLE, 1);

        map.add_gsub_pause(Some(reorder));

        for &tag in MYANMAR_BASIC_FEATURES {
            map.enable_feature(tag, FeatureFlags::MANUAL_ZWJ.union(FeatureFlags::PER_SYLLABLE), 1);
            map.add_gsub_pause(None);
        }

        map.add_gsub_pause(Some(clear_syllables));

        for &tag in MYANMAR_OTHER_FEATURES {
            map.enable_feature(tag, FeatureFlags::MANUAL_ZWJ, 1);
        }
    }

    fn create_data(&self, _: &ShapePlan, _: &Font) -> Option<Box<dyn Any + Send + Sync>> {
        Some(Box::new(MyanmarPlan {
            machine: Machine::new(&grammar::MYANMAR),
        }))
    }

    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::ComposedDiacriticsNoShortCircuit
    }

    fn setup_masks(&self, _: &ShapePlan, _: &Font, buffer: &mut Buffer) {
        // No masks, only the character categories.
        for info in buffer.info_slice_mut() {
            info.set_syllabic_category(myanmar_category(info.glyph_id));
        }
    }

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        Some(ZeroWidthMarks::ByGdefEarly)
    }

    fn fallback_position(&self) -> bool {
        false
    }
}

impl ComplexShaper for ZawgyiShaper {
    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::None
    }

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        None
    }

    fn fallback_position(&self) -> bool {
        false
    }
}

fn setup_syllables(plan: &ShapePlan, _: &Font, buffer: &mut Buffer) {
    if let Some(myanmar_plan) = plan.data::<MyanmarPlan>() {
        segment(&myanmar_plan.machine, buffer, SyllableType::Broken as u8);
    }
}

fn reorder(_: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    insert_dotted_circles(font, buffer, SyllableType::Broken as u8, cat::DOTTEDCIRCLE, None, None);

    let mut start = 0;
    let mut end = buffer.next_syllable(0);
    while start < buffer.len {
        match buffer.info[start].syllable() & 0x0F {
            // Broken syllables already got their dotted circle.
            0 | 2 => reorder_consonant_syllable(start, end, buffer),
            _ => {}
        }

        start = end;
        end = buffer.next_syllable(start);
    }
}

fn reorder_consonant_syllable(start: usize, end: usize, buffer: &mut Buffer) {
    // A kinzi (Ra,Asat,Halant) at the start is not the base and renders
    // after the main consonant.
    let has_kinzi = start + 3 <= end
        && buffer.info[start].syllabic_category() == cat::RA
        && buffer.info[start + 1].syllabic_category() == cat::AS
        && buffer.info[start + 2].syllabic_category() == cat::H;
    let limit = if has_kinzi { start + 3 } else { start };

    let base = (limit..end)
        .find(|&i| buffer.info[i].is_consonant())
        .unwrap_or(if has_kinzi { start } else { limit });

    let mut i = start;
    while i < limit {
        buffer.info[i].set_syllabic_position(pos::AFTER_MAIN);
        i += 1;
    }

    while i < base {
        buffer.info[i].set_syllabic_position(pos::PRE_C);
        i += 1;
    }

    if i < end {
        buffer.info[i].set_syllabic_position(pos::BASE_C);
        i += 1;
    }

    let mut position = pos::AFTER_MAIN;
    for i in i..end {
        let category = buffer.info[i].syllabic_category();
        let new_position = match category {
            // Pre-base medial Ra.
            cat::MR => pos::PRE_C,
            // Left matra.
            cat::V_PRE => pos::PRE_M,
            // Selectors follow whatever they modify.
            cat::VS => buffer.info[i - 1].syllabic_position(),
            cat::V_BLW if position == pos::AFTER_MAIN => {
                position = pos::BELOW_C;
                position
            }
            cat::A if position == pos::BELOW_C => pos::BEFORE_SUB,
            cat::V_BLW if position == pos::BELOW_C => position,
            _ if position == pos::BELOW_C => {
                position = pos::AFTER_SUB;
                position
            }
            _ => position,
        };

        buffer.info[i].set_syllabic_position(new_position);
    }

    buffer.sort(start, end, |a, b| a.syllabic_position() > b.syllabic_position());

    flip_left_matras(start, end, buffer);
}

/// Several left matras were sorted in logical order; they render
/// right-to-left, each keeping its variation selector after it.
fn flip_left_matras(start: usize, end: usize, buffer: &mut Buffer) {
    let mut first = end;
    let mut last = end;
    for i in start..end {
        if buffer.info[i].syllabic_position() == pos::PRE_M {
            if first == end {
                first = i;
            }

            last = i;
        }
    }

    if first < last {
        buffer.reverse_range(first, last + 1);

        let mut i = first;
        for j in first..=last {
            if buffer.info[j].syllabic_category() == cat::V_PRE {
                buffer.reverse_range(i, j + 1);
                i = j + 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GlyphInfo;
    use alloc::vec::Vec;

    fn categories(text: &[u32]) -> Vec<Category> {
        text.iter().map(|&u| myanmar_category(u)).collect()
    }

    fn syllable(text: &[u32]) -> (usize, u8) {
        Machine::new(&grammar::MYANMAR).match_syllable(categories(text).into_iter())
    }

    fn buffer_of(text: &[u32]) -> Buffer {
        let mut buffer = Buffer::new();
        for (i, &u) in text.iter().enumerate() {
            let mut info = GlyphInfo {
                glyph_id: u,
                cluster: i as u32,
                ..GlyphInfo::default()
            };
            info.set_syllabic_category(myanmar_category(u));
            buffer.info.push(info);
        }
        buffer.len = text.len();
        buffer
    }

    #[test]
    fn kinzi_syllable() {
        // NGA, ASAT, VIRAMA, KA, VOWEL SIGN E
        assert_eq!(syllable(&[0x1004, 0x103A, 0x1039, 0x1000, 0x1031]), (5, SyllableType::Consonant as u8));
    }

    #[test]
    fn punctuation_takes_a_visarga() {
        assert_eq!(syllable(&[0x104B, 0x1038]), (2, SyllableType::Punctuation as u8));
    }

    #[test]
    fn lone_joiner_is_not_myanmar() {
        assert_eq!(syllable(&[0x200C, 0x1000]), (1, SyllableType::NonMyanmar as u8));
    }

    #[test]
    fn lone_medial_is_broken() {
        assert_eq!(syllable(&[0x103B]), (1, SyllableType::Broken as u8));
    }

    #[test]
    fn left_matra_and_medial_ra_move_before_base() {
        // KA, MEDIAL RA, VOWEL SIGN E
        let mut buffer = buffer_of(&[0x1000, 0x103C, 0x1031]);
        reorder_consonant_syllable(0, 3, &mut buffer);
        let order: Vec<u32> = buffer.info[..3].iter().map(|info| info.glyph_id).collect();
        assert_eq!(order, [0x1031, 0x103C, 0x1000]);
        assert!(buffer.info[..3].iter().all(|info| info.cluster == 0));
    }

    #[test]
    fn kinzi_moves_after_base() {
        // NGA, ASAT, VIRAMA, KA
        let mut buffer = buffer_of(&[0x1004, 0x103A, 0x1039, 0x1000]);
        reorder_consonant_syllable(0, 4, &mut buffer);
        let order: Vec<u32> = buffer.info[..4].iter().map(|info| info.glyph_id).collect();
        assert_eq!(order, [0x1000, 0x1004, 0x103A, 0x1039]);
    }
}
