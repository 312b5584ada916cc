use alloc::boxed::Box;
use core::any::Any;
use core::cmp;

use super::indic_table::{category as cat, category_flag, indic_properties, position as pos, SyllabicInfo};
use super::machine::{one, CategorySet, Grammar, Machine, Rule};
use super::syllabic::{insert_dotted_circles, setup_syllables as segment};
use super::{rb_flag, rb_flag_unsafe, ComplexShaper, WouldSubstituteFeature, ZeroWidthMarks};
use crate::buffer::{Buffer, GlyphInfo};
use crate::common::{script, Script, Tag};
use crate::face::Font;
use crate::ot::normalize::{NormalizationMode, NormalizeContext};
use crate::ot::{feature, FeatureFlags, TableIndex};
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::{self, GeneralCategory, GeneralCategoryExt};
use crate::Mask;

pub(crate) static INDIC_SHAPER: IndicShaper = IndicShaper;

pub(crate) struct IndicShaper;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SyllableType {
    Consonant = 0,
    Vowel,
    Standalone,
    Symbol,
    Broken,
    NonIndic,
}

impl SyllableType {
    fn from_syllable(syllable: u8) -> Self {
        match syllable & 0x0F {
            0 => SyllableType::Consonant,
            1 => SyllableType::Vowel,
            2 => SyllableType::Standalone,
            3 => SyllableType::Symbol,
            4 => SyllableType::Broken,
            _ => SyllableType::NonIndic,
        }
    }
}

mod grammar {
    use super::{cat, one, CategorySet, Grammar, Rule, SyllableType};
    use crate::complex::machine::Pattern::{self, *};

    const C: CategorySet = one(cat::C) | one(cat::RA);
    const Z: CategorySet = one(cat::ZWJ) | one(cat::ZWNJ);
    const A: CategorySet = one(cat::A) | one(cat::VD);

    const N: Pattern = Seq(&[
        Opt(&Seq(&[Opt(&Any(one(cat::ZWNJ))), Any(one(cat::RS))])),
        Opt(&Seq(&[Any(one(cat::N)), Opt(&Any(one(cat::N)))])),
    ]);
    const REPH: Pattern = Alt(&[Seq(&[Any(one(cat::RA)), Any(one(cat::H))]), Any(one(cat::REPHA))]);
    const CN: Pattern = Seq(&[Any(C), Opt(&Any(one(cat::ZWJ))), Opt(&N)]);
    const SYMBOL: Pattern = Seq(&[Any(one(cat::SYMBOL)), Opt(&Any(one(cat::N)))]);
    const MATRA_GROUP: Pattern = Seq(&[
        UpTo(3, &Any(Z)),
        Alt(&[
            Any(one(cat::M)),
            Seq(&[Opt(&Any(one(cat::SM))), Any(one(cat::MPST))]),
        ]),
        Opt(&Any(one(cat::N))),
        Opt(&Any(one(cat::H))),
    ]);
    const SYLLABLE_TAIL: Pattern = Seq(&[
        Opt(&Seq(&[
            Opt(&Any(Z)),
            Any(one(cat::SM)),
            Opt(&Any(one(cat::SM))),
            Opt(&Any(one(cat::ZWNJ))),
        ])),
        Star(&Any(A)),
    ]);
    const HALANT_GROUP: Pattern = Seq(&[
        Opt(&Any(Z)),
        Any(one(cat::H)),
        Opt(&Seq(&[Any(one(cat::ZWJ)), Opt(&Any(one(cat::N)))])),
    ]);
    const FINAL_HALANT_GROUP: Pattern =
        Alt(&[HALANT_GROUP, Seq(&[Any(one(cat::H)), Any(one(cat::ZWNJ))])]);
    const HALANT_OR_MATRA_GROUP: Pattern = Alt(&[FINAL_HALANT_GROUP, Star(&MATRA_GROUP)]);
    const COMPLEX_SYLLABLE_TAIL: Pattern = Seq(&[
        Star(&Seq(&[HALANT_GROUP, CN])),
        Opt(&Any(one(cat::CM))),
        HALANT_OR_MATRA_GROUP,
        SYLLABLE_TAIL,
    ]);

    const REPHA_OR_CS: CategorySet = one(cat::REPHA) | one(cat::CS);

    pub(super) const INDIC: Grammar = Grammar {
        rules: &[
            Rule {
                pattern: Seq(&[Opt(&Any(REPHA_OR_CS)), CN, COMPLEX_SYLLABLE_TAIL]),
                kind: SyllableType::Consonant as u8,
            },
            Rule {
                pattern: Seq(&[
                    Opt(&REPH),
                    Any(one(cat::V)),
                    Opt(&N),
                    Alt(&[Any(one(cat::ZWJ)), COMPLEX_SYLLABLE_TAIL]),
                ]),
                kind: SyllableType::Vowel as u8,
            },
            Rule {
                pattern: Seq(&[
                    Alt(&[
                        Seq(&[Opt(&Any(REPHA_OR_CS)), Any(one(cat::PLACEHOLDER))]),
                        Seq(&[Opt(&REPH), Any(one(cat::DOTTEDCIRCLE))]),
                    ]),
                    Opt(&N),
                    COMPLEX_SYLLABLE_TAIL,
                ]),
                kind: SyllableType::Standalone as u8,
            },
            Rule {
                pattern: Seq(&[SYMBOL, SYLLABLE_TAIL]),
                kind: SyllableType::Symbol as u8,
            },
            Rule {
                pattern: Seq(&[Opt(&REPH), Opt(&N), COMPLEX_SYLLABLE_TAIL]),
                kind: SyllableType::Broken as u8,
            },
        ],
        fallback: SyllableType::NonIndic as u8,
    };
}

const fn flags(a: FeatureFlags, b: FeatureFlags) -> FeatureFlags {
    a.union(b)
}

const INDIC_FEATURES: &[(Tag, FeatureFlags)] = &[
    // Basic features, applied in order one at a time after the initial
    // reordering, constrained to the syllable.
    (feature::NUKTA_FORMS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::AKHANDS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::REPH_FORMS, flags(FeatureFlags::MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::RAKAR_FORMS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::PRE_BASE_FORMS, flags(FeatureFlags::MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::BELOW_BASE_FORMS, flags(FeatureFlags::MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::ABOVE_BASE_FORMS, flags(FeatureFlags::MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::HALF_FORMS, flags(FeatureFlags::MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::POST_BASE_FORMS, flags(FeatureFlags::MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::VATTU_VARIANTS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::CONJUNCT_FORMS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    // Other features, applied all at once after the final reordering.
    (feature::INITIAL_FORMS, flags(FeatureFlags::MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::PRE_BASE_SUBSTITUTIONS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::ABOVE_BASE_SUBSTITUTIONS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::BELOW_BASE_SUBSTITUTIONS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::POST_BASE_SUBSTITUTIONS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
    (feature::HALANT_FORMS, flags(FeatureFlags::GLOBAL_MANUAL_JOINERS, FeatureFlags::PER_SYLLABLE)),
];

const BASIC_FEATURES: usize = 11;

// Indices into `INDIC_FEATURES` of the features that get per-glyph masks.
mod indic_feature {
    pub const RPHF: usize = 2;
    pub const PREF: usize = 4;
    pub const BLWF: usize = 5;
    pub const ABVF: usize = 6;
    pub const HALF: usize = 7;
    pub const PSTF: usize = 8;
    pub const INIT: usize = 11;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum RephPosition {
    AfterMain,
    BeforeSub,
    AfterSub,
    BeforePost,
    AfterPost,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum RephMode {
    /// Reph formed out of initial Ra,H sequence.
    Implicit,
    /// Reph formed out of initial Ra,H,ZWJ sequence.
    Explicit,
    /// Encoded Repha character, needs reordering.
    LogRepha,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum BlwfMode {
    /// Below-forms feature applied to pre-base and post-base.
    PreAndPost,
    /// Below-forms feature applied to post-base only.
    PostOnly,
}

#[derive(Clone, Copy, Debug)]
struct IndicConfig {
    script: Option<Script>,
    has_old_spec: bool,
    virama: u32,
    reph_pos: RephPosition,
    reph_mode: RephMode,
    blwf_mode: BlwfMode,
}

impl IndicConfig {
    const fn new(
        script: Option<Script>,
        has_old_spec: bool,
        virama: u32,
        reph_pos: RephPosition,
        reph_mode: RephMode,
        blwf_mode: BlwfMode,
    ) -> Self {
        IndicConfig {
            script,
            has_old_spec,
            virama,
            reph_pos,
            reph_mode,
            blwf_mode,
        }
    }

    fn for_script(script: Option<Script>) -> Self {
        INDIC_CONFIGS[1..]
            .iter()
            .find(|c| c.script == script)
            .copied()
            .unwrap_or(INDIC_CONFIGS[0])
    }
}

#[rustfmt::skip]
const INDIC_CONFIGS: &[IndicConfig] = &[
    IndicConfig::new(None, false, 0, RephPosition::BeforePost, RephMode::Implicit, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::DEVANAGARI), true, 0x094D, RephPosition::BeforePost, RephMode::Implicit, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::BENGALI), true, 0x09CD, RephPosition::AfterSub, RephMode::Implicit, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::GURMUKHI), true, 0x0A4D, RephPosition::BeforeSub, RephMode::Implicit, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::GUJARATI), true, 0x0ACD, RephPosition::BeforePost, RephMode::Implicit, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::ORIYA), true, 0x0B4D, RephPosition::AfterMain, RephMode::Implicit, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::TAMIL), true, 0x0BCD, RephPosition::AfterPost, RephMode::Implicit, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::TELUGU), true, 0x0C4D, RephPosition::AfterPost, RephMode::Explicit, BlwfMode::PostOnly),
    IndicConfig::new(Some(script::KANNADA), true, 0x0CCD, RephPosition::AfterPost, RephMode::Implicit, BlwfMode::PostOnly),
    IndicConfig::new(Some(script::MALAYALAM), true, 0x0D4D, RephPosition::AfterMain, RephMode::LogRepha, BlwfMode::PreAndPost),
    IndicConfig::new(Some(script::SINHALA), false, 0x0DCA, RephPosition::AfterPost, RephMode::Explicit, BlwfMode::PreAndPost),
];

struct IndicPlan {
    config: IndicConfig,
    is_old_spec: bool,
    virama_glyph: Option<u32>,
    machine: Machine,
    rphf: WouldSubstituteFeature,
    pref: WouldSubstituteFeature,
    blwf: WouldSubstituteFeature,
    pstf: WouldSubstituteFeature,
    vatu: WouldSubstituteFeature,
    mask_array: [Mask; INDIC_FEATURES.len()],
}

impl IndicPlan {
    fn new(plan: &ShapePlan, font: &Font) -> Self {
        let script = plan.script;
        let config = IndicConfig::for_script(script);

        let is_old_spec = config.has_old_spec
            && plan
                .ot_map
                .chosen_script(TableIndex::GSUB)
                .map_or(true, |tag| tag.to_bytes()[3] != b'2');

        // New-spec fonts match without context. Old-spec Malayalam fonts
        // were observed to rely on context, other old-spec fonts do not.
        let zero_context = is_old_spec && script != Some(script::MALAYALAM);

        let mut mask_array = [0; INDIC_FEATURES.len()];
        for (mask, &(tag, flags)) in mask_array.iter_mut().zip(INDIC_FEATURES) {
            *mask = if flags.contains(FeatureFlags::GLOBAL) {
                0
            } else {
                plan.ot_map.get_1_mask(tag)
            };
        }

        let virama_glyph = char::from_u32(config.virama).and_then(|c| font.glyph(c));

        IndicPlan {
            config,
            is_old_spec,
            virama_glyph,
            machine: Machine::new(&grammar::INDIC),
            rphf: WouldSubstituteFeature::new(feature::REPH_FORMS, zero_context),
            pref: WouldSubstituteFeature::new(feature::PRE_BASE_FORMS, zero_context),
            blwf: WouldSubstituteFeature::new(feature::BELOW_BASE_FORMS, zero_context),
            pstf: WouldSubstituteFeature::new(feature::POST_BASE_FORMS, zero_context),
            vatu: WouldSubstituteFeature::new(feature::VATTU_VARIANTS, zero_context),
            mask_array,
        }
    }

    fn mask(&self, feature: usize) -> Mask {
        self.mask_array[feature]
    }
}

impl ComplexShaper for IndicShaper {
    fn collect_features(&self, planner: &mut ShapePlanner) {
        let map = &mut planner.ot_map;

        // Do this before any lookups have been applied.
        map.add_gsub_pause(Some(setup_syllables));

        map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::PER_SYLLABLE, 1);
        // `ccmp` is not part of the Indic model, but fonts that use it
        // expect it early.
        map.enable_feature(feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::PER_SYLLABLE, 1);

        map.add_gsub_pause(Some(initial_reordering));

        for &(tag, flags) in &INDIC_FEATURES[..BASIC_FEATURES] {
            map.add_feature(tag, flags, 1);
            map.add_gsub_pause(None);
        }

        map.add_gsub_pause(Some(final_reordering));

        for &(tag, flags) in &INDIC_FEATURES[BASIC_FEATURES..] {
            map.add_feature(tag, flags, 1);
        }
    }

    fn override_features(&self, planner: &mut ShapePlanner) {
        planner.ot_map.disable_feature(feature::STANDARD_LIGATURES);
        planner.ot_map.add_gsub_pause(None);
    }

    fn create_data(&self, plan: &ShapePlan, font: &Font) -> Option<Box<dyn Any + Send + Sync>> {
        Some(Box::new(IndicPlan::new(plan, font)))
    }

    fn normalization_preference(&self) -> NormalizationMode {
        NormalizationMode::ComposedDiacriticsNoShortCircuit
    }

    fn decompose(&self, _: &NormalizeContext, ab: char) -> Option<(char, Option<char>)> {
        match ab {
            // DEVANAGARI LETTER RRA, BENGALI LETTER RRA and RHA, TAMIL LETTER AU
            '\u{0931}' | '\u{09DC}' | '\u{09DD}' | '\u{0B94}' => None,
            _ => unicode::decompose(ab),
        }
    }

    fn compose(&self, _: &NormalizeContext, a: char, b: char) -> Option<char> {
        // Keep split matras apart.
        if unicode::CharExt::general_category(a).is_mark() {
            return None;
        }

        // BENGALI LETTER YYA is a composition exclusion fonts still expect.
        if a == '\u{09AF}' && b == '\u{09BC}' {
            return Some('\u{09DF}');
        }

        unicode::compose(a, b)
    }

    fn setup_masks(&self, _: &ShapePlan, _: &Font, buffer: &mut Buffer) {
        // Masks depend on the syllable structure, so they are set up later
        // in a pause. Only remember the character properties here.
        for info in buffer.info_slice_mut() {
            let (category, position) = indic_properties(info.glyph_id);
            info.set_syllabic_category(category);
            info.set_syllabic_position(position);
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
    if let Some(indic_plan) = plan.data::<IndicPlan>() {
        segment(&indic_plan.machine, buffer, SyllableType::Broken as u8);
    }
}

fn initial_reordering(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    let Some(indic_plan) = plan.data::<IndicPlan>() else {
        return;
    };

    update_consonant_positions(plan, indic_plan, font, buffer);
    insert_dotted_circles(
        font,
        buffer,
        SyllableType::Broken as u8,
        cat::DOTTEDCIRCLE,
        Some(cat::REPHA),
        Some(pos::END),
    );

    let mut start = 0;
    let mut end = buffer.next_syllable(0);
    while start < buffer.len {
        initial_reordering_syllable(plan, indic_plan, font, start, end, buffer);
        start = end;
        end = buffer.next_syllable(start);
    }
}

fn update_consonant_positions(plan: &ShapePlan, indic_plan: &IndicPlan, font: &Font, buffer: &mut Buffer) {
    let Some(virama) = indic_plan.virama_glyph else {
        return;
    };

    for info in buffer.info_slice_mut() {
        if info.syllabic_position() == pos::BASE_C {
            let consonant = info.glyph_id;
            info.set_syllabic_position(consonant_position_from_font(plan, indic_plan, font, consonant, virama));
        }
    }
}

fn consonant_position_from_font(
    plan: &ShapePlan,
    indic_plan: &IndicPlan,
    font: &Font,
    consonant: u32,
    virama: u32,
) -> u8 {
    // Old-spec fonts order Consonant,Virama and new-spec ones Virama,Consonant,
    // but some fonts copied old-spec lookups into new-spec tables. Match both.
    let either_order = |feature: &WouldSubstituteFeature| {
        feature.would_substitute(plan, font, &[virama, consonant])
            || feature.would_substitute(plan, font, &[consonant, virama])
    };

    if either_order(&indic_plan.blwf) || either_order(&indic_plan.vatu) {
        return pos::BELOW_C;
    }

    if either_order(&indic_plan.pstf) || either_order(&indic_plan.pref) {
        return pos::POST_C;
    }

    pos::BASE_C
}

fn initial_reordering_syllable(
    plan: &ShapePlan,
    indic_plan: &IndicPlan,
    font: &Font,
    start: usize,
    end: usize,
    buffer: &mut Buffer,
) {
    match SyllableType::from_syllable(buffer.info[start].syllable()) {
        // Vowels look like consonants, and dotted circles were already
        // inserted into broken clusters, so they all share one path.
        SyllableType::Vowel | SyllableType::Consonant | SyllableType::Broken | SyllableType::Standalone => {
            initial_reordering_consonant_syllable(plan, indic_plan, font, start, end, buffer);
        }
        SyllableType::Symbol | SyllableType::NonIndic => {}
    }
}

/// Finds the base consonant of `start..end` and whether the syllable starts
/// with a reph. Returns `(base, has_reph)`.
fn find_base(
    plan: &ShapePlan,
    indic_plan: &IndicPlan,
    font: &Font,
    start: usize,
    end: usize,
    buffer: &Buffer,
) -> (usize, bool) {
    let info = &buffer.info;
    let mut base = end;
    let mut has_reph = false;

    // If the syllable starts with Ra + Halant (in a script that has Reph)
    // and has more than one consonant, Ra is excluded from candidates for
    // base consonants.
    let mut limit = start;
    let reph_mode = indic_plan.config.reph_mode;
    if indic_plan.mask(indic_feature::RPHF) != 0
        && start + 3 <= end
        && ((reph_mode == RephMode::Implicit && !info[start + 2].is_syllabic_joiner())
            || (reph_mode == RephMode::Explicit && info[start + 2].syllabic_category() == cat::ZWJ))
    {
        let glyphs = [info[start].glyph_id, info[start + 1].glyph_id, info[start + 2].glyph_id];
        if indic_plan.rphf.would_substitute(plan, font, &glyphs[..2])
            || (reph_mode == RephMode::Explicit && indic_plan.rphf.would_substitute(plan, font, &glyphs))
        {
            limit += 2;
            while limit < end && info[limit].is_syllabic_joiner() {
                limit += 1;
            }
            base = start;
            has_reph = true;
        }
    } else if reph_mode == RephMode::LogRepha && info[start].syllabic_category() == cat::REPHA {
        limit += 1;
        while limit < end && info[limit].is_syllabic_joiner() {
            limit += 1;
        }
        base = start;
        has_reph = true;
    }

    // Starting from the end of the syllable, move backwards until a consonant
    // is found that does not have a below-base or post-base form (post-base
    // forms have to follow below-base forms), or arrive at the first
    // consonant. Pre-base-reordering Ra is marked POST_C and skipped too.
    let mut i = end;
    let mut seen_below = false;
    loop {
        i -= 1;
        if info[i].is_consonant() {
            let position = info[i].syllabic_position();
            if position != pos::BELOW_C && (position != pos::POST_C || seen_below) {
                base = i;
                break;
            }

            if position == pos::BELOW_C {
                seen_below = true;
            }

            base = i;
        } else if start < i
            && info[i].syllabic_category() == cat::ZWJ
            && info[i - 1].syllabic_category() == cat::H
        {
            // A ZWJ after a Halant stops the base search and requests an
            // explicit half form. A ZWJ before a Halant requests a subjoined
            // form instead, so the search goes on.
            break;
        }

        if i <= limit {
            break;
        }
    }

    // Without another consonant the Ra is the base and no reph forms.
    // Only for unforced reph, not Ra,H,ZWJ.
    if has_reph && base == start && limit - base <= 2 {
        has_reph = false;
    }

    (base, has_reph)
}

fn initial_reordering_consonant_syllable(
    plan: &ShapePlan,
    indic_plan: &IndicPlan,
    font: &Font,
    start: usize,
    end: usize,
    buffer: &mut Buffer,
) {
    // Kannada Ra,H,ZWJ behaves like Ra,ZWJ,H for compatibility with legacy usage.
    if buffer.script == Some(script::KANNADA)
        && start + 3 <= end
        && buffer.info[start].is_one_of(category_flag(cat::RA))
        && buffer.info[start + 1].is_one_of(category_flag(cat::H))
        && buffer.info[start + 2].is_one_of(category_flag(cat::ZWJ))
    {
        buffer.merge_clusters(start + 1, start + 3);
        buffer.info.swap(start + 1, start + 2);
    }

    let (mut base, has_reph) = find_base(plan, indic_plan, font, start, end, buffer);

    // Matras were already decomposed by the normalizer, and nukta/halant
    // pairs put in canonical order.

    for info in &mut buffer.info[start..base] {
        let position = info.syllabic_position();
        info.set_syllabic_position(cmp::min(pos::PRE_C, position));
    }

    if base < end {
        buffer.info[base].set_syllabic_position(pos::BASE_C);
    }

    if has_reph {
        buffer.info[start].set_syllabic_position(pos::RA_TO_BECOME_REPH);
    }

    // For old-spec fonts, move the first post-base Halant after the last
    // consonant. Kannada does this only when no Halant is there already.
    if indic_plan.is_old_spec {
        let disallow_double_halants = buffer.script == Some(script::KANNADA);
        for i in base + 1..end {
            if buffer.info[i].syllabic_category() == cat::H {
                let mut j = end - 1;
                while j > i {
                    if buffer.info[j].is_consonant()
                        || (disallow_double_halants && buffer.info[j].syllabic_category() == cat::H)
                    {
                        break;
                    }

                    j -= 1;
                }

                if buffer.info[j].syllabic_category() != cat::H && j > i {
                    buffer.info[i..=j].rotate_left(1);
                }

                break;
            }
        }
    }

    attach_misc_marks(start, end, buffer);

    // Post-base consonants own anything before them since the last
    // consonant or matra.
    {
        let mut last = base;
        for i in base + 1..end {
            if buffer.info[i].is_consonant() {
                let position = buffer.info[i].syllabic_position();
                for j in last + 1..i {
                    if buffer.info[j].syllabic_position() < pos::SMVD {
                        buffer.info[j].set_syllabic_position(position);
                    }
                }

                last = i;
            } else if buffer.info[i].syllabic_category() == cat::M {
                last = i;
            }
        }
    }

    base = sort_syllable(indic_plan, start, end, buffer);

    setup_syllable_masks(indic_plan, start, end, base, buffer);

    if indic_plan.is_old_spec && buffer.script == Some(script::DEVANAGARI) {
        // Old-spec eyelash Ra: 'blwf' applies to a Ra,H below half forms as
        // well, unless a ZWJ asks for the eyelash form explicitly.
        for i in start..base.saturating_sub(1) {
            if buffer.info[i].syllabic_category() == cat::RA
                && buffer.info[i + 1].syllabic_category() == cat::H
                && (i + 2 == base || buffer.info[i + 2].syllabic_category() != cat::ZWJ)
            {
                buffer.info[i].mask |= indic_plan.mask(indic_feature::BLWF);
                buffer.info[i + 1].mask |= indic_plan.mask(indic_feature::BLWF);
            }
        }
    }

    let pref_len = 2;
    if indic_plan.mask(indic_feature::PREF) != 0 && base + pref_len < end {
        // Find a Halant,Ra sequence and mark it for pre-base reordering.
        for i in base + 1..end - pref_len + 1 {
            let glyphs = [buffer.info[i].glyph_id, buffer.info[i + 1].glyph_id];
            if indic_plan.pref.would_substitute(plan, font, &glyphs) {
                buffer.info[i].mask |= indic_plan.mask(indic_feature::PREF);
                buffer.info[i + 1].mask |= indic_plan.mask(indic_feature::PREF);
                break;
            }
        }
    }

    // ZWJ and ZWNJ disable 'cjct' just by being there, since that feature
    // does not skip joiners. A ZWNJ also disables 'half'.
    for i in start + 1..end {
        if buffer.info[i].is_syllabic_joiner() {
            let non_joiner = buffer.info[i].syllabic_category() == cat::ZWNJ;
            let mut j = i;
            loop {
                j -= 1;

                if non_joiner {
                    buffer.info[j].mask &= !indic_plan.mask(indic_feature::HALF);
                }

                if j <= start || buffer.info[j].is_consonant() {
                    break;
                }
            }
        }
    }
}

/// Gives joiners, nuktas, halants and medials the position of the
/// character before them, so they move together.
fn attach_misc_marks(start: usize, end: usize, buffer: &mut Buffer) {
    const ATTACHED: u32 = category_flag(cat::ZWJ)
        | category_flag(cat::ZWNJ)
        | category_flag(cat::N)
        | category_flag(cat::RS)
        | category_flag(cat::CM)
        | category_flag(cat::H);

    let mut last_pos = pos::START;
    for i in start..end {
        if rb_flag_unsafe(u32::from(buffer.info[i].syllabic_category())) & ATTACHED != 0 {
            buffer.info[i].set_syllabic_position(last_pos);

            if buffer.info[i].syllabic_category() == cat::H && buffer.info[i].syllabic_position() == pos::PRE_M {
                // A Halant does not move with a left matra.
                for j in (start + 1..=i).rev() {
                    if buffer.info[j - 1].syllabic_position() != pos::PRE_M {
                        let position = buffer.info[j - 1].syllabic_position();
                        buffer.info[i].set_syllabic_position(position);
                        break;
                    }
                }
            }
        } else if buffer.info[i].syllabic_position() != pos::SMVD {
            last_pos = buffer.info[i].syllabic_position();
        }
    }
}

/// Stable-sorts the syllable by position and returns the new base.
///
/// Clusters are merged only for glyphs that crossed the base; pre-base
/// glyphs are merged in the final reordering.
fn sort_syllable(indic_plan: &IndicPlan, start: usize, end: usize, buffer: &mut Buffer) -> usize {
    // The syllable field tracks the original index while sorting. It is one
    // byte wide and 255 marks a visited glyph.
    let track_moves = !indic_plan.is_old_spec && end - start <= 127;
    let syllable = buffer.info[start].syllable();
    for (i, info) in buffer.info[start..end].iter_mut().enumerate() {
        info.set_syllable(i as u8);
    }

    buffer.info[start..end].sort_by_key(|info| info.syllabic_position());
    buffer.spend_ops(end - start);

    let base = buffer.info[start..end]
        .iter()
        .position(|info| info.syllabic_position() == pos::BASE_C)
        .map_or(end, |i| start + i);

    // Post-base glyphs may shuffle around freely. Old-spec fonts move
    // halants around, so everything after the base is merged there.
    if !track_moves {
        buffer.merge_clusters(base, end);
    } else {
        for i in base..end {
            if buffer.info[i].syllable() == 255 {
                continue;
            }

            let mut min = i;
            let mut max = i;
            let mut j = start + usize::from(buffer.info[i].syllable());
            while j != i {
                min = cmp::min(min, j);
                max = cmp::max(max, j);
                let next = start + usize::from(buffer.info[j].syllable());
                buffer.info[j].set_syllable(255);
                j = next;
            }

            buffer.merge_clusters(cmp::max(base, min), max + 1);
        }
    }

    for info in &mut buffer.info[start..end] {
        info.set_syllable(syllable);
    }

    base
}

fn setup_syllable_masks(indic_plan: &IndicPlan, start: usize, end: usize, base: usize, buffer: &mut Buffer) {
    // Reph
    for info in &mut buffer.info[start..end] {
        if info.syllabic_position() != pos::RA_TO_BECOME_REPH {
            break;
        }

        info.mask |= indic_plan.mask(indic_feature::RPHF);
    }

    // Pre-base
    let mut mask = indic_plan.mask(indic_feature::HALF);
    if !indic_plan.is_old_spec && indic_plan.config.blwf_mode == BlwfMode::PreAndPost {
        mask |= indic_plan.mask(indic_feature::BLWF);
    }

    for info in &mut buffer.info[start..base] {
        info.mask |= mask;
    }

    // Post-base
    let mask = indic_plan.mask(indic_feature::BLWF)
        | indic_plan.mask(indic_feature::ABVF)
        | indic_plan.mask(indic_feature::PSTF);
    if base < end {
        for info in &mut buffer.info[base + 1..end] {
            info.mask |= mask;
        }
    }
}

fn final_reordering(plan: &ShapePlan, font: &Font, buffer: &mut Buffer) {
    let Some(indic_plan) = plan.data::<IndicPlan>() else {
        return;
    };

    if buffer.is_empty() {
        return;
    }

    let mut start = 0;
    let mut end = buffer.next_syllable(0);
    while start < buffer.len {
        final_reordering_syllable(indic_plan, font, start, end, buffer);
        start = end;
        end = buffer.next_syllable(start);
    }
}

fn ligated_and_didnt_multiply(info: &GlyphInfo) -> bool {
    info.is_ligated() && !info.is_multiplied()
}

fn final_reordering_syllable(indic_plan: &IndicPlan, _: &Font, start: usize, end: usize, buffer: &mut Buffer) {
    // Ligation and multiple substitution may have lost the halant category
    // of a virama glyph. Recover it, since the rest relies on halants.
    if let Some(virama) = indic_plan.virama_glyph {
        for info in &mut buffer.info[start..end] {
            if info.glyph_id == virama && info.is_ligated() && info.is_multiplied() {
                info.set_syllabic_category(cat::H);
                info.clear_ligated_and_multiplied();
            }
        }
    }

    let pref_mask = indic_plan.mask(indic_feature::PREF);
    let mut try_pref = pref_mask != 0;

    let mut base = find_final_base(buffer, start, end, pref_mask, &mut try_pref);

    // Move a pre-base matra after the last standalone halant, so that it
    // sits right before the main consonant or its half forms.
    if start + 1 < end && start < base {
        base = reorder_pre_base_matras(buffer, start, end, base);
    }

    // Reph starts at the syllable start. A reph made of Ra,H moves only if it
    // ligated, an encoded Repha only if it did not: in that case the font
    // handles it without reordering.
    if start + 1 < end
        && buffer.info[start].syllabic_position() == pos::RA_TO_BECOME_REPH
        && ((buffer.info[start].syllabic_category() == cat::REPHA)
            ^ ligated_and_didnt_multiply(&buffer.info[start]))
    {
        let new_reph_pos = find_reph_position(indic_plan, buffer, start, end, base);

        buffer.merge_clusters(start, new_reph_pos + 1);
        buffer.move_glyph_forward(start, new_reph_pos);

        if start < base && base <= new_reph_pos {
            base -= 1;
        }
    }

    if try_pref && base + 1 < end {
        reorder_pre_base_consonant(buffer, start, end, base, pref_mask);
    }

    // Apply 'init' to the left matra at the start of a word.
    if buffer.info[start].syllabic_position() == pos::PRE_M {
        if start == 0 || !is_word_character(buffer.info[start - 1].general_category()) {
            buffer.info[start].mask |= indic_plan.mask(indic_feature::INIT);
        } else {
            buffer.unsafe_to_break(start - 1, start + 1);
        }
    }
}

fn is_word_character(gc: GeneralCategory) -> bool {
    matches!(
        gc,
        GeneralCategory::Format
            | GeneralCategory::Unassigned
            | GeneralCategory::PrivateUse
            | GeneralCategory::Surrogate
            | GeneralCategory::SpacingMark
            | GeneralCategory::EnclosingMark
            | GeneralCategory::NonspacingMark
    ) || gc.is_letter()
}

fn find_final_base(buffer: &mut Buffer, start: usize, end: usize, pref_mask: Mask, try_pref: &mut bool) -> usize {
    let mut base = start;
    while base < end {
        if buffer.info[base].syllabic_position() >= pos::BASE_C {
            if *try_pref && base + 1 < end {
                for i in base + 1..end {
                    if buffer.info[i].mask & pref_mask != 0 {
                        if !(buffer.info[i].is_substituted() && ligated_and_didnt_multiply(&buffer.info[i])) {
                            // A 'pref' candidate that did not form: the base
                            // is around here.
                            base = i;
                            while base < end && buffer.info[base].is_halant() {
                                base += 1;
                            }

                            if base < end {
                                buffer.info[base].set_syllabic_position(pos::BASE_C);
                            }

                            *try_pref = false;
                        }

                        break;
                    }
                }
            }

            // Malayalam skips over unformed below (but not post) forms.
            if buffer.script == Some(script::MALAYALAM) {
                let mut i = base + 1;
                while i < end {
                    while i < end && buffer.info[i].is_syllabic_joiner() {
                        i += 1;
                    }

                    if i == end || !buffer.info[i].is_halant() {
                        break;
                    }

                    i += 1; // Skip halant.

                    while i < end && buffer.info[i].is_syllabic_joiner() {
                        i += 1;
                    }

                    if i < end
                        && buffer.info[i].is_consonant()
                        && buffer.info[i].syllabic_position() == pos::BELOW_C
                    {
                        base = i;
                        buffer.info[base].set_syllabic_position(pos::BASE_C);
                    }

                    i += 1;
                }
            }

            if start < base && base < end && buffer.info[base].syllabic_position() > pos::BASE_C {
                base -= 1;
            }

            break;
        }

        base += 1;
    }

    if base == end && start < base && buffer.info[base - 1].is_one_of(category_flag(cat::ZWJ)) {
        base -= 1;
    }

    if base < end {
        while start < base && buffer.info[base].is_one_of(category_flag(cat::N) | category_flag(cat::H)) {
            base -= 1;
        }
    }

    base
}

/// Moves pre-base matras towards the base and returns the updated base.
///
/// The target is after the last halant before the base, unless a ZWJ
/// follows that halant. Malayalam and Tamil have no half forms; what the
/// 'half' feature made there are chillus, and matras go after them.
fn reorder_pre_base_matras(buffer: &mut Buffer, start: usize, end: usize, mut base: usize) -> usize {
    // If we lost track of the base, position before the last glyph.
    let mut new_pos = if base == end { base - 2 } else { base - 1 };

    if buffer.script != Some(script::MALAYALAM) && buffer.script != Some(script::TAMIL) {
        loop {
            while new_pos > start
                && !buffer.info[new_pos].is_one_of(category_flag(cat::M) | category_flag(cat::H))
            {
                new_pos -= 1;
            }

            // Only a halant that does not belong to the matra itself counts.
            if buffer.info[new_pos].is_halant() && buffer.info[new_pos].syllabic_position() != pos::PRE_M {
                if new_pos + 1 < end && buffer.info[new_pos + 1].syllabic_category() == cat::ZWJ && new_pos > start {
                    new_pos -= 1;
                    continue;
                }
            } else {
                new_pos = start;
            }

            break;
        }
    }

    if start < new_pos && buffer.info[new_pos].syllabic_position() != pos::PRE_M {
        // Now go see if there are actually any matras.
        for i in (start + 1..=new_pos).rev() {
            if buffer.info[i - 1].syllabic_position() == pos::PRE_M {
                let old_pos = i - 1;
                if old_pos < base && base <= new_pos {
                    base -= 1;
                }

                buffer.move_glyph_forward(old_pos, new_pos);

                // Merged after moving on purpose.
                buffer.merge_clusters(new_pos, cmp::min(end, base + 1));

                new_pos -= 1;
            }
        }
    } else {
        for i in start..base {
            if buffer.info[i].syllabic_position() == pos::PRE_M {
                buffer.merge_clusters(i, cmp::min(end, base + 1));
                break;
            }
        }
    }

    base
}

/// Finds the index the reph at `start` moves to, trying the rules for the
/// script's reph position in order.
fn find_reph_position(indic_plan: &IndicPlan, buffer: &Buffer, start: usize, end: usize, base: usize) -> usize {
    let info = &buffer.info;
    let reph_pos = indic_plan.config.reph_pos;

    // After the first explicit halant between the reph and the base, and
    // after a joiner following it.
    let after_first_halant = || {
        let mut new_reph_pos = start + 1;
        while new_reph_pos < base && !info[new_reph_pos].is_halant() {
            new_reph_pos += 1;
        }

        if new_reph_pos < base && info[new_reph_pos].is_halant() {
            if new_reph_pos + 1 < base && info[new_reph_pos + 1].is_syllabic_joiner() {
                new_reph_pos += 1;
            }

            return Some(new_reph_pos);
        }

        None
    };

    if reph_pos != RephPosition::AfterPost {
        if let Some(new_reph_pos) = after_first_halant() {
            return new_reph_pos;
        }

        // After the main consonant and anything attached to it.
        if reph_pos == RephPosition::AfterMain {
            let mut new_reph_pos = base;
            while new_reph_pos + 1 < end && info[new_reph_pos + 1].syllabic_position() <= pos::AFTER_MAIN {
                new_reph_pos += 1;
            }

            if new_reph_pos < end {
                return new_reph_pos;
            }
        }

        // Before the first post-base consonant, matra or modifier.
        if reph_pos == RephPosition::AfterSub {
            let stop = rb_flag(u32::from(pos::POST_C)) | rb_flag(u32::from(pos::AFTER_POST)) | rb_flag(u32::from(pos::SMVD));
            let mut new_reph_pos = base;
            while new_reph_pos + 1 < end
                && rb_flag_unsafe(u32::from(info[new_reph_pos + 1].syllabic_position())) & stop == 0
            {
                new_reph_pos += 1;
            }

            if new_reph_pos < end {
                return new_reph_pos;
            }
        }
    }

    if let Some(new_reph_pos) = after_first_halant() {
        return new_reph_pos;
    }

    // Otherwise at the end of the syllable, before trailing modifiers.
    let mut new_reph_pos = end - 1;
    while new_reph_pos > start && info[new_reph_pos].syllabic_position() == pos::SMVD {
        new_reph_pos -= 1;
    }

    // A reph ending up after a Matra,Halant goes before that Halant so it can
    // interact with the matra. Not after a plain Consonant,Halant.
    if info[new_reph_pos].is_halant() {
        for i in base + 1..new_reph_pos {
            if info[i].syllabic_category() == cat::M {
                new_reph_pos -= 1;
            }
        }
    }

    new_reph_pos
}

/// Moves a pre-base-reordering consonant formed by 'pref' before the base.
fn reorder_pre_base_consonant(buffer: &mut Buffer, start: usize, end: usize, base: usize, pref_mask: Mask) {
    for i in base + 1..end {
        if buffer.info[i].mask & pref_mask == 0 {
            continue;
        }

        // Only a glyph that ligated is reordered; a font may block the
        // substitution in some contexts.
        if ligated_and_didnt_multiply(&buffer.info[i]) {
            // Same target as a pre-base matra, or right before the base.
            let mut new_pos = base;
            if buffer.script != Some(script::MALAYALAM) && buffer.script != Some(script::TAMIL) {
                while new_pos > start
                    && !buffer.info[new_pos - 1].is_one_of(category_flag(cat::M) | category_flag(cat::H))
                {
                    new_pos -= 1;
                }
            }

            if new_pos > start
                && buffer.info[new_pos - 1].is_halant()
                && new_pos < end
                && buffer.info[new_pos].is_syllabic_joiner()
            {
                new_pos += 1;
            }

            buffer.merge_clusters(new_pos, i + 1);
            buffer.move_glyph_back(i, new_pos);
        }

        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn categories(text: &[u32]) -> Vec<u8> {
        text.iter().map(|&u| indic_properties(u).0).collect()
    }

    fn syllable(text: &[u32]) -> (usize, SyllableType) {
        let machine = Machine::new(&grammar::INDIC);
        let (len, kind) = machine.match_syllable(categories(text).into_iter());
        (len, SyllableType::from_syllable(kind))
    }

    #[test]
    fn consonant_cluster_is_one_syllable() {
        // KA, VIRAMA, SSA, VOWEL SIGN I
        assert_eq!(syllable(&[0x0915, 0x094D, 0x0937, 0x093F]), (4, SyllableType::Consonant));
        // RA, VIRAMA, KA, ANUSVARA
        assert_eq!(syllable(&[0x0930, 0x094D, 0x0915, 0x0902]), (4, SyllableType::Consonant));
    }

    #[test]
    fn joiners_before_a_matra_are_bounded() {
        // KA, ZWNJ x3, VOWEL SIGN AA
        assert_eq!(
            syllable(&[0x0915, 0x200C, 0x200C, 0x200C, 0x093E]),
            (5, SyllableType::Consonant)
        );

        let zwnj = categories(&[0x200C])[0];
        let read = core::cell::Cell::new(0);
        let input = categories(&[0x0915])
            .into_iter()
            .chain(core::iter::repeat(zwnj).take(10_000))
            .inspect(|_| read.set(read.get() + 1));

        let (len, kind) = Machine::new(&grammar::INDIC).match_syllable(input);
        assert_eq!((len, SyllableType::from_syllable(kind)), (1, SyllableType::Consonant));
        assert!(read.get() < 8);
    }

    #[test]
    fn vowel_syllable() {
        // A, CANDRABINDU
        assert_eq!(syllable(&[0x0905, 0x0901]), (2, SyllableType::Vowel));
    }

    #[test]
    fn lone_matra_is_broken() {
        assert_eq!(syllable(&[0x093F, 0x0915]), (1, SyllableType::Broken));
    }

    #[test]
    fn dotted_circle_is_standalone() {
        assert_eq!(syllable(&[0x25CC, 0x093F]), (2, SyllableType::Standalone));
    }

    #[test]
    fn latin_is_not_indic() {
        assert_eq!(syllable(&[0x0041, 0x0915]), (1, SyllableType::NonIndic));
    }

    #[test]
    fn halant_zwnj_ends_a_syllable() {
        // KA, VIRAMA, ZWNJ, KA
        assert_eq!(syllable(&[0x0915, 0x094D, 0x200C, 0x0915]), (3, SyllableType::Consonant));
    }

    #[test]
    fn configs_fall_back_to_default() {
        assert_eq!(IndicConfig::for_script(Some(script::TELUGU)).reph_mode, RephMode::Explicit);
        assert_eq!(IndicConfig::for_script(Some(script::LATIN)).virama, 0);
    }

    #[test]
    fn feature_indices_match_table() {
        assert_eq!(INDIC_FEATURES[indic_feature::RPHF].0, feature::REPH_FORMS);
        assert_eq!(INDIC_FEATURES[indic_feature::HALF].0, feature::HALF_FORMS);
        assert_eq!(INDIC_FEATURES[indic_feature::PREF].0, feature::PRE_BASE_FORMS);
        assert_eq!(INDIC_FEATURES[indic_feature::BLWF].0, feature::BELOW_BASE_FORMS);
        assert_eq!(INDIC_FEATURES[indic_feature::ABVF].0, feature::ABOVE_BASE_FORMS);
        assert_eq!(INDIC_FEATURES[indic_feature::PSTF].0, feature::POST_BASE_FORMS);
        assert_eq!(INDIC_FEATURES[indic_feature::INIT].0, feature::INITIAL_FORMS);
    }

    #[test]
    fn word_characters() {
        assert!(is_word_character(GeneralCategory::OtherLetter));
        assert!(is_word_character(GeneralCategory::NonspacingMark));
        assert!(!is_word_character(GeneralCategory::SpaceSeparator));
    }
}
