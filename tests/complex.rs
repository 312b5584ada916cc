mod common;

use common::{shape, shape_with, shaper_kind, TestFont};
use otshape::{script, BufferFlags, ShaperKind};

fn arabic_font() -> TestFont {
    TestFont::new()
        .bases("\u{0628}\u{0627}")
        .substitution("isol", '\u{0628}', 100)
        .substitution("init", '\u{0628}', 101)
        .substitution("medi", '\u{0628}', 102)
        .substitution("fina", '\u{0628}', 103)
        .substitution("fina", '\u{0627}', 104)
}

#[test]
fn dispatch() {
    let font = TestFont::new();
    assert_eq!(shaper_kind(&font, script::LATIN), ShaperKind::Default);
    assert_eq!(shaper_kind(&font, script::ARABIC), ShaperKind::Arabic);
    assert_eq!(shaper_kind(&font, script::DEVANAGARI), ShaperKind::Indic);
    assert_eq!(shaper_kind(&font, script::HANGUL), ShaperKind::Hangul);
    assert_eq!(shaper_kind(&font, script::HEBREW), ShaperKind::Hebrew);
    assert_eq!(shaper_kind(&font, script::THAI), ShaperKind::Thai);
    assert_eq!(shaper_kind(&font, script::KHMER), ShaperKind::Khmer);
    assert_eq!(shaper_kind(&font, script::MYANMAR), ShaperKind::Myanmar);
}

#[test]
fn zawgyi_language_disables_myanmar_shaping() {
    let font = TestFont::new().bases("\u{1000}");
    let font = font.font();
    let props = otshape::SegmentProperties {
        direction: otshape::Direction::LeftToRight,
        script: Some(script::MYANMAR),
        language: Some("my-zawgyi".parse().unwrap()),
    };

    let plan = otshape::ShapePlan::new(&font, &props, &[]).unwrap();
    assert_eq!(plan.shaper_kind(), ShaperKind::MyanmarZawgyi);
}

#[test]
fn arabic_joining_forms() {
    let font = arabic_font();

    let out = shape(&font, "\u{0628}\u{0628}\u{0628}");
    assert_eq!(out.glyphs, [103, 102, 101]);
    assert_eq!(out.clusters, [4, 2, 0]);

    assert_eq!(shape(&font, "\u{0628}").glyphs, [100]);
}

#[test]
fn arabic_right_joining_letter_breaks_the_chain() {
    let font = arabic_font();

    // ALEF joins only to the right, so the BEH after it starts over.
    let out = shape(&font, "\u{0628}\u{0627}\u{0628}");
    assert_eq!(out.glyphs, [100, 104, 101]);
}

#[test]
fn arabic_transparent_marks_do_not_break_joining() {
    let font = arabic_font().marks("\u{064E}");

    let out = shape(&font, "\u{0628}\u{064E}\u{0628}");
    assert_eq!(out.glyphs, [103, font.glyph_of('\u{064E}'), 101]);
    assert_eq!(out.advances[1], 0);
}

#[test]
fn arabic_joining_across_context() {
    let font = arabic_font();

    let out = shape_with(&font, "\u{0628}", &[], |b| b.set_pre_context("\u{0628}"));
    assert_eq!(out.glyphs, [103]);

    let out = shape_with(&font, "\u{0628}", &[], |b| b.set_post_context("\u{0628}"));
    assert_eq!(out.glyphs, [101]);
}

fn hangul_font() -> TestFont {
    TestFont::new()
        .bases("\u{1112}\u{1161}\u{11AB}")
        .substitution("ljmo", '\u{1112}', 201)
        .substitution("vjmo", '\u{1161}', 202)
        .substitution("tjmo", '\u{11AB}', 203)
}

#[test]
fn hangul_syllable_decomposes_without_precomposed_glyph() {
    let font = hangul_font();
    let out = shape(&font, "\u{D55C}");

    assert_eq!(out.glyphs, [201, 202, 203]);
    assert_eq!(out.clusters, [0, 0, 0]);
}

#[test]
fn hangul_syllable_stays_whole_with_precomposed_glyph() {
    let font = hangul_font().bases("\u{D55C}");
    let syllable = font.glyph_of('\u{D55C}');

    assert_eq!(shape(&font, "\u{D55C}").glyphs, [syllable]);
    // Conjoining jamo compose into the same glyph.
    let out = shape(&font, "\u{1112}\u{1161}\u{11AB}");
    assert_eq!(out.glyphs, [syllable]);
    assert_eq!(out.clusters, [0]);
}

#[test]
fn indic_pre_base_matra_is_reordered() {
    let font = TestFont::new().bases("\u{0915}\u{093F}\u{25CC}");
    let ka = font.glyph_of('\u{0915}');
    let i = font.glyph_of('\u{093F}');

    let out = shape(&font, "\u{0915}\u{093F}");
    assert_eq!(out.glyphs, [i, ka]);
    assert_eq!(out.clusters, [0, 0]);
}

#[test]
fn indic_base_is_the_last_consonant() {
    let font = TestFont::new().bases("\u{0915}\u{094D}\u{0937}\u{093F}");
    let ka = font.glyph_of('\u{0915}');
    let virama = font.glyph_of('\u{094D}');
    let ssa = font.glyph_of('\u{0937}');
    let i = font.glyph_of('\u{093F}');

    // Without half forms the matra lands right after the virama,
    // in front of the base consonant.
    let out = shape(&font, "\u{0915}\u{094D}\u{0937}\u{093F}");
    assert_eq!(out.glyphs, [ka, virama, i, ssa]);
    assert!(out.clusters.iter().all(|&c| c == 0));
}

#[test]
fn indic_post_base_matra_stays_after_the_base() {
    let font = TestFont::new().bases("\u{0915}\u{094D}\u{0937}\u{093E}");
    let ka = font.glyph_of('\u{0915}');
    let virama = font.glyph_of('\u{094D}');
    let ssa = font.glyph_of('\u{0937}');
    let aa = font.glyph_of('\u{093E}');

    let out = shape(&font, "\u{0915}\u{094D}\u{0937}\u{093E}");
    assert_eq!(out.glyphs, [ka, virama, ssa, aa]);
}

#[test]
fn indic_long_joiner_run() {
    let font = TestFont::new().bases("\u{0915}");
    let text: String = core::iter::once('\u{0915}')
        .chain(core::iter::repeat('\u{200C}').take(20_000))
        .collect();

    let out = shape(&font, &text);
    assert!(out.successful);
    assert_eq!(out.glyphs.len(), 20_001);
    assert!(out.clusters.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn indic_broken_syllable_gets_a_dotted_circle() {
    let font = TestFont::new().bases("\u{0915}\u{093F}\u{25CC}");
    let i = font.glyph_of('\u{093F}');
    let dotted_circle = font.glyph_of('\u{25CC}');

    let out = shape(&font, "\u{093F}");
    assert_eq!(out.glyphs, [i, dotted_circle]);

    let out = shape_with(&font, "\u{093F}", &[], |b| {
        b.set_flags(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
    });
    assert_eq!(out.glyphs, [i]);
}

#[test]
fn thai_sara_am_is_decomposed() {
    let font = TestFont::new().bases("\u{0E01}\u{0E32}").marks("\u{0E4D}");
    let ko = font.glyph_of('\u{0E01}');
    let nikhahit = font.glyph_of('\u{0E4D}');
    let sara_aa = font.glyph_of('\u{0E32}');

    let out = shape(&font, "\u{0E01}\u{0E33}");
    assert_eq!(out.glyphs, [ko, nikhahit, sara_aa]);
    assert_eq!(out.clusters, [0, 0, 0]);
}

#[test]
fn khmer_pre_base_vowel_is_reordered() {
    let font = TestFont::new().bases("\u{1780}\u{17C1}");
    let ka = font.glyph_of('\u{1780}');
    let e = font.glyph_of('\u{17C1}');

    let out = shape(&font, "\u{1780}\u{17C1}");
    assert_eq!(out.glyphs, [e, ka]);
}

#[test]
fn myanmar_medial_ra_is_reordered() {
    let font = TestFont::new().bases("\u{1000}\u{103C}");
    let ka = font.glyph_of('\u{1000}');
    let medial_ra = font.glyph_of('\u{103C}');

    let out = shape(&font, "\u{1000}\u{103C}");
    assert_eq!(out.glyphs, [medial_ra, ka]);
}
