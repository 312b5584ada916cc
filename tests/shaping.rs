mod common;

use common::{shape, shape_with, TestFont, ADVANCE};
use otshape::{BufferFlags, BufferLimits, Direction, GlyphBuffer, UnicodeBuffer};

#[test]
fn simple_latin() {
    let font = TestFont::new().bases("abc");
    let out = shape(&font, "abc");

    assert_eq!(out.glyphs, [1, 2, 3]);
    assert_eq!(out.clusters, [0, 1, 2]);
    assert_eq!(out.advances, [ADVANCE; 3]);
    assert!(out.successful);
}

#[test]
fn advances_sum_to_the_font_metrics() {
    let font = TestFont::new().bases("ab").marks("\u{0301}\u{0308}");
    let out = shape(&font, "a\u{0301}b\u{0308}\u{0301}a");

    let total: i32 = out.advances.iter().sum();
    assert_eq!(total, 3 * ADVANCE);
}

#[test]
fn backend_kerning() {
    let font = TestFont::new().bases("ab").kern('a', 'b', -50);
    let out = shape(&font, "ab");

    assert_eq!(out.advances, [ADVANCE - 25, ADVANCE - 25]);
    assert_eq!(out.advances.iter().sum::<i32>(), 2 * ADVANCE - 50);
}

#[test]
fn kerning_can_be_disabled() {
    let font = TestFont::new().bases("ab").kern('a', 'b', -50);
    let out = shape_with(&font, "ab", &["-kern"], |_| {});

    assert_eq!(out.advances, [ADVANCE, ADVANCE]);
}

#[test]
fn composes_when_the_font_has_the_precomposed_glyph() {
    let font = TestFont::new().bases("e\u{00E9}").marks("\u{0301}");

    let decomposed = shape(&font, "e\u{0301}");
    assert_eq!(decomposed.glyphs, [font.glyph_of('\u{00E9}')]);

    // Normalization is idempotent: both spellings shape the same.
    let precomposed = shape(&font, "\u{00E9}");
    assert_eq!(decomposed, precomposed);
}

#[test]
fn decomposes_when_the_font_lacks_the_precomposed_glyph() {
    let font = TestFont::new().bases("e").marks("\u{0301}");
    let out = shape(&font, "\u{00E9}");

    assert_eq!(out.glyphs, [font.glyph_of('e'), font.glyph_of('\u{0301}')]);
    assert_eq!(out.clusters, [0, 0]);
}

#[test]
fn marks_are_reordered_by_combining_class() {
    // U+0323 (ccc 220) sorts before U+0301 (ccc 230).
    let font = TestFont::new().bases("a").marks("\u{0301}\u{0323}");
    let out = shape(&font, "a\u{0301}\u{0323}");

    assert_eq!(out.glyphs, [font.glyph_of('a'), font.glyph_of('\u{0323}'), font.glyph_of('\u{0301}')]);
    assert_eq!(out.clusters, [0, 0, 0]);
}

#[test]
fn clusters_are_monotone_forward() {
    let font = TestFont::new().bases("abc").marks("\u{0301}");
    let out = shape(&font, "ab\u{0301}c\u{0301}a");

    assert!(out.clusters.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn clusters_are_monotone_backward() {
    let font = TestFont::new().bases("\u{05D0}\u{05D1}\u{05D2}");
    let out = shape(&font, "\u{05D0}\u{05D1}\u{05D2}");

    assert_eq!(out.glyphs, [3, 2, 1]);
    assert_eq!(out.clusters, [4, 2, 0]);
}

#[test]
fn mirrored_in_rtl() {
    let font = TestFont::new().bases("\u{05D0}()");
    let out = shape(&font, "\u{05D0}(");

    assert_eq!(out.glyphs, [font.glyph_of(')'), font.glyph_of('\u{05D0}')]);
    assert_eq!(out.clusters, [2, 0]);
}

#[test]
fn forced_direction_reverses_output() {
    let font = TestFont::new().bases("ab");
    let out = shape_with(&font, "ab", &[], |b| b.set_direction(Direction::RightToLeft));

    assert_eq!(out.glyphs, [2, 1]);
    assert_eq!(out.clusters, [1, 0]);
}

#[test]
fn missing_glyphs_degrade_to_not_found() {
    let font = TestFont::new().bases("ab");

    let out = shape(&font, "a\u{2603}b");
    assert_eq!(out.glyphs, [1, 0, 2]);
    assert_eq!(out.clusters, [0, 1, 4]);
    assert!(out.successful);

    let out = shape_with(&font, "a\u{2603}b", &[], |b| b.set_not_found_glyph(77));
    assert_eq!(out.glyphs, [1, 77, 2]);
}

fn long_mark_run() -> String {
    core::iter::once('a').chain(core::iter::repeat('\u{0301}').take(600)).collect()
}

#[test]
fn long_mark_runs_stay_within_budget() {
    let font = TestFont::new().bases("a").marks("\u{0301}");
    // A handful of operations per character, nothing quadratic.
    let limits = BufferLimits {
        max_ops_factor: 8,
        max_ops_min: 0,
        ..BufferLimits::default()
    };
    let out = shape_with(&font, &long_mark_run(), &[], |b| b.set_limits(limits));

    assert!(out.successful);
    assert_eq!(out.glyphs.len(), 601);
    assert!(out.clusters.iter().all(|&c| c == 0));
}

#[test]
fn exhausted_budget_fails_the_run() {
    let font = TestFont::new().bases("a").marks("\u{0301}");
    let limits = BufferLimits {
        max_ops_factor: 0,
        max_ops_min: 1,
        ..BufferLimits::default()
    };

    let out = shape_with(&font, &long_mark_run(), &[], |b| b.set_limits(limits));
    assert!(!out.successful);

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(&long_mark_run());
    buffer.set_limits(limits);
    let result = otshape::shape_buffer(&font.font(), &[], buffer);
    assert!(matches!(result, Err(otshape::ShapeError::OperationBudgetExhausted)));
}

#[test]
fn output_limit_stops_shaping() {
    let font = TestFont::new().bases("e").marks("\u{0301}");
    let limits = BufferLimits {
        max_len_factor: 1,
        max_len_min: 1,
        ..BufferLimits::default()
    };
    let out = shape_with(&font, "\u{00E9}", &[], |b| b.set_limits(limits));

    assert!(!out.successful);

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("\u{00E9}");
    buffer.set_limits(limits);
    let result = otshape::shape_buffer(&font.font(), &[], buffer);
    assert!(matches!(result, Err(otshape::ShapeError::BufferOverflow { len: 1, .. })));
}

#[test]
fn default_ignorables_become_invisible() {
    let font = TestFont::new().bases("ab ");
    let out = shape(&font, "a\u{200B}b");

    assert_eq!(out.glyphs, [1, font.glyph_of(' '), 2]);
    assert_eq!(out.advances, [ADVANCE, 0, ADVANCE]);
    assert_eq!(out.clusters, [0, 1, 4]);
}

#[test]
fn default_ignorables_can_be_removed() {
    let font = TestFont::new().bases("ab ");
    let out = shape_with(&font, "a\u{200B}b", &[], |b| {
        b.set_flags(BufferFlags::REMOVE_DEFAULT_IGNORABLES)
    });

    assert_eq!(out.glyphs, [1, 2]);
    assert_eq!(out.clusters, [0, 4]);
}

#[test]
fn explicit_invisible_glyph() {
    let font = TestFont::new().bases("ab ");
    let out = shape_with(&font, "a\u{2060}b", &[], |b| b.set_invisible_glyph(99));

    assert_eq!(out.glyphs, [1, 99, 2]);
}

#[test]
fn global_user_feature() {
    let font = TestFont::new().bases("abc").substitution("smcp", 'b', 300);
    let out = shape_with(&font, "abcb", &["smcp"], |_| {});

    assert_eq!(out.glyphs, [1, 300, 3, 300]);
}

#[test]
fn ranged_user_feature() {
    let font = TestFont::new().bases("abc").substitution("smcp", 'b', 300);

    let out = shape_with(&font, "abcb", &["smcp[3]"], |_| {});
    assert_eq!(out.glyphs, [1, 2, 3, 300]);

    let out = shape_with(&font, "abcb", &["smcp[0]"], |_| {});
    assert_eq!(out.glyphs, [1, 2, 3, 2]);
}

#[test]
fn default_features_can_be_disabled() {
    let font = TestFont::new().bases("ab").substitution("liga", 'a', 300);

    assert_eq!(shape(&font, "ab").glyphs, [300, 2]);
    assert_eq!(shape_with(&font, "ab", &["-liga"], |_| {}).glyphs, [1, 2]);
}

#[test]
fn automatic_fractions() {
    let font = TestFont::new()
        .bases("12\u{2044}")
        .substitution("numr", '1', 401)
        .substitution("frac", '\u{2044}', 402)
        .substitution("dnom", '2', 403);

    assert_eq!(shape(&font, "1\u{2044}2").glyphs, [401, 402, 403]);
    // No fraction slash, no fraction features.
    assert_eq!(shape(&font, "12").glyphs, [1, 2]);
}

#[test]
fn space_fallback_widths() {
    let font = TestFont::new().bases("a ");
    let out = shape(&font, "a\u{2003}a\u{2004}");

    // EM SPACE and THREE-PER-EM SPACE are drawn with the space glyph.
    let space = font.glyph_of(' ');
    assert_eq!(out.glyphs, [1, space, 1, space]);
    assert_eq!(out.advances, [ADVANCE, common::UPEM, ADVANCE, 333]);
}

#[test]
fn unicode_buffer_round_trip() {
    let font = TestFont::new().bases("ab");
    let font = font.font();

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("ab");
    let glyphs: GlyphBuffer = otshape::shape_buffer(&font, &[], buffer).unwrap();

    assert_eq!(glyphs.len(), 2);
    assert_eq!(glyphs.glyph_positions().len(), 2);

    let buffer = glyphs.clear();
    assert!(buffer.is_empty());
}

#[test]
fn closure_follows_enabled_features() {
    let font = TestFont::new()
        .bases("ab")
        .substitution("liga", 'a', 300)
        .substitution("smcp", 'b', 301);

    let glyphs = otshape::glyphs_closure(&font.font(), "ab", &[]).unwrap();
    assert_eq!(glyphs.into_iter().collect::<Vec<_>>(), [1, 2, 300]);

    let smcp = ["smcp".parse().unwrap()];
    let glyphs = otshape::glyphs_closure(&font.font(), "ab", &smcp).unwrap();
    assert!(glyphs.contains(&301));
}

#[test]
fn plan_cache_reuses_plans() {
    let font = TestFont::new().bases("ab");
    let font = font.font();
    let cache = otshape::PlanCache::new();

    let props = otshape::SegmentProperties {
        direction: Direction::LeftToRight,
        script: Some(otshape::script::LATIN),
        language: None,
    };

    let first = cache.get_or_insert(&font, &props, &[]).unwrap();
    let second = cache.get_or_insert(&font, &props, &[]).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    let rtl = otshape::SegmentProperties {
        direction: Direction::RightToLeft,
        ..props
    };
    cache.get_or_insert(&font, &rtl, &[]).unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn plan_requires_a_direction() {
    let font = TestFont::new();
    let props = otshape::SegmentProperties::default();

    assert!(matches!(
        otshape::ShapePlan::new(&font.font(), &props, &[]),
        Err(otshape::ShapeError::InvalidDirection)
    ));
}
