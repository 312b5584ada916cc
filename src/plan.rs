use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;

use crate::common::{Direction, Feature, Language, Script, SegmentProperties, Tag};
use crate::complex::{ComplexShaper, ShaperKind};
use crate::error::ShapeError;
use crate::face::Font;
use crate::ot::{feature, FeatureFlags, Map, MapBuilder, TableIndex, MAX_VALUE};
use crate::Mask;

/// A reusable plan for shaping a text buffer.
///
/// A plan is bound to the font it was compiled against, to the segment
/// properties and to the user features. It is immutable and can be shared
/// between threads.
pub struct ShapePlan {
    pub(crate) direction: Direction,
    pub(crate) script: Option<Script>,
    pub(crate) language: Option<Language>,
    pub(crate) kind: ShaperKind,
    pub(crate) shaper: &'static dyn ComplexShaper,
    pub(crate) ot_map: Map,
    data: Option<Box<dyn Any + Send + Sync>>,

    pub(crate) frac_mask: Mask,
    pub(crate) numr_mask: Mask,
    pub(crate) dnom_mask: Mask,
    pub(crate) rtlm_mask: Mask,
    pub(crate) kern_mask: Mask,

    pub(crate) has_frac: bool,
    pub(crate) has_vert: bool,
    pub(crate) has_gpos_mark: bool,
    pub(crate) zero_marks: bool,
    pub(crate) fallback_glyph_classes: bool,
    pub(crate) fallback_mark_positioning: bool,
    pub(crate) adjust_mark_positioning_when_zeroing: bool,

    pub(crate) apply_gpos: bool,
    pub(crate) apply_kern: bool,

    pub(crate) user_features: Vec<Feature>,
}

impl core::fmt::Debug for ShapePlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShapePlan")
            .field("direction", &self.direction)
            .field("script", &self.script)
            .field("language", &self.language)
            .field("shaper", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ShapePlan {
    /// Returns a plan that can be used for shaping any buffer with the
    /// provided properties.
    ///
    /// Fails with [`ShapeError::InvalidDirection`] when no direction is set.
    pub fn new(font: &Font, props: &SegmentProperties, user_features: &[Feature]) -> Result<Self, ShapeError> {
        if props.direction == Direction::Invalid {
            return Err(ShapeError::InvalidDirection);
        }

        let mut planner = ShapePlanner::new(font, props.direction, props.script, props.language.as_ref());
        planner.collect_features(user_features);
        Ok(planner.compile(props.language.clone(), user_features))
    }

    /// The run direction the plan was built for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The script the plan was built for.
    pub fn script(&self) -> Option<Script> {
        self.script
    }

    /// The complex shaper the plan dispatches to.
    pub fn shaper_kind(&self) -> ShaperKind {
        self.kind
    }

    /// The compiled feature map.
    pub fn map(&self) -> &Map {
        &self.ot_map
    }

    /// Shaper-specific data created when the plan was compiled.
    pub(crate) fn data<T: 'static>(&self) -> Option<&T> {
        self.data.as_ref()?.downcast_ref()
    }

    pub(crate) fn key(&self) -> PlanKey {
        PlanKey {
            direction: self.direction,
            script: self.script,
            language: self.language.clone(),
            user_features: self.user_features.clone(),
        }
    }
}

/// Collects feature requests for a plan under construction.
pub struct ShapePlanner<'a> {
    pub(crate) font: &'a Font<'a>,
    pub(crate) direction: Direction,
    pub(crate) script: Option<Script>,
    pub(crate) ot_map: MapBuilder<'a>,
    pub(crate) script_zero_marks: bool,
    pub(crate) script_fallback_mark_positioning: bool,
    pub(crate) kind: ShaperKind,
}

impl<'a> ShapePlanner<'a> {
    fn new(font: &'a Font<'a>, direction: Direction, script: Option<Script>, language: Option<&Language>) -> Self {
        let ot_map = MapBuilder::new(font.layout, script, language);

        let kind = match script {
            Some(script) => ShaperKind::categorize(script, direction, language, &ot_map),
            None => ShaperKind::Default,
        };

        let shaper = kind.shaper();
        let script_zero_marks = shaper.zero_width_marks().is_some();
        let script_fallback_mark_positioning = shaper.fallback_position();

        log::debug!(
            "planning {:?} {:?} with the {:?} shaper (GSUB script {:?}, GPOS script {:?})",
            script,
            direction,
            kind,
            ot_map.chosen_script(TableIndex::GSUB),
            ot_map.chosen_script(TableIndex::GPOS),
        );

        ShapePlanner {
            font,
            direction,
            script,
            ot_map,
            script_zero_marks,
            script_fallback_mark_positioning,
            kind,
        }
    }

    fn collect_features(&mut self, user_features: &[Feature]) {
        const COMMON_FEATURES: &[(Tag, FeatureFlags)] = &[
            (feature::ABOVE_BASE_MARK_POSITIONING, FeatureFlags::GLOBAL),
            (feature::BELOW_BASE_MARK_POSITIONING, FeatureFlags::GLOBAL),
            (feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::GLOBAL),
            (feature::LOCALIZED_FORMS, FeatureFlags::GLOBAL),
            (feature::MARK_POSITIONING, FeatureFlags::GLOBAL_MANUAL_JOINERS),
            (feature::MARK_TO_MARK_POSITIONING, FeatureFlags::GLOBAL_MANUAL_JOINERS),
            (feature::REQUIRED_LIGATURES, FeatureFlags::GLOBAL),
        ];

        const HORIZONTAL_FEATURES: &[(Tag, FeatureFlags)] = &[
            (feature::CONTEXTUAL_ALTERNATES, FeatureFlags::GLOBAL),
            (feature::CONTEXTUAL_LIGATURES, FeatureFlags::GLOBAL),
            (feature::CURSIVE_POSITIONING, FeatureFlags::GLOBAL),
            (feature::DISTANCES, FeatureFlags::GLOBAL),
            (feature::KERNING, FeatureFlags::GLOBAL_HAS_FALLBACK),
            (feature::STANDARD_LIGATURES, FeatureFlags::GLOBAL),
            (feature::REQUIRED_CONTEXTUAL_ALTERNATES, FeatureFlags::GLOBAL),
        ];

        let empty = FeatureFlags::empty();

        self.ot_map.enable_feature(feature::REQUIRED_VARIATION_ALTERNATES, empty, 1);
        self.ot_map.add_gsub_pause(None);

        match self.direction {
            Direction::LeftToRight => {
                self.ot_map.enable_feature(feature::LEFT_TO_RIGHT_ALTERNATES, empty, 1);
                self.ot_map.enable_feature(feature::LEFT_TO_RIGHT_MIRRORED_FORMS, empty, 1);
            }
            Direction::RightToLeft => {
                self.ot_map.enable_feature(feature::RIGHT_TO_LEFT_ALTERNATES, empty, 1);
                self.ot_map.add_feature(feature::RIGHT_TO_LEFT_MIRRORED_FORMS, empty, 1);
            }
            _ => {}
        }

        // Automatic fractions.
        self.ot_map.add_feature(feature::FRACTIONS, empty, 1);
        self.ot_map.add_feature(feature::NUMERATORS, empty, 1);
        self.ot_map.add_feature(feature::DENOMINATORS, empty, 1);

        self.ot_map.enable_feature(feature::RANDOMIZE, FeatureFlags::RANDOM, MAX_VALUE);

        let shaper = self.kind.shaper();
        shaper.collect_features(self);

        for &(tag, flags) in COMMON_FEATURES {
            self.ot_map.add_feature(tag, flags, 1);
        }

        if self.direction.is_horizontal() {
            for &(tag, flags) in HORIZONTAL_FEATURES {
                self.ot_map.add_feature(tag, flags, 1);
            }
        } else {
            // Only `vert` is applied in vertical runs, and it is looked up
            // under any script the font lists it.
            self.ot_map.enable_feature(feature::VERTICAL_WRITING, FeatureFlags::GLOBAL_SEARCH, 1);
        }

        for feature in user_features {
            let flags = if feature.is_global() { FeatureFlags::GLOBAL } else { empty };
            self.ot_map.add_feature(feature.tag, flags, feature.value);
        }

        shaper.override_features(self);
    }

    fn compile(self, language: Option<Language>, user_features: &[Feature]) -> ShapePlan {
        let font = self.font;
        let shaper = self.kind.shaper();
        let ot_map = self.ot_map.compile();

        let frac_mask = ot_map.get_1_mask(feature::FRACTIONS);
        let numr_mask = ot_map.get_1_mask(feature::NUMERATORS);
        let dnom_mask = ot_map.get_1_mask(feature::DENOMINATORS);
        let has_frac = frac_mask != 0 || (numr_mask != 0 && dnom_mask != 0);

        let rtlm_mask = ot_map.get_1_mask(feature::RIGHT_TO_LEFT_MIRRORED_FORMS);
        let has_vert = ot_map.get_1_mask(feature::VERTICAL_WRITING) != 0;

        let kern_tag = if self.direction.is_horizontal() {
            feature::KERNING
        } else {
            feature::VERTICAL_KERNING
        };
        let kern_mask = ot_map.get_mask(kern_tag).0;
        let has_gpos_kern = ot_map.has_feature(TableIndex::GPOS, kern_tag);

        let disable_gpos = shaper
            .gpos_tag()
            .is_some_and(|tag| Some(tag) != ot_map.chosen_script(TableIndex::GPOS));

        // Decide who provides glyph classes: GDEF or Unicode.
        let fallback_glyph_classes = !font.layout.has_glyph_classes();

        // Decide who does positioning: GPOS, the backend's kerning or fallback.
        let apply_gpos = !disable_gpos && font.layout.has_table(TableIndex::GPOS);
        let apply_kern = (!has_gpos_kern || !apply_gpos) && font.backend.has_kerning();

        let zero_marks = self.script_zero_marks;
        let has_gpos_mark = ot_map.get_1_mask(feature::MARK_POSITIONING) != 0;
        let adjust_mark_positioning_when_zeroing = !apply_gpos;
        let fallback_mark_positioning = adjust_mark_positioning_when_zeroing && self.script_fallback_mark_positioning;

        if fallback_mark_positioning {
            log::debug!("no GPOS, marks will be positioned from glyph extents");
        }

        let mut plan = ShapePlan {
            direction: self.direction,
            script: self.script,
            language,
            kind: self.kind,
            shaper,
            ot_map,
            data: None,
            frac_mask,
            numr_mask,
            dnom_mask,
            rtlm_mask,
            kern_mask,
            has_frac,
            has_vert,
            has_gpos_mark,
            zero_marks,
            fallback_glyph_classes,
            fallback_mark_positioning,
            adjust_mark_positioning_when_zeroing,
            apply_gpos,
            apply_kern,
            user_features: user_features.to_vec(),
        };

        plan.data = shaper.create_data(&plan, font);
        plan
    }
}

/// Everything a compiled plan depends on, apart from the font.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PlanKey {
    /// Run direction.
    pub direction: Direction,
    /// Run script.
    pub script: Option<Script>,
    /// Run language.
    pub language: Option<Language>,
    /// User features, in request order.
    pub user_features: Vec<Feature>,
}

impl PlanKey {
    /// Builds a key from segment properties and user features.
    pub fn new(props: &SegmentProperties, user_features: &[Feature]) -> Self {
        PlanKey {
            direction: props.direction,
            script: props.script,
            language: props.language.clone(),
            user_features: user_features.to_vec(),
        }
    }
}

#[cfg(feature = "std")]
pub use cache::PlanCache;

#[cfg(feature = "std")]
mod cache {
    use std::collections::HashMap;
    use std::sync::{Arc, PoisonError, RwLock};

    use super::{PlanKey, ShapePlan};
    use crate::common::{Feature, SegmentProperties};
    use crate::error::ShapeError;
    use crate::face::Font;

    /// A read-mostly cache of compiled plans for a single font.
    ///
    /// Plans are keyed by [`PlanKey`]; the font is not part of the key, so
    /// use one cache per font.
    #[derive(Default)]
    pub struct PlanCache {
        plans: RwLock<HashMap<PlanKey, Arc<ShapePlan>>>,
    }

    impl PlanCache {
        /// Creates an empty cache.
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns the number of cached plans.
        pub fn len(&self) -> usize {
            self.plans.read().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Checks that no plan has been cached yet.
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Returns the cached plan for these properties, compiling it on a miss.
        pub fn get_or_insert(
            &self,
            font: &Font,
            props: &SegmentProperties,
            user_features: &[Feature],
        ) -> Result<Arc<ShapePlan>, ShapeError> {
            let key = PlanKey::new(props, user_features);
            if let Some(plan) = self.plans.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
                return Ok(plan.clone());
            }

            // Compile outside of the lock; a racing thread may do the same
            // work, the first insert wins.
            let plan = Arc::new(ShapePlan::new(font, props, user_features)?);
            let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
            Ok(plans.entry(plan.key()).or_insert(plan).clone())
        }
    }

    impl core::fmt::Debug for PlanCache {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.debug_struct("PlanCache").field("len", &self.len()).finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_plan_is_send_and_sync() {
        fn ensure_send_and_sync<T: Send + Sync>() {}
        ensure_send_and_sync::<ShapePlan>();
    }

    #[test]
    fn keys_compare_by_value() {
        let props = SegmentProperties {
            direction: Direction::LeftToRight,
            script: Some(crate::script::LATIN),
            language: None,
        };
        let kern = Feature::new(Tag::from_bytes(b"kern"), 0, ..);
        assert_eq!(PlanKey::new(&props, &[kern]), PlanKey::new(&props, &[kern]));
        assert_ne!(PlanKey::new(&props, &[kern]), PlanKey::new(&props, &[]));
    }
}
