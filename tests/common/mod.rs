#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use otshape::ot::{GlyphClass, LookupEngine, LookupMap, TableIndex};
use otshape::{Buffer, Direction, Feature, Font, FontBackend, GlyphExtents, Script, ShapePlan, Tag};

pub const UPEM: i32 = 1000;
pub const ADVANCE: i32 = 500;

/// An in-memory font: a character map, per-glyph advances and one single
/// substitution lookup per feature.
///
/// Glyph ids are handed out in insertion order, starting at 1.
pub struct TestFont {
    cmap: BTreeMap<char, u32>,
    advances: BTreeMap<u32, i32>,
    marks: BTreeSet<u32>,
    scripts: Vec<Tag>,
    features: Vec<(Tag, BTreeMap<u32, u32>)>,
    kerning: BTreeMap<(u32, u32), i32>,
}

impl TestFont {
    pub fn new() -> Self {
        TestFont {
            cmap: BTreeMap::new(),
            advances: BTreeMap::new(),
            marks: BTreeSet::new(),
            scripts: ["latn", "dev2", "arab", "hang", "hebr", "thai", "khmr", "mym2"]
                .iter()
                .map(|s| Tag::from_bytes_lossy(s.as_bytes()))
                .collect(),
            features: Vec::new(),
            kerning: BTreeMap::new(),
        }
    }

    /// Maps every character of `chars` to a new spacing glyph.
    pub fn bases(mut self, chars: &str) -> Self {
        for c in chars.chars() {
            self.add(c, ADVANCE);
        }
        self
    }

    /// Maps every character of `chars` to a new zero-width mark glyph.
    pub fn marks(mut self, chars: &str) -> Self {
        for c in chars.chars() {
            let glyph = self.add(c, 0);
            self.marks.insert(glyph);
        }
        self
    }

    /// Adds a single substitution under `feature`, creating the target glyph.
    ///
    /// The target is reachable only through the lookup.
    pub fn substitution(mut self, feature: &str, from: char, to_name: u32) -> Self {
        let from = self.glyph_of(from);
        let tag = Tag::from_bytes_lossy(feature.as_bytes());
        self.advances.entry(to_name).or_insert(ADVANCE);
        match self.features.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, map)) => {
                map.insert(from, to_name);
            }
            None => self.features.push((tag, BTreeMap::from([(from, to_name)]))),
        }
        self
    }

    pub fn kern(mut self, left: char, right: char, value: i32) -> Self {
        let pair = (self.glyph_of(left), self.glyph_of(right));
        self.kerning.insert(pair, value);
        self
    }

    pub fn glyph_of(&self, c: char) -> u32 {
        self.cmap[&c]
    }

    pub fn font(&self) -> Font<'_> {
        Font::new(self, self)
    }

    fn add(&mut self, c: char, advance: i32) -> u32 {
        let glyph = self.cmap.len() as u32 + 1;
        self.cmap.insert(c, glyph);
        self.advances.insert(glyph, advance);
        glyph
    }
}

impl FontBackend for TestFont {
    fn units_per_em(&self) -> i32 {
        UPEM
    }

    fn glyph(&self, c: char, variation_selector: Option<char>) -> Option<u32> {
        match variation_selector {
            Some(_) => None,
            None => self.cmap.get(&c).copied(),
        }
    }

    fn glyph_extents(&self, glyph: u32) -> Option<GlyphExtents> {
        let width = self.glyph_h_advance(glyph).max(ADVANCE / 2);
        Some(GlyphExtents {
            x_bearing: 0,
            y_bearing: 700,
            width,
            height: -700,
        })
    }

    fn glyph_h_advance(&self, glyph: u32) -> i32 {
        self.advances.get(&glyph).copied().unwrap_or(ADVANCE)
    }

    fn has_kerning(&self) -> bool {
        !self.kerning.is_empty()
    }

    fn glyph_kerning(&self, left: u32, right: u32, _: Direction) -> (i32, i32) {
        (self.kerning.get(&(left, right)).copied().unwrap_or(0), 0)
    }
}

impl LookupEngine for TestFont {
    fn has_table(&self, table: TableIndex) -> bool {
        table == TableIndex::GSUB && !self.features.is_empty()
    }

    fn select_script(&self, _: TableIndex, script_tags: &[Tag]) -> Option<(Tag, bool)> {
        match script_tags.iter().find(|tag| self.scripts.contains(tag)) {
            Some(tag) => Some((*tag, true)),
            None => Some((Tag::from_bytes(b"DFLT"), false)),
        }
    }

    fn select_language(&self, _: TableIndex, _: Tag, _: &[Tag]) -> Option<Tag> {
        None
    }

    fn required_feature(&self, _: TableIndex, _: Tag, _: Option<Tag>) -> Option<(Tag, Vec<u16>)> {
        None
    }

    fn lookups_for_feature(&self, table: TableIndex, _: Tag, _: Option<Tag>, feature: Tag) -> Option<Vec<u16>> {
        if table != TableIndex::GSUB {
            return None;
        }

        let index = self.features.iter().position(|(tag, _)| *tag == feature)?;
        Some(vec![index as u16])
    }

    fn lookup_would_substitute(&self, lookup_index: u16, glyphs: &[u32], _: bool) -> bool {
        match (self.features.get(usize::from(lookup_index)), glyphs) {
            (Some((_, map)), [glyph]) => map.contains_key(glyph),
            _ => false,
        }
    }

    fn apply_lookups(&self, table: TableIndex, buffer: &mut Buffer, lookups: &[LookupMap]) {
        if table != TableIndex::GSUB {
            return;
        }

        for lookup in lookups {
            let Some((_, map)) = self.features.get(usize::from(lookup.index)) else {
                continue;
            };

            for info in buffer.glyph_infos_mut() {
                if info.mask() & lookup.mask == 0 {
                    continue;
                }

                if let Some(&to) = map.get(&info.glyph_id) {
                    info.glyph_id = to;
                }
            }
        }
    }

    fn glyph_class(&self, glyph: u32) -> Option<GlyphClass> {
        if self.marks.contains(&glyph) {
            Some(GlyphClass::Mark)
        } else {
            Some(GlyphClass::Base)
        }
    }

    fn has_glyph_classes(&self) -> bool {
        true
    }

    fn closure_lookup(&self, lookup_index: u16, glyphs: &mut BTreeSet<u32>) {
        if let Some((_, map)) = self.features.get(usize::from(lookup_index)) {
            let reached: Vec<u32> = glyphs.iter().filter_map(|g| map.get(g).copied()).collect();
            glyphs.extend(reached);
        }
    }
}

/// Shaped output in a compact, comparable form.
#[derive(Debug, PartialEq, Eq)]
pub struct Shaped {
    pub glyphs: Vec<u32>,
    pub clusters: Vec<u32>,
    pub advances: Vec<i32>,
    pub successful: bool,
}

pub fn shape_with(
    font: &TestFont,
    text: &str,
    features: &[&str],
    setup: impl FnOnce(&mut Buffer),
) -> Shaped {
    let features = Feature::parse_list(&features.join(",")).unwrap();

    let mut buffer = Buffer::new();
    buffer.push_str(text);
    setup(&mut buffer);
    buffer.guess_segment_properties();

    let font = font.font();
    let plan = ShapePlan::new(&font, &buffer.segment_properties(), &features).unwrap();
    let successful = otshape::shape(&plan, &font, &mut buffer, &features);

    Shaped {
        glyphs: buffer.glyph_infos().iter().map(|i| i.glyph_id).collect(),
        clusters: buffer.glyph_infos().iter().map(|i| i.cluster).collect(),
        advances: buffer.glyph_positions().iter().map(|p| p.x_advance).collect(),
        successful,
    }
}

pub fn shape(font: &TestFont, text: &str) -> Shaped {
    shape_with(font, text, &[], |_| {})
}

pub fn shaper_kind(font: &TestFont, script: Script) -> otshape::ShaperKind {
    let font = font.font();
    let props = otshape::SegmentProperties {
        direction: Direction::from_script(script).unwrap_or(Direction::LeftToRight),
        script: Some(script),
        language: None,
    };
    ShapePlan::new(&font, &props, &[]).unwrap().shaper_kind()
}
