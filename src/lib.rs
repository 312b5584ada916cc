/*!
`otshape` is an OpenType shaping engine: it turns a run of Unicode text into
positioned glyphs, with the script-specific processing (Indic, Khmer,
Myanmar, Arabic, Thai, Hangul, Hebrew) that complex scripts need.

The font is reached through two traits, [`FontBackend`] for the glyph
repertoire and metrics and [`LookupEngine`](ot::LookupEngine) for
GSUB/GPOS. [`Face`] implements both on top of `ttf-parser`.

```no_run
let data = std::fs::read("font.ttf").unwrap();
let face = otshape::Face::from_slice(&data, 0).unwrap();
let font = otshape::Font::from_face(&face);

let mut buffer = otshape::UnicodeBuffer::new();
buffer.push_str("नमस्ते");

let glyphs = otshape::shape_buffer(&font, &[], buffer).unwrap();
for (info, pos) in glyphs.glyph_infos().iter().zip(glyphs.glyph_positions()) {
    println!("{} {} {}", info.glyph_id, info.cluster, pos.x_advance);
}
```
*/

#![no_std]
#![warn(missing_docs)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod buffer;
mod closure;
mod common;
mod complex;
mod error;
mod face;
pub mod ot;
mod plan;
mod shape;
mod unicode;

pub use ttf_parser::Tag;

pub use crate::buffer::{
    Buffer, BufferClusterLevel, BufferFlags, BufferLimits, GlyphBuffer, GlyphInfo, GlyphPosition, SerializeFlags,
    UnicodeBuffer,
};
pub use crate::closure::glyphs_closure;
pub use crate::common::{script, Direction, Feature, Language, Script, SegmentProperties};
pub use crate::complex::ShaperKind;
pub use crate::error::ShapeError;
pub use crate::face::{Face, Font, FontBackend, GlyphExtents};
#[cfg(feature = "std")]
pub use crate::plan::PlanCache;
pub use crate::plan::{PlanKey, ShapePlan};
pub use crate::shape::{shape, shape_buffer};

type Mask = u32;
