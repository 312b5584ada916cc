//! OpenType layout plumbing: the lookup engine contract, feature maps and
//! the generic passes that run around lookup application.

pub mod feature;

mod apply;
pub(crate) mod fallback;
pub(crate) mod kern;
mod layout;
mod map;
pub(crate) mod normalize;

pub use layout::{GlyphClass, LookupEngine, LookupMap, NoLayout, TableIndex};
pub use map::{FeatureFlags, Map, MapBuilder};

pub(crate) use layout::{check_glyph_property, glyph_props, lookup_flags, set_glyph_props};
pub(crate) use map::MAX_VALUE;
