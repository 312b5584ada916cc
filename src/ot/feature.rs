//! Registered OpenType feature tags used by the shapers.

#![allow(missing_docs)]

use crate::common::Tag;

pub const ABOVE_BASE_FORMS: Tag = Tag::from_bytes(b"abvf");
pub const ABOVE_BASE_MARK_POSITIONING: Tag = Tag::from_bytes(b"abvm");
pub const ABOVE_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"abvs");
pub const AKHANDS: Tag = Tag::from_bytes(b"akhn");
pub const BELOW_BASE_FORMS: Tag = Tag::from_bytes(b"blwf");
pub const BELOW_BASE_MARK_POSITIONING: Tag = Tag::from_bytes(b"blwm");
pub const BELOW_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"blws");
pub const CONJUNCT_FORMS: Tag = Tag::from_bytes(b"cjct");
pub const CONJUNCT_FORM_AFTER_RO: Tag = Tag::from_bytes(b"cfar");
pub const CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"calt");
pub const CONTEXTUAL_LIGATURES: Tag = Tag::from_bytes(b"clig");
pub const CURSIVE_POSITIONING: Tag = Tag::from_bytes(b"curs");
pub const DENOMINATORS: Tag = Tag::from_bytes(b"dnom");
pub const DISTANCES: Tag = Tag::from_bytes(b"dist");
pub const FRACTIONS: Tag = Tag::from_bytes(b"frac");
pub const GLYPH_COMPOSITION_DECOMPOSITION: Tag = Tag::from_bytes(b"ccmp");
pub const HALANT_FORMS: Tag = Tag::from_bytes(b"haln");
pub const HALF_FORMS: Tag = Tag::from_bytes(b"half");
pub const HANGUL_LEADING_JAMO: Tag = Tag::from_bytes(b"ljmo");
pub const HANGUL_TRAILING_JAMO: Tag = Tag::from_bytes(b"tjmo");
pub const HANGUL_VOWEL_JAMO: Tag = Tag::from_bytes(b"vjmo");
pub const INITIAL_FORMS: Tag = Tag::from_bytes(b"init");
pub const ISOLATED_FORMS: Tag = Tag::from_bytes(b"isol");
pub const KERNING: Tag = Tag::from_bytes(b"kern");
pub const LEFT_TO_RIGHT_ALTERNATES: Tag = Tag::from_bytes(b"ltra");
pub const LEFT_TO_RIGHT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"ltrm");
pub const LOCALIZED_FORMS: Tag = Tag::from_bytes(b"locl");
pub const MARK_POSITIONING: Tag = Tag::from_bytes(b"mark");
pub const MARK_POSITIONING_VIA_SUBSTITUTION: Tag = Tag::from_bytes(b"mset");
pub const MARK_TO_MARK_POSITIONING: Tag = Tag::from_bytes(b"mkmk");
pub const MEDIAL_FORMS: Tag = Tag::from_bytes(b"medi");
pub const MEDIAL_FORMS_2: Tag = Tag::from_bytes(b"med2");
pub const NUKTA_FORMS: Tag = Tag::from_bytes(b"nukt");
pub const NUMERATORS: Tag = Tag::from_bytes(b"numr");
pub const POST_BASE_FORMS: Tag = Tag::from_bytes(b"pstf");
pub const POST_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"psts");
pub const PRE_BASE_FORMS: Tag = Tag::from_bytes(b"pref");
pub const PRE_BASE_SUBSTITUTIONS: Tag = Tag::from_bytes(b"pres");
pub const RAKAR_FORMS: Tag = Tag::from_bytes(b"rkrf");
pub const RANDOMIZE: Tag = Tag::from_bytes(b"rand");
pub const REPH_FORMS: Tag = Tag::from_bytes(b"rphf");
pub const REQUIRED_CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"rclt");
pub const REQUIRED_LIGATURES: Tag = Tag::from_bytes(b"rlig");
pub const REQUIRED_VARIATION_ALTERNATES: Tag = Tag::from_bytes(b"rvrn");
pub const RIGHT_TO_LEFT_ALTERNATES: Tag = Tag::from_bytes(b"rtla");
pub const RIGHT_TO_LEFT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"rtlm");
pub const STANDARD_LIGATURES: Tag = Tag::from_bytes(b"liga");
pub const STRETCHING_GLYPH_DECOMPOSITION: Tag = Tag::from_bytes(b"stch");
pub const TERMINAL_FORMS_1: Tag = Tag::from_bytes(b"fina");
pub const TERMINAL_FORMS_2: Tag = Tag::from_bytes(b"fin2");
pub const TERMINAL_FORMS_3: Tag = Tag::from_bytes(b"fin3");
pub const VATTU_VARIANTS: Tag = Tag::from_bytes(b"vatu");
pub const VERTICAL_KERNING: Tag = Tag::from_bytes(b"vkrn");
pub const VERTICAL_WRITING: Tag = Tag::from_bytes(b"vert");
