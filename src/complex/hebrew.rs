use super::{ComplexShaper, ZeroWidthMarks};
use crate::buffer::Buffer;
use crate::common::Tag;
use crate::ot::normalize::NormalizeContext;
use crate::plan::ShapePlan;
use crate::unicode::{self, modified_combining_class as mcc};

pub(crate) static HEBREW_SHAPER: HebrewShaper = HebrewShaper;

pub(crate) struct HebrewShaper;

/// Letters U+05D0..U+05EA with dagesh. Zero where no form is encoded.
const DAGESH_FORMS: [u16; 27] = [
    0xFB30, // ALEF
    0xFB31, // BET
    0xFB32, // GIMEL
    0xFB33, // DALET
    0xFB34, // HE
    0xFB35, // VAV
    0xFB36, // ZAYIN
    0x0000, // HET
    0xFB38, // TET
    0xFB39, // YOD
    0xFB3A, // FINAL KAF
    0xFB3B, // KAF
    0xFB3C, // LAMED
    0x0000, // FINAL MEM
    0xFB3E, // MEM
    0x0000, // FINAL NUN
    0xFB40, // NUN
    0xFB41, // SAMEKH
    0x0000, // AYIN
    0xFB43, // FINAL PE
    0xFB44, // PE
    0x0000, // FINAL TSADI
    0xFB46, // TSADI
    0xFB47, // QOF
    0xFB48, // RESH
    0xFB49, // SHIN
    0xFB4A, // TAV
];

/// Presentation forms excluded from canonical composition, which older
/// fonts without mark positioning rely on.
fn presentation_form(a: u32, b: u32) -> Option<u32> {
    let ab = match (b, a) {
        (0x05B4, 0x05D9) => 0xFB1D, // HIRIQ: YOD
        (0x05B7, 0x05D9) => 0xFB1F, // PATAH: YIDDISH YOD YOD
        (0x05B7, 0x05D0) => 0xFB2E, // PATAH: ALEF
        (0x05B8, 0x05D0) => 0xFB2F, // QAMATS: ALEF
        (0x05B9, 0x05D5) => 0xFB4B, // HOLAM: VAV
        (0x05BC, 0x05D0..=0x05EA) => {
            let form = DAGESH_FORMS[(a - 0x05D0) as usize];
            return (form != 0).then_some(u32::from(form));
        }
        (0x05BC, 0xFB2A) => 0xFB2C, // DAGESH: SHIN WITH SHIN DOT
        (0x05BC, 0xFB2B) => 0xFB2D, // DAGESH: SHIN WITH SIN DOT
        (0x05BF, 0x05D1) => 0xFB4C, // RAFE: BET
        (0x05BF, 0x05DB) => 0xFB4D, // RAFE: KAF
        (0x05BF, 0x05E4) => 0xFB4E, // RAFE: PE
        (0x05C1, 0x05E9) => 0xFB2A, // SHIN DOT: SHIN
        (0x05C1, 0xFB49) => 0xFB2C, // SHIN DOT: SHIN WITH DAGESH
        (0x05C2, 0x05E9) => 0xFB2B, // SIN DOT: SHIN
        (0x05C2, 0xFB49) => 0xFB2D, // SIN DOT: SHIN WITH DAGESH
        _ => return None,
    };

    Some(ab)
}

impl ComplexShaper for HebrewShaper {
    fn compose(&self, ctx: &NormalizeContext, a: char, b: char) -> Option<char> {
        unicode::compose(a, b).or_else(|| {
            if ctx.plan.has_gpos_mark {
                return None;
            }

            presentation_form(a as u32, b as u32).and_then(char::from_u32)
        })
    }

    // Hebrew fonts built for other scripts' GPOS position marks badly.
    fn gpos_tag(&self) -> Option<Tag> {
        Some(Tag::from_bytes(b"hebr"))
    }

    fn reorder_marks(&self, _: &ShapePlan, buffer: &mut Buffer, start: usize, end: usize) {
        reorder_marks(buffer, start, end);
    }

    fn zero_width_marks(&self) -> Option<ZeroWidthMarks> {
        Some(ZeroWidthMarks::ByGdefLate)
    }

    fn fallback_position(&self) -> bool {
        true
    }
}

/// Patah or qamats, then sheva or hiriq, then meteg or a below mark: the
/// middle two are swapped so the vowel sits next to the letter.
fn reorder_marks(buffer: &mut Buffer, start: usize, end: usize) {
    for i in start + 2..end {
        let c0 = buffer.info[i - 2].modified_combining_class();
        let c1 = buffer.info[i - 1].modified_combining_class();
        let c2 = buffer.info[i].modified_combining_class();

        if (c0 == mcc::CCC17 || c0 == mcc::CCC18)
            && (c1 == mcc::CCC10 || c1 == mcc::CCC14)
            && (c2 == mcc::CCC22 || c2 == 220)
        {
            buffer.merge_clusters(i - 1, i + 1);
            buffer.info.swap(i - 1, i);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GlyphInfo;
    use crate::unicode::GeneralCategory;

    #[test]
    fn dagesh_forms() {
        assert_eq!(presentation_form(0x05D1, 0x05BC), Some(0xFB31));
        assert_eq!(presentation_form(0x05D7, 0x05BC), None);
        assert_eq!(presentation_form(0xFB2A, 0x05BC), Some(0xFB2C));
    }

    #[test]
    fn shin_dots() {
        assert_eq!(presentation_form(0x05E9, 0x05C1), Some(0xFB2A));
        assert_eq!(presentation_form(0x05E9, 0x05C2), Some(0xFB2B));
        assert_eq!(presentation_form(0x0041, 0x05C2), None);
    }

    #[test]
    fn sheva_moves_before_meteg() {
        let mut buffer = Buffer::new();
        for (i, cc) in [mcc::CCC17, mcc::CCC10, mcc::CCC22].into_iter().enumerate() {
            let mut info = GlyphInfo {
                glyph_id: 0x05B0 + i as u32,
                cluster: i as u32,
                ..GlyphInfo::default()
            };
            info.set_general_category(GeneralCategory::NonspacingMark);
            info.set_modified_combining_class(cc);
            buffer.info.push(info);
        }
        buffer.len = 3;

        reorder_marks(&mut buffer, 0, 3);
        assert_eq!(buffer.info[1].modified_combining_class(), mcc::CCC22);
        assert_eq!(buffer.info[2].modified_combining_class(), mcc::CCC10);
        assert_eq!(buffer.info[1].cluster, buffer.info[2].cluster);
    }
}
