use alloc::string::String;

/// Errors reported by the high-level shaping API.
///
/// The low-level [`shape`](crate::shape) entry point reports failure only
/// through its return value and leaves the partial output in the buffer.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    /// The output grew past the buffer limit.
    #[error("buffer output exceeded {max_len} glyphs (input had {len})")]
    BufferOverflow {
        /// Input length in characters.
        len: usize,
        /// The output limit derived from it.
        max_len: usize,
    },

    /// Shaping stopped after spending its operation budget.
    #[error("shaping operation budget exhausted")]
    OperationBudgetExhausted,

    /// A feature string could not be parsed.
    #[error("invalid feature: {0}")]
    InvalidFeature(String),

    /// The segment has no usable direction.
    #[error("invalid text direction")]
    InvalidDirection,

    /// The font data could not be parsed.
    #[error("failed to parse font: {0}")]
    FontParse(ttf_parser::FaceParsingError),
}

impl From<ttf_parser::FaceParsingError> for ShapeError {
    fn from(e: ttf_parser::FaceParsingError) -> Self {
        ShapeError::FontParse(e)
    }
}
