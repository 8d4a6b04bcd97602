use thiserror::Error;

use crate::format::RegisterFormat;

/// Codec failure variants.
///
/// A `WrongWordCount` after planning means the splice plan and the format
/// table disagree, which is a programming error; callers downgrade it to a
/// NULL sample rather than abort the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The raw window does not match the format's register footprint.
    #[error("format `{format}` spans {expected} words, got {got}")]
    WrongWordCount {
        /// Format the caller asked for.
        format: RegisterFormat,
        /// Words the format occupies.
        expected: usize,
        /// Words actually supplied.
        got: usize,
    },
    /// The value kind cannot be written in the requested format.
    #[error("cannot encode a {kind} value as `{format}`")]
    ValueKind {
        /// Format the caller asked for.
        format: RegisterFormat,
        /// Human name of the offending value variant.
        kind: &'static str,
    },
    /// A textual sample does not parse back into its wire image.
    #[error("`{literal}` is not a valid `{format}` literal")]
    BadLiteral {
        /// Format the caller asked for.
        format: RegisterFormat,
        /// The literal that failed to parse.
        literal: String,
    },
}
