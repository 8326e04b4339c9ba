//! Error types for stklib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Note that protocol-level rejections
//! (an uncorrelated host response, an unsupported proactive command) are
//! *not* errors: the engine drops those silently so the card session stays
//! in sync. The variants here cover encoding limits, vocabulary lookups,
//! configuration mistakes and transport failures.

/// The error type for all stklib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The RIL transport failed to deliver a terminal response or envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// A value does not fit the comprehension-TLV / BER-TLV framing rules
    /// (for example a length above 255 bytes).
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A raw wire byte has no symbol in the named vocabulary.
    #[error("unknown {kind} value: 0x{value:02X}")]
    UnknownValue {
        /// Name of the vocabulary (e.g. `"result code"`).
        kind: &'static str,
        /// The raw wire byte.
        value: u8,
    },

    /// An invalid parameter was passed to a builder or encoder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The CAT service task is no longer running.
    #[error("CAT service not running")]
    NotRunning,
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
