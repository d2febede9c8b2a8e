//! Error types for the wire codec.

use thiserror::Error;

/// Errors raised while encoding or decoding wire values.
///
/// Every variant here is a schema or contract problem between the two sides
/// of the boundary, not a recoverable user condition. Callers that hit one
/// of these during decoding are looking at mismatched interface definitions.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The reader ran out of bytes in the middle of a value.
    #[error("unexpected end of buffer: needed {needed} more bytes, {remaining} remaining")]
    UnexpectedEnd {
        /// Bytes the current value still required.
        needed: usize,
        /// Bytes actually left in the buffer.
        remaining: usize,
    },

    /// A top-level decode finished with unread bytes left in the buffer.
    ///
    /// This indicates a schema mismatch and must never be silently ignored.
    #[error("trailing bytes after value: {count} unread, starting {excerpt}")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
        /// Hex excerpt of the first unread bytes.
        excerpt: String,
    },

    /// A boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte: {0:#04x}")]
    InvalidBool(u8),

    /// An optional-value discriminant was neither 0 (absent) nor 1 (present).
    #[error("invalid optional discriminant: {0:#04x}")]
    InvalidOptionTag(u8),

    /// A variant tag did not name any variant of the expected enum.
    #[error("unknown variant tag {tag} for {type_name}")]
    UnknownVariantTag {
        /// The enum being decoded.
        type_name: &'static str,
        /// The tag read from the wire.
        tag: i32,
    },

    /// String bytes were not valid UTF-8.
    #[error("invalid utf-8 in string")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    /// A length or count prefix was negative.
    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    /// A value is too large for its 32-bit wire length field.
    #[error("value too large for wire format: {len} bytes")]
    Oversize {
        /// The length that failed to fit.
        len: usize,
    },

    /// A mapping contained the same key twice.
    #[error("duplicate key in map at entry {index}")]
    DuplicateMapKey {
        /// Zero-based index of the offending entry.
        index: usize,
    },

    /// A duration was negative after normalization.
    ///
    /// The native side's duration type is unsigned, so negative durations
    /// are rejected at the boundary rather than reinterpreted.
    #[error("negative duration: {seconds}s {nanos}ns")]
    NegativeDuration {
        /// Seconds component as given.
        seconds: i64,
        /// Nanoseconds component as given.
        nanos: i64,
    },

    /// A nanoseconds field decoded outside `0..1_000_000_000`.
    #[error("nanosecond field out of range: {0}")]
    InvalidNanos(u32),

    /// A timestamp cannot be represented on the wire or as a `SystemTime`.
    #[error("timestamp out of range")]
    TimestampOutOfRange,
}
