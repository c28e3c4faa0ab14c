use thiserror::Error;

use crate::MeasurementKind;

/// Errors returned by UT803 record decoding.
///
/// None of these abort a stream: every failure is scoped to one record, and
/// the caller decides whether to skip it or stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A payload byte falls outside the super-decimal alphabet `[0x30, 0x3f]`.
    /// The record is unusable; the caller should discard and resynchronize.
    #[error("invalid super-decimal byte 0x{byte:02x} at payload position {position}")]
    InvalidDigit { position: usize, byte: u8 },
    /// The type code has no entry in the measurement-type table. Recoverable:
    /// callers may log and skip the record.
    #[error("unknown measurement type code {code}")]
    UnknownMeasurementType { code: u8 },
    /// A valid type arrived with an exponent the range tables do not cover.
    /// Indicates a protocol gap; surfaced rather than silently defaulted.
    ///
    /// Carries the exponent digit rather than the flag nibbles: the only
    /// uncovered combinations today are exponent values outside the range
    /// tables, and `kind` identifies which table was consulted. The flags
    /// of the offending record stay available to the caller through the
    /// raw payload.
    #[error("no exponent rule for {} with exponent digit {exponent}", kind.label())]
    UnsupportedCombination {
        kind: MeasurementKind,
        exponent: u8,
    },
    /// Wrong payload length or missing CR/LF terminator. The framing layer
    /// screens for this; the decoder surfaces it for completeness.
    #[error("malformed framing: {}", framing_detail(.expected, .actual, .missing_terminator))]
    MalformedFraming {
        expected: usize,
        actual: usize,
        /// True when the record had no CR before the LF, or ended without
        /// any terminator at all; false for a plain length mismatch.
        missing_terminator: bool,
    },
}

fn framing_detail(expected: &usize, actual: &usize, missing_terminator: &bool) -> String {
    if *missing_terminator {
        format!("record not terminated by CR/LF after {actual} bytes")
    } else {
        format!("expected {expected} payload bytes, got {actual}")
    }
}
