//! Byte positions and alphabet constants for the UT803 record format.

/// Payload bytes per record, terminator excluded.
pub const PAYLOAD_LEN: usize = 9;
/// Full record length on the wire: payload plus CR and LF.
pub const FRAME_LEN: usize = 11;

pub const EXPONENT_OFFSET: usize = 0;
pub const DIGITS_RANGE: std::ops::Range<usize> = 1..5;
pub const TYPE_OFFSET: usize = 5;
pub const FLAGS_RANGE: std::ops::Range<usize> = 6..9;

/// Lowest byte of the super-decimal alphabet (`'0'`).
pub const DIGIT_BASE: u8 = 0x30;
/// Highest byte of the super-decimal alphabet (`'?'`).
pub const DIGIT_MAX: u8 = 0x3f;

pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';

/// Positional weights for the four value digits, most significant first.
pub const DIGIT_WEIGHTS: [u32; 4] = [1000, 100, 10, 1];
