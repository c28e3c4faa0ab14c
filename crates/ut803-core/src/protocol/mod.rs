//! UT803 packet decoding.
//!
//! The meter emits fixed 11-byte records: 9 payload bytes followed by CR and
//! LF. Every payload byte is a "super-decimal" digit, the 16-symbol alphabet
//! `0123456789:;<=>?` decoded as `byte - 48`. The parser reconstructs the
//! displayed value from the exponent digit, the four value digits, the
//! measurement-type code and the three flag nibbles, applying the per-type
//! exponent correction the device uses internally.
//!
//! Layered structure, one concern per file:
//! - `layout`: byte offsets and alphabet constants (source of truth)
//! - `reader`: safe super-decimal byte access, no domain knowledge
//! - `parser`: domain-level decoding (no direct byte indexing)
//! - `error`: explicit, actionable errors
//!
//! Parsing is pure and contains no I/O; the `source` module handles framing
//! and the serial port.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::decode;
