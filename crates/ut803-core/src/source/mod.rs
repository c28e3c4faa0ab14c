//! Byte-stream sources feeding the decoder.
//!
//! Sources own all I/O: the framing reader extracts complete CR/LF records
//! from any `io::Read`, and the serial source adds port configuration and
//! the DTR/RTS power-up the meter's RS-232 transmitter needs. The decoder
//! itself never touches a stream.

mod frame;
mod serial;

pub use frame::FrameReader;
pub use serial::{SerialConfig, SerialSource, available_ports};

use thiserror::Error;

use crate::DecodeError;
use crate::protocol::layout;

/// One complete record payload, terminator stripped.
pub type Payload = [u8; layout::PAYLOAD_LEN];

/// Anything that can hand out complete 9-byte payloads, one per call.
///
/// `Ok(None)` always means the stream is finished. The serial source never
/// reports it; an idle meter blocks inside the source, which retries after
/// each read timeout.
pub trait PayloadSource {
    fn next_payload(&mut self) -> Result<Option<Payload>, SourceError>;
}

/// Errors raised while producing payloads.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(String),
    #[error("framing error: {0}")]
    Frame(#[from] DecodeError),
}
