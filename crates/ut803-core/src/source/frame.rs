use std::io::{self, Read};

use super::{Payload, PayloadSource, SourceError};
use crate::DecodeError;
use crate::protocol::layout;

/// Framing layer: accumulates bytes until a CR/LF-terminated record is
/// complete and hands out exactly one 9-byte payload per call.
///
/// A malformed record (wrong length, or LF without a preceding CR) is
/// reported and consumed; the reader stays usable, so callers can
/// resynchronize by simply asking for the next payload.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(2 * layout::FRAME_LEN),
            eof: false,
        }
    }

    /// Extract the next complete record from the buffer, if one is there.
    fn take_record(&mut self) -> Option<Result<Payload, SourceError>> {
        let lf = self.buf.iter().position(|&b| b == layout::LF)?;
        let line: Vec<u8> = self.buf.drain(..=lf).collect();
        let body = &line[..line.len() - 1];
        Some(match body.strip_suffix(&[layout::CR]) {
            Some(payload) if payload.len() == layout::PAYLOAD_LEN => {
                let mut record = [0u8; layout::PAYLOAD_LEN];
                record.copy_from_slice(payload);
                Ok(record)
            }
            Some(payload) => Err(wrong_length(payload.len())),
            // A bare LF means the stream desynchronized, even when the
            // byte count happens to match.
            None => Err(unterminated(body.len())),
        })
    }
}

impl<R: Read> PayloadSource for FrameReader<R> {
    fn next_payload(&mut self) -> Result<Option<Payload>, SourceError> {
        loop {
            if let Some(record) = self.take_record() {
                return record.map(Some);
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // Trailing bytes with no terminator: report once, then
                // signal end of stream on the next call.
                let actual = self.buf.len();
                self.buf.clear();
                return Err(unterminated(actual));
            }
            let mut chunk = [0u8; 64];
            match self.inner.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(SourceError::Io(err)),
            }
        }
    }
}

fn wrong_length(actual: usize) -> SourceError {
    SourceError::Frame(DecodeError::MalformedFraming {
        expected: layout::PAYLOAD_LEN,
        actual,
        missing_terminator: false,
    })
}

fn unterminated(actual: usize) -> SourceError {
    SourceError::Frame(DecodeError::MalformedFraming {
        expected: layout::PAYLOAD_LEN,
        actual,
        missing_terminator: true,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::FrameReader;
    use crate::source::{PayloadSource, SourceError};
    use crate::DecodeError;

    #[test]
    fn yields_one_payload_per_record() {
        let stream = b"30500;000\r\n43999;000\r\n".to_vec();
        let mut frames = FrameReader::new(Cursor::new(stream));

        assert_eq!(frames.next_payload().unwrap(), Some(*b"30500;000"));
        assert_eq!(frames.next_payload().unwrap(), Some(*b"43999;000"));
        assert_eq!(frames.next_payload().unwrap(), None);
    }

    #[test]
    fn short_record_is_reported_and_skipped() {
        let stream = b"0500\r\n30500;000\r\n".to_vec();
        let mut frames = FrameReader::new(Cursor::new(stream));

        let err = frames.next_payload().unwrap_err();
        assert!(matches!(
            err,
            SourceError::Frame(DecodeError::MalformedFraming {
                expected: 9,
                actual: 4,
                missing_terminator: false
            })
        ));
        assert!(err.to_string().contains("expected 9 payload bytes, got 4"));
        // The reader resynchronizes on the next line.
        assert_eq!(frames.next_payload().unwrap(), Some(*b"30500;000"));
        assert_eq!(frames.next_payload().unwrap(), None);
    }

    #[test]
    fn lf_without_cr_is_reported_as_unterminated() {
        // Nine payload bytes but no CR: the error must not read like a
        // length mismatch ("expected 9, got 9").
        let stream = b"30500;000\n".to_vec();
        let mut frames = FrameReader::new(Cursor::new(stream));

        let err = frames.next_payload().unwrap_err();
        assert!(matches!(
            err,
            SourceError::Frame(DecodeError::MalformedFraming {
                actual: 9,
                missing_terminator: true,
                ..
            })
        ));
        assert!(
            err.to_string()
                .contains("not terminated by CR/LF after 9 bytes")
        );
    }

    #[test]
    fn eof_without_terminator_is_malformed_then_end_of_stream() {
        let stream = b"30500;000\r\n30500;0".to_vec();
        let mut frames = FrameReader::new(Cursor::new(stream));

        assert_eq!(frames.next_payload().unwrap(), Some(*b"30500;000"));
        let err = frames.next_payload().unwrap_err();
        assert!(matches!(
            err,
            SourceError::Frame(DecodeError::MalformedFraming {
                actual: 7,
                missing_terminator: true,
                ..
            })
        ));
        assert_eq!(frames.next_payload().unwrap(), None);
    }

    #[test]
    fn empty_stream_ends_immediately() {
        let mut frames = FrameReader::new(Cursor::new(Vec::new()));
        assert_eq!(frames.next_payload().unwrap(), None);
    }

    #[test]
    fn records_split_across_reads_are_reassembled() {
        // Cursor delivers everything at once, so stitch two cursors by hand.
        struct TwoChunks(Vec<Vec<u8>>);
        impl std::io::Read for TwoChunks {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                match self.0.pop() {
                    Some(chunk) => {
                        buf[..chunk.len()].copy_from_slice(&chunk);
                        Ok(chunk.len())
                    }
                    None => Ok(0),
                }
            }
        }

        let chunks = TwoChunks(vec![b"0;000\r\n".to_vec(), b"3050".to_vec()]);
        let mut frames = FrameReader::new(chunks);
        assert_eq!(frames.next_payload().unwrap(), Some(*b"30500;000"));
        assert_eq!(frames.next_payload().unwrap(), None);
    }
}
