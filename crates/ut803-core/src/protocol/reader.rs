use super::error::DecodeError;
use super::layout;

/// Safe super-decimal access to one 9-byte payload.
///
/// The reader knows the alphabet and the byte positions, nothing about
/// measurement semantics. Every accessor validates the digit range so the
/// parser never sees an out-of-alphabet byte.
pub struct PacketReader<'a> {
    payload: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn require_payload_len(&self) -> Result<(), DecodeError> {
        if self.payload.len() != layout::PAYLOAD_LEN {
            return Err(DecodeError::MalformedFraming {
                expected: layout::PAYLOAD_LEN,
                actual: self.payload.len(),
                missing_terminator: false,
            });
        }
        Ok(())
    }

    /// Super-decimal digit (0..=15) at a payload position.
    pub fn read_digit(&self, position: usize) -> Result<u8, DecodeError> {
        let byte = self
            .payload
            .get(position)
            .copied()
            .ok_or(DecodeError::MalformedFraming {
                expected: layout::PAYLOAD_LEN,
                actual: self.payload.len(),
                missing_terminator: false,
            })?;
        if !(layout::DIGIT_BASE..=layout::DIGIT_MAX).contains(&byte) {
            return Err(DecodeError::InvalidDigit { position, byte });
        }
        Ok(byte - layout::DIGIT_BASE)
    }

    pub fn read_exponent(&self) -> Result<u8, DecodeError> {
        self.read_digit(layout::EXPONENT_OFFSET)
    }

    pub fn read_type_code(&self) -> Result<u8, DecodeError> {
        self.read_digit(layout::TYPE_OFFSET)
    }

    /// Digit-weighted base value, most significant digit first.
    ///
    /// This is the device's convention, not a base conversion: digits above
    /// 9 are legal and contribute with the same decimal weights.
    pub fn read_base_value(&self) -> Result<u32, DecodeError> {
        let mut value = 0u32;
        for (index, position) in layout::DIGITS_RANGE.enumerate() {
            let digit = self.read_digit(position)?;
            value += u32::from(digit) * layout::DIGIT_WEIGHTS[index];
        }
        Ok(value)
    }

    /// The three flag nibbles, in wire order.
    pub fn read_flag_nibbles(&self) -> Result<[u8; 3], DecodeError> {
        let mut nibbles = [0u8; 3];
        for (slot, position) in layout::FLAGS_RANGE.enumerate() {
            nibbles[slot] = self.read_digit(position)?;
        }
        Ok(nibbles)
    }
}

#[cfg(test)]
mod tests {
    use super::PacketReader;
    use crate::DecodeError;

    #[test]
    fn digit_decoding_is_byte_minus_48_over_the_alphabet() {
        let payload: Vec<u8> = (0x30..=0x38).collect();
        let reader = PacketReader::new(&payload);
        for position in 0..9 {
            assert_eq!(reader.read_digit(position).unwrap(), position as u8);
        }
    }

    #[test]
    fn digit_decoding_accepts_the_upper_half_of_the_alphabet() {
        let payload = b"?>=<;:999";
        let reader = PacketReader::new(payload);
        assert_eq!(reader.read_digit(0).unwrap(), 15);
        assert_eq!(reader.read_digit(1).unwrap(), 14);
        assert_eq!(reader.read_digit(5).unwrap(), 10);
    }

    #[test]
    fn out_of_alphabet_byte_reports_its_position() {
        let mut payload = *b"000000000";
        payload[4] = b'A';
        let reader = PacketReader::new(&payload);
        assert_eq!(
            reader.read_digit(4),
            Err(DecodeError::InvalidDigit {
                position: 4,
                byte: b'A'
            })
        );
    }

    #[test]
    fn base_value_uses_decimal_weights_for_super_digits() {
        // digits 1, 15, 0, 2 -> 1*1000 + 15*100 + 0*10 + 2
        let reader = PacketReader::new(b"01?02;000");
        assert_eq!(reader.read_base_value().unwrap(), 2502);
    }

    #[test]
    fn base_value_spans_the_full_range() {
        assert_eq!(PacketReader::new(b"00000;000").read_base_value().unwrap(), 0);
        assert_eq!(
            PacketReader::new(b"0????;000").read_base_value().unwrap(),
            15 * 1111
        );
    }

    #[test]
    fn short_payload_is_malformed_framing() {
        let reader = PacketReader::new(b"0500");
        assert_eq!(
            reader.require_payload_len(),
            Err(DecodeError::MalformedFraming {
                expected: 9,
                actual: 4,
                missing_terminator: false
            })
        );
    }

    #[test]
    fn flag_nibbles_come_back_in_wire_order() {
        let reader = PacketReader::new(b"00000;18:");
        assert_eq!(reader.read_flag_nibbles().unwrap(), [1, 8, 10]);
    }
}
