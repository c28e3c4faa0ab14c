use super::error::DecodeError;
use super::layout;
use super::reader::PacketReader;
use crate::{FlagSet, Measurement, MeasurementKind};

/// Decode one 9-byte UT803 payload into a [`Measurement`].
///
/// Pure function of the input bytes: no I/O, no shared state, safe to call
/// concurrently. The payload is the record with CR/LF already stripped by
/// the framing layer.
///
/// # Examples
/// ```
/// use ut803_core::{decode, MeasurementKind};
///
/// let measurement = decode(b"30500;000")?;
/// assert_eq!(measurement.kind, MeasurementKind::Voltage);
/// assert_eq!(measurement.value, 500.0);
/// # Ok::<(), ut803_core::DecodeError>(())
/// ```
pub fn decode(payload: &[u8]) -> Result<Measurement, DecodeError> {
    let reader = PacketReader::new(payload);
    reader.require_payload_len()?;

    // Validate the whole alphabet up front so a bad byte is reported for
    // its position even when a later decode step would hit it first.
    for position in 0..layout::PAYLOAD_LEN {
        reader.read_digit(position)?;
    }

    let code = reader.read_type_code()?;
    let kind = kind_for_code(code).ok_or(DecodeError::UnknownMeasurementType { code })?;

    let base = reader.read_base_value()?;
    let exponent = reader.read_exponent()?;
    let flags = flags_from_nibbles(reader.read_flag_nibbles()?);

    let (offset, unit) = scale_for(kind, exponent, &flags)?;
    let mut value = f64::from(base) * 10f64.powi(i32::from(exponent) - offset);
    if flags.negative {
        value = -value;
    }

    Ok(Measurement {
        kind,
        value,
        unit: unit.to_string(),
        flags,
    })
}

/// Measurement-type table: super-decimal code -> kind.
fn kind_for_code(code: u8) -> Option<MeasurementKind> {
    match code {
        1 => Some(MeasurementKind::DiodeTest),
        2 => Some(MeasurementKind::Frequency),
        3 => Some(MeasurementKind::Resistance),
        4 => Some(MeasurementKind::Temperature),
        5 => Some(MeasurementKind::Continuity),
        6 => Some(MeasurementKind::Capacitance),
        9 => Some(MeasurementKind::CurrentAmps),
        11 => Some(MeasurementKind::Voltage),
        13 => Some(MeasurementKind::CurrentMicroAmps),
        14 => Some(MeasurementKind::Hfe),
        15 => Some(MeasurementKind::CurrentMilliAmps),
        _ => None,
    }
}

/// Exponent-offset table: kind (and, for voltage and temperature, the
/// relevant flag bits) -> (offset, unit).
///
/// Exponent digits with the 0x8 bit set are outside every published range
/// table; they are rejected rather than scaled with a guessed default.
fn scale_for(
    kind: MeasurementKind,
    exponent: u8,
    flags: &FlagSet,
) -> Result<(i32, &'static str), DecodeError> {
    if exponent & 0x8 != 0 {
        return Err(DecodeError::UnsupportedCombination { kind, exponent });
    }
    let entry = match kind {
        MeasurementKind::DiodeTest => (0, "V"),
        MeasurementKind::Frequency => (0, "Hz"),
        MeasurementKind::Resistance => (1, "Ω"),
        MeasurementKind::Temperature => (0, if flags.celsius { "°C" } else { "°F" }),
        MeasurementKind::Continuity => (1, "Ω"),
        MeasurementKind::Capacitance => (12, "F"),
        MeasurementKind::CurrentAmps => (2, "A"),
        // The 0x4 exponent bit selects the millivolt sub-range: larger
        // offset, and the reading is reported in mV.
        MeasurementKind::Voltage => {
            if exponent & 0x4 != 0 {
                (5, "mV")
            } else {
                (3, "V")
            }
        }
        MeasurementKind::CurrentMicroAmps => (1, "µA"),
        MeasurementKind::Hfe => (0, ""),
        MeasurementKind::CurrentMilliAmps => (2, "mA"),
    };
    Ok(entry)
}

fn flags_from_nibbles(nibbles: [u8; 3]) -> FlagSet {
    let [status, hold, mode] = nibbles;
    FlagSet {
        overload: status & 0x1 != 0,
        negative: status & 0x4 != 0,
        celsius: status & 0x8 != 0,
        min_hold: hold & 0x2 != 0,
        max_hold: hold & 0x4 != 0,
        data_hold: hold & 0x8 != 0,
        auto_range: mode & 0x2 != 0,
        ac_true_rms: mode & 0x4 != 0,
        dc: mode & 0x8 != 0,
        raw: nibbles,
    }
}
