//! UT803 core library: serial telemetry decoding for UNI-T UT803 multimeters.
//!
//! This crate implements the readout pipeline used by the CLI: byte-stream
//! sources feed the framing layer, which hands complete 9-byte payloads to
//! the protocol decoder (layout/reader/parser). Decoding is byte-oriented and
//! side-effect free; all I/O is isolated in `source` modules. Protocol byte
//! positions live in `protocol::layout` so the parser never indexes raw
//! offsets directly.
//!
//! Invariants:
//! - `decode` is a pure function of the payload; malformed input yields a
//!   typed [`DecodeError`], never a panic.
//! - One [`Measurement`] per successfully decoded record; the caller owns it.
//! - Reserved flag bits are preserved verbatim in [`FlagSet::raw`].
//!
//! # Examples
//! ```
//! use ut803_core::decode;
//!
//! // 5.000 V, DC, auto-range: exponent 0, digits 5000, type ';' (voltage).
//! let measurement = decode(b"05000;00:")?;
//! assert_eq!(measurement.unit, "V");
//! assert_eq!(measurement.value, 5.0);
//! # Ok::<(), ut803_core::DecodeError>(())
//! ```

use serde::{Deserialize, Serialize};

mod protocol;
mod source;

pub use protocol::error::DecodeError;
pub use protocol::{decode, layout};
pub use source::{
    FrameReader, Payload, PayloadSource, SerialConfig, SerialSource, SourceError, available_ports,
};

/// What the meter's rotary switch was measuring.
///
/// Each variant maps from one super-decimal type code in the packet. The
/// three current variants share a physical quantity but differ in which
/// display range the meter used, which changes both the reported unit and
/// the exponent correction.
///
/// # Examples
/// ```
/// use ut803_core::MeasurementKind;
///
/// assert_eq!(MeasurementKind::Voltage.label(), "voltage");
/// assert_eq!(MeasurementKind::CurrentMilliAmps.label(), "current");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementKind {
    #[serde(rename = "diode")]
    DiodeTest,
    #[serde(rename = "frequency")]
    Frequency,
    #[serde(rename = "resistance")]
    Resistance,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "continuity")]
    Continuity,
    #[serde(rename = "capacitance")]
    Capacitance,
    #[serde(rename = "current")]
    CurrentAmps,
    #[serde(rename = "voltage")]
    Voltage,
    #[serde(rename = "current_micro")]
    CurrentMicroAmps,
    #[serde(rename = "hfe")]
    Hfe,
    #[serde(rename = "current_milli")]
    CurrentMilliAmps,
}

impl MeasurementKind {
    /// Human-readable label for log headers and the monitor line.
    ///
    /// All three current ranges display as "current"; the range is visible
    /// through the unit instead.
    pub fn label(&self) -> &'static str {
        match self {
            MeasurementKind::DiodeTest => "diode",
            MeasurementKind::Frequency => "frequency",
            MeasurementKind::Resistance => "resistance",
            MeasurementKind::Temperature => "temperature",
            MeasurementKind::Continuity => "continuity",
            MeasurementKind::Capacitance => "capacitance",
            MeasurementKind::CurrentAmps
            | MeasurementKind::CurrentMicroAmps
            | MeasurementKind::CurrentMilliAmps => "current",
            MeasurementKind::Voltage => "voltage",
            MeasurementKind::Hfe => "hFE",
        }
    }
}

/// Status bits carried alongside every reading.
///
/// Nine documented flags across three 4-bit nibbles. The remaining bits are
/// reserved by the protocol; they are kept verbatim in [`FlagSet::raw`] so a
/// record can be re-examined if the protocol turns out to use them.
///
/// # Examples
/// ```
/// use ut803_core::FlagSet;
///
/// let flags = FlagSet {
///     auto_range: true,
///     dc: true,
///     ..FlagSet::default()
/// };
/// assert_eq!(flags.active_labels(), vec!["autorange", "dc"]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    /// Input out of range for the selected range.
    pub overload: bool,
    /// Reading is negative (the sign is already applied to the value).
    pub negative: bool,
    /// Set unless the display unit is Fahrenheit. Meaningful for
    /// temperature; the meter keeps it set in every other mode.
    pub celsius: bool,
    /// MIN hold active.
    pub min_hold: bool,
    /// MAX hold active.
    pub max_hold: bool,
    /// Data hold active.
    pub data_hold: bool,
    /// Auto-ranging (as opposed to a manually selected range).
    pub auto_range: bool,
    /// AC measurement (true RMS).
    pub ac_true_rms: bool,
    /// DC measurement.
    pub dc: bool,
    /// The three flag nibbles exactly as received, reserved bits included.
    pub raw: [u8; 3],
}

impl FlagSet {
    /// Labels of the flags currently set, in packet bit order.
    ///
    /// Used by the log header and the monitor line; `celsius` is omitted
    /// because it is set in almost every packet and carries no information
    /// outside temperature mode.
    pub fn active_labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.overload {
            labels.push("overload");
        }
        if self.negative {
            labels.push("negative");
        }
        if self.min_hold {
            labels.push("min");
        }
        if self.max_hold {
            labels.push("max");
        }
        if self.data_hold {
            labels.push("hold");
        }
        if self.auto_range {
            labels.push("autorange");
        }
        if self.ac_true_rms {
            labels.push("ac");
        }
        if self.dc {
            labels.push("dc");
        }
        labels
    }
}

/// One decoded meter reading.
///
/// Immutable once produced; the decoder hands ownership to the caller, which
/// may log it, render it, or drop it.
///
/// # Examples
/// ```
/// use ut803_core::decode;
///
/// let measurement = decode(b"199993102")?;
/// assert_eq!(measurement.unit, "Ω");
/// assert!(measurement.flags.overload);
/// # Ok::<(), ut803_core::DecodeError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Measurement mode the meter was in.
    pub kind: MeasurementKind,
    /// Numeric value with sign and exponent correction applied, expressed
    /// in `unit`.
    pub value: f64,
    /// Display unit ("V", "mV", "Ω", "°C", ... or "" for hFE).
    pub unit: String,
    /// Status flags from the three flag nibbles.
    pub flags: FlagSet,
}

/// Rescale a value into engineering range and prefix the unit accordingly.
///
/// Picks the SI prefix (p/n/µ/m, none, k/M) that places the magnitude in
/// `[1, 1000)`. Zero passes through unscaled. Used by the monitor line.
///
/// # Examples
/// ```
/// use ut803_core::scale_for_display;
///
/// assert_eq!(scale_for_display(0.047, "F"), (47.0, "mF".to_string()));
/// assert_eq!(scale_for_display(-1500.0, "Hz"), (-1.5, "kHz".to_string()));
/// ```
pub fn scale_for_display(value: f64, unit: &str) -> (f64, String) {
    let magnitude = value.abs();
    if magnitude == 0.0 {
        return (value, unit.to_string());
    }
    let (factor, prefix) = if magnitude < 1e-9 {
        (1e12, "p")
    } else if magnitude < 1e-6 {
        (1e9, "n")
    } else if magnitude < 1e-3 {
        (1e6, "µ")
    } else if magnitude < 1.0 {
        (1e3, "m")
    } else if magnitude < 1e3 {
        (1.0, "")
    } else if magnitude < 1e6 {
        (1e-3, "k")
    } else {
        (1e-6, "M")
    };
    (value * factor, format!("{prefix}{unit}"))
}
