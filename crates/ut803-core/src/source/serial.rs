use std::io;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::frame::FrameReader;
use super::{Payload, PayloadSource, SourceError};

/// Serial parameters the caller may tune.
///
/// The frame format itself (7 data bits, odd parity, 1 stop bit, XON/XOFF)
/// is fixed by the meter and not configurable.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate; the UT803 talks at 19200.
    pub baud_rate: u32,
    /// Timeout for each underlying port read. The source retries after a
    /// timeout, so an idle meter blocks [`PayloadSource::next_payload`]
    /// rather than surfacing an error or a premature end of stream.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 19200,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Live serial source for a connected UT803.
///
/// Opening the port asserts DTR and clears RTS: the meter's RS-232
/// transmitter is powered from the handshake lines and stays silent
/// otherwise. Records then flow through a [`FrameReader`].
pub struct SerialSource {
    frames: FrameReader<Box<dyn SerialPort>>,
}

impl SerialSource {
    /// Open `path` (e.g. `/dev/ttyUSB0` or `COM3`) with default settings.
    pub fn open(path: &str) -> Result<Self, SourceError> {
        Self::open_with_config(path, SerialConfig::default())
    }

    pub fn open_with_config(path: &str, config: SerialConfig) -> Result<Self, SourceError> {
        let mut port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Seven)
            .parity(Parity::Odd)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Software)
            .timeout(config.timeout)
            .open()
            .map_err(|err| SourceError::Serial(format!("{path}: {err}")))?;

        port.write_data_terminal_ready(true)
            .map_err(|err| SourceError::Serial(format!("{path}: DTR: {err}")))?;
        port.write_request_to_send(false)
            .map_err(|err| SourceError::Serial(format!("{path}: RTS: {err}")))?;

        Ok(Self {
            frames: FrameReader::new(port),
        })
    }
}

impl PayloadSource for SerialSource {
    fn next_payload(&mut self) -> Result<Option<Payload>, SourceError> {
        loop {
            match self.frames.next_payload() {
                // Partial bytes stay buffered in the frame reader, so a
                // timeout mid-record does not lose data.
                Err(SourceError::Io(err)) if err.kind() == io::ErrorKind::TimedOut => {}
                other => return other,
            }
        }
    }
}

/// Names of the serial ports visible on this machine.
pub fn available_ports() -> Result<Vec<String>, SourceError> {
    let ports = serialport::available_ports().map_err(|err| SourceError::Serial(err.to_string()))?;
    let mut names: Vec<String> = ports.into_iter().map(|info| info.port_name).collect();
    names.sort();
    Ok(names)
}
