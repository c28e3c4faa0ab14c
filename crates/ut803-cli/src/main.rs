use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use ut803_core::{
    FrameReader, Measurement, PayloadSource, SerialSource, SourceError, available_ports, decode,
    scale_for_display,
};

/// The meter sends each reading twice; a second copy arriving within this
/// window is dropped.
const DUPLICATE_WINDOW: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "ut803")]
#[command(version)]
#[command(
    about = "Record and decode readings from a UNI-T UT803 bench multimeter.",
    long_about = None,
    after_help = "Examples:\n  ut803 log /dev/ttyUSB0 -o session.log --monitor\n  ut803 decode capture.bin --stdout --pretty\n  ut803 ports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read live measurements from a connected meter and log them.
    #[command(
        after_help = "Examples:\n  ut803 log /dev/ttyUSB0 -o session.log\n  ut803 log /dev/ttyUSB0 --stdout --monitor --delay 1"
    )]
    Log {
        /// Serial port the meter is connected to (RS-232 or USB bridge)
        port: String,

        /// Output log path
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        output: Option<PathBuf>,

        /// Write log rows to stdout
        #[arg(long, conflicts_with = "output")]
        stdout: bool,

        /// Render a live status line with the current value and flags
        #[arg(long)]
        monitor: bool,

        /// Pause for the given number of seconds between records
        #[arg(short = 'd', long)]
        delay: Option<u64>,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,
    },

    /// Decode a captured raw byte stream into a JSON report.
    #[command(
        after_help = "Examples:\n  ut803 decode capture.bin -o readings.json\n  cat capture.bin | ut803 decode - --stdout"
    )]
    Decode {
        /// Path to a raw capture of the serial stream, or - for stdin
        input: PathBuf,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write the JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "compact")]
        pretty: bool,

        /// Compact JSON output (default)
        #[arg(long)]
        compact: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,

        /// Exit with a non-zero code if any record failed to decode
        #[arg(long)]
        strict: bool,
    },

    /// List serial ports visible on this machine.
    Ports,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Log {
            port,
            output,
            stdout,
            monitor,
            delay,
            quiet,
        } => cmd_log(port, output, stdout, monitor, delay, quiet),
        Commands::Decode {
            input,
            report,
            stdout,
            pretty,
            compact,
            quiet,
            strict,
        } => cmd_decode(input, report, stdout, pretty, compact, quiet, strict),
        Commands::Ports => cmd_ports(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(err.to_string(), None)
    }
}

fn cmd_log(
    port: String,
    output: Option<PathBuf>,
    stdout: bool,
    monitor: bool,
    delay: Option<u64>,
    quiet: bool,
) -> Result<(), CliError> {
    let mut source = SerialSource::open(&port).map_err(|err| {
        CliError::new(
            format!("failed to open serial port: {err}"),
            Some("run `ut803 ports` to list available devices".to_string()),
        )
    })?;

    let mut sink: Box<dyn Write> = if stdout {
        Box::new(io::stdout())
    } else {
        let path = output.expect("output required when not using stdout");
        let file = File::create(&path)
            .with_context(|| format!("Failed to create log file: {}", path.display()))?;
        Box::new(file)
    };

    if !quiet {
        eprintln!("OK: reading from {port} (Ctrl-C to stop)");
    }
    run_log_loop(&mut source, &mut sink, monitor, delay, quiet)
}

/// The live readout loop, shaped after the meter's quirks: every reading
/// arrives twice (de-duplicated by arrival time), and a mode-switch on the
/// rotary dial starts a fresh log section with its own time origin.
fn run_log_loop(
    source: &mut dyn PayloadSource,
    sink: &mut dyn Write,
    monitor: bool,
    delay: Option<u64>,
    quiet: bool,
) -> Result<(), CliError> {
    let mut section: Option<(String, Instant)> = None;
    let mut last_row: Option<Instant> = None;

    loop {
        let payload = match source.next_payload() {
            Ok(Some(payload)) => payload,
            // End of stream. The serial source blocks while the meter is
            // idle, so in live use this loop runs until Ctrl-C.
            Ok(None) => return Ok(()),
            Err(SourceError::Frame(err)) => {
                if !quiet {
                    eprintln!("warning: record skipped: {err}");
                }
                continue;
            }
            Err(err) => {
                return Err(CliError::new(
                    format!("serial read failed: {err}"),
                    Some("check the cable and the DTR/RTS power wiring".to_string()),
                ));
            }
        };

        let measurement = match decode(&payload) {
            Ok(measurement) => measurement,
            Err(err) => {
                if !quiet {
                    eprintln!("warning: record skipped: {err}");
                }
                continue;
            }
        };

        let section_key = format!("{} ({})", measurement.kind.label(), measurement.unit);
        let new_section = section
            .as_ref()
            .map(|(key, _)| *key != section_key)
            .unwrap_or(true);
        if new_section {
            write_section_header(sink, &measurement, &section_key)?;
            section = Some((section_key, Instant::now()));
            last_row = None;
        }

        let origin = section.as_ref().map(|(_, origin)| *origin).unwrap();
        let now = Instant::now();
        if let Some(previous) = last_row {
            if now.duration_since(previous) < DUPLICATE_WINDOW {
                continue;
            }
        }
        last_row = Some(now);

        let elapsed = now.duration_since(origin).as_secs_f64();
        writeln!(
            sink,
            "{:.1}\t{}\t{}",
            elapsed,
            measurement.value,
            if measurement.flags.overload { "1" } else { "0" }
        )
        .context("Failed to write log row")?;
        sink.flush().context("Failed to flush log")?;

        if monitor {
            print_monitor_line(&measurement);
        }
        if let Some(seconds) = delay {
            thread::sleep(Duration::from_secs(seconds));
        }
    }
}

fn write_section_header(
    sink: &mut dyn Write,
    measurement: &Measurement,
    section_key: &str,
) -> Result<(), CliError> {
    let started = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());
    writeln!(
        sink,
        "# started: {}; initial flags: {}\n#time(s)\t{}\toverload",
        started,
        measurement.flags.active_labels().join(", "),
        section_key,
    )
    .context("Failed to write log header")?;
    Ok(())
}

fn print_monitor_line(measurement: &Measurement) {
    let (value, unit) = scale_for_display(measurement.value, &measurement.unit);
    eprint!(
        "\r\x1b[0K{}: {:.2} {}, flags: {}",
        measurement.kind.label(),
        value,
        unit,
        measurement.flags.active_labels().join(" ")
    );
    let _ = io::stderr().flush();
}

fn cmd_decode(
    input: PathBuf,
    report: Option<PathBuf>,
    stdout: bool,
    pretty: bool,
    compact: bool,
    quiet: bool,
    strict: bool,
) -> Result<(), CliError> {
    let raw = read_input(&input)?;

    let mut frames = FrameReader::new(Cursor::new(raw));
    let mut rows: Vec<serde_json::Value> = Vec::new();
    let mut failures = 0u64;
    let mut record = 0u64;
    loop {
        record += 1;
        let payload = match frames.next_payload() {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(SourceError::Frame(err)) => {
                failures += 1;
                if !quiet {
                    eprintln!("warning: record {record}: {err}");
                }
                continue;
            }
            Err(err) => {
                return Err(CliError::new(format!("failed to read input: {err}"), None));
            }
        };
        match decode(&payload) {
            Ok(measurement) => {
                let mut row = serde_json::to_value(&measurement)
                    .context("JSON serialization failed")?;
                if let Some(object) = row.as_object_mut() {
                    object.insert("record".to_string(), serde_json::json!(record));
                }
                rows.push(row);
            }
            Err(err) => {
                failures += 1;
                if !quiet {
                    eprintln!("warning: record {record}: {err}");
                }
            }
        }
    }

    let json = serialize_rows(&rows, pretty, compact)?;

    if stdout {
        print!("{}", json);
    } else {
        let report = report.expect("report required when not using stdout");
        if let Some(parent) = report.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        fs::write(&report, json)
            .with_context(|| format!("Failed to write report: {}", report.display()))?;
        if !quiet {
            eprintln!("OK: report written -> {}", report.display());
        }
    }

    if strict && failures > 0 {
        return Err(CliError::new(
            format!("{failures} record(s) failed to decode"),
            Some("drop --strict to skip undecodable records".to_string()),
        ));
    }
    Ok(())
}

fn read_input(input: &PathBuf) -> Result<Vec<u8>, CliError> {
    if input.as_os_str() == "-" {
        let mut raw = Vec::new();
        io::stdin()
            .read_to_end(&mut raw)
            .context("Failed to read stdin")?;
        return Ok(raw);
    }
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("pass a raw capture of the serial stream, or - for stdin".to_string()),
        ));
    }
    fs::read(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))
        .map_err(Into::into)
}

fn serialize_rows(
    rows: &[serde_json::Value],
    pretty: bool,
    compact: bool,
) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rows)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rows)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn cmd_ports() -> Result<(), CliError> {
    let ports = available_ports()
        .map_err(|err| CliError::new(format!("failed to list serial ports: {err}"), None))?;
    if ports.is_empty() {
        eprintln!("no serial ports found");
        return Ok(());
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ut803_core::{Payload, PayloadSource, SourceError};

    use super::run_log_loop;

    struct ScriptedSource {
        payloads: VecDeque<Payload>,
    }

    impl ScriptedSource {
        fn new(payloads: &[&[u8; 9]]) -> Self {
            Self {
                payloads: payloads.iter().map(|payload| **payload).collect(),
            }
        }
    }

    impl PayloadSource for ScriptedSource {
        fn next_payload(&mut self) -> Result<Option<Payload>, SourceError> {
            Ok(self.payloads.pop_front())
        }
    }

    fn run_to_log(payloads: &[&[u8; 9]]) -> String {
        let mut source = ScriptedSource::new(payloads);
        let mut sink = Vec::new();
        run_log_loop(&mut source, &mut sink, false, None, true).expect("log loop");
        String::from_utf8(sink).expect("utf8 log")
    }

    #[test]
    fn log_loop_returns_when_the_source_ends() {
        assert!(run_to_log(&[]).is_empty());
    }

    #[test]
    fn log_loop_writes_a_section_header_and_rows() {
        let log = run_to_log(&[b"05000;00:"]);
        let lines: Vec<&str> = log.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("# started: "));
        assert!(lines[0].ends_with("initial flags: autorange, dc"));
        assert_eq!(lines[1], "#time(s)\tvoltage (V)\toverload");
        assert_eq!(lines[2], "0.0\t5\t0");
    }

    #[test]
    fn log_loop_marks_overload_rows() {
        let log = run_to_log(&[b"19999310:"]);
        let row = log.lines().last().expect("one row");
        assert_eq!(row, "0.0\t9999\t1");
    }

    #[test]
    fn log_loop_suppresses_the_meters_duplicate_records() {
        // The meter sends every reading twice; scripted records arrive
        // back to back, well inside the 50 ms window.
        let log = run_to_log(&[b"05000;00:", b"05000;00:"]);
        let rows: Vec<&str> = log
            .lines()
            .filter(|line| !line.starts_with('#'))
            .collect();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn log_loop_starts_a_new_section_when_the_mode_changes() {
        let log = run_to_log(&[b"05000;00:", b"002154800"]);

        let headers: Vec<&str> = log
            .lines()
            .filter(|line| line.starts_with("#time(s)"))
            .collect();
        assert_eq!(
            headers,
            vec![
                "#time(s)\tvoltage (V)\toverload",
                "#time(s)\ttemperature (°C)\toverload"
            ]
        );

        // A fresh section has its own time origin and no pending duplicate
        // window, so the temperature row lands despite arriving instantly.
        let rows: Vec<&str> = log
            .lines()
            .filter(|line| !line.starts_with('#'))
            .collect();
        assert_eq!(rows, vec!["0.0\t5\t0", "0.0\t215\t0"]);
    }

    #[test]
    fn log_loop_skips_undecodable_records() {
        // Unassigned mode code 7 first; the loop continues with the next
        // record and no section is opened for the bad one.
        let log = run_to_log(&[b"000007000", b"05000;00:"]);
        let lines: Vec<&str> = log.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "#time(s)\tvoltage (V)\toverload");
        assert_eq!(lines[2], "0.0\t5\t0");
    }
}
