use serde::Deserialize;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CommandConfig;
use crate::types::BatteryReading;

const WAIT_STEP: Duration = Duration::from_millis(10);
const DRAIN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command did not finish within {0:?}")]
    Timeout(Duration),
}

/// How the percentage in front of `%` is extracted.
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PercentParser {
    /// Longest run of digits directly before `%`.
    #[default]
    Digits,
    /// The three characters before `%`, whitespace-trimmed. Near the
    /// start of the text the window wraps around to the end of the text
    /// the way a negative slice start does, so `"55%, x"` gives an empty
    /// window. `", 9%"` does not parse in this mode.
    Legacy,
}

pub trait BatteryReader {
    /// Never fails: problems surface as a reading without a level.
    fn read(&mut self) -> BatteryReading;
}

/// Reads the battery by running `acpi -b` (or a configured equivalent).
pub struct AcpiReader {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    parser: PercentParser,
}

impl AcpiReader {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration, parser: PercentParser) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            parser,
        }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
            config.percent_parser,
        )
    }

    fn run_command(&self) -> Result<String, ReadError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ReadError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Drain stdout concurrently so a chatty command never blocks on a
        // full pipe.
        let (tx, rx) = mpsc::channel();
        let stdout = child.stdout.take();
        std::thread::spawn(move || {
            let mut raw = Vec::new();
            if let Some(mut stdout) = stdout {
                let _ = tx.send(stdout.read_to_end(&mut raw).map(|_| raw));
            }
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    debug!("Failed to kill '{}': {}", self.program, e);
                }
                let _ = child.wait();
                return Err(ReadError::Timeout(self.timeout));
            }
            std::thread::sleep(WAIT_STEP);
        };
        debug!("'{}' exited with {}", self.program, status);

        // A background grandchild may still hold the pipe open.
        let remaining = deadline.saturating_duration_since(Instant::now()).max(DRAIN_GRACE);
        let raw = match rx.recv_timeout(remaining) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => return Err(ReadError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Vec::new(),
        };
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl BatteryReader for AcpiReader {
    fn read(&mut self) -> BatteryReading {
        match self.run_command() {
            Ok(output) => parse_battery_output(&output, self.parser),
            Err(e) => {
                warn!("Battery status unavailable: {}", e);
                BatteryReading::unavailable()
            }
        }
    }
}

/// Turn status command output into a reading. Only the first `%` counts.
pub fn parse_battery_output(output: &str, parser: PercentParser) -> BatteryReading {
    let text = output.trim();
    let Some(idx) = text.find('%') else {
        return BatteryReading::unavailable();
    };

    let head = &text[..idx];
    let percent = match parser {
        PercentParser::Digits => trailing_digits(head),
        PercentParser::Legacy => three_char_window(text, idx),
    };

    match percent {
        Some(percent) => BatteryReading::from_percent(percent, text),
        None => {
            debug!("No percentage in front of '%' in {:?}", text);
            BatteryReading::unparsed(text)
        }
    }
}

fn trailing_digits(head: &str) -> Option<u32> {
    let start = head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let digits = &head[start..];
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn three_char_window(text: &str, percent_at: usize) -> Option<u32> {
    let chars: Vec<char> = text.chars().collect();
    let end = text[..percent_at].chars().count();
    let start = match end.checked_sub(3) {
        Some(start) => start,
        None => (chars.len() + end).saturating_sub(3),
    };
    if start >= end {
        return None;
    }
    chars[start..end].iter().collect::<String>().trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NO_DATA_TEXT;

    const DISCHARGING: &str = "Battery 0: Discharging, 87%, 02:14:22 remaining";

    #[test]
    fn parses_acpi_line() {
        let reading = parse_battery_output(&format!("{DISCHARGING}\n"), PercentParser::Digits);
        assert_eq!(reading.level, Some(0.87));
        assert_eq!(reading.description, DISCHARGING);
    }

    #[test]
    fn legacy_parses_two_digit_line() {
        let reading = parse_battery_output(DISCHARGING, PercentParser::Legacy);
        assert_eq!(reading.level, Some(0.87));
        assert_eq!(reading.description, DISCHARGING);
    }

    #[test]
    fn full_battery() {
        let text = "Battery 0: Full, 100%";
        assert_eq!(parse_battery_output(text, PercentParser::Digits).level, Some(1.0));
        assert_eq!(parse_battery_output(text, PercentParser::Legacy).level, Some(1.0));
    }

    #[test]
    fn no_percent_sign_means_no_data() {
        let reading = parse_battery_output("No support for device type: power_supply", PercentParser::Digits);
        assert_eq!(reading.level, None);
        assert_eq!(reading.description, NO_DATA_TEXT);

        let reading = parse_battery_output("", PercentParser::Legacy);
        assert_eq!(reading, BatteryReading::unavailable());
    }

    #[test]
    fn single_digit_with_punctuation() {
        let text = "Battery 0: Discharging, 9%, 00:10:00 remaining";

        // The fixed window sees ", 9" and gives up.
        let legacy = parse_battery_output(text, PercentParser::Legacy);
        assert_eq!(legacy.level, None);
        assert_eq!(legacy.description, text);

        let digits = parse_battery_output(text, PercentParser::Digits);
        assert_eq!(digits.level, Some(0.09));
        assert_eq!(digits.description, text);
    }

    #[test]
    fn legacy_window_at_start_of_text() {
        assert_eq!(parse_battery_output("5%", PercentParser::Legacy).level, Some(0.05));
    }

    #[test]
    fn legacy_window_wraps_when_text_follows() {
        let reading = parse_battery_output("55%, x", PercentParser::Legacy);
        assert_eq!(reading.level, None);
        assert_eq!(reading.description, "55%, x");

        assert_eq!(parse_battery_output("55%, x", PercentParser::Digits).level, Some(0.55));
        assert_eq!(parse_battery_output("55%", PercentParser::Legacy).level, Some(0.55));
    }

    #[test]
    fn percent_without_digits_keeps_text() {
        let reading = parse_battery_output("  charge: ?%  ", PercentParser::Digits);
        assert_eq!(reading.level, None);
        assert_eq!(reading.description, "charge: ?%");
    }

    #[test]
    fn only_first_percent_counts() {
        let text = "Battery 0: Charging, 42%, 01:00:00 until charged\nBattery 1: Unknown, 0%";
        assert_eq!(parse_battery_output(text, PercentParser::Digits).level, Some(0.42));
    }

    #[cfg(unix)]
    fn sh(script: &str, timeout: Duration) -> AcpiReader {
        AcpiReader::new("sh", vec!["-c".into(), script.into()], timeout, PercentParser::Digits)
    }

    #[cfg(unix)]
    #[test]
    fn reads_command_output() {
        let mut reader = sh("echo 'Battery 0: Discharging, 55%, 01:02:03 remaining'", Duration::from_secs(5));
        let reading = reader.read();
        assert_eq!(reading.level, Some(0.55));
        assert_eq!(reading.description, "Battery 0: Discharging, 55%, 01:02:03 remaining");
    }

    #[cfg(unix)]
    #[test]
    fn large_output_is_read_in_full() {
        let mut reader = sh(
            "echo 'Battery 0: 50%'; head -c 200000 /dev/zero | tr '\\0' x",
            Duration::from_secs(5),
        );
        let output = reader.run_command().unwrap();
        assert!(output.len() > 200_000);
        assert_eq!(reader.read().level, Some(0.5));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let mut reader = AcpiReader::new(
            "battery-tray-no-such-command",
            Vec::new(),
            Duration::from_secs(1),
            PercentParser::Digits,
        );
        assert!(matches!(reader.run_command(), Err(ReadError::Spawn { .. })));
        assert_eq!(reader.read(), BatteryReading::unavailable());
    }

    #[cfg(unix)]
    #[test]
    fn hung_command_times_out() {
        let mut reader = sh("exec sleep 5", Duration::from_millis(100));
        let started = Instant::now();
        assert!(matches!(reader.run_command(), Err(ReadError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(reader.read(), BatteryReading::unavailable());
    }
}
