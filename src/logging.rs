//! Logging configuration module
//!
//! Redis-style logging on top of the `log` facade:
//! - Log levels (debug, verbose, notice, warning, nothing)
//! - File-based logging, stderr otherwise
//! - Redaction of AUTH passwords

use crate::config::DiscoveryConfig;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::SystemTime;

use parking_lot::Mutex;

/// Redis-style log levels mapped to Rust log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisLogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
    Nothing,
}

impl RedisLogLevel {
    /// Parse Redis-style log level string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => Self::Debug,
            "verbose" => Self::Verbose,
            "notice" => Self::Notice,
            "warning" => Self::Warning,
            "nothing" => Self::Nothing,
            _ => Self::Notice,
        }
    }

    /// Convert to Rust log LevelFilter
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::Debug,
            Self::Verbose => LevelFilter::Info,
            Self::Notice => LevelFilter::Info,
            Self::Warning => LevelFilter::Warn,
            Self::Nothing => LevelFilter::Off,
        }
    }
}

/// Logger writing to a file or stderr
pub struct SentinelLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl SentinelLogger {
    pub fn new(config: &DiscoveryConfig) -> Self {
        let level = RedisLogLevel::parse(&config.loglevel).to_level_filter();

        let file = if !config.logfile.is_empty() {
            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.logfile)
            {
                Ok(f) => Some(Mutex::new(f)),
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to open log file '{}': {}",
                        config.logfile, e
                    );
                    None
                }
            }
        } else {
            None
        };

        Self { level, file }
    }

    /// Format log record as Redis-style output: `pid:X <secs> message`
    fn format_record(&self, record: &Record) -> String {
        let level_char = match record.level() {
            log::Level::Error => '!',
            log::Level::Warn => '#',
            log::Level::Info => '*',
            log::Level::Debug => '-',
            log::Level::Trace => '.',
        };

        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let msg = redact_auth(&record.args().to_string());
        format!("{}:{} {} {}\n", std::process::id(), level_char, secs, msg)
    }
}

impl Log for SentinelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let formatted = self.format_record(record);

        match &self.file {
            Some(file) => {
                let _ = file.lock().write_all(formatted.as_bytes());
            }
            None => eprint!("{}", formatted),
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Mask the credentials of an `AUTH [user] password` command (case-insensitive)
fn redact_auth(msg: &str) -> String {
    let mut out = Vec::new();
    let mut pending = 0;

    for word in msg.split(' ') {
        if pending > 0 && !word.is_empty() {
            out.push("[REDACTED]");
            pending -= 1;
            continue;
        }
        out.push(word);
        if word.eq_ignore_ascii_case("AUTH") {
            pending = 2;
        }
    }

    out.join(" ")
}

/// Install the logger for the given config
pub fn init_logging(config: &DiscoveryConfig) -> Result<(), log::SetLoggerError> {
    let logger = Box::new(SentinelLogger::new(config));
    let level = RedisLogLevel::parse(&config.loglevel).to_level_filter();

    log::set_boxed_logger(logger)?;
    log::set_max_level(level);

    Ok(())
}
