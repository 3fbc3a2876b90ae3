use std::io::Write;

use clap::ValueEnum;
use log::{Level, LevelFilter, SetLoggerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Severity {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Severity::Off   => "OFF",
            Severity::Error => "ERROR",
            Severity::Warn  => "WARN",
            Severity::Debug => "DEBUG",
            Severity::Info  => "INFO",
            Severity::Trace => "TRACE",
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        match *self {
            Severity::Off   => LevelFilter::Off,
            Severity::Error => LevelFilter::Error,
            Severity::Warn  => LevelFilter::Warn,
            Severity::Info  => LevelFilter::Info,
            Severity::Debug => LevelFilter::Debug,
            Severity::Trace => LevelFilter::Trace,
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => Severity::Error,
            Level::Warn  => Severity::Warn,
            Level::Info  => Severity::Info,
            Level::Debug => Severity::Debug,
            Level::Trace => Severity::Trace,
        }
    }
}

/// Install the global logger writing `[LEVEL][module] message` lines to stderr
///
/// `RUST_LOG` directives are applied on top of `severity`.
pub fn init(severity: Severity) -> Result<(), SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(severity.level_filter())
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{:5}][{}] {}",
                Severity::from(record.level()).as_str(),
                record.module_path().unwrap_or("?"),
                record.args()
            )
        })
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_to_filters() {
        assert_eq!(Severity::Off.level_filter(), LevelFilter::Off);
        assert_eq!(Severity::Warn.level_filter(), LevelFilter::Warn);
        assert_eq!(Severity::Trace.level_filter(), LevelFilter::Trace);
        assert_eq!(Severity::Debug.as_str(), "DEBUG");
    }

    #[test]
    fn record_levels_print_as_severities() {
        assert_eq!(Severity::from(Level::Warn).as_str(), "WARN");
        assert_eq!(Severity::from(Level::Trace), Severity::Trace);
        assert_eq!(Severity::from(Level::Error).level_filter(), LevelFilter::Error);
    }

    #[test]
    fn severity_parses_from_command_line() {
        assert_eq!(Severity::from_str("info", true), Ok(Severity::Info));
        assert!(Severity::from_str("verbose", true).is_err());
    }
}
