//! Session configuration.
//!
//! A [`ProfilerConfig`] is handed to [`crate::Profiler::start`] once; the
//! session never reads configuration again after that.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Report written when no output path is configured
pub const DEFAULT_OUTPUT: &str = "profile.log";

/// Functions with fewer samples are left out of the report
pub const DEFAULT_MIN_SAMPLES: u64 = 10;

/// Functions below this share of all samples are left out of the report
pub const DEFAULT_MIN_PERCENT: u64 = 1;

/// Time between two ticks of the sampler
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1);

/// Settings for one profiling session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Path of the report file
    pub output: PathBuf,
    /// Append `In file: <file>:<line>` to each reported function
    pub line_numbers: bool,
    /// Minimum sample count to display
    pub min_samples: u64,
    /// Minimum percentage of all samples to display
    pub min_percent: u64,
    /// Sampling period
    pub interval: Duration,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        ProfilerConfig {
            output: PathBuf::from(DEFAULT_OUTPUT),
            line_numbers: false,
            min_samples: DEFAULT_MIN_SAMPLES,
            min_percent: DEFAULT_MIN_PERCENT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl ProfilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    pub fn line_numbers(mut self, enabled: bool) -> Self {
        self.line_numbers = enabled;
        self
    }

    pub fn min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn min_percent(mut self, min_percent: u64) -> Self {
        self.min_percent = min_percent;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Defaults overlaid with `SELFPROF_*` environment variables.
    ///
    /// Recognized: `SELFPROF_OUTPUT`, `SELFPROF_LINE_NUMBERS`,
    /// `SELFPROF_MIN_SAMPLES`, `SELFPROF_MIN_PERCENT`, `SELFPROF_INTERVAL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ProfilerConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(output) = lookup("SELFPROF_OUTPUT") {
            config.output = PathBuf::from(output);
        }
        if let Some(value) = lookup("SELFPROF_LINE_NUMBERS") {
            config.line_numbers = parse_bool("SELFPROF_LINE_NUMBERS", &value)?;
        }
        if let Some(value) = lookup("SELFPROF_MIN_SAMPLES") {
            config.min_samples = parse_count("SELFPROF_MIN_SAMPLES", &value)?;
        }
        if let Some(value) = lookup("SELFPROF_MIN_PERCENT") {
            config.min_percent = parse_count("SELFPROF_MIN_PERCENT", &value)?;
        }
        if let Some(value) = lookup("SELFPROF_INTERVAL") {
            config.interval = parse_duration(&value).map_err(Error::InvalidArgument)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidArgument(
                "Sampling interval must be greater than zero".to_string(),
            ));
        }

        if self.min_percent > 100 {
            return Err(Error::InvalidArgument(format!(
                "Minimum percent must be between 0 and 100, got {}",
                self.min_percent
            )));
        }

        if self.output.as_os_str().is_empty() {
            return Err(Error::InvalidArgument(
                "Output path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a sampling interval such as `1ms`, `500us` or `2` (milliseconds)
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    // Try humantime first
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }

    // Bare numbers are milliseconds, matching the default period
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    Err(format!(
        "Invalid duration '{}'. Examples: 1ms, 500us, 10ms, 2",
        s
    ))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::InvalidArgument(format!(
            "{} expects a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        Error::InvalidArgument(format!(
            "{} expects a non-negative integer, got '{}'",
            key, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProfilerConfig::default();
        assert_eq!(config.output, PathBuf::from("profile.log"));
        assert!(!config.line_numbers);
        assert_eq!(config.min_samples, 10);
        assert_eq!(config.min_percent, 1);
        assert_eq!(config.interval, Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ProfilerConfig::new()
            .output("/tmp/out.log")
            .line_numbers(true)
            .min_samples(3)
            .min_percent(5)
            .interval(Duration::from_micros(500));
        assert_eq!(config.output, PathBuf::from("/tmp/out.log"));
        assert!(config.line_numbers);
        assert_eq!(config.min_samples, 3);
        assert_eq!(config.min_percent, 5);
        assert_eq!(config.interval, Duration::from_micros(500));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ProfilerConfig::from_lookup(lookup(&[
            ("SELFPROF_OUTPUT", "hot.log"),
            ("SELFPROF_LINE_NUMBERS", "yes"),
            ("SELFPROF_MIN_SAMPLES", "25"),
            ("SELFPROF_MIN_PERCENT", "2"),
            ("SELFPROF_INTERVAL", "5ms"),
        ]))
        .unwrap();

        assert_eq!(config.output, PathBuf::from("hot.log"));
        assert!(config.line_numbers);
        assert_eq!(config.min_samples, 25);
        assert_eq!(config.min_percent, 2);
        assert_eq!(config.interval, Duration::from_millis(5));
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = ProfilerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ProfilerConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ProfilerConfig::from_lookup(lookup(&[("SELFPROF_MIN_SAMPLES", "lots")]));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));

        let err = ProfilerConfig::from_lookup(lookup(&[("SELFPROF_LINE_NUMBERS", "maybe")]));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_validate() {
        let zero = ProfilerConfig::new().interval(Duration::ZERO);
        assert!(matches!(zero.validate(), Err(Error::InvalidArgument(_))));

        let too_much = ProfilerConfig::new().min_percent(101);
        assert!(matches!(too_much.validate(), Err(Error::InvalidArgument(_))));

        let no_path = ProfilerConfig::new().output("");
        assert!(matches!(no_path.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1ms"), Ok(Duration::from_millis(1)));
        assert_eq!(parse_duration("250us"), Ok(Duration::from_micros(250)));
        assert_eq!(parse_duration("3"), Ok(Duration::from_millis(3)));
        assert!(parse_duration("soon").is_err());
    }
}
