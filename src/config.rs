//! # Configuration
//!
//! Every tunable of the detection, cleaning and batch layers lives in one flat
//! [`Config`]. A `Config` is only usable after [`Config::validate`] turned it
//! into [`Settings`], so components never see out-of-range values.
use serde::Deserialize;
use std::ops::Deref;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration values, reported before any processing starts.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {name} must be at least 1, got {value}")]
    NotPositive { name: &'static str, value: u64 },

    #[error("Invalid configuration: {name} must be within (0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("Invalid configuration: header_signal_weights must be finite, non-negative and not all zero")]
    InvalidWeights,

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

/// How a batch of files is executed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// One file after another on the calling thread, without timeouts.
    Sequential,
    /// Bounded worker pool with a wall-clock timeout per file.
    #[default]
    Threaded,
}

/// Raw, unvalidated configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Structure detection
    /// Rows scanned when looking for a header or key/value pattern.
    pub max_scan_rows: usize,
    /// Columns scanned when looking for a vertical key/value pattern.
    pub max_scan_cols: usize,
    /// Minimum share of filled cells in a region's bounding box for the table test.
    pub min_data_density: f64,
    /// A header row must score strictly above this.
    pub header_confidence_threshold: f64,
    /// Weights of the text, uniqueness, header-word and type-difference signals.
    pub header_signal_weights: [f64; 4],

    // Cleaning
    pub trim_whitespace: bool,
    pub standardize_dates: bool,
    pub remove_duplicates: bool,
    pub infer_data_types: bool,
    /// Replacement text for missing cells; `None` keeps them missing.
    pub replace_missing_with: Option<String>,
    /// Fill missing cells of integer columns with 0 (lossy).
    pub integer_missing_as_zero: bool,
    /// Values sampled per column for type inference.
    pub sample_size: usize,
    /// Seed of the sampling RNG.
    pub sample_seed: u64,

    // Batch processing
    pub execution: Execution,
    pub max_workers: usize,
    pub file_timeout_secs: u64,
    /// Files larger than this (in bytes) are rejected before reading.
    pub max_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_scan_rows: 20,
            max_scan_cols: 20,
            min_data_density: 0.3,
            header_confidence_threshold: 0.7,
            header_signal_weights: [1.0; 4],
            trim_whitespace: true,
            standardize_dates: true,
            remove_duplicates: false,
            infer_data_types: true,
            replace_missing_with: None,
            integer_missing_as_zero: true,
            sample_size: 100,
            sample_seed: 42,
            execution: Execution::Threaded,
            max_workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            file_timeout_secs: 300,
            max_file_size: 100 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Quick pass with shallow scans and no type inference.
    pub fn fast_scan() -> Self {
        Config {
            max_scan_rows: 10,
            max_scan_cols: 10,
            infer_data_types: false,
            standardize_dates: false,
            remove_duplicates: false,
            ..Config::default()
        }
    }

    /// Deep scans with duplicate removal.
    pub fn thorough_analysis() -> Self {
        Config {
            max_scan_rows: 50,
            max_scan_cols: 50,
            infer_data_types: true,
            standardize_dates: true,
            remove_duplicates: true,
            ..Config::default()
        }
    }

    /// Larger size limit and longer per-file timeout.
    pub fn large_files() -> Self {
        Config {
            max_file_size: 500 * 1024 * 1024,
            file_timeout_secs: 600,
            ..Config::default()
        }
    }

    /// Lenient thresholds suited to sparse, document-like sheets.
    pub fn unstructured_focus() -> Self {
        Config {
            max_scan_rows: 100,
            max_scan_cols: 20,
            min_data_density: 0.1,
            header_confidence_threshold: 0.5,
            infer_data_types: false,
            trim_whitespace: true,
            ..Config::default()
        }
    }

    /// Parses a JSON configuration; omitted keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks every tunable and returns the validated settings.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        Settings::try_from(self)
    }
}

/// Validated configuration, consumed by every component.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings(Config);

impl Settings {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.0.file_timeout_secs)
    }

    pub fn config(&self) -> &Config {
        &self.0
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings(Config::default())
    }
}

impl Deref for Settings {
    type Target = Config;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Config> for Settings {
    type Error = ConfigError;

    fn try_from(config: Config) -> Result<Self, Self::Error> {
        let counts = [
            ("max_scan_rows", config.max_scan_rows as u64),
            ("max_scan_cols", config.max_scan_cols as u64),
            ("sample_size", config.sample_size as u64),
            ("max_workers", config.max_workers as u64),
            ("file_timeout_secs", config.file_timeout_secs),
            ("max_file_size", config.max_file_size),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }

        let ratios = [
            ("min_data_density", config.min_data_density),
            ("header_confidence_threshold", config.header_confidence_threshold),
        ];
        for (name, value) in ratios {
            if value.is_nan() || value <= 0.0 || value > 1.0 {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }

        let weights = &config.header_signal_weights;
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::InvalidWeights);
        }

        Ok(Settings(config))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Config::default().validate().expect("default config should validate");
        assert_eq!(settings.max_scan_rows, 20);
        assert_eq!(settings.header_confidence_threshold, 0.7);
        assert_eq!(settings.file_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn profiles_are_valid() {
        for config in [
            Config::fast_scan(),
            Config::thorough_analysis(),
            Config::large_files(),
            Config::unstructured_focus(),
        ] {
            config.validate().expect("profile should validate");
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        let config = Config { max_scan_rows: 0, ..Config::default() };
        assert_eq!(
            config.validate().expect_err("zero scan rows should fail"),
            ConfigError::NotPositive { name: "max_scan_rows", value: 0 }
        );

        let config = Config { min_data_density: 1.5, ..Config::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { name: "min_data_density", .. })
        ));

        let config = Config { min_data_density: 0.0, ..Config::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { name: "min_data_density", .. })
        ));

        let config = Config { header_confidence_threshold: 0.0, ..Config::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { name: "header_confidence_threshold", .. })
        ));

        let config = Config { header_confidence_threshold: 1.0, ..Config::default() };
        assert!(config.validate().is_ok());

        let config = Config { header_confidence_threshold: f64::NAN, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { header_signal_weights: [0.0; 4], ..Config::default() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidWeights));
    }

    #[test]
    fn parse_json() {
        let config = Config::from_json_str(r#"{"max_scan_rows": 5, "execution": "sequential"}"#)
            .expect("json config should parse");
        assert_eq!(config.max_scan_rows, 5);
        assert_eq!(config.execution, Execution::Sequential);
        assert_eq!(config.max_scan_cols, 20);

        let error = Config::from_json_str(r#"{"max_scan_row": 5}"#).expect_err("unknown key should fail");
        assert!(matches!(error, ConfigError::Parse(_)));
    }
}
