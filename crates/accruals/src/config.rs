//! Pipeline configuration.

use crate::error::{PipelineError, Result};
use accruals_data::CsvOptions;
use accruals_signal::SignalConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for a full pipeline run.
///
/// Every field has a default, so a JSON file only needs the values it
/// overrides:
///
/// ```
/// use accruals::PipelineConfig;
///
/// let config = PipelineConfig::from_json(r#"{"signal": {"min_group_size": 10}}"#).unwrap();
/// assert_eq!(config.signal.min_group_size, 10);
/// assert_eq!(config.delimiter, ',');
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Signal construction parameters
    pub signal: SignalConfig,
    /// Field delimiter of both inputs (default: ',')
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            signal: SignalConfig::default(),
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|error| PipelineError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_json(&text)
    }

    /// Check every parameter before any input is read.
    pub fn validate(&self) -> Result<()> {
        self.signal.validate()?;
        self.csv_options().map(|_| ())
    }

    /// Reader options for the inputs.
    ///
    /// # Errors
    /// `InvalidConfig` unless the delimiter is a single ASCII character
    /// other than a quote or line break.
    pub fn csv_options(&self) -> Result<CsvOptions> {
        let d = self.delimiter;
        if !d.is_ascii() || matches!(d, '"' | '\n' | '\r') {
            return Err(PipelineError::InvalidConfig(format!("unsupported delimiter {d:?}")));
        }
        Ok(CsvOptions { delimiter: d as u8 })
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
