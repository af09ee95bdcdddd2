//! Signal construction parameters.

use crate::{
    error::{Result, SignalError},
    regression::PARAMETERS,
    winsorize::WinsorMode,
};
use accruals_data::EXCHCD_NASDAQ;
use serde::{Deserialize, Serialize};

/// Configuration for the signal stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Minimum observations per (fyear, sic2) regression group (default: 6)
    pub min_group_size: usize,
    /// Number of percentile buckets per year (default: 1000)
    pub winsor_buckets: usize,
    /// Tail treatment (default: clamp)
    pub winsor_mode: WinsorMode,
    /// Exchange code excluded before `nasdaq_first_year` (default: 3)
    pub nasdaq_exchcd: i32,
    /// First fiscal year NASDAQ listings are kept (default: 1982)
    pub nasdaq_first_year: i32,
    /// Months each annual observation is carried forward (default: 12)
    pub expansion_months: u32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_group_size: 6,
            winsor_buckets: 1000,
            winsor_mode: WinsorMode::Clamp,
            nasdaq_exchcd: EXCHCD_NASDAQ,
            nasdaq_first_year: 1982,
            expansion_months: 12,
        }
    }
}

impl SignalConfig {
    /// Check that the parameters describe a runnable recipe.
    pub fn validate(&self) -> Result<()> {
        if self.min_group_size <= PARAMETERS {
            return Err(SignalError::InvalidConfig(format!(
                "min_group_size must exceed the {PARAMETERS} regression parameters, got {}",
                self.min_group_size
            )));
        }
        if self.winsor_buckets < 3 {
            return Err(SignalError::InvalidConfig(format!(
                "winsor_buckets must be at least 3, got {}",
                self.winsor_buckets
            )));
        }
        if self.expansion_months == 0 {
            return Err(SignalError::InvalidConfig(
                "expansion_months must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SignalConfig::default();
        assert_eq!(config.min_group_size, 6);
        assert_eq!(config.winsor_buckets, 1000);
        assert_eq!(config.winsor_mode, WinsorMode::Clamp);
        assert_eq!(config.nasdaq_exchcd, 3);
        assert_eq!(config.nasdaq_first_year, 1982);
        assert_eq!(config.expansion_months, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_small_groups() {
        let config = SignalConfig {
            min_group_size: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SignalError::InvalidConfig(_))
        ));
    }
}
