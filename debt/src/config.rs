//! Debt engine configuration.

use moneta_common::constants;

/// Payoff simulation configuration.
#[derive(Debug, Clone)]
pub struct PayoffConfig {
    /// Months simulated before a plan is reported as unresolved.
    pub max_horizon_months: u32,
}

impl Default for PayoffConfig {
    fn default() -> Self {
        Self {
            max_horizon_months: constants::MAX_HORIZON_MONTHS,
        }
    }
}

impl PayoffConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(months) = std::env::var("MONETA_MAX_HORIZON_MONTHS") {
            if let Ok(months) = months.parse() {
                config.max_horizon_months = months;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_horizon_months == 0 {
            return Err("Max horizon cannot be 0 months".to_string());
        }

        Ok(())
    }
}
