//! # Engine Configuration
//!
//! Deployment parameters of a dispute engine, loadable from YAML:
//!
//! ```yaml
//! asset: WETH
//! dispute_stake: 1
//! validation_timeout_secs: 604800
//! timeout_extension_secs: 3600
//! ```
//!
//! Missing keys take their defaults. Unknown keys are rejected.

use serde::{Deserialize, Serialize};

use wdg_core::{Amount, AssetId};

use crate::error::EngineError;

/// Default dispute window: one week.
pub const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 7 * 24 * 3_600;
/// Default move window: one hour.
pub const DEFAULT_TIMEOUT_EXTENSION_SECS: u64 = 3_600;

/// Deployment parameters of a dispute engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Stake asset of every dispute.
    pub asset: AssetId,
    /// Stake needed to open a dispute; also each game's initial stake.
    pub dispute_stake: Amount,
    /// Seconds after a withdraw request during which it can be disputed.
    pub validation_timeout_secs: u64,
    /// Seconds granted to the side on turn after every move.
    pub timeout_extension_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset: AssetId::weth(),
            dispute_stake: 1,
            validation_timeout_secs: DEFAULT_VALIDATION_TIMEOUT_SECS,
            timeout_extension_secs: DEFAULT_TIMEOUT_EXTENSION_SECS,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, EngineError> {
        serde_yaml::to_string(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Reject parameters no engine can run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.dispute_stake == 0 {
            return Err(EngineError::Config(
                "dispute_stake must be positive".to_string(),
            ));
        }
        if self.timeout_extension_secs == 0 {
            return Err(EngineError::Config(
                "timeout_extension_secs must be positive".to_string(),
            ));
        }
        if i64::try_from(self.validation_timeout_secs).is_err()
            || i64::try_from(self.timeout_extension_secs).is_err()
        {
            return Err(EngineError::Config(
                "timeouts must fit in a signed 64-bit second count".to_string(),
            ));
        }
        Ok(())
    }
}
