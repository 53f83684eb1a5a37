//! Warden configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_core::{ChainId, DAY, HOUR};

use crate::error::{AccountError, Result};
use crate::policy::{PolicyBounds, PolicyParam};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Chain bound into every operation hash
    pub chain_id: u64,

    /// Timing policy defaults and bounds
    pub policy: PolicyConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            chain_id: ChainId::ETHEREUM.as_u64(),
            policy: PolicyConfig::default(),
        }
    }
}

impl WardenConfig {
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.chain_id)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AccountError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Default and bounds for every policy parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub addition_period: PolicyBounds,
    pub removal_period: PolicyBounds,
    pub security_window: PolicyBounds,
    pub recovery_period: PolicyBounds,
    pub lock_period: PolicyBounds,
    pub migration_period: PolicyBounds,
    pub approval_validity_period: PolicyBounds,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let period = PolicyBounds::new(3 * DAY, HOUR, 30 * DAY);
        let window = PolicyBounds::new(DAY, HOUR, 7 * DAY);
        Self {
            addition_period: period,
            removal_period: period,
            security_window: window,
            recovery_period: period,
            lock_period: period,
            migration_period: period,
            approval_validity_period: window,
        }
    }
}

impl PolicyConfig {
    pub fn bounds(&self, param: PolicyParam) -> PolicyBounds {
        match param {
            PolicyParam::AdditionPeriod => self.addition_period,
            PolicyParam::RemovalPeriod => self.removal_period,
            PolicyParam::SecurityWindow => self.security_window,
            PolicyParam::RecoveryPeriod => self.recovery_period,
            PolicyParam::LockPeriod => self.lock_period,
            PolicyParam::MigrationPeriod => self.migration_period,
            PolicyParam::ApprovalValidityPeriod => self.approval_validity_period,
        }
    }
}
