//! Bounded timing policy
//!
//! Global defaults with per-account overrides. Every period and window used
//! by guardian confirmation, approval expiry, and migration finalization is
//! read through [`PolicyStore::of`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AccountError, Result};

/// Tunable timing parameter (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyParam {
    /// Wait between requesting and confirming a guardian addition
    AdditionPeriod,
    /// Wait between requesting and confirming a guardian removal
    RemovalPeriod,
    /// Window after the addition/removal period in which confirmation is allowed
    SecurityWindow,
    RecoveryPeriod,
    LockPeriod,
    /// Wait between an executed migration request and its finalization
    MigrationPeriod,
    /// Lifetime of a recorded approval
    ApprovalValidityPeriod,
}

impl PolicyParam {
    pub const ALL: [PolicyParam; 7] = [
        PolicyParam::AdditionPeriod,
        PolicyParam::RemovalPeriod,
        PolicyParam::SecurityWindow,
        PolicyParam::RecoveryPeriod,
        PolicyParam::LockPeriod,
        PolicyParam::MigrationPeriod,
        PolicyParam::ApprovalValidityPeriod,
    ];
}

/// Default and exclusive bounds of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBounds {
    pub default: u64,
    pub min: u64,
    pub max: u64,
}

impl PolicyBounds {
    pub fn new(default: u64, min: u64, max: u64) -> Self {
        Self { default, min, max }
    }

    /// Strict containment: `min < value < max`
    pub fn contains(&self, value: u64) -> bool {
        self.min < value && value < self.max
    }
}

/// Per-account overrides, keyed by parameter
pub type PolicyOverrides = BTreeMap<PolicyParam, u64>;

/// Global policy defaults and bounds
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    bounds: BTreeMap<PolicyParam, PolicyBounds>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-time initialization of a parameter's default and bounds
    pub fn initialize(
        &mut self,
        param: PolicyParam,
        default: u64,
        min: u64,
        max: u64,
    ) -> Result<()> {
        if self.bounds.contains_key(&param) {
            return Err(AccountError::AlreadyInitialized(param));
        }
        let bounds = PolicyBounds::new(default, min, max);
        if !bounds.contains(default) {
            return Err(AccountError::InvalidPolicyBounds {
                param,
                default,
                min,
                max,
            });
        }
        self.bounds.insert(param, bounds);
        Ok(())
    }

    pub fn is_initialized(&self, param: PolicyParam) -> bool {
        self.bounds.contains_key(&param)
    }

    pub fn bounds(&self, param: PolicyParam) -> Result<PolicyBounds> {
        self.bounds
            .get(&param)
            .copied()
            .ok_or(AccountError::PolicyNotInitialized(param))
    }

    /// Validate a proposed override against the parameter's bounds
    pub fn check(&self, param: PolicyParam, value: u64) -> Result<()> {
        let bounds = self.bounds(param)?;
        if !bounds.contains(value) {
            return Err(AccountError::OutOfBoundary {
                param,
                value,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(())
    }

    /// Effective value: the account's override, or the global default
    pub fn of(&self, overrides: &PolicyOverrides, param: PolicyParam) -> Result<u64> {
        match overrides.get(&param) {
            Some(value) => Ok(*value),
            None => Ok(self.bounds(param)?.default),
        }
    }
}
