//! Per-asset borrow policy.
//!
//! The registry is re-read on every borrow and again at settlement; the
//! settlement path must not trust a config captured at open time.

use std::collections::BTreeMap;

use crate::error::GuardError;
use crate::ident::AssetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRiskConfig {
    pub enabled: bool,
    pub max_amount: u128,
    pub max_fee_bps: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskRegistry {
    configs: BTreeMap<AssetId, AssetRiskConfig>,
}

impl RiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any prior entry for `asset`.
    pub fn upsert(&mut self, asset: AssetId, config: AssetRiskConfig) {
        self.configs.insert(asset, config);
    }

    pub fn get(&self, asset: AssetId) -> Option<AssetRiskConfig> {
        self.configs.get(&asset).copied()
    }

    /// Policy gates shared by the borrow and settlement paths. An asset
    /// with no entry is not enabled.
    pub fn require_within_limits(
        &self,
        asset: AssetId,
        amount: u128,
    ) -> Result<AssetRiskConfig, GuardError> {
        let config = match self.get(asset) {
            Some(config) if config.enabled => config,
            _ => return Err(GuardError::AssetNotAllowed(asset)),
        };
        if amount > config.max_amount {
            return Err(GuardError::AmountExceedsMax {
                amount,
                max: config.max_amount,
            });
        }
        Ok(config)
    }
}
