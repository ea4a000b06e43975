//! Asset registry (engine submodule).
//!
//! Assets are never deleted, only deactivated. Parameters are frozen while
//! any open loan references the asset.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::calculator::{BPS_SCALE, MAX_DECIMALS, PERCENT_SCALE};
use crate::errors::LendingError;
use crate::types::AssetDescriptor;

#[odra::module]
pub struct AssetRegistry {
    /// Number of registered assets (ids run from 1)
    asset_count: Var<u32>,
    assets: Mapping<u32, AssetDescriptor>,
    /// Open loans referencing each asset (as loan or collateral asset)
    open_refs: Mapping<u32, u32>,
}

#[odra::module]
impl AssetRegistry {
    /// Store a new descriptor and return its id
    pub fn register(&mut self, descriptor: AssetDescriptor) -> u32 {
        if let Err(error) = validate_descriptor(&descriptor) {
            self.env().revert(error);
        }
        let asset_id = self.asset_count.get().unwrap_or(0) + 1;
        self.assets.set(&asset_id, AssetDescriptor { asset_id, ..descriptor });
        self.asset_count.set(asset_id);
        asset_id
    }

    /// Replace the parameters of an unreferenced asset
    pub fn update(&mut self, asset_id: u32, descriptor: AssetDescriptor) {
        self.get_or_revert(asset_id);
        if self.open_refs(asset_id) > 0 {
            self.env().revert(LendingError::AssetInUse);
        }
        if let Err(error) = validate_descriptor(&descriptor) {
            self.env().revert(error);
        }
        self.assets.set(&asset_id, AssetDescriptor { asset_id, ..descriptor });
    }

    pub fn deactivate(&mut self, asset_id: u32) {
        let mut descriptor = self.get_or_revert(asset_id);
        descriptor.active = false;
        self.assets.set(&asset_id, descriptor);
    }

    /// Descriptor of an active asset, reverting with `UnsupportedAsset` otherwise
    pub fn require_active(&self, asset_id: u32) -> AssetDescriptor {
        match self.assets.get(&asset_id) {
            Some(descriptor) if descriptor.active => descriptor,
            _ => self.env().revert(LendingError::UnsupportedAsset),
        }
    }

    pub fn get_or_revert(&self, asset_id: u32) -> AssetDescriptor {
        match self.assets.get(&asset_id) {
            Some(descriptor) => descriptor,
            None => self.env().revert(LendingError::AssetNotFound),
        }
    }

    pub fn get(&self, asset_id: u32) -> Option<AssetDescriptor> {
        self.assets.get(&asset_id)
    }

    pub fn count(&self) -> u32 {
        self.asset_count.get().unwrap_or(0)
    }

    // ========== Reference Counting ==========

    pub fn acquire(&mut self, asset_id: u32) {
        let refs = self.open_refs(asset_id);
        self.open_refs.set(&asset_id, refs + 1);
    }

    pub fn release(&mut self, asset_id: u32) {
        let refs = self.open_refs(asset_id);
        self.open_refs.set(&asset_id, refs.saturating_sub(1));
    }

    pub fn open_refs(&self, asset_id: u32) -> u32 {
        self.open_refs.get(&asset_id).unwrap_or(0)
    }
}

/// Parameter sanity rules shared by registration and updates
pub fn validate_descriptor(descriptor: &AssetDescriptor) -> Result<(), LendingError> {
    let valid = descriptor.decimals <= MAX_DECIMALS
        && !descriptor.max_loan.is_zero()
        && descriptor.min_loan <= descriptor.max_loan
        && descriptor.min_contribution > U256::zero()
        && descriptor.min_contribution <= descriptor.max_loan
        && descriptor.collateral_ratio_bps >= BPS_SCALE
        && descriptor.liquidation_threshold_pct >= PERCENT_SCALE
        && descriptor.liquidation_threshold_pct.saturating_mul(100) <= descriptor.collateral_ratio_bps;

    if valid {
        Ok(())
    } else {
        Err(LendingError::InvalidAssetParams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> AssetDescriptor {
        AssetDescriptor {
            asset_id: 0,
            handle: None,
            decimals: 9,
            active: true,
            min_loan: U256::from(10u64),
            max_loan: U256::from(1_000_000u64),
            min_contribution: U256::from(5u64),
            collateral_ratio_bps: 15_000,
            liquidation_threshold_pct: 130,
            lending_capacity: U256::from(10_000_000u64),
        }
    }

    #[test]
    fn test_valid_descriptor() {
        assert_eq!(validate_descriptor(&descriptor()), Ok(()));
    }

    #[test]
    fn test_threshold_above_ratio_rejected() {
        let mut d = descriptor();
        d.liquidation_threshold_pct = 160;
        assert_eq!(validate_descriptor(&d), Err(LendingError::InvalidAssetParams));
    }

    #[test]
    fn test_undercollateralized_ratio_rejected() {
        let mut d = descriptor();
        d.collateral_ratio_bps = 9_000;
        d.liquidation_threshold_pct = 100;
        assert_eq!(validate_descriptor(&d), Err(LendingError::InvalidAssetParams));
    }

    #[test]
    fn test_inverted_loan_bounds_rejected() {
        let mut d = descriptor();
        d.min_loan = U256::from(2_000_000u64);
        assert_eq!(validate_descriptor(&d), Err(LendingError::InvalidAssetParams));
    }
}
