//! Price Oracle Adapter
//!
//! Reads USD prices from an external feed contract on every use and rejects
//! anything that is missing, zero or older than the staleness threshold.
//! Nothing is cached and no fallback price is ever substituted.

use odra::prelude::*;
use odra::casper_types::{RuntimeArgs, runtime_args};
use odra::CallDef;
use crate::errors::LendingError;
use crate::types::PriceQuote;

/// Price feed interface for cross-contract calls
#[odra::external_contract]
pub trait PriceFeed {
    /// Latest observation for an asset, None if the feed has none
    fn get_price(&self, asset_id: u32) -> Option<PriceQuote>;
}

/// Oracle adapter (engine submodule)
#[odra::module]
pub struct PriceOracle {
    /// External price feed contract
    feed: Var<Address>,
    /// Maximum accepted price age
    staleness_threshold: Var<u64>,
}

#[odra::module]
impl PriceOracle {
    /// Point the adapter at a feed contract
    pub fn configure(&mut self, feed: Address, staleness_threshold: u64) {
        self.feed.set(feed);
        self.staleness_threshold.set(staleness_threshold);
    }

    // ========== Price Query Functions ==========

    /// Fresh, validated quote for an asset. Reverts on any oracle failure.
    pub fn latest_price(&self, asset_id: u32) -> PriceQuote {
        let feed = match self.feed.get() {
            Some(feed) => feed,
            None => self.env().revert(LendingError::PriceUnavailable),
        };

        let args = runtime_args! {
            "asset_id" => asset_id
        };
        let call_def = CallDef::new("get_price", false, args);
        let quote = match self.env().call_contract::<Option<PriceQuote>>(feed, call_def) {
            Some(quote) => quote,
            None => self.env().revert(LendingError::PriceUnavailable),
        };

        if let Err(error) = self.check_quote(&quote) {
            self.env().revert(error);
        }
        quote
    }

    // ========== Configuration Functions ==========

    pub fn set_feed(&mut self, feed: Address) {
        self.feed.set(feed);
    }

    pub fn set_staleness_threshold(&mut self, threshold: u64) {
        self.staleness_threshold.set(threshold);
    }

    pub fn get_feed(&self) -> Option<Address> {
        self.feed.get()
    }

    pub fn get_staleness_threshold(&self) -> u64 {
        self.staleness_threshold.get().unwrap_or_default()
    }

    fn check_quote(&self, quote: &PriceQuote) -> Result<(), LendingError> {
        validate_quote(
            quote,
            self.env().get_block_time(),
            self.get_staleness_threshold(),
        )
    }
}

/// Validity rules for a feed observation.
///
/// A quote stamped in the future counts as fresh.
pub fn validate_quote(quote: &PriceQuote, now: u64, staleness_threshold: u64) -> Result<(), LendingError> {
    if quote.price.is_zero() {
        return Err(LendingError::InvalidPrice);
    }
    if now.saturating_sub(quote.observed_at) > staleness_threshold {
        return Err(LendingError::StalePrice);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use odra::casper_types::U256;

    fn quote(price: u64, observed_at: u64) -> PriceQuote {
        PriceQuote {
            asset_id: 1,
            price: U256::from(price),
            observed_at,
        }
    }

    #[test]
    fn test_fresh_quote_passes() {
        assert_eq!(validate_quote(&quote(100, 1_000), 1_500, 1_000), Ok(()));
        // exactly at the threshold is still fresh
        assert_eq!(validate_quote(&quote(100, 1_000), 2_000, 1_000), Ok(()));
    }

    #[test]
    fn test_stale_quote_rejected() {
        assert_eq!(
            validate_quote(&quote(100, 1_000), 2_001, 1_000),
            Err(LendingError::StalePrice)
        );
    }

    #[test]
    fn test_zero_price_rejected() {
        assert_eq!(
            validate_quote(&quote(0, 1_000), 1_000, 1_000),
            Err(LendingError::InvalidPrice)
        );
    }
}
