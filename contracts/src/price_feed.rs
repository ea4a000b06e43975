//! Manually fed price source.
//!
//! Serves `get_price(asset_id)` for the engine's oracle adapter. Prices are
//! pushed by addresses holding the feeder role.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::LendingError;
use crate::types::PriceQuote;

#[odra::module]
pub struct ManualPriceFeed {
    admin: Var<Address>,
    /// Addresses allowed to push prices
    feeders: Mapping<Address, bool>,
    /// Latest quote per asset
    prices: Mapping<u32, PriceQuote>,
}

#[odra::module]
impl ManualPriceFeed {
    /// Admin is also the first feeder
    pub fn init(&mut self, admin: Address) {
        self.admin.set(admin);
        self.feeders.set(&admin, true);
    }

    /// Record a price observed now (USD per whole token, 1e8 scale)
    pub fn set_price(&mut self, asset_id: u32, price: U256) {
        let now = self.env().get_block_time();
        self.set_price_at(asset_id, price, now);
    }

    /// Record a price with an explicit observation time
    pub fn set_price_at(&mut self, asset_id: u32, price: U256, observed_at: u64) {
        self.require_feeder();
        self.prices.set(
            &asset_id,
            PriceQuote {
                asset_id,
                price,
                observed_at,
            },
        );
    }

    pub fn get_price(&self, asset_id: u32) -> Option<PriceQuote> {
        self.prices.get(&asset_id)
    }

    /// Grant or revoke the feeder role (admin only)
    pub fn set_feeder(&mut self, feeder: Address, allowed: bool) {
        self.require_admin();
        self.feeders.set(&feeder, allowed);
    }

    pub fn is_feeder(&self, account: Address) -> bool {
        self.feeders.get(&account).unwrap_or(false)
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(LendingError::Unauthorized);
        }
    }

    fn require_feeder(&self) {
        let caller = self.env().caller();
        if !self.is_feeder(caller) {
            self.env().revert(LendingError::Unauthorized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odra::host::Deployer;

    #[test]
    fn test_only_feeders_push_prices() {
        let env = odra_test::env();
        let admin = env.get_account(0);
        let bot = env.get_account(1);
        let mut feed = ManualPriceFeed::deploy(&env, ManualPriceFeedInitArgs { admin });

        feed.set_price_at(1, U256::from(100u64), 42);
        let quote = feed.get_price(1).unwrap();
        assert_eq!(quote.price, U256::from(100u64));
        assert_eq!(quote.observed_at, 42);
        assert_eq!(feed.get_price(2), None);

        env.set_caller(bot);
        assert_eq!(
            feed.try_set_price(1, U256::from(1u64)),
            Err(LendingError::Unauthorized.into())
        );
        assert_eq!(feed.try_set_feeder(bot, true), Err(LendingError::Unauthorized.into()));

        env.set_caller(admin);
        feed.set_feeder(bot, true);
        env.set_caller(bot);
        feed.set_price(1, U256::from(7u64));
        assert!(feed.is_feeder(bot));
        assert_eq!(feed.get_price(1).unwrap().price, U256::from(7u64));
    }
}
