//! Liquidation auctions (engine submodule).
//!
//! Open ascending auctions over a loan's collateral, paid in the loan asset.
//! Only the current leader's bid is ever held; an outbid leader is refunded
//! in full as part of the outbidding call.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::calculator::bps_of;
use crate::errors::LendingError;
use crate::types::{AuctionOrigin, LiquidationAuction};

/// Parameters of a new auction
#[odra::odra_type]
pub struct AuctionTerms {
    pub loan_id: u64,
    pub origin: AuctionOrigin,
    pub bid_asset: u32,
    pub starting_price: U256,
    pub reserve_price: U256,
    pub reserve_amount: U256,
    pub duration: u64,
}

/// Split of a winning bid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proceeds {
    pub fee: U256,
    pub to_lenders: U256,
    pub to_borrower: U256,
}

#[odra::module]
pub struct AuctionHouse {
    auction_count: Var<u64>,
    auctions: Mapping<u64, LiquidationAuction>,
    /// Running auction per loan
    active_by_loan: Mapping<u64, u64>,
}

#[odra::module]
impl AuctionHouse {
    /// Open an auction; reverts if the loan already has a running one
    pub fn open(&mut self, terms: AuctionTerms) -> u64 {
        if self.active_for(terms.loan_id).is_some() {
            self.env().revert(LendingError::AuctionAlreadyActive);
        }
        let now = self.env().get_block_time();
        let auction_id = self.auction_count.get().unwrap_or(0) + 1;
        let auction = LiquidationAuction {
            auction_id,
            loan_id: terms.loan_id,
            origin: terms.origin,
            bid_asset: terms.bid_asset,
            start_time: now,
            end_time: now + terms.duration,
            starting_price: terms.starting_price,
            reserve_price: terms.reserve_price,
            reserve_amount: terms.reserve_amount,
            highest_bidder: None,
            highest_bid: U256::zero(),
            active: true,
        };
        self.auctions.set(&auction_id, auction);
        self.auction_count.set(auction_id);
        self.active_by_loan.set(&terms.loan_id, auction_id);
        auction_id
    }

    /// Record a new leading bid and return the displaced leader, if any
    pub fn accept_bid(&mut self, auction_id: u64, bidder: Address, amount: U256) -> Option<(Address, U256)> {
        let mut auction = self.get_or_revert(auction_id);
        if !auction.active {
            self.env().revert(LendingError::AuctionNotActive);
        }
        if self.env().get_block_time() > auction.end_time {
            self.env().revert(LendingError::AuctionEnded);
        }
        if amount <= auction.highest_bid {
            self.env().revert(LendingError::BidTooLow);
        }
        if amount < auction.reserve_amount {
            self.env().revert(LendingError::BelowReserve);
        }

        let previous = auction
            .highest_bidder
            .map(|leader| (leader, auction.highest_bid));
        auction.highest_bidder = Some(bidder);
        auction.highest_bid = amount;
        self.auctions.set(&auction_id, auction);
        previous
    }

    /// Close an ended auction exactly once
    pub fn close(&mut self, auction_id: u64) -> LiquidationAuction {
        let mut auction = self.get_or_revert(auction_id);
        if !auction.active {
            self.env().revert(LendingError::AuctionAlreadyFinalized);
        }
        if self.env().get_block_time() <= auction.end_time {
            self.env().revert(LendingError::AuctionNotEnded);
        }
        auction.active = false;
        self.auctions.set(&auction_id, auction.clone());
        self.active_by_loan.set(&auction.loan_id, 0);
        auction
    }

    // ========== Query Functions ==========

    pub fn get(&self, auction_id: u64) -> Option<LiquidationAuction> {
        self.auctions.get(&auction_id)
    }

    pub fn active_for(&self, loan_id: u64) -> Option<u64> {
        match self.active_by_loan.get(&loan_id) {
            Some(0) | None => None,
            Some(auction_id) => Some(auction_id),
        }
    }

    pub fn count(&self) -> u64 {
        self.auction_count.get().unwrap_or(0)
    }

    fn get_or_revert(&self, auction_id: u64) -> LiquidationAuction {
        match self.auctions.get(&auction_id) {
            Some(auction) => auction,
            None => self.env().revert(LendingError::AuctionNotFound),
        }
    }
}

/// Split a winning bid: fee first, lenders up to what they are owed, rest to the borrower.
pub fn split_proceeds(bid: U256, fee_bps: u32, owed: U256) -> Result<Proceeds, LendingError> {
    let fee = bps_of(bid, fee_bps)?;
    let net = bid - fee;
    let to_lenders = net.min(owed);
    Ok(Proceeds {
        fee,
        to_lenders,
        to_borrower: net - to_lenders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proceeds_cover_debt_with_surplus() {
        let p = split_proceeds(U256::from(2000u64), 500, U256::from(1050u64)).unwrap();
        assert_eq!(p.fee, U256::from(100u64));
        assert_eq!(p.to_lenders, U256::from(1050u64));
        assert_eq!(p.to_borrower, U256::from(850u64));
    }

    #[test]
    fn test_proceeds_short_of_debt() {
        let p = split_proceeds(U256::from(1000u64), 500, U256::from(1050u64)).unwrap();
        assert_eq!(p.fee, U256::from(50u64));
        assert_eq!(p.to_lenders, U256::from(950u64));
        assert_eq!(p.to_borrower, U256::zero());
    }
}
