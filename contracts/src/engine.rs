//! Lending Engine Contract
//!
//! Owns every loan and orchestrates the registry, oracle, funding pool,
//! auction house, default voting and credit ledger submodules.
//!
//! All state changes of an entry point are written before any settlement call
//! is made, and mutating entry points hold the engine lock for their duration.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::asset_registry::AssetRegistry;
use crate::auction::{split_proceeds, AuctionHouse, AuctionTerms};
use crate::calculator::{self, BPS_SCALE};
use crate::credit::{risk_tier, CreditLedger};
use crate::errors::LendingError;
use crate::events::*;
use crate::funding_pool::{check_contribution, pro_rata_payouts, FundingPool};
use crate::oracle_adapter::PriceOracle;
use crate::settlement::SettlementCalls;
use crate::types::{
    AssetDescriptor, AssetStats, AuctionOrigin, CreditScore, DefaultAction, DefaultVote,
    EngineConfig, LenderContribution, LiquidationAuction, Loan, LoanStatus, RiskTier,
};
use crate::voting::{final_outcome, DefaultVoting};

/// P2P lending engine
#[odra::module(events = [
    LoanRequested,
    LoanCancelled,
    ContributionReceived,
    LoanFunded,
    FundingFailed,
    RepaymentReceived,
    LoanRepaid,
    LiquidationTriggered,
    BidPlaced,
    AuctionFinalized,
    DefaultTriggered,
    VoteCast,
    DefaultResolved,
    AssetRegistered
])]
pub struct LendingEngine {
    /// Engine admin address
    admin: Var<Address>,
    /// Settlement contract moving all assets
    settlement: Var<Address>,
    /// Receiver of protocol fees and rounding dust
    fee_recipient: Var<Address>,
    config: Var<EngineConfig>,
    /// Blocks new requests and contributions
    paused: Var<bool>,
    /// Reentrancy lock
    locked: Var<bool>,
    loan_count: Var<u64>,
    loans: Mapping<u64, Loan>,
    /// Per-borrower loan index
    borrower_loan_count: Mapping<Address, u32>,
    borrower_loans: Mapping<(Address, u32), u64>,
    asset_stats: Mapping<u32, AssetStats>,
    assets: SubModule<AssetRegistry>,
    oracle: SubModule<PriceOracle>,
    credit: SubModule<CreditLedger>,
    pool: SubModule<FundingPool>,
    auctions: SubModule<AuctionHouse>,
    votes: SubModule<DefaultVoting>,
}

#[odra::module]
impl LendingEngine {
    pub fn init(
        &mut self,
        admin: Address,
        price_feed: Address,
        settlement: Address,
        fee_recipient: Address,
        config: EngineConfig,
    ) {
        if let Err(error) = config.validate() {
            self.env().revert(error);
        }
        self.admin.set(admin);
        self.settlement.set(settlement);
        self.fee_recipient.set(fee_recipient);
        self.oracle.configure(price_feed, config.staleness_threshold);
        self.config.set(config);
        self.paused.set(false);
        self.locked.set(false);
        self.loan_count.set(0);
    }

    // ========== Loan Lifecycle ==========

    /// Post a collateralized loan request. The caller is the borrower.
    ///
    /// `max_collateral` bounds the collateral the borrower is willing to lock
    /// at current prices.
    pub fn request_loan(
        &mut self,
        loan_asset: u32,
        collateral_asset: u32,
        amount: U256,
        max_rate_bps: u32,
        duration: u64,
        max_collateral: U256,
    ) -> u64 {
        self.lock();
        self.require_not_paused();

        let borrower = self.env().caller();
        let config = self.get_config();

        if amount.is_zero() {
            self.env().revert(LendingError::InvalidAmount);
        }
        if duration < config.min_duration || duration > config.max_duration {
            self.env().revert(LendingError::InvalidDuration);
        }
        let loan_desc = self.assets.require_active(loan_asset);
        let coll_desc = self.assets.require_active(collateral_asset);
        if amount < loan_desc.min_loan || amount > loan_desc.max_loan {
            self.env().revert(LendingError::AmountOutOfBounds);
        }
        if max_rate_bps < config.rate_model.base_rate_bps || max_rate_bps > BPS_SCALE {
            self.env().revert(LendingError::InvalidRateBound);
        }
        if let Some(record) = self.credit.get(borrower) {
            if record.score < config.credit.min_score_to_borrow {
                self.env().revert(LendingError::CreditScoreTooLow);
            }
        }

        let required = self.required_collateral(
            loan_asset,
            amount,
            collateral_asset,
            coll_desc.collateral_ratio_bps,
        );
        if required.is_zero() || required > max_collateral {
            self.env().revert(LendingError::InsufficientCollateral);
        }

        let now = self.env().get_block_time();
        let loan_id = self.loan_count.get().unwrap_or(0) + 1;
        let loan = Loan {
            id: loan_id,
            borrower,
            loan_asset,
            collateral_asset,
            total_amount: amount,
            amount_funded: U256::zero(),
            collateral_amount: required,
            collateral_claimed: false,
            collateral_ratio_bps: coll_desc.collateral_ratio_bps,
            liquidation_threshold_pct: coll_desc.liquidation_threshold_pct,
            max_rate_bps,
            interest_rate_bps: 0,
            duration,
            created_at: now,
            funding_deadline: now + config.funding_period,
            funded_at: 0,
            due_date: 0,
            status: LoanStatus::Requested,
            amount_repaid: U256::zero(),
        };
        self.loans.set(&loan_id, loan);
        self.loan_count.set(loan_id);

        let index = self.borrower_loan_count.get(&borrower).unwrap_or(0);
        self.borrower_loans.set(&(borrower, index), loan_id);
        self.borrower_loan_count.set(&borrower, index + 1);

        self.assets.acquire(loan_asset);
        self.assets.acquire(collateral_asset);

        self.env().emit_event(LoanRequested {
            loan_id,
            borrower,
            loan_asset,
            collateral_asset,
            amount,
            collateral_amount: required,
            duration,
        });

        self.escrow(collateral_asset, borrower, required);
        self.unlock();
        loan_id
    }

    /// Withdraw a request nobody has funded yet
    pub fn cancel_loan(&mut self, loan_id: u64) {
        self.lock();
        let mut loan = self.load_loan(loan_id);
        if self.env().caller() != loan.borrower {
            self.env().revert(LendingError::NotBorrower);
        }
        if loan.status != LoanStatus::Requested || !loan.amount_funded.is_zero() {
            self.env().revert(LendingError::NotCancelable);
        }

        self.move_to(&mut loan, LoanStatus::Cancelled);
        loan.collateral_claimed = true;
        self.save_loan(&loan);
        self.release_asset_refs(&loan);

        self.env().emit_event(LoanCancelled {
            loan_id,
            collateral_returned: loan.collateral_amount,
        });

        self.release(loan.collateral_asset, loan.borrower, loan.collateral_amount);
        self.unlock();
    }

    /// Fund part or all of an open loan. The caller is the lender.
    pub fn contribute(&mut self, loan_id: u64, amount: U256) {
        self.lock();
        self.require_not_paused();

        let lender = self.env().caller();
        let now = self.env().get_block_time();
        let config = self.get_config();
        let mut loan = self.load_loan(loan_id);

        if !loan.status.is_open_for_funding() {
            self.env().revert(LendingError::LoanNotOpenForFunding);
        }
        if now > loan.funding_deadline {
            self.env().revert(LendingError::FundingDeadlinePassed);
        }
        if lender == loan.borrower {
            self.env().revert(LendingError::SelfFunding);
        }
        let desc = self.assets.get_or_revert(loan.loan_asset);
        self.ensure(check_contribution(amount, loan.remaining_to_fund(), desc.min_contribution));

        self.pool
            .add_contribution(loan_id, lender, amount, config.max_lenders_per_loan);
        loan.amount_funded += amount;

        let fully_funded = loan.amount_funded == loan.total_amount;
        if fully_funded {
            if self.pool.total_contributed(loan_id) != loan.amount_funded {
                self.env().revert(LendingError::InvariantViolation);
            }
            let rate = self.rate_for_new_loan(loan.loan_asset, loan.total_amount);
            loan.interest_rate_bps = rate.min(loan.max_rate_bps);
            self.move_to(&mut loan, LoanStatus::Funded);
            loan.funded_at = now;
            loan.due_date = now + loan.duration;

            let mut stats = self.get_asset_stats(loan.loan_asset);
            stats.outstanding += loan.total_amount;
            self.asset_stats.set(&loan.loan_asset, stats);
        } else if loan.status == LoanStatus::Requested {
            self.move_to(&mut loan, LoanStatus::PartiallyFunded);
        }
        self.save_loan(&loan);

        self.env().emit_event(ContributionReceived {
            loan_id,
            lender,
            amount,
            amount_funded: loan.amount_funded,
        });

        self.escrow(loan.loan_asset, lender, amount);

        if fully_funded {
            self.env().emit_event(LoanFunded {
                loan_id,
                interest_rate_bps: loan.interest_rate_bps,
                due_date: loan.due_date,
            });
            self.release(loan.loan_asset, loan.borrower, loan.total_amount);
        }
        self.unlock();
    }

    /// Refund lenders and borrower of a loan that missed its funding deadline
    pub fn process_funding_failure(&mut self, loan_id: u64) {
        self.lock();
        let mut loan = self.load_loan(loan_id);
        if !loan.status.is_open_for_funding() {
            self.env().revert(LendingError::LoanNotOpenForFunding);
        }
        if self.env().get_block_time() <= loan.funding_deadline {
            self.env().revert(LendingError::FundingDeadlineNotPassed);
        }

        self.move_to(&mut loan, LoanStatus::FundingFailed);
        loan.collateral_claimed = true;
        self.save_loan(&loan);
        self.release_asset_refs(&loan);
        self.pool.mark_all_refunded(loan_id);

        let contributions = self.pool.contributions_of(loan_id);
        self.env().emit_event(FundingFailed {
            loan_id,
            refunded: loan.amount_funded,
        });

        for contribution in contributions.iter() {
            self.release(loan.loan_asset, contribution.lender, contribution.amount);
        }
        self.release(loan.collateral_asset, loan.borrower, loan.collateral_amount);
        self.unlock();
    }

    /// Repay a funded loan. Anyone may pay on the borrower's behalf.
    ///
    /// Installments are accepted up to the due date as long as they leave part
    /// of the principal or interest owed. Settling before the due date costs the
    /// early repayment penalty; inside the grace window only a payment settling
    /// the loan in full is accepted. Overpayment is capped at the settlement amount.
    pub fn repay_loan(&mut self, loan_id: u64, payment: U256) {
        self.lock();
        let payer = self.env().caller();
        let now = self.env().get_block_time();
        let config = self.get_config();
        let mut loan = self.load_loan(loan_id);

        if loan.status != LoanStatus::Funded {
            self.env().revert(LendingError::LoanNotActive);
        }
        if now > loan.due_date + config.grace_period {
            self.env().revert(LendingError::PastGracePeriod);
        }

        // the penalty is only charged on a payment that settles the loan early
        let settle_amount = self
            .total_due_at(&loan, now)
            .saturating_sub(loan.amount_repaid);
        let outstanding = self.outstanding_debt(&loan);
        if payment.is_zero() {
            self.env().revert(LendingError::UnderPayment);
        }
        let applied = if payment >= settle_amount {
            settle_amount
        } else if now > loan.due_date || payment >= outstanding {
            // an installment must leave principal or interest owed
            self.env().revert(LendingError::UnderPayment)
        } else {
            payment
        };
        let (fee, distributable) = self.ensure(calculator::split_fee(applied, config.protocol_fee_bps));
        let contributions = self.pool.contributions_of(loan_id);
        let stakes: Vec<U256> = contributions.iter().map(|c| c.amount).collect();
        let (payouts, dust) = self.ensure(pro_rata_payouts(distributable, &stakes, loan.total_amount));

        for (contribution, payout) in contributions.iter().zip(payouts.iter()) {
            self.pool.record_received(loan_id, contribution.lender, *payout);
        }

        loan.amount_repaid += applied;
        let settled = applied == settle_amount;
        if settled {
            self.move_to(&mut loan, LoanStatus::Repaid);
            loan.collateral_claimed = true;
            self.pool.mark_all_repaid(loan_id);
            self.credit.record_repayment(
                loan.borrower,
                loan.total_amount,
                loan.amount_repaid,
                config.credit.clone(),
            );
            self.reduce_outstanding(&loan);
            self.release_asset_refs(&loan);
        }
        self.add_fees(loan.loan_asset, fee + dust);
        self.save_loan(&loan);

        self.env().emit_event(RepaymentReceived {
            loan_id,
            payer,
            amount: applied,
            protocol_fee: fee,
            remaining_due: settle_amount - applied,
        });

        let fee_recipient = self.get_fee_recipient_or_revert();
        for (contribution, payout) in contributions.iter().zip(payouts.iter()) {
            self.transfer_between(loan.loan_asset, payer, contribution.lender, *payout);
        }
        self.transfer_between(loan.loan_asset, payer, fee_recipient, fee + dust);

        if settled {
            self.env().emit_event(LoanRepaid {
                loan_id,
                total_repaid: loan.amount_repaid,
            });
            self.release(loan.collateral_asset, loan.borrower, loan.collateral_amount);
        }
        self.unlock();
    }

    // ========== Liquidation ==========

    /// Open an auction over the collateral of an underwater funded loan
    pub fn start_auction(&mut self, loan_id: u64) -> u64 {
        self.lock();
        let mut loan = self.load_loan(loan_id);
        if loan.status != LoanStatus::Funded {
            self.env().revert(LendingError::LoanNotActive);
        }
        if self.outstanding_debt(&loan).is_zero() {
            self.env().revert(LendingError::NothingOwed);
        }
        if !self.check_underwater(&loan) {
            self.env().revert(LendingError::NotUnderwater);
        }
        if self.auctions.active_for(loan_id).is_some() {
            self.env().revert(LendingError::AuctionAlreadyActive);
        }

        self.move_to(&mut loan, LoanStatus::Liquidating);
        self.save_loan(&loan);
        self.recognize_default(&loan);

        let auction_id = self.open_auction(&loan, AuctionOrigin::Underwater);
        self.unlock();
        auction_id
    }

    /// Outbid the current leader; the bid is escrowed and the previous leader refunded
    pub fn place_bid(&mut self, auction_id: u64, amount: U256) {
        self.lock();
        let bidder = self.env().caller();
        let previous = self.auctions.accept_bid(auction_id, bidder, amount);
        let bid_asset = match self.auctions.get(auction_id) {
            Some(auction) => auction.bid_asset,
            None => self.env().revert(LendingError::AuctionNotFound),
        };

        self.env().emit_event(BidPlaced {
            auction_id,
            bidder,
            amount,
        });

        self.escrow(bid_asset, bidder, amount);
        if let Some((leader, bid)) = previous {
            self.release(bid_asset, leader, bid);
        }
        self.unlock();
    }

    /// Settle an ended auction: pay lenders, fee and borrower, hand the collateral to the winner
    pub fn finalize_auction(&mut self, auction_id: u64) {
        self.lock();
        let auction = self.auctions.close(auction_id);
        let config = self.get_config();
        let mut loan = self.load_loan(auction.loan_id);

        if loan.status == LoanStatus::Liquidating {
            self.move_to(&mut loan, LoanStatus::Defaulted);
        }
        if loan.collateral_claimed {
            self.env().revert(LendingError::InvariantViolation);
        }
        loan.collateral_claimed = true;
        self.release_asset_refs(&loan);

        match auction.highest_bidder {
            Some(winner) => {
                let owed = self.outstanding_debt(&loan);
                let proceeds = self.ensure(split_proceeds(
                    auction.highest_bid,
                    config.liquidation_fee_bps,
                    owed,
                ));
                let contributions = self.pool.contributions_of(loan.id);
                let stakes: Vec<U256> = contributions.iter().map(|c| c.amount).collect();
                let (payouts, dust) =
                    self.ensure(pro_rata_payouts(proceeds.to_lenders, &stakes, loan.total_amount));
                let lender_total = proceeds.to_lenders - dust;

                for (contribution, payout) in contributions.iter().zip(payouts.iter()) {
                    self.pool.record_received(loan.id, contribution.lender, *payout);
                }
                self.add_fees(auction.bid_asset, proceeds.fee + dust);
                self.save_loan(&loan);

                self.env().emit_event(AuctionFinalized {
                    auction_id,
                    loan_id: loan.id,
                    winner: Some(winner),
                    winning_bid: auction.highest_bid,
                    lender_proceeds: lender_total,
                    borrower_proceeds: proceeds.to_borrower,
                });

                let fee_recipient = self.get_fee_recipient_or_revert();
                for (contribution, payout) in contributions.iter().zip(payouts.iter()) {
                    self.release(auction.bid_asset, contribution.lender, *payout);
                }
                self.release(auction.bid_asset, fee_recipient, proceeds.fee + dust);
                self.release(auction.bid_asset, loan.borrower, proceeds.to_borrower);
                self.release(loan.collateral_asset, winner, loan.collateral_amount);
            }
            None => {
                self.save_loan(&loan);

                self.env().emit_event(AuctionFinalized {
                    auction_id,
                    loan_id: loan.id,
                    winner: None,
                    winning_bid: U256::zero(),
                    lender_proceeds: U256::zero(),
                    borrower_proceeds: U256::zero(),
                });

                self.release(loan.collateral_asset, loan.borrower, loan.collateral_amount);
            }
        }
        self.unlock();
    }

    // ========== Default Voting ==========

    /// Move a loan past its grace period into lender voting
    pub fn trigger_default(&mut self, loan_id: u64) {
        self.lock();
        let config = self.get_config();
        let mut loan = self.load_loan(loan_id);
        if loan.status != LoanStatus::Funded {
            self.env().revert(LendingError::LoanNotActive);
        }
        if self.env().get_block_time() <= loan.due_date + config.grace_period {
            self.env().revert(LendingError::GracePeriodNotOver);
        }
        if self.outstanding_debt(&loan).is_zero() {
            self.env().revert(LendingError::NothingOwed);
        }

        self.move_to(&mut loan, LoanStatus::Voting);
        self.save_loan(&loan);
        self.recognize_default(&loan);

        let eligible = self.pool.lender_count(loan_id);
        let voting_deadline = self.votes.open(loan_id, eligible, config.voting_period);

        self.env().emit_event(DefaultTriggered {
            loan_id,
            voting_deadline,
        });
        self.unlock();
    }

    /// Cast the caller's contribution-weighted vote
    pub fn vote(&mut self, loan_id: u64, action: DefaultAction) {
        self.lock();
        let voter = self.env().caller();
        let loan = self.load_loan(loan_id);
        if loan.status != LoanStatus::Voting {
            self.env().revert(LendingError::LoanNotInVoting);
        }

        let weight = self
            .pool
            .get(loan_id, voter)
            .map(|c| c.amount)
            .unwrap_or_default();
        let policy = self.get_config().voting;
        self.votes.cast(loan_id, voter, action, weight, policy);

        self.env().emit_event(VoteCast {
            loan_id,
            voter,
            action,
            weight,
        });
        self.unlock();
    }

    /// Carry out the voted resolution
    pub fn execute_default_action(&mut self, loan_id: u64) {
        self.lock();
        let config = self.get_config();
        let mut loan = self.load_loan(loan_id);
        if loan.status != LoanStatus::Voting {
            self.env().revert(LendingError::LoanNotInVoting);
        }

        let tally = self.votes.conclude(loan_id);
        let action = final_outcome(&tally, &config.voting);
        let resolved_early = tally.early_outcome.is_some();
        self.move_to(&mut loan, LoanStatus::Defaulted);

        match action {
            DefaultAction::ClaimCollateral => {
                loan.collateral_claimed = true;
                self.save_loan(&loan);
                self.release_asset_refs(&loan);

                let contributions = self.pool.contributions_of(loan_id);
                let stakes: Vec<U256> = contributions.iter().map(|c| c.amount).collect();
                let (shares, dust) =
                    self.ensure(pro_rata_payouts(loan.collateral_amount, &stakes, loan.total_amount));

                self.env().emit_event(DefaultResolved {
                    loan_id,
                    action,
                    resolved_early,
                });

                let fee_recipient = self.get_fee_recipient_or_revert();
                for (contribution, share) in contributions.iter().zip(shares.iter()) {
                    self.release(loan.collateral_asset, contribution.lender, *share);
                }
                self.release(loan.collateral_asset, fee_recipient, dust);
            }
            DefaultAction::Liquidate => {
                self.save_loan(&loan);
                self.env().emit_event(DefaultResolved {
                    loan_id,
                    action,
                    resolved_early,
                });
                self.open_auction(&loan, AuctionOrigin::LenderVote);
            }
        }
        self.unlock();
    }

    // ========== Admin Functions ==========

    /// Register an asset (admin only). `handle` is None for native CSPR.
    pub fn register_asset(
        &mut self,
        handle: Option<Address>,
        decimals: u8,
        min_loan: U256,
        max_loan: U256,
        min_contribution: U256,
        collateral_ratio_bps: u32,
        liquidation_threshold_pct: u32,
        lending_capacity: U256,
    ) -> u32 {
        self.require_admin();
        let asset_id = self.assets.register(AssetDescriptor {
            asset_id: 0,
            handle,
            decimals,
            active: true,
            min_loan,
            max_loan,
            min_contribution,
            collateral_ratio_bps,
            liquidation_threshold_pct,
            lending_capacity,
        });
        self.env().emit_event(AssetRegistered {
            asset_id,
            handle,
            decimals,
        });
        asset_id
    }

    /// Change the bounds and risk parameters of an asset no open loan references (admin only)
    pub fn update_asset_params(
        &mut self,
        asset_id: u32,
        min_loan: U256,
        max_loan: U256,
        min_contribution: U256,
        collateral_ratio_bps: u32,
        liquidation_threshold_pct: u32,
        lending_capacity: U256,
    ) {
        self.require_admin();
        let current = self.assets.get_or_revert(asset_id);
        self.assets.update(
            asset_id,
            AssetDescriptor {
                min_loan,
                max_loan,
                min_contribution,
                collateral_ratio_bps,
                liquidation_threshold_pct,
                lending_capacity,
                ..current
            },
        );
    }

    pub fn deactivate_asset(&mut self, asset_id: u32) {
        self.require_admin();
        self.assets.deactivate(asset_id);
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.require_admin();
        if let Err(error) = config.validate() {
            self.env().revert(error);
        }
        self.oracle.set_staleness_threshold(config.staleness_threshold);
        self.config.set(config);
    }

    pub fn set_fee_recipient(&mut self, fee_recipient: Address) {
        self.require_admin();
        self.fee_recipient.set(fee_recipient);
    }

    pub fn set_price_feed(&mut self, price_feed: Address) {
        self.require_admin();
        self.oracle.set_feed(price_feed);
    }

    pub fn set_staleness_threshold(&mut self, threshold: u64) {
        self.require_admin();
        let mut config = self.get_config();
        config.staleness_threshold = threshold;
        if let Err(error) = config.validate() {
            self.env().revert(error);
        }
        self.oracle.set_staleness_threshold(threshold);
        self.config.set(config);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.require_admin();
        self.paused.set(paused);
    }

    pub fn transfer_admin(&mut self, new_admin: Address) {
        self.require_admin();
        self.admin.set(new_admin);
    }

    // ========== Calculator Entry Points ==========

    /// Collateral needed for `amount` of `loan_asset` at `ratio_bps`, from fresh prices
    pub fn required_collateral(
        &self,
        loan_asset: u32,
        amount: U256,
        collateral_asset: u32,
        ratio_bps: u32,
    ) -> U256 {
        let loan_desc = self.assets.get_or_revert(loan_asset);
        let coll_desc = self.assets.get_or_revert(collateral_asset);
        let loan_price = self.oracle.latest_price(loan_asset);
        let coll_price = self.oracle.latest_price(collateral_asset);
        self.ensure(calculator::required_collateral(
            amount,
            loan_price.price,
            loan_desc.decimals,
            coll_price.price,
            coll_desc.decimals,
            ratio_bps,
        ))
    }

    /// Current rate of the kink curve for an asset
    pub fn dynamic_rate(&self, asset_id: u32) -> u32 {
        let config = self.get_config();
        calculator::kink_rate_bps(&config.rate_model, self.get_utilization(asset_id))
    }

    /// Whether a funded loan's collateral has fallen below its health threshold
    pub fn is_underwater(&self, loan_id: u64) -> bool {
        let loan = self.load_loan(loan_id);
        loan.status == LoanStatus::Funded && self.check_underwater(&loan)
    }

    pub fn get_utilization(&self, asset_id: u32) -> u32 {
        let desc = self.assets.get_or_revert(asset_id);
        let stats = self.get_asset_stats(asset_id);
        calculator::utilization_bps(stats.outstanding, desc.lending_capacity)
    }

    // ========== Query Functions ==========

    pub fn get_loan(&self, loan_id: u64) -> Option<Loan> {
        self.loans.get(&loan_id)
    }

    pub fn get_loan_count(&self) -> u64 {
        self.loan_count.get().unwrap_or(0)
    }

    /// Amount that settles the loan at the current block time
    pub fn get_total_due(&self, loan_id: u64) -> U256 {
        let loan = self.load_loan(loan_id);
        self.total_due_at(&loan, self.env().get_block_time())
    }

    pub fn get_remaining_due(&self, loan_id: u64) -> U256 {
        let loan = self.load_loan(loan_id);
        self.total_due_at(&loan, self.env().get_block_time())
            .saturating_sub(loan.amount_repaid)
    }

    pub fn get_borrower_loan_count(&self, borrower: Address) -> u32 {
        self.borrower_loan_count.get(&borrower).unwrap_or(0)
    }

    pub fn get_borrower_loan_id_at(&self, borrower: Address, index: u32) -> Option<u64> {
        self.borrower_loans.get(&(borrower, index))
    }

    pub fn get_contribution(&self, loan_id: u64, lender: Address) -> Option<LenderContribution> {
        self.pool.get(loan_id, lender)
    }

    pub fn get_lender_count(&self, loan_id: u64) -> u32 {
        self.pool.lender_count(loan_id)
    }

    pub fn get_lender_at(&self, loan_id: u64, index: u32) -> Option<Address> {
        self.pool.lender_at(loan_id, index)
    }

    pub fn get_auction(&self, auction_id: u64) -> Option<LiquidationAuction> {
        self.auctions.get(auction_id)
    }

    pub fn get_active_auction(&self, loan_id: u64) -> Option<u64> {
        self.auctions.active_for(loan_id)
    }

    pub fn get_auction_count(&self) -> u64 {
        self.auctions.count()
    }

    pub fn get_vote_tally(&self, loan_id: u64) -> Option<DefaultVote> {
        self.votes.get(loan_id)
    }

    pub fn has_voted(&self, loan_id: u64, voter: Address) -> bool {
        self.votes.has_voted(loan_id, voter)
    }

    pub fn get_credit_score(&self, borrower: Address) -> Option<CreditScore> {
        self.credit.get(borrower)
    }

    /// Risk band of a borrower; borrowers without history rank at the initial score
    pub fn get_risk_tier(&self, borrower: Address) -> RiskTier {
        let policy = self.get_config().credit;
        let score = self
            .credit
            .get(borrower)
            .map(|record| record.score)
            .unwrap_or(policy.initial_score);
        risk_tier(score, &policy)
    }

    pub fn get_asset(&self, asset_id: u32) -> Option<AssetDescriptor> {
        self.assets.get(asset_id)
    }

    pub fn get_asset_count(&self) -> u32 {
        self.assets.count()
    }

    pub fn get_asset_open_refs(&self, asset_id: u32) -> u32 {
        self.assets.open_refs(asset_id)
    }

    pub fn get_asset_stats(&self, asset_id: u32) -> AssetStats {
        self.asset_stats.get(&asset_id).unwrap_or_default()
    }

    pub fn get_config(&self) -> EngineConfig {
        self.config.get().unwrap_or_default()
    }

    pub fn get_admin(&self) -> Option<Address> {
        self.admin.get()
    }

    pub fn get_fee_recipient(&self) -> Option<Address> {
        self.fee_recipient.get()
    }

    pub fn get_settlement(&self) -> Option<Address> {
        self.settlement.get()
    }

    pub fn get_price_feed(&self) -> Option<Address> {
        self.oracle.get_feed()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get().unwrap_or(false)
    }
}

impl LendingEngine {
    fn lock(&mut self) {
        if self.locked.get().unwrap_or(false) {
            self.env().revert(LendingError::Reentrancy);
        }
        self.locked.set(true);
    }

    fn unlock(&mut self) {
        self.locked.set(false);
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(LendingError::Unauthorized);
        }
    }

    fn require_not_paused(&self) {
        if self.is_paused() {
            self.env().revert(LendingError::Paused);
        }
    }

    fn ensure<T>(&self, result: Result<T, LendingError>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => self.env().revert(error),
        }
    }

    fn load_loan(&self, loan_id: u64) -> Loan {
        match self.loans.get(&loan_id) {
            Some(loan) => loan,
            None => self.env().revert(LendingError::LoanNotFound),
        }
    }

    fn save_loan(&mut self, loan: &Loan) {
        self.loans.set(&loan.id, loan.clone());
    }

    fn move_to(&self, loan: &mut Loan, next: LoanStatus) {
        if !loan.transition(next) {
            self.env().revert(LendingError::InvalidTransition);
        }
    }

    /// Principal plus interest, plus the early-settlement penalty before the due date
    fn total_due_at(&self, loan: &Loan, now: u64) -> U256 {
        let penalty_bps = if loan.status == LoanStatus::Funded && now < loan.due_date {
            self.get_config().early_repayment_penalty_bps
        } else {
            0
        };
        self.ensure(calculator::total_due(
            loan.total_amount,
            loan.interest_rate_bps,
            penalty_bps,
        ))
    }

    /// Kink rate with `amount` added to the asset's outstanding principal
    fn rate_for_new_loan(&self, asset_id: u32, amount: U256) -> u32 {
        let config = self.get_config();
        let desc = self.assets.get_or_revert(asset_id);
        let stats = self.get_asset_stats(asset_id);
        let utilization =
            calculator::utilization_bps(stats.outstanding.saturating_add(amount), desc.lending_capacity);
        calculator::kink_rate_bps(&config.rate_model, utilization)
    }

    /// Principal plus interest still unpaid, penalty excluded
    fn outstanding_debt(&self, loan: &Loan) -> U256 {
        self.ensure(calculator::total_due(loan.total_amount, loan.interest_rate_bps, 0))
            .saturating_sub(loan.amount_repaid)
    }

    /// Collateral value against remaining principal and interest, penalty excluded
    fn check_underwater(&self, loan: &Loan) -> bool {
        let loan_desc = self.assets.get_or_revert(loan.loan_asset);
        let coll_desc = self.assets.get_or_revert(loan.collateral_asset);
        let loan_price = self.oracle.latest_price(loan.loan_asset);
        let coll_price = self.oracle.latest_price(loan.collateral_asset);

        let debt = self.outstanding_debt(loan);
        let debt_usd = self.ensure(calculator::usd_value(debt, loan_desc.decimals, loan_price.price));
        let collateral_usd = self.ensure(calculator::usd_value(
            loan.collateral_amount,
            coll_desc.decimals,
            coll_price.price,
        ));
        calculator::is_underwater(collateral_usd, debt_usd, loan.liquidation_threshold_pct)
    }

    fn open_auction(&mut self, loan: &Loan, origin: AuctionOrigin) -> u64 {
        let config = self.get_config();
        let loan_desc = self.assets.get_or_revert(loan.loan_asset);
        let coll_desc = self.assets.get_or_revert(loan.collateral_asset);
        let loan_price = self.oracle.latest_price(loan.loan_asset);
        let coll_price = self.oracle.latest_price(loan.collateral_asset);

        let starting_price = self.ensure(calculator::usd_value(
            loan.collateral_amount,
            coll_desc.decimals,
            coll_price.price,
        ));
        let reserve_price = self.ensure(calculator::bps_of(starting_price, config.auction_reserve_bps));
        let reserve_amount = self.ensure(calculator::amount_for_usd(
            reserve_price,
            loan_desc.decimals,
            loan_price.price,
        ));

        let auction_id = self.auctions.open(AuctionTerms {
            loan_id: loan.id,
            origin,
            bid_asset: loan.loan_asset,
            starting_price,
            reserve_price,
            reserve_amount,
            duration: config.auction_duration,
        });
        let end_time = self
            .auctions
            .get(auction_id)
            .map(|auction| auction.end_time)
            .unwrap_or_default();

        self.env().emit_event(LiquidationTriggered {
            loan_id: loan.id,
            auction_id,
            origin,
            starting_price,
            reserve_price,
            end_time,
        });
        auction_id
    }

    /// Credit penalty and outstanding principal update at default recognition
    fn recognize_default(&mut self, loan: &Loan) {
        let policy = self.get_config().credit;
        self.credit
            .record_default(loan.borrower, loan.total_amount, loan.amount_repaid, policy);
        self.reduce_outstanding(loan);
    }

    fn reduce_outstanding(&mut self, loan: &Loan) {
        let mut stats = self.get_asset_stats(loan.loan_asset);
        stats.outstanding = stats.outstanding.saturating_sub(loan.total_amount);
        self.asset_stats.set(&loan.loan_asset, stats);
    }

    fn add_fees(&mut self, asset_id: u32, amount: U256) {
        if amount.is_zero() {
            return;
        }
        let mut stats = self.get_asset_stats(asset_id);
        stats.fees_collected += amount;
        self.asset_stats.set(&asset_id, stats);
    }

    fn release_asset_refs(&mut self, loan: &Loan) {
        self.assets.release(loan.loan_asset);
        self.assets.release(loan.collateral_asset);
    }

    fn get_fee_recipient_or_revert(&self) -> Address {
        match self.fee_recipient.get() {
            Some(recipient) => recipient,
            None => self.env().revert(LendingError::InvalidConfig),
        }
    }

    fn settlement_address(&self) -> Address {
        match self.settlement.get() {
            Some(settlement) => settlement,
            None => self.env().revert(LendingError::InvalidConfig),
        }
    }

    fn escrow(&self, asset_id: u32, from: Address, amount: U256) {
        SettlementCalls::escrow(&self.env(), self.settlement_address(), asset_id, from, amount);
    }

    fn release(&self, asset_id: u32, to: Address, amount: U256) {
        SettlementCalls::release(&self.env(), self.settlement_address(), asset_id, to, amount);
    }

    fn transfer_between(&self, asset_id: u32, from: Address, to: Address, amount: U256) {
        SettlementCalls::transfer_between(
            &self.env(),
            self.settlement_address(),
            asset_id,
            from,
            to,
            amount,
        );
    }
}
