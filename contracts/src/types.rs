//! Common types used across the lending engine.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::calculator::BPS_SCALE;
use crate::errors::LendingError;

/// Lifecycle status of a loan.
///
/// Transitions are one-way; see [`LoanStatus::can_transition_to`].
#[odra::odra_type]
#[derive(Copy)]
pub enum LoanStatus {
    /// Collateral posted, waiting for lenders
    Requested,
    /// At least one contribution, not yet fully funded
    PartiallyFunded,
    /// Fully funded, principal released to the borrower
    Funded,
    /// Fully repaid, collateral returned
    Repaid,
    /// Grace period expired, lenders are voting on the resolution
    Voting,
    /// Collateral health breached, auction running
    Liquidating,
    /// Default resolved
    Defaulted,
    /// Withdrawn by the borrower before any funding
    Cancelled,
    /// Funding deadline passed without full funding
    FundingFailed,
}

impl LoanStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Requested, PartiallyFunded)
                | (Requested, Funded)
                | (Requested, Cancelled)
                | (Requested, FundingFailed)
                | (PartiallyFunded, Funded)
                | (PartiallyFunded, FundingFailed)
                | (Funded, Repaid)
                | (Funded, Voting)
                | (Funded, Liquidating)
                | (Voting, Defaulted)
                | (Liquidating, Defaulted)
        )
    }

    /// Terminal loans are read-only.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Repaid
                | LoanStatus::Defaulted
                | LoanStatus::Cancelled
                | LoanStatus::FundingFailed
        )
    }

    /// Loan still accepts contributions (subject to the deadline).
    pub fn is_open_for_funding(&self) -> bool {
        matches!(self, LoanStatus::Requested | LoanStatus::PartiallyFunded)
    }
}

/// Loan entity
#[odra::odra_type]
pub struct Loan {
    /// Loan id (starts at 1)
    pub id: u64,
    /// Borrower address
    pub borrower: Address,
    /// Asset being borrowed
    pub loan_asset: u32,
    /// Asset posted as collateral
    pub collateral_asset: u32,
    /// Requested principal
    pub total_amount: U256,
    /// Principal contributed so far
    pub amount_funded: U256,
    /// Collateral collected at request time
    pub collateral_amount: U256,
    /// Set once the collateral has been released to anyone
    pub collateral_claimed: bool,
    /// Collateral ratio used at request time in bps
    pub collateral_ratio_bps: u32,
    /// Health threshold in percent (collateral value / debt value)
    pub liquidation_threshold_pct: u32,
    /// Highest rate the borrower accepts, in bps
    pub max_rate_bps: u32,
    /// Rate fixed at funding, in bps of principal over the whole term
    pub interest_rate_bps: u32,
    /// Loan term
    pub duration: u64,
    pub created_at: u64,
    pub funding_deadline: u64,
    pub funded_at: u64,
    pub due_date: u64,
    pub status: LoanStatus,
    /// Total repaid so far (principal, interest and penalty)
    pub amount_repaid: U256,
}

impl Loan {
    /// Principal still missing before the loan is fully funded.
    pub fn remaining_to_fund(&self) -> U256 {
        self.total_amount.saturating_sub(self.amount_funded)
    }

    /// Move to `next`, returning false if the state machine forbids it.
    pub fn transition(&mut self, next: LoanStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }
}

/// One lender's stake in a loan
#[odra::odra_type]
pub struct LenderContribution {
    pub loan_id: u64,
    pub lender: Address,
    /// Principal contributed
    pub amount: U256,
    /// Total paid back to this lender (repayments and auction proceeds)
    pub amount_received: U256,
    /// Set when the loan is fully repaid
    pub repaid: bool,
    /// Set when the contribution was returned after a funding failure
    pub refunded: bool,
}

/// Price observation (USD per whole token, scaled by 1e8)
#[odra::odra_type]
#[derive(Copy)]
pub struct PriceQuote {
    pub asset_id: u32,
    pub price: U256,
    pub observed_at: u64,
}

/// Why an auction was opened
#[odra::odra_type]
#[derive(Copy)]
pub enum AuctionOrigin {
    /// Collateral health breached on a funded loan
    Underwater,
    /// Lenders voted to liquidate after a missed repayment
    LenderVote,
}

/// Liquidation auction over a loan's collateral
#[odra::odra_type]
pub struct LiquidationAuction {
    pub auction_id: u64,
    pub loan_id: u64,
    pub origin: AuctionOrigin,
    /// Asset bids are paid in (the loan asset)
    pub bid_asset: u32,
    pub start_time: u64,
    pub end_time: u64,
    /// Collateral value at start (USD, 1e8)
    pub starting_price: U256,
    /// Minimum acceptable value (USD, 1e8)
    pub reserve_price: U256,
    /// Reserve converted to bid asset units
    pub reserve_amount: U256,
    pub highest_bidder: Option<Address>,
    pub highest_bid: U256,
    pub active: bool,
}

/// Resolution a lender can vote for
#[odra::odra_type]
#[derive(Copy)]
pub enum DefaultAction {
    /// Sell the collateral through an auction
    Liquidate,
    /// Split the collateral between lenders pro rata
    ClaimCollateral,
}

/// Per-loan vote state
#[odra::odra_type]
pub struct DefaultVote {
    pub loan_id: u64,
    pub deadline: u64,
    pub liquidate_weight: U256,
    pub claim_weight: U256,
    pub votes_cast: u32,
    pub eligible_voters: u32,
    /// Set when the early-resolution thresholds were met
    pub early_outcome: Option<DefaultAction>,
    pub executed: bool,
}

impl DefaultVote {
    pub fn total_weight(&self) -> U256 {
        self.liquidate_weight + self.claim_weight
    }

    pub fn everyone_voted(&self) -> bool {
        self.eligible_voters > 0 && self.votes_cast >= self.eligible_voters
    }
}

/// Borrower reputation
#[odra::odra_type]
pub struct CreditScore {
    pub borrower: Address,
    pub score: u32,
    pub total_loans: u32,
    pub repaid_loans: u32,
    pub defaulted_loans: u32,
    pub total_borrowed: U256,
    pub total_repaid: U256,
    pub last_updated: u64,
}

/// Coarse risk band derived from the score
#[odra::odra_type]
#[derive(Copy)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Per-asset aggregates
#[odra::odra_type]
#[derive(Default)]
pub struct AssetStats {
    /// Principal of loans currently in Funded status
    pub outstanding: U256,
    /// Protocol fees collected in this asset
    pub fees_collected: U256,
}

/// Registered asset and its per-asset parameters
#[odra::odra_type]
pub struct AssetDescriptor {
    /// Asset id assigned by the registry (starts at 1)
    pub asset_id: u32,
    /// Custody handle: None for native CSPR, Some for a CEP-18 contract
    pub handle: Option<Address>,
    /// Decimal places of the smallest unit
    pub decimals: u8,
    pub active: bool,
    /// Smallest loan that may be requested in this asset
    pub min_loan: U256,
    /// Largest loan that may be requested in this asset
    pub max_loan: U256,
    /// Smallest lender contribution in this asset
    pub min_contribution: U256,
    /// Required collateral ratio in bps when posted as collateral (15000 = 150%)
    pub collateral_ratio_bps: u32,
    /// Health threshold in percent when posted as collateral
    pub liquidation_threshold_pct: u32,
    /// Denominator of utilization for loans in this asset
    pub lending_capacity: U256,
}

/// Parameters of the kink interest curve
#[odra::odra_type]
pub struct RateModel {
    /// Rate at zero utilization
    pub base_rate_bps: u32,
    /// Utilization where the steep slope starts
    pub optimal_utilization_bps: u32,
    /// Rate added between zero and optimal utilization
    pub slope1_bps: u32,
    /// Rate added between optimal and full utilization
    pub slope2_bps: u32,
}

/// Credit score bounds and adjustments
#[odra::odra_type]
pub struct CreditPolicy {
    pub initial_score: u32,
    pub min_score: u32,
    pub max_score: u32,
    /// Returning borrowers below this score cannot request loans
    pub min_score_to_borrow: u32,
    pub repayment_reward: u32,
    pub default_penalty: u32,
}

/// Lender vote thresholds
#[odra::odra_type]
pub struct VotingPolicy {
    /// Liquidate share of cast weight above which liquidation is decided early
    pub early_accept_bps: u32,
    /// Liquidate share of cast weight below which claiming is decided early
    pub early_reject_bps: u32,
    /// Votes required before an early decision
    pub min_votes_for_early: u32,
    /// Outcome of an exact tie
    pub ties_favor_liquidation: bool,
}

/// Engine configuration. Durations are in block time units (ms).
#[odra::odra_type]
pub struct EngineConfig {
    pub min_duration: u64,
    pub max_duration: u64,
    /// Window for lenders to fully fund a request
    pub funding_period: u64,
    /// Late repayment window after the due date
    pub grace_period: u64,
    pub auction_duration: u64,
    pub voting_period: u64,
    /// Fee on repayments in bps
    pub protocol_fee_bps: u32,
    /// Fee on the winning bid in bps
    pub liquidation_fee_bps: u32,
    /// Extra charge on principal when settling before the due date
    pub early_repayment_penalty_bps: u32,
    /// Auction reserve as a share of the starting collateral value
    pub auction_reserve_bps: u32,
    pub max_lenders_per_loan: u32,
    /// Maximum accepted price age
    pub staleness_threshold: u64,
    pub rate_model: RateModel,
    pub credit: CreditPolicy,
    pub voting: VotingPolicy,
}

/// One day in block time units
pub const DAY_MS: u64 = 86_400_000;

/// Upper bound for every configured duration
pub const MAX_PERIOD: u64 = 10 * 365 * DAY_MS;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_duration: DAY_MS,
            max_duration: 365 * DAY_MS,
            funding_period: 7 * DAY_MS,
            grace_period: 3 * DAY_MS,
            auction_duration: DAY_MS,
            voting_period: 3 * DAY_MS,
            protocol_fee_bps: 100,
            liquidation_fee_bps: 500,
            early_repayment_penalty_bps: 100,
            auction_reserve_bps: 8000,
            max_lenders_per_loan: 50,
            staleness_threshold: 3_600_000,
            rate_model: RateModel {
                base_rate_bps: 200,
                optimal_utilization_bps: 8000,
                slope1_bps: 400,
                slope2_bps: 6000,
            },
            credit: CreditPolicy {
                initial_score: 600,
                min_score: 300,
                max_score: 850,
                min_score_to_borrow: 500,
                repayment_reward: 10,
                default_penalty: 50,
            },
            voting: VotingPolicy {
                early_accept_bps: 7500,
                early_reject_bps: 2500,
                min_votes_for_early: 3,
                ties_favor_liquidation: true,
            },
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot operate under.
    pub fn validate(&self) -> Result<(), LendingError> {
        let bps_ok = |v: u32| v <= BPS_SCALE;
        let rm = &self.rate_model;
        let credit = &self.credit;
        let voting = &self.voting;

        let period_ok = |v: u64| v <= MAX_PERIOD;

        let valid = self.min_duration > 0
            && self.min_duration <= self.max_duration
            && period_ok(self.max_duration)
            && period_ok(self.funding_period)
            && period_ok(self.grace_period)
            && period_ok(self.auction_duration)
            && period_ok(self.voting_period)
            && self.funding_period > 0
            && self.auction_duration > 0
            && self.voting_period > 0
            && self.max_lenders_per_loan > 0
            && self.staleness_threshold > 0
            && bps_ok(self.protocol_fee_bps)
            && bps_ok(self.liquidation_fee_bps)
            && bps_ok(self.early_repayment_penalty_bps)
            && self.auction_reserve_bps > 0
            && bps_ok(self.auction_reserve_bps)
            && rm.optimal_utilization_bps > 0
            && rm.optimal_utilization_bps < BPS_SCALE
            && rm.base_rate_bps <= BPS_SCALE
            && credit.min_score <= credit.initial_score
            && credit.initial_score <= credit.max_score
            && credit.min_score_to_borrow <= credit.max_score
            && voting.early_reject_bps <= voting.early_accept_bps
            && bps_ok(voting.early_accept_bps);

        if valid {
            Ok(())
        } else {
            Err(LendingError::InvalidConfig)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funding_transitions() {
        assert!(LoanStatus::Requested.can_transition_to(LoanStatus::PartiallyFunded));
        assert!(LoanStatus::Requested.can_transition_to(LoanStatus::Funded));
        assert!(LoanStatus::PartiallyFunded.can_transition_to(LoanStatus::Funded));
        assert!(LoanStatus::PartiallyFunded.can_transition_to(LoanStatus::FundingFailed));
        assert!(!LoanStatus::PartiallyFunded.can_transition_to(LoanStatus::Cancelled));
        assert!(!LoanStatus::PartiallyFunded.can_transition_to(LoanStatus::PartiallyFunded));
    }

    #[test]
    fn test_no_state_is_revisited() {
        use LoanStatus::*;
        let all = [
            Requested, PartiallyFunded, Funded, Repaid, Voting,
            Liquidating, Defaulted, Cancelled, FundingFailed,
        ];
        for from in all {
            assert!(!from.can_transition_to(Requested));
            assert!(!from.can_transition_to(from));
        }
    }

    #[test]
    fn test_terminal_states_have_no_exit() {
        use LoanStatus::*;
        let all = [
            Requested, PartiallyFunded, Funded, Repaid, Voting,
            Liquidating, Defaulted, Cancelled, FundingFailed,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.auction_reserve_bps, 8000);
        assert_eq!(config.voting.min_votes_for_early, 3);
        assert_eq!(config.credit.initial_score, 600);
    }

    #[test]
    fn test_config_rejects_inverted_bounds() {
        let mut config = EngineConfig::default();
        config.min_duration = config.max_duration + 1;
        assert_eq!(config.validate(), Err(LendingError::InvalidConfig));

        let mut config = EngineConfig::default();
        config.rate_model.optimal_utilization_bps = 10_000;
        assert_eq!(config.validate(), Err(LendingError::InvalidConfig));

        let mut config = EngineConfig::default();
        config.voting.early_reject_bps = 8000;
        assert_eq!(config.validate(), Err(LendingError::InvalidConfig));
    }

    #[test]
    fn test_config_rejects_unbounded_periods() {
        let mut config = EngineConfig::default();
        config.funding_period = u64::MAX;
        assert_eq!(config.validate(), Err(LendingError::InvalidConfig));

        let mut config = EngineConfig::default();
        config.grace_period = MAX_PERIOD + 1;
        assert_eq!(config.validate(), Err(LendingError::InvalidConfig));

        let mut config = EngineConfig::default();
        config.max_duration = MAX_PERIOD;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_default_paths() {
        assert!(LoanStatus::Funded.can_transition_to(LoanStatus::Voting));
        assert!(LoanStatus::Funded.can_transition_to(LoanStatus::Liquidating));
        assert!(LoanStatus::Voting.can_transition_to(LoanStatus::Defaulted));
        assert!(LoanStatus::Liquidating.can_transition_to(LoanStatus::Defaulted));
        assert!(!LoanStatus::Voting.can_transition_to(LoanStatus::Liquidating));
        assert!(!LoanStatus::Liquidating.can_transition_to(LoanStatus::Repaid));
    }
}
