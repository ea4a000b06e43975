//! Events emitted by the lending engine, one per completed transition.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::types::{AuctionOrigin, DefaultAction};

/// Event emitted when a borrower posts a loan request
#[odra::event]
pub struct LoanRequested {
    pub loan_id: u64,
    pub borrower: Address,
    pub loan_asset: u32,
    pub collateral_asset: u32,
    pub amount: U256,
    /// Collateral collected from the borrower
    pub collateral_amount: U256,
    pub duration: u64,
}

/// Event emitted when a borrower withdraws an unfunded request
#[odra::event]
pub struct LoanCancelled {
    pub loan_id: u64,
    pub collateral_returned: U256,
}

/// Event emitted when a lender funds part of a loan
#[odra::event]
pub struct ContributionReceived {
    pub loan_id: u64,
    pub lender: Address,
    pub amount: U256,
    /// Total funded after this contribution
    pub amount_funded: U256,
}

/// Event emitted when a loan becomes fully funded
#[odra::event]
pub struct LoanFunded {
    pub loan_id: u64,
    pub interest_rate_bps: u32,
    pub due_date: u64,
}

/// Event emitted when a loan missed its funding deadline
#[odra::event]
pub struct FundingFailed {
    pub loan_id: u64,
    /// Principal returned to lenders
    pub refunded: U256,
}

/// Event emitted for every repayment
#[odra::event]
pub struct RepaymentReceived {
    pub loan_id: u64,
    pub payer: Address,
    /// Payment applied after capping at the remaining due
    pub amount: U256,
    pub protocol_fee: U256,
    pub remaining_due: U256,
}

/// Event emitted when a loan is fully settled
#[odra::event]
pub struct LoanRepaid {
    pub loan_id: u64,
    pub total_repaid: U256,
}

/// Event emitted when a liquidation auction opens
#[odra::event]
pub struct LiquidationTriggered {
    pub loan_id: u64,
    pub auction_id: u64,
    pub origin: AuctionOrigin,
    /// Collateral value at start (USD, 1e8)
    pub starting_price: U256,
    pub reserve_price: U256,
    pub end_time: u64,
}

/// Event emitted when a bid takes the lead
#[odra::event]
pub struct BidPlaced {
    pub auction_id: u64,
    pub bidder: Address,
    pub amount: U256,
}

/// Event emitted when an auction settles
#[odra::event]
pub struct AuctionFinalized {
    pub auction_id: u64,
    pub loan_id: u64,
    pub winner: Option<Address>,
    pub winning_bid: U256,
    /// Proceeds paid to lenders
    pub lender_proceeds: U256,
    /// Proceeds returned to the borrower
    pub borrower_proceeds: U256,
}

/// Event emitted when an overdue loan enters lender voting
#[odra::event]
pub struct DefaultTriggered {
    pub loan_id: u64,
    pub voting_deadline: u64,
}

/// Event emitted for each lender vote
#[odra::event]
pub struct VoteCast {
    pub loan_id: u64,
    pub voter: Address,
    pub action: DefaultAction,
    pub weight: U256,
}

/// Event emitted when the voted resolution executes
#[odra::event]
pub struct DefaultResolved {
    pub loan_id: u64,
    pub action: DefaultAction,
    pub resolved_early: bool,
}

/// Event emitted when an asset is added to the registry
#[odra::event]
pub struct AssetRegistered {
    pub asset_id: u32,
    pub handle: Option<Address>,
    pub decimals: u8,
}
