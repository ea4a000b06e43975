//! Lending engine error definitions.

use odra::prelude::*;

/// Lending engine errors
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LendingError {
    // Loan errors (1xx)
    LoanNotFound = 100,
    InvalidAmount = 101,
    InvalidDuration = 102,
    AmountOutOfBounds = 103,
    InvalidRateBound = 104,
    InsufficientCollateral = 105,
    NotBorrower = 106,
    NotCancelable = 107,
    LoanNotActive = 108,
    PastGracePeriod = 109,
    UnderPayment = 110,
    InvalidTransition = 111,
    NothingOwed = 112,

    // Oracle errors (2xx)
    PriceUnavailable = 200,
    InvalidPrice = 201,
    StalePrice = 202,

    // Asset registry errors (3xx)
    UnsupportedAsset = 300,
    AssetNotFound = 301,
    AssetInUse = 302,
    InvalidAssetParams = 303,

    // Access control errors (4xx)
    Unauthorized = 400,
    Paused = 401,

    // Funding pool errors (5xx)
    LoanNotOpenForFunding = 500,
    FundingDeadlinePassed = 501,
    FundingDeadlineNotPassed = 502,
    SelfFunding = 503,
    BelowMinContribution = 504,
    ExceedsRemaining = 505,
    LeavesDust = 506,
    TooManyLenders = 507,

    // Auction errors (6xx)
    NotUnderwater = 600,
    AuctionAlreadyActive = 601,
    AuctionNotFound = 602,
    AuctionNotActive = 603,
    AuctionEnded = 604,
    AuctionNotEnded = 605,
    BidTooLow = 606,
    BelowReserve = 607,
    AuctionAlreadyFinalized = 608,

    // Voting errors (7xx)
    GracePeriodNotOver = 700,
    LoanNotInVoting = 701,
    VotingClosed = 702,
    NotAVoter = 703,
    AlreadyVoted = 704,
    VotingStillOpen = 705,

    // Credit errors (8xx)
    CreditScoreTooLow = 800,

    // Configuration / engine errors (9xx)
    InvalidConfig = 900,
    Reentrancy = 901,
    InvariantViolation = 902,
    MathOverflow = 903,

    // Settlement ledger errors (10xx)
    InsufficientBalance = 1000,
    InsufficientAllowance = 1001,
}

impl LendingError {
    pub const fn message(&self) -> &'static str {
        match self {
            // Loan
            LendingError::LoanNotFound => "Loan not found",
            LendingError::InvalidAmount => "Amount must be greater than zero",
            LendingError::InvalidDuration => "Duration outside allowed range",
            LendingError::AmountOutOfBounds => "Amount outside asset loan bounds",
            LendingError::InvalidRateBound => "Rate bound outside allowed range",
            LendingError::InsufficientCollateral => "Insufficient collateral",
            LendingError::NotBorrower => "Caller is not the borrower",
            LendingError::NotCancelable => "Loan cannot be cancelled",
            LendingError::LoanNotActive => "Loan is not active",
            LendingError::PastGracePeriod => "Grace period has passed",
            LendingError::UnderPayment => "Payment too small",
            LendingError::InvalidTransition => "Invalid loan status transition",
            LendingError::NothingOwed => "Loan has no outstanding debt",

            // Oracle
            LendingError::PriceUnavailable => "Oracle price unavailable",
            LendingError::InvalidPrice => "Oracle price is zero",
            LendingError::StalePrice => "Oracle price stale",

            // Asset registry
            LendingError::UnsupportedAsset => "Asset not supported",
            LendingError::AssetNotFound => "Asset not found",
            LendingError::AssetInUse => "Asset referenced by an open loan",
            LendingError::InvalidAssetParams => "Invalid asset parameters",

            // Access control
            LendingError::Unauthorized => "Unauthorized: caller is not admin",
            LendingError::Paused => "Operation blocked: engine paused",

            // Funding pool
            LendingError::LoanNotOpenForFunding => "Loan is not open for funding",
            LendingError::FundingDeadlinePassed => "Funding deadline has passed",
            LendingError::FundingDeadlineNotPassed => "Funding deadline has not passed",
            LendingError::SelfFunding => "Borrower cannot fund own loan",
            LendingError::BelowMinContribution => "Contribution below minimum",
            LendingError::ExceedsRemaining => "Contribution exceeds remaining amount",
            LendingError::LeavesDust => "Contribution leaves an unfundable remainder",
            LendingError::TooManyLenders => "Lender limit reached",

            // Auction
            LendingError::NotUnderwater => "Loan is not underwater",
            LendingError::AuctionAlreadyActive => "Auction already active for loan",
            LendingError::AuctionNotFound => "Auction not found",
            LendingError::AuctionNotActive => "Auction is not active",
            LendingError::AuctionEnded => "Auction has ended",
            LendingError::AuctionNotEnded => "Auction has not ended",
            LendingError::BidTooLow => "Bid must exceed highest bid",
            LendingError::BelowReserve => "Bid below reserve",
            LendingError::AuctionAlreadyFinalized => "Auction already finalized",

            // Voting
            LendingError::GracePeriodNotOver => "Grace period not over",
            LendingError::LoanNotInVoting => "Loan is not in voting",
            LendingError::VotingClosed => "Voting is closed",
            LendingError::NotAVoter => "Caller is not a lender of this loan",
            LendingError::AlreadyVoted => "Caller already voted",
            LendingError::VotingStillOpen => "Voting still open",

            // Credit
            LendingError::CreditScoreTooLow => "Credit score too low",

            // Config / engine
            LendingError::InvalidConfig => "Invalid configuration parameter",
            LendingError::Reentrancy => "Reentrant call",
            LendingError::InvariantViolation => "Accounting invariant violated",
            LendingError::MathOverflow => "Arithmetic overflow",

            // Settlement ledger
            LendingError::InsufficientBalance => "Ledger: insufficient balance",
            LendingError::InsufficientAllowance => "Ledger: insufficient allowance",
        }
    }
}

impl core::fmt::Display for LendingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<LendingError> for OdraError {
    fn from(error: LendingError) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            OdraError::user(error as u16)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            OdraError::user(error as u16, error.message())
        }
    }
}
