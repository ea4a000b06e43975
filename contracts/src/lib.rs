//! P2P Lending Contracts
//!
//! Collateralized peer-to-peer lending on Casper.
//!
//! ## Architecture
//!
//! - **LendingEngine**: Single state-owning contract; loan lifecycle and orchestration
//! - **AssetRegistry**: Supported assets, bounds and risk parameters
//! - **PriceOracle**: Validated reads from an external price feed
//! - **FundingPool**: Per-loan lender contributions and pro-rata payouts
//! - **AuctionHouse**: Liquidation auctions over defaulted collateral
//! - **DefaultVoting**: Lender vote between liquidation and collateral claim
//! - **CreditLedger**: Borrower reputation
//! - **SettlementLedger**: Reference settlement contract holding all assets
//! - **ManualPriceFeed**: Reference feeder-updated price source
//!
//! ## Pause
//!
//! While paused the engine refuses new requests and contributions. Repayment,
//! default handling, auctions and votes stay available.

#![cfg_attr(target_arch = "wasm32", no_std)]

#[cfg(target_arch = "wasm32")]
extern crate alloc;

// Re-export odra for downstream usage
pub use odra;

// Core module declarations
pub mod types;
pub mod errors;
pub mod events;
pub mod calculator;

// Engine submodules
pub mod asset_registry;
pub mod oracle_adapter;
pub mod credit;
pub mod funding_pool;
pub mod auction;
pub mod voting;

// Contract modules
pub mod engine;
pub mod settlement;
pub mod price_feed;
