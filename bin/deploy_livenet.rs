//! Deploy the lending contracts to Casper livenet/testnet using Odra livenet environment.
//!
//! Usage:
//!   cargo run --bin deploy_livenet --release
//!
//! Requires .env file with:
//!   ODRA_CASPER_LIVENET_SECRET_KEY_PATH=/path/to/secret_key.pem
//!   ODRA_CASPER_LIVENET_NODE_ADDRESS=https://node.testnet.casper.network
//!   ODRA_CASPER_LIVENET_CHAIN_NAME=casper-test
//!   ODRA_CASPER_LIVENET_PAYMENT_AMOUNT=200000000000
//!
//! Optional:
//!   P2P_DEPLOYMENT_FILE=deployments.json

use odra::casper_types::U256;
use odra::host::{Deployer, HostRef};
use odra::prelude::*;

use p2p_lending_contracts::engine::{LendingEngine, LendingEngineInitArgs};
use p2p_lending_contracts::price_feed::{ManualPriceFeed, ManualPriceFeedInitArgs};
use p2p_lending_contracts::settlement::{SettlementLedger, SettlementLedgerInitArgs};
use p2p_lending_contracts::types::EngineConfig;

fn main() {
    // Load environment from .env file
    dotenv::dotenv().ok();

    println!("=== P2P Lending Livenet Deployment ===");
    println!();

    let env = odra_casper_livenet_env::env();

    // Payment amount for deployments/calls (required for Casper 2.0 txs)
    let payment_amount: u64 = std::env::var("ODRA_CASPER_LIVENET_PAYMENT_AMOUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(200_000_000_000);
    env.set_gas(payment_amount);

    let deployer = env.caller();
    println!("Deployer: {:?}", deployer);
    println!();

    // ==================== Phase 1: Settlement and Prices ====================
    println!("=== Phase 1: Deploying Settlement and Price Feed ===");

    println!("Deploying SettlementLedger...");
    let settlement = SettlementLedger::deploy(&env, SettlementLedgerInitArgs { admin: deployer });
    let settlement_addr = settlement.address().clone();
    println!("SettlementLedger deployed at: {:?}", settlement_addr);

    println!("Deploying ManualPriceFeed...");
    let mut price_feed = ManualPriceFeed::deploy(&env, ManualPriceFeedInitArgs { admin: deployer });
    let price_feed_addr = price_feed.address().clone();
    println!("ManualPriceFeed deployed at: {:?}", price_feed_addr);
    println!();

    // ==================== Phase 2: Engine ====================
    println!("=== Phase 2: Deploying LendingEngine ===");

    let mut engine = LendingEngine::deploy(
        &env,
        LendingEngineInitArgs {
            admin: deployer,
            price_feed: price_feed_addr,
            settlement: settlement_addr,
            fee_recipient: deployer,
            config: EngineConfig::default(),
        },
    );
    let engine_addr = engine.address().clone();
    println!("LendingEngine deployed at: {:?}", engine_addr);
    println!();

    // ==================== Phase 3: Assets ====================
    println!("=== Phase 3: Registering Assets ===");

    let cspr = U256::from(10u64).pow(U256::from(9u64));
    let usd = U256::from(10u64).pow(U256::from(6u64));

    // Native CSPR, 9 decimals
    let cspr_id = engine.register_asset(
        None,
        9,
        cspr * U256::from(100u64),
        cspr * U256::from(10_000_000u64),
        cspr * U256::from(10u64),
        15_000, // 150%
        120,
        cspr * U256::from(100_000_000u64),
    );
    println!("CSPR registered as asset {}", cspr_id);

    // Settlement-held dollar token, 6 decimals
    let usd_id = engine.register_asset(
        Some(settlement_addr),
        6,
        usd * U256::from(10u64),
        usd * U256::from(1_000_000u64),
        usd,
        12_500, // 125%
        110,
        usd * U256::from(10_000_000u64),
    );
    println!("USD registered as asset {}", usd_id);

    // Bootstrap prices; live deployments hand the feeder role to a price bot
    price_feed.set_price(cspr_id, U256::from(2_000_000u64)); // $0.02
    price_feed.set_price(usd_id, U256::from(100_000_000u64)); // $1.00
    println!("Initial prices published.");
    println!();

    println!("=== Deployment Complete ===");
    println!();
    println!("Contract Addresses:");
    println!("  SettlementLedger:   {:?}", settlement_addr);
    println!("  ManualPriceFeed:    {:?}", price_feed_addr);
    println!("  LendingEngine:      {:?}", engine_addr);

    let deployment = serde_json::json!({
        "deployer": format!("{:?}", deployer),
        "settlement": format!("{:?}", settlement_addr),
        "price_feed": format!("{:?}", price_feed_addr),
        "engine": format!("{:?}", engine_addr),
        "assets": { "cspr": cspr_id, "usd": usd_id },
    });
    let path = std::env::var("P2P_DEPLOYMENT_FILE").unwrap_or_else(|_| "deployments.json".into());
    match serde_json::to_string_pretty(&deployment) {
        Ok(body) => match std::fs::write(&path, body) {
            Ok(()) => println!("Deployment written to {}", path),
            Err(e) => eprintln!("Could not write {}: {}", path, e),
        },
        Err(e) => eprintln!("Could not encode deployment: {}", e),
    }
}
