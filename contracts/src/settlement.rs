//! Settlement
//!
//! The engine never holds assets itself. Every movement of value goes through
//! a settlement contract exposing three operations:
//! - `escrow`: pull funds from an account into the caller's custody
//! - `release`: pay out of the caller's custody
//! - `transfer_between`: move funds between two accounts on the caller's authority
//!
//! `SettlementLedger` is a self-contained implementation keeping balances per
//! (asset id, account). Accounts authorize the engine with `approve` before
//! requesting or funding loans.

use odra::prelude::*;
use odra::casper_types::{U256, RuntimeArgs, runtime_args};
use odra::{CallDef, ContractEnv};
use crate::errors::LendingError;

/// Settlement interface for cross-contract calls
#[odra::external_contract]
pub trait Settlement {
    fn escrow(&mut self, asset_id: u32, from: Address, amount: U256);
    fn release(&mut self, asset_id: u32, to: Address, amount: U256);
    fn transfer_between(&mut self, asset_id: u32, from: Address, to: Address, amount: U256);
}

/// Helper for calling the settlement contract from the engine.
///
/// Zero amounts are skipped. A revert inside the ledger reverts the caller.
pub struct SettlementCalls;

impl SettlementCalls {
    pub fn escrow(env: &ContractEnv, settlement: Address, asset_id: u32, from: Address, amount: U256) {
        if amount.is_zero() {
            return;
        }
        let args = runtime_args! {
            "asset_id" => asset_id,
            "from" => from,
            "amount" => amount
        };
        env.call_contract::<()>(settlement, CallDef::new("escrow", true, args));
    }

    pub fn release(env: &ContractEnv, settlement: Address, asset_id: u32, to: Address, amount: U256) {
        if amount.is_zero() {
            return;
        }
        let args = runtime_args! {
            "asset_id" => asset_id,
            "to" => to,
            "amount" => amount
        };
        env.call_contract::<()>(settlement, CallDef::new("release", true, args));
    }

    pub fn transfer_between(
        env: &ContractEnv,
        settlement: Address,
        asset_id: u32,
        from: Address,
        to: Address,
        amount: U256,
    ) {
        if amount.is_zero() || from == to {
            return;
        }
        let args = runtime_args! {
            "asset_id" => asset_id,
            "from" => from,
            "to" => to,
            "amount" => amount
        };
        env.call_contract::<()>(settlement, CallDef::new("transfer_between", true, args));
    }
}

/// Reference settlement ledger
#[odra::module]
pub struct SettlementLedger {
    admin: Var<Address>,
    /// Balance per (asset id, account)
    balances: Mapping<(u32, Address), U256>,
    /// Spending allowance per (asset id, owner, spender)
    allowances: Mapping<(u32, Address, Address), U256>,
    /// Total minted per asset
    supply: Mapping<u32, U256>,
}

#[odra::module]
impl SettlementLedger {
    pub fn init(&mut self, admin: Address) {
        self.admin.set(admin);
    }

    // ========== Settlement Interface ==========

    /// Move `amount` from `from` into the caller's custody.
    pub fn escrow(&mut self, asset_id: u32, from: Address, amount: U256) {
        let custodian = self.env().caller();
        self.spend_allowance(asset_id, from, custodian, amount);
        self.move_balance(asset_id, from, custodian, amount);
    }

    /// Pay `amount` out of the caller's custody.
    pub fn release(&mut self, asset_id: u32, to: Address, amount: U256) {
        let custodian = self.env().caller();
        self.move_balance(asset_id, custodian, to, amount);
    }

    /// Move `amount` between accounts; `from` must have approved the caller.
    pub fn transfer_between(&mut self, asset_id: u32, from: Address, to: Address, amount: U256) {
        let spender = self.env().caller();
        self.spend_allowance(asset_id, from, spender, amount);
        self.move_balance(asset_id, from, to, amount);
    }

    // ========== Account Functions ==========

    pub fn approve(&mut self, asset_id: u32, spender: Address, amount: U256) {
        let owner = self.env().caller();
        self.allowances.set(&(asset_id, owner, spender), amount);
    }

    /// Plain transfer from the caller
    pub fn transfer(&mut self, asset_id: u32, to: Address, amount: U256) {
        let owner = self.env().caller();
        self.move_balance(asset_id, owner, to, amount);
    }

    /// Credit an account (admin only, test and demo faucet)
    pub fn mint(&mut self, asset_id: u32, to: Address, amount: U256) {
        if self.admin.get() != Some(self.env().caller()) {
            self.env().revert(LendingError::Unauthorized);
        }
        let balance = self.balance_of(asset_id, to);
        self.balances.set(&(asset_id, to), balance + amount);
        let supply = self.supply.get(&asset_id).unwrap_or_default();
        self.supply.set(&asset_id, supply + amount);
    }

    // ========== Query Functions ==========

    pub fn balance_of(&self, asset_id: u32, account: Address) -> U256 {
        self.balances.get(&(asset_id, account)).unwrap_or_default()
    }

    pub fn allowance(&self, asset_id: u32, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(asset_id, owner, spender)).unwrap_or_default()
    }

    /// Funds held in custody by a contract such as the lending engine
    pub fn custody_of(&self, asset_id: u32, custodian: Address) -> U256 {
        self.balance_of(asset_id, custodian)
    }

    pub fn total_supply(&self, asset_id: u32) -> U256 {
        self.supply.get(&asset_id).unwrap_or_default()
    }

    fn spend_allowance(&mut self, asset_id: u32, owner: Address, spender: Address, amount: U256) {
        let allowed = self.allowance(asset_id, owner, spender);
        if allowed < amount {
            self.env().revert(LendingError::InsufficientAllowance);
        }
        self.allowances.set(&(asset_id, owner, spender), allowed - amount);
    }

    fn move_balance(&mut self, asset_id: u32, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(asset_id, from);
        if from_balance < amount {
            self.env().revert(LendingError::InsufficientBalance);
        }
        self.balances.set(&(asset_id, from), from_balance - amount);
        let to_balance = self.balance_of(asset_id, to);
        self.balances.set(&(asset_id, to), to_balance + amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odra::host::Deployer;

    fn setup() -> (odra::host::HostEnv, SettlementLedgerHostRef) {
        let env = odra_test::env();
        let admin = env.get_account(0);
        let ledger = SettlementLedger::deploy(&env, SettlementLedgerInitArgs { admin });
        (env, ledger)
    }

    #[test]
    fn test_mint_and_transfer() {
        let (env, mut ledger) = setup();
        let alice = env.get_account(1);
        let bob = env.get_account(2);

        ledger.mint(1, alice, U256::from(100u64));
        env.set_caller(alice);
        ledger.transfer(1, bob, U256::from(40u64));

        assert_eq!(ledger.balance_of(1, alice), U256::from(60u64));
        assert_eq!(ledger.balance_of(1, bob), U256::from(40u64));
        assert_eq!(ledger.balance_of(2, bob), U256::zero());
        assert_eq!(ledger.total_supply(1), U256::from(100u64));
    }

    #[test]
    fn test_mint_requires_admin() {
        let (env, mut ledger) = setup();
        let alice = env.get_account(1);
        env.set_caller(alice);
        assert_eq!(
            ledger.try_mint(1, alice, U256::from(1u64)),
            Err(LendingError::Unauthorized.into())
        );
    }

    #[test]
    fn test_escrow_needs_allowance() {
        let (env, mut ledger) = setup();
        let alice = env.get_account(1);
        let custodian = env.get_account(3);
        ledger.mint(1, alice, U256::from(100u64));

        env.set_caller(custodian);
        assert_eq!(
            ledger.try_escrow(1, alice, U256::from(10u64)),
            Err(LendingError::InsufficientAllowance.into())
        );

        env.set_caller(alice);
        ledger.approve(1, custodian, U256::from(10u64));
        env.set_caller(custodian);
        ledger.escrow(1, alice, U256::from(10u64));

        assert_eq!(ledger.custody_of(1, custodian), U256::from(10u64));
        assert_eq!(ledger.allowance(1, alice, custodian), U256::zero());

        ledger.release(1, alice, U256::from(4u64));
        assert_eq!(ledger.balance_of(1, alice), U256::from(94u64));
        assert_eq!(
            ledger.try_release(1, alice, U256::from(7u64)),
            Err(LendingError::InsufficientBalance.into())
        );
    }
}
