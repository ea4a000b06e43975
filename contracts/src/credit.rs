//! Credit score ledger (engine submodule).
//!
//! Records are created lazily on a borrower's first resolved loan and are
//! never removed. Scores stay inside `[min_score, max_score]`.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::types::{CreditPolicy, CreditScore, RiskTier};

#[odra::module]
pub struct CreditLedger {
    scores: Mapping<Address, CreditScore>,
}

#[odra::module]
impl CreditLedger {
    /// Reward a fully settled loan
    pub fn record_repayment(&mut self, borrower: Address, principal: U256, repaid: U256, policy: CreditPolicy) {
        let mut record = self.load_or_new(borrower, &policy);
        record.score = reward(record.score, &policy);
        record.total_loans += 1;
        record.repaid_loans += 1;
        record.total_borrowed = record.total_borrowed.saturating_add(principal);
        record.total_repaid = record.total_repaid.saturating_add(repaid);
        record.last_updated = self.env().get_block_time();
        self.scores.set(&borrower, record);
    }

    /// Penalize a recognized default
    pub fn record_default(&mut self, borrower: Address, principal: U256, repaid: U256, policy: CreditPolicy) {
        let mut record = self.load_or_new(borrower, &policy);
        record.score = penalize(record.score, &policy);
        record.total_loans += 1;
        record.defaulted_loans += 1;
        record.total_borrowed = record.total_borrowed.saturating_add(principal);
        record.total_repaid = record.total_repaid.saturating_add(repaid);
        record.last_updated = self.env().get_block_time();
        self.scores.set(&borrower, record);
    }

    pub fn get(&self, borrower: Address) -> Option<CreditScore> {
        self.scores.get(&borrower)
    }

    fn load_or_new(&self, borrower: Address, policy: &CreditPolicy) -> CreditScore {
        self.scores.get(&borrower).unwrap_or(CreditScore {
            borrower,
            score: policy.initial_score,
            total_loans: 0,
            repaid_loans: 0,
            defaulted_loans: 0,
            total_borrowed: U256::zero(),
            total_repaid: U256::zero(),
            last_updated: 0,
        })
    }
}

/// Score after a repayment, capped at the maximum
pub fn reward(score: u32, policy: &CreditPolicy) -> u32 {
    score.saturating_add(policy.repayment_reward).min(policy.max_score)
}

/// Score after a default, floored at the minimum
pub fn penalize(score: u32, policy: &CreditPolicy) -> u32 {
    score.saturating_sub(policy.default_penalty).max(policy.min_score)
}

/// Risk band by distance from the top of the score range.
///
/// Up to 20% below the maximum is Low, up to 50% Medium, up to 70% High.
pub fn risk_tier(score: u32, policy: &CreditPolicy) -> RiskTier {
    let span = policy.max_score.saturating_sub(policy.min_score).max(1) as u64;
    let below_top = policy.max_score.saturating_sub(score).min(span as u32) as u64;
    let risk_pct = below_top * 100 / span;

    if risk_pct <= 20 {
        RiskTier::Low
    } else if risk_pct <= 50 {
        RiskTier::Medium
    } else if risk_pct <= 70 {
        RiskTier::High
    } else {
        RiskTier::VeryHigh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngineConfig;

    fn policy() -> CreditPolicy {
        EngineConfig::default().credit
    }

    #[test]
    fn test_reward_is_capped() {
        let p = policy();
        assert_eq!(reward(600, &p), 610);
        assert_eq!(reward(845, &p), 850);
        assert_eq!(reward(850, &p), 850);
    }

    #[test]
    fn test_penalty_is_floored() {
        let p = policy();
        assert_eq!(penalize(600, &p), 550);
        assert_eq!(penalize(320, &p), 300);
        assert_eq!(penalize(300, &p), 300);
    }

    #[test]
    fn test_risk_tiers() {
        let p = policy();
        assert_eq!(risk_tier(850, &p), RiskTier::Low);
        assert_eq!(risk_tier(740, &p), RiskTier::Low);
        assert_eq!(risk_tier(600, &p), RiskTier::Medium);
        assert_eq!(risk_tier(500, &p), RiskTier::High);
        assert_eq!(risk_tier(300, &p), RiskTier::VeryHigh);
    }
}
