//! Funding pool (engine submodule).
//!
//! Tracks who funded each loan and by how much. Each lender has a single
//! entry per loan; repeat contributions add to it. Payouts are split pro rata
//! by contributed principal, rounding down, so the total paid out never exceeds
//! the amount being distributed.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::calculator::pro_rata_share;
use crate::errors::LendingError;
use crate::types::LenderContribution;

#[odra::module]
pub struct FundingPool {
    /// Contribution per (loan id, lender)
    contributions: Mapping<(u64, Address), LenderContribution>,
    /// Lender by (loan id, index), in order of first contribution
    lenders: Mapping<(u64, u32), Address>,
    /// Distinct lenders per loan
    lender_count: Mapping<u64, u32>,
}

#[odra::module]
impl FundingPool {
    /// Add `amount` to the lender's stake; a new lender beyond `max_lenders` reverts.
    pub fn add_contribution(&mut self, loan_id: u64, lender: Address, amount: U256, max_lenders: u32) {
        let key = (loan_id, lender);
        let contribution = match self.contributions.get(&key) {
            Some(mut existing) => {
                existing.amount += amount;
                existing
            }
            None => {
                let count = self.lender_count(loan_id);
                if count >= max_lenders {
                    self.env().revert(LendingError::TooManyLenders);
                }
                self.lenders.set(&(loan_id, count), lender);
                self.lender_count.set(&loan_id, count + 1);
                LenderContribution {
                    loan_id,
                    lender,
                    amount,
                    amount_received: U256::zero(),
                    repaid: false,
                    refunded: false,
                }
            }
        };
        self.contributions.set(&key, contribution);
    }

    /// Book a payout to a lender
    pub fn record_received(&mut self, loan_id: u64, lender: Address, amount: U256) {
        if let Some(mut contribution) = self.contributions.get(&(loan_id, lender)) {
            contribution.amount_received += amount;
            self.contributions.set(&(loan_id, lender), contribution);
        }
    }

    pub fn mark_all_repaid(&mut self, loan_id: u64) {
        for mut contribution in self.contributions_of(loan_id) {
            contribution.repaid = true;
            self.contributions.set(&(loan_id, contribution.lender), contribution);
        }
    }

    pub fn mark_all_refunded(&mut self, loan_id: u64) {
        for mut contribution in self.contributions_of(loan_id) {
            contribution.refunded = true;
            self.contributions.set(&(loan_id, contribution.lender), contribution);
        }
    }

    // ========== Query Functions ==========

    pub fn get(&self, loan_id: u64, lender: Address) -> Option<LenderContribution> {
        self.contributions.get(&(loan_id, lender))
    }

    pub fn lender_count(&self, loan_id: u64) -> u32 {
        self.lender_count.get(&loan_id).unwrap_or(0)
    }

    pub fn lender_at(&self, loan_id: u64, index: u32) -> Option<Address> {
        self.lenders.get(&(loan_id, index))
    }

    /// All contributions of a loan, in lender order
    pub fn contributions_of(&self, loan_id: u64) -> Vec<LenderContribution> {
        (0..self.lender_count(loan_id))
            .filter_map(|index| self.lender_at(loan_id, index))
            .filter_map(|lender| self.get(loan_id, lender))
            .collect()
    }

    pub fn total_contributed(&self, loan_id: u64) -> U256 {
        self.contributions_of(loan_id)
            .iter()
            .fold(U256::zero(), |acc, c| acc + c.amount)
    }
}

/// Admission rules for a contribution against what is left to fund.
pub fn check_contribution(amount: U256, remaining: U256, min_contribution: U256) -> Result<(), LendingError> {
    if amount.is_zero() {
        return Err(LendingError::InvalidAmount);
    }
    if amount < min_contribution && amount != remaining {
        return Err(LendingError::BelowMinContribution);
    }
    if amount > remaining {
        return Err(LendingError::ExceedsRemaining);
    }
    let rest = remaining - amount;
    if !rest.is_zero() && rest < min_contribution {
        return Err(LendingError::LeavesDust);
    }
    Ok(())
}

/// Floor pro-rata split of `distributable` over `stakes` summing to `total`.
///
/// Returns the per-stake payouts and the undistributed remainder.
pub fn pro_rata_payouts(distributable: U256, stakes: &[U256], total: U256) -> Result<(Vec<U256>, U256), LendingError> {
    let mut payouts = Vec::with_capacity(stakes.len());
    let mut paid = U256::zero();
    for stake in stakes {
        let share = pro_rata_share(distributable, *stake, total)?;
        paid = paid.checked_add(share).ok_or(LendingError::MathOverflow)?;
        payouts.push(share);
    }
    if paid > distributable {
        return Err(LendingError::InvariantViolation);
    }
    Ok((payouts, distributable - paid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_contribution_closing_gap_below_min_is_allowed() {
        assert_eq!(check_contribution(u(3), u(3), u(10)), Ok(()));
    }

    #[test]
    fn test_contribution_below_min() {
        assert_eq!(
            check_contribution(u(5), u(100), u(10)),
            Err(LendingError::BelowMinContribution)
        );
    }

    #[test]
    fn test_contribution_exceeding_remaining() {
        assert_eq!(
            check_contribution(u(50), u(40), u(10)),
            Err(LendingError::ExceedsRemaining)
        );
    }

    #[test]
    fn test_contribution_leaving_dust() {
        assert_eq!(
            check_contribution(u(95), u(100), u(10)),
            Err(LendingError::LeavesDust)
        );
        assert_eq!(check_contribution(u(90), u(100), u(10)), Ok(()));
    }

    #[test]
    fn test_zero_contribution() {
        assert_eq!(check_contribution(u(0), u(100), u(10)), Err(LendingError::InvalidAmount));
    }

    #[test]
    fn test_payouts_follow_stakes() {
        let (payouts, dust) = pro_rata_payouts(u(1040), &[u(60), u(40)], u(100)).unwrap();
        assert_eq!(payouts, vec![u(624), u(416)]);
        assert_eq!(dust, u(0));
    }

    #[test]
    fn test_payout_rounding_goes_to_remainder() {
        let (payouts, dust) = pro_rata_payouts(u(10), &[u(1), u(1), u(1)], u(3)).unwrap();
        assert_eq!(payouts, vec![u(3), u(3), u(3)]);
        assert_eq!(dust, u(1));
    }
}
