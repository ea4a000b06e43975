//! Default voting (engine submodule).
//!
//! Lenders of an overdue loan vote, weighted by contributed principal, between
//! liquidating the collateral and splitting it among themselves.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::calculator::BPS_SCALE;
use crate::errors::LendingError;
use crate::types::{DefaultAction, DefaultVote, VotingPolicy};

#[odra::module]
pub struct DefaultVoting {
    tallies: Mapping<u64, DefaultVote>,
    /// Has-voted flag per (loan id, voter)
    voted: Mapping<(u64, Address), bool>,
}

#[odra::module]
impl DefaultVoting {
    /// Start a vote and return its deadline
    pub fn open(&mut self, loan_id: u64, eligible_voters: u32, voting_period: u64) -> u64 {
        let deadline = self.env().get_block_time() + voting_period;
        self.tallies.set(
            &loan_id,
            DefaultVote {
                loan_id,
                deadline,
                liquidate_weight: U256::zero(),
                claim_weight: U256::zero(),
                votes_cast: 0,
                eligible_voters,
                early_outcome: None,
                executed: false,
            },
        );
        deadline
    }

    /// Record a weighted vote. A zero weight means the caller never funded the loan.
    pub fn cast(
        &mut self,
        loan_id: u64,
        voter: Address,
        action: DefaultAction,
        weight: U256,
        policy: VotingPolicy,
    ) -> DefaultVote {
        let mut tally = self.get_or_revert(loan_id);
        if self.env().get_block_time() > tally.deadline {
            self.env().revert(LendingError::VotingClosed);
        }
        if weight.is_zero() {
            self.env().revert(LendingError::NotAVoter);
        }
        if self.has_voted(loan_id, voter) {
            self.env().revert(LendingError::AlreadyVoted);
        }
        if tally.early_outcome.is_some() || tally.executed {
            self.env().revert(LendingError::VotingClosed);
        }

        match action {
            DefaultAction::Liquidate => tally.liquidate_weight += weight,
            DefaultAction::ClaimCollateral => tally.claim_weight += weight,
        }
        tally.votes_cast += 1;
        tally.early_outcome = early_outcome(&tally, &policy);

        self.voted.set(&(loan_id, voter), true);
        self.tallies.set(&loan_id, tally.clone());
        tally
    }

    /// Mark the vote executed and return the final tally.
    ///
    /// Reverts with `VotingStillOpen` unless an early decision exists, every
    /// eligible lender voted, or the deadline passed.
    pub fn conclude(&mut self, loan_id: u64) -> DefaultVote {
        let mut tally = self.get_or_revert(loan_id);
        if tally.executed {
            self.env().revert(LendingError::LoanNotInVoting);
        }
        if !can_execute(&tally, self.env().get_block_time()) {
            self.env().revert(LendingError::VotingStillOpen);
        }
        tally.executed = true;
        self.tallies.set(&loan_id, tally.clone());
        tally
    }

    pub fn get(&self, loan_id: u64) -> Option<DefaultVote> {
        self.tallies.get(&loan_id)
    }

    pub fn has_voted(&self, loan_id: u64, voter: Address) -> bool {
        self.voted.get(&(loan_id, voter)).unwrap_or(false)
    }

    fn get_or_revert(&self, loan_id: u64) -> DefaultVote {
        match self.tallies.get(&loan_id) {
            Some(tally) => tally,
            None => self.env().revert(LendingError::LoanNotInVoting),
        }
    }
}

/// Decision reached before the deadline, if the thresholds are met
pub fn early_outcome(tally: &DefaultVote, policy: &VotingPolicy) -> Option<DefaultAction> {
    if tally.votes_cast < policy.min_votes_for_early {
        return None;
    }
    let total = tally.total_weight();
    if total.is_zero() {
        return None;
    }
    let liquidate_share = tally.liquidate_weight * U256::from(BPS_SCALE) / total;
    if liquidate_share > U256::from(policy.early_accept_bps) {
        Some(DefaultAction::Liquidate)
    } else if liquidate_share < U256::from(policy.early_reject_bps) {
        Some(DefaultAction::ClaimCollateral)
    } else {
        None
    }
}

pub fn can_execute(tally: &DefaultVote, now: u64) -> bool {
    tally.early_outcome.is_some() || tally.everyone_voted() || now > tally.deadline
}

/// Winning action: an early decision stands, otherwise strictly greater weight wins
pub fn final_outcome(tally: &DefaultVote, policy: &VotingPolicy) -> DefaultAction {
    if let Some(action) = tally.early_outcome {
        return action;
    }
    if tally.liquidate_weight > tally.claim_weight {
        DefaultAction::Liquidate
    } else if tally.claim_weight > tally.liquidate_weight {
        DefaultAction::ClaimCollateral
    } else if policy.ties_favor_liquidation {
        DefaultAction::Liquidate
    } else {
        DefaultAction::ClaimCollateral
    }
}
