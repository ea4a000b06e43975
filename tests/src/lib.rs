//! P2P Lending Integration Tests
//!
//! Cross-module checks of the pure lending math and lifecycle rules.

#[cfg(test)]
mod tests {
    use p2p_lending_contracts::types::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_terminal_states_accept_no_transition() {
        let all = [
            LoanStatus::Requested,
            LoanStatus::PartiallyFunded,
            LoanStatus::Funded,
            LoanStatus::Repaid,
            LoanStatus::Voting,
            LoanStatus::Liquidating,
            LoanStatus::Defaulted,
            LoanStatus::Cancelled,
            LoanStatus::FundingFailed,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all.iter() {
                assert!(!from.can_transition_to(*to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }
}

#[cfg(test)]
mod calculator_tests {
    use odra::casper_types::U256;
    use p2p_lending_contracts::calculator::*;
    use p2p_lending_contracts::errors::LendingError;
    use p2p_lending_contracts::types::EngineConfig;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const DOLLAR: u64 = 100_000_000;

    // ===== Collateral Tests =====

    #[test]
    fn test_collateral_across_decimals() {
        // 1_000 USDC (6 decimals) at $1 against CSPR (9 decimals) at $0.02, 150%
        let required = required_collateral(
            U256::from(1_000_000_000u64),
            U256::from(DOLLAR),
            6,
            U256::from(2_000_000u64),
            9,
            15_000,
        )
        .unwrap();
        assert_eq!(required, U256::from(75_000u64) * pow10(9));
    }

    #[test]
    fn test_zero_collateral_price_rejected() {
        assert_eq!(
            required_collateral(U256::from(100u64), U256::from(DOLLAR), 0, U256::zero(), 0, 15_000),
            Err(LendingError::InvalidPrice)
        );
    }

    #[test]
    fn test_overflow_reported() {
        assert_eq!(
            usd_value(U256::MAX, 0, U256::from(2u64)),
            Err(LendingError::MathOverflow)
        );
    }

    proptest! {
        #[test]
        fn prop_required_collateral_covers_ratio(
            amount in 1u64..1_000_000_000_000,
            loan_price in 1u64..100 * DOLLAR,
            coll_price in 1u64..100 * DOLLAR,
            ratio in 10_000u32..30_000,
        ) {
            let required = required_collateral(
                U256::from(amount),
                U256::from(loan_price),
                6,
                U256::from(coll_price),
                6,
                ratio,
            ).unwrap();

            let loan_value = U256::from(amount) * U256::from(loan_price) * U256::from(ratio);
            let coll_value = required * U256::from(coll_price) * U256::from(BPS_SCALE);
            // enough collateral, and at most one smallest unit more than needed
            prop_assert!(coll_value >= loan_value);
            prop_assert!(coll_value < loan_value + U256::from(coll_price) * U256::from(BPS_SCALE));
        }

        #[test]
        fn prop_kink_rate_monotonic(a in 0u32..=10_000, b in 0u32..=10_000) {
            let model = EngineConfig::default().rate_model;
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(kink_rate_bps(&model, low) <= kink_rate_bps(&model, high));
        }

        #[test]
        fn prop_utilization_capped(borrowed in any::<u64>(), capacity in any::<u64>()) {
            let u = utilization_bps(U256::from(borrowed), U256::from(capacity));
            prop_assert!(u <= BPS_SCALE);
        }

        #[test]
        fn prop_fee_split_conserves(payment in any::<u64>(), fee_bps in 0u32..=10_000) {
            let (fee, rest) = split_fee(U256::from(payment), fee_bps).unwrap();
            prop_assert_eq!(fee + rest, U256::from(payment));
        }

        #[test]
        fn prop_total_due_grows_with_penalty(
            principal in 1u64..1_000_000_000_000,
            rate in 0u32..=10_000,
            penalty in 0u32..=10_000,
        ) {
            let plain = total_due(U256::from(principal), rate, 0).unwrap();
            let penalized = total_due(U256::from(principal), rate, penalty).unwrap();
            prop_assert!(plain >= U256::from(principal));
            prop_assert!(penalized >= plain);
        }
    }
}

#[cfg(test)]
mod distribution_tests {
    use odra::casper_types::U256;
    use p2p_lending_contracts::auction::split_proceeds;
    use p2p_lending_contracts::funding_pool::{check_contribution, pro_rata_payouts};
    use p2p_lending_contracts::errors::LendingError;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    // ===== Contribution Rules =====

    #[test]
    fn test_closing_contribution_may_be_below_minimum() {
        assert_eq!(
            check_contribution(U256::from(40u64), U256::from(40u64), U256::from(100u64)),
            Ok(())
        );
    }

    #[test]
    fn test_contribution_leaving_dust() {
        assert_eq!(
            check_contribution(U256::from(950u64), U256::from(1_000u64), U256::from(100u64)),
            Err(LendingError::LeavesDust)
        );
    }

    // ===== Pro-Rata Payouts =====

    #[test]
    fn test_payouts_sixty_forty() {
        let stakes = [U256::from(60u64), U256::from(40u64)];
        let (payouts, dust) = pro_rata_payouts(U256::from(1_000u64), &stakes, U256::from(100u64)).unwrap();
        assert_eq!(payouts, vec![U256::from(600u64), U256::from(400u64)]);
        assert_eq!(dust, U256::zero());
    }

    proptest! {
        #[test]
        fn prop_payouts_never_exceed_distributable(
            distributable in any::<u64>(),
            stakes in prop::collection::vec(1u64..1_000_000_000, 1..50),
        ) {
            let stakes: Vec<U256> = stakes.into_iter().map(U256::from).collect();
            let total = stakes.iter().fold(U256::zero(), |acc, s| acc + *s);
            let (payouts, dust) = pro_rata_payouts(U256::from(distributable), &stakes, total).unwrap();

            let paid = payouts.iter().fold(U256::zero(), |acc, p| acc + *p);
            prop_assert_eq!(paid + dust, U256::from(distributable));
            // floor rounding loses less than one unit per lender
            prop_assert!(dust < U256::from(stakes.len() as u64));
        }

        #[test]
        fn prop_auction_proceeds_conserve_bid(
            bid in any::<u64>(),
            fee_bps in 0u32..=10_000,
            owed in any::<u64>(),
        ) {
            let p = split_proceeds(U256::from(bid), fee_bps, U256::from(owed)).unwrap();
            prop_assert_eq!(p.fee + p.to_lenders + p.to_borrower, U256::from(bid));
            prop_assert!(p.to_lenders <= U256::from(owed));
        }
    }
}

#[cfg(test)]
mod governance_tests {
    use odra::casper_types::U256;
    use p2p_lending_contracts::credit::{penalize, reward, risk_tier};
    use p2p_lending_contracts::oracle_adapter::validate_quote;
    use p2p_lending_contracts::errors::LendingError;
    use p2p_lending_contracts::types::*;
    use p2p_lending_contracts::voting::{early_outcome, final_outcome};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn tally(liquidate: u64, claim: u64, votes: u32) -> DefaultVote {
        DefaultVote {
            loan_id: 1,
            deadline: 0,
            liquidate_weight: U256::from(liquidate),
            claim_weight: U256::from(claim),
            votes_cast: votes,
            eligible_voters: votes,
            early_outcome: None,
            executed: false,
        }
    }

    #[test]
    fn test_quote_at_threshold_is_fresh() {
        let quote = PriceQuote {
            asset_id: 1,
            price: U256::from(100u64),
            observed_at: 1_000,
        };
        assert_eq!(validate_quote(&quote, 4_601_000, 3_600_000), Ok(()));
        assert_eq!(
            validate_quote(&quote, 4_601_001, 3_600_000),
            Err(LendingError::StalePrice)
        );
    }

    #[test]
    fn test_fifty_thirty_twenty_liquidates() {
        let policy = EngineConfig::default().voting;
        let mut vote = tally(50 + 30, 20, 3);
        vote.early_outcome = early_outcome(&vote, &policy);
        assert_eq!(vote.early_outcome, Some(DefaultAction::Liquidate));
        assert_eq!(final_outcome(&vote, &policy), DefaultAction::Liquidate);
    }

    proptest! {
        #[test]
        fn prop_score_stays_in_bounds(events in prop::collection::vec(any::<bool>(), 0..200)) {
            let policy = EngineConfig::default().credit;
            let mut score = policy.initial_score;
            for repaid in events {
                score = if repaid { reward(score, &policy) } else { penalize(score, &policy) };
                prop_assert!(score >= policy.min_score && score <= policy.max_score);
            }
        }

        #[test]
        fn prop_risk_tier_worsens_with_lower_score(a in 300u32..=850, b in 300u32..=850) {
            let policy = EngineConfig::default().credit;
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(risk_tier(low, &policy) as u8 >= risk_tier(high, &policy) as u8);
        }
    }
}
