//! Collateral and interest rate math.
//!
//! All USD values use a canonical 8-decimal fixed-point scale regardless of
//! the native precision of the assets involved. Prices are USD per whole token
//! at the same scale. Rounding always favours the protocol:
//! - collateral requirements and reserve amounts round up
//! - payouts to lenders round down

use odra::casper_types::U256;
use crate::errors::LendingError;
use crate::types::RateModel;

/// Basis points scale (100% = 10000 bps)
pub const BPS_SCALE: u32 = 10_000;

/// Decimal places of every USD value
pub const USD_DECIMALS: u8 = 8;

/// Percent scale used by health checks
pub const PERCENT_SCALE: u32 = 100;

/// Highest supported decimals for an asset
pub const MAX_DECIMALS: u8 = 30;

type MathResult = Result<U256, LendingError>;

/// 10^decimals
pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

fn ceil_div(numerator: U256, denominator: U256) -> MathResult {
    if denominator.is_zero() {
        return Err(LendingError::MathOverflow);
    }
    let quotient = numerator / denominator;
    if (numerator % denominator).is_zero() {
        Ok(quotient)
    } else {
        quotient
            .checked_add(U256::one())
            .ok_or(LendingError::MathOverflow)
    }
}

/// USD value (8 decimals) of `amount` smallest units of an asset.
pub fn usd_value(amount: U256, decimals: u8, price: U256) -> MathResult {
    amount
        .checked_mul(price)
        .map(|v| v / pow10(decimals))
        .ok_or(LendingError::MathOverflow)
}

/// Collateral needed to back `amount` of the loan asset at `ratio_bps`.
///
/// `ceil(amount * loan_price * ratio * 10^coll_dec / (10^loan_dec * 10000 * coll_price))`.
/// The single division keeps precision for low-decimal collateral.
pub fn required_collateral(
    amount: U256,
    loan_price: U256,
    loan_decimals: u8,
    collateral_price: U256,
    collateral_decimals: u8,
    ratio_bps: u32,
) -> MathResult {
    if collateral_price.is_zero() {
        return Err(LendingError::InvalidPrice);
    }

    let numerator = amount
        .checked_mul(loan_price)
        .and_then(|v| v.checked_mul(U256::from(ratio_bps)))
        .and_then(|v| v.checked_mul(pow10(collateral_decimals)))
        .ok_or(LendingError::MathOverflow)?;
    let denominator = pow10(loan_decimals)
        .checked_mul(U256::from(BPS_SCALE))
        .and_then(|v| v.checked_mul(collateral_price))
        .ok_or(LendingError::MathOverflow)?;

    ceil_div(numerator, denominator)
}

/// Smallest amount of an asset worth at least `usd` (rounded up).
pub fn amount_for_usd(usd: U256, decimals: u8, price: U256) -> MathResult {
    if price.is_zero() {
        return Err(LendingError::InvalidPrice);
    }
    let numerator = usd
        .checked_mul(pow10(decimals))
        .ok_or(LendingError::MathOverflow)?;
    ceil_div(numerator, price)
}

/// Borrowed share of capacity in bps, capped at 100%.
///
/// Zero capacity counts as fully utilized.
pub fn utilization_bps(borrowed: U256, capacity: U256) -> u32 {
    if capacity.is_zero() {
        return BPS_SCALE;
    }
    match borrowed.checked_mul(U256::from(BPS_SCALE)) {
        Some(scaled) => {
            let utilization = scaled / capacity;
            if utilization >= U256::from(BPS_SCALE) {
                BPS_SCALE
            } else {
                utilization.as_u32()
            }
        }
        None => BPS_SCALE,
    }
}

/// Piecewise-linear rate curve with a steeper slope above the optimal utilization.
pub fn kink_rate_bps(model: &RateModel, utilization_bps: u32) -> u32 {
    let u = utilization_bps.min(BPS_SCALE) as u64;
    let optimal = (model.optimal_utilization_bps as u64).clamp(1, BPS_SCALE as u64 - 1);
    let base = model.base_rate_bps as u64;
    let slope1 = model.slope1_bps as u64;
    let slope2 = model.slope2_bps as u64;

    let rate = if u <= optimal {
        base + slope1 * u / optimal
    } else {
        base + slope1 + slope2 * (u - optimal) / (BPS_SCALE as u64 - optimal)
    };

    rate.min(u32::MAX as u64) as u32
}

/// `amount * bps / 10000`, rounded down.
pub fn bps_of(amount: U256, bps: u32) -> MathResult {
    amount
        .checked_mul(U256::from(bps))
        .map(|v| v / U256::from(BPS_SCALE))
        .ok_or(LendingError::MathOverflow)
}

/// Interest over the whole loan term at a flat rate.
pub fn flat_interest(principal: U256, rate_bps: u32) -> MathResult {
    bps_of(principal, rate_bps)
}

/// Principal plus flat interest plus an optional early-settlement penalty.
pub fn total_due(principal: U256, rate_bps: u32, penalty_bps: u32) -> MathResult {
    let interest = flat_interest(principal, rate_bps)?;
    let penalty = bps_of(principal, penalty_bps)?;
    principal
        .checked_add(interest)
        .and_then(|v| v.checked_add(penalty))
        .ok_or(LendingError::MathOverflow)
}

/// Split a payment into (protocol fee, amount distributable to lenders).
pub fn split_fee(payment: U256, fee_bps: u32) -> Result<(U256, U256), LendingError> {
    let fee = bps_of(payment, fee_bps)?;
    Ok((fee, payment - fee))
}

/// `floor(distributable * part / total)`.
///
/// Summed over parts that add up to `total`, the shares never exceed
/// `distributable`.
pub fn pro_rata_share(distributable: U256, part: U256, total: U256) -> MathResult {
    if total.is_zero() {
        return Ok(U256::zero());
    }
    distributable
        .checked_mul(part)
        .map(|v| v / total)
        .ok_or(LendingError::MathOverflow)
}

/// Collateral value over debt value in percent, None for zero debt.
pub fn health_pct(collateral_usd: U256, debt_usd: U256) -> Option<U256> {
    if debt_usd.is_zero() {
        return None;
    }
    Some(collateral_usd.saturating_mul(U256::from(PERCENT_SCALE)) / debt_usd)
}

/// `collateral_usd * 100 / debt_usd < threshold_pct`. Zero debt is never underwater.
pub fn is_underwater(collateral_usd: U256, debt_usd: U256, threshold_pct: u32) -> bool {
    match health_pct(collateral_usd, debt_usd) {
        Some(pct) => pct < U256::from(threshold_pct),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RateModel {
        RateModel {
            base_rate_bps: 200,
            optimal_utilization_bps: 8000,
            slope1_bps: 400,
            slope2_bps: 6000,
        }
    }

    fn usd(v: u64) -> U256 {
        U256::from(v) * pow10(USD_DECIMALS)
    }

    #[test]
    fn test_usd_value_normalizes_decimals() {
        // 2.5 tokens with 9 decimals at $4
        let value = usd_value(U256::from(2_500_000_000u64), 9, usd(4)).unwrap();
        assert_eq!(value, usd(10));

        // 3 tokens with 0 decimals at $4
        let value = usd_value(U256::from(3u64), 0, usd(4)).unwrap();
        assert_eq!(value, usd(12));
    }

    #[test]
    fn test_required_collateral_one_to_one() {
        let required = required_collateral(
            U256::from(100u64),
            usd(1),
            0,
            usd(1),
            0,
            15_000,
        )
        .unwrap();
        assert_eq!(required, U256::from(150u64));
    }

    #[test]
    fn test_required_collateral_rounds_up() {
        // 1 unit at 150% needs 1.5 collateral units -> 2
        let required = required_collateral(U256::one(), usd(1), 0, usd(1), 0, 15_000).unwrap();
        assert_eq!(required, U256::from(2u64));
    }

    #[test]
    fn test_required_collateral_across_decimals() {
        // 1000 USDC (6 dec, $1) against CSPR (9 dec, $0.02) at 150%
        let amount = U256::from(1_000_000_000u64);
        let cspr_price = U256::from(2_000_000u64);
        let required = required_collateral(amount, usd(1), 6, cspr_price, 9, 15_000).unwrap();
        // 1500 USD / 0.02 = 75_000 CSPR
        assert_eq!(required, U256::from(75_000u64) * pow10(9));
    }

    #[test]
    fn test_required_collateral_zero_price() {
        assert_eq!(
            required_collateral(U256::one(), usd(1), 0, U256::zero(), 0, 15_000),
            Err(LendingError::InvalidPrice)
        );
    }

    #[test]
    fn test_amount_for_usd_rounds_up() {
        // $10 at $3 per whole token with 0 decimals -> 4 tokens
        assert_eq!(amount_for_usd(usd(10), 0, usd(3)).unwrap(), U256::from(4u64));
        assert_eq!(amount_for_usd(usd(9), 0, usd(3)).unwrap(), U256::from(3u64));
    }

    #[test]
    fn test_utilization() {
        assert_eq!(utilization_bps(U256::zero(), U256::from(100u64)), 0);
        assert_eq!(utilization_bps(U256::from(50u64), U256::from(100u64)), 5000);
        assert_eq!(utilization_bps(U256::from(150u64), U256::from(100u64)), BPS_SCALE);
        assert_eq!(utilization_bps(U256::from(1u64), U256::zero()), BPS_SCALE);
    }

    #[test]
    fn test_kink_rate() {
        let m = model();
        assert_eq!(kink_rate_bps(&m, 0), 200);
        assert_eq!(kink_rate_bps(&m, 4000), 400);
        assert_eq!(kink_rate_bps(&m, 8000), 600);
        assert_eq!(kink_rate_bps(&m, 9000), 3600);
        assert_eq!(kink_rate_bps(&m, 10_000), 6600);
    }

    #[test]
    fn test_kink_rate_is_monotonic() {
        let m = model();
        let mut last = 0;
        for u in (0..=10_000).step_by(250) {
            let rate = kink_rate_bps(&m, u);
            assert!(rate >= last);
            last = rate;
        }
    }

    #[test]
    fn test_total_due() {
        let principal = U256::from(1000u64);
        assert_eq!(total_due(principal, 500, 0).unwrap(), U256::from(1050u64));
        assert_eq!(total_due(principal, 500, 100).unwrap(), U256::from(1060u64));
    }

    #[test]
    fn test_split_fee() {
        let (fee, rest) = split_fee(U256::from(1050u64), 100).unwrap();
        assert_eq!(fee, U256::from(10u64));
        assert_eq!(rest, U256::from(1040u64));
    }

    #[test]
    fn test_pro_rata_never_exceeds_pool() {
        let parts = [U256::from(1u64), U256::from(1u64), U256::from(1u64)];
        let total = U256::from(3u64);
        let pool = U256::from(100u64);
        let paid: U256 = parts
            .iter()
            .map(|p| pro_rata_share(pool, *p, total).unwrap())
            .fold(U256::zero(), |a, b| a + b);
        assert_eq!(paid, U256::from(99u64));
    }

    #[test]
    fn test_underwater() {
        // 120% health against 130% threshold
        assert!(is_underwater(usd(120), usd(100), 130));
        assert!(!is_underwater(usd(130), usd(100), 130));
        assert!(!is_underwater(usd(1), U256::zero(), 130));
        assert_eq!(health_pct(usd(150), usd(100)), Some(U256::from(150u64)));
    }
}
