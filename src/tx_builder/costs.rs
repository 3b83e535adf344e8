//! Lamports a bundle costs each wallet beyond the amounts it moves
//!
//! Rent for the accounts a transaction creates, signature fees, the
//! priority fee and the launch program's buy fee. The service checks
//! balances against these before building, and caps every buy's
//! `max_sol_cost` at what its wallet can actually pay.

use super::bundle::ComputeBudget;
use super::constants::{
    account_sizes, ACCOUNT_STORAGE_OVERHEAD, AUTO_SPEND_PERCENT, BUYER_RESERVE_LAMPORTS,
    PUMP_FEE_BPS, RENT_EXEMPTION_YEARS, RENT_LAMPORTS_PER_BYTE_YEAR, SIGNATURE_FEE_LAMPORTS,
};
use super::curve::pump_fee;
use super::errors::BundleError;

/// Rent-exempt minimum of an account holding `data_len` bytes
pub const fn rent_exempt_minimum(data_len: u64) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + data_len) * RENT_LAMPORTS_PER_BYTE_YEAR * RENT_EXEMPTION_YEARS
}

/// Rent of one associated token account
pub const TOKEN_ACCOUNT_RENT_LAMPORTS: u64 = rent_exempt_minimum(account_sizes::TOKEN_ACCOUNT);

/// Rent the deployer pays for the mint, bonding curve, curve vault and metadata
pub const CREATE_TOKEN_RENT_LAMPORTS: u64 = rent_exempt_minimum(account_sizes::MINT)
    + rent_exempt_minimum(account_sizes::BONDING_CURVE)
    + rent_exempt_minimum(account_sizes::TOKEN_ACCOUNT)
    + rent_exempt_minimum(account_sizes::METADATA);

/// Rent of a lookup table holding `addresses` entries
pub fn lookup_table_rent(addresses: usize) -> u64 {
    rent_exempt_minimum(account_sizes::LOOKUP_TABLE_META + 32 * addresses as u64)
}

fn sum(parts: &[u64], what: &'static str) -> Result<u64, BundleError> {
    parts
        .iter()
        .try_fold(0u64, |acc, v| acc.checked_add(*v))
        .ok_or(BundleError::ArithmeticOverflow(what))
}

/// Everything a buy of `lamports` debits: the SOL cost plus the protocol fee
pub fn buy_outlay(lamports: u64) -> Result<u64, BundleError> {
    sum(&[lamports, pump_fee(lamports)?], "buy outlay")
}

/// Largest buy whose outlay fits in `budget`
pub fn max_buy_within(budget: u64) -> u64 {
    let estimate = u128::from(budget) * 10_000 / u128::from(10_000 + PUMP_FEE_BPS);
    let mut lamports = u64::try_from(estimate).unwrap_or(budget);
    while lamports > 0 && buy_outlay(lamports).map_or(true, |outlay| outlay > budget) {
        lamports -= 1;
    }
    lamports
}

/// What a buyer pays besides its buy: token account rent, its signature
/// and the tip when it carries it
pub fn buyer_overhead(tip_share: u64) -> Result<u64, BundleError> {
    sum(
        &[TOKEN_ACCOUNT_RENT_LAMPORTS, SIGNATURE_FEE_LAMPORTS, tip_share],
        "buyer overhead",
    )
}

/// Spend of a buyer sized from its balance
///
/// 98% of the balance above a 0.003 SOL reserve, lowered further when the
/// fee, rent and tip would not fit. `None` when nothing is left to spend.
pub fn auto_buy_lamports(balance: u64, tip_share: u64) -> Result<Option<u64>, BundleError> {
    let Some(above_reserve) = balance.checked_sub(BUYER_RESERVE_LAMPORTS) else {
        return Ok(None);
    };
    let preferred = above_reserve / 100 * AUTO_SPEND_PERCENT
        + above_reserve % 100 * AUTO_SPEND_PERCENT / 100;
    let affordable = match balance.checked_sub(buyer_overhead(tip_share)?) {
        Some(budget) => max_buy_within(budget),
        None => 0,
    };
    Ok(Some(preferred.min(affordable)).filter(|spend| *spend > 0))
}

/// Priority fee of a transaction carrying `compute`, rounded up
pub fn priority_fee(compute: &ComputeBudget) -> u64 {
    let micro = u128::from(compute.unit_limit) * u128::from(compute.unit_price);
    u64::try_from(micro.div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// What the deployer pays besides its dev buy
///
/// Launch rent, its own token account, two signatures (deployer and mint),
/// the priority fee, the optional tax and the tip when it carries it.
pub fn launch_overhead(
    compute: &ComputeBudget,
    tax_lamports: u64,
    tip_share: u64,
) -> Result<u64, BundleError> {
    sum(
        &[
            CREATE_TOKEN_RENT_LAMPORTS,
            TOKEN_ACCOUNT_RENT_LAMPORTS,
            2 * SIGNATURE_FEE_LAMPORTS,
            priority_fee(compute),
            tax_lamports,
            tip_share,
        ],
        "launch overhead",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_matches_runtime_values() {
        assert_eq!(TOKEN_ACCOUNT_RENT_LAMPORTS, 2_039_280);
        assert_eq!(rent_exempt_minimum(account_sizes::MINT), 1_461_600);
        assert_eq!(lookup_table_rent(0), 1_280_640);
    }

    #[test]
    fn test_max_buy_within_fits_fee() {
        for budget in [0, 1, 101, 1_000_000, 9_996_955_720, u64::MAX / 2] {
            let lamports = max_buy_within(budget);
            assert!(buy_outlay(lamports).unwrap() <= budget);
            assert!(buy_outlay(lamports + 1).unwrap() > budget || lamports == budget);
        }
    }

    #[test]
    fn test_auto_buy_ten_sol() {
        let balance = 10_000_000_000;
        let tip = 1_000_000;
        let spend = auto_buy_lamports(balance, tip).unwrap().unwrap();
        assert_eq!(spend, (balance - BUYER_RESERVE_LAMPORTS) * 98 / 100);
        let total = buy_outlay(spend).unwrap() + buyer_overhead(tip).unwrap();
        assert!(total <= balance);
    }

    #[test]
    fn test_auto_buy_small_balance_is_limited_by_costs() {
        // A 0.005 SOL tip leaves 2_955_720 for the buy and its fee
        assert_eq!(auto_buy_lamports(10_000_000, 5_000_000).unwrap(), Some(2_926_455));
        assert_eq!(auto_buy_lamports(10_000_000, 0).unwrap(), Some(6_860_000));
        assert_eq!(auto_buy_lamports(2_000_000, 0).unwrap(), None);
        assert_eq!(auto_buy_lamports(3_000_001, 5_000_000).unwrap(), None);
    }

    #[test]
    fn test_priority_fee() {
        assert_eq!(priority_fee(&ComputeBudget::default()), 62_500);
        assert_eq!(
            priority_fee(&ComputeBudget {
                unit_limit: 1,
                unit_price: 1
            }),
            1
        );
    }

    #[test]
    fn test_launch_overhead_counts_rent_and_fees() {
        let compute = ComputeBudget {
            unit_limit: 0,
            unit_price: 0,
        };
        assert_eq!(
            launch_overhead(&compute, 7, 11).unwrap(),
            CREATE_TOKEN_RENT_LAMPORTS + TOKEN_ACCOUNT_RENT_LAMPORTS + 10_000 + 18
        );
        assert!(launch_overhead(&compute, u64::MAX, 1).is_err());
    }
}
