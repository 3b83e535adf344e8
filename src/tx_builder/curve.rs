//! Constant-product quote for the launch program's bonding curve
//!
//! Only what is needed to size buy instructions: how many tokens a given
//! lamport amount buys, and how reserves move for the next buyer in the
//! same bundle. All math is checked.

use super::constants::PUMP_FEE_BPS;
use super::errors::BundleError;

/// Initial virtual token reserves of a fresh curve
pub const INITIAL_VIRTUAL_TOKEN_RESERVES: u64 = 1_073_000_000_000_000;
/// Initial virtual SOL reserves of a fresh curve (lamports)
pub const INITIAL_VIRTUAL_SOL_RESERVES: u64 = 30_000_000_000;
/// Initial real token reserves of a fresh curve
pub const INITIAL_REAL_TOKEN_RESERVES: u64 = 793_100_000_000_000;

/// Reserve snapshot of a bonding curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondingCurveState {
    pub virtual_sol_reserves: u64,
    pub virtual_token_reserves: u64,
    pub real_token_reserves: u64,
}

impl Default for BondingCurveState {
    fn default() -> Self {
        Self::initial()
    }
}

impl BondingCurveState {
    /// Reserves of a curve created in this bundle
    pub const fn initial() -> Self {
        Self {
            virtual_sol_reserves: INITIAL_VIRTUAL_SOL_RESERVES,
            virtual_token_reserves: INITIAL_VIRTUAL_TOKEN_RESERVES,
            real_token_reserves: INITIAL_REAL_TOKEN_RESERVES,
        }
    }

    /// Tokens bought with `lamports`, and the reserves after the buy
    ///
    /// A zero amount buys nothing and leaves reserves untouched.
    pub fn quote_buy(&self, lamports: u64) -> Result<(u64, Self), BundleError> {
        if lamports == 0 {
            return Ok((0, *self));
        }

        let overflow = || BundleError::ArithmeticOverflow("bonding curve quote");

        let product = u128::from(self.virtual_sol_reserves)
            .checked_mul(u128::from(self.virtual_token_reserves))
            .ok_or_else(overflow)?;
        let new_sol_reserves = self
            .virtual_sol_reserves
            .checked_add(lamports)
            .ok_or_else(overflow)?;
        let new_token_reserves = product
            .checked_div(u128::from(new_sol_reserves))
            .and_then(|v| v.checked_add(1))
            .ok_or_else(overflow)?;

        let tokens = u128::from(self.virtual_token_reserves)
            .saturating_sub(new_token_reserves)
            .min(u128::from(self.real_token_reserves));
        let tokens = u64::try_from(tokens).map_err(|_| overflow())?;

        let next = Self {
            virtual_sol_reserves: new_sol_reserves,
            virtual_token_reserves: self
                .virtual_token_reserves
                .checked_sub(tokens)
                .ok_or_else(overflow)?,
            real_token_reserves: self
                .real_token_reserves
                .checked_sub(tokens)
                .ok_or_else(overflow)?,
        };

        Ok((tokens, next))
    }
}

/// Maximum SOL cost accepted for a buy of `lamports` with `slippage_bps`
pub fn max_sol_cost(lamports: u64, slippage_bps: u16) -> Result<u64, BundleError> {
    let extra = u128::from(lamports)
        .checked_mul(u128::from(slippage_bps))
        .map(|v| v / 10_000)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or(BundleError::ArithmeticOverflow("max_sol_cost"))?;
    lamports
        .checked_add(extra)
        .ok_or(BundleError::ArithmeticOverflow("max_sol_cost"))
}

/// Protocol fee charged on top of a buy's SOL cost, rounded up
pub fn pump_fee(lamports: u64) -> Result<u64, BundleError> {
    let fee = (u128::from(lamports) * u128::from(PUMP_FEE_BPS)).div_ceil(10_000);
    u64::try_from(fee).map_err(|_| BundleError::ArithmeticOverflow("pump fee"))
}
