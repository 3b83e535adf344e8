//! Program-derived addresses used by the launch program

use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;

use super::constants::{METADATA_PROGRAM_ID, PUMP_PROGRAM_ID};

const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";
const METADATA_SEED: &[u8] = b"metadata";

/// Bonding-curve account for `mint`
pub fn bonding_curve(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[BONDING_CURVE_SEED, mint.as_ref()], &PUMP_PROGRAM_ID).0
}

/// Token account owned by the bonding curve
pub fn associated_bonding_curve(mint: &Pubkey) -> Pubkey {
    get_associated_token_address(&bonding_curve(mint), mint)
}

/// Metadata account for `mint`
pub fn metadata(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[METADATA_SEED, METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM_ID,
    )
    .0
}

/// Associated token account of `owner` for `mint`
pub fn associated_token(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address(owner, mint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdas_are_deterministic_and_off_curve() {
        let mint = Pubkey::new_unique();
        assert_eq!(bonding_curve(&mint), bonding_curve(&mint));
        assert!(!bonding_curve(&mint).is_on_curve());
        assert!(!metadata(&mint).is_on_curve());
        assert_ne!(bonding_curve(&mint), bonding_curve(&Pubkey::new_unique()));
    }

    #[test]
    fn test_associated_bonding_curve_is_curve_ata() {
        let mint = Pubkey::new_unique();
        assert_eq!(
            associated_bonding_curve(&mint),
            associated_token(&bonding_curve(&mint), &mint)
        );
    }
}
