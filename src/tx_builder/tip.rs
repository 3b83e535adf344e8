//! Relay tip selection and placement
//!
//! Placement rule: a bundle carries exactly one tip, appended as the last
//! instruction of the last transaction that actually participates (non-zero
//! balance, or the final buyer). The tip is funded by that transaction's fee
//! payer. When no wallet participates, create-and-buy tips from the
//! deployer's transaction and sell fails with `InsufficientBalance`.

use solana_sdk::{pubkey::Pubkey, system_instruction};

use super::constants::DEFAULT_TIP_ACCOUNTS;
use super::errors::BundleError;
use super::instructions::{parse_address, InstructionKind, ProgramInstruction};

/// Tip amount and candidate receivers, loaded once and shared read-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipConfig {
    tip_lamports: u64,
    tip_accounts: Vec<Pubkey>,
}

impl TipConfig {
    pub fn new(tip_lamports: u64, tip_accounts: Vec<Pubkey>) -> Result<Self, BundleError> {
        if tip_accounts.is_empty() {
            return Err(BundleError::Configuration(
                "at least one tip account is required".to_string(),
            ));
        }
        Ok(Self {
            tip_lamports,
            tip_accounts,
        })
    }

    /// Parse candidate tip accounts from base-58 strings
    pub fn from_addresses<S: AsRef<str>>(
        tip_lamports: u64,
        addresses: &[S],
    ) -> Result<Self, BundleError> {
        let accounts = addresses
            .iter()
            .map(|a| parse_address(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tip_lamports, accounts)
    }

    /// The well-known block-engine tip accounts
    pub fn with_default_accounts(tip_lamports: u64) -> Result<Self, BundleError> {
        Self::from_addresses(tip_lamports, &DEFAULT_TIP_ACCOUNTS)
    }

    pub fn tip_lamports(&self) -> u64 {
        self.tip_lamports
    }

    pub fn tip_accounts(&self) -> &[Pubkey] {
        &self.tip_accounts
    }

    pub fn is_tip_account(&self, address: &Pubkey) -> bool {
        self.tip_accounts.contains(address)
    }

    /// Uniform pseudo-random choice among the candidate accounts
    pub fn select_tip_account(&self) -> Pubkey {
        self.tip_accounts[fastrand::usize(..self.tip_accounts.len())]
    }

    /// Transfer of `lamports` from `payer` to a randomly selected tip account
    pub fn build_tip_instruction(&self, payer: &Pubkey, lamports: u64) -> ProgramInstruction {
        let receiver = self.select_tip_account();
        ProgramInstruction::new(
            InstructionKind::Tip,
            system_instruction::transfer(payer, &receiver, lamports),
        )
    }

    /// Tip of the configured amount
    pub fn build_configured_tip(&self, payer: &Pubkey) -> ProgramInstruction {
        self.build_tip_instruction(payer, self.tip_lamports)
    }
}

/// Index of the last participant with a non-zero amount
///
/// This is the first pass of every multi-wallet bundle build: the
/// tip-carrying transaction must be known before any transaction is built.
pub fn last_participant_index(amounts: &[u64]) -> Option<usize> {
    amounts.iter().rposition(|amount| *amount > 0)
}
