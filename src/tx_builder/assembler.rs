//! Transaction assembly and signing
//!
//! `assemble` packs instructions in caller order into a V0 message bound to
//! a shared blockhash and checks it against the packet size and account
//! lock limits. `sign` then signs with exactly the required signer subset.
//! Splitting oversized instruction lists is the bundle builder's job.

use solana_sdk::{
    hash::Hash,
    message::{v0::Message as MessageV0, AddressLookupTableAccount, CompileError, VersionedMessage},
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::VersionedTransaction,
};
use tracing::debug;

use super::constants::{MAX_ACCOUNT_LOCKS, MAX_TRANSACTION_SIZE};
use super::errors::BundleError;
use super::instructions::{InstructionKind, ProgramInstruction};
use crate::compat;
use crate::wallet::Wallet;

/// A compiled, not yet signed transaction
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    payer: Pubkey,
    recent_blockhash: Hash,
    instructions: Vec<ProgramInstruction>,
    message: VersionedMessage,
    size: usize,
}

impl UnsignedTransaction {
    pub fn payer(&self) -> &Pubkey {
        &self.payer
    }

    pub fn recent_blockhash(&self) -> &Hash {
        &self.recent_blockhash
    }

    pub fn instructions(&self) -> &[ProgramInstruction] {
        &self.instructions
    }

    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    /// Wire size once signed
    pub fn size(&self) -> usize {
        self.size
    }

    /// Accounts that must sign, fee payer first
    pub fn required_signers(&self) -> &[Pubkey] {
        compat::get_required_signers(&self.message)
    }
}

/// A transaction signed by every required signer
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    transaction: VersionedTransaction,
}

impl SignedTransaction {
    pub fn payer(&self) -> &Pubkey {
        self.unsigned.payer()
    }

    pub fn recent_blockhash(&self) -> &Hash {
        self.unsigned.recent_blockhash()
    }

    pub fn instructions(&self) -> &[ProgramInstruction] {
        self.unsigned.instructions()
    }

    pub fn signers(&self) -> &[Pubkey] {
        self.unsigned.required_signers()
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    /// Fee payer signature, which identifies the transaction on-chain
    pub fn signature(&self) -> Signature {
        self.transaction.signatures[0]
    }

    /// Number of tip instructions carried
    pub fn tip_count(&self) -> usize {
        self.instructions()
            .iter()
            .filter(|ix| ix.kind() == InstructionKind::Tip)
            .count()
    }

    /// Wire bytes
    pub fn serialize(&self) -> Result<Vec<u8>, BundleError> {
        bincode::serialize(&self.transaction)
            .map_err(|e| BundleError::internal(format!("failed to serialize transaction: {}", e)))
    }

    /// Base-58 encoded wire bytes, as the relay expects them
    pub fn encode_base58(&self) -> Result<String, BundleError> {
        Ok(bs58::encode(self.serialize()?).into_string())
    }
}

/// Compile `instructions` into a V0 message paid by `payer`
///
/// A tip, if present, must be the last instruction. Fails with
/// `TransactionTooLarge` when the signed size would exceed 1232 bytes or
/// the message locks more than 64 accounts.
pub fn assemble(
    payer: &Pubkey,
    instructions: Vec<ProgramInstruction>,
    recent_blockhash: Hash,
    lookup_tables: &[AddressLookupTableAccount],
) -> Result<UnsignedTransaction, BundleError> {
    if instructions.is_empty() {
        return Err(BundleError::Configuration(
            "cannot assemble a transaction without instructions".to_string(),
        ));
    }
    check_tip_order(&instructions)?;

    let raw: Vec<_> = instructions.iter().map(|ix| ix.instruction().clone()).collect();
    let compiled = MessageV0::try_compile(payer, &raw, lookup_tables, recent_blockhash)
        .map_err(|e| match e {
            CompileError::AccountIndexOverflow | CompileError::AddressTableLookupIndexOverflow => {
                BundleError::too_large(format!("failed to compile message: {}", e))
            }
            other => BundleError::internal(format!("failed to compile message: {}", other)),
        })?;
    let message = VersionedMessage::V0(compiled);

    let accounts = compat::get_total_account_count(&message);
    if accounts > MAX_ACCOUNT_LOCKS {
        return Err(BundleError::too_large(format!(
            "{} accounts exceeds the {} account limit",
            accounts, MAX_ACCOUNT_LOCKS
        )));
    }

    let size = compat::get_signed_transaction_size(&message)
        .map_err(|e| BundleError::internal(format!("failed to size transaction: {}", e)))?;
    if size > MAX_TRANSACTION_SIZE {
        return Err(BundleError::too_large(format!(
            "{} bytes exceeds the {} byte limit",
            size, MAX_TRANSACTION_SIZE
        )));
    }

    debug!(
        payer = %payer,
        instructions = instructions.len(),
        accounts,
        size,
        "Transaction assembled"
    );

    Ok(UnsignedTransaction {
        payer: *payer,
        recent_blockhash,
        instructions,
        message,
        size,
    })
}

/// Sign with the wallets matching the required signer set
///
/// Wallets that the message does not require are ignored.
pub fn sign(
    unsigned: UnsignedTransaction,
    signers: &[&Wallet],
) -> Result<SignedTransaction, BundleError> {
    let message_bytes = unsigned.message.serialize();

    let signatures = unsigned
        .required_signers()
        .iter()
        .map(|required| {
            signers
                .iter()
                .find(|wallet| wallet.pubkey() == *required)
                .map(|wallet| wallet.keypair().sign_message(&message_bytes))
                .ok_or(BundleError::MissingSigner(*required))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let transaction = VersionedTransaction {
        signatures,
        message: unsigned.message.clone(),
    };

    Ok(SignedTransaction {
        unsigned,
        transaction,
    })
}

fn check_tip_order(instructions: &[ProgramInstruction]) -> Result<(), BundleError> {
    let tips: Vec<usize> = instructions
        .iter()
        .enumerate()
        .filter(|(_, ix)| ix.kind() == InstructionKind::Tip)
        .map(|(idx, _)| idx)
        .collect();

    match tips.as_slice() {
        [] => Ok(()),
        [idx] if *idx == instructions.len() - 1 => Ok(()),
        [idx] => Err(BundleError::Configuration(format!(
            "tip must be the last instruction (found at position {} of {})",
            idx,
            instructions.len()
        ))),
        _ => Err(BundleError::Configuration(format!(
            "a transaction may carry at most one tip, found {}",
            tips.len()
        ))),
    }
}
