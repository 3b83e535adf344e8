//! Uniform accessors over `VersionedMessage`
//!
//! Legacy and V0 messages expose the same information through different
//! structs. The assembler and bundle validation only ever ask a handful of
//! questions of a compiled message: who must sign, which blockhash it
//! carries, how many accounts it locks, and how big it is on the wire.
//! They all live here so both message versions answer them the same way.

use solana_sdk::{
    hash::Hash,
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};

/// Message header for either message version.
#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Account keys embedded directly in the message.
///
/// For V0 messages this excludes addresses loaded from lookup tables.
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Accounts that must sign the transaction.
///
/// Required signers are always the first `num_required_signatures` static
/// keys, fee payer first.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let account_keys = get_static_account_keys(message);
    let num_signers = header.num_required_signatures as usize;

    &account_keys[..num_signers.min(account_keys.len())]
}

/// Recent blockhash the message is bound to.
#[inline]
#[must_use]
pub fn get_recent_blockhash(message: &VersionedMessage) -> &Hash {
    message.recent_blockhash()
}

/// Total accounts the message locks, counting lookup-table loads.
#[must_use]
pub fn get_total_account_count(message: &VersionedMessage) -> usize {
    let static_keys = get_static_account_keys(message).len();
    match message {
        VersionedMessage::Legacy(_) => static_keys,
        VersionedMessage::V0(v0_msg) => {
            static_keys
                + v0_msg
                    .address_table_lookups
                    .iter()
                    .map(|lookup| lookup.writable_indexes.len() + lookup.readonly_indexes.len())
                    .sum::<usize>()
        }
    }
}

/// Wire size of the fully signed transaction carrying `message`.
///
/// Signatures are fixed-size, so placeholders give the exact final size
/// before any keypair is touched.
pub fn get_signed_transaction_size(message: &VersionedMessage) -> Result<usize, bincode::Error> {
    let required = get_message_header(message).num_required_signatures as usize;
    let placeholder = VersionedTransaction {
        signatures: vec![Signature::default(); required],
        message: message.clone(),
    };
    bincode::serialized_size(&placeholder).map(|size| size as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        message::{v0::Message as MessageV0, AddressLookupTableAccount, Message},
        signature::Keypair,
        signer::Signer,
        system_instruction,
    };

    fn transfer_v0(payer: &Keypair, lookups: &[AddressLookupTableAccount]) -> VersionedMessage {
        let recipient = lookups
            .first()
            .map(|table| table.addresses[0])
            .unwrap_or_else(Pubkey::new_unique);
        let instruction = system_instruction::transfer(&payer.pubkey(), &recipient, 1000);
        VersionedMessage::V0(
            MessageV0::try_compile(&payer.pubkey(), &[instruction], lookups, Hash::new_unique())
                .unwrap(),
        )
    }

    #[test]
    fn test_required_signers_both_versions() {
        let payer = Keypair::new();
        let recipient = Pubkey::new_unique();
        let instruction = system_instruction::transfer(&payer.pubkey(), &recipient, 1000);

        let legacy = VersionedMessage::Legacy(Message::new(&[instruction], Some(&payer.pubkey())));
        assert_eq!(get_required_signers(&legacy), &[payer.pubkey()]);

        let v0 = transfer_v0(&payer, &[]);
        assert_eq!(get_required_signers(&v0), &[payer.pubkey()]);
        assert_eq!(get_static_account_keys(&v0)[0], payer.pubkey());
    }

    #[test]
    fn test_account_count_includes_lookups() {
        let payer = Keypair::new();
        let plain = transfer_v0(&payer, &[]);
        // payer, recipient, system program
        assert_eq!(get_total_account_count(&plain), 3);

        let table = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: vec![Pubkey::new_unique()],
        };
        let with_lookup = transfer_v0(&payer, &[table]);
        assert_eq!(get_static_account_keys(&with_lookup).len(), 2);
        assert_eq!(get_total_account_count(&with_lookup), 3);
    }

    #[test]
    fn test_signed_size_matches_real_signature() {
        let payer = Keypair::new();
        let message = transfer_v0(&payer, &[]);
        let estimated = get_signed_transaction_size(&message).unwrap();

        let signed = VersionedTransaction::try_new(message, &[&payer]).unwrap();
        let actual = bincode::serialize(&signed).unwrap().len();
        assert_eq!(estimated, actual);
    }

    #[test]
    fn test_recent_blockhash() {
        let payer = Keypair::new();
        let blockhash = Hash::new_unique();
        let instruction = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
        let message = VersionedMessage::V0(
            MessageV0::try_compile(&payer.pubkey(), &[instruction], &[], blockhash).unwrap(),
        );
        assert_eq!(get_recent_blockhash(&message), &blockhash);
    }
}
