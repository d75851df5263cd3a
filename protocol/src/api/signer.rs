//! Signer: wallet lookup, replay protection and personal messages.
//!
//! Transaction signatures are bound to the chain id once the current head is
//! past the replay-protection activation height. Before that they are signed
//! in legacy mode.

use alloy_primitives::{Address, B256};
use tracing::debug;

use super::backend::Backend;
use super::error::ApiError;
use crate::crypto::hash::personal_message_hash;
use crate::crypto::keys::{RecoverableSignature, RECOVERABLE_SIGNATURE_LENGTH};
use crate::crypto::signatures::{recover_personal, to_legacy_bytes, SignatureError};
use crate::transaction::signing::with_signature;
use crate::transaction::Transaction;
use crate::vault::WalletError;

/// Chain id to bind signatures to at the current head, if any.
pub fn replay_chain_id(backend: &Backend) -> Option<u64> {
    let config = backend.chain.chain_config();
    let head = backend.chain.current_header().number;
    config.is_eip155(head).then_some(config.chain_id)
}

/// Signs `tx` with the key of `from`.
///
/// Without a passphrase the account must already be unlocked.
pub fn sign_transaction(
    backend: &Backend,
    from: Address,
    tx: Transaction,
    passphrase: Option<&str>,
) -> Result<Transaction, ApiError> {
    let chain_id = replay_chain_id(backend);
    let hash = tx.signing_hash(chain_id);
    let signature = sign_hash(backend, from, &hash, passphrase)?;
    debug!(%from, ?chain_id, nonce = tx.nonce, "transaction signed");
    Ok(with_signature(tx, &signature, chain_id))
}

/// Signs `message` with the personal-message scheme: `r || s || v`, `v` in
/// {27, 28}.
pub fn sign_message(
    backend: &Backend,
    address: Address,
    message: &[u8],
    passphrase: Option<&str>,
) -> Result<[u8; RECOVERABLE_SIGNATURE_LENGTH], ApiError> {
    let signature = sign_hash(backend, address, &personal_message_hash(message), passphrase)?;
    Ok(to_legacy_bytes(&signature))
}

/// Recovers the signer of a personal message.
pub fn recover_signer(message: &[u8], signature: &[u8]) -> Result<Address, ApiError> {
    recover_personal(message, signature).map_err(|e| match e {
        SignatureError::InvalidLength(len) => ApiError::InvalidSignatureLength(len),
        SignatureError::InvalidRecoveryId(v) => ApiError::InvalidRecoveryId(v),
        SignatureError::Key(inner) => ApiError::SigningFailed(inner.to_string()),
    })
}

fn sign_hash(
    backend: &Backend,
    address: Address,
    hash: &B256,
    passphrase: Option<&str>,
) -> Result<RecoverableSignature, ApiError> {
    let wallet = backend
        .accounts
        .find(&address)
        .ok_or(ApiError::UnknownAccount(address))?;
    let signed = match passphrase {
        Some(passphrase) => wallet.sign_hash_with_passphrase(&address, passphrase, hash),
        None => wallet.sign_hash(&address, hash),
    };
    signed.map_err(|e| match e {
        WalletError::UnknownAccount(address) => ApiError::UnknownAccount(address),
        WalletError::Locked(_) | WalletError::WrongPassphrase | WalletError::Signing(_) => {
            ApiError::SigningFailed(e.to_string())
        }
        other => ApiError::Wallet(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testkit::TestNode;
    use crate::transaction::{recover_sender, Category, TransactionBuilder};
    use alloy_primitives::U256;

    fn unsigned() -> Transaction {
        TransactionBuilder::new(Category::NORMAL)
            .to(Address::repeat_byte(0x42))
            .value(U256::from(1u64))
            .gas(21_000)
            .build()
    }

    #[test]
    fn signs_with_chain_id_when_active() {
        let node = TestNode::new();
        let signed = sign_transaction(&node.backend, node.alice, unsigned(), None).unwrap();
        assert_eq!(signed.chain_id(), Some(1337));
        assert_eq!(recover_sender(&signed).unwrap(), node.alice);
    }

    #[test]
    fn signs_legacy_before_activation() {
        let node = TestNode::with_eip155(None);
        let signed = sign_transaction(&node.backend, node.alice, unsigned(), None).unwrap();
        assert_eq!(signed.chain_id(), None);
        assert!(signed.signature.v == 27 || signed.signature.v == 28);
        assert_eq!(recover_sender(&signed).unwrap(), node.alice);
    }

    #[test]
    fn unknown_account() {
        let node = TestNode::new();
        let stranger = Address::repeat_byte(0x99);
        match sign_transaction(&node.backend, stranger, unsigned(), None) {
            Err(ApiError::UnknownAccount(addr)) => assert_eq!(addr, stranger),
            other => panic!("expected UnknownAccount, got {:?}", other),
        }
    }

    #[test]
    fn locked_account_needs_passphrase() {
        let node = TestNode::new();
        match sign_transaction(&node.backend, node.locked, unsigned(), None) {
            Err(ApiError::SigningFailed(_)) => {}
            other => panic!("expected SigningFailed, got {:?}", other),
        }
        let signed = sign_transaction(
            &node.backend,
            node.locked,
            unsigned(),
            Some(TestNode::PASSPHRASE),
        )
        .unwrap();
        assert_eq!(recover_sender(&signed).unwrap(), node.locked);

        match sign_transaction(&node.backend, node.locked, unsigned(), Some("nope")) {
            Err(ApiError::SigningFailed(msg)) => {
                assert_eq!(msg, WalletError::WrongPassphrase.to_string())
            }
            other => panic!("expected SigningFailed, got {:?}", other),
        }
        match sign_message(&node.backend, node.locked, b"m", Some("nope")) {
            Err(ApiError::SigningFailed(_)) => {}
            other => panic!("expected SigningFailed, got {:?}", other),
        }
    }

    #[test]
    fn message_sign_and_recover() {
        let node = TestNode::new();
        let signature = sign_message(&node.backend, node.alice, b"sable", None).unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);
        assert_eq!(recover_signer(b"sable", &signature).unwrap(), node.alice);
        assert_ne!(recover_signer(b"other", &signature).unwrap(), node.alice);
    }

    #[test]
    fn recovery_rejects_malformed_signatures() {
        match recover_signer(b"m", &[0u8; 64]) {
            Err(ApiError::InvalidSignatureLength(64)) => {}
            other => panic!("expected InvalidSignatureLength, got {:?}", other),
        }
        let mut sig = [1u8; 65];
        sig[64] = 1;
        match recover_signer(b"m", &sig) {
            Err(ApiError::InvalidRecoveryId(1)) => {}
            other => panic!("expected InvalidRecoveryId, got {:?}", other),
        }
    }
}
