//! Transaction signing and sender recovery.
//!
//! Signing is a separate step from building because the key usually lives in
//! a wallet the builder knows nothing about. The wallet only ever sees a
//! 32-byte signing hash; this module turns the resulting recoverable
//! signature into the `(v, r, s)` triple, folding in the chain id when replay
//! protection applies.

use alloy_primitives::{Address, B256};

use super::builder::{Transaction, TxSignature};
use super::verification::TransactionError;
use crate::crypto::keys::{Keypair, KeyError, RecoverableSignature};

/// Encodes `recid` into `v`: `27 + recid` legacy, `35 + 2 * chain_id + recid`
/// replay protected.
pub fn encode_v(recid: u8, chain_id: Option<u64>) -> u64 {
    match chain_id {
        Some(id) => 35 + 2 * id + u64::from(recid),
        None => 27 + u64::from(recid),
    }
}

/// Splits `v` back into `(recid, chain_id)`.
pub fn decode_v(v: u64) -> Result<(u8, Option<u64>), TransactionError> {
    match v {
        27 | 28 => Ok(((v - 27) as u8, None)),
        v if v >= 35 => Ok((((v - 35) % 2) as u8, Some((v - 35) / 2))),
        _ => Err(TransactionError::InvalidSignature(format!("invalid v value {v}"))),
    }
}

/// Attaches a wallet-produced signature to `tx`.
pub fn with_signature(
    mut tx: Transaction,
    signature: &RecoverableSignature,
    chain_id: Option<u64>,
) -> Transaction {
    tx.signature = TxSignature {
        v: encode_v(signature.recid, chain_id),
        r: signature.r,
        s: signature.s,
    };
    tx
}

/// Signs `tx` directly with a keypair. Wallet-backed signing goes through the
/// API signer instead; this is for devnet tooling and tests.
pub fn sign_transaction(
    tx: Transaction,
    keypair: &Keypair,
    chain_id: Option<u64>,
) -> Result<Transaction, KeyError> {
    let hash = tx.signing_hash(chain_id);
    let signature = keypair.sign_hash(&hash)?;
    Ok(with_signature(tx, &signature, chain_id))
}

/// Recovers the sender of a signed transaction.
///
/// The chain id used for the signing hash is derived from `v`, so legacy and
/// replay-protected transactions are both accepted here. Whether a legacy
/// signature is acceptable at the current height is a pool policy question.
pub fn recover_sender(tx: &Transaction) -> Result<Address, TransactionError> {
    if !tx.is_signed() {
        return Err(TransactionError::Unsigned);
    }
    let (recid, chain_id) = decode_v(tx.signature.v)?;
    let signature = RecoverableSignature {
        r: tx.signature.r,
        s: tx.signature.s,
        recid,
    };
    signature
        .recover(&tx.signing_hash(chain_id))
        .map_err(|e| TransactionError::InvalidSignature(e.to_string()))
}

/// Address of the contract created by `sender` at `nonce`:
/// `keccak256(rlp([sender, nonce]))[12..]`.
///
/// Informational only. Block execution decides the canonical address.
pub fn contract_address(sender: &Address, nonce: u64) -> Address {
    sender.create(nonce)
}

/// Signing hash under the chain id recorded in the transaction's own `v`.
pub fn own_signing_hash(tx: &Transaction) -> B256 {
    tx.signing_hash(tx.chain_id())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
