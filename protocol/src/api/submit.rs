//! Admission Pipeline.
//!
//! ```text
//! 1. VERIFY — category policy, payload bounds, signature → sender, chain id
//! 2. STAMP  — origin tag on the local copy (not covered by the signature)
//! 3. POOL   — hand over; rejections surface verbatim
//! 4. LOG    — creations log their derived contract address
//! ```

use alloy_primitives::B256;
use tracing::{info, warn};

use super::backend::Backend;
use super::error::ApiError;
use crate::transaction::{contract_address, verify_transaction, Transaction, TransactionError};

/// Admits a signed transaction into the pending pool and returns its hash.
pub async fn submit_transaction(backend: &Backend, mut tx: Transaction) -> Result<B256, ApiError> {
    let sender = verify_transaction(&tx).map_err(|e| {
        warn!(tx = %tx.hash(), error = %e, "transaction failed validation");
        ApiError::ValidationFailed(e)
    })?;
    check_chain_id(backend, &tx)?;

    tx.set_origin(backend.config.origin_tag.as_bytes().to_vec());
    let hash = tx.hash();
    let nonce = tx.nonce;
    let creation = tx.is_contract_creation();

    if let Err(e) = backend.pool.add(tx).await {
        warn!(tx = %hash, %sender, error = %e, "pool rejected transaction");
        return Err(ApiError::PoolRejected(e));
    }

    if creation {
        let contract = contract_address(&sender, nonce);
        info!(tx = %hash, %sender, %contract, "submitted contract creation");
    } else {
        info!(tx = %hash, %sender, nonce, "submitted transaction");
    }
    Ok(hash)
}

/// Replay-protected signatures must name this node's chain. Legacy ones
/// carry no chain id and pass.
fn check_chain_id(backend: &Backend, tx: &Transaction) -> Result<(), ApiError> {
    let expected = backend.chain.chain_config().chain_id;
    match tx.chain_id() {
        Some(got) if got != expected => {
            warn!(tx = %tx.hash(), expected, got, "transaction signed for another chain");
            Err(TransactionError::WrongChainId { expected, got }.into())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::signer::sign_transaction;
    use crate::api::testkit::TestNode;
    use crate::network::mempool::{PendingPool, PoolError};
    use crate::transaction::{Category, TransactionBuilder, TransactionError, TxMajor, TxMinor};
    use alloy_primitives::{Address, U256};

    fn signed(node: &TestNode, nonce: u64, to: Option<Address>) -> Transaction {
        let tx = TransactionBuilder::new(Category::NORMAL)
            .recipient(to)
            .nonce(nonce)
            .gas(90_000)
            .gas_price(U256::from(TestNode::PRICE))
            .data(vec![0u8])
            .build();
        sign_transaction(&node.backend, node.alice, tx, None).unwrap()
    }

    #[tokio::test]
    async fn admits_and_stamps_origin() {
        let node = TestNode::new();
        let tx = signed(&node, 0, Some(Address::repeat_byte(7)));
        let hash = submit_transaction(&node.backend, tx.clone()).await.unwrap();

        assert_eq!(hash, tx.hash());
        let pooled = node.pool.get(&hash).unwrap();
        assert_eq!(pooled.origin.as_ref(), b"127.0.0.1");
    }

    #[tokio::test]
    async fn creation_is_admitted() {
        let node = TestNode::new();
        let tx = signed(&node, 0, None);
        let hash = submit_transaction(&node.backend, tx).await.unwrap();
        assert!(node.pool.get(&hash).unwrap().is_contract_creation());
    }

    #[tokio::test]
    async fn duplicate_surfaces_pool_error() {
        let node = TestNode::new();
        let tx = signed(&node, 0, Some(Address::repeat_byte(7)));
        submit_transaction(&node.backend, tx.clone()).await.unwrap();
        match submit_transaction(&node.backend, tx).await {
            Err(ApiError::PoolRejected(PoolError::AlreadyKnown(_))) => {}
            other => panic!("expected AlreadyKnown, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_transaction_never_reaches_pool() {
        let node = TestNode::new();
        let category = Category::new(TxMajor::Stock, TxMinor::StockSet).unwrap();
        let tx = TransactionBuilder::new(category)
            .gas(90_000)
            .gas_price(U256::from(TestNode::PRICE))
            .build();
        let tx = sign_transaction(&node.backend, node.alice, tx, None).unwrap();

        match submit_transaction(&node.backend, tx).await {
            Err(ApiError::ValidationFailed(TransactionError::MissingRecipient { .. })) => {}
            other => panic!("expected MissingRecipient, got {:?}", other),
        }
        assert!(node.pool.is_empty());
    }

    #[tokio::test]
    async fn unsigned_transaction_is_rejected() {
        let node = TestNode::new();
        let tx = TransactionBuilder::new(Category::NORMAL)
            .to(Address::repeat_byte(1))
            .gas(21_000)
            .build();
        match submit_transaction(&node.backend, tx).await {
            Err(ApiError::ValidationFailed(TransactionError::Unsigned)) => {}
            other => panic!("expected Unsigned, got {:?}", other),
        }
    }
}
