//! Governance and attachment facade.
//!
//! Governed operations (stock lifecycle, validators, system contracts) are
//! checked by the authorization gate against latest state, then sent down
//! the ordinary intent path signed by the acting account. User contract
//! registration is ungoverned.
//!
//! `Extra` attachments have their own route: [`GovernanceApi::set_word`] and
//! [`GovernanceApi::set_data`] build a recipient-less transaction carrying
//! the payload in `extra`, and the getters read it back by transaction hash.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, B256, U256};
use tracing::{debug, info};

use super::args::SendTxArgs;
use super::auth::{authorize, AuthContext, GovernedOperation};
use super::error::{ApiError, BackendError};
use super::service::TransactionApi;
use super::signer;
use super::submit::submit_transaction;
use crate::storage::{BlockNumber, GovernanceState, StockHolding};
use crate::transaction::{Category, Transaction, TransactionBuilder, TxMajor, TxMinor};

#[derive(Clone)]
pub struct GovernanceApi {
    transactions: TransactionApi,
}

impl GovernanceApi {
    pub fn new(transactions: TransactionApi) -> Self {
        Self { transactions }
    }

    // -----------------------------------------------------------------------
    // Stock
    // -----------------------------------------------------------------------

    pub async fn set_stock_manager(&self, manager: Address) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::SetStockManager { manager }).await
    }

    pub async fn stock_set(&self, holder: Address, quantity: u64) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::StockSet { holder, quantity }).await
    }

    /// Signed by `from`, the holder, not by the coinbase.
    pub async fn stock_transfer(
        &self,
        from: Address,
        to: Address,
        quantity: u64,
    ) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::StockTransfer { from, to, quantity })
            .await
    }

    pub async fn stock_freeze(&self, holder: Address) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::StockFreeze { holder }).await
    }

    pub async fn stock_unfreeze(&self, holder: Address) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::StockUnfreeze { holder }).await
    }

    pub async fn stock_clean(&self, holder: Address) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::StockClean { holder }).await
    }

    pub async fn stock_manager(&self, block: BlockNumber) -> Result<Address, ApiError> {
        Ok(self.governance_at(block).await?.stock_manager)
    }

    pub async fn stock_get(
        &self,
        holder: Address,
        block: BlockNumber,
    ) -> Result<Option<StockHolding>, ApiError> {
        Ok(self.governance_at(block).await?.holdings.get(&holder).copied())
    }

    pub async fn stocks_get(
        &self,
        block: BlockNumber,
    ) -> Result<BTreeMap<Address, StockHolding>, ApiError> {
        Ok(self.governance_at(block).await?.holdings)
    }

    pub async fn stock_gas_pool(&self, block: BlockNumber) -> Result<u64, ApiError> {
        Ok(self.governance_at(block).await?.stock_gas_pool)
    }

    // -----------------------------------------------------------------------
    // Validators and base contracts
    // -----------------------------------------------------------------------

    pub async fn add_validator(&self, validator: Address) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::AddValidator { validator })
            .await
    }

    pub async fn set_system_contract(&self, contract: Address) -> Result<B256, ApiError> {
        self.governed(GovernedOperation::SetSystemContract { contract })
            .await
    }

    pub async fn set_user_contract(&self, from: Address, contract: Address) -> Result<B256, ApiError> {
        self.user_contract(from, contract, TxMinor::SetUserContract).await
    }

    pub async fn cancel_user_contract(
        &self,
        from: Address,
        contract: Address,
    ) -> Result<B256, ApiError> {
        self.user_contract(from, contract, TxMinor::CancelUserContract)
            .await
    }

    pub async fn validators(&self, block: BlockNumber) -> Result<Vec<Address>, ApiError> {
        Ok(self.governance_at(block).await?.validators)
    }

    // -----------------------------------------------------------------------
    // Extra attachments
    // -----------------------------------------------------------------------

    pub async fn set_word(&self, word: &str) -> Result<B256, ApiError> {
        self.attach(TxMinor::Word, Bytes::copy_from_slice(word.as_bytes()))
            .await
    }

    pub async fn set_data(&self, data: Bytes) -> Result<B256, ApiError> {
        self.attach(TxMinor::Data, data).await
    }

    pub async fn get_word(&self, hash: B256) -> Result<String, ApiError> {
        let extra = self.attachment(hash, TxMinor::Word).await?;
        String::from_utf8(extra.to_vec())
            .map_err(|e| ApiError::InvalidRequest(format!("word attachment is not utf-8: {e}")))
    }

    pub async fn get_data(&self, hash: B256) -> Result<Bytes, ApiError> {
        self.attachment(hash, TxMinor::Data).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn governed(&self, op: GovernedOperation) -> Result<B256, ApiError> {
        let backend = self.transactions.backend();
        let coinbase = backend.coinbase()?;
        let (state, header) = backend
            .chain
            .state_at(BlockNumber::Latest)
            .await
            .map_err(|e| ApiError::from(BackendError::from(e)))?
            .ok_or_else(|| ApiError::StateUnavailable(BlockNumber::Latest.to_string()))?;

        let ctx = AuthContext::new(state.as_ref(), &header, coinbase, backend.config.local_validator);
        authorize(&ctx, &op)?;

        let args = SendTxArgs {
            to: Some(op.recipient()),
            value: Some(U256::from(op.quantity())),
            ..SendTxArgs::new(op.signer(coinbase), op.category()?)
        };
        let hash = self.transactions.send_transaction(args).await?;
        info!(tx = %hash, op = ?op, actor = %coinbase, "governed operation submitted");
        Ok(hash)
    }

    async fn user_contract(
        &self,
        from: Address,
        contract: Address,
        minor: TxMinor,
    ) -> Result<B256, ApiError> {
        let args = SendTxArgs {
            to: Some(contract),
            ..SendTxArgs::new(from, Category::new(TxMajor::UserBase, minor)?)
        };
        self.transactions.send_transaction(args).await
    }

    async fn governance_at(&self, block: BlockNumber) -> Result<GovernanceState, ApiError> {
        let (state, _) = self
            .transactions
            .backend()
            .chain
            .state_at(block)
            .await
            .map_err(|e| ApiError::from(BackendError::from(e)))?
            .ok_or_else(|| ApiError::StateUnavailable(block.to_string()))?;
        Ok(state.governance().clone())
    }

    /// Builds, signs and submits an attachment from the coinbase.
    async fn attach(&self, minor: TxMinor, payload: Bytes) -> Result<B256, ApiError> {
        let backend = self.transactions.backend();
        let from = backend.coinbase()?;
        let category = Category::new(TxMajor::Extra, minor)?;

        let locker = self.transactions.locker();
        let _guard = locker.lock(from).await;

        let mut args = SendTxArgs::new(from, category);
        args.set_defaults(backend).await?;
        let tx = TransactionBuilder::new(category)
            .nonce(args.nonce.unwrap_or_default())
            .gas(args.gas.unwrap_or_default())
            .gas_price(args.gas_price.unwrap_or_default())
            .extra(payload)
            .build();
        let signed = signer::sign_transaction(backend, from, tx, None)?;
        submit_transaction(backend, signed).await
    }

    /// Extra payload of `hash`, included or still pending.
    async fn attachment(&self, hash: B256, minor: TxMinor) -> Result<Bytes, ApiError> {
        let backend = self.transactions.backend();
        let included = backend
            .chain
            .transaction_by_hash(hash)
            .await
            .map_err(|e| ApiError::from(BackendError::from(e)))?
            .map(|(tx, _)| tx);
        let tx: Transaction = included
            .or_else(|| backend.pool.get(&hash))
            .ok_or(ApiError::NotFound(hash))?;

        if tx.category.major() != TxMajor::Extra || tx.category.minor() != minor {
            return Err(ApiError::InvalidRequest(format!(
                "transaction {hash} is {}, not Extra/{minor}",
                tx.category
            )));
        }
        debug!(tx = %hash, size = tx.extra.len(), "attachment read");
        Ok(tx.extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::AuthError;
    use crate::api::testkit::TestNode;
    use crate::config::MAX_EXTRA_SIZE;
    use crate::network::mempool::PendingPool;
    use crate::storage::StockState;
    use crate::transaction::TransactionError;

    fn api(node: &TestNode) -> GovernanceApi {
        GovernanceApi::new(TransactionApi::new(node.backend.clone()))
    }

    fn seal(node: &TestNode) {
        let sealed = node
            .chain
            .seal_block(node.pool.select_transactions(64), node.alice, 1);
        assert!(sealed.rejected.is_empty(), "{:?}", sealed.rejected);
        node.pool.remove_batch(&sealed.included);
    }

    #[tokio::test]
    async fn transfer_above_holding_produces_nothing() {
        let node = TestNode::new();
        let gov = api(&node);
        match gov.stock_transfer(node.bob, node.alice, 150).await {
            Err(ApiError::Unauthorized(AuthError::InsufficientHolding {
                held: 100,
                requested: 150,
                ..
            })) => {}
            other => panic!("expected InsufficientHolding, got {:?}", other),
        }
        assert!(node.pool.is_empty());
    }

    #[tokio::test]
    async fn clean_on_running_holding_is_refused() {
        let node = TestNode::new();
        match api(&node).stock_clean(node.bob).await {
            Err(ApiError::Unauthorized(AuthError::InvalidHoldingState { .. })) => {}
            other => panic!("expected InvalidHoldingState, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn freeze_then_clean() {
        let node = TestNode::new();
        let gov = api(&node);

        let hash = gov.stock_freeze(node.bob).await.unwrap();
        let pooled = node.pool.get(&hash).unwrap();
        assert_eq!(pooled.category.minor(), TxMinor::StockFreeze);
        assert_eq!(pooled.to, Some(node.bob));
        seal(&node);

        let holding = gov.stock_get(node.bob, BlockNumber::Latest).await.unwrap().unwrap();
        assert_eq!(holding.state, StockState::Frozen);

        gov.stock_clean(node.bob).await.unwrap();
        seal(&node);
        assert!(gov.stocks_get(BlockNumber::Latest).await.unwrap().is_empty());
        assert!(gov.stock_gas_pool(BlockNumber::Latest).await.unwrap() > 0);
    }

    #[tokio::test]
    async fn transfer_is_signed_by_holder() {
        let node = TestNode::new();
        let gov = api(&node);
        gov.stock_transfer(node.bob, node.alice, 60).await.unwrap();
        seal(&node);

        let holdings = gov.stocks_get(BlockNumber::Latest).await.unwrap();
        assert_eq!(holdings[&node.bob].number, 40);
        assert_eq!(holdings[&node.alice].number, 60);
    }

    #[tokio::test]
    async fn non_manager_cannot_set() {
        let node = TestNode::new();
        let mut backend = node.backend.clone();
        backend.config.coinbase = Some(node.bob);
        let gov = GovernanceApi::new(TransactionApi::new(backend));
        match gov.stock_set(node.bob, 1_000).await {
            Err(ApiError::Unauthorized(AuthError::NotOwner { actor, owner })) => {
                assert_eq!(actor, node.bob);
                assert_eq!(owner, node.alice);
            }
            other => panic!("expected NotOwner, got {:?}", other),
        }
        assert_eq!(gov.stock_manager(BlockNumber::Latest).await.unwrap(), node.alice);
    }

    #[tokio::test]
    async fn validators_only_at_genesis() {
        let node = TestNode::new();
        let gov = api(&node);

        gov.add_validator(node.alice).await.unwrap();
        seal(&node);
        assert_eq!(gov.validators(BlockNumber::Latest).await.unwrap(), vec![node.alice]);
        assert!(gov.validators(BlockNumber::EARLIEST).await.unwrap().is_empty());

        match gov.add_validator(node.bob).await {
            Err(ApiError::Unauthorized(AuthError::NotGenesis { number: 1 })) => {}
            other => panic!("expected NotGenesis, got {:?}", other),
        }

        // Now a validator, the coinbase may install system contracts.
        gov.set_system_contract(Address::repeat_byte(0x5c)).await.unwrap();
    }

    #[tokio::test]
    async fn system_contract_needs_validator() {
        let node = TestNode::new();
        match api(&node).set_system_contract(Address::repeat_byte(0x5c)).await {
            Err(ApiError::Unauthorized(AuthError::NotValidator { .. })) => {}
            other => panic!("expected NotValidator, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn user_contracts_register_and_cancel() {
        let node = TestNode::new();
        let gov = api(&node);
        let contract = Address::repeat_byte(0x3c);

        gov.set_user_contract(node.bob, contract).await.unwrap();
        seal(&node);
        let state = gov.governance_at(BlockNumber::Latest).await.unwrap();
        assert_eq!(state.user_contracts[&node.bob], vec![contract]);

        gov.cancel_user_contract(node.bob, contract).await.unwrap();
        seal(&node);
        let state = gov.governance_at(BlockNumber::Latest).await.unwrap();
        assert!(!state.user_contracts.contains_key(&node.bob));
    }

    #[tokio::test]
    async fn word_round_trip_pending_and_included() {
        let node = TestNode::new();
        let gov = api(&node);

        let hash = gov.set_word("hello sable").await.unwrap();
        assert_eq!(gov.get_word(hash).await.unwrap(), "hello sable");
        seal(&node);
        assert_eq!(gov.get_word(hash).await.unwrap(), "hello sable");

        match gov.get_data(hash).await {
            Err(ApiError::InvalidRequest(_)) => {}
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn data_round_trip_and_bounds() {
        let node = TestNode::new();
        let gov = api(&node);

        let payload = Bytes::from(vec![0u8, 1, 2, 255]);
        let hash = gov.set_data(payload.clone()).await.unwrap();
        assert_eq!(gov.get_data(hash).await.unwrap(), payload);

        match gov.set_data(Bytes::from(vec![7u8; MAX_EXTRA_SIZE + 1])).await {
            Err(ApiError::ValidationFailed(TransactionError::ExtraTooLarge { .. })) => {}
            other => panic!("expected ExtraTooLarge, got {:?}", other),
        }
        match gov.get_data(B256::repeat_byte(9)).await {
            Err(ApiError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
