//! # Account and Governance State
//!
//! A [`StateSnapshot`] is an immutable-by-convention view of the world at one
//! block: account balances, nonces and code, plus the governance records the
//! authorization gate consults (stock manager, equity holdings, validator
//! set, registered base contracts).
//!
//! Readers go through the [`StateReader`] trait so the call simulator and
//! the gate never depend on how state is stored.
//!
//! ## State Transitions
//!
//! [`StateSnapshot::apply_transaction`] is the devnet's block executor. It
//! validates everything up front and only then mutates, so a rejected
//! transaction leaves the snapshot untouched. Gas is not charged on devnet.

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::hash::keccak256;
use crate::transaction::{contract_address, Transaction, TxMajor, TxMinor};

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Next expected transaction nonce.
    pub nonce: u64,
    /// Native balance, wei.
    pub balance: U256,
    /// Contract code. Empty for externally owned accounts.
    #[serde(default)]
    pub code: Bytes,
}

impl Account {
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Equity holdings
// ---------------------------------------------------------------------------

/// Lifecycle state of an equity holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockState {
    /// Active; may be transferred or frozen.
    Run,
    /// Held; may be unfrozen or cleaned.
    Frozen,
}

impl fmt::Display for StockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "Run"),
            Self::Frozen => write!(f, "Frozen"),
        }
    }
}

/// An address-scoped equity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHolding {
    pub number: u64,
    pub state: StockState,
}

impl StockHolding {
    pub fn running(number: u64) -> Self {
        Self {
            number,
            state: StockState::Run,
        }
    }
}

// ---------------------------------------------------------------------------
// GovernanceState
// ---------------------------------------------------------------------------

/// Governance records carried alongside account state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceState {
    /// Address allowed to manage equity holdings. Zero means unset.
    pub stock_manager: Address,
    pub holdings: BTreeMap<Address, StockHolding>,
    pub validators: Vec<Address>,
    pub system_contracts: Vec<Address>,
    /// Base contracts registered per owner.
    pub user_contracts: BTreeMap<Address, Vec<Address>>,
    /// Gas accumulated by equity operations.
    pub stock_gas_pool: u64,
}

impl GovernanceState {
    pub fn is_validator(&self, address: &Address) -> bool {
        self.validators.contains(address)
    }
}

// ---------------------------------------------------------------------------
// StateReader
// ---------------------------------------------------------------------------

/// Read-only access to one state snapshot.
pub trait StateReader: Send + Sync {
    fn account(&self, address: &Address) -> Option<Account>;

    fn governance(&self) -> &GovernanceState;

    fn balance(&self, address: &Address) -> U256 {
        self.account(address).map(|a| a.balance).unwrap_or_default()
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.account(address).map(|a| a.nonce).unwrap_or_default()
    }

    fn code(&self, address: &Address) -> Bytes {
        self.account(address).map(|a| a.code).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// StateError
// ---------------------------------------------------------------------------

/// Why a transaction could not be applied to a snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("nonce mismatch for {address}: expected {expected}, got {got}")]
    NonceMismatch {
        address: Address,
        expected: u64,
        got: u64,
    },

    #[error("insufficient balance for {address}: have {have}, need {need}")]
    InsufficientBalance {
        address: Address,
        have: U256,
        need: U256,
    },

    #[error("no stock holding for {0}")]
    UnknownHolding(Address),

    #[error("stock holding of {address} is {actual}, operation requires {expected}")]
    HoldingState {
        address: Address,
        expected: StockState,
        actual: StockState,
    },

    #[error("insufficient stock for {address}: held {held}, requested {requested}")]
    InsufficientStock {
        address: Address,
        held: u64,
        requested: u64,
    },

    #[error("stock quantity {0} does not fit in 64 bits")]
    QuantityOverflow(U256),

    #[error("{0} transaction is missing its recipient")]
    MissingRecipient(String),
}

// ---------------------------------------------------------------------------
// StateSnapshot
// ---------------------------------------------------------------------------

/// In-memory state at one height.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    accounts: BTreeMap<Address, Account>,
    governance: GovernanceState,
}

impl StateSnapshot {
    pub fn new(accounts: BTreeMap<Address, Account>, governance: GovernanceState) -> Self {
        Self {
            accounts,
            governance,
        }
    }

    pub fn insert_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    pub fn governance_mut(&mut self) -> &mut GovernanceState {
        &mut self.governance
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Commitment over the whole snapshot. BTreeMap ordering makes the JSON
    /// rendering deterministic.
    pub fn root_hash(&self) -> B256 {
        keccak256(serde_json::to_vec(self).unwrap_or_default())
    }

    /// Applies a transaction sent by `sender`. All-or-nothing.
    pub fn apply_transaction(&mut self, sender: Address, tx: &Transaction) -> Result<(), StateError> {
        let expected = self.nonce(&sender);
        if tx.nonce != expected {
            return Err(StateError::NonceMismatch {
                address: sender,
                expected,
                got: tx.nonce,
            });
        }

        match tx.category.major() {
            TxMajor::Normal => self.apply_value_transfer(sender, tx)?,
            TxMajor::Stock => self.apply_stock(sender, tx)?,
            TxMajor::SystemBase => self.apply_system_base(tx)?,
            TxMajor::UserBase => self.apply_user_base(sender, tx)?,
            TxMajor::Extra => {}
        }

        self.accounts.entry(sender).or_default().nonce += 1;
        Ok(())
    }

    fn apply_value_transfer(&mut self, sender: Address, tx: &Transaction) -> Result<(), StateError> {
        let have = self.balance(&sender);
        if have < tx.value {
            return Err(StateError::InsufficientBalance {
                address: sender,
                have,
                need: tx.value,
            });
        }

        let recipient = match tx.to {
            Some(to) => to,
            None => {
                let created = contract_address(&sender, tx.nonce);
                self.accounts.entry(created).or_default().code = tx.data.clone();
                created
            }
        };

        self.accounts.entry(sender).or_default().balance -= tx.value;
        let target = self.accounts.entry(recipient).or_default();
        target.balance = target.balance.saturating_add(tx.value);
        Ok(())
    }

    fn apply_stock(&mut self, sender: Address, tx: &Transaction) -> Result<(), StateError> {
        let to = tx
            .to
            .ok_or_else(|| StateError::MissingRecipient(tx.category.label()))?;
        let quantity = u64::try_from(tx.value).map_err(|_| StateError::QuantityOverflow(tx.value))?;
        let holdings = &mut self.governance.holdings;

        match tx.category.minor() {
            TxMinor::SetStockManager => self.governance.stock_manager = to,
            TxMinor::StockSet => {
                holdings.insert(to, StockHolding::running(quantity));
            }
            TxMinor::StockTransfer => {
                let from = holdings
                    .get(&sender)
                    .copied()
                    .ok_or(StateError::UnknownHolding(sender))?;
                require_state(sender, &from, StockState::Run)?;
                if from.number < quantity {
                    return Err(StateError::InsufficientStock {
                        address: sender,
                        held: from.number,
                        requested: quantity,
                    });
                }
                if let Some(existing) = holdings.get(&to) {
                    require_state(to, existing, StockState::Run)?;
                }
                if let Some(h) = holdings.get_mut(&sender) {
                    h.number -= quantity;
                }
                let target = holdings.entry(to).or_insert(StockHolding::running(0));
                target.number = target.number.saturating_add(quantity);
            }
            TxMinor::StockFreeze => {
                transition(holdings, to, StockState::Run, Some(StockState::Frozen))?
            }
            TxMinor::StockUnfreeze => {
                transition(holdings, to, StockState::Frozen, Some(StockState::Run))?
            }
            TxMinor::StockClean => transition(holdings, to, StockState::Frozen, None)?,
            _ => {}
        }

        self.governance.stock_gas_pool = self.governance.stock_gas_pool.saturating_add(tx.gas);
        Ok(())
    }

    fn apply_system_base(&mut self, tx: &Transaction) -> Result<(), StateError> {
        let to = tx
            .to
            .ok_or_else(|| StateError::MissingRecipient(tx.category.label()))?;
        match tx.category.minor() {
            TxMinor::SetValidator => push_unique(&mut self.governance.validators, to),
            TxMinor::SetSystemContract => push_unique(&mut self.governance.system_contracts, to),
            // Candidate registration and voting are tallied by the consensus
            // engine, not the state executor.
            _ => {}
        }
        Ok(())
    }

    fn apply_user_base(&mut self, sender: Address, tx: &Transaction) -> Result<(), StateError> {
        let to = tx
            .to
            .ok_or_else(|| StateError::MissingRecipient(tx.category.label()))?;
        let registered = self.governance.user_contracts.entry(sender).or_default();
        match tx.category.minor() {
            TxMinor::SetUserContract => push_unique(registered, to),
            TxMinor::CancelUserContract => registered.retain(|c| *c != to),
            _ => {}
        }
        if registered.is_empty() {
            self.governance.user_contracts.remove(&sender);
        }
        Ok(())
    }
}

fn require_state(
    address: Address,
    holding: &StockHolding,
    expected: StockState,
) -> Result<(), StateError> {
    if holding.state != expected {
        return Err(StateError::HoldingState {
            address,
            expected,
            actual: holding.state,
        });
    }
    Ok(())
}

/// Moves a holding from `from` to `to`, or removes it when `to` is `None`.
fn transition(
    holdings: &mut BTreeMap<Address, StockHolding>,
    address: Address,
    from: StockState,
    to: Option<StockState>,
) -> Result<(), StateError> {
    let holding = holdings
        .get_mut(&address)
        .ok_or(StateError::UnknownHolding(address))?;
    require_state(address, holding, from)?;
    match to {
        Some(state) => holding.state = state,
        None => {
            holdings.remove(&address);
        }
    }
    Ok(())
}

fn push_unique(list: &mut Vec<Address>, address: Address) {
    if !list.contains(&address) {
        list.push(address);
    }
}

impl StateReader for StateSnapshot {
    fn account(&self, address: &Address) -> Option<Account> {
        self.accounts.get(address).cloned()
    }

    fn governance(&self) -> &GovernanceState {
        &self.governance
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Category, TransactionBuilder};

    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn funded() -> StateSnapshot {
        let mut state = StateSnapshot::default();
        state.insert_account(ALICE, Account::with_balance(U256::from(1_000u64)));
        state
    }

    fn stock(minor: TxMinor, to: Address, quantity: u64, nonce: u64) -> Transaction {
        TransactionBuilder::new(Category::new(TxMajor::Stock, minor).unwrap())
            .to(to)
            .value(U256::from(quantity))
            .gas(90_000)
            .nonce(nonce)
            .build()
    }

    #[test]
    fn value_transfer() {
        let mut state = funded();
        let tx = TransactionBuilder::new(Category::NORMAL)
            .to(BOB)
            .value(U256::from(400u64))
            .build();
        state.apply_transaction(ALICE, &tx).unwrap();
        assert_eq!(state.balance(&ALICE), U256::from(600u64));
        assert_eq!(state.balance(&BOB), U256::from(400u64));
        assert_eq!(state.nonce(&ALICE), 1);
    }

    #[test]
    fn insufficient_balance_leaves_state_untouched() {
        let mut state = funded();
        let before = state.clone();
        let tx = TransactionBuilder::new(Category::NORMAL)
            .to(BOB)
            .value(U256::from(5_000u64))
            .build();
        match state.apply_transaction(ALICE, &tx) {
            Err(StateError::InsufficientBalance { .. }) => {}
            other => panic!("expected InsufficientBalance, got {:?}", other),
        }
        assert_eq!(state, before);
    }

    #[test]
    fn nonce_must_match() {
        let mut state = funded();
        let tx = TransactionBuilder::new(Category::NORMAL).to(BOB).nonce(3).build();
        match state.apply_transaction(ALICE, &tx) {
            Err(StateError::NonceMismatch { expected: 0, got: 3, .. }) => {}
            other => panic!("expected NonceMismatch, got {:?}", other),
        }
    }

    #[test]
    fn creation_deploys_code() {
        let mut state = funded();
        let tx = TransactionBuilder::new(Category::NORMAL)
            .data(vec![0x01, 0x00])
            .build();
        state.apply_transaction(ALICE, &tx).unwrap();
        let created = contract_address(&ALICE, 0);
        assert_eq!(state.code(&created), Bytes::from(vec![0x01, 0x00]));
    }

    #[test]
    fn stock_lifecycle() {
        let mut state = funded();
        state.apply_transaction(ALICE, &stock(TxMinor::StockSet, BOB, 100, 0)).unwrap();
        assert_eq!(state.governance().holdings[&BOB], StockHolding::running(100));

        state.apply_transaction(ALICE, &stock(TxMinor::StockFreeze, BOB, 0, 1)).unwrap();
        assert_eq!(state.governance().holdings[&BOB].state, StockState::Frozen);

        state.apply_transaction(ALICE, &stock(TxMinor::StockUnfreeze, BOB, 0, 2)).unwrap();
        assert_eq!(state.governance().holdings[&BOB].state, StockState::Run);

        match state.apply_transaction(ALICE, &stock(TxMinor::StockClean, BOB, 0, 3)) {
            Err(StateError::HoldingState { expected: StockState::Frozen, .. }) => {}
            other => panic!("expected HoldingState, got {:?}", other),
        }
        assert_eq!(state.governance().stock_gas_pool, 270_000);
    }

    #[test]
    fn stock_transfer_moves_quantity() {
        let mut state = funded();
        state
            .governance_mut()
            .holdings
            .insert(ALICE, StockHolding::running(100));
        state
            .apply_transaction(ALICE, &stock(TxMinor::StockTransfer, BOB, 30, 0))
            .unwrap();
        assert_eq!(state.governance().holdings[&ALICE].number, 70);
        assert_eq!(state.governance().holdings[&BOB].number, 30);

        match state.apply_transaction(ALICE, &stock(TxMinor::StockTransfer, BOB, 71, 1)) {
            Err(StateError::InsufficientStock { held: 70, requested: 71, .. }) => {}
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn validators_and_contracts() {
        let mut state = funded();
        let set_validator = TransactionBuilder::new(
            Category::new(TxMajor::SystemBase, TxMinor::SetValidator).unwrap(),
        )
        .to(BOB)
        .build();
        state.apply_transaction(ALICE, &set_validator).unwrap();
        assert!(state.governance().is_validator(&BOB));

        let register = TransactionBuilder::new(
            Category::new(TxMajor::UserBase, TxMinor::SetUserContract).unwrap(),
        )
        .to(BOB)
        .nonce(1)
        .build();
        state.apply_transaction(ALICE, &register).unwrap();
        assert_eq!(state.governance().user_contracts[&ALICE], vec![BOB]);

        let cancel = TransactionBuilder::new(
            Category::new(TxMajor::UserBase, TxMinor::CancelUserContract).unwrap(),
        )
        .to(BOB)
        .nonce(2)
        .build();
        state.apply_transaction(ALICE, &cancel).unwrap();
        assert!(state.governance().user_contracts.get(&ALICE).is_none());
    }

    #[test]
    fn root_changes_with_state() {
        let a = funded();
        let mut b = funded();
        assert_eq!(a.root_hash(), b.root_hash());
        b.insert_account(BOB, Account::with_balance(U256::from(1u64)));
        assert_ne!(a.root_hash(), b.root_hash());
    }
}
