//! Authorization Gate.
//!
//! Governed operations are checked against a governance snapshot before any
//! transaction is built for them. Every refusal is a named [`AuthError`] so
//! callers can tell a policy failure from a transport failure.
//!
//! ## Rules
//!
//! ```text
//! SetStockManager        first assignment is free, then actor == manager
//! StockSet               actor == manager
//! StockFreeze            actor == manager, holding is Run
//! StockUnfreeze / Clean  actor == manager, holding is Frozen
//! StockTransfer          holder signs, held >= requested, holding is Run
//! AddValidator           block 0 only, actor == local validator
//! SetSystemContract      actor is a current validator
//! ```

use alloy_primitives::Address;
use thiserror::Error;
use tracing::debug;

use crate::storage::{BlockHeader, GovernanceState, StateReader, StockState};
use crate::transaction::{Category, TransactionError, TxMajor, TxMinor};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{actor} is not the owner of this resource (owner {owner})")]
    NotOwner { actor: Address, owner: Address },

    #[error("{actor} is not a validator")]
    NotValidator { actor: Address },

    #[error("validators can only be added at genesis, current block is {number}")]
    NotGenesis { number: u64 },

    #[error("insufficient holding for {address}: held {held}, requested {requested}")]
    InsufficientHolding {
        address: Address,
        held: u64,
        requested: u64,
    },

    #[error("holding of {address} is {actual}, operation requires {expected}")]
    InvalidHoldingState {
        address: Address,
        expected: StockState,
        actual: StockState,
    },

    #[error("no holding recorded for {0}")]
    UnknownHolding(Address),
}

/// Governance view an operation is judged against. Fetched per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub number: u64,
    /// The acting node identity.
    pub coinbase: Address,
    pub local_validator: Option<Address>,
    pub governance: GovernanceState,
}

impl AuthContext {
    pub fn new(
        state: &dyn StateReader,
        header: &BlockHeader,
        coinbase: Address,
        local_validator: Option<Address>,
    ) -> Self {
        Self {
            number: header.number,
            coinbase,
            local_validator,
            governance: state.governance().clone(),
        }
    }
}

/// An operation that must pass the gate before it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernedOperation {
    SetStockManager { manager: Address },
    StockSet { holder: Address, quantity: u64 },
    StockTransfer {
        from: Address,
        to: Address,
        quantity: u64,
    },
    StockFreeze { holder: Address },
    StockUnfreeze { holder: Address },
    StockClean { holder: Address },
    AddValidator { validator: Address },
    SetSystemContract { contract: Address },
}

impl GovernedOperation {
    pub fn category(&self) -> Result<Category, TransactionError> {
        let (major, minor) = match self {
            Self::SetStockManager { .. } => (TxMajor::Stock, TxMinor::SetStockManager),
            Self::StockSet { .. } => (TxMajor::Stock, TxMinor::StockSet),
            Self::StockTransfer { .. } => (TxMajor::Stock, TxMinor::StockTransfer),
            Self::StockFreeze { .. } => (TxMajor::Stock, TxMinor::StockFreeze),
            Self::StockUnfreeze { .. } => (TxMajor::Stock, TxMinor::StockUnfreeze),
            Self::StockClean { .. } => (TxMajor::Stock, TxMinor::StockClean),
            Self::AddValidator { .. } => (TxMajor::SystemBase, TxMinor::SetValidator),
            Self::SetSystemContract { .. } => (TxMajor::SystemBase, TxMinor::SetSystemContract),
        };
        Category::new(major, minor)
    }

    /// The transaction recipient carrying the operation's target.
    pub fn recipient(&self) -> Address {
        match *self {
            Self::SetStockManager { manager } => manager,
            Self::StockSet { holder, .. }
            | Self::StockFreeze { holder }
            | Self::StockUnfreeze { holder }
            | Self::StockClean { holder } => holder,
            Self::StockTransfer { to, .. } => to,
            Self::AddValidator { validator } => validator,
            Self::SetSystemContract { contract } => contract,
        }
    }

    /// Quantity carried in the value field. Zero for non-quantity operations.
    pub fn quantity(&self) -> u64 {
        match *self {
            Self::StockSet { quantity, .. } | Self::StockTransfer { quantity, .. } => quantity,
            _ => 0,
        }
    }

    /// Who signs the resulting transaction.
    pub fn signer(&self, coinbase: Address) -> Address {
        match *self {
            Self::StockTransfer { from, .. } => from,
            _ => coinbase,
        }
    }
}

/// Approves or refuses `op` under `ctx`.
pub fn authorize(ctx: &AuthContext, op: &GovernedOperation) -> Result<(), AuthError> {
    let governance = &ctx.governance;
    match *op {
        GovernedOperation::SetStockManager { .. } => {
            if !governance.stock_manager.is_zero() {
                require_manager(ctx)?;
            }
        }
        GovernedOperation::StockSet { .. } => require_manager(ctx)?,
        GovernedOperation::StockFreeze { holder } => {
            require_manager(ctx)?;
            require_holding_state(governance, holder, StockState::Run)?;
        }
        GovernedOperation::StockUnfreeze { holder } | GovernedOperation::StockClean { holder } => {
            require_manager(ctx)?;
            require_holding_state(governance, holder, StockState::Frozen)?;
        }
        GovernedOperation::StockTransfer { from, quantity, .. } => {
            let holding = governance.holdings.get(&from);
            let held = holding.map(|h| h.number).unwrap_or_default();
            if held < quantity {
                return Err(AuthError::InsufficientHolding {
                    address: from,
                    held,
                    requested: quantity,
                });
            }
            require_holding_state(governance, from, StockState::Run)?;
        }
        GovernedOperation::AddValidator { .. } => {
            if ctx.number != 0 {
                return Err(AuthError::NotGenesis { number: ctx.number });
            }
            if ctx.local_validator != Some(ctx.coinbase) {
                return Err(AuthError::NotValidator {
                    actor: ctx.coinbase,
                });
            }
        }
        GovernedOperation::SetSystemContract { .. } => {
            if !governance.is_validator(&ctx.coinbase) {
                return Err(AuthError::NotValidator {
                    actor: ctx.coinbase,
                });
            }
        }
    }
    debug!(op = ?op, actor = %ctx.coinbase, number = ctx.number, "governed operation authorized");
    Ok(())
}

fn require_manager(ctx: &AuthContext) -> Result<(), AuthError> {
    let owner = ctx.governance.stock_manager;
    if owner.is_zero() || owner != ctx.coinbase {
        return Err(AuthError::NotOwner {
            actor: ctx.coinbase,
            owner,
        });
    }
    Ok(())
}

fn require_holding_state(
    governance: &GovernanceState,
    address: Address,
    expected: StockState,
) -> Result<(), AuthError> {
    let holding = governance
        .holdings
        .get(&address)
        .ok_or(AuthError::UnknownHolding(address))?;
    if holding.state != expected {
        return Err(AuthError::InvalidHoldingState {
            address,
            expected,
            actual: holding.state,
        });
    }
    Ok(())
}
