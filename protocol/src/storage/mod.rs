//! # Storage Module
//!
//! Chain data as the transaction layer sees it: headers, state snapshots,
//! governance records, and an in-memory devnet chain implementing the
//! [`ChainReader`] collaborator.
//!
//! ## Architecture
//!
//! ```text
//! block.rs  — BlockHeader, transaction roots, BlockNumber selectors
//! state.rs  — Account / governance state, StateReader, devnet state transitions
//! chain.rs  — ChainReader collaborator, Genesis, DevChain
//! ```
//!
//! Persistence is out of scope: a production node plugs its own database in
//! behind [`ChainReader`].

pub mod block;
pub mod chain;
pub mod state;

pub use block::{BlockHeader, BlockNumber};
pub use chain::{ChainError, ChainReader, DevChain, Genesis, GenesisAccount, SealedBlock};
pub use state::{
    Account, GovernanceState, StateError, StateReader, StateSnapshot, StockHolding, StockState,
};
