//! # Network Module
//!
//! The node-facing edges of the transaction layer: the pending pool the
//! admission pipeline feeds, the devnet block producer that drains it, and
//! the JSON-RPC envelope the node binary serves.
//!
//! ## Architecture
//!
//! ```text
//! mempool.rs  — PendingPool collaborator trait and the devnet TxPool
//! producer.rs — Timer-driven block sealing for the devnet chain
//! rpc.rs      — JSON-RPC method names, envelopes and error codes
//! ```
//!
//! ## Design Decisions
//!
//! - The pool is protected by `DashMap` plus a `parking_lot::RwLock` price
//!   index rather than a `tokio::Mutex`, since pool reads vastly outnumber
//!   writes and none of them hold the lock across an `.await`.
//! - The RPC layer defines types only. HTTP serving happens in the node
//!   binary via axum, so the protocol crate stays transport-agnostic.

pub mod mempool;
pub mod producer;
pub mod rpc;

pub use mempool::{PendingPool, PoolConfig, PoolEntry, PoolError, PoolStateView, TxPool};
pub use producer::{BlockProducer, ProducerConfig};
pub use rpc::{RpcError, RpcMethod, RpcRequest, RpcResponse};
