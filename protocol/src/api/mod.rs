//! # Transaction API
//!
//! The node-facing transaction layer: it turns client intents into signed,
//! admitted transactions and simulates messages without committing them.
//!
//! ## Architecture
//!
//! ```text
//! lock.rs       — Address Lock Manager (per-sender nonce window)
//! args.rs       — Transaction Builder: SendTxArgs / CallArgs and defaults
//! auth.rs       — Authorization Gate for governed categories
//! signer.rs     — wallet lookup, replay protection, personal messages
//! submit.rs     — Admission Pipeline
//! call.rs       — Call Simulator with cancellation scopes
//! estimate.rs   — Gas Estimator (bisection)
//! error.rs      — ApiError taxonomy and RPC codes
//! backend.rs    — collaborator bundle
//! service.rs    — TransactionApi facade
//! personal.rs   — PersonalApi facade
//! governance.rs — GovernanceApi facade (stock, validators, attachments)
//! ```
//!
//! ## Intent flow
//!
//! ```text
//! SendTxArgs ─▶ [gate] ─▶ lock ─▶ defaults ─▶ build ─▶ sign ─▶ admit ─▶ pool
//! CallArgs   ─▶ simulate ◀── estimate (repeated metered probes)
//! ```

pub mod args;
pub mod auth;
pub mod backend;
pub mod call;
pub mod error;
pub mod estimate;
pub mod governance;
pub mod lock;
pub mod personal;
pub mod service;
pub mod signer;
pub mod submit;

#[cfg(test)]
pub(crate) mod testkit;

pub use args::{CallArgs, Quantity, SendTxArgs};
pub use auth::{authorize, AuthContext, AuthError, GovernedOperation};
pub use backend::{Backend, FixedPriceOracle, PriceOracle};
pub use call::CallResult;
pub use error::{ApiError, BackendError, ErrorKind};
pub use estimate::GasEstimate;
pub use governance::GovernanceApi;
pub use lock::{AddrGuard, AddrLocker};
pub use personal::PersonalApi;
pub use service::{SignedTransaction, TransactionApi, TransactionView};
