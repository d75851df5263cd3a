//! # Transaction Module
//!
//! Classification, construction, encoding, signing and structural
//! verification of Sable transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — Category matrix (TxMajor × TxMinor) and recipient policy
//! builder.rs      — Transaction entity, hashes, fluent TransactionBuilder
//! codec.rs        — RLP wire encoding and decoding
//! signing.rs      — (v, r, s) handling, sender recovery, contract addresses
//! verification.rs — Structural checks run by the admission pipeline
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: the API layer fills defaults and calls [`TransactionBuilder`].
//! 2. **Sign**: a wallet signs [`Transaction::signing_hash`].
//! 3. **Verify**: admission runs [`verify_transaction`], which also recovers
//!    the sender.
//! 4. **Stamp**: the origin tag is set, the only post-signing mutation.
//! 5. **Pool**: the transaction waits for inclusion or eviction.

pub mod builder;
pub mod codec;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{Transaction, TransactionBuilder, TxSignature};
pub use signing::{contract_address, recover_sender, sign_transaction};
pub use types::{Category, RecipientPolicy, TxMajor, TxMinor};
pub use verification::{verify_transaction, TransactionError};
