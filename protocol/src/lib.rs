// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Sable Protocol — Transaction Layer
//!
//! Everything between "a client wants something done" and "a signed
//! transaction sits in the pending pool", plus the read-only path that runs
//! a message against chain state without committing it.
//!
//! Sable keeps the familiar account model: secp256k1 keys, keccak hashes,
//! RLP on the wire. What it adds is a closed category matrix: every
//! transaction is tagged with a major/minor pair, and governed categories
//! (equity holdings, validators, base contracts) are checked against live
//! governance state before they are ever built.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants, chain and API configuration.
//! - **crypto** — Keccak, secp256k1 keys, personal messages, key sealing.
//! - **transaction** — Category matrix, the entity, wire codec, signing, validation.
//! - **storage** — Headers, state snapshots, governance records, the devnet chain.
//! - **network** — Pending pool, devnet block producer, JSON-RPC envelopes.
//! - **vault** — Account registry, wallets, the encrypted keystore.
//! - **vm** — Execution collaborator and a small devnet interpreter.
//! - **api** — Locks, builder, gate, signer, admission, simulator, estimator.
//!
//! ## Design Philosophy
//!
//! 1. Collaborators sit behind narrow traits. The devnet implementations are
//!    real, not mocks, and the tests run against them.
//! 2. Errors are named. A caller can always tell "malformed" from "not
//!    allowed" from "the node could not do it".
//! 3. Nonces for one sender are allocated one at a time. Always.
//! 4. A simulation never outlives its caller.

pub mod api;
pub mod config;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod transaction;
pub mod vault;
pub mod vm;
