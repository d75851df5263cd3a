//! # Virtual Machine Collaborator
//!
//! The call simulator never executes code itself. It builds a [`Message`],
//! asks a [`VmFactory`] for a [`Vm`] bound to a state snapshot and a block
//! header, and runs the message through it.
//!
//! Execution has two failure channels that must not be confused:
//!
//! - [`ExecutionOutcome::failed`]: the message ran and reverted, ran out of
//!   gas, or hit an invalid instruction. The caller's transaction is at fault.
//! - [`Vm::fatal_error`]: the node could not finish executing (aborted by
//!   cancellation, internal fault). Checked after every run and takes
//!   precedence over the outcome.
//!
//! Cancellation is cooperative: [`CancelHandle::cancel`] raises a flag the
//! interpreter polls between instructions.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs         — Message, ExecutionOutcome, VmConfig, Vm / VmFactory traits
//! interpreter.rs — DevVm, a small metered bytecode interpreter for the devnet
//! ```

pub mod interpreter;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use thiserror::Error;

use crate::storage::{BlockHeader, StateReader};
use crate::transaction::{Category, TxMajor};

pub use interpreter::{DevVm, DevVmFactory};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that stop a message from being executed at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGasTooLow { have: u64, want: u64 },

    #[error("insufficient balance for transfer: balance {balance}, value {value}")]
    InsufficientBalance { balance: U256, value: U256 },

    #[error("execution aborted")]
    Aborted,

    #[error("vm fault: {0}")]
    Fault(String),
}

// ---------------------------------------------------------------------------
// Message / Outcome
// ---------------------------------------------------------------------------

/// An unsigned, never-submitted message built for simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: Address,
    /// `None` runs `data` as init code.
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub gas: u64,
    pub gas_price: U256,
    pub data: Bytes,
    pub extra: Bytes,
    pub origin: Bytes,
    pub category: Category,
}

impl Message {
    pub fn is_create(&self) -> bool {
        self.to.is_none() && self.category.major() == TxMajor::Normal
    }
}

/// Result of running a message to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub return_data: Bytes,
    pub gas_used: u64,
    /// Reverted, out of gas, or invalid instruction.
    pub failed: bool,
}

/// Per-run execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// When `false`, instructions are free and only intrinsic gas is charged.
    /// Read-only calls run unmetered under a wall-clock timeout instead.
    pub metering: bool,
}

impl VmConfig {
    pub const METERED: Self = Self { metering: true };
    pub const UNMETERED: Self = Self { metering: false };
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cloneable stop switch shared between a [`Vm`] and its watcher task.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A single-use execution environment.
pub trait Vm: Send {
    fn apply_message(&mut self, msg: &Message) -> Result<ExecutionOutcome, VmError>;

    fn cancel_handle(&self) -> CancelHandle;

    /// Fatal error raised during the last run, if any.
    fn fatal_error(&self) -> Option<VmError>;
}

/// Builds a [`Vm`] over a state snapshot.
pub trait VmFactory: Send + Sync {
    fn create(
        &self,
        state: Arc<dyn StateReader>,
        header: &BlockHeader,
        config: VmConfig,
    ) -> Result<Box<dyn Vm>, VmError>;
}
