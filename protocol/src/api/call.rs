//! Call Simulator.
//!
//! Runs a [`CallArgs`] message against a point-in-time snapshot without
//! committing anything. Each run gets its own cancellation scope:
//!
//! ```text
//! caller token ──child──▶ scope token ──▶ watcher task ──▶ CancelHandle::cancel
//!                                            ▲
//!                            wall-clock timeout (unmetered runs only)
//! ```
//!
//! The VM runs on the blocking pool. When it returns, or when the call
//! future is dropped before that, the scope is cancelled: the watcher exits
//! and stops the VM, so no run outlives its call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::args::CallArgs;
use super::backend::Backend;
use super::error::{ApiError, BackendError};
use crate::storage::BlockNumber;
use crate::vm::{ExecutionOutcome, Message, VmConfig, VmError};

/// What a simulated call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub return_data: Bytes,
    pub gas_used: u64,
    /// The message reverted or ran out of gas. Not a node failure.
    pub failed: bool,
}

impl From<ExecutionOutcome> for CallResult {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            return_data: outcome.return_data,
            gas_used: outcome.gas_used,
            failed: outcome.failed,
        }
    }
}

/// Simulates `args` at `block` with a fresh cancellation scope.
pub async fn call(
    backend: &Backend,
    args: &CallArgs,
    block: BlockNumber,
    config: VmConfig,
) -> Result<CallResult, ApiError> {
    call_with_cancel(backend, args, block, config, &CancellationToken::new()).await
}

/// Simulates `args` at `block`; cancelling `cancel` aborts the run.
pub async fn call_with_cancel(
    backend: &Backend,
    args: &CallArgs,
    block: BlockNumber,
    config: VmConfig,
    cancel: &CancellationToken,
) -> Result<CallResult, ApiError> {
    let (state, header) = backend
        .chain
        .state_at(block)
        .await
        .map_err(|e| ApiError::from(BackendError::from(e)))?
        .ok_or_else(|| ApiError::StateUnavailable(block.to_string()))?;

    // Default identity for read-only callers. The run never commits state.
    let from = if args.from.is_zero() {
        backend
            .accounts
            .accounts()
            .first()
            .copied()
            .unwrap_or(Address::ZERO)
    } else {
        args.from
    };
    let gas = match args.gas {
        Some(gas) if gas > 0 => gas,
        _ => backend.config.call_gas_cap,
    };
    let gas_price = match args.gas_price {
        Some(price) if !price.is_zero() => price,
        _ => backend.config.default_gas_price,
    };

    let msg = Message {
        from,
        to: args.to,
        nonce: state.nonce(&from),
        value: args.value.unwrap_or(U256::ZERO),
        gas,
        gas_price,
        data: args.data.clone(),
        extra: args.extra.clone(),
        origin: Bytes::from(backend.config.origin_tag.clone().into_bytes()),
        category: args.category,
    };

    let mut vm = backend
        .vm
        .create(state, &header, config)
        .map_err(ApiError::Simulation)?;

    let scope = cancel.child_token();
    let _scope_guard = scope.clone().drop_guard();
    let stop = vm.cancel_handle();
    if scope.is_cancelled() {
        stop.cancel();
    }

    let timeout = backend.config.call_timeout();
    let timed_out = Arc::new(AtomicBool::new(false));
    let watcher = tokio::spawn({
        let scope = scope.clone();
        let timed_out = timed_out.clone();
        let stop = stop.clone();
        let metered = config.metering;
        async move {
            tokio::select! {
                _ = scope.cancelled() => {}
                _ = tokio::time::sleep(timeout), if !metered => {
                    timed_out.store(true, Ordering::SeqCst);
                }
            }
            stop.cancel();
        }
    });

    let joined = tokio::task::spawn_blocking(move || {
        let result = vm.apply_message(&msg);
        (result, vm.fatal_error())
    })
    .await;

    scope.cancel();
    let _ = watcher.await;

    let (result, fatal) = joined.map_err(|e| ApiError::Internal(format!("vm task: {e}")))?;
    if let Some(fatal) = fatal {
        debug!(error = %fatal, block = header.number, "call aborted");
        return Err(match fatal {
            VmError::Aborted if timed_out.load(Ordering::SeqCst) => {
                ApiError::ExecutionTimeout(timeout)
            }
            other => ApiError::Simulation(other),
        });
    }

    let outcome = result.map_err(ApiError::Simulation)?;
    debug!(
        block = header.number,
        gas,
        gas_used = outcome.gas_used,
        failed = outcome.failed,
        metered = config.metering,
        "call simulated"
    );
    Ok(outcome.into())
}
