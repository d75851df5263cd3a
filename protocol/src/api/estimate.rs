//! Gas Estimator.
//!
//! Bisects `[lo, hi]` for the smallest allowance at which a metered call
//! against pending state neither errors nor fails:
//!
//! ```text
//! lo = TX_GAS - 1                       (never executable)
//! hi = caller gas if >= TX_GAS, else the pending block gas limit
//! while lo + 1 < hi: mid executable ? hi = mid : lo = mid
//! ```
//!
//! Every probe runs under the caller's cancellation token. Once it is
//! cancelled the estimate fails with `Simulation(Aborted)`; an aborted
//! probe never counts as "not executable".
//!
//! Bisection assumes executability is monotone in gas. That is not checked;
//! a VM with refund-style semantics can make the result non-minimal.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::args::CallArgs;
use super::backend::Backend;
use super::call::call_with_cancel;
use super::error::ApiError;
use crate::config::TX_GAS;
use crate::storage::BlockNumber;
use crate::vm::{VmConfig, VmError};

/// An estimate and the number of simulator probes it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    pub gas: u64,
    pub probes: u32,
}

pub async fn estimate_gas(backend: &Backend, args: &CallArgs) -> Result<GasEstimate, ApiError> {
    estimate_gas_with_cancel(backend, args, &CancellationToken::new()).await
}

/// Like [`estimate_gas`]; cancelling `cancel` aborts the search.
pub async fn estimate_gas_with_cancel(
    backend: &Backend,
    args: &CallArgs,
    cancel: &CancellationToken,
) -> Result<GasEstimate, ApiError> {
    let mut lo = TX_GAS - 1;
    let mut hi = match args.gas {
        Some(gas) if gas >= TX_GAS => gas,
        _ => backend
            .chain
            .header_by_number(BlockNumber::Pending)
            .await
            .map_err(|e| ApiError::StateUnavailable(e.to_string()))?
            .ok_or_else(|| ApiError::StateUnavailable(BlockNumber::Pending.to_string()))?
            .gas_limit,
    };
    let cap = hi;

    let mut probe = args.clone();
    let mut probes = 0u32;

    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        probes += 1;
        if executable(backend, &mut probe, mid, cancel).await? {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    if hi == cap {
        probes += 1;
        if !executable(backend, &mut probe, hi, cancel).await? {
            debug!(cap, probes, "estimation never succeeded");
            return Err(ApiError::GasRequiredExceedsAllowance { cap });
        }
    }

    debug!(gas = hi, probes, "gas estimated");
    Ok(GasEstimate { gas: hi, probes })
}

/// Runs one metered probe at `gas`. Execution failures count as "not
/// executable"; anything else (missing state, internal faults, caller
/// cancellation) aborts the search.
async fn executable(
    backend: &Backend,
    probe: &mut CallArgs,
    gas: u64,
    cancel: &CancellationToken,
) -> Result<bool, ApiError> {
    if cancel.is_cancelled() {
        return Err(ApiError::Simulation(VmError::Aborted));
    }
    probe.gas = Some(gas);
    let outcome =
        call_with_cancel(backend, probe, BlockNumber::Pending, VmConfig::METERED, cancel).await;
    if cancel.is_cancelled() {
        return Err(ApiError::Simulation(VmError::Aborted));
    }
    match outcome {
        Ok(result) => Ok(!result.failed),
        Err(ApiError::Simulation(_)) | Err(ApiError::ExecutionTimeout(_)) => Ok(false),
        Err(other) => Err(other),
    }
}
