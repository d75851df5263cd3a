//! Devnet bytecode interpreter.
//!
//! Just enough of a machine to exercise the simulator and the gas estimator
//! end to end: metered steps, gas burning, reverts, unbounded loops and
//! return data. Contracts are byte strings of single-byte opcodes, some with
//! a one-byte immediate.
//!
//! | Opcode | Name       | Effect                                              |
//! |--------|------------|-----------------------------------------------------|
//! | `0x00` | `STOP`     | Halt successfully with the output buffer            |
//! | `0x01` | `ECHO`     | Append the call data to the output buffer           |
//! | `0x02` | `REVERT`   | Halt as failed with the output buffer               |
//! | `0x03` | `BURN k`   | Consume `k * 1000` gas                              |
//! | `0x04` | `LOOP`     | Jump back to the first instruction                  |
//! | `0x05` | `PUSH n`   | Append the next `n` code bytes to the output buffer |
//! | `0x06` | `NEED k`   | Revert unless at least `k * 1000` gas remains       |
//!
//! Every instruction costs [`STEP_GAS`] when metering is on. Running past the
//! end of the code is a `STOP`. Creations run `data` as init code and charge
//! [`CREATE_DATA_GAS`] per byte of returned code.
//!
//! Nothing is written back: the snapshot is read-only and value transfers are
//! only checked against the sender's balance.

use std::sync::Arc;

use alloy_primitives::Bytes;
use tracing::trace;

use super::{CancelHandle, ExecutionOutcome, Message, Vm, VmConfig, VmError, VmFactory};
use crate::config::{
    CREATE_DATA_GAS, TX_DATA_NON_ZERO_GAS, TX_DATA_ZERO_GAS, TX_GAS, TX_GAS_CONTRACT_CREATION,
};
use crate::storage::{BlockHeader, StateReader};
use crate::transaction::TxMajor;

pub mod op {
    pub const STOP: u8 = 0x00;
    pub const ECHO: u8 = 0x01;
    pub const REVERT: u8 = 0x02;
    pub const BURN: u8 = 0x03;
    pub const LOOP: u8 = 0x04;
    pub const PUSH: u8 = 0x05;
    pub const NEED: u8 = 0x06;
}

/// Gas per executed instruction.
pub const STEP_GAS: u64 = 3;

/// Gas unit for `BURN` and `NEED` immediates.
pub const GAS_UNIT: u64 = 1_000;

/// Gas charged before any code runs.
pub fn intrinsic_gas(data: &[u8], is_create: bool) -> u64 {
    let base = if is_create {
        TX_GAS_CONTRACT_CREATION
    } else {
        TX_GAS
    };
    let zeros = data.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = data.len() as u64 - zeros;
    base.saturating_add(zeros.saturating_mul(TX_DATA_ZERO_GAS))
        .saturating_add(non_zeros.saturating_mul(TX_DATA_NON_ZERO_GAS))
}

enum Halt {
    Stop(Vec<u8>),
    Revert(Vec<u8>),
    OutOfGas,
    Invalid(u8),
    Aborted,
}

/// Single-use devnet VM over one state snapshot.
pub struct DevVm {
    state: Arc<dyn StateReader>,
    block_number: u64,
    config: VmConfig,
    cancel: CancelHandle,
    fatal: Option<VmError>,
}

impl DevVm {
    pub fn new(state: Arc<dyn StateReader>, header: &BlockHeader, config: VmConfig) -> Self {
        Self {
            state,
            block_number: header.number,
            config,
            cancel: CancelHandle::new(),
            fatal: None,
        }
    }

    fn charge(&self, gas_left: &mut u64, amount: u64) -> bool {
        if !self.config.metering {
            return true;
        }
        match gas_left.checked_sub(amount) {
            Some(rest) => {
                *gas_left = rest;
                true
            }
            None => false,
        }
    }

    fn run(&self, code: &[u8], msg: &Message, gas_left: &mut u64) -> Halt {
        let mut pc = 0usize;
        let mut out = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                return Halt::Aborted;
            }
            let Some(&opcode) = code.get(pc) else {
                return Halt::Stop(out);
            };
            if !self.charge(gas_left, STEP_GAS) {
                return Halt::OutOfGas;
            }
            pc += 1;

            match opcode {
                op::STOP => return Halt::Stop(out),
                op::ECHO => out.extend_from_slice(&msg.data),
                op::REVERT => return Halt::Revert(out),
                op::BURN => {
                    let Some(&k) = code.get(pc) else {
                        return Halt::Invalid(opcode);
                    };
                    pc += 1;
                    if !self.charge(gas_left, u64::from(k) * GAS_UNIT) {
                        return Halt::OutOfGas;
                    }
                }
                op::LOOP => pc = 0,
                op::PUSH => {
                    let Some(&n) = code.get(pc) else {
                        return Halt::Invalid(opcode);
                    };
                    let start = pc + 1;
                    let end = start + usize::from(n);
                    let Some(bytes) = code.get(start..end) else {
                        return Halt::Invalid(opcode);
                    };
                    out.extend_from_slice(bytes);
                    pc = end;
                }
                op::NEED => {
                    let Some(&k) = code.get(pc) else {
                        return Halt::Invalid(opcode);
                    };
                    pc += 1;
                    if *gas_left < u64::from(k) * GAS_UNIT {
                        return Halt::Revert(out);
                    }
                }
                other => return Halt::Invalid(other),
            }
        }
    }
}

impl Vm for DevVm {
    fn apply_message(&mut self, msg: &Message) -> Result<ExecutionOutcome, VmError> {
        self.fatal = None;

        let is_create = msg.is_create();
        let intrinsic = intrinsic_gas(&msg.data, is_create);
        if msg.gas < intrinsic {
            return Err(VmError::IntrinsicGasTooLow {
                have: msg.gas,
                want: intrinsic,
            });
        }

        let balance = self.state.balance(&msg.from);
        if balance < msg.value {
            return Err(VmError::InsufficientBalance {
                balance,
                value: msg.value,
            });
        }

        let code = match msg.to {
            Some(to) if msg.category.major() == TxMajor::Normal => self.state.code(&to),
            None if is_create => msg.data.clone(),
            _ => Bytes::new(),
        };
        if code.is_empty() {
            return Ok(ExecutionOutcome {
                return_data: Bytes::new(),
                gas_used: intrinsic,
                failed: false,
            });
        }

        let mut gas_left = msg.gas - intrinsic;
        let halt = self.run(&code, msg, &mut gas_left);

        let outcome = match halt {
            Halt::Stop(output) => {
                let deposit = if is_create {
                    output.len() as u64 * CREATE_DATA_GAS
                } else {
                    0
                };
                if self.charge(&mut gas_left, deposit) {
                    ExecutionOutcome {
                        return_data: output.into(),
                        gas_used: msg.gas - gas_left,
                        failed: false,
                    }
                } else {
                    ExecutionOutcome {
                        return_data: Bytes::new(),
                        gas_used: msg.gas,
                        failed: true,
                    }
                }
            }
            Halt::Revert(output) => ExecutionOutcome {
                return_data: output.into(),
                gas_used: msg.gas - gas_left,
                failed: true,
            },
            Halt::OutOfGas => ExecutionOutcome {
                return_data: Bytes::new(),
                gas_used: msg.gas,
                failed: true,
            },
            Halt::Invalid(opcode) => {
                trace!(opcode, "invalid opcode");
                ExecutionOutcome {
                    return_data: Bytes::new(),
                    gas_used: msg.gas,
                    failed: true,
                }
            }
            Halt::Aborted => {
                self.fatal = Some(VmError::Aborted);
                ExecutionOutcome {
                    return_data: Bytes::new(),
                    gas_used: msg.gas - gas_left,
                    failed: true,
                }
            }
        };

        trace!(
            block = self.block_number,
            gas = msg.gas,
            gas_used = outcome.gas_used,
            failed = outcome.failed,
            "message applied"
        );
        Ok(outcome)
    }

    fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn fatal_error(&self) -> Option<VmError> {
        self.fatal.clone()
    }
}

/// Hands out [`DevVm`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevVmFactory;

impl VmFactory for DevVmFactory {
    fn create(
        &self,
        state: Arc<dyn StateReader>,
        header: &BlockHeader,
        config: VmConfig,
    ) -> Result<Box<dyn Vm>, VmError> {
        Ok(Box::new(DevVm::new(state, header, config)))
    }
}
