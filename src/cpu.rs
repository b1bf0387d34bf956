//! # Execution Engine
//!
//! Fetches and executes exactly one instruction of the running process.
//!
//! ## Instruction Cycle
//!
//! 1. **Bounds check**: a program counter past the last instruction
//!    finishes the process (`PcOutOfBounds`).
//! 2. **Operand fetch**: `Immediate` yields the literal, `Direct` reads the
//!    process's data memory. Label and syscall operands are structural and
//!    are not read as values.
//! 3. **Increment**: the program counter advances *before* the opcode is
//!    applied, so branches simply overwrite it.
//! 4. **Execute**: arithmetic is wrapping `i32`; faults finish the process
//!    instead of aborting the simulator.
//!
//! The engine performs no I/O. `SYSCALL 1` and `SYSCALL 2` block the process
//! and return an [`Effect`] that the scheduler hands to its
//! [`crate::io::IoDevice`].

use log::{debug, warn};

use crate::isa::{syscall, Instruction, OperandKind, Opcode};
use crate::process::{ExitReason, Process, ProcessState};
use crate::rng::SimRng;

/// Side effect requested by an instruction, to be carried out by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// `SYSCALL 1`: emit this accumulator value.
    Output(i32),
    /// `SYSCALL 2`: an integer must be stored into the accumulator.
    InputRequest,
}

/// The simulated CPU: the instruction interpreter plus the latency source
/// for blocking syscalls.
#[derive(Debug, Clone)]
pub struct Cpu {
    rng: SimRng,
    block_min: u32,
    block_max: u32,
}

impl Cpu {
    /// `block_min..=block_max` is the range of the I/O blocking delay.
    pub(crate) fn new(seed: u64, block_min: u32, block_max: u32) -> Self {
        debug_assert!(block_min >= 1 && block_min <= block_max);
        Self {
            rng: SimRng::new(seed),
            block_min,
            block_max,
        }
    }

    /// Execute one instruction of `process`, which must be `Running`.
    ///
    /// Mutates the program counter, the accumulator and data memory, and may
    /// move the process to `Blocked` or `Finished`.
    pub fn execute_one(&mut self, process: &mut Process) -> Option<Effect> {
        debug_assert_eq!(process.state, ProcessState::Running);
        if process.state != ProcessState::Running {
            return None;
        }

        let Some(&instr) = process.current_instruction() else {
            warn!(
                "{}: program counter {} out of bounds ({} instructions), finishing",
                process.pid,
                process.pc,
                process.code.len()
            );
            process.finish(ExitReason::PcOutOfBounds);
            return None;
        };

        debug!(
            "{} pc={} acc={} | {}",
            process.pid, process.pc, process.acc, instr
        );

        let operand = operand_value(process, &instr);
        process.pc += 1;

        match instr.opcode {
            Opcode::Add => process.acc = process.acc.wrapping_add(operand),
            Opcode::Sub => process.acc = process.acc.wrapping_sub(operand),
            Opcode::Mult => process.acc = process.acc.wrapping_mul(operand),
            Opcode::Div => {
                if operand == 0 {
                    warn!("{}: division by zero, finishing", process.pid);
                    process.finish(ExitReason::DivideByZero);
                } else {
                    process.acc = process.acc.wrapping_div(operand);
                }
            }
            Opcode::Load => process.acc = operand,
            Opcode::Store => store(process, &instr),
            Opcode::BranchAlways => jump(process, &instr),
            Opcode::BranchPos => {
                if process.acc > 0 {
                    jump(process, &instr);
                }
            }
            Opcode::BranchZero => {
                if process.acc == 0 {
                    jump(process, &instr);
                }
            }
            Opcode::BranchNeg => {
                if process.acc < 0 {
                    jump(process, &instr);
                }
            }
            Opcode::Syscall => return self.syscall(process, instr.value),
            Opcode::Invalid => {
                warn!("{}: invalid instruction at {}, finishing", process.pid, process.pc - 1);
                process.finish(ExitReason::InvalidOpcode);
            }
        }

        None
    }

    fn syscall(&mut self, process: &mut Process, code: i32) -> Option<Effect> {
        match code {
            syscall::EXIT => {
                process.finish(ExitReason::Terminated);
                None
            }
            syscall::WRITE => {
                let delay = self.block_delay();
                process.block(delay);
                Some(Effect::Output(process.acc))
            }
            syscall::READ => {
                let delay = self.block_delay();
                process.block(delay);
                Some(Effect::InputRequest)
            }
            other => {
                warn!("{}: unknown syscall {} ignored", process.pid, other);
                None
            }
        }
    }

    fn block_delay(&mut self) -> u32 {
        self.rng.range_inclusive(self.block_min, self.block_max)
    }
}

fn operand_value(process: &Process, instr: &Instruction) -> i32 {
    match instr.kind {
        OperandKind::Immediate => instr.value,
        OperandKind::Direct => usize::try_from(instr.value)
            .ok()
            .and_then(|i| process.memory.get(i).copied())
            .unwrap_or_else(|| {
                warn!("{}: read from unmapped data index {}", process.pid, instr.value);
                0
            }),
        OperandKind::Label | OperandKind::Syscall => 0,
    }
}

fn store(process: &mut Process, instr: &Instruction) {
    let acc = process.acc;
    let slot = usize::try_from(instr.value)
        .ok()
        .and_then(|i| process.memory.get_mut(i));
    match slot {
        Some(cell) => *cell = acc,
        None => warn!("{}: store to unmapped data index {} ignored", process.pid, instr.value),
    }
}

/// A negative target becomes an out-of-bounds pc and faults on the next
/// fetch.
fn jump(process: &mut Process, instr: &Instruction) {
    process.pc = usize::try_from(instr.value).unwrap_or(usize::MAX);
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
