//! # Process Control Block
//!
//! Defines the process model for procsim. Each process owns its code, its
//! private data memory, its registers (program counter and accumulator) and
//! its scheduling attributes.
//!
//! ## Scheduling Classes
//!
//! - **Real-time** processes are served Round Robin with a per-process
//!   quantum, in two static priority levels (`High` strictly before `Low`).
//! - **Best-effort** processes are served First-Come-First-Served and are
//!   preempted whenever a real-time process becomes ready.
//!
//! A process record stores state only. Every mutation is performed by the
//! execution engine ([`crate::cpu`]) or the scheduler ([`crate::scheduler`]),
//! and no operation on this type can fail.

use core::fmt;

use serde::Deserialize;

use crate::isa::Instruction;
use crate::queue::QueueId;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Process identifier. Assigned monotonically at load time, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Process state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a process.
///
/// ```text
///   ┌─────┐  arrival   ┌───────┐  dispatch   ┌─────────┐
///   │ New │ ─────────► │ Ready │ ──────────► │ Running │
///   └─────┘            └───────┘             └─────────┘
///                        ▲   ▲                 │  │  │
///                        │   │ quantum expiry  │  │  │ SYSCALL 0 / fault
///                        │   │ or preemption   │  │  ▼
///                        │   └─────────────────┘  │ ┌──────────┐
///                        │                        │ │ Finished │
///                        │   timer reaches 0      │ └──────────┘
///                        │                        ▼ SYSCALL 1 / 2
///                        │                  ┌─────────┐
///                        └───────────────── │ Blocked │
///                                           └─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Loaded, waiting for its arrival time.
    New,
    /// Waiting in one of the three ready queues.
    Ready,
    /// Occupying the CPU.
    Running,
    /// Waiting for simulated I/O to complete.
    Blocked,
    /// Terminated voluntarily or by a fault. Terminal.
    Finished,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::New => "new",
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked => "blocked",
            ProcessState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Why a process reached [`ProcessState::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `SYSCALL 0`.
    Terminated,
    /// `DIV` with a zero operand.
    DivideByZero,
    /// The instruction decoded to `INVALID`.
    InvalidOpcode,
    /// The program counter ran past the last instruction.
    PcOutOfBounds,
}

impl ExitReason {
    /// True for the program-fault reasons.
    pub const fn is_fault(self) -> bool {
        !matches!(self, ExitReason::Terminated)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Terminated => "exit",
            ExitReason::DivideByZero => "division by zero",
            ExitReason::InvalidOpcode => "invalid instruction",
            ExitReason::PcOutOfBounds => "program counter out of bounds",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Scheduling attributes
// ---------------------------------------------------------------------------

/// Static priority level of a real-time process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High = 0,
    Low = 1,
}

/// Scheduling class, derived from the real-time flag and priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedClass {
    RealTime(Priority),
    BestEffort,
}

impl fmt::Display for SchedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedClass::RealTime(Priority::High) => f.write_str("RT-high"),
            SchedClass::RealTime(Priority::Low) => f.write_str("RT-low"),
            SchedClass::BestEffort => f.write_str("BE"),
        }
    }
}

/// Scheduling parameters declared for a process at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessConfig {
    pub real_time: bool,

    /// Ignored for best-effort processes.
    pub priority: Priority,

    /// Instructions a real-time process may run consecutively before it is
    /// requeued. A quantum of 0 still lets the process run one instruction
    /// per dispatch.
    pub quantum: u32,

    /// First tick at which the process may be admitted.
    pub arrival: u64,
}

impl ProcessConfig {
    pub const fn real_time(priority: Priority, quantum: u32, arrival: u64) -> Self {
        Self {
            real_time: true,
            priority,
            quantum,
            arrival,
        }
    }

    pub const fn best_effort(arrival: u64) -> Self {
        Self {
            real_time: false,
            priority: Priority::Low,
            quantum: 0,
            arrival,
        }
    }

    pub const fn class(&self) -> SchedClass {
        if self.real_time {
            SchedClass::RealTime(self.priority)
        } else {
            SchedClass::BestEffort
        }
    }
}

// ---------------------------------------------------------------------------
// Accounting
// ---------------------------------------------------------------------------

/// Per-process accounting updated by the scheduler every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    /// Instructions executed (ticks spent on the CPU).
    pub cpu_ticks: u64,

    /// Ticks spent in a ready queue.
    pub wait_ticks: u64,

    /// Times the process was moved into the running slot.
    pub dispatches: u32,

    /// Times the process was preempted by a real-time arrival.
    pub preemptions: u32,

    /// Times a real-time process was requeued because its quantum ran out.
    pub quantum_expiries: u32,

    /// Output/input syscalls performed.
    pub io_blocks: u32,

    /// Tick of admission into a ready queue.
    pub admitted_at: Option<u64>,

    /// Tick in which the process executed its final instruction.
    pub finished_at: Option<u64>,
}

impl ProcessStats {
    /// Ticks from admission to retirement, if both happened.
    pub fn turnaround(&self) -> Option<u64> {
        match (self.admitted_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Program image
// ---------------------------------------------------------------------------

/// A loaded, fully resolved program: code plus initial data memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub data: Vec<i32>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>, data: Vec<i32>) -> Self {
        Self { instructions, data }
    }
}

// ---------------------------------------------------------------------------
// Process Control Block
// ---------------------------------------------------------------------------

/// Process Control Block (PCB): everything needed to schedule and execute
/// one process.
///
/// A `Process` value lives in exactly one container at a time (the new pool,
/// a ready queue, the blocked pool, the finished pool or the running slot).
/// Moving it between containers is a Rust move, so it can never be in two
/// places at once.
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,

    /// Index of the next instruction.
    pub pc: usize,

    /// The single general-purpose register.
    pub acc: i32,

    pub config: ProcessConfig,

    /// Instructions left in the current quantum. Goes negative only for a
    /// quantum-0 process between its single instruction and its requeue.
    pub quantum_remaining: i64,

    /// Ticks until a blocked process becomes ready again.
    pub blocked_ticks_remaining: u32,

    /// Read-only after load.
    pub code: Vec<Instruction>,

    /// Private data memory, indexed by resolved variable index.
    pub memory: Vec<i32>,

    pub exit_reason: Option<ExitReason>,
    pub stats: ProcessStats,
}

impl Process {
    /// Create a process in state `New` from a loaded program.
    pub fn new(pid: Pid, name: impl Into<String>, program: Program, config: ProcessConfig) -> Self {
        Self {
            pid,
            name: name.into(),
            state: ProcessState::New,
            pc: 0,
            acc: 0,
            config,
            quantum_remaining: i64::from(config.quantum),
            blocked_ticks_remaining: 0,
            code: program.instructions,
            memory: program.data,
            exit_reason: None,
            stats: ProcessStats::default(),
        }
    }

    #[inline]
    pub const fn is_real_time(&self) -> bool {
        self.config.real_time
    }

    #[inline]
    pub const fn class(&self) -> SchedClass {
        self.config.class()
    }

    /// The ready queue this process returns to whenever it becomes ready.
    pub const fn home_queue(&self) -> QueueId {
        match self.class() {
            SchedClass::RealTime(Priority::High) => QueueId::ReadyRtHigh,
            SchedClass::RealTime(Priority::Low) => QueueId::ReadyRtLow,
            SchedClass::BestEffort => QueueId::ReadyBestEffort,
        }
    }

    /// Restore a full quantum. Called on every transition into `Running`
    /// and on quantum-expiry requeue.
    #[inline]
    pub fn reset_quantum(&mut self) {
        self.quantum_remaining = i64::from(self.config.quantum);
    }

    /// True once a real-time process has used up its quantum.
    #[inline]
    pub fn quantum_exhausted(&self) -> bool {
        self.is_real_time() && self.quantum_remaining <= 0
    }

    /// Mark the process finished for the given reason.
    pub fn finish(&mut self, reason: ExitReason) {
        self.state = ProcessState::Finished;
        self.exit_reason = Some(reason);
    }

    /// Mark the process blocked for `ticks` ticks.
    pub fn block(&mut self, ticks: u32) {
        self.state = ProcessState::Blocked;
        self.blocked_ticks_remaining = ticks;
        self.stats.io_blocks += 1;
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == ProcessState::Finished
    }

    /// The instruction at the program counter, if it is in bounds.
    #[inline]
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.code.get(self.pc)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Instruction;

    fn make_process(config: ProcessConfig) -> Process {
        let program = Program::new(vec![Instruction::syscall(0)], vec![7, 8]);
        Process::new(Pid(3), "p3", program, config)
    }

    #[test]
    fn test_process_initialization() {
        let p = make_process(ProcessConfig::real_time(Priority::High, 4, 2));

        assert_eq!(p.pid, Pid(3));
        assert_eq!(p.name, "p3");
        assert_eq!(p.state, ProcessState::New);
        assert_eq!(p.pc, 0);
        assert_eq!(p.acc, 0);
        assert_eq!(p.quantum_remaining, 4);
        assert_eq!(p.memory, vec![7, 8]);
        assert_eq!(p.code.len(), 1);
        assert!(p.exit_reason.is_none());
        assert_eq!(p.stats, ProcessStats::default());
    }

    #[test]
    fn test_home_queue_follows_class() {
        let high = make_process(ProcessConfig::real_time(Priority::High, 1, 0));
        let low = make_process(ProcessConfig::real_time(Priority::Low, 1, 0));
        let be = make_process(ProcessConfig::best_effort(0));

        assert_eq!(high.home_queue(), QueueId::ReadyRtHigh);
        assert_eq!(low.home_queue(), QueueId::ReadyRtLow);
        assert_eq!(be.home_queue(), QueueId::ReadyBestEffort);
        assert_eq!(be.class(), SchedClass::BestEffort);
    }

    #[test]
    fn test_quantum_exhaustion_only_for_real_time() {
        let mut rt = make_process(ProcessConfig::real_time(Priority::Low, 2, 0));
        rt.quantum_remaining = 0;
        assert!(rt.quantum_exhausted());
        rt.reset_quantum();
        assert_eq!(rt.quantum_remaining, 2);
        assert!(!rt.quantum_exhausted());

        let mut be = make_process(ProcessConfig::best_effort(0));
        be.quantum_remaining = -5;
        assert!(!be.quantum_exhausted());
    }

    #[test]
    fn test_finish_and_block() {
        let mut p = make_process(ProcessConfig::best_effort(0));
        p.block(4);
        assert_eq!(p.state, ProcessState::Blocked);
        assert_eq!(p.blocked_ticks_remaining, 4);
        assert_eq!(p.stats.io_blocks, 1);

        p.finish(ExitReason::DivideByZero);
        assert!(p.is_finished());
        assert_eq!(p.exit_reason, Some(ExitReason::DivideByZero));
        assert!(ExitReason::DivideByZero.is_fault());
        assert!(!ExitReason::Terminated.is_fault());
    }

    #[test]
    fn test_turnaround() {
        let mut stats = ProcessStats::default();
        assert_eq!(stats.turnaround(), None);
        stats.admitted_at = Some(3);
        stats.finished_at = Some(11);
        assert_eq!(stats.turnaround(), Some(8));
    }
}
