//! # procsim: Two-Class CPU Scheduler Simulator
//!
//! A discrete-time simulator of a single-CPU operating system that runs
//! small accumulator-machine programs under a two-class scheduling policy.
//!
//! ## Overview
//!
//! Each simulated process is a program for a one-register machine: an
//! accumulator, a program counter, private data memory and a fixed
//! instruction set (`ADD`, `SUB`, `MULT`, `DIV`, `LOAD`, `STORE`, four
//! branches and `SYSCALL`). Time advances in ticks; exactly one instruction
//! of at most one process runs per tick.
//!
//! - **Real-time** processes: Round Robin with a per-process quantum, split
//!   into a high and a low static priority level.
//! - **Best-effort** processes: First-Come-First-Served, preempted whenever
//!   a real-time process becomes ready.
//! - **I/O** syscalls block the caller for a random, seeded number of ticks.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │             CLI (main.rs) · scenario.toml               │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │      Simulator · from_scenario() · run() · RunSummary   │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │  Execution Engine  │  Loader           │
//! │  scheduler.rs│  cpu.rs            │  loader.rs        │
//! │  ─ tick()    │  ─ execute_one()   │  ─ parse_program()│
//! │  ─ halted?   │  ─ Effect          │  ─ load_file()    │
//! ├──────────────┴──────┬─────────────┴───────────────────┤
//! │  Queues (queue.rs)  │  I/O (io.rs) · Snapshot          │
//! │  ready ×3 · blocked │  IoDevice · SystemSnapshot       │
//! ├─────────────────────┴─────────────────────────────────┤
//! │     Process Model (process.rs) · ISA (isa.rs)           │
//! │   PCB · ProcessState · ExitReason · Instruction         │
//! ├────────────────────────────────────────────────────────┤
//! │        config.rs (constants, TOML) · rng.rs             │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership Model
//!
//! - Every [`process::Process`] is owned by exactly one container: the new
//!   pool, one of three ready queues, the blocked pool, the finished pool or
//!   the CPU slot. Transfers are moves.
//! - One [`scheduler::Scheduler`] owns all containers, the clock and the RNG.
//!   It is mutated only by [`scheduler::Scheduler::tick`].
//! - No threads, no `unsafe`. Output and input leave the simulation through
//!   the caller's [`io::IoDevice`].

pub mod config;
pub mod isa;
pub mod process;
pub mod queue;
pub mod rng;
pub mod cpu;
pub mod io;
pub mod scheduler;
pub mod snapshot;
pub mod loader;
pub mod kernel;
