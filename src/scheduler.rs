//! # Scheduler
//!
//! The discrete-time core of procsim: a two-class scheduler driving the
//! execution engine one instruction per tick.
//!
//! ## Scheduling Policy
//!
//! - **Real-time** processes: Round Robin with a per-process quantum, in two
//!   static priority levels. RT-high strictly dominates RT-low.
//! - **Best-effort** processes: First-Come-First-Served, run to completion
//!   or blocking, but preempted as soon as any real-time process is ready.
//!   Real-time processes are never preempted mid-quantum.
//!
//! ## Tick Algorithm
//!
//! Every call to [`Scheduler::tick`] performs, strictly in this order:
//! 1. **Admission**: new processes whose arrival time has come move to
//!    their ready queue.
//! 2. **Unblocking**: blocked timers count down; expired ones become ready.
//! 3. **Preemption**: a running best-effort process yields to any ready
//!    real-time process (back to the best-effort tail, quantum untouched).
//! 4. **Retire / requeue**: the previously running process moves to the
//!    finished or blocked pool, or (real-time, quantum used up) back to the
//!    tail of its ready queue. Otherwise it keeps the CPU.
//! 5. **Dispatch**: an idle CPU takes the head of RT-high, else RT-low, else
//!    best-effort. The quantum is reset.
//! 6. **Execute**: one instruction; a real-time process then loses one unit
//!    of quantum.
//! 7. **Advance** the clock.
//!
//! The simulation is halted once the new pool, the ready queues, the blocked
//! pool and the running slot are all empty. Halting is permanent.

use core::fmt;

use log::{debug, error, info};

use crate::config::{ConfigError, SimConfig};
use crate::cpu::{Cpu, Effect};
use crate::io::IoDevice;
use crate::process::{ExitReason, Pid, Process, ProcessConfig, ProcessState, Program};
use crate::queue::{QueueId, QueueSet};
use crate::snapshot::SystemSnapshot;

// ---------------------------------------------------------------------------
// Tick reports
// ---------------------------------------------------------------------------

/// Something that happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    Admitted(Pid),
    Unblocked(Pid),
    Preempted(Pid),
    QuantumExpired(Pid),
    Retired { pid: Pid, reason: ExitReason },
    BlockedOnIo { pid: Pid, ticks: u32 },
    Dispatched(Pid),
    Output { pid: Pid, value: i32 },
    Input { pid: Pid, value: i32 },
}

impl fmt::Display for TickEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TickEvent::Admitted(pid) => write!(f, "{pid} admitted"),
            TickEvent::Unblocked(pid) => write!(f, "{pid} unblocked"),
            TickEvent::Preempted(pid) => write!(f, "{pid} (best-effort) preempted by real-time"),
            TickEvent::QuantumExpired(pid) => write!(f, "{pid} quantum expired"),
            TickEvent::Retired { pid, reason } => write!(f, "{pid} finished ({reason})"),
            TickEvent::BlockedOnIo { pid, ticks } => write!(f, "{pid} blocked on I/O for {ticks} ticks"),
            TickEvent::Dispatched(pid) => write!(f, "{pid} dispatched"),
            TickEvent::Output { pid, value } => write!(f, "{pid} output {value}"),
            TickEvent::Input { pid, value } => write!(f, "{pid} input {value}"),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Clock value at which the tick ran.
    pub tick: u64,

    /// Process moved into the running slot this tick.
    pub dispatched: Option<Pid>,

    /// Process that executed an instruction; `None` if the CPU was idle.
    pub executed: Option<Pid>,

    /// Best-effort process preempted this tick.
    pub preempted: Option<Pid>,

    pub events: Vec<TickEvent>,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    fn push(&mut self, event: TickEvent) {
        match event {
            TickEvent::Output { .. } | TickEvent::Input { .. } | TickEvent::Dispatched(_) => {
                debug!("[t={}] {}", self.tick, event)
            }
            _ => info!("[t={}] {}", self.tick, event),
        }
        self.events.push(event);
    }
}

/// The container holding a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Cpu,
    Queue(QueueId),
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The whole simulation state: every container, the running slot, the CPU
/// and the clock. Constructed once, mutated only by [`Scheduler::tick`].
#[derive(Debug)]
pub struct Scheduler {
    queues: QueueSet,

    /// The single CPU slot.
    running: Option<Process>,

    cpu: Cpu,

    /// Global simulated time, in ticks.
    clock: u64,

    next_pid: u32,
}

impl Scheduler {
    /// # Returns
    /// - `Err(ConfigError::BlockRange)` unless
    ///   `1 <= block_ticks_min <= block_ticks_max`.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            queues: QueueSet::new(),
            running: None,
            cpu: Cpu::new(config.seed, config.block_ticks_min, config.block_ticks_max),
            clock: 0,
            next_pid: 0,
        })
    }

    /// Register a loaded program as a new process in the `New` pool.
    ///
    /// # Returns
    /// The process's pid. Pids are assigned in load order starting at 0.
    pub fn spawn(&mut self, name: impl Into<String>, program: Program, config: ProcessConfig) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        let process = Process::new(pid, name, program, config);
        info!(
            "{pid} loaded: \"{}\" {} arrival={} quantum={} ({} instructions, {} variables)",
            process.name,
            process.class(),
            config.arrival,
            config.quantum,
            process.code.len(),
            process.memory.len()
        );
        self.queues.enqueue(QueueId::New, process);
        pid
    }

    /// Advance the simulation by one tick.
    ///
    /// `io` receives the output and input requests of the instruction
    /// executed during this tick.
    pub fn tick(&mut self, io: &mut dyn IoDevice) -> TickReport {
        let mut report = TickReport::new(self.clock);

        self.admit_arrivals(&mut report);
        self.unblock_expired(&mut report);
        if !self.preempt_best_effort(&mut report) {
            self.retire_running(&mut report);
        }
        if self.running.is_none() {
            self.dispatch(&mut report);
        }
        self.execute(io, &mut report);
        self.account_waiting();

        self.clock += 1;
        report
    }

    /// True once nothing is left to run: no new, ready, blocked or running
    /// process. Finished processes do not count.
    pub fn is_halted(&self) -> bool {
        self.running.is_none() && self.queues.all_idle()
    }

    // -- tick steps ---------------------------------------------------------

    fn admit_arrivals(&mut self, report: &mut TickReport) {
        let now = self.clock;
        let arrived = self.queues.pids_where(QueueId::New, |p| p.config.arrival <= now);
        for pid in arrived {
            if let Some(mut process) = self.take(QueueId::New, pid) {
                process.stats.admitted_at = Some(now);
                self.make_ready(process);
                report.push(TickEvent::Admitted(pid));
            }
        }
    }

    fn unblock_expired(&mut self, report: &mut TickReport) {
        for process in self.queues.iter_mut(QueueId::Blocked) {
            process.blocked_ticks_remaining = process.blocked_ticks_remaining.saturating_sub(1);
        }
        let expired = self
            .queues
            .pids_where(QueueId::Blocked, |p| p.blocked_ticks_remaining == 0);
        for pid in expired {
            if let Some(process) = self.take(QueueId::Blocked, pid) {
                self.make_ready(process);
                report.push(TickEvent::Unblocked(pid));
            }
        }
    }

    /// Returns true if the running process was preempted.
    fn preempt_best_effort(&mut self, report: &mut TickReport) -> bool {
        let must_yield = matches!(
            &self.running,
            Some(p) if p.state == ProcessState::Running && !p.is_real_time()
        ) && self.queues.real_time_ready();

        if !must_yield {
            return false;
        }
        let Some(mut process) = self.running.take() else {
            return false;
        };
        let pid = process.pid;
        process.stats.preemptions += 1;
        self.make_ready(process);
        report.preempted = Some(pid);
        report.push(TickEvent::Preempted(pid));
        true
    }

    fn retire_running(&mut self, report: &mut TickReport) {
        let Some(mut process) = self.running.take() else {
            return;
        };
        let pid = process.pid;
        let state = process.state;

        match state {
            ProcessState::Finished => {
                let reason = process.exit_reason.unwrap_or(ExitReason::Terminated);
                self.queues.enqueue(QueueId::Finished, process);
                report.push(TickEvent::Retired { pid, reason });
            }
            ProcessState::Blocked => {
                let ticks = process.blocked_ticks_remaining;
                self.queues.enqueue(QueueId::Blocked, process);
                report.push(TickEvent::BlockedOnIo { pid, ticks });
            }
            _ if process.quantum_exhausted() => {
                process.reset_quantum();
                process.stats.quantum_expiries += 1;
                self.make_ready(process);
                report.push(TickEvent::QuantumExpired(pid));
            }
            _ => self.running = Some(process),
        }
    }

    fn dispatch(&mut self, report: &mut TickReport) {
        let Some(queue) = QueueId::READY.into_iter().find(|&q| !self.queues.is_empty(q)) else {
            return;
        };
        let mut process = match self.queues.dequeue(queue) {
            Ok(p) => p,
            Err(e) => {
                error!("dispatch: {e}");
                return;
            }
        };
        process.state = ProcessState::Running;
        process.reset_quantum();
        process.stats.dispatches += 1;

        report.dispatched = Some(process.pid);
        report.push(TickEvent::Dispatched(process.pid));
        self.running = Some(process);
    }

    fn execute(&mut self, io: &mut dyn IoDevice, report: &mut TickReport) {
        let now = self.clock;
        let Some(process) = self.running.as_mut() else {
            debug!("[t={now}] CPU idle");
            return;
        };
        let pid = process.pid;

        let effect = self.cpu.execute_one(process);
        process.stats.cpu_ticks += 1;
        if process.is_real_time() {
            process.quantum_remaining -= 1;
        }
        report.executed = Some(pid);

        match effect {
            Some(Effect::Output(value)) => {
                io.output(pid, value);
                report.push(TickEvent::Output { pid, value });
            }
            Some(Effect::InputRequest) => {
                let value = io.input(pid);
                process.acc = value;
                report.push(TickEvent::Input { pid, value });
            }
            None => {}
        }

        if process.is_finished() {
            process.stats.finished_at = Some(now);
        }
    }

    fn account_waiting(&mut self) {
        for queue in QueueId::READY {
            for process in self.queues.iter_mut(queue) {
                process.stats.wait_ticks += 1;
            }
        }
    }

    // -- helpers ------------------------------------------------------------

    fn make_ready(&mut self, mut process: Process) {
        process.state = ProcessState::Ready;
        let home = process.home_queue();
        self.queues.enqueue(home, process);
    }

    /// Remove a pid that was just observed in `queue`.
    fn take(&mut self, queue: QueueId, pid: Pid) -> Option<Process> {
        match self.queues.remove_by_pid(queue, pid) {
            Ok(process) => Some(process),
            Err(e) => {
                error!("{e}");
                None
            }
        }
    }

    // -- inspection ---------------------------------------------------------

    /// Current simulated time: the number of ticks run so far.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn running(&self) -> Option<&Process> {
        self.running.as_ref()
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    /// Number of processes ever spawned.
    pub fn process_count(&self) -> usize {
        self.next_pid as usize
    }

    /// Every process, wherever it currently lives.
    pub fn processes(&self) -> impl Iterator<Item = &Process> + '_ {
        self.running
            .iter()
            .chain(QueueId::ALL.into_iter().flat_map(move |q| self.queues.iter(q)))
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes().find(|p| p.pid == pid)
    }

    /// Where `pid` currently lives.
    pub fn location(&self, pid: Pid) -> Option<Location> {
        if self.running.as_ref().is_some_and(|p| p.pid == pid) {
            return Some(Location::Cpu);
        }
        self.queues.locate(pid).map(Location::Queue)
    }

    /// Point-in-time projection for status output.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::capture(self)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
