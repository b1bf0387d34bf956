//! # Kernel
//!
//! Top-level simulation API for procsim.
//!
//! The [`Simulator`] owns the scheduler, boots it from a scenario and drives
//! it tick by tick until the system halts or the tick limit is reached.
//!
//! ## Startup Sequence
//!
//! ```text
//! main()
//!   ├─► ScenarioConfig::from_file()   ← Parse + validate TOML
//!   ├─► Simulator::from_scenario()    ← Load every program (×N)
//!   │     └─► loader::load_file()     ← Failures skip that program only
//!   └─► Simulator::run_with()         ← Tick until halt / tick limit
//!         └─► RunSummary              ← Per-process accounting
//! ```

use core::fmt;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use thiserror::Error;

use crate::config::{ConfigError, ScenarioConfig, SimConfig, DEFAULT_QUANTUM};
use crate::io::IoDevice;
use crate::loader::{self, LoadError};
use crate::process::{ExitReason, Pid, Priority, ProcessConfig, ProcessState, ProcessStats, Program, SchedClass};
use crate::scheduler::{Scheduler, TickReport};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error("failed to load {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Why [`Simulator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing left to run.
    Halted,
    /// `max_ticks` reached with work still pending.
    TickLimit,
}

/// Final state of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub name: String,
    pub class: SchedClass,
    pub state: ProcessState,
    pub exit_reason: Option<ExitReason>,
    pub acc: i32,
    pub stats: ProcessStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stop: StopReason,
    /// Ticks executed in total.
    pub ticks: u64,
    /// Ordered by pid.
    pub processes: Vec<ProcessSummary>,
}

impl RunSummary {
    fn collect(stop: StopReason, sched: &Scheduler) -> Self {
        let mut processes: Vec<ProcessSummary> = sched
            .processes()
            .map(|p| ProcessSummary {
                pid: p.pid,
                name: p.name.clone(),
                class: p.class(),
                state: p.state,
                exit_reason: p.exit_reason,
                acc: p.acc,
                stats: p.stats,
            })
            .collect();
        processes.sort_by_key(|p| p.pid);

        Self {
            stop,
            ticks: sched.clock(),
            processes,
        }
    }

    pub fn process(&self, pid: Pid) -> Option<&ProcessSummary> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    /// Processes that ended on a program fault rather than `SYSCALL 0`.
    pub fn faults(&self) -> usize {
        self.processes
            .iter()
            .filter(|p| p.exit_reason.is_some_and(ExitReason::is_fault))
            .count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stop {
            StopReason::Halted => writeln!(f, "Simulation halted after {} ticks.", self.ticks)?,
            StopReason::TickLimit => writeln!(f, "Tick limit reached after {} ticks.", self.ticks)?,
        }
        writeln!(
            f,
            "{:<6} {:<12} {:<8} {:<16} {:>6} {:>6} {:>6} {:>5} {:>6}",
            "PID", "NAME", "CLASS", "EXIT", "ACC", "CPU", "WAIT", "IO", "TURN"
        )?;
        for p in &self.processes {
            let exit = match p.exit_reason {
                Some(reason) => reason.to_string(),
                None => p.state.to_string(),
            };
            let turnaround = p
                .stats
                .turnaround()
                .map_or_else(|| "-".to_string(), |t| t.to_string());
            writeln!(
                f,
                "{:<6} {:<12} {:<8} {:<16} {:>6} {:>6} {:>6} {:>5} {:>6}",
                p.pid.0,
                p.name,
                p.class.to_string(),
                exit,
                p.acc,
                p.stats.cpu_ticks,
                p.stats.wait_ticks,
                p.stats.io_blocks,
                turnaround
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    scheduler: Scheduler,
    config: SimConfig,
    load_errors: Vec<KernelError>,
}

impl Simulator {
    /// Create an empty simulator.
    ///
    /// # Returns
    /// - `Err(KernelError::Config)` if the block range is invalid.
    pub fn new(config: SimConfig) -> Result<Self, KernelError> {
        Ok(Self {
            scheduler: Scheduler::new(&config)?,
            config,
            load_errors: Vec::new(),
        })
    }

    /// Boot from a scenario, loading every `[[process]]` entry in order.
    ///
    /// A program that fails to load never enters the system; the failure is
    /// logged and kept in [`Simulator::load_errors`], and the remaining
    /// entries still load.
    pub fn from_scenario(scenario: &ScenarioConfig) -> Result<Self, KernelError> {
        let mut sim = Self::new(scenario.sim)?;

        for entry in &scenario.processes {
            let config = if entry.real_time {
                ProcessConfig::real_time(
                    entry.priority.unwrap_or(Priority::Low),
                    entry.quantum.unwrap_or(DEFAULT_QUANTUM),
                    entry.arrival,
                )
            } else {
                if entry.quantum.is_some() {
                    warn!("{}: quantum ignored for a best-effort process", entry.path.display());
                }
                ProcessConfig::best_effort(entry.arrival)
            };

            if let Err(e) = sim.load_program(&entry.path, entry.display_name(), config) {
                error!("{e}: {}", e.source_chain());
                sim.load_errors.push(e);
            }
        }
        Ok(sim)
    }

    /// Load a program file and register it as a new process.
    pub fn load_program(
        &mut self,
        path: &Path,
        name: impl Into<String>,
        config: ProcessConfig,
    ) -> Result<Pid, KernelError> {
        let program = loader::load_file(path).map_err(|source| KernelError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.add_program(name, program, config))
    }

    /// Register an already parsed program.
    pub fn add_program(&mut self, name: impl Into<String>, program: Program, config: ProcessConfig) -> Pid {
        self.scheduler.spawn(name, program, config)
    }

    /// Run one tick, unless the system has already halted.
    pub fn step(&mut self, io: &mut dyn IoDevice) -> Option<TickReport> {
        if self.scheduler.is_halted() {
            return None;
        }
        Some(self.scheduler.tick(io))
    }

    /// Run until halt or the tick limit.
    pub fn run(&mut self, io: &mut dyn IoDevice) -> RunSummary {
        self.run_with(io, |_, _| {})
    }

    /// Like [`Simulator::run`], calling `observer` after every tick with the
    /// tick's report and the resulting state.
    pub fn run_with<F>(&mut self, io: &mut dyn IoDevice, mut observer: F) -> RunSummary
    where
        F: FnMut(&TickReport, &Scheduler),
    {
        info!(
            "starting simulation: {} processes, seed {:#x}, max {} ticks",
            self.scheduler.process_count(),
            self.config.seed,
            self.config.max_ticks
        );

        let stop = loop {
            if self.scheduler.is_halted() {
                break StopReason::Halted;
            }
            if self.scheduler.clock() >= self.config.max_ticks {
                break StopReason::TickLimit;
            }
            let report = self.scheduler.tick(io);
            observer(&report, &self.scheduler);
        };

        match stop {
            StopReason::Halted => info!("all processes finished at tick {}", self.scheduler.clock()),
            StopReason::TickLimit => warn!(
                "tick limit {} reached with processes still pending",
                self.config.max_ticks
            ),
        }
        let summary = RunSummary::collect(stop, &self.scheduler);
        if summary.faults() > 0 {
            warn!("{} of {} processes ended on a fault", summary.faults(), summary.processes.len());
        }
        summary
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Programs from the scenario that could not be loaded.
    pub fn load_errors(&self) -> &[KernelError] {
        &self.load_errors
    }
}

impl KernelError {
    /// Every `source()` below this error, joined with `": "`.
    pub fn source_chain(&self) -> String {
        let mut parts = Vec::new();
        let mut next = std::error::Error::source(self);
        while let Some(err) = next {
            parts.push(err.to_string());
            next = err.source();
        }
        parts.join(": ")
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
