//! # System Snapshot
//!
//! A read-only projection of the scheduler's containers and running slot,
//! rendered as the per-tick status dump. Capturing a snapshot never feeds
//! anything back into the simulation.

use core::fmt;

use crate::process::Pid;
use crate::queue::QueueId;
use crate::scheduler::Scheduler;

/// Registers of the process on the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningView {
    pub pid: Pid,
    pub pc: usize,
    pub acc: i32,
    /// Meaningful only for real-time processes.
    pub quantum_remaining: Option<i64>,
}

/// Contents of every container at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub clock: u64,
    pub running: Option<RunningView>,
    pub ready_rt_high: Vec<Pid>,
    pub ready_rt_low: Vec<Pid>,
    pub ready_best_effort: Vec<Pid>,
    /// Blocked pids with their remaining ticks.
    pub blocked: Vec<(Pid, u32)>,
    pub new: Vec<Pid>,
    pub finished: Vec<Pid>,
}

impl SystemSnapshot {
    pub fn capture(sched: &Scheduler) -> Self {
        let queues = sched.queues();
        let pids = |q: QueueId| queues.iter(q).map(|p| p.pid).collect::<Vec<_>>();

        Self {
            clock: sched.clock(),
            running: sched.running().map(|p| RunningView {
                pid: p.pid,
                pc: p.pc,
                acc: p.acc,
                quantum_remaining: p.is_real_time().then_some(p.quantum_remaining),
            }),
            ready_rt_high: pids(QueueId::ReadyRtHigh),
            ready_rt_low: pids(QueueId::ReadyRtLow),
            ready_best_effort: pids(QueueId::ReadyBestEffort),
            blocked: queues
                .iter(QueueId::Blocked)
                .map(|p| (p.pid, p.blocked_ticks_remaining))
                .collect(),
            new: pids(QueueId::New),
            finished: pids(QueueId::Finished),
        }
    }
}

fn write_pids(f: &mut fmt::Formatter<'_>, label: &str, pids: &[Pid]) -> fmt::Result {
    write!(f, "{label:<11}:")?;
    for pid in pids {
        write!(f, " {pid} |")?;
    }
    writeln!(f)
}

impl fmt::Display for SystemSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Tick: {:>3} ---", self.clock)?;

        write!(f, "{:<11}:", "Running")?;
        match &self.running {
            Some(r) => {
                write!(f, " {} (PC={}, ACC={}", r.pid, r.pc, r.acc)?;
                if let Some(q) = r.quantum_remaining {
                    write!(f, ", Q={q}")?;
                }
                writeln!(f, ")")?;
            }
            None => writeln!(f, " idle")?,
        }

        write_pids(f, "Ready RT-H", &self.ready_rt_high)?;
        write_pids(f, "Ready RT-L", &self.ready_rt_low)?;
        write_pids(f, "Ready BE", &self.ready_best_effort)?;

        write!(f, "{:<11}:", "Blocked")?;
        for (pid, ticks) in &self.blocked {
            write!(f, " {pid} ({ticks}) |")?;
        }
        writeln!(f)?;

        write_pids(f, "New", &self.new)?;
        write_pids(f, "Finished", &self.finished)?;
        writeln!(f, "-----------------")
    }
}
