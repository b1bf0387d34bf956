//! End-to-end scheduling scenarios driven through the public API.

use std::path::PathBuf;

use procsim::config::{ScenarioConfig, SimConfig};
use procsim::io::ScriptedIo;
use procsim::isa::{Instruction, Opcode};
use procsim::kernel::{Simulator, StopReason};
use procsim::process::{ExitReason, Pid, Priority, ProcessConfig, ProcessState, Program, SchedClass};
use procsim::queue::QueueId;
use procsim::scheduler::{Location, TickEvent, TickReport};

fn demo_scenario() -> ScenarioConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/scenario.toml");
    ScenarioConfig::from_file(&path).unwrap()
}

/// `n` increments followed by `SYSCALL 0`.
fn counter(n: usize) -> Program {
    let mut code = vec![Instruction::immediate(Opcode::Add, 1); n];
    code.push(Instruction::syscall(0));
    Program::new(code, vec![])
}

fn outputs_of(io: &ScriptedIo, pid: Pid) -> Vec<i32> {
    io.outputs().iter().filter(|(p, _)| *p == pid).map(|&(_, v)| v).collect()
}

fn run_collecting(sim: &mut Simulator, io: &mut ScriptedIo) -> Vec<TickReport> {
    let mut reports = Vec::new();
    sim.run_with(io, |r, _| reports.push(r.clone()));
    reports
}

#[test]
fn demo_scenario_runs_to_completion() {
    let mut sim = Simulator::from_scenario(&demo_scenario()).unwrap();
    assert!(sim.load_errors().is_empty());

    let mut io = ScriptedIo::new([5]);
    let summary = sim.run(&mut io);

    assert_eq!(summary.stop, StopReason::Halted);
    assert_eq!(summary.processes.len(), 3);
    for p in &summary.processes {
        assert_eq!(p.state, ProcessState::Finished, "{} did not finish", p.name);
        assert_eq!(p.exit_reason, Some(ExitReason::Terminated));
    }

    assert_eq!(outputs_of(&io, Pid(0)), vec![55]);
    assert_eq!(outputs_of(&io, Pid(1)), vec![0, 1, 1, 2, 3]);
    assert_eq!(outputs_of(&io, Pid(2)), vec![7]);
    assert_eq!(io.remaining_inputs(), 0);

    assert_eq!(summary.processes[2].class, SchedClass::RealTime(Priority::High));
    assert_eq!(summary.processes[1].stats.io_blocks, 6);
}

#[test]
fn demo_burst_preempts_batch_on_arrival() {
    let mut sim = Simulator::from_scenario(&demo_scenario()).unwrap();
    let mut io = ScriptedIo::new([5]);
    let reports = run_collecting(&mut sim, &mut io);

    // fib reads its input at tick 1 and blocks, so batch holds the CPU
    // when burst arrives at tick 3.
    let arrival = &reports[3];
    assert_eq!(arrival.preempted, Some(Pid(0)));
    assert_eq!(arrival.dispatched, Some(Pid(2)));
    assert_eq!(arrival.executed, Some(Pid(2)));
}

#[test]
fn same_seed_gives_identical_runs() {
    let run = || {
        let mut sim = Simulator::from_scenario(&demo_scenario()).unwrap();
        let mut io = ScriptedIo::new([8]);
        (sim.run(&mut io), io.outputs().to_vec())
    };
    assert_eq!(run(), run());
}

#[test]
fn rt_high_ready_blocks_lower_dispatch() {
    let mut sim = Simulator::new(SimConfig::default()).unwrap();
    sim.add_program("be", counter(6), ProcessConfig::best_effort(0));
    sim.add_program("low", counter(6), ProcessConfig::real_time(Priority::Low, 2, 0));
    for arrival in [0, 2, 5] {
        sim.add_program("high", counter(3), ProcessConfig::real_time(Priority::High, 1, arrival));
    }

    let mut io = ScriptedIo::default();
    sim.run_with(&mut io, |report, sched| {
        if let Some(pid) = report.dispatched {
            let class = sched.process(pid).unwrap().class();
            if class != SchedClass::RealTime(Priority::High) {
                assert!(
                    sched.queues().is_empty(QueueId::ReadyRtHigh),
                    "{pid} ({class}) dispatched at tick {} while RT-high was ready",
                    report.tick
                );
            }
        }
    });
}

#[test]
fn real_time_runs_never_exceed_quantum() {
    let mut sim = Simulator::new(SimConfig::default()).unwrap();
    let quanta = [0u32, 1, 3];
    for (i, &q) in quanta.iter().enumerate() {
        sim.add_program(format!("rt{i}"), counter(7), ProcessConfig::real_time(Priority::Low, q, 0));
    }

    let mut io = ScriptedIo::default();
    let reports = run_collecting(&mut sim, &mut io);

    let mut streak: Option<(Pid, u32)> = None;
    for r in &reports {
        if r.dispatched.is_some() {
            streak = None;
        }
        if let Some(pid) = r.executed {
            let count = match streak {
                Some((p, n)) if p == pid => n + 1,
                _ => 1,
            };
            let limit = quanta[pid.0 as usize].max(1);
            assert!(count <= limit, "{pid} ran {count} in a row with quantum {limit}");
            streak = Some((pid, count));
        }
    }
}

#[test]
fn halt_is_idempotent() {
    let mut sim = Simulator::new(SimConfig::default()).unwrap();
    sim.add_program("a", counter(2), ProcessConfig::best_effort(0));
    let mut io = ScriptedIo::default();

    let first = sim.run(&mut io);
    assert_eq!(first.stop, StopReason::Halted);
    assert!(sim.step(&mut io).is_none());

    let second = sim.run(&mut io);
    assert_eq!(first, second);
    assert!(sim.scheduler().is_halted());
}

#[test]
fn blocked_process_returns_to_its_own_class_queue() {
    let code = vec![
        Instruction::immediate(Opcode::Load, 1),
        Instruction::syscall(1),
        Instruction::branch(Opcode::BranchAlways, 0),
    ];
    let config = SimConfig {
        block_ticks_min: 4,
        block_ticks_max: 4,
        ..SimConfig::default()
    };
    let mut sim = Simulator::new(config).unwrap();
    let low = sim.add_program("low", Program::new(code, vec![]), ProcessConfig::real_time(Priority::Low, 9, 0));
    sim.add_program("be", counter(50), ProcessConfig::best_effort(0));
    let mut io = ScriptedIo::default();

    // t0 LOAD, t1 SYSCALL 1, t2 retired to blocked, t3..t5 counting down,
    // t6 unblocked into ready RT-low.
    for _ in 0..6 {
        sim.step(&mut io);
    }
    assert_eq!(sim.scheduler().location(low), Some(Location::Queue(QueueId::Blocked)));

    let r = sim.step(&mut io).unwrap();
    assert_eq!(r.preempted, Some(Pid(1)));
    assert_eq!(r.dispatched, Some(low));
    assert_eq!(sim.scheduler().location(Pid(1)), Some(Location::Queue(QueueId::ReadyBestEffort)));
}

/// Prints once, blocks, then exits.
fn print_and_exit() -> Program {
    Program::new(vec![Instruction::syscall(1), Instruction::syscall(0)], vec![])
}

fn rt_low_queue(sim: &Simulator) -> Vec<Pid> {
    sim.scheduler().queues().iter(QueueId::ReadyRtLow).map(|p| p.pid).collect()
}

fn fixed_block(ticks: u32) -> SimConfig {
    SimConfig {
        block_ticks_min: ticks,
        block_ticks_max: ticks,
        ..SimConfig::default()
    }
}

#[test]
fn quantum_expiry_requeues_behind_same_tick_arrivals() {
    let mut sim = Simulator::new(fixed_block(2)).unwrap();
    let io_bound = sim.add_program("io", print_and_exit(), ProcessConfig::real_time(Priority::Low, 5, 0));
    let spinner = sim.add_program("spin", counter(10), ProcessConfig::real_time(Priority::Low, 2, 0));
    let late = sim.add_program("late", counter(1), ProcessConfig::real_time(Priority::Low, 5, 3));
    let mut io = ScriptedIo::default();

    // t0 io prints, t1 io blocked and spin dispatched, t2 spin spends its
    // last quantum tick.
    for _ in 0..3 {
        sim.step(&mut io);
    }
    assert_eq!(sim.scheduler().location(io_bound), Some(Location::Queue(QueueId::Blocked)));
    assert_eq!(sim.scheduler().running().map(|p| p.pid), Some(spinner));

    let r = sim.step(&mut io).unwrap();
    assert_eq!(r.tick, 3);
    assert_eq!(
        r.events,
        vec![
            TickEvent::Admitted(late),
            TickEvent::Unblocked(io_bound),
            TickEvent::QuantumExpired(spinner),
            TickEvent::Dispatched(late),
        ]
    );
    assert_eq!(sim.scheduler().running().map(|p| p.pid), Some(late));
    assert_eq!(rt_low_queue(&sim), vec![io_bound, spinner]);
}

#[test]
fn admission_precedes_same_tick_unblock() {
    let mut sim = Simulator::new(fixed_block(2)).unwrap();
    let io_bound = sim.add_program("io", print_and_exit(), ProcessConfig::real_time(Priority::Low, 5, 0));
    let hog = sim.add_program("hog", counter(20), ProcessConfig::real_time(Priority::High, 50, 1));
    let late = sim.add_program("late", counter(1), ProcessConfig::real_time(Priority::Low, 5, 3));
    let mut io = ScriptedIo::default();

    for _ in 0..4 {
        sim.step(&mut io);
    }
    assert_eq!(sim.scheduler().running().map(|p| p.pid), Some(hog));
    assert_eq!(rt_low_queue(&sim), vec![late, io_bound]);
}

#[test]
fn faults_do_not_stop_other_processes() {
    let mut sim = Simulator::new(SimConfig::default()).unwrap();
    let div = sim.add_program(
        "div",
        Program::new(vec![Instruction::immediate(Opcode::Div, 0)], vec![]),
        ProcessConfig::real_time(Priority::High, 2, 0),
    );
    let bad = sim.add_program(
        "bad",
        Program::new(vec![Instruction::immediate(Opcode::Invalid, 0)], vec![]),
        ProcessConfig::real_time(Priority::Low, 2, 0),
    );
    let runoff = sim.add_program(
        "runoff",
        Program::new(vec![Instruction::immediate(Opcode::Load, 1)], vec![]),
        ProcessConfig::best_effort(0),
    );
    let ok = sim.add_program("ok", counter(1), ProcessConfig::best_effort(0));

    let summary = sim.run(&mut ScriptedIo::default());
    assert_eq!(summary.stop, StopReason::Halted);
    let reason = |pid| summary.process(pid).unwrap().exit_reason;
    assert_eq!(reason(div), Some(ExitReason::DivideByZero));
    assert_eq!(reason(bad), Some(ExitReason::InvalidOpcode));
    assert_eq!(reason(runoff), Some(ExitReason::PcOutOfBounds));
    assert_eq!(reason(ok), Some(ExitReason::Terminated));
}
