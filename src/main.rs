//! # procsim Command Line
//!
//! Loads a scenario, runs it to completion and prints the per-process
//! summary.
//!
//! ```text
//! procsim demos/scenario.toml                 # interactive input on stdin
//! procsim demos/scenario.toml --input 7 -v    # scripted input, debug logs
//! procsim demos/scenario.toml --trace --seed 1
//! ```
//!
//! | Flag            | Effect                                             |
//! |-----------------|----------------------------------------------------|
//! | `--seed N`      | Override `[sim] seed`                              |
//! | `--max-ticks N` | Override `[sim] max_ticks`                         |
//! | `--trace`       | Print the system snapshot after every tick         |
//! | `--input N`     | Answer `SYSCALL 2` from this list (repeatable)     |
//! | `-v` / `-q`     | Log level debug (`-vv` trace) / warnings only      |
//!
//! `RUST_LOG` takes precedence over `-v`/`-q`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::warn;

use procsim::config::ScenarioConfig;
use procsim::io::{ConsoleIo, IoDevice, ScriptedIo};
use procsim::kernel::{RunSummary, Simulator};

#[derive(Debug, Parser)]
#[command(name = "procsim", version, about = "Two-class CPU scheduler simulator")]
struct Cli {
    /// Scenario file (TOML).
    scenario: PathBuf,

    /// Seed for the I/O blocking delay.
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Print the system snapshot after every tick.
    #[arg(long)]
    trace: bool,

    /// Scripted answers to input syscalls; disables the interactive prompt.
    #[arg(long = "input", value_name = "N", allow_negative_numbers = true)]
    inputs: Vec<i32>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary> {
    let mut scenario = ScenarioConfig::from_file(&cli.scenario)
        .with_context(|| format!("loading scenario {}", cli.scenario.display()))?;

    if let Some(seed) = cli.seed {
        scenario.sim.seed = seed;
    }
    if let Some(max_ticks) = cli.max_ticks {
        scenario.sim.max_ticks = max_ticks;
    }
    scenario.sim.trace |= cli.trace;

    let mut sim = Simulator::from_scenario(&scenario).context("booting simulator")?;
    if sim.scheduler().process_count() == 0 && !sim.load_errors().is_empty() {
        bail!("no program could be loaded ({} failed)", sim.load_errors().len());
    }
    for err in sim.load_errors() {
        warn!("skipped: {err}");
    }

    let mut scripted;
    let mut console;
    let io: &mut dyn IoDevice = if cli.inputs.is_empty() {
        console = ConsoleIo::stdio();
        &mut console
    } else {
        scripted = ScriptedIo::new(cli.inputs.iter().copied()).with_echo(true);
        &mut scripted
    };

    let trace = sim.config().trace;
    let summary = sim.run_with(io, |_, sched| {
        if trace {
            print!("{}", sched.snapshot());
        }
    });
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(summary) => {
            println!();
            print!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
