//! # procsim Configuration
//!
//! Compile-time constants governing the loader, the scheduler and the
//! simulated I/O latency, plus the runtime configuration read from a
//! scenario file.
//!
//! A scenario is a TOML document with an optional `[sim]` table and one
//! `[[process]]` entry per program to load:
//!
//! ```toml
//! [sim]
//! seed = 42
//! max_ticks = 10000
//!
//! [[process]]
//! path = "prog3.asm"
//! real_time = true
//! priority = "high"
//! quantum = 3
//! arrival = 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::process::Priority;

/// Maximum number of instructions in one program.
/// The loader rejects anything longer with `LoadError::TooLarge`.
pub const MAX_CODE_SIZE: usize = 100;

/// Maximum number of variables in one program's data section.
pub const MAX_DATA_SIZE: usize = 100;

/// Lower bound (inclusive) of the simulated I/O latency, in ticks.
/// A process that performs `SYSCALL 1` or `SYSCALL 2` is blocked for a
/// random number of ticks in `BLOCK_TICKS_MIN..=BLOCK_TICKS_MAX`.
pub const BLOCK_TICKS_MIN: u32 = 3;

/// Upper bound (inclusive) of the simulated I/O latency, in ticks.
pub const BLOCK_TICKS_MAX: u32 = 5;

/// Quantum used for real-time processes whose scenario entry omits one.
pub const DEFAULT_QUANTUM: u32 = 2;

/// Seed of the blocked-delay RNG when none is configured.
pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;

/// Safety limit on the number of ticks a run may take. Programs that loop
/// forever would otherwise never satisfy the halt condition.
pub const DEFAULT_MAX_TICKS: u64 = 100_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to read or validate a scenario.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scenario {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario syntax")]
    Parse(#[from] toml::de::Error),

    #[error("block_ticks_min ({min}) must be at least 1 and not exceed block_ticks_max ({max})")]
    BlockRange { min: u32, max: u32 },

    #[error("process entry {index} ({}): a best-effort process cannot declare a priority", path.display())]
    PriorityWithoutRealTime { index: usize, path: PathBuf },
}

// ---------------------------------------------------------------------------
// Simulation settings
// ---------------------------------------------------------------------------

/// Runtime knobs for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Seed for the blocked-delay RNG. Equal seeds give equal runs.
    pub seed: u64,

    /// Stop after this many ticks even if the halt condition never holds.
    pub max_ticks: u64,

    /// Inclusive bounds of the I/O blocking delay.
    pub block_ticks_min: u32,
    pub block_ticks_max: u32,

    /// Print the system snapshot after every tick.
    pub trace: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_ticks: DEFAULT_MAX_TICKS,
            block_ticks_min: BLOCK_TICKS_MIN,
            block_ticks_max: BLOCK_TICKS_MAX,
            trace: false,
        }
    }
}

impl SimConfig {
    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_ticks_min == 0 || self.block_ticks_min > self.block_ticks_max {
            return Err(ConfigError::BlockRange {
                min: self.block_ticks_min,
                max: self.block_ticks_max,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// One `[[process]]` entry: where the program lives and how to schedule it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessEntry {
    /// Program source file. Relative paths are resolved against the
    /// directory of the scenario file.
    pub path: PathBuf,

    /// Display name; defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub real_time: bool,

    /// Only meaningful for real-time processes.
    #[serde(default)]
    pub priority: Option<Priority>,

    /// Round Robin quantum for real-time processes.
    #[serde(default)]
    pub quantum: Option<u32>,

    /// Tick at which the process becomes eligible for admission.
    #[serde(default)]
    pub arrival: u64,
}

impl ProcessEntry {
    /// Name shown in logs and reports.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

/// A complete scenario: simulation settings plus the programs to load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub sim: SimConfig,

    #[serde(default, rename = "process")]
    pub processes: Vec<ProcessEntry>,
}

impl ScenarioConfig {
    /// Parse and validate a scenario from TOML text. Paths are left as
    /// written.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let scenario: ScenarioConfig = toml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Read a scenario file and resolve relative program paths against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scenario = Self::from_toml_str(&text)?;

        if let Some(base) = path.parent() {
            for entry in &mut scenario.processes {
                if entry.path.is_relative() {
                    entry.path = base.join(&entry.path);
                }
            }
        }
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        for (index, entry) in self.processes.iter().enumerate() {
            if !entry.real_time && entry.priority.is_some() {
                return Err(ConfigError::PriorityWithoutRealTime {
                    index,
                    path: entry.path.clone(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.block_ticks_min, 3);
        assert_eq!(cfg.block_ticks_max, 5);
        assert_eq!(cfg.max_ticks, DEFAULT_MAX_TICKS);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_full_scenario() {
        let text = r#"
            [sim]
            seed = 7
            max_ticks = 500
            trace = true

            [[process]]
            path = "prog1.asm"
            arrival = 0

            [[process]]
            path = "prog3.asm"
            name = "fast"
            real_time = true
            priority = "high"
            quantum = 3
            arrival = 3
        "#;
        let scenario = ScenarioConfig::from_toml_str(text).unwrap();
        assert_eq!(scenario.sim.seed, 7);
        assert_eq!(scenario.sim.max_ticks, 500);
        assert_eq!(scenario.sim.block_ticks_min, BLOCK_TICKS_MIN);
        assert!(scenario.sim.trace);
        assert_eq!(scenario.processes.len(), 2);

        let first = &scenario.processes[0];
        assert!(!first.real_time);
        assert_eq!(first.display_name(), "prog1");

        let second = &scenario.processes[1];
        assert_eq!(second.priority, Some(Priority::High));
        assert_eq!(second.quantum, Some(3));
        assert_eq!(second.arrival, 3);
        assert_eq!(second.display_name(), "fast");
    }

    #[test]
    fn test_rejects_inverted_block_range() {
        let text = "[sim]\nblock_ticks_min = 6\nblock_ticks_max = 2\n";
        let err = ScenarioConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::BlockRange { min: 6, max: 2 }));
    }

    #[test]
    fn test_rejects_priority_on_best_effort() {
        let text = "[[process]]\npath = \"a.asm\"\npriority = \"low\"\n";
        let err = ScenarioConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::PriorityWithoutRealTime { index: 0, .. }));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = ScenarioConfig::from_toml_str("[sim]\nspeed = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
