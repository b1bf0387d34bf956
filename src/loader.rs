//! # Program Loader
//!
//! Turns the assembly text of one program into a [`Program`]: resolved
//! instructions plus the initial data image.
//!
//! ## Text Format
//!
//! ```text
//! # comment
//! .code
//!         LOAD  counter
//! loop:   SUB   #1          # trailing comment
//!         BRPOS loop
//!         SYSCALL 0
//! .endcode
//! .data
//!         counter 5
//! .enddata
//! ```
//!
//! | Operand            | Kind        | Resolved to                  |
//! |--------------------|-------------|------------------------------|
//! | after a branch     | `Label`     | index of the labelled line   |
//! | after `SYSCALL`    | `Syscall`   | the code, `n` or `#n`        |
//! | `#n`               | `Immediate` | `n`                          |
//! | anything else      | `Direct`    | index of the variable        |
//!
//! Labels bind to the index of the next instruction, so a label may sit on
//! its own line. Directives and mnemonics are case-insensitive; label and
//! variable names are not. An unknown mnemonic loads as `INVALID` and only
//! faults when executed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::config::{MAX_CODE_SIZE, MAX_DATA_SIZE};
use crate::isa::{Instruction, Opcode, OperandKind};
use crate::process::Program;

/// Why a program could not be loaded. Line numbers are 1-based.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("line {line}: unknown variable `{name}`")]
    UnknownVariable { name: String, line: usize },

    #[error("line {line}: unknown label `{name}`")]
    UnknownLabel { name: String, line: usize },

    #[error("line {line}: malformed integer `{text}`")]
    BadInteger { text: String, line: usize },

    #[error("line {line}: {mnemonic} needs an operand")]
    MissingOperand { mnemonic: &'static str, line: usize },

    #[error("line {line}: STORE cannot take an immediate operand")]
    ImmediateStore { line: usize },

    #[error("{section} section exceeds {limit} entries")]
    TooLarge { section: &'static str, limit: usize },

    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read and parse a program file.
pub fn load_file(path: &Path) -> Result<Program, LoadError> {
    let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let program = parse_program(&source)?;
    debug!(
        "loaded {}: {} instructions, {} variables",
        path.display(),
        program.instructions.len(),
        program.data.len()
    );
    Ok(program)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Code,
    Data,
}

/// An instruction whose operand still names a label or variable.
struct Pending<'a> {
    opcode: Opcode,
    operand: Operand<'a>,
    line: usize,
}

enum Operand<'a> {
    Resolved(OperandKind, i32),
    Variable(&'a str),
    Label(&'a str),
}

/// Parse program text. Pure: no I/O, no global state.
pub fn parse_program(source: &str) -> Result<Program, LoadError> {
    let mut section = Section::None;
    let mut pending: Vec<Pending<'_>> = Vec::new();
    let mut labels: HashMap<&str, usize> = HashMap::new();
    let mut variables: HashMap<&str, usize> = HashMap::new();
    let mut data: Vec<i32> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let mut tokens = raw.split_whitespace().peekable();

        let Some(&first) = tokens.peek() else { continue };
        if first.starts_with('#') {
            continue;
        }

        if first.starts_with('.') {
            section = match first.to_ascii_lowercase().as_str() {
                ".code" => Section::Code,
                ".data" => Section::Data,
                ".endcode" | ".enddata" => Section::None,
                other => {
                    warn!("line {line}: unknown directive `{other}` ignored");
                    section
                }
            };
            continue;
        }

        match section {
            Section::Code => {
                let mut head = tokens.next().unwrap_or_default();
                if let Some((label, rest)) = head.split_once(':') {
                    if labels.insert(label, pending.len()).is_some() {
                        warn!("line {line}: label `{label}` redefined");
                    }
                    head = if rest.is_empty() {
                        match tokens.next() {
                            Some(t) if !t.starts_with('#') => t,
                            _ => continue,
                        }
                    } else {
                        rest
                    };
                }

                if pending.len() == MAX_CODE_SIZE {
                    return Err(LoadError::TooLarge {
                        section: "code",
                        limit: MAX_CODE_SIZE,
                    });
                }
                let opcode = Opcode::from_mnemonic(head);
                let operand = parse_operand(opcode, tokens.next(), line)?;
                if let Some(extra) = tokens.next().filter(|t| !t.starts_with('#')) {
                    warn!("line {line}: unexpected `{extra}` after operand ignored");
                }
                pending.push(Pending {
                    opcode,
                    operand,
                    line,
                });
            }
            Section::Data => {
                let name = tokens.next().unwrap_or_default();
                let text = tokens.next().unwrap_or_default();
                let value = parse_int(text, line)?;

                if data.len() == MAX_DATA_SIZE {
                    return Err(LoadError::TooLarge {
                        section: "data",
                        limit: MAX_DATA_SIZE,
                    });
                }
                if variables.insert(name, data.len()).is_some() {
                    warn!("line {line}: variable `{name}` redeclared");
                }
                data.push(value);
            }
            Section::None => {
                warn!("line {line}: text outside .code/.data ignored");
            }
        }
    }

    let instructions = pending
        .into_iter()
        .map(|p| resolve(p, &labels, &variables))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Program::new(instructions, data))
}

fn parse_operand<'a>(opcode: Opcode, token: Option<&'a str>, line: usize) -> Result<Operand<'a>, LoadError> {
    // `#` followed by something that is not a number starts a comment.
    let token = token.filter(|t| {
        !t.starts_with('#')
            || t[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+')
    });

    if opcode == Opcode::Invalid {
        return Ok(Operand::Resolved(OperandKind::Immediate, 0));
    }
    let Some(token) = token else {
        return Err(LoadError::MissingOperand {
            mnemonic: opcode.mnemonic(),
            line,
        });
    };

    if opcode.is_branch() {
        return Ok(Operand::Label(token));
    }
    if opcode == Opcode::Syscall {
        // `SYSCALL 0` and `SYSCALL #0` are the same call.
        let code = token.strip_prefix('#').unwrap_or(token);
        return Ok(Operand::Resolved(OperandKind::Syscall, parse_int(code, line)?));
    }
    if let Some(number) = token.strip_prefix('#') {
        if opcode == Opcode::Store {
            return Err(LoadError::ImmediateStore { line });
        }
        return Ok(Operand::Resolved(OperandKind::Immediate, parse_int(number, line)?));
    }
    Ok(Operand::Variable(token))
}

fn parse_int(text: &str, line: usize) -> Result<i32, LoadError> {
    text.parse().map_err(|_| LoadError::BadInteger {
        text: text.to_string(),
        line,
    })
}

fn resolve(
    pending: Pending<'_>,
    labels: &HashMap<&str, usize>,
    variables: &HashMap<&str, usize>,
) -> Result<Instruction, LoadError> {
    let Pending { opcode, operand, line } = pending;
    match operand {
        Operand::Resolved(kind, value) => Ok(Instruction::new(opcode, kind, value)),
        Operand::Label(name) => labels
            .get(name)
            .map(|&target| Instruction::branch(opcode, target))
            .ok_or_else(|| LoadError::UnknownLabel {
                name: name.to_string(),
                line,
            }),
        Operand::Variable(name) => variables
            .get(name)
            .map(|&index| Instruction::direct(opcode, index))
            .ok_or_else(|| LoadError::UnknownVariable {
                name: name.to_string(),
                line,
            }),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTDOWN: &str = "\
# counts down from 5
.code
        LOAD  counter
loop:   SUB   #1          # decrement
        BRPOS loop
        SYSCALL 0
.endcode
.data
        counter 5
.enddata
";

    #[test]
    fn test_parse_countdown() {
        let program = parse_program(COUNTDOWN).unwrap();
        assert_eq!(
            program.instructions,
            vec![
                Instruction::direct(Opcode::Load, 0),
                Instruction::immediate(Opcode::Sub, 1),
                Instruction::branch(Opcode::BranchPos, 1),
                Instruction::syscall(0),
            ]
        );
        assert_eq!(program.data, vec![5]);
    }

    #[test]
    fn test_label_on_own_line_binds_next_instruction() {
        let src = ".code\nstart:\n\n  load #1\nend:\n  brany start\n.endcode\n";
        let program = parse_program(src).unwrap();
        assert_eq!(program.instructions[1], Instruction::branch(Opcode::BranchAlways, 0));
    }

    #[test]
    fn test_label_glued_to_mnemonic() {
        let src = ".code\nx:add #2\n brany x\n.endcode";
        let program = parse_program(src).unwrap();
        assert_eq!(program.instructions[0], Instruction::immediate(Opcode::Add, 2));
        assert_eq!(program.instructions[1], Instruction::branch(Opcode::BranchAlways, 0));
    }

    #[test]
    fn test_directives_case_insensitive() {
        let src = ".CODE\n SYSCALL 0\n.ENDCODE\n.Data\n a 1\n.EndData\n";
        let program = parse_program(src).unwrap();
        assert_eq!(program.instructions.len(), 1);
        assert_eq!(program.data, vec![1]);
    }

    #[test]
    fn test_negative_immediate_and_data() {
        let src = ".code\n load #-7\n add x\n.endcode\n.data\n x -3\n.enddata";
        let program = parse_program(src).unwrap();
        assert_eq!(program.instructions[0].value, -7);
        assert_eq!(program.data, vec![-3]);
    }

    #[test]
    fn test_syscall_code_with_or_without_hash() {
        let program = parse_program(".code\n SYSCALL #0\n syscall 1\n SYSCALL #2 # read\n.endcode\n").unwrap();
        assert_eq!(
            program.instructions,
            vec![Instruction::syscall(0), Instruction::syscall(1), Instruction::syscall(2)]
        );

        let err = parse_program(".code\n SYSCALL #x\n.endcode").unwrap_err();
        assert!(matches!(err, LoadError::MissingOperand { mnemonic: "SYSCALL", .. }));
    }

    #[test]
    fn test_unknown_mnemonic_loads_as_invalid() {
        let program = parse_program(".code\n frobnicate whatever\n.endcode").unwrap();
        assert_eq!(program.instructions[0].opcode, Opcode::Invalid);
    }

    #[test]
    fn test_unknown_variable() {
        let err = parse_program(".code\n load missing\n.endcode").unwrap_err();
        assert!(matches!(err, LoadError::UnknownVariable { ref name, line: 2 } if name == "missing"));
    }

    #[test]
    fn test_unknown_label() {
        let err = parse_program(".code\n brzero nowhere\n.endcode").unwrap_err();
        assert!(matches!(err, LoadError::UnknownLabel { line: 2, .. }));
    }

    #[test]
    fn test_bad_integers() {
        let err = parse_program(".code\n add #12x\n.endcode").unwrap_err();
        assert!(matches!(err, LoadError::BadInteger { ref text, .. } if text == "12x"));

        let err = parse_program(".data\n v abc\n.enddata").unwrap_err();
        assert!(matches!(err, LoadError::BadInteger { line: 2, .. }));

        let err = parse_program(".code\n syscall one\n.endcode").unwrap_err();
        assert!(matches!(err, LoadError::BadInteger { .. }));
    }

    #[test]
    fn test_immediate_store_rejected() {
        let err = parse_program(".code\n store #3\n.endcode").unwrap_err();
        assert!(matches!(err, LoadError::ImmediateStore { line: 2 }));
    }

    #[test]
    fn test_missing_operand() {
        let err = parse_program(".code\n add # nothing here\n.endcode").unwrap_err();
        assert!(matches!(err, LoadError::MissingOperand { mnemonic: "ADD", line: 2 }));
    }

    #[test]
    fn test_too_large() {
        let mut src = String::from(".code\n");
        for _ in 0..=MAX_CODE_SIZE {
            src.push_str(" add #1\n");
        }
        let err = parse_program(&src).unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { section: "code", .. }));

        let mut src = String::from(".data\n");
        for i in 0..=MAX_DATA_SIZE {
            src.push_str(&format!(" v{i} 0\n"));
        }
        let err = parse_program(&src).unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { section: "data", .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_file(Path::new("/definitely/not/here.asm")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("here.asm"));
    }
}
