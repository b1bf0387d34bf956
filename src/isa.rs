//! # Instruction Set
//!
//! The fixed accumulator-machine instruction set executed by [`crate::cpu`].
//!
//! Every instruction names one opcode and at most one operand. The operand
//! kind is decided once by the loader and never re-derived at run time:
//!
//! | Kind | Text form | `value` holds |
//! |------|-----------|---------------|
//! | `Immediate` | `#42` | the literal |
//! | `Direct` | `counter` | index into the process's data memory |
//! | `Label` | `loop` (branches only) | index into the process's code |
//! | `Syscall` | `1` (SYSCALL only) | the syscall number |

use core::fmt;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Operation performed by one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mult,
    Div,
    Load,
    Store,
    /// `BRANY`: unconditional branch.
    BranchAlways,
    /// `BRPOS`: branch if the accumulator is positive.
    BranchPos,
    /// `BRZERO`: branch if the accumulator is zero.
    BranchZero,
    /// `BRNEG`: branch if the accumulator is negative.
    BranchNeg,
    Syscall,
    /// Unrecognized mnemonic. Faults the process when executed.
    Invalid,
}

impl Opcode {
    /// Decode a mnemonic, ignoring ASCII case. Unknown text decodes to
    /// [`Opcode::Invalid`] rather than failing.
    pub fn from_mnemonic(text: &str) -> Self {
        const TABLE: [(&str, Opcode); 11] = [
            ("ADD", Opcode::Add),
            ("SUB", Opcode::Sub),
            ("MULT", Opcode::Mult),
            ("DIV", Opcode::Div),
            ("LOAD", Opcode::Load),
            ("STORE", Opcode::Store),
            ("BRANY", Opcode::BranchAlways),
            ("BRPOS", Opcode::BranchPos),
            ("BRZERO", Opcode::BranchZero),
            ("BRNEG", Opcode::BranchNeg),
            ("SYSCALL", Opcode::Syscall),
        ];

        TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(text))
            .map(|&(_, op)| op)
            .unwrap_or(Opcode::Invalid)
    }

    /// Canonical upper-case mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mult => "MULT",
            Opcode::Div => "DIV",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::BranchAlways => "BRANY",
            Opcode::BranchPos => "BRPOS",
            Opcode::BranchZero => "BRZERO",
            Opcode::BranchNeg => "BRNEG",
            Opcode::Syscall => "SYSCALL",
            Opcode::Invalid => "INVALID",
        }
    }

    /// True for the four branch opcodes, whose operand is a code label.
    #[inline]
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::BranchAlways | Opcode::BranchPos | Opcode::BranchZero | Opcode::BranchNeg
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ---------------------------------------------------------------------------
// Operands
// ---------------------------------------------------------------------------

/// How an instruction's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Immediate,
    Direct,
    Label,
    Syscall,
}

/// Well-known syscall numbers.
pub mod syscall {
    /// Voluntary termination.
    pub const EXIT: i32 = 0;
    /// Emit the accumulator to the output sink, then block.
    pub const WRITE: i32 = 1;
    /// Read an integer into the accumulator, then block.
    pub const READ: i32 = 2;
}

// ---------------------------------------------------------------------------
// Instruction
// ---------------------------------------------------------------------------

/// One fully resolved instruction. Immutable once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: Opcode,
    pub kind: OperandKind,
    pub value: i32,
}

impl Instruction {
    pub const fn new(opcode: Opcode, kind: OperandKind, value: i32) -> Self {
        Self { opcode, kind, value }
    }

    /// `OP #value`
    pub const fn immediate(opcode: Opcode, value: i32) -> Self {
        Self::new(opcode, OperandKind::Immediate, value)
    }

    /// `OP variable`, with the variable already resolved to `index`.
    pub const fn direct(opcode: Opcode, index: usize) -> Self {
        Self::new(opcode, OperandKind::Direct, index as i32)
    }

    /// Branch to an already resolved code index.
    pub const fn branch(opcode: Opcode, target: usize) -> Self {
        Self::new(opcode, OperandKind::Label, target as i32)
    }

    /// `SYSCALL code`
    pub const fn syscall(code: i32) -> Self {
        Self::new(Opcode::Syscall, OperandKind::Syscall, code)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperandKind::Immediate => write!(f, "{} #{}", self.opcode, self.value),
            OperandKind::Direct => write!(f, "{} [{}]", self.opcode, self.value),
            OperandKind::Label => write!(f, "{} @{}", self.opcode, self.value),
            OperandKind::Syscall => write!(f, "{} {}", self.opcode, self.value),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
