//! # I/O Devices
//!
//! The boundary between the simulated processes and the outside world.
//! `SYSCALL 1` hands the accumulator to [`IoDevice::output`]; `SYSCALL 2`
//! asks [`IoDevice::input`] for an integer. Both calls are synchronous and
//! assumed reliable; the blocking delay that models their latency is pure
//! scheduler state.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};

use log::warn;

use crate::process::Pid;

/// Output sink and input source for the syscalls of every process.
pub trait IoDevice {
    /// `SYSCALL 1` from `pid`.
    fn output(&mut self, pid: Pid, value: i32);

    /// `SYSCALL 2` from `pid`. The returned value is stored in the
    /// process's accumulator.
    fn input(&mut self, pid: Pid) -> i32;
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Interactive device: prints outputs and prompts for inputs.
///
/// Generic over the reader and writer so it can be driven by in-memory
/// buffers; [`ConsoleIo::stdio`] builds the real console.
pub struct ConsoleIo<R, W> {
    reader: R,
    writer: W,
}

impl ConsoleIo<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleIo<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// A broken console is logged, never fatal to the simulation.
    fn emit(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = self.writer.write_fmt(args).and_then(|()| self.writer.flush()) {
            warn!("console write failed: {e}");
        }
    }
}

impl<R: BufRead, W: Write> IoDevice for ConsoleIo<R, W> {
    fn output(&mut self, pid: Pid, value: i32) {
        self.emit(format_args!("OUTPUT {pid}: {value}\n"));
    }

    /// Re-prompts until a valid integer is read. End of input (or a read
    /// error) yields 0.
    fn input(&mut self, pid: Pid) -> i32 {
        let mut line = String::new();
        loop {
            self.emit(format_args!("INPUT for {pid} (integer): "));

            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    warn!("{pid}: end of input, using 0");
                    return 0;
                }
                Ok(_) => match line.trim().parse::<i32>() {
                    Ok(value) => return value,
                    Err(_) => self.emit(format_args!("not an integer: {:?}\n", line.trim())),
                },
                Err(e) => {
                    warn!("{pid}: console read failed ({e}), using 0");
                    return 0;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scripted
// ---------------------------------------------------------------------------

/// Non-interactive device: replays a fixed list of inputs and records every
/// output. Inputs beyond the script read as 0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIo {
    inputs: VecDeque<i32>,
    outputs: Vec<(Pid, i32)>,
    echo: bool,
}

impl ScriptedIo {
    pub fn new(inputs: impl IntoIterator<Item = i32>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: Vec::new(),
            echo: false,
        }
    }

    /// Also print outputs to stdout as they happen.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Every `(pid, value)` emitted so far, in order.
    pub fn outputs(&self) -> &[(Pid, i32)] {
        &self.outputs
    }

    /// Inputs not consumed yet.
    pub fn remaining_inputs(&self) -> usize {
        self.inputs.len()
    }
}

impl IoDevice for ScriptedIo {
    fn output(&mut self, pid: Pid, value: i32) {
        if self.echo {
            println!("OUTPUT {pid}: {value}");
        }
        self.outputs.push((pid, value));
    }

    fn input(&mut self, pid: Pid) -> i32 {
        self.inputs.pop_front().unwrap_or_else(|| {
            warn!("{pid}: input script exhausted, using 0");
            0
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replays_and_records() {
        let mut io = ScriptedIo::new([4, -2]);
        assert_eq!(io.input(Pid(1)), 4);
        io.output(Pid(1), 10);
        assert_eq!(io.input(Pid(2)), -2);
        assert_eq!(io.input(Pid(2)), 0);
        assert_eq!(io.outputs(), &[(Pid(1), 10)]);
        assert_eq!(io.remaining_inputs(), 0);
    }

    #[test]
    fn test_console_reprompts_on_garbage() {
        let input = b"abc\n  12 \n".as_slice();
        let mut io = ConsoleIo::new(input, Vec::new());
        assert_eq!(io.input(Pid(0)), 12);
        io.output(Pid(0), 5);

        let (_, written) = io.into_inner();
        let text = String::from_utf8(written).unwrap();
        assert_eq!(text.matches("INPUT for PID 0").count(), 2);
        assert!(text.contains("not an integer: \"abc\""));
        assert!(text.ends_with("OUTPUT PID 0: 5\n"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn test_console_survives_failed_writes() {
        let mut io = ConsoleIo::new(b"x\n-7\n".as_slice(), BrokenPipe);
        assert_eq!(io.input(Pid(2)), -7);
        io.output(Pid(2), 1);
    }

    #[test]
    fn test_console_eof_reads_zero() {
        let mut io = ConsoleIo::new(b"".as_slice(), Vec::new());
        assert_eq!(io.input(Pid(3)), 0);
    }
}
