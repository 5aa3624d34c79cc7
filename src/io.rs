//! The stream of program input/output the VM's I/O opcodes talk to.
//! Kept behind a trait, the way the teacher's memory module keeps
//! memory-mapped I/O behind `IOHandler`, so tests can assert on VM
//! behavior without touching real stdio.

use std::io::{self, BufRead, Write};

pub trait Io {
    fn print_num(&mut self, n: i32);
    fn print_char(&mut self, c: char);
    fn print_line(&mut self);
    fn print_str(&mut self, s: &str);
    fn input_num(&mut self) -> Option<i32>;
    fn input_char(&mut self) -> Option<char>;
    fn wait(&mut self);
}

/// Talks to the process's real standard input and output, the way
/// `smrun` runs a program for a human at a terminal.
pub struct StdIo {
    stdout: io::Stdout,
    stdin: io::Stdin,
}

impl StdIo {
    pub fn new() -> StdIo {
        StdIo {
            stdout: io::stdout(),
            stdin: io::stdin(),
        }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.stdin.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(_) => None,
        }
    }
}

impl Default for StdIo {
    fn default() -> StdIo {
        StdIo::new()
    }
}

impl Io for StdIo {
    fn print_num(&mut self, n: i32) {
        let _ = write!(self.stdout, "{} ", n);
    }

    fn print_char(&mut self, c: char) {
        let _ = write!(self.stdout, "{}", c);
    }

    fn print_line(&mut self) {
        let _ = writeln!(self.stdout);
    }

    fn print_str(&mut self, s: &str) {
        let _ = write!(self.stdout, "{}", s);
    }

    fn input_num(&mut self) -> Option<i32> {
        self.read_line()?.trim().parse().ok()
    }

    fn input_char(&mut self) -> Option<char> {
        self.read_line()?.chars().next()
    }

    fn wait(&mut self) {
        let _ = self.read_line();
    }
}

/// Records every call instead of touching the terminal; used by tests
/// that assert on the exact sequence of program output.
#[derive(Default)]
pub struct RecordingIo {
    pub output: String,
    pub input_nums: std::collections::VecDeque<i32>,
    pub input_chars: std::collections::VecDeque<char>,
    pub waits: usize,
}

impl RecordingIo {
    pub fn new() -> RecordingIo {
        RecordingIo::default()
    }

    pub fn with_input_nums(nums: impl IntoIterator<Item = i32>) -> RecordingIo {
        let mut io = RecordingIo::new();
        io.input_nums = nums.into_iter().collect();
        io
    }
}

impl Io for RecordingIo {
    fn print_num(&mut self, n: i32) {
        self.output.push_str(&format!("{} ", n));
    }

    fn print_char(&mut self, c: char) {
        self.output.push(c);
    }

    fn print_line(&mut self) {
        self.output.push('\n');
    }

    fn print_str(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn input_num(&mut self) -> Option<i32> {
        self.input_nums.pop_front()
    }

    fn input_char(&mut self) -> Option<char> {
        self.input_chars.pop_front()
    }

    fn wait(&mut self) {
        self.waits += 1;
    }
}
