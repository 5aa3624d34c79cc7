//! The `Io` implementation `smrun` hands the VM: every program-output
//! call goes to the terminal and, mirroring the original tool's
//! `outfile`, to a `.smo` transcript file at the same time.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};

use smvm::io::Io;

pub struct TeeIo {
    stdout: io::Stdout,
    stdin: io::Stdin,
    transcript: BufWriter<File>,
}

impl TeeIo {
    pub fn new(transcript: File) -> TeeIo {
        TeeIo {
            stdout: io::stdout(),
            stdin: io::stdin(),
            transcript: BufWriter::new(transcript),
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

impl Io for TeeIo {
    fn print_num(&mut self, n: i32) {
        let _ = write!(self.stdout, "{n} ");
        let _ = write!(self.transcript, "{n} ");
    }

    fn print_char(&mut self, c: char) {
        let _ = write!(self.stdout, "{c}");
        let _ = write!(self.transcript, "{c}");
    }

    fn print_line(&mut self) {
        let _ = writeln!(self.stdout);
        let _ = writeln!(self.transcript);
    }

    fn print_str(&mut self, s: &str) {
        let _ = write!(self.stdout, "{s}");
        let _ = write!(self.transcript, "{s}");
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
