//! Runs an assembled stack machine program: either a `.smb` image
//! loaded straight through `smimage`, or `.smt` source text assembled
//! in memory first via `smasm`. The binary half of this crate only
//! adds path resolution and the terminal/transcript `Io`; the pipeline
//! itself lives here so it can be driven from tests without touching a
//! filesystem or stdio.

pub mod io;

use smvm::io::Io;
use smvm::{Halt, OpcodeTable, RuntimeError, Vm, VmOptions};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Assemble(#[from] smasm::Error),
    #[error(transparent)]
    Image(#[from] smimage::Error),
}

/// Assembles `source` against `table` and returns the resulting image,
/// failing on any fatal assembly diagnostic (never running a program
/// `smasm` itself would have refused to emit cleanly).
pub fn assemble_source(source: &str, table: &OpcodeTable) -> Result<smimage::Image, Error> {
    let out = smasm::assemble(source, table, smasm::AssembleOptions::default())?;
    Ok(out.image)
}

/// Runs `image` to completion (or until `step_budget` instructions have
/// executed), reporting output and input through `io`.
pub fn run_image(
    image: &smimage::Image,
    table: &OpcodeTable,
    io: &mut dyn Io,
    options: VmOptions,
    step_budget: Option<u64>,
) -> Result<Halt, RuntimeError> {
    let bytes = image.addressable_bytes();
    let mut vm = Vm::new(table, options);
    vm.run(&bytes, io, step_budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smvm::io::RecordingIo;

    fn table() -> OpcodeTable {
        OpcodeTable::default_table()
    }

    #[test]
    fn assembles_and_runs_add() {
        let table = table();
        let image = assemble_source("5 7 add printnum end\n", &table).unwrap();
        let mut io = RecordingIo::new();
        let halt = run_image(&image, &table, &mut io, VmOptions::default(), Some(1_000)).unwrap();
        assert_eq!(halt, Halt::End);
        assert_eq!(io.output, "12 ");
    }

    #[test]
    fn counts_down_with_a_label_loop() {
        let table = table();
        let source = "10 label top dup printnum 1 sub dup jeq out jump top label out drop end\n";
        let image = assemble_source(source, &table).unwrap();
        let mut io = RecordingIo::new();
        let halt = run_image(&image, &table, &mut io, VmOptions::default(), Some(10_000)).unwrap();
        assert_eq!(halt, Halt::End);
        assert_eq!(io.output, "10 9 8 7 6 5 4 3 2 1 ");
    }

    #[test]
    fn step_budget_halts_a_non_terminating_program() {
        let table = table();
        let source = "label l 1 printnum jump l end\n";
        let image = assemble_source(source, &table).unwrap();
        let mut io = RecordingIo::new();
        // One iteration is `byte, printnum, jump` — 3 steps per print, so
        // 5 prints need a budget of 15, not 5.
        let halt = run_image(&image, &table, &mut io, VmOptions::default(), Some(15)).unwrap();
        assert_eq!(halt, Halt::StepsExhausted);
        assert_eq!(io.output, "1 1 1 1 1 ");
    }

    #[test]
    fn overflow_flag_branches_to_handler() {
        let table = table();
        let source = r#"32000 32000 add jof ov printnum end label ov "overflow" printstr end"#;
        let image = assemble_source(source, &table).unwrap();
        let mut io = RecordingIo::new();
        let halt = run_image(&image, &table, &mut io, VmOptions::default(), Some(1_000)).unwrap();
        assert_eq!(halt, Halt::End);
        assert_eq!(io.output, "overflow");
    }

    #[test]
    fn divide_by_zero_sets_error_and_branches() {
        let table = table();
        let source = r#"5 0 div jef err printnum end label err "divzero" printstr end"#;
        let image = assemble_source(source, &table).unwrap();
        let mut io = RecordingIo::new();
        let halt = run_image(&image, &table, &mut io, VmOptions::default(), Some(1_000)).unwrap();
        assert_eq!(halt, Halt::End);
        assert_eq!(io.output, "divzero");
    }

    #[test]
    fn loaded_image_rejects_mutated_checksum() {
        let table = table();
        let image = assemble_source("end\n", &table).unwrap();
        let mut bytes = image.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] = bytes[last].wrapping_add(1);
        assert!(smimage::Image::parse(&bytes).is_err());
    }
}
