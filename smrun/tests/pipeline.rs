//! Exercises `smrun`'s library half against real source and image
//! files, the two input shapes its CLI accepts.

use smvm::io::RecordingIo;
use smvm::{Halt, OpcodeTable, VmOptions};

#[test]
fn runs_source_text_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("prog01.smt");
    std::fs::write(&source_path, "5 7 add printnum end\n").unwrap();

    let source = std::fs::read_to_string(&source_path).unwrap();
    let table = OpcodeTable::default_table();
    let image = smrun::assemble_source(&source, &table).unwrap();

    let mut io = RecordingIo::new();
    let halt = smrun::run_image(&image, &table, &mut io, VmOptions::default(), Some(1_000)).unwrap();
    assert_eq!(halt, Halt::End);
    assert_eq!(io.output, "12 ");
}

#[test]
fn runs_an_image_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("prog01.smb");

    let table = OpcodeTable::default_table();
    let assembled = smrun::assemble_source("5 7 add printnum end\n", &table).unwrap();
    smimage::write_file(&image_path, &assembled).unwrap();

    let loaded = smimage::read_file(&image_path).unwrap();
    let mut io = RecordingIo::new();
    let halt = smrun::run_image(&loaded, &table, &mut io, VmOptions::default(), Some(1_000)).unwrap();
    assert_eq!(halt, Halt::End);
    assert_eq!(io.output, "12 ");
}
