//! Exercises `smasm` the way `smasm`'s own binary does: source text on
//! disk in, a checked-out `.smb` image on disk out.

use smvm::OpcodeTable;

#[test]
fn assembles_source_file_into_an_image_file() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("prog01.smt");
    let image_path = dir.path().join("prog01.smb");

    std::fs::write(&source_path, "5 7 add printnum end\n").unwrap();

    let source = std::fs::read_to_string(&source_path).unwrap();
    let table = OpcodeTable::default_table();
    let out = smasm::assemble(&source, &table, smasm::AssembleOptions::default()).unwrap();
    assert!(out.diagnostics.is_empty());

    smimage::write_file(&image_path, &out.image).unwrap();

    let loaded = smimage::read_file(&image_path).unwrap();
    assert_eq!(loaded, out.image);
    let bytes = loaded.addressable_bytes();
    assert_eq!(&bytes[0..4], b"SM11");
}

#[test]
fn unresolved_label_fails_without_writing_a_clean_image() {
    let table = OpcodeTable::default_table();
    let source = "jump nowhere\nend\n";
    let result = smasm::assemble(source, &table, smasm::AssembleOptions::default());
    assert!(result.is_err());
}
