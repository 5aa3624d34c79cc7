//! Exercises the full `smasm` → disk → `smdis` path: an image written
//! to a real file by one tool, read back and disassembled by the other.

use smvm::OpcodeTable;

#[test]
fn disassembles_an_assembled_image_round_tripped_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("prog01.smb");

    let table = OpcodeTable::default_table();
    let out = smasm::assemble("5 7 add printnum end\n", &table, smasm::AssembleOptions::default()).unwrap();
    smimage::write_file(&image_path, &out.image).unwrap();

    let loaded = smimage::read_file(&image_path).unwrap();
    let listing = smdis::disassemble(&loaded.addressable_bytes(), &table).unwrap();

    assert!(listing.starts_with("addr dec"));
    assert!(listing.contains("byte"));
    assert!(listing.contains("add"));
    assert!(listing.contains("printnum"));
    assert!(listing.contains("end"));
}

#[test]
fn rejects_an_image_with_a_corrupted_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("prog01.smb");

    let table = OpcodeTable::default_table();
    let out = smasm::assemble("end\n", &table, smasm::AssembleOptions::default()).unwrap();
    let mut bytes = out.image.to_bytes().unwrap();
    let last = bytes.len() - 1;
    bytes[last] = bytes[last].wrapping_add(1);
    std::fs::write(&image_path, &bytes).unwrap();

    let err = smimage::read_file(&image_path).unwrap_err();
    assert!(matches!(err, smimage::Error::BadChecksum { .. }));
}
