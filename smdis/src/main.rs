use std::fs;
use std::process;

use clap::{App, Arg};
use smvm::OpcodeTable;

fn main() {
    let matches = App::new("smdis")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Disassembles a stack machine bytecode image into a human-readable listing.")
        .arg(
            Arg::with_name("PROGRAM")
                .help("base name or .smb path; defaults to prog01")
                .index(1),
        )
        .arg(
            Arg::with_name("log")
                .long("log")
                .takes_value(true)
                .help("write a tracing log to this file instead of stderr"),
        )
        .get_matches();

    let _guard = smcli::init_tracing(matches.value_of("log"));

    let base = smcli::base_name(matches.value_of("PROGRAM"));
    let image_path = smcli::smb_path(&base);
    let listing_path = smcli::smd_path(&base);

    let bytes = match fs::read(&image_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("cannot read {}: {}", image_path.display(), e);
            process::exit(1);
        }
    };

    let image = match smimage::Image::parse(&bytes) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("{}: {}", image_path.display(), e);
            process::exit(1);
        }
    };

    let table = OpcodeTable::default_table();
    let listing = match smdis::disassemble(&image.addressable_bytes(), &table) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}: {}", image_path.display(), e);
            process::exit(1);
        }
    };

    print!("{listing}");
    if let Err(e) = fs::write(&listing_path, &listing) {
        eprintln!("cannot write {}: {}", listing_path.display(), e);
        process::exit(1);
    }
    tracing::info!(path = %listing_path.display(), "wrote listing");
}
