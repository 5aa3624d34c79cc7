use std::fs;
use std::process;

use clap::{App, Arg};
use smvm::OpcodeTable;

use smasm::{assemble, AssembleOptions};

fn main() {
    let matches = App::new("smasm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assembles stack machine source text into a bytecode image.")
        .arg(
            Arg::with_name("PROGRAM")
                .help("base name or .smt path; defaults to prog01")
                .index(1),
        )
        .arg(
            Arg::with_name("emit-partial")
                .long("emit-partial")
                .help("write the image even if assembly reported errors"),
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
    let source_path = smcli::smt_path(&base);
    let image_path = smcli::smb_path(&base);

    let source = match fs::read_to_string(&source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read {}: {}", source_path.display(), e);
            process::exit(1);
        }
    };

    let table = OpcodeTable::default_table();
    let options = AssembleOptions {
        emit_partial_on_error: matches.is_present("emit-partial"),
    };

    match assemble(&source, &table, options) {
        Ok(out) => {
            for diag in &out.diagnostics {
                eprintln!("{diag}");
            }
            if let Err(e) = smimage::write_file(&image_path, &out.image) {
                eprintln!("cannot write {}: {}", image_path.display(), e);
                process::exit(1);
            }
            tracing::info!(path = %image_path.display(), "wrote image");
            if !out.diagnostics.is_empty() {
                process::exit(1);
            }
        }
        Err(smasm::Error::Failed(diagnostics)) => {
            for diag in &diagnostics {
                eprintln!("{diag}");
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
