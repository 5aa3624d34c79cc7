use std::fs;
use std::process;

use clap::{App, Arg};
use smvm::{OpcodeTable, VmOptions};

use smrun::io::TeeIo;

enum Source {
    Image(smimage::Image),
    Text(String),
}

/// Resolves the positional argument to either a `.smb` image or `.smt`
/// source text: an explicit extension is honored as given; a bare base
/// name prefers an existing image, falling back to source, matching
/// `smasm`'s own output as the common case of "assemble then run".
fn resolve(raw: &str) -> Result<Source, String> {
    if raw.ends_with(".smt") {
        let text = fs::read_to_string(raw).map_err(|e| format!("cannot read {raw}: {e}"))?;
        return Ok(Source::Text(text));
    }
    if raw.ends_with(".smb") {
        let bytes = fs::read(raw).map_err(|e| format!("cannot read {raw}: {e}"))?;
        let image = smimage::Image::parse(&bytes).map_err(|e| format!("{raw}: {e}"))?;
        return Ok(Source::Image(image));
    }

    let base = smcli::base_name(Some(raw));
    let smb_path = smcli::smb_path(&base);
    if smb_path.exists() {
        let bytes = fs::read(&smb_path).map_err(|e| format!("cannot read {}: {}", smb_path.display(), e))?;
        let image = smimage::Image::parse(&bytes).map_err(|e| format!("{}: {}", smb_path.display(), e))?;
        return Ok(Source::Image(image));
    }
    let smt_path = smcli::smt_path(&base);
    let text = fs::read_to_string(&smt_path).map_err(|e| format!("cannot read {}: {}", smt_path.display(), e))?;
    Ok(Source::Text(text))
}

fn main() {
    let matches = App::new("smrun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs a stack machine program from bytecode or source text.")
        .arg(
            Arg::with_name("PROGRAM")
                .help("base name, .smt path, or .smb path; defaults to prog01")
                .index(1),
        )
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .takes_value(true)
                .default_value("1024")
                .help("number of memory cells available to fetch/store"),
        )
        .arg(
            Arg::with_name("steps")
                .long("steps")
                .takes_value(true)
                .help("halt after this many instructions instead of running forever"),
        )
        .arg(
            Arg::with_name("legacy-not")
                .long("legacy-not")
                .help("reproduce the original tool's always-pushes-1 `not` opcode"),
        )
        .arg(
            Arg::with_name("log")
                .long("log")
                .takes_value(true)
                .help("write a tracing log to this file instead of stderr"),
        )
        .get_matches();

    let _guard = smcli::init_tracing(matches.value_of("log"));

    let raw = matches.value_of("PROGRAM").unwrap_or(smcli::DEFAULT_BASE);
    let base = smcli::base_name(Some(raw));

    let memory_len: usize = match matches.value_of("memory").unwrap().parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("--memory must be a non-negative integer");
            process::exit(1);
        }
    };
    let step_budget: Option<u64> = match matches.value_of("steps").map(str::parse) {
        Some(Ok(n)) => Some(n),
        Some(Err(_)) => {
            eprintln!("--steps must be a non-negative integer");
            process::exit(1);
        }
        None => None,
    };

    let table = OpcodeTable::default_table();

    let image = match resolve(raw) {
        Ok(Source::Image(image)) => image,
        Ok(Source::Text(source)) => match smrun::assemble_source(&source, &table) {
            Ok(image) => image,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        },
        Err(message) => {
            eprintln!("{message}");
            process::exit(1);
        }
    };

    let output_path = smcli::smo_path(&base);
    let transcript = match fs::File::create(&output_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("cannot create {}: {}", output_path.display(), e);
            process::exit(1);
        }
    };

    let options = VmOptions {
        legacy_not: matches.is_present("legacy-not"),
        memory_len,
    };

    let mut io = TeeIo::new(transcript);
    match smrun::run_image(&image, &table, &mut io, options, step_budget) {
        Ok(halt) => {
            println!();
            println!("Exit: {halt:?}");
            tracing::info!(?halt, "program halted");
        }
        Err(err) => {
            println!();
            eprintln!("Runtime error: {err}");
            process::exit(1);
        }
    }
}
