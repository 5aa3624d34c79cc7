//! Path-name derivation and logging setup shared by `smasm`, `smrun` and
//! `smdis`. Kept out of the library crates proper: file-path convention
//! is a CLI-layer concern, not something `smvm`/`smimage`/`smasm` need
//! to know about.

use std::fs::File;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

pub const DEFAULT_BASE: &str = "prog01";

/// Strips a known extension and falls back to [`DEFAULT_BASE`], the way
/// every tool in this toolchain treats a missing positional argument.
pub fn base_name(arg: Option<&str>) -> String {
    let base = arg.unwrap_or(DEFAULT_BASE);
    for ext in [".smt", ".smb", ".smd", ".sml", ".smo"] {
        if let Some(stripped) = base.strip_suffix(ext) {
            return stripped.to_string();
        }
    }
    base.to_string()
}

pub fn smt_path(base: &str) -> PathBuf {
    PathBuf::from(format!("{base}.smt"))
}

pub fn smb_path(base: &str) -> PathBuf {
    PathBuf::from(format!("{base}.smb"))
}

pub fn smd_path(base: &str) -> PathBuf {
    PathBuf::from(format!("{base}.smd"))
}

pub fn smo_path(base: &str) -> PathBuf {
    PathBuf::from(format!("{base}.smo"))
}

/// Installs a `tracing` subscriber: `info` by default, overridable with
/// `RUST_LOG`, writing to `log_path` if given and to stderr otherwise.
/// Returns the open log file so callers keep it alive for the process
/// lifetime.
pub fn init_tracing(log_path: Option<&str>) -> Option<File> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_path {
        Some(path) => {
            let file = File::create(path).expect("cannot create log file");
            let writer = file.try_clone().expect("cannot clone log file handle");
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(move || writer.try_clone().expect("cannot clone log file handle"))
                .init();
            Some(file)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_extensions() {
        assert_eq!(base_name(Some("prog01.smt")), "prog01");
        assert_eq!(base_name(Some("prog01.smb")), "prog01");
        assert_eq!(base_name(Some("prog01")), "prog01");
    }

    #[test]
    fn defaults_when_absent() {
        assert_eq!(base_name(None), DEFAULT_BASE);
    }
}
