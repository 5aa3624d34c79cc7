//! Assembles stack machine source text (`.smt`) into a bytecode image.

pub mod assembler;
pub mod error;
pub mod pseudo;

use smimage::Image;
use smvm::constants::CODE_END;
use smvm::OpcodeTable;

pub use assembler::{AssembleOptions, Assembler};
pub use error::{AssembleDiagnostic, DiagnosticKind, Error, Severity};

pub struct AssembleOutput {
    pub image: Image,
    pub diagnostics: Vec<AssembleDiagnostic>,
}

/// Assembles `source` against `table`, returning the finished image plus
/// every diagnostic collected along the way (there can be more than one:
/// assembly is single-pass but doesn't stop at the first problem unless
/// it's one the original tool itself treated as file-terminating, like a
/// duplicate label).
pub fn assemble(source: &str, table: &OpcodeTable, options: AssembleOptions) -> Result<AssembleOutput, Error> {
    let mut assembler = Assembler::new(table);
    let body = assembler.assemble(source, &options);
    let diagnostics = assembler.diagnostics().to_vec();

    if assembler.has_errors() && !options.emit_partial_on_error {
        return Err(Error::Failed(diagnostics));
    }

    let mut image = Image::from_body(body);
    image.ensure_trailer(CODE_END);
    Ok(AssembleOutput { image, diagnostics })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> OpcodeTable {
        OpcodeTable::default_table()
    }

    #[test]
    fn assembles_add_and_print() {
        let table = table();
        let source = "number 5\nnumber 7\nadd\nprintnum\nend\n";
        let out = assemble(source, &table, AssembleOptions::default()).unwrap();
        assert!(out.diagnostics.is_empty());
        let bytes = out.image.addressable_bytes();
        assert_eq!(&bytes[0..4], b"SM11");
    }

    #[test]
    fn resolves_forward_label_in_if() {
        let table = table();
        let source = "byte 0\nif\nbyte 1\nprintnum\nthen\nend\n";
        let out = assemble(source, &table, AssembleOptions::default()).unwrap();
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn duplicate_label_is_fatal() {
        let table = table();
        let source = "label here\nlabel here\nend\n";
        let result = assemble(source, &table, AssembleOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn unresolved_label_is_fatal() {
        let table = table();
        let source = "jump nowhere\nend\n";
        let result = assemble(source, &table, AssembleOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn partial_image_opt_in_survives_errors() {
        let table = table();
        let source = "jump nowhere\nend\n";
        let options = AssembleOptions { emit_partial_on_error: true };
        let out = assemble(source, &table, options).unwrap();
        assert!(!out.diagnostics.is_empty());
    }

    #[test]
    fn const_emits_byte_or_number() {
        let table = table();
        let source = "const small 3\nconst big 1000\nsmall\nbig\nend\n";
        let out = assemble(source, &table, AssembleOptions::default()).unwrap();
        assert!(out.diagnostics.is_empty());
        let body = out.image.body();
        assert_eq!(body[0], 73); // byte
        assert_eq!(body[1], 3);
        assert_eq!(body[2], 74); // number
    }

    #[test]
    fn macro_expands_with_params() {
        let table = table();
        let source = "macro addtwo\nnumber $0\nnumber $1\nadd\n\n_addtwo 2 3\nprintnum\nend\n";
        let out = assemble(source, &table, AssembleOptions::default()).unwrap();
        assert!(out.diagnostics.is_empty());
        let body = out.image.body();
        assert_eq!(body[0], 74); // number
    }
}
