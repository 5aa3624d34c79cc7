//! The opcode table: the single source of truth for mnemonics, codes and
//! instruction widths, shared by the assembler, the VM and the
//! disassembler. Loaded once from a TSV asset and never mutated
//! afterwards, so it can be handed around as a plain shared reference.

use std::collections::HashMap;
use std::convert::TryFrom;

/// The canonical table baked into the binary at compile time.
pub const DEFAULT_TABLE: &str = include_str!("../opcodes.tsv");

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("line {line}: expected 4 tab-separated columns")]
    MalformedRow { line: usize },
    #[error("line {line}: opcode '{value}' is not a number")]
    BadCode { line: usize, value: String },
    #[error("line {line}: instruction width '{value}' must be 1, 2 or 3")]
    BadWidth { line: usize, value: String },
    #[error("line {line}: duplicate opcode {code}")]
    DuplicateCode { line: usize, code: u8 },
    #[error("line {line}: duplicate mnemonic '{mnemonic}'")]
    DuplicateMnemonic { line: usize, mnemonic: String },
}

/// The number of bytes an instruction occupies in the code stream,
/// including its opcode byte. `String` is an outlier: its table width is
/// one (the opcode byte alone), and the length-prefixed payload that
/// follows is consumed separately by whoever walks the code stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    One,
    Two,
    Three,
}

impl Width {
    pub fn len(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Three => 3,
        }
    }
}

impl TryFrom<u8> for Width {
    type Error = ();

    fn try_from(n: u8) -> Result<Width, ()> {
        match n {
            1 => Ok(Width::One),
            2 => Ok(Width::Two),
            3 => Ok(Width::Three),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub code: u8,
    pub mnemonic: String,
    pub width: Width,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct OpcodeTable {
    by_code: Vec<Option<OpcodeEntry>>,
    by_mnemonic: HashMap<String, OpcodeEntry>,
}

impl OpcodeTable {
    pub fn parse(text: &str) -> Result<OpcodeTable, TableError> {
        let mut by_code: Vec<Option<OpcodeEntry>> = vec![None; 256];
        let mut by_mnemonic = HashMap::new();

        for (idx, line) in text.lines().enumerate() {
            // the first line is a header, matching the original tool
            // which always discards one `readline()` before looping.
            if idx == 0 {
                continue;
            }
            let line_no = idx + 1;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let mut cols = line.splitn(4, '\t');
            let (code, mnemonic, width, description) = match (
                cols.next(),
                cols.next(),
                cols.next(),
                cols.next(),
            ) {
                (Some(c), Some(n), Some(b), Some(d)) => (c, n, b, d),
                _ => return Err(TableError::MalformedRow { line: line_no }),
            };

            let code: u8 = code.parse().map_err(|_| TableError::BadCode {
                line: line_no,
                value: code.to_string(),
            })?;
            let width_n: u8 = width.parse().map_err(|_| TableError::BadWidth {
                line: line_no,
                value: width.to_string(),
            })?;
            let width = Width::try_from(width_n).map_err(|_| TableError::BadWidth {
                line: line_no,
                value: width.to_string(),
            })?;

            let entry = OpcodeEntry {
                code,
                mnemonic: mnemonic.to_string(),
                width,
                description: description.to_string(),
            };

            if by_code[code as usize].is_some() {
                return Err(TableError::DuplicateCode { line: line_no, code });
            }
            if by_mnemonic.contains_key(&entry.mnemonic) {
                return Err(TableError::DuplicateMnemonic {
                    line: line_no,
                    mnemonic: entry.mnemonic,
                });
            }

            by_mnemonic.insert(entry.mnemonic.clone(), entry.clone());
            by_code[code as usize] = Some(entry);
        }

        Ok(OpcodeTable { by_code, by_mnemonic })
    }

    /// Loads the table baked into this binary.
    pub fn default_table() -> OpcodeTable {
        OpcodeTable::parse(DEFAULT_TABLE).expect("built-in opcode table is well-formed")
    }

    pub fn by_code(&self, code: u8) -> Option<&OpcodeEntry> {
        self.by_code[code as usize].as_ref()
    }

    /// Mnemonics are matched case-insensitively, the way the original
    /// tool's lower-case table did against whatever case the source used.
    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&OpcodeEntry> {
        self.by_mnemonic.get(&mnemonic.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_table() {
        let table = OpcodeTable::default_table();
        let add = table.by_mnemonic("add").unwrap();
        assert_eq!(add.code, 21);
        assert_eq!(add.width, Width::One);
        let number = table.by_code(74).unwrap();
        assert_eq!(number.mnemonic, "number");
        assert_eq!(number.width, Width::Three);
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        let table = OpcodeTable::default_table();
        assert_eq!(table.by_mnemonic("ADD").unwrap().code, 21);
    }

    #[test]
    fn rejects_duplicate_code() {
        let text = "code\tmnemonic\tbytes\tdescription\n1\tfoo\t1\ta\n1\tbar\t1\tb\n";
        assert!(matches!(
            OpcodeTable::parse(text),
            Err(TableError::DuplicateCode { .. })
        ));
    }

    #[test]
    fn rejects_bad_width() {
        let text = "code\tmnemonic\tbytes\tdescription\n1\tfoo\t9\ta\n";
        assert!(matches!(
            OpcodeTable::parse(text),
            Err(TableError::BadWidth { .. })
        ));
    }
}
