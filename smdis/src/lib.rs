//! Renders an assembled bytecode image back into a human-readable
//! listing: a linear walk over the body using the widths `smvm`'s
//! opcode table declares, with no execution and no label recovery.

use std::fmt::Write as _;

use smvm::opcode::Width;
use smvm::OpcodeTable;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Image(#[from] smimage::Error),
    #[error("offset {offset}: opcode {code} has no entry in the opcode table")]
    UnknownOpcode { offset: usize, code: u8 },
    #[error("offset {offset}: instruction truncated before its operand")]
    Truncated { offset: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decodes the sign-magnitude 16-bit immediate at `bytes[at..at+2]`, the
/// way `number` (74) literals are encoded: top bit of the first byte is
/// the sign, the remaining 15 bits plus the second byte are the
/// magnitude.
fn decode_signed(hi: u8, lo: u8) -> i32 {
    let negative = hi & 0x80 != 0;
    let magnitude = ((hi & 0x7f) as i32) * 256 + lo as i32;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

const HEADER_ROW: &str = "addr dec (xx) opname     params";
const DIVIDER_ROW: &str = "---- --- ---- ---------- ------";

/// Disassembles a parsed image's addressable bytes (header + body, the
/// same buffer the VM treats as its address space) into a listing
/// string, header row first.
pub fn disassemble(bytes: &[u8], table: &OpcodeTable) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{HEADER_ROW}").unwrap();
    writeln!(out, "{DIVIDER_ROW}").unwrap();

    let mut pc = smvm::constants::HEADER_LEN;
    while pc < bytes.len() {
        let code = bytes[pc];
        let entry = table
            .by_code(code)
            .ok_or(Error::UnknownOpcode { offset: pc, code })?;

        match entry.width {
            Width::One => {
                write!(out, "{pc:04} {code:03} ({code:02X}) {:10}", entry.mnemonic).unwrap();
                if code == smvm::constants::CODE_STRING {
                    let len_at = pc + 1;
                    if len_at >= bytes.len() {
                        return Err(Error::Truncated { offset: pc });
                    }
                    let len = bytes[len_at] as usize;
                    let end = len_at + 1 + len;
                    if end > bytes.len() {
                        return Err(Error::Truncated { offset: pc });
                    }
                    let text: String = bytes[len_at + 1..end].iter().map(|&b| b as char).collect();
                    write!(out, " {len}:{text}").unwrap();
                    pc = end;
                } else {
                    pc += 1;
                }
                writeln!(out).unwrap();
                if code == smvm::constants::CODE_STOP || code == smvm::constants::CODE_END {
                    break;
                }
            }
            Width::Two => {
                if pc + 1 >= bytes.len() {
                    return Err(Error::Truncated { offset: pc });
                }
                let operand = bytes[pc + 1];
                writeln!(out, "{pc:04} {code:03} ({code:02X}) {:10} {operand:4}", entry.mnemonic).unwrap();
                pc += 2;
            }
            Width::Three => {
                if pc + 2 >= bytes.len() {
                    return Err(Error::Truncated { offset: pc });
                }
                let hi = bytes[pc + 1];
                let lo = bytes[pc + 2];
                if entry.mnemonic == "number" {
                    let value = decode_signed(hi, lo);
                    writeln!(
                        out,
                        "{pc:04} {code:03} ({code:02X}) {:10} {hi:4} {lo:4} ({value})",
                        entry.mnemonic
                    )
                    .unwrap();
                } else {
                    writeln!(out, "{pc:04} {code:03} ({code:02X}) {:10} {hi:4} {lo:4}", entry.mnemonic).unwrap();
                }
                pc += 3;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> OpcodeTable {
        OpcodeTable::default_table()
    }

    #[test]
    fn disassembles_add_and_print() {
        let table = table();
        let mut bytes = vec![b'S', b'M', b'1', b'1'];
        bytes.extend(vec![74, 0, 5, 74, 0, 7, 21, 60, 2]);
        let listing = disassemble(&bytes, &table).unwrap();
        assert!(listing.contains("number"));
        assert!(listing.contains("(5)"));
        assert!(listing.contains("add"));
        assert!(listing.contains("printnum"));
        assert!(listing.ends_with("end\n"));
    }

    #[test]
    fn stops_after_first_end_or_stop() {
        let table = table();
        let mut bytes = vec![b'S', b'M', b'1', b'1'];
        bytes.extend(vec![2, 60]); // end, printnum (unreachable)
        let listing = disassemble(&bytes, &table).unwrap();
        assert_eq!(listing.lines().count(), 3);
    }

    #[test]
    fn renders_hollerith_string() {
        let table = table();
        let mut bytes = vec![b'S', b'M', b'1', b'1'];
        bytes.extend(vec![72, 2, b'h', b'i', 2]);
        let listing = disassemble(&bytes, &table).unwrap();
        assert!(listing.contains("2:hi"));
    }

    #[test]
    fn jump_target_is_not_sign_decoded() {
        let table = table();
        let mut bytes = vec![b'S', b'M', b'1', b'1'];
        // jump to absolute offset 0x0104 = 260; high byte has its
        // top bit clear here so this also guards against accidentally
        // reusing the sign-magnitude decoder on an address operand.
        bytes.extend(vec![30, 1, 4, 2]);
        let listing = disassemble(&bytes, &table).unwrap();
        let jump_line = listing.lines().find(|l| l.contains("jump")).unwrap();
        assert!(!jump_line.contains('('));
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let table = table();
        let mut bytes = vec![b'S', b'M', b'1', b'1'];
        bytes.push(255);
        assert!(matches!(disassemble(&bytes, &table), Err(Error::UnknownOpcode { .. })));
    }
}
