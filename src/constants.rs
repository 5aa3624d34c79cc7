//! Numeric constants shared across the opcode table, the assembler and
//! the VM: special opcodes callers need to recognize by value, and the
//! fixed capacity limits of the machine.

pub const CODE_STOP: u8 = 1;
pub const CODE_END: u8 = 2;
pub const CODE_DSRS: u8 = 10;
pub const CODE_RSDS: u8 = 11;
pub const CODE_DUP: u8 = 12;
pub const CODE_SUB: u8 = 22;
pub const CODE_JUMP: u8 = 30;
pub const CODE_JEQ: u8 = 31;
pub const CODE_CHAR: u8 = 70;
pub const CODE_STRING: u8 = 72;
pub const CODE_BYTE: u8 = 73;
pub const CODE_NUMBER: u8 = 74;

pub const CODE_SPACE: u8 = 32;

pub const HEADER_LEN: usize = 4;

/// Maximum depth of the data stack.
pub const DS_LEN: usize = 256;
/// Maximum depth of the return stack.
pub const RS_LEN: usize = 256;
/// Number of addressable memory cells.
pub const MEM_LEN: usize = 1024;
/// Maximum size of an assembled code body, in bytes.
pub const CODE_LEN: usize = 65535;
/// Maximum nesting depth of structured control forms.
pub const CTRL_LEN: usize = 255;

/// The modulus 16-bit arithmetic results are wrapped into before being
/// reinterpreted as signed two's-complement. The original interpreter
/// used 65636 here, a one-digit typo of 65536 that only matters once a
/// computation's raw magnitude exceeds the 16-bit range.
pub const WRAP_MOD: i64 = 65536;
pub const SIGNED_MIN: i64 = -32768;
pub const SIGNED_MAX: i64 = 32767;
