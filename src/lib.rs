//! Opcode table and interpreter for the stack machine bytecode format.
//!
//! This crate owns the one piece of data every other tool in the
//! toolchain needs: the mapping from mnemonics to opcodes and
//! instruction widths. The assembler and the disassembler both depend
//! on this crate purely to reuse [`opcode::OpcodeTable`]; only `smrun`
//! also drives [`vm::Vm`].

pub mod constants;
pub mod error;
pub mod io;
pub mod opcode;
pub mod vm;

pub use error::{RuntimeError, RuntimeErrorKind};
pub use opcode::{OpcodeEntry, OpcodeTable, Width};
pub use vm::{Flags, Halt, Vm, VmOptions};
