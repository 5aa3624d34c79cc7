use crate::vm::Flags;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    #[error("data stack overflow")]
    DataStackOverflow,
    #[error("data stack underflow")]
    DataStackUnderflow,
    #[error("return stack overflow")]
    ReturnStackOverflow,
    #[error("return stack underflow")]
    ReturnStackUnderflow,
    #[error("memory address out of range")]
    BadAddress,
    #[error("illegal opcode")]
    IllegalOpcode,
    #[error("malformed input number")]
    BadInputNumber,
    #[error("empty input where a character was expected")]
    EmptyInput,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind} at pc={pc} (ds depth {ds_depth}, rs depth {rs_depth}, flags {flags:?})")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub pc: u16,
    pub ds_depth: usize,
    pub rs_depth: usize,
    pub flags: Flags,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
