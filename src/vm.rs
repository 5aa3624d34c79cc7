//! The interpreter: fetch-decode-execute loop over an assembled image,
//! operating on a bounded data stack, a bounded return stack, a block of
//! linear memory, and two condition flags.

use byteorder::ByteOrder;
use util::Endian;

use crate::constants::*;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::io::Io;
use crate::opcode::OpcodeTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub overflow: bool,
    pub error: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct VmOptions {
    /// Reproduce the historical `not` opcode, which always pushed 1
    /// regardless of its operand, for byte-for-byte parity testing
    /// against the original tool. Off by default: the corrected
    /// semantics (push 1 iff the operand is 0) is what `smasm`-emitted
    /// programs are expected to rely on.
    pub legacy_not: bool,
    /// Number of memory cells available to `fetch`/`store`.
    pub memory_len: usize,
}

impl Default for VmOptions {
    fn default() -> VmOptions {
        VmOptions {
            legacy_not: false,
            memory_len: MEM_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Hit the `stop` opcode.
    Stop,
    /// Hit the `end` opcode, or ran off the end of the image.
    End,
    /// Executed the caller-supplied step budget without halting.
    StepsExhausted,
}

pub struct Vm<'a> {
    table: &'a OpcodeTable,
    options: VmOptions,
    pc: usize,
    ds: Vec<i32>,
    rs: Vec<usize>,
    memory: Vec<i32>,
    flags: Flags,
}

/// Reduces a pre-wraparound arithmetic result modulo 65536 and
/// reinterprets it as signed two's-complement 16-bit, alongside whether
/// the raw, unreduced value would have overflowed a signed 16-bit range.
fn wrap16(raw: i64) -> (i32, bool) {
    let overflow = raw < SIGNED_MIN || raw > SIGNED_MAX;
    let wrapped = raw.rem_euclid(WRAP_MOD) as u16;
    (wrapped as i16 as i32, overflow)
}

/// Floor division, matching the original interpreter's use of Python's
/// `//` (rounds toward negative infinity, unlike Rust's truncating `/`
/// or Euclidean `div_euclid`, which disagree with it whenever the
/// divisor is negative).
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Floor modulo, matching Python's `%` (result takes the divisor's
/// sign), companion to [`floor_div`].
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

impl<'a> Vm<'a> {
    pub fn new(table: &'a OpcodeTable, options: VmOptions) -> Vm<'a> {
        let memory = vec![0; options.memory_len];
        Vm {
            table,
            options,
            pc: HEADER_LEN,
            ds: Vec::new(),
            rs: Vec::new(),
            memory,
            flags: Flags::default(),
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn data_stack(&self) -> &[i32] {
        &self.ds
    }

    pub fn return_stack(&self) -> &[usize] {
        &self.rs
    }

    pub fn memory(&self) -> &[i32] {
        &self.memory
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    fn fail(&self, kind: RuntimeErrorKind) -> RuntimeError {
        RuntimeError {
            kind,
            pc: self.pc as u16,
            ds_depth: self.ds.len(),
            rs_depth: self.rs.len(),
            flags: self.flags,
        }
    }

    fn pop_ds(&mut self) -> Result<i32, RuntimeError> {
        self.ds.pop().ok_or_else(|| self.fail(RuntimeErrorKind::DataStackUnderflow))
    }

    fn push_ds(&mut self, v: i32) -> Result<(), RuntimeError> {
        if self.ds.len() >= DS_LEN {
            return Err(self.fail(RuntimeErrorKind::DataStackOverflow));
        }
        self.ds.push(v);
        Ok(())
    }

    fn pop_rs(&mut self) -> Result<usize, RuntimeError> {
        self.rs.pop().ok_or_else(|| self.fail(RuntimeErrorKind::ReturnStackUnderflow))
    }

    fn push_rs(&mut self, v: usize) -> Result<(), RuntimeError> {
        if self.rs.len() >= RS_LEN {
            return Err(self.fail(RuntimeErrorKind::ReturnStackOverflow));
        }
        self.rs.push(v);
        Ok(())
    }

    fn check_address(&self, a: i32) -> Result<usize, RuntimeError> {
        if a < 0 || a as usize >= self.memory.len() {
            return Err(self.fail(RuntimeErrorKind::BadAddress));
        }
        Ok(a as usize)
    }

    /// Reads the big-endian 16-bit address immediate at `bytes[pc+1..pc+3]`.
    fn read_addr(&self, bytes: &[u8], pc: usize) -> u16 {
        Endian::read_u16(&bytes[pc + 1..pc + 3])
    }

    /// Reads the sign-magnitude 16-bit immediate at `bytes[pc+1..pc+3]`:
    /// the top bit of the first byte is the sign, the remaining 15 bits
    /// hold the magnitude. `-0` is a representable encoding and reads as
    /// zero.
    fn read_number(&self, bytes: &[u8], pc: usize) -> i32 {
        let x1 = bytes[pc + 1];
        let x2 = bytes[pc + 2];
        let negative = x1 & 0x80 != 0;
        let magnitude = ((x1 & 0x7f) as i32) * 256 + x2 as i32;
        if negative {
            -magnitude
        } else {
            magnitude
        }
    }

    fn arith(&mut self, raw: i64) -> i32 {
        let (value, overflow) = wrap16(raw);
        self.flags.overflow = overflow;
        value
    }

    /// Runs from the current program counter until the program halts,
    /// faults, or `step_budget` instructions have executed.
    /// `bytes` is the header-plus-body buffer an assembled image
    /// produces via `smimage::Image::addressable_bytes`; jump and call
    /// targets are absolute offsets into it.
    pub fn run(
        &mut self,
        bytes: &[u8],
        io: &mut dyn Io,
        step_budget: Option<u64>,
    ) -> Result<Halt, RuntimeError> {
        let mut steps = 0u64;
        loop {
            if self.pc >= bytes.len() {
                return Ok(Halt::End);
            }
            if let Some(budget) = step_budget {
                if steps >= budget {
                    return Ok(Halt::StepsExhausted);
                }
            }
            steps += 1;

            let code = bytes[self.pc];
            tracing::trace!(pc = self.pc, code, "step");

            match code {
                0 => {
                    // noop
                    self.pc += 1;
                }
                CODE_STOP => return Ok(Halt::Stop),
                CODE_END => return Ok(Halt::End),

                CODE_DSRS => {
                    let v = self.pop_ds()?;
                    self.push_rs(v as usize)?;
                    self.pc += 1;
                }
                CODE_RSDS => {
                    let v = self.pop_rs()?;
                    self.push_ds(v as i32)?;
                    self.pc += 1;
                }
                CODE_DUP => {
                    let v = *self.ds.last().ok_or_else(|| self.fail(RuntimeErrorKind::DataStackUnderflow))?;
                    self.push_ds(v)?;
                    self.pc += 1;
                }
                13 => {
                    // drop
                    self.pop_ds()?;
                    self.pc += 1;
                }
                14 => {
                    // rot
                    if self.ds.len() < 2 {
                        return Err(self.fail(RuntimeErrorKind::DataStackUnderflow));
                    }
                    let n = self.pop_ds()? as usize;
                    let len = self.ds.len();
                    if n == 0 || n > len {
                        return Err(self.fail(RuntimeErrorKind::DataStackUnderflow));
                    }
                    let v = self.ds.remove(len - n);
                    self.ds.push(v);
                    self.pc += 1;
                }
                15 => {
                    // over
                    if self.ds.len() < 2 {
                        return Err(self.fail(RuntimeErrorKind::DataStackUnderflow));
                    }
                    let n = self.pop_ds()? as usize;
                    let len = self.ds.len();
                    if n == 0 || n > len {
                        return Err(self.fail(RuntimeErrorKind::DataStackUnderflow));
                    }
                    let v = self.ds[len - n];
                    self.push_ds(v)?;
                    self.pc += 1;
                }
                16 => {
                    // swap
                    let len = self.ds.len();
                    if len < 2 {
                        return Err(self.fail(RuntimeErrorKind::DataStackUnderflow));
                    }
                    self.ds.swap(len - 1, len - 2);
                    self.pc += 1;
                }

                20 => {
                    // neg
                    let v = self.pop_ds()?;
                    self.push_ds(-v)?;
                    self.pc += 1;
                }
                21 => {
                    // add
                    let b = self.pop_ds()? as i64;
                    let a = self.pop_ds()? as i64;
                    let v = self.arith(a + b);
                    self.push_ds(v)?;
                    self.pc += 1;
                }
                CODE_SUB => {
                    let b = self.pop_ds()? as i64;
                    let a = self.pop_ds()? as i64;
                    let v = self.arith(a - b);
                    self.push_ds(v)?;
                    self.pc += 1;
                }
                23 => {
                    // mul
                    let b = self.pop_ds()? as i64;
                    let a = self.pop_ds()? as i64;
                    let v = self.arith(a * b);
                    self.push_ds(v)?;
                    self.pc += 1;
                }
                24 => {
                    // div, floor division
                    self.flags.overflow = false;
                    self.flags.error = false;
                    let b = self.pop_ds()? as i64;
                    let a = self.pop_ds()? as i64;
                    if b == 0 {
                        self.flags.error = true;
                        self.push_ds(0)?;
                    } else {
                        let v = self.arith(floor_div(a, b));
                        self.push_ds(v)?;
                    }
                    self.pc += 1;
                }
                25 => {
                    // mod, floor modulo
                    self.flags.overflow = false;
                    self.flags.error = false;
                    let b = self.pop_ds()? as i64;
                    let a = self.pop_ds()? as i64;
                    if b == 0 {
                        self.flags.error = true;
                        self.push_ds(0)?;
                    } else {
                        let v = self.arith(floor_mod(a, b));
                        self.push_ds(v)?;
                    }
                    self.pc += 1;
                }
                26 => {
                    // not
                    let v = self.pop_ds()?;
                    let result = if self.options.legacy_not {
                        1
                    } else if v == 0 {
                        1
                    } else {
                        0
                    };
                    self.push_ds(result)?;
                    self.pc += 1;
                }
                27 => {
                    // random
                    let v = rand::thread_rng().gen_range(0..=65535);
                    self.push_ds(v)?;
                    self.pc += 1;
                }

                CODE_JUMP => {
                    self.pc = self.read_addr(bytes, self.pc) as usize;
                }
                CODE_JEQ => {
                    let v = self.pop_ds()?;
                    self.pc = if v == 0 {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }
                32 => {
                    // jne
                    let v = self.pop_ds()?;
                    self.pc = if v != 0 {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }
                33 => {
                    // jge
                    let v = self.pop_ds()?;
                    self.pc = if v >= 0 {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }
                34 => {
                    // jgt
                    let v = self.pop_ds()?;
                    self.pc = if v > 0 {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }
                35 => {
                    // jle
                    let v = self.pop_ds()?;
                    self.pc = if v <= 0 {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }
                36 => {
                    // jlt
                    let v = self.pop_ds()?;
                    self.pc = if v < 0 {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }
                37 => {
                    // jof
                    self.pc = if self.flags.overflow {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }
                38 => {
                    // jef
                    self.pc = if self.flags.error {
                        self.read_addr(bytes, self.pc) as usize
                    } else {
                        self.pc + 3
                    };
                }

                40 => {
                    // calld
                    self.push_rs(self.pc + 3)?;
                    self.pc = self.read_addr(bytes, self.pc) as usize;
                }
                41 => {
                    // calli
                    let target = self.pop_ds()?;
                    self.push_rs(self.pc + 1)?;
                    self.pc = target as usize;
                }
                42 => {
                    // return
                    self.pc = self.pop_rs()?;
                }

                50 => {
                    // fetch
                    let a = self.pop_ds()?;
                    let idx = self.check_address(a)?;
                    self.push_ds(self.memory[idx])?;
                    self.pc += 1;
                }
                51 => {
                    // store
                    let a = self.pop_ds()?;
                    let v = self.pop_ds()?;
                    let idx = self.check_address(a)?;
                    self.memory[idx] = v;
                    self.pc += 1;
                }

                60 => {
                    // printnum
                    let v = self.pop_ds()?;
                    io.print_num(v);
                    self.pc += 1;
                }
                61 => {
                    // printchar
                    let v = self.pop_ds()?;
                    let c = char::from_u32(v as u32).unwrap_or('\u{FFFD}');
                    io.print_char(c);
                    self.pc += 1;
                }
                62 => {
                    // println
                    io.print_line();
                    self.pc += 1;
                }
                63 => {
                    // show
                    tracing::info!(
                        pc = self.pc,
                        ds = ?self.ds,
                        rs = ?self.rs,
                        flags = ?self.flags,
                        "show"
                    );
                    self.pc += 1;
                }
                64 => {
                    // dump
                    tracing::info!(
                        pc = self.pc,
                        ds = ?self.ds,
                        rs = ?self.rs,
                        flags = ?self.flags,
                        memory = ?self.memory,
                        "dump"
                    );
                    self.pc += 1;
                }
                65 => {
                    // wait
                    io.wait();
                    self.pc += 1;
                }
                66 => {
                    // inputnum
                    let v = io.input_num().ok_or_else(|| self.fail(RuntimeErrorKind::BadInputNumber))?;
                    self.push_ds(v)?;
                    self.pc += 1;
                }
                67 => {
                    // inputchar
                    let c = io.input_char().ok_or_else(|| self.fail(RuntimeErrorKind::EmptyInput))?;
                    self.push_ds(c as i32)?;
                    self.pc += 1;
                }
                68 => {
                    // printstr
                    let addr = self.pop_ds()?;
                    if addr < 0 || addr as usize >= bytes.len() {
                        return Err(self.fail(RuntimeErrorKind::BadAddress));
                    }
                    let addr = addr as usize;
                    let len = bytes[addr] as usize;
                    let end = addr + 1 + len;
                    if end > bytes.len() {
                        return Err(self.fail(RuntimeErrorKind::BadAddress));
                    }
                    let s: String = bytes[addr + 1..end].iter().map(|&b| b as char).collect();
                    io.print_str(&s);
                    self.pc += 1;
                }

                CODE_CHAR => {
                    let c = bytes[self.pc + 1];
                    self.push_ds(c as i32)?;
                    self.pc += 2;
                }
                71 => {
                    // space
                    self.push_ds(CODE_SPACE as i32)?;
                    self.pc += 1;
                }
                CODE_STRING => {
                    let len = bytes[self.pc + 1] as usize;
                    self.push_ds((self.pc + 1) as i32)?;
                    self.pc += len + 2;
                }
                CODE_BYTE => {
                    let v = bytes[self.pc + 1];
                    self.push_ds(v as i32)?;
                    self.pc += 2;
                }
                CODE_NUMBER => {
                    let v = self.read_number(bytes, self.pc);
                    self.push_ds(v)?;
                    self.pc += 3;
                }
                75 => {
                    // addr
                    let v = self.read_addr(bytes, self.pc);
                    self.push_ds(v as i32)?;
                    self.pc += 3;
                }

                other => {
                    if self.table.by_code(other).is_none() {
                        tracing::error!(pc = self.pc, code = other, "illegal opcode");
                    }
                    return Err(self.fail(RuntimeErrorKind::IllegalOpcode));
                }
            }
        }
    }
}

use rand::Rng;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RecordingIo;

    fn table() -> OpcodeTable {
        OpcodeTable::default_table()
    }

    fn run_bytes(body: Vec<u8>) -> (Halt, RecordingIo, Vm<'static>) {
        let table = Box::leak(Box::new(table()));
        let mut full = vec![b'S', b'M', b'1', b'1'];
        full.extend(body);
        let mut vm = Vm::new(table, VmOptions::default());
        let mut io = RecordingIo::new();
        let halt = vm.run(&full, &mut io, Some(10_000)).unwrap();
        (halt, io, vm)
    }

    #[test]
    fn add_and_print() {
        // number 5, number 7, add, printnum, end
        let body = vec![
            74, 0, 5, // number 5
            74, 0, 7, // number 7
            21, // add
            60, // printnum
            2,  // end
        ];
        let (halt, io, _vm) = run_bytes(body);
        assert_eq!(halt, Halt::End);
        assert_eq!(io.output, "12 ");
    }

    #[test]
    fn division_by_zero_sets_error_flag() {
        let body = vec![
            73, 5, // byte 5
            73, 0, // byte 0
            24, // div
            2,  // end
        ];
        let (_halt, _io, vm) = run_bytes(body);
        assert!(vm.flags().error);
        assert_eq!(vm.data_stack(), &[0]);
    }

    #[test]
    fn overflow_wraps_and_sets_flag() {
        // 32767 + 1 should overflow and wrap to -32768
        let body = vec![
            74, 127, 255, // number 32767
            73, 1, // byte 1
            21, // add
            2,
        ];
        let (_halt, _io, vm) = run_bytes(body);
        assert!(vm.flags().overflow);
        assert_eq!(vm.data_stack(), &[-32768]);
    }

    #[test]
    fn not_pushes_one_iff_zero() {
        let body = vec![73, 0, 26, 73, 5, 26, 2];
        let (_halt, _io, vm) = run_bytes(body);
        assert_eq!(vm.data_stack(), &[1, 0]);
    }

    #[test]
    fn div_and_mod_round_toward_negative_infinity() {
        // byte 7, number -2, div, byte 7, number -2, mod, end
        // matches Python's `7 // -2 == -4` and `7 % -2 == -1`, not Rust's
        // truncating `/` (-3) or Euclidean `div_euclid` (-4, 1).
        let body = vec![
            73, 7, // byte 7
            74, 0x80 | 0, 2, // number -2
            24, // div
            73, 7, // byte 7
            74, 0x80 | 0, 2, // number -2
            25, // mod
            2,  // end
        ];
        let (_halt, _io, vm) = run_bytes(body);
        assert_eq!(vm.data_stack(), &[-4, -1]);
    }

    #[test]
    fn stack_underflow_is_reported() {
        let table = table();
        let mut full = vec![b'S', b'M', b'1', b'1'];
        full.push(13); // drop with nothing on the stack
        let mut vm = Vm::new(&table, VmOptions::default());
        let mut io = RecordingIo::new();
        let err = vm.run(&full, &mut io, Some(10)).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::DataStackUnderflow);
    }
}
