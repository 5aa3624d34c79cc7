//! The single-pass assembler: tokenizes `.smt` source line by line,
//! expands macros textually before tokenizing, emits opcode bytes and
//! inline literals directly into the code body, and back-patches label
//! references once the whole source has been walked.

use std::collections::HashMap;

use byteorder::ByteOrder;
use util::Endian;

use smvm::constants::{CODE_BYTE, CODE_CHAR, CODE_DSRS, CODE_DUP, CODE_END, CODE_JEQ, CODE_JUMP, CODE_NUMBER, CODE_RSDS, CODE_STRING, CODE_SUB, CODE_LEN, HEADER_LEN};
use smvm::OpcodeTable;

use crate::error::{AssembleDiagnostic, DiagnosticKind, Severity};
use crate::pseudo::Pseudo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CtrlKind {
    If,
    IfElse,
    Begin,
    Do,
}

#[derive(Debug, Clone, Copy)]
struct ControlFrame {
    kind: CtrlKind,
    level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Normal,
    DefConst1,
    DefConst2 { name: String },
    DefLabel,
    RefLabel,
    GetByte,
    GetNumber,
    GetChar,
    GetString,
    MacroDef { name: String },
}

#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    /// Emit the image produced so far even when assembly hit a fatal
    /// diagnostic, the way the original tool always wrote its output
    /// file regardless of `isError`. Off by default.
    pub emit_partial_on_error: bool,
}

impl Default for AssembleOptions {
    fn default() -> AssembleOptions {
        AssembleOptions {
            emit_partial_on_error: false,
        }
    }
}

pub struct Assembler<'a> {
    table: &'a OpcodeTable,
    cf: Vec<u8>,
    labset: HashMap<String, u32>,
    labref: HashMap<u32, String>,
    macros: HashMap<String, String>,
    consts: HashMap<String, i32>,
    ctrlstack: Vec<ControlFrame>,
    ctrlnum: u32,
    state: State,
    diagnostics: Vec<AssembleDiagnostic>,
    stopped: bool,
}

enum Flow {
    Continue,
    /// `#`/`;`: the rest of the line is a comment, not a fatal stop.
    BreakLine,
    /// `end`, or a fatal diagnostic: stop assembling the rest of the file.
    StopFile,
}

impl<'a> Assembler<'a> {
    pub fn new(table: &'a OpcodeTable) -> Assembler<'a> {
        Assembler {
            table,
            cf: Vec::new(),
            labset: HashMap::new(),
            labref: HashMap::new(),
            macros: HashMap::new(),
            consts: HashMap::new(),
            ctrlstack: Vec::new(),
            ctrlnum: 0,
            state: State::Normal,
            diagnostics: Vec::new(),
            stopped: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn diagnostics(&self) -> &[AssembleDiagnostic] {
        &self.diagnostics
    }

    fn warn(&mut self, line: usize, kind: DiagnosticKind) {
        self.diagnostics.push(AssembleDiagnostic { line, severity: Severity::Warning, kind });
    }

    fn error(&mut self, line: usize, kind: DiagnosticKind) {
        self.diagnostics.push(AssembleDiagnostic { line, severity: Severity::Error, kind });
    }

    fn here(&self) -> u32 {
        self.cf.len() as u32 + HEADER_LEN as u32
    }

    fn emit(&mut self, byte: u8) {
        self.cf.push(byte);
    }

    fn emit_signed(&mut self, n: i32) {
        let sign = if n >= 0 { 0u8 } else { 0x80u8 };
        let magnitude = n.unsigned_abs();
        let x1 = (magnitude / 256) as u8;
        let x2 = (magnitude % 256) as u8;
        self.emit(sign | x1);
        self.emit(x2);
    }

    fn emit_number_literal(&mut self, n: i32) {
        if (0..=255).contains(&n) {
            self.emit(CODE_BYTE);
            self.emit(n as u8);
        } else {
            self.emit(CODE_NUMBER);
            self.emit_signed(n);
        }
    }

    fn ref_label(&mut self, name: &str) {
        let pos = self.here();
        self.labref.insert(pos, name.to_string());
        self.emit(0);
        self.emit(0);
    }

    /// Runs the whole source through the per-line state machine and
    /// finalizes the label table. Does not touch the checksum or
    /// trailing `end` marker: callers hand the resulting body to
    /// `smimage::Image`.
    pub fn assemble(&mut self, source: &str, options: &AssembleOptions) -> Vec<u8> {
        for (idx, raw_line) in source.lines().enumerate() {
            let line_no = idx + 1;
            if self.stopped {
                break;
            }
            // + 1 reserves room for the trailing checksum byte smimage
            // appends once the body is finished, so a body that fits
            // here never produces an oversized image downstream.
            if self.cf.len() + HEADER_LEN + 1 > CODE_LEN {
                self.error(line_no, DiagnosticKind::CodeTooLarge);
                break;
            }
            self.feed_line(line_no, raw_line.trim());
        }

        self.resolve_labels();
        if self.has_errors() && !options.emit_partial_on_error {
            Vec::new()
        } else {
            self.cf.clone()
        }
    }

    fn feed_line(&mut self, line_no: usize, line: &str) {
        if let State::MacroDef { name } = &self.state {
            let name = name.clone();
            if line.is_empty() {
                self.state = State::Normal;
            } else {
                self.macros.entry(name).or_default().push_str(&format!(" {line}"));
            }
            return;
        }

        if let Some(rest) = line.strip_prefix('_') {
            let mut parts = rest.split_whitespace();
            let macro_name = match parts.next() {
                Some(n) => n.to_string(),
                None => return,
            };
            let params: Vec<&str> = parts.collect();
            let template = match self.macros.get(&macro_name) {
                Some(t) => t.clone(),
                None => {
                    self.error(line_no, DiagnosticKind::UnknownMacro(macro_name));
                    return;
                }
            };
            let mut expanded = template;
            for (i, param) in params.iter().enumerate() {
                expanded = expanded.replace(&format!("${i}"), param);
            }
            self.feed_words(line_no, &expanded);
            return;
        }

        if line == "macro" || line.starts_with("macro ") {
            let macro_name = match line.split_whitespace().nth(1) {
                Some(n) => n.to_string(),
                None => return,
            };
            if self.macros.contains_key(&macro_name) {
                self.error(line_no, DiagnosticKind::DuplicateMacro(macro_name));
                self.stopped = true;
                return;
            }
            self.macros.entry(macro_name.clone()).or_default();
            self.state = State::MacroDef { name: macro_name };
            return;
        }

        self.feed_words(line_no, line);
    }

    fn feed_words(&mut self, line_no: usize, line: &str) {
        for word in line.split_whitespace() {
            if self.stopped {
                break;
            }
            match self.feed_word(line_no, word) {
                Flow::Continue => {}
                Flow::BreakLine => break,
                Flow::StopFile => {
                    self.stopped = true;
                    break;
                }
            }
        }
    }

    fn feed_word(&mut self, line_no: usize, word: &str) -> Flow {
        if word == "#" || word == ";" {
            return Flow::BreakLine;
        }

        if word.len() >= 2 && word.starts_with('\'') && word.ends_with('\'') {
            let inner = &word[1..word.len() - 1];
            match inner.chars().next() {
                Some(c) => {
                    self.emit(CODE_CHAR);
                    self.emit(c as u8);
                }
                None => self.error(line_no, DiagnosticKind::EmptyCharLiteral),
            }
            return Flow::Continue;
        }

        if word.len() >= 2 && word.starts_with('"') && word.ends_with('"') {
            let inner = &word[1..word.len() - 1];
            if inner.len() > 255 {
                self.error(line_no, DiagnosticKind::StringTooLong(inner.len()));
                return Flow::Continue;
            }
            self.emit(CODE_STRING);
            self.emit(inner.len() as u8);
            for c in inner.chars() {
                self.emit(c as u8);
            }
            return Flow::Continue;
        }

        match self.state.clone() {
            State::Normal => self.feed_normal(line_no, word),
            State::DefConst1 => {
                if self.table.by_mnemonic(word).is_some()
                    || Pseudo::lookup(word).is_some()
                    || self.macros.contains_key(word)
                {
                    self.error(line_no, DiagnosticKind::DuplicateConst(word.to_string()));
                } else {
                    self.state = State::DefConst2 { name: word.to_string() };
                }
                Flow::Continue
            }
            State::DefConst2 { name } => {
                match word.parse::<i32>() {
                    Ok(v) => {
                        self.consts.insert(name, v);
                    }
                    Err(_) => self.error(line_no, DiagnosticKind::BadConstValue(word.to_string())),
                }
                self.state = State::Normal;
                Flow::Continue
            }
            State::DefLabel => {
                if self.labset.contains_key(word) {
                    self.error(line_no, DiagnosticKind::DuplicateLabel(word.to_string()));
                    return Flow::StopFile;
                }
                let pos = self.here();
                self.labset.insert(word.to_string(), pos);
                self.state = State::Normal;
                Flow::Continue
            }
            State::RefLabel => {
                self.ref_label(word);
                self.state = State::Normal;
                Flow::Continue
            }
            State::GetByte => {
                match word.parse::<i64>() {
                    Ok(v) => self.emit(v.rem_euclid(256) as u8),
                    Err(_) => self.error(line_no, DiagnosticKind::BadNumber(word.to_string())),
                }
                self.state = State::Normal;
                Flow::Continue
            }
            State::GetNumber => {
                match word.parse::<i32>() {
                    Ok(v) if (-32768..=32767).contains(&v) => self.emit_signed(v),
                    Ok(v) => self.error(line_no, DiagnosticKind::NumberOutOfRange(v as i64)),
                    Err(_) => self.error(line_no, DiagnosticKind::BadNumber(word.to_string())),
                }
                self.state = State::Normal;
                Flow::Continue
            }
            State::GetChar => {
                match word.chars().next() {
                    Some(c) => self.emit(c as u8),
                    None => self.error(line_no, DiagnosticKind::EmptyCharLiteral),
                }
                self.state = State::Normal;
                Flow::Continue
            }
            State::GetString => {
                if word.len() > 255 {
                    self.error(line_no, DiagnosticKind::StringTooLong(word.len()));
                } else {
                    self.emit(word.len() as u8);
                    for c in word.chars() {
                        self.emit(c as u8);
                    }
                }
                self.state = State::Normal;
                Flow::Continue
            }
            State::MacroDef { .. } => unreachable!("macro body lines are consumed in feed_line"),
        }
    }

    fn feed_normal(&mut self, line_no: usize, word: &str) -> Flow {
        if let Some(&value) = self.consts.get(word) {
            self.emit_number_literal(value);
            return Flow::Continue;
        }

        if let Some(pseudo) = Pseudo::lookup(word) {
            return self.feed_pseudo(line_no, pseudo, word);
        }

        if let Some(entry) = self.table.by_mnemonic(word) {
            let mnemonic = entry.mnemonic.clone();
            let code = entry.code;
            self.emit(code);
            match mnemonic.as_str() {
                "byte" => self.state = State::GetByte,
                "number" => self.state = State::GetNumber,
                "char" => self.state = State::GetChar,
                "string" => self.state = State::GetString,
                "jump" | "jeq" | "jne" | "jge" | "jgt" | "jle" | "jlt" | "jof" | "jef"
                | "calld" | "addr" => self.state = State::RefLabel,
                "end" => return Flow::StopFile,
                _ => {}
            }
            return Flow::Continue;
        }

        match word.parse::<i32>() {
            Ok(n) if (-32768..=32767).contains(&n) => {
                self.emit_number_literal(n);
            }
            Ok(n) => self.error(line_no, DiagnosticKind::NumberOutOfRange(n as i64)),
            Err(_) => self.error(line_no, DiagnosticKind::BadNumber(word.to_string())),
        }
        Flow::Continue
    }

    fn feed_pseudo(&mut self, line_no: usize, pseudo: Pseudo, word: &str) -> Flow {
        match pseudo {
            Pseudo::Label => {
                self.state = State::DefLabel;
            }
            Pseudo::Const => {
                self.state = State::DefConst1;
            }
            Pseudo::If => {
                self.ctrlnum += 1;
                let level = self.ctrlnum;
                self.ctrlstack.push(ControlFrame { kind: CtrlKind::If, level });
                self.emit(CODE_JEQ);
                self.ref_label(&format!("if_{level}"));
            }
            Pseudo::Else => {
                match self.ctrlstack.last_mut() {
                    Some(frame) if frame.kind == CtrlKind::If => {
                        let level = frame.level;
                        frame.kind = CtrlKind::IfElse;
                        self.emit(CODE_JUMP);
                        self.ref_label(&format!("else_{level}"));
                        let here = self.here();
                        self.labset.insert(format!("if_{level}"), here);
                    }
                    _ => {
                        self.error(line_no, DiagnosticKind::ElseOutsideIf);
                        return Flow::StopFile;
                    }
                }
            }
            Pseudo::Then => match self.ctrlstack.pop() {
                Some(frame) if frame.kind == CtrlKind::If => {
                    let here = self.here();
                    self.labset.insert(format!("if_{}", frame.level), here);
                }
                Some(frame) if frame.kind == CtrlKind::IfElse => {
                    let here = self.here();
                    self.labset.insert(format!("else_{}", frame.level), here);
                }
                other => {
                    if let Some(frame) = other {
                        self.ctrlstack.push(frame);
                    }
                    self.error(line_no, DiagnosticKind::ThenOutsideIf);
                    return Flow::StopFile;
                }
            },
            Pseudo::Begin => {
                self.ctrlnum += 1;
                let level = self.ctrlnum;
                self.ctrlstack.push(ControlFrame { kind: CtrlKind::Begin, level });
                let here = self.here();
                self.labset.insert(format!("begin_{level}"), here);
            }
            Pseudo::While => match self.ctrlstack.last() {
                Some(frame) if frame.kind == CtrlKind::Begin => {
                    let level = frame.level;
                    self.emit(CODE_JEQ);
                    self.ref_label(&format!("repeat_{level}"));
                }
                _ => {
                    self.error(line_no, DiagnosticKind::WhileOutsideBegin);
                    return Flow::StopFile;
                }
            },
            Pseudo::Repeat => match self.ctrlstack.pop() {
                Some(frame) if frame.kind == CtrlKind::Begin => {
                    self.emit(CODE_JUMP);
                    self.ref_label(&format!("begin_{}", frame.level));
                    let here = self.here();
                    self.labset.insert(format!("repeat_{}", frame.level), here);
                }
                other => {
                    if let Some(frame) = other {
                        self.ctrlstack.push(frame);
                    }
                    self.error(line_no, DiagnosticKind::RepeatOutsideBegin);
                    return Flow::StopFile;
                }
            },
            Pseudo::Do => {
                self.ctrlnum += 1;
                let level = self.ctrlnum;
                self.ctrlstack.push(ControlFrame { kind: CtrlKind::Do, level });
                self.emit(CODE_DSRS);
                let here = self.here();
                self.labset.insert(format!("do_{level}"), here);
                self.emit(CODE_RSDS);
                self.emit(CODE_DUP);
                self.emit(CODE_DSRS);
                self.emit(CODE_JEQ);
                self.ref_label(&format!("loop_{level}"));
            }
            Pseudo::Loop => match self.ctrlstack.pop() {
                Some(frame) if frame.kind == CtrlKind::Do => {
                    let level = frame.level;
                    self.emit(CODE_RSDS);
                    self.emit(CODE_BYTE);
                    self.emit(1);
                    self.emit(CODE_SUB);
                    self.emit(CODE_DSRS);
                    self.emit(CODE_JUMP);
                    self.ref_label(&format!("do_{level}"));
                    let here = self.here();
                    self.labset.insert(format!("loop_{level}"), here);
                }
                other => {
                    if let Some(frame) = other {
                        self.ctrlstack.push(frame);
                    }
                    self.error(line_no, DiagnosticKind::LoopOutsideDo);
                    return Flow::StopFile;
                }
            },
            Pseudo::End => {
                self.emit(CODE_END);
                return Flow::StopFile;
            }
            Pseudo::Macro => {
                // handled before the per-word loop starts; reaching this
                // arm means `macro` appeared somewhere other than the
                // start of a line.
                self.warn(line_no, DiagnosticKind::UnimplementedPseudo(word.to_string()));
            }
        }
        Flow::Continue
    }

    fn resolve_labels(&mut self) {
        let refs: Vec<(u32, String)> = self.labref.iter().map(|(k, v)| (*k, v.clone())).collect();
        for (at, name) in refs {
            match self.labset.get(&name) {
                Some(&target) => {
                    let idx = (at - HEADER_LEN as u32) as usize;
                    Endian::write_u16(&mut self.cf[idx..idx + 2], target as u16);
                }
                None => self.error(0, DiagnosticKind::UnresolvedLabel(name)),
            }
        }
    }
}
