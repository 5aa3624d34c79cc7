use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnknownMacro(String),
    DuplicateMacro(String),
    DuplicateConst(String),
    BadConstValue(String),
    DuplicateLabel(String),
    UnresolvedLabel(String),
    ElseOutsideIf,
    ThenOutsideIf,
    WhileOutsideBegin,
    RepeatOutsideBegin,
    LoopOutsideDo,
    UnimplementedPseudo(String),
    BadNumber(String),
    NumberOutOfRange(i64),
    EmptyCharLiteral,
    StringTooLong(usize),
    CodeTooLarge,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DiagnosticKind::*;
        match self {
            UnknownMacro(name) => write!(f, "call to undefined macro '{name}'"),
            DuplicateMacro(name) => write!(f, "duplicate macro name '{name}'"),
            DuplicateConst(name) => write!(f, "constant '{name}' shadows an opcode, pseudo-op or macro name"),
            BadConstValue(word) => write!(f, "bad constant value '{word}'"),
            DuplicateLabel(name) => write!(f, "duplicate label '{name}'"),
            UnresolvedLabel(name) => write!(f, "label '{name}' is referenced but never defined"),
            ElseOutsideIf => write!(f, "'else' outside 'if'"),
            ThenOutsideIf => write!(f, "'then' outside 'if'"),
            WhileOutsideBegin => write!(f, "'while' outside 'begin'"),
            RepeatOutsideBegin => write!(f, "'repeat' outside 'begin'"),
            LoopOutsideDo => write!(f, "'loop' outside 'do'"),
            UnimplementedPseudo(word) => write!(f, "pseudo-op '{word}' has no implementation"),
            BadNumber(word) => write!(f, "'{word}' is not a valid number"),
            NumberOutOfRange(n) => write!(f, "{n} is outside the representable range -32768..32767"),
            EmptyCharLiteral => write!(f, "empty character literal"),
            StringTooLong(len) => write!(f, "string of length {len} exceeds 255 bytes"),
            CodeTooLarge => write!(f, "assembled code exceeds the maximum image size"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleDiagnostic {
    pub line: usize,
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl fmt::Display for AssembleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sev = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: line {}: {}", sev, self.line, self.kind)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("assembly failed with {} error(s)", .0.iter().filter(|d| d.severity == Severity::Error).count())]
    Failed(Vec<AssembleDiagnostic>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
