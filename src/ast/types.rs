//! Abstract Syntax Tree Types
//!
//! This module defines the complete AST for shell programs. Nodes form a
//! closed family: statements, pipelines, commands, control structures, words
//! and redirections. Word-shaped leaves carry per-part quote context, which
//! is authoritative for all later expansion decisions.

use std::fmt;

// =============================================================================
// POSITIONS
// =============================================================================

/// Position information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Span in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

// =============================================================================
// QUOTE CONTEXT
// =============================================================================

/// How a token or word part was quoted in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteType {
    #[default]
    None,
    Single,
    Double,
    /// ANSI-C quoting: $'...'
    Ansi,
}

impl QuoteType {
    /// Whether `$`-expansions run inside this quote context.
    pub fn allows_expansion(self) -> bool {
        matches!(self, QuoteType::None | QuoteType::Double)
    }

    /// Whether the result is protected from word splitting and globbing.
    pub fn is_quoted(self) -> bool {
        !matches!(self, QuoteType::None)
    }
}

// =============================================================================
// PROGRAM & STATEMENTS
// =============================================================================

/// Root node: a complete program (script, -c string, or one interactive line)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// Top-level items
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    AndOr(AndOrList),
    FunctionDef(FunctionDef),
    Control(ControlStructure),
}

/// Operators joining pipelines in a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOrOperator {
    And, // &&
    Or,  // ||
}

/// Pipelines joined by && / || / ; with left-to-right evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct AndOrList {
    pub pipelines: Vec<Pipeline>,
    /// Operators between pipelines; len == pipelines.len() - 1
    pub operators: Vec<AndOrOperator>,
    pub background: bool,
}

// =============================================================================
// PIPELINES & COMMANDS
// =============================================================================

/// Commands joined by `|`, with optional leading `!` negation
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub negated: bool,
    pub background: bool,
}

/// Union of pipeline components
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simple(SimpleCommand),
    Subshell(SubshellGroup),
    BraceGroup(BraceGroup),
    Control(ControlStructure),
}

/// name args... with assignment prefixes and redirections
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCommand {
    /// Leading VAR=value words
    pub assignments: Vec<Assignment>,
    /// Command name and arguments; empty for assignment-only commands
    pub words: Vec<Word>,
    pub redirects: Vec<Redirect>,
    pub background: bool,
    /// Source line for error messages and $LINENO
    pub line: usize,
}

/// Subshell group: ( body )
#[derive(Debug, Clone, PartialEq)]
pub struct SubshellGroup {
    pub body: Vec<Statement>,
    pub redirects: Vec<Redirect>,
    pub background: bool,
}

/// Brace group: { body; } — runs in the current process
#[derive(Debug, Clone, PartialEq)]
pub struct BraceGroup {
    pub body: Vec<Statement>,
    pub redirects: Vec<Redirect>,
    pub background: bool,
}

/// Variable assignment word: NAME=value or NAME[index]=value
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    /// Subscript text for array element assignment
    pub index: Option<String>,
    pub value: Option<Word>,
    /// Append mode: NAME+=value
    pub append: bool,
    /// Array initialiser: NAME=(a b c)
    pub array: Option<Vec<Word>>,
}

// =============================================================================
// CONTROL STRUCTURES
// =============================================================================

/// Whether a control structure stands alone or is a pipeline component.
/// The executor picks its fork strategy from this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    #[default]
    Statement,
    Pipeline,
}

/// Control structures are both statements and compound commands
#[derive(Debug, Clone, PartialEq)]
pub struct ControlStructure {
    pub kind: ControlKind,
    pub redirects: Vec<Redirect>,
    pub background: bool,
    pub execution_context: ExecutionContext,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    If(IfConditional),
    While(WhileLoop),
    Until(UntilLoop),
    For(ForLoop),
    CStyleFor(CStyleForLoop),
    Case(CaseConditional),
    Select(SelectLoop),
    /// (( expr ))
    ArithmeticEval(ArithmeticEvaluation),
    /// [[ expr ]]
    Test(TestCommand),
    Break(BreakStatement),
    Continue(ContinueStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfConditional {
    /// (condition, body) pairs: the if clause followed by any elif clauses
    pub clauses: Vec<(Vec<Statement>, Vec<Statement>)>,
    pub else_body: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub condition: Vec<Statement>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UntilLoop {
    pub condition: Vec<Statement>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub variable: String,
    /// Words to iterate; None means the positional parameters
    pub words: Option<Vec<Word>>,
    pub body: Vec<Statement>,
}

/// for ((init; cond; update)); do body; done
#[derive(Debug, Clone, PartialEq)]
pub struct CStyleForLoop {
    pub init: Option<String>,
    pub condition: Option<String>,
    pub update: Option<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseConditional {
    pub subject: Word,
    pub items: Vec<CaseItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseItem {
    pub patterns: Vec<Word>,
    pub body: Vec<Statement>,
    pub terminator: CaseTerminator,
}

/// How a case item ends, controlling fall-through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseTerminator {
    /// ;; — stop matching
    #[default]
    Break,
    /// ;& — run the next item body unconditionally
    FallThrough,
    /// ;;& — continue matching subsequent patterns
    ContinueMatching,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectLoop {
    pub variable: String,
    pub words: Option<Vec<Word>>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticEvaluation {
    pub expression: String,
    pub line: usize,
}

/// [[ expr ]] as a command
#[derive(Debug, Clone, PartialEq)]
pub struct TestCommand {
    pub expression: TestExpr,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakStatement {
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinueStatement {
    pub level: u32,
}

// =============================================================================
// FUNCTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Box<Command>,
    pub redirects: Vec<Redirect>,
}

// =============================================================================
// WORDS
// =============================================================================

/// A shell word: ordered parts with per-part quote context
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
    /// Overall quoting when the whole word sits in one quote context
    pub quote_type: QuoteType,
}

impl Word {
    /// A word consisting of a single unquoted literal.
    pub fn literal(text: impl Into<String>) -> Self {
        Word {
            parts: vec![WordPart::literal(text)],
            quote_type: QuoteType::None,
        }
    }

    /// True if no part of this word is subject to expansion or splitting.
    pub fn is_fully_quoted(&self) -> bool {
        self.parts.iter().all(|p| match p {
            WordPart::Literal(l) => l.quoted,
            WordPart::Expansion(e) => e.quoted,
        })
    }

    /// Flatten a word that contains only literal parts. Returns None when an
    /// expansion part is present.
    pub fn as_literal(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                WordPart::Literal(l) => out.push_str(&l.text),
                WordPart::Expansion(_) => return None,
            }
        }
        Some(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    Literal(LiteralPart),
    Expansion(ExpansionPart),
}

impl WordPart {
    pub fn literal(text: impl Into<String>) -> Self {
        WordPart::Literal(LiteralPart {
            text: text.into(),
            quoted: false,
            quote_char: QuoteType::None,
        })
    }

    pub fn quoted_literal(text: impl Into<String>, quote_char: QuoteType) -> Self {
        WordPart::Literal(LiteralPart {
            text: text.into(),
            quoted: true,
            quote_char,
        })
    }

    pub fn expansion(node: Expansion, quoted: bool) -> Self {
        WordPart::Expansion(ExpansionPart { node, quoted })
    }
}

/// Plain text with its quote context
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralPart {
    pub text: String,
    pub quoted: bool,
    pub quote_char: QuoteType,
}

/// An embedded expansion with its quote context
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionPart {
    pub node: Expansion,
    /// True when the expansion sits inside double quotes
    pub quoted: bool,
}

// =============================================================================
// EXPANSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// $name, ${name}, $1, $?, ${arr[0]}
    Variable(VariableExpansion),
    /// ${name<op>operand}
    Parameter(ParameterExpansion),
    /// $(cmd) or `cmd` — the command text is re-parsed at expansion time
    CommandSub(CommandSubstitution),
    /// $((expr))
    ArithmeticSub(ArithmeticExpansion),
    /// <(cmd) or >(cmd) — resolves to a /dev/fd/N path
    ProcessSub(ProcessSubstitution),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableExpansion {
    pub name: String,
    /// Array subscript text: the `i` of ${arr[i]}
    pub index: Option<String>,
}

/// Decomposed ${name<op>operand}; the operand is a Word so its own quote
/// structure survives into expansion
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpansion {
    pub name: String,
    pub index: Option<String>,
    pub op: ParameterOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterOp {
    /// ${v:-w} / ${v-w}
    UseDefault { word: Word, check_null: bool },
    /// ${v:=w} / ${v=w}
    AssignDefault { word: Word, check_null: bool },
    /// ${v:+w} / ${v+w}
    UseAlternate { word: Word, check_null: bool },
    /// ${v:?w} / ${v?w}
    ErrorIfUnset { word: Option<Word>, check_null: bool },
    /// ${#v}
    Length,
    /// ${v#p} / ${v##p}
    RemovePrefix { pattern: Word, longest: bool },
    /// ${v%p} / ${v%%p}
    RemoveSuffix { pattern: Word, longest: bool },
    /// ${v/p/r}, ${v//p/r}, ${v/#p/r}, ${v/%p/r}
    Replace {
        pattern: Word,
        replacement: Option<Word>,
        all: bool,
        anchor: Option<ReplaceAnchor>,
    },
    /// ${v:off} / ${v:off:len} — offsets are arithmetic text
    Substring {
        offset: String,
        length: Option<String>,
    },
    /// ${!prefix*} / ${!prefix@}
    Names { star: bool },
    /// ${v^p} / ${v^^p}
    Uppercase { pattern: Option<Word>, all: bool },
    /// ${v,p} / ${v,,p}
    Lowercase { pattern: Option<Word>, all: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceAnchor {
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSubstitution {
    pub command: String,
    /// Legacy backtick form
    pub backquoted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticExpansion {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSubstitution {
    pub command: String,
    pub direction: ProcessSubDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSubDirection {
    /// <(cmd): the path reads the command's stdout
    Read,
    /// >(cmd): the path writes to the command's stdin
    Write,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub kind: RedirectKind,
    /// Source descriptor; None means the operator's default (0 or 1)
    pub source_fd: Option<i32>,
    pub target: RedirectTarget,
    /// Collected heredoc body, attached by the parser
    pub heredoc_content: Option<String>,
    /// Quoted delimiter suppresses expansion of the body
    pub heredoc_quoted: bool,
    /// Quoting of the target word (single-quoted targets skip expansion)
    pub quote_type: QuoteType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// <
    Input,
    /// >
    Output,
    /// >|
    OutputClobber,
    /// >>
    Append,
    /// <>
    ReadWrite,
    /// << and <<-
    HereDoc { strip_tabs: bool },
    /// <<<
    HereString,
    /// <&
    DupInput,
    /// >&
    DupOutput,
}

impl RedirectKind {
    /// The descriptor this operator redirects when no fd prefix is given.
    pub fn default_fd(self) -> i32 {
        match self {
            RedirectKind::Input
            | RedirectKind::ReadWrite
            | RedirectKind::HereDoc { .. }
            | RedirectKind::HereString
            | RedirectKind::DupInput => 0,
            RedirectKind::Output
            | RedirectKind::OutputClobber
            | RedirectKind::Append
            | RedirectKind::DupOutput => 1,
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "<"),
            Self::Output => write!(f, ">"),
            Self::OutputClobber => write!(f, ">|"),
            Self::Append => write!(f, ">>"),
            Self::ReadWrite => write!(f, "<>"),
            Self::HereDoc { strip_tabs: false } => write!(f, "<<"),
            Self::HereDoc { strip_tabs: true } => write!(f, "<<-"),
            Self::HereString => write!(f, "<<<"),
            Self::DupInput => write!(f, "<&"),
            Self::DupOutput => write!(f, ">&"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectTarget {
    Word(Word),
    /// Numeric target of <&N / >&N
    Fd(i32),
    /// <&- / >&- close the source descriptor
    Close,
}

// =============================================================================
// TEST EXPRESSIONS ([[ ]])
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TestExpr {
    Binary(TestBinary),
    Unary(TestUnary),
    And(Box<TestExpr>, Box<TestExpr>),
    Or(Box<TestExpr>, Box<TestExpr>),
    Not(Box<TestExpr>),
    Group(Box<TestExpr>),
    /// A bare word: true when non-empty
    Word(Word),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestBinary {
    pub op: TestBinaryOp,
    pub left: Word,
    pub right: Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestBinaryOp {
    Eq,        // = / ==  (pattern match)
    Ne,        // !=
    Match,     // =~
    Lt,        // <  (lexicographic)
    Gt,        // >
    NumEq,     // -eq
    NumNe,     // -ne
    NumLt,     // -lt
    NumLe,     // -le
    NumGt,     // -gt
    NumGe,     // -ge
    NewerThan, // -nt
    OlderThan, // -ot
    SameFile,  // -ef
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestUnary {
    pub op: TestUnaryOp,
    pub operand: Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestUnaryOp {
    BlockSpecial,   // -b
    CharSpecial,    // -c
    Directory,      // -d
    Exists,         // -e
    RegularFile,    // -f
    SetGid,         // -g
    Symlink,        // -h / -L
    Pipe,           // -p
    Readable,       // -r
    NonEmptyFile,   // -s
    Tty,            // -t
    SetUid,         // -u
    Writable,       // -w
    Executable,     // -x
    NonEmptyString, // -n
    EmptyString,    // -z
    VarSet,         // -v
}

impl Redirect {
    /// A bare redirect with inferred source fd and no heredoc payload.
    pub fn new(kind: RedirectKind, target: RedirectTarget) -> Self {
        Redirect {
            kind,
            source_fd: None,
            target,
            heredoc_content: None,
            heredoc_quoted: false,
            quote_type: QuoteType::None,
        }
    }
}
