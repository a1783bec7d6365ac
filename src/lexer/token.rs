//! Token Types
//!
//! Tokens carry their kind, the literal source text, byte offsets, quote
//! metadata and — for composite words — an ordered list of parts preserving
//! the mixed-quoting structure of constructs like `"Hello $USER"'!'lit`.

use crate::ast::types::QuoteType;
use std::fmt;

/// Token kinds produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // End of input
    Eof,

    // Separators
    Newline,
    Semi,   // ;
    Amp,    // &
    DSemi,  // ;;
    SemiAnd, // ;&
    DSemiAnd, // ;;&

    // Operators
    Pipe,   // |
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Redirections
    Less,      // <
    Great,     // >
    DLess,     // <<
    DLessDash, // <<-
    DGreat,    // >>
    TLess,     // <<<
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    Clobber,   // >|

    // Grouping
    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }

    // Compound command fences
    DBrackOpen,  // [[
    DBrackClose, // ]]
    DParenOpen,  // ((
    DParenClose, // ))

    // Reserved words (produced by the keyword normalisation pass)
    If,
    Then,
    Elif,
    Else,
    Fi,
    For,
    While,
    Until,
    Do,
    Done,
    Case,
    Esac,
    In,
    Function,
    Select,

    // Word-shaped tokens
    /// Bare unquoted word with a single literal part
    Word,
    /// Composite word: quoting and/or embedded expansions, carried in parts
    String,
    /// Pure-digit word immediately preceding a redirection operator
    Number,
    /// NAME=value (or NAME[idx]=value, NAME+=value) at command position
    AssignmentWord,

    // Comments (only emitted when comment retention is enabled)
    Comment,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Newline => "NEWLINE",
            Self::Semi => ";",
            Self::Amp => "&",
            Self::DSemi => ";;",
            Self::SemiAnd => ";&",
            Self::DSemiAnd => ";;&",
            Self::Pipe => "|",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Bang => "!",
            Self::Less => "<",
            Self::Great => ">",
            Self::DLess => "<<",
            Self::DLessDash => "<<-",
            Self::DGreat => ">>",
            Self::TLess => "<<<",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::LessGreat => "<>",
            Self::Clobber => ">|",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::DBrackOpen => "[[",
            Self::DBrackClose => "]]",
            Self::DParenOpen => "((",
            Self::DParenClose => "))",
            Self::If => "if",
            Self::Then => "then",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::Fi => "fi",
            Self::For => "for",
            Self::While => "while",
            Self::Until => "until",
            Self::Do => "do",
            Self::Done => "done",
            Self::Case => "case",
            Self::Esac => "esac",
            Self::In => "in",
            Self::Function => "function",
            Self::Select => "select",
            Self::Word => "WORD",
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::AssignmentWord => "ASSIGNMENT_WORD",
            Self::Comment => "COMMENT",
        }
    }

    /// True for kinds that put the lexer back at command position.
    pub fn starts_command(&self) -> bool {
        matches!(
            self,
            Self::Newline
                | Self::Semi
                | Self::Amp
                | Self::Pipe
                | Self::AndAnd
                | Self::OrOr
                | Self::DSemi
                | Self::SemiAnd
                | Self::DSemiAnd
                | Self::LParen
                | Self::LBrace
                | Self::Bang
                | Self::If
                | Self::Then
                | Self::Elif
                | Self::Else
                | Self::While
                | Self::Until
                | Self::Do
        )
    }

    /// True for redirection operators that take a target word.
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Great
                | Self::DLess
                | Self::DLessDash
                | Self::DGreat
                | Self::TLess
                | Self::LessAnd
                | Self::GreatAnd
                | Self::LessGreat
                | Self::Clobber
        )
    }

    /// True for word-shaped kinds the parser can build a Word from.
    pub fn is_word_like(&self) -> bool {
        matches!(
            self,
            Self::Word | Self::String | Self::Number | Self::AssignmentWord
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One segment of a composite word token
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPart {
    pub kind: TokenPartKind,
    /// Processed text: quote characters stripped, escapes applied
    pub text: String,
    pub quote_type: QuoteType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenPartKind {
    Literal,
    /// An embedded `$`-form or backquote form; `text` holds the raw spelling
    /// (e.g. `${v:-x}`, `$(cmd)`) for the parser's word builder to decompose
    Expansion,
}

impl TokenPart {
    pub fn literal(text: impl Into<String>, quote_type: QuoteType) -> Self {
        TokenPart {
            kind: TokenPartKind::Literal,
            text: text.into(),
            quote_type,
        }
    }

    pub fn expansion(text: impl Into<String>, quote_type: QuoteType) -> Self {
        TokenPart {
            kind: TokenPartKind::Expansion,
            text: text.into(),
            quote_type,
        }
    }
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Original source slice for this token
    pub text: String,
    /// Byte offsets [start, end) into the (brace-expanded) source
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// Quote context when the whole token sits in one quote kind
    pub quote_type: QuoteType,
    /// No whitespace between this token and the previous one
    pub adjacent_to_previous: bool,
    /// Parts for String tokens; empty for everything else
    pub parts: Vec<TokenPart>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            start,
            end,
            line: 0,
            column: 0,
            quote_type: QuoteType::None,
            adjacent_to_previous: false,
            parts: Vec::new(),
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_parts(mut self, parts: Vec<TokenPart>) -> Self {
        self.parts = parts;
        self
    }

    pub fn eof(pos: usize) -> Self {
        Token::new(TokenKind::Eof, "", pos, pos)
    }

    /// Rebuild the token's source spelling from its parts by re-wrapping each
    /// part in its quote characters. Used to check the part invariant.
    pub fn reconstruct(&self) -> String {
        if self.parts.is_empty() {
            return self.text.clone();
        }
        let mut out = String::new();
        for part in &self.parts {
            match part.quote_type {
                QuoteType::None => out.push_str(&part.text),
                QuoteType::Single => {
                    out.push('\'');
                    out.push_str(&part.text);
                    out.push('\'');
                }
                QuoteType::Double => {
                    out.push('"');
                    out.push_str(&part.text);
                    out.push('"');
                }
                QuoteType::Ansi => {
                    out.push_str("$'");
                    out.push_str(&part.text);
                    out.push('\'');
                }
            }
        }
        out
    }
}
