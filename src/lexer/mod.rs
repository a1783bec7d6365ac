//! Lexer: source text to token stream.
//!
//! The pipeline runs brace expansion over the raw text, tokenises through a
//! prioritised recogniser registry (with dedicated quote and expansion
//! parsers), collects heredoc bodies, then normalises keywords.

pub mod brace;
pub mod expansion;
pub mod heredoc;
pub mod keywords;
pub mod lexer;
pub mod position;
pub mod quotes;
pub mod recognizers;
pub mod token;

pub use heredoc::HeredocDoc;
pub use lexer::{LexOutput, Lexer, LexerState};
pub use token::{Token, TokenKind, TokenPart, TokenPartKind};

use thiserror::Error;

/// Errors raised during tokenisation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexerError {
    #[error("psh: lexer: unclosed {construct} (line {line})")]
    Unclosed { construct: String, line: usize },

    #[error("psh: lexer: {message} (line {line})")]
    Invalid { message: String, line: usize },

    /// Interactive mode only: the construct can be completed by reading
    /// another line of input.
    #[error("psh: lexer: unexpected end of input in {construct}")]
    NeedMoreInput { construct: String },

    #[error("psh: lexer: internal error: {message} (line {line})")]
    Internal { message: String, line: usize },
}

impl LexerError {
    pub fn unclosed(construct: &str, line: usize) -> Self {
        LexerError::Unclosed {
            construct: construct.to_string(),
            line,
        }
    }

    pub fn invalid(message: &str, line: usize) -> Self {
        LexerError::Invalid {
            message: message.to_string(),
            line,
        }
    }

    pub fn internal(message: &str, line: usize) -> Self {
        LexerError::Internal {
            message: message.to_string(),
            line,
        }
    }

    pub fn is_unclosed(&self) -> bool {
        matches!(
            self,
            LexerError::Unclosed { .. } | LexerError::NeedMoreInput { .. }
        )
    }

    pub fn construct_name(&self) -> String {
        match self {
            LexerError::Unclosed { construct, .. }
            | LexerError::NeedMoreInput { construct } => construct.clone(),
            _ => String::new(),
        }
    }
}
