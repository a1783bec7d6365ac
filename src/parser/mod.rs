//! Parser: token stream to AST.
//!
//! Recursive descent with eight grammar sub-parsers sharing one
//! `ParserContext`. See `parser.rs` for the entry points.

pub mod array_parser;
pub mod command_parser;
pub mod compound_parser;
pub mod conditional_parser;
pub mod function_parser;
pub mod parser;
pub mod redirection_parser;
pub mod statement_parser;
pub mod types;
pub mod word_builder;

pub use parser::{parse_program, parse_statement, Parser};
pub use types::{ErrorCode, ErrorMode, ParseError, ParserContext};
pub use word_builder::{build_word, word_from_text};
