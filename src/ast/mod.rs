//! AST module: node types for parsed shell programs.

pub mod types;

pub use types::*;
