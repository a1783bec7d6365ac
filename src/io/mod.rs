//! I/O manager: applies redirections to real file descriptors.
//!
//! Four dispatch paths share one set of per-operator helpers: temporary
//! (compound commands), permanent (`exec`), builtin-wrapping, and child
//! (inside a forked process, before exec). Saved descriptors live on the
//! returned scope and are restored exactly once.

pub mod fd;
pub mod process_sub;
pub mod redirect;
pub mod saved_fds;

pub use redirect::{apply_redirects, ApplyMode};
pub use saved_fds::RedirectScope;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RedirError {
    #[error("psh: {path}: cannot overwrite existing file")]
    NoClobber { path: String },

    #[error("psh: {path}: {message}")]
    Open { path: String, message: String },

    #[error("psh: {0}: bad file descriptor")]
    BadFd(i32),

    #[error("psh: {0}: ambiguous redirect")]
    BadFdTarget(String),

    #[error("psh: heredoc body missing")]
    HeredocMissing,

    #[error("psh: redirect: {0}")]
    Expansion(String),

    #[error("psh: {context}: {message}")]
    Sys { context: String, message: String },
}
