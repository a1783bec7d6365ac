//! Shell Driver
//!
//! Wires the stages together: lex, parse, execute. Owns the shell state,
//! the executor, the signal manager and the interactive loop, and runs the
//! EXIT trap exactly once on the way out.

use crate::error::ShellError;
use crate::executor::control_flow::read_line_fd0;
use crate::executor::{ExecContext, ExecError, Executor};
use crate::io::fd;
use crate::lexer::{Lexer, LexerError};
use crate::parser::{ErrorMode, Parser};
use crate::process::SignalManager;
use crate::state::ShellState;
use nix::sys::signal::Signal;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub tokens: bool,
    pub ast: bool,
    pub expansion: bool,
    pub exec: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    pub interactive: bool,
    pub login: bool,
    pub norc: bool,
    pub rcfile: Option<String>,
    pub validate_only: bool,
    pub debug: DebugFlags,
}

pub struct Shell {
    pub state: ShellState,
    pub executor: Executor,
    config: ShellConfig,
    signals: Option<SignalManager>,
    exit_trap_done: bool,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        let mut state = ShellState::from_env();
        state.interactive = config.interactive;
        if config.interactive {
            state.options.monitor = true;
        }
        seed_default_variables(&mut state);

        let mut executor = Executor::new();
        executor.debug_exec = config.debug.exec;
        executor.debug_expansion = config.debug.expansion;

        let signals = if config.interactive {
            SignalManager::install_interactive().ok()
        } else {
            SignalManager::install_script().ok()
        };

        Shell {
            state,
            executor,
            config,
            signals,
            exit_trap_done: false,
        }
    }

    /// `-c 'command'` and script bodies both land here.
    pub fn run_source(&mut self, source: &str) -> i32 {
        let code = self.execute_source(source);
        self.finish(code)
    }

    pub fn run_script(&mut self, path: &str, args: Vec<String>) -> i32 {
        self.state.positional.script_name = path.to_string();
        self.state.positional.params = args;
        let source = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                let _ = fd::write_all(2, format!("psh: {path}: {err}\n").as_bytes());
                return 127;
            }
        };
        self.run_source(&source)
    }

    /// Parse-and-validate only (`--validate`): no execution, errors listed.
    pub fn validate_source(&mut self, source: &str) -> i32 {
        let parser = Parser::new().with_mode(ErrorMode::Recover);
        let (_, errors) = parser.parse_collecting(source);
        for err in &errors {
            let _ = fd::write_all(2, format!("{err}\n").as_bytes());
        }
        i32::from(!errors.is_empty())
    }

    fn execute_source(&mut self, source: &str) -> i32 {
        let output = match Lexer::new(source).tokenize() {
            Ok(output) => output,
            Err(err) => {
                let err = ShellError::Lex(err);
                let _ = fd::write_all(2, format!("{err}\n").as_bytes());
                return err.exit_code();
            }
        };
        if self.config.debug.tokens {
            for token in &output.tokens {
                let _ = fd::write_all(
                    2,
                    format!(
                        "token {:>3}:{:<3} {:<16} {:?}\n",
                        token.line,
                        token.column,
                        token.kind.as_str(),
                        token.text
                    )
                    .as_bytes(),
                );
            }
        }

        let program = match Parser::new().parse_lexed(output) {
            Ok(program) => program,
            Err(err) => {
                let err = ShellError::Parse(err);
                let _ = fd::write_all(2, format!("{err}\n").as_bytes());
                return err.exit_code();
            }
        };
        if self.config.debug.ast {
            let _ = fd::write_all(2, format!("{program:#?}\n").as_bytes());
        }
        if self.config.validate_only {
            return 0;
        }

        let result =
            self.executor
                .run_program(&mut self.state, &program, &ExecContext::new());
        self.sync_signal_watches();
        self.absorb(result)
    }

    fn absorb(&mut self, result: Result<i32, ExecError>) -> i32 {
        match result {
            Ok(code) => code,
            Err(ExecError::ExitShell(code)) | Err(ExecError::Errexit(code)) => code,
            Err(err) => {
                let _ = fd::write_all(2, format!("{err}\n").as_bytes());
                err.final_code()
            }
        }
    }

    /// Run the EXIT trap (once) and settle on the final exit code.
    pub fn finish(&mut self, code: i32) -> i32 {
        if !self.exit_trap_done {
            self.exit_trap_done = true;
            self.state.set_exit_code(code);
            self.executor.run_trap(&mut self.state, "EXIT");
        }
        code
    }

    // --- interactive mode ---

    pub fn run_interactive(&mut self) -> i32 {
        if self.config.login {
            self.source_profile();
        }
        if !self.config.norc {
            self.source_rc_file();
        }

        let mut last_code = 0;
        let mut buffer = String::new();

        loop {
            self.poll_signals();
            self.notify_finished_jobs();

            let prompt = if buffer.is_empty() {
                self.state.lookup("PS1").unwrap_or_else(|| "$ ".to_string())
            } else {
                self.state.lookup("PS2").unwrap_or_else(|| "> ".to_string())
            };
            let _ = fd::write_all(2, prompt.as_bytes());

            let Some(line) = read_line_fd0() else {
                break; // EOF
            };
            buffer.push_str(&line);
            buffer.push('\n');

            // Recovery mode: an unclosed construct keeps reading lines
            match Lexer::new(buffer.as_str()).interactive(true).tokenize() {
                Err(LexerError::NeedMoreInput { .. }) => continue,
                Err(err) => {
                    let _ = fd::write_all(2, format!("{err}\n").as_bytes());
                    buffer.clear();
                    last_code = 2;
                    continue;
                }
                Ok(_) => {}
            }

            let source = std::mem::take(&mut buffer);
            last_code = self.execute_source(&source);
            self.state.set_exit_code(last_code);
        }
        self.finish(last_code)
    }

    fn poll_signals(&mut self) {
        let Some(signals) = &self.signals else {
            return;
        };
        let pending = signals.pending();
        if pending.contains(&libc::SIGINT) {
            // the foreground group got it too; just show a fresh line
            let _ = fd::write_all(2, b"\n");
        }
        self.executor
            .handle_pending_signals(&mut self.state, &pending);
    }

    fn notify_finished_jobs(&mut self) {
        self.executor.jobs.update();
        for job in self.executor.jobs.take_finished() {
            let _ = fd::write_all(
                2,
                format!("[{}] done {}\n", job.id, job.command).as_bytes(),
            );
        }
    }

    /// Route trapped real signals through the self-pipe.
    fn sync_signal_watches(&mut self) {
        let Some(signals) = &self.signals else {
            return;
        };
        for (_name, number) in self.state.traps.trapped_signals() {
            if let Ok(sig) = Signal::try_from(number) {
                let _ = signals.watch(sig);
            }
        }
    }

    // --- startup files ---

    /// Login shells read `~/.profile` before the rc file.
    fn source_profile(&mut self) {
        let home = self.state.lookup("HOME").unwrap_or_else(|| "/".to_string());
        let path = PathBuf::from(home).join(".profile");
        if let Ok(text) = std::fs::read_to_string(path) {
            let code = self.execute_source(&text);
            self.state.set_exit_code(code);
        }
    }

    fn rc_path(&self) -> PathBuf {
        match &self.config.rcfile {
            Some(path) => PathBuf::from(path),
            None => {
                let home = self.state.lookup("HOME").unwrap_or_else(|| "/".to_string());
                PathBuf::from(home).join(".pshrc")
            }
        }
    }

    /// Source the RC file, skipping it (with a warning) when it is
    /// world-writable or owned by neither the user nor root.
    fn source_rc_file(&mut self) {
        let path = self.rc_path();
        let Ok(meta) = std::fs::metadata(&path) else {
            return;
        };
        let world_writable = meta.mode() & 0o002 != 0;
        let uid = unsafe { libc::getuid() };
        let owned_ok = meta.uid() == uid || meta.uid() == 0;
        if world_writable || !owned_ok {
            let _ = fd::write_all(
                2,
                format!(
                    "psh: {}: skipping rc file with unsafe permissions\n",
                    path.display()
                )
                .as_bytes(),
            );
            return;
        }
        if let Ok(text) = std::fs::read_to_string(&path) {
            let code = self.execute_source(&text);
            self.state.set_exit_code(code);
        }
    }
}

/// PS1/PS2/PS4, PWD and SHELL defaults when the environment lacks them.
fn seed_default_variables(state: &mut ShellState) {
    for (name, value) in [("PS1", "$ "), ("PS2", "> "), ("PS4", "+ ")] {
        if state.lookup(name).is_none() {
            let _ = state.assign(name, value);
        }
    }
    if state.lookup("PWD").is_none() {
        if let Ok(dir) = std::env::current_dir() {
            let _ = state.assign("PWD", dir.to_string_lossy().into_owned());
        }
    }
    if state.lookup("SHELL").is_none() {
        let _ = state.assign("SHELL", "psh");
    }
}
