use clap::Parser;
use psh::shell::{DebugFlags, Shell, ShellConfig};
use std::io::{IsTerminal, Read};

#[derive(Parser)]
#[command(name = "psh")]
#[command(about = "An educational POSIX/bash-compatible shell")]
#[command(version)]
struct Cli {
    /// Run this command string and exit
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,

    /// Force interactive mode
    #[arg(short = 'i')]
    interactive: bool,

    /// Run as a login shell
    #[arg(short = 'l', long = "login")]
    login: bool,

    /// Skip the user rc file
    #[arg(long = "norc")]
    norc: bool,

    /// Use an alternate rc file
    #[arg(long = "rcfile", value_name = "PATH")]
    rcfile: Option<String>,

    /// Dump the token stream to stderr
    #[arg(long = "debug-tokens")]
    debug_tokens: bool,

    /// Dump the AST to stderr
    #[arg(long = "debug-ast")]
    debug_ast: bool,

    /// Trace word expansion to stderr
    #[arg(long = "debug-expansion")]
    debug_expansion: bool,

    /// Trace command dispatch to stderr
    #[arg(long = "debug-exec")]
    debug_exec: bool,

    /// Parse and validate only; do not execute
    #[arg(long = "validate")]
    validate: bool,

    /// Parser implementation to use
    #[arg(long = "parser", default_value = "recursive-descent")]
    parser: String,

    /// Exit immediately on a command failure (set -e)
    #[arg(short = 'e')]
    errexit: bool,

    /// Treat unset variables as errors (set -u)
    #[arg(short = 'u')]
    nounset: bool,

    /// Trace commands before running them (set -x)
    #[arg(short = 'x')]
    xtrace: bool,

    /// Disable pathname expansion (set -f)
    #[arg(short = 'f')]
    noglob: bool,

    /// Refuse to overwrite files with > (set -C)
    #[arg(short = 'C')]
    noclobber: bool,

    /// Read commands but do not execute them (set -n)
    #[arg(short = 'n')]
    noexec: bool,

    /// Print input lines as they are read (set -v)
    #[arg(short = 'v')]
    verbose: bool,

    /// Enable a long option by name (set -o NAME)
    #[arg(short = 'o', value_name = "NAME")]
    set_options: Vec<String>,

    /// Script path and its arguments
    #[arg(trailing_var_arg = true)]
    script_args: Vec<String>,
}

fn main() {
    // `+o NAME` pairs disable options; clap has no `+` prefix support, so
    // peel them off before parsing
    let mut plus_options = Vec::new();
    let mut argv: Vec<String> = Vec::new();
    let mut raw = std::env::args().peekable();
    while let Some(arg) = raw.next() {
        if arg == "+o" {
            if let Some(name) = raw.next() {
                plus_options.push(name);
            }
        } else {
            argv.push(arg);
        }
    }
    let cli = Cli::parse_from(argv);

    if cli.parser != "recursive-descent" {
        eprintln!("psh: --parser {}: unknown parser implementation", cli.parser);
        std::process::exit(2);
    }

    let script_path = cli.script_args.first().cloned();
    let interactive = cli.interactive
        || (cli.command.is_none() && script_path.is_none() && std::io::stdin().is_terminal());

    let config = ShellConfig {
        interactive,
        login: cli.login,
        norc: cli.norc,
        rcfile: cli.rcfile.clone(),
        validate_only: cli.validate,
        debug: DebugFlags {
            tokens: cli.debug_tokens,
            ast: cli.debug_ast,
            expansion: cli.debug_expansion,
            exec: cli.debug_exec,
        },
    };

    let mut shell = Shell::new(config);
    apply_cli_options(&mut shell, &cli, &plus_options);

    let code = if cli.validate {
        let source = match gather_source(&cli, &script_path) {
            Ok(source) => source,
            Err(code) => std::process::exit(code),
        };
        shell.validate_source(&source)
    } else if let Some(command) = &cli.command {
        // remaining words bind as $0 and the positionals
        if let Some(name) = script_path {
            shell.state.positional.script_name = name;
            shell.state.positional.params = cli.script_args[1..].to_vec();
        }
        shell.run_source(command)
    } else if let Some(path) = script_path {
        shell.run_script(&path, cli.script_args[1..].to_vec())
    } else if interactive {
        shell.run_interactive()
    } else {
        // commands piped on stdin
        let mut source = String::new();
        if std::io::stdin().read_to_string(&mut source).is_err() {
            std::process::exit(1);
        }
        shell.run_source(&source)
    };

    std::process::exit(code);
}

fn apply_cli_options(shell: &mut Shell, cli: &Cli, plus_options: &[String]) {
    let options = &mut shell.state.options;
    options.errexit = cli.errexit;
    options.nounset = cli.nounset;
    options.xtrace = cli.xtrace;
    options.noglob = cli.noglob;
    options.noclobber = cli.noclobber;
    options.noexec = cli.noexec;
    options.verbose = cli.verbose;
    for name in &cli.set_options {
        if options.set_by_name(name, true).is_err() {
            eprintln!("psh: -o {name}: invalid option name");
            std::process::exit(2);
        }
    }
    for name in plus_options {
        if options.set_by_name(name, false).is_err() {
            eprintln!("psh: +o {name}: invalid option name");
            std::process::exit(2);
        }
    }
}

fn gather_source(cli: &Cli, script_path: &Option<String>) -> Result<String, i32> {
    if let Some(command) = &cli.command {
        return Ok(command.clone());
    }
    if let Some(path) = script_path {
        return std::fs::read_to_string(path).map_err(|err| {
            eprintln!("psh: {path}: {err}");
            127
        });
    }
    let mut source = String::new();
    std::io::stdin()
        .read_to_string(&mut source)
        .map_err(|_| 1)?;
    Ok(source)
}
