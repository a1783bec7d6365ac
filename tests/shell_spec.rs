//! End-to-end behaviour through the full pipeline: real forks, real pipes,
//! real file descriptors. Output is observed by redirecting into scratch
//! files, since the shell writes through the process's own descriptors.

use psh::shell::{Shell, ShellConfig};
use std::sync::{Mutex, MutexGuard};

// Tests that redirect the process's own stdout must not interleave
static STDOUT_LOCK: Mutex<()> = Mutex::new(());

fn stdout_guard() -> MutexGuard<'static, ()> {
    STDOUT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn shell() -> Shell {
    let mut sh = Shell::new(ShellConfig::default());
    sh.state.assign("PATH", "/usr/bin:/bin").unwrap();
    sh
}

/// Run `script` with stdout captured into a scratch file. The script runs
/// in a subshell so the redirect lands in the forked child and this test
/// process's own stdout is never rewired.
fn capture(script: &str) -> (i32, String) {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut sh = shell();
    let wrapped = format!("(\n{script}\n) > {}", out.display());
    let code = sh.run_source(&wrapped);
    let stdout = std::fs::read_to_string(&out).unwrap_or_default();
    (code, stdout)
}

#[test]
fn pipeline_runs_real_processes() {
    let (code, out) = capture("echo hello | tr a-z A-Z");
    assert_eq!(code, 0);
    assert_eq!(out, "HELLO\n");
}

#[test]
fn for_loop_iterates_in_process() {
    let (code, out) = capture("for i in 1 2 3; do echo $i; done");
    assert_eq!(code, 0);
    assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn subshell_sees_changes_parent_does_not() {
    let (code, out) = capture("x=1; (x=2; echo $x); echo $x");
    assert_eq!(code, 0);
    assert_eq!(out, "2\n1\n");
}

#[test]
fn dynamic_scoping_across_functions() {
    let (code, out) = capture("f() { local x=1; g; }; g() { echo $x; }; x=0; f");
    assert_eq!(code, 0);
    assert_eq!(out, "1\n");
}

#[test]
fn errexit_terminates_before_echo() {
    let (code, out) = capture("set -e\nfalse\necho reached");
    assert_eq!(code, 1);
    assert_eq!(out, "");
}

#[test]
fn heredoc_expands_with_unquoted_delimiter() {
    let mut sh = shell();
    sh.state.assign("USER", "alice").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let code = sh.run_source(&format!(
        "cat <<EOF > {}\nhello $USER\nEOF\n",
        out.display()
    ));
    assert_eq!(code, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello alice\n");
}

#[test]
fn quoted_heredoc_delimiter_suppresses_expansion() {
    let mut sh = shell();
    sh.state.assign("USER", "alice").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let code = sh.run_source(&format!(
        "cat <<'EOF' > {}\nhello $USER\nEOF\n",
        out.display()
    ));
    assert_eq!(code, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello $USER\n");
}

#[test]
fn parameter_default_leaves_variable_unset() {
    let (code, out) = capture("echo ${x:-default}");
    assert_eq!(code, 0);
    assert_eq!(out, "default\n");

    let mut sh = shell();
    sh.run_source("probe=${x:-default}");
    assert!(sh.state.lookup("x").is_none());
}

#[test]
fn parameter_assign_default_sets_variable() {
    let (code, out) = capture("echo ${x:=default}");
    assert_eq!(code, 0);
    assert_eq!(out, "default\n");

    let mut sh = shell();
    sh.run_source("probe=${x:=default}");
    assert_eq!(sh.state.lookup("x").as_deref(), Some("default"));
}

#[test]
fn quoted_at_preserves_word_boundaries() {
    let (code, out) = capture("set -- a 'b c' d\nfor x in \"$@\"; do echo \"[$x]\"; done");
    assert_eq!(code, 0);
    assert_eq!(out, "[a]\n[b c]\n[d]\n");
}

#[test]
fn brace_group_redirect_collects_both_lines() {
    let _guard = stdout_guard();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut sh = shell();
    let code = sh.run_source(&format!("{{ echo a; echo b; }} > {}", out.display()));
    assert_eq!(code, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "a\nb\n");
}

#[test]
fn and_or_chain_takes_first_branch() {
    let (code, out) = capture("true && echo yes || echo no");
    assert_eq!(code, 0);
    assert_eq!(out, "yes\n");
}

#[test]
fn and_or_chain_takes_second_branch() {
    let (_, out) = capture("false && echo yes || echo no");
    assert_eq!(out, "no\n");
}

#[test]
fn command_substitution_captures_and_strips() {
    let mut sh = shell();
    sh.run_source("v=$(echo hello)");
    assert_eq!(sh.state.lookup("v").as_deref(), Some("hello"));
    // exit code of the substitution lands in $?
    sh.run_source("w=$(false)");
    assert_eq!(sh.state.last_exit_code, 0); // the assignment itself succeeded
}

#[test]
fn pipefail_uses_rightmost_failure() {
    let mut sh = shell();
    let code = sh.run_source("set -o pipefail\nfalse | true");
    assert_eq!(code, 1);

    let mut sh = shell();
    let code = sh.run_source("false | true");
    assert_eq!(code, 0);
}

#[test]
fn exit_code_of_killed_child_is_128_plus_signal() {
    let mut sh = shell();
    // the child kills itself with SIGKILL (9)
    let code = sh.run_source("sh -c 'kill -9 $$'");
    assert_eq!(code, 137);
}

#[test]
fn command_not_found_is_127() {
    let mut sh = shell();
    assert_eq!(sh.run_source("definitely-no-such-command-zzz"), 127);
}

#[test]
fn word_splitting_in_unquoted_expansion() {
    let (_, out) = capture("x='hello world'\nprintf '[%s]' $x\necho");
    assert_eq!(out, "[hello][world]\n");
}

#[test]
fn quoted_expansion_stays_one_word() {
    let (_, out) = capture("x='hello world'\nprintf '[%s]' \"$x\"\necho");
    assert_eq!(out, "[hello world]\n");
}

#[test]
fn glob_expansion_matches_files() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["one.txt", "two.txt", "other.rs"] {
        std::fs::write(dir.path().join(name), "").unwrap();
    }
    let base = dir.path().display();
    let (_, out) = capture(&format!("echo {base}/*.txt"));
    assert_eq!(out, format!("{base}/one.txt {base}/two.txt\n"));
}

#[test]
fn herestring_feeds_stdin() {
    let (_, out) = capture("cat <<< 'from herestring'");
    assert_eq!(out, "from herestring\n");
}

#[test]
fn fd_duplication_merges_streams() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut sh = shell();
    sh.run_source(&format!(
        "sh -c 'echo to-stderr 1>&2' > {} 2>&1",
        out.display()
    ));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "to-stderr\n");
}

#[test]
fn case_dispatches_on_glob() {
    let (_, out) = capture("case report.txt in *.rs) echo rust;; *.txt) echo text;; esac");
    assert_eq!(out, "text\n");
}

#[test]
fn background_job_records_pid() {
    let mut sh = shell();
    sh.run_source("sleep 0.05 & wait $!");
    assert!(sh.state.last_background_pid.is_some());
}

#[test]
fn arithmetic_expansion_in_words() {
    let (_, out) = capture("echo $((6 * 7))");
    assert_eq!(out, "42\n");
}

#[test]
fn exit_uses_last_code_when_bare() {
    let mut sh = shell();
    assert_eq!(sh.run_source("false\nexit"), 1);
}

#[test]
fn process_substitution_provides_readable_path() {
    let (_, out) = capture("cat <(echo from-procsub)");
    assert_eq!(out, "from-procsub\n");
}

#[test]
fn eval_and_unset_round_trip() {
    let mut sh = shell();
    sh.run_source("eval 'x=42'; unset x");
    assert!(sh.state.lookup("x").is_none());
}
