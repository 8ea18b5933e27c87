//! Subprocess execution for the external VCS tools.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Shell-quote a single argument for display in log and error messages.
pub(crate) fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Stringify a program and its arguments as a shell-quoted command line.
pub fn show_cmdline(program: &str, args: &[&str]) -> String {
    let mut s = quote(program);
    for a in args {
        s.push(' ');
        s.push_str(&quote(a));
    }
    s
}

/// Run a command in `cwd`, returning its output.
///
/// A missing executable maps to [`Error::CommandNotFound`]; a nonzero exit
/// maps to [`Error::CommandFailed`] carrying the captured stderr.
pub fn runcmd(program: &str, args: &[&str], cwd: &Path, env: &[(&str, &str)]) -> Result<Output> {
    let cmdline = show_cmdline(program, args);
    tracing::debug!("running: {cmdline}");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in env {
        cmd.env(key, value);
    }

    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::CommandNotFound {
                program: program.to_string(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(Error::CommandFailed {
            cmdline,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a command and return its stripped stdout.
pub fn readcmd(program: &str, args: &[&str], cwd: &Path, env: &[(&str, &str)]) -> Result<String> {
    let output = runcmd(program, args, cwd, env)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cwd() -> PathBuf {
        std::env::current_dir().unwrap()
    }

    #[test]
    fn quote_passes_plain_words() {
        assert_eq!(quote("describe"), "describe");
        assert_eq!(quote("--match=v*"), "'--match=v*'");
    }

    #[test]
    fn show_cmdline_joins_and_quotes() {
        assert_eq!(
            show_cmdline("git", &["describe", "--match=v [0-9]*"]),
            "git describe '--match=v [0-9]*'"
        );
    }

    #[test]
    fn readcmd_returns_trimmed_stdout() {
        let out = readcmd("echo", &["hello"], &cwd(), &[]).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn runcmd_missing_program_is_not_found() {
        let err = runcmd("tagver-no-such-program", &[], &cwd(), &[]).unwrap_err();
        assert!(matches!(err, Error::CommandNotFound { .. }));
    }

    #[test]
    fn runcmd_nonzero_exit_is_command_failed() {
        let err = runcmd("false", &[], &cwd(), &[]).unwrap_err();
        match err {
            Error::CommandFailed { code, .. } => assert_eq!(code, Some(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
