//! Running shell commands with merged, captured output.

use log::debug;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;

/// Directory commands run in when none is given.
pub const DEFAULT_DIR: &str = "/";

/// Errors that can occur when running a command
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("starting {command:?} in {} failed", dir.display())]
    Spawn {
        command: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading output of {command:?} failed")]
    Read {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("waiting for {command:?} failed")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("running {command:?} in {} failed with exit code {code}: {output}", dir.display())]
    Exit {
        command: String,
        dir: PathBuf,
        code: i32,
        output: String,
    },

    #[error("running {command:?} in {} was terminated by a signal: {output}", dir.display())]
    Terminated {
        command: String,
        dir: PathBuf,
        output: String,
    },
}

impl ExecError {
    /// Mask every occurrence of `secret` in the command and captured output.
    #[must_use]
    pub fn redact(self, secret: &str) -> Self {
        if secret.is_empty() {
            return self;
        }
        let mask = |s: String| s.replace(secret, "***");
        match self {
            Self::Spawn {
                command,
                dir,
                source,
            } => Self::Spawn {
                command: mask(command),
                dir,
                source,
            },
            Self::Read { command, source } => Self::Read {
                command: mask(command),
                source,
            },
            Self::Wait { command, source } => Self::Wait {
                command: mask(command),
                source,
            },
            Self::Exit {
                command,
                dir,
                code,
                output,
            } => Self::Exit {
                command: mask(command),
                dir,
                code,
                output: mask(output),
            },
            Self::Terminated {
                command,
                dir,
                output,
            } => Self::Terminated {
                command: mask(command),
                dir,
                output: mask(output),
            },
        }
    }
}

/// Runs shell commands on behalf of the git and Go module drivers.
pub trait CommandRunner {
    /// Run `command` through the shell in `dir` ([`DEFAULT_DIR`] if `None`).
    ///
    /// Returns the combined stdout and stderr output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Exit`] if the command exits with a non-zero code,
    /// other variants if it cannot be started or awaited.
    fn run(&self, dir: Option<&Path>, command: &str) -> Result<String, ExecError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, dir: Option<&Path>, command: &str) -> Result<String, ExecError> {
        (**self).run(dir, command)
    }
}

/// [`CommandRunner`] executing commands with `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, dir: Option<&Path>, command: &str) -> Result<String, ExecError> {
        let dir = dir.unwrap_or_else(|| Path::new(DEFAULT_DIR));
        debug!("exec: running {command:?} in directory {}", dir.display());

        // stderr is redirected into the stdout pipe so lines keep their order.
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(format!("exec 2>&1\n{command}"))
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: command.to_owned(),
                dir: dir.to_path_buf(),
                source,
            })?;

        let mut output = String::new();
        if let Some(stdout) = child.stdout.take()
            && let Err(source) = collect_lines(&mut BufReader::new(stdout), &mut output)
        {
            abort(&mut child, command);
            return Err(ExecError::Read {
                command: command.to_owned(),
                source,
            });
        }

        let status = child.wait().map_err(|source| ExecError::Wait {
            command: command.to_owned(),
            source,
        })?;

        if status.success() {
            return Ok(output);
        }

        Err(match status.code() {
            Some(code) => ExecError::Exit {
                command: command.to_owned(),
                dir: dir.to_path_buf(),
                code,
                output,
            },
            None => ExecError::Terminated {
                command: command.to_owned(),
                dir: dir.to_path_buf(),
                output,
            },
        })
    }
}

/// Append every line of `reader` to `output` with `\n` endings, logging each one.
fn collect_lines(reader: &mut impl BufRead, output: &mut String) -> io::Result<()> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\n', '\r']);
        debug!("exec: {text}");
        output.push_str(text);
        output.push('\n');
    }
}

/// Kill and reap `child` whose output can no longer be read.
fn abort(child: &mut Child, command: &str) {
    if let Err(err) = child.kill() {
        debug!("exec: killing {command:?} failed: {err}");
    }
    if let Err(err) = child.wait() {
        debug!("exec: waiting for {command:?} failed: {err}");
    }
}

/// Quote `arg` for interpolation into a POSIX shell command line.
#[must_use]
pub fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,%".contains(c));
    if safe {
        return arg.to_owned();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Quote every path in `paths` and join them with spaces.
#[must_use]
pub fn quote_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| quote(&p.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}
