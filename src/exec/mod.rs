// src/exec/mod.rs

//! External command execution and outcome classification
//!
//! Every privileged operation the migration performs is an external tool
//! invoked from an argument vector (never a shell string). The executor
//! sorts each result into one of three outcomes:
//!
//! - **Success**: the tool exited zero
//! - **Absent**: a *probe* (e.g. `rpm -q pkg`) exited non-zero, meaning the
//!   queried resource does not exist. Callers skip the dependent step.
//! - **Failed**: an *action* exited non-zero. This is fatal for the run and
//!   carries the captured output for diagnosis.

pub mod mock;

use crate::error::{Error, Result};
use std::fmt;
use std::process::{Command, Stdio};
use tracing::debug;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Start building a command for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A zero exit with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A non-zero exit with the given stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Combined stdout and stderr for error reports
    pub fn diagnostics(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => "(no output)".to_string(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Runs external commands to completion
///
/// Implemented by [`SystemRunner`] for real hosts and by
/// [`mock::ScriptedRunner`] in tests.
pub trait CommandRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        (**self).run(cmd)
    }
}

/// Runs commands on the local host, blocking until they exit
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        debug!("Running: {}", cmd);
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                command: cmd.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// How a non-zero exit is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Query-only; non-zero means the resource is absent
    Probe,
    /// Required operation; non-zero is a hard failure
    Action,
}

/// Classified result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(CommandOutput),
    /// A probe answered "no"; the output is kept for logging
    Absent(CommandOutput),
    Failed(CommandOutput),
}

/// Sort a finished command into its outcome
pub fn classify(kind: CommandKind, output: CommandOutput) -> Outcome {
    if output.success() {
        return Outcome::Success(output);
    }
    match kind {
        CommandKind::Probe => Outcome::Absent(output),
        CommandKind::Action => Outcome::Failed(output),
    }
}

/// Executes commands through a runner and applies the outcome policy
#[derive(Debug)]
pub struct Executor<R> {
    runner: R,
}

impl<R: CommandRunner> Executor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run a command and classify its outcome
    pub fn execute(&self, kind: CommandKind, cmd: &CommandSpec) -> Result<Outcome> {
        let output = self.runner.run(cmd)?;
        Ok(classify(kind, output))
    }

    /// Run a query; `false` means the queried resource is absent
    pub fn probe(&self, cmd: &CommandSpec) -> Result<bool> {
        let outcome = self.execute(CommandKind::Probe, cmd)?;
        Ok(matches!(outcome, Outcome::Success(_)))
    }

    /// Run a required operation; a non-zero exit becomes [`Error::CommandFailed`]
    pub fn action(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        match self.execute(CommandKind::Action, cmd)? {
            Outcome::Success(output) => Ok(output),
            Outcome::Failed(output) | Outcome::Absent(output) => Err(Error::CommandFailed {
                command: cmd.to_string(),
                code: output.code,
                output: output.diagnostics(),
            }),
        }
    }
}
