//! External command invocation.

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use std::process::Command;

use super::RealRuntime;

/// A fully described external command invocation.
///
/// Carrying the whole invocation as a plain value keeps subprocess launches
/// inspectable in tests and keeps environment additions scoped to the one
/// child process instead of the whole program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables layered on top of the inherited process environment.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    /// Shell-style rendition of the invocation, for log messages only.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_command_impl(&self, spec: &CommandSpec) -> Result<i32> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        debug!("running: {}", spec.command_line());

        let status = command
            .status()
            .with_context(|| format!("Failed to run {}", spec.program))?;

        // A signal death carries no exit code; report it as a failure code.
        Ok(status.code().unwrap_or(-1))
    }
}
