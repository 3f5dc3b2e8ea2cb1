//! Command executor port
//!
//! Defines the external process-execution capability used by the privileged
//! write fallback and by `powercfg`-backed settings. The engine never spawns
//! processes itself.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while running an external command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("Elevation unavailable: {0}")]
    ElevationUnavailable(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CommandError {
    pub fn is_elevation_unavailable(&self) -> bool {
        matches!(self, CommandError::ElevationUnavailable(_))
    }
}

/// Program plus arguments, passed to the OS without a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Port for running external commands
///
/// There is no engine-imposed timeout; callers await completion.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run with the current process's rights
    async fn execute(&self, command: &CommandLine) -> Result<CommandOutput, CommandError>;

    /// Run with elevated rights.
    ///
    /// Returns [`CommandError::ElevationUnavailable`] when elevation cannot
    /// be obtained (declined prompt, unsupported platform).
    async fn execute_elevated(&self, command: &CommandLine)
    -> Result<CommandOutput, CommandError>;
}
