//! [`CommandExecutor`] over `tokio::process`
//!
//! Programs are resolved on `PATH` with `which` and spawned without a shell.
//! Elevated runs on Windows go through `Start-Process -Verb RunAs`, which
//! shows the consent prompt; a declined prompt surfaces as
//! [`CommandError::ElevationUnavailable`]. A process that is already
//! elevated runs the command directly. Other platforms have no elevation.

use async_trait::async_trait;
use regpilot_application::ports::command_executor::{
    CommandError, CommandExecutor, CommandLine, CommandOutput,
};
use regpilot_domain::registry::value::quote_single;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Exit code reported when the consent prompt is declined
pub const ELEVATION_CANCELLED: i32 = 1223;

const DEFAULT_LAUNCHER: &str = "powershell.exe";

pub struct ProcessCommandExecutor {
    /// Shell hosting `Start-Process` for elevated runs
    launcher: String,
}

impl Default for ProcessCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessCommandExecutor {
    pub fn new() -> Self {
        Self {
            launcher: DEFAULT_LAUNCHER.to_string(),
        }
    }

    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    /// Whether `program` can be found on `PATH`
    pub fn is_available(program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn resolve(program: &str) -> Result<PathBuf, CommandError> {
        which::which(program).map_err(|e| CommandError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })
    }

    async fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        let program = Self::resolve(&command.program)?;
        debug!("Running {}", command);

        let output = Command::new(&program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CommandError::Spawn {
                program: command.program.clone(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Wrapper that starts `command` through the consent prompt and exits
    /// with its exit code, or with [`ELEVATION_CANCELLED`] when the prompt
    /// is declined
    #[cfg_attr(not(windows), allow(dead_code))]
    fn runas_command(&self, command: &CommandLine) -> CommandLine {
        let mut script = format!(
            "try {{ $p = Start-Process -FilePath {} -Verb RunAs -Wait -PassThru -WindowStyle Hidden",
            quote_single(&command.program)
        );
        if !command.args.is_empty() {
            let args: Vec<String> = command.args.iter().map(|a| quote_single(a)).collect();
            script.push_str(&format!(" -ArgumentList @({})", args.join(",")));
        }
        script.push_str(&format!(
            " -ErrorAction Stop; exit $p.ExitCode }} catch {{ exit {} }}",
            ELEVATION_CANCELLED
        ));

        CommandLine::new(&self.launcher).args(["-NoProfile", "-NonInteractive", "-Command"]).arg(script)
    }

    #[cfg(windows)]
    async fn run_elevated(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        if crate::registry::windows::token::is_elevated() {
            return self.run(command).await;
        }
        let output = self.run(&self.runas_command(command)).await?;
        if output.exit_code == ELEVATION_CANCELLED {
            return Err(CommandError::ElevationUnavailable(
                "the elevation prompt was declined".to_string(),
            ));
        }
        Ok(output)
    }

    #[cfg(not(windows))]
    async fn run_elevated(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        debug!("No elevation on this platform for {}", command.program);
        Err(CommandError::ElevationUnavailable(
            "elevation is only supported on Windows".to_string(),
        ))
    }
}

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        self.run(command).await
    }

    async fn execute_elevated(
        &self,
        command: &CommandLine,
    ) -> Result<CommandOutput, CommandError> {
        self.run_elevated(command).await
    }
}
