//! ShellExecutor - runs commands through `sh -c`

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CommandExecutor, CommandOutput, ExecutionError};
use crate::config::ExecutorConfig;
use crate::text::truncate;

pub struct ShellExecutor {
    working_dir: Mutex<PathBuf>,
    default_timeout: Duration,
    max_output_chars: usize,
}

impl ShellExecutor {
    pub fn new(working_dir: PathBuf, default_timeout: Duration, max_output_chars: usize) -> Self {
        Self {
            working_dir: Mutex::new(working_dir),
            default_timeout,
            max_output_chars,
        }
    }

    /// Build from config, falling back to the process's current directory
    pub fn from_config(config: &ExecutorConfig) -> Result<Self, ExecutionError> {
        let working_dir = match &config.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| ExecutionError::Unavailable(e.to_string()))?,
        };
        if !working_dir.is_dir() {
            return Err(ExecutionError::InvalidDirectory { path: working_dir });
        }
        log::info!("Shell executor working directory: {}", working_dir.display());
        Ok(Self::new(
            working_dir,
            Duration::from_millis(config.timeout_ms),
            config.max_output_chars,
        ))
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ExecutionError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let cwd = self.working_dir();
        log::info!("Executing command: {}", command);

        let output = tokio::time::timeout(
            timeout,
            Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            log::warn!("Command timed out after {:?}: {}", timeout, command);
            ExecutionError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        })?
        .map_err(|source| ExecutionError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        log::info!("Command exited with status: {}", exit_code);

        Ok(CommandOutput {
            stdout: truncate(&String::from_utf8_lossy(&output.stdout), self.max_output_chars),
            stderr: truncate(&String::from_utf8_lossy(&output.stderr), self.max_output_chars),
            exit_code,
        })
    }

    fn working_dir(&self) -> PathBuf {
        self.working_dir
            .lock()
            .map(|dir| dir.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn change_directory(&self, dir: &Path) -> Result<PathBuf, ExecutionError> {
        let target = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.working_dir().join(dir)
        };

        let target = target
            .canonicalize()
            .map_err(|_| ExecutionError::InvalidDirectory { path: target.clone() })?;
        if !target.is_dir() {
            return Err(ExecutionError::InvalidDirectory { path: target });
        }

        let mut guard = self
            .working_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = target.clone();
        log::info!("Changed working directory to: {}", target.display());
        Ok(target)
    }
}
