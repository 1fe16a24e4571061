//! ScriptedExecutor - replays canned command results

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandExecutor, CommandOutput, ExecutionError};

/// Executor that hands back queued results and records every command.
///
/// Once the queue is empty each command succeeds with empty output.
pub struct ScriptedExecutor {
    results: Mutex<VecDeque<Result<CommandOutput, ExecutionError>>>,
    commands: Mutex<Vec<String>>,
    working_dir: Mutex<PathBuf>,
}

impl ScriptedExecutor {
    pub fn new(results: impl IntoIterator<Item = Result<CommandOutput, ExecutionError>>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            commands: Mutex::new(Vec::new()),
            working_dir: Mutex::new(PathBuf::from("/")),
        }
    }

    /// Every call succeeds with the given stdout
    pub fn succeeding<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(outputs.into_iter().map(|s| Ok(CommandOutput::new(s, "", 0))))
    }

    /// Commands executed so far
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &str, _timeout: Option<Duration>) -> Result<CommandOutput, ExecutionError> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.to_string());
        }
        self.results
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok(CommandOutput::new("", "", 0)))
    }

    fn working_dir(&self) -> PathBuf {
        self.working_dir.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn change_directory(&self, dir: &Path) -> Result<PathBuf, ExecutionError> {
        let mut guard = self
            .working_dir
            .lock()
            .map_err(|_| ExecutionError::Unavailable("working dir lock poisoned".to_string()))?;
        let target = guard.join(dir);
        *guard = target.clone();
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_defaults() {
        let exec = ScriptedExecutor::new(vec![
            Ok(CommandOutput::new("first", "", 0)),
            Err(ExecutionError::Timeout { timeout_ms: 10 }),
        ]);

        assert_eq!(exec.execute("a", None).await.unwrap().stdout, "first");
        assert!(exec.execute("b", None).await.is_err());
        assert!(exec.execute("c", None).await.unwrap().success());
        assert_eq!(exec.commands(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_change_directory_joins() {
        let exec = ScriptedExecutor::succeeding(Vec::<String>::new());
        let dir = exec.change_directory(Path::new("tmp")).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp"));
        assert_eq!(exec.working_dir(), PathBuf::from("/tmp"));
    }
}
