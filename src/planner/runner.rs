//! Plan runner - the plan-execution loop
//!
//! Each iteration:
//! 1. Builds a prompt from the goal and the trailing window of the history
//! 2. Asks the model for the next action
//! 3. Parses and dispatches it to the shell or the browser
//! 4. Appends the result to the history
//! 5. Runs the completion check (skipped when the reply was unparseable)
//!
//! The run ends when the check says the goal is reached, the step budget is
//! spent, or a collaborator fails in a way that makes further steps pointless.
//! Failure is reported in the returned `LoopResult`, never as an `Err`.

use std::sync::Arc;

use super::action::{Action, parse_action};
use super::completion::{CompletionCheck, KeywordCompletionCheck, ModelCompletionCheck};
use super::context::{ActionKind, ActionRecord, ContextStore};
use super::outcome::LoopResult;
use super::prompt;
use crate::browser::{self, BrowserDriver};
use crate::config::{CompletionStrategy, PlannerConfig};
use crate::error::PilotError;
use crate::executor::CommandExecutor;
use crate::llm::{CompletionRequest, LlmClient};
use crate::text::preview;

pub struct PlanRunner {
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn CommandExecutor>,
    browser: Arc<dyn BrowserDriver>,
    completion: Box<dyn CompletionCheck>,
    config: PlannerConfig,
    temperature: Option<f32>,
}

impl PlanRunner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn CommandExecutor>,
        browser: Arc<dyn BrowserDriver>,
        config: PlannerConfig,
    ) -> Self {
        let completion: Box<dyn CompletionCheck> = match config.completion {
            CompletionStrategy::Model => Box::new(ModelCompletionCheck::new(
                llm.clone(),
                config.history_window,
                config.max_result_chars,
            )),
            CompletionStrategy::Keyword => Box::new(KeywordCompletionCheck::new(config.done_marker.clone())),
        };

        Self {
            llm,
            executor,
            browser,
            completion,
            config,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Drive `goal` to completion in at most `max_steps` iterations
    pub async fn run(&self, goal: &str, max_steps: u32) -> LoopResult {
        let goal = goal.trim();
        if goal.is_empty() {
            log::warn!("Refusing to plan an empty goal");
            return LoopResult::failed(Vec::new(), 0, "goal is empty");
        }
        let max_steps = max_steps.max(1);
        log::info!("Planning goal '{}' with up to {} steps", preview(goal, 80), max_steps);

        let system = prompt::step_system(match self.config.completion {
            CompletionStrategy::Keyword if !self.config.done_marker.trim().is_empty() => {
                Some(self.config.done_marker.as_str())
            }
            _ => None,
        });
        let mut context = ContextStore::new();

        for step in 1..=max_steps {
            let window = self.config.history_window;
            let user = prompt::step_prompt(
                goal,
                context.window(window),
                context.window_start(window),
                self.config.max_result_chars,
                step,
                max_steps,
            );
            let mut request = CompletionRequest::new(system.clone()).with_user_message(user);
            if let Some(temperature) = self.temperature {
                request = request.with_temperature(temperature);
            }

            let reply = match self.llm.complete(request).await {
                Ok(response) => response.content,
                Err(e) => {
                    log::error!("Step {}: model request failed: {}", step, e);
                    return LoopResult::failed(context.into_records(), step, format!("Model request failed: {}", e));
                }
            };

            let action = parse_action(&reply);
            log::info!("Step {}/{}: {}", step, max_steps, preview(&action.instruction(), 120));

            let record = match dispatch(&action, self.executor.as_ref(), self.browser.as_ref()).await {
                Ok(record) => record,
                Err(e) => {
                    log::error!("Step {}: unrecoverable error: {}", step, e);
                    return LoopResult::failed(context.into_records(), step, e.to_string());
                }
            };
            if !record.success {
                log::warn!("Step {} failed: {}", step, preview(&record.result, 120));
            }
            context.append(record);

            if !action.is_parsed() {
                continue;
            }

            match self.completion.check(goal, &context).await {
                Ok(verdict) if verdict.done => {
                    log::info!("Goal reached after {} step(s)", step);
                    return LoopResult::completed(context.into_records(), step, verdict.reason);
                }
                Ok(verdict) => log::debug!("Not done yet: {}", verdict.reason),
                Err(e) => {
                    log::error!("Step {}: completion check failed: {}", step, e);
                    return LoopResult::failed(context.into_records(), step, format!("Completion check failed: {}", e));
                }
            }
        }

        log::info!("Step budget of {} exhausted", max_steps);
        LoopResult::exhausted(context.into_records(), max_steps)
    }
}

/// Execute one parsed action and record what happened.
///
/// Recoverable collaborator errors come back as a failed record; an `Err`
/// means the collaborator is unusable and nothing was recorded.
pub async fn dispatch(
    action: &Action,
    executor: &dyn CommandExecutor,
    browser: &dyn BrowserDriver,
) -> Result<ActionRecord, PilotError> {
    let instruction = action.instruction();

    match action {
        Action::Terminal { command } => match executor.execute(command, None).await {
            Ok(output) => Ok(ActionRecord::new(
                ActionKind::Terminal,
                instruction,
                output.render(),
                output.success(),
            )),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => Ok(ActionRecord::new(ActionKind::Terminal, instruction, e.to_string(), false)),
        },
        Action::Browser { verb, target, value } => {
            match browser::perform(browser, *verb, target, value.as_deref()).await {
                Ok(text) => Ok(ActionRecord::new(ActionKind::Browser, instruction, text, true)),
                Err(e) if e.is_fatal() => Err(e.into()),
                Err(e) => Ok(ActionRecord::new(ActionKind::Browser, instruction, e.to_string(), false)),
            }
        }
        Action::Unparseable { raw } => Ok(ActionRecord::new(ActionKind::Unparseable, instruction, raw.clone(), false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{DriverError, ScriptedBrowser};
    use crate::executor::{CommandOutput, ExecutionError, ScriptedExecutor};
    use crate::llm::{LlmError, MockLlmClient};
    use crate::planner::outcome::LoopStatus;

    struct Harness {
        llm: Arc<MockLlmClient>,
        executor: Arc<ScriptedExecutor>,
        browser: Arc<ScriptedBrowser>,
    }

    impl Harness {
        fn new(llm: MockLlmClient, executor: ScriptedExecutor, browser: ScriptedBrowser) -> Self {
            Self {
                llm: Arc::new(llm),
                executor: Arc::new(executor),
                browser: Arc::new(browser),
            }
        }

        fn runner(&self, config: PlannerConfig) -> PlanRunner {
            PlanRunner::new(self.llm.clone(), self.executor.clone(), self.browser.clone(), config)
        }
    }

    #[tokio::test]
    async fn test_single_command_then_done() {
        let h = Harness::new(
            MockLlmClient::new(["execute ls", "YES"]),
            ScriptedExecutor::succeeding(["a.txt\nb.txt\n"]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("list files", 5).await;

        assert_eq!(result.status, LoopStatus::Completed);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.records[0].kind, ActionKind::Terminal);
        assert_eq!(result.records[0].instruction, "EXECUTE: ls");
        assert!(result.records[0].success);
        assert!(result.records[0].result.contains("a.txt"));
        assert_eq!(h.executor.commands(), vec!["ls"]);
    }

    #[tokio::test]
    async fn test_unparseable_until_exhausted() {
        let h = Harness::new(
            MockLlmClient::new(["hmm", "let me think", "not sure"]),
            ScriptedExecutor::succeeding(Vec::<String>::new()),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("do something", 3).await;

        assert_eq!(result.status, LoopStatus::Exhausted);
        assert_eq!(result.records.len(), 3);
        assert!(result.records.iter().all(|r| !r.success));
        assert!(result.records.iter().all(|r| r.kind == ActionKind::Unparseable));
        // no completion check after an unparseable step
        assert_eq!(h.llm.call_count(), 3);
        assert!(h.executor.commands().is_empty());
    }

    #[tokio::test]
    async fn test_session_lost_fails_run() {
        let h = Harness::new(
            MockLlmClient::new(["BROWSE: navigate example.com", "NO: still loading", "BROWSE: click #more"]),
            ScriptedExecutor::succeeding(Vec::<String>::new()),
            ScriptedBrowser::new(vec![
                Ok("Example Domain".to_string()),
                Err(DriverError::SessionLost("websocket closed".to_string())),
            ]),
        );

        let result = h.runner(PlannerConfig::default()).run("open example.com", 5).await;

        assert_eq!(result.status, LoopStatus::Failed);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.iterations, 2);
        assert!(result.records[0].success);
        assert!(result.summary.unwrap().contains("session lost"));
    }

    #[tokio::test]
    async fn test_recoverable_errors_become_failed_records() {
        let h = Harness::new(
            MockLlmClient::new(["EXECUTE: sleep 100", "NO", "BROWSE: click #missing", "NO"]),
            ScriptedExecutor::new(vec![Err(ExecutionError::Timeout { timeout_ms: 50 })]),
            ScriptedBrowser::new(vec![Err(DriverError::ElementNotFound {
                selector: "#missing".to_string(),
            })]),
        );

        let result = h.runner(PlannerConfig::default()).run("try things", 2).await;

        assert_eq!(result.status, LoopStatus::Exhausted);
        assert_eq!(result.records.len(), 2);
        assert!(result.records[0].result.contains("timed out"));
        assert!(result.records[1].result.contains("#missing"));
        assert_eq!(result.failed_steps(), 2);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failed_record() {
        let h = Harness::new(
            MockLlmClient::new(["EXECUTE: false", "NO"]),
            ScriptedExecutor::new(vec![Ok(CommandOutput::new("", "", 1))]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("fail once", 1).await;

        assert_eq!(result.status, LoopStatus::Exhausted);
        assert!(!result.records[0].success);
        assert!(result.records[0].result.starts_with("Exit code: 1"));
    }

    #[tokio::test]
    async fn test_executor_unavailable_is_fatal() {
        let h = Harness::new(
            MockLlmClient::new(["EXECUTE: ls"]),
            ScriptedExecutor::new(vec![Err(ExecutionError::Unavailable("no shell".to_string()))]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("list", 3).await;

        assert_eq!(result.status, LoopStatus::Failed);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn test_model_error_fails_run_keeping_records() {
        let h = Harness::new(
            MockLlmClient::with_results([
                Ok(crate::llm::CompletionResponse::text("EXECUTE: pwd")),
                Ok(crate::llm::CompletionResponse::text("NO")),
                Err(LlmError::ApiError {
                    status: 500,
                    message: "overloaded".to_string(),
                }),
            ]),
            ScriptedExecutor::succeeding(["/home\n"]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("where am i", 5).await;

        assert_eq!(result.status, LoopStatus::Failed);
        assert_eq!(result.records.len(), 1);
        assert!(result.summary.unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_empty_goal_fails_without_calls() {
        let h = Harness::new(
            MockLlmClient::new(Vec::<String>::new()),
            ScriptedExecutor::succeeding(Vec::<String>::new()),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("   ", 5).await;

        assert_eq!(result.status, LoopStatus::Failed);
        assert!(result.records.is_empty());
        assert_eq!(result.iterations, 0);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_steps_runs_once() {
        let h = Harness::new(
            MockLlmClient::new(["EXECUTE: true", "NO"]),
            ScriptedExecutor::succeeding([""]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("anything", 0).await;

        assert_eq!(result.status, LoopStatus::Exhausted);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn test_keyword_strategy_needs_no_verdict_call() {
        let config = PlannerConfig {
            completion: CompletionStrategy::Keyword,
            ..Default::default()
        };
        let h = Harness::new(
            MockLlmClient::new(["EXECUTE: mkdir out", "EXECUTE: echo TASK_COMPLETE"]),
            ScriptedExecutor::succeeding(["", "TASK_COMPLETE\n"]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(config).run("make out dir", 5).await;

        assert_eq!(result.status, LoopStatus::Completed);
        assert_eq!(result.records.len(), 2);
        assert_eq!(h.llm.call_count(), 2);
        assert!(h.llm.requests()[0].system.contains("EXECUTE: echo TASK_COMPLETE"));
    }

    #[tokio::test]
    async fn test_empty_done_marker_never_completes() {
        let config = PlannerConfig {
            completion: CompletionStrategy::Keyword,
            done_marker: String::new(),
            ..Default::default()
        };
        let h = Harness::new(
            MockLlmClient::new(["EXECUTE: mkdir build", "EXECUTE: ls"]),
            ScriptedExecutor::succeeding(["", "build\n"]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(config).run("set up a build directory", 2).await;

        assert_eq!(result.status, LoopStatus::Exhausted);
        assert_eq!(result.records.len(), 2);
        assert!(!h.llm.requests()[0].system.contains("EXECUTE: echo"));
    }

    #[tokio::test]
    async fn test_prompt_carries_previous_results() {
        let h = Harness::new(
            MockLlmClient::new(["EXECUTE: ls", "NO", "EXECUTE: cat notes.md", "YES: read it"]),
            ScriptedExecutor::succeeding(["notes.md\n", "hello\n"]),
            ScriptedBrowser::new(Vec::new()),
        );

        let result = h.runner(PlannerConfig::default()).run("read the notes", 5).await;

        assert!(result.is_completed());
        assert_eq!(result.summary.as_deref(), Some("read it"));
        let second_step = h.llm.requests()[2].last_user_message().unwrap().to_string();
        assert!(second_step.contains("Step 2 of 5"));
        assert!(second_step.contains("### 1. [ok] EXECUTE: ls"));
        assert!(second_step.contains("notes.md"));
    }

    #[tokio::test]
    async fn test_history_window_bounds_prompt() {
        let config = PlannerConfig {
            history_window: 2,
            completion: CompletionStrategy::Keyword,
            ..Default::default()
        };
        let replies: Vec<String> = (1..=4).map(|i| format!("EXECUTE: echo step{}", i)).collect();
        let h = Harness::new(
            MockLlmClient::new(replies),
            ScriptedExecutor::succeeding(["step1", "step2", "step3", "step4"]),
            ScriptedBrowser::new(Vec::new()),
        );

        h.runner(config).run("count", 4).await;

        let last = h.llm.requests()[3].last_user_message().unwrap().to_string();
        assert!(!last.contains("step1"));
        assert!(last.contains("### 2. [ok] EXECUTE: echo step2"));
        assert!(last.contains("### 3. [ok] EXECUTE: echo step3"));
    }

    #[tokio::test]
    async fn test_dispatch_unparseable() {
        let executor = ScriptedExecutor::succeeding(Vec::<String>::new());
        let browser = ScriptedBrowser::new(Vec::new());
        let action = Action::Unparseable {
            raw: "I am not sure".to_string(),
        };

        let record = dispatch(&action, &executor, &browser).await.unwrap();

        assert_eq!(record.kind, ActionKind::Unparseable);
        assert_eq!(record.result, "I am not sure");
        assert!(!record.success);
    }
}
