//! Agent session - owns the collaborators for one CLI session
//!
//! The caller builds an `AgentSession`, uses it for any number of commands,
//! browser steps, plans and requests, then calls [`AgentSession::shutdown`]
//! to release the browser.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::browser::{BrowserDriver, ChromeDriver, PageState, normalize_url};
use crate::config::Config;
use crate::error::{PilotError, Result};
use crate::executor::{CommandExecutor, CommandOutput, ShellExecutor};
use crate::llm::{CompletionRequest, LlmClient, Usage};
use crate::planner::{Action, ActionKind, ActionRecord, ContextStore, LoopResult, PlanRunner, dispatch, parse_actions, prompt};

const NO_API_KEY: &str = "no model API key configured (set OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --api-key)";

/// Answer to a free-form request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    /// The model answered in plain text
    Answer { text: String },
    /// The model asked for actions, which were carried out in order
    Actions { records: Vec<ActionRecord> },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub working_dir: PathBuf,
    pub page: Option<PageState>,
    pub last_command: Option<String>,
    pub model: String,
    pub actions: usize,
    pub usage: Usage,
}

pub struct AgentSession {
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn CommandExecutor>,
    browser: Arc<dyn BrowserDriver>,
    config: Config,
    history: ContextStore,
    last_command: Option<String>,
}

impl AgentSession {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn CommandExecutor>,
        browser: Arc<dyn BrowserDriver>,
        config: Config,
    ) -> Self {
        Self {
            llm,
            executor,
            browser,
            config,
            history: ContextStore::new(),
            last_command: None,
        }
    }

    /// Session backed by the real shell and a lazily started Chrome
    pub fn from_config(config: Config, llm: Arc<dyn LlmClient>) -> Result<Self> {
        let executor = Arc::new(ShellExecutor::from_config(&config.executor)?);
        let browser = Arc::new(ChromeDriver::new(config.browser.clone()));
        Ok(Self::new(llm, executor, browser, config))
    }

    /// Run one shell command directly, bypassing the planner
    pub async fn run_command(&mut self, command: &str) -> Result<CommandOutput> {
        let command = command.trim();
        if command.is_empty() {
            return Err(PilotError::InvalidInput("command is empty".to_string()));
        }
        self.last_command = Some(command.to_string());
        let instruction = format!("EXECUTE: {}", command);

        match self.executor.execute(command, None).await {
            Ok(output) => {
                self.history.append(ActionRecord::new(
                    ActionKind::Terminal,
                    instruction,
                    output.render(),
                    output.success(),
                ));
                Ok(output)
            }
            Err(e) => {
                self.history
                    .append(ActionRecord::new(ActionKind::Terminal, instruction, e.to_string(), false));
                Err(e.into())
            }
        }
    }

    /// Open `url` in the session's browser
    pub async fn browse_to(&mut self, url: &str) -> Result<PageState> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PilotError::InvalidInput("url is empty".to_string()));
        }
        let url = normalize_url(url);
        let instruction = format!("BROWSE: navigate {}", url);

        match self.browser.navigate(&url).await {
            Ok(state) => {
                self.history
                    .append(ActionRecord::new(ActionKind::Browser, instruction, state.to_string(), true));
                Ok(state)
            }
            Err(e) => {
                self.history
                    .append(ActionRecord::new(ActionKind::Browser, instruction, e.to_string(), false));
                Err(e.into())
            }
        }
    }

    /// Run the plan-execution loop; `None` uses the configured step budget
    pub async fn plan(&mut self, goal: &str, max_steps: Option<u32>) -> LoopResult {
        if !self.llm.is_ready() {
            return LoopResult::failed(Vec::new(), 0, NO_API_KEY);
        }
        let runner = PlanRunner::new(
            self.llm.clone(),
            self.executor.clone(),
            self.browser.clone(),
            self.config.planner.clone(),
        )
        .with_temperature(self.config.llm.temperature);

        let result = runner
            .run(goal, max_steps.unwrap_or(self.config.planner.max_steps))
            .await;
        for record in &result.records {
            self.history.append(record.clone());
        }
        result
    }

    /// One model call for a free-form request; each action line in the reply
    /// is carried out in order. A fatal error stops the rest, and the actions
    /// already done stay in the history.
    pub async fn ask(&mut self, request: &str) -> Result<Reply> {
        let request = request.trim();
        if request.is_empty() {
            return Err(PilotError::InvalidInput("request is empty".to_string()));
        }
        if !self.llm.is_ready() {
            return Err(PilotError::Config(NO_API_KEY.to_string()));
        }

        let page = self.browser.current_state().await.ok().flatten();
        let working_dir = self.executor.working_dir();
        let window = self.config.planner.history_window;
        let user = prompt::ask_prompt(
            request,
            &working_dir.display().to_string(),
            page.as_ref().map(|p| (p.url.as_str(), p.title.as_str())),
            self.history.window(window),
            self.history.window_start(window),
            self.config.planner.max_result_chars,
        );
        let completion = CompletionRequest::new(prompt::ask_system())
            .with_user_message(user)
            .with_temperature(self.config.llm.temperature);

        let response = self.llm.complete(completion).await?;
        let actions = parse_actions(&response.content);
        if actions.is_empty() {
            return Ok(Reply::Answer {
                text: response.content.trim().to_string(),
            });
        }

        let mut records = Vec::with_capacity(actions.len());
        for action in &actions {
            if let Action::Terminal { command } = action {
                self.last_command = Some(command.clone());
            }
            let record = dispatch(action, self.executor.as_ref(), self.browser.as_ref()).await?;
            self.history.append(record.clone());
            records.push(record);
        }
        Ok(Reply::Actions { records })
    }

    /// Move the shell's working directory; `~` expands to the home directory
    pub fn change_directory(&mut self, dir: &str) -> Result<PathBuf> {
        let dir = dir.trim();
        let path = match dir {
            "" | "~" => dirs::home_dir().ok_or_else(|| PilotError::InvalidInput("no home directory".to_string()))?,
            _ => match dir.strip_prefix("~/") {
                Some(rest) => dirs::home_dir()
                    .ok_or_else(|| PilotError::InvalidInput("no home directory".to_string()))?
                    .join(rest),
                None => PathBuf::from(dir),
            },
        };
        Ok(self.executor.change_directory(&path)?)
    }

    pub async fn status(&self) -> SessionStatus {
        let page = match self.browser.current_state().await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Could not read browser state: {}", e);
                None
            }
        };
        SessionStatus {
            working_dir: self.executor.working_dir(),
            page,
            last_command: self.last_command.clone(),
            model: self.llm.model().to_string(),
            actions: self.history.len(),
            usage: self.llm.total_usage(),
        }
    }

    /// Every action carried out in this session, oldest first
    pub fn history(&self) -> &[ActionRecord] {
        self.history.records()
    }

    /// Release the browser
    pub async fn shutdown(self) -> Result<()> {
        log::info!("Shutting down session after {} action(s)", self.history.len());
        self.browser.close().await?;
        Ok(())
    }
}
