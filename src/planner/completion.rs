//! Completion checks - decide after each step whether the goal is reached
//!
//! Two strategies:
//! - `ModelCompletionCheck` asks the model a YES/NO question about the history
//! - `KeywordCompletionCheck` looks for a marker in the latest successful result
//!
//! Both are heuristics. An answer that cannot be read as YES counts as "not done".

use std::sync::Arc;

use async_trait::async_trait;

use super::context::ContextStore;
use super::prompt;
use crate::llm::{CompletionRequest, LlmClient, LlmError};

const VERDICT_MAX_TOKENS: u32 = 200;

/// Outcome of a completion check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub done: bool,
    pub reason: String,
}

impl Verdict {
    pub fn done(reason: impl Into<String>) -> Self {
        Self {
            done: true,
            reason: reason.into(),
        }
    }

    pub fn not_done(reason: impl Into<String>) -> Self {
        Self {
            done: false,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait CompletionCheck: Send + Sync {
    async fn check(&self, goal: &str, context: &ContextStore) -> Result<Verdict, LlmError>;
}

/// Second model call with the goal and recent history
pub struct ModelCompletionCheck {
    client: Arc<dyn LlmClient>,
    history_window: usize,
    max_result_chars: usize,
}

impl ModelCompletionCheck {
    pub fn new(client: Arc<dyn LlmClient>, history_window: usize, max_result_chars: usize) -> Self {
        Self {
            client,
            history_window,
            max_result_chars,
        }
    }
}

#[async_trait]
impl CompletionCheck for ModelCompletionCheck {
    async fn check(&self, goal: &str, context: &ContextStore) -> Result<Verdict, LlmError> {
        let user = prompt::completion_prompt(
            goal,
            context.window(self.history_window),
            context.window_start(self.history_window),
            self.max_result_chars,
        );
        let request = CompletionRequest::new(prompt::COMPLETION_SYSTEM)
            .with_user_message(user)
            .with_max_tokens(VERDICT_MAX_TOKENS)
            .with_temperature(0.0);

        let response = self.client.complete(request).await?;
        let verdict = parse_verdict(&response.content);
        log::debug!("Completion verdict: done={} ({})", verdict.done, verdict.reason);
        Ok(verdict)
    }
}

/// Marker search in the most recent record, which must have succeeded
pub struct KeywordCompletionCheck {
    marker: String,
}

impl KeywordCompletionCheck {
    pub fn new(marker: impl Into<String>) -> Self {
        Self { marker: marker.into() }
    }
}

#[async_trait]
impl CompletionCheck for KeywordCompletionCheck {
    async fn check(&self, _goal: &str, context: &ContextStore) -> Result<Verdict, LlmError> {
        // An empty marker would match every result
        if self.marker.trim().is_empty() {
            return Ok(Verdict::not_done("no completion marker configured"));
        }
        match context.last() {
            Some(record) if record.success && record.result.contains(&self.marker) => {
                Ok(Verdict::done(format!("{} reported", self.marker)))
            }
            _ => Ok(Verdict::not_done(format!("{} not seen", self.marker))),
        }
    }
}

/// Read a YES/NO verdict out of free text
pub fn parse_verdict(response: &str) -> Verdict {
    let response = response.trim().trim_matches(|c: char| c == '`' || c == '*').trim();

    let word = response.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");
    let rest = response[word.len()..]
        .trim_start_matches(|c: char| matches!(c, ':' | '-' | ',' | '.' | '*') || c.is_whitespace())
        .trim();

    match word.to_uppercase().as_str() {
        "YES" => return Verdict::done(rest),
        "NO" => return Verdict::not_done(rest),
        _ => {}
    }

    // Infer from content, negatives first
    let lower = response.to_lowercase();
    const NEGATIVE: [&str; 6] = ["not yet", "not been", "not complete", "incomplete", "not achieved", "not done"];
    const POSITIVE: [&str; 4] = ["has been achieved", "is complete", "is done", "goal achieved"];

    if NEGATIVE.iter().any(|p| lower.contains(p)) {
        return Verdict::not_done(response);
    }
    if POSITIVE.iter().any(|p| lower.contains(p)) {
        return Verdict::done(response);
    }

    Verdict::not_done(format!("unclear verdict: {}", crate::text::preview(response, 100)))
}
