//! LoopResult - what a plan run hands back

use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::ActionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    /// The completion check said the goal was reached
    Completed,
    /// The step budget ran out first
    Exhausted,
    /// An unrecoverable collaborator error, or no usable goal
    Failed,
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopStatus::Completed => write!(f, "completed"),
            LoopStatus::Exhausted => write!(f, "exhausted"),
            LoopStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopResult {
    pub status: LoopStatus,
    pub records: Vec<ActionRecord>,
    pub summary: Option<String>,
    /// Decision iterations started, including one that ended in a fatal error
    pub iterations: u32,
}

impl LoopResult {
    pub fn completed(records: Vec<ActionRecord>, iterations: u32, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        Self {
            status: LoopStatus::Completed,
            records,
            summary: Some(if summary.is_empty() { "Goal reached".to_string() } else { summary }),
            iterations,
        }
    }

    pub fn exhausted(records: Vec<ActionRecord>, iterations: u32) -> Self {
        Self {
            status: LoopStatus::Exhausted,
            records,
            summary: Some(format!("Step limit of {} reached before the goal was confirmed", iterations)),
            iterations,
        }
    }

    pub fn failed(records: Vec<ActionRecord>, iterations: u32, reason: impl Into<String>) -> Self {
        Self {
            status: LoopStatus::Failed,
            records,
            summary: Some(reason.into()),
            iterations,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == LoopStatus::Completed
    }

    pub fn failed_steps(&self) -> usize {
        self.records.iter().filter(|r| !r.success).count()
    }
}
