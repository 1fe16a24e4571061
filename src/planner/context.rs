//! Context Store - ordered, append-only log of what each step did

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Terminal,
    Browser,
    Unparseable,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Terminal => write!(f, "terminal"),
            ActionKind::Browser => write!(f, "browser"),
            ActionKind::Unparseable => write!(f, "unparseable"),
        }
    }
}

/// One executed step: what was asked for and what came back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub instruction: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl ActionRecord {
    pub fn new(kind: ActionKind, instruction: impl Into<String>, result: impl Into<String>, success: bool) -> Self {
        Self {
            kind,
            instruction: instruction.into(),
            result: result.into(),
            timestamp: Utc::now(),
            success,
        }
    }
}

/// History of one run. Records can be appended and read, never changed.
#[derive(Debug, Default)]
pub struct ContextStore {
    records: Vec<ActionRecord>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: ActionRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    /// Ordered copy of every record
    pub fn snapshot(&self) -> Vec<ActionRecord> {
        self.records.clone()
    }

    /// The trailing `n` records, oldest first
    pub fn window(&self, n: usize) -> &[ActionRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// 1-based position of the first record in `window(n)`
    pub fn window_start(&self, n: usize) -> usize {
        self.records.len().saturating_sub(n) + 1
    }

    pub fn last(&self) -> Option<&ActionRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ActionRecord> {
        self.records
    }
}
