//! Action parsing - turns a model reply into something we can dispatch
//!
//! Recognized replies (keyword case-insensitive, colon optional):
//!
//! ```text
//! EXECUTE: <shell command>            (aliases RUN:, TERMINAL:, SHELL:)
//! BROWSE: <verb> <target>             (alias BROWSER:)
//! BROWSE: <verb> <target> | <value>
//! BROWSE: <url>                       (shorthand for navigate)
//! ```
//!
//! Anything else is `Action::Unparseable`; parsing never fails.

use serde::{Deserialize, Serialize};

use super::context::ActionKind;
use crate::browser::BrowserVerb;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Terminal {
        command: String,
    },
    Browser {
        verb: BrowserVerb,
        target: String,
        value: Option<String>,
    },
    Unparseable {
        raw: String,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Terminal { .. } => ActionKind::Terminal,
            Action::Browser { .. } => ActionKind::Browser,
            Action::Unparseable { .. } => ActionKind::Unparseable,
        }
    }

    pub fn is_parsed(&self) -> bool {
        !matches!(self, Action::Unparseable { .. })
    }

    /// Canonical one-line form, as stored in the action history
    pub fn instruction(&self) -> String {
        match self {
            Action::Terminal { command } => format!("EXECUTE: {}", command),
            Action::Browser {
                verb,
                target,
                value: Some(value),
            } => format!("BROWSE: {} {} | {}", verb, target, value),
            Action::Browser { verb, target, value: None } => format!("BROWSE: {} {}", verb, target).trim_end().to_string(),
            Action::Unparseable { raw } => raw.trim().to_string(),
        }
    }
}

enum Keyword {
    Execute,
    Browse,
}

/// Parse a raw model reply into an action
pub fn parse_action(raw: &str) -> Action {
    strip_fences(raw)
        .lines()
        .find_map(parse_line)
        .unwrap_or_else(|| Action::Unparseable { raw: raw.to_string() })
}

/// Every action line in a reply, in order; empty when none parse
pub fn parse_actions(raw: &str) -> Vec<Action> {
    strip_fences(raw).lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Action> {
    let line = line.trim().trim_start_matches(['-', '>', '*', ' ']);
    if line.is_empty() {
        return None;
    }
    let (keyword, rest) = split_keyword(line)?;
    match keyword {
        Keyword::Execute => parse_terminal(rest),
        Keyword::Browse => parse_browser(rest),
    }
}

/// Drop one surrounding ``` fence (with optional language tag) and inline backticks
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(inner) = text.strip_prefix("```") {
        let inner = match inner.find('\n') {
            Some(idx) => &inner[idx + 1..],
            None => inner,
        };
        text = inner.trim_end().strip_suffix("```").unwrap_or(inner).trim();
    }
    text.trim_matches('`').trim()
}

fn split_keyword(line: &str) -> Option<(Keyword, &str)> {
    let end = line.find(|c: char| c.is_whitespace() || c == ':').unwrap_or(line.len());
    let (word, rest) = line.split_at(end);

    let rest = rest.trim_start();
    let (rest, has_colon) = match rest.strip_prefix(':') {
        Some(rest) => (rest, true),
        None => (rest, false),
    };

    // Aliases are ordinary English words, so they only count with a colon
    let keyword = match word.to_uppercase().as_str() {
        "EXECUTE" => Keyword::Execute,
        "BROWSE" => Keyword::Browse,
        "RUN" | "TERMINAL" | "SHELL" if has_colon => Keyword::Execute,
        "BROWSER" if has_colon => Keyword::Browse,
        _ => return None,
    };

    Some((keyword, rest.trim_start_matches('*').trim()))
}

fn parse_terminal(rest: &str) -> Option<Action> {
    let command = rest.trim_matches('`').trim();
    if command.is_empty() {
        return None;
    }
    Some(Action::Terminal {
        command: command.to_string(),
    })
}

fn parse_browser(rest: &str) -> Option<Action> {
    let rest = rest.trim_matches('`').trim();
    if rest.is_empty() {
        return None;
    }

    let (head, tail) = match rest.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (rest, ""),
    };

    let Some(verb) = BrowserVerb::parse(head) else {
        // `BROWSE: example.com` means navigate
        if tail.is_empty() && looks_like_url(head) {
            return Some(Action::Browser {
                verb: BrowserVerb::Navigate,
                target: head.to_string(),
                value: None,
            });
        }
        return None;
    };

    // URLs may legitimately contain '|'
    let (target, value) = if verb == BrowserVerb::Navigate {
        (tail, None)
    } else {
        match tail.split_once('|') {
            Some((target, value)) => (target.trim(), Some(value.trim().to_string()).filter(|v| !v.is_empty())),
            None => (tail, None),
        }
    };

    if target.is_empty() && !verb.target_optional() {
        return None;
    }

    Some(Action::Browser {
        verb,
        target: target.to_string(),
        value,
    })
}

fn looks_like_url(s: &str) -> bool {
    s.contains("://") || s.starts_with("localhost") || (s.contains('.') && !s.starts_with('.') && !s.ends_with('.'))
}
