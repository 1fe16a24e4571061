//! Prompt rendering for the plan-execution loop

use super::context::{ActionKind, ActionRecord};
use crate::text::truncate;

const AGENT_ROLE: &str = "You are an automation agent on a Unix machine. You can run shell commands and drive a web browser.";

const ACTION_FORMS: &str = "\
EXECUTE: <shell command>
BROWSE: <verb> <target>
BROWSE: <verb> <target> | <value>

Browser verbs:
  navigate <url>               open a page
  click <selector>             click an element
  type <selector> | <text>     type into an input
  press <key>                  press a key (or: press <selector> | <key>)
  extract [selector]           read the page text, or text of matching elements
  links [selector]             list links on the page
  screenshot [file]            save a PNG of the viewport
  wait <selector> [| ms]       wait for an element to appear
  scroll [down|up|top|bottom|selector]

Selectors are CSS selectors. Do not explain, do not use code fences.";

/// System prompt for each planning step
pub fn step_system(done_marker: Option<&str>) -> String {
    let mut prompt = format!(
        "{}\nDecide the single next action that moves the goal forward.\n\nReply with exactly ONE line in one of these forms:\n\n{}",
        AGENT_ROLE, ACTION_FORMS
    );
    if let Some(marker) = done_marker {
        prompt.push_str(&format!(
            "\n\nWhen the results show the goal has been achieved, reply: EXECUTE: echo {}",
            marker
        ));
    }
    prompt
}

/// System prompt for a one-off request, where a plain answer is allowed
pub fn ask_system() -> String {
    format!(
        "{}\nIf the request needs actions, reply with one line per action, in the order they should run, \
using these forms:\n\n{}\n\nIf it can be answered directly, reply with the answer in plain text instead.",
        AGENT_ROLE, ACTION_FORMS
    )
}

pub const COMPLETION_SYSTEM: &str = "You judge whether an automation goal has been achieved. \
Be strict: answer YES only when the action results show the goal is done.";

/// User message for one planning step
pub fn step_prompt(
    goal: &str,
    history: &[ActionRecord],
    first_number: usize,
    max_result_chars: usize,
    step: u32,
    max_steps: u32,
) -> String {
    let mut prompt = format!("## Goal\n\n{}\n\n", goal);
    prompt.push_str(&format!("## Step {} of {}\n\n", step, max_steps));
    prompt.push_str(&render_history(history, first_number, max_result_chars));
    prompt.push_str("\nWhat is the next action?");
    prompt
}

/// User message asking whether the goal is complete
pub fn completion_prompt(goal: &str, history: &[ActionRecord], first_number: usize, max_result_chars: usize) -> String {
    let mut prompt = format!("## Goal\n\n{}\n\n", goal);
    prompt.push_str(&render_history(history, first_number, max_result_chars));
    prompt.push_str(
        "\nHas the goal been fully achieved? Respond with EXACTLY one of:\n\
         - `YES: <one sentence describing the outcome>`\n\
         - `NO: <what is still missing>`",
    );
    prompt
}

/// User message for a one-off request
pub fn ask_prompt(
    request: &str,
    working_dir: &str,
    page: Option<(&str, &str)>,
    history: &[ActionRecord],
    first_number: usize,
    max_result_chars: usize,
) -> String {
    let mut prompt = format!("## Request\n\n{}\n\n## Environment\n\nWorking directory: {}\n", request, working_dir);
    match page {
        Some((url, title)) => prompt.push_str(&format!("Browser page: {} ({})\n\n", url, title)),
        None => prompt.push_str("Browser page: none open\n\n"),
    }
    if !history.is_empty() {
        prompt.push_str(&render_history(history, first_number, max_result_chars));
    }
    prompt
}

/// Numbered list of previous actions with their (truncated) results
pub fn render_history(history: &[ActionRecord], first_number: usize, max_result_chars: usize) -> String {
    if history.is_empty() {
        return "## Previous actions\n\nNone yet.\n".to_string();
    }

    let mut out = String::from("## Previous actions (most recent last)\n\n");
    for (i, record) in history.iter().enumerate() {
        let status = if record.success { "ok" } else { "failed" };
        out.push_str(&format!(
            "### {}. [{}] {}\n",
            first_number + i,
            status,
            record.instruction.lines().next().unwrap_or("")
        ));
        if record.kind == ActionKind::Unparseable {
            out.push_str("Your reply did not match EXECUTE: or BROWSE:, nothing was run.\n\n");
            continue;
        }
        out.push_str("```\n");
        out.push_str(&truncate(record.result.trim_end(), max_result_chars));
        out.push_str("\n```\n\n");
    }
    out
}
