//! Terminal output for session results

use colored::*;
use eyre::{Context, Result};
use serde::Serialize;

use taskpilot::browser::PageState;
use taskpilot::executor::CommandOutput;
use taskpilot::planner::{ActionRecord, LoopResult, LoopStatus};
use taskpilot::session::{Reply, SessionStatus};
use taskpilot::text::preview;

pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

pub fn command_output(output: &CommandOutput) {
    if !output.stdout.is_empty() {
        println!("{}", output.stdout.trim_end());
    }
    if !output.stderr.is_empty() {
        eprintln!("{}", output.stderr.trim_end().red());
    }
    if !output.success() {
        println!("{} {}", "Exit code:".yellow(), output.exit_code);
    }
}

pub fn page(state: &PageState) {
    println!("{} {}", "URL:".green(), state.url);
    println!("{} {}", "Title:".green(), if state.title.is_empty() { "(no title)" } else { state.title.as_str() });
    if !state.text_preview.is_empty() {
        println!("{}", state.text_preview.dimmed());
    }
}

pub fn record(index: usize, record: &ActionRecord) {
    let mark = if record.success { "ok".green() } else { "failed".red() };
    println!(
        "{} [{}] {} {}",
        format!("{:>3}.", index).dimmed(),
        mark,
        record.instruction.lines().next().unwrap_or("").bold(),
        record.timestamp.format("%H:%M:%S").to_string().dimmed()
    );
}

fn record_with_result(index: usize, rec: &ActionRecord) {
    record(index, rec);
    for line in rec.result.lines().take(12) {
        println!("      {}", line);
    }
    let extra = rec.result.lines().count().saturating_sub(12);
    if extra > 0 {
        println!("      {}", format!("... {} more line(s)", extra).dimmed());
    }
}

pub fn loop_result(result: &LoopResult) {
    for (i, rec) in result.records.iter().enumerate() {
        record_with_result(i + 1, rec);
    }

    let status = match result.status {
        LoopStatus::Completed => "completed".green().bold(),
        LoopStatus::Exhausted => "exhausted".yellow().bold(),
        LoopStatus::Failed => "failed".red().bold(),
    };
    println!(
        "\n{} {} after {} step(s), {} failed",
        "Plan".cyan(),
        status,
        result.iterations,
        result.failed_steps()
    );
    if let Some(summary) = &result.summary {
        println!("{} {}", "Summary:".cyan(), summary);
    }
}

pub fn reply(reply: &Reply) {
    match reply {
        Reply::Answer { text } => println!("{}", text),
        Reply::Actions { records } => {
            for (i, rec) in records.iter().enumerate() {
                record_with_result(i + 1, rec);
            }
        }
    }
}

pub fn status(status: &SessionStatus) {
    println!("{} {}", "Working directory:".cyan(), status.working_dir.display());
    match &status.page {
        Some(page) => println!("{} {} ({})", "Browser:".cyan(), page.url, preview(&page.title, 60)),
        None => println!("{} {}", "Browser:".cyan(), "not started".dimmed()),
    }
    println!(
        "{} {}",
        "Last command:".cyan(),
        status.last_command.as_deref().unwrap_or("(none)")
    );
    println!("{} {}", "Model:".cyan(), status.model);
    println!("{} {}", "Actions this session:".cyan(), status.actions);
    println!(
        "{} {} ({} in, {} out)",
        "Tokens used:".cyan(),
        status.usage.total(),
        status.usage.input_tokens,
        status.usage.output_tokens
    );
}

pub fn input_history(lines: &[String]) {
    println!("{}", "Command history:".cyan());
    if lines.is_empty() {
        println!("{}", "No commands yet".dimmed());
    }
    for (i, line) in lines.iter().enumerate() {
        println!("{} {}", format!("{:>3}.", i + 1).dimmed(), line);
    }
    println!("{}", "Actions:".cyan());
}

pub fn history(records: &[ActionRecord]) {
    if records.is_empty() {
        println!("{}", "No actions yet".dimmed());
        return;
    }
    for (i, rec) in records.iter().enumerate() {
        record(i + 1, rec);
    }
}

pub fn error(err: &dyn std::fmt::Display) {
    eprintln!("{} {}", "Error:".red().bold(), err);
}
