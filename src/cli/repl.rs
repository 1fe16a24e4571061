//! Interactive prompt loop

use std::io::Write;

use colored::*;
use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::render;
use taskpilot::AgentSession;

const HELP: &str = "\
Commands:
  execute <command>     run a shell command
  browse <url>          open a page in the browser
  plan [-n N] <goal>    work through a goal step by step
  cd <dir>              change the working directory
  status                show working directory, browser page and last command
  history               list lines typed and actions taken this session
  help                  show this help
  exit | quit           leave

Anything else is sent to the model as a request.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Help,
    Status,
    History,
    Exit,
    Execute(String),
    Browse(String),
    Plan { goal: String, max_steps: Option<u32> },
    Cd(String),
    Ask(String),
    /// A known verb used wrongly; the text explains how
    Usage(&'static str),
}

pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_lowercase().as_str() {
        "help" | "?" => ReplCommand::Help,
        "status" => ReplCommand::Status,
        "history" => ReplCommand::History,
        "exit" | "quit" => ReplCommand::Exit,
        "execute" | "exec" | "!" if rest.is_empty() => ReplCommand::Usage("usage: execute <command>"),
        "execute" | "exec" | "!" => ReplCommand::Execute(rest.to_string()),
        "browse" if rest.is_empty() => ReplCommand::Usage("usage: browse <url>"),
        "browse" => ReplCommand::Browse(rest.to_string()),
        "cd" => ReplCommand::Cd(rest.to_string()),
        "plan" => parse_plan(rest),
        _ => ReplCommand::Ask(line.to_string()),
    }
}

fn parse_plan(rest: &str) -> ReplCommand {
    let mut max_steps = None;
    let mut goal = rest;

    for flag in ["-n ", "--max-steps "] {
        if let Some(after) = rest.strip_prefix(flag) {
            let after = after.trim_start();
            let (number, remainder) = after.split_once(char::is_whitespace).unwrap_or((after, ""));
            match number.parse::<u32>() {
                Ok(n) => {
                    max_steps = Some(n);
                    goal = remainder.trim();
                }
                Err(_) => return ReplCommand::Usage("usage: plan [-n N] <goal>"),
            }
        }
    }

    if goal.is_empty() {
        return ReplCommand::Usage("usage: plan [-n N] <goal>");
    }
    ReplCommand::Plan {
        goal: goal.to_string(),
        max_steps,
    }
}

/// Lines typed at the prompt, oldest first
#[derive(Debug, Default)]
pub struct InputHistory {
    lines: Vec<String>,
}

impl InputHistory {
    pub fn record(&mut self, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

fn prompt() -> Result<()> {
    print!("{} ", "taskpilot>".cyan().bold());
    std::io::stdout().flush().context("Failed to flush stdout")
}

/// Read lines until `exit` or end of input, running each against the session
pub async fn run(session: &mut AgentSession, json: bool) -> Result<()> {
    println!("{}", "Taskpilot interactive mode. Type 'help' for commands.".cyan());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut typed = InputHistory::default();

    loop {
        prompt()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Use 'exit' or Ctrl-D to quit".yellow());
                continue;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        typed.record(&line);
        let command = parse_line(&line);
        log::debug!("REPL command: {:?}", command);
        if command == ReplCommand::Exit {
            break;
        }
        if let Err(e) = execute(session, command, &typed, json).await {
            render::error(&e);
        }
    }

    println!("{}", "Goodbye".cyan());
    Ok(())
}

async fn execute(session: &mut AgentSession, command: ReplCommand, typed: &InputHistory, json: bool) -> Result<()> {
    match command {
        ReplCommand::Empty | ReplCommand::Exit => {}
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Usage(text) => println!("{}", text.yellow()),
        ReplCommand::Status => {
            let status = session.status().await;
            if json {
                render::json(&status)?;
            } else {
                render::status(&status);
            }
        }
        ReplCommand::History => {
            if json {
                render::json(&serde_json::json!({
                    "commands": typed.lines(),
                    "actions": session.history(),
                }))?;
            } else {
                render::input_history(typed.lines());
                render::history(session.history());
            }
        }
        ReplCommand::Execute(cmd) => {
            let output = session.run_command(&cmd).await?;
            if json {
                render::json(&output)?;
            } else {
                render::command_output(&output);
            }
        }
        ReplCommand::Browse(url) => {
            let state = session.browse_to(&url).await?;
            if json {
                render::json(&state)?;
            } else {
                render::page(&state);
            }
        }
        ReplCommand::Plan { goal, max_steps } => {
            let result = session.plan(&goal, max_steps).await;
            if json {
                render::json(&result)?;
            } else {
                render::loop_result(&result);
            }
        }
        ReplCommand::Cd(dir) => {
            let dir = session.change_directory(&dir)?;
            println!("{}", dir.display());
        }
        ReplCommand::Ask(request) => {
            let reply = session.ask(&request).await?;
            if json {
                render::json(&reply)?;
            } else {
                render::reply(&reply);
            }
        }
    }
    Ok(())
}
