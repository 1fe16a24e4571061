use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use cli::render;
use taskpilot::AgentSession;
use taskpilot::config::Config;
use taskpilot::llm::{self, LlmClient, LlmError};

fn setup_logging() -> Result<PathBuf> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskpilot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("taskpilot.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // The configured level is applied later through the global max level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .target(env_logger::Target::Pipe(target))
        .init();
    apply_log_level(LevelFilter::Info);

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

/// `RUST_LOG`, when set, wins over the configured level
fn apply_log_level(level: LevelFilter) {
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(level);
    }
}

/// Build the model client; without a key, plan and ask report it when used
fn build_client(cli: &Cli, config: &Config) -> Result<Arc<dyn LlmClient>> {
    match llm::from_config(&config.llm, cli.api_key.clone()) {
        Ok(client) => Ok(client),
        Err(LlmError::MissingApiKey { env_var }) => {
            log::warn!("{} not set", env_var);
            if matches!(cli.command, None | Some(Commands::Plan { .. }) | Some(Commands::Ask { .. })) {
                eprintln!(
                    "{} {} is not set; plan and ask need it (or pass --api-key)",
                    "Warning:".yellow(),
                    env_var
                );
            }
            llm::from_config(&config.llm, Some(String::new())).context("Failed to create model client")
        }
        Err(e) => Err(e).context("Failed to create model client"),
    }
}

async fn run_application(cli: &Cli, session: &mut AgentSession) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => cli::repl::run(session, cli.json).await,
        Some(Commands::Exec { command }) => handle_exec_command(&command.join(" "), cli.json, session).await,
        Some(Commands::Browse { url }) => handle_browse_command(url, cli.json, session).await,
        Some(Commands::Plan { max_steps, goal }) => {
            handle_plan_command(&goal.join(" "), *max_steps, cli.json, session).await
        }
        Some(Commands::Ask { request }) => handle_ask_command(&request.join(" "), cli.json, session).await,
    }
}

async fn handle_exec_command(command: &str, json: bool, session: &mut AgentSession) -> Result<()> {
    info!("Executing: {}", command);
    let output = session.run_command(command).await?;
    if json {
        render::json(&output)?;
    } else {
        render::command_output(&output);
    }
    if !output.success() {
        eyre::bail!("command exited with status {}", output.exit_code);
    }
    Ok(())
}

async fn handle_browse_command(url: &str, json: bool, session: &mut AgentSession) -> Result<()> {
    info!("Browsing: {}", url);
    let state = session.browse_to(url).await?;
    if json {
        render::json(&state)?;
    } else {
        render::page(&state);
    }
    Ok(())
}

async fn handle_plan_command(goal: &str, max_steps: Option<u32>, json: bool, session: &mut AgentSession) -> Result<()> {
    info!("Planning goal: {}", goal);
    if !json {
        println!("{} {}", "Goal:".green(), goal);
    }
    let result = session.plan(goal, max_steps).await;
    if json {
        render::json(&result)?;
    } else {
        render::loop_result(&result);
    }
    if !result.is_completed() {
        eyre::bail!("plan {}", result.status);
    }
    Ok(())
}

async fn handle_ask_command(request: &str, json: bool, session: &mut AgentSession) -> Result<()> {
    info!("Request: {}", request);
    let reply = session.ask(request).await?;
    if json {
        render::json(&reply)?;
    } else {
        render::reply(&reply);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging before anything can log
    setup_logging().context("Failed to setup logging")?;

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    apply_log_level(config.log_filter());

    info!("Starting with config from: {:?}", cli.config);

    let client = build_client(&cli, &config)?;
    let mut session = AgentSession::from_config(config, client).context("Failed to start session")?;

    // Run the main application logic; SIGTERM still reaches shutdown
    let outcome = tokio::select! {
        outcome = run_application(&cli, &mut session) => outcome,
        _ = cli::terminate_signal() => {
            log::warn!("Received SIGTERM, shutting down");
            eprintln!("\n{}", "Terminated".yellow());
            Ok(())
        }
    };

    if let Err(e) = session.shutdown().await {
        log::warn!("Error during shutdown: {}", e);
    }

    outcome.context("Application failed")
}
