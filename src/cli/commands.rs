//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - exec: run one shell command
//! - browse: open a URL in the browser
//! - plan: work through a goal with the plan-execution loop
//! - ask: one free-form request
//!
//! With no subcommand the interactive prompt starts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskpilot::config::{Config, Provider};
use taskpilot::llm::AnthropicConfig;

/// Taskpilot - a shell and browser agent driven by a language model
#[derive(Parser, Debug)]
#[command(name = "taskpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// API key for the model provider (overrides the environment)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Model provider
    #[arg(long, global = true, value_enum)]
    pub provider: Option<Provider>,

    /// Model name
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    pub visible_browser: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Apply command-line flags on top of the loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
            // The default model belongs to the default provider
            if self.model.is_none() && provider == Provider::Anthropic && config.llm.model.starts_with("gpt") {
                config.llm.model = AnthropicConfig::default().model;
            }
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if self.visible_browser {
            config.browser.headless = false;
        }
        if self.verbose {
            config.log_level = Some("debug".to_string());
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a shell command directly
    Exec {
        /// Command line, passed to `sh -c`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Open a URL in the browser and show the page
    Browse {
        /// URL to open (https:// is added when missing)
        url: String,
    },

    /// Work through a goal step by step
    Plan {
        /// Maximum number of steps
        #[arg(short = 'n', long)]
        max_steps: Option<u32>,

        /// Goal in plain language
        #[arg(required = true)]
        goal: Vec<String>,
    },

    /// Send one free-form request; an action in the reply is carried out
    Ask {
        /// Request in plain language
        #[arg(required = true)]
        request: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_no_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["taskpilot"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn test_exec_keeps_flags_of_command() {
        let cli = Cli::try_parse_from(["taskpilot", "exec", "ls", "-la", "/tmp"]).unwrap();
        match cli.command {
            Some(Commands::Exec { command }) => assert_eq!(command.join(" "), "ls -la /tmp"),
            _ => panic!("Expected exec command"),
        }
    }

    #[test]
    fn test_browse_command() {
        let cli = Cli::try_parse_from(["taskpilot", "browse", "example.com"]).unwrap();
        match cli.command {
            Some(Commands::Browse { url }) => assert_eq!(url, "example.com"),
            _ => panic!("Expected browse command"),
        }
    }

    #[test]
    fn test_plan_with_max_steps() {
        let cli = Cli::try_parse_from(["taskpilot", "plan", "-n", "3", "find", "large", "files"]).unwrap();
        match cli.command {
            Some(Commands::Plan { max_steps, goal }) => {
                assert_eq!(max_steps, Some(3));
                assert_eq!(goal.join(" "), "find large files");
            }
            _ => panic!("Expected plan command"),
        }
    }

    #[test]
    fn test_plan_requires_goal() {
        assert!(Cli::try_parse_from(["taskpilot", "plan"]).is_err());
    }

    #[test]
    fn test_ask_command() {
        let cli = Cli::try_parse_from(["taskpilot", "ask", "what", "is", "here?"]).unwrap();
        match cli.command {
            Some(Commands::Ask { request }) => assert_eq!(request.join(" "), "what is here?"),
            _ => panic!("Expected ask command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "taskpilot",
            "browse",
            "example.com",
            "--json",
            "--visible-browser",
            "--provider",
            "anthropic",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(cli.visible_browser);
        assert_eq!(cli.provider, Some(Provider::Anthropic));
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::try_parse_from(["taskpilot", "-v", "--provider", "anthropic", "--visible-browser"]).unwrap();
        let mut config = Config::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.llm.provider, Provider::Anthropic);
        assert!(config.llm.model.starts_with("claude"));
        assert!(!config.browser.headless);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_explicit_model_wins() {
        let cli = Cli::try_parse_from(["taskpilot", "--provider", "anthropic", "-m", "claude-3-haiku-20240307"]).unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.llm.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Cli::try_parse_from(["taskpilot", "--provider", "cohere"]).is_err());
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["taskpilot", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
