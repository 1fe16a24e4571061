use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub executor: ExecutorConfig,
    pub browser: BrowserConfig,
    pub planner: PlannerConfig,
}

/// Which chat completion API to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "anthropic")]
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "gpt-4o".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_ms: 120000,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub timeout_ms: u64,
    pub max_output_chars: usize,
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60000,
            max_output_chars: 30000,
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Attach to a running Chrome (`http://127.0.0.1:9222`) instead of launching one
    pub cdp_url: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub element_timeout_ms: u64,
    pub no_sandbox: bool,
    pub screenshot_dir: PathBuf,
    pub max_text_chars: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            cdp_url: None,
            window_width: 1280,
            window_height: 720,
            element_timeout_ms: 10000,
            no_sandbox: false,
            screenshot_dir: PathBuf::from("."),
            max_text_chars: 1000,
        }
    }
}

/// How the loop decides a goal has been reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStrategy {
    /// Ask the model a YES/NO question after each step
    #[default]
    Model,
    /// Look for `done_marker` in the latest successful result
    Keyword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_steps: u32,
    pub history_window: usize,
    pub max_result_chars: usize,
    pub completion: CompletionStrategy,
    pub done_marker: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            history_window: 8,
            max_result_chars: 2000,
            completion: CompletionStrategy::Model,
            done_marker: "TASK_COMPLETE".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            executor: ExecutorConfig::default(),
            browser: BrowserConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// A file that exists but cannot be read or parsed is an error, wherever
    /// it was found.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path).context(format!("Failed to load config from {}", path.display())),
            None => Self::load_first(Self::default_locations()),
        }
    }

    /// `~/.config/<project>/<project>.yml`, then `./<project>.yml`
    fn default_locations() -> Vec<PathBuf> {
        let project_name = env!("CARGO_PKG_NAME");
        let file_name = format!("{}.yml", project_name);

        let mut locations = Vec::with_capacity(2);
        if let Some(config_dir) = dirs::config_dir() {
            locations.push(config_dir.join(project_name).join(&file_name));
        }
        locations.push(PathBuf::from(file_name));
        locations
    }

    fn load_first(candidates: impl IntoIterator<Item = PathBuf>) -> Result<Self> {
        for path in candidates {
            if path.exists() {
                return Self::load_from_file(&path).context(format!("Failed to load config from {}", path.display()));
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.planner.done_marker.trim().is_empty() {
            eyre::bail!("planner.done_marker must not be empty");
        }
        Ok(())
    }

    /// Configured log level, `info` when unset or unrecognized
    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_level
            .as_deref()
            .and_then(|level| level.trim().parse().ok())
            .unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.executor.timeout_ms, 60000);
        assert!(config.browser.headless);
        assert_eq!(config.planner.max_steps, 10);
        assert_eq!(config.planner.history_window, 8);
        assert_eq!(config.planner.completion, CompletionStrategy::Model);
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taskpilot.yml");
        fs::write(
            &path,
            "llm:\n  provider: anthropic\n  model: claude-3-haiku-20240307\nplanner:\n  max_steps: 4\n  completion: keyword\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.llm.provider, Provider::Anthropic);
        assert_eq!(config.llm.model, "claude-3-haiku-20240307");
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.planner.max_steps, 4);
        assert_eq!(config.planner.completion, CompletionStrategy::Keyword);
        assert_eq!(config.planner.done_marker, "TASK_COMPLETE");
        assert_eq!(config.executor.max_output_chars, 30000);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "planner: [not, a, map]").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_broken_default_location_is_an_error() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("taskpilot.yml");
        let fallback = dir.path().join("fallback.yml");
        fs::write(&broken, "llm: [unclosed").unwrap();
        fs::write(&fallback, "planner:\n  max_steps: 3\n").unwrap();

        let err = Config::load_first([broken.clone(), fallback]).unwrap_err();

        assert!(format!("{:#}", err).contains(&broken.display().to_string()));
    }

    #[test]
    fn test_load_first_skips_missing_files() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.yml");
        fs::write(&present, "planner:\n  max_steps: 3\n").unwrap();

        let config = Config::load_first([dir.path().join("missing.yml"), present]).unwrap();
        assert_eq!(config.planner.max_steps, 3);

        let config = Config::load_first([dir.path().join("missing.yml")]).unwrap();
        assert_eq!(config.planner.max_steps, 10);
    }

    #[test]
    fn test_empty_done_marker_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taskpilot.yml");
        fs::write(&path, "planner:\n  completion: keyword\n  done_marker: \"\"\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("done_marker"));
    }

    #[test]
    fn test_log_filter() {
        let mut config = Config::default();
        assert_eq!(config.log_filter(), log::LevelFilter::Info);

        config.log_level = Some("debug".to_string());
        assert_eq!(config.log_filter(), log::LevelFilter::Debug);

        config.log_level = Some("chatty".to_string());
        assert_eq!(config.log_filter(), log::LevelFilter::Info);

        config.log_level = None;
        assert_eq!(config.log_filter(), log::LevelFilter::Info);
    }
}
