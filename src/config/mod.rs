use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for a single `ask` invocation
#[derive(Debug, Clone, Default)]
pub struct AskConfig {
    /// The question to answer
    pub query: String,

    /// Extra gitignore-syntax file to filter the repository with
    pub ignore_path: Option<PathBuf>,

    /// Index files even if .gitignore excludes them
    pub ignore_gitignore: bool,

    pub verbose: bool,

    /// Parent of the ephemeral index directory (default: system temp dir)
    pub index_dir: Option<PathBuf>,

    /// Token budget for the assembled context (default: unbounded)
    pub max_context_tokens: Option<usize>,
}

impl AskConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Scratch location for this invocation's index.
    ///
    /// Always a fresh `codeask-index-<uuid>` directory, under `index_dir`
    /// when given and the system temp dir otherwise. Concurrent invocations
    /// never share one, and `index_dir` itself is never removed.
    pub fn index_location(&self) -> PathBuf {
        let parent = self.index_dir.clone().unwrap_or_else(std::env::temp_dir);
        parent.join(format!("codeask-index-{}", uuid::Uuid::new_v4()))
    }
}

/// Answer service settings, read from `~/.codeask/config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,

    /// Chat model name
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Request timeout for answer synthesis, in seconds
    pub timeout_secs: u64,

    /// Maximum tokens in the generated answer
    pub max_answer_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 120,
            max_answer_tokens: 1024,
        }
    }
}

impl Settings {
    /// Load from the config file (if present), then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = match Self::config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Location of the config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".codeask").join("config.json"))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("CODEASK_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.api_key = key;
        }
        if let Some(model) = var("CODEASK_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = var("CODEASK_BASE_URL") {
            self.base_url = base_url;
        }
    }

    /// Fail unless an API key is configured
    pub fn require_api_key(&self) -> Result<&str> {
        if self.api_key.is_empty() {
            return Err(anyhow!(
                "No API key configured. Set CODEASK_API_KEY or add \"api_key\" to {}",
                Self::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "~/.codeask/config.json".to_string())
            ));
        }
        Ok(&self.api_key)
    }
}
