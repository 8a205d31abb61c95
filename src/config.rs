//! Configuration for prsentry.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (GITHUB_TOKEN, LLM_PROVIDER, ...)
//! 2. Config file (.prsentry/config.yaml)
//! 3. Defaults (~/.prsentry/review.db, 50 polls x 30s, openai)
//!
//! Config file discovery searches the current directory and parents for
//! .prsentry/config.yaml. The resolved [`Config`] is an explicit value
//! handed to the adapters and the engine at construction; nothing reads
//! the environment after startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub github: GithubFileConfig,
    #[serde(default)]
    pub llm: LlmFileConfig,
    #[serde(default)]
    pub approval: ApprovalFileConfig,
    #[serde(default)]
    pub store: StoreFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GithubFileConfig {
    pub token: Option<String>,
    /// Repository in "owner/name" form
    pub repo: Option<String>,
    /// Override for the repo-scoped API base URL (tests, GHE)
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmFileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalFileConfig {
    pub max_attempts: Option<u32>,
    pub poll_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFileConfig {
    pub path: Option<PathBuf>,
}

/// Resolved configuration passed explicitly to adapters and the engine.
#[derive(Debug, Clone)]
pub struct Config {
    pub github: GithubConfig,
    pub llm: LlmConfig,
    pub approval: PollConfig,
    /// Path to the SQLite review store
    pub store_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub repo: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// Model override; each provider has a default
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
}

/// Poll budget for the approval gates. Latency is bounded by
/// `interval * max_attempts`.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            interval: Duration::from_secs(30),
        }
    }
}

/// Supported LLM providers (all speak the chat-completions wire format)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Llama,
    Mistral,
}

impl LlmProvider {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "llama" => Ok(Self::Llama),
            "mistral" => Ok(Self::Mistral),
            other => anyhow::bail!("unsupported LLM provider: {}", other),
        }
    }

    /// Default chat-completions endpoint for this provider
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Llama => "https://api.groq.com/openai/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
        }
    }

    /// Default model when none is configured
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4",
            Self::Llama => "llama3-70b-8192",
            Self::Mistral => "mistral-large-latest",
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".prsentry").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let file = match find_config_file() {
            Some(path) => load_config_file(&path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(file)
    }

    /// Merge env vars over a (possibly empty) config file and apply defaults.
    pub fn resolve(file: ConfigFile) -> Result<Self> {
        let github = GithubConfig {
            token: env_var("GITHUB_TOKEN").or(file.github.token),
            repo: env_var("GITHUB_REPO").or(file.github.repo),
            api_url: env_var("GITHUB_API_URL").or(file.github.api_url),
        };

        let provider_name = env_var("LLM_PROVIDER")
            .or(file.llm.provider)
            .unwrap_or_else(|| "openai".to_string());
        let provider = LlmProvider::parse(&provider_name)?;

        // Groq keys its own env var; the Mistral endpoint is
        // OpenAI-compatible and reuses OPENAI_API_KEY
        let api_key = match provider {
            LlmProvider::Llama => env_var("GROQ_API_KEY"),
            LlmProvider::OpenAi | LlmProvider::Mistral => env_var("OPENAI_API_KEY"),
        }
        .or(file.llm.api_key);

        let temperature = match env_var("TEMPERATURE") {
            Some(raw) => raw
                .parse::<f32>()
                .with_context(|| format!("Invalid TEMPERATURE value: {}", raw))?,
            None => file.llm.temperature.unwrap_or(0.1),
        };

        let llm = LlmConfig {
            provider,
            model: env_var("MODEL_NAME").or(file.llm.model),
            api_key,
            base_url: env_var("LLM_BASE_URL").or(file.llm.base_url),
            temperature,
        };

        let defaults = PollConfig::default();
        let max_attempts = match env_var("MAX_POLL_ATTEMPTS") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("Invalid MAX_POLL_ATTEMPTS value: {}", raw))?,
            None => file.approval.max_attempts.unwrap_or(defaults.max_attempts),
        };
        let interval_seconds = match env_var("POLL_INTERVAL_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid POLL_INTERVAL_SECONDS value: {}", raw))?,
            None => file
                .approval
                .poll_interval_seconds
                .unwrap_or(defaults.interval.as_secs()),
        };
        let approval = PollConfig {
            max_attempts,
            interval: Duration::from_secs(interval_seconds),
        };

        let store_path = match env_var("PRSENTRY_DB") {
            Some(path) => PathBuf::from(path),
            None => match file.store.path {
                Some(path) => path,
                None => default_store_path()?,
            },
        };

        Ok(Self {
            github,
            llm,
            approval,
            store_path,
        })
    }
}

/// Default store location (~/.prsentry/review.db)
fn default_store_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to determine home directory")?;
    Ok(home.join(".prsentry").join("review.db"))
}
