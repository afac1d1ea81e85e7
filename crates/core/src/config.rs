//! Configuration loading
//!
//! Settings come from a TOML file (explicit path, `./electrolyte_planner.toml`,
//! or the platform config dir) and are then overridden by environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "electrolyte_planner.toml";

/// Directory name within the platform config dir
const CONFIG_SUBDIR: &str = "electrolyte-planner";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1";

// ============================================================================
// Configuration Structs
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub literature: LiteratureConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
}

/// Model backend settings ([llm] section)
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Resolved from `api_key_env` at load time, never read from the file
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_enabled() -> bool { true }
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_model() -> String { DEFAULT_MODEL.to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout_secs() -> u64 { 60 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl LlmConfig {
    /// The backend is usable only when enabled and a key is present
    pub fn is_available(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Literature search settings ([literature] section)
#[derive(Debug, Clone, Deserialize)]
pub struct LiteratureConfig {
    #[serde(default)]
    pub documents_dir: Option<PathBuf>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,
}

fn default_max_results() -> usize { 5 }
fn default_chunk_words() -> usize { 200 }

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self {
            documents_dir: None,
            max_results: default_max_results(),
            chunk_words: default_chunk_words(),
        }
    }
}

/// Prompt override settings ([prompts] section)
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,
}

fn default_prompts_dir() -> PathBuf { PathBuf::from("prompts") }

impl Default for PromptConfig {
    fn default() -> Self {
        Self { dir: default_prompts_dir() }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl AppConfig {
    /// Load configuration, then apply environment overrides.
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover() {
                Some(path) => {
                    tracing::debug!("Loading config from {}", path.display());
                    Self::from_file(&path)?
                }
                None => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|d| d.join(CONFIG_SUBDIR).join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Environment variables win over file settings
    pub fn apply_env(&mut self) {
        if let Ok(key) = env::var(&self.llm.api_key_env) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(url) = env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                self.llm.base_url = url.trim_end_matches('/').to_string();
            }
        }
        if let Ok(model) = env::var("ELECTROLYTE_MODEL") {
            if !model.trim().is_empty() {
                self.llm.model = model;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
