//! Configuration loading, validation, and management for codeloom.
//!
//! Loads configuration from `codeloom.toml` with environment variable
//! overrides. Validates all settings before the engine starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The root configuration structure.
///
/// Maps directly to `codeloom.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which provider backs the engine: "mock" or "claude"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Root of the sandboxed workspace the agent edits
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Directory where session files are stored
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,

    /// Anthropic provider settings
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Plan approval settings
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Conversation history budgets
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_provider() -> String {
    "mock".into()
}
fn default_workspace_root() -> PathBuf {
    PathBuf::from("workspace")
}
fn default_sessions_dir() -> PathBuf {
    PathBuf::from("data/sessions")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            workspace_root: default_workspace_root(),
            sessions_dir: default_sessions_dir(),
            anthropic: AnthropicConfig::default(),
            agent: AgentConfig::default(),
            approval: ApprovalConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("workspace_root", &self.workspace_root)
            .field("sessions_dir", &self.sessions_dir)
            .field(
                "anthropic.api_key",
                &self.anthropic.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("anthropic.model", &self.anthropic.model)
            .field("agent", &self.agent)
            .field("approval", &self.approval)
            .field("history", &self.history)
            .finish()
    }
}

/// Anthropic Messages API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key (overridable via `ANTHROPIC_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (overridable for testing/proxies)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}
fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum planner↔executor rounds per task
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Pause after marking a step running, for perceptible UI pacing.
    /// Zero disables the pause.
    #[serde(default = "default_step_pause_ms")]
    pub step_pause_ms: u64,
}

fn default_max_rounds() -> u32 {
    5
}
fn default_step_pause_ms() -> u64 {
    300
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            step_pause_ms: default_step_pause_ms(),
        }
    }
}

/// Plan approval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Whether tasks go through the planning/approval phases at all.
    /// When false the loop runs the two-state variant (straight to running).
    #[serde(default = "default_true")]
    pub require_plan: bool,

    /// Whether an unanswered approval wait auto-approves after the timeout.
    #[serde(default = "default_true")]
    pub auto_approve: bool,

    /// Auto-approval timeout in seconds
    #[serde(default = "default_approval_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_approval_timeout() -> u64 {
    30
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            require_plan: true,
            auto_approve: true,
            timeout_secs: default_approval_timeout(),
        }
    }
}

/// Conversation history budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Character budget for the assembled model context
    #[serde(default = "default_char_budget")]
    pub max_char_budget: usize,

    /// Ceiling above which tool results are centre-truncated
    #[serde(default = "default_tool_result_chars")]
    pub max_tool_result_chars: usize,

    /// How many older tasks are kept as compressed summary pairs
    #[serde(default = "default_compressed_tasks")]
    pub max_compressed_tasks: usize,
}

fn default_char_budget() -> usize {
    100_000
}
fn default_tool_result_chars() -> usize {
    20_000
}
fn default_compressed_tasks() -> usize {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_char_budget: default_char_budget(),
            max_tool_result_chars: default_tool_result_chars(),
            max_compressed_tasks: default_compressed_tasks(),
        }
    }
}

/// Errors from configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply env overrides.
    ///
    /// A missing file yields the defaults (still env-overridable).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                source: e,
            })?;
            toml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e,
            })?
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `CODELOOM_PROVIDER`, `CODELOOM_WORKSPACE_ROOT`, and
    /// `ANTHROPIC_API_KEY` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("CODELOOM_PROVIDER") {
            self.provider = provider;
        }
        if let Ok(root) = std::env::var("CODELOOM_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY")
            && !key.is_empty()
        {
            self.anthropic.api_key = Some(key);
        }
    }

    /// Validate settings, rejecting values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider.as_str() {
            "mock" => {}
            "claude" => {
                if self.anthropic.api_key.is_none() {
                    return Err(ConfigError::Invalid(
                        "provider 'claude' requires anthropic.api_key or ANTHROPIC_API_KEY".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown provider '{other}' (expected 'mock' or 'claude')"
                )));
            }
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::Invalid("agent.max_rounds must be > 0".into()));
        }
        if self.history.max_char_budget == 0 || self.history.max_tool_result_chars == 0 {
            return Err(ConfigError::Invalid(
                "history budgets must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Serialize the current configuration back to TOML.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
