//! Configuration loading, validation, and management for sqlclaw.
//!
//! Loads configuration from `~/.sqlclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sqlclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenRouter (or other OpenAI-compatible) API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model driving the agent loop
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for the agent model
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per agent response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub guides: GuidesConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub eval: EvalConfig,
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "minimax/minimax-m2".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("compression", &self.compression)
            .field("verifier", &self.verifier)
            .field("guides", &self.guides)
            .field("database", &self.database)
            .field("eval", &self.eval)
            .finish()
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on model turns per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Treat tool-call-shaped JSON text as a malformed tool call and correct it
    #[serde(default = "default_true")]
    pub detect_malformed_tool_calls: bool,

    /// Replaces the built-in system prompt when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Model behind `generate_sql`; unset leaves the tool unconfigured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nl2sql_model: Option<String>,
}

fn default_max_iterations() -> u32 {
    25
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            detect_malformed_tool_calls: true,
            system_prompt_override: None,
            nl2sql_model: None,
        }
    }
}

/// Tool-result compression applied when building provider requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Most recent tool results that are never truncated
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Tool results longer than this are truncated
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_keep_recent() -> usize {
    3
}
fn default_max_chars() -> usize {
    150
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_recent: default_keep_recent(),
            max_chars: default_max_chars(),
        }
    }
}

/// Pre-submission verifier gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Judge model
    #[serde(default = "default_verifier_model")]
    pub model: String,

    /// How many times a submission may be bounced per run
    #[serde(default = "default_max_rejections")]
    pub max_rejections: u32,

    /// Character budget for gathered business rules
    #[serde(default = "default_rules_budget")]
    pub rules_budget: usize,

    /// Character budget for gathered schema descriptions
    #[serde(default = "default_schema_budget")]
    pub schema_budget: usize,
}

fn default_verifier_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_max_rejections() -> u32 {
    1
}
fn default_rules_budget() -> usize {
    6000
}
fn default_schema_budget() -> usize {
    5000
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_verifier_model(),
            max_rejections: default_max_rejections(),
            rules_budget: default_rules_budget(),
            schema_budget: default_schema_budget(),
        }
    }
}

/// Business-rules guide retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidesConfig {
    /// Directory of markdown guides
    #[serde(default = "default_guides_dir")]
    pub dir: PathBuf,

    /// Judge model for Stage 3; unset disables validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_model: Option<String>,

    /// Embedding model for Stage 2; unset disables semantic matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

fn default_guides_dir() -> PathBuf {
    AppConfig::config_dir().join("guides")
}

impl Default for GuidesConfig {
    fn default() -> Self {
        Self {
            dir: default_guides_dir(),
            validator_model: Some("openai/gpt-oss-120b".into()),
            embedding_model: None,
        }
    }
}

/// The database the agent explores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Main SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Directory of additional `.db`/`.sqlite` files attached as schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_dir: Option<PathBuf>,

    /// Hard row limit for `run_sql`
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Output size limit for `run_sql`
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

fn default_database_path() -> PathBuf {
    AppConfig::config_dir().join("warehouse.db")
}
fn default_max_rows() -> usize {
    200
}
fn default_max_output_chars() -> usize {
    16000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            attach_dir: None,
            max_rows: default_max_rows(),
            max_output_chars: default_max_output_chars(),
        }
    }
}

/// Batch evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Number of cases evaluated in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Float tolerance for result comparison
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_concurrency() -> usize {
    1
}
fn default_epsilon() -> f64 {
    1e-4
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            epsilon: default_epsilon(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sqlclaw/config.toml).
    ///
    /// Environment overrides, highest priority first for the key:
    /// - `SQLCLAW_API_KEY`, then `OPENROUTER_API_KEY`
    /// - `SQLCLAW_MODEL`
    /// - `SQLCLAW_DATABASE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(key) = std::env::var("SQLCLAW_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|k| !k.is_empty())
        {
            self.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("SQLCLAW_MODEL") {
            self.model = model;
        }

        if let Ok(db) = std::env::var("SQLCLAW_DATABASE") {
            self.database.path = PathBuf::from(db);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sqlclaw")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        if self.compression.max_chars <= 20 {
            return Err(ConfigError::ValidationError(
                "compression.max_chars must be > 20".into(),
            ));
        }

        if self.eval.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "eval.concurrency must be >= 1".into(),
            ));
        }

        if !(self.eval.epsilon > 0.0) {
            return Err(ConfigError::ValidationError("eval.epsilon must be > 0".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            compression: CompressionConfig::default(),
            verifier: VerifierConfig::default(),
            guides: GuidesConfig::default(),
            database: DatabaseConfig::default(),
            eval: EvalConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 25);
        assert!(!config.compression.enabled);
        assert_eq!(config.compression.keep_recent, 3);
        assert_eq!(config.compression.max_chars, 150);
        assert_eq!(config.verifier.max_rejections, 1);
        assert_eq!(config.database.max_rows, 200);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.verifier.model, config.verifier.model);
        assert_eq!(parsed.guides.dir, config.guides.dir);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tiny_truncation_limit_rejected() {
        let mut config = AppConfig::default();
        config.compression.max_chars = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.api_url, "https://openrouter.ai/api/v1");
        assert!(config.agent.nl2sql_model.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
model = "anthropic/claude-sonnet-4"

[agent]
nl2sql_model = "anthropic/claude-opus-4"

[compression]
enabled = true

[verifier]
max_rejections = 2

[eval]
concurrency = 4
"#
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "anthropic/claude-sonnet-4");
        assert!(config.compression.enabled);
        assert_eq!(config.compression.keep_recent, 3);
        assert_eq!(config.verifier.max_rejections, 2);
        assert_eq!(config.verifier.rules_budget, 6000);
        assert_eq!(config.eval.concurrency, 4);
        assert!(config.agent.detect_malformed_tool_calls);
        assert_eq!(config.agent.nl2sql_model.as_deref(), Some("anthropic/claude-opus-4"));
        assert_eq!(config.agent.max_iterations, 25);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-or-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-or-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter.ai"));
        assert!(toml_str.contains("[verifier]"));
    }
}
