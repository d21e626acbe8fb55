//! Configuration loading, validation, and management for answerdesk.
//!
//! Loads configuration from `~/.answerdesk/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.answerdesk/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default language-model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Never call the model; medium and low tiers degrade to direct lookup
    #[serde(default)]
    pub offline: bool,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Corpus sources and index persistence
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Confidence scorer calibration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Answer selector policy
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Feedback weighting
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3.2:1b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("offline", &self.offline)
            .field("providers", &self.providers)
            .field("knowledge", &self.knowledge)
            .field("scoring", &self.scoring)
            .field("selector", &self.selector)
            .field("feedback", &self.feedback)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Per-provider overrides.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON array or JSONL files loaded at startup
    #[serde(default)]
    pub corpus_paths: Vec<String>,

    /// JSONL snapshot that persists upserts and weights across restarts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,

    /// Candidates retrieved per query
    #[serde(default = "default_search_k")]
    pub search_k: usize,
}

fn default_search_k() -> usize {
    3
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_paths: Vec::new(),
            snapshot_path: None,
            search_k: default_search_k(),
        }
    }
}

impl KnowledgeConfig {
    pub fn resolved_corpus_paths(&self) -> Vec<PathBuf> {
        self.corpus_paths.iter().map(|p| expand_home(p)).collect()
    }

    pub fn resolved_snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_path.as_deref().map(expand_home)
    }
}

/// Calibration of the raw-similarity to confidence mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Raw scores at or below this map to 0.0
    #[serde(default = "default_floor")]
    pub floor: f32,

    /// Raw scores at or above this map to 1.0
    #[serde(default = "default_ceiling")]
    pub ceiling: f32,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,

    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f32,

    /// Queries with at most this many terms are candidates for the length penalty
    #[serde(default = "default_short_query_terms")]
    pub short_query_terms: usize,

    /// Penalty applies when query_terms / match_terms falls below this ratio
    #[serde(default = "default_short_query_ratio")]
    pub short_query_ratio: f32,

    /// Lower bound of the penalty multiplier
    #[serde(default = "default_min_length_penalty")]
    pub min_length_penalty: f32,
}

fn default_floor() -> f32 {
    0.1
}
fn default_ceiling() -> f32 {
    0.8
}
fn default_high_threshold() -> f32 {
    0.75
}
fn default_medium_threshold() -> f32 {
    0.45
}
fn default_short_query_terms() -> usize {
    2
}
fn default_short_query_ratio() -> f32 {
    0.25
}
fn default_min_length_penalty() -> f32 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            floor: default_floor(),
            ceiling: default_ceiling(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            short_query_terms: default_short_query_terms(),
            short_query_ratio: default_short_query_ratio(),
            min_length_penalty: default_min_length_penalty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Upper bound on a single model call
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Confidence reported for generative answers when the model gives none
    #[serde(default = "default_generative_confidence")]
    pub default_generative_confidence: f32,
}

fn default_model_timeout_secs() -> u64 {
    20
}
fn default_generative_confidence() -> f32 {
    0.3
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            model_timeout_secs: default_model_timeout_secs(),
            default_generative_confidence: default_generative_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Weight change per rating
    #[serde(default = "default_delta")]
    pub delta: f32,

    #[serde(default = "default_min_weight")]
    pub min_weight: f32,

    #[serde(default = "default_max_weight")]
    pub max_weight: f32,

    /// Optional JSONL archive of every feedback event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
}

fn default_delta() -> f32 {
    0.05
}
fn default_min_weight() -> f32 {
    0.1
}
fn default_max_weight() -> f32 {
    10.0
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            delta: default_delta(),
            min_weight: default_min_weight(),
            max_weight: default_max_weight(),
            archive_path: None,
        }
    }
}

impl FeedbackConfig {
    pub fn resolved_archive_path(&self) -> Option<PathBuf> {
        self.archive_path.as_deref().map(expand_home)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Most client sessions tracked at once; the least recently active is
    /// evicted beyond this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions idle for longer than this are forgotten.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://127.0.0.1:3000".into(),
    ]
}
fn default_max_sessions() -> usize {
    10_000
}
fn default_session_ttl_secs() -> u64 {
    60 * 60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
            max_sessions: default_max_sessions(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.answerdesk/config.toml).
    ///
    /// Environment overrides:
    /// - `ANSWERDESK_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `ANSWERDESK_PROVIDER`, `ANSWERDESK_MODEL`
    /// - `ANSWERDESK_CORPUS` (comma-separated paths, replaces `knowledge.corpus_paths`)
    /// - `ANSWERDESK_OFFLINE` (`1`/`true`/`yes`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through a lookup function.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("ANSWERDESK_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }

        if let Some(provider) = var("ANSWERDESK_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = var("ANSWERDESK_MODEL") {
            self.default_model = model;
        }

        if let Some(corpus) = var("ANSWERDESK_CORPUS") {
            self.knowledge.corpus_paths = corpus
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(offline) = var("ANSWERDESK_OFFLINE") {
            self.offline = matches!(
                offline.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".answerdesk")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let s = &self.scoring;
        if !(s.floor >= 0.0 && s.floor < s.ceiling) {
            return Err(ConfigError::ValidationError(
                "scoring.floor must be >= 0 and below scoring.ceiling".into(),
            ));
        }
        if !(s.medium_threshold > 0.0
            && s.medium_threshold < s.high_threshold
            && s.high_threshold <= 1.0)
        {
            return Err(ConfigError::ValidationError(
                "scoring thresholds must satisfy 0 < medium_threshold < high_threshold <= 1".into(),
            ));
        }
        if !(s.short_query_ratio > 0.0) || !(0.0..=1.0).contains(&s.min_length_penalty) {
            return Err(ConfigError::ValidationError(
                "scoring.short_query_ratio must be > 0 and min_length_penalty within [0, 1]".into(),
            ));
        }

        if self.knowledge.search_k == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.search_k must be at least 1".into(),
            ));
        }

        let fb = &self.feedback;
        if !(fb.min_weight > 0.0 && fb.min_weight <= 1.0 && fb.max_weight >= 1.0) {
            return Err(ConfigError::ValidationError(
                "feedback weights must satisfy 0 < min_weight <= 1.0 <= max_weight".into(),
            ));
        }
        if !(fb.delta > 0.0) {
            return Err(ConfigError::ValidationError(
                "feedback.delta must be > 0".into(),
            ));
        }

        if self.selector.model_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "selector.model_timeout_secs must be at least 1".into(),
            ));
        }
        if !(0.0..0.5).contains(&self.selector.default_generative_confidence) {
            return Err(ConfigError::ValidationError(
                "selector.default_generative_confidence must be within [0, 0.5)".into(),
            ));
        }

        if self.gateway.max_sessions == 0 || self.gateway.session_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions and gateway.session_ttl_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            offline: false,
            providers: HashMap::new(),
            knowledge: KnowledgeConfig::default(),
            scoring: ScoringConfig::default(),
            selector: SelectorConfig::default(),
            feedback: FeedbackConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs_home().join(rest),
        None => PathBuf::from(path),
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

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "ollama");
        assert_eq!(config.gateway.port, 5000);
        assert_eq!(config.knowledge.search_k, 3);
        assert!((config.scoring.high_threshold - 0.75).abs() < f32::EPSILON);
        assert!((config.feedback.delta - 0.05).abs() < f32::EPSILON);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.allowed_origins, config.gateway.allowed_origins);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.scoring.medium_threshold = 0.8;
        config.scoring.high_threshold = 0.7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn floor_above_ceiling_rejected() {
        let mut config = AppConfig::default();
        config.scoring.floor = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn high_generative_confidence_rejected() {
        let mut config = AppConfig::default();
        config.selector.default_generative_confidence = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn weight_bounds_must_straddle_initial_weight() {
        let mut config = AppConfig::default();
        config.feedback.max_weight = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_session_limit_rejected() {
        let mut config = AppConfig::default();
        config.gateway.max_sessions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "llama3.2:1b");
    }

    #[test]
    fn load_from_file_parses_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "openai"
offline = true

[knowledge]
corpus_paths = ["data/faq.json"]
search_k = 5

[scoring]
ceiling = 0.7

[feedback]
delta = 0.1

[gateway]
max_sessions = 50
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert!(config.offline);
        assert_eq!(config.knowledge.search_k, 5);
        assert!((config.scoring.ceiling - 0.7).abs() < f32::EPSILON);
        assert!((config.scoring.floor - 0.1).abs() < f32::EPSILON);
        assert!((config.feedback.delta - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.gateway.max_sessions, 50);
        assert_eq!(config.gateway.session_ttl_secs, 3600);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_temperature = \"hot\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("ANSWERDESK_MODEL", "gpt-4o-mini"),
            ("ANSWERDESK_CORPUS", "a.json, b.jsonl"),
            ("ANSWERDESK_OFFLINE", "true"),
        ]
        .into_iter()
        .collect();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.knowledge.corpus_paths, vec!["a.json", "b.jsonl"]);
        assert!(config.offline);
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn expand_home_handles_tilde() {
        assert_eq!(expand_home("data/faq.json"), PathBuf::from("data/faq.json"));
        assert!(expand_home("~/x.jsonl").ends_with("x.jsonl"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("ollama"));
        assert!(toml_str.contains("5000"));
        assert!(toml_str.contains("[scoring]"));
    }
}
