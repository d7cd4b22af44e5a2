//! Configuration parsing and validation for idealab-router.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Whole-request timeout for outbound provider calls
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
    /// Connect timeout for outbound provider calls
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Requests handled concurrently before new ones wait
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_upstream_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_concurrent_requests() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upstream_timeout_secs: default_upstream_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Database configuration for the usage audit log.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "./idealab.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`, so every use is grep-auditable.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    fn is_blank(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How a provider's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

pub const OPENAI: &str = "openai";
pub const ANTHROPIC: &str = "anthropic";

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

/// Connection settings for one upstream AI API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL (e.g., "https://api.openai.com/v1")
    pub url: String,
    /// Bearer token or API key
    pub api_key: Option<ApiKey>,
    /// Canonical model name -> upstream model id (e.g. "claude-3-sonnet" ->
    /// "claude-3-sonnet-20240229"). Unmapped models are sent as-is.
    #[serde(default)]
    pub models: HashMap<String, String>,
}

impl ProviderConfig {
    /// Whether a usable credential is configured.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_blank())
    }

    /// Upstream model id for a canonical model name.
    pub fn upstream_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.models.get(model).map(String::as_str).unwrap_or(model)
    }
}

/// The primary (OpenAI-compatible) and optional secondary (Anthropic) APIs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    pub openai: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
}

/// What to do when a premium-gated route lacks its credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCredentialPolicy {
    /// Surface a configuration error to the caller.
    #[default]
    Fail,
    /// Silently fall back to the next matching rule.
    Fallback,
}

/// Routing and invocation behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// System message used when the caller does not supply one
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
    /// Sampling temperature used when the caller does not supply one
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default)]
    pub missing_credential_policy: MissingCredentialPolicy,
    /// Answer from a local stub instead of calling providers
    #[serde(default)]
    pub mock_responses: bool,
    /// Token budget for extended thinking
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget_tokens: u32,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_thinking_budget() -> u32 {
    2000
}

/// Smallest thinking budget the Anthropic API accepts.
pub const MIN_THINKING_BUDGET: u32 = 1024;

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_system_prompt: default_system_prompt(),
            default_temperature: default_temperature(),
            missing_credential_policy: MissingCredentialPolicy::default(),
            mock_responses: false,
            thinking_budget_tokens: default_thinking_budget(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to write usage records to the database
    #[serde(default = "default_true")]
    pub log_usage: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_usage: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, provider) in self.provider_entries() {
            if provider.url.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty URL",
                    name
                )));
            }
        }

        if self.server.max_concurrent_requests == 0 {
            return Err(ConfigError::Validation(
                "server.max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        if self.routing.default_system_prompt.trim().is_empty() {
            return Err(ConfigError::Validation(
                "routing.default_system_prompt must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.routing.default_temperature) {
            return Err(ConfigError::Validation(format!(
                "routing.default_temperature must be within [0, 1], got {}",
                self.routing.default_temperature
            )));
        }

        if self.routing.thinking_budget_tokens < MIN_THINKING_BUDGET {
            return Err(ConfigError::Validation(format!(
                "routing.thinking_budget_tokens must be at least {}",
                MIN_THINKING_BUDGET
            )));
        }

        if !self.routing.mock_responses && !self.primary_available() {
            tracing::warn!("No OpenAI credential configured - every AI call will be rejected");
        }

        Ok(())
    }

    fn provider_entries(&self) -> impl Iterator<Item = (&'static str, &ProviderConfig)> {
        [
            (OPENAI, self.providers.openai.as_ref()),
            (ANTHROPIC, self.providers.anthropic.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, p)| p.map(|p| (name, p)))
    }

    /// Whether the primary provider has a credential.
    pub fn primary_available(&self) -> bool {
        self.providers
            .openai
            .as_ref()
            .is_some_and(ProviderConfig::has_credential)
    }

    /// Whether the secondary provider has a credential.
    pub fn secondary_available(&self) -> bool {
        self.providers
            .anthropic
            .as_ref()
            .is_some_and(ProviderConfig::has_credential)
    }

    /// Get database config with defaults.
    pub fn database(&self) -> DatabaseConfig {
        self.database.clone().unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for provider '{provider}': {message}")]
    EnvVar {
        var: String,
        provider: String,
        message: String,
    },
}

/// Raw provider config deserialized directly from TOML.
/// api_key is `Option<String>` so it may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawProviderConfig {
    url: Option<String>,
    api_key: Option<String>,
    #[serde(default)]
    models: HashMap<String, String>,
}

#[derive(Deserialize, Default)]
pub struct RawProvidersConfig {
    openai: Option<RawProviderConfig>,
    anthropic: Option<RawProviderConfig>,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    database: Option<DatabaseConfig>,
    #[serde(default)]
    providers: RawProvidersConfig,
    #[serde(default)]
    routing: RoutingConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(
    input: &str,
    provider_name: &str,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            provider: provider_name.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                provider: provider_name.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            provider: provider_name.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in provider '{}')",
                var_name, provider_name
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

fn expand_env_vars(input: &str, provider_name: &str) -> Result<String, ConfigError> {
    expand_env_vars_with(input, provider_name, |name| std::env::var(name).ok())
}

/// Convention-based env var name for a provider.
///
/// - "openai" -> "IDEALAB_OPENAI_API_KEY"
/// - "anthropic" -> "IDEALAB_ANTHROPIC_API_KEY"
pub fn convention_env_var_name(provider_name: &str) -> String {
    let upper_snake = provider_name.to_uppercase().replace(['-', ' '], "_");
    format!("IDEALAB_{}_API_KEY", upper_snake)
}

fn convention_key_lookup(provider_name: &str) -> Option<(String, String)> {
    let var_name = convention_env_var_name(provider_name);
    std::env::var(&var_name).ok().map(|value| (var_name, value))
}

/// Resolve one provider section.
///
/// A section that is absent from the file is still created (with the default
/// URL) when its convention env var is set.
fn resolve_provider(
    name: &str,
    raw: Option<RawProviderConfig>,
    default_url: fn() -> String,
) -> Result<(Option<ProviderConfig>, KeySource), ConfigError> {
    let Some(raw) = raw else {
        return Ok(match convention_key_lookup(name) {
            Some((var_name, value)) => (
                Some(ProviderConfig {
                    url: default_url(),
                    api_key: Some(ApiKey::from(value)),
                    models: HashMap::new(),
                }),
                KeySource::Convention(var_name),
            ),
            None => (None, KeySource::None),
        });
    };

    let url = match raw.url {
        Some(url) => expand_env_vars(&url, name)?,
        None => default_url(),
    };

    let (api_key, source) = match raw.api_key {
        Some(ref raw_key) if raw_key.contains("${") => {
            let expanded = expand_env_vars(raw_key, name)?;
            (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
        }
        Some(ref raw_key) => (Some(ApiKey::from(raw_key.as_str())), KeySource::Literal),
        None => match convention_key_lookup(name) {
            Some((var_name, value)) => (Some(ApiKey::from(value)), KeySource::Convention(var_name)),
            None => (None, KeySource::None),
        },
    };

    Ok((
        Some(ProviderConfig {
            url,
            api_key,
            models: raw.models,
        }),
        source,
    ))
}

impl Config {
    /// Convert raw (deserialized) config to final config with env var expansion.
    ///
    /// For each provider:
    /// - If `api_key` contains `${VAR}`: expand from environment, source = `EnvExpanded`
    /// - If `api_key` is a literal string: wrap directly, source = `Literal`
    /// - If `api_key` is absent: try convention lookup (`IDEALAB_<NAME>_API_KEY`),
    ///   source = `Convention(var_name)` or `KeySource::None`
    pub fn from_raw(raw: RawConfig) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let (openai, openai_source) =
            resolve_provider(OPENAI, raw.providers.openai, default_openai_url)?;
        let (anthropic, anthropic_source) =
            resolve_provider(ANTHROPIC, raw.providers.anthropic, default_anthropic_url)?;

        let key_sources = vec![
            (OPENAI.to_string(), openai_source),
            (ANTHROPIC.to_string(), anthropic_source),
        ];

        let config = Config {
            server: raw.server,
            database: raw.database,
            providers: ProvidersConfig { openai, anthropic },
            routing: raw.routing,
            logging: raw.logging,
        };

        Ok((config, key_sources))
    }

    /// Build configuration from defaults and convention env vars alone.
    pub fn from_env() -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let (config, key_sources) = Self::from_raw(RawConfig::default())?;
        config.validate()?;
        Ok((config, key_sources))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// Returns the config and per-provider key source information.
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        let raw: RawConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw(raw)?;
        config.validate()?;

        Ok((config, key_sources))
    }
}
