//! Task, tier and route value types.

use serde::{Deserialize, Serialize};

use crate::credits::CostInput;
use crate::error::{Error, Result};

/// Category of work a caller asks the AI to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskCategory {
    IdeaGeneration,
    MarketResearch,
    DocumentAnalysis,
    ProjectPlanning,
    CodeAnalysis,
    BasicChat,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 6] = [
        TaskCategory::IdeaGeneration,
        TaskCategory::MarketResearch,
        TaskCategory::DocumentAnalysis,
        TaskCategory::ProjectPlanning,
        TaskCategory::CodeAnalysis,
        TaskCategory::BasicChat,
    ];

    /// Wire name (camelCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::IdeaGeneration => "ideaGeneration",
            TaskCategory::MarketResearch => "marketResearch",
            TaskCategory::DocumentAnalysis => "documentAnalysis",
            TaskCategory::ProjectPlanning => "projectPlanning",
            TaskCategory::CodeAnalysis => "codeAnalysis",
            TaskCategory::BasicChat => "basicChat",
        }
    }

    /// Parse a task tag in camelCase, kebab-case or snake_case.
    ///
    /// Returns `None` for tags that name no known category.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "ideageneration" => Some(TaskCategory::IdeaGeneration),
            "marketresearch" => Some(TaskCategory::MarketResearch),
            "documentanalysis" => Some(TaskCategory::DocumentAnalysis),
            "projectplanning" => Some(TaskCategory::ProjectPlanning),
            "codeanalysis" => Some(TaskCategory::CodeAnalysis),
            "basicchat" => Some(TaskCategory::BasicChat),
            _ => None,
        }
    }

    /// Resolve a caller-supplied tag.
    ///
    /// Empty tags are rejected; unrecognized tags are treated as basic chat.
    pub fn resolve(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::Validation("task is required".to_string()));
        }
        Ok(Self::parse(s).unwrap_or_else(|| {
            tracing::debug!(task = %s, "Unrecognized task, treating as basic chat");
            TaskCategory::BasicChat
        }))
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription tier of the calling user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Basic, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Tier::Free),
            "basic" => Some(Tier::Basic),
            "premium" => Some(Tier::Premium),
            _ => None,
        }
    }

    /// Resolve a caller-supplied tier. Both empty and unknown tiers are rejected.
    pub fn resolve(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::Validation("tier is required".to_string()));
        }
        Self::parse(s).ok_or_else(|| {
            Error::Validation(format!(
                "Unknown tier '{}'. Supported: free, basic, premium",
                s
            ))
        })
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which upstream API serves a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// OpenAI-compatible chat completions.
    Primary,
    /// Anthropic messages API.
    Secondary,
}

/// A routable provider/model pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai-mini")]
    OpenAiMini,
    #[serde(rename = "openai-full")]
    OpenAiFull,
    #[serde(rename = "claude-standard")]
    ClaudeStandard,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiMini => "openai-mini",
            ProviderKind::OpenAiFull => "openai-full",
            ProviderKind::ClaudeStandard => "claude-standard",
        }
    }

    /// Canonical model identifier used for routing and billing.
    pub fn model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiMini => "gpt-4o-mini",
            ProviderKind::OpenAiFull => "gpt-4o",
            ProviderKind::ClaudeStandard => "claude-3-sonnet",
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            ProviderKind::OpenAiMini | ProviderKind::OpenAiFull => Backend::Primary,
            ProviderKind::ClaudeStandard => Backend::Secondary,
        }
    }

    /// Completion budget used when the caller does not set `max_tokens`.
    pub fn default_max_tokens(&self) -> u32 {
        match self {
            ProviderKind::OpenAiMini => 800,
            ProviderKind::OpenAiFull => 1000,
            ProviderKind::ClaudeStandard => 3000,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider, model and feature flags chosen for one AI call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    pub provider: ProviderKind,
    pub model: &'static str,
    pub web_search: bool,
    pub extended_thinking: bool,
}

impl RouteDecision {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.model(),
            web_search: false,
            extended_thinking: false,
        }
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    pub fn with_extended_thinking(mut self, enabled: bool) -> Self {
        self.extended_thinking = enabled;
        self
    }
}

/// Optional tuning supplied with a task.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl InvokeOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(Error::Validation(format!(
                    "temperature must be within [0, 1], got {}",
                    t
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(Error::Validation("maxTokens must be positive".to_string()));
        }
        Ok(())
    }
}

/// A task as submitted by a caller, before validation.
///
/// Fields default to empty so that missing values surface as validation
/// errors rather than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub options: InvokeOptions,
}

impl TaskRequest {
    /// Validate the request and resolve its task and tier.
    pub fn validate(&self) -> Result<(TaskCategory, Tier)> {
        let task = TaskCategory::resolve(&self.task)?;
        if self.content.trim().is_empty() {
            return Err(Error::Validation("content is required".to_string()));
        }
        let tier = Tier::resolve(&self.tier)?;
        self.options.validate()?;
        Ok((task, tier))
    }
}

/// Token usage and route facts for one completed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_tokens: Option<u64>,
    pub model: String,
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_thinking: Option<bool>,
}

impl UsageStats {
    /// Usage facts in the shape the credit calculator expects.
    pub fn cost_input(&self) -> CostInput {
        CostInput {
            provider: self.provider.as_str().to_string(),
            model: self.model.clone(),
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            thinking_tokens: self.thinking_tokens.unwrap_or(0),
            web_search: self.web_search.unwrap_or(false),
            extended_thinking: self.extended_thinking.unwrap_or(false),
        }
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResponse {
    pub success: bool,
    pub content: String,
    pub usage: UsageStats,
}
