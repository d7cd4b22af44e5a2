//! Upstream AI provider clients.
//!
//! Each client turns a [`CompletionRequest`] into exactly one HTTPS call and
//! maps the answer (or failure) back into a [`CompletionReply`].

mod anthropic;
mod mock;
mod openai;

pub use anthropic::{AnthropicClient, ANTHROPIC_VERSION};
pub use mock::MockProvider;
pub use openai::OpenAiClient;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::router::ProviderKind;

/// A fully resolved single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Which route this request serves; used for error context.
    pub provider: ProviderKind,
    /// Canonical model name; clients may map it to an upstream id.
    pub model: String,
    pub system_prompt: String,
    pub user_content: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub web_search: bool,
    /// Extended thinking budget, when enabled.
    pub thinking_budget: Option<u32>,
}

/// What came back from the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionReply {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: Option<u64>,
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short name for logs ("openai", "anthropic", "mock").
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply>;
}

/// Rough token estimate (~4 characters per token) for text the provider
/// does not meter separately.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Map a transport failure into a provider error.
pub(crate) fn transport_error(provider: ProviderKind, e: reqwest::Error) -> Error {
    tracing::error!(error = %e, provider = %provider, "Failed to reach provider");
    Error::Provider {
        task: None,
        provider,
        message: format!("Failed to reach provider: {}", e),
        status: e.status().map(|s| s.as_u16()),
    }
}

/// Turn a non-2xx upstream response into a provider error.
pub(crate) async fn status_error(provider: ProviderKind, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(
        status = %status,
        provider = %provider,
        body = %body,
        "Provider returned error"
    );
    Error::Provider {
        task: None,
        provider,
        message: format!("Provider returned {}: {}", status, body),
        status: Some(status.as_u16()),
    }
}

/// Error for a 2xx response whose payload could not be understood.
pub(crate) fn malformed(provider: ProviderKind, detail: impl std::fmt::Display) -> Error {
    tracing::error!(provider = %provider, detail = %detail, "Malformed provider response");
    Error::Provider {
        task: None,
        provider,
        message: format!("Malformed response: {}", detail),
        status: None,
    }
}
