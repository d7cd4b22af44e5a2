//! Offline stand-in for both providers.

use async_trait::async_trait;

use super::{estimate_tokens, ChatProvider, CompletionReply, CompletionRequest};
use crate::error::Result;

/// Answers every request locally with a deterministic canned reply.
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

const PREVIEW_CHARS: usize = 80;

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply> {
        let preview: String = request.user_content.chars().take(PREVIEW_CHARS).collect();
        let content = format!("[mock {}] {}", request.model, preview);

        tracing::debug!(model = %request.model, "Serving mock completion");

        Ok(CompletionReply {
            input_tokens: estimate_tokens(&request.system_prompt)
                + estimate_tokens(&request.user_content),
            output_tokens: estimate_tokens(&content),
            thinking_tokens: request.thinking_budget.map(|_| 0),
            content,
        })
    }
}
