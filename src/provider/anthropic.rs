//! Anthropic messages API client.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::{
    estimate_tokens, malformed, status_error, transport_error, ChatProvider, CompletionReply,
    CompletionRequest,
};
use crate::config::ProviderConfig;
use crate::error::Result;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    /// Encrypted reasoning; its payload still counts as thinking output.
    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        #[serde(default)]
        data: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Client for the secondary provider.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    config: ProviderConfig,
}

impl AnthropicClient {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.config.url.trim_end_matches('/'))
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> MessageRequest<'a> {
        let thinking = request.thinking_budget.map(|budget| Thinking {
            kind: "enabled",
            budget_tokens: budget,
        });

        // max_tokens must exceed the thinking budget.
        let max_tokens = match request.thinking_budget {
            Some(budget) if request.max_tokens <= budget => budget.saturating_add(request.max_tokens),
            _ => request.max_tokens,
        };

        MessageRequest {
            model: self.config.upstream_model(&request.model),
            max_tokens,
            system: &request.system_prompt,
            messages: vec![Message {
                role: "user",
                content: &request.user_content,
            }],
            // Temperature is rejected when thinking is enabled.
            temperature: thinking.is_none().then_some(request.temperature),
            thinking,
        }
    }
}

fn into_reply(
    response: MessageResponse,
    thinking_enabled: bool,
) -> std::result::Result<CompletionReply, &'static str> {
    let mut text = String::new();
    let mut thinking_text = String::new();
    let mut saw_text = false;

    for block in response.content {
        match block {
            ContentBlock::Text { text: t } => {
                saw_text = true;
                text.push_str(&t);
            }
            ContentBlock::Thinking { thinking } => thinking_text.push_str(&thinking),
            ContentBlock::RedactedThinking { data } => thinking_text.push_str(&data),
            ContentBlock::Other => {}
        }
    }

    if !saw_text {
        return Err("response contained no text block");
    }

    let usage = response.usage.ok_or("response has no usage object")?;

    // Reported output includes thinking; bill each token at one rate only.
    let thinking_tokens = thinking_enabled.then(|| estimate_tokens(&thinking_text));
    let output_tokens = usage
        .output_tokens
        .saturating_sub(thinking_tokens.unwrap_or(0));

    Ok(CompletionReply {
        content: text,
        input_tokens: usage.input_tokens,
        output_tokens,
        thinking_tokens,
    })
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    fn name(&self) -> &str {
        crate::config::ANTHROPIC
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply> {
        let mut upstream = self
            .http
            .post(self.endpoint())
            .header(header::CONTENT_TYPE, "application/json")
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(request));

        if let Some(api_key) = &self.config.api_key {
            upstream = upstream.header("x-api-key", api_key.expose_secret());
        }

        let response = upstream
            .send()
            .await
            .map_err(|e| transport_error(request.provider, e))?;

        if !response.status().is_success() {
            return Err(status_error(request.provider, response).await);
        }

        let decoded: MessageResponse = response
            .json()
            .await
            .map_err(|e| malformed(request.provider, e))?;

        into_reply(decoded, request.thinking_budget.is_some())
            .map_err(|detail| malformed(request.provider, detail))
    }
}
