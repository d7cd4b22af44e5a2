//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::{malformed, status_error, transport_error, ChatProvider, CompletionReply, CompletionRequest};
use crate::config::ProviderConfig;
use crate::error::Result;

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_search_options: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Client for the primary provider.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    config: ProviderConfig,
}

impl OpenAiClient {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.url.trim_end_matches('/'))
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: self.config.upstream_model(&request.model),
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            web_search_options: request.web_search.then(|| serde_json::json!({})),
        }
    }
}

/// Pull the reply text and usage out of a decoded response.
fn into_reply(response: ChatCompletionResponse) -> std::result::Result<CompletionReply, &'static str> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or("response contained no choices")?
        .message
        .content
        .ok_or("first choice has no message content")?;

    let (input_tokens, output_tokens) = match response.usage {
        Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
        None => {
            tracing::warn!("Provider response has no usage object, billing minimum");
            (0, 0)
        }
    };

    Ok(CompletionReply {
        content,
        input_tokens,
        output_tokens,
        thinking_tokens: None,
    })
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    fn name(&self) -> &str {
        crate::config::OPENAI
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply> {
        let mut upstream = self
            .http
            .post(self.endpoint())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&self.body(request));

        if let Some(api_key) = &self.config.api_key {
            upstream = upstream.header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let response = upstream
            .send()
            .await
            .map_err(|e| transport_error(request.provider, e))?;

        if !response.status().is_success() {
            return Err(status_error(request.provider, response).await);
        }

        let decoded: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| malformed(request.provider, e))?;

        into_reply(decoded).map_err(|detail| malformed(request.provider, detail))
    }
}
