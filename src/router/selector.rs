//! Route selection and invocation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use super::rules::{select_route, RouteRule, SelectionContext, ROUTE_RULES};
use super::types::{
    Backend, InvokeOptions, InvokeResponse, RouteDecision, TaskCategory, TaskRequest, Tier,
    UsageStats,
};
use crate::config::{Config, RoutingConfig};
use crate::error::{Error, Result};
use crate::provider::{AnthropicClient, ChatProvider, CompletionRequest, MockProvider, OpenAiClient};

/// Build the shared outbound HTTP client from server settings.
pub fn build_http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.server.upstream_timeout_secs))
        .connect_timeout(Duration::from_secs(config.server.connect_timeout_secs))
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// A validated task together with its route and the provider's answer.
#[derive(Debug, Clone)]
pub struct Execution {
    pub task: TaskCategory,
    pub tier: Tier,
    pub route: RouteDecision,
    pub response: InvokeResponse,
}

/// Selects a route for each task and performs the call.
///
/// Holds only immutable settings and shared clients, so one instance can
/// serve concurrent callers.
#[derive(Clone)]
pub struct Router {
    routing: RoutingConfig,
    primary: Option<Arc<dyn ChatProvider>>,
    secondary: Option<Arc<dyn ChatProvider>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routing", &self.routing)
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field("secondary", &self.secondary.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

impl Router {
    /// Create a router from explicit backends. A `None` backend means the
    /// provider has no credential.
    pub fn new(
        routing: RoutingConfig,
        primary: Option<Arc<dyn ChatProvider>>,
        secondary: Option<Arc<dyn ChatProvider>>,
    ) -> Self {
        Self {
            routing,
            primary,
            secondary,
        }
    }

    /// Create a router wired to the configured providers.
    ///
    /// Providers without a credential are left unset; in mock mode both
    /// backends answer locally.
    pub fn from_config(config: &Config, http: Client) -> Self {
        if config.routing.mock_responses {
            tracing::warn!("Mock responses enabled - no provider will be called");
            let mock: Arc<dyn ChatProvider> = Arc::new(MockProvider);
            return Self::new(config.routing.clone(), Some(mock.clone()), Some(mock));
        }

        let primary = config
            .providers
            .openai
            .clone()
            .filter(|p| p.has_credential())
            .map(|p| Arc::new(OpenAiClient::new(http.clone(), p)) as Arc<dyn ChatProvider>);

        let secondary = config
            .providers
            .anthropic
            .clone()
            .filter(|p| p.has_credential())
            .map(|p| Arc::new(AnthropicClient::new(http, p)) as Arc<dyn ChatProvider>);

        Self::new(config.routing.clone(), primary, secondary)
    }

    pub fn secondary_available(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn primary_available(&self) -> bool {
        self.primary.is_some()
    }

    /// The routing table in evaluation order.
    pub fn rules(&self) -> &'static [RouteRule] {
        ROUTE_RULES
    }

    /// Choose a route for a task and tier. Performs no I/O.
    pub fn select_route(&self, task: TaskCategory, tier: Tier) -> Result<RouteDecision> {
        let route = select_route(
            ROUTE_RULES,
            task,
            tier,
            SelectionContext {
                secondary_available: self.secondary_available(),
                policy: self.routing.missing_credential_policy,
            },
        )?;

        tracing::debug!(
            task = %task,
            tier = %tier,
            provider = %route.provider,
            model = %route.model,
            web_search = route.web_search,
            extended_thinking = route.extended_thinking,
            "Selected route"
        );

        Ok(route)
    }

    fn backend(&self, route: &RouteDecision) -> Result<&Arc<dyn ChatProvider>> {
        let backend = match route.provider.backend() {
            Backend::Primary => self.primary.as_ref(),
            Backend::Secondary => self.secondary.as_ref(),
        };
        backend.ok_or(Error::MissingCredential {
            task: None,
            provider: route.provider,
        })
    }

    /// Resolve defaults and build the provider request for a route.
    pub fn completion_request(
        &self,
        route: &RouteDecision,
        content: &str,
        options: &InvokeOptions,
    ) -> CompletionRequest {
        CompletionRequest {
            provider: route.provider,
            model: route.model.to_string(),
            system_prompt: options
                .system_prompt
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| self.routing.default_system_prompt.clone()),
            user_content: content.to_string(),
            temperature: options
                .temperature
                .unwrap_or(self.routing.default_temperature),
            max_tokens: options
                .max_tokens
                .unwrap_or_else(|| route.provider.default_max_tokens()),
            web_search: route.web_search,
            thinking_budget: route
                .extended_thinking
                .then_some(self.routing.thinking_budget_tokens),
        }
    }

    /// Perform exactly one provider call for an already selected route.
    pub async fn invoke(
        &self,
        route: &RouteDecision,
        content: &str,
        options: &InvokeOptions,
    ) -> Result<InvokeResponse> {
        if content.trim().is_empty() {
            return Err(Error::Validation("content is required".to_string()));
        }
        options.validate()?;

        let backend = self.backend(route)?;
        let request = self.completion_request(route, content, options);

        tracing::info!(
            provider = %route.provider,
            backend = %backend.name(),
            model = %route.model,
            max_tokens = request.max_tokens,
            "Invoking provider"
        );

        let reply = backend.complete(&request).await?;

        Ok(InvokeResponse {
            success: true,
            content: reply.content,
            usage: UsageStats {
                input_tokens: reply.input_tokens,
                output_tokens: reply.output_tokens,
                thinking_tokens: reply.thinking_tokens,
                model: route.model.to_string(),
                provider: route.provider,
                web_search: route.web_search.then_some(true),
                extended_thinking: route.extended_thinking.then_some(true),
            },
        })
    }

    /// Validate a caller request, select its route and invoke it.
    pub async fn execute(&self, request: &TaskRequest) -> Result<Execution> {
        let (task, tier) = request.validate()?;
        let route = self.select_route(task, tier)?;

        match self
            .invoke(&route, &request.content, &request.options)
            .await
            .map_err(|e| e.for_task(task))
        {
            Ok(response) => Ok(Execution {
                task,
                tier,
                route,
                response,
            }),
            Err(e) => {
                tracing::warn!(
                    task = %task,
                    tier = %tier,
                    provider = %route.provider,
                    model = %route.model,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Task invocation failed"
                );
                Err(e)
            }
        }
    }
}
