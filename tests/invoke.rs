//! Integration tests for provider invocation.
//!
//! Fake OpenAI and Anthropic APIs run on `wiremock` servers; the router is
//! built from config exactly as `serve` builds it. Every mock declares how
//! many calls it expects, which the server verifies on drop.

use std::collections::HashMap;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idealab_router::config::{ApiKey, Config, MissingCredentialPolicy, ProviderConfig};
use idealab_router::credits::credit_cost;
use idealab_router::router::{build_http_client, Execution, InvokeOptions, ProviderKind};
use idealab_router::{Error, Router, TaskCategory, TaskRequest};

fn provider(url: String, key: &str) -> ProviderConfig {
    ProviderConfig {
        url,
        api_key: Some(ApiKey::from(key)),
        models: HashMap::new(),
    }
}

fn router_for(openai: Option<&MockServer>, anthropic: Option<&MockServer>) -> Router {
    let mut config = Config::default();
    config.providers.openai = openai.map(|s| provider(format!("{}/v1", s.uri()), "sk-openai"));
    config.providers.anthropic = anthropic.map(|s| {
        let mut p = provider(format!("{}/v1", s.uri()), "sk-ant");
        p.models.insert(
            "claude-3-sonnet".to_string(),
            "claude-3-sonnet-20240229".to_string(),
        );
        p
    });
    let http = build_http_client(&config).expect("http client");
    Router::from_config(&config, http)
}

fn task(task: &str, tier: &str, content: &str) -> TaskRequest {
    TaskRequest {
        task: task.to_string(),
        content: content.to_string(),
        tier: tier.to_string(),
        options: InvokeOptions::default(),
    }
}

fn openai_reply(content: &str, prompt_tokens: u64, completion_tokens: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    }))
}

#[tokio::test]
async fn test_market_research_paid_uses_web_search() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-openai"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 800,
            "web_search_options": {},
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Who sells CRMs to dentists?"}
            ]
        })))
        .respond_with(openai_reply("Three vendors...", 1200, 600))
        .expect(1)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);
    let Execution {
        route, response, ..
    } = router
        .execute(&task("marketResearch", "basic", "Who sells CRMs to dentists?"))
        .await
        .expect("invoke should succeed");

    assert_eq!(route.provider, ProviderKind::OpenAiMini);
    assert!(route.web_search);
    assert!(response.success);
    assert_eq!(response.content, "Three vendors...");
    assert_eq!(response.usage.web_search, Some(true));
    assert_eq!(response.usage.extended_thinking, None);

    // ceil(1200/1000) + ceil(600*4/1000) + 3
    assert_eq!(credit_cost(&response.usage.cost_input()), 2 + 3 + 3);
}

#[tokio::test]
async fn test_free_market_research_has_no_web_search() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("ok", 10, 10))
        .expect(1)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);
    let execution = router
        .execute(&task("marketResearch", "free", "Size the market"))
        .await
        .unwrap();

    assert!(!execution.route.web_search);
    assert_eq!(execution.response.usage.web_search, None);

    let requests = openai.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("web_search_options").is_none());
}

#[tokio::test]
async fn test_premium_planning_uses_anthropic_thinking() {
    let anthropic = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-sonnet-20240229",
            "max_tokens": 3000,
            "system": "Plan carefully.",
            "thinking": {"type": "enabled", "budget_tokens": 2000}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "Break the launch into phases first."},
                {"type": "text", "text": "Phase 1: discovery."}
            ],
            "usage": {"input_tokens": 500, "output_tokens": 1500}
        })))
        .expect(1)
        .mount(&anthropic)
        .await;

    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(openai_reply("unused", 1, 1))
        .expect(0)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), Some(&anthropic));
    let mut request = task("projectPlanning", "premium", "Plan an MVP launch");
    request.options.system_prompt = Some("Plan carefully.".to_string());

    let Execution {
        route, response, ..
    } = router.execute(&request).await.unwrap();

    assert_eq!(route.provider, ProviderKind::ClaudeStandard);
    assert!(route.extended_thinking);
    assert_eq!(response.content, "Phase 1: discovery.");
    assert_eq!(response.usage.model, "claude-3-sonnet");
    assert_eq!(response.usage.extended_thinking, Some(true));
    // 35 chars of thinking text -> ceil(35 / 4)
    assert_eq!(response.usage.thinking_tokens, Some(9));
    // Reported output includes the thinking tokens, which are billed separately.
    assert_eq!(response.usage.output_tokens, 1491);

    let requests = anthropic.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("temperature").is_none());
}

#[tokio::test]
async fn test_premium_planning_without_anthropic_key_fails_without_calls() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(openai_reply("unused", 1, 1))
        .expect(0)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);
    let err = router
        .execute(&task("projectPlanning", "premium", "Plan it"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MissingCredential {
            task: Some(TaskCategory::ProjectPlanning),
            provider: ProviderKind::ClaudeStandard
        }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_premium_planning_falls_back_when_configured() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 800})))
        .respond_with(openai_reply("Fallback plan", 50, 80))
        .expect(1)
        .mount(&openai)
        .await;

    let mut config = Config::default();
    config.providers.openai = Some(provider(format!("{}/v1", openai.uri()), "sk-openai"));
    config.routing.missing_credential_policy = MissingCredentialPolicy::Fallback;
    let router = Router::from_config(&config, build_http_client(&config).unwrap());

    let execution = router
        .execute(&task("projectPlanning", "premium", "Plan it"))
        .await
        .unwrap();

    // The basic-tier rule does not cover premium, so the catch-all applies.
    assert_eq!(execution.route.provider, ProviderKind::OpenAiMini);
    assert!(!execution.route.extended_thinking);
}

#[tokio::test]
async fn test_premium_code_analysis_falls_back_silently() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(openai_reply("Looks fine", 100, 40))
        .expect(1)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);
    let execution = router
        .execute(&task("codeAnalysis", "premium", "fn main() {}"))
        .await
        .unwrap();

    assert_eq!(execution.route.provider, ProviderKind::OpenAiMini);
}

#[tokio::test]
async fn test_provider_500_is_retryable_and_not_retried() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);
    let err = router
        .execute(&task("ideaGeneration", "free", "Ideas for pet owners"))
        .await
        .unwrap_err();

    match &err {
        Error::Provider {
            task,
            provider,
            status,
            ..
        } => {
            assert_eq!(*task, Some(TaskCategory::IdeaGeneration));
            assert_eq!(*provider, ProviderKind::OpenAiMini);
            assert_eq!(*status, Some(500));
        }
        other => panic!("expected provider error, got {:?}", other),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_reply_is_provider_error() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(1)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);
    let err = router
        .execute(&task("basicChat", "free", "hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { status: None, .. }));
}

#[tokio::test]
async fn test_validation_errors_make_no_calls() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(openai_reply("unused", 1, 1))
        .expect(0)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);

    let empty_content = router.execute(&task("ideaGeneration", "free", "  ")).await;
    assert!(matches!(empty_content, Err(Error::Validation(_))));

    let bad_tier = router.execute(&task("ideaGeneration", "gold", "x")).await;
    assert!(matches!(bad_tier, Err(Error::Validation(_))));

    let mut hot = task("ideaGeneration", "free", "x");
    hot.options.temperature = Some(1.5);
    assert!(matches!(router.execute(&hot).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_caller_options_override_defaults() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "max_tokens": 42,
            "messages": [{"role": "system", "content": "Be brief."}]
        })))
        .respond_with(openai_reply("ok", 5, 5))
        .expect(1)
        .mount(&openai)
        .await;

    let router = router_for(Some(&openai), None);
    let mut request = task("basicChat", "free", "hi");
    request.options = InvokeOptions {
        system_prompt: Some("Be brief.".to_string()),
        temperature: Some(0.2),
        max_tokens: Some(42),
    };

    router.execute(&request).await.unwrap();

    let requests = openai.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let temperature = body["temperature"].as_f64().unwrap();
    assert!((temperature - 0.2).abs() < 1e-6);
}
