use std::sync::Arc;

use mockito::{Matcher, Server};
use prompt_playbook::{
    providers::azure_openai::{AzureOpenAI, AzureOpenAIConfig},
    ChatCompletionService, ChatOptions, EmbeddingService, LLMError, LLMProvider, Settings,
};
use serde_json::json;

const CHAT_PATH: &str = "/openai/deployments/d/chat/completions";

fn provider(base_url: &str) -> Arc<dyn LLMProvider> {
    let settings = Settings::new(base_url, "k", "d");
    Arc::new(AzureOpenAI::from_settings(&settings).expect("client"))
}

#[tokio::test]
async fn sends_deployment_request_and_reads_usage() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", CHAT_PATH)
        .match_query(Matcher::UrlEncoded(
            "api-version".into(),
            "2024-02-15-preview".into(),
        ))
        .match_header("api-key", "k")
        .match_body(Matcher::PartialJson(json!({
            "messages": [
                { "role": "system", "content": "Be terse" },
                { "role": "user", "content": "Hello" }
            ],
            "temperature": 0.7,
            "max_tokens": 1000
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [
                    { "index": 0, "message": { "role": "assistant", "content": "Hi." }, "finish_reason": "stop" }
                ],
                "usage": { "prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let service = ChatCompletionService::new(provider(&server.url()), "d");
    let result = service
        .send_chat("Hello", Some("Be terse"), ChatOptions::default())
        .await
        .expect("chat result");

    mock.assert_async().await;
    assert_eq!(result.content, "Hi.");
    assert_eq!(result.prompt_tokens, 9);
    assert_eq!(result.completion_tokens, 2);
    assert_eq!(result.total_tokens, 11);
}

#[tokio::test]
async fn rate_limit_surfaces_as_request_failure() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", CHAT_PATH)
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"code":"429","message":"Rate limit is exceeded."}}"#)
        .expect(1)
        .create_async()
        .await;

    let service = ChatCompletionService::new(provider(&server.url()), "d");
    let error = service
        .send_chat("Hello", None, ChatOptions::default())
        .await
        .unwrap_err();

    mock.assert_async().await;
    match error {
        LLMError::RequestFailed { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "Rate limit is exceeded.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_is_kept_as_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", CHAT_PATH)
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let error = provider(&server.url())
        .complete(prompt_playbook::CompletionRequest::new(
            "d",
            vec![prompt_playbook::ChatMessage::user("Hello")],
        ))
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(502));
    assert!(error.to_string().contains("upstream unavailable"));
}

#[tokio::test]
async fn empty_choices_are_an_invalid_response() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", CHAT_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[],"usage":null}"#)
        .create_async()
        .await;

    let service = ChatCompletionService::new(provider(&server.url()), "d");
    let error = service
        .send_chat("Hello", None, ChatOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error, LLMError::InvalidResponse(_)));
}

#[tokio::test]
async fn embeddings_use_embedding_deployment() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/deployments/ada/embeddings")
        .match_query(Matcher::UrlEncoded("api-version".into(), "2024-06-01".into()))
        .match_header("api-key", "k")
        .match_body(Matcher::PartialJson(json!({ "input": ["one", "two"] })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "object": "list",
                "data": [
                    { "object": "embedding", "embedding": [0.0, 1.0], "index": 1 },
                    { "object": "embedding", "embedding": [1.0, 0.0], "index": 0 }
                ],
                "model": "text-embedding-ada-002",
                "usage": { "prompt_tokens": 2, "total_tokens": 2 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = AzureOpenAI::from_config(
        AzureOpenAIConfig::new("k", server.url()).with_api_version("2024-06-01"),
    )
    .expect("client");
    let service = EmbeddingService::new(Arc::new(provider), "ada");

    let vectors = service.embed_batch(&["one", "two"]).await.expect("vectors");

    mock.assert_async().await;
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}
