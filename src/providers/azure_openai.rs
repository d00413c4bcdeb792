use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::{
    config::Settings,
    error::LLMError,
    providers::LLMProvider,
    types::{
        ChatMessage, CompletionRequest, CompletionResponse, Embedding, EmbeddingRequest,
        EmbeddingResponse, EmbeddingUsage, TokenUsage,
    },
};

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AzureOpenAIConfig {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for AzureOpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAIConfig")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl AzureOpenAIConfig {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.key.clone(), settings.endpoint.clone())
            .with_api_version(settings.api_version.clone())
            .with_timeout(settings.request_timeout)
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AzureOpenAI {
    client: Client,
    config: AzureOpenAIConfig,
}

impl AzureOpenAI {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, LLMError> {
        Self::from_config(AzureOpenAIConfig::new(api_key, endpoint))
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, LLMError> {
        Self::from_config(AzureOpenAIConfig::from_settings(settings))
    }

    pub fn from_config(config: AzureOpenAIConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            deployment,
            operation,
            self.config.api_version
        )
    }

    fn with_default_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("api-key", &self.config.api_key)
    }
}

#[derive(Debug, Serialize)]
struct AzureChatRequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct AzureChatResponse {
    choices: Vec<AzureResponseChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct AzureResponseChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct AzureEmbeddingRequestBody {
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AzureEmbeddingResponse {
    data: Vec<Embedding>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct AzureErrorEnvelope {
    error: AzureError,
}

#[derive(Debug, Deserialize)]
struct AzureError {
    message: String,
}

/// Turns a non-2xx response into `LLMError::RequestFailed`, preferring the
/// message from the Azure error envelope.
async fn ensure_success(response: Response) -> Result<Response, LLMError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    let message = match serde_json::from_str::<AzureErrorEnvelope>(&text) {
        Ok(envelope) => envelope.error.message,
        Err(_) if text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
        Err(_) => text,
    };

    Err(LLMError::RequestFailed {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl LLMProvider for AzureOpenAI {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let CompletionRequest {
            model,
            messages,
            max_tokens,
            temperature,
        } = request;

        let url = self.endpoint(&model, "chat/completions");
        let body = AzureChatRequestBody {
            model,
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .with_default_headers(self.client.post(url))
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let parsed: AzureChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(LLMError::InvalidResponse("response did not contain any choices"))?;

        Ok(CompletionResponse {
            message: choice.message,
            usage: parsed.usage,
        })
    }

    async fn create_embeddings(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, LLMError> {
        let EmbeddingRequest { model, input } = request;

        let url = self.endpoint(&model, "embeddings");
        let body = AzureEmbeddingRequestBody { input };

        let response = self
            .with_default_headers(self.client.post(url))
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let parsed: AzureEmbeddingResponse = response.json().await?;

        Ok(EmbeddingResponse {
            data: parsed.data,
            model: parsed.model.unwrap_or(model),
            usage: parsed.usage,
        })
    }

    fn name(&self) -> &'static str {
        "azure-openai"
    }
}
