use std::sync::Arc;

use crate::{
    providers::LLMProvider,
    types::{ChatMessage, CompletionRequest, TokenUsage},
    LLMError,
};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_MAX_SENTENCES: usize = 3;

pub const SUMMARIZE_TEMPERATURE: f32 = 0.3;
pub const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Sampling parameters for a single chat call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    /// Sampling temperature, 0.0 to 2.0.
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ChatOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResult {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatResult {
    fn new(content: String, usage: TokenUsage) -> Self {
        Self {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Chat completions against one deployment, plus the summarize and classify
/// prompts built on top of them.
#[derive(Clone)]
pub struct ChatCompletionService {
    provider: Arc<dyn LLMProvider>,
    deployment_name: String,
}

impl ChatCompletionService {
    pub fn new(provider: Arc<dyn LLMProvider>, deployment_name: impl Into<String>) -> Self {
        Self {
            provider,
            deployment_name: deployment_name.into(),
        }
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    /// The system message, when present and non-empty, always precedes the user message.
    pub fn build_request(
        &self,
        user_message: &str,
        system_prompt: Option<&str>,
        options: ChatOptions,
    ) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = system_prompt.filter(|prompt| !prompt.is_empty()) {
            messages.push(ChatMessage::system(prompt));
        }
        messages.push(ChatMessage::user(user_message));

        CompletionRequest::new(self.deployment_name.clone(), messages)
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens)
    }

    pub async fn send_chat(
        &self,
        user_message: &str,
        system_prompt: Option<&str>,
        options: ChatOptions,
    ) -> Result<ChatResult, LLMError> {
        let request = self.build_request(user_message, system_prompt, options);

        tracing::info!(
            deployment = %self.deployment_name,
            provider = self.provider.name(),
            "sending chat completion request"
        );

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(
                    deployment = %self.deployment_name,
                    status = ?error.status(),
                    %error,
                    "Azure OpenAI request failed"
                );
                return Err(error);
            }
        };

        let usage = response.usage.unwrap_or_default();
        tracing::info!(
            total_tokens = usage.total_tokens,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "received chat completion response"
        );

        let content = response.message.content.unwrap_or_default();
        Ok(ChatResult::new(content, usage))
    }

    pub async fn summarize_text(&self, text: &str, max_sentences: usize) -> Result<String, LLMError> {
        let system_prompt = summarize_prompt(max_sentences);
        let user_message = format!("Please summarize the following text:\n\n{text}");
        let options = ChatOptions::default().with_temperature(SUMMARIZE_TEMPERATURE);

        let result = self
            .send_chat(&user_message, Some(&system_prompt), options)
            .await?;
        Ok(result.content)
    }

    /// Returns the label chosen by the model, trimmed of surrounding whitespace.
    pub async fn classify_text<S: AsRef<str>>(
        &self,
        text: &str,
        categories: &[S],
    ) -> Result<String, LLMError> {
        let system_prompt = classify_prompt(categories);
        let user_message = format!("Classify this text:\n\n{text}");
        let options = ChatOptions::default().with_temperature(CLASSIFY_TEMPERATURE);

        let result = self
            .send_chat(&user_message, Some(&system_prompt), options)
            .await?;
        Ok(result.content.trim().to_string())
    }
}

fn summarize_prompt(max_sentences: usize) -> String {
    format!(
        "You are a skilled summarizer.\n\
         Create a concise summary of the provided text in {max_sentences} sentences or fewer.\n\
         Focus on the key points and main ideas."
    )
}

fn classify_prompt<S: AsRef<str>>(categories: &[S]) -> String {
    let categories = categories
        .iter()
        .map(|category| category.as_ref())
        .collect::<Vec<&str>>()
        .join(", ");

    format!(
        "You are a text classifier.\n\
         Classify the given text into exactly one of these categories: {categories}\n\
         Respond with only the category name, nothing else."
    )
}
