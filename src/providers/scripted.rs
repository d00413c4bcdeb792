use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use crate::{
    providers::LLMProvider,
    types::{
        ChatMessage, CompletionRequest, CompletionResponse, Embedding, EmbeddingRequest,
        EmbeddingResponse, TokenUsage,
    },
    LLMError,
};

/// In-process provider that replays queued outcomes in order and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedProvider {
    completions: Mutex<VecDeque<Result<CompletionResponse, LLMError>>>,
    embeddings: Mutex<VecDeque<Result<EmbeddingResponse, LLMError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    embedding_requests: Mutex<Vec<EmbeddingRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for response in responses {
            provider.push_response(response);
        }
        provider
    }

    pub fn push_response(&self, content: impl Into<String>) -> &Self {
        self.push_completion(Ok(CompletionResponse {
            message: ChatMessage::assistant(content),
            usage: None,
        }))
    }

    pub fn push_response_with_usage(&self, content: impl Into<String>, usage: TokenUsage) -> &Self {
        self.push_completion(Ok(CompletionResponse {
            message: ChatMessage::assistant(content),
            usage: Some(usage),
        }))
    }

    pub fn push_error(&self, error: LLMError) -> &Self {
        self.push_completion(Err(error))
    }

    pub fn push_completion(&self, outcome: Result<CompletionResponse, LLMError>) -> &Self {
        lock(&self.completions).push_back(outcome);
        self
    }

    /// Queues an embeddings response; `index` of each vector follows the given order.
    pub fn push_embeddings(&self, vectors: Vec<Vec<f32>>) -> &Self {
        let data = vectors
            .into_iter()
            .enumerate()
            .map(|(index, embedding)| Embedding {
                object: "embedding".to_string(),
                embedding,
                index,
            })
            .collect();

        self.push_embedding_outcome(Ok(EmbeddingResponse {
            data,
            model: "scripted".to_string(),
            usage: None,
        }))
    }

    pub fn push_embedding_outcome(&self, outcome: Result<EmbeddingResponse, LLMError>) -> &Self {
        lock(&self.embeddings).push_back(outcome);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn embedding_requests(&self) -> Vec<EmbeddingRequest> {
        lock(&self.embedding_requests).clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        lock(&self.requests).push(request);
        lock(&self.completions)
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::Scripted("no more scripted responses".to_string())))
    }

    async fn create_embeddings(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, LLMError> {
        lock(&self.embedding_requests).push(request);
        lock(&self.embeddings)
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::Scripted("no more scripted embeddings".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
