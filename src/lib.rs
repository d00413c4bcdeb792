pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod providers;
pub mod samples;
pub mod types;

pub use chat::{ChatCompletionService, ChatOptions, ChatResult};
pub use config::{ConfigLayer, SettingKey, Settings, SettingsLoader};
pub use embeddings::{cosine_similarity, find_most_similar, EmbeddingService};
pub use error::{ConfigError, LLMError};
pub use providers::LLMProvider;
pub use samples::DemoError;
pub use types::{
    ChatMessage, CompletionRequest, CompletionResponse, Embedding, EmbeddingRequest,
    EmbeddingResponse, EmbeddingUsage, MessageRole, TokenUsage,
};
