//! Fixed demonstration runs for the chat and embeddings clients.
//!
//! Both demos load settings, connect a provider and then run their examples in
//! order, writing banners and results to `out`. Configuration and request
//! failures are reported on `out` and end the run without an error; only a
//! failure to write output is returned.

use std::{io, io::Write, sync::Arc};

use thiserror::Error;

use crate::{
    chat::{ChatCompletionService, ChatOptions, DEFAULT_MAX_SENTENCES},
    config::{Settings, SettingsLoader},
    embeddings::{cosine_similarity, find_most_similar, EmbeddingService},
    error::ConfigError,
    providers::LLMProvider,
    LLMError,
};

pub const CHAT_QUESTION: &str = "What are the key principles of prompt engineering?";
pub const CHAT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant specializing in prompt engineering.";

pub const SAMPLE_TEXT: &str = "Prompt engineering is the practice of designing and refining input prompts \
to effectively communicate with AI language models. It involves understanding \
how models interpret instructions, structuring prompts for clarity, and \
iterating based on outputs. Good prompt engineering can significantly improve \
the quality, relevance, and accuracy of AI-generated responses. Key techniques \
include providing context, specifying output formats, using examples (few-shot \
learning), and applying chain-of-thought reasoning for complex tasks.";

pub const CATEGORIES: [&str; 4] = ["Technical", "Business", "Creative", "Support"];
pub const TEXT_TO_CLASSIFY: &str = "How do I configure Azure OpenAI endpoints in my application?";

pub const DOCUMENTS: [&str; 6] = [
    "Prompt engineering involves designing effective prompts for AI models.",
    "Azure OpenAI provides enterprise-grade AI services in the cloud.",
    "Python is a popular programming language for machine learning.",
    "RAG combines retrieval systems with generative AI for accurate responses.",
    "Chain-of-thought prompting helps models reason through complex problems.",
    "The weather forecast predicts sunny skies for the weekend.",
];
pub const SEARCH_QUERY: &str = "How do I write better prompts for AI?";
pub const SEARCH_TOP_K: usize = 3;
pub const SIMILARITY_TEXTS: [&str; 3] = [
    "Effective prompt engineering is crucial for AI applications.",
    "Writing good prompts is essential for AI systems.",
    "The cat sat on the mat.",
];

const BANNER_WIDTH: usize = 50;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Azure OpenAI error: {0}")]
    Request(#[from] LLMError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Writes the user-facing report for a failed run. Output errors are handed back.
pub fn report_failure<W: Write>(error: DemoError, out: &mut W) -> io::Result<()> {
    match error {
        DemoError::Output(error) => Err(error),
        DemoError::Config(error) => {
            tracing::error!(%error, "configuration error");
            writeln!(out, "Configuration error: {error}")?;
            writeln!(out, "Please ensure Azure OpenAI settings are configured correctly.")
        }
        DemoError::Request(error) => {
            tracing::error!(status = ?error.status(), %error, "request error");
            writeln!(out, "Azure OpenAI error: {error}")
        }
    }
}

fn banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    let rule = "=".repeat(BANNER_WIDTH);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "{title}")?;
    writeln!(out, "{rule}")
}

fn connect<F>(loader: &SettingsLoader, factory: F) -> Result<(Settings, Arc<dyn LLMProvider>), DemoError>
where
    F: FnOnce(&Settings) -> Result<Arc<dyn LLMProvider>, LLMError>,
{
    let settings = loader.load()?;
    let provider = factory(&settings)?;
    tracing::info!(provider = provider.name(), endpoint = %settings.endpoint, "client initialized");
    Ok((settings, provider))
}

/// Runs the chat, summarization and classification examples. Stops at the first failure.
pub async fn run_chat_demo<F, W>(loader: &SettingsLoader, connect_provider: F, out: &mut W) -> io::Result<()>
where
    F: FnOnce(&Settings) -> Result<Arc<dyn LLMProvider>, LLMError>,
    W: Write,
{
    let outcome = match connect(loader, connect_provider) {
        Ok((settings, provider)) => {
            let service = ChatCompletionService::new(provider, settings.deployment_name);
            chat_examples(&service, out).await
        }
        Err(error) => Err(error),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(error) => report_failure(error, out),
    }
}

pub async fn chat_examples<W: Write>(service: &ChatCompletionService, out: &mut W) -> Result<(), DemoError> {
    banner(out, "Example 1: Simple Chat Completion")?;
    let response = service
        .send_chat(CHAT_QUESTION, Some(CHAT_SYSTEM_PROMPT), ChatOptions::default())
        .await?;
    writeln!(out, "Response:\n{}", response.content)?;

    banner(out, "Example 2: Text Summarization")?;
    let summary = service.summarize_text(SAMPLE_TEXT, DEFAULT_MAX_SENTENCES).await?;
    writeln!(out, "Summary:\n{summary}")?;

    banner(out, "Example 3: Text Classification")?;
    let category = service.classify_text(TEXT_TO_CLASSIFY, &CATEGORIES).await?;
    writeln!(out, "Text: {TEXT_TO_CLASSIFY}")?;
    writeln!(out, "Category: {category}")?;

    Ok(())
}

/// Runs the batch embedding, semantic search and similarity examples.
pub async fn run_embeddings_demo<F, W>(
    loader: &SettingsLoader,
    connect_provider: F,
    out: &mut W,
) -> io::Result<()>
where
    F: FnOnce(&Settings) -> Result<Arc<dyn LLMProvider>, LLMError>,
    W: Write,
{
    let outcome = match connect(loader, connect_provider) {
        Ok((settings, provider)) => {
            let service = EmbeddingService::new(provider, settings.embedding_deployment);
            embedding_examples(&service, out).await
        }
        Err(error) => Err(error),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(error) => report_failure(error, out),
    }
}

pub async fn embedding_examples<W: Write>(service: &EmbeddingService, out: &mut W) -> Result<(), DemoError> {
    banner(out, "Example 1: Generate Document Embeddings")?;
    let document_embeddings = service.embed_batch(&DOCUMENTS).await?;
    writeln!(out, "Generated embeddings for {} documents", DOCUMENTS.len())?;
    writeln!(
        out,
        "Embedding dimension: {}",
        document_embeddings.first().map(Vec::len).unwrap_or_default()
    )?;

    banner(out, "Example 2: Semantic Search")?;
    let query_embedding = service.embed(SEARCH_QUERY).await?;
    let results = find_most_similar(&query_embedding, &document_embeddings, &DOCUMENTS, SEARCH_TOP_K);
    writeln!(out, "Query: {SEARCH_QUERY}")?;
    writeln!(out, "\nTop matches:")?;
    for (rank, (document, score)) in results.iter().enumerate() {
        writeln!(out, "  {}. (Score: {score:.4}) {document}", rank + 1)?;
    }

    banner(out, "Example 3: Text Similarity Comparison")?;
    let [text1, text2, text3] = SIMILARITY_TEXTS;
    let emb1 = service.embed(text1).await?;
    let emb2 = service.embed(text2).await?;
    let emb3 = service.embed(text3).await?;

    writeln!(out, "Text 1: {text1}")?;
    writeln!(out, "Text 2: {text2}")?;
    writeln!(out, "Text 3: {text3}")?;
    writeln!(
        out,
        "\nSimilarity (1 vs 2): {:.4} (related texts)",
        cosine_similarity(&emb1, &emb2)
    )?;
    writeln!(
        out,
        "Similarity (1 vs 3): {:.4} (unrelated texts)",
        cosine_similarity(&emb1, &emb3)
    )?;

    Ok(())
}
