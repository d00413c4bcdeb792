use std::{cmp::Ordering, sync::Arc};

use crate::{providers::LLMProvider, types::EmbeddingRequest, LLMError};

#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn LLMProvider>,
    deployment_name: String,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn LLMProvider>, deployment_name: impl Into<String>) -> Self {
        Self {
            provider,
            deployment_name: deployment_name.into(),
        }
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        tracing::info!(chars = text.chars().count(), "generating embedding");

        let request = EmbeddingRequest::new(self.deployment_name.clone(), vec![text.to_string()]);
        let response = self.provider.create_embeddings(request).await?;
        let embedding = response
            .data
            .into_iter()
            .next()
            .ok_or(LLMError::InvalidResponse("response did not contain any embeddings"))?
            .embedding;

        tracing::info!(dimensions = embedding.len(), "generated embedding");
        Ok(embedding)
    }

    /// Embeds every text in one request. Vectors come back in input order.
    pub async fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>, LLMError> {
        tracing::info!(count = texts.len(), "generating embeddings");

        let input = texts.iter().map(|text| text.as_ref().to_string()).collect();
        let request = EmbeddingRequest::new(self.deployment_name.clone(), input);
        let mut data = self.provider.create_embeddings(request).await?.data;

        if data.len() != texts.len() {
            return Err(LLMError::InvalidResponse(
                "embedding count did not match the number of inputs",
            ));
        }

        data.sort_by_key(|item| item.index);
        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|item| item.embedding).collect();

        tracing::info!(count = embeddings.len(), "generated embeddings");
        Ok(embeddings)
    }
}

/// Cosine similarity in [-1, 1]; 0.0 when lengths differ or either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Ranks `documents` by similarity of their embeddings to `query`, best first.
pub fn find_most_similar<'a, S: AsRef<str>>(
    query: &[f32],
    document_embeddings: &[Vec<f32>],
    documents: &'a [S],
    top_k: usize,
) -> Vec<(&'a str, f32)> {
    let mut scored: Vec<(&'a str, f32)> = documents
        .iter()
        .zip(document_embeddings)
        .map(|(document, embedding)| (document.as_ref(), cosine_similarity(query, embedding)))
        .collect();

    scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        providers::scripted::ScriptedProvider,
        types::{Embedding, EmbeddingResponse},
    };

    #[test]
    fn cosine_of_identical_and_orthogonal_vectors() {
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn ranks_and_truncates() {
        let documents = ["north", "east", "north-east"];
        let embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];

        let ranked = find_most_similar(&[0.1, 1.0], &embeddings, &documents, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, "north");
        assert_eq!(ranked[1].0, "north-east");
        assert!(ranked[0].1 >= ranked[1].1);
    }

    #[tokio::test]
    async fn batch_results_follow_input_order() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_embedding_outcome(Ok(EmbeddingResponse {
            data: vec![
                Embedding {
                    object: "embedding".to_string(),
                    embedding: vec![2.0],
                    index: 1,
                },
                Embedding {
                    object: "embedding".to_string(),
                    embedding: vec![1.0],
                    index: 0,
                },
            ],
            model: "ada".to_string(),
            usage: None,
        }));

        let service = EmbeddingService::new(provider.clone(), "ada");
        let vectors = service.embed_batch(&["first", "second"]).await.expect("vectors");

        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
        let sent = &provider.embedding_requests()[0];
        assert_eq!(sent.model, "ada");
        assert_eq!(sent.input, vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn embed_rejects_empty_response() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_embeddings(Vec::new());

        let error = EmbeddingService::new(provider, "ada")
            .embed("text")
            .await
            .unwrap_err();
        assert!(matches!(error, LLMError::InvalidResponse(_)));
    }
}
