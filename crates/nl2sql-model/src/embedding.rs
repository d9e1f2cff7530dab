//! Sentence embeddings for semantic retrieval
//!
//! Two backends are provided:
//! - [`HashingEmbedder`]: hashed bag-of-words vectors, deterministic and offline
//! - [`HttpEmbedder`]: an OpenAI-compatible `/embeddings` endpoint
//!
//! Construct one embedder at startup and share it (`Arc<dyn Embedder>`).

use crate::error::ModelError;
use crate::http::build_client;
use nl2sql_core::{EmbeddingConfig, EmbeddingProvider};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Dense embedding vector
pub type Embedding = Vec<f32>;

/// Maps text to a fixed-length vector comparable under cosine similarity
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed(&self, text: &str) -> Result<Embedding, ModelError>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ModelError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Cosine similarity between two embeddings
///
/// Returns 0.0 for vectors of different length or with zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Build the embedder selected by the `[embedding]` config section
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ModelError> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::from_config(config)?)),
    }
}

/// Hashed bag-of-words embedder
///
/// Text is lowercased and split on non-alphanumeric characters. Each word
/// adds one to the bucket chosen by its SHA-256 digest. Vectors are
/// L2-normalised. Texts sharing words score higher; synonyms do not.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, ModelError> {
        if dimension == 0 {
            return Err(ModelError::Config("embedding dimension must be at least 1".to_string()));
        }
        Ok(Self { dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed synchronously; never fails
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        for word in words(text) {
            vector[self.bucket(&word)] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn bucket(&self, word: &str) -> usize {
        let digest = Sha256::digest(word.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.dimension as u64) as usize
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

#[async_trait::async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &'static str {
        "hashing"
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ModelError> {
        Ok(self.embed_text(text))
    }
}

/// Embedding client for an OpenAI-compatible API
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String, // e.g., "text-embedding-3-small"
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Result<Self, ModelError> {
        Self::with_timeout(base_url, model, api_key, None)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Create from config, reading the API key from `api_key_env`
    ///
    /// A missing key is allowed for local servers that need none.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ModelError> {
        if config.base_url.trim().is_empty() {
            return Err(ModelError::Config("embedding.base_url is empty".to_string()));
        }
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Self::with_timeout(
            &config.base_url,
            &config.model,
            api_key,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Embedding>, ModelError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("Embedding API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: serde_json::Value = response.json().await?;
        parse_embeddings(&response_json)
    }
}

/// Extract `data[*].embedding` ordered by `index`
fn parse_embeddings(response: &serde_json::Value) -> Result<Vec<Embedding>, ModelError> {
    let data = response
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ModelError::InvalidResponse("No embedding data in response".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding: Embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| ModelError::InvalidResponse("No embedding vector in response".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        indexed.push((index, embedding));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, embedding)| embedding).collect())
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ModelError> {
        self.request(serde_json::json!(text))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("No embedding data in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.model, "embedding batch");

        let embeddings = self.request(serde_json::json!(texts)).await?;
        if embeddings.len() != texts.len() {
            return Err(ModelError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn hashing_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(512).unwrap();
        let a = embedder.embed_text("Logs the daily attendance status of company employees.");
        let b = embedder.embed_text("logs the DAILY attendance status of company employees");

        assert_eq!(a.len(), 512);
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(embedder.embed_text("  ...  ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(HashingEmbedder::new(0), Err(ModelError::Config(_))));
    }

    #[test]
    fn shared_words_score_higher() {
        let embedder = HashingEmbedder::new(4096).unwrap();
        let question = embedder.embed_text("how many employees were present yesterday");
        let attendance = embedder.embed_text("Logs the daily attendance status of company employees.");
        let inventory = embedder.embed_text("Tracks the stock levels and restocking schedules of items in a warehouse.");

        assert!(cosine_similarity(&question, &attendance) > cosine_similarity(&question, &inventory));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let texts = vec!["inventory items".to_string(), "employee attendance".to_string()];

        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_text("inventory items"));
        assert_eq!(batch[1], embedder.embed_text("employee attendance"));
    }

    #[test]
    fn parse_embeddings_orders_by_index() {
        let response = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let embeddings = parse_embeddings(&response).unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn parse_embeddings_without_data() {
        let response = serde_json::json!({"error": "bad model"});
        assert!(matches!(parse_embeddings(&response), Err(ModelError::InvalidResponse(_))));
    }

    #[test]
    fn from_config_selects_provider() {
        let config = EmbeddingConfig::default();
        assert_eq!(embedder_from_config(&config).unwrap().name(), "hashing");

        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Http,
            ..EmbeddingConfig::default()
        };
        assert_eq!(embedder_from_config(&config).unwrap().name(), "http");
    }
}
