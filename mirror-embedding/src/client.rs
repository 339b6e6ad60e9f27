//! OpenAI embedding client

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequest, EmbeddingInput},
};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::{
    error::{EmbeddingError, Result},
    types::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, EmbeddingVector},
};

/// Embedding collaborator
///
/// Implementations must return exactly one vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, model: &str, inputs: Vec<String>) -> Result<Vec<EmbeddingVector>>;
}

/// OpenAI embedding client
pub struct EmbeddingClient {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// Uses text-embedding-3-small model (1536 dimensions)
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }

    /// Create a client from `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EmbeddingError::Config("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Embed a single market title
    pub async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vectors = self.embed(&self.model, vec![text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::InternalConsistency {
            expected: 1,
            actual: 0,
        })
    }

    /// Get the embedding model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    async fn embed(&self, model: &str, inputs: Vec<String>) -> Result<Vec<EmbeddingVector>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let expected = inputs.len();
        let request = CreateEmbeddingRequest {
            model: model.to_string(),
            input: EmbeddingInput::StringArray(inputs),
            encoding_format: None,
            dimensions: None,
            user: None,
        };

        let response = self.client.embeddings().create(request).await?;

        let mut data = response.data;
        data.sort_by_key(|e| e.index);

        if data.len() != expected {
            return Err(EmbeddingError::InternalConsistency {
                expected,
                actual: data.len(),
            });
        }

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            // Validate dimension
            if item.embedding.len() != self.dimension {
                return Err(EmbeddingError::InvalidDimension {
                    expected: self.dimension,
                    actual: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }

        debug!("Embedding request used {} prompt tokens", response.usage.prompt_tokens);
        info!(
            "Generated {} embeddings: dimension={}, model={}",
            vectors.len(),
            self.dimension,
            model
        );

        Ok(vectors)
    }
}
