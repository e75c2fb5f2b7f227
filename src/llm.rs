//! Abstracción sobre Rig para describir y embeber ficheros de código.
//! Los traits permiten sustituir el proveedor real por dobles en los tests.

use async_trait::async_trait;
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel as _;
use tracing::debug;

use crate::{
    config::AppConfig,
    error::{IngestError, Stage},
};

const DESCRIPTION_PROMPT: &str = "You are a developer who analyzes the provided code and describes what it is designed for. \
Don't give suggestions or improvements, just describe the code.";

/// Genera una descripción breve del contenido de un fichero.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    async fn describe(&self, content: &str) -> Result<String, IngestError>;
}

/// Convierte una descripción en un vector de dimensión fija.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IngestError>;

    /// Dimensión de los vectores que produce el modelo.
    fn dimensions(&self) -> u64;
}

/// Gestor de LLMs y embeddings sobre OpenAI.
#[derive(Clone)]
pub struct LlmManager {
    client: rig::providers::openai::Client,
    chat_model: String,
    embedding_model: String,
    embedding_dimensions: u64,
    max_tokens: u64,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    /// El cliente se crea una sola vez y se comparte entre llamadas.
    pub fn from_config(cfg: &AppConfig) -> Self {
        use rig::providers::openai;

        Self {
            client: openai::Client::from_env(),
            chat_model: cfg.llm_chat_model.clone(),
            embedding_model: cfg.llm_embedding_model.clone(),
            embedding_dimensions: cfg.embedding_dimensions,
            max_tokens: cfg.description_max_tokens,
        }
    }
}

#[async_trait]
impl DescriptionGenerator for LlmManager {
    async fn describe(&self, content: &str) -> Result<String, IngestError> {
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let agent = self
            .client
            .agent(&self.chat_model)
            .preamble(DESCRIPTION_PROMPT)
            .max_tokens(self.max_tokens)
            .build();

        let description = agent
            .prompt(content)
            .await
            .map_err(|e| IngestError::remote(Stage::Describe, e))?;

        debug!("Descripción generada ({} caracteres)", description.len());
        Ok(description.trim().to_string())
    }
}

#[async_trait]
impl EmbeddingGenerator for LlmManager {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IngestError> {
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;

        let model = self.client.embedding_model(&self.embedding_model);
        let embedding = model
            .embed_text(text)
            .await
            .map_err(|e| IngestError::remote(Stage::Embed, e))?;

        // Qdrant trabaja con f32
        Ok(embedding.vec.into_iter().map(|x| x as f32).collect())
    }

    fn dimensions(&self) -> u64 {
        self.embedding_dimensions
    }
}
