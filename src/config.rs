//! Carga y gestión de configuración de la aplicación (OpenAI + Qdrant).

use std::{env, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::models::{Distance, PointIdPolicy};

const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,

    pub llm_chat_model: String,
    pub llm_embedding_model: String,
    pub embedding_dimensions: u64,
    pub description_max_tokens: u64,

    pub vector_distance: Distance,
    pub point_id_policy: PointIdPolicy,

    pub request_timeout: Duration,
    pub max_retry_elapsed: Duration,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // El cliente de OpenAI de Rig lee la clave del entorno por su cuenta,
        // aquí sólo comprobamos que está para fallar antes de escanear nada.
        lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("Falta OPENAI_API_KEY en el entorno"))?;

        let qdrant_url = lookup("QDRANT_URL")
            .or_else(|| lookup("QDRANT_PATH"))
            .unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string());
        Url::parse(&qdrant_url).with_context(|| format!("QDRANT_URL inválida: {qdrant_url}"))?;

        let qdrant_api_key = lookup("QDRANT_API_KEY").filter(|key| !key.is_empty());

        let llm_chat_model = lookup("LLM_CHAT_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let llm_embedding_model = lookup("LLM_EMBEDDING_MODEL")
            .unwrap_or_else(|| "text-embedding-3-small".to_string());

        let embedding_dimensions = parse_or(&lookup, "EMBEDDING_DIMENSIONS", 1536)?;
        if embedding_dimensions == 0 {
            return Err(anyhow!("EMBEDDING_DIMENSIONS debe ser mayor que 0"));
        }
        let description_max_tokens = parse_or(&lookup, "DESCRIPTION_MAX_TOKENS", 100)?;

        let vector_distance = lookup("VECTOR_DISTANCE")
            .map(|s| Distance::from_str(&s))
            .transpose()?
            .unwrap_or_default();
        let point_id_policy = lookup("POINT_ID_POLICY")
            .map(|s| PointIdPolicy::from_str(&s))
            .transpose()?
            .unwrap_or_default();

        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 60)?);
        let max_retry_elapsed =
            Duration::from_secs(parse_or(&lookup, "MAX_RETRY_ELAPSED_SECS", 30)?);

        Ok(Self {
            qdrant_url,
            qdrant_api_key,
            llm_chat_model,
            llm_embedding_model,
            embedding_dimensions,
            description_max_tokens,
            vector_distance,
            point_id_policy,
            request_timeout,
            max_retry_elapsed,
        })
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} no es un entero válido: {raw}")),
        None => Ok(default),
    }
}
