//! Modelos de dominio: ficheros procesados y puntos persistidos en Qdrant.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Fichero leído, descrito y embebido durante una ejecución.
/// Sólo vive en memoria hasta que se escribe su punto.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFileRecord {
    pub filename: String,
    /// Ruta relativa a la carpeta escaneada.
    pub path: String,
    pub content: String,
    pub description: String,
    pub embedding: Vec<f32>,
}

/// Metadatos que acompañan al vector en Qdrant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointPayload {
    pub filename: String,
    pub path: String,
    pub file_content: String,
    pub description: String,
    pub ingested_at: String,
}

/// Punto (id, vector, payload) tal y como se escribe en la colección.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStorePoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

impl VectorStorePoint {
    pub fn from_record(record: &SourceFileRecord, id: u64) -> Self {
        Self {
            id,
            vector: record.embedding.clone(),
            payload: PointPayload {
                filename: record.filename.clone(),
                path: record.path.clone(),
                file_content: record.content.clone(),
                description: record.description.clone(),
                ingested_at: Utc::now().to_rfc3339(),
            },
        }
    }
}

/// Métrica de distancia de la colección.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

impl FromStr for Distance {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclid" | "euclidean" => Ok(Self::Euclid),
            "manhattan" => Ok(Self::Manhattan),
            other => Err(anyhow!("Distancia vectorial no soportada: {other}")),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclid => "euclid",
            Self::Manhattan => "manhattan",
        };
        f.write_str(name)
    }
}

/// Cómo se asigna el id de cada punto.
///
/// `Random` reproduce el comportamiento original: cada ejecución añade
/// puntos nuevos, aunque el fichero no haya cambiado. `PathHash` deriva el id
/// de la ruta relativa, así que reingestar un fichero sobrescribe su punto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointIdPolicy {
    #[default]
    Random,
    PathHash,
}

impl PointIdPolicy {
    pub fn point_id(self, record: &SourceFileRecord) -> u64 {
        let uuid = match self {
            Self::Random => Uuid::new_v4(),
            Self::PathHash => Uuid::new_v5(&Uuid::NAMESPACE_URL, record.path.as_bytes()),
        };
        // 64 bits bajos del uuid
        uuid.as_u64_pair().1
    }
}

impl FromStr for PointIdPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "path-hash" | "path_hash" | "pathhash" => Ok(Self::PathHash),
            other => Err(anyhow!("Política de ids no soportada: {other}")),
        }
    }
}
