//! Integración con Qdrant como vector store para los ficheros de código.
//!
//! API pública:
//!   - `VectorStore`: operaciones mínimas del almacén (existe, crear, upsert).
//!   - `VectorStoreWriter`: asegura la colección una vez y escribe puntos.
//!   - `QdrantStore`: implementación real sobre `qdrant-client`.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        self, vectors_config::Config, CreateCollectionBuilder, GetCollectionInfoRequest,
        PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
    },
    Payload, Qdrant, QdrantError,
};
use tracing::info;

use crate::{
    config::AppConfig,
    error::{IngestError, Stage},
    models::{Distance, VectorStorePoint},
};

/// Operaciones del almacén vectorial que usa la ingesta.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool, IngestError>;

    /// Dimensión configurada de una colección existente.
    async fn collection_size(&self, name: &str) -> Result<u64, IngestError>;

    async fn create_collection(
        &self,
        name: &str,
        size: u64,
        distance: Distance,
    ) -> Result<(), IngestError>;

    async fn upsert_points(
        &self,
        collection: &str,
        points: Vec<VectorStorePoint>,
    ) -> Result<(), IngestError>;
}

/// Escritor de puntos. Recuerda las colecciones ya aseguradas y su dimensión.
pub struct VectorStoreWriter<S> {
    store: S,
    ensured: Mutex<HashMap<String, u64>>,
}

impl<S: VectorStore> VectorStoreWriter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ensured: Mutex::new(HashMap::new()),
        }
    }

    /// Garantiza que la colección exista con la dimensión pedida. Sólo la crea
    /// si no está; si ya existe con otra dimensión devuelve `DimensionMismatch`.
    pub async fn ensure_collection(
        &self,
        name: &str,
        dimensions: u64,
        distance: Distance,
    ) -> Result<(), IngestError> {
        if self.store.collection_exists(name).await? {
            let size = self.store.collection_size(name).await?;
            if size != dimensions {
                return Err(IngestError::DimensionMismatch {
                    expected: size,
                    actual: dimensions,
                });
            }
            info!("Colección '{name}' ya existe ({size} dimensiones).");
        } else {
            self.store.create_collection(name, dimensions, distance).await?;
            info!("Colección '{name}' creada ({dimensions} dimensiones, distancia {distance}).");
        }

        self.ensured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), dimensions);
        Ok(())
    }

    /// Escribe (o sobrescribe) un único punto.
    pub async fn upsert(
        &self,
        collection: &str,
        point: VectorStorePoint,
    ) -> Result<(), IngestError> {
        let expected = self
            .ensured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .copied();
        if let Some(expected) = expected {
            let actual = point.vector.len() as u64;
            if actual != expected {
                return Err(IngestError::DimensionMismatch { expected, actual });
            }
        }

        self.store.upsert_points(collection, vec![point]).await
    }
}

/// Cliente de Qdrant compartido por toda la ejecución.
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    pub fn connect(cfg: &AppConfig) -> anyhow::Result<Self> {
        info!("Conectando a Qdrant en {}...", cfg.qdrant_url);
        let client = Qdrant::from_url(&cfg.qdrant_url)
            .api_key(cfg.qdrant_api_key.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IngestError> {
        self.client
            .collection_exists(name)
            .await
            .map_err(store_error)
    }

    async fn collection_size(&self, name: &str) -> Result<u64, IngestError> {
        let response = self
            .client
            .collection_info(GetCollectionInfoRequest {
                collection_name: name.to_string(),
            })
            .await
            .map_err(store_error)?;

        let vectors = response
            .result
            .and_then(|info| info.config)
            .and_then(|config| config.params)
            .and_then(|params| params.vectors_config)
            .and_then(|vectors| vectors.config);

        match vectors {
            Some(Config::Params(params)) => Ok(params.size),
            Some(Config::ParamsMap(_)) => Err(IngestError::permanent(
                Stage::Store,
                format!("La colección '{name}' usa vectores con nombre, no soportados"),
            )),
            None => Err(IngestError::permanent(
                Stage::Store,
                format!("La colección '{name}' no tiene configuración de vectores"),
            )),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        size: u64,
        distance: Distance,
    ) -> Result<(), IngestError> {
        let request = CreateCollectionBuilder::new(name)
            .vectors_config(VectorParamsBuilder::new(size, qdrant::Distance::from(distance)));

        self.client
            .create_collection(request)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn upsert_points(
        &self,
        collection: &str,
        points: Vec<VectorStorePoint>,
    ) -> Result<(), IngestError> {
        let points = points
            .into_iter()
            .map(PointStruct::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

/// Los errores sin estado gRPC (transporte, IO, límites de tasa) se reintentan.
fn store_error(err: QdrantError) -> IngestError {
    let transient = match &err {
        QdrantError::ResponseError { status } => transient_status(&format!("{:?}", status.code())),
        _ => true,
    };

    if transient {
        IngestError::transient(Stage::Store, err)
    } else {
        IngestError::permanent(Stage::Store, err)
    }
}

/// Sólo los estados que indican indisponibilidad del servidor son transitorios.
fn transient_status(code: &str) -> bool {
    matches!(
        code,
        "Unavailable" | "DeadlineExceeded" | "ResourceExhausted" | "Aborted"
    )
}

impl From<Distance> for qdrant::Distance {
    fn from(distance: Distance) -> Self {
        match distance {
            Distance::Cosine => Self::Cosine,
            Distance::Dot => Self::Dot,
            Distance::Euclid => Self::Euclid,
            Distance::Manhattan => Self::Manhattan,
        }
    }
}

impl TryFrom<VectorStorePoint> for PointStruct {
    type Error = IngestError;

    fn try_from(point: VectorStorePoint) -> Result<Self, Self::Error> {
        let payload = serde_json::to_value(&point.payload)
            .map_err(|e| IngestError::permanent(Stage::Store, e))?;
        let payload =
            Payload::try_from(payload).map_err(|e| IngestError::permanent(Stage::Store, e))?;

        Ok(PointStruct::new(point.id, point.vector, payload))
    }
}
