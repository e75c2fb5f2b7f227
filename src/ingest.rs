//! Ingesta de una carpeta de código en Qdrant: cada fichero se lee, se
//! describe con el LLM, se embebe la descripción y, al terminar el recorrido,
//! se escribe un punto por fichero en la colección.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::{
    error::{IngestError, Stage},
    llm::{DescriptionGenerator, EmbeddingGenerator},
    models::{Distance, PointIdPolicy, SourceFileRecord, VectorStorePoint},
    reader,
    retry::RetryPolicy,
    vector_store::{VectorStore, VectorStoreWriter},
};

/// Opciones de una ejecución de la ingesta.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub collection_name: String,
    /// Si es `false` sólo se procesa el primer nivel de la carpeta.
    pub recursive: bool,
    pub distance: Distance,
    pub id_policy: PointIdPolicy,
    pub retry: RetryPolicy,
}

impl PipelineOptions {
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            recursive: true,
            distance: Distance::default(),
            id_policy: PointIdPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Resultado de una ejecución.
#[derive(Debug, Default)]
pub struct IngestionReport {
    /// Ficheros procesados con éxito, en orden de recorrido.
    pub records: Vec<SourceFileRecord>,
    /// Ids de los puntos escritos, en orden de escritura.
    pub point_ids: Vec<u64>,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub points_written: usize,
    pub points_failed: usize,
}

impl std::fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ficheros escaneados, {} procesados, {} omitidos. {} puntos escritos, {} fallidos.",
            self.files_scanned,
            self.records.len(),
            self.files_skipped,
            self.points_written,
            self.points_failed
        )
    }
}

/// Orquestador de la ingesta. Recibe los clientes ya construidos.
pub struct IngestionPipeline<D, E, S> {
    describer: D,
    embedder: E,
    writer: VectorStoreWriter<S>,
    options: PipelineOptions,
}

impl<D, E, S> IngestionPipeline<D, E, S>
where
    D: DescriptionGenerator,
    E: EmbeddingGenerator,
    S: VectorStore,
{
    pub fn new(describer: D, embedder: E, store: S, options: PipelineOptions) -> Self {
        Self {
            describer,
            embedder,
            writer: VectorStoreWriter::new(store),
            options,
        }
    }

    /// Procesa la carpeta completa y escribe los resultados en la colección.
    ///
    /// Sólo devuelve error si la carpeta no existe (sin tocar el vector store)
    /// o si no se puede asegurar la colección. Los fallos de un fichero o de
    /// un punto se registran y la ejecución sigue con el resto.
    pub async fn process_folder(&self, root: &Path) -> Result<IngestionReport, IngestError> {
        if !root.is_dir() {
            let err = IngestError::MissingFolder(root.to_path_buf());
            error!("{err}");
            return Err(err);
        }

        let mut report = IngestionReport::default();
        let files = self.list_files(root);
        let total = files.len();

        for (index, (path, filename)) in files.into_iter().enumerate() {
            report.files_scanned += 1;
            info!("[{}/{}] Procesando: {}...", index + 1, total, path.display());

            match self.process_file(root, &path, filename).await {
                Ok(Some(record)) => report.records.push(record),
                Ok(None) => {
                    report.files_skipped += 1;
                    info!("[{}/{}] Omitido: {}", index + 1, total, path.display());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    report.files_skipped += 1;
                    error!("Error procesando {}: {err}", path.display());
                }
            }
        }

        let collection = self.options.collection_name.as_str();
        let dimensions = self.embedder.dimensions();
        self.options
            .retry
            .run(Stage::Store, || {
                self.writer
                    .ensure_collection(collection, dimensions, self.options.distance)
            })
            .await?;

        for record in &report.records {
            let id = self.options.id_policy.point_id(record);
            let point = VectorStorePoint::from_record(record, id);

            let result = self
                .options
                .retry
                .run(Stage::Store, || self.writer.upsert(collection, point.clone()))
                .await;

            match result {
                Ok(()) => {
                    report.points_written += 1;
                    report.point_ids.push(id);
                    info!("Fichero {} guardado en la colección '{collection}'.", record.path);
                }
                Err(err) => {
                    report.points_failed += 1;
                    error!("No se pudo guardar {} en '{collection}': {err}", record.path);
                }
            }
        }

        info!("{report}");
        Ok(report)
    }

    /// Lista los ficheros regulares bajo `root` en el orden del sistema de archivos.
    /// Los enlaces simbólicos se siguen; los rotos y los ciclos se omiten.
    fn list_files(&self, root: &Path) -> Vec<(PathBuf, String)> {
        let mut walker = WalkDir::new(root).min_depth(1).follow_links(true);
        if !self.options.recursive {
            walker = walker.max_depth(1);
        }

        walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("No se pudo recorrer una entrada de {}: {err}", root.display());
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let filename = entry.file_name().to_string_lossy().to_string();
                (entry.into_path(), filename)
            })
            .collect()
    }

    /// Lee, describe y embebe un fichero. `Ok(None)` si no se pudo leer o
    /// sólo contiene espacios.
    async fn process_file(
        &self,
        root: &Path,
        path: &Path,
        filename: String,
    ) -> Result<Option<SourceFileRecord>, IngestError> {
        let Some(content) = reader::read_source(path) else {
            return Ok(None);
        };
        if content.trim().is_empty() {
            warn!("{}", IngestError::EmptyContent(path.to_path_buf()));
            return Ok(None);
        }

        let retry = &self.options.retry;
        let description = retry
            .run(Stage::Describe, || self.describer.describe(&content))
            .await?;
        let embedding = retry
            .run(Stage::Embed, || self.embedder.embed(&description))
            .await?;

        let expected = self.embedder.dimensions();
        let actual = embedding.len() as u64;
        if actual != expected {
            return Err(IngestError::DimensionMismatch { expected, actual });
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        Ok(Some(SourceFileRecord {
            filename,
            path: relative.to_string_lossy().to_string(),
            content,
            description,
            embedding,
        }))
    }
}
