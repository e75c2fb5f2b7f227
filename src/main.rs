// Módulos de la aplicación
mod config;
mod error;
mod ingest;
mod llm;
mod models;
mod reader;
mod retry;
mod vector_store;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    ingest::{IngestionPipeline, PipelineOptions},
    llm::LlmManager,
    retry::RetryPolicy,
    vector_store::QdrantStore,
};

/// Describe y embebe cada fichero de una carpeta de código y lo guarda en Qdrant.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Carpeta a escanear.
    folder: PathBuf,

    /// Colección de destino en Qdrant.
    #[arg(long, env = "COLLECTION_NAME", default_value = "code")]
    collection: String,

    /// No entrar en subcarpetas.
    #[arg(long)]
    flat: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Clientes externos, construidos una sola vez
    let llm_manager = LlmManager::from_config(&cfg);
    let store = QdrantStore::connect(&cfg).context("Error conectando a Qdrant")?;

    let options = PipelineOptions {
        recursive: !cli.flat,
        distance: cfg.vector_distance,
        id_policy: cfg.point_id_policy,
        retry: RetryPolicy::new(cfg.request_timeout, cfg.max_retry_elapsed),
        ..PipelineOptions::new(cli.collection)
    };
    let pipeline = IngestionPipeline::new(llm_manager.clone(), llm_manager, store, options);

    // 4. Ingesta
    info!("🚀 Procesando carpeta {}", cli.folder.display());
    let report = pipeline
        .process_folder(&cli.folder)
        .await
        .context("Ingesta abortada")?;

    info!("✅ {report}");
    Ok(())
}
