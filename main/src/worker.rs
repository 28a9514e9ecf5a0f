use std::sync::Arc;

use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::{
        config::get_config,
        embedding::{EmbeddingBackend, EmbeddingClient, EmbeddingProvider},
    },
};
use ingestion_pipeline::{
    pipeline::DocumentWorker, run_worker_loop, vector::SurrealVectorIndex,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    db.ensure_initialized(config.embedding_dimensions).await?;

    let storage = StorageManager::new(&config).await?;

    let embedding_provider = match config.embedding_backend {
        EmbeddingBackend::OpenAI => {
            let openai_client = Arc::new(async_openai::Client::with_config(
                async_openai::config::OpenAIConfig::new()
                    .with_api_key(&config.openai_api_key)
                    .with_api_base(&config.openai_base_url),
            ));
            EmbeddingProvider::new_openai(
                openai_client,
                config.embedding_model.clone(),
                config.embedding_dimensions,
            )
        }
        EmbeddingBackend::Hashed => {
            EmbeddingProvider::new_hashed(config.embedding_dimensions as usize)
        }
    };
    info!(
        backend = embedding_provider.backend_label(),
        dimensions = embedding_provider.dimension(),
        "embedding provider ready"
    );

    let embedder: Arc<dyn EmbeddingClient> = Arc::new(embedding_provider);
    let vector_index = Arc::new(SurrealVectorIndex::new(db.clone()));

    let worker = Arc::new(DocumentWorker::new(
        db.clone(),
        storage,
        embedder,
        vector_index,
        config.max_chunk_size,
    ));

    run_worker_loop(db, worker).await
}
