use std::sync::Arc;

use async_trait::async_trait;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::document_chunk::DocumentChunk},
};

/// Sink for fully embedded chunk sets. Called at most once per worker run,
/// always with the complete ordered set. Implementations must overwrite by
/// chunk id so reprocessing a document never duplicates index entries.
#[async_trait]
pub trait VectorUpserter: Send + Sync {
    async fn upsert_document_chunks(&self, chunks: &[DocumentChunk]) -> Result<(), AppError>;
}

pub struct SurrealVectorIndex {
    db: Arc<SurrealDbClient>,
}

impl SurrealVectorIndex {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VectorUpserter for SurrealVectorIndex {
    async fn upsert_document_chunks(&self, chunks: &[DocumentChunk]) -> Result<(), AppError> {
        let Some(first) = chunks.first() else {
            return Ok(());
        };

        // The delete clears rows a previous run wrote beyond the new chunk
        // count; both statements commit or neither does.
        const UPSERT_MUTATION: &str = r#"
            BEGIN TRANSACTION;
            DELETE type::table($table) WHERE document_id = $document_id;
            FOR $chunk IN $chunks {
                UPSERT type::thing($table, $chunk.id) CONTENT $chunk;
            };
            COMMIT TRANSACTION;
        "#;

        self.db
            .client
            .query(UPSERT_MUTATION)
            .bind(("table", DocumentChunk::table_name()))
            .bind(("document_id", first.document_id.clone()))
            .bind(("chunks", chunks.to_vec()))
            .await?
            .check()?;

        Ok(())
    }
}
