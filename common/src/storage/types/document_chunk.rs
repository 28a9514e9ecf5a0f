use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

use super::document::Document;

stored_object!(DocumentChunk, "document_chunk", {
    document_id: String,
    merchant_id: String,
    text: String,
    chunk_index: u32,
    total_chunks: u32,
    embedding: Vec<f32>
});

impl DocumentChunk {
    /// Chunk ids are a pure function of the document id and the chunk's
    /// position, so reprocessing the same text overwrites rather than
    /// duplicates index entries.
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{document_id}-{index}")
    }

    pub fn new(
        document: &Document,
        index: usize,
        total: usize,
        text: String,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Self::chunk_id(&document.id, index),
            created_at: now,
            updated_at: now,
            document_id: document.id.clone(),
            merchant_id: document.merchant_id.clone(),
            text,
            chunk_index: index as u32,
            total_chunks: total as u32,
            embedding,
        }
    }

    pub async fn get_by_document_id(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<DocumentChunk>, AppError> {
        let chunks: Vec<DocumentChunk> = db
            .query(
                "SELECT * FROM type::table($table)
                 WHERE document_id = $document_id
                 ORDER BY chunk_index ASC",
            )
            .bind(("table", Self::table_name()))
            .bind(("document_id", document_id.to_string()))
            .await?
            .take(0)?;

        Ok(chunks)
    }

    pub async fn delete_by_document_id(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.query("DELETE type::table($table) WHERE document_id = $document_id")
            .bind(("table", Self::table_name()))
            .bind(("document_id", document_id.to_string()))
            .await?;

        Ok(())
    }
}
