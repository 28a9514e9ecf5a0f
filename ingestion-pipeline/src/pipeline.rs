use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;
use tracing::{info, info_span, warn};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{
            document::Document, document_chunk::DocumentChunk, index_job::IndexJob,
        },
    },
    utils::embedding::EmbeddingClient,
};

use crate::{
    chunker::{split_text, truncate_chars, CHUNK_TEXT_LIMIT},
    extract::{ExtractError, Extractor, MIME_DOCX, MIME_PDF, MIME_XLS, MIME_XLSX},
    vector::VectorUpserter,
};

/// Conditions that end a run with the document marked failed. None of these
/// escape the worker; they are absorbed into the persisted status and a
/// human-readable error message.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("blob download failed: {0}")]
    Download(String),
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("no text chunks created")]
    EmptyContent,
    #[error("embedding failed for chunk {index}: {message}")]
    Embedding { index: usize, message: String },
    #[error("embedding dimension mismatch for chunk {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("vector upsert failed: {0}")]
    Upsert(String),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
}

pub struct DocumentWorker {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
    embedder: Arc<dyn EmbeddingClient>,
    vector_index: Arc<dyn VectorUpserter>,
    max_chunk_size: usize,
}

impl DocumentWorker {
    pub fn new(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        embedder: Arc<dyn EmbeddingClient>,
        vector_index: Arc<dyn VectorUpserter>,
        max_chunk_size: usize,
    ) -> Self {
        Self {
            db,
            storage,
            embedder,
            vector_index,
            max_chunk_size,
        }
    }

    /// Drives one claimed job to a terminal document status. Fatal pipeline
    /// conditions land on the document record; only infrastructure failures
    /// (the record store itself) propagate to the caller.
    pub async fn process_job(&self, job: IndexJob) -> Result<(), AppError> {
        let span = info_span!(
            "index_job",
            job_id = %job.id,
            document_id = %job.document_id,
            merchant_id = %job.merchant_id
        );
        let _enter = span.enter();

        let Some(document) = Document::try_begin_processing(&self.db, &job.document_id).await?
        else {
            return self.resolve_unclaimed(job).await;
        };

        match self.index_document(&document).await {
            Ok(chunk_count) => {
                document.mark_completed(&self.db).await?;
                job.mark_done(&self.db).await?;
                info!(document_id = %document.id, chunk_count, "document indexed");
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(document_id = %document.id, error = %reason, "document indexing failed");
                document.mark_failed(&reason, &self.db).await?;
                job.mark_done(&self.db).await?;
                Ok(())
            }
        }
    }

    /// The claim query returned no row: either the record is gone, or another
    /// run holds the processing lease and this delivery is a safe no-op.
    async fn resolve_unclaimed(&self, job: IndexJob) -> Result<(), AppError> {
        match self.db.get_item::<Document>(&job.document_id).await? {
            Some(existing) => {
                info!(
                    document_id = %existing.id,
                    status = existing.status.as_str(),
                    "document already leased; skipping job"
                );
                job.mark_done(&self.db).await?;
            }
            None => {
                warn!(document_id = %job.document_id, "document not found for queued job");
                job.mark_failed("document not found", &self.db).await?;
            }
        }
        Ok(())
    }

    /// Downloads the blob into a scratch file owned by this run and
    /// vectorizes it. The scratch file is removed on every path out of here;
    /// a removal failure is logged, never escalated.
    async fn index_document(&self, document: &Document) -> Result<usize, IndexError> {
        let scratch = self.download_to_scratch(document).await?;

        let result = self.vectorize(scratch.path(), document).await;

        if let Err(err) = scratch.close() {
            warn!(document_id = %document.id, error = %err, "failed to remove scratch file");
        }

        result
    }

    async fn download_to_scratch(&self, document: &Document) -> Result<NamedTempFile, IndexError> {
        let mut stream = self
            .storage
            .get_stream(&document.storage_key)
            .await
            .map_err(|err| IndexError::Download(err.to_string()))?;

        let mut scratch = Builder::new()
            .suffix(scratch_suffix(&document.file_type))
            .tempfile()?;

        while let Some(part) = stream.next().await {
            let bytes = part.map_err(|err| IndexError::Download(err.to_string()))?;
            scratch.write_all(&bytes)?;
        }
        scratch.flush()?;

        Ok(scratch)
    }

    async fn vectorize(&self, path: &Path, document: &Document) -> Result<usize, IndexError> {
        let extractor = Extractor::for_mime(&document.file_type)
            .ok_or_else(|| IndexError::UnsupportedFileType(document.file_type.clone()))?;

        let text = extractor.extract(path).await?;

        let pieces = split_text(&text, self.max_chunk_size);
        if pieces.is_empty() {
            return Err(IndexError::EmptyContent);
        }

        // Embed strictly in index order; the first failure aborts the rest
        // and the upserter is never reached, so the index never holds a
        // partially embedded document.
        let total = pieces.len();
        let expected = self.embedder.dimension();
        let mut chunks = Vec::with_capacity(total);
        for (index, piece) in pieces.into_iter().enumerate() {
            let embedding = self
                .embedder
                .embed(piece)
                .await
                .map_err(|err| IndexError::Embedding {
                    index,
                    message: err.to_string(),
                })?;

            if expected != 0 && embedding.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    index,
                    expected,
                    actual: embedding.len(),
                });
            }

            chunks.push(DocumentChunk::new(
                document,
                index,
                total,
                truncate_chars(piece, CHUNK_TEXT_LIMIT).to_string(),
                embedding,
            ));
        }

        self.vector_index
            .upsert_document_chunks(&chunks)
            .await
            .map_err(|err| IndexError::Upsert(err.to_string()))?;

        Ok(total)
    }
}

/// Scratch files carry the extension implied by the declared type; the
/// workbook reader picks its parser from it.
fn scratch_suffix(file_type: &str) -> &'static str {
    match file_type {
        MIME_PDF => ".pdf",
        MIME_DOCX => ".docx",
        MIME_XLSX => ".xlsx",
        MIME_XLS => ".xls",
        _ => ".bin",
    }
}
