use std::{
    io::{BufReader, Read},
    path::Path,
    sync::Arc,
};

use bytes::Bytes;
use chrono::Utc;
use mime_guess::from_path;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{document::Document, index_job::IndexJob},
    },
};

/// A received upload: the multipart scratch file plus its declared metadata.
pub struct UploadedFile {
    pub file: NamedTempFile,
    pub file_name: String,
    pub content_type: Option<String>,
}

pub struct UploadCoordinator {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
}

impl UploadCoordinator {
    pub fn new(db: Arc<SurrealDbClient>, storage: StorageManager) -> Self {
        Self { db, storage }
    }

    /// Writes the upload to the blob store, creates the pending document
    /// record and enqueues its index job. The caller-supplied scratch file is
    /// removed whether or not any of that succeeded.
    pub async fn upload_file(
        &self,
        merchant_id: &str,
        upload: UploadedFile,
    ) -> Result<Document, AppError> {
        let UploadedFile {
            file,
            file_name,
            content_type,
        } = upload;

        let result = self
            .store_and_enqueue(merchant_id, &file, &file_name, content_type.as_deref())
            .await;

        if let Err(err) = file.close() {
            warn!(error = %err, "failed to remove upload scratch file");
        }

        result
    }

    async fn store_and_enqueue(
        &self,
        merchant_id: &str,
        file: &NamedTempFile,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<Document, AppError> {
        let sha256 = digest_file(file)?;
        let file_type = content_type
            .map(str::to_owned)
            .unwrap_or_else(|| guess_mime_type(Path::new(file_name)));
        let storage_key = format!(
            "{}/{}-{}",
            merchant_id,
            Utc::now().timestamp_millis(),
            sanitize_file_name(file_name)
        );

        let bytes = tokio::fs::read(file.path()).await?;
        self.storage.put(&storage_key, Bytes::from(bytes)).await?;

        let document = Document::new(
            merchant_id.to_owned(),
            file_name.to_owned(),
            file_type,
            storage_key,
            sha256,
        );
        // If either create below fails the blob stays behind under its key;
        // reconciling orphaned objects is not the upload path's job.
        self.db.store_item(document.clone()).await?;
        IndexJob::create_and_add_to_db(&document, &self.db).await?;

        info!(
            merchant_id = %merchant_id,
            document_id = %document.id,
            file_type = %document.file_type,
            "upload accepted"
        );

        Ok(document)
    }
}

/// Streams the scratch file through SHA-256.
fn digest_file(file: &NamedTempFile) -> Result<String, AppError> {
    let mut reader = BufReader::new(file.as_file());
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192]; // 8KB buffer

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}

/// Guesses the MIME type based on the file extension.
fn guess_mime_type(path: &Path) -> String {
    from_path(path)
        .first_or(mime::APPLICATION_OCTET_STREAM)
        .to_string()
}

/// Sanitizes the file name to prevent directory traversal through the
/// storage key. Replaces any non-alphanumeric characters (excluding '.' in
/// the extension and '_') with underscores.
fn sanitize_file_name(file_name: &str) -> String {
    if let Some(idx) = file_name.rfind('.') {
        let (name, ext) = file_name.split_at(idx);
        let sanitized_name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", sanitized_name, ext)
    } else {
        file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}
