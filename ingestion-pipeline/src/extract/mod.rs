use std::path::Path;

use thiserror::Error;

pub mod docx;
pub mod pdf;
pub mod workbook;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),
    #[error("Failed to read word document: {0}")]
    Docx(String),
    #[error("Failed to read workbook: {0}")]
    Workbook(String),
}

/// Format strategies, keyed by the declared MIME type. A MIME value outside
/// the table yields no strategy at all; the file is rejected before a single
/// byte of it is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Pdf,
    Docx,
    Workbook,
}

impl Extractor {
    pub fn for_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            MIME_PDF => Some(Self::Pdf),
            MIME_DOCX => Some(Self::Docx),
            MIME_XLSX | MIME_XLS => Some(Self::Workbook),
            _ => None,
        }
    }

    /// Runs the format-specific parse and returns plain text.
    pub async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        match self {
            Self::Pdf => pdf::extract_text(path).await,
            Self::Docx => docx::extract_text(path).await,
            Self::Workbook => workbook::extract_text(path).await,
        }
    }
}
