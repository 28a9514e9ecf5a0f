use std::path::Path;

use super::ExtractError;

/// Reads the PDF into memory and runs the text-layer extraction off the
/// async executor.
pub async fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let pdf_bytes = tokio::fs::read(path).await?;

    let text = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&pdf_bytes)
    })
    .await?
    .map_err(|err| ExtractError::Pdf(err.to_string()))?;

    Ok(text)
}
