use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Reader};

use super::ExtractError;

/// Renders every sheet to tab-delimited lines, sheets concatenated in
/// workbook declaration order and separated by a newline.
pub async fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let path: PathBuf = path.to_path_buf();

    let text = tokio::task::spawn_blocking(move || render_workbook(&path)).await??;

    Ok(text)
}

fn render_workbook(path: &Path) -> Result<String, ExtractError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| ExtractError::Workbook(err.to_string()))?;
    let sheet_names = workbook.sheet_names().to_owned();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| ExtractError::Workbook(err.to_string()))?;

        let mut lines = Vec::with_capacity(range.height());
        for row in range.rows() {
            let line = row
                .iter()
                .map(|cell| cell.to_string())
                .collect::<Vec<_>>()
                .join("\t");
            lines.push(line);
        }
        sheets.push(lines.join("\n"));
    }

    Ok(sheets.join("\n"))
}
