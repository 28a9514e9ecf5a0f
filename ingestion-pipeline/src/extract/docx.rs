use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Pulls the raw text runs out of the wordprocessing part of the archive.
/// Paragraphs become lines; explicit tabs and breaks are preserved.
pub async fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = tokio::fs::read(path).await?;

    let text = tokio::task::spawn_blocking(move || parse_document_part(&bytes)).await??;

    Ok(text)
}

fn parse_document_part(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ExtractError::Docx(err.to_string()))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| ExtractError::Docx(err.to_string()))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut output = String::new();
    let mut in_text_run = false;

    loop {
        match reader
            .read_event()
            .map_err(|err| ExtractError::Docx(err.to_string()))?
        {
            Event::Start(ref element) if element.local_name().as_ref() == b"t" => {
                in_text_run = true;
            }
            Event::End(ref element) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => output.push('\n'),
                _ => {}
            },
            Event::Empty(ref element) => match element.local_name().as_ref() {
                b"tab" => output.push('\t'),
                b"br" => output.push('\n'),
                _ => {}
            },
            Event::Text(element) if in_text_run => {
                let text = element
                    .unescape()
                    .map_err(|err| ExtractError::Docx(err.to_string()))?;
                output.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn docx_fixture(paragraphs: &[&str]) -> NamedTempFile {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();
            writer
                .start_file(DOCUMENT_PART, options)
                .expect("start document part");

            let body: String = paragraphs
                .iter()
                .map(|p| {
                    format!(
                        "<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"
                    )
                })
                .collect();
            let xml = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
                 <w:body>{body}</w:body></w:document>"
            );
            writer.write_all(xml.as_bytes()).expect("write xml");
            writer.finish().expect("finish archive");
        }

        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(buffer.get_ref()).expect("write archive");
        file
    }

    #[tokio::test]
    async fn test_extracts_paragraph_text() {
        let file = docx_fixture(&["Hello DOCX"]);
        let text = extract_text(file.path()).await.expect("extract");
        assert_eq!(text, "Hello DOCX\n");
    }

    #[tokio::test]
    async fn test_paragraphs_become_lines() {
        let file = docx_fixture(&["first", "second"]);
        let text = extract_text(file.path()).await.expect("extract");
        assert_eq!(text, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_entities_are_unescaped() {
        let file = docx_fixture(&["fish &amp; chips"]);
        let text = extract_text(file.path()).await.expect("extract");
        assert_eq!(text, "fish & chips\n");
    }

    #[tokio::test]
    async fn test_document_without_part_is_an_error() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut buffer);
            writer
                .start_file("unrelated.txt", SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(b"nope").expect("write");
            writer.finish().expect("finish");
        }
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(buffer.get_ref()).expect("write archive");

        let result = extract_text(file.path()).await;
        assert!(matches!(result, Err(ExtractError::Docx(_))));
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_an_error() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"not a zip archive").expect("write");

        let result = extract_text(file.path()).await;
        assert!(matches!(result, Err(ExtractError::Docx(_))));
    }
}
