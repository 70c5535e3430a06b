//! Text extraction for uploaded files (PDF, DOCX, plain text).
//!
//! The format is chosen from the file extension. Extraction never
//! panics: malformed input becomes [`ExtractError::ExtractionFailed`] and
//! the upload is rejected.

use std::io::{Cursor, Read};
use std::path::Path;

use docuquery_core::models::SourceKind;
use quick_xml::events::Event;

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}. Supported: .pdf, .docx, .txt, .md")]
    UnsupportedFormat(String),
    #[error("{kind} extraction failed: {message}")]
    ExtractionFailed { kind: SourceKind, message: String },
}

impl ExtractError {
    fn failed(kind: SourceKind, e: impl std::fmt::Display) -> Self {
        ExtractError::ExtractionFailed {
            kind,
            message: e.to_string(),
        }
    }
}

/// Source kind for a file name, by extension (case-insensitive).
pub fn kind_from_filename(filename: &str) -> Result<SourceKind, ExtractError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(SourceKind::Pdf),
        "docx" => Ok(SourceKind::Docx),
        "txt" | "text" | "md" => Ok(SourceKind::PlainText),
        "" => Err(ExtractError::UnsupportedFormat(format!(
            "'{}' has no extension",
            filename
        ))),
        other => Err(ExtractError::UnsupportedFormat(format!(".{}", other))),
    }
}

/// Extract plain UTF-8 text from an uploaded file.
pub fn extract_file(filename: &str, bytes: &[u8]) -> Result<(SourceKind, String), ExtractError> {
    let kind = kind_from_filename(filename)?;
    let text = extract_text(kind, bytes)?;
    tracing::debug!(file = filename, %kind, bytes = bytes.len(), chars = text.chars().count(), "extracted text");
    Ok((kind, text))
}

pub fn extract_text(kind: SourceKind, bytes: &[u8]) -> Result<String, ExtractError> {
    match kind {
        SourceKind::Pdf => extract_pdf(bytes),
        SourceKind::Docx => extract_docx(bytes),
        SourceKind::PlainText | SourceKind::DirectInput => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::failed(SourceKind::Pdf, e))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let fail = |e: &dyn std::fmt::Display| ExtractError::failed(SourceKind::Docx, e);
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| fail(&e))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| fail(&"word/document.xml not found"))?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| fail(&e))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(fail(&"word/document.xml exceeds size limit"));
    }
    docx_paragraphs(&xml)
}

/// Text of every `<w:p>` paragraph, one per line.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => current.push('\t'),
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"br" => current.push('\n'),
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::failed(SourceKind::Docx, e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::failed(SourceKind::Docx, e)),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}
