//! Page-by-page text extraction for uploaded documents.
//!
//! Supported formats are paginated text documents: PDF (one entry per page)
//! and plain text / markdown (treated as a single page). Extraction never
//! panics; unsupported or corrupt input returns an error the pipeline reports.

/// Extraction error (returned, not panicked; the ingestion pipeline maps it
/// to a failed upload).
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedFormat(String),
    Pdf(String),
    Encoding(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFormat(ext) => {
                write!(f, "unsupported document format: {}", ext)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Encoding(e) => write!(f, "text decoding failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts page texts from document bytes, keyed by the lowercased file
/// extension. Page order matches document reading order.
pub fn extract_pages(bytes: &[u8], filename: &str) -> Result<Vec<String>, ExtractError> {
    match file_extension(filename).as_str() {
        "pdf" => extract_pdf_pages(bytes),
        "txt" | "md" => extract_plain_text(bytes),
        other => Err(ExtractError::UnsupportedFormat(if other.is_empty() {
            "(no extension)".to_string()
        } else {
            other.to_string()
        })),
    }
}

fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_plain_text(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Encoding(e.to_string()))?;
    Ok(vec![text.to_string()])
}

/// True if no page contains extractable text.
pub fn is_empty_document(pages: &[String]) -> bool {
    pages.iter().all(|p| p.trim().is_empty())
}
