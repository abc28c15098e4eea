use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read PDF {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("No text could be extracted from {0}")]
    EmptyDocument(String),
}

/// Which document of the company pair a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDoc {
    Framework,
    Spo,
}

impl fmt::Display for SourceDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDoc::Framework => write!(f, "Framework"),
            SourceDoc::Spo => write!(f, "Second Party Opinion"),
        }
    }
}

/// A chunk of extracted text, tagged with its source document.
#[derive(Debug, Clone)]
pub struct DocChunk {
    pub source: SourceDoc,
    pub text: String,
}

/// Extract the full text of a PDF.
pub fn extract_text_from_pdf(path: &Path) -> Result<String, ExtractError> {
    let text = pdf_extract::extract_text(path).map_err(|e| ExtractError::Pdf {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if text.trim().is_empty() {
        return Err(ExtractError::EmptyDocument(path.display().to_string()));
    }

    debug!(path = %path.display(), chars = text.len(), "extracted PDF text");
    Ok(text)
}

/// Split text into overlapping fixed-size character windows.
///
/// The window advances by `chunk_size - overlap` characters; the final partial
/// window is kept. Callers must guarantee `overlap < chunk_size` (enforced by
/// config validation).
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 || overlap >= chunk_size {
        return Vec::new();
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Extract and chunk both PDFs of a company pair.
pub fn extract_chunks_from_pair(
    framework_pdf: &Path,
    spo_pdf: &Path,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<DocChunk>, ExtractError> {
    let mut chunks = Vec::new();

    let framework_text = extract_text_from_pdf(framework_pdf)?;
    for text in chunk_text(&framework_text, chunk_size, overlap) {
        chunks.push(DocChunk {
            source: SourceDoc::Framework,
            text,
        });
    }

    let spo_text = extract_text_from_pdf(spo_pdf)?;
    for text in chunk_text(&spo_text, chunk_size, overlap) {
        chunks.push(DocChunk {
            source: SourceDoc::Spo,
            text,
        });
    }

    debug!(count = chunks.len(), "chunked document pair");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_short_input_single_chunk() {
        let chunks = chunk_text("hello world", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "hello world");
    }

    #[test]
    fn test_chunk_text_empty_input() {
        assert!(chunk_text("", 100, 10).is_empty());
    }

    #[test]
    fn test_chunk_text_window_and_overlap() {
        let text = "abcdefghij"; // 10 chars
        let chunks = chunk_text(text, 4, 2);
        // step = 2: [0..4], [2..6], [4..8], [6..10]
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn test_chunk_text_final_partial_window_kept() {
        let text = "abcdefg"; // 7 chars
        let chunks = chunk_text(text, 4, 1);
        // step = 3: [0..4], [3..7]
        assert_eq!(chunks, vec!["abcd", "defg"]);
    }

    #[test]
    fn test_chunk_text_invalid_overlap_yields_nothing() {
        assert!(chunk_text("abcdef", 4, 4).is_empty());
        assert!(chunk_text("abcdef", 0, 0).is_empty());
    }

    #[test]
    fn test_chunk_text_multibyte_boundaries() {
        let text = "héllo wörld désu"; // multi-byte chars must not split
        let chunks = chunk_text(text, 5, 1);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 5);
        }
    }

    #[test]
    fn test_extract_text_missing_file() {
        let err = extract_text_from_pdf(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf { .. }));
    }

    #[test]
    fn test_source_doc_display() {
        assert_eq!(SourceDoc::Framework.to_string(), "Framework");
        assert_eq!(SourceDoc::Spo.to_string(), "Second Party Opinion");
    }
}
