//! PDF text extraction
//!
//! The pipeline only depends on the [`TextExtractor`] trait; the shipped
//! implementation wraps the `pdf-extract` crate. Extraction is synchronous
//! and can be slow on large transcripts, so it runs on the blocking pool.

use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

/// Converts a file on disk into raw text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> Result<String>;
}

/// PDF extractor backed by `pdf-extract`, with post-extraction cleanup.
pub struct PdfTextExtractor {
    cleaner: TextCleaner,
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self {
            cleaner: TextCleaner::new(),
        }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let owned = path.to_path_buf();
        let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
            .await
            .map_err(|e| Error::Internal(format!("extraction task panicked: {e}")))?
            .map_err(|e| Error::Extraction(format!("{}: {e}", path.display())))?;

        let cleaned = self.cleaner.clean(&raw);
        if cleaned.is_empty() {
            return Err(Error::Extraction(format!(
                "{}: no text content could be extracted",
                path.display()
            )));
        }
        Ok(cleaned)
    }
}

/// Normalizes whitespace in extracted text.
pub struct TextCleaner {
    blank_runs: Regex,
    space_runs: Regex,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self {
            blank_runs: Regex::new(r"\n{3,}").expect("blank-run pattern is valid"),
            space_runs: Regex::new(r"[^\S\n]+").expect("space-run pattern is valid"),
        }
    }

    /// Collapse runs of blank lines to one, collapse repeated spaces while
    /// preserving newlines, and trim.
    pub fn clean(&self, raw: &str) -> String {
        let text = self.blank_runs.replace_all(raw, "\n\n");
        let text = self.space_runs.replace_all(&text, " ");
        text.trim().to_string()
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_collapses_blank_lines() {
        let cleaner = TextCleaner::new();
        assert_eq!(
            cleaner.clean("first\n\n\n\n\nsecond"),
            "first\n\nsecond"
        );
    }

    #[test]
    fn test_clean_collapses_spaces_preserves_newlines() {
        let cleaner = TextCleaner::new();
        assert_eq!(
            cleaner.clean("a   b\t c\nnext  line"),
            "a b c\nnext line"
        );
    }

    #[test]
    fn test_clean_trims() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.clean("\n\n  body  \n\n"), "body");
    }

    #[tokio::test]
    async fn test_missing_file_is_extraction_error() {
        let extractor = PdfTextExtractor::new();
        let err = extractor
            .extract_text(Path::new("/nonexistent/meeting.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
