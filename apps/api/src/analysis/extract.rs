//! PDF text extraction behind a swappable trait.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

/// Maximum number of characters of resume text kept and sent to the model.
pub const MAX_TEXT_CHARS: usize = 100_000;

/// Stand-in text for PDFs with no extractable text layer (e.g. scanned images).
pub const NO_TEXT_PLACEHOLDER: &str = "[No extractable text detected in PDF]";

const SOFT_HYPHEN: char = '\u{00AD}';

/// Turns uploaded document bytes into raw text.
///
/// Carried in `AppState` as `Arc<dyn TextExtractor>`.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Default extractor backed by `pdf-extract`. Parsing is CPU-bound, so it runs
/// on the blocking pool; a panic inside the parser surfaces as an error.
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let owned = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&owned).map_err(|e| anyhow!("{e}"))
        })
        .await
        .context("PDF parser task failed")?
    }
}

/// Normalizes extracted text: drops soft hyphens, trailing whitespace and blank
/// lines, then caps the length. Empty results become [`NO_TEXT_PLACEHOLDER`].
pub fn clean_extracted_text(raw: &str) -> String {
    let without_hyphens: String = raw.chars().filter(|&c| c != SOFT_HYPHEN).collect();

    let cleaned = without_hyphens
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return NO_TEXT_PLACEHOLDER.to_string();
    }

    match cleaned.char_indices().nth(MAX_TEXT_CHARS) {
        Some((cut, _)) => cleaned[..cut].to_string(),
        None => cleaned.to_string(),
    }
}
