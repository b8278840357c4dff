//! PDF text extraction.

use tracing::{debug, instrument};

use corpusfetch_shared::{CorpusError, Result};

use crate::ExtractContext;
use crate::cleanup;

/// Extract the text layer of a PDF document.
#[instrument(skip_all, fields(url = %ctx.url, bytes = bytes.len()))]
pub fn text_layer(bytes: &[u8], ctx: &ExtractContext<'_>) -> Result<String> {
    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| CorpusError::parse(format!("pdf text extraction failed: {e}")))?;

    let text = cleanup::normalize_pdf_text(&raw);
    debug!(chars = text.len(), "pdf text extracted");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let ctx = ExtractContext {
            url: "https://example.com/report.pdf",
        };
        let err = text_layer(b"this is not a pdf", &ctx).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { .. }));
    }
}
