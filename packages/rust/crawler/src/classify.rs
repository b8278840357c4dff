//! HTML vs PDF classification.

use std::sync::LazyLock;

use regex::Regex;

use corpusfetch_shared::ContentKind;

/// Decide the payload kind. The declared content type is checked before the URL suffix.
pub fn classify(content_type: Option<&str>, url: &str) -> ContentKind {
    static PDF_SUFFIX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\.pdf($|\?)").expect("valid regex"));

    let declared_pdf = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
        .unwrap_or(false);

    if declared_pdf || PDF_SUFFIX_RE.is_match(&url.to_lowercase()) {
        ContentKind::Pdf
    } else {
        ContentKind::Html
    }
}
