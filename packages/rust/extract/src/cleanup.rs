//! Text normalization passes.
//!
//! Each pass is a function over text applied by the extractors in sequence.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Pass: collapse inline whitespace
// ---------------------------------------------------------------------------

/// Collapse every whitespace run (including newlines) into one space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Pass: strip blank lines
// ---------------------------------------------------------------------------

/// Trim every line and drop the empty ones.
pub(crate) fn strip_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass: join content blocks
// ---------------------------------------------------------------------------

/// One block per line, dropping empties and exact repeats.
pub(crate) fn join_blocks(blocks: &[String]) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    blocks
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty() && seen.insert(*b))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass: PDF text layout
// ---------------------------------------------------------------------------

/// Drop form feeds and trailing spaces, and cap blank-line runs at one.
pub(crate) fn normalize_pdf_text(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let unfed = text.replace('\u{000C}', "\n");
    let trimmed = unfed
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    MULTI_BLANK_RE
        .replace_all(&trimmed, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  hello \n\t world  "), "hello world");
        assert_eq!(collapse_whitespace(" \n "), "");
    }

    #[test]
    fn test_strip_blank_lines() {
        let input = "  Title \n\n\n   \nBody line\n  tail  ";
        assert_eq!(strip_blank_lines(input), "Title\nBody line\ntail");
    }

    #[test]
    fn test_join_blocks_dedupes() {
        let blocks = vec![
            "Intro".to_string(),
            "  ".to_string(),
            "Share this".to_string(),
            "Body".to_string(),
            "Share this".to_string(),
        ];
        assert_eq!(join_blocks(&blocks), "Intro\nShare this\nBody");
    }

    #[test]
    fn test_normalize_pdf_text() {
        let input = "Page one   \n\n\n\n\u{000C}Page two\n";
        assert_eq!(normalize_pdf_text(input), "Page one\n\nPage two");
    }
}
