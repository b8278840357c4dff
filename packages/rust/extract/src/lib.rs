//! Text extraction for fetched payloads.
//!
//! Each payload kind has an [`ExtractionChain`]: an ordered list of
//! extractors tried until one yields non-empty text. An extractor may fail
//! or panic; either counts as "no text" and the chain moves on.

pub(crate) mod cleanup;
pub mod html;
pub mod pdf;

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, warn};

use corpusfetch_shared::{ContentKind, Result};

/// Per-call information passed to every extractor.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    /// Source URL, for diagnostics.
    pub url: &'a str,
}

/// An extractor: raw payload in, plain text out.
pub type ExtractFn = fn(&[u8], &ExtractContext<'_>) -> Result<String>;

/// Result of running a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Extracted text, empty when every step came up dry.
    pub text: String,
    /// Name of the step that produced `text`.
    pub extractor: Option<&'static str>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Ordered extractors for one payload kind.
pub struct ExtractionChain {
    steps: Vec<(&'static str, ExtractFn)>,
}

impl ExtractionChain {
    /// Main-content extraction, then full visible text.
    pub fn html() -> Self {
        Self {
            steps: vec![
                ("main_content", html::main_content as ExtractFn),
                ("full_text", html::full_text as ExtractFn),
            ],
        }
    }

    /// PDF text layer only.
    pub fn pdf() -> Self {
        Self {
            steps: vec![("pdf_text", pdf::text_layer as ExtractFn)],
        }
    }

    /// The chain for `kind`.
    pub fn for_kind(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Html => Self::html(),
            ContentKind::Pdf => Self::pdf(),
        }
    }

    /// Build a chain from explicit steps.
    pub fn from_steps(steps: Vec<(&'static str, ExtractFn)>) -> Self {
        Self { steps }
    }

    /// Run each step in order and return the first non-empty text.
    pub fn run(&self, bytes: &[u8], ctx: &ExtractContext<'_>) -> Extracted {
        for (name, step) in &self.steps {
            let outcome = catch_unwind(AssertUnwindSafe(|| step(bytes, ctx)));
            match outcome {
                Ok(Ok(text)) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        debug!(url = ctx.url, extractor = *name, "text extracted");
                        return Extracted {
                            text: text.to_string(),
                            extractor: Some(*name),
                        };
                    }
                    debug!(url = ctx.url, extractor = *name, "extractor found no text");
                }
                Ok(Err(e)) => {
                    debug!(url = ctx.url, extractor = *name, error = %e, "extractor failed");
                }
                Err(_) => {
                    warn!(url = ctx.url, extractor = *name, "extractor panicked");
                }
            }
        }

        Extracted {
            text: String::new(),
            extractor: None,
        }
    }
}

/// Extract text from `bytes` using the default chain for `kind`.
pub fn extract_text(kind: ContentKind, bytes: &[u8], url: &str) -> Extracted {
    ExtractionChain::for_kind(kind).run(bytes, &ExtractContext { url })
}
