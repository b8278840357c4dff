//! Content-addressed artifact store.
//!
//! Layout under the artifacts root:
//! - `html/<hash16>.html`: hash of the URL, one canonical file per URL
//! - `pdf/<hash16>.pdf`: hash of the PDF bytes
//! - `txt/<hash16>.txt`: hash of the extracted text
//!
//! `hash16` is the first 16 hex chars of a SHA-256 digest.

use std::path::{Path, PathBuf};

use corpusfetch_shared::{CorpusError, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Length of the hash prefix used in artifact filenames.
pub const HASH_PREFIX_LEN: usize = 16;

/// An artifact to persist.
#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    /// Raw HTML, named after the URL it came from.
    Html { url: &'a str, html: &'a str },
    /// Raw PDF bytes, named after their own digest.
    Pdf(&'a [u8]),
    /// Extracted text, named after its own digest.
    Text(&'a str),
}

/// Where an artifact landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    /// Full SHA-256 of the name source (URL for HTML, payload otherwise).
    pub sha256: String,
    /// `false` when a content-addressed file already existed.
    pub written: bool,
}

/// Filesystem store rooted at an artifacts directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Create `html/`, `pdf/` and `txt/` under `root` if absent.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["html", "pdf", "txt"] {
            let dir = root.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| CorpusError::io(&dir, e))?;
        }
        Ok(Self { root })
    }

    /// Persist an artifact and return its path.
    pub fn save(&self, artifact: Artifact<'_>) -> Result<StoredArtifact> {
        match artifact {
            Artifact::Html { url, html } => {
                let sha256 = sha256_hex(url.as_bytes());
                let path = self.path_for("html", &sha256, "html");
                write_file(&path, html.as_bytes())?;
                Ok(StoredArtifact {
                    path,
                    sha256,
                    written: true,
                })
            }
            Artifact::Pdf(bytes) => self.save_addressed("pdf", "pdf", bytes),
            Artifact::Text(text) => self.save_addressed("txt", "txt", text.as_bytes()),
        }
    }

    fn save_addressed(&self, dir: &str, ext: &str, bytes: &[u8]) -> Result<StoredArtifact> {
        let sha256 = sha256_hex(bytes);
        let path = self.path_for(dir, &sha256, ext);

        // Same name means same bytes.
        let written = if path.is_file() {
            debug!(path = %path.display(), "artifact already stored");
            false
        } else {
            write_file(&path, bytes)?;
            true
        };

        Ok(StoredArtifact {
            path,
            sha256,
            written,
        })
    }

    fn path_for(&self, dir: &str, sha256: &str, ext: &str) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}.{ext}", &sha256[..HASH_PREFIX_LEN]))
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| CorpusError::io(path, e))
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
