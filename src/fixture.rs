//! Fixture resource served by the spoofed endpoint

use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Body substituted when the fixture cannot be read
pub const FIXTURE_MISSING_BODY: &str = r#"{"error": "File not found"}"#;

/// Reads the fixture file fresh on every call; nothing is cached, so edits
/// to the file show up on the next request.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    path: PathBuf,
}

impl FixtureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the raw file contents
    pub async fn read(&self) -> io::Result<Bytes> {
        tokio::fs::read(&self.path).await.map(Bytes::from)
    }

    /// Returns the file contents, or [`FIXTURE_MISSING_BODY`] if the file is
    /// missing or unreadable. Never fails.
    pub async fn load_or_fallback(&self) -> Bytes {
        match self.read().await {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Fixture file not found");
                Bytes::from_static(FIXTURE_MISSING_BODY.as_bytes())
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Error reading fixture file");
                Bytes::from_static(FIXTURE_MISSING_BODY.as_bytes())
            }
        }
    }
}
