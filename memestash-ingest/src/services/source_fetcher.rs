//! Image source abstraction
//!
//! A source turns one input URL into image files in the upload directory.
//! Failures that only affect part of the input are reported in
//! `FetchReport::errors`; a `FetchError` means nothing usable came back.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Fetch failure for a whole input URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}

/// One image written to the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub path: PathBuf,
    pub filename: String,
    /// URL recorded as the record's provenance
    pub source_url: String,
}

/// Images downloaded from one input URL, plus non-fatal errors
#[derive(Debug, Default)]
pub struct FetchReport {
    pub images: Vec<FetchedImage>,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Short label stored in placeholder tags ("discord", "remote")
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str) -> Result<FetchReport, FetchError>;
}

/// Filename extension for a MIME content type (`image/jpeg` → `jpg`)
pub(crate) fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        _ => None,
    }
}

/// Timestamp embedded in generated filenames
pub(crate) fn filename_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Write `bytes` to a new file `{stem}.{ext}` in `dir`, never replacing an existing file
///
/// On a name collision a short random suffix is added to the stem. Returns
/// the path and the filename actually used.
pub(crate) async fn save_new_file(
    dir: &Path,
    stem: &str,
    ext: &str,
    bytes: &[u8],
) -> std::io::Result<(PathBuf, String)> {
    let mut filename = format!("{}.{}", stem, ext);
    loop {
        let path = dir.join(&filename);
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok((path, filename));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let suffix = Uuid::new_v4().simple().to_string();
                filename = format!("{}_{}.{}", stem, &suffix[..8], ext);
            }
            Err(e) => return Err(e),
        }
    }
}
