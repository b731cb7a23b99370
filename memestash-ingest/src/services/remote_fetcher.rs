//! Remote image URL fetcher

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

use crate::services::source_fetcher::{
    extension_for_content_type, filename_timestamp, save_new_file, FetchError, FetchReport,
    FetchedImage, ImageSource,
};

const URL_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub struct RemoteFetcher {
    http_client: reqwest::Client,
    upload_dir: PathBuf,
    timeout: Duration,
}

impl RemoteFetcher {
    pub fn new(http_client: reqwest::Client, upload_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            http_client,
            upload_dir: upload_dir.into(),
            timeout,
        }
    }
}

/// Pick the file extension: content type first, then URL suffix, then `jpg`
fn choose_extension(content_type: Option<&str>, url: &str) -> String {
    if let Some(ext) = content_type.and_then(extension_for_content_type) {
        return ext.to_string();
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| URL_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string())
}

/// `remote_{timestamp}_{8 hex chars of SHA-256(url)}`
fn remote_stem(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    format!("remote_{}_{}", filename_timestamp(), &digest[..8])
}

#[async_trait]
impl ImageSource for RemoteFetcher {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn fetch(&self, url: &str) -> Result<FetchReport, FetchError> {
        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        let ext = choose_extension(content_type.as_deref(), url);
        let (path, filename) = save_new_file(&self.upload_dir, &remote_stem(url), &ext, &bytes).await?;
        tracing::info!(url, filename = %filename, bytes = bytes.len(), "Saved remote image");

        Ok(FetchReport {
            images: vec![FetchedImage {
                path,
                filename,
                source_url: url.to_string(),
            }],
            errors: Vec::new(),
        })
    }
}
