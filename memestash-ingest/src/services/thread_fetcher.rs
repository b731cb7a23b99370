//! Discord thread image fetcher
//!
//! Pages through a channel or thread's message history and downloads every
//! image attachment into the upload directory.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::source_fetcher::{
    filename_timestamp, save_new_file, FetchError, FetchReport, FetchedImage, ImageSource,
};

/// Discord's maximum page size for message history
const PAGE_LIMIT: usize = 100;

const DEFAULT_EXTENSION: &str = "jpg";

static THREAD_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"channels/(\d+)/(\d+)(?:/threads/(\d+))?").expect("valid thread URL pattern")
});

/// Ids parsed from a Discord channel/thread URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub server_id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
}

impl ThreadRef {
    pub fn parse(url: &str) -> Option<Self> {
        let caps = THREAD_URL_PATTERN.captures(url)?;
        Some(Self {
            server_id: caps.get(1)?.as_str().to_string(),
            channel_id: caps.get(2)?.as_str().to_string(),
            thread_id: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// Channel whose messages are listed (the thread when present)
    pub fn message_channel_id(&self) -> &str {
        self.thread_id.as_deref().unwrap_or(&self.channel_id)
    }
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    attachments: Vec<DiscordAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscordAttachment {
    id: String,
    filename: String,
    url: String,
    #[serde(default)]
    content_type: Option<String>,
}

impl DiscordAttachment {
    fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }

    /// Extension of the original filename, `jpg` when it has none
    fn extension(&self) -> String {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

pub struct ThreadFetcher {
    http_client: reqwest::Client,
    bot_token: Option<String>,
    api_base: String,
    upload_dir: PathBuf,
    page_delay: Duration,
    download_delay: Duration,
}

impl ThreadFetcher {
    pub fn new(
        http_client: reqwest::Client,
        bot_token: Option<String>,
        api_base: impl Into<String>,
        upload_dir: impl Into<PathBuf>,
        page_delay: Duration,
        download_delay: Duration,
    ) -> Self {
        Self {
            http_client,
            bot_token: bot_token.filter(|t| !t.trim().is_empty()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_dir: upload_dir.into(),
            page_delay,
            download_delay,
        }
    }

    /// Collect image attachments across all history pages
    ///
    /// A failed page stops pagination; what was found so far is kept.
    async fn list_image_attachments(
        &self,
        token: &str,
        channel_id: &str,
        report: &mut FetchReport,
    ) -> Vec<DiscordAttachment> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let mut attachments = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(&url)
                .header("Authorization", format!("Bot {}", token))
                .query(&[("limit", PAGE_LIMIT.to_string())]);
            if let Some(cursor) = &before {
                request = request.query(&[("before", cursor.as_str())]);
            }

            let page: Vec<DiscordMessage> = match self.fetch_page(request, &url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(channel_id, error = %e, "Discord message listing failed");
                    report.errors.push(format!("Discord API error for channel {}: {}", channel_id, e));
                    break;
                }
            };

            let page_len = page.len();
            before = page.last().map(|m| m.id.clone());
            attachments.extend(
                page.into_iter()
                    .flat_map(|m| m.attachments)
                    .filter(DiscordAttachment::is_image),
            );

            if page_len < PAGE_LIMIT {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        attachments
    }

    async fn fetch_page(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Vec<DiscordMessage>, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    async fn download_attachment(
        &self,
        attachment: &DiscordAttachment,
        source_url: &str,
    ) -> Result<FetchedImage, FetchError> {
        let response = self.http_client.get(&attachment.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: attachment.url.clone(),
            });
        }
        let bytes = response.bytes().await?;

        let stem = format!("discord_{}_{}", filename_timestamp(), attachment.id);
        let (path, filename) =
            save_new_file(&self.upload_dir, &stem, &attachment.extension(), &bytes).await?;

        tracing::info!(filename = %filename, bytes = bytes.len(), "Saved Discord image");
        Ok(FetchedImage {
            path,
            filename,
            source_url: source_url.to_string(),
        })
    }
}

#[async_trait]
impl ImageSource for ThreadFetcher {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn fetch(&self, url: &str) -> Result<FetchReport, FetchError> {
        let mut report = FetchReport::default();

        let Some(thread) = ThreadRef::parse(url) else {
            tracing::warn!(url, "Not a Discord channel/thread URL, skipping");
            return Ok(report);
        };

        let Some(token) = self.bot_token.as_deref() else {
            tracing::warn!(url, "No Discord bot token configured, skipping");
            report
                .errors
                .push(format!("No Discord bot token configured, skipped {}", url));
            return Ok(report);
        };

        let channel_id = thread.message_channel_id();
        tracing::info!(channel_id, "Listing Discord messages");

        let attachments = self
            .list_image_attachments(token, channel_id, &mut report)
            .await;
        if attachments.is_empty() {
            tracing::info!(channel_id, "No images found");
            return Ok(report);
        }

        let total = attachments.len();
        for (index, attachment) in attachments.iter().enumerate() {
            tracing::debug!(
                "Downloading image {}/{}: {}",
                index + 1,
                total,
                attachment.filename
            );
            match self.download_attachment(attachment, url).await {
                Ok(image) => report.images.push(image),
                Err(e) => {
                    tracing::error!(filename = %attachment.filename, error = %e, "Attachment download failed");
                    report
                        .errors
                        .push(format!("Failed to download {}: {}", attachment.filename, e));
                }
            }
            tokio::time::sleep(self.download_delay).await;
        }

        tracing::info!(channel_id, downloaded = report.images.len(), total, "Discord fetch complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_url() {
        let r = ThreadRef::parse("https://discord.com/channels/111/222").unwrap();
        assert_eq!(r.server_id, "111");
        assert_eq!(r.message_channel_id(), "222");
        assert!(r.thread_id.is_none());
    }

    #[test]
    fn test_parse_thread_url_prefers_thread() {
        let r = ThreadRef::parse("https://discord.com/channels/111/222/threads/333").unwrap();
        assert_eq!(r.message_channel_id(), "333");
    }

    #[test]
    fn test_parse_rejects_other_urls() {
        assert!(ThreadRef::parse("https://example.com/meme.png").is_none());
        assert!(ThreadRef::parse("").is_none());
    }

    fn attachment(filename: &str, content_type: Option<&str>) -> DiscordAttachment {
        DiscordAttachment {
            id: "9".to_string(),
            filename: filename.to_string(),
            url: "http://cdn/9".to_string(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_attachment_extension() {
        assert_eq!(attachment("cat.PNG", None).extension(), "png");
        assert_eq!(attachment("archive.tar.gz", None).extension(), "gz");
        assert_eq!(attachment("noext", None).extension(), "jpg");
        assert_eq!(attachment("weird.", None).extension(), "jpg");
    }

    #[test]
    fn test_only_image_attachments_selected() {
        assert!(attachment("a.png", Some("image/png")).is_image());
        assert!(!attachment("a.mp4", Some("video/mp4")).is_image());
        assert!(!attachment("a.bin", None).is_image());
    }

    #[tokio::test]
    async fn test_unparseable_url_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ThreadFetcher::new(
            reqwest::Client::new(),
            Some("token".to_string()),
            "http://127.0.0.1:9",
            dir.path(),
            Duration::ZERO,
            Duration::ZERO,
        );

        let report = fetcher.fetch("not a discord url").await.unwrap();
        assert!(report.images.is_empty());
        assert!(report.errors.is_empty());
    }
}
