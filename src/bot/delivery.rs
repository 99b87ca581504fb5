//! Media delivery: remote-URL references for direct replies, local
//! download-and-re-upload for edits of inline placeholders.
//!
//! Failures never escape this module as errors — every path collapses to a
//! [`DeliveryOutcome`] so the coordinator can always produce a user-visible
//! message.

use crate::config::DEFAULT_VIDEO_CAPTION;
use crate::resolver::MediaDescriptor;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, InputMedia, InputMediaVideo};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where the resolved media must be delivered.
#[derive(Debug, Clone)]
pub enum DeliveryContext {
    /// Reply in a chat; the remote URL is referenced directly
    DirectReply {
        /// Target chat
        chat_id: ChatId,
    },
    /// Edit a previously sent inline placeholder; requires re-upload
    EditedSuggestion {
        /// Opaque editable-message handle from the chat platform
        inline_message_id: String,
    },
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The media reached the user
    Delivered,
    /// The descriptor carried no video URL; nothing was attempted
    NoVideoAvailable,
    /// Fetching the media bytes failed
    DownloadFailed,
    /// The chat platform rejected the send or edit
    SendFailed,
}

/// Outbound media operations against the chat platform.
///
/// A trait seam so delivery logic is testable without Telegram.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Send a video by remote URL reference with a caption.
    async fn send_remote_video(&self, chat_id: ChatId, video_url: &str, caption: &str)
        -> Result<()>;

    /// Replace an inline placeholder with a locally stored video file.
    async fn replace_with_video_file(&self, inline_message_id: &str, path: &Path) -> Result<()>;
}

/// [`MediaSink`] backed by the Telegram Bot API.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    /// Wrap a bot instance.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MediaSink for TelegramSink {
    async fn send_remote_video(
        &self,
        chat_id: ChatId,
        video_url: &str,
        caption: &str,
    ) -> Result<()> {
        let url = video_url.parse::<url::Url>()?;
        self.bot
            .send_video(chat_id, InputFile::url(url))
            .caption(caption.to_string())
            .await?;
        Ok(())
    }

    async fn replace_with_video_file(&self, inline_message_id: &str, path: &Path) -> Result<()> {
        // Remote-URL video references are not accepted on message edits,
        // hence the local file re-upload.
        let media = InputMedia::Video(InputMediaVideo::new(InputFile::file(path.to_path_buf())));
        self.bot
            .edit_message_media_inline(inline_message_id.to_string(), media)
            .await?;
        Ok(())
    }
}

/// A locally downloaded media artifact, removed when dropped.
///
/// Exclusively owned by the delivery call that created it; the file is
/// gone before that call returns, whatever the upload outcome.
#[derive(Debug)]
pub struct DownloadedMediaFile {
    path: PathBuf,
    byte_size: u64,
}

impl DownloadedMediaFile {
    /// Location of the artifact on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the downloaded payload.
    #[must_use]
    pub const fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

impl Drop for DownloadedMediaFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove media artifact");
        }
    }
}

/// Delivers a [`MediaDescriptor`] through a [`MediaSink`].
pub struct DeliveryAdapter {
    sink: std::sync::Arc<dyn MediaSink>,
    http: reqwest::Client,
    download_dir: PathBuf,
}

impl DeliveryAdapter {
    /// Create an adapter writing ephemeral files under `download_dir`.
    #[must_use]
    pub fn new(sink: std::sync::Arc<dyn MediaSink>, download_dir: PathBuf) -> Self {
        Self {
            sink,
            http: reqwest::Client::new(),
            download_dir,
        }
    }

    /// Deliver a descriptor to its context. Never errors; see
    /// [`DeliveryOutcome`].
    pub async fn deliver(
        &self,
        descriptor: &MediaDescriptor,
        context: &DeliveryContext,
    ) -> DeliveryOutcome {
        match context {
            DeliveryContext::DirectReply { chat_id } => {
                self.deliver_direct(descriptor, *chat_id).await
            }
            DeliveryContext::EditedSuggestion { inline_message_id } => {
                self.deliver_edited(descriptor, inline_message_id).await
            }
        }
    }

    async fn deliver_direct(
        &self,
        descriptor: &MediaDescriptor,
        chat_id: ChatId,
    ) -> DeliveryOutcome {
        let Some(video_url) = descriptor.video_url.as_deref() else {
            return DeliveryOutcome::NoVideoAvailable;
        };
        let caption = descriptor.title.as_deref().unwrap_or(DEFAULT_VIDEO_CAPTION);

        match self.sink.send_remote_video(chat_id, video_url, caption).await {
            Ok(()) => {
                info!(%chat_id, "sent video by remote reference");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(%chat_id, error = %e, "remote video send rejected");
                DeliveryOutcome::SendFailed
            }
        }
    }

    async fn deliver_edited(
        &self,
        descriptor: &MediaDescriptor,
        inline_message_id: &str,
    ) -> DeliveryOutcome {
        let Some(video_url) = descriptor.video_url.as_deref() else {
            return DeliveryOutcome::NoVideoAvailable;
        };

        let file = match self.download(video_url).await {
            Ok(file) => file,
            Err(e) => {
                warn!(video_url, error = %e, "media download failed");
                return DeliveryOutcome::DownloadFailed;
            }
        };

        self.upload_and_cleanup(file, inline_message_id).await
    }

    /// Re-upload a local artifact; the file is removed on both outcomes.
    async fn upload_and_cleanup(
        &self,
        file: DownloadedMediaFile,
        inline_message_id: &str,
    ) -> DeliveryOutcome {
        debug!(
            path = %file.path().display(),
            byte_size = file.byte_size(),
            "re-uploading downloaded media"
        );
        match self
            .sink
            .replace_with_video_file(inline_message_id, file.path())
            .await
        {
            Ok(()) => {
                info!(inline_message_id, "placeholder replaced with video");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(inline_message_id, error = %e, "placeholder media edit failed");
                DeliveryOutcome::SendFailed
            }
        }
        // `file` drops here, removing the artifact even after a failed upload
    }

    /// Download media bytes into a uniquely named local file.
    async fn download(&self, video_url: &str) -> Result<DownloadedMediaFile> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self
            .download_dir
            .join(format!("{}.mp4", Uuid::new_v4().simple()));

        let response = self.http.get(video_url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            // A partial file may exist; do not leak it
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        Ok(DownloadedMediaFile {
            path,
            byte_size: bytes.len() as u64,
        })
    }
}
