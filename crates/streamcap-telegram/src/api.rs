//! Telegram Bot API HTTP client.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tokio_util::io::ReaderStream;

use crate::types::{
    ApiResponse, BotInfo, GetUpdatesParams, SendMessageParams, SetMyCommandsParams, TgMessage,
    Update,
};

/// Large uploads get their own generous per-request timeout.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// HTTP client for the Telegram Bot API.
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    /// Create a new API client with the given bot token.
    pub fn new(bot_token: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
        })
    }

    /// Verify the bot token by calling `getMe`.
    pub async fn get_me(&self) -> anyhow::Result<BotInfo> {
        let resp: ApiResponse<BotInfo> = self
            .client
            .get(format!("{}/getMe", self.base_url))
            .send()
            .await
            .context("getMe request failed")?
            .json()
            .await
            .context("getMe response parse failed")?;

        if !resp.ok {
            bail!(
                "getMe failed: {}",
                resp.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        resp.result.context("getMe returned no result")
    }

    /// Long-poll for updates.
    pub async fn get_updates(&self, params: &GetUpdatesParams) -> anyhow::Result<Vec<Update>> {
        let resp: ApiResponse<Vec<Update>> = self
            .client
            .post(format!("{}/getUpdates", self.base_url))
            .json(params)
            .send()
            .await
            .context("getUpdates request failed")?
            .json()
            .await
            .context("getUpdates response parse failed")?;

        if !resp.ok {
            bail!(
                "getUpdates failed: {}",
                resp.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(resp.result.unwrap_or_default())
    }

    /// Send a text message.
    pub async fn send_message(&self, params: &SendMessageParams) -> anyhow::Result<TgMessage> {
        let resp: ApiResponse<TgMessage> = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(params)
            .send()
            .await
            .context("sendMessage request failed")?
            .json()
            .await
            .context("sendMessage response parse failed")?;

        if !resp.ok {
            bail!(
                "sendMessage failed: {}",
                resp.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        resp.result.context("sendMessage returned no result")
    }

    /// Register bot commands in the menu.
    pub async fn set_my_commands(&self, params: &SetMyCommandsParams) -> anyhow::Result<()> {
        let resp: ApiResponse<bool> = self
            .client
            .post(format!("{}/setMyCommands", self.base_url))
            .json(params)
            .send()
            .await
            .context("setMyCommands request failed")?
            .json()
            .await
            .context("setMyCommands response parse failed")?;

        if !resp.ok {
            bail!(
                "setMyCommands failed: {}",
                resp.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(())
    }

    /// Upload a local video file via `sendVideo`, streaming the body.
    pub async fn send_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> anyhow::Result<TgMessage> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("stat {}", path.display()))?
            .len();

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.ts")
            .to_string();

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(file_name)
            .mime_str("video/mp2t")
            .context("invalid mime type")?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", "Markdown")
            .part("video", part);

        let resp: ApiResponse<TgMessage> = self
            .client
            .post(format!("{}/sendVideo", self.base_url))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .context("sendVideo request failed")?
            .json()
            .await
            .context("sendVideo response parse failed")?;

        if !resp.ok {
            bail!(
                "sendVideo failed: {}",
                resp.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        resp.result.context("sendVideo returned no result")
    }
}
