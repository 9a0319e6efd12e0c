//! Telegram Bot channel for streamcap.
//!
//! Uses the Telegram Bot API with long-polling (no webhook required).
//! [`api::TelegramApi`] is the HTTP client, [`polling::run_polling_loop`]
//! turns incoming bot commands into [`streamcap_types::InboundCommand`]
//! values, and the [`streamcap_capture::sink::ChatSink`] impl lets the
//! delivery pipeline ship files through this channel.

pub mod api;
pub mod polling;
pub mod types;

use std::path::Path;

use api::TelegramApi;
use types::SendMessageParams;

#[async_trait::async_trait]
impl streamcap_capture::sink::ChatSink for TelegramApi {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        // Try Markdown first, fall back to plain text
        let result = self
            .send_message(&SendMessageParams {
                chat_id,
                text: text.to_string(),
                parse_mode: Some("Markdown".into()),
            })
            .await;

        if result.is_err() {
            self.send_message(&SendMessageParams {
                chat_id,
                text: text.to_string(),
                parse_mode: None,
            })
            .await?;
        }

        Ok(())
    }

    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> anyhow::Result<()> {
        TelegramApi::send_video(self, chat_id, path, caption).await?;
        Ok(())
    }
}
