//! Outbound chat seam for the delivery pipeline.

use std::path::Path;

/// Destination for delivery output. Implemented by the Telegram API client;
/// tests substitute their own.
#[async_trait::async_trait]
pub trait ChatSink: Send + Sync {
    /// Send a plain text message to the chat.
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;

    /// Upload a local video file to the chat with a caption.
    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> anyhow::Result<()>;
}
