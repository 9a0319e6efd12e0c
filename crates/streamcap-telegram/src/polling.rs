//! Telegram long-polling loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use streamcap_types::InboundCommand;

use crate::api::TelegramApi;
use crate::types::{GetUpdatesParams, TgMessage};

/// Run the long-polling loop, converting bot-command messages into
/// [`InboundCommand`] values on `sender`.
///
/// Non-command messages are ignored. Exits when `cancel` is cancelled or
/// the `sender` is closed.
pub async fn run_polling_loop(
    api: &TelegramApi,
    sender: mpsc::Sender<InboundCommand>,
    cancel: CancellationToken,
) {
    let mut offset: Option<i64> = None;
    let mut backoff = Duration::from_secs(1);
    let max_backoff = Duration::from_secs(30);

    info!("Telegram polling loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let params = GetUpdatesParams {
            offset,
            timeout: Some(30),
            allowed_updates: Some(vec!["message".into()]),
        };

        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.get_updates(&params) => result,
        };

        match updates {
            Ok(updates) => {
                backoff = Duration::from_secs(1);

                for update in updates {
                    offset = Some(update.update_id + 1);

                    let Some(msg) = update.message else {
                        continue;
                    };
                    let Some(cmd) = command_from_message(&msg) else {
                        debug!(update_id = update.update_id, "Skipping non-command message");
                        continue;
                    };

                    debug!(
                        update_id = update.update_id,
                        command = cmd.command,
                        "Forwarding Telegram command"
                    );

                    if sender.send(cmd).await.is_err() {
                        info!("Inbound channel closed, stopping polling");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(backoff_secs = backoff.as_secs(), "getUpdates error: {e}");

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {},
                }

                backoff = (backoff * 2).min(max_backoff);
            }
        }
    }

    info!("Telegram polling loop stopped");
}

/// Extract a bot command from a message, if it carries one.
///
/// A command is a message whose text starts with a `bot_command` entity at
/// offset 0 (e.g. `/record ...` or `/record@botname ...`).
pub fn command_from_message(msg: &TgMessage) -> Option<InboundCommand> {
    let text = msg.text.as_deref()?;
    let is_command = msg
        .entities
        .iter()
        .any(|e| e.entity_type == "bot_command" && e.offset == 0);
    if !is_command {
        return None;
    }

    let mut tokens = text.split_whitespace();
    let command = tokens
        .next()?
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_string();
    if command.is_empty() {
        return None;
    }

    Some(InboundCommand {
        command,
        args: tokens.map(String::from).collect(),
        chat_id: msg.chat.id,
        sender_id: msg.from.as_ref().map(|u| u.id).unwrap_or(msg.chat.id),
        sender_name: msg.from.as_ref().map(|u| u.display_name()),
        timestamp: msg.date * 1000,
    })
}
