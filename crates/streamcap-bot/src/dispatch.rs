//! Command dispatcher: authorization gate, argument validation, scheduling.
//!
//! Each invocation moves `Received → Validated → Scheduled` or is rejected
//! with a reply derived from the error kind. Accepted requests are
//! acknowledged immediately and handed to the job registry; the dispatcher
//! never blocks on a capture.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use streamcap_capture::sink::ChatSink;
use streamcap_directory::ChannelDirectory;
use streamcap_types::{Error, InboundCommand, RecordingJob, ScheduleRequest};

use crate::job::{run_job, JobDeps};
use crate::timeparse::parse_time_of_day;

const WELCOME_TEXT: &str = "🌟 *Welcome to the Video Recording Bot!*\n\n\
This bot records video streams at scheduled or instant times.\n\n\
📝 *Commands:*\n\
- `/start` - Welcome message\n\
- `/record URL start_time end_time` - Schedule a recording\n\
- `/rsec URL start_offset duration` - Record in seconds from now\n\
- `/mrr Channel start_time end_time` - Schedule by channel name\n\
- `/mrr_sec Channel start_offset duration` - Channel recording in seconds\n\
- `/jobs` - List capture jobs\n\
- `/cancel JOB_ID` - Cancel a pending job\n\n\
📆 *Example:* `/record http://example.com 10:00 10:05`";

/// A validated schedule command: the request plus its acknowledgment text.
#[derive(Debug)]
pub struct ScheduledCommand {
    pub request: ScheduleRequest,
    pub ack: String,
}

/// Routes inbound commands to their handlers.
pub struct Dispatcher {
    sink: Arc<dyn ChatSink>,
    deps: Arc<JobDeps>,
    directory: Arc<ChannelDirectory>,
    allowed_chat_id: i64,
    tz: FixedOffset,
    work_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(
        sink: Arc<dyn ChatSink>,
        deps: Arc<JobDeps>,
        directory: Arc<ChannelDirectory>,
        allowed_chat_id: i64,
        tz: FixedOffset,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            sink,
            deps,
            directory,
            allowed_chat_id,
            tz,
            work_dir,
        }
    }

    /// Consume inbound commands until `cancel` fires or the channel closes.
    pub async fn run(self, mut rx: mpsc::Receiver<InboundCommand>, cancel: CancellationToken) {
        info!("Dispatcher started");
        loop {
            let cmd = tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            self.handle(cmd).await;
        }
        info!("Dispatcher stopped");
    }

    /// Handle a single command invocation.
    pub async fn handle(&self, cmd: InboundCommand) {
        debug!(command = cmd.command, chat_id = cmd.chat_id, "Handling command");
        match cmd.command.as_str() {
            "start" => self.reply(cmd.chat_id, WELCOME_TEXT).await,
            "record" | "rsec" | "mrr" | "mrr_sec" => self.handle_schedule(cmd).await,
            "jobs" => self.handle_jobs(cmd).await,
            "cancel" => self.handle_cancel(cmd).await,
            other => debug!(command = other, "Ignoring unknown command"),
        }
    }

    async fn handle_schedule(&self, cmd: InboundCommand) {
        if !self.authorize(&cmd).await {
            return;
        }

        let now = Utc::now().with_timezone(&self.tz);
        let scheduled = match build_request(&cmd, now, self.tz, &self.directory).await {
            Ok(scheduled) => scheduled,
            Err(e) => {
                debug!(command = cmd.command, "Rejected: {e}");
                self.reply(cmd.chat_id, &e.user_message()).await;
                return;
            }
        };

        let job = RecordingJob::from_request(scheduled.request, now, &self.work_dir);
        info!(
            job_id = job.id,
            url = job.request.source_url,
            wait_secs = job.wait_secs,
            duration_secs = job.duration_secs,
            "Capture scheduled"
        );

        self.reply(cmd.chat_id, &scheduled.ack).await;

        let cancel = self.deps.registry.insert(&job.id).await;
        tokio::spawn(run_job(self.deps.clone(), job, cancel));
    }

    async fn handle_jobs(&self, cmd: InboundCommand) {
        if !self.authorize(&cmd).await {
            return;
        }
        let jobs = self.deps.registry.list().await;
        if jobs.is_empty() {
            self.reply(cmd.chat_id, "No capture jobs yet.").await;
            return;
        }
        let mut text = String::from("📋 *Capture jobs:*\n");
        for (id, status) in jobs {
            text.push_str(&format!("- `{id}` — {status}\n"));
        }
        self.reply(cmd.chat_id, &text).await;
    }

    async fn handle_cancel(&self, cmd: InboundCommand) {
        if !self.authorize(&cmd).await {
            return;
        }
        let Some(id) = cmd.args.first() else {
            let err = Error::InvalidArguments("usage: /cancel JOB_ID".into());
            self.reply(cmd.chat_id, &err.user_message()).await;
            return;
        };
        if self.deps.registry.cancel(id).await {
            self.reply(cmd.chat_id, &format!("🛑 Cancelled job `{id}`.")).await;
        } else {
            self.reply(cmd.chat_id, &format!("❌ No cancellable job `{id}`.")).await;
        }
    }

    /// The authorization gate, evaluated before command semantics.
    async fn authorize(&self, cmd: &InboundCommand) -> bool {
        if cmd.chat_id == self.allowed_chat_id {
            return true;
        }
        warn!(
            chat_id = cmd.chat_id,
            sender_id = cmd.sender_id,
            command = cmd.command,
            "Command from unauthorized chat"
        );
        self.reply(cmd.chat_id, &Error::Unauthorized.user_message()).await;
        false
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.sink.send_text(chat_id, text).await {
            warn!(chat_id, "Failed to send reply: {e:#}");
        }
    }
}

/// Build a validated [`ScheduleRequest`] from a schedule command.
///
/// The four variants differ only in how the target URL and the window are
/// derived; they all pass through [`validate_window`].
pub async fn build_request(
    cmd: &InboundCommand,
    now: DateTime<FixedOffset>,
    tz: FixedOffset,
    directory: &ChannelDirectory,
) -> Result<ScheduledCommand, Error> {
    match cmd.command.as_str() {
        "record" => {
            let [url, start_str, end_str] = require_args(&cmd.args, "/record URL start_time end_time")?;
            let (start, end) = parse_window(start_str, end_str, tz, now)?;
            Ok(ScheduledCommand {
                request: request(cmd, url.clone(), start, end),
                ack: format!(
                    "✅ *Schedule Set!*\n\n🕐 From: `{start_str}`\n🕑 To: `{end_str}`"
                ),
            })
        }
        "mrr" => {
            let [channel, start_str, end_str] =
                require_args(&cmd.args, "/mrr Channel start_time end_time")?;
            let url = directory
                .lookup(channel)
                .await
                .ok_or_else(|| Error::UnknownChannel(channel.clone()))?;
            let (start, end) = parse_window(start_str, end_str, tz, now)?;
            Ok(ScheduledCommand {
                request: request(cmd, url, start, end),
                ack: format!(
                    "✅ *Scheduled for channel:* `{channel}`\n🕐 From: `{start_str}`\n🕑 To: `{end_str}`"
                ),
            })
        }
        "rsec" => {
            let [url, offset_str, duration_str] =
                require_args(&cmd.args, "/rsec URL start_offset duration")?;
            let (offset, duration) = parse_offsets(offset_str, duration_str)?;
            let start = now + chrono::Duration::seconds(offset);
            let end = start + chrono::Duration::seconds(duration);
            validate_window(start, end, now)?;
            Ok(ScheduledCommand {
                request: request(cmd, url.clone(), start, end),
                ack: format!(
                    "⚡ *Recording will start in* `{offset}s` *for* `{duration}s`..."
                ),
            })
        }
        "mrr_sec" => {
            // The channel name may contain spaces; the last two tokens are
            // always offset and duration.
            if cmd.args.len() < 3 {
                return Err(Error::InvalidArguments(
                    "usage: /mrr_sec Channel start_offset duration".into(),
                ));
            }
            let n = cmd.args.len();
            let channel = cmd.args[..n - 2].join(" ");
            let (offset, duration) = parse_offsets(&cmd.args[n - 2], &cmd.args[n - 1])?;
            let url = directory
                .lookup(&channel)
                .await
                .ok_or_else(|| Error::UnknownChannel(channel.clone()))?;
            let start = now + chrono::Duration::seconds(offset);
            let end = start + chrono::Duration::seconds(duration);
            validate_window(start, end, now)?;
            Ok(ScheduledCommand {
                request: request(cmd, url, start, end),
                ack: format!(
                    "⚡ *Recording channel:* `{channel}`\nStarts in `{offset}s` for `{duration}s`..."
                ),
            })
        }
        other => Err(Error::InvalidArguments(format!("unknown command: {other}"))),
    }
}

fn request(
    cmd: &InboundCommand,
    source_url: String,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> ScheduleRequest {
    ScheduleRequest {
        source_url,
        start,
        end,
        requester_id: cmd.sender_id,
        chat_id: cmd.chat_id,
    }
}

fn require_args<'a>(args: &'a [String], usage: &str) -> Result<[&'a String; 3], Error> {
    match args {
        [a, b, c, ..] => Ok([a, b, c]),
        _ => Err(Error::InvalidArguments(format!("usage: {usage}"))),
    }
}

fn parse_window(
    start_str: &str,
    end_str: &str,
    tz: FixedOffset,
    now: DateTime<FixedOffset>,
) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), Error> {
    let today = now.date_naive();
    let start = parse_time_of_day(start_str, tz, today)?;
    let end = parse_time_of_day(end_str, tz, today)?;
    validate_window(start, end, now)?;
    Ok((start, end))
}

fn parse_offsets(offset_str: &str, duration_str: &str) -> Result<(i64, i64), Error> {
    let offset = parse_seconds(offset_str, "start_offset")?;
    let duration = parse_seconds(duration_str, "duration")?;
    Ok((offset, duration))
}

fn parse_seconds(value: &str, what: &str) -> Result<i64, Error> {
    value
        .parse::<i64>()
        .map_err(|_| Error::InvalidArguments(format!("{what} must be a number, got `{value}`")))
}

/// Both schedule invariants: `end > start`, `start` strictly in the future.
pub fn validate_window(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Result<(), Error> {
    if end <= start {
        return Err(Error::ScheduleOrdering(
            "End time must be after start time.".into(),
        ));
    }
    if start <= now {
        return Err(Error::ScheduleOrdering(format!(
            "Scheduled time is in the past. Now: {}",
            now.format("%I:%M %p")
        )));
    }
    Ok(())
}
