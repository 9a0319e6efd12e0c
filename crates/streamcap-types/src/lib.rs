use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ──────────────────── Error Taxonomy ────────────────────

/// Closed set of failure kinds for command handling and job execution.
///
/// User-facing replies are derived from the kind via [`Error::user_message`],
/// never from raw internal diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    #[error("chat is not on the allow list")]
    Unauthorized,
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("invalid schedule window: {0}")]
    ScheduleOrdering(String),
    #[error("encoder process failed: {0}")]
    ProcessExecution(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl Error {
    /// Chat reply text for this error kind.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthorized => "🚫 Not allowed here.".to_string(),
            Error::InvalidArguments(detail) => format!("❌ Bad arguments: {detail}"),
            Error::InvalidTimeFormat(input) => format!("❌ Invalid time format: `{input}`"),
            Error::UnknownChannel(name) => format!("❌ Invalid channel name: `{name}`"),
            Error::ScheduleOrdering(detail) => format!("⏰ {detail}"),
            Error::ProcessExecution(_) => "❌ Recording failed.".to_string(),
            Error::Delivery(_) => "❌ Error sending video.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ──────────────────── Schedule Types ────────────────────

/// A validated request to capture a stream over a time window.
///
/// Invariants (enforced by the dispatcher before construction):
/// `end > start` and `start` strictly in the future at validation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Stream source URL.
    pub source_url: String,
    /// Capture window start.
    pub start: DateTime<FixedOffset>,
    /// Capture window end.
    pub end: DateTime<FixedOffset>,
    /// Telegram user id that issued the command.
    pub requester_id: i64,
    /// Chat to deliver the artifact to.
    pub chat_id: i64,
}

/// A scheduled capture derived from a [`ScheduleRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingJob {
    /// Unique job id.
    pub id: String,
    /// The originating request.
    pub request: ScheduleRequest,
    /// Seconds to sleep before the capture starts.
    pub wait_secs: i64,
    /// Capture duration in seconds.
    pub duration_secs: i64,
    /// Local path the encoder writes to.
    pub output_path: PathBuf,
}

impl RecordingJob {
    /// Derive a job from a request at scheduling time.
    ///
    /// The output filename encodes the requester id and the wall-clock
    /// timestamp, so concurrent jobs get distinct paths.
    pub fn from_request(
        request: ScheduleRequest,
        now: DateTime<FixedOffset>,
        work_dir: &std::path::Path,
    ) -> Self {
        let wait_secs = (request.start - now).num_seconds().max(0);
        let duration_secs = (request.end - request.start).num_seconds();
        let filename = format!(
            "rec_{}_{}.ts",
            request.requester_id,
            now.format("%Y%m%d_%H%M%S")
        );
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request,
            wait_secs,
            duration_secs,
            output_path: work_dir.join(filename),
        }
    }
}

/// Lifecycle state of a job in the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Sleeping until the start instant.
    Waiting,
    /// Encoder process is running.
    Recording,
    /// Artifact is being uploaded.
    Delivering,
    /// Delivered successfully.
    Done,
    /// Failed; holds the error kind description.
    Failed(String),
    /// Cancelled before completion.
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Recording => write!(f, "recording"),
            JobStatus::Delivering => write!(f, "delivering"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed(detail) => write!(f, "failed ({detail})"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ──────────────────── Channel Types ────────────────────

/// A bot command extracted from an incoming chat update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundCommand {
    /// Command name without the leading slash or bot suffix (e.g. "record").
    pub command: String,
    /// Positional arguments following the command token.
    pub args: Vec<String>,
    /// Chat the command arrived in.
    pub chat_id: i64,
    /// User that issued the command (falls back to chat id).
    pub sender_id: i64,
    /// Display name of the sender, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message timestamp (unix millis).
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    #[test]
    fn test_job_from_request_computes_wait_and_duration() {
        let tz = ist();
        let now = tz.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let request = ScheduleRequest {
            source_url: "http://x".into(),
            start: tz.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap(),
            end: tz.with_ymd_and_hms(2024, 5, 1, 11, 5, 0).unwrap(),
            requester_id: 42,
            chat_id: -100,
        };
        let job = RecordingJob::from_request(request, now, std::path::Path::new("/tmp"));
        assert_eq!(job.wait_secs, 3600);
        assert_eq!(job.duration_secs, 300);
        let name = job.output_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("rec_42_"), "unexpected filename {name}");
        assert!(name.ends_with(".ts"));
    }

    #[test]
    fn test_job_ids_unique() {
        let tz = ist();
        let now = tz.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let request = ScheduleRequest {
            source_url: "http://x".into(),
            start: now + chrono::Duration::seconds(5),
            end: now + chrono::Duration::seconds(10),
            requester_id: 1,
            chat_id: 1,
        };
        let a = RecordingJob::from_request(request.clone(), now, std::path::Path::new("."));
        let b = RecordingJob::from_request(request, now, std::path::Path::new("."));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_job_status_serde() {
        let status = JobStatus::Waiting;
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"waiting\"");

        let failed = JobStatus::Failed("delivery failed".into());
        let json = serde_json::to_string(&failed).unwrap();
        let parsed: JobStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, failed);
        assert!(parsed.is_terminal());
        assert!(!JobStatus::Recording.is_terminal());
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = Error::Delivery("No such file or directory (os error 2)".into());
        assert_eq!(err.user_message(), "❌ Error sending video.");

        let err = Error::UnknownChannel("sports-hd".into());
        assert!(err.user_message().contains("sports-hd"));
    }

    #[test]
    fn test_inbound_command_serde() {
        let cmd = InboundCommand {
            command: "record".into(),
            args: vec!["http://x".into(), "10:00".into(), "10:05".into()],
            chat_id: -1002,
            sender_id: 7,
            sender_name: Some("Alice".into()),
            timestamp: 1700000000000,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let parsed: InboundCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.command, "record");
        assert_eq!(parsed.args.len(), 3);
    }
}
