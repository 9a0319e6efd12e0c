//! Capture job execution: wait, record, deliver.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use streamcap_capture::delivery::{self, DeliveryOptions};
use streamcap_capture::recorder::Recorder;
use streamcap_capture::sink::ChatSink;
use streamcap_types::{JobStatus, RecordingJob};

use crate::registry::JobRegistry;

/// Shared dependencies for running capture jobs.
pub struct JobDeps {
    pub sink: Arc<dyn ChatSink>,
    pub recorder: Arc<Recorder>,
    pub registry: Arc<JobRegistry>,
    pub delivery: DeliveryOptions,
}

/// Drive one job through its lifecycle:
/// sleep until start → record → deliver → terminal status.
///
/// Encoder failure is logged but not reported to the chat; delivery is
/// still attempted and its file-missing error is what the user sees.
/// Cancellation is honored while waiting for the start instant; once the
/// encoder is running the job completes normally.
pub async fn run_job(deps: Arc<JobDeps>, job: RecordingJob, cancel: CancellationToken) {
    let id = job.id.clone();
    let chat_id = job.request.chat_id;

    if job.wait_secs > 0 {
        info!(job_id = id, wait_secs = job.wait_secs, "Waiting for start instant");
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(job_id = id, "Job cancelled while waiting");
                deps.registry.set_status(&id, JobStatus::Cancelled).await;
                return;
            }
            _ = tokio::time::sleep(std::time::Duration::from_secs(job.wait_secs as u64)) => {}
        }
    }
    if cancel.is_cancelled() {
        deps.registry.set_status(&id, JobStatus::Cancelled).await;
        return;
    }

    deps.registry.set_status(&id, JobStatus::Recording).await;
    if let Err(e) = deps
        .sink
        .send_text(chat_id, "⚙️ *Recording started... Sit back & relax!*")
        .await
    {
        warn!(job_id = id, "Failed to announce recording start: {e:#}");
    }

    if let Err(e) = deps
        .recorder
        .record(&job.request.source_url, job.duration_secs, &job.output_path)
        .await
    {
        // Logged only; the artifact may be missing or truncated and the
        // delivery step below is where the user finds out.
        let err = streamcap_types::Error::ProcessExecution(format!("{e:#}"));
        warn!(job_id = id, "{err}");
    }

    deps.registry.set_status(&id, JobStatus::Delivering).await;
    let caption = format!(
        "✅ *Recording Complete!*\nStart: `{}`\nEnd: `{}`",
        job.request.start.format("%I:%M:%S %p"),
        job.request.end.format("%I:%M:%S %p"),
    );

    match delivery::deliver(
        deps.sink.as_ref(),
        deps.recorder.as_ref(),
        &deps.delivery,
        chat_id,
        &job.output_path,
        &caption,
    )
    .await
    {
        Ok(()) => {
            info!(job_id = id, "Job delivered");
            deps.registry.set_status(&id, JobStatus::Done).await;
        }
        Err(e) => {
            if let Err(send_err) = deps.sink.send_text(chat_id, &e.user_message()).await {
                warn!(job_id = id, "Failed to report delivery error: {send_err:#}");
            }
            deps.registry.set_status(&id, JobStatus::Failed(e.to_string())).await;
        }
    }
}
