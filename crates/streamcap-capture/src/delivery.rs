//! Delivery pipeline: size check, optional segmentation, upload, cleanup.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use streamcap_types::Error;

use crate::recorder::Splitter;
use crate::sink::ChatSink;

/// Tunables for the delivery pipeline.
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    /// Largest artifact uploaded in one piece.
    pub max_upload_bytes: u64,
    /// Segment length when splitting oversized artifacts.
    pub segment_seconds: u32,
}

/// Deliver `artifact` to `chat_id`.
///
/// Artifacts at or under the size threshold are uploaded whole with
/// `caption`; larger ones are split into fixed-duration segments uploaded
/// in order as "Part N". Local files are removed as they are shipped, and
/// the original is removed at the end. A failed segment upload does not
/// stop later segments; the gap is visible to the user as a missing part.
pub async fn deliver(
    sink: &dyn ChatSink,
    splitter: &dyn Splitter,
    opts: &DeliveryOptions,
    chat_id: i64,
    artifact: &Path,
    caption: &str,
) -> streamcap_types::Result<()> {
    match deliver_inner(sink, splitter, opts, chat_id, artifact, caption).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(artifact = %artifact.display(), "Delivery failed: {e:#}");
            Err(Error::Delivery(format!("{e:#}")))
        }
    }
}

async fn deliver_inner(
    sink: &dyn ChatSink,
    splitter: &dyn Splitter,
    opts: &DeliveryOptions,
    chat_id: i64,
    artifact: &Path,
    caption: &str,
) -> anyhow::Result<()> {
    let size = tokio::fs::metadata(artifact)
        .await
        .with_context(|| format!("stat {}", artifact.display()))?
        .len();

    if size <= opts.max_upload_bytes {
        info!(size, artifact = %artifact.display(), "Uploading artifact whole");
        sink.send_video(chat_id, artifact, caption)
            .await
            .context("video upload failed")?;
        remove_quiet(artifact).await;
        return Ok(());
    }

    info!(
        size,
        threshold = opts.max_upload_bytes,
        artifact = %artifact.display(),
        "Artifact over threshold, segmenting"
    );
    if let Err(e) = sink.send_text(chat_id, "✂️ Video too long, splitting...").await {
        warn!("Failed to announce split: {e:#}");
    }

    let segments = splitter
        .split(artifact, opts.segment_seconds)
        .await
        .context("segmentation failed")?;

    let failed = upload_segments(sink, chat_id, &segments).await;
    if failed > 0 {
        warn!(failed, total = segments.len(), "Some segments were not delivered");
    }

    remove_quiet(artifact).await;
    Ok(())
}

/// Upload segments in order, removing each local file right after its own
/// upload attempt. Returns the number of failed uploads; a failure does
/// not abort the remaining segments.
async fn upload_segments(sink: &dyn ChatSink, chat_id: i64, segments: &[PathBuf]) -> usize {
    let mut failed = 0;
    for (idx, segment) in segments.iter().enumerate() {
        let caption = format!("🎬 Part {}", idx + 1);
        if let Err(e) = sink.send_video(chat_id, segment, &caption).await {
            warn!(segment = %segment.display(), "Segment upload failed: {e:#}");
            failed += 1;
        }
        remove_quiet(segment).await;
    }
    failed
}

/// Best-effort local file removal. An already-missing file is not an error,
/// so cleanup stays idempotent.
async fn remove_quiet(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove file: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records calls and can fail a chosen send_video call.
    struct FakeSink {
        events: Mutex<Vec<String>>,
        fail_video_call: Option<usize>,
        calls: Mutex<usize>,
    }

    impl FakeSink {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail_video_call: None,
                calls: Mutex::new(0),
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_video_call: Some(call),
                ..Self::new()
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatSink for FakeSink {
        async fn send_text(&self, _chat_id: i64, text: &str) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(format!("text:{text}"));
            Ok(())
        }

        async fn send_video(
            &self,
            _chat_id: i64,
            path: &Path,
            caption: &str,
        ) -> anyhow::Result<()> {
            // The file must still exist at upload time.
            assert!(path.exists(), "uploaded file missing: {}", path.display());
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_video_call == Some(call) {
                anyhow::bail!("simulated upload failure");
            }
            let name = path.file_name().unwrap().to_str().unwrap();
            self.events
                .lock()
                .unwrap()
                .push(format!("video:{name}:{caption}"));
            Ok(())
        }
    }

    /// Splitter that fabricates segment files next to the input.
    struct FakeSplitter {
        count: usize,
    }

    #[async_trait::async_trait]
    impl Splitter for FakeSplitter {
        async fn split(&self, input: &Path, _segment_secs: u32) -> anyhow::Result<Vec<PathBuf>> {
            let prefix = crate::recorder::segment_prefix(input)?;
            let dir = input.parent().unwrap();
            let mut segments = Vec::new();
            for idx in 0..self.count {
                let path = dir.join(format!("{prefix}{idx:03}.ts"));
                std::fs::write(&path, b"segment")?;
                segments.push(path);
            }
            Ok(segments)
        }
    }

    fn opts() -> DeliveryOptions {
        DeliveryOptions {
            max_upload_bytes: 1024,
            segment_seconds: 300,
        }
    }

    #[tokio::test]
    async fn test_small_artifact_uploaded_whole_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("rec_1_x.ts");
        std::fs::write(&artifact, b"small").unwrap();

        let sink = FakeSink::new();
        let splitter = FakeSplitter { count: 0 };
        deliver(&sink, &splitter, &opts(), 1, &artifact, "✅ done")
            .await
            .unwrap();

        assert_eq!(sink.events(), vec!["video:rec_1_x.ts:✅ done"]);
        assert!(!artifact.exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_delivery_error() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("never_written.ts");

        let sink = FakeSink::new();
        let splitter = FakeSplitter { count: 0 };
        let err = deliver(&sink, &splitter, &opts(), 1, &artifact, "c")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_artifact_split_uploaded_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("rec_1_x.ts");
        std::fs::write(&artifact, vec![0u8; 2048]).unwrap();

        let sink = FakeSink::new();
        let splitter = FakeSplitter { count: 3 };
        deliver(&sink, &splitter, &opts(), 1, &artifact, "c")
            .await
            .unwrap();

        assert_eq!(
            sink.events(),
            vec![
                "text:✂️ Video too long, splitting...",
                "video:rec_1_x_part_000.ts:🎬 Part 1",
                "video:rec_1_x_part_001.ts:🎬 Part 2",
                "video:rec_1_x_part_002.ts:🎬 Part 3",
            ]
        );
        // Original and all segments cleaned up.
        assert!(!artifact.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_middle_segment_failure_does_not_abort_rest() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("rec_1_x.ts");
        std::fs::write(&artifact, vec![0u8; 2048]).unwrap();

        // Second send_video call fails (Part 2 of 5).
        let sink = FakeSink::failing_on(2);
        let splitter = FakeSplitter { count: 5 };
        deliver(&sink, &splitter, &opts(), 1, &artifact, "c")
            .await
            .unwrap();

        let events = sink.events();
        assert!(events.contains(&"video:rec_1_x_part_000.ts:🎬 Part 1".to_string()));
        assert!(!events.iter().any(|e| e.contains("Part 2")));
        assert!(events.contains(&"video:rec_1_x_part_002.ts:🎬 Part 3".to_string()));
        assert!(events.contains(&"video:rec_1_x_part_004.ts:🎬 Part 5".to_string()));
        // Failed segment is still removed; nothing lingers.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_idempotent_when_file_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.ts");
        // Removing a file that never existed must not panic or error.
        remove_quiet(&path).await;
        remove_quiet(&path).await;
    }

    #[tokio::test]
    async fn test_artifact_exactly_at_threshold_not_split() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("rec_1_x.ts");
        std::fs::write(&artifact, vec![0u8; 1024]).unwrap();

        let sink = FakeSink::new();
        let splitter = FakeSplitter { count: 3 };
        deliver(&sink, &splitter, &opts(), 1, &artifact, "c")
            .await
            .unwrap();
        assert_eq!(sink.events().len(), 1);
        assert!(sink.events()[0].starts_with("video:"));
    }
}
