//! ffmpeg invocation: fixed-duration stream capture and file segmentation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Seam for splitting an artifact into bounded segments. The production
/// impl shells out to ffmpeg; tests provide their own.
#[async_trait::async_trait]
pub trait Splitter: Send + Sync {
    /// Split `input` into fixed-duration segments next to it, returning the
    /// produced files sorted in playback order.
    async fn split(&self, input: &Path, segment_secs: u32) -> anyhow::Result<Vec<PathBuf>>;
}

/// Wrapper around the external ffmpeg binary.
pub struct Recorder {
    ffmpeg_path: PathBuf,
}

impl Recorder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Capture `url` for exactly `duration_secs` via stream copy into
    /// `output`. Blocks the calling task (not the runtime) until the
    /// process exits. Single attempt, no retry; on failure the output file
    /// may be missing or truncated.
    pub async fn record(
        &self,
        url: &str,
        duration_secs: i64,
        output: &Path,
    ) -> anyhow::Result<()> {
        info!(
            url,
            duration_secs,
            output = %output.display(),
            "Starting capture"
        );

        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(url)
            .arg("-t")
            .arg(duration_secs.to_string())
            .arg("-c")
            .arg("copy")
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.ffmpeg_path.display()))?;

        log_process_output("capture", &result.stdout, &result.stderr);

        if !result.status.success() {
            bail!("ffmpeg capture exited with {}", result.status);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Splitter for Recorder {
    async fn split(&self, input: &Path, segment_secs: u32) -> anyhow::Result<Vec<PathBuf>> {
        let pattern = segment_pattern(input)?;
        info!(
            input = %input.display(),
            segment_secs,
            "Splitting artifact into segments"
        );

        let result = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(input)
            .arg("-c")
            .arg("copy")
            .arg("-f")
            .arg("segment")
            .arg("-segment_time")
            .arg(segment_secs.to_string())
            .arg("-reset_timestamps")
            .arg("1")
            .arg(&pattern)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.ffmpeg_path.display()))?;

        log_process_output("segment", &result.stdout, &result.stderr);

        if !result.status.success() {
            bail!("ffmpeg segment exited with {}", result.status);
        }

        let prefix = segment_prefix(input)?;
        let dir = input.parent().unwrap_or_else(|| Path::new("."));
        discover_segments(dir, &prefix)
    }
}

fn log_process_output(step: &str, stdout: &[u8], stderr: &[u8]) {
    if !stdout.is_empty() {
        debug!(step, "ffmpeg stdout: {}", String::from_utf8_lossy(stdout));
    }
    // ffmpeg writes its progress log to stderr even on success
    if !stderr.is_empty() {
        debug!(step, "ffmpeg stderr: {}", String::from_utf8_lossy(stderr));
    }
}

/// The output pattern handed to ffmpeg's segment muxer. Indices are
/// zero-padded to three digits so that lexicographic filename order is
/// also numeric order.
pub fn segment_pattern(input: &Path) -> anyhow::Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .context("artifact path has no file stem")?;
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(format!("{stem}_part_%03d.ts")))
}

/// Filename prefix identifying segments produced for `input`.
pub fn segment_prefix(input: &Path) -> anyhow::Result<String> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .context("artifact path has no file stem")?;
    Ok(format!("{stem}_part_"))
}

/// Find files in `dir` whose names start with `prefix`, sorted by name.
/// Zero-padded indices in the pattern keep this in playback order.
pub fn discover_segments(dir: &Path, prefix: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut segments = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(prefix) {
            segments.push(entry.path());
        }
    }
    segments.sort();
    if segments.is_empty() {
        warn!(prefix, dir = %dir.display(), "Segmentation produced no files");
    }
    Ok(segments)
}
