//! Channel name → stream URL directory.
//!
//! Backed by a JSON file mapping lowercase channel names to URLs. The file
//! is loaded into a snapshot that is reloaded once its TTL expires, so
//! edits to the file show up without a restart. Every failure mode of the
//! backing file (missing, unreadable, malformed) collapses to "channel not
//! found" for callers; the detail is only logged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};

struct Snapshot {
    entries: HashMap<String, String>,
    loaded_at: Instant,
}

/// Case-insensitive channel directory with a TTL-based reload policy.
pub struct ChannelDirectory {
    path: PathBuf,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl ChannelDirectory {
    /// Create a directory over the given file; snapshots older than `ttl`
    /// are reloaded on the next lookup.
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// Look up the stream URL for a channel name (case-insensitive).
    ///
    /// Returns `None` for unknown channels and for any directory file
    /// problem; the distinction is intentionally not surfaced.
    pub async fn lookup(&self, name: &str) -> Option<String> {
        let key = name.to_lowercase();

        {
            let guard = self.snapshot.read().await;
            if let Some(snap) = guard.as_ref() {
                if snap.loaded_at.elapsed() < self.ttl {
                    return snap.entries.get(&key).cloned();
                }
            }
        }

        let mut guard = self.snapshot.write().await;
        // Another task may have reloaded while we waited for the lock.
        let stale = guard
            .as_ref()
            .is_none_or(|snap| snap.loaded_at.elapsed() >= self.ttl);
        if stale {
            *guard = Some(Snapshot {
                entries: load_entries(&self.path),
                loaded_at: Instant::now(),
            });
        }
        guard
            .as_ref()
            .and_then(|snap| snap.entries.get(&key).cloned())
    }
}

/// Read and parse the directory file, normalizing keys to lowercase.
/// Any failure yields an empty map.
fn load_entries(path: &Path) -> HashMap<String, String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read channel directory {}: {e}", path.display());
            return HashMap::new();
        }
    };

    match serde_json::from_str::<HashMap<String, String>>(&content) {
        Ok(map) => {
            let entries: HashMap<String, String> = map
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect();
            debug!(
                count = entries.len(),
                "Loaded channel directory from {}",
                path.display()
            );
            entries
        }
        Err(e) => {
            warn!(
                "Malformed channel directory {}: {e}",
                path.display()
            );
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_directory(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_lookup_case_insensitive() {
        let file = write_directory(r#"{"sports": "http://stream/sports"}"#);
        let dir = ChannelDirectory::new(file.path(), Duration::from_secs(60));
        assert_eq!(
            dir.lookup("Sports").await.as_deref(),
            Some("http://stream/sports")
        );
        assert_eq!(
            dir.lookup("sports").await.as_deref(),
            Some("http://stream/sports")
        );
        assert_eq!(
            dir.lookup("SPORTS").await.as_deref(),
            Some("http://stream/sports")
        );
    }

    #[tokio::test]
    async fn test_mixed_case_keys_in_file() {
        let file = write_directory(r#"{"News HD": "http://stream/news"}"#);
        let dir = ChannelDirectory::new(file.path(), Duration::from_secs(60));
        assert_eq!(
            dir.lookup("news hd").await.as_deref(),
            Some("http://stream/news")
        );
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let file = write_directory(r#"{"sports": "http://stream/sports"}"#);
        let dir = ChannelDirectory::new(file.path(), Duration::from_secs(60));
        assert_eq!(dir.lookup("movies").await, None);
    }

    #[tokio::test]
    async fn test_missing_file_collapses_to_not_found() {
        let dir = ChannelDirectory::new("/nonexistent/chann.json", Duration::from_secs(60));
        assert_eq!(dir.lookup("sports").await, None);
    }

    #[tokio::test]
    async fn test_malformed_file_collapses_to_not_found() {
        let file = write_directory("not json at all {");
        let dir = ChannelDirectory::new(file.path(), Duration::from_secs(60));
        assert_eq!(dir.lookup("sports").await, None);
    }

    #[tokio::test]
    async fn test_ttl_reload_picks_up_changes() {
        let file = write_directory(r#"{"sports": "http://old"}"#);
        let dir = ChannelDirectory::new(file.path(), Duration::ZERO);
        assert_eq!(dir.lookup("sports").await.as_deref(), Some("http://old"));

        std::fs::write(file.path(), r#"{"sports": "http://new"}"#).unwrap();
        assert_eq!(dir.lookup("sports").await.as_deref(), Some("http://new"));
    }

    #[tokio::test]
    async fn test_snapshot_serves_within_ttl() {
        let file = write_directory(r#"{"sports": "http://old"}"#);
        let dir = ChannelDirectory::new(file.path(), Duration::from_secs(3600));
        assert_eq!(dir.lookup("sports").await.as_deref(), Some("http://old"));

        // File change is not visible until the TTL expires.
        std::fs::write(file.path(), r#"{"sports": "http://new"}"#).unwrap();
        assert_eq!(dir.lookup("sports").await.as_deref(), Some("http://old"));
    }
}
