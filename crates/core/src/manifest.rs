//! Concat demuxer manifests for merge operations.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Quotes a URI for a `file '...'` directive.
///
/// The concat demuxer reads single-quoted strings; an embedded quote closes
/// the string, is escaped, and reopens it.
fn quote_entry(uri: &str) -> String {
    format!("'{}'", uri.replace('\'', r"'\''"))
}

/// Renders manifest text, one `file '<uri>'` line per input.
pub fn render_concat_manifest<S: AsRef<str>>(uris: &[S]) -> String {
    uris.iter()
        .map(|uri| format!("file {}\n", quote_entry(uri.as_ref())))
        .collect()
}

/// Writes a uniquely named manifest into `cache_dir` and returns its path.
pub async fn write_concat_manifest<S: AsRef<str>>(
    cache_dir: &Path,
    task_id: &str,
    uris: &[S],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(cache_dir).await?;

    let path = cache_dir.join(format!("concat_{}_{}.txt", task_id, Uuid::new_v4().simple()));
    tokio::fs::write(&path, render_concat_manifest(uris)).await?;

    debug!("Wrote concat manifest {:?} ({} inputs)", path, uris.len());
    Ok(path)
}

/// Deletes a manifest once its task has settled. Failures are only logged.
pub async fn remove_manifest(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove concat manifest {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_manifest() {
        let text = render_concat_manifest(&["/media/a.mp4", "/media/b.mp4"]);
        assert_eq!(text, "file '/media/a.mp4'\nfile '/media/b.mp4'\n");
    }

    #[test]
    fn test_render_escapes_quotes() {
        let text = render_concat_manifest(&["/media/it's.mp4"]);
        assert_eq!(text, "file '/media/it'\\''s.mp4'\n");
    }

    #[tokio::test]
    async fn test_write_and_remove_manifest() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");

        let first = write_concat_manifest(&cache, "task-1", &["A", "B"])
            .await
            .unwrap();
        let second = write_concat_manifest(&cache, "task-1", &["A", "B"])
            .await
            .unwrap();
        assert_ne!(first, second);

        let content = std::fs::read_to_string(&first).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|l| l.starts_with("file '")));

        remove_manifest(&first).await;
        assert!(!first.exists());
        assert!(second.exists());
    }
}
