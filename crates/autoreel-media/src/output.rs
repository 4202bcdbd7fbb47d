//! Output artifact naming and partial-file handling.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Timestamp layout used in artifact names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Build `<dir>/<prefix>_<timestamp>.<ext>`, adding `_1`, `_2`, ... when a
/// file with that name already exists.
pub fn artifact_path(dir: &Path, prefix: &str, ext: &str, at: DateTime<Local>) -> PathBuf {
    let stem = format!("{}_{}", prefix, at.format(TIMESTAMP_FORMAT));
    let mut candidate = dir.join(format!("{}.{}", stem, ext));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}.{}", stem, n, ext));
        n += 1;
    }
    candidate
}

/// An output file being written.
///
/// The encoder writes to a sibling `.part` path. [`PartialOutput::commit`]
/// renames it into place; if the guard is dropped uncommitted the partial
/// file is removed, so a failed render never leaves a truncated artifact
/// under the final name.
#[derive(Debug)]
pub struct PartialOutput {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartialOutput {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let mut name = target
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        if let Some(ext) = target.extension() {
            name.push(".");
            name.push(ext);
        }
        let temp = target.with_file_name(name);
        Self {
            temp,
            target,
            committed: false,
        }
    }

    /// Path the encoder should write to.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Move the finished file into place.
    pub async fn commit(mut self) -> MediaResult<PathBuf> {
        fs::rename(&self.temp, &self.target).await?;
        self.committed = true;
        debug!("Committed render output {}", self.target.display());
        Ok(self.target.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.temp) {
            Ok(()) => debug!("Removed partial output {}", self.temp.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial output {}: {}", self.temp.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_artifact_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), "tiktok", "mp4", fixed_time());
        assert_eq!(path.file_name().unwrap(), "tiktok_20260309140507.mp4");
    }

    #[test]
    fn test_artifact_name_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiktok_20260309140507.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("tiktok_20260309140507_1.mp4"), b"x").unwrap();
        let path = artifact_path(dir.path(), "tiktok", "mp4", fixed_time());
        assert_eq!(path.file_name().unwrap(), "tiktok_20260309140507_2.mp4");
    }

    #[test]
    fn test_partial_path() {
        let partial = PartialOutput::new("/out/tiktok_1.mp4");
        assert_eq!(partial.temp_path(), Path::new("/out/tiktok_1.part.mp4"));
    }

    #[tokio::test]
    async fn test_commit_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialOutput::new(dir.path().join("a.mp4"));
        std::fs::write(partial.temp_path(), b"video").unwrap();
        let temp = partial.temp_path().to_path_buf();

        let final_path = partial.commit().await.unwrap();
        assert!(final_path.exists());
        assert!(!temp.exists());
    }

    #[test]
    fn test_drop_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialOutput::new(dir.path().join("b.mp4"));
        std::fs::write(partial.temp_path(), b"half").unwrap();
        let temp = partial.temp_path().to_path_buf();

        drop(partial);
        assert!(!temp.exists());
        assert!(!dir.path().join("b.mp4").exists());
    }
}
