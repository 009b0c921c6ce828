//! Per-meeting working directories across shared storage volumes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone)]
pub struct VolumeSet {
    volumes: Vec<PathBuf>,
}

impl VolumeSet {
    pub fn new(volumes: Vec<PathBuf>) -> Self {
        Self { volumes }
    }

    /// Directory holding `meeting_id`'s files on `volume`.
    pub fn meeting_dir(volume: &Path, meeting_id: &str) -> Result<PathBuf> {
        let unsafe_id = meeting_id.is_empty()
            || meeting_id == "."
            || meeting_id == ".."
            || meeting_id.contains(|c: char| c == '/' || c == '\\');
        if unsafe_id {
            return Err(OrchestratorError::InvalidInput(format!(
                "meeting id '{}' is not a valid directory name",
                meeting_id
            )));
        }
        Ok(volume.join(meeting_id))
    }

    /// Where the report worker leaves the rendered report for a meeting.
    pub fn report_artifact_path(report_volume: &Path, meeting_id: &str) -> Result<PathBuf> {
        Ok(Self::meeting_dir(report_volume, meeting_id)?
            .join(format!("meeting_report_{}.pdf", meeting_id)))
    }

    /// Recursively delete the meeting's directory on every volume.
    ///
    /// Missing directories are skipped. Every volume is attempted; the error
    /// lists the ones that failed. Returns the number of directories removed.
    pub async fn remove_meeting_dirs(&self, meeting_id: &str) -> Result<usize> {
        let mut removed = 0;
        let mut failures = Vec::new();

        for volume in &self.volumes {
            let dir = Self::meeting_dir(volume, meeting_id)?;
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    info!("Deleted directory {:?}", dir);
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to delete directory {:?}: {}", dir, e);
                    failures.push(format!("{}: {}", dir.display(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(removed)
        } else {
            Err(OrchestratorError::Storage(format!(
                "failed to delete meeting directories: {}",
                failures.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_dir_rejects_traversal() {
        let volume = Path::new("/shared-ocr");
        assert_eq!(
            VolumeSet::meeting_dir(volume, "M1").unwrap(),
            PathBuf::from("/shared-ocr/M1")
        );
        assert!(VolumeSet::meeting_dir(volume, "..").is_err());
        assert!(VolumeSet::meeting_dir(volume, "a/b").is_err());
        assert!(VolumeSet::meeting_dir(volume, "").is_err());
    }

    #[test]
    fn test_report_artifact_path() {
        let path = VolumeSet::report_artifact_path(Path::new("/shared-report"), "abc123").unwrap();
        assert_eq!(
            path,
            PathBuf::from("/shared-report/abc123/meeting_report_abc123.pdf")
        );
    }

    #[tokio::test]
    async fn test_remove_meeting_dirs_across_volumes() {
        let root = tempfile::tempdir().unwrap();
        let audio = root.path().join("shared-transcription");
        let screenshots = root.path().join("shared-ocr");
        let reports = root.path().join("shared-report");

        std::fs::create_dir_all(audio.join("M1").join("clips")).unwrap();
        std::fs::write(audio.join("M1").join("clips").join("a.wav"), b"wav").unwrap();
        std::fs::create_dir_all(screenshots.join("M1")).unwrap();
        std::fs::create_dir_all(screenshots.join("M2")).unwrap();

        let volumes = VolumeSet::new(vec![audio.clone(), screenshots.clone(), reports]);
        let removed = volumes.remove_meeting_dirs("M1").await.unwrap();

        assert_eq!(removed, 2);
        assert!(!audio.join("M1").exists());
        assert!(!screenshots.join("M1").exists());
        assert!(screenshots.join("M2").exists());

        // Second pass finds nothing and still succeeds.
        assert_eq!(volumes.remove_meeting_dirs("M1").await.unwrap(), 0);
    }
}
