//! Caption retrieval through yt-dlp.
//!
//! yt-dlp writes subtitle files to disk, so every fetch gets its own scratch
//! directory that is removed when the fetch returns, successfully or not.

use super::{CaptionSource, CaptionTrack, SubtitleFormat};
use crate::error::{Result, TubesageError};
use crate::video_id::VideoReference;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Caption source backed by the yt-dlp binary.
pub struct YtDlpSource {
    binary: String,
    languages: Vec<String>,
    timeout: Duration,
    scratch_root: PathBuf,
}

impl YtDlpSource {
    pub fn new(binary: &str, languages: Vec<String>, timeout: Duration, scratch_root: &Path) -> Self {
        Self {
            binary: binary.to_string(),
            languages,
            timeout,
            scratch_root: scratch_root.to_path_buf(),
        }
    }

    async fn run_ytdlp(&self, video: &VideoReference, scratch: &Path) -> Result<()> {
        let template = scratch.join("%(id)s.%(ext)s");
        let languages = if self.languages.is_empty() {
            "en".to_string()
        } else {
            self.languages.join(",")
        };

        let child = Command::new(&self.binary)
            .arg("--skip-download")
            .arg("--write-sub")
            .arg("--write-auto-sub")
            .arg("--sub-lang").arg(&languages)
            .arg("--sub-format").arg("vtt")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("-o").arg(&template)
            .arg(video.watch_url())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TubesageError::ExtractionUnavailable(self.binary.clone())
                } else {
                    TubesageError::UnexpectedFetch(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TubesageError::UnexpectedFetch(format!(
                    "yt-dlp timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }

        Ok(())
    }

    /// Locate the downloaded subtitle, preferring earlier configured languages.
    fn find_subtitle(&self, scratch: &Path) -> Result<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(scratch)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("vtt"))
            .collect();

        files.sort_by_key(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.languages
                .iter()
                .position(|lang| name.ends_with(&format!(".{}.vtt", lang)))
                .unwrap_or(usize::MAX)
        });

        files.into_iter().next().ok_or(TubesageError::NoCaptionsFound)
    }
}

#[async_trait]
impl CaptionSource for YtDlpSource {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    #[instrument(skip_all, fields(video = %video))]
    async fn fetch_track(&self, video: &VideoReference) -> Result<CaptionTrack> {
        std::fs::create_dir_all(&self.scratch_root)?;
        let scratch = tempfile::Builder::new()
            .prefix("captions-")
            .tempdir_in(&self.scratch_root)?;

        info!("Downloading subtitles with {}", self.binary);
        self.run_ytdlp(video, scratch.path()).await?;

        let subtitle = self.find_subtitle(scratch.path())?;
        debug!("Reading {:?}", subtitle);
        let body = tokio::fs::read_to_string(&subtitle).await?;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch directory: {}", e);
        }

        Ok(CaptionTrack::Markup {
            format: SubtitleFormat::Vtt,
            body,
        })
    }
}

/// Map yt-dlp's stderr onto the caption failure taxonomy.
fn classify_stderr(stderr: &str) -> TubesageError {
    let lower = stderr.to_lowercase();

    let unavailable = [
        "video unavailable",
        "private video",
        "has been removed",
        "this video is not available",
        "members-only",
        "sign in to confirm your age",
    ];
    if unavailable.iter().any(|needle| lower.contains(needle)) {
        return TubesageError::VideoUnavailable;
    }

    if lower.contains("no subtitles") || lower.contains("there are no subtitles") {
        return TubesageError::NoCaptionsFound;
    }

    let detail = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("yt-dlp exited with an error");
    TubesageError::UnexpectedFetch(detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> VideoReference {
        VideoReference::new("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_classify_stderr() {
        assert!(matches!(
            classify_stderr("ERROR: [youtube] dQw4w9WgXcQ: Video unavailable"),
            TubesageError::VideoUnavailable
        ));
        assert!(matches!(
            classify_stderr("ERROR: [youtube] x: Private video. Sign in if you've been granted access"),
            TubesageError::VideoUnavailable
        ));
        match classify_stderr("WARNING: something\nERROR: HTTP Error 403: Forbidden\n") {
            TubesageError::UnexpectedFetch(detail) => {
                assert_eq!(detail, "ERROR: HTTP Error 403: Forbidden")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_extraction_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let source = YtDlpSource::new(
            "tubesage-no-such-binary",
            vec!["en".to_string()],
            Duration::from_secs(5),
            root.path(),
        );

        let err = source.fetch_track(&video()).await.unwrap_err();
        assert!(matches!(err, TubesageError::ExtractionUnavailable(_)));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    fn fake_ytdlp(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scratch_directory_removed_on_both_paths() {
        let bin_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();

        // Writes an English track next to the output template, like yt-dlp does
        let writer = fake_ytdlp(
            bin_dir.path(),
            "writer",
            r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
dir=$(dirname "$out")
printf 'WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nhello hello world\n' > "$dir/dQw4w9WgXcQ.en.vtt"
"#,
        );
        let source = YtDlpSource::new(&writer, vec!["en".to_string()], Duration::from_secs(10), root.path());
        match source.fetch_track(&video()).await.unwrap() {
            CaptionTrack::Markup { body, .. } => assert!(body.contains("hello hello world")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);

        let failing = fake_ytdlp(
            bin_dir.path(),
            "failing",
            "echo 'ERROR: [youtube] dQw4w9WgXcQ: Video unavailable' >&2\nexit 1\n",
        );
        let source = YtDlpSource::new(&failing, vec!["en".to_string()], Duration::from_secs(10), root.path());
        let err = source.fetch_track(&video()).await.unwrap_err();
        assert!(matches!(err, TubesageError::VideoUnavailable));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);

        let silent = fake_ytdlp(bin_dir.path(), "silent", "exit 0\n");
        let source = YtDlpSource::new(&silent, vec!["en".to_string()], Duration::from_secs(10), root.path());
        let err = source.fetch_track(&video()).await.unwrap_err();
        assert!(matches!(err, TubesageError::NoCaptionsFound));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
