//! Frame extraction: turns one video file into an ordered list of still images
//! on disk, and removes them again once they have been scanned.

use async_trait::async_trait;
use car_crow::{CrowError, CrowResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Produces the still frames of a video, in temporal order.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Writes the frames of `video` into `dest` and returns their paths sorted
    /// so that listing order equals temporal order.
    async fn extract(&self, video: &Path, dest: &Path) -> CrowResult<Vec<PathBuf>>;

    /// Deletes extracted frames. Returns how many were removed; failures are
    /// logged and skipped.
    async fn cleanup(&self, frames: &[PathBuf]) -> usize {
        let mut removed = 0;
        for frame in frames {
            match tokio::fs::remove_file(frame).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %frame.display(), error = %err, "failed to remove frame"),
            }
        }
        removed
    }
}

/// Splits videos with the `ffmpeg` binary, sampling at a fixed frame rate.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    binary: PathBuf,
    frame_rate: f64,
    extension: String,
}

impl FfmpegFrameSource {
    pub fn new(binary: impl Into<PathBuf>, frame_rate: f64, extension: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            frame_rate,
            extension: extension.into(),
        }
    }

    /// Finds `ffmpeg` on the PATH.
    pub fn locate(frame_rate: f64, extension: impl Into<String>) -> CrowResult<Self> {
        let binary = which::which("ffmpeg").map_err(|_| CrowError::ToolNotFound {
            tool: "ffmpeg".to_string(),
        })?;
        Ok(Self::new(binary, frame_rate, extension))
    }

    /// `<dest>/<video stem>%04d.<ext>`: a zero-padded sequence number keeps
    /// lexicographic order equal to temporal order.
    pub fn output_pattern(&self, video: &Path, dest: &Path) -> PathBuf {
        dest.join(format!("{}%04d.{}", video_stem(video), self.extension))
    }

    pub fn build_args(&self, video: &Path, dest: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video.to_string_lossy().into_owned(),
            "-r".to_string(),
            self.frame_rate.to_string(),
            self.output_pattern(video, dest).to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn extract(&self, video: &Path, dest: &Path) -> CrowResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(dest).await?;

        let stem = video_stem(video);
        let stale = list_extracted_frames(dest, &stem, &self.extension)?;
        if !stale.is_empty() {
            warn!(count = stale.len(), dir = %dest.display(), "removing stale frames");
            self.cleanup(&stale).await;
        }

        let args = self.build_args(video, dest);
        debug!(binary = %self.binary.display(), ?args, "running ffmpeg");
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let partial = list_extracted_frames(dest, &stem, &self.extension)?;
            if !partial.is_empty() {
                debug!(count = partial.len(), "removing frames of failed extraction");
                self.cleanup(&partial).await;
            }
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CrowError::external_tool(
                format!("ffmpeg could not split {}", video.display()),
                (!stderr.is_empty()).then_some(stderr),
                output.status.code(),
            ));
        }

        let frames = list_extracted_frames(dest, &stem, &self.extension)?;
        if frames.is_empty() {
            return Err(CrowError::NoFramesExtracted(video.to_path_buf()));
        }
        info!(video = %video.display(), frames = frames.len(), "frames extracted");
        Ok(frames)
    }
}

fn video_stem(video: &Path) -> String {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string())
}

/// Lists `<stem><digits>.<ext>` files in `dir`, sorted by name.
pub fn list_extracted_frames(
    dir: &Path,
    stem: &str,
    extension: &str,
) -> CrowResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches_extension = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        let sequence = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(stem));
        let is_frame = sequence
            .is_some_and(|seq| !seq.is_empty() && seq.chars().all(|c| c.is_ascii_digit()));
        if matches_extension && is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn builds_ffmpeg_arguments() {
        let source = FfmpegFrameSource::new("ffmpeg", 5.0, "jpg");
        let args = source.build_args(Path::new("cams/MOV001.AVI"), Path::new("temp"));
        assert_eq!(&args[4..7], &["-i", "cams/MOV001.AVI", "-r"]);
        assert_eq!(args[7], "5");
        assert_eq!(PathBuf::from(&args[8]), Path::new("temp").join("MOV001%04d.jpg"));
    }

    #[test]
    fn lists_only_this_videos_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "MOV0010010.jpg",
            "MOV0010002.jpg",
            "MOV0010001.JPG",
            "MOV0020001.jpg",
            "MOV001.jpg",
            "MOV001notes.jpg",
            "MOV0010003.png",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let frames = list_extracted_frames(dir.path(), "MOV001", "jpg").unwrap();
        let names: Vec<String> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["MOV0010001.JPG", "MOV0010002.jpg", "MOV0010010.jpg"]);
    }

    #[tokio::test]
    async fn cleanup_removes_frames() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("MOV0010001.jpg");
        fs::write(&frame, b"").unwrap();

        let source = FfmpegFrameSource::new("ffmpeg", 5.0, "jpg");
        let missing = dir.path().join("MOV0010002.jpg");
        let removed = source.cleanup(&[frame.clone(), missing]).await;
        assert_eq!(removed, 1);
        assert!(!frame.exists());
    }

    #[tokio::test]
    async fn failing_tool_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = FfmpegFrameSource::new(dir.path().join("no-such-ffmpeg"), 5.0, "jpg");
        let err = source
            .extract(Path::new("MOV001.avi"), &dir.path().join("temp"))
            .await
            .unwrap_err();
        assert!(matches!(err, CrowError::Io(_)));
    }

    /// Stands in for an ffmpeg that dies halfway through a truncated file:
    /// two frames land next to the output pattern, then it exits 1.
    #[cfg(unix)]
    fn truncating_ffmpeg(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-ffmpeg");
        fs::write(
            &script,
            "#!/bin/sh\n\
             for last; do :; done\n\
             out=$(dirname \"$last\")\n\
             touch \"$out/MOV0010001.jpg\" \"$out/MOV0010002.jpg\"\n\
             echo 'moov atom not found' >&2\n\
             exit 1\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_extraction_leaves_no_frames_behind() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("temp");
        let source = FfmpegFrameSource::new(truncating_ffmpeg(dir.path()), 5.0, "jpg");

        let err = source
            .extract(Path::new("cams/MOV001.avi"), &temp)
            .await
            .unwrap_err();

        match err {
            CrowError::ExternalTool {
                stderr, exit_code, ..
            } => {
                assert_eq!(stderr.as_deref(), Some("moov atom not found"));
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::read_dir(&temp).unwrap().count(), 0);
    }
}
