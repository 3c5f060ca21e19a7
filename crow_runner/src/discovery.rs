//! Recursive video discovery.
//!
//! Within every directory, files come before subdirectories and both are
//! visited in name order, so the processing order of a corpus never depends on
//! the filesystem.

use car_crow::{CrowError, CrowResult};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported video extensions, compared case-insensitively.
const VIDEO_EXTENSIONS: &[&str] = &["avi"];

pub fn find_videos(root: impl AsRef<Path>) -> CrowResult<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CrowError::config(format!(
            "video path {} is not a directory",
            root.display()
        )));
    }

    let mut videos = Vec::new();
    let walker = WalkDir::new(root).sort_by(|a, b| {
        match (a.file_type().is_dir(), b.file_type().is_dir()) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => a.file_name().cmp(b.file_name()),
        }
    });

    for entry in walker {
        let entry = entry.map_err(|err| CrowError::Io(err.into()))?;
        if entry.file_type().is_file() && is_video(entry.path()) {
            videos.push(entry.into_path());
        }
    }
    Ok(videos)
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}
