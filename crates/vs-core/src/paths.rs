//! Path utilities for detecting video files by extension and naming files
//! for log and report lines.

use std::path::Path;

/// List of supported video file extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "m4v", "flv"];

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vs_core::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.MP4")));
/// assert!(is_video_file(Path::new("/path/to/video.webm")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

/// Case-insensitive extension check against an allow-list.
pub fn has_extension<S: AsRef<str>>(path: &Path, allowed: &[S]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            allowed.iter().any(|a| a.as_ref() == ext)
        })
        .unwrap_or(false)
}

/// The final path component as a display string, or the whole path when
/// there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
