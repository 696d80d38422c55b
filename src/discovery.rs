//! Input file discovery.
//!
//! Each tool scans a directory for files whose extension belongs to one of the
//! sets below. Matching is case-insensitive and results are sorted by path so
//! that reports come out in a stable order.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Video containers accepted by the logo, audio and GIF tools.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "m4v", "webm"];

/// Video containers accepted by the circular video tool.
pub const CIRCULAR_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv"];

/// Still image formats accepted by the image tools.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "webp"];

/// Where [`exclude_marked`] looks for the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerScope {
    /// Only the file stem.
    Stem,
    /// The path relative to the given root, including subdirectories.
    RelativePath(PathBuf),
}

/// Check whether a path's extension is one of `extensions`, ignoring case.
#[must_use]
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Check if a file has a supported still image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

/// Check if a file has a supported video extension.
#[must_use]
pub fn is_supported_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

/// Ensure `dir` exists and is a directory.
///
/// # Errors
///
/// Returns [`Error::FileNotFound`] or [`Error::NotADirectory`].
pub fn require_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(Error::FileNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}

/// List regular files under `dir` matching `extensions`, sorted by path.
///
/// With `recursive` set, subdirectories are walked as well. Unreadable entries
/// are skipped rather than failing the whole scan.
///
/// # Errors
///
/// Fails if `dir` is missing or not a directory, or if it cannot be listed.
pub fn find_files(dir: &Path, extensions: &[&str], recursive: bool) -> Result<Vec<PathBuf>> {
    require_dir(dir)?;

    let mut files: Vec<PathBuf> = if recursive {
        WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| has_extension(p, extensions))
            .collect()
    } else {
        std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| e.path())
            .filter(|p| has_extension(p, extensions))
            .collect()
    };

    files.sort();
    Ok(files)
}

/// Drop files whose stem or path contains any of `markers`.
///
/// Used to keep a tool from picking up its own earlier outputs, e.g. files
/// under a `circular/` directory. With [`MarkerScope::RelativePath`] the root
/// itself is not searched, so an input directory may carry a marker in its name.
#[must_use]
pub fn exclude_marked(files: Vec<PathBuf>, markers: &[&str], scope: &MarkerScope) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|p| {
            let haystack = match scope {
                MarkerScope::Stem => p
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                MarkerScope::RelativePath(root) => p
                    .strip_prefix(root)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .into_owned(),
            };
            !markers.iter().any(|m| haystack.contains(m))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_extension_ignores_case() {
        assert!(has_extension(Path::new("clip.MP4"), VIDEO_EXTENSIONS));
        assert!(has_extension(Path::new("photo.JpEg"), IMAGE_EXTENSIONS));
        assert!(!has_extension(Path::new("notes.txt"), IMAGE_EXTENSIONS));
        assert!(!has_extension(Path::new("Makefile"), VIDEO_EXTENSIONS));
    }

    #[test]
    fn circular_set_is_narrower_than_general_video_set() {
        assert!(is_supported_video(Path::new("a.wmv")));
        assert!(!has_extension(Path::new("a.wmv"), CIRCULAR_VIDEO_EXTENSIONS));
        assert!(!has_extension(Path::new("a.m4v"), CIRCULAR_VIDEO_EXTENSIONS));
    }

    #[test]
    fn exclude_marked_by_stem_keeps_directory_matches() {
        let files = vec![
            PathBuf::from("/in/talk.mp4"),
            PathBuf::from("/in/talk_circular.mp4"),
            PathBuf::from("/in/temp_frames.mp4"),
            PathBuf::from("/circular/keep.mp4"),
        ];
        let kept = exclude_marked(files, &["circular", "temp_"], &MarkerScope::Stem);
        assert_eq!(
            kept,
            vec![PathBuf::from("/in/talk.mp4"), PathBuf::from("/circular/keep.mp4")]
        );
    }

    #[test]
    fn exclude_marked_by_path_drops_output_directories() {
        let files = vec![
            PathBuf::from("/circular_src/a.png"),
            PathBuf::from("/circular_src/team/b.png"),
            PathBuf::from("/circular_src/team/circular/b_circular.png"),
        ];
        let scope = MarkerScope::RelativePath(PathBuf::from("/circular_src"));
        let kept = exclude_marked(files, &["circular"], &scope);
        assert_eq!(
            kept,
            vec![
                PathBuf::from("/circular_src/a.png"),
                PathBuf::from("/circular_src/team/b.png"),
            ]
        );
    }

    #[test]
    fn require_dir_reports_missing_path() {
        let err = require_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
