//! Error types for the media-batch crate.

use std::path::PathBuf;

/// Errors that can occur while discovering, probing, or processing media files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool could not be located.
    #[error("{tool} not found in PATH (set MEDIA_BATCH_{} to override)", .tool.to_uppercase())]
    ToolNotFound {
        /// Name of the missing binary.
        tool: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("{message}{}", .exit_code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    FfmpegFailed {
        /// Short description of the failed step.
        message: String,
        /// Captured standard error of the tool, if any.
        stderr: Option<String>,
        /// Process exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
    },

    /// ffprobe output was missing or could not be interpreted.
    #[error("probe failed: {0}")]
    Probe(String),

    /// An input path does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A directory was expected but the path is something else.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The requested format is not supported.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An option value is outside its valid range.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The face detection model could not be loaded.
    #[error("face detector error: {0}")]
    Detector(String),

    /// Frame extraction produced nothing to process.
    #[error("no frames extracted from {}", .0.display())]
    NoFrames(PathBuf),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// ffprobe JSON could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an external tool failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// The last non-empty stderr line of a failed tool run, for one-line reports.
    #[must_use]
    pub fn stderr_tail(&self) -> Option<&str> {
        match self {
            Self::FfmpegFailed {
                stderr: Some(stderr),
                ..
            } => stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()),
            _ => None,
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("opus".to_string());
        assert!(unsupported.to_string().contains("opus"));

        let missing = Error::ToolNotFound {
            tool: "ffprobe".to_string(),
        };
        assert!(missing.to_string().contains("MEDIA_BATCH_FFPROBE"));

        let failed = Error::ffmpeg_failed("ffmpeg exited unsuccessfully", None, Some(1));
        assert_eq!(failed.to_string(), "ffmpeg exited unsuccessfully (exit code 1)");
    }

    #[test]
    fn stderr_tail_skips_trailing_blank_lines() {
        let err = Error::ffmpeg_failed(
            "ffmpeg exited unsuccessfully",
            Some("frame=1\nInvalid data found when processing input\n\n".to_string()),
            Some(1),
        );
        assert_eq!(
            err.stderr_tail(),
            Some("Invalid data found when processing input")
        );
        assert_eq!(Error::Probe("x".into()).stderr_tail(), None);
    }
}
