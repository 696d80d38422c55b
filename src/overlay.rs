//! Corner logo overlay for videos and still images.
//!
//! The logo is scaled relative to the width of the main input and composited
//! into one corner with ffmpeg's `overlay` filter. Video audio is copied
//! through untouched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::batch::{self, ProcessResult};
use crate::discovery::{self, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::error::{Error, Result};
use crate::ffmpeg::{FfmpegCommand, Toolchain};

/// Default output subdirectory when none is given.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "with_logo";

/// Corner the logo is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Corner {
    /// Top-right corner.
    #[default]
    TopRight,
    /// Top-left corner.
    TopLeft,
    /// Bottom-right corner.
    BottomRight,
    /// Bottom-left corner.
    BottomLeft,
}

impl Corner {
    /// Parse a corner name, falling back to top-right for anything unknown.
    #[must_use]
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("invalid position {name:?}, using top-right");
            Self::TopRight
        })
    }

    /// ffmpeg `overlay` position expression for this corner.
    #[must_use]
    pub fn position(self, margin: u32) -> String {
        match self {
            Self::TopRight => format!("W-w-{margin}:{margin}"),
            Self::TopLeft => format!("{margin}:{margin}"),
            Self::BottomRight => format!("W-w-{margin}:H-h-{margin}"),
            Self::BottomLeft => format!("{margin}:H-h-{margin}"),
        }
    }
}

impl FromStr for Corner {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-right" => Ok(Self::TopRight),
            "top-left" => Ok(Self::TopLeft),
            "bottom-right" => Ok(Self::BottomRight),
            "bottom-left" => Ok(Self::BottomLeft),
            other => Err(Error::InvalidOption(format!("unknown position: {other}"))),
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TopRight => "top-right",
            Self::TopLeft => "top-left",
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
        })
    }
}

/// Whether the overlay targets videos or still images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Video files; audio is stream-copied.
    Video,
    /// Still images.
    Image,
}

impl MediaKind {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Video => VIDEO_EXTENSIONS,
            Self::Image => IMAGE_EXTENSIONS,
        }
    }
}

/// Options controlling logo placement.
#[derive(Debug, Clone)]
pub struct LogoOptions {
    /// Corner to place the logo in.
    pub corner: Corner,
    /// Distance from the edges in pixels.
    pub margin: u32,
    /// Logo width as a fraction of the main input width.
    pub scale: f64,
}

impl Default for LogoOptions {
    fn default() -> Self {
        Self {
            corner: Corner::TopRight,
            margin: 10,
            scale: 0.15,
        }
    }
}

impl LogoOptions {
    /// Check option ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if `scale` is not in `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(Error::InvalidOption(format!(
                "logo scale must be in (0, 1], got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// The filter graph scaling input 1 and overlaying it on input 0.
    #[must_use]
    pub fn filter_graph(&self) -> String {
        format!(
            "[1:v]scale=iw*{}:-1[logo];[0:v][logo]overlay={}",
            self.scale,
            self.corner.position(self.margin)
        )
    }
}

/// Build the ffmpeg command overlaying `logo` onto `input`.
#[must_use]
pub fn overlay_command(
    input: &Path,
    logo: &Path,
    output: &Path,
    kind: MediaKind,
    opts: &LogoOptions,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(output)
        .input(input)
        .input(logo)
        .filter_complex(opts.filter_graph());
    match kind {
        MediaKind::Video => cmd.audio_codec("copy"),
        MediaKind::Image => cmd,
    }
}

/// Applies a logo to media files.
pub struct LogoStamper {
    tools: Toolchain,
    logo: PathBuf,
    kind: MediaKind,
    opts: LogoOptions,
}

impl LogoStamper {
    /// Create a stamper for `logo`.
    ///
    /// # Errors
    ///
    /// Fails if the logo does not exist or the options are out of range.
    pub fn new(tools: Toolchain, logo: &Path, kind: MediaKind, opts: LogoOptions) -> Result<Self> {
        if !logo.is_file() {
            return Err(Error::FileNotFound(logo.to_path_buf()));
        }
        opts.validate()?;
        Ok(Self {
            tools,
            logo: logo.to_path_buf(),
            kind,
            opts,
        })
    }

    /// Overlay the logo onto a single file.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        info!("processing {}", input.display());
        let cmd = overlay_command(input, &self.logo, output, self.kind, &self.opts);
        match batch::ensure_parent(output).and_then(|()| self.tools.run(&cmd)) {
            Ok(()) => ProcessResult::ok(input, output, "logo added"),
            Err(e) => ProcessResult::from_error(input, &e),
        }
    }

    /// Overlay the logo onto every matching file directly inside `input_dir`.
    ///
    /// Outputs keep their file names and go to `output_dir`, or to
    /// `<input_dir>/with_logo` when none is given.
    ///
    /// # Errors
    ///
    /// Fails if the input directory cannot be scanned or the output directory
    /// cannot be created. Per-file failures are reported in the results.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<ProcessResult>> {
        let files = discovery::find_files(input_dir, self.kind.extensions(), false)?;
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let out_dir = batch::prepare_output_dir(input_dir, output_dir, DEFAULT_OUTPUT_SUBDIR)?;
        info!(
            count = files.len(),
            position = %self.opts.corner,
            output = %out_dir.display(),
            "adding logo"
        );

        Ok(batch::process_parallel(
            &files,
            |input| out_dir.join(input.file_name().unwrap_or_default()),
            |input, output| self.process_file(input, output),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_positions() {
        assert_eq!(Corner::TopRight.position(10), "W-w-10:10");
        assert_eq!(Corner::TopLeft.position(10), "10:10");
        assert_eq!(Corner::BottomRight.position(20), "W-w-20:H-h-20");
        assert_eq!(Corner::BottomLeft.position(5), "5:H-h-5");
    }

    #[test]
    fn unknown_corner_falls_back_to_top_right() {
        assert_eq!(Corner::parse_or_default("middle"), Corner::TopRight);
        assert_eq!(Corner::parse_or_default("bottom-left"), Corner::BottomLeft);
        assert!("middle".parse::<Corner>().is_err());
    }

    #[test]
    fn filter_graph_uses_scale_and_position() {
        let opts = LogoOptions {
            corner: Corner::BottomRight,
            margin: 20,
            scale: 0.2,
        };
        assert_eq!(
            opts.filter_graph(),
            "[1:v]scale=iw*0.2:-1[logo];[0:v][logo]overlay=W-w-20:H-h-20"
        );
    }

    #[test]
    fn scale_out_of_range_is_rejected() {
        for scale in [0.0, -0.5, 1.5, f64::NAN] {
            let opts = LogoOptions {
                scale,
                ..LogoOptions::default()
            };
            assert!(opts.validate().is_err(), "scale {scale} accepted");
        }
        assert!(LogoOptions::default().validate().is_ok());
    }

    #[test]
    fn video_overlay_copies_audio_but_image_does_not() {
        let opts = LogoOptions::default();
        let video = overlay_command(
            Path::new("in.mp4"),
            Path::new("logo.png"),
            Path::new("out.mp4"),
            MediaKind::Video,
            &opts,
        )
        .build_args();
        let image = overlay_command(
            Path::new("in.jpg"),
            Path::new("logo.png"),
            Path::new("out.jpg"),
            MediaKind::Image,
            &opts,
        )
        .build_args();

        assert!(video.windows(2).any(|w| w[0] == "-codec:a" && w[1] == "copy"));
        assert!(!image.iter().any(|a| a == "-codec:a"));
    }

    #[test]
    fn missing_logo_is_rejected() {
        let tools = Toolchain::with_paths("ffmpeg", None);
        let err = LogoStamper::new(
            tools,
            Path::new("/no/such/logo.png"),
            MediaKind::Video,
            LogoOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
