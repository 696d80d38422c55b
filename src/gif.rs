//! Two-pass palette GIF conversion.
//!
//! The first pass builds an optimized palette from the (scaled, resampled)
//! clip; the second pass quantizes the clip against that palette. The palette
//! image lives in a temporary directory that is removed when conversion ends.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::batch::{self, ProcessResult};
use crate::discovery::{self, VIDEO_EXTENSIONS};
use crate::error::{Error, Result};
use crate::ffmpeg::{FfmpegCommand, Toolchain};

/// Palette size and dithering preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GifQuality {
    /// 128 colors, coarse Bayer dithering.
    Low,
    /// 256 colors, Bayer dithering.
    #[default]
    Medium,
    /// 256 colors, Floyd-Steinberg error diffusion.
    High,
}

impl GifQuality {
    /// Maximum palette size.
    #[must_use]
    pub fn max_colors(self) -> u32 {
        match self {
            Self::Low => 128,
            Self::Medium | Self::High => 256,
        }
    }

    /// `paletteuse` dither setting.
    #[must_use]
    pub fn dither(self) -> &'static str {
        match self {
            Self::Low => "bayer:bayer_scale=3",
            Self::Medium => "bayer:bayer_scale=5",
            Self::High => "floyd_steinberg",
        }
    }

    /// Parse a quality name, falling back to medium for anything unknown.
    #[must_use]
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("invalid quality {name:?}, using medium");
            Self::Medium
        })
    }
}

impl FromStr for GifQuality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::InvalidOption(format!("unknown quality: {other}"))),
        }
    }
}

impl fmt::Display for GifQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Options for GIF conversion.
#[derive(Debug, Clone)]
pub struct GifOptions {
    /// Output frame rate.
    pub fps: u32,
    /// Output width in pixels; height follows the aspect ratio.
    pub width: Option<u32>,
    /// Palette preset.
    pub quality: GifQuality,
    /// Start offset in seconds.
    pub start: Option<f64>,
    /// Segment length in seconds.
    pub duration: Option<f64>,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            fps: 10,
            width: None,
            quality: GifQuality::Medium,
            start: None,
            duration: None,
        }
    }
}

impl GifOptions {
    /// Check option ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for a zero fps or width, or a negative
    /// or non-finite start/duration.
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(Error::InvalidOption("fps must be at least 1".to_string()));
        }
        if self.width == Some(0) {
            return Err(Error::InvalidOption("width must be at least 1".to_string()));
        }
        if let Some(start) = self.start {
            if !start.is_finite() || start < 0.0 {
                return Err(Error::InvalidOption(format!("invalid start time: {start}")));
            }
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(Error::InvalidOption(format!("invalid duration: {duration}")));
            }
        }
        Ok(())
    }

    /// Same options without a segment, for directory runs.
    #[must_use]
    pub fn without_segment(&self) -> Self {
        Self {
            start: None,
            duration: None,
            ..self.clone()
        }
    }

    fn scale_filter(&self) -> String {
        match self.width {
            Some(w) => format!("scale={w}:-1:flags=lanczos"),
            None => "scale=iw:ih:flags=lanczos".to_string(),
        }
    }

    /// Filter chain for the palette generation pass.
    #[must_use]
    pub fn palette_filter(&self) -> String {
        format!(
            "{},fps={},palettegen=max_colors={}:stats_mode=diff",
            self.scale_filter(),
            self.fps,
            self.quality.max_colors()
        )
    }

    /// Filter graph for the encoding pass; the palette is input 1.
    #[must_use]
    pub fn encode_filter(&self) -> String {
        format!(
            "{},fps={}[x];[x][1:v]paletteuse=dither={}",
            self.scale_filter(),
            self.fps,
            self.quality.dither()
        )
    }

    fn with_segment(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        let cmd = match self.start {
            Some(s) => cmd.seek(s),
            None => cmd,
        };
        match self.duration {
            Some(d) => cmd.duration(d),
            None => cmd,
        }
    }
}

/// Build the palette generation command.
#[must_use]
pub fn palette_command(input: &Path, palette: &Path, opts: &GifOptions) -> FfmpegCommand {
    opts.with_segment(FfmpegCommand::new(palette))
        .input(input)
        .video_filter(opts.palette_filter())
}

/// Build the palette-constrained encoding command.
#[must_use]
pub fn encode_command(input: &Path, palette: &Path, output: &Path, opts: &GifOptions) -> FfmpegCommand {
    opts.with_segment(FfmpegCommand::new(output))
        .input(input)
        .input(palette)
        .filter_complex(opts.encode_filter())
        .output_args(["-loop", "0"])
}

/// `<dir or video dir>/<stem>.gif` for a video.
#[must_use]
pub fn default_output_path(video: &Path, out_dir: Option<&Path>) -> PathBuf {
    match out_dir {
        Some(dir) => {
            let stem = video.file_stem().unwrap_or_default().to_string_lossy();
            dir.join(format!("{stem}.gif"))
        }
        None => video.with_extension("gif"),
    }
}

/// Success message for a finished GIF, with its size.
fn created_message(output: &Path) -> String {
    format!("created GIF ({:.2} MB)", batch::file_size_mb(output))
}

/// Converts video clips to animated GIFs.
pub struct GifConverter {
    tools: Toolchain,
    opts: GifOptions,
}

impl GifConverter {
    /// Create a converter.
    ///
    /// # Errors
    ///
    /// Fails if the options are out of range.
    pub fn new(tools: Toolchain, opts: GifOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self { tools, opts })
    }

    /// Run both passes for one video.
    ///
    /// # Errors
    ///
    /// Fails if the temporary directory cannot be created or either pass fails.
    pub fn convert(&self, input: &Path, output: &Path, opts: &GifOptions) -> Result<()> {
        if !input.is_file() {
            return Err(Error::FileNotFound(input.to_path_buf()));
        }
        batch::ensure_parent(output)?;

        let scratch = tempfile::Builder::new().prefix("gif-palette-").tempdir()?;
        let palette = scratch.path().join("palette.png");

        info!(fps = opts.fps, quality = %opts.quality, "generating palette for {}", input.display());
        self.tools.run(&palette_command(input, &palette, opts))?;

        info!("encoding {}", output.display());
        self.tools.run(&encode_command(input, &palette, output, opts))
    }

    /// Convert one video. `output` defaults to `<stem>.gif` beside it.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: Option<&Path>) -> ProcessResult {
        let output = output.map_or_else(|| default_output_path(input, None), Path::to_path_buf);
        self.convert_and_report(input, &output, &self.opts)
    }

    fn convert_and_report(&self, input: &Path, output: &Path, opts: &GifOptions) -> ProcessResult {
        match self.convert(input, output, opts) {
            Ok(()) => ProcessResult::ok(input, output, created_message(output)),
            Err(e) => ProcessResult::from_error(input, &e),
        }
    }

    /// Convert every video directly inside `input_dir`.
    ///
    /// Start and duration only make sense per clip, so they are ignored here.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be scanned or `output_dir` cannot be created.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<ProcessResult>> {
        if self.opts.start.is_some() || self.opts.duration.is_some() {
            warn!("--start and --duration are ignored when processing directories");
        }
        let opts = self.opts.without_segment();

        let files = discovery::find_files(input_dir, VIDEO_EXTENSIONS, false)?;
        if let Some(dir) = output_dir {
            std::fs::create_dir_all(dir)?;
        }
        info!(count = files.len(), "converting videos to GIF");

        Ok(batch::process_parallel(
            &files,
            |video| default_output_path(video, output_dir),
            |video, output| self.convert_and_report(video, output, &opts),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cmd: &FfmpegCommand) -> Vec<String> {
        cmd.build_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn quality_presets() {
        assert_eq!(GifQuality::Low.max_colors(), 128);
        assert_eq!(GifQuality::Low.dither(), "bayer:bayer_scale=3");
        assert_eq!(GifQuality::Medium.max_colors(), 256);
        assert_eq!(GifQuality::Medium.dither(), "bayer:bayer_scale=5");
        assert_eq!(GifQuality::High.max_colors(), 256);
        assert_eq!(GifQuality::High.dither(), "floyd_steinberg");
        assert_eq!(GifQuality::parse_or_default("ultra"), GifQuality::Medium);
    }

    #[test]
    fn filters_without_width_keep_source_size() {
        let opts = GifOptions::default();
        assert_eq!(
            opts.palette_filter(),
            "scale=iw:ih:flags=lanczos,fps=10,palettegen=max_colors=256:stats_mode=diff"
        );
        assert_eq!(
            opts.encode_filter(),
            "scale=iw:ih:flags=lanczos,fps=10[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=5"
        );
    }

    #[test]
    fn filters_with_width_and_low_quality() {
        let opts = GifOptions {
            fps: 15,
            width: Some(480),
            quality: GifQuality::Low,
            ..GifOptions::default()
        };
        assert_eq!(
            opts.palette_filter(),
            "scale=480:-1:flags=lanczos,fps=15,palettegen=max_colors=128:stats_mode=diff"
        );
    }

    #[test]
    fn segment_applies_to_video_input_only() {
        let opts = GifOptions {
            start: Some(10.0),
            duration: Some(5.0),
            ..GifOptions::default()
        };
        let args = strings(&encode_command(
            Path::new("in.mp4"),
            Path::new("palette.png"),
            Path::new("out.gif"),
            &opts,
        ));
        let first_input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(&args[2..first_input], ["-ss", "10.000", "-t", "5.000"]);
        assert_eq!(args[first_input + 1], "in.mp4");
        assert_eq!(args[first_input + 2..first_input + 4], ["-i", "palette.png"]);
        assert!(args.windows(2).any(|w| w[0] == "-loop" && w[1] == "0"));

        let palette = strings(&palette_command(Path::new("in.mp4"), Path::new("p.png"), &opts));
        assert!(palette.contains(&"-ss".to_string()));
        assert!(palette.contains(&"-vf".to_string()));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad = [
            GifOptions { fps: 0, ..GifOptions::default() },
            GifOptions { width: Some(0), ..GifOptions::default() },
            GifOptions { start: Some(-1.0), ..GifOptions::default() },
            GifOptions { duration: Some(0.0), ..GifOptions::default() },
        ];
        for opts in bad {
            assert!(opts.validate().is_err(), "{opts:?} accepted");
        }
        assert!(GifOptions::default().validate().is_ok());
    }

    #[test]
    fn without_segment_clears_start_and_duration() {
        let opts = GifOptions {
            start: Some(1.0),
            duration: Some(2.0),
            width: Some(320),
            ..GifOptions::default()
        };
        let stripped = opts.without_segment();
        assert_eq!(stripped.start, None);
        assert_eq!(stripped.duration, None);
        assert_eq!(stripped.width, Some(320));
    }

    #[test]
    fn created_message_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("clip.gif");
        std::fs::write(&gif, vec![0u8; 3 * 512 * 1024]).unwrap();
        assert_eq!(created_message(&gif), "created GIF (1.50 MB)");
    }

    #[test]
    fn default_output_paths() {
        assert_eq!(
            default_output_path(Path::new("/v/clip.mov"), None),
            PathBuf::from("/v/clip.gif")
        );
        assert_eq!(
            default_output_path(Path::new("/v/clip.mov"), Some(Path::new("/g"))),
            PathBuf::from("/g/clip.gif")
        );
    }
}
