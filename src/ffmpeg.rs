//! FFmpeg command builder, runner and ffprobe wrapper.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable overriding the ffmpeg binary.
pub const FFMPEG_ENV: &str = "MEDIA_BATCH_FFMPEG";
/// Environment variable overriding the ffprobe binary.
pub const FFPROBE_ENV: &str = "MEDIA_BATCH_FFPROBE";

#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for a single ffmpeg invocation.
///
/// Inputs are numbered in the order they are added, so the first call to
/// [`FfmpegCommand::input`] is `[0:v]` in filter graphs, the second `[1:v]`.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    pending_input_args: Vec<String>,
    output_args: Vec<String>,
    output: PathBuf,
}

impl FfmpegCommand {
    /// Create a command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            pending_input_args: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
        }
    }

    /// Add an input argument that applies to the next [`FfmpegCommand::input`].
    #[must_use]
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.pending_input_args.push(arg.into());
        self
    }

    /// Add an input file, consuming any pending input arguments.
    #[must_use]
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(Input {
            args: std::mem::take(&mut self.pending_input_args),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Seek the next input to `seconds`.
    #[must_use]
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format_seconds(seconds))
    }

    /// Limit how much of the next input is read.
    #[must_use]
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format_seconds(seconds))
    }

    /// Add an output argument.
    #[must_use]
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add several output arguments.
    #[must_use]
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a simple video filter chain.
    #[must_use]
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set a filter graph.
    #[must_use]
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Set the video codec.
    #[must_use]
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set the audio codec.
    #[must_use]
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-codec:a").output_arg(codec)
    }

    /// Set the audio bitrate, e.g. `192k`.
    #[must_use]
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Drop the video stream.
    #[must_use]
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// The output path this command writes to.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the argument vector, excluding the program name.
    #[must_use]
    pub fn build_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-y".into()];

        for input in &self.inputs {
            args.extend(input.args.iter().map(OsString::from));
            args.push("-i".into());
            args.push(input.path.clone().into_os_string());
        }

        args.extend(self.output_args.iter().map(OsString::from));
        args.push(self.output.clone().into_os_string());
        args
    }
}

fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.3}")
}

/// Video stream properties reported by ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate.
    pub fps: f64,
    /// Frame count, when the container records it.
    pub frame_count: Option<u64>,
    /// Duration in seconds.
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse an ffprobe rational such as `30000/1001`.
///
/// Returns `None` for `0/0` and other non-positive rates.
#[must_use]
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Interpret ffprobe `-print_format json` output.
///
/// # Errors
///
/// Returns [`Error::Json`] for malformed output and [`Error::Probe`] when no
/// usable video stream is present.
pub fn parse_probe_output(json: &[u8]) -> Result<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| Error::Probe("no video stream found".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(Error::Probe("video stream has no dimensions".to_string())),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| Error::Probe("video stream has no frame rate".to_string()))?;

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count: stream.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        duration,
    })
}

/// Resolved locations of the external binaries.
#[derive(Debug, Clone)]
pub struct Toolchain {
    ffmpeg: PathBuf,
    ffprobe: Option<PathBuf>,
}

impl Toolchain {
    /// Resolve ffmpeg (required) and ffprobe (optional).
    ///
    /// `MEDIA_BATCH_FFMPEG`/`MEDIA_BATCH_FFPROBE` take precedence over `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] if ffmpeg cannot be located.
    pub fn discover() -> Result<Self> {
        let ffmpeg = resolve_tool("ffmpeg", FFMPEG_ENV).ok_or_else(|| Error::ToolNotFound {
            tool: "ffmpeg".to_string(),
        })?;
        let ffprobe = resolve_tool("ffprobe", FFPROBE_ENV);
        debug!(ffmpeg = %ffmpeg.display(), ffprobe = ?ffprobe, "resolved toolchain");
        Ok(Self { ffmpeg, ffprobe })
    }

    /// Use explicit binary paths without any lookup.
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe,
        }
    }

    /// Path of the ffmpeg binary.
    #[must_use]
    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    /// Run an ffmpeg command to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the process cannot be spawned and
    /// [`Error::FfmpegFailed`] (with captured stderr) on a non-zero exit.
    pub fn run(&self, cmd: &FfmpegCommand) -> Result<()> {
        let args = cmd.build_args();
        debug!(
            "running {} {}",
            self.ffmpeg.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .output()?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::ffmpeg_failed(
                "ffmpeg exited unsuccessfully",
                Some(String::from_utf8_lossy(&output.stderr).into_owned()),
                output.status.code(),
            ))
        }
    }

    /// Probe a video file for its dimensions and frame rate.
    ///
    /// # Errors
    ///
    /// Fails if ffprobe is unavailable, exits unsuccessfully, or reports no
    /// usable video stream.
    pub fn probe(&self, path: &Path) -> Result<VideoInfo> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let ffprobe = self.ffprobe.as_ref().ok_or_else(|| Error::ToolNotFound {
            tool: "ffprobe".to_string(),
        })?;

        let output = Command::new(ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(Error::ffmpeg_failed(
                "ffprobe exited unsuccessfully",
                Some(String::from_utf8_lossy(&output.stderr).into_owned()),
                output.status.code(),
            ));
        }

        parse_probe_output(&output.stdout)
    }
}

fn resolve_tool(name: &str, env_var: &str) -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(env_var).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn input_args_bind_to_following_input() {
        let cmd = FfmpegCommand::new("out.gif")
            .seek(10.0)
            .duration(5.0)
            .input("in.mp4")
            .input("palette.png")
            .filter_complex("[0:v][1:v]paletteuse");

        assert_eq!(
            strings(&cmd.build_args()),
            vec![
                "-hide_banner",
                "-y",
                "-ss",
                "10.000",
                "-t",
                "5.000",
                "-i",
                "in.mp4",
                "-i",
                "palette.png",
                "-filter_complex",
                "[0:v][1:v]paletteuse",
                "out.gif",
            ]
        );
    }

    #[test]
    fn output_path_is_last_argument() {
        let cmd = FfmpegCommand::new("song.mp3")
            .input("clip.mov")
            .no_video()
            .audio_bitrate("192k");
        let args = strings(&cmd.build_args());
        assert_eq!(args.last().map(String::as_str), Some("song.mp3"));
        assert_eq!(cmd.output_path(), Path::new("song.mp3"));
    }

    #[test]
    fn frame_rate_parsing() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn probe_output_picks_video_stream() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "r_frame_rate": "0/0"},
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "avg_frame_rate": "0/0", "r_frame_rate": "24/1", "nb_frames": "240"}
            ],
            "format": {"duration": "10.000000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.fps, 24.0);
        assert_eq!(info.frame_count, Some(240));
        assert!((info.duration - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn probe_output_without_video_is_an_error() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(parse_probe_output(json), Err(Error::Probe(_))));
    }
}
