//! Audio track extraction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::batch::{self, ProcessResult};
use crate::discovery::{self, VIDEO_EXTENSIONS};
use crate::error::{Error, Result};
use crate::ffmpeg::{FfmpegCommand, Toolchain};

/// Output audio container/codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// MP3 via libmp3lame.
    #[default]
    Mp3,
    /// 16-bit PCM, 44.1 kHz stereo.
    Wav,
    /// AAC in an ADTS stream.
    Aac,
    /// AAC in an MP4 audio container.
    M4a,
    /// Vorbis in Ogg.
    Ogg,
    /// Lossless FLAC.
    Flac,
}

impl AudioFormat {
    /// File extension, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
        }
    }

    /// Whether the bitrate setting affects this format.
    #[must_use]
    pub fn uses_bitrate(self) -> bool {
        !matches!(self, Self::Wav | Self::Flac)
    }

    /// Codec arguments for this format. `bitrate` is ignored by lossless formats.
    #[must_use]
    pub fn codec_args(self, bitrate: &str) -> Vec<String> {
        let mut args = vec!["-vn".to_string(), "-acodec".to_string()];
        match self {
            Self::Mp3 => args.push("libmp3lame".into()),
            Self::Aac | Self::M4a => args.push("aac".into()),
            Self::Ogg => args.push("libvorbis".into()),
            Self::Flac => args.push("flac".into()),
            Self::Wav => args.extend(
                ["pcm_s16le", "-ar", "44100", "-ac", "2"]
                    .into_iter()
                    .map(String::from),
            ),
        }
        if self.uses_bitrate() {
            args.push("-b:a".into());
            args.push(bitrate.to_string());
        }
        args
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "aac" => Ok(Self::Aac),
            "m4a" => Ok(Self::M4a),
            "ogg" => Ok(Self::Ogg),
            "flac" => Ok(Self::Flac),
            other => Err(Error::UnsupportedFormat(format!("audio format '{other}'"))),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Options for audio extraction.
#[derive(Debug, Clone)]
pub struct AudioOptions {
    /// Output format.
    pub format: AudioFormat,
    /// Bitrate for lossy formats, e.g. `192k`.
    pub bitrate: String,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            format: AudioFormat::Mp3,
            bitrate: "192k".to_string(),
        }
    }
}

impl AudioOptions {
    /// Check the bitrate looks like `128k`, `320K`, `1M` or a plain number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for anything else.
    pub fn validate(&self) -> Result<()> {
        let digits = self.bitrate.trim_end_matches(['k', 'K', 'M']);
        let suffix_len = self.bitrate.len() - digits.len();
        if digits.is_empty() || suffix_len > 1 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidOption(format!(
                "invalid audio bitrate: {}",
                self.bitrate
            )));
        }
        Ok(())
    }
}

/// Build the extraction command.
#[must_use]
pub fn extract_command(input: &Path, output: &Path, opts: &AudioOptions) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input(input)
        .output_args(opts.format.codec_args(&opts.bitrate))
}

/// `<dir or video dir>/<stem>.<ext>` for a video.
#[must_use]
pub fn default_output_path(video: &Path, out_dir: Option<&Path>, format: AudioFormat) -> PathBuf {
    match out_dir {
        Some(dir) => {
            let stem = video.file_stem().unwrap_or_default().to_string_lossy();
            dir.join(format!("{stem}.{}", format.extension()))
        }
        None => video.with_extension(format.extension()),
    }
}

/// Extracts audio tracks from videos.
pub struct AudioExtractor {
    tools: Toolchain,
    opts: AudioOptions,
}

impl AudioExtractor {
    /// Create an extractor.
    ///
    /// # Errors
    ///
    /// Fails if the bitrate is malformed.
    pub fn new(tools: Toolchain, opts: AudioOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self { tools, opts })
    }

    /// Extract the audio of one video. `output` defaults to the video path with
    /// the format's extension.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: Option<&Path>) -> ProcessResult {
        if !input.is_file() {
            return ProcessResult::from_error(input, &Error::FileNotFound(input.to_path_buf()));
        }
        let output =
            output.map_or_else(|| default_output_path(input, None, self.opts.format), Path::to_path_buf);

        info!(
            format = %self.opts.format,
            bitrate = %self.opts.bitrate,
            "extracting audio from {}",
            input.display()
        );

        let cmd = extract_command(input, &output, &self.opts);
        match batch::ensure_parent(&output).and_then(|()| self.tools.run(&cmd)) {
            Ok(()) => {
                let size = batch::file_size_mb(&output);
                ProcessResult::ok(input, &output, format!("extracted audio ({size:.2} MB)"))
            }
            Err(e) => ProcessResult::from_error(input, &e),
        }
    }

    /// Extract audio from every video directly inside `input_dir`.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be scanned or `output_dir` cannot be created.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<ProcessResult>> {
        let files = discovery::find_files(input_dir, VIDEO_EXTENSIONS, false)?;
        if let Some(dir) = output_dir {
            std::fs::create_dir_all(dir)?;
        }
        info!(count = files.len(), "extracting audio");

        Ok(batch::process_parallel(
            &files,
            |video| default_output_path(video, output_dir, self.opts.format),
            |video, output| self.process_file(video, Some(output)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_case_insensitive() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!(".flac".parse::<AudioFormat>().unwrap(), AudioFormat::Flac);
        assert!(matches!(
            "opus".parse::<AudioFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn codec_args_per_format() {
        assert_eq!(
            AudioFormat::Mp3.codec_args("320k"),
            ["-vn", "-acodec", "libmp3lame", "-b:a", "320k"]
        );
        assert_eq!(
            AudioFormat::Wav.codec_args("320k"),
            ["-vn", "-acodec", "pcm_s16le", "-ar", "44100", "-ac", "2"]
        );
        assert_eq!(
            AudioFormat::M4a.codec_args("128k"),
            ["-vn", "-acodec", "aac", "-b:a", "128k"]
        );
        assert_eq!(
            AudioFormat::Ogg.codec_args("192k"),
            ["-vn", "-acodec", "libvorbis", "-b:a", "192k"]
        );
        assert_eq!(AudioFormat::Flac.codec_args("192k"), ["-vn", "-acodec", "flac"]);
    }

    #[test]
    fn bitrate_validation() {
        for ok in ["192k", "320K", "1M", "96000"] {
            let opts = AudioOptions {
                bitrate: ok.to_string(),
                ..AudioOptions::default()
            };
            assert!(opts.validate().is_ok(), "{ok} rejected");
        }
        for bad in ["", "k", "fast", "192kk", "-5k"] {
            let opts = AudioOptions {
                bitrate: bad.to_string(),
                ..AudioOptions::default()
            };
            assert!(opts.validate().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn default_output_paths() {
        assert_eq!(
            default_output_path(Path::new("/v/talk.mp4"), None, AudioFormat::Wav),
            PathBuf::from("/v/talk.wav")
        );
        assert_eq!(
            default_output_path(Path::new("/v/talk.mp4"), Some(Path::new("/a")), AudioFormat::Mp3),
            PathBuf::from("/a/talk.mp3")
        );
    }

    #[test]
    fn missing_input_fails_without_running_ffmpeg() {
        let extractor =
            AudioExtractor::new(Toolchain::with_paths("ffmpeg", None), AudioOptions::default())
                .unwrap();
        let result = extractor.process_file(Path::new("/no/such/video.mp4"), None);
        assert!(!result.success);
        assert!(result.message.contains("file not found"));
    }
}
