//! Face-centered circular crops of whole videos.
//!
//! The pipeline is straight-line: ffmpeg extracts every frame as PNG into a
//! scratch directory, the face is located once on the first frame, the same
//! crop is applied to every frame in parallel, and ffmpeg re-encodes the
//! masked frames into a container that keeps the alpha channel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::ImageFormat;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};

use crate::batch::{self, ProcessResult};
use crate::circular_image::{self, CircularOptions, CropPlan, CIRCULAR_MARKER};
use crate::discovery::{self, MarkerScope, CIRCULAR_VIDEO_EXTENSIONS};
use crate::error::{Error, Result};
use crate::face::FaceDetector;
use crate::ffmpeg::{FfmpegCommand, Toolchain};
use crate::geometry::CropBox;
use crate::mask::{self, CircleMask};

/// Default output subdirectory when none is given.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "output";

/// Frame file name pattern shared by extraction and encoding.
const FRAME_PATTERN: &str = "frame_%06d.png";

/// How often per-frame progress is logged.
const PROGRESS_EVERY: usize = 30;

/// Options for circular video conversion.
#[derive(Debug, Clone, Default)]
pub struct VideoCircularOptions {
    /// Output size and face padding.
    pub circular: CircularOptions,
    /// Number of frame workers; defaults to the number of CPUs.
    pub workers: Option<usize>,
}

/// Container for the circular output. Both keep an alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaContainer {
    /// QuickTime with the lossless PNG codec.
    Mov,
    /// WebM with VP9 and a `yuva420p` pixel format.
    Webm,
}

impl AlphaContainer {
    /// Pick the container for a requested output path.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("webm") => Self::Webm,
            _ => Self::Mov,
        }
    }

    fn codec_args(self) -> &'static [&'static str] {
        match self {
            Self::Mov => &["-c:v", "png"],
            Self::Webm => &["-c:v", "libvpx-vp9", "-pix_fmt", "yuva420p"],
        }
    }
}

/// Keep `.mov`/`.webm` outputs as they are and move anything else to `.mov`.
#[must_use]
pub fn alpha_output_path(path: &Path) -> PathBuf {
    let keeps_alpha = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mov") || e.eq_ignore_ascii_case("webm"));
    if keeps_alpha {
        path.to_path_buf()
    } else {
        path.with_extension("mov")
    }
}

/// `<out_dir>/<stem>_circular.mov`.
#[must_use]
pub fn output_path_for(video: &Path, out_dir: &Path) -> PathBuf {
    let stem = video.file_stem().unwrap_or_default().to_string_lossy();
    out_dir.join(format!("{stem}_{CIRCULAR_MARKER}.mov"))
}

/// Build the command that dumps every frame of `input` into `frames_dir`.
#[must_use]
pub fn extract_frames_command(input: &Path, frames_dir: &Path) -> FfmpegCommand {
    FfmpegCommand::new(frames_dir.join(FRAME_PATTERN))
        .input(input)
        .output_args(["-start_number", "0"])
}

/// Build the command that encodes the frames in `frames_dir` at `fps`.
#[must_use]
pub fn encode_frames_command(frames_dir: &Path, fps: f64, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_arg("-framerate")
        .input_arg(fps.to_string())
        .input_arg("-start_number")
        .input_arg("0")
        .input(frames_dir.join(FRAME_PATTERN))
        .output_args(AlphaContainer::for_path(output).codec_args().iter().copied())
}

/// Outcome of converting one video.
#[derive(Debug, Clone)]
pub struct VideoConversion {
    /// File written.
    pub output: PathBuf,
    /// Crop applied to every frame.
    pub plan: CropPlan,
    /// Number of frames processed.
    pub frames: usize,
}

/// Turns videos into face-centered circular clips with transparency.
pub struct CircularVideoProcessor {
    tools: Toolchain,
    detector: Option<Box<dyn FaceDetector>>,
    opts: VideoCircularOptions,
    mask: CircleMask,
    pool: ThreadPool,
}

impl CircularVideoProcessor {
    /// Create a processor with its frame worker pool.
    ///
    /// # Errors
    ///
    /// Fails if the options are out of range or the pool cannot be started.
    pub fn new(
        tools: Toolchain,
        detector: Option<Box<dyn FaceDetector>>,
        opts: VideoCircularOptions,
    ) -> Result<Self> {
        opts.circular.validate()?;
        if opts.workers == Some(0) {
            return Err(Error::InvalidOption("workers must be at least 1".to_string()));
        }
        let mask = CircleMask::new(opts.circular.output_size)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.workers.unwrap_or(0))
            .thread_name(|i| format!("circular-frame-{i}"))
            .build()
            .map_err(|e| Error::InvalidOption(format!("failed to start worker pool: {e}")))?;
        Ok(Self {
            tools,
            detector,
            opts,
            mask,
            pool,
        })
    }

    /// Number of frame workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Convert one video. `output` is moved to `.mov` unless it already names
    /// an alpha-capable container.
    ///
    /// # Errors
    ///
    /// Fails on probe, extraction, per-frame, or encoding errors. The scratch
    /// directory is removed either way.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<VideoConversion> {
        let info = self.tools.probe(input)?;
        info!(
            "{}: {}x{}, {:.2} fps, {} frames",
            input.display(),
            info.width,
            info.height,
            info.fps,
            info.frame_count
                .map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        let scratch = tempfile::Builder::new().prefix("circular-video-").tempdir()?;
        let frames_dir = scratch.path().join("frames");
        let masked_dir = scratch.path().join(CIRCULAR_MARKER);
        std::fs::create_dir_all(&frames_dir)?;
        std::fs::create_dir_all(&masked_dir)?;

        self.tools.run(&extract_frames_command(input, &frames_dir))?;
        let frames = discovery::find_files(&frames_dir, &["png"], false)?;
        let first = frames
            .first()
            .ok_or_else(|| Error::NoFrames(input.to_path_buf()))?;

        let plan = circular_image::plan_crop(
            self.detector.as_deref(),
            &image::open(first)?,
            self.opts.circular.padding,
        )?;
        match plan.face {
            Some(face) => info!(
                "face detected at ({}, {}) - centering on face",
                face.center_x, face.center_y
            ),
            None => info!("no face detected - using center crop"),
        }

        self.mask_frames(&frames, &masked_dir, plan.crop)?;

        let output = alpha_output_path(output);
        batch::ensure_parent(&output)?;
        info!("encoding {}", output.display());
        self.tools
            .run(&encode_frames_command(&masked_dir, info.fps, &output))?;

        Ok(VideoConversion {
            output,
            plan,
            frames: frames.len(),
        })
    }

    /// Crop and mask every frame on the worker pool. Frames keep their file
    /// names, so completion order does not matter.
    fn mask_frames(&self, frames: &[PathBuf], out_dir: &Path, crop: CropBox) -> Result<()> {
        let done = AtomicUsize::new(0);
        let total = frames.len();

        self.pool.install(|| {
            frames.par_iter().try_for_each(|frame| {
                let name = frame
                    .file_name()
                    .ok_or_else(|| Error::NoFrames(frame.clone()))?;
                let masked = mask::circular_frame(&image::open(frame)?, crop, &self.mask)?;
                masked.save_with_format(out_dir.join(name), ImageFormat::Png)?;

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_EVERY == 0 {
                    debug!("processed {n}/{total} frames");
                }
                Ok(())
            })
        })
    }

    /// Convert one video, reporting the outcome.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        match self.convert(input, output) {
            Ok(done) => {
                let framing = if done.plan.face.is_some() {
                    "centered on face"
                } else {
                    "center crop"
                };
                ProcessResult::ok(
                    input,
                    &done.output,
                    format!("{} frames, {framing}", done.frames),
                )
            }
            Err(e) => ProcessResult::from_error(input, &e),
        }
    }

    /// Convert every video directly inside `input_dir`, one at a time.
    ///
    /// Files whose stem contains `circular` or `temp_` are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be scanned or the output directory cannot
    /// be created.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<ProcessResult>> {
        let files = discovery::find_files(input_dir, CIRCULAR_VIDEO_EXTENSIONS, false)?;
        let files = discovery::exclude_marked(files, &[CIRCULAR_MARKER, "temp_"], &MarkerScope::Stem);
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let out_dir = batch::prepare_output_dir(input_dir, output_dir, DEFAULT_OUTPUT_SUBDIR)?;
        info!(
            count = files.len(),
            size = self.opts.circular.output_size,
            workers = self.workers(),
            "converting videos to circular"
        );

        Ok(files
            .iter()
            .map(|video| self.process_file(video, &output_path_for(video, &out_dir)))
            .collect())
    }
}
