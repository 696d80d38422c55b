use std::path::{Path, PathBuf};

use clap::Parser;

use media_batch::circular_video::{output_path_for, DEFAULT_OUTPUT_SUBDIR};
use media_batch::cli::{self, OutputArgs};
use media_batch::face::FACE_MODEL_ENV;
use media_batch::{
    CircularOptions, CircularVideoProcessor, FaceDetector, RustfaceDetector, Toolchain,
    VideoCircularOptions,
};

#[derive(Parser)]
#[command(
    name = "make-video-circular",
    about = "Crop videos to face-centered circles with a transparent background",
    version,
    after_help = "The face is located on the first frame and the same crop is applied to\n\
                  every frame. Output is written as .mov (PNG codec) unless .webm is given.\n\n\
                  Examples:\n  \
                  make-video-circular clips/\n  \
                  make-video-circular clips/ output --size 500 --workers 4"
)]
struct Cli {
    /// Input directory or a single video
    input: PathBuf,

    /// Output directory (default: <input>/output)
    output: Option<PathBuf>,

    /// Output resolution in pixels
    #[arg(long, default_value_t = 500)]
    size: u32,

    /// Crop side as a multiple of the detected face size
    #[arg(long, default_value_t = 2.5)]
    padding: f64,

    /// Frame worker threads (default: number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// SeetaFace frontal face model
    #[arg(long, env = FACE_MODEL_ENV)]
    model: Option<PathBuf>,

    #[command(flatten)]
    out: OutputArgs,
}

fn main() {
    let cli = Cli::parse();
    cli.out.init_logging();

    let detector = RustfaceDetector::from_config(cli.model.as_deref())
        .unwrap_or_else(|e| cli::fatal(e))
        .map(|d| Box::new(d) as Box<dyn FaceDetector>);
    if detector.is_none() {
        tracing::warn!("no face model configured (--model or {FACE_MODEL_ENV}); using center crops");
    }

    let opts = VideoCircularOptions {
        circular: CircularOptions {
            output_size: cli.size,
            padding: cli.padding,
        },
        workers: cli.workers,
    };
    let tools = Toolchain::discover().unwrap_or_else(|e| cli::fatal(e));
    let processor =
        CircularVideoProcessor::new(tools, detector, opts).unwrap_or_else(|e| cli::fatal(e));

    let results = if cli.input.is_file() {
        let out_dir = cli.output.clone().unwrap_or_else(|| {
            cli.input
                .parent()
                .unwrap_or(Path::new("."))
                .join(DEFAULT_OUTPUT_SUBDIR)
        });
        vec![processor.process_file(&cli.input, &output_path_for(&cli.input, &out_dir))]
    } else {
        processor
            .process_directory(&cli.input, cli.output.as_deref())
            .unwrap_or_else(|e| cli::fatal(e))
    };

    cli::report(&results, "video", cli.out);
}
