use std::path::PathBuf;

use clap::Parser;

use media_batch::cli::{self, OutputArgs};
use media_batch::discovery::is_supported_video;
use media_batch::{GifConverter, GifOptions, GifQuality, Toolchain};

#[derive(Parser)]
#[command(
    name = "video-to-gif",
    about = "Convert a video, or every video in a directory, to an animated GIF",
    version,
    after_help = "Quality levels:\n  \
                  low     128 colors, smaller file\n  \
                  medium  256 colors, balanced\n  \
                  high    256 colors, best dithering\n\n\
                  Examples:\n  \
                  video-to-gif video.mp4 --width 480 --fps 15 --quality high\n  \
                  video-to-gif video.mp4 --start 10 --duration 5\n  \
                  video-to-gif videos/ --output gifs/ --width 640 --fps 20"
)]
struct Cli {
    /// Input video file or directory
    input: PathBuf,

    /// Output file (single input) or directory (directory input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Frames per second; lower is smaller, higher is smoother
    #[arg(long, default_value_t = 10)]
    fps: u32,

    /// Width in pixels; height keeps the aspect ratio
    #[arg(short, long)]
    width: Option<u32>,

    /// Quality: low, medium, high
    #[arg(long, default_value = "medium")]
    quality: String,

    /// Start time in seconds (single file only)
    #[arg(long)]
    start: Option<f64>,

    /// Duration in seconds (single file only)
    #[arg(long)]
    duration: Option<f64>,

    #[command(flatten)]
    out: OutputArgs,
}

fn main() {
    let cli = Cli::parse();
    cli.out.init_logging();

    let opts = GifOptions {
        fps: cli.fps,
        width: cli.width,
        quality: GifQuality::parse_or_default(&cli.quality),
        start: cli.start,
        duration: cli.duration,
    };
    let tools = Toolchain::discover().unwrap_or_else(|e| cli::fatal(e));
    let converter = GifConverter::new(tools, opts).unwrap_or_else(|e| cli::fatal(e));

    let results = if cli.input.is_file() {
        if !is_supported_video(&cli.input) {
            tracing::warn!("{} does not look like a video file", cli.input.display());
        }
        vec![converter.process_file(&cli.input, cli.output.as_deref())]
    } else if cli.input.is_dir() {
        converter
            .process_directory(&cli.input, cli.output.as_deref())
            .unwrap_or_else(|e| cli::fatal(e))
    } else {
        cli::fatal(format!(
            "'{}' is not a valid file or directory",
            cli.input.display()
        ));
    };

    cli::report(&results, "video", cli.out);
}
