use std::path::PathBuf;

use clap::Parser;

use media_batch::cli::{self, OutputArgs};
use media_batch::discovery::is_supported_video;
use media_batch::{AudioExtractor, AudioFormat, AudioOptions, Toolchain};

#[derive(Parser)]
#[command(
    name = "extract-audio",
    about = "Extract the audio track from a video, or from every video in a directory",
    version,
    after_help = "Examples:\n  \
                  extract-audio video.mp4\n  \
                  extract-audio video.mp4 --format wav\n  \
                  extract-audio video.mp4 --output audio.mp3 --quality 320k\n  \
                  extract-audio videos/ --output audio/ --format mp3"
)]
struct Cli {
    /// Input video file or directory
    input: PathBuf,

    /// Output file (single input) or directory (directory input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Audio format: mp3, wav, aac, ogg, flac, m4a
    #[arg(short, long, default_value = "mp3")]
    format: AudioFormat,

    /// Bitrate for compressed formats, e.g. 128k, 192k, 256k, 320k
    #[arg(long, default_value = "192k")]
    quality: String,

    #[command(flatten)]
    out: OutputArgs,
}

fn main() {
    let cli = Cli::parse();
    cli.out.init_logging();

    let opts = AudioOptions {
        format: cli.format,
        bitrate: cli.quality.clone(),
    };
    let tools = Toolchain::discover().unwrap_or_else(|e| cli::fatal(e));
    let extractor = AudioExtractor::new(tools, opts).unwrap_or_else(|e| cli::fatal(e));

    let results = if cli.input.is_file() {
        if !is_supported_video(&cli.input) {
            tracing::warn!("{} does not look like a video file", cli.input.display());
        }
        vec![extractor.process_file(&cli.input, cli.output.as_deref())]
    } else if cli.input.is_dir() {
        extractor
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
