use std::path::PathBuf;

use clap::Parser;

use media_batch::circular_image::output_path_for;
use media_batch::cli::{self, OutputArgs};
use media_batch::discovery::is_supported_image;
use media_batch::face::FACE_MODEL_ENV;
use media_batch::{CircularImageProcessor, CircularOptions, FaceDetector, RustfaceDetector};

#[derive(Parser)]
#[command(
    name = "make-circular",
    about = "Crop images to face-centered circles with transparent corners",
    version,
    after_help = "Without a face model every image is center-cropped.\n\n\
                  Examples:\n  \
                  make-circular portraits/\n  \
                  make-circular portraits/ circular_output --size 500 --model seeta_fd_frontal_v1.0.bin"
)]
struct Cli {
    /// Input directory (searched recursively) or a single image
    input: PathBuf,

    /// Output directory (default: a `circular` folder next to each image)
    output: Option<PathBuf>,

    /// Output resolution in pixels
    #[arg(long, default_value_t = 500)]
    size: u32,

    /// Crop side as a multiple of the detected face size
    #[arg(long, default_value_t = 2.5)]
    padding: f64,

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

    let opts = CircularOptions {
        output_size: cli.size,
        padding: cli.padding,
    };
    let processor = CircularImageProcessor::new(detector, opts).unwrap_or_else(|e| cli::fatal(e));

    let results = if cli.input.is_file() {
        if !is_supported_image(&cli.input) {
            tracing::warn!("{} does not look like an image file", cli.input.display());
        }
        let output = output_path_for(&cli.input, cli.output.as_deref());
        vec![processor.process_file(&cli.input, &output)]
    } else {
        processor
            .process_directory(&cli.input, cli.output.as_deref())
            .unwrap_or_else(|e| cli::fatal(e))
    };

    cli::report(&results, "image", cli.out);
}
