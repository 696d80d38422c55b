use std::path::{Path, PathBuf};

use clap::Parser;

use media_batch::cli::{self, OutputArgs};
use media_batch::overlay::DEFAULT_OUTPUT_SUBDIR;
use media_batch::{Corner, LogoOptions, LogoStamper, MediaKind, Toolchain};

#[derive(Parser)]
#[command(
    name = "add-logo-images",
    about = "Add a logo watermark to a corner of every image in a directory",
    version,
    after_help = "Example: add-logo-images photos/ logo.png --position bottom-right --margin 20"
)]
struct Cli {
    /// Input directory (or a single image)
    input: PathBuf,

    /// Logo image
    #[arg(default_value = "logo.png")]
    logo: PathBuf,

    /// Position: top-right, top-left, bottom-right, bottom-left
    #[arg(long, default_value = "top-right")]
    position: String,

    /// Margin from the edges in pixels
    #[arg(long, default_value_t = 10)]
    margin: u32,

    /// Logo width relative to the image width (0.15 = 15%)
    #[arg(long, default_value_t = 0.15)]
    scale: f64,

    /// Output directory (default: <input>/with_logo)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    out: OutputArgs,
}

fn main() {
    let cli = Cli::parse();
    cli.out.init_logging();

    let opts = LogoOptions {
        corner: Corner::parse_or_default(&cli.position),
        margin: cli.margin,
        scale: cli.scale,
    };
    let tools = Toolchain::discover().unwrap_or_else(|e| cli::fatal(e));
    let stamper = LogoStamper::new(tools, &cli.logo, MediaKind::Image, opts)
        .unwrap_or_else(|e| cli::fatal(e));

    let results = if cli.input.is_file() {
        let name = cli.input.file_name().unwrap_or_default();
        let out_dir = cli.output.clone().unwrap_or_else(|| {
            cli.input
                .parent()
                .unwrap_or(Path::new("."))
                .join(DEFAULT_OUTPUT_SUBDIR)
        });
        vec![stamper.process_file(&cli.input, &out_dir.join(name))]
    } else {
        stamper
            .process_directory(&cli.input, cli.output.as_deref())
            .unwrap_or_else(|e| cli::fatal(e))
    };

    cli::report(&results, "image", cli.out);
}
