//! Shared pieces of the command-line tools: logging setup and result reporting.

use std::process;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::batch::{BatchSummary, ProcessResult};

/// Output verbosity flags common to every tool.
#[derive(Debug, Clone, Copy, Default, clap::Args)]
pub struct OutputArgs {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl OutputArgs {
    /// Install the tracing subscriber. `RUST_LOG` overrides these defaults.
    pub fn init_logging(self) {
        let default = if self.quiet {
            "error"
        } else if self.verbose {
            "media_batch=debug,info"
        } else {
            "media_batch=info,warn"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Print a fatal error and exit with status 1.
pub fn fatal(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

/// Print one line per result and, for batches, a summary. Exits with status 1
/// if anything failed.
pub fn report(results: &[ProcessResult], what: &str, output: OutputArgs) {
    if results.is_empty() {
        if !output.quiet {
            eprintln!("No {what} files found");
        }
        return;
    }

    for r in results {
        print_result(r, output);
    }

    let summary = BatchSummary::from_results(results);
    if results.len() > 1 && !output.quiet {
        eprintln!("{}", "-".repeat(50));
        eprintln!("[Summary] {summary}");
    }

    if !summary.all_ok() {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, output: OutputArgs) {
    if output.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        eprintln!("[SKIP] {filename}: {}", result.message);
    } else if result.success {
        match &result.output {
            Some(out) if output.verbose => {
                eprintln!("[OK] {filename} -> {} ({})", out.display(), result.message);
            }
            _ => eprintln!("[OK] {filename}: {}", result.message),
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}
