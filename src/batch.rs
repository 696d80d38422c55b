//! Per-file results and batch summaries shared by all tools.

use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::warn;

use crate::error::{Error, Result};

/// Result of processing a single input file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the input file.
    pub path: PathBuf,
    /// Path of the file written, if any.
    pub output: Option<PathBuf>,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was deliberately left alone.
    pub skipped: bool,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    /// A successful result that wrote `output`.
    pub fn ok(path: impl Into<PathBuf>, output: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            output: Some(output.into()),
            success: true,
            skipped: false,
            message: message.into(),
        }
    }

    /// A failed result.
    pub fn failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            output: None,
            success: false,
            skipped: false,
            message: message.into(),
        }
    }

    /// A skipped result. Counts as success.
    pub fn skipped(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            output: None,
            success: true,
            skipped: true,
            message: message.into(),
        }
    }

    /// Build a failed result from an error, keeping the most useful stderr line.
    pub fn from_error(path: impl Into<PathBuf>, err: &Error) -> Self {
        let message = match err.stderr_tail() {
            Some(tail) => format!("{err}: {tail}"),
            None => err.to_string(),
        };
        Self::failed(path, message)
    }
}

/// Success/skip/failure counts over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files processed successfully, not counting skips.
    pub succeeded: usize,
    /// Files skipped.
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
}

impl BatchSummary {
    /// Tally a slice of results.
    #[must_use]
    pub fn from_results(results: &[ProcessResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            if r.skipped {
                acc.skipped += 1;
            } else if r.success {
                acc.succeeded += 1;
            } else {
                acc.failed += 1;
            }
            acc
        })
    }

    /// Total number of files seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    /// Whether no file failed.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {}/{} files successfully",
            self.succeeded,
            self.total()
        )?;
        if self.skipped > 0 {
            write!(f, ", skipped {}", self.skipped)?;
        }
        if self.failed > 0 {
            write!(f, ", failed {}", self.failed)?;
        }
        Ok(())
    }
}

/// Pick the output directory for a batch and make sure it exists.
///
/// An explicit directory wins; otherwise `default_subdir` under `input_dir`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be created.
pub fn prepare_output_dir(
    input_dir: &Path,
    explicit: Option<&Path>,
    default_subdir: &str,
) -> Result<PathBuf> {
    let dir = explicit.map_or_else(|| input_dir.join(default_subdir), Path::to_path_buf);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Create the parent directory of `output` if it is missing.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be created.
pub fn ensure_parent(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Run `f` over `files` and their outputs on the rayon pool, returning results
/// in input order.
///
/// Outputs are assigned by `output_for` before anything runs. A file whose
/// output was already claimed by an earlier file is reported as failed, so no
/// two workers ever write the same path.
pub fn process_parallel<O, F>(files: &[PathBuf], output_for: O, f: F) -> Vec<ProcessResult>
where
    O: Fn(&Path) -> PathBuf,
    F: Fn(&Path, &Path) -> ProcessResult + Sync + Send,
{
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    let jobs: Vec<(&Path, PathBuf, Option<&Path>)> = files
        .iter()
        .map(|input| {
            let output = output_for(input);
            let first = match claimed.entry(output.clone()) {
                Entry::Occupied(e) => Some(*e.get()),
                Entry::Vacant(e) => {
                    e.insert(input.as_path());
                    None
                }
            };
            (input.as_path(), output, first)
        })
        .collect();

    jobs.par_iter()
        .map(|(input, output, first)| match first {
            Some(first) => {
                warn!(
                    "{} and {} both map to {}",
                    first.display(),
                    input.display(),
                    output.display()
                );
                ProcessResult::failed(
                    *input,
                    format!("output {} collides with {}", output.display(), first.display()),
                )
            }
            None => f(*input, output.as_path()),
        })
        .collect()
}

/// Size of a file in mebibytes, or `0.0` if it cannot be read.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn file_size_mb(path: &Path) -> f64 {
    std::fs::metadata(path).map_or(0.0, |m| m.len() as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_outcome() {
        let results = vec![
            ProcessResult::ok("a.mp4", "out/a.mp4", "done"),
            ProcessResult::failed("b.mp4", "boom"),
            ProcessResult::skipped("c.mp4", "nothing to do"),
            ProcessResult::ok("d.mp4", "out/d.mp4", "done"),
        ];
        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
        assert!(!summary.all_ok());
        assert_eq!(
            summary.to_string(),
            "Processed 2/4 files successfully, skipped 1, failed 1"
        );
    }

    #[test]
    fn empty_summary_is_ok() {
        let summary = BatchSummary::from_results(&[]);
        assert!(summary.all_ok());
        assert_eq!(summary.to_string(), "Processed 0/0 files successfully");
    }

    #[test]
    fn from_error_appends_stderr_tail() {
        let err = Error::ffmpeg_failed(
            "ffmpeg exited unsuccessfully",
            Some("logo.png: No such file or directory\n".to_string()),
            Some(1),
        );
        let result = ProcessResult::from_error("clip.mp4", &err);
        assert!(!result.success);
        assert!(result.message.ends_with("logo.png: No such file or directory"));
    }

    #[test]
    fn prepare_output_dir_defaults_to_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = prepare_output_dir(tmp.path(), None, "with_logo").unwrap();
        assert_eq!(dir, tmp.path().join("with_logo"));
        assert!(dir.is_dir());

        let explicit = tmp.path().join("custom");
        let dir = prepare_output_dir(tmp.path(), Some(&explicit), "with_logo").unwrap();
        assert_eq!(dir, explicit);
        assert!(dir.is_dir());
    }

    #[test]
    fn process_parallel_preserves_input_order() {
        let files: Vec<PathBuf> = (0..32).map(|i| PathBuf::from(format!("f{i:02}.png"))).collect();
        let results = process_parallel(&files, |p| p.with_extension("out"), |p, out| {
            ProcessResult::ok(p, out, "")
        });
        let paths: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, files);
        assert_eq!(results[3].output, Some(PathBuf::from("f03.out")));
    }

    #[test]
    fn process_parallel_fails_later_files_sharing_an_output() {
        let files = vec![
            PathBuf::from("clip.mp4"),
            PathBuf::from("clip.mov"),
            PathBuf::from("intro.mp4"),
            PathBuf::from("clip.mkv"),
        ];
        let runs = std::sync::atomic::AtomicUsize::new(0);
        let results = process_parallel(&files, |p| p.with_extension("gif"), |p, out| {
            runs.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            ProcessResult::ok(p, out, "created GIF")
        });

        assert_eq!(runs.into_inner(), 2);
        assert!(results[0].success);
        assert!(results[2].success);
        for r in [&results[1], &results[3]] {
            assert!(!r.success && !r.skipped);
            assert_eq!(r.message, "output clip.gif collides with clip.mp4");
        }
    }
}
