//! Face-centered circular crops of still images.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::batch::{self, ProcessResult};
use crate::discovery::{self, MarkerScope, IMAGE_EXTENSIONS};
use crate::error::{Error, Result};
use crate::face::{self, FaceDetector, FaceRegion};
use crate::geometry::{self, CropBox, DEFAULT_FACE_PADDING};
use crate::mask::{self, CircleMask};

/// Name of the per-folder output directory, and the marker that excludes it
/// from discovery.
pub const CIRCULAR_MARKER: &str = "circular";

/// Options for circular output.
#[derive(Debug, Clone)]
pub struct CircularOptions {
    /// Side length of the square output, in pixels.
    pub output_size: u32,
    /// Crop side as a multiple of the detected face size.
    pub padding: f64,
}

impl Default for CircularOptions {
    fn default() -> Self {
        Self {
            output_size: 500,
            padding: DEFAULT_FACE_PADDING,
        }
    }
}

impl CircularOptions {
    /// Check option ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for a zero size or non-positive padding.
    pub fn validate(&self) -> Result<()> {
        if self.output_size == 0 {
            return Err(Error::InvalidOption("output size must be at least 1".to_string()));
        }
        if !(self.padding.is_finite() && self.padding > 0.0) {
            return Err(Error::InvalidOption(format!(
                "face padding must be positive, got {}",
                self.padding
            )));
        }
        Ok(())
    }
}

/// How a frame was framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    /// The square to keep.
    pub crop: CropBox,
    /// The face the crop is centered on, if one was found.
    pub face: Option<FaceRegion>,
}

/// Decide the crop for a frame: centered on the largest face when a detector
/// finds one, otherwise the largest centered square.
///
/// # Errors
///
/// Propagates detector failures.
pub fn plan_crop(
    detector: Option<&dyn FaceDetector>,
    frame: &DynamicImage,
    padding: f64,
) -> Result<CropPlan> {
    let (width, height) = (frame.width(), frame.height());
    let face = match detector {
        Some(d) => face::locate_face(d, &frame.to_luma8())?,
        None => None,
    };
    let crop = match face {
        Some(region) => geometry::face_crop(width, height, region, padding),
        None => geometry::center_crop(width, height),
    };
    debug!(?crop, ?face, "planned crop for {width}x{height} frame");
    Ok(CropPlan { crop, face })
}

/// Output path for an image in a directory run.
///
/// `<out_dir>/<stem>_circular.png`, or `<parent>/circular/<stem>_circular.png`
/// when no output directory is given.
#[must_use]
pub fn output_path_for(image: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = image.file_stem().unwrap_or_default().to_string_lossy();
    let name = format!("{stem}_{CIRCULAR_MARKER}.png");
    match out_dir {
        Some(dir) => dir.join(name),
        None => image
            .parent()
            .unwrap_or(Path::new("."))
            .join(CIRCULAR_MARKER)
            .join(name),
    }
}

/// Force a `.png` extension, since only PNG keeps the transparent corners.
#[must_use]
pub fn png_path(path: &Path) -> PathBuf {
    let is_png = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if is_png {
        path.to_path_buf()
    } else {
        path.with_extension("png")
    }
}

/// Turns images into face-centered circular PNGs.
pub struct CircularImageProcessor {
    detector: Option<Box<dyn FaceDetector>>,
    opts: CircularOptions,
    mask: CircleMask,
}

impl CircularImageProcessor {
    /// Create a processor. Without a detector every image is center-cropped.
    ///
    /// # Errors
    ///
    /// Fails if the options are out of range.
    pub fn new(detector: Option<Box<dyn FaceDetector>>, opts: CircularOptions) -> Result<Self> {
        opts.validate()?;
        let mask = CircleMask::new(opts.output_size)?;
        Ok(Self {
            detector,
            opts,
            mask,
        })
    }

    /// Load, crop, mask and save one image. Returns the path actually written.
    ///
    /// # Errors
    ///
    /// Fails if the image cannot be decoded, detection fails, or the PNG cannot
    /// be written.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<(PathBuf, CropPlan)> {
        let image = image::open(input)?;
        let plan = plan_crop(self.detector.as_deref(), &image, self.opts.padding)?;
        let circular = mask::circular_frame(&image, plan.crop, &self.mask)?;

        let output = png_path(output);
        batch::ensure_parent(&output)?;
        circular.save_with_format(&output, ImageFormat::Png)?;
        Ok((output, plan))
    }

    /// Convert one image, reporting the outcome.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        match self.convert(input, output) {
            Ok((written, plan)) => {
                let message = match plan.face {
                    Some(face) => format!(
                        "face detected at ({}, {}) - centered on face",
                        face.center_x, face.center_y
                    ),
                    None => "no face detected - used center crop".to_string(),
                };
                info!("{}: {message}", input.display());
                ProcessResult::ok(input, written, message)
            }
            Err(e) => ProcessResult::from_error(input, &e),
        }
    }

    /// Convert every image under `input_dir`, recursively.
    ///
    /// Anything below a path component containing `circular` is skipped so
    /// earlier outputs are not processed again.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be scanned or `output_dir` cannot be created.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<ProcessResult>> {
        let files = discovery::find_files(input_dir, IMAGE_EXTENSIONS, true)?;
        let files = discovery::exclude_marked(
            files,
            &[CIRCULAR_MARKER],
            &MarkerScope::RelativePath(input_dir.to_path_buf()),
        );
        if let Some(dir) = output_dir {
            std::fs::create_dir_all(dir)?;
        }
        info!(
            count = files.len(),
            size = self.opts.output_size,
            "converting images to circular"
        );

        Ok(batch::process_parallel(
            &files,
            |image| png_path(&output_path_for(image, output_dir)),
            |image, output| self.process_file(image, output),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths() {
        assert_eq!(
            output_path_for(Path::new("/imgs/team/ana.jpg"), None),
            PathBuf::from("/imgs/team/circular/ana_circular.png")
        );
        assert_eq!(
            output_path_for(Path::new("/imgs/team/ana.jpg"), Some(Path::new("/out"))),
            PathBuf::from("/out/ana_circular.png")
        );
    }

    #[test]
    fn png_extension_is_forced() {
        assert_eq!(png_path(Path::new("a/b.jpg")), PathBuf::from("a/b.png"));
        assert_eq!(png_path(Path::new("a/b.PNG")), PathBuf::from("a/b.PNG"));
        assert_eq!(png_path(Path::new("a/b")), PathBuf::from("a/b.png"));
    }

    #[test]
    fn options_validation() {
        assert!(CircularOptions::default().validate().is_ok());
        let zero = CircularOptions {
            output_size: 0,
            ..CircularOptions::default()
        };
        assert!(zero.validate().is_err());
        let negative = CircularOptions {
            padding: -1.0,
            ..CircularOptions::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn plan_without_detector_is_center_crop() {
        let frame = DynamicImage::new_rgb8(400, 300);
        let plan = plan_crop(None, &frame, DEFAULT_FACE_PADDING).unwrap();
        assert_eq!(plan.face, None);
        assert_eq!(plan.crop, geometry::center_crop(400, 300));
    }
}
