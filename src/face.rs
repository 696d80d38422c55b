//! Face detection.
//!
//! Detection sits behind the [`FaceDetector`] trait so the circular crop code
//! does not depend on a particular model. The bundled backend,
//! [`RustfaceDetector`], runs the pre-trained SeetaFace frontal cascade loaded
//! from a model file.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::GrayImage;
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable naming the SeetaFace model file.
pub const FACE_MODEL_ENV: &str = "MEDIA_BATCH_FACE_MODEL";

/// Axis-aligned bounding box of a detected face, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Box width.
    pub width: u32,
    /// Box height.
    pub height: u32,
}

impl FaceBox {
    /// Box area in square pixels.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Center point and size (the larger side) of the box.
    #[must_use]
    pub fn region(&self) -> FaceRegion {
        FaceRegion {
            center_x: self.x + self.width / 2,
            center_y: self.y + self.height / 2,
            size: self.width.max(self.height),
        }
    }
}

/// Where to center a crop, and how large the face is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    /// Horizontal center of the face.
    pub center_x: u32,
    /// Vertical center of the face.
    pub center_y: u32,
    /// Larger side of the face box.
    pub size: u32,
}

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a grayscale image.
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceBox>>;
}

/// Pick the face with the largest area.
#[must_use]
pub fn largest_face(faces: &[FaceBox]) -> Option<FaceBox> {
    faces.iter().copied().max_by_key(FaceBox::area)
}

/// Detect faces and reduce them to the region of the largest one.
///
/// # Errors
///
/// Propagates detector failures.
pub fn locate_face(detector: &dyn FaceDetector, gray: &GrayImage) -> Result<Option<FaceRegion>> {
    let faces = detector.detect(gray)?;
    debug!(count = faces.len(), "face detection finished");
    Ok(largest_face(&faces).map(|f| f.region()))
}

/// Tuning for the SeetaFace cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct RustfaceParams {
    /// Smallest face considered, in pixels.
    pub min_face_size: u32,
    /// Classifier score threshold.
    pub score_threshold: f64,
    /// Image pyramid downscale factor per level.
    pub pyramid_scale_factor: f32,
    /// Sliding window step in pixels.
    pub window_step: u32,
}

impl Default for RustfaceParams {
    fn default() -> Self {
        Self {
            min_face_size: 30,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            window_step: 4,
        }
    }
}

/// Face detector backed by the `rustface` SeetaFace implementation.
///
/// The loaded cascade is not thread-safe, so each worker thread keeps its own
/// instance, built from the model file on first use and reused afterwards.
#[derive(Debug, Clone)]
pub struct RustfaceDetector {
    model_path: PathBuf,
    params: RustfaceParams,
}

impl RustfaceDetector {
    /// Load and validate the model at `model_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Detector`] if the file is missing or is not a valid model.
    pub fn new(model_path: &Path, params: RustfaceParams) -> Result<Self> {
        if !model_path.is_file() {
            return Err(Error::Detector(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }
        let detector = Self {
            model_path: model_path.to_path_buf(),
            params,
        };
        detector.build()?;
        Ok(detector)
    }

    /// Resolve the model from an explicit path or `MEDIA_BATCH_FACE_MODEL`.
    ///
    /// Returns `Ok(None)` when neither is set.
    ///
    /// # Errors
    ///
    /// Fails if a model is configured but cannot be loaded.
    pub fn from_config(explicit: Option<&Path>) -> Result<Option<Self>> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(FACE_MODEL_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));
        path.map(|p| Self::new(&p, RustfaceParams::default()))
            .transpose()
    }

    fn build(&self) -> Result<Box<dyn rustface::Detector>> {
        let path = self.model_path.to_string_lossy();
        let mut detector =
            rustface::create_detector(&path).map_err(|e| Error::Detector(e.to_string()))?;
        detector.set_min_face_size(self.params.min_face_size);
        detector.set_score_thresh(self.params.score_threshold);
        detector.set_pyramid_scale_factor(self.params.pyramid_scale_factor);
        detector.set_slide_window_step(self.params.window_step, self.params.window_step);
        Ok(detector)
    }
}

type CacheKey = (PathBuf, RustfaceParams);
type CachedDetector = (CacheKey, Box<dyn rustface::Detector>);

thread_local! {
    static THREAD_DETECTOR: RefCell<Option<CachedDetector>> = const { RefCell::new(None) };
}

/// Return the cached value for `key`, building a new one if the slot is empty
/// or holds a different key.
fn reuse_or_build<K: PartialEq, D, E>(
    slot: &mut Option<(K, D)>,
    key: K,
    build: impl FnOnce() -> std::result::Result<D, E>,
) -> std::result::Result<&mut D, E> {
    let entry = match slot.take() {
        Some((cached, value)) if cached == key => (cached, value),
        _ => (key, build()?),
    };
    Ok(&mut slot.insert(entry).1)
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceBox>> {
        THREAD_DETECTOR.with(|cell| {
            let mut slot = cell.borrow_mut();
            let key = (self.model_path.clone(), self.params.clone());
            let detector = reuse_or_build(&mut *slot, key, || self.build())?;
            Ok(run_cascade(detector.as_mut(), gray))
        })
    }
}

fn run_cascade(detector: &mut dyn rustface::Detector, gray: &GrayImage) -> Vec<FaceBox> {
    let mut data = rustface::ImageData::new(gray.as_raw(), gray.width(), gray.height());
    detector
        .detect(&mut data)
        .iter()
        .filter_map(|face| {
            let bbox = face.bbox();
            // Boxes can hang off the top/left edge; clip them to the image.
            let x = u32::try_from(bbox.x().max(0)).ok()?;
            let y = u32::try_from(bbox.y().max(0)).ok()?;
            let width = bbox.width().min(gray.width().saturating_sub(x));
            let height = bbox.height().min(gray.height().saturating_sub(y));
            (width > 0 && height > 0).then_some(FaceBox {
                x,
                y,
                width,
                height,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_uses_center_and_larger_side() {
        let face = FaceBox {
            x: 100,
            y: 50,
            width: 80,
            height: 120,
        };
        assert_eq!(
            face.region(),
            FaceRegion {
                center_x: 140,
                center_y: 110,
                size: 120,
            }
        );
    }

    #[test]
    fn largest_face_by_area() {
        let faces = [
            FaceBox { x: 0, y: 0, width: 40, height: 40 },
            FaceBox { x: 10, y: 10, width: 30, height: 90 },
            FaceBox { x: 5, y: 5, width: 50, height: 20 },
        ];
        assert_eq!(largest_face(&faces), Some(faces[1]));
        assert_eq!(largest_face(&[]), None);
    }

    #[test]
    fn cached_detector_is_reused_until_the_key_changes() {
        let mut slot = None;
        let mut builds = 0;
        let mut build = |tag: &'static str| {
            builds += 1;
            Ok::<_, Error>(tag)
        };

        assert_eq!(*reuse_or_build(&mut slot, "a.bin", || build("first")).unwrap(), "first");
        assert_eq!(*reuse_or_build(&mut slot, "a.bin", || build("second")).unwrap(), "first");
        assert_eq!(*reuse_or_build(&mut slot, "b.bin", || build("third")).unwrap(), "third");
        assert_eq!(builds, 2);
    }

    #[test]
    fn failed_build_leaves_slot_empty() {
        let mut slot = Some(("a.bin", 1));
        let err = reuse_or_build(&mut slot, "b.bin", || Err(Error::Detector("bad model".into())));
        assert!(err.is_err());
        assert!(slot.is_none());
    }

    #[test]
    fn missing_model_is_a_detector_error() {
        let err = RustfaceDetector::new(Path::new("/no/such/model.bin"), RustfaceParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
    }
}
