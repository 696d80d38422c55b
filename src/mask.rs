//! Circular alpha masks.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::drawing::draw_filled_ellipse_mut;

use crate::error::{Error, Result};
use crate::geometry::CropBox;

/// A filled-circle alpha mask for square frames of one size.
///
/// Built once and shared, since every frame of a video uses the same mask.
#[derive(Debug, Clone)]
pub struct CircleMask {
    mask: GrayImage,
}

impl CircleMask {
    /// Mask for `size` x `size` frames: 255 inside the inscribed circle, 0 outside.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for a zero size.
    pub fn new(size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidOption("output size must be at least 1".to_string()));
        }
        let radius = i32::try_from(size / 2)
            .map_err(|_| Error::InvalidOption(format!("output size too large: {size}")))?;
        let mut mask = GrayImage::new(size, size);
        draw_filled_ellipse_mut(&mut mask, (radius, radius), radius, radius, Luma([255u8]));
        Ok(Self { mask })
    }

    /// Side length of the mask.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.mask.width()
    }

    /// The mask as a grayscale image.
    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    /// Replace the alpha channel of `frame` with the mask.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not `size` x `size`.
    pub fn apply(&self, frame: &mut RgbaImage) {
        assert_eq!(
            frame.dimensions(),
            self.mask.dimensions(),
            "frame and mask sizes differ"
        );
        for (px, alpha) in frame.pixels_mut().zip(self.mask.pixels()) {
            px[3] = alpha[0];
        }
    }
}

/// Crop `image` to `crop`, resize to the mask size with Lanczos3, and cut it
/// into a circle with transparent corners.
///
/// # Errors
///
/// Returns [`Error::InvalidOption`] if the crop box falls outside the image.
pub fn circular_frame(image: &DynamicImage, crop: CropBox, mask: &CircleMask) -> Result<RgbaImage> {
    let (width, height) = (image.width(), image.height());
    if !crop.fits(width, height) {
        return Err(Error::InvalidOption(format!(
            "crop {crop:?} does not fit {width}x{height} frame"
        )));
    }

    let square = imageops::crop_imm(image, crop.left, crop.top, crop.size, crop.size).to_image();
    let size = mask.size();
    let mut out = imageops::resize(&square, size, size, FilterType::Lanczos3);
    mask.apply(&mut out);
    Ok(out)
}
