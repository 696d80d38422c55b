//! Square crop boxes for circular output.

use crate::face::FaceRegion;

/// Default ratio of crop side to face size.
pub const DEFAULT_FACE_PADDING: f64 = 2.5;

/// A square region inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Side length.
    pub size: u32,
}

impl CropBox {
    /// Right edge, exclusive.
    #[must_use]
    pub fn right(&self) -> u32 {
        self.left + self.size
    }

    /// Bottom edge, exclusive.
    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.top + self.size
    }

    /// Whether the box lies entirely inside a `width` x `height` frame.
    #[must_use]
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.size > 0 && self.right() <= width && self.bottom() <= height
    }
}

/// Largest centered square.
#[must_use]
pub fn center_crop(width: u32, height: u32) -> CropBox {
    let size = width.min(height);
    CropBox {
        left: (width - size) / 2,
        top: (height - size) / 2,
        size,
    }
}

/// Square of `face.size * padding` centered on the face, shifted back inside
/// the frame where it would cross an edge.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn face_crop(width: u32, height: u32, face: FaceRegion, padding: f64) -> CropBox {
    let wanted = (f64::from(face.size) * padding).floor().max(1.0);
    let wanted = if wanted >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        wanted as u32
    };
    let size = wanted.min(width).min(height);

    let (left, right) = fit_span(face.center_x, size, width);
    let (top, bottom) = fit_span(face.center_y, size, height);

    CropBox {
        left,
        top,
        size: (right - left).min(bottom - top),
    }
}

/// Place a span of `size` centered on `center` within `[0, limit)`.
fn fit_span(center: u32, size: u32, limit: u32) -> (u32, u32) {
    let mut start = center.saturating_sub(size / 2).min(limit);
    let mut end = limit.min(start.saturating_add(size));
    if end - start < size {
        if start == 0 {
            end = limit.min(size);
        } else {
            start = limit.saturating_sub(size);
        }
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(center_x: u32, center_y: u32, size: u32) -> FaceRegion {
        FaceRegion {
            center_x,
            center_y,
            size,
        }
    }

    #[test]
    fn center_crop_landscape_and_portrait() {
        assert_eq!(
            center_crop(1920, 1080),
            CropBox {
                left: 420,
                top: 0,
                size: 1080
            }
        );
        assert_eq!(
            center_crop(600, 800),
            CropBox {
                left: 0,
                top: 100,
                size: 600
            }
        );
    }

    #[test]
    fn face_in_middle_is_centered() {
        let crop = face_crop(1000, 1000, face(500, 500, 100), DEFAULT_FACE_PADDING);
        assert_eq!(
            crop,
            CropBox {
                left: 375,
                top: 375,
                size: 250
            }
        );
    }

    #[test]
    fn face_near_right_edge_shifts_left() {
        let crop = face_crop(1000, 800, face(950, 400, 100), DEFAULT_FACE_PADDING);
        assert_eq!(crop.size, 250);
        assert_eq!(crop.left, 750);
        assert_eq!(crop.right(), 1000);
    }

    #[test]
    fn face_near_top_left_corner_clamps_to_origin() {
        let crop = face_crop(1000, 800, face(20, 30, 100), DEFAULT_FACE_PADDING);
        assert_eq!(
            crop,
            CropBox {
                left: 0,
                top: 0,
                size: 250
            }
        );
    }

    #[test]
    fn huge_face_is_limited_by_short_side() {
        let crop = face_crop(640, 480, face(320, 240, 400), DEFAULT_FACE_PADDING);
        assert_eq!(crop.size, 480);
        assert_eq!(crop.top, 0);
        assert!(crop.fits(640, 480));
    }

    #[test]
    fn crop_always_fits_frame() {
        for (w, h) in [(1, 1), (7, 3), (640, 480), (480, 640), (1920, 1080)] {
            for cx in [0, w / 3, w / 2, w - 1] {
                for cy in [0, h / 2, h - 1] {
                    for size in [1, 10, 200, 5000] {
                        let crop = face_crop(w, h, face(cx, cy, size), DEFAULT_FACE_PADDING);
                        assert!(crop.fits(w, h), "{crop:?} outside {w}x{h}");
                    }
                }
            }
        }
    }
}
