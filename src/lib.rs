//! Batch media tools built around ffmpeg and a face detector.
//!
//! Each tool scans a directory (or takes a single file), processes every match
//! independently, and reports a [`ProcessResult`] per file:
//!
//! - [`overlay`]: stamp a logo into a corner of videos or images
//! - [`audio`]: extract audio tracks in common formats
//! - [`gif`]: two-pass palette GIF conversion
//! - [`circular_image`] / [`circular_video`]: crop to a face-centered circle
//!   with transparent corners
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use media_batch::{BatchSummary, LogoOptions, LogoStamper, MediaKind, Toolchain};
//!
//! let tools = Toolchain::discover().expect("ffmpeg not installed");
//! let stamper = LogoStamper::new(
//!     tools,
//!     Path::new("logo.png"),
//!     MediaKind::Video,
//!     LogoOptions::default(),
//! )
//! .unwrap();
//! let results = stamper.process_directory(Path::new("clips"), None).unwrap();
//! println!("{}", BatchSummary::from_results(&results));
//! ```
//!
//! # Circular crops
//!
//! Face detection is optional. Without a [`FaceDetector`] every frame is
//! center-cropped.
//!
//! ```no_run
//! use std::path::Path;
//! use media_batch::{CircularImageProcessor, CircularOptions, RustfaceDetector, FaceDetector};
//!
//! let detector = RustfaceDetector::from_config(Some(Path::new("seeta_fd_frontal_v1.0.bin")))
//!     .unwrap()
//!     .map(|d| Box::new(d) as Box<dyn FaceDetector>);
//! let processor = CircularImageProcessor::new(detector, CircularOptions::default()).unwrap();
//! let result = processor.process_file(Path::new("portrait.jpg"), Path::new("portrait_circular.png"));
//! assert!(result.success);
//! ```

#![deny(missing_docs)]

pub mod audio;
pub mod batch;
pub mod circular_image;
pub mod circular_video;
#[cfg(feature = "cli")]
pub mod cli;
pub mod discovery;
pub mod error;
pub mod face;
pub mod ffmpeg;
pub mod geometry;
pub mod gif;
pub mod mask;
pub mod overlay;

pub use audio::{AudioExtractor, AudioFormat, AudioOptions};
pub use batch::{BatchSummary, ProcessResult};
pub use circular_image::{CircularImageProcessor, CircularOptions, CropPlan};
pub use circular_video::{CircularVideoProcessor, VideoCircularOptions};
pub use error::{Error, Result};
pub use face::{FaceBox, FaceDetector, FaceRegion, RustfaceDetector};
pub use ffmpeg::{FfmpegCommand, Toolchain, VideoInfo};
pub use geometry::CropBox;
pub use gif::{GifConverter, GifOptions, GifQuality};
pub use overlay::{Corner, LogoOptions, LogoStamper, MediaKind};
