//! Vision backends
//!
//! The bridge never touches pixels beyond marshalling; grayscale conversion,
//! edge detection, blur and color conversion are delegated to a
//! [`VisionBackend`]. Which backend runs is decided at runtime by whoever
//! builds the [`NativeBridge`](crate::bridge::NativeBridge), so both the
//! "library present" and "library absent" paths are testable in one build.

#[cfg(feature = "vision")]
pub mod pixel;
pub mod stub;

use crate::error::Result;
use crate::image_engine::ImageBuffer;
use crate::yuv_engine::Nv21Frame;

#[cfg(feature = "vision")]
pub use pixel::PixelBackend;
pub use stub::StubBackend;

/// Version of the library behind a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl BackendVersion {
    /// `major * 10000 + minor * 100 + patch`
    pub fn encoded(&self) -> i32 {
        (self.major * 10000 + self.minor * 100 + self.patch) as i32
    }
}

/// Image primitives supplied by a vision library.
///
/// Implementations return new buffers and never mutate their input, so a
/// failed call leaves the caller's buffer untouched.
pub trait VisionBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when no library is present.
    fn version(&self) -> Option<BackendVersion>;

    /// Grayscale, Canny with the given thresholds, expanded back to RGBA.
    fn grayscale_edges(&self, image: &ImageBuffer, low: f32, high: f32) -> Result<ImageBuffer>;

    /// Grayscale, Gaussian blur with an odd `kernel_size`, expanded back to RGBA.
    fn grayscale_blur(&self, image: &ImageBuffer, kernel_size: u32, sigma: f32) -> Result<ImageBuffer>;

    /// NV21 to packed RGBA.
    fn nv21_to_rgba(&self, frame: &Nv21Frame) -> Result<ImageBuffer>;

    /// Normalize any supported format to RGBA.
    fn to_rgba(&self, image: &ImageBuffer) -> Result<ImageBuffer>;
}

/// Backend selected by the enabled features.
pub fn default_backend() -> Box<dyn VisionBackend> {
    #[cfg(feature = "vision")]
    {
        Box::new(PixelBackend)
    }
    #[cfg(not(feature = "vision"))]
    {
        Box::new(StubBackend)
    }
}
