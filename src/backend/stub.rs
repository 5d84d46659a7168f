//! Stub backend for builds without a vision library.
//!
//! Every image operation returns `BackendUnavailable`.

use crate::error::{BridgeError, Result};
use crate::image_engine::ImageBuffer;
use crate::yuv_engine::Nv21Frame;

use super::{BackendVersion, VisionBackend};

const REASON: &str = "built without the vision feature";

/// No-op backend
pub struct StubBackend;

impl VisionBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn version(&self) -> Option<BackendVersion> {
        None
    }

    fn grayscale_edges(&self, _image: &ImageBuffer, _low: f32, _high: f32) -> Result<ImageBuffer> {
        log::warn!("grayscale_edges called on stub backend");
        Err(BridgeError::BackendUnavailable(REASON))
    }

    fn grayscale_blur(&self, _image: &ImageBuffer, _kernel_size: u32, _sigma: f32) -> Result<ImageBuffer> {
        log::warn!("grayscale_blur called on stub backend");
        Err(BridgeError::BackendUnavailable(REASON))
    }

    fn nv21_to_rgba(&self, _frame: &Nv21Frame) -> Result<ImageBuffer> {
        log::warn!("nv21_to_rgba called on stub backend");
        Err(BridgeError::BackendUnavailable(REASON))
    }

    fn to_rgba(&self, _image: &ImageBuffer) -> Result<ImageBuffer> {
        Err(BridgeError::BackendUnavailable(REASON))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_engine::PixelFormat;

    #[test]
    fn test_stub_reports_unavailable() {
        let backend = StubBackend;
        let image = ImageBuffer::new(2, 2, PixelFormat::Rgba8, 4).unwrap();
        assert!(backend.version().is_none());
        assert!(matches!(
            backend.grayscale_edges(&image, 100.0, 200.0),
            Err(BridgeError::BackendUnavailable(_))
        ));
        assert!(matches!(backend.to_rgba(&image), Err(BridgeError::BackendUnavailable(_))));
    }
}
