//! Native bridge - Buffer operations behind the JNI entry points
//!
//! Each operation validates its inputs, resolves handles through the
//! registry and delegates pixel work to the injected [`VisionBackend`].
//! In-place operations compute into a new buffer and swap it in only on
//! success, so a failed call leaves the handle's contents as they were.
//!
//! The registry lock is held for the duration of one operation. Concurrent
//! calls are therefore serialized, but sharing one handle between threads is
//! still the caller's business: nothing orders a release against a pending
//! process call on another thread.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, RwLock};

use crate::backend::{default_backend, VisionBackend};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::handle_registry::{HandleRegistry, NULL_HANDLE};
use crate::image_engine::{checked_dimensions, BufferInfo, ImageBuffer, PixelFormat};
use crate::yuv_engine::{planes_to_nv21, YuvPlanes};

pub struct NativeBridge {
    registry: Mutex<HandleRegistry>,
    backend: Box<dyn VisionBackend>,
    config: RwLock<BridgeConfig>,
}

static BRIDGE: OnceLock<NativeBridge> = OnceLock::new();

/// Process-wide bridge used by the JNI entry points
pub fn global() -> &'static NativeBridge {
    BRIDGE.get_or_init(|| NativeBridge::new(default_backend(), BridgeConfig::default()))
}

impl NativeBridge {
    pub fn new(backend: Box<dyn VisionBackend>, config: BridgeConfig) -> Self {
        Self {
            registry: Mutex::new(HandleRegistry::new()),
            backend,
            config: RwLock::new(config),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HandleRegistry> {
        // Buffers are only swapped on success, so a poisoned registry is still consistent
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> BridgeConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn backend(&self) -> &dyn VisionBackend {
        self.backend.as_ref()
    }

    /// Replace the live configuration from a JSON document.
    pub fn configure(&self, json: &str) -> Result<()> {
        let config = BridgeConfig::from_json(json)?;
        if let Some(active) = crate::active_log_tag() {
            // android_logger keeps the tag it was first initialized with
            if active != config.log_tag {
                return Err(BridgeError::Config(format!(
                    "log_tag is fixed at {:?} once the logger is initialized",
                    active
                )));
            }
        }
        log::set_max_level(config.max_level()?);
        log::info!(
            "bridge configured: canny {}/{}, blur kernel {}, row alignment {}",
            config.canny_low,
            config.canny_high,
            config.blur_kernel,
            config.row_alignment
        );
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    /// Number of buffers not yet released
    pub fn live_buffers(&self) -> usize {
        self.registry().len()
    }

    /// Allocate a zeroed buffer and return its handle.
    pub fn create_buffer(&self, width: i32, height: i32, format_code: i32) -> Result<u64> {
        let (width, height) = checked_dimensions(width, height)?;
        let format = PixelFormat::from_code(format_code)?;
        let buffer = ImageBuffer::new(width, height, format, self.config().row_alignment)?;
        let handle = self.registry().insert(buffer);
        log::debug!("created buffer {} ({}x{} {:?})", handle, width, height, format);
        Ok(handle)
    }

    /// Release a buffer. The null handle is a no-op.
    pub fn release_buffer(&self, handle: u64) -> Result<()> {
        self.registry().release(handle)?;
        if handle != NULL_HANDLE {
            log::debug!("released buffer {}", handle);
        }
        Ok(())
    }

    fn process_in_place<F>(&self, handle: u64, op: F) -> Result<()>
    where
        F: FnOnce(&dyn VisionBackend, &ImageBuffer) -> Result<ImageBuffer>,
    {
        let mut registry = self.registry();
        let buffer = registry.get_mut(handle)?;
        if buffer.is_empty() {
            return Err(BridgeError::EmptyBuffer);
        }
        let result = op(self.backend.as_ref(), buffer)?.realigned(self.config().row_alignment)?;
        *buffer = result;
        Ok(())
    }

    /// Grayscale, Canny, back to RGBA, written into the same handle.
    pub fn process_grayscale_edges(&self, handle: u64) -> Result<()> {
        let config = self.config();
        self.process_in_place(handle, |backend, buffer| {
            backend.grayscale_edges(buffer, config.canny_low, config.canny_high)
        })?;
        log::debug!("edge detection done on buffer {}", handle);
        Ok(())
    }

    /// Grayscale, Gaussian blur, back to RGBA, written into the same handle.
    pub fn process_grayscale_blur(&self, handle: u64) -> Result<()> {
        let config = self.config();
        self.process_in_place(handle, |backend, buffer| {
            backend.grayscale_blur(buffer, config.blur_kernel, config.blur_sigma())
        })?;
        log::debug!("blur done on buffer {}", handle);
        Ok(())
    }

    /// Convert caller YUV planes to a new RGBA buffer.
    pub fn convert_yuv_to_rgba(&self, planes: &YuvPlanes<'_>) -> Result<u64> {
        let frame = planes_to_nv21(planes)?;
        let rgba = self
            .backend
            .nv21_to_rgba(&frame)?
            .realigned(self.config().row_alignment)?;
        let handle = self.registry().insert(rgba);
        log::debug!("converted {}x{} frame into buffer {}", frame.width, frame.height, handle);
        Ok(handle)
    }

    /// Copy the buffer into `dest` as packed RGBA, row by row.
    ///
    /// `width` and `height` must match the buffer; `dest` must hold at least
    /// `width * height * 4` bytes. Nothing is written on failure.
    pub fn copy_as_rgba(&self, handle: u64, dest: &mut [u8], width: i32, height: i32) -> Result<usize> {
        let (width, height) = checked_dimensions(width, height)?;
        let required = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(4))
            .ok_or(BridgeError::InvalidDimensions {
                width: width as i64,
                height: height as i64,
            })?;
        if dest.len() < required {
            return Err(BridgeError::BufferTooSmall {
                what: "output buffer",
                required,
                actual: dest.len(),
            });
        }

        let registry = self.registry();
        let buffer = registry.get(handle)?;
        if buffer.is_empty() {
            return Err(BridgeError::EmptyBuffer);
        }
        if buffer.width() != width || buffer.height() != height {
            return Err(BridgeError::DimensionMismatch {
                expected_width: buffer.width(),
                expected_height: buffer.height(),
                width,
                height,
            });
        }

        let written = if buffer.format() == PixelFormat::Rgba8 {
            buffer.copy_rows_into(dest)?
        } else {
            self.backend.to_rgba(buffer)?.copy_rows_into(dest)?
        };
        Ok(written)
    }

    /// Fill the buffer from tightly packed rows.
    pub fn write_bytes(&self, handle: u64, src: &[u8]) -> Result<usize> {
        let mut registry = self.registry();
        let buffer = registry.get_mut(handle)?;
        buffer.copy_rows_from(src)
    }

    pub fn buffer_info(&self, handle: u64) -> Result<BufferInfo> {
        let registry = self.registry();
        let buffer = registry.get(handle)?;
        Ok(BufferInfo::new(handle, buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StubBackend;
    use crate::image_engine::{CV_8UC1, CV_8UC3, CV_8UC4};

    #[cfg(feature = "vision")]
    fn bridge() -> NativeBridge {
        NativeBridge::new(Box::new(crate::backend::PixelBackend), BridgeConfig::default())
    }

    fn stub_bridge() -> NativeBridge {
        NativeBridge::new(Box::new(StubBackend), BridgeConfig::default())
    }

    #[test]
    fn test_create_release_pairs_leave_nothing_behind() {
        let bridge = stub_bridge();
        for code in [CV_8UC1, CV_8UC3, CV_8UC4] {
            for (w, h) in [(1, 1), (3, 5), (640, 480)] {
                let handle = bridge.create_buffer(w, h, code).unwrap();
                assert_ne!(handle, NULL_HANDLE);
                bridge.release_buffer(handle).unwrap();
            }
        }
        assert_eq!(bridge.live_buffers(), 0);
    }

    #[test]
    fn test_create_rejects_zero_and_negative_sizes() {
        let bridge = stub_bridge();
        for n in [1, 7, 480] {
            assert!(matches!(
                bridge.create_buffer(0, n, CV_8UC4),
                Err(BridgeError::InvalidDimensions { .. })
            ));
            assert!(matches!(
                bridge.create_buffer(n, 0, CV_8UC4),
                Err(BridgeError::InvalidDimensions { .. })
            ));
        }
        assert!(bridge.create_buffer(-4, 4, CV_8UC4).is_err());
        assert!(matches!(
            bridge.create_buffer(4, 4, 99),
            Err(BridgeError::UnsupportedFormat(99))
        ));
        assert_eq!(bridge.live_buffers(), 0);
    }

    #[test]
    fn test_oversized_create_fails_instead_of_aborting() {
        let bridge = stub_bridge();
        assert!(matches!(
            bridge.create_buffer(i32::MAX, 1 << 20, CV_8UC4),
            Err(BridgeError::Allocation(_))
        ));
        let handle = crate::error::guard("createBuffer", NULL_HANDLE, || {
            bridge.create_buffer(i32::MAX, 1 << 20, CV_8UC4)
        });
        assert_eq!(handle, NULL_HANDLE);
        assert_eq!(bridge.live_buffers(), 0);
    }

    #[test]
    fn test_log_tag_is_fixed_after_init() {
        crate::init_library(&BridgeConfig::default());
        let bridge = stub_bridge();
        assert!(matches!(
            bridge.configure(r#"{"log_tag": "SomethingElse"}"#),
            Err(BridgeError::Config(_))
        ));
        assert_eq!(bridge.config().log_tag, "FlameRnDNative");
        bridge.configure(r#"{"log_tag": "FlameRnDNative", "canny_low": 60}"#).unwrap();
        assert_eq!(bridge.config().canny_low, 60.0);
    }

    #[test]
    fn test_release_null_is_noop() {
        let bridge = stub_bridge();
        bridge.release_buffer(NULL_HANDLE).unwrap();
        bridge.release_buffer(NULL_HANDLE).unwrap();
    }

    #[test]
    fn test_use_after_release_is_reported() {
        let bridge = stub_bridge();
        let handle = bridge.create_buffer(2, 2, CV_8UC4).unwrap();
        bridge.release_buffer(handle).unwrap();
        assert!(matches!(bridge.buffer_info(handle), Err(BridgeError::ReleasedHandle(_))));
        let mut out = [0u8; 16];
        assert!(matches!(
            bridge.copy_as_rgba(handle, &mut out, 2, 2),
            Err(BridgeError::ReleasedHandle(_))
        ));
    }

    #[test]
    fn test_edges_on_null_handle_fails_without_side_effects() {
        let bridge = stub_bridge();
        let handle = bridge.create_buffer(4, 4, CV_8UC4).unwrap();
        assert!(matches!(
            bridge.process_grayscale_edges(NULL_HANDLE),
            Err(BridgeError::NullHandle)
        ));
        assert_eq!(bridge.live_buffers(), 1);
        assert_eq!(bridge.buffer_info(handle).unwrap().format, PixelFormat::Rgba8);
    }

    #[test]
    fn test_stub_backend_leaves_buffer_untouched() {
        let bridge = stub_bridge();
        let handle = bridge.create_buffer(2, 1, CV_8UC4).unwrap();
        let pixels = [1, 2, 3, 4, 5, 6, 7, 8];
        bridge.write_bytes(handle, &pixels).unwrap();

        assert!(matches!(
            bridge.process_grayscale_edges(handle),
            Err(BridgeError::BackendUnavailable(_))
        ));

        // RGBA copies need no backend
        let mut out = [0u8; 8];
        bridge.copy_as_rgba(handle, &mut out, 2, 1).unwrap();
        assert_eq!(out, pixels);
    }

    #[test]
    fn test_copy_rejects_undersized_output() {
        let bridge = stub_bridge();
        let handle = bridge.create_buffer(3, 2, CV_8UC4).unwrap();
        bridge.write_bytes(handle, &[200u8; 24]).unwrap();

        let mut out = vec![0u8; 3 * 2 * 4 - 1];
        assert!(matches!(
            bridge.copy_as_rgba(handle, &mut out, 3, 2),
            Err(BridgeError::BufferTooSmall { required: 24, actual: 23, .. })
        ));
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_rejects_mismatched_dimensions() {
        let bridge = stub_bridge();
        let handle = bridge.create_buffer(3, 2, CV_8UC4).unwrap();
        let mut out = vec![0u8; 64];
        assert!(matches!(
            bridge.copy_as_rgba(handle, &mut out, 2, 3),
            Err(BridgeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_configure_updates_thresholds() {
        let bridge = stub_bridge();
        bridge.configure(r#"{"canny_low": 40, "canny_high": 120}"#).unwrap();
        let config = bridge.config();
        assert_eq!(config.canny_low, 40.0);
        assert_eq!(config.canny_high, 120.0);
        assert!(bridge.configure(r#"{"canny_low": 400}"#).is_err());
        assert_eq!(bridge.config().canny_low, 40.0);
    }

    #[test]
    fn test_buffer_info_reports_stride() {
        let bridge = stub_bridge();
        let handle = bridge.create_buffer(3, 2, CV_8UC3).unwrap();
        let info = bridge.buffer_info(handle).unwrap();
        assert_eq!(info.handle, handle);
        assert_eq!((info.width, info.height, info.channels), (3, 2, 3));
        assert_eq!(info.stride, 12);
    }

    #[cfg(feature = "vision")]
    #[test]
    fn test_copy_normalizes_every_format_row_by_row() {
        let bridge = bridge();
        let (w, h) = (3usize, 2usize);

        let gray: Vec<u8> = (0..(w * h) as u8).map(|i| i * 10).collect();
        let rgb: Vec<u8> = (0..(w * h * 3) as u8).collect();
        let rgba: Vec<u8> = (0..(w * h * 4) as u8).map(|i| i.wrapping_mul(7)).collect();

        let expected_gray: Vec<u8> = gray.iter().flat_map(|&g| [g, g, g, 255]).collect();
        let expected_rgb: Vec<u8> = rgb.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect();

        for (code, src, expected) in [
            (CV_8UC1, &gray, &expected_gray),
            (CV_8UC3, &rgb, &expected_rgb),
            (CV_8UC4, &rgba, &rgba),
        ] {
            let handle = bridge.create_buffer(w as i32, h as i32, code).unwrap();
            bridge.write_bytes(handle, src).unwrap();

            let mut out = vec![0u8; w * h * 4];
            let written = bridge.copy_as_rgba(handle, &mut out, w as i32, h as i32).unwrap();
            assert_eq!(written, out.len());
            for row in 0..h {
                let range = row * w * 4..(row + 1) * w * 4;
                assert_eq!(out[range.clone()], expected[range], "format {} row {}", code, row);
            }
            bridge.release_buffer(handle).unwrap();
        }
        assert_eq!(bridge.live_buffers(), 0);
    }

    #[cfg(feature = "vision")]
    #[test]
    fn test_solid_nv21_frame_is_mid_gray() {
        let bridge = bridge();
        let y = [128u8; 16];
        let u = [128u8; 4];
        let v = [128u8; 4];
        let planes = YuvPlanes {
            y: &y,
            u: &u,
            v: &v,
            width: 4,
            height: 4,
            y_stride: 4,
            uv_stride: 2,
        };
        let handle = bridge.convert_yuv_to_rgba(&planes).unwrap();

        let mut out = [0u8; 64];
        bridge.copy_as_rgba(handle, &mut out, 4, 4).unwrap();
        for px in out.chunks_exact(4) {
            for &c in &px[..3] {
                assert!((c as i32 - 128).abs() <= 3, "channel {} not mid-gray", c);
            }
            assert_eq!(px[3], 255);
        }
        bridge.release_buffer(handle).unwrap();
    }

    #[cfg(feature = "vision")]
    #[test]
    fn test_nv21_chroma_order_and_stride() {
        let bridge = bridge();
        // 4x2 frame with padded strides; left chroma column is red-ish, right is blue-ish
        let y = [128u8, 128, 128, 128, 0, 0, 128, 128, 128, 128, 0, 0];
        let u = [128u8, 240, 0];
        let v = [240u8, 128, 0];
        let planes = YuvPlanes {
            y: &y,
            u: &u,
            v: &v,
            width: 4,
            height: 2,
            y_stride: 6,
            uv_stride: 3,
        };
        let handle = bridge.convert_yuv_to_rgba(&planes).unwrap();

        let mut out = [0u8; 32];
        bridge.copy_as_rgba(handle, &mut out, 4, 2).unwrap();
        for row in 0..2 {
            let px = |x: usize| &out[(row * 4 + x) * 4..(row * 4 + x) * 4 + 4];
            // high V -> red dominates
            assert!(px(0)[0] > px(0)[2]);
            assert!(px(1)[0] > px(1)[2]);
            // high U -> blue dominates
            assert!(px(2)[2] > px(2)[0]);
            assert!(px(3)[2] > px(3)[0]);
        }
    }

    #[cfg(feature = "vision")]
    #[test]
    fn test_yuv_validation_failure_issues_no_handle() {
        let bridge = bridge();
        let y = [0u8; 10];
        let uv = [0u8; 4];
        let planes = YuvPlanes {
            y: &y,
            u: &uv,
            v: &uv,
            width: 4,
            height: 4,
            y_stride: 4,
            uv_stride: 2,
        };
        assert!(bridge.convert_yuv_to_rgba(&planes).is_err());
        assert_eq!(bridge.live_buffers(), 0);
    }

    #[cfg(feature = "vision")]
    #[test]
    fn test_edges_rewrite_buffer_in_place() {
        let bridge = bridge();
        let handle = bridge.create_buffer(8, 8, CV_8UC3).unwrap();
        let mut pixels = vec![0u8; 8 * 8 * 3];
        for row in pixels.chunks_exact_mut(8 * 3) {
            row[12..].fill(255);
        }
        bridge.write_bytes(handle, &pixels).unwrap();

        bridge.process_grayscale_edges(handle).unwrap();
        let info = bridge.buffer_info(handle).unwrap();
        assert_eq!(info.format, PixelFormat::Rgba8);
        assert_eq!((info.width, info.height), (8, 8));

        let mut out = vec![0u8; 8 * 8 * 4];
        bridge.copy_as_rgba(handle, &mut out, 8, 8).unwrap();
        assert!(out.chunks_exact(4).any(|px| px[0] == 255));
        assert!(out.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[cfg(feature = "vision")]
    #[test]
    fn test_processing_keeps_configured_row_alignment() {
        let bridge = bridge();
        bridge.configure(r#"{"row_alignment": 64}"#).unwrap();

        let handle = bridge.create_buffer(8, 8, CV_8UC3).unwrap();
        assert_eq!(bridge.buffer_info(handle).unwrap().stride, 64);
        bridge.process_grayscale_edges(handle).unwrap();
        assert_eq!(bridge.buffer_info(handle).unwrap().stride, 64);
        bridge.process_grayscale_blur(handle).unwrap();
        assert_eq!(bridge.buffer_info(handle).unwrap().stride, 64);

        let y = [128u8; 16];
        let uv = [128u8; 4];
        let planes = YuvPlanes {
            y: &y,
            u: &uv,
            v: &uv,
            width: 4,
            height: 4,
            y_stride: 4,
            uv_stride: 2,
        };
        let converted = bridge.convert_yuv_to_rgba(&planes).unwrap();
        assert_eq!(bridge.buffer_info(converted).unwrap().stride, 64);

        let mut out = [0u8; 64];
        bridge.copy_as_rgba(converted, &mut out, 4, 4).unwrap();
        assert!(out.chunks_exact(4).all(|px| px == [130, 130, 130, 255]));
    }

    #[cfg(feature = "vision")]
    #[test]
    fn test_blur_in_place() {
        let bridge = bridge();
        let handle = bridge.create_buffer(20, 20, CV_8UC1).unwrap();
        bridge.write_bytes(handle, &[90u8; 400]).unwrap();
        bridge.process_grayscale_blur(handle).unwrap();

        let mut out = vec![0u8; 20 * 20 * 4];
        bridge.copy_as_rgba(handle, &mut out, 20, 20).unwrap();
        for px in out.chunks_exact(4) {
            assert!((px[0] as i32 - 90).abs() <= 1);
        }
    }
}
