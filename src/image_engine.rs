//! Image buffers - Native pixel storage behind opaque handles
//!
//! Provides:
//! - Pixel format tags and their JNI (`CvType`) codes
//! - Strided image buffers with padded rows
//! - Row-by-row copies in and out of tightly packed byte sequences
//!
//! Rows are never assumed contiguous: the stride may exceed
//! `width * channels`, so every copy walks the buffer one row at a time.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// `CvType` code of an 8-bit single channel matrix
pub const CV_8UC1: i32 = 0;
/// `CvType` code of an 8-bit three channel matrix
pub const CV_8UC3: i32 = 16;
/// `CvType` code of an 8-bit four channel matrix
pub const CV_8UC4: i32 = 24;

/// Supported pixel layouts (8 bits per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            CV_8UC1 => Ok(PixelFormat::Gray8),
            CV_8UC3 => Ok(PixelFormat::Rgb8),
            CV_8UC4 => Ok(PixelFormat::Rgba8),
            other => Err(BridgeError::UnsupportedFormat(other)),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            PixelFormat::Gray8 => CV_8UC1,
            PixelFormat::Rgb8 => CV_8UC3,
            PixelFormat::Rgba8 => CV_8UC4,
        }
    }

    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Check caller dimensions and convert them to `usize`.
pub fn checked_dimensions(width: i32, height: i32) -> Result<(usize, usize)> {
    if width <= 0 || height <= 0 {
        return Err(BridgeError::InvalidDimensions {
            width: width as i64,
            height: height as i64,
        });
    }
    Ok((width as usize, height as usize))
}

/// Allocate `len` zeroed bytes, reporting failure instead of aborting.
pub fn try_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| BridgeError::Allocation(len))?;
    data.resize(len, 0);
    Ok(data)
}

/// Strided 8-bit image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: usize,
    height: usize,
    stride: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Allocate a zeroed buffer whose rows are padded to `row_alignment` bytes.
    pub fn new(width: usize, height: usize, format: PixelFormat, row_alignment: usize) -> Result<Self> {
        let row_bytes = Self::row_bytes_for(width, format)?;
        let align = row_alignment.max(1);
        let stride = row_bytes
            .checked_add(align - 1)
            .map(|n| n / align * align)
            .ok_or(BridgeError::InvalidDimensions {
                width: width as i64,
                height: height as i64,
            })?;
        Self::with_stride(width, height, format, stride)
    }

    /// Allocate a zeroed buffer with an explicit row stride in bytes.
    pub fn with_stride(width: usize, height: usize, format: PixelFormat, stride: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BridgeError::InvalidDimensions {
                width: width as i64,
                height: height as i64,
            });
        }
        let row_bytes = Self::row_bytes_for(width, format)?;
        if stride < row_bytes {
            return Err(BridgeError::InvalidStride {
                what: "buffer",
                stride: stride as i64,
                min: row_bytes,
            });
        }
        let len = stride.checked_mul(height).ok_or(BridgeError::InvalidDimensions {
            width: width as i64,
            height: height as i64,
        })?;
        Ok(Self {
            width,
            height,
            stride,
            format,
            data: try_zeroed(len)?,
        })
    }

    /// Copy into a new buffer whose rows are padded to `row_alignment` bytes.
    ///
    /// Returns `self` unchanged when its stride already has that padding.
    pub fn realigned(self, row_alignment: usize) -> Result<Self> {
        let mut aligned = Self::new(self.width, self.height, self.format, row_alignment)?;
        if aligned.stride == self.stride {
            return Ok(self);
        }
        for y in 0..self.height {
            aligned.row_mut(y).copy_from_slice(self.row(y));
        }
        Ok(aligned)
    }

    /// Wrap tightly packed rows (stride == `width * channels`).
    pub fn from_packed(width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BridgeError::InvalidDimensions {
                width: width as i64,
                height: height as i64,
            });
        }
        let required = Self::row_bytes_for(width, format)? * height;
        if data.len() != required {
            return Err(BridgeError::BufferTooSmall {
                what: "packed image",
                required,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride: required / height,
            format,
            data,
        })
    }

    fn row_bytes_for(width: usize, format: PixelFormat) -> Result<usize> {
        width
            .checked_mul(format.channels())
            .ok_or(BridgeError::InvalidDimensions {
                width: width as i64,
                height: 0,
            })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Meaningful bytes per row, excluding padding
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width * self.format.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pixel bytes of row `y` without padding
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        let row_bytes = self.row_bytes();
        &mut self.data[start..start + row_bytes]
    }

    /// Copy the pixels out as tightly packed rows.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut packed = Vec::with_capacity(self.row_bytes() * self.height);
        for y in 0..self.height {
            packed.extend_from_slice(self.row(y));
        }
        packed
    }

    /// Copy every row into `dest`, tightly packed.
    ///
    /// `dest` must hold at least `row_bytes * height` bytes; nothing is
    /// written otherwise.
    pub fn copy_rows_into(&self, dest: &mut [u8]) -> Result<usize> {
        let row_bytes = self.row_bytes();
        let required = row_bytes * self.height;
        if dest.len() < required {
            return Err(BridgeError::BufferTooSmall {
                what: "output buffer",
                required,
                actual: dest.len(),
            });
        }
        for (y, out) in dest[..required].chunks_exact_mut(row_bytes).enumerate() {
            out.copy_from_slice(self.row(y));
        }
        Ok(required)
    }

    /// Fill every row from tightly packed `src`.
    pub fn copy_rows_from(&mut self, src: &[u8]) -> Result<usize> {
        let row_bytes = self.row_bytes();
        let required = row_bytes * self.height;
        if src.len() < required {
            return Err(BridgeError::BufferTooSmall {
                what: "input buffer",
                required,
                actual: src.len(),
            });
        }
        for (y, row) in src[..required].chunks_exact(row_bytes).enumerate() {
            self.row_mut(y).copy_from_slice(row);
        }
        Ok(required)
    }
}

/// Snapshot of a buffer's geometry, reported to the app as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferInfo {
    pub handle: u64,
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub channels: usize,
    pub format: PixelFormat,
}

impl BufferInfo {
    pub fn new(handle: u64, image: &ImageBuffer) -> Self {
        Self {
            handle,
            width: image.width(),
            height: image.height(),
            stride: image.stride(),
            channels: image.format().channels(),
            format: image.format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codes() {
        assert_eq!(PixelFormat::from_code(CV_8UC1).unwrap(), PixelFormat::Gray8);
        assert_eq!(PixelFormat::from_code(CV_8UC3).unwrap(), PixelFormat::Rgb8);
        assert_eq!(PixelFormat::from_code(CV_8UC4).unwrap(), PixelFormat::Rgba8);
        assert!(matches!(
            PixelFormat::from_code(5),
            Err(BridgeError::UnsupportedFormat(5))
        ));
        assert_eq!(PixelFormat::Rgb8.code(), CV_8UC3);
    }

    #[test]
    fn test_rows_are_padded_to_alignment() {
        let image = ImageBuffer::new(3, 2, PixelFormat::Rgb8, 4).unwrap();
        assert_eq!(image.row_bytes(), 9);
        assert_eq!(image.stride(), 12);
        assert_eq!(image.row(1).len(), 9);
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(ImageBuffer::new(0, 4, PixelFormat::Gray8, 4).is_err());
        assert!(ImageBuffer::new(4, 0, PixelFormat::Gray8, 4).is_err());
        assert!(checked_dimensions(-1, 4).is_err());
        assert_eq!(checked_dimensions(2, 3).unwrap(), (2, 3));
    }

    #[test]
    fn test_row_copies_skip_padding() {
        let mut image = ImageBuffer::with_stride(2, 2, PixelFormat::Gray8, 8).unwrap();
        image.copy_rows_from(&[1, 2, 3, 4]).unwrap();
        assert_eq!(image.row(0), &[1, 2]);
        assert_eq!(image.row(1), &[3, 4]);

        let mut out = [0u8; 4];
        assert_eq!(image.copy_rows_into(&mut out).unwrap(), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(image.to_packed(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_oversized_allocation_is_an_error() {
        let err = ImageBuffer::new(i32::MAX as usize, 1 << 20, PixelFormat::Rgba8, 4).unwrap_err();
        assert!(matches!(err, BridgeError::Allocation(_)));
        assert!(try_zeroed(usize::MAX).is_err());
    }

    #[test]
    fn test_realigned_keeps_pixels_and_pads_rows() {
        let packed = ImageBuffer::from_packed(3, 2, PixelFormat::Rgb8, (0..18).collect()).unwrap();
        assert_eq!(packed.stride(), 9);
        let aligned = packed.clone().realigned(16).unwrap();
        assert_eq!(aligned.stride(), 16);
        assert_eq!(aligned.to_packed(), packed.to_packed());
    }

    #[test]
    fn test_copy_into_small_buffer_writes_nothing() {
        let mut image = ImageBuffer::new(2, 2, PixelFormat::Gray8, 1).unwrap();
        image.copy_rows_from(&[9, 9, 9, 9]).unwrap();
        let mut out = [0u8; 3];
        assert!(image.copy_rows_into(&mut out).is_err());
        assert_eq!(out, [0, 0, 0]);
    }
}
