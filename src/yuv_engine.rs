//! Camera frame marshalling - YUV planes to NV21
//!
//! The app hands over the three planes of a camera frame separately. NV21
//! wants full resolution luma followed by one interleaved chroma plane,
//! subsampled by two in each direction, with V before U in every pair.

use crate::error::{BridgeError, Result};
use crate::image_engine::{checked_dimensions, try_zeroed};

/// Packed NV21 frame: `width * height` luma bytes plus the VU plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nv21Frame {
    pub width: usize,
    pub height: usize,
    pub y: Vec<u8>,
    pub vu: Vec<u8>,
}

impl Nv21Frame {
    /// Chroma plane width in samples
    #[inline]
    pub fn chroma_width(&self) -> usize {
        chroma_len(self.width)
    }

    #[inline]
    pub fn chroma_height(&self) -> usize {
        chroma_len(self.height)
    }
}

/// Planes exactly as the caller passed them
#[derive(Debug, Clone, Copy)]
pub struct YuvPlanes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub width: i32,
    pub height: i32,
    pub y_stride: i32,
    pub uv_stride: i32,
}

/// `ceil(n / 2)`
#[inline]
pub fn chroma_len(n: usize) -> usize {
    n.div_ceil(2)
}

fn checked_stride(what: &'static str, stride: i32, min: usize) -> Result<usize> {
    if stride <= 0 || (stride as usize) < min {
        return Err(BridgeError::InvalidStride {
            what,
            stride: stride as i64,
            min,
        });
    }
    Ok(stride as usize)
}

fn check_plane(what: &'static str, plane: &[u8], rows: usize, stride: usize) -> Result<()> {
    let required = rows.checked_mul(stride).ok_or(BridgeError::BufferTooSmall {
        what,
        required: usize::MAX,
        actual: plane.len(),
    })?;
    if plane.len() < required {
        return Err(BridgeError::BufferTooSmall {
            what,
            required,
            actual: plane.len(),
        });
    }
    Ok(())
}

/// Build the VU plane from separate U and V planes.
///
/// Walks `ceil(height / 2)` rows and `ceil(width / 2)` columns, reading each
/// sample at `row * uv_stride + col` and writing V then U. The output holds
/// `chroma_width * chroma_height * 2` bytes. Both planes must hold
/// `chroma_height * uv_stride` bytes.
fn interleave_vu(u: &[u8], v: &[u8], width: usize, height: usize, uv_stride: usize) -> Result<Vec<u8>> {
    let chroma_width = chroma_len(width);
    let chroma_height = chroma_len(height);
    check_plane("U plane", u, chroma_height, uv_stride)?;
    check_plane("V plane", v, chroma_height, uv_stride)?;
    let mut vu = try_zeroed(chroma_width * chroma_height * 2)?;

    for row in 0..chroma_height {
        let src = row * uv_stride;
        let dst = row * chroma_width * 2;
        for col in 0..chroma_width {
            vu[dst + col * 2] = v[src + col];
            vu[dst + col * 2 + 1] = u[src + col];
        }
    }

    Ok(vu)
}

/// Validate caller planes and pack them into an NV21 frame.
pub fn planes_to_nv21(planes: &YuvPlanes<'_>) -> Result<Nv21Frame> {
    let (width, height) = checked_dimensions(planes.width, planes.height)?;
    let chroma_width = chroma_len(width);
    let chroma_height = chroma_len(height);

    let y_stride = checked_stride("luma", planes.y_stride, width)?;
    let uv_stride = checked_stride("chroma", planes.uv_stride, chroma_width)?;

    check_plane("luma plane", planes.y, height, y_stride)?;
    check_plane("U plane", planes.u, chroma_height, uv_stride)?;
    check_plane("V plane", planes.v, chroma_height, uv_stride)?;

    let mut y = try_zeroed(width * height)?;
    for (dst, row) in y.chunks_exact_mut(width).zip(planes.y.chunks(y_stride)) {
        dst.copy_from_slice(&row[..width]);
    }

    let vu = interleave_vu(planes.u, planes.v, width, height, uv_stride)?;

    log::debug!(
        "packed NV21 frame {}x{} (y_stride {}, uv_stride {}, vu {} bytes)",
        width,
        height,
        y_stride,
        uv_stride,
        vu.len()
    );

    Ok(Nv21Frame { width, height, y, vu })
}
