//! Vision backend built on the `image` and `imageproc` crates.
//!
//! Grayscale uses BT.601 luma weights (0.299, 0.587, 0.114) in 14-bit fixed
//! point, matching OpenCV's `cvtColor(.., *2GRAY)` rather than the Rec.709
//! weights of `DynamicImage::to_luma8`.
//!
//! The Gaussian blur is a separable convolution with a kernel normalized to
//! sum to one and edge pixels replicated, so flat regions keep their value.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use imageproc::edges::canny;
use rayon::prelude::*;

use crate::error::{BridgeError, Result};
use crate::image_engine::{try_zeroed, ImageBuffer, PixelFormat};
use crate::yuv_engine::Nv21Frame;

use super::{BackendVersion, VisionBackend};

// ITU-R BT.601 video range, fixed point with 20 fractional bits
const BT601_SHIFT: i32 = 20;
const BT601_CY: i32 = 1_220_542;
const BT601_CUB: i32 = 2_116_026;
const BT601_CUG: i32 = -409_993;
const BT601_CVG: i32 = -852_492;
const BT601_CVR: i32 = 1_673_527;
const BT601_ROUND: i32 = 1 << (BT601_SHIFT - 1);

// BT.601 luma weights, 14 fractional bits; they sum to 1 << 14
const GRAY_SHIFT: u32 = 14;
const GRAY_R: u32 = 4899;
const GRAY_G: u32 = 9617;
const GRAY_B: u32 = 1868;

/// `imageproc` release linked into this build
const IMAGEPROC_VERSION: BackendVersion = BackendVersion {
    major: 0,
    minor: 23,
    patch: 0,
};

/// Backend backed by `imageproc`
pub struct PixelBackend;

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert one YUV sample to RGBA.
#[inline]
pub fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = (y as i32 - 16).max(0) * BT601_CY;
    let u = u as i32 - 128;
    let v = v as i32 - 128;

    let ruv = BT601_ROUND + BT601_CVR * v;
    let guv = BT601_ROUND + BT601_CVG * v + BT601_CUG * u;
    let buv = BT601_ROUND + BT601_CUB * u;

    [
        clamp_u8((y + ruv) >> BT601_SHIFT),
        clamp_u8((y + guv) >> BT601_SHIFT),
        clamp_u8((y + buv) >> BT601_SHIFT),
        255,
    ]
}

/// BT.601 luma of one RGB sample.
#[inline]
pub fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let sum = GRAY_R * r as u32 + GRAY_G * g as u32 + GRAY_B * b as u32;
    ((sum + (1 << (GRAY_SHIFT - 1))) >> GRAY_SHIFT) as u8
}

/// Normalized 1-D Gaussian of `size` taps.
fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let radius = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

fn dims_u32(image: &ImageBuffer) -> Result<(u32, u32)> {
    let width = u32::try_from(image.width()).map_err(|_| BridgeError::Backend("width exceeds u32".into()))?;
    let height = u32::try_from(image.height()).map_err(|_| BridgeError::Backend("height exceeds u32".into()))?;
    Ok((width, height))
}

fn to_dynamic(image: &ImageBuffer) -> Result<DynamicImage> {
    let (width, height) = dims_u32(image)?;
    let packed = image.to_packed();
    let dynamic = match image.format() {
        PixelFormat::Gray8 => GrayImage::from_raw(width, height, packed).map(DynamicImage::ImageLuma8),
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, packed).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => RgbaImage::from_raw(width, height, packed).map(DynamicImage::ImageRgba8),
    };
    dynamic.ok_or_else(|| BridgeError::Backend("pixel data does not match dimensions".into()))
}

fn to_gray(image: &ImageBuffer) -> Result<GrayImage> {
    let (width, height) = dims_u32(image)?;
    let w = image.width();
    let channels = image.format().channels();
    let mut gray = try_zeroed(w * image.height())?;

    gray.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        let row = image.row(y);
        match image.format() {
            PixelFormat::Gray8 => out.copy_from_slice(row),
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
                for (dst, px) in out.iter_mut().zip(row.chunks_exact(channels)) {
                    *dst = bt601_luma(px[0], px[1], px[2]);
                }
            }
        }
    });

    GrayImage::from_raw(width, height, gray)
        .ok_or_else(|| BridgeError::Backend("gray plane does not match dimensions".into()))
}

fn blur_gray(gray: &GrayImage, kernel: &[f32]) -> Result<GrayImage> {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as usize, height as usize);
    let radius = (kernel.len() / 2) as isize;
    let src = gray.as_raw();

    let mut tmp: Vec<f32> = Vec::new();
    tmp.try_reserve_exact(w * h)
        .map_err(|_| BridgeError::Allocation(w * h * std::mem::size_of::<f32>()))?;
    tmp.resize(w * h, 0.0);

    tmp.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        let row = &src[y * w..(y + 1) * w];
        for (x, acc) in out.iter_mut().enumerate() {
            *acc = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sx = (x as isize + k as isize - radius).clamp(0, w as isize - 1) as usize;
                    weight * row[sx] as f32
                })
                .sum();
        }
    });

    let mut blurred = try_zeroed(w * h)?;
    blurred.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        for (x, px) in out.iter_mut().enumerate() {
            let value: f32 = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sy = (y as isize + k as isize - radius).clamp(0, h as isize - 1) as usize;
                    weight * tmp[sy * w + x]
                })
                .sum();
            *px = value.round().clamp(0.0, 255.0) as u8;
        }
    });

    GrayImage::from_raw(width, height, blurred)
        .ok_or_else(|| BridgeError::Backend("blurred plane does not match dimensions".into()))
}

fn rgba_buffer(rgba: RgbaImage) -> Result<ImageBuffer> {
    let (width, height) = rgba.dimensions();
    ImageBuffer::from_packed(width as usize, height as usize, PixelFormat::Rgba8, rgba.into_raw())
}

fn gray_to_rgba(gray: GrayImage) -> Result<ImageBuffer> {
    rgba_buffer(DynamicImage::ImageLuma8(gray).to_rgba8())
}

impl VisionBackend for PixelBackend {
    fn name(&self) -> &str {
        "imageproc"
    }

    fn version(&self) -> Option<BackendVersion> {
        Some(IMAGEPROC_VERSION)
    }

    fn grayscale_edges(&self, image: &ImageBuffer, low: f32, high: f32) -> Result<ImageBuffer> {
        let gray = to_gray(image)?;
        let edges = canny(&gray, low, high);
        gray_to_rgba(edges)
    }

    fn grayscale_blur(&self, image: &ImageBuffer, kernel_size: u32, sigma: f32) -> Result<ImageBuffer> {
        if sigma <= 0.0 {
            return Err(BridgeError::Backend(format!("blur sigma must be positive, got {}", sigma)));
        }
        if kernel_size % 2 == 0 {
            return Err(BridgeError::Backend(format!("blur kernel must be odd, got {}", kernel_size)));
        }
        let gray = to_gray(image)?;
        let kernel = gaussian_kernel(kernel_size as usize, sigma);
        gray_to_rgba(blur_gray(&gray, &kernel)?)
    }

    fn nv21_to_rgba(&self, frame: &Nv21Frame) -> Result<ImageBuffer> {
        let width = frame.width;
        let height = frame.height;
        let chroma_row = frame.chroma_width() * 2;

        if width == 0 || height == 0 {
            return Err(BridgeError::EmptyBuffer);
        }
        if frame.y.len() < width * height {
            return Err(BridgeError::Backend(format!(
                "luma plane holds {} bytes, frame needs {}",
                frame.y.len(),
                width * height
            )));
        }
        if frame.vu.len() < chroma_row * frame.chroma_height() {
            return Err(BridgeError::Backend(format!(
                "chroma plane holds {} bytes, frame needs {}",
                frame.vu.len(),
                chroma_row * frame.chroma_height()
            )));
        }

        let mut rgba = try_zeroed(width * height * 4)?;
        rgba.par_chunks_mut(width * 4).enumerate().for_each(|(row, out)| {
            let luma = &frame.y[row * width..(row + 1) * width];
            let vu = &frame.vu[(row / 2) * chroma_row..(row / 2 + 1) * chroma_row];
            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                let pair = (x / 2) * 2;
                px.copy_from_slice(&yuv_to_rgba(luma[x], vu[pair + 1], vu[pair]));
            }
        });

        ImageBuffer::from_packed(width, height, PixelFormat::Rgba8, rgba)
    }

    fn to_rgba(&self, image: &ImageBuffer) -> Result<ImageBuffer> {
        if image.format() == PixelFormat::Rgba8 {
            return Ok(image.clone());
        }
        rgba_buffer(to_dynamic(image)?.to_rgba8())
    }
}
