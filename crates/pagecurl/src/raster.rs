//! CPU-side page images and the small pixel routines the cache needs.

use crate::error::DecodeError;
use image::{ColorType, DynamicImage};
use std::path::Path;

/// Sampling stride (pixels, both axes) of the grayscale test.
pub const GRAY_SAMPLE_STRIDE: usize = 10;

/// Placeholder colour for pages that failed to decode.
pub const ERROR_PIXEL: [u8; 3] = [247, 0, 247];
/// Placeholder colour for blank pages.
pub const WHITE_PIXEL: [u8; 3] = [255, 255, 255];

/// Tightly packed 8-bit image, row-major, `channels` interleaved samples per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl RasterImage {
    /// Wraps pixel data without any conversion.
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * channels as usize
        );
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Builds an image, collapsing it to a single channel when it is effectively gray.
    ///
    /// Pixels are sampled every [`GRAY_SAMPLE_STRIDE`] in x and y; the image counts as
    /// coloured as soon as one sample has R/G or G/B differing by more than 1.
    pub fn optimized(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        if channels == 1 || is_colored(width, height, channels, &pixels, GRAY_SAMPLE_STRIDE) {
            return Self::new(width, height, channels, pixels);
        }

        let n = channels as usize;
        let gray = pixels.chunks_exact(n).map(|px| px[0]).collect();
        Self::new(width, height, 1, gray)
    }

    /// A single-pixel image of `rgb`.
    pub fn solid(rgb: [u8; 3]) -> Self {
        Self::new(1, 1, 3, rgb.to_vec())
    }

    pub fn error_placeholder() -> Self {
        Self::solid(ERROR_PIXEL)
    }

    pub fn blank() -> Self {
        Self::solid(WHITE_PIXEL)
    }

    pub fn is_colored(&self) -> bool {
        self.channels > 1
    }

    /// Converts decoded codec output, keeping alpha only when present.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        match img.color() {
            ColorType::L8 | ColorType::L16 => {
                Self::new(width, height, 1, img.into_luma8().into_raw())
            }
            c if c.has_alpha() => {
                Self::optimized(width, height, 4, img.into_rgba8().into_raw())
            }
            _ => Self::optimized(width, height, 3, img.into_rgb8().into_raw()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DecodeError> {
        Ok(Self::from_dynamic(image::open(path)?))
    }

    pub fn save_png(&self, path: &Path) -> Result<(), DecodeError> {
        let color = match self.channels {
            1 => ColorType::L8,
            2 => ColorType::La8,
            4 => ColorType::Rgba8,
            _ => ColorType::Rgb8,
        };
        image::save_buffer_with_format(
            path,
            &self.pixels,
            self.width,
            self.height,
            color,
            image::ImageFormat::Png,
        )?;
        Ok(())
    }

    /// Box-filter downsample to `target_height`, preserving aspect ratio.
    ///
    /// Images already at or below the target height are returned unchanged.
    pub fn downscale_to_height(&self, target_height: u32) -> Self {
        if self.height <= target_height || target_height == 0 {
            return self.clone();
        }
        let tw = ((self.width as f32 / self.height as f32) * target_height as f32) as u32;
        let tw = tw.max(1);
        let pixels = box_filter_scale(
            &self.pixels,
            self.width as usize,
            self.height as usize,
            self.channels as usize,
            tw as usize,
            target_height as usize,
        );
        Self::new(tw, target_height, self.channels, pixels)
    }

    /// Pixel data expanded to RGBA8, for GPU formats without a 3-channel variant.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.channels {
            4 => self.pixels.clone(),
            3 => self
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            2 => self
                .pixels
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            _ => self.pixels.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        }
    }
}

/// Strided colour test over interleaved 8-bit pixels.
pub fn is_colored(width: u32, height: u32, channels: u8, pixels: &[u8], stride: usize) -> bool {
    let n = channels as usize;
    if n < 2 {
        return false;
    }
    let (w, h) = (width as usize, height as usize);
    let stride = stride.max(1);
    for y in (0..h).step_by(stride) {
        for x in (0..w).step_by(stride) {
            let px = &pixels[(y * w + x) * n..][..n];
            let (r, g) = (px[0] as i16, px[1] as i16);
            if (r - g).abs() > 1 {
                return true;
            }
            if n > 2 && (px[2] as i16 - g).abs() > 1 {
                return true;
            }
        }
    }
    false
}

/// Averages every source pixel falling into each target cell.
pub fn box_filter_scale(
    input: &[u8],
    iw: usize,
    ih: usize,
    channels: usize,
    tw: usize,
    th: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; tw * th * channels];
    for ty in 0..th {
        let sy0 = ty * ih / th;
        let sy1 = ((ty + 1) * ih / th).max(sy0 + 1);
        for tx in 0..tw {
            let sx0 = tx * iw / tw;
            let sx1 = ((tx + 1) * iw / tw).max(sx0 + 1);
            let count = ((sy1 - sy0) * (sx1 - sx0)) as u32;
            for c in 0..channels {
                let mut sum = 0u32;
                for sy in sy0..sy1 {
                    let row = &input[sy * iw * channels..];
                    for sx in sx0..sx1 {
                        sum += row[sx * channels + c] as u32;
                    }
                }
                out[(ty * tw + tx) * channels + c] = (sum / count) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_image(w: u32, h: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
        let mut v = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                v.extend_from_slice(&f(x, y));
            }
        }
        v
    }

    #[test]
    fn gray_pages_collapse_to_one_channel() {
        let px = rgb_image(40, 30, |x, y| {
            let g = ((x + y) % 256) as u8;
            [g, g, g]
        });
        let img = RasterImage::optimized(40, 30, 3, px);
        assert_eq!(img.channels, 1);
        assert_eq!(img.pixels.len(), 40 * 30);
    }

    #[test]
    fn off_by_one_channels_still_count_as_gray() {
        let px = rgb_image(20, 20, |_, _| [100, 101, 100]);
        assert_eq!(RasterImage::optimized(20, 20, 3, px).channels, 1);
    }

    #[test]
    fn one_colored_sample_keeps_all_channels() {
        // (10, 10) lies on the sampling lattice.
        let px = rgb_image(25, 25, |x, y| if x == 10 && y == 10 { [200, 50, 50] } else { [9, 9, 9] });
        let img = RasterImage::optimized(25, 25, 3, px);
        assert_eq!(img.channels, 3);
        assert_eq!(img.pixels.len(), 25 * 25 * 3);
    }

    #[test]
    fn colour_between_samples_is_not_seen() {
        let px = rgb_image(25, 25, |x, y| if x == 5 && y == 5 { [200, 50, 50] } else { [9, 9, 9] });
        assert_eq!(RasterImage::optimized(25, 25, 3, px).channels, 1);
    }

    #[test]
    fn blue_channel_is_checked_too() {
        let px = rgb_image(4, 4, |_, _| [10, 10, 90]);
        assert!(is_colored(4, 4, 3, &px, GRAY_SAMPLE_STRIDE));
    }

    #[test]
    fn box_filter_averages_blocks() {
        // 4x2 gray: left half 0, right half 200 -> 2x1 target.
        let input = [0, 0, 200, 200, 0, 0, 200, 200];
        let out = box_filter_scale(&input, 4, 2, 1, 2, 1);
        assert_eq!(out, vec![0, 200]);
    }

    #[test]
    fn downscale_keeps_aspect_and_skips_small_images() {
        let img = RasterImage::new(300, 400, 1, vec![128; 300 * 400]);
        let small = img.downscale_to_height(100);
        assert_eq!((small.width, small.height), (75, 100));
        assert!(small.pixels.iter().all(|&p| p == 128));

        let tiny = RasterImage::new(10, 20, 1, vec![1; 200]);
        assert_eq!(tiny.downscale_to_height(100), tiny);
    }

    #[test]
    fn rgba_expansion() {
        let img = RasterImage::new(1, 1, 3, vec![1, 2, 3]);
        assert_eq!(img.to_rgba8(), vec![1, 2, 3, 255]);
        let gray = RasterImage::new(2, 1, 1, vec![7, 9]);
        assert_eq!(gray.to_rgba8(), vec![7, 7, 7, 255, 9, 9, 9, 255]);
    }
}
