//! Deskew and binarization for scanned pages.
//!
//! Deskew is a small brute-force search: each candidate rotation is scored by
//! how strongly row intensities vary, since straight text lines produce
//! alternating dark and light rows. The winner is then flattened to pure
//! black and white.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::{median_filter, sharpen3x3};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

/// Candidate rotations in degrees, in scan order. Ties keep the earliest.
pub const DESKEW_ANGLES: [f32; 5] = [-2.0, -1.0, 0.0, 1.0, 2.0];

/// Largest side of the thumbnail used for scoring.
const SCORE_MAX_SIDE: u32 = 400;

/// Luminance cut point for the final black/white threshold.
const BINARY_THRESHOLD: u8 = 180;

const MEDIAN_RADIUS: u32 = 1;
const BRIGHTEN: i32 = 10;
const LINEAR_GAIN: f32 = 1.2;
const NORMALIZE_LOW_PERCENTILE: f32 = 0.01;
const NORMALIZE_HIGH_PERCENTILE: f32 = 0.99;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Page cleanup: deskew search followed by binarization.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    angles: Vec<f32>,
    threshold: u8,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            angles: DESKEW_ANGLES.to_vec(),
            threshold: BINARY_THRESHOLD,
        }
    }
}

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deskew then binarize. Output has the same width and height as the input.
    pub fn process(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return image;
        }

        let (angle, rotated) = self.deskew(&image.to_rgb8());
        debug!("Deskew chose {}° for {}x{} page", angle, width, height);

        let mut binary = self.binarize(&rotated);
        if binary.dimensions() != (width, height) {
            binary = imageops::resize(&binary, width, height, FilterType::Triangle);
        }
        DynamicImage::ImageLuma8(binary)
    }

    /// Try each candidate angle and keep the rotation with the highest
    /// row-variance score. Returns the chosen angle and rotated image.
    pub fn deskew(&self, image: &RgbImage) -> (f32, RgbImage) {
        let (width, height) = image.dimensions();
        let scores: Vec<f64> = self
            .angles
            .iter()
            .map(|&angle| {
                let score = row_variance_score(&rotate_to_size(image, angle, width, height));
                debug!("Deskew candidate {}° scored {:.2}", angle, score);
                score
            })
            .collect();

        let angle = best_index(&scores).map_or(0.0, |i| self.angles[i]);
        (angle, rotate_to_size(image, angle, width, height))
    }

    /// Greyscale, denoise, sharpen, brighten, stretch, normalize and threshold.
    pub fn binarize(&self, image: &RgbImage) -> GrayImage {
        let grey = DynamicImage::ImageRgb8(image.clone()).to_luma8();
        let denoised = median_filter(&grey, MEDIAN_RADIUS, MEDIAN_RADIUS);
        let sharpened = sharpen3x3(&denoised);
        // Saturation has no effect once the page is single-channel
        let brightened = imageops::brighten(&sharpened, BRIGHTEN);
        let stretched = linear_stretch(&brightened, LINEAR_GAIN);
        let normalized = normalize(&stretched);
        threshold(&normalized, self.threshold)
    }
}

/// Index of the highest score. The earliest candidate wins exact ties.
fn best_index(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Rotate about the center on a white background, keeping the canvas size.
fn rotate_to_size(image: &RgbImage, degrees: f32, width: u32, height: u32) -> RgbImage {
    let rotated = if degrees == 0.0 {
        image.clone()
    } else {
        rotate_about_center(image, degrees.to_radians(), Interpolation::Bilinear, WHITE)
    };
    if rotated.dimensions() == (width, height) {
        rotated
    } else {
        imageops::resize(&rotated, width, height, FilterType::Triangle)
    }
}

/// Row-variance alignment score.
///
/// Downsamples to at most 400x400 greyscale, takes the mean intensity of each
/// row and sums `(mean - 128)^2` over rows, divided by the row count.
pub fn row_variance_score(image: &RgbImage) -> f64 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let grey = DynamicImage::ImageRgb8(image.clone()).to_luma8();
    let grey = if width > SCORE_MAX_SIDE || height > SCORE_MAX_SIDE {
        let (w, h) = fit_within(width, height, SCORE_MAX_SIDE);
        imageops::resize(&grey, w, h, FilterType::Triangle)
    } else {
        grey
    };

    let (w, h) = grey.dimensions();
    let total: f64 = grey
        .rows()
        .map(|row| {
            let sum: u64 = row.map(|p| p.0[0] as u64).sum();
            let mean = sum as f64 / w as f64;
            (mean - 128.0).powi(2)
        })
        .sum();
    total / h as f64
}

/// Scale dimensions down to fit a square bound, preserving aspect ratio.
fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let ratio = (max_side as f64 / width as f64).min(max_side as f64 / height as f64);
    let w = ((width as f64 * ratio).round() as u32).clamp(1, max_side);
    let h = ((height as f64 * ratio).round() as u32).clamp(1, max_side);
    (w, h)
}

/// `out = gain * (in - 128) + 128`, clamped.
fn linear_stretch(image: &GrayImage, gain: f32) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let value = gain * (pixel.0[0] as f32 - 128.0) + 128.0;
        pixel.0[0] = value.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Stretch the 1st..99th luminance percentiles to the full 0..255 range.
fn normalize(image: &GrayImage) -> GrayImage {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return image.clone();
    }

    let percentile = |fraction: f32| -> u8 {
        let target = (total as f32 * fraction).ceil() as u64;
        let mut seen = 0u64;
        for (value, count) in histogram.iter().enumerate() {
            seen += count;
            if seen >= target.max(1) {
                return value as u8;
            }
        }
        255
    };

    let low = percentile(NORMALIZE_LOW_PERCENTILE);
    let high = percentile(NORMALIZE_HIGH_PERCENTILE);
    if high <= low {
        return image.clone();
    }

    let span = (high - low) as f32;
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let value = (pixel.0[0].saturating_sub(low)) as f32 * 255.0 / span;
        pixel.0[0] = value.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Pixels at or above the cut become white, the rest black.
fn threshold(image: &GrayImage, cut: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        *pixel = if pixel.0[0] >= cut { Luma([255]) } else { Luma([0]) };
    }
    out
}
