//! Size-budget image compression
//!
//! Oversized images are re-encoded as JPEG until they fit a byte budget. The
//! search is an explicit state machine: [`BudgetPlan::next`] looks at the last
//! encode `(width, quality, len)` and decides whether to accept it, try again at
//! a lower quality (and, for large overshoots, a smaller width), or give up with
//! one forced low-quality encode. The budget is a target, not a ceiling.
//!
//! Compression is not idempotent. Feeding JPEG output back in re-encodes it
//! unless it is already within budget, in which case it passes through.

use bytes::Bytes;
use hearth_core::constants::{DEFAULT_COMPRESSION_BUDGET_BYTES, DEFAULT_COMPRESSION_MAX_WIDTH};
use hearth_core::AppError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, RgbImage};
use std::io::Cursor;

pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";
pub const INITIAL_QUALITY: u8 = 85;
pub const MIN_QUALITY: u8 = 20;
pub const QUALITY_STEP: u8 = 10;
pub const FALLBACK_WIDTH: u32 = 800;

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode JPEG at {width}px q{quality}: {reason}")]
    Encode {
        width: u32,
        quality: u8,
        reason: String,
    },

    #[error("encoder produced no output")]
    EmptyOutput,
}

impl From<CompressionError> for AppError {
    fn from(err: CompressionError) -> Self {
        AppError::CompressionFailure(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub budget_bytes: usize,
    pub max_width: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_COMPRESSION_BUDGET_BYTES,
            max_width: DEFAULT_COMPRESSION_MAX_WIDTH,
        }
    }
}

/// Result of the most recent encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeState {
    pub width: u32,
    pub quality: u8,
    pub len: usize,
}

/// What to do after an encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Output fits the budget.
    Accept,
    /// Re-encode with these parameters and look again.
    Encode { width: u32, quality: u8 },
    /// Final encode; its output is accepted whatever its size.
    Fallback { width: u32, quality: u8 },
}

/// Transition rules for one compression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPlan {
    pub budget: usize,
    /// Width of the first encode: the source width capped at `max_width`.
    pub start_width: u32,
}

impl BudgetPlan {
    pub fn new(budget: usize, source_width: u32, max_width: u32) -> Self {
        Self {
            budget,
            start_width: source_width.min(max_width).max(1),
        }
    }

    pub fn initial(&self) -> (u32, u8) {
        (self.start_width, INITIAL_QUALITY)
    }

    pub fn next(&self, state: EncodeState) -> Step {
        if state.len <= self.budget {
            return Step::Accept;
        }

        if state.quality > MIN_QUALITY {
            let width = if state.len > self.budget.saturating_mul(2) {
                shrink(state.width)
            } else {
                state.width
            };
            let quality = state.quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
            return Step::Encode { width, quality };
        }

        Step::Fallback {
            width: FALLBACK_WIDTH.min(self.start_width),
            quality: MIN_QUALITY,
        }
    }

    /// Run the plan to completion against `encode`, returning the final output,
    /// how the run ended, and every `(width, quality)` tried in order.
    pub fn drive<E, F>(&self, mut encode: F) -> Result<(Vec<u8>, CompressionExit, Vec<(u32, u8)>), E>
    where
        F: FnMut(u32, u8) -> Result<Vec<u8>, E>,
    {
        let (mut width, mut quality) = self.initial();
        let mut attempts = vec![(width, quality)];
        let mut output = encode(width, quality)?;

        loop {
            let state = EncodeState {
                width,
                quality,
                len: output.len(),
            };
            match self.next(state) {
                Step::Accept => return Ok((output, CompressionExit::WithinBudget, attempts)),
                Step::Encode {
                    width: next_width,
                    quality: next_quality,
                } => {
                    width = next_width;
                    quality = next_quality;
                    attempts.push((width, quality));
                    output = encode(width, quality)?;
                }
                Step::Fallback {
                    width: fallback_width,
                    quality: fallback_quality,
                } => {
                    attempts.push((fallback_width, fallback_quality));
                    let output = encode(fallback_width, fallback_quality)?;
                    return Ok((output, CompressionExit::Fallback, attempts));
                }
            }
        }
    }
}

/// floor(width * 0.8), never below one pixel
fn shrink(width: u32) -> u32 {
    ((width as u64 * 4 / 5) as u32).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionExit {
    /// Not an image, or already within budget; bytes untouched.
    PassThrough,
    WithinBudget,
    /// Budget missed; output of the forced final encode.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub data: Bytes,
    pub content_type: String,
    pub exit: CompressionExit,
    pub attempts: Vec<(u32, u8)>,
}

impl CompressionOutcome {
    /// Whether the bytes were re-encoded (and are therefore JPEG).
    pub fn applied(&self) -> bool {
        self.exit != CompressionExit::PassThrough
    }

    pub fn final_params(&self) -> Option<(u32, u8)> {
        self.attempts.last().copied()
    }
}

pub fn is_image_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Re-encodes oversized images to fit a byte budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeBudgetCompressor {
    settings: CompressionSettings,
}

impl SizeBudgetCompressor {
    pub fn new(settings: CompressionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> CompressionSettings {
        self.settings
    }

    /// Compress `data` declared as `declared_type`.
    ///
    /// CPU-bound and synchronous; async callers should run it on a blocking thread.
    pub fn compress(
        &self,
        data: Bytes,
        declared_type: &str,
    ) -> Result<CompressionOutcome, CompressionError> {
        let budget = self.settings.budget_bytes;

        if !is_image_type(declared_type) || data.len() <= budget {
            return Ok(CompressionOutcome {
                data,
                content_type: declared_type.to_string(),
                exit: CompressionExit::PassThrough,
                attempts: Vec::new(),
            });
        }

        let source = decode_flattened(&data)?;
        let plan = BudgetPlan::new(budget, source.width(), self.settings.max_width);
        let mut resampler = Resampler::new(source);

        let (output, exit, attempts) =
            plan.drive(|width, quality| encode_jpeg(resampler.at_width(width), quality))?;

        if output.is_empty() {
            return Err(CompressionError::EmptyOutput);
        }

        tracing::debug!(
            input_bytes = data.len(),
            output_bytes = output.len(),
            budget_bytes = budget,
            attempts = attempts.len(),
            exit = ?exit,
            "Image compressed"
        );

        Ok(CompressionOutcome {
            data: Bytes::from(output),
            content_type: OUTPUT_CONTENT_TYPE.to_string(),
            exit,
            attempts,
        })
    }
}

fn decode_flattened(data: &[u8]) -> Result<RgbImage, CompressionError> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CompressionError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| CompressionError::Decode(e.to_string()))?;

    Ok(flatten_onto_white(img))
}

/// JPEG has no alpha; composite transparent pixels onto white instead of black.
fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u32;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        }
    }
    rgb
}

/// Holds the decoded source and the most recent resize of it.
struct Resampler {
    source: RgbImage,
    cached: Option<(u32, RgbImage)>,
}

impl Resampler {
    fn new(source: RgbImage) -> Self {
        Self {
            source,
            cached: None,
        }
    }

    fn at_width(&mut self, width: u32) -> &RgbImage {
        if width >= self.source.width() {
            return &self.source;
        }

        let stale = !matches!(self.cached, Some((w, _)) if w == width);
        if stale {
            let height = ((self.source.height() as u64 * width as u64
                + self.source.width() as u64 / 2)
                / self.source.width() as u64)
                .max(1) as u32;
            let resized = image::imageops::resize(&self.source, width, height, FilterType::Triangle);
            self.cached = Some((width, resized));
        }

        match self.cached {
            Some((_, ref img)) => img,
            None => &self.source,
        }
    }
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
    let mut buffer = Vec::with_capacity(img.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| CompressionError::Encode {
            width: img.width(),
            quality,
            reason: e.to_string(),
        })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const KIB: usize = 1024;

    fn noise_image(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut rng = StdRng::seed_from_u64(seed);
        RgbImage::from_fn(width, height, |x, y| {
            let base = ((x + y) % 256) as u8;
            Rgb([
                base.wrapping_add(rng.random_range(0..96)),
                rng.random(),
                base.wrapping_sub(rng.random_range(0..96)),
            ])
        })
    }

    fn encode_as(img: &DynamicImage, format: ImageFormat) -> Bytes {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        Bytes::from(buffer)
    }

    fn decoded_width(data: &[u8]) -> u32 {
        image::load_from_memory(data).unwrap().width()
    }

    fn assert_valid_exit(outcome: &CompressionOutcome, budget: usize) {
        match outcome.exit {
            CompressionExit::WithinBudget => assert!(outcome.data.len() <= budget),
            CompressionExit::Fallback => {
                let (width, quality) = outcome.final_params().unwrap();
                assert_eq!(quality, MIN_QUALITY);
                assert!(width <= FALLBACK_WIDTH);
            }
            CompressionExit::PassThrough => panic!("expected compression to apply"),
        }
    }

    #[test]
    fn step_accepts_within_budget() {
        let plan = BudgetPlan::new(100, 1920, 1920);
        let state = EncodeState {
            width: 1920,
            quality: 85,
            len: 100,
        };
        assert_eq!(plan.next(state), Step::Accept);
    }

    #[test]
    fn step_lowers_quality_only_for_small_overshoot() {
        let plan = BudgetPlan::new(100, 1920, 1920);
        let state = EncodeState {
            width: 1920,
            quality: 85,
            len: 200,
        };
        assert_eq!(
            plan.next(state),
            Step::Encode {
                width: 1920,
                quality: 75
            }
        );
    }

    #[test]
    fn step_shrinks_width_for_large_overshoot() {
        let plan = BudgetPlan::new(100, 1920, 1920);
        let state = EncodeState {
            width: 1920,
            quality: 85,
            len: 201,
        };
        assert_eq!(
            plan.next(state),
            Step::Encode {
                width: 1536,
                quality: 75
            }
        );
    }

    #[test]
    fn step_clamps_quality_at_minimum() {
        let plan = BudgetPlan::new(100, 1920, 1920);
        let state = EncodeState {
            width: 1000,
            quality: 25,
            len: 150,
        };
        assert_eq!(
            plan.next(state),
            Step::Encode {
                width: 1000,
                quality: 20
            }
        );
    }

    #[test]
    fn step_falls_back_once_quality_exhausted() {
        let plan = BudgetPlan::new(100, 1920, 1920);
        let state = EncodeState {
            width: 401,
            quality: 20,
            len: 5000,
        };
        assert_eq!(
            plan.next(state),
            Step::Fallback {
                width: 800,
                quality: 20
            }
        );
    }

    #[test]
    fn fallback_never_upscales_narrow_sources() {
        let plan = BudgetPlan::new(100, 300, 1920);
        let state = EncodeState {
            width: 300,
            quality: 20,
            len: 5000,
        };
        assert_eq!(
            plan.next(state),
            Step::Fallback {
                width: 300,
                quality: 20
            }
        );
    }

    #[test]
    fn plan_start_width_never_upscales() {
        assert_eq!(BudgetPlan::new(1, 640, 1920).start_width, 640);
        assert_eq!(BudgetPlan::new(1, 5000, 1920).start_width, 1920);
    }

    #[test]
    fn drive_walks_full_trail_when_always_far_over_budget() {
        let plan = BudgetPlan::new(100, 5000, 1920);
        let (output, exit, attempts) = plan
            .drive::<(), _>(|_, _| Ok(vec![0u8; 10_000]))
            .unwrap();

        assert_eq!(exit, CompressionExit::Fallback);
        assert_eq!(output.len(), 10_000);
        assert_eq!(
            attempts,
            vec![
                (1920, 85),
                (1536, 75),
                (1228, 65),
                (982, 55),
                (785, 45),
                (628, 35),
                (502, 25),
                (401, 20),
                (800, 20),
            ]
        );
    }

    #[test]
    fn drive_keeps_width_for_modest_overshoot() {
        let plan = BudgetPlan::new(100, 1000, 1920);
        let (_, exit, attempts) = plan
            .drive::<(), _>(|_, quality| Ok(vec![0u8; if quality > 60 { 150 } else { 90 }]))
            .unwrap();

        assert_eq!(exit, CompressionExit::WithinBudget);
        assert_eq!(attempts, vec![(1000, 85), (1000, 75), (1000, 65), (1000, 55)]);
    }

    #[test]
    fn drive_propagates_encoder_errors() {
        let plan = BudgetPlan::new(100, 1000, 1920);
        let result = plan.drive(|_, _| Err::<Vec<u8>, _>("codec exploded"));
        assert_eq!(result.unwrap_err(), "codec exploded");
    }

    #[test]
    fn small_image_passes_through_unchanged() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255])));
        let png = encode_as(&img, ImageFormat::Png);
        assert!(png.len() <= 200 * KIB);

        let outcome = SizeBudgetCompressor::default()
            .compress(png.clone(), "image/png")
            .unwrap();

        assert_eq!(outcome.exit, CompressionExit::PassThrough);
        assert_eq!(outcome.data, png);
        assert_eq!(outcome.content_type, "image/png");
        assert!(!outcome.applied());
    }

    #[test]
    fn non_image_passes_through_regardless_of_size() {
        let data = Bytes::from(vec![7u8; 300 * KIB]);
        let outcome = SizeBudgetCompressor::default()
            .compress(data.clone(), "application/pdf")
            .unwrap();
        assert_eq!(outcome.exit, CompressionExit::PassThrough);
        assert_eq!(outcome.data, data);
        assert_eq!(outcome.content_type, "application/pdf");
    }

    #[test]
    fn large_png_is_brought_under_budget_as_jpeg() {
        let img = DynamicImage::ImageRgb8(noise_image(1600, 1000, 7));
        let png = encode_as(&img, ImageFormat::Png);
        assert!(png.len() > 200 * KIB);

        let compressor = SizeBudgetCompressor::default();
        let outcome = compressor.compress(png, "image/png").unwrap();

        assert!(outcome.applied());
        assert_eq!(outcome.content_type, "image/jpeg");
        assert_valid_exit(&outcome, 200 * KIB);
        assert!(decoded_width(&outcome.data) <= 1600);
        assert!(outcome.attempts.len() <= 9);
        assert_eq!(outcome.attempts[0], (1600, 85));
    }

    #[test]
    fn wide_photo_is_capped_at_max_width() {
        let img = DynamicImage::ImageRgb8(noise_image(2400, 1600, 11));
        let jpeg = encode_as(&img, ImageFormat::Jpeg);
        assert!(jpeg.len() > 200 * KIB);

        let outcome = SizeBudgetCompressor::default()
            .compress(jpeg, "image/jpeg")
            .unwrap();

        assert_valid_exit(&outcome, 200 * KIB);
        let width = decoded_width(&outcome.data);
        assert!(width <= 1920);
        let (_, quality) = outcome.final_params().unwrap();
        assert!(quality <= 85);
    }

    #[test]
    fn large_camera_photo_fits_width_and_attempt_limits() {
        let img = DynamicImage::ImageRgb8(noise_image(5000, 3000, 21));
        let jpeg = encode_as(&img, ImageFormat::Jpeg);

        let outcome = SizeBudgetCompressor::default()
            .compress(jpeg, "image/jpeg")
            .unwrap();

        assert!(outcome.applied());
        assert_valid_exit(&outcome, 200 * KIB);
        assert!(decoded_width(&outcome.data) <= 1920);
        assert_eq!(outcome.attempts[0], (1920, 85));
        assert!(outcome.attempts.iter().all(|&(_, quality)| quality <= 85));
        // Initial encode, at most seven refinements, then the fallback.
        assert!(outcome.attempts.len() <= 1 + 7 + 1);
    }

    #[test]
    fn unreachable_budget_ends_in_fallback() {
        let img = DynamicImage::ImageRgb8(noise_image(1000, 700, 3));
        let png = encode_as(&img, ImageFormat::Png);

        let compressor = SizeBudgetCompressor::new(CompressionSettings {
            budget_bytes: 512,
            max_width: 1920,
        });
        let outcome = compressor.compress(png, "image/png").unwrap();

        assert_eq!(outcome.exit, CompressionExit::Fallback);
        assert_eq!(outcome.final_params(), Some((800, 20)));
        assert_eq!(decoded_width(&outcome.data), 800);
        assert!(outcome.data.len() > 512);
    }

    #[test]
    fn narrow_image_is_never_upscaled_even_in_fallback() {
        let img = DynamicImage::ImageRgb8(noise_image(300, 900, 5));
        let png = encode_as(&img, ImageFormat::Png);

        let compressor = SizeBudgetCompressor::new(CompressionSettings {
            budget_bytes: 256,
            max_width: 1920,
        });
        let outcome = compressor.compress(png, "image/png").unwrap();

        assert_eq!(outcome.exit, CompressionExit::Fallback);
        assert!(decoded_width(&outcome.data) <= 300);
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
        let rgb = flatten_onto_white(img);
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn corrupt_image_is_a_compression_failure() {
        let garbage = Bytes::from(vec![0xFFu8; 300 * KIB]);
        let err = SizeBudgetCompressor::default()
            .compress(garbage, "image/jpeg")
            .unwrap_err();
        assert!(matches!(err, CompressionError::Decode(_)));
        assert!(matches!(AppError::from(err), AppError::CompressionFailure(_)));
    }

    #[test]
    fn recompressing_small_output_is_a_no_op() {
        let img = DynamicImage::ImageRgb8(noise_image(1200, 800, 9));
        let png = encode_as(&img, ImageFormat::Png);
        let compressor = SizeBudgetCompressor::default();

        let first = compressor.compress(png, "image/png").unwrap();
        assert_eq!(first.exit, CompressionExit::WithinBudget);
        assert!(first.data.len() <= 200 * KIB);

        let second = compressor
            .compress(first.data.clone(), &first.content_type)
            .unwrap();
        assert_eq!(second.exit, CompressionExit::PassThrough);
        assert_eq!(second.data, first.data);
    }

    #[test]
    fn image_type_detection() {
        assert!(is_image_type("image/png"));
        assert!(is_image_type(" IMAGE/JPEG"));
        assert!(!is_image_type("application/octet-stream"));
        assert!(!is_image_type(""));
    }
}
