use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, Rgba};

use crate::canvas::{blend_pixel, CanvasError, PixelBuffer};

/// Export scale limits, in percent.
pub const MIN_EXPORT_SCALE: u32 = 10;
pub const MAX_EXPORT_SCALE: u32 = 200;

/// Lowest JPEG quality offered; the top is 100.
pub const MIN_JPEG_QUALITY: u8 = 10;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Encode(String),
    UnsupportedFormat(String),
    Canvas(CanvasError),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Encode(e) => write!(f, "Encoding error: {}", e),
            ExportError::UnsupportedFormat(e) => write!(f, "Unsupported format: {}", e),
            ExportError::Canvas(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<ImageError> for ExportError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => ExportError::Io(io),
            other => ExportError::Encode(other.to_string()),
        }
    }
}

impl From<CanvasError> for ExportError {
    fn from(e: CanvasError) -> Self {
        ExportError::Canvas(e)
    }
}

// ============================================================================
// FORMATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    /// Pick the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            other => Err(ExportError::UnsupportedFormat(format!(
                "'{}' (expected .png, .jpg or .jpeg)",
                other
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }
}

/// How the composite is turned into a file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// JPEG only, 10..=100.
    pub quality: u8,
    /// Percent of the document size, clamped to 10..=200.
    pub scale_percent: u32,
    /// JPEG has no alpha; transparent pixels are flattened onto this.
    pub matte: Rgba<u8>,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            quality: 90,
            scale_percent: 100,
            matte: Rgba([255, 255, 255, 255]),
        }
    }
}

/// Output size for a `scale_percent` export (never below 1×1).
pub fn scaled_size(width: u32, height: u32, scale_percent: u32) -> (u32, u32) {
    let pct = scale_percent.clamp(MIN_EXPORT_SCALE, MAX_EXPORT_SCALE) as u64;
    let w = ((width as u64 * pct + 50) / 100).max(1) as u32;
    let h = ((height as u64 * pct + 50) / 100).max(1) as u32;
    (w, h)
}

/// Encode the composite into `out` according to `options`.
pub fn encode_composite<W: Write>(
    composite: &PixelBuffer,
    options: &ExportOptions,
    mut out: W,
) -> Result<(), ExportError> {
    let (w, h) = scaled_size(composite.width(), composite.height(), options.scale_percent);
    let scaled;
    let image = if (w, h) == (composite.width(), composite.height()) {
        composite
    } else {
        scaled = composite.resized(w, h)?;
        &scaled
    };

    match options.format {
        ExportFormat::Png => {
            PngEncoder::new(&mut out).write_image(image.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
        ExportFormat::Jpeg => {
            let rgb = flatten_rgb(image, options.matte);
            let mut encoder = JpegEncoder::new_with_quality(&mut out, options.quality.clamp(MIN_JPEG_QUALITY, 100));
            encoder.encode(&rgb, w, h, image::ColorType::Rgb8)?;
        }
    }
    Ok(())
}

/// Write the composite to `path`.
pub fn export_to_file(composite: &PixelBuffer, path: &Path, options: &ExportOptions) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_composite(composite, options, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Drop alpha by compositing over an opaque matte.
fn flatten_rgb(image: &PixelBuffer, matte: Rgba<u8>) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for (_, _, px) in image.pixels() {
        let Rgba([r, g, b, _]) = blend_pixel(matte, px, 1.0);
        rgb.extend_from_slice(&[r, g, b]);
    }
    rgb
}
