use std::fmt;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use uuid::Uuid;

use crate::components::colors::TRANSPARENT;

/// Largest canvas we agree to allocate (~256 megapixels).
const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// ERRORS
// ============================================================================

/// Everything the engine can refuse.  None of these are fatal: the operation
/// that produced one leaves the document exactly as it was.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasError {
    /// Direct pixel access outside the buffer.
    OutOfBounds { x: i32, y: i32, width: u32, height: u32 },
    /// Zero-sized or absurdly large buffer requested.
    InvalidSize { width: u32, height: u32 },
    /// The document must always keep one layer.
    LastLayer,
    UnknownLayer(LayerId),
    /// A history snapshot could not be encoded or decoded.
    Snapshot(String),
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasError::OutOfBounds { x, y, width, height } => {
                write!(f, "pixel ({}, {}) is outside the {}×{} buffer", x, y, width, height)
            }
            CanvasError::InvalidSize { width, height } => {
                write!(f, "invalid canvas size {}×{}", width, height)
            }
            CanvasError::LastLayer => write!(f, "cannot delete the only layer"),
            CanvasError::UnknownLayer(id) => write!(f, "no layer with id {}", id),
            CanvasError::Snapshot(e) => write!(f, "snapshot error: {}", e),
        }
    }
}

impl std::error::Error for CanvasError {}

impl From<image::ImageError> for CanvasError {
    fn from(e: image::ImageError) -> Self {
        CanvasError::Snapshot(e.to_string())
    }
}

fn check_size(width: u32, height: u32) -> Result<(), CanvasError> {
    let total = width as u64 * height as u64;
    if width == 0 || height == 0 || total > MAX_PIXELS {
        return Err(CanvasError::InvalidSize { width, height });
    }
    Ok(())
}

// ============================================================================
// PIXEL BUFFER – fixed-size flat RGBA raster
// ============================================================================

/// A fixed-size RGBA raster backed by a contiguous `RgbaImage`
/// (`width * height * 4` bytes).  The size never changes after construction;
/// "resizing" always produces a new buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        check_size(width, height)?;
        Ok(Self { image: RgbaImage::new(width, height) })
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self, CanvasError> {
        check_size(width, height)?;
        Ok(Self { image: RgbaImage::from_pixel(width, height, color) })
    }

    pub fn from_rgba_image(image: RgbaImage) -> Result<Self, CanvasError> {
        check_size(image.width(), image.height())?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 { self.image.width() }

    pub fn height(&self) -> u32 { self.image.height() }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    fn out_of_bounds(&self, x: i32, y: i32) -> CanvasError {
        CanvasError::OutOfBounds { x, y, width: self.width(), height: self.height() }
    }

    pub fn get(&self, x: i32, y: i32) -> Result<Rgba<u8>, CanvasError> {
        if !self.contains(x, y) {
            return Err(self.out_of_bounds(x, y));
        }
        Ok(*self.image.get_pixel(x as u32, y as u32))
    }

    pub fn set(&mut self, x: i32, y: i32, color: Rgba<u8>) -> Result<(), CanvasError> {
        if !self.contains(x, y) {
            return Err(self.out_of_bounds(x, y));
        }
        self.image.put_pixel(x as u32, y as u32, color);
        Ok(())
    }

    /// Flat mutable bytes for row-parallel writers.
    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.image.pixels_mut() {
            *px = color;
        }
    }

    /// Blit `other` with its top-left corner at (`dest_x`, `dest_y`).
    /// Whatever falls outside this buffer is silently dropped.
    pub fn copy_from(&mut self, other: &PixelBuffer, dest_x: i32, dest_y: i32) {
        let dst_w = self.width() as i64;
        let dst_h = self.height() as i64;
        let src_w = other.width() as i64;
        let src_h = other.height() as i64;

        // Overlap in destination coordinates
        let x0 = (dest_x as i64).max(0);
        let y0 = (dest_y as i64).max(0);
        let x1 = (dest_x as i64 + src_w).min(dst_w);
        let y1 = (dest_y as i64 + src_h).min(dst_h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let run = ((x1 - x0) * 4) as usize;
        let src_raw = other.image.as_raw();
        let dst_stride = (dst_w * 4) as usize;
        let src_stride = (src_w * 4) as usize;
        let dst_raw: &mut [u8] = &mut self.image;
        for y in y0..y1 {
            let sy = y - dest_y as i64;
            let sx = x0 - dest_x as i64;
            let src_off = sy as usize * src_stride + sx as usize * 4;
            let dst_off = y as usize * dst_stride + x0 as usize * 4;
            dst_raw[dst_off..dst_off + run].copy_from_slice(&src_raw[src_off..src_off + run]);
        }
    }

    /// New buffer of the given size holding the overlapping top-left region
    /// of this one; the rest is transparent.
    pub fn cropped_into(&self, width: u32, height: u32) -> Result<PixelBuffer, CanvasError> {
        let mut out = PixelBuffer::new(width, height)?;
        out.copy_from(self, 0, 0);
        Ok(out)
    }

    /// Proportionally re-render into a new size.
    pub fn resized(&self, width: u32, height: u32) -> Result<PixelBuffer, CanvasError> {
        check_size(width, height)?;
        if width == self.width() && height == self.height() {
            return Ok(self.clone());
        }
        let scaled = image::imageops::resize(
            &self.image,
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
        Ok(Self { image: scaled })
    }

    /// Iterate `(x, y, color)` in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, Rgba<u8>)> + '_ {
        self.image.enumerate_pixels().map(|(x, y, p)| (x, y, *p))
    }

    pub fn as_raw(&self) -> &[u8] { self.image.as_raw() }
}

// ============================================================================
// LAYERS
// ============================================================================

/// Opaque, immutable layer identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Layer {
    id: LayerId,
    pub name: String,
    pub visible: bool,
    /// Global opacity in [0, 1], applied on top of per-pixel alpha.
    pub opacity: f32,
    pub pixels: PixelBuffer,
}

impl Layer {
    pub fn new(name: String, width: u32, height: u32, fill_color: Rgba<u8>) -> Result<Self, CanvasError> {
        let pixels = PixelBuffer::new_filled(width, height, fill_color)?;
        Ok(Self::from_pixels(name, pixels))
    }

    pub fn from_pixels(name: String, pixels: PixelBuffer) -> Self {
        Self {
            id: LayerId::new(),
            name,
            visible: true,
            opacity: 1.0,
            pixels,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }
}

// ============================================================================
// COMPOSITOR
// ============================================================================

/// Flatten `layers` (back to front) into a new `width`×`height` buffer.
///
/// Hidden layers are skipped outright, so hiding a layer never touches its
/// stored opacity.  Rows are blended in parallel; each row only depends on
/// its own inputs so the result is identical on every call.
pub fn composite(layers: &[Layer], width: u32, height: u32) -> Result<PixelBuffer, CanvasError> {
    let mut out = PixelBuffer::new(width, height)?;
    let row_bytes = width as usize * 4;

    for layer in layers.iter().filter(|l| l.visible) {
        let opacity = layer.opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            continue;
        }
        let src = layer.pixels.as_raw();
        let src_w = layer.pixels.width() as usize;
        let src_h = layer.pixels.height() as usize;
        let cols = src_w.min(width as usize);

        out.image
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, dst_row)| {
                if y >= src_h {
                    return;
                }
                let src_row = &src[y * src_w * 4..y * src_w * 4 + cols * 4];
                for x in 0..cols {
                    let o = x * 4;
                    let base = Rgba([dst_row[o], dst_row[o + 1], dst_row[o + 2], dst_row[o + 3]]);
                    let top = Rgba([src_row[o], src_row[o + 1], src_row[o + 2], src_row[o + 3]]);
                    let Rgba(px) = blend_pixel(base, top, opacity);
                    dst_row[o..o + 4].copy_from_slice(&px);
                }
            });
    }

    Ok(out)
}

/// Source-over blend of `top` (its alpha scaled by `opacity`) onto `base`.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to blend
    if top[3] == 0 {
        return base;
    }

    // Fast path: full opacity, fully opaque top pixel — just overwrite
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return TRANSPARENT;
    }

    let out_r = (top_r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (top_g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (top_b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([to_channel(out_r), to_channel(out_g), to_channel(out_b), to_channel(out_a)])
}

#[inline]
fn to_channel(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn solid(name: &str, color: Rgba<u8>) -> Layer {
        Layer::new(name.to_string(), 4, 4, color).unwrap()
    }

    #[test]
    fn get_and_set_are_bounds_checked() {
        let mut buf = PixelBuffer::new(3, 2).unwrap();
        assert_eq!(buf.as_raw().len(), 3 * 2 * 4);
        buf.set(2, 1, RED).unwrap();
        assert_eq!(buf.get(2, 1).unwrap(), RED);
        assert!(matches!(buf.get(3, 0), Err(CanvasError::OutOfBounds { x: 3, y: 0, .. })));
        assert!(matches!(buf.set(-1, 0, RED), Err(CanvasError::OutOfBounds { .. })));
        assert!(buf.get(0, 2).is_err());
    }

    #[test]
    fn zero_sized_buffers_are_rejected() {
        assert_eq!(PixelBuffer::new(0, 5), Err(CanvasError::InvalidSize { width: 0, height: 5 }));
    }

    #[test]
    fn copy_from_clips_at_destination_edges() {
        let mut dst = PixelBuffer::new(4, 4).unwrap();
        let src = PixelBuffer::new_filled(3, 3, RED).unwrap();
        dst.copy_from(&src, 2, -1);
        assert_eq!(dst.get(2, 0).unwrap(), RED);
        assert_eq!(dst.get(3, 1).unwrap(), RED);
        assert_eq!(dst.get(2, 2).unwrap(), TRANSPARENT);
        assert_eq!(dst.get(1, 0).unwrap(), TRANSPARENT);

        // Entirely outside: no-op
        let before = dst.clone();
        dst.copy_from(&src, 10, 10);
        assert_eq!(dst, before);
    }

    #[test]
    fn cropped_into_keeps_overlap_only() {
        let src = PixelBuffer::new_filled(2, 2, BLUE).unwrap();
        let out = src.cropped_into(3, 1).unwrap();
        assert_eq!(out.get(1, 0).unwrap(), BLUE);
        assert_eq!(out.get(2, 0).unwrap(), TRANSPARENT);
    }

    #[test]
    fn resized_scales_solid_color() {
        let src = PixelBuffer::new_filled(4, 4, BLUE).unwrap();
        let out = src.resized(8, 2).unwrap();
        assert_eq!((out.width(), out.height()), (8, 2));
        assert!(out.pixels().all(|(_, _, p)| p == BLUE));
    }

    #[test]
    fn composite_is_order_sensitive() {
        let a = solid("a", RED);
        let b = solid("b", BLUE);
        let ab = composite(&[a.clone(), b.clone()], 4, 4).unwrap();
        let ba = composite(&[b, a], 4, 4).unwrap();
        assert_ne!(ab, ba);
        assert_eq!(ab.get(1, 1).unwrap(), BLUE);
        assert_eq!(ba.get(1, 1).unwrap(), RED);
    }

    #[test]
    fn composite_is_deterministic() {
        let mut top = solid("top", Rgba([200, 40, 10, 90]));
        top.opacity = 0.37;
        let layers = vec![solid("bottom", Rgba([12, 200, 99, 180])), top];
        let first = composite(&layers, 4, 4).unwrap();
        let second = composite(&layers, 4, 4).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn half_opacity_red_over_blue() {
        let mut top = solid("top", RED);
        top.opacity = 0.5;
        let out = composite(&[solid("bottom", BLUE), top], 4, 4).unwrap();
        assert_eq!(out.get(2, 3).unwrap(), Rgba([128, 0, 128, 255]));
    }

    #[test]
    fn hidden_layers_contribute_nothing_and_keep_opacity() {
        let mut top = solid("top", RED);
        top.opacity = 0.25;
        top.visible = false;
        let layers = vec![solid("bottom", BLUE), top];
        let out = composite(&layers, 4, 4).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), BLUE);
        assert_eq!(layers[1].opacity, 0.25);
    }

    #[test]
    fn empty_stack_is_transparent() {
        let out = composite(&[], 2, 2).unwrap();
        assert!(out.pixels().all(|(_, _, p)| p == TRANSPARENT));
    }

    #[test]
    fn blend_onto_transparent_keeps_source_color() {
        let out = blend_pixel(TRANSPARENT, Rgba([10, 20, 30, 128]), 1.0);
        assert_eq!(out, Rgba([10, 20, 30, 128]));
    }
}
