use image::Rgba;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::components::colors::{BLACK, TRANSPARENT};

/// Smallest stroke half-width we rasterize.  At this radius every pixel a
/// segment passes through has its centre inside the capsule, so hairline
/// strokes stay connected.
const MIN_HALF_WIDTH: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Shape primitives drawn from two drag corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangle,
    /// Circle centred on the first point, radius reaching the second.
    Ellipse,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse => "ellipse",
        }
    }
}

/// How a primitive is painted.  Passed into every draw call, never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawStyle {
    pub color: Rgba<u8>,
    pub stroke_width: f32,
    /// Multiplies the color's alpha on write.
    pub opacity: f32,
    /// Shapes only: fill the interior instead of stroking the outline.
    pub filled: bool,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            color: BLACK,
            stroke_width: 5.0,
            opacity: 1.0,
            filled: false,
        }
    }
}

impl DrawStyle {
    pub fn new(color: Rgba<u8>, stroke_width: f32) -> Self {
        Self { color, stroke_width, ..Self::default() }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn filled(mut self, filled: bool) -> Self {
        self.filled = filled;
        self
    }

    /// The exact pixel value written: color with alpha scaled by opacity.
    pub fn paint_color(&self) -> Rgba<u8> {
        let opacity = self.opacity.clamp(0.0, 1.0);
        let a = (self.color[3] as f32 * opacity).round().clamp(0.0, 255.0) as u8;
        Rgba([self.color[0], self.color[1], self.color[2], a])
    }

    fn half_width(&self) -> f32 {
        (self.stroke_width.max(0.0) * 0.5).max(MIN_HALF_WIDTH)
    }
}

// ============================================================================
// SDF functions — return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// Unsigned distance to a line segment (a point when a == b).
#[inline]
fn dist_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

// ============================================================================
// Primitives
// ============================================================================

/// Disk of radius `stroke_width / 2` centred at (cx, cy).
pub fn draw_point(buf: &mut PixelBuffer, cx: f32, cy: f32, style: &DrawStyle) {
    draw_line(buf, cx, cy, cx, cy, style);
}

/// Round-capped segment of width `stroke_width`.  Successive calls between
/// pointer samples form one continuous freehand stroke.
pub fn draw_line(buf: &mut PixelBuffer, x0: f32, y0: f32, x1: f32, y1: f32, style: &DrawStyle) {
    paint_capsule(buf, x0, y0, x1, y1, style.half_width(), style.paint_color());
}

/// Eraser segment: same footprint as a line, writes transparent pixels.
pub fn erase_line(buf: &mut PixelBuffer, x0: f32, y0: f32, x1: f32, y1: f32, width: f32) {
    let style = DrawStyle::new(TRANSPARENT, width);
    paint_capsule(buf, x0, y0, x1, y1, style.half_width(), TRANSPARENT);
}

fn paint_capsule(buf: &mut PixelBuffer, x0: f32, y0: f32, x1: f32, y1: f32, half: f32, color: Rgba<u8>) {
    let bounds = (x0.min(x1) - half, y0.min(y1) - half, x0.max(x1) + half, y0.max(y1) + half);
    paint_coverage(buf, bounds, color, |px, py| dist_segment(px, py, x0, y0, x1, y1) <= half);
}

/// Axis-aligned rectangle between two corners given in any order.  A filled
/// rect covers `x0 <= x < x1`, `y0 <= y < y1` after normalisation.
pub fn draw_rect(buf: &mut PixelBuffer, x0: f32, y0: f32, x1: f32, y1: f32, style: &DrawStyle) {
    let (x0, x1) = (x0.min(x1), x0.max(x1));
    let (y0, y1) = (y0.min(y1), y0.max(y1));
    let cx = (x0 + x1) * 0.5;
    let cy = (y0 + y1) * 0.5;
    let hx = (x1 - x0) * 0.5;
    let hy = (y1 - y0) * 0.5;
    let color = style.paint_color();

    if style.filled {
        paint_coverage(buf, (x0, y0, x1, y1), color, |px, py| sdf_box(px - cx, py - cy, hx, hy) < 0.0);
    } else {
        let half = style.half_width();
        let bounds = (x0 - half, y0 - half, x1 + half, y1 + half);
        paint_coverage(buf, bounds, color, |px, py| sdf_box(px - cx, py - cy, hx, hy).abs() <= half);
    }
}

/// Circle centred at (cx, cy) whose radius is the distance to (x1, y1).
pub fn draw_ellipse(buf: &mut PixelBuffer, cx: f32, cy: f32, x1: f32, y1: f32, style: &DrawStyle) {
    let radius = ((x1 - cx) * (x1 - cx) + (y1 - cy) * (y1 - cy)).sqrt();
    let color = style.paint_color();
    let dist = move |px: f32, py: f32| ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt();

    if style.filled {
        let bounds = (cx - radius, cy - radius, cx + radius, cy + radius);
        paint_coverage(buf, bounds, color, |px, py| dist(px, py) < radius);
    } else {
        let half = style.half_width();
        let reach = radius + half;
        let bounds = (cx - reach, cy - reach, cx + reach, cy + reach);
        paint_coverage(buf, bounds, color, |px, py| (dist(px, py) - radius).abs() <= half);
    }
}

/// Dispatch a two-point shape drag to the matching primitive.
pub fn draw_shape(buf: &mut PixelBuffer, kind: ShapeKind, from: (f32, f32), to: (f32, f32), style: &DrawStyle) {
    match kind {
        ShapeKind::Rectangle => draw_rect(buf, from.0, from.1, to.0, to.1, style),
        ShapeKind::Ellipse => draw_ellipse(buf, from.0, from.1, to.0, to.1, style),
    }
}

/// Overwrite every pixel whose centre satisfies `covered`, visiting only the
/// padded `bounds` (min_x, min_y, max_x, max_y) clipped to the buffer.
fn paint_coverage<F>(buf: &mut PixelBuffer, bounds: (f32, f32, f32, f32), color: Rgba<u8>, covered: F)
where
    F: Fn(f32, f32) -> bool + Sync,
{
    let (min_x, min_y, max_x, max_y) = bounds;
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return;
    }
    let w = buf.width() as i64;
    let h = buf.height() as i64;
    let x0 = (min_x.floor() as i64).saturating_sub(1).clamp(0, w) as usize;
    let x1 = (max_x.ceil() as i64).saturating_add(1).clamp(0, w) as usize;
    let y0 = (min_y.floor() as i64).saturating_sub(1).clamp(0, h) as usize;
    let y1 = (max_y.ceil() as i64).saturating_add(1).clamp(0, h) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = w as usize * 4;
    let px = color.0;
    buf.raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for x in x0..x1 {
                if covered(x as f32 + 0.5, py) {
                    row[x * 4..x * 4 + 4].copy_from_slice(&px);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::WHITE;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn canvas() -> PixelBuffer {
        PixelBuffer::new_filled(64, 64, WHITE).unwrap()
    }

    fn painted(buf: &PixelBuffer, color: Rgba<u8>) -> Vec<(u32, u32)> {
        buf.pixels().filter(|(_, _, p)| *p == color).map(|(x, y, _)| (x, y)).collect()
    }

    #[test]
    fn filled_rect_covers_half_open_range() {
        let mut buf = canvas();
        let style = DrawStyle::new(RED, 1.0).filled(true);
        draw_rect(&mut buf, 10.0, 10.0, 50.0, 50.0, &style);
        for (x, y, p) in buf.pixels() {
            let inside = (10..50).contains(&x) && (10..50).contains(&y);
            assert_eq!(p, if inside { RED } else { WHITE }, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn rect_corners_are_order_independent() {
        let style = DrawStyle::new(RED, 3.0);
        let mut a = canvas();
        let mut b = canvas();
        draw_rect(&mut a, 5.0, 40.0, 30.0, 8.0, &style);
        draw_rect(&mut b, 30.0, 8.0, 5.0, 40.0, &style);
        assert_eq!(a, b);
    }

    #[test]
    fn stroked_rect_leaves_interior_untouched() {
        let mut buf = canvas();
        draw_rect(&mut buf, 10.0, 10.0, 40.0, 40.0, &DrawStyle::new(RED, 2.0));
        assert_eq!(buf.get(10, 25).unwrap(), RED);
        assert_eq!(buf.get(39, 25).unwrap(), RED);
        assert_eq!(buf.get(25, 25).unwrap(), WHITE);
        assert_eq!(buf.get(5, 5).unwrap(), WHITE);
    }

    #[test]
    fn point_paints_disk_of_half_width() {
        let mut buf = canvas();
        draw_point(&mut buf, 32.0, 32.0, &DrawStyle::new(RED, 10.0));
        assert_eq!(buf.get(32, 32).unwrap(), RED);
        assert_eq!(buf.get(28, 32).unwrap(), RED);
        assert_eq!(buf.get(26, 32).unwrap(), WHITE);
        // Corner of the bounding square lies outside the disk
        assert_eq!(buf.get(27, 27).unwrap(), WHITE);
    }

    #[test]
    fn hairline_point_marks_its_pixel() {
        let mut buf = canvas();
        draw_point(&mut buf, 3.5, 7.5, &DrawStyle::new(RED, 1.0));
        assert_eq!(buf.get(3, 7).unwrap(), RED);
    }

    #[test]
    fn width_one_point_on_grid_corner_covers_four_pixels() {
        let mut buf = canvas();
        draw_point(&mut buf, 5.0, 5.0, &DrawStyle::new(RED, 1.0));
        let mut got = painted(&buf, RED);
        got.sort();
        assert_eq!(got, vec![(4, 4), (4, 5), (5, 4), (5, 5)]);
    }

    #[test]
    fn line_is_continuous() {
        let mut buf = canvas();
        let style = DrawStyle::new(RED, 1.0);
        draw_line(&mut buf, 2.0, 3.0, 60.0, 41.0, &style);
        // Every column between the endpoints gets at least one pixel
        for x in 2..60 {
            assert!((0..64).any(|y| buf.get(x, y).unwrap() == RED), "gap at column {x}");
        }
    }

    #[test]
    fn partial_opacity_overwrites_instead_of_stacking() {
        let mut buf = canvas();
        let style = DrawStyle::new(RED, 6.0).with_opacity(0.5);
        draw_line(&mut buf, 10.0, 10.0, 30.0, 10.0, &style);
        draw_line(&mut buf, 20.0, 10.0, 40.0, 10.0, &style);
        assert_eq!(buf.get(25, 10).unwrap(), Rgba([255, 0, 0, 128]));
        assert_eq!(buf.get(12, 10).unwrap(), Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn ellipse_radius_is_distance_to_second_point() {
        let mut buf = canvas();
        let style = DrawStyle::new(RED, 1.0).filled(true);
        draw_ellipse(&mut buf, 32.0, 32.0, 35.0, 36.0, &style); // radius 5
        assert_eq!(buf.get(32, 32).unwrap(), RED);
        assert_eq!(buf.get(35, 32).unwrap(), RED);
        assert_eq!(buf.get(38, 32).unwrap(), WHITE);

        let mut ring = canvas();
        draw_ellipse(&mut ring, 32.0, 32.0, 42.0, 32.0, &DrawStyle::new(RED, 2.0));
        assert_eq!(ring.get(32, 32).unwrap(), WHITE);
        assert_eq!(ring.get(42, 31).unwrap(), RED);
    }

    #[test]
    fn shapes_clip_silently_at_edges() {
        let mut buf = canvas();
        let style = DrawStyle::new(RED, 8.0).filled(true);
        draw_rect(&mut buf, -20.0, -20.0, 4.0, 4.0, &style);
        draw_ellipse(&mut buf, 70.0, 70.0, 80.0, 80.0, &style);
        draw_line(&mut buf, -100.0, 32.0, 200.0, 32.0, &style);
        draw_point(&mut buf, f32::NAN, 3.0, &style);
        draw_point(&mut buf, 1.0e30, 3.0, &style);
        assert_eq!(buf.get(0, 0).unwrap(), RED);
        assert_eq!(buf.get(63, 63).unwrap(), RED);
        assert_eq!(buf.get(0, 32).unwrap(), RED);
        assert_eq!(buf.get(63, 32).unwrap(), RED);
    }

    #[test]
    fn eraser_writes_transparency() {
        let mut buf = canvas();
        erase_line(&mut buf, 10.0, 10.0, 20.0, 10.0, 4.0);
        assert_eq!(buf.get(15, 10).unwrap(), TRANSPARENT);
        assert_eq!(buf.get(15, 20).unwrap(), WHITE);
        assert!(!painted(&buf, TRANSPARENT).is_empty());
    }

    #[test]
    fn draw_shape_dispatches_by_kind() {
        let style = DrawStyle::new(RED, 2.0).filled(true);
        let mut a = canvas();
        let mut b = canvas();
        draw_shape(&mut a, ShapeKind::Rectangle, (4.0, 4.0), (9.0, 9.0), &style);
        draw_rect(&mut b, 4.0, 4.0, 9.0, 9.0, &style);
        assert_eq!(a, b);
        assert_eq!(painted(&a, RED).len(), 25);
    }
}
