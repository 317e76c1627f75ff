// ============================================================================
// FLOOD FILL — exact-color, 4-connected region replacement
// ============================================================================
//
// Colors match only when all four channels are identical.  Antialiased
// edges therefore stop the fill and keep a fringe of the old color.

use image::Rgba;

use crate::canvas::{CanvasError, PixelBuffer};

/// Replace the 4-connected region of the seed's color with `fill_color`.
///
/// Returns how many pixels were written.  Filling a region that already has
/// `fill_color` is a no-op returning 0.  The caller is responsible for
/// recompositing and capturing history afterwards.
pub fn flood_fill(
    buf: &mut PixelBuffer,
    seed_x: i32,
    seed_y: i32,
    fill_color: Rgba<u8>,
) -> Result<usize, CanvasError> {
    let target = buf.get(seed_x, seed_y)?;
    if target == fill_color {
        return Ok(0);
    }

    let w = buf.width() as usize;
    let h = buf.height() as usize;
    let tc = target.0;
    let fc = fill_color.0;
    let data = buf.raw_mut();

    // Visited mask doubles as a guard against re-pushing the same pixel.
    let mut visited = vec![false; w * h];
    // DFS stack of packed flat indices (y * w + x).
    let mut stack: Vec<usize> = Vec::with_capacity(4096);
    let mut filled = 0usize;

    stack.push(seed_y as usize * w + seed_x as usize);

    while let Some(idx) = stack.pop() {
        if visited[idx] {
            continue;
        }
        let o = idx * 4;
        if data[o..o + 4] != tc {
            continue;
        }
        data[o..o + 4].copy_from_slice(&fc);
        visited[idx] = true;
        filled += 1;

        let x = idx % w;
        let y = idx / w;
        // Left
        if x > 0 {
            stack.push(idx - 1);
        }
        // Right
        if x + 1 < w {
            stack.push(idx + 1);
        }
        // Up
        if y > 0 {
            stack.push(idx - w);
        }
        // Down
        if y + 1 < h {
            stack.push(idx + w);
        }
    }

    Ok(filled)
}
